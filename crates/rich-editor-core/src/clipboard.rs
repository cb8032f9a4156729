//! Clipboard payloads and internal copy/cut.
//!
//! The host reads the platform clipboard into a `ClipboardPayload` and hands
//! it to the paste pipeline. Copy and cut go the other way: the selected
//! fragment is kept inside the editor and rendered to a payload the host
//! writes out.

use smol_str::SmolStr;

use crate::document::{Document, Fragment};
use crate::error::Result;
use crate::markup::{ExportOptions, MarkupConverter, MarkupFormat};
use crate::state::EditorState;
use crate::types::ChangeType;

/// Declared type tags that mark a payload as rich text.
const RICH_TEXT_TYPES: &[&str] = &["text/rtf", "text/html"];

/// Everything the host could read off a clipboard or drop event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipboardPayload {
    pub plain_text: Option<String>,
    pub html: Option<String>,
    /// Declared MIME-like type tags, in platform order.
    pub types: Vec<SmolStr>,
    /// Raw RTF text, when the platform offers it.
    pub rtf: Option<String>,
}

impl ClipboardPayload {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            plain_text: Some(text.into()),
            types: vec![SmolStr::new_static("text/plain")],
            ..Self::default()
        }
    }

    pub fn html(html: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            plain_text: Some(text.into()),
            html: Some(html.into()),
            types: vec![
                SmolStr::new_static("text/plain"),
                SmolStr::new_static("text/html"),
            ],
            rtf: None,
        }
    }

    pub fn with_rtf(mut self, rtf: impl Into<String>) -> Self {
        self.rtf = Some(rtf.into());
        if !self.has_type("text/rtf") {
            self.types.push(SmolStr::new_static("text/rtf"));
        }
        self
    }

    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_type(&self, ty: &str) -> bool {
        self.types.iter().any(|t| t == ty)
    }

    pub fn plain_text(&self) -> &str {
        self.plain_text.as_deref().unwrap_or_default()
    }

    pub fn html_str(&self) -> &str {
        self.html.as_deref().unwrap_or_default()
    }

    fn is_image(&self) -> bool {
        self.types.iter().any(|t| t.starts_with("image/"))
    }

    /// Whether the payload carries formatting worth trying to keep.
    ///
    /// HTML plus text always counts; otherwise image payloads never do and
    /// anything declaring an RTF or HTML type does.
    pub fn is_rich_text(&self) -> bool {
        if !self.html_str().is_empty() && !self.plain_text().is_empty() {
            return true;
        }
        if self.is_image() {
            return false;
        }
        self.types.iter().any(|t| RICH_TEXT_TYPES.contains(&t.as_str()))
    }
}

/// A detached fragment as a standalone document, for rendering.
pub fn fragment_document(fragment: &Fragment) -> Document {
    Document::from_blocks(fragment.blocks.clone(), fragment.entities.clone())
}

/// Capture the current selection.
///
/// Returns the fragment to keep as the internal clipboard and the payload
/// for the platform clipboard. The HTML carries `editor_key` so a later
/// paste can recognise it.
pub fn copy_selection(
    state: &EditorState,
    converter: &dyn MarkupConverter,
    editor_key: &str,
) -> Result<(Fragment, ClipboardPayload)> {
    let fragment = state.document().fragment(state.selection())?;
    let doc = fragment_document(&fragment);
    let options = ExportOptions {
        editor_key: Some(SmolStr::new(editor_key)),
    };
    let html = converter.to_string(&doc, MarkupFormat::Html, &options)?;
    let text = fragment.block_texts().collect::<Vec<_>>().join("\n");
    Ok((fragment, ClipboardPayload::html(html, text)))
}

/// Capture the current selection and remove it from the document.
pub fn cut_selection(
    state: &EditorState,
    converter: &dyn MarkupConverter,
    editor_key: &str,
) -> Result<(EditorState, Fragment, ClipboardPayload)> {
    let (fragment, payload) = copy_selection(state, converter, editor_key)?;
    let doc = state.document().remove_range(state.selection())?;
    Ok((state.push(doc, ChangeType::RemoveRange), fragment, payload))
}
