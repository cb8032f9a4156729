//! Document ⇄ markup conversion.
//!
//! The editor core only needs a small, tolerant converter: enough to turn
//! clipboard HTML and resolver output into blocks, and to render documents
//! back out for validation hooks and the host. Hosts with richer needs plug
//! in their own `MarkupConverter`.

mod html;
mod markdown;

use std::fmt;
use std::sync::Arc;

use smol_str::SmolStr;

use crate::document::{BlockData, Document};
use crate::selection::SelectionState;
use crate::error::Result;
use crate::types::Entity;

pub use html::{EMPTY_PARAGRAPH_MARKER, EMPTY_PARAGRAPH_SPAN};

/// Markup flavours the converter speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkupFormat {
    Html,
    Markdown,
}

/// Maps an inline element (upper-case tag name, class name) to an entity.
pub type InlineEntityFn = Arc<dyn Fn(&str, &str) -> Option<Entity>>;

/// Maps a block element (upper-case tag name, class name) to block metadata.
pub type BlockMetadataFn = Arc<dyn Fn(&str, &str) -> Option<BlockData>>;

/// Hooks consulted while parsing markup.
#[derive(Clone, Default)]
pub struct ImportOptions {
    pub block_metadata: Option<BlockMetadataFn>,
    pub inline_entity: Option<InlineEntityFn>,
}

impl ImportOptions {
    pub fn with_inline_entity(f: impl Fn(&str, &str) -> Option<Entity> + 'static) -> Self {
        Self {
            block_metadata: None,
            inline_entity: Some(Arc::new(f)),
        }
    }

    pub fn block_metadata(mut self, f: impl Fn(&str, &str) -> Option<BlockData> + 'static) -> Self {
        self.block_metadata = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for ImportOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportOptions")
            .field("block_metadata", &self.block_metadata.is_some())
            .field("inline_entity", &self.inline_entity.is_some())
            .finish()
    }
}

/// Options for rendering documents.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Stamped on every rendered HTML block as `data-editor`, so a paste of
    /// our own output can be recognised.
    pub editor_key: Option<SmolStr>,
}

/// Converts documents to and from markup strings.
pub trait MarkupConverter {
    fn to_string(&self, doc: &Document, format: MarkupFormat, options: &ExportOptions) -> Result<String>;

    fn from_string(&self, markup: &str, format: MarkupFormat, options: &ImportOptions) -> Result<Document>;
}

/// The built-in HTML and Markdown converter.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConverter;

impl MarkupConverter for DefaultConverter {
    fn to_string(&self, doc: &Document, format: MarkupFormat, options: &ExportOptions) -> Result<String> {
        match format {
            MarkupFormat::Html => html::render(doc, options),
            MarkupFormat::Markdown => markdown::render(doc),
        }
    }

    fn from_string(&self, markup: &str, format: MarkupFormat, options: &ImportOptions) -> Result<Document> {
        match format {
            MarkupFormat::Html => html::parse(markup, options),
            MarkupFormat::Markdown => markdown::parse(markup, options),
        }
    }
}

/// Plain `String` sink for the escaping helpers.
pub(crate) struct MarkupWriter {
    out: String,
}

impl MarkupWriter {
    pub(crate) fn new() -> Self {
        Self { out: String::new() }
    }

    pub(crate) fn write(&mut self, s: &str) {
        self.out.push_str(s);
    }

    pub(crate) fn into_string(self) -> String {
        self.out
    }
}

impl markdown_weaver_escape::StrWrite for MarkupWriter {
    type Error = fmt::Error;

    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.out.push_str(s);
        Ok(())
    }

    fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> fmt::Result {
        fmt::Write::write_fmt(&mut self.out, args)
    }
}

/// True when a parsed document carries nothing worth inserting.
pub fn is_blank(doc: &Document) -> bool {
    doc.entities().is_empty() && doc.blocks().all(|b| b.is_empty()) && doc.block_count() <= 1
}

/// Render `doc` to HTML, let `rewrite` edit the markup, and parse it back
/// with `import`.
///
/// Block keys do not survive the trip, so the caret recorded in
/// `doc.selection_after()` is carried over by block position, falling back
/// to the end of the new document.
pub fn rewrite_html(
    converter: &dyn MarkupConverter,
    doc: &Document,
    import: &ImportOptions,
    rewrite: impl FnOnce(String) -> String,
) -> Result<Document> {
    let html = converter.to_string(doc, MarkupFormat::Html, &ExportOptions::default())?;
    let parsed = converter.from_string(&rewrite(html), MarkupFormat::Html, import)?;
    let caret = doc
        .selection_after()
        .and_then(|sel| {
            let end = sel.end();
            let idx = doc.block_index(&end.key)?;
            let block = parsed.blocks().nth(idx)?;
            Some(SelectionState::collapsed(block.key.clone(), end.offset.min(block.len())))
        })
        .unwrap_or_else(|| parsed.selection_at_end());
    let parsed = match doc.selection_before() {
        Some(before) => parsed.with_selection_before(before.clone()),
        None => parsed,
    };
    Ok(parsed.with_selection_after(caret))
}
