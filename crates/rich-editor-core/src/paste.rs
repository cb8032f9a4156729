//! Paste reconciliation.
//!
//! A clipboard payload goes through a fixed sequence of strategies, the first
//! one that yields content wins:
//!
//! 1. a host pre-handler may intercept the paste outright
//! 2. our own copy coming back (session key in the HTML, or a single matching
//!    line) reinserts the internal fragment untouched
//! 3. a plain-text-only channel whose lines match the internal fragment also
//!    reinserts it
//! 4. HTML is parsed, optionally round-tripped through the validator
//! 5. RTF is handed to the validator, which must turn it into HTML
//! 6. plain text becomes one block per line
//!
//! The pipeline owns a snapshot of everything it reads, so the future it
//! returns can be awaited while the editor keeps handling input.

use std::sync::{Arc, LazyLock};

use futures_util::future::LocalBoxFuture;
use regex::Regex;
use smol_str::SmolStr;
use tracing::{debug, warn};

use crate::clipboard::ClipboardPayload;
use crate::document::{Block, Document, Fragment};
use crate::error::{HookError, Result};
use crate::markup::{
    EMPTY_PARAGRAPH_MARKER, EMPTY_PARAGRAPH_SPAN, ExportOptions, ImportOptions, MarkupConverter,
    MarkupFormat, is_blank,
};
use crate::state::EditorState;
use crate::types::{ChangeType, CharMeta};

static LINE_BREAK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\r\n?|\n").unwrap());

/// How an empty line looks in HTML produced by a sibling editor.
const EMPTY_LINE_HTML: &str = r#"<br data-text="true">"#;

/// Synchronous interception hook: `(plain_text, html, state) -> handled`.
pub type PreHandler = Arc<dyn Fn(&str, &str, &EditorState) -> bool>;

/// Asynchronous validation hook.
///
/// Resolves to corrected HTML, or `None` (or an empty string) to reject the
/// paste.
pub type Validator =
    Arc<dyn Fn(ValidationRequest) -> LocalBoxFuture<'static, std::result::Result<Option<String>, HookError>>>;

/// What the validator is asked to look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationRequest {
    /// Parsed clipboard HTML rendered back out.
    Html(String),
    /// Raw RTF text; the validator must answer with HTML.
    Rtf(String),
}

impl ValidationRequest {
    pub fn as_str(&self) -> &str {
        match self {
            ValidationRequest::Html(s) | ValidationRequest::Rtf(s) => s,
        }
    }
}

/// Optional hooks consulted during a paste.
#[derive(Clone, Default)]
pub struct PasteHooks {
    pub pre_handler: Option<PreHandler>,
    pub validator: Option<Validator>,
}

impl std::fmt::Debug for PasteHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasteHooks")
            .field("pre_handler", &self.pre_handler.is_some())
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

/// Which strategy produced the inserted content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasteSource {
    InternalFragment,
    LossyMatch,
    Html,
    Rtf,
    PlainText,
}

#[derive(Debug, Clone)]
pub enum PasteOutcome {
    /// The pre-handler took the paste.
    Intercepted,
    Inserted {
        state: EditorState,
        source: PasteSource,
    },
    /// The validator refused the content or failed.
    Rejected,
    /// Nothing in the payload could be inserted.
    Empty,
}

impl PasteOutcome {
    pub fn state(&self) -> Option<&EditorState> {
        match self {
            PasteOutcome::Inserted { state, .. } => Some(state),
            _ => None,
        }
    }

    pub fn source(&self) -> Option<PasteSource> {
        match self {
            PasteOutcome::Inserted { source, .. } => Some(*source),
            _ => None,
        }
    }
}

/// Result of running the pipeline.
#[derive(Debug, Clone)]
pub struct PasteResult {
    pub outcome: PasteOutcome,
    /// The internal fragment no longer matches what is on the clipboard.
    pub clear_internal_clipboard: bool,
}

/// Everything the pipeline reads, captured when the paste starts.
pub struct PasteRequest {
    pub state: EditorState,
    pub payload: ClipboardPayload,
    pub internal: Option<Fragment>,
    pub editor_key: SmolStr,
    pub strip_pasted_styles: bool,
    pub converter: Arc<dyn MarkupConverter>,
    pub import: ImportOptions,
    pub hooks: PasteHooks,
}

/// Split pasted text into lines on any line-break convention.
pub fn split_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }
    LINE_BREAK_RE.split(text).collect()
}

/// Run the paste pipeline against the captured state.
pub async fn reconcile_paste(request: PasteRequest) -> PasteResult {
    let PasteRequest {
        state,
        payload,
        internal,
        editor_key,
        strip_pasted_styles,
        converter,
        import,
        hooks,
    } = request;

    let text = payload.plain_text();
    let html = payload.html_str().replace(EMPTY_LINE_HTML, EMPTY_PARAGRAPH_SPAN);

    if let Some(pre_handler) = &hooks.pre_handler {
        if pre_handler(text, &html, &state) {
            debug!("paste intercepted by pre-handler");
            return finish(PasteOutcome::Intercepted, false);
        }
    }

    let lines = split_lines(text);
    let mut clear = false;

    if !strip_pasted_styles {
        if let Some(fragment) = &internal {
            if let Some(source) = match_internal(&payload, &html, &lines, fragment, &editor_key) {
                debug!(?source, "pasting internal fragment");
                return finish(insert(&state, fragment, source), false);
            }
        }
        clear = true;

        if !html.is_empty() {
            match converter.from_string(&html, MarkupFormat::Html, &import) {
                Ok(doc) if !is_blank(&doc) => {
                    let outcome = match &hooks.validator {
                        Some(validator) => match validate_html(validator, converter.as_ref(), &import, doc).await {
                            Some(doc) => insert_document(&state, doc, PasteSource::Html),
                            None => PasteOutcome::Rejected,
                        },
                        None => insert_document(&state, doc, PasteSource::Html),
                    };
                    return finish(outcome, clear);
                }
                Ok(_) => debug!("pasted html has no content"),
                Err(err) => warn!(%err, "failed to parse pasted html"),
            }
        }

        let rtf = payload.rtf.as_deref().filter(|r| !r.is_empty());
        if let (Some(rtf), Some(validator)) = (rtf, &hooks.validator) {
            let outcome = match run_validator(validator, ValidationRequest::Rtf(rtf.to_owned())).await {
                Some(html) => match converter.from_string(&html, MarkupFormat::Html, &import) {
                    Ok(doc) => insert_document(&state, doc, PasteSource::Rtf),
                    Err(err) => {
                        warn!(%err, "failed to parse html converted from rtf");
                        PasteOutcome::Rejected
                    }
                },
                None => PasteOutcome::Rejected,
            };
            return finish(outcome, clear);
        }
    }

    if !lines.is_empty() {
        let meta = CharMeta::new(
            state.current_inline_style(),
            state.document().entity_key_for_selection(state.selection()),
        );
        let fragment = Fragment::from_lines(lines, &meta);
        return finish(insert(&state, &fragment, PasteSource::PlainText), clear);
    }

    debug!("paste produced no content");
    finish(PasteOutcome::Empty, true)
}

fn finish(outcome: PasteOutcome, clear_internal_clipboard: bool) -> PasteResult {
    PasteResult {
        outcome,
        clear_internal_clipboard,
    }
}

/// Decide whether the payload is our own copy coming back.
fn match_internal(
    payload: &ClipboardPayload,
    html: &str,
    lines: &[&str],
    fragment: &Fragment,
    editor_key: &str,
) -> Option<PasteSource> {
    if payload.is_rich_text() {
        let own_html = !editor_key.is_empty() && html.contains(editor_key);
        let single_line = lines.len() == 1
            && fragment.blocks.len() == 1
            && fragment.blocks[0].text() == payload.plain_text();
        return (own_html || single_line).then_some(PasteSource::InternalFragment);
    }
    // Some channels drop the HTML flavour entirely; fall back to comparing
    // the text line by line. A foreign copy of identical text matches too.
    let lines_match = html.is_empty()
        && !lines.is_empty()
        && lines.len() == fragment.blocks.len()
        && lines.iter().zip(fragment.block_texts()).all(|(l, b)| *l == b);
    lines_match.then_some(PasteSource::LossyMatch)
}

async fn run_validator(validator: &Validator, request: ValidationRequest) -> Option<String> {
    match validator(request).await {
        Ok(Some(html)) if !html.is_empty() => Some(html),
        Ok(_) => {
            debug!("paste validator rejected content");
            None
        }
        Err(err) => {
            warn!(%err, "paste validator failed");
            None
        }
    }
}

/// Round-trip a parsed document through the validator.
///
/// Returns the document to insert, or `None` when the paste is aborted.
async fn validate_html(
    validator: &Validator,
    converter: &dyn MarkupConverter,
    import: &ImportOptions,
    doc: Document,
) -> Option<Document> {
    let rendered = match converter.to_string(&doc, MarkupFormat::Html, &ExportOptions::default()) {
        Ok(rendered) => rendered,
        Err(err) => {
            warn!(%err, "failed to render pasted content for validation");
            return None;
        }
    };
    let corrected = run_validator(validator, ValidationRequest::Html(rendered.clone())).await?;
    if corrected == rendered {
        return Some(doc);
    }
    match converter.from_string(&corrected, MarkupFormat::Html, import) {
        Ok(doc) => Some(doc),
        Err(err) => {
            warn!(%err, "failed to parse corrected html");
            None
        }
    }
}

fn insert_document(state: &EditorState, doc: Document, source: PasteSource) -> PasteOutcome {
    let fragment = clear_empty_paragraph_markers(Fragment::from(doc));
    insert(state, &fragment, source)
}

fn insert(state: &EditorState, fragment: &Fragment, source: PasteSource) -> PasteOutcome {
    match insert_fragment(state, fragment) {
        Ok(state) => PasteOutcome::Inserted { state, source },
        Err(err) => {
            warn!(%err, ?source, "failed to insert pasted fragment");
            PasteOutcome::Empty
        }
    }
}

/// Replace the selection with `fragment` and record the change.
pub fn insert_fragment(state: &EditorState, fragment: &Fragment) -> Result<EditorState> {
    let doc = state
        .document()
        .replace_with_fragment(state.selection(), fragment)?;
    Ok(state.push(doc, ChangeType::InsertFragment))
}

/// Blocks that only carry the empty-line marker become truly empty.
pub fn clear_empty_paragraph_markers(fragment: Fragment) -> Fragment {
    let blocks = fragment
        .blocks
        .into_iter()
        .map(|block| {
            if block.text().trim() != EMPTY_PARAGRAPH_MARKER {
                return block;
            }
            let mut empty = Block::new(block.block_type, "")
                .with_key(block.key)
                .with_depth(block.depth);
            empty.data = block.data;
            empty
        })
        .collect();
    Fragment {
        blocks,
        entities: fragment.entities,
    }
}
