//! Insert points and externally resolved content.
//!
//! An insert point is a visible placeholder (`<||>` by default) carried by a
//! LINK entity. A sync insert takes the word under the selection, hands it to
//! a host resolver and splices the resolved markup back in; bracket markers
//! inside the resolved text come back as live highlight links.

use std::sync::Arc;

use futures_util::future::LocalBoxFuture;
use tracing::{debug, warn};

use crate::annotate::insert_with_entity;
use crate::boundary::{is_ambiguous_zero_width_selection, snap_points};
use crate::config::EditorConfig;
use crate::error::{EditorError, Result};
use crate::markup::{ImportOptions, MarkupConverter, MarkupFormat, rewrite_html};
use crate::paste::clear_empty_paragraph_markers;
use crate::selection::SelectionState;
use crate::state::EditorState;
use crate::types::{BlockKey, ChangeType, Entity, EntityType, Mutability};

/// What the resolver is asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertRequest {
    /// The whitespace-free word under the selection; may be empty.
    pub token: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub start_key: BlockKey,
    pub end_key: BlockKey,
}

/// Host lookup for a sync insert. `None` means there is nothing to insert.
pub type Resolver = Arc<dyn Fn(InsertRequest) -> LocalBoxFuture<'static, Option<String>>>;

#[derive(Debug, Clone)]
pub enum InsertOutcome {
    Inserted(EditorState),
    /// The caret does not sit on a clean word boundary.
    AmbiguousCaret,
    /// The selected text spans more than one word.
    InvalidToken(String),
    /// The resolver had nothing to offer.
    Unresolved,
    /// No resolver is configured.
    NoResolver,
    /// The document could not be updated.
    Failed(EditorError),
}

impl InsertOutcome {
    pub fn state(&self) -> Option<&EditorState> {
        match self {
            InsertOutcome::Inserted(state) => Some(state),
            _ => None,
        }
    }
}

/// Replace any selected range with an insert-point marker.
pub fn insert_point(state: &EditorState, config: &EditorConfig) -> Result<EditorState> {
    let entity = Entity::classed(EntityType::Link, &config.insert_point_class);
    insert_with_entity(state, &config.insert_point_literal, entity)
}

/// Work out what to ask the resolver for.
///
/// Snaps the selection outward to whole words and extracts the token
/// between the snapped points. A zero-width result must sit on a clean
/// boundary and the token must be a single word.
pub fn prepare_sync_insert(state: &EditorState) -> std::result::Result<InsertRequest, InsertOutcome> {
    let doc = state.document();
    let (start, end) = snap_points(state.selection(), doc).map_err(InsertOutcome::Failed)?;
    let start_text = doc.block(&start.key).map(|b| b.text()).unwrap_or_default();
    let end_text = doc.block(&end.key).map(|b| b.text()).unwrap_or_default();

    if start.offset == end.offset
        && !is_ambiguous_zero_width_selection(start.offset, end.offset, start_text, end_text)
    {
        debug!(offset = start.offset, "wrong position of cursor for sync insert");
        return Err(InsertOutcome::AmbiguousCaret);
    }

    let token = doc
        .text_in_selection(&SelectionState::new(start.clone(), end.clone()))
        .map_err(InsertOutcome::Failed)?;
    if token.trim().contains(char::is_whitespace) {
        debug!(%token, "sync insert token is not a single word");
        return Err(InsertOutcome::InvalidToken(token));
    }

    Ok(InsertRequest {
        token,
        start_offset: start.offset,
        end_offset: end.offset,
        start_key: start.key,
        end_key: end.key,
    })
}

/// Wrap `<|...|>` markers (raw or HTML-escaped) in bare anchors so they
/// import as links.
pub fn wrap_insert_markers(value: &str) -> String {
    let raw = value.contains("<|") && value.contains("|>");
    let escaped = value.contains("&lt;|") && value.contains("|&gt;");
    if !raw && !escaped {
        return value.to_owned();
    }
    value
        .replace("<|", "<a><|")
        .replace("|>", "|></a>")
        .replace("&lt;|", "<a><|")
        .replace("|&gt;", "|></a>")
}

/// Inline mapping for re-imported resolver output.
///
/// Insert-point anchors keep their class, bare anchors become highlights and
/// outdent markers become bare spans.
pub fn marker_import_options(config: &EditorConfig) -> ImportOptions {
    let insert_point = config.insert_point_class.clone();
    let highlight = config.highlight_color.clone();
    let outdent = config.outdent_style().to_owned();
    ImportOptions::with_inline_entity(move |tag, class| {
        if tag == "A" && class == insert_point {
            Some(Entity::classed(EntityType::Link, &insert_point))
        } else if tag == "A" && class.is_empty() {
            Some(Entity::classed(EntityType::Link, &highlight))
        } else if class == outdent {
            Some(Entity::new(EntityType::Span, Mutability::Mutable))
        } else {
            None
        }
    })
}

/// Splice resolved markup over `selection`.
///
/// `selection` is the one the insert started from; it is snapped to whole
/// words again against the current document. The merged document is
/// rendered and re-imported with `marker_import_options`.
pub fn apply_sync_insert(
    state: &EditorState,
    selection: &SelectionState,
    value: &str,
    converter: &dyn MarkupConverter,
    config: &EditorConfig,
) -> Result<EditorState> {
    let doc = state.document();
    let (start, end) = snap_points(selection, doc)?;
    let target = SelectionState::new(end, start).with_backward(true);

    let parsed = converter.from_string(
        &wrap_insert_markers(value),
        MarkupFormat::Html,
        &ImportOptions::default(),
    )?;
    let fragment = clear_empty_paragraph_markers(parsed.into());
    let merged = doc
        .replace_with_fragment(&target, &fragment)?
        .with_selection_before(selection.clone());
    let reimported = rewrite_html(converter, &merged, &marker_import_options(config), |html| html)?;
    Ok(state.push(reimported, ChangeType::InsertFragment))
}

/// Run a sync insert end to end against `state`.
pub async fn sync_insert(
    state: &EditorState,
    resolver: Option<&Resolver>,
    converter: &dyn MarkupConverter,
    config: &EditorConfig,
) -> InsertOutcome {
    let Some(resolver) = resolver else {
        return InsertOutcome::NoResolver;
    };
    let request = match prepare_sync_insert(state) {
        Ok(request) => request,
        Err(outcome) => return outcome,
    };
    let Some(value) = resolver(request).await else {
        debug!("sync insert resolver returned nothing");
        return InsertOutcome::Unresolved;
    };
    match apply_sync_insert(state, state.selection(), &value, converter, config) {
        Ok(next) => InsertOutcome::Inserted(next),
        Err(err) => {
            warn!(%err, "failed to apply sync insert");
            InsertOutcome::Failed(err)
        }
    }
}
