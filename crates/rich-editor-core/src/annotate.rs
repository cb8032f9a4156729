//! Inline annotations, block formatting and indentation.
//!
//! Every operation takes the current `EditorState` and returns the next one.
//! A request that does not apply (no entity under the cursor, a list shift
//! across blocks) returns the input state unchanged.

use regex::Captures;
use serde_json::Value;
use smol_str::SmolStr;
use tracing::debug;

use crate::boundary::expand_selection_to_whole_words;
use crate::config::{EditorConfig, IndentBoundaries};
use crate::document::{BlockData, Document};
use crate::error::{EditorError, Result};
use crate::markup::{ImportOptions, MarkupConverter, rewrite_html};
use crate::selection::SelectionState;
use crate::state::EditorState;
use crate::types::{
    BlockType, ChangeType, CharMeta, Entity, EntityData, EntityKey, EntityType, Mutability,
    StyleSet,
};

/// Block metadata key holding the alignment.
pub const TEXT_ALIGN: &str = "textAlign";

/// Toggle a plain inline style such as bold.
///
/// A caret only flips the pending style for the next typed text. A range is
/// first widened to whole words; the style is added across it when absent at
/// its start and removed otherwise, and the widened range stays selected.
pub fn toggle_inline_style(state: &EditorState, style: &str) -> Result<EditorState> {
    let sel = state.selection();
    if sel.is_collapsed() {
        let mut styles = state.current_inline_style();
        if !styles.remove(style) {
            styles.insert(SmolStr::new(style));
        }
        return Ok(state.set_inline_style_override(styles));
    }

    let expanded = expand_selection_to_whole_words(sel, state.document())?;
    let active = state
        .force_selection(expanded.clone())
        .current_inline_style()
        .contains(style);
    let doc = if active {
        state.document().remove_inline_style(&expanded, style)?
    } else {
        state.document().apply_inline_style(&expanded, style)?
    };
    let doc = doc
        .with_selection_before(sel.clone())
        .with_selection_after(expanded);
    Ok(state.push(doc, ChangeType::ChangeInlineStyle))
}

/// Toggle one member of a mutually exclusive style family.
///
/// Every family style is stripped from the selection, then `target` is
/// applied unless it was already the only active family member at the start
/// of the selection. A fresh `carrier` entity records the chosen variant in
/// `className` (empty when switching off) across the same range.
pub fn toggle_family(
    state: &EditorState,
    family: &[SmolStr],
    target: &str,
    carrier: EntityType,
) -> Result<EditorState> {
    let sel = state.selection();
    let mut styles = state.current_inline_style();
    let deactivate = is_sole_family_member(&styles, family, target);

    if sel.is_collapsed() {
        styles.retain(|s| !family.contains(s));
        if !deactivate {
            styles.insert(SmolStr::new(target));
        }
        return Ok(state.set_inline_style_override(styles));
    }

    let mut doc = state.document().clone();
    for style in family {
        doc = doc.remove_inline_style(sel, style)?;
    }
    if !deactivate {
        doc = doc.apply_inline_style(sel, target)?;
    }
    let class = if deactivate { "" } else { target };
    let (doc, key) = doc.create_entity(Entity::classed(carrier, class));
    let doc = doc
        .apply_entity(sel, Some(key))?
        .prune_entities()
        .with_selection_before(sel.clone())
        .with_selection_after(sel.clone());
    debug!(target, deactivate, "toggled family style");
    Ok(state.push(doc, ChangeType::ChangeInlineStyle))
}

fn is_sole_family_member(styles: &StyleSet, family: &[SmolStr], target: &str) -> bool {
    let mut active = family.iter().filter(|f| styles.contains(f.as_str()));
    matches!((active.next(), active.next()), (Some(only), None) if only == target)
}

/// Toggle a highlight color from the configured color family.
pub fn toggle_color(state: &EditorState, config: &EditorConfig, color: &str) -> Result<EditorState> {
    toggle_family(state, &config.color_family, color, EntityType::Link)
}

/// Mark or unmark the selection as highlighted without touching styles.
///
/// Marking attaches a LINK carrying the highlight class; unmarking attaches
/// an empty SPAN over the same range, replacing whatever was there.
pub fn mark_highlight(state: &EditorState, config: &EditorConfig, on: bool) -> Result<EditorState> {
    let sel = state.selection();
    if sel.is_collapsed() {
        return Ok(state.clone());
    }
    let entity = if on {
        Entity::classed(EntityType::Link, &config.highlight_color)
    } else {
        Entity::classed(EntityType::Span, "")
    };
    let (doc, key) = state.document().create_entity(entity);
    let doc = doc
        .apply_entity(sel, Some(key))?
        .prune_entities()
        .with_selection_after(sel.clone());
    Ok(state.push(doc, ChangeType::ApplyEntity))
}

/// Indent or outdent at the selection.
///
/// List items shift depth. Anything else toggles the indent marker family
/// over the raw selection, then splits indented runs into their own
/// paragraphs when boundary patterns are configured.
pub fn indent(
    state: &EditorState,
    config: &EditorConfig,
    boundaries: Option<&IndentBoundaries>,
    converter: &dyn MarkupConverter,
    increase: bool,
) -> Result<EditorState> {
    let start = start_block_type(state)?;
    if start.is_list() {
        let delta = if increase { 1 } else { -1 };
        let next = adjust_list_depth(state, delta, config.max_list_depth)?;
        return Ok(next.unwrap_or_else(|| state.clone()));
    }

    let target = if increase {
        config.indent_style()
    } else {
        config.outdent_style()
    };
    let next = toggle_family(state, &config.indent_family, target, EntityType::Span)?;
    match boundaries {
        Some(boundaries) if !state.selection().is_collapsed() => {
            wrap_indents(&next, config, boundaries, converter)
        }
        _ => Ok(next),
    }
}

fn start_block_type(state: &EditorState) -> Result<BlockType> {
    let key = state.selection().start_key();
    state
        .document()
        .block(key)
        .map(|b| b.block_type)
        .ok_or_else(|| EditorError::UnknownBlock(key.clone()))
}

/// Shift list depth by `delta`, clamped to `[0, max_depth]`.
///
/// Only applies when anchor and focus sit in the same list block; returns
/// `None` otherwise or when the depth cannot move.
pub fn adjust_list_depth(
    state: &EditorState,
    delta: isize,
    max_depth: usize,
) -> Result<Option<EditorState>> {
    let sel = state.selection();
    if sel.anchor.key != sel.focus.key {
        return Ok(None);
    }
    let block = state
        .document()
        .block(&sel.anchor.key)
        .ok_or_else(|| EditorError::UnknownBlock(sel.anchor.key.clone()))?;
    if !block.block_type.is_list() {
        return Ok(None);
    }
    if (delta > 0 && block.depth >= max_depth) || (delta < 0 && block.depth == 0) {
        return Ok(None);
    }
    let doc = state.document().adjust_block_depth(sel, delta, max_depth)?;
    Ok(Some(state.push(doc, ChangeType::AdjustDepth)))
}

/// Split indented runs out into their own paragraphs.
///
/// The document is rendered to HTML, each boundary pattern match is moved
/// into a paragraph of its own, and the result is parsed back with indent
/// markers mapped to entities. The change folds into the edit that produced
/// `state` rather than adding a history entry.
pub fn wrap_indents(
    state: &EditorState,
    config: &EditorConfig,
    boundaries: &IndentBoundaries,
    converter: &dyn MarkupConverter,
) -> Result<EditorState> {
    let mut matched = false;
    let source = state
        .document()
        .clone()
        .with_selection_after(state.selection().clone());
    let doc = rewrite_html(converter, &source, &indent_import_options(config), |html| {
        let split = split_indent_runs(&html, boundaries);
        matched = split != html;
        split
    })?;
    if !matched {
        return Ok(state.clone());
    }
    Ok(state.with_document(doc))
}

fn split_indent_runs(html: &str, boundaries: &IndentBoundaries) -> String {
    let html = boundaries.common.replace_all(html, |c: &Captures| {
        format!("</p>\n<p>{}</p>\n<p>", c[0].trim())
    });
    let html = boundaries
        .end
        .replace_all(&html, |c: &Captures| format!("</p>\n<p>{}", c[0].trim()));
    let html = boundaries
        .start
        .replace_all(&html, |c: &Captures| format!("{}</p>\n<p>", c[0].trim()));
    html.into_owned()
}

/// Inline mapping used when re-importing indented markup.
pub fn indent_import_options(config: &EditorConfig) -> ImportOptions {
    let indent = config.indent_style().to_owned();
    let outdent = config.outdent_style().to_owned();
    ImportOptions::with_inline_entity(move |tag, class| {
        if tag == "A" && class == indent {
            Some(Entity::classed(EntityType::Link, class))
        } else if class == outdent {
            Some(Entity::new(EntityType::Span, Mutability::Mutable))
        } else {
            None
        }
    })
}

/// Toggle `textAlign` on the block at the selection start.
///
/// The same value clears it, a different one replaces it. Other selected
/// blocks are left alone.
pub fn toggle_alignment(state: &EditorState, align: &str) -> Result<EditorState> {
    let sel = state.selection();
    let key = sel.start_key();
    let block = state
        .document()
        .block(key)
        .ok_or_else(|| EditorError::UnknownBlock(key.clone()))?;
    let mut data: BlockData = block.data.clone();
    if block.data_str(TEXT_ALIGN) == Some(align) {
        data.remove(TEXT_ALIGN);
    } else {
        data.insert(SmolStr::new_static(TEXT_ALIGN), Value::from(align));
    }
    let doc = state
        .document()
        .set_block_data(&SelectionState::collapsed(key.clone(), 0), data)?
        .with_selection_before(sel.clone())
        .with_selection_after(sel.clone());
    Ok(state.push(doc, ChangeType::ChangeBlockData))
}

/// Entity under the cursor and the block range it covers.
fn entity_at_cursor(state: &EditorState) -> Option<(EntityKey, SelectionState)> {
    let sel = state.selection();
    let block = state.document().block(sel.start_key())?;
    let offset = sel.start_offset();
    let entity = block.entity_at(offset)?;
    let (start, end) = block.entity_range(entity, offset)?;
    Some((entity, SelectionState::in_block(block.key.clone(), start, end)))
}

/// Link the selection, or the entity range under a collapsed cursor.
pub fn set_link(
    state: &EditorState,
    url: &str,
    target_blank: bool,
    no_follow: bool,
) -> Result<EditorState> {
    let sel = state.selection();
    let range = if sel.is_collapsed() {
        match entity_at_cursor(state) {
            Some((_, range)) => range,
            None => return Ok(state.clone()),
        }
    } else {
        sel.clone()
    };

    let mut entity = Entity::new(EntityType::Link, Mutability::Mutable).with("url", url);
    if target_blank {
        entity = entity.with("target", "_blank");
    }
    if no_follow {
        entity = entity.with("rel", "nofollow");
    }
    let (doc, key) = state.document().create_entity(entity);
    let doc = doc
        .apply_entity(&range, Some(key))?
        .prune_entities()
        .with_selection_before(sel.clone())
        .with_selection_after(sel.clone());
    Ok(state.push(doc, ChangeType::ApplyEntity))
}

/// Clear the entity range under the cursor.
pub fn remove_link(state: &EditorState) -> Result<EditorState> {
    let Some((_, range)) = entity_at_cursor(state) else {
        return Ok(state.clone());
    };
    let sel = state.selection().clone();
    let doc = state
        .document()
        .apply_entity(&range, None)?
        .prune_entities()
        .with_selection_before(sel.clone())
        .with_selection_after(sel);
    Ok(state.push(doc, ChangeType::ApplyEntity))
}

/// Insert an image as a single space carrying an IMAGE entity.
pub fn insert_image(state: &EditorState, src: &str) -> Result<EditorState> {
    let entity = Entity::new(EntityType::Image, Mutability::Immutable).with("src", src);
    insert_with_entity(state, " ", entity)
}

/// Insert a symbol wrapped in its own SPAN entity.
pub fn insert_symbol(state: &EditorState, symbol: &str) -> Result<EditorState> {
    insert_with_entity(state, symbol, Entity::new(EntityType::Span, Mutability::Mutable))
}

pub(crate) fn insert_with_entity(state: &EditorState, text: &str, entity: Entity) -> Result<EditorState> {
    let (doc, key) = state.document().create_entity(entity);
    let meta = CharMeta::new(StyleSet::new(), Some(key));
    let doc = doc.replace_text(state.selection(), text, &meta)?.prune_entities();
    Ok(state.push(doc, ChangeType::InsertCharacters))
}

/// Set every selected block to `block_type`, or back to unstyled when they
/// all have it already.
pub fn toggle_block_type(state: &EditorState, block_type: BlockType) -> Result<EditorState> {
    let sel = state.selection();
    let all_set = state
        .document()
        .blocks_in_selection(sel)?
        .iter()
        .all(|b| b.block_type == block_type);
    let next = if all_set {
        BlockType::Unstyled
    } else {
        block_type
    };
    let doc = state
        .document()
        .set_block_type(sel, next)?
        .with_selection_after(sel.clone());
    Ok(state.push(doc, ChangeType::ChangeBlockType))
}

/// Flag images inside a ranged selection with `selected = true`.
///
/// Not recorded in history.
pub fn mark_selected_images(state: &EditorState) -> Result<EditorState> {
    let sel = state.selection();
    if sel.is_collapsed() {
        return Ok(state.clone());
    }
    let (start, end) = (sel.start(), sel.end());
    let doc = state.document();
    let mut images = Vec::new();
    for block in doc.blocks_in_selection(sel)? {
        let from = if block.key == start.key { start.offset } else { 0 };
        let to = if block.key == end.key { end.offset } else { block.len() };
        for offset in from..to {
            let Some(key) = block.entity_at(offset) else {
                continue;
            };
            let is_image = doc.entity(key).is_some_and(|e| e.kind == EntityType::Image);
            let already = doc
                .entity(key)
                .and_then(|e| e.data.get("selected"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if is_image && !already && !images.contains(&key) {
                images.push(key);
            }
        }
    }
    if images.is_empty() {
        return Ok(state.clone());
    }
    let mut next: Document = doc.clone();
    for key in images {
        let mut data = EntityData::new();
        data.insert(SmolStr::new_static("selected"), Value::Bool(true));
        next = next.merge_entity_data(key, data)?;
    }
    Ok(state.with_document(next.with_selection_after(sel.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Block;
    use crate::markup::DefaultConverter;
    use crate::selection::Point;
    use crate::types::styles;

    fn state_with(text: &str, anchor: usize, focus: usize) -> EditorState {
        let state = EditorState::new(Document::from_text(text), 100);
        let key = state.document().first_block().key.clone();
        state.force_selection(SelectionState::in_block(key, anchor, focus))
    }

    fn styles_at(state: &EditorState, offset: usize) -> StyleSet {
        state.document().first_block().style_at(offset)
    }

    #[test]
    fn test_style_toggle_expands_to_words() {
        let state = state_with("hello world", 2, 8);
        let next = toggle_inline_style(&state, styles::BOLD).unwrap();
        let block = next.document().first_block();
        assert!((0..11).all(|i| block.style_at(i).contains(styles::BOLD)));
        assert_eq!(next.selection().start_offset(), 0);
        assert_eq!(next.selection().end_offset(), 11);
        assert_eq!(next.last_change_type(), Some(ChangeType::ChangeInlineStyle));

        let again = toggle_inline_style(&next, styles::BOLD).unwrap();
        assert!(styles_at(&again, 0).is_empty());
    }

    #[test]
    fn test_style_toggle_collapsed_sets_override() {
        let state = state_with("hello", 5, 5);
        let next = toggle_inline_style(&state, styles::ITALIC).unwrap();
        assert!(next.inline_style_override().unwrap().contains(styles::ITALIC));
        assert!(next.document().same_content(state.document()));
        assert!(!next.can_undo());
    }

    #[test]
    fn test_color_toggle_is_an_involution() {
        let config = EditorConfig::default();
        let state = state_with("paint me", 0, 5);
        let on = toggle_color(&state, &config, "red-dropdown_option").unwrap();
        assert!(styles_at(&on, 0).contains("red-dropdown_option"));
        let key = on.document().first_block().entity_at(0).unwrap();
        let entity = on.document().entity(key).unwrap();
        assert_eq!(entity.kind, EntityType::Link);
        assert_eq!(entity.class_name(), Some("red-dropdown_option"));
        assert_eq!(on.selection(), state.selection());

        let off = toggle_color(&on, &config, "red-dropdown_option").unwrap();
        assert_eq!(styles_at(&off, 0), styles_at(&state, 0));
        let key = off.document().first_block().entity_at(0).unwrap();
        assert_eq!(off.document().entity(key).unwrap().class_name(), Some(""));
        // the first carrier is no longer referenced
        assert_eq!(off.document().entities().len(), 1);
    }

    #[test]
    fn test_color_switch_replaces_previous() {
        let config = EditorConfig::default();
        let state = state_with("paint me", 0, 5);
        let red = toggle_color(&state, &config, "red-dropdown_option").unwrap();
        let blue = toggle_color(&red, &config, "blue-dropdown_option").unwrap();
        let styles = styles_at(&blue, 2);
        assert!(styles.contains("blue-dropdown_option"));
        assert!(!styles.contains("red-dropdown_option"));
    }

    #[test]
    fn test_indent_family_stays_exclusive() {
        let config = EditorConfig::default();
        let mut state = state_with("some text", 0, 4);
        for increase in [true, false, true, true, false, false] {
            state = indent(&state, &config, None, &DefaultConverter, increase).unwrap();
            let styles = styles_at(&state, 1);
            let both = styles.contains("text-indent") && styles.contains("text-outdent");
            assert!(!both);
        }
    }

    #[test]
    fn test_indent_on_list_shifts_depth() {
        let config = EditorConfig::default();
        let doc = Document::from_blocks(
            vec![Block::new(BlockType::UnorderedListItem, "item")],
            Default::default(),
        );
        let key = doc.first_block().key.clone();
        let mut state = EditorState::new(doc, 100).force_selection(SelectionState::collapsed(key, 2));
        for _ in 0..5 {
            state = indent(&state, &config, None, &DefaultConverter, true).unwrap();
        }
        assert_eq!(state.document().first_block().depth, 2);
        assert_eq!(state.last_change_type(), Some(ChangeType::AdjustDepth));
        state = indent(&state, &config, None, &DefaultConverter, false).unwrap();
        assert_eq!(state.document().first_block().depth, 1);
    }

    #[test]
    fn test_list_depth_needs_single_block() {
        let doc = Document::from_blocks(
            vec![
                Block::new(BlockType::UnorderedListItem, "a"),
                Block::new(BlockType::UnorderedListItem, "b"),
            ],
            Default::default(),
        );
        let first = doc.first_block().key.clone();
        let last = doc.last_block().key.clone();
        let state = EditorState::new(doc, 100).force_selection(SelectionState::new(
            Point::new(first, 0),
            Point::new(last, 1),
        ));
        assert!(adjust_list_depth(&state, 1, 2).unwrap().is_none());
    }

    #[test]
    fn test_wrap_indents_splits_runs() {
        let mut config = EditorConfig::default();
        config.indent_boundaries = Some(crate::config::IndentBoundaryPatterns {
            common: r#"<span data-entity="SPAN" class="text-indent">.*?</span></span>"#.into(),
            start: "^$".into(),
            end: "^$".into(),
        });
        let boundaries = config.compile_boundaries().unwrap().unwrap();
        let state = state_with("before mid after", 7, 10);
        let next = indent(&state, &config, Some(&boundaries), &DefaultConverter, true).unwrap();
        let texts: Vec<&str> = next.document().blocks().map(|b| b.text()).collect();
        assert!(texts.contains(&"mid"));
        assert!(texts.iter().any(|t| t.starts_with("before")));
        let undone = next.undo().unwrap();
        assert_eq!(undone.document().plain_text(), "before mid after");
    }

    #[test]
    fn test_alignment_toggle() {
        let state = state_with("centered", 0, 0);
        let on = toggle_alignment(&state, "center").unwrap();
        assert_eq!(on.document().first_block().data_str(TEXT_ALIGN), Some("center"));
        let right = toggle_alignment(&on, "right").unwrap();
        assert_eq!(right.document().first_block().data_str(TEXT_ALIGN), Some("right"));
        let off = toggle_alignment(&right, "right").unwrap();
        assert_eq!(off.document().first_block().data_str(TEXT_ALIGN), None);
    }

    #[test]
    fn test_alignment_only_touches_start_block() {
        let state = EditorState::new(Document::from_text("a\nb"), 100);
        let first = state.document().first_block().key.clone();
        let last = state.document().last_block().key.clone();
        let state = state.force_selection(SelectionState::new(Point::new(first, 0), Point::new(last, 1)));
        let next = toggle_alignment(&state, "center").unwrap();
        assert_eq!(next.document().first_block().data_str(TEXT_ALIGN), Some("center"));
        assert_eq!(next.document().last_block().data_str(TEXT_ALIGN), None);
    }

    #[test]
    fn test_link_set_and_remove() {
        let state = state_with("see docs here", 4, 8);
        let linked = set_link(&state, "https://example.com", true, false).unwrap();
        let block = linked.document().first_block();
        let key = block.entity_at(4).unwrap();
        let entity = linked.document().entity(key).unwrap();
        assert_eq!(entity.str_field("url"), Some("https://example.com"));
        assert_eq!(entity.str_field("target"), Some("_blank"));
        assert_eq!(entity.str_field("rel"), None);

        let caret = linked.force_selection(SelectionState::in_block(block.key.clone(), 6, 6));
        let relinked = set_link(&caret, "https://other.example", false, true).unwrap();
        let key = relinked.document().first_block().entity_at(4).unwrap();
        assert_eq!(
            relinked.document().entity(key).unwrap().str_field("rel"),
            Some("nofollow")
        );

        let removed = remove_link(&caret).unwrap();
        assert!(removed.document().first_block().entity_at(5).is_none());
        assert!(removed.document().entities().is_empty());
    }

    #[test]
    fn test_link_needs_range_or_entity() {
        let state = state_with("plain", 2, 2);
        let next = set_link(&state, "https://example.com", false, false).unwrap();
        assert!(!next.can_undo());
    }

    #[test]
    fn test_insert_image_and_symbol() {
        let state = state_with("ab", 1, 1);
        let next = insert_image(&state, "pic.png").unwrap();
        let block = next.document().first_block();
        assert_eq!(block.text(), "a b");
        let key = block.entity_at(1).unwrap();
        assert_eq!(next.document().entity(key).unwrap().kind, EntityType::Image);

        let state = state_with("x y", 1, 2);
        let next = insert_symbol(&state, "§").unwrap();
        assert_eq!(next.document().first_block().text(), "x§y");
        let key = next.document().first_block().entity_at(1).unwrap();
        assert_eq!(next.document().entity(key).unwrap().kind, EntityType::Span);
        assert_eq!(next.last_change_type(), Some(ChangeType::InsertCharacters));
    }

    #[test]
    fn test_toggle_block_type() {
        let state = state_with("title", 0, 0);
        let heading = toggle_block_type(&state, BlockType::HeaderTwo).unwrap();
        assert_eq!(heading.document().first_block().block_type, BlockType::HeaderTwo);
        let back = toggle_block_type(&heading, BlockType::HeaderTwo).unwrap();
        assert_eq!(back.document().first_block().block_type, BlockType::Unstyled);
    }

    #[test]
    fn test_mark_selected_images() {
        let state = state_with("ab", 1, 1);
        let with_image = insert_image(&state, "pic.png").unwrap();
        let key = with_image.document().first_block().entity_at(1).unwrap();
        let block_key = with_image.document().first_block().key.clone();
        let selected = with_image.force_selection(SelectionState::in_block(block_key, 0, 3));
        let marked = mark_selected_images(&selected).unwrap();
        let entity = marked.document().entity(key).unwrap();
        assert_eq!(entity.data.get("selected"), Some(&Value::Bool(true)));
        assert_eq!(marked.history().undo_depth(), with_image.history().undo_depth());
    }
}
