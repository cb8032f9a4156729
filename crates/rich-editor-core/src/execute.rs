//! Command execution.
//!
//! `execute_command` is the central dispatch point for every synchronous
//! editor command. Commands that need the host or an await point (sync
//! insert, async insert) are left to the `Editor`.

use crate::actions::EditorCommand;
use crate::annotate;
use crate::config::{EditorConfig, IndentBoundaries};
use crate::document::Block;
use crate::error::{EditorError, Result};
use crate::insertion::insert_point;
use crate::markup::MarkupConverter;
use crate::state::EditorState;
use crate::types::{BlockType, ChangeType, CharMeta, styles};

/// What command execution may read besides the state itself.
#[derive(Clone, Copy)]
pub struct CommandContext<'a> {
    pub config: &'a EditorConfig,
    pub boundaries: Option<&'a IndentBoundaries>,
    pub converter: &'a dyn MarkupConverter,
}

/// Execute a command against `state`.
///
/// Returns the next state when the command was handled, `None` when it does
/// not apply here (nothing to undo, Tab outside a list, async commands).
pub fn execute_command(
    state: &EditorState,
    command: &EditorCommand,
    ctx: &CommandContext<'_>,
) -> Result<Option<EditorState>> {
    let next = match command {
        EditorCommand::ToggleBold => annotate::toggle_inline_style(state, styles::BOLD)?,
        EditorCommand::ToggleItalic => annotate::toggle_inline_style(state, styles::ITALIC)?,
        EditorCommand::ToggleUnderline => annotate::toggle_inline_style(state, styles::UNDERLINE)?,
        EditorCommand::ToggleCode => annotate::toggle_inline_style(state, styles::CODE)?,
        EditorCommand::ToggleStrikethrough => {
            annotate::toggle_inline_style(state, styles::STRIKETHROUGH)?
        }
        EditorCommand::ToggleColor(color) => annotate::toggle_color(state, ctx.config, color)?,
        EditorCommand::HighlightOn => annotate::mark_highlight(state, ctx.config, true)?,
        EditorCommand::HighlightOff => annotate::mark_highlight(state, ctx.config, false)?,
        EditorCommand::ToggleBlockType(ty) => annotate::toggle_block_type(state, *ty)?,
        EditorCommand::ToggleAlignment(align) => annotate::toggle_alignment(state, align)?,
        EditorCommand::Indent => {
            annotate::indent(state, ctx.config, ctx.boundaries, ctx.converter, true)?
        }
        EditorCommand::Outdent => {
            annotate::indent(state, ctx.config, ctx.boundaries, ctx.converter, false)?
        }
        EditorCommand::SplitBlock => handle_return(state)?,
        EditorCommand::SoftNewline => insert_soft_newline(state)?,
        EditorCommand::AdjustListDepth { increase } => {
            let delta = if *increase { 1 } else { -1 };
            return annotate::adjust_list_depth(state, delta, ctx.config.max_list_depth);
        }
        EditorCommand::SetLink {
            url,
            target_blank,
            no_follow,
        } => annotate::set_link(state, url, *target_blank, *no_follow)?,
        EditorCommand::RemoveLink => annotate::remove_link(state)?,
        EditorCommand::InsertImage { src } => annotate::insert_image(state, src)?,
        EditorCommand::InsertSymbol(symbol) => annotate::insert_symbol(state, symbol)?,
        EditorCommand::InsertPoint => insert_point(state, ctx.config)?,
        EditorCommand::Undo => return Ok(state.undo()),
        EditorCommand::Redo => return Ok(state.redo()),
        EditorCommand::SyncInsert | EditorCommand::RequestAsyncInsert => return Ok(None),
    };
    Ok(Some(next))
}

/// Shift+Enter: a newline inside the current block.
///
/// A range is removed first and the newline takes the style of the
/// character at the start of what remains.
pub fn insert_soft_newline(state: &EditorState) -> Result<EditorState> {
    let sel = state.selection();
    if sel.is_collapsed() {
        let meta = CharMeta::new(state.current_inline_style(), None);
        let doc = state.document().replace_text(sel, "\n", &meta)?;
        return Ok(state.push(doc, ChangeType::InsertCharacters));
    }
    let removed = state.document().remove_range(sel)?;
    let caret = removed
        .selection_after()
        .cloned()
        .unwrap_or_else(|| sel.collapse_to_start());
    let style = removed
        .block(caret.start_key())
        .map(|b| b.style_at(caret.start_offset()))
        .unwrap_or_default();
    let doc = removed
        .replace_text(&caret, "\n", &CharMeta::new(style, None))?
        .with_selection_before(sel.clone());
    Ok(state.push(doc, ChangeType::InsertFragment))
}

/// Enter.
///
/// An empty list item steps out one level (or out of the list at depth
/// 0); the end of a special block continues with a plain paragraph;
/// anything else splits the block.
pub fn handle_return(state: &EditorState) -> Result<EditorState> {
    let sel = state.selection();
    let key = sel.start_key();
    let block = state
        .document()
        .block(key)
        .ok_or_else(|| EditorError::UnknownBlock(key.clone()))?;

    if sel.is_collapsed() {
        if block.block_type.is_list() && block.is_empty() {
            return if block.depth == 0 {
                let doc = state.document().set_block_type(sel, BlockType::Unstyled)?;
                Ok(state.push(doc, ChangeType::ChangeBlockType))
            } else {
                let doc = state.document().adjust_block_depth(sel, -1, block.depth)?;
                Ok(state.push(doc, ChangeType::AdjustDepth))
            };
        }
        let special = !block.block_type.is_list() && block.block_type != BlockType::Unstyled;
        if special && sel.start_offset() == block.len() {
            let doc = state
                .document()
                .insert_block_after(key, Block::new(BlockType::Unstyled, ""))?;
            return Ok(state.push(doc, ChangeType::SplitBlock));
        }
    }

    let doc = state.document().split_block(sel)?;
    Ok(state.push(doc, ChangeType::SplitBlock))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::markup::DefaultConverter;
    use crate::selection::SelectionState;

    fn ctx(config: &EditorConfig) -> CommandContext<'_> {
        CommandContext {
            config,
            boundaries: None,
            converter: &DefaultConverter,
        }
    }

    fn single(ty: BlockType, text: &str, depth: usize, offset: usize) -> EditorState {
        let block = Block::new(ty, text).with_depth(depth);
        let doc = Document::from_blocks(vec![block], Default::default());
        let key = doc.first_block().key.clone();
        EditorState::new(doc, 100).force_selection(SelectionState::collapsed(key, offset))
    }

    #[test]
    fn test_soft_newline_collapsed() {
        let state = single(BlockType::Unstyled, "ab", 0, 1);
        let next = insert_soft_newline(&state).unwrap();
        assert_eq!(next.document().first_block().text(), "a\nb");
        assert_eq!(next.document().block_count(), 1);
        assert_eq!(next.selection().start_offset(), 2);
    }

    #[test]
    fn test_soft_newline_replaces_range() {
        let state = single(BlockType::Unstyled, "abcd", 0, 0);
        let key = state.document().first_block().key.clone();
        let state = state.force_selection(SelectionState::in_block(key, 1, 3));
        let next = insert_soft_newline(&state).unwrap();
        assert_eq!(next.document().first_block().text(), "a\nd");
        assert_eq!(next.last_change_type(), Some(ChangeType::InsertFragment));
    }

    #[test]
    fn test_return_in_empty_list_item() {
        let nested = single(BlockType::UnorderedListItem, "", 1, 0);
        let next = handle_return(&nested).unwrap();
        let block = next.document().first_block();
        assert_eq!(block.depth, 0);
        assert_eq!(block.block_type, BlockType::UnorderedListItem);

        let next = handle_return(&next).unwrap();
        assert_eq!(next.document().first_block().block_type, BlockType::Unstyled);
        assert_eq!(next.document().block_count(), 1);
    }

    #[test]
    fn test_return_at_end_of_heading() {
        let state = single(BlockType::HeaderOne, "Title", 0, 5);
        let next = handle_return(&state).unwrap();
        let doc = next.document();
        assert_eq!(doc.block_count(), 2);
        assert_eq!(doc.last_block().block_type, BlockType::Unstyled);
        assert_eq!(next.selection().start_key(), &doc.last_block().key);
    }

    #[test]
    fn test_return_splits_block() {
        let state = single(BlockType::HeaderOne, "Title", 0, 2);
        let next = handle_return(&state).unwrap();
        let texts: Vec<&str> = next.document().blocks().map(|b| b.text()).collect();
        assert_eq!(texts, ["Ti", "tle"]);
        assert_eq!(next.document().last_block().block_type, BlockType::HeaderOne);
    }

    #[test]
    fn test_dispatch_tab_outside_list_is_not_handled() {
        let config = EditorConfig::default();
        let state = single(BlockType::Unstyled, "x", 0, 0);
        let result = execute_command(
            &state,
            &EditorCommand::AdjustListDepth { increase: true },
            &ctx(&config),
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_dispatch_undo_redo() {
        let config = EditorConfig::default();
        let state = single(BlockType::Unstyled, "x", 0, 1);
        assert!(execute_command(&state, &EditorCommand::Undo, &ctx(&config)).unwrap().is_none());
        let next = execute_command(&state, &EditorCommand::InsertPoint, &ctx(&config))
            .unwrap()
            .unwrap();
        assert_eq!(next.document().plain_text(), "x<||>");
        let undone = execute_command(&next, &EditorCommand::Undo, &ctx(&config))
            .unwrap()
            .unwrap();
        assert_eq!(undone.document().plain_text(), "x");
        let redone = execute_command(&undone, &EditorCommand::Redo, &ctx(&config))
            .unwrap()
            .unwrap();
        assert_eq!(redone.document().plain_text(), "x<||>");
    }

    #[test]
    fn test_dispatch_async_commands_are_left_alone() {
        let config = EditorConfig::default();
        let state = single(BlockType::Unstyled, "x", 0, 0);
        for command in [EditorCommand::SyncInsert, EditorCommand::RequestAsyncInsert] {
            assert!(execute_command(&state, &command, &ctx(&config)).unwrap().is_none());
        }
    }
}
