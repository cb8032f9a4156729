//! Word-boundary resolution.
//!
//! Whitespace-delimited word snapping used before formatting and before
//! external token lookups. A "word" here is any run of non-whitespace
//! characters; punctuation is part of the word.

use crate::document::Document;
use crate::error::{EditorError, Result};
use crate::selection::{Point, SelectionState};

fn is_ws_at(chars: &[char], idx: usize) -> bool {
    chars.get(idx).is_some_and(|c| c.is_whitespace())
}

/// Walk `offset` back to the start of the word it sits after.
///
/// No-op when the character before `offset` is whitespace or `offset` is 0.
pub fn extend_backward_to_word_start(offset: usize, text: &str) -> usize {
    let chars: Vec<char> = text.chars().collect();
    let mut pos = offset.min(chars.len());
    while pos > 0 && !chars[pos - 1].is_whitespace() {
        pos -= 1;
    }
    pos
}

/// Walk `offset` forward to the end of the word it sits before.
///
/// No-op when the character at `offset` is whitespace or `offset` is the end.
pub fn extend_forward_to_word_end(offset: usize, text: &str) -> usize {
    let chars: Vec<char> = text.chars().collect();
    let mut pos = offset.min(chars.len());
    while pos < chars.len() && !chars[pos].is_whitespace() {
        pos += 1;
    }
    pos
}

/// Whether a zero-width selection sits on a clean boundary.
///
/// True only for identical texts and equal offsets where the characters on
/// either side of the offset are both whitespace or both non-whitespace. A
/// missing neighbour (offset at 0 or at the end) counts as non-whitespace.
pub fn is_ambiguous_zero_width_selection(
    focus_offset: usize,
    anchor_offset: usize,
    start_text: &str,
    end_text: &str,
) -> bool {
    if start_text != end_text || focus_offset != anchor_offset {
        return false;
    }
    let chars: Vec<char> = start_text.chars().collect();
    let offset = focus_offset;
    let before = offset > 0 && is_ws_at(&chars, offset - 1);
    let after = is_ws_at(&chars, offset);
    before == after
}

/// Snap both ends of `selection` outward to whole words.
///
/// A collapsed selection is returned unchanged. Backward and single-block
/// selections keep their orientation. A forward selection spanning blocks
/// comes back with anchor and focus swapped and `is_backward` set; the
/// covered range is the same either way.
pub fn expand_selection_to_whole_words(
    selection: &SelectionState,
    doc: &Document,
) -> Result<SelectionState> {
    if selection.is_collapsed() {
        return Ok(selection.clone());
    }

    let (start, end) = snap_points(selection, doc)?;

    if selection.is_backward || selection.is_single_block() {
        return Ok(selection.with_bounds(start, end));
    }

    Ok(SelectionState {
        anchor: end,
        focus: start,
        is_backward: true,
        has_focus: selection.has_focus,
    })
}

/// Snapped (start, end) points for a selection: the earlier endpoint moved
/// back to its word start, the later one forward to its word end, each
/// against its own block's text.
pub fn snap_points(selection: &SelectionState, doc: &Document) -> Result<(Point, Point)> {
    let start = selection.start();
    let end = selection.end();
    let start_block = doc
        .block(&start.key)
        .ok_or_else(|| EditorError::UnknownBlock(start.key.clone()))?;
    let end_block = doc
        .block(&end.key)
        .ok_or_else(|| EditorError::UnknownBlock(end.key.clone()))?;

    let start_offset = extend_backward_to_word_start(start.offset, start_block.text());
    let end_offset = extend_forward_to_word_end(end.offset, end_block.text());
    Ok((
        Point::new(start.key.clone(), start_offset),
        Point::new(end.key.clone(), end_offset),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BlockKey;

    #[test]
    fn test_extend_backward() {
        let text = "hello world test";
        assert_eq!(extend_backward_to_word_start(3, text), 0);
        assert_eq!(extend_backward_to_word_start(5, text), 0);
        assert_eq!(extend_backward_to_word_start(6, text), 6); // after space
        assert_eq!(extend_backward_to_word_start(9, text), 6);
        assert_eq!(extend_backward_to_word_start(16, text), 12);
        assert_eq!(extend_backward_to_word_start(0, text), 0);
    }

    #[test]
    fn test_extend_forward() {
        let text = "hello world test";
        assert_eq!(extend_forward_to_word_end(0, text), 5);
        assert_eq!(extend_forward_to_word_end(3, text), 5);
        assert_eq!(extend_forward_to_word_end(5, text), 5); // on space
        assert_eq!(extend_forward_to_word_end(6, text), 11);
        assert_eq!(extend_forward_to_word_end(16, text), 16);
    }

    #[test]
    fn test_punctuation_is_part_of_word() {
        let text = "say (hello), ok";
        assert_eq!(extend_backward_to_word_start(7, text), 4);
        assert_eq!(extend_forward_to_word_end(7, text), 12);
    }

    #[test]
    fn test_extend_is_idempotent() {
        let text = "one two  three";
        for o in 0..=text.len() {
            let once = extend_backward_to_word_start(o, text);
            assert_eq!(extend_backward_to_word_start(once, text), once);
            let once = extend_forward_to_word_end(o, text);
            assert_eq!(extend_forward_to_word_end(once, text), once);
        }
    }

    #[test]
    fn test_ambiguous_zero_width() {
        let text = "hello world";
        // Space after, letter before.
        assert!(!is_ambiguous_zero_width_selection(5, 5, text, text));
        // Mid-word: letters on both sides.
        assert!(is_ambiguous_zero_width_selection(3, 3, text, text));
        // Two spaces.
        assert!(is_ambiguous_zero_width_selection(2, 2, "a  b", "a  b"));
        // Leading space: missing neighbour counts as non-whitespace.
        assert!(!is_ambiguous_zero_width_selection(0, 0, " x", " x"));
        assert!(is_ambiguous_zero_width_selection(0, 0, "", ""));
        // Different texts or offsets.
        assert!(!is_ambiguous_zero_width_selection(3, 3, text, "other"));
        assert!(!is_ambiguous_zero_width_selection(3, 4, text, text));
    }

    #[test]
    fn test_expand_collapsed_unchanged() {
        let doc = Document::from_text("hello world");
        let key = doc.first_block().key.clone();
        let sel = SelectionState::collapsed(key, 3);
        assert_eq!(expand_selection_to_whole_words(&sel, &doc).unwrap(), sel);
    }

    #[test]
    fn test_expand_single_block_forward_and_backward() {
        let doc = Document::from_text("hello brave world");
        let key = doc.first_block().key.clone();

        let fwd = SelectionState::in_block(key.clone(), 2, 8);
        let out = expand_selection_to_whole_words(&fwd, &doc).unwrap();
        assert!(!out.is_backward);
        assert_eq!((out.anchor.offset, out.focus.offset), (0, 11));
        assert_eq!(expand_selection_to_whole_words(&out, &doc).unwrap(), out);

        let back = SelectionState::in_block(key, 8, 2);
        let out = expand_selection_to_whole_words(&back, &doc).unwrap();
        assert!(out.is_backward);
        assert_eq!((out.anchor.offset, out.focus.offset), (11, 0));
        assert_eq!(expand_selection_to_whole_words(&out, &doc).unwrap(), out);
    }

    #[test]
    fn test_expand_is_idempotent_for_every_range() {
        let text = " one two  three ";
        let doc = Document::from_text(text);
        let key = doc.first_block().key.clone();
        for anchor in 0..=text.len() {
            for focus in 0..=text.len() {
                let sel = SelectionState::in_block(key.clone(), anchor, focus);
                let once = expand_selection_to_whole_words(&sel, &doc).unwrap();
                assert_eq!(
                    expand_selection_to_whole_words(&once, &doc).unwrap(),
                    once,
                    "anchor {anchor} focus {focus}"
                );
            }
        }
    }

    #[test]
    fn test_expand_forward_cross_block_swaps_roles() {
        let doc = Document::from_text("alpha beta\ngamma delta");
        let k0 = doc.first_block().key.clone();
        let k1 = doc.last_block().key.clone();
        let sel = SelectionState::new(Point::new(k0.clone(), 8), Point::new(k1.clone(), 2));

        let out = expand_selection_to_whole_words(&sel, &doc).unwrap();
        assert!(out.is_backward);
        assert_eq!(out.anchor, Point::new(k1, 5));
        assert_eq!(out.focus, Point::new(k0, 6));
        assert_eq!(out.start_offset(), 6);
        assert_eq!(out.end_offset(), 5);

        // Second application changes nothing.
        assert_eq!(expand_selection_to_whole_words(&out, &doc).unwrap(), out);
    }

    #[test]
    fn test_expand_unknown_block() {
        let doc = Document::from_text("x");
        let sel = SelectionState::in_block(BlockKey::new("missing"), 0, 1);
        assert!(expand_selection_to_whole_words(&sel, &doc).is_err());
    }
}
