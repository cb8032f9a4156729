//! Block-addressed selections.

use crate::types::BlockKey;

/// A position inside the document: a block and a character offset within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Point {
    pub key: BlockKey,
    pub offset: usize,
}

impl Point {
    pub fn new(key: BlockKey, offset: usize) -> Self {
        Self { key, offset }
    }
}

/// Text selection with anchor and focus points.
///
/// The anchor is where the selection started, the focus is where the cursor
/// is now. `is_backward` records whether the focus precedes the anchor in
/// document order, so `start()`/`end()` can resolve without the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionState {
    pub anchor: Point,
    pub focus: Point,
    pub is_backward: bool,
    pub has_focus: bool,
}

impl SelectionState {
    /// A forward selection from anchor to focus.
    pub fn new(anchor: Point, focus: Point) -> Self {
        Self {
            anchor,
            focus,
            is_backward: false,
            has_focus: true,
        }
    }

    /// A caret at `offset` in block `key`.
    pub fn collapsed(key: BlockKey, offset: usize) -> Self {
        let p = Point::new(key, offset);
        Self::new(p.clone(), p)
    }

    /// Selection inside a single block; orientation follows the offsets.
    pub fn in_block(key: BlockKey, anchor: usize, focus: usize) -> Self {
        Self {
            anchor: Point::new(key.clone(), anchor),
            focus: Point::new(key, focus),
            is_backward: focus < anchor,
            has_focus: true,
        }
    }

    pub fn with_backward(mut self, is_backward: bool) -> Self {
        self.is_backward = is_backward;
        self
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    /// Earlier point in document order.
    pub fn start(&self) -> &Point {
        if self.is_backward {
            &self.focus
        } else {
            &self.anchor
        }
    }

    /// Later point in document order.
    pub fn end(&self) -> &Point {
        if self.is_backward {
            &self.anchor
        } else {
            &self.focus
        }
    }

    pub fn start_key(&self) -> &BlockKey {
        &self.start().key
    }

    pub fn end_key(&self) -> &BlockKey {
        &self.end().key
    }

    pub fn start_offset(&self) -> usize {
        self.start().offset
    }

    pub fn end_offset(&self) -> usize {
        self.end().offset
    }

    pub fn is_single_block(&self) -> bool {
        self.anchor.key == self.focus.key
    }

    /// Rebuild from ordered start/end, keeping this selection's orientation.
    pub fn with_bounds(&self, start: Point, end: Point) -> Self {
        let (anchor, focus) = if self.is_backward {
            (end, start)
        } else {
            (start, end)
        };
        Self {
            anchor,
            focus,
            is_backward: self.is_backward,
            has_focus: self.has_focus,
        }
    }

    /// Caret at the start of this selection.
    pub fn collapse_to_start(&self) -> Self {
        let p = self.start().clone();
        Self {
            anchor: p.clone(),
            focus: p,
            is_backward: false,
            has_focus: self.has_focus,
        }
    }

    /// Caret at the end of this selection.
    pub fn collapse_to_end(&self) -> Self {
        let p = self.end().clone();
        Self {
            anchor: p.clone(),
            focus: p,
            is_backward: false,
            has_focus: self.has_focus,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_end_resolve_through_orientation() {
        let key = BlockKey::new("a");
        let sel = SelectionState::in_block(key.clone(), 7, 2);
        assert!(sel.is_backward);
        assert_eq!(sel.start_offset(), 2);
        assert_eq!(sel.end_offset(), 7);

        let fwd = SelectionState::in_block(key, 2, 7);
        assert!(!fwd.is_backward);
        assert_eq!(fwd.start_offset(), 2);
        assert_eq!(fwd.end_offset(), 7);
    }

    #[test]
    fn test_with_bounds_keeps_orientation() {
        let key = BlockKey::new("a");
        let sel = SelectionState::in_block(key.clone(), 5, 3);
        let wider = sel.with_bounds(Point::new(key.clone(), 0), Point::new(key, 9));
        assert!(wider.is_backward);
        assert_eq!(wider.anchor.offset, 9);
        assert_eq!(wider.focus.offset, 0);
    }

    #[test]
    fn test_collapsed() {
        let sel = SelectionState::collapsed(BlockKey::new("a"), 4);
        assert!(sel.is_collapsed());
        assert!(sel.is_single_block());
    }
}
