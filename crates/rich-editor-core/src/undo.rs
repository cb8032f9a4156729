//! Snapshot-based undo/redo history.
//!
//! Documents are immutable and share structure, so history is just two
//! bounded stacks of earlier snapshots.

use crate::document::Document;

/// Undo and redo stacks of document snapshots.
#[derive(Debug, Clone)]
pub struct History {
    undo_stack: Vec<Document>,
    redo_stack: Vec<Document>,
    max_steps: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(100)
    }
}

impl History {
    pub fn new(max_steps: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_steps,
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Record `previous` as the state to return to. Clears redo.
    pub fn record(&mut self, previous: Document) {
        self.redo_stack.clear();
        self.undo_stack.push(previous);
        Self::trim(&mut self.undo_stack, self.max_steps);
    }

    /// Step back: returns the snapshot to restore, parking `current` on redo.
    pub fn undo(&mut self, current: Document) -> Option<Document> {
        let previous = self.undo_stack.pop()?;
        self.redo_stack.push(current);
        Self::trim(&mut self.redo_stack, self.max_steps);
        Some(previous)
    }

    /// Step forward: returns the snapshot to restore, parking `current` on undo.
    pub fn redo(&mut self, current: Document) -> Option<Document> {
        let next = self.redo_stack.pop()?;
        self.undo_stack.push(current);
        Self::trim(&mut self.undo_stack, self.max_steps);
        Some(next)
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    fn trim(stack: &mut Vec<Document>, max: usize) {
        if stack.len() > max {
            let excess = stack.len() - max;
            stack.drain(..excess);
        }
    }
}
