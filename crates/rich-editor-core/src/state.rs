//! Editor state: a document snapshot, the live selection and history.

use crate::document::Document;
use crate::selection::SelectionState;
use crate::types::{ChangeType, StyleSet};
use crate::undo::History;

/// Everything the host needs to render and continue editing.
///
/// Replaced wholesale on every change; handlers take `&EditorState` and
/// return a new one.
#[derive(Debug, Clone)]
pub struct EditorState {
    document: Document,
    selection: SelectionState,
    history: History,
    last_change: Option<ChangeType>,
    inline_style_override: Option<StyleSet>,
}

impl Default for EditorState {
    fn default() -> Self {
        Self::new(Document::new(), 100)
    }
}

impl EditorState {
    /// Fresh state with the caret at the start of `document`.
    pub fn new(document: Document, undo_limit: usize) -> Self {
        let selection = document
            .selection_after()
            .filter(|s| document.contains_selection(s))
            .cloned()
            .unwrap_or_else(|| document.selection_at_start());
        Self {
            document,
            selection,
            history: History::new(undo_limit),
            last_change: None,
            inline_style_override: None,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn last_change_type(&self) -> Option<ChangeType> {
        self.last_change
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn inline_style_override(&self) -> Option<&StyleSet> {
        self.inline_style_override.as_ref()
    }

    /// Publish `document` as the result of an edit.
    ///
    /// The previous document goes on the undo stack, redo is cleared, any
    /// pending style override is dropped and the selection moves to the
    /// document's `selection_after`.
    pub fn push(&self, document: Document, change: ChangeType) -> EditorState {
        let mut history = self.history.clone();
        history.record(self.document.clone());
        let selection = document
            .selection_after()
            .filter(|s| document.contains_selection(s))
            .cloned()
            .unwrap_or_else(|| self.selection.clone());
        EditorState {
            document,
            selection,
            history,
            last_change: Some(change),
            inline_style_override: None,
        }
    }

    /// Swap in `document` without recording history.
    ///
    /// For derived changes that belong to the edit just pushed, such as
    /// re-imported markup or image selection flags.
    pub fn with_document(&self, document: Document) -> EditorState {
        let selection = document
            .selection_after()
            .filter(|s| document.contains_selection(s))
            .cloned()
            .or_else(|| {
                document
                    .contains_selection(&self.selection)
                    .then(|| self.selection.clone())
            })
            .unwrap_or_else(|| document.selection_at_end());
        EditorState {
            document,
            selection,
            ..self.clone()
        }
    }

    /// Restore the previous document, selecting what was selected before the
    /// undone change.
    pub fn undo(&self) -> Option<EditorState> {
        let mut history = self.history.clone();
        let previous = history.undo(self.document.clone())?;
        let selection = self
            .document
            .selection_before()
            .filter(|s| previous.contains_selection(s))
            .cloned()
            .unwrap_or_else(|| previous.selection_at_end());
        Some(EditorState {
            document: previous,
            selection,
            history,
            last_change: Some(ChangeType::Undo),
            inline_style_override: None,
        })
    }

    /// Re-apply the last undone document.
    pub fn redo(&self) -> Option<EditorState> {
        let mut history = self.history.clone();
        let next = history.redo(self.document.clone())?;
        let selection = next
            .selection_after()
            .filter(|s| next.contains_selection(s))
            .cloned()
            .unwrap_or_else(|| next.selection_at_end());
        Some(EditorState {
            document: next,
            selection,
            history,
            last_change: Some(ChangeType::Redo),
            inline_style_override: None,
        })
    }

    /// Replace the selection and ask the host to re-render it.
    pub fn force_selection(&self, selection: SelectionState) -> EditorState {
        self.accept_selection(selection)
    }

    /// Replace the selection as reported by the host.
    ///
    /// Moving the caret drops any pending style override.
    pub fn accept_selection(&self, selection: SelectionState) -> EditorState {
        let override_kept = if selection == self.selection {
            self.inline_style_override.clone()
        } else {
            None
        };
        EditorState {
            document: self.document.clone(),
            selection,
            history: self.history.clone(),
            last_change: self.last_change,
            inline_style_override: override_kept,
        }
    }

    /// Styles pending for the next typed character.
    pub fn set_inline_style_override(&self, styles: StyleSet) -> EditorState {
        EditorState {
            inline_style_override: Some(styles),
            ..self.clone()
        }
    }

    /// Styles that text typed or pasted now would carry.
    ///
    /// A pending override wins. Otherwise a caret takes the style of the
    /// character before it, and a range takes the style just inside its
    /// start; empty positions look upward to the nearest character.
    pub fn current_inline_style(&self) -> StyleSet {
        if let Some(styles) = &self.inline_style_override {
            return styles.clone();
        }
        let sel = &self.selection;
        let Some(block) = self.document.block(sel.start_key()) else {
            return StyleSet::new();
        };
        let offset = sel.start_offset();
        if sel.is_collapsed() {
            if offset > 0 {
                return block.style_at(offset - 1);
            }
            if !block.is_empty() {
                return block.style_at(0);
            }
        } else {
            if offset < block.len() {
                return block.style_at(offset);
            }
            if offset > 0 {
                return block.style_at(offset - 1);
            }
        }
        self.look_upward_for_style()
    }

    fn look_upward_for_style(&self) -> StyleSet {
        let Some(idx) = self.document.block_index(self.selection.start_key()) else {
            return StyleSet::new();
        };
        self.document
            .blocks()
            .take(idx)
            .rev()
            .find(|b| !b.is_empty())
            .map(|b| b.style_at(b.len() - 1))
            .unwrap_or_default()
    }
}
