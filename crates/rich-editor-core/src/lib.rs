//! rich-editor-core: rich-text document model with selection and paste
//! reconciliation, free of any UI framework.
//!
//! This crate provides:
//! - `Document` / `EditorState` - immutable snapshots with undo history
//! - word-boundary snapping for formatting and external inserts
//! - entity-based annotations with mutually exclusive families
//! - a multi-strategy paste pipeline with async validation hooks
//! - `Editor` - per-instance owner tying it together behind key bindings

pub mod actions;
pub mod annotate;
pub mod boundary;
pub mod clipboard;
pub mod config;
pub mod document;
pub mod editor;
pub mod error;
pub mod execute;
pub mod insertion;
pub mod markup;
pub mod paste;
pub mod selection;
pub mod state;
pub mod style_fn;
pub mod types;
pub mod undo;

pub use actions::{EditorCommand, Key, KeyBindings, KeyCombo, KeydownResult, Modifiers};
pub use clipboard::ClipboardPayload;
pub use config::{EditorConfig, IndentBoundaries, IndentBoundaryPatterns};
pub use document::{Block, BlockData, Document, Fragment};
pub use editor::{ApplyOutcome, Editor, EditorHooks, PendingChange, PendingKind};
pub use error::{ConfigError, EditorError, HookError, Result};
pub use execute::{CommandContext, execute_command};
pub use insertion::{InsertOutcome, InsertRequest, Resolver};
pub use markup::{DefaultConverter, ExportOptions, ImportOptions, MarkupConverter, MarkupFormat};
pub use paste::{
    PasteHooks, PasteOutcome, PasteResult, PasteSource, PreHandler, ValidationRequest, Validator,
};
pub use selection::{Point, SelectionState};
pub use smol_str::SmolStr;
pub use state::EditorState;
pub use style_fn::{BlockStyleFn, compose};
pub use types::{
    BlockKey, BlockType, ChangeType, CharMeta, Entity, EntityData, EntityKey, EntityType,
    Mutability, StyleSet, styles,
};
