//! Error types for document operations, configuration and host hooks.

use thiserror::Error;

use crate::types::{BlockKey, EntityKey};

/// Errors raised by document model and markup operations.
///
/// These never escape the public editor surface: handlers log them and
/// abort the operation, leaving the previous state in place.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EditorError {
    /// A selection or operation named a block that isn't in the document.
    #[error("unknown block key: {0}")]
    UnknownBlock(BlockKey),

    /// An offset fell outside `[0, block length]`.
    #[error("offset {offset} out of range for block {key} (length {len})")]
    OffsetOutOfRange {
        key: BlockKey,
        offset: usize,
        len: usize,
    },

    /// A character or operation referenced an entity missing from the table.
    #[error("unknown entity key: {0}")]
    UnknownEntity(EntityKey),

    /// Markup could not be converted into blocks.
    #[error("failed to parse markup: {0}")]
    Parse(String),

    /// Markup could not be written.
    #[error("failed to render markup: {0}")]
    Render(String),

    /// The document has no blocks to operate on.
    #[error("document is empty")]
    EmptyDocument,
}

impl From<std::fmt::Error> for EditorError {
    fn from(e: std::fmt::Error) -> Self {
        EditorError::Render(e.to_string())
    }
}

/// Errors raised while loading or compiling configuration.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// Configuration JSON was malformed.
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// An indent boundary pattern failed to compile.
    #[error("invalid indent boundary pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Failure reported by a host-supplied asynchronous hook.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HookError {
    /// The hook's backend refused the request.
    #[error("hook rejected the request: {0}")]
    Rejected(String),

    /// The hook could not reach its backend.
    #[error("hook transport failed: {0}")]
    Transport(String),
}

pub type Result<T, E = EditorError> = std::result::Result<T, E>;
