//! Core document types: keys, block types, entities and per-character metadata.
//!
//! These are plain values shared by every document snapshot. Keys are
//! process-unique and never reused, so a key from one snapshot stays
//! meaningful in every snapshot derived from it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use smol_str::{SmolStr, format_smolstr};

static NEXT_BLOCK_KEY: AtomicU64 = AtomicU64::new(1);
static NEXT_ENTITY_KEY: AtomicU64 = AtomicU64::new(1);

/// Identity of a block. Stable across edits unless the block is split or merged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockKey(SmolStr);

impl BlockKey {
    /// Wrap an existing key string.
    pub fn new(key: impl Into<SmolStr>) -> Self {
        Self(key.into())
    }

    /// Allocate a fresh, never-before-seen key.
    pub fn generate() -> Self {
        let n = NEXT_BLOCK_KEY.fetch_add(1, Ordering::Relaxed);
        Self(format_smolstr!("b{n:x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Identity of an entity in a document's entity table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey(u64);

impl EntityKey {
    /// Allocate a fresh key. Keys are never reused within a process.
    pub fn generate() -> Self {
        Self(NEXT_ENTITY_KEY.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Block kinds, named the way the host's block renderer expects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlockType {
    #[default]
    Unstyled,
    HeaderOne,
    HeaderTwo,
    HeaderThree,
    HeaderFour,
    HeaderFive,
    HeaderSix,
    UnorderedListItem,
    OrderedListItem,
    Blockquote,
    CodeBlock,
    Atomic,
}

impl BlockType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unstyled => "unstyled",
            Self::HeaderOne => "header-one",
            Self::HeaderTwo => "header-two",
            Self::HeaderThree => "header-three",
            Self::HeaderFour => "header-four",
            Self::HeaderFive => "header-five",
            Self::HeaderSix => "header-six",
            Self::UnorderedListItem => "unordered-list-item",
            Self::OrderedListItem => "ordered-list-item",
            Self::Blockquote => "blockquote",
            Self::CodeBlock => "code-block",
            Self::Atomic => "atomic",
        }
    }

    pub fn is_list(self) -> bool {
        matches!(self, Self::UnorderedListItem | Self::OrderedListItem)
    }

    /// Heading level 1-6, if this is a heading.
    pub fn heading_level(self) -> Option<usize> {
        match self {
            Self::HeaderOne => Some(1),
            Self::HeaderTwo => Some(2),
            Self::HeaderThree => Some(3),
            Self::HeaderFour => Some(4),
            Self::HeaderFive => Some(5),
            Self::HeaderSix => Some(6),
            _ => None,
        }
    }

    pub fn heading(level: usize) -> Self {
        match level {
            1 => Self::HeaderOne,
            2 => Self::HeaderTwo,
            3 => Self::HeaderThree,
            4 => Self::HeaderFour,
            5 => Self::HeaderFive,
            _ => Self::HeaderSix,
        }
    }
}

impl FromStr for BlockType {
    type Err = SmolStr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "unstyled" | "paragraph" => Self::Unstyled,
            "header-one" => Self::HeaderOne,
            "header-two" => Self::HeaderTwo,
            "header-three" => Self::HeaderThree,
            "header-four" => Self::HeaderFour,
            "header-five" => Self::HeaderFive,
            "header-six" => Self::HeaderSix,
            "unordered-list-item" => Self::UnorderedListItem,
            "ordered-list-item" => Self::OrderedListItem,
            "blockquote" => Self::Blockquote,
            "code-block" => Self::CodeBlock,
            "atomic" => Self::Atomic,
            other => return Err(SmolStr::new(other)),
        })
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity type tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityType {
    Link,
    Image,
    Span,
    Other(SmolStr),
}

impl EntityType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Link => "LINK",
            Self::Image => "IMAGE",
            Self::Span => "SPAN",
            Self::Other(name) => name,
        }
    }
}

/// How an entity's text behaves under editing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mutability {
    #[default]
    Mutable,
    Immutable,
    Segmented,
}

/// Entity payload fields.
pub type EntityData = BTreeMap<SmolStr, Value>;

/// A typed, keyed annotation attached to character ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub kind: EntityType,
    pub mutability: Mutability,
    pub data: EntityData,
}

impl Entity {
    pub fn new(kind: EntityType, mutability: Mutability) -> Self {
        Self {
            kind,
            mutability,
            data: EntityData::new(),
        }
    }

    /// Builder-style data setter.
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.data.insert(SmolStr::new(field), value.into());
        self
    }

    /// A mutable entity of `kind` carrying only a `className`.
    pub fn classed(kind: EntityType, class_name: &str) -> Self {
        Self::new(kind, Mutability::Mutable).with("className", class_name)
    }

    pub fn class_name(&self) -> Option<&str> {
        self.str_field("className")
    }

    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(Value::as_str)
    }

    pub fn is_mutable(&self) -> bool {
        self.mutability == Mutability::Mutable
    }
}

/// Inline style names used by the built-in toggles.
pub mod styles {
    pub const BOLD: &str = "BOLD";
    pub const ITALIC: &str = "ITALIC";
    pub const UNDERLINE: &str = "UNDERLINE";
    pub const CODE: &str = "CODE";
    pub const STRIKETHROUGH: &str = "STRIKETHROUGH";
}

/// Ordered set of inline style names.
pub type StyleSet = BTreeSet<SmolStr>;

/// Styles and entity carried by a single character.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CharMeta {
    pub styles: StyleSet,
    pub entity: Option<EntityKey>,
}

impl CharMeta {
    pub fn new(styles: StyleSet, entity: Option<EntityKey>) -> Self {
        Self { styles, entity }
    }

    pub fn has_style(&self, style: &str) -> bool {
        self.styles.contains(style)
    }
}

/// Kind of change that produced a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    InsertCharacters,
    InsertFragment,
    RemoveRange,
    SplitBlock,
    ChangeInlineStyle,
    ApplyEntity,
    ChangeBlockData,
    ChangeBlockType,
    AdjustDepth,
    Undo,
    Redo,
}

impl ChangeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InsertCharacters => "insert-characters",
            Self::InsertFragment => "insert-fragment",
            Self::RemoveRange => "remove-range",
            Self::SplitBlock => "split-block",
            Self::ChangeInlineStyle => "change-inline-style",
            Self::ApplyEntity => "apply-entity",
            Self::ChangeBlockData => "change-block-data",
            Self::ChangeBlockType => "change-block-type",
            Self::AdjustDepth => "adjust-depth",
            Self::Undo => "undo",
            Self::Redo => "redo",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_keys_are_unique() {
        let a = BlockKey::generate();
        let b = BlockKey::generate();
        assert_ne!(a, b);

        let e1 = EntityKey::generate();
        let e2 = EntityKey::generate();
        assert!(e2.get() > e1.get());
    }

    #[test]
    fn test_block_type_names() {
        for ty in [
            BlockType::Unstyled,
            BlockType::HeaderThree,
            BlockType::OrderedListItem,
            BlockType::CodeBlock,
        ] {
            assert_eq!(ty.as_str().parse::<BlockType>(), Ok(ty));
        }
        assert!("marquee".parse::<BlockType>().is_err());
        assert!(BlockType::UnorderedListItem.is_list());
        assert!(!BlockType::Blockquote.is_list());
    }

    #[test]
    fn test_entity_fields() {
        let e = Entity::classed(EntityType::Link, "red-dropdown_option").with("selected", true);
        assert_eq!(e.class_name(), Some("red-dropdown_option"));
        assert_eq!(e.data.get("selected"), Some(&Value::Bool(true)));
        assert!(e.is_mutable());
        assert_eq!(e.kind.as_str(), "LINK");
    }
}
