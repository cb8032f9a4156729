//! Immutable rich-text document snapshots.
//!
//! A `Document` is an ordered list of blocks plus an entity table. Every
//! operation returns a new `Document`; blocks and the entity table are
//! shared between snapshots through `Arc` and copied on write.
//!
//! All offsets are character offsets (Unicode scalar values), never bytes.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::Value;
use smol_str::SmolStr;

use crate::error::{EditorError, Result};
use crate::selection::{Point, SelectionState};
use crate::types::{BlockKey, BlockType, CharMeta, Entity, EntityData, EntityKey, StyleSet};

/// Per-block metadata (alignment and friends).
pub type BlockData = BTreeMap<SmolStr, Value>;

/// One paragraph, heading or list item.
///
/// `chars` always holds exactly one entry per character of `text`.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub key: BlockKey,
    pub block_type: BlockType,
    text: String,
    chars: Vec<CharMeta>,
    pub depth: usize,
    pub data: BlockData,
}

impl Block {
    /// An unstyled block of plain characters with a fresh key.
    pub fn new(block_type: BlockType, text: &str) -> Self {
        Self::styled(block_type, text, CharMeta::default())
    }

    /// A block whose every character carries `meta`.
    pub fn styled(block_type: BlockType, text: &str, meta: CharMeta) -> Self {
        let chars = vec![meta; text.chars().count()];
        Self {
            key: BlockKey::generate(),
            block_type,
            text: text.to_string(),
            chars,
            depth: 0,
            data: BlockData::new(),
        }
    }

    /// Build from text and matching per-character metadata.
    pub fn from_parts(block_type: BlockType, text: String, chars: Vec<CharMeta>) -> Result<Self> {
        let len = text.chars().count();
        if chars.len() != len {
            return Err(EditorError::Parse(format!(
                "{} character entries for {} characters",
                chars.len(),
                len
            )));
        }
        Ok(Self {
            key: BlockKey::generate(),
            block_type,
            text,
            chars,
            depth: 0,
            data: BlockData::new(),
        })
    }

    pub fn with_key(mut self, key: BlockKey) -> Self {
        self.key = key;
        self
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_data(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.data.insert(SmolStr::new(field), value.into());
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn chars(&self) -> &[CharMeta] {
        &self.chars
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn char_at(&self, offset: usize) -> Option<char> {
        self.text.chars().nth(offset)
    }

    pub fn style_at(&self, offset: usize) -> StyleSet {
        self.chars
            .get(offset)
            .map(|m| m.styles.clone())
            .unwrap_or_default()
    }

    pub fn entity_at(&self, offset: usize) -> Option<EntityKey> {
        self.chars.get(offset).and_then(|m| m.entity)
    }

    pub fn data_str(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(Value::as_str)
    }

    /// Text between two character offsets.
    pub fn slice_text(&self, start: usize, end: usize) -> String {
        self.text
            .chars()
            .skip(start)
            .take(end.saturating_sub(start))
            .collect()
    }

    /// Contiguous range of characters around `offset` carrying `entity`.
    pub fn entity_range(&self, entity: EntityKey, offset: usize) -> Option<(usize, usize)> {
        if self.entity_at(offset) != Some(entity) {
            return None;
        }
        let mut start = offset;
        while start > 0 && self.entity_at(start - 1) == Some(entity) {
            start -= 1;
        }
        let mut end = offset;
        while end < self.len() && self.entity_at(end) == Some(entity) {
            end += 1;
        }
        Some((start, end))
    }

    fn byte_at(&self, offset: usize) -> usize {
        self.text
            .char_indices()
            .nth(offset)
            .map(|(b, _)| b)
            .unwrap_or(self.text.len())
    }

    fn splice(&mut self, start: usize, end: usize, text: &str, chars: Vec<CharMeta>) {
        let (bs, be) = (self.byte_at(start), self.byte_at(end));
        self.text.replace_range(bs..be, text);
        self.chars.splice(start..end, chars);
    }

    fn split_off(&mut self, offset: usize) -> (String, Vec<CharMeta>) {
        let b = self.byte_at(offset);
        let text = self.text.split_off(b);
        let chars = self.chars.split_off(offset);
        (text, chars)
    }

    fn append(&mut self, text: &str, chars: Vec<CharMeta>) {
        self.text.push_str(text);
        self.chars.extend(chars);
    }

    fn slice(&self, start: usize, end: usize) -> Block {
        Block {
            key: self.key.clone(),
            block_type: self.block_type,
            text: self.slice_text(start, end),
            chars: self.chars[start..end].to_vec(),
            depth: self.depth,
            data: self.data.clone(),
        }
    }

    fn adopt_shape(&mut self, other: &Block) {
        self.block_type = other.block_type;
        self.depth = other.depth;
        self.data = other.data.clone();
    }
}

/// Detached blocks plus the entities they reference.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fragment {
    pub blocks: Vec<Block>,
    pub entities: BTreeMap<EntityKey, Entity>,
}

impl Fragment {
    pub fn new(blocks: Vec<Block>, entities: BTreeMap<EntityKey, Entity>) -> Self {
        Self { blocks, entities }
    }

    /// One unstyled block per line, every character carrying `meta`.
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>, meta: &CharMeta) -> Self {
        let blocks = lines
            .into_iter()
            .map(|line| Block::styled(BlockType::Unstyled, line, meta.clone()))
            .collect();
        Self {
            blocks,
            entities: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block_texts(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().map(Block::text)
    }
}

impl From<Document> for Fragment {
    fn from(doc: Document) -> Self {
        Self {
            blocks: doc.blocks.iter().map(|b| (**b).clone()).collect(),
            entities: (*doc.entities).clone(),
        }
    }
}

/// Resolved selection bounds in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start_idx: usize,
    start_off: usize,
    end_idx: usize,
    end_off: usize,
}

impl Span {
    fn bounds_in(&self, idx: usize, len: usize) -> (usize, usize) {
        let from = if idx == self.start_idx { self.start_off } else { 0 };
        let to = if idx == self.end_idx { self.end_off } else { len };
        (from, to)
    }
}

/// Immutable document snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    blocks: Vec<Arc<Block>>,
    entities: Arc<BTreeMap<EntityKey, Entity>>,
    selection_before: Option<SelectionState>,
    selection_after: Option<SelectionState>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// A document with a single empty unstyled block.
    pub fn new() -> Self {
        Self::from_blocks(Vec::new(), BTreeMap::new())
    }

    /// Build from blocks and their entity table. An empty block list yields
    /// a single empty unstyled block so there is always somewhere to type.
    pub fn from_blocks(blocks: Vec<Block>, entities: BTreeMap<EntityKey, Entity>) -> Self {
        let mut blocks: Vec<Arc<Block>> = blocks.into_iter().map(Arc::new).collect();
        if blocks.is_empty() {
            blocks.push(Arc::new(Block::new(BlockType::Unstyled, "")));
        }
        Self {
            blocks,
            entities: Arc::new(entities),
            selection_before: None,
            selection_after: None,
        }
    }

    /// One unstyled block per line of `text`.
    pub fn from_text(text: &str) -> Self {
        let blocks = text
            .split('\n')
            .map(|line| Block::new(BlockType::Unstyled, line))
            .collect();
        Self::from_blocks(blocks, BTreeMap::new())
    }

    // === Queries ===

    pub fn blocks(&self) -> impl DoubleEndedIterator<Item = &Block> + ExactSizeIterator {
        self.blocks.iter().map(|b| &**b)
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn block(&self, key: &BlockKey) -> Option<&Block> {
        self.blocks.iter().find(|b| &b.key == key).map(|b| &**b)
    }

    pub fn block_index(&self, key: &BlockKey) -> Option<usize> {
        self.blocks.iter().position(|b| &b.key == key)
    }

    pub fn first_block(&self) -> &Block {
        &self.blocks[0]
    }

    pub fn last_block(&self) -> &Block {
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn block_after(&self, key: &BlockKey) -> Option<&Block> {
        let idx = self.block_index(key)?;
        self.blocks.get(idx + 1).map(|b| &**b)
    }

    pub fn entity(&self, key: EntityKey) -> Option<&Entity> {
        self.entities.get(&key)
    }

    pub fn entities(&self) -> &BTreeMap<EntityKey, Entity> {
        &self.entities
    }

    pub fn selection_before(&self) -> Option<&SelectionState> {
        self.selection_before.as_ref()
    }

    pub fn selection_after(&self) -> Option<&SelectionState> {
        self.selection_after.as_ref()
    }

    pub fn with_selection_after(mut self, selection: SelectionState) -> Self {
        self.selection_after = Some(selection);
        self
    }

    pub fn with_selection_before(mut self, selection: SelectionState) -> Self {
        self.selection_before = Some(selection);
        self
    }

    /// Block texts joined with newlines.
    pub fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Same blocks and entities, ignoring the recorded selections.
    pub fn same_content(&self, other: &Document) -> bool {
        self.blocks == other.blocks && self.entities == other.entities
    }

    /// Caret at the very start of the document.
    pub fn selection_at_start(&self) -> SelectionState {
        SelectionState::collapsed(self.first_block().key.clone(), 0)
    }

    /// Caret at the very end of the document.
    pub fn selection_at_end(&self) -> SelectionState {
        let last = self.last_block();
        SelectionState::collapsed(last.key.clone(), last.len())
    }

    /// Whether both selection points name existing blocks at valid offsets.
    pub fn contains_selection(&self, sel: &SelectionState) -> bool {
        self.span(sel).is_ok()
    }

    /// Blocks touched by the selection, in document order.
    pub fn blocks_in_selection(&self, sel: &SelectionState) -> Result<Vec<&Block>> {
        let span = self.span(sel)?;
        Ok(self.blocks[span.start_idx..=span.end_idx]
            .iter()
            .map(|b| &**b)
            .collect())
    }

    /// Text covered by the selection, blocks joined with `\n`.
    pub fn text_in_selection(&self, sel: &SelectionState) -> Result<String> {
        let span = self.span(sel)?;
        let parts: Vec<String> = (span.start_idx..=span.end_idx)
            .map(|i| {
                let b = &self.blocks[i];
                let (from, to) = span.bounds_in(i, b.len());
                b.slice_text(from, to)
            })
            .collect();
        Ok(parts.join("\n"))
    }

    /// Entity to carry into text typed or pasted at `sel`.
    ///
    /// Only mutable entities continue: a caret continues the entity only when
    /// the characters on both sides carry it; a range continues the entity at
    /// its start.
    pub fn entity_key_for_selection(&self, sel: &SelectionState) -> Option<EntityKey> {
        let key = if sel.is_collapsed() {
            let block = self.block(&sel.anchor.key)?;
            let offset = sel.anchor.offset;
            if offset == 0 {
                return None;
            }
            let before = block.entity_at(offset - 1);
            if before != block.entity_at(offset) {
                return None;
            }
            before?
        } else {
            let block = self.block(sel.start_key())?;
            let offset = sel.start_offset();
            if offset == block.len() {
                return None;
            }
            block.entity_at(offset)?
        };
        self.entity(key).filter(|e| e.is_mutable()).map(|_| key)
    }

    /// Extract the selected content as a detached fragment.
    pub fn fragment(&self, sel: &SelectionState) -> Result<Fragment> {
        let span = self.span(sel)?;
        let blocks: Vec<Block> = (span.start_idx..=span.end_idx)
            .map(|i| {
                let b = &self.blocks[i];
                let (from, to) = span.bounds_in(i, b.len());
                b.slice(from, to)
            })
            .collect();
        let referenced: BTreeSet<EntityKey> = blocks
            .iter()
            .flat_map(|b| b.chars.iter().filter_map(|m| m.entity))
            .collect();
        let entities = referenced
            .into_iter()
            .filter_map(|k| self.entities.get(&k).map(|e| (k, e.clone())))
            .collect();
        Ok(Fragment { blocks, entities })
    }

    // === Text edits ===

    /// Delete the selected range, joining the outer blocks.
    pub fn remove_range(&self, sel: &SelectionState) -> Result<Document> {
        let span = self.span(sel)?;
        let mut blocks = self.blocks.clone();
        if span.start_idx == span.end_idx {
            Arc::make_mut(&mut blocks[span.start_idx]).splice(
                span.start_off,
                span.end_off,
                "",
                Vec::new(),
            );
        } else {
            let end_block = &self.blocks[span.end_idx];
            let tail_text = end_block.slice_text(span.end_off, end_block.len());
            let tail_chars = end_block.chars[span.end_off..].to_vec();
            let head = Arc::make_mut(&mut blocks[span.start_idx]);
            head.split_off(span.start_off);
            head.append(&tail_text, tail_chars);
            blocks.drain(span.start_idx + 1..=span.end_idx);
        }
        let caret = SelectionState::collapsed(self.blocks[span.start_idx].key.clone(), span.start_off);
        Ok(self.derive(blocks, self.entities.clone(), sel, caret))
    }

    /// Replace the selected range with `text`, every character carrying `meta`.
    ///
    /// `text` is inserted inline; newlines become soft line breaks inside the
    /// block.
    pub fn replace_text(&self, sel: &SelectionState, text: &str, meta: &CharMeta) -> Result<Document> {
        let span = self.span(sel)?;
        let removed = self.remove_range(sel)?;
        let idx = span.start_idx;
        let offset = span.start_off;
        let len = text.chars().count();
        let mut blocks = removed.blocks.clone();
        Arc::make_mut(&mut blocks[idx]).splice(offset, offset, text, vec![meta.clone(); len]);
        let caret = SelectionState::collapsed(removed.blocks[idx].key.clone(), offset + len);
        Ok(self.derive(blocks, removed.entities.clone(), sel, caret))
    }

    /// Insert `text` at a point.
    pub fn insert_text(&self, at: &Point, text: &str, meta: &CharMeta) -> Result<Document> {
        self.replace_text(&SelectionState::collapsed(at.key.clone(), at.offset), text, meta)
    }

    /// Replace the selected range with a fragment.
    ///
    /// Fragment entities are merged into the table under their existing keys.
    /// The first fragment block merges into the block at the selection start;
    /// any further blocks are inserted with fresh keys and the last one picks
    /// up the remainder of the original block. An empty target block takes on
    /// the type, depth and metadata of the block merged into it.
    pub fn replace_with_fragment(&self, sel: &SelectionState, fragment: &Fragment) -> Result<Document> {
        let span = self.span(sel)?;
        let start_off = span.start_off;
        let removed = self.remove_range(sel)?;
        let Some(first) = fragment.blocks.first() else {
            return Ok(removed);
        };
        let idx = span.start_idx;

        let mut entities = (*removed.entities).clone();
        entities.extend(fragment.entities.iter().map(|(k, e)| (*k, e.clone())));

        let mut blocks = removed.blocks.clone();
        let target_key = blocks[idx].key.clone();
        let caret = if fragment.blocks.len() == 1 {
            let target = Arc::make_mut(&mut blocks[idx]);
            if target.is_empty() {
                target.adopt_shape(first);
            }
            target.splice(start_off, start_off, &first.text, first.chars.clone());
            SelectionState::collapsed(target_key, start_off + first.len())
        } else {
            let target = Arc::make_mut(&mut blocks[idx]);
            let (tail_text, tail_chars) = target.split_off(start_off);
            if target.is_empty() {
                target.adopt_shape(first);
            }
            target.append(&first.text, first.chars.clone());

            let mut inserted: Vec<Block> = fragment.blocks[1..]
                .iter()
                .map(|b| b.clone().with_key(BlockKey::generate()))
                .collect();
            let mut caret = SelectionState::collapsed(target_key, target.len());
            if let Some(last) = inserted.last_mut() {
                caret = SelectionState::collapsed(last.key.clone(), last.len());
                last.append(&tail_text, tail_chars);
            }
            blocks.splice(idx + 1..idx + 1, inserted.into_iter().map(Arc::new));
            caret
        };
        Ok(self.derive(blocks, Arc::new(entities), sel, caret))
    }

    /// Split the block at the selection start into two, removing any range
    /// first. The tail gets a fresh key and the caret lands at its start.
    pub fn split_block(&self, sel: &SelectionState) -> Result<Document> {
        let span = self.span(sel)?;
        let removed = self.remove_range(sel)?;
        let (idx, offset) = (span.start_idx, span.start_off);
        let mut blocks = removed.blocks.clone();
        let head = Arc::make_mut(&mut blocks[idx]);
        let (text, chars) = head.split_off(offset);
        let tail = Block {
            key: BlockKey::generate(),
            block_type: head.block_type,
            text,
            chars,
            depth: head.depth,
            data: head.data.clone(),
        };
        let caret = SelectionState::collapsed(tail.key.clone(), 0);
        blocks.insert(idx + 1, Arc::new(tail));
        Ok(self.derive(blocks, removed.entities.clone(), sel, caret))
    }

    /// Insert `block` right after the block keyed `after`; the caret moves to
    /// the start of the new block.
    pub fn insert_block_after(&self, after: &BlockKey, block: Block) -> Result<Document> {
        let idx = self.index_of(after)?;
        let before = self.selection_after.clone().unwrap_or_else(|| {
            let len = self.blocks[idx].len();
            SelectionState::collapsed(after.clone(), len)
        });
        let caret = SelectionState::collapsed(block.key.clone(), 0);
        let mut blocks = self.blocks.clone();
        blocks.insert(idx + 1, Arc::new(block));
        Ok(self.derive(blocks, self.entities.clone(), &before, caret))
    }

    // === Inline styles and entities ===

    pub fn apply_inline_style(&self, sel: &SelectionState, style: &str) -> Result<Document> {
        self.map_chars(sel, |m| {
            m.styles.insert(SmolStr::new(style));
        })
    }

    pub fn remove_inline_style(&self, sel: &SelectionState, style: &str) -> Result<Document> {
        self.map_chars(sel, |m| {
            m.styles.remove(style);
        })
    }

    /// Attach `entity` (or clear, with `None`) across the selected range.
    pub fn apply_entity(&self, sel: &SelectionState, entity: Option<EntityKey>) -> Result<Document> {
        if let Some(key) = entity {
            if !self.entities.contains_key(&key) {
                return Err(EditorError::UnknownEntity(key));
            }
        }
        self.map_chars(sel, |m| m.entity = entity)
    }

    /// Add an entity to the table under a fresh key.
    pub fn create_entity(&self, entity: Entity) -> (Document, EntityKey) {
        let key = EntityKey::generate();
        let mut entities = (*self.entities).clone();
        entities.insert(key, entity);
        let mut doc = self.clone();
        doc.entities = Arc::new(entities);
        (doc, key)
    }

    /// Merge fields into an existing entity's data.
    pub fn merge_entity_data(&self, key: EntityKey, data: EntityData) -> Result<Document> {
        let mut entities = (*self.entities).clone();
        let entity = entities
            .get_mut(&key)
            .ok_or(EditorError::UnknownEntity(key))?;
        entity.data.extend(data);
        let mut doc = self.clone();
        doc.entities = Arc::new(entities);
        Ok(doc)
    }

    /// Drop entities no character references any more.
    pub fn prune_entities(&self) -> Document {
        let referenced: BTreeSet<EntityKey> = self
            .blocks
            .iter()
            .flat_map(|b| b.chars.iter().filter_map(|m| m.entity))
            .collect();
        if referenced.len() == self.entities.len() {
            return self.clone();
        }
        let entities = self
            .entities
            .iter()
            .filter(|(k, _)| referenced.contains(k))
            .map(|(k, e)| (*k, e.clone()))
            .collect();
        let mut doc = self.clone();
        doc.entities = Arc::new(entities);
        doc
    }

    // === Block-level edits ===

    pub fn set_block_type(&self, sel: &SelectionState, block_type: BlockType) -> Result<Document> {
        self.map_blocks(sel, |b| b.block_type = block_type)
    }

    /// Replace the metadata of every selected block.
    pub fn set_block_data(&self, sel: &SelectionState, data: BlockData) -> Result<Document> {
        self.map_blocks(sel, |b| b.data = data.clone())
    }

    /// Shift the depth of every selected block by `delta`, clamped to
    /// `[0, max_depth]`.
    pub fn adjust_block_depth(&self, sel: &SelectionState, delta: isize, max_depth: usize) -> Result<Document> {
        self.map_blocks(sel, |b| {
            let depth = b.depth as isize + delta;
            b.depth = depth.clamp(0, max_depth as isize) as usize;
        })
    }

    // === Internals ===

    fn index_of(&self, key: &BlockKey) -> Result<usize> {
        self.block_index(key)
            .ok_or_else(|| EditorError::UnknownBlock(key.clone()))
    }

    fn locate(&self, p: &Point) -> Result<usize> {
        let idx = self.index_of(&p.key)?;
        let len = self.blocks[idx].len();
        if p.offset > len {
            return Err(EditorError::OffsetOutOfRange {
                key: p.key.clone(),
                offset: p.offset,
                len,
            });
        }
        Ok(idx)
    }

    /// Resolve a selection to ordered indices, whatever its `is_backward` says.
    fn span(&self, sel: &SelectionState) -> Result<Span> {
        let a = (self.locate(&sel.anchor)?, sel.anchor.offset);
        let f = (self.locate(&sel.focus)?, sel.focus.offset);
        let (s, e) = if a <= f { (a, f) } else { (f, a) };
        Ok(Span {
            start_idx: s.0,
            start_off: s.1,
            end_idx: e.0,
            end_off: e.1,
        })
    }

    fn map_chars(&self, sel: &SelectionState, mut f: impl FnMut(&mut CharMeta)) -> Result<Document> {
        let span = self.span(sel)?;
        let mut blocks = self.blocks.clone();
        for (i, slot) in blocks
            .iter_mut()
            .enumerate()
            .take(span.end_idx + 1)
            .skip(span.start_idx)
        {
            let (from, to) = span.bounds_in(i, slot.len());
            if from >= to {
                continue;
            }
            let block = Arc::make_mut(slot);
            block.chars[from..to].iter_mut().for_each(&mut f);
        }
        Ok(self.derive(blocks, self.entities.clone(), sel, sel.clone()))
    }

    fn map_blocks(&self, sel: &SelectionState, mut f: impl FnMut(&mut Block)) -> Result<Document> {
        let span = self.span(sel)?;
        let mut blocks = self.blocks.clone();
        for slot in &mut blocks[span.start_idx..=span.end_idx] {
            f(Arc::make_mut(slot));
        }
        Ok(self.derive(blocks, self.entities.clone(), sel, sel.clone()))
    }

    fn derive(
        &self,
        blocks: Vec<Arc<Block>>,
        entities: Arc<BTreeMap<EntityKey, Entity>>,
        before: &SelectionState,
        after: SelectionState,
    ) -> Document {
        Document {
            blocks,
            entities,
            selection_before: Some(before.clone()),
            selection_after: Some(after),
        }
    }
}
