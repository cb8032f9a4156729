//! Block class names for the host renderer.
//!
//! A block's class list is built by running an ordered list of style
//! functions over it and joining whatever they return.

use std::sync::Arc;

use smol_str::{SmolStr, format_smolstr};

use crate::annotate::TEXT_ALIGN;
use crate::document::Block;
use crate::types::BlockType;

/// Maps a block to one optional class name.
pub type BlockStyleFn = Arc<dyn Fn(&Block) -> Option<SmolStr>>;

/// Chain style functions; the classes they return are joined with spaces
/// in order. Yields `None` when none of them apply.
pub fn compose(fns: impl IntoIterator<Item = BlockStyleFn>) -> BlockStyleFn {
    let fns: Vec<BlockStyleFn> = fns.into_iter().collect();
    Arc::new(move |block| {
        let classes: Vec<SmolStr> = fns
            .iter()
            .filter_map(|f| f(block))
            .filter(|c| !c.is_empty())
            .collect();
        if classes.is_empty() {
            None
        } else {
            Some(SmolStr::new(classes.join(" ")))
        }
    })
}

/// Base class for the block kinds that get one.
pub fn base_block_class(block: &Block) -> Option<SmolStr> {
    match block.block_type {
        BlockType::Unstyled => Some(SmolStr::new_static("paragraph")),
        BlockType::Blockquote => Some(SmolStr::new_static("blockquote")),
        BlockType::CodeBlock => Some(SmolStr::new_static("code-block")),
        _ => None,
    }
}

/// `text-align--{value}` from the block's alignment metadata.
pub fn alignment_class(block: &Block) -> Option<SmolStr> {
    block
        .data_str(TEXT_ALIGN)
        .map(|align| format_smolstr!("text-align--{align}"))
}

/// Base class followed by alignment.
pub fn default_block_style() -> BlockStyleFn {
    compose([
        Arc::new(base_block_class) as BlockStyleFn,
        Arc::new(alignment_class) as BlockStyleFn,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_block_style() {
        let style = default_block_style();
        assert_eq!(
            style(&Block::new(BlockType::Unstyled, "x")).as_deref(),
            Some("paragraph")
        );
        let aligned = Block::new(BlockType::Blockquote, "x").with_data(TEXT_ALIGN, "center");
        assert_eq!(style(&aligned).as_deref(), Some("blockquote text-align--center"));
        let heading = Block::new(BlockType::HeaderOne, "x").with_data(TEXT_ALIGN, "right");
        assert_eq!(style(&heading).as_deref(), Some("text-align--right"));
        assert_eq!(style(&Block::new(BlockType::HeaderTwo, "x")), None);
    }

    #[test]
    fn test_compose_keeps_order() {
        let first: BlockStyleFn = Arc::new(|_| Some(SmolStr::new("a")));
        let empty: BlockStyleFn = Arc::new(|_| Some(SmolStr::default()));
        let second: BlockStyleFn = Arc::new(|b| (b.depth > 0).then(|| SmolStr::new("nested")));
        let style = compose([first, empty, second]);
        let block = Block::new(BlockType::OrderedListItem, "x").with_depth(1);
        assert_eq!(style(&block).as_deref(), Some("a nested"));
        let none = compose(Vec::<BlockStyleFn>::new());
        assert!(none(&block).is_none());
    }
}
