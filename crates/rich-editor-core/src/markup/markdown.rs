//! Markdown import via `markdown-weaver`, and a small Markdown writer.

use std::collections::BTreeMap;

use markdown_weaver::{Event, Options, Parser, Tag};
use smol_str::SmolStr;

use super::ImportOptions;
use crate::document::{Block, Document};
use crate::error::Result;
use crate::types::{
    BlockType, CharMeta, Entity, EntityKey, EntityType, Mutability, StyleSet, styles,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Block,
    Container,
    List,
    Inline,
    Image,
    Other,
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    style: Option<SmolStr>,
    entity: Option<EntityKey>,
}

impl Frame {
    fn of(kind: FrameKind) -> Self {
        Self {
            kind,
            style: None,
            entity: None,
        }
    }
}

#[derive(Debug)]
struct Pending {
    block_type: BlockType,
    depth: usize,
    text: String,
    chars: Vec<CharMeta>,
}

struct Builder<'o> {
    options: &'o ImportOptions,
    blocks: Vec<Block>,
    entities: BTreeMap<EntityKey, Entity>,
    current: Option<Pending>,
    frames: Vec<Frame>,
    lists: Vec<BlockType>,
    containers: Vec<BlockType>,
    in_image: usize,
}

impl<'o> Builder<'o> {
    fn new(options: &'o ImportOptions) -> Self {
        Self {
            options,
            blocks: Vec::new(),
            entities: BTreeMap::new(),
            current: None,
            frames: Vec::new(),
            lists: Vec::new(),
            containers: Vec::new(),
            in_image: 0,
        }
    }

    fn open(&mut self, block_type: BlockType) -> Result<()> {
        if let Some(cur) = &self.current {
            if cur.text.is_empty() && cur.block_type != BlockType::Unstyled {
                // Paragraph inside a list item or quote: keep the outer type.
                return Ok(());
            }
        }
        self.flush()?;
        let depth = if block_type.is_list() {
            self.lists.len().saturating_sub(1)
        } else {
            0
        };
        self.current = Some(Pending {
            block_type,
            depth,
            text: String::new(),
            chars: Vec::new(),
        });
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let Some(mut pending) = self.current.take() else {
            return Ok(());
        };
        while pending.text.ends_with('\n') {
            pending.text.pop();
            pending.chars.pop();
        }
        let block = Block::from_parts(pending.block_type, pending.text, pending.chars)?
            .with_depth(pending.depth);
        self.blocks.push(block);
        Ok(())
    }

    fn register(&mut self, entity: Entity) -> EntityKey {
        let key = EntityKey::generate();
        self.entities.insert(key, entity);
        key
    }

    fn hook_entity(&self, tag: &str) -> Option<Entity> {
        self.options
            .inline_entity
            .as_ref()
            .and_then(|hook| hook(tag, ""))
    }

    fn start(&mut self, tag: Tag<'_>) -> Result<()> {
        let frame = match tag {
            Tag::Paragraph(_) => {
                let ty = self.containers.last().copied().unwrap_or_default();
                self.open(ty)?;
                Frame::of(FrameKind::Block)
            }
            Tag::Heading { level, .. } => {
                self.open(BlockType::heading(level as usize))?;
                Frame::of(FrameKind::Block)
            }
            Tag::CodeBlock(_) => {
                self.flush()?;
                self.open(BlockType::CodeBlock)?;
                Frame::of(FrameKind::Block)
            }
            Tag::BlockQuote(_) => {
                self.flush()?;
                self.containers.push(BlockType::Blockquote);
                Frame::of(FrameKind::Container)
            }
            Tag::List(start) => {
                self.flush()?;
                self.lists.push(if start.is_some() {
                    BlockType::OrderedListItem
                } else {
                    BlockType::UnorderedListItem
                });
                Frame::of(FrameKind::List)
            }
            Tag::Item => {
                let ty = self
                    .lists
                    .last()
                    .copied()
                    .unwrap_or(BlockType::UnorderedListItem);
                self.flush()?;
                self.open(ty)?;
                Frame::of(FrameKind::Block)
            }
            Tag::Emphasis => self.style_frame(styles::ITALIC),
            Tag::Strong => self.style_frame(styles::BOLD),
            Tag::Strikethrough => self.style_frame(styles::STRIKETHROUGH),
            Tag::Link { dest_url, .. } => {
                let entity = self.hook_entity("A").unwrap_or_else(|| {
                    Entity::new(EntityType::Link, Mutability::Mutable).with("url", dest_url.as_ref())
                });
                let key = self.register(entity);
                Frame {
                    kind: FrameKind::Inline,
                    style: None,
                    entity: Some(key),
                }
            }
            Tag::Image { dest_url, .. } => {
                let entity = self.hook_entity("IMG").unwrap_or_else(|| {
                    Entity::new(EntityType::Image, Mutability::Immutable).with("src", dest_url.as_ref())
                });
                let key = self.register(entity);
                self.push_chars(" ", Some(key), None);
                self.in_image += 1;
                Frame::of(FrameKind::Image)
            }
            _ => Frame::of(FrameKind::Other),
        };
        self.frames.push(frame);
        Ok(())
    }

    fn style_frame(&self, style: &'static str) -> Frame {
        Frame {
            kind: FrameKind::Inline,
            style: Some(SmolStr::new_static(style)),
            entity: None,
        }
    }

    fn end(&mut self) -> Result<()> {
        let Some(frame) = self.frames.pop() else {
            return Ok(());
        };
        match frame.kind {
            FrameKind::Block => self.flush()?,
            FrameKind::Container => {
                self.flush()?;
                self.containers.pop();
            }
            FrameKind::List => {
                self.flush()?;
                self.lists.pop();
            }
            FrameKind::Image => self.in_image = self.in_image.saturating_sub(1),
            FrameKind::Inline | FrameKind::Other => {}
        }
        Ok(())
    }

    fn push_chars(&mut self, text: &str, entity: Option<EntityKey>, extra: Option<&str>) {
        if self.current.is_none() {
            let block_type = self.containers.last().copied().unwrap_or_default();
            self.current = Some(Pending {
                block_type,
                depth: 0,
                text: String::new(),
                chars: Vec::new(),
            });
        }
        let mut styles: StyleSet = self.frames.iter().filter_map(|f| f.style.clone()).collect();
        if let Some(extra) = extra {
            styles.insert(SmolStr::new(extra));
        }
        let entity = entity.or_else(|| self.frames.iter().rev().find_map(|f| f.entity));
        let meta = CharMeta::new(styles, entity);
        if let Some(cur) = &mut self.current {
            cur.text.push_str(text);
            cur.chars
                .extend(std::iter::repeat_n(meta, text.chars().count()));
        }
    }

    fn text(&mut self, text: &str, extra: Option<&str>) {
        if self.in_image > 0 {
            // Alt text has no place in the document.
            return;
        }
        self.push_chars(text, None, extra);
    }
}

/// Parse Markdown into a document.
pub(super) fn parse(markdown: &str, options: &ImportOptions) -> Result<Document> {
    let mut builder = Builder::new(options);
    for event in Parser::new_ext(markdown, Options::ENABLE_STRIKETHROUGH) {
        match event {
            Event::Start(tag) => builder.start(tag)?,
            Event::End(_) => builder.end()?,
            Event::Text(text) => builder.text(&text, None),
            Event::Code(code) => builder.text(&code, Some(styles::CODE)),
            Event::SoftBreak => builder.text(" ", None),
            Event::HardBreak => builder.text("\n", None),
            _ => {}
        }
    }
    builder.flush()?;
    Ok(Document::from_blocks(builder.blocks, builder.entities).prune_entities())
}

// === Export ===

fn escape_markdown(out: &mut String, text: &str) {
    for c in text.chars() {
        if matches!(c, '\\' | '*' | '_' | '`' | '[' | ']' | '~') {
            out.push('\\');
        }
        out.push(c);
    }
}

fn style_marker(style: &str) -> Option<&'static str> {
    match style {
        styles::BOLD => Some("**"),
        styles::ITALIC => Some("_"),
        styles::CODE => Some("`"),
        styles::STRIKETHROUGH => Some("~~"),
        _ => None,
    }
}

fn write_inline(out: &mut String, doc: &Document, block: &Block) {
    let text: Vec<char> = block.text().chars().collect();
    let metas = block.chars();
    let raw = block.block_type == BlockType::CodeBlock;
    if raw {
        out.push_str(block.text());
        return;
    }
    let mut i = 0;
    while i < metas.len() {
        let key = metas[i].entity;
        let mut j = i;
        while j < metas.len() && metas[j].entity == key {
            j += 1;
        }
        let entity = key.and_then(|k| doc.entity(k));
        if let Some(image) = entity.filter(|e| e.kind == EntityType::Image) {
            out.push_str("![](");
            out.push_str(image.str_field("src").unwrap_or_default());
            out.push(')');
            i = j;
            continue;
        }
        let url = entity
            .filter(|e| e.kind == EntityType::Link)
            .and_then(|e| e.str_field("url"));
        if url.is_some() {
            out.push('[');
        }
        let mut k = i;
        while k < j {
            let styles = &metas[k].styles;
            let mut m = k;
            while m < j && metas[m].styles == *styles {
                m += 1;
            }
            let markers: Vec<&str> = styles.iter().filter_map(|s| style_marker(s)).collect();
            for marker in &markers {
                out.push_str(marker);
            }
            let run: String = text[k..m].iter().collect();
            escape_markdown(out, &run);
            for marker in markers.iter().rev() {
                out.push_str(marker);
            }
            k = m;
        }
        if let Some(url) = url {
            out.push_str("](");
            out.push_str(url);
            out.push(')');
        }
        i = j;
    }
}

/// Render a document as Markdown.
pub(super) fn render(doc: &Document) -> Result<String> {
    let mut out = String::new();
    let mut counters: Vec<usize> = Vec::new();
    let mut prev_list = false;

    for (idx, block) in doc.blocks().enumerate() {
        let is_list = block.block_type.is_list();
        if idx > 0 {
            out.push_str(if is_list && prev_list { "\n" } else { "\n\n" });
        }
        if !is_list {
            counters.clear();
        }
        prev_list = is_list;

        match block.block_type {
            BlockType::UnorderedListItem | BlockType::OrderedListItem => {
                counters.resize(block.depth + 1, 0);
                out.push_str(&"  ".repeat(block.depth));
                if block.block_type == BlockType::OrderedListItem {
                    counters[block.depth] += 1;
                    out.push_str(&format!("{}. ", counters[block.depth]));
                } else {
                    out.push_str("- ");
                }
            }
            BlockType::Blockquote => out.push_str("> "),
            BlockType::CodeBlock => out.push_str("```\n"),
            ty => {
                if let Some(level) = ty.heading_level() {
                    out.push_str(&"#".repeat(level));
                    out.push(' ');
                }
            }
        }
        write_inline(&mut out, doc, block);
        if block.block_type == BlockType::CodeBlock {
            out.push_str("\n```");
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;

    #[test]
    fn test_parse_markdown_blocks() {
        let doc = parse(
            "# Title\n\nsome **bold** and _it_\n\n- one\n- two\n  - nested\n\n> quoted\n",
            &ImportOptions::default(),
        )
        .unwrap();
        let shape: Vec<_> = doc
            .blocks()
            .map(|b| (b.text().to_string(), b.block_type, b.depth))
            .collect();
        assert_eq!(
            shape,
            [
                ("Title".to_string(), BlockType::HeaderOne, 0),
                ("some bold and it".to_string(), BlockType::Unstyled, 0),
                ("one".to_string(), BlockType::UnorderedListItem, 0),
                ("two".to_string(), BlockType::UnorderedListItem, 0),
                ("nested".to_string(), BlockType::UnorderedListItem, 1),
                ("quoted".to_string(), BlockType::Blockquote, 0),
            ]
        );
        let para = doc.blocks().nth(1).unwrap();
        assert!(para.chars()[5].has_style(styles::BOLD));
        assert!(para.chars()[14].has_style(styles::ITALIC));
    }

    #[test]
    fn test_parse_markdown_link() {
        let doc = parse("go [there](https://x.test) now", &ImportOptions::default()).unwrap();
        let block = doc.first_block();
        assert_eq!(block.text(), "go there now");
        let entity = doc.entity(block.entity_at(3).unwrap()).unwrap();
        assert_eq!(entity.str_field("url"), Some("https://x.test"));
    }

    #[test]
    fn test_render_markdown() {
        let doc = crate::markup::html::parse(
            r#"<h2>Notes</h2><p>a <strong>b</strong> <a href="https://x.test">c</a></p><ol><li>x</li><li>y</li></ol><pre>let a = 1;</pre>"#,
            &ImportOptions::default(),
        )
        .unwrap();
        assert_snapshot!(render(&doc).unwrap(), @r"
        ## Notes

        a **b** [c](https://x.test)

        1. x
        2. y

        ```
        let a = 1;
        ```
        ");
    }
}
