//! Tolerant HTML import and plain HTML export.
//!
//! Import is a single pass over a regex tokenizer: block tags open and close
//! blocks, inline tags push frames whose styles and entities apply to the
//! text inside them. Anything unrecognised is ignored rather than rejected,
//! since clipboard HTML comes from everywhere.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use markdown_weaver_escape::{escape_href, escape_html};
use regex::{Captures, Regex};
use serde_json::Value;
use smol_str::SmolStr;

use super::{ExportOptions, ImportOptions, MarkupWriter};
use crate::document::{Block, BlockData, Document};
use crate::error::Result;
use crate::types::{
    BlockType, CharMeta, Entity, EntityKey, EntityType, Mutability, StyleSet, styles,
};

/// Placeholder text standing in for an empty paragraph while pasted HTML
/// passes through hooks that would otherwise drop it.
pub const EMPTY_PARAGRAPH_MARKER: &str = "__rich_editor_empty_paragraph__";

/// `EMPTY_PARAGRAPH_MARKER` wrapped as inline HTML.
pub const EMPTY_PARAGRAPH_SPAN: &str = "<span>__rich_editor_empty_paragraph__</span>";

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)<!--.*?-->|<![^>]*>|<\?[^>]*>|<(/?)([A-Za-z][A-Za-z0-9-]*)((?:\s+[^\s/>"'=]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'>]+))?)*)\s*/?>"#,
    )
    .unwrap()
});

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s/>"'=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#).unwrap()
});

static CHAR_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[A-Za-z]+);").unwrap());

static SPACE_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\r\n\x0C]+").unwrap());

static TEXT_ALIGN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"text-align\s*:\s*([A-Za-z-]+)").unwrap());

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "hr", "img", "input", "link", "meta", "source", "wbr",
];

const SKIPPED_TAGS: &[&str] = &["script", "style", "head", "title", "template"];

fn is_block_tag(name: &str) -> bool {
    matches!(
        name,
        "p" | "div" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "li" | "figure"
    )
}

#[derive(Debug)]
struct TagToken {
    name: String,
    closing: bool,
    attrs: Vec<(String, String)>,
}

impl TagToken {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn class(&self) -> &str {
        self.attr("class").unwrap_or("")
    }
}

#[derive(Debug)]
enum Token<'a> {
    Text(&'a str),
    Tag(TagToken),
}

fn tokenize(html: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut last = 0;
    for caps in TAG_RE.captures_iter(html) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() > last {
            tokens.push(Token::Text(&html[last..whole.start()]));
        }
        last = whole.end();
        let Some(name) = caps.get(2) else {
            // Comment, doctype or processing instruction.
            continue;
        };
        let attrs = caps
            .get(3)
            .map(|a| parse_attrs(a.as_str()))
            .unwrap_or_default();
        tokens.push(Token::Tag(TagToken {
            name: name.as_str().to_ascii_lowercase(),
            closing: caps.get(1).is_some_and(|m| !m.as_str().is_empty()),
            attrs,
        }));
    }
    if last < html.len() {
        tokens.push(Token::Text(&html[last..]));
    }
    tokens
}

fn parse_attrs(raw: &str) -> Vec<(String, String)> {
    ATTR_RE
        .captures_iter(raw)
        .map(|c| {
            let value = c
                .get(2)
                .or_else(|| c.get(3))
                .or_else(|| c.get(4))
                .map(|m| decode_entities(m.as_str()))
                .unwrap_or_default();
            (c[1].to_ascii_lowercase(), value)
        })
        .collect()
}

fn decode_entities(s: &str) -> String {
    CHAR_REF_RE
        .replace_all(s, |caps: &Captures| {
            let name = &caps[1];
            let decoded = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match name {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some('\u{a0}'),
                    _ => None,
                }
            };
            decoded
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[derive(Debug)]
struct Frame {
    tag: String,
    style: Option<SmolStr>,
    entity: Option<EntityKey>,
}

#[derive(Debug)]
struct PendingBlock {
    block_type: BlockType,
    depth: usize,
    data: BlockData,
    text: String,
    chars: Vec<CharMeta>,
    /// Opened by a tag rather than by stray text.
    explicit: bool,
}

struct Importer<'o> {
    options: &'o ImportOptions,
    blocks: Vec<Block>,
    entities: BTreeMap<EntityKey, Entity>,
    current: Option<PendingBlock>,
    inline: Vec<Frame>,
    lists: Vec<BlockType>,
    containers: Vec<BlockType>,
    skip: Option<String>,
}

impl<'o> Importer<'o> {
    fn new(options: &'o ImportOptions) -> Self {
        Self {
            options,
            blocks: Vec::new(),
            entities: BTreeMap::new(),
            current: None,
            inline: Vec::new(),
            lists: Vec::new(),
            containers: Vec::new(),
            skip: None,
        }
    }

    fn in_code(&self) -> bool {
        self.current
            .as_ref()
            .map(|b| b.block_type == BlockType::CodeBlock)
            .unwrap_or_else(|| self.containers.last() == Some(&BlockType::CodeBlock))
    }

    fn handle_tag(&mut self, tag: TagToken) -> Result<()> {
        if let Some(skipping) = &self.skip {
            if tag.closing && &tag.name == skipping {
                self.skip = None;
            }
            return Ok(());
        }
        let name = tag.name.as_str();
        match (name, tag.closing) {
            (n, false) if SKIPPED_TAGS.contains(&n) => self.skip = Some(tag.name.clone()),
            ("ul" | "ol", false) => {
                self.flush()?;
                self.lists.push(if name == "ol" {
                    BlockType::OrderedListItem
                } else {
                    BlockType::UnorderedListItem
                });
            }
            ("ul" | "ol", true) => {
                self.flush()?;
                self.lists.pop();
            }
            ("blockquote" | "pre", false) => {
                self.flush()?;
                let ty = if name == "pre" {
                    BlockType::CodeBlock
                } else {
                    BlockType::Blockquote
                };
                self.containers.push(ty);
                self.open_block(&tag)?;
            }
            ("blockquote" | "pre", true) => {
                self.flush()?;
                self.containers.pop();
            }
            (n, false) if is_block_tag(n) => self.open_block(&tag)?,
            (n, true) if is_block_tag(n) => self.flush()?,
            ("br", false) => self.push_text("\n", true),
            ("img", false) => self.image(&tag),
            (n, false) if VOID_TAGS.contains(&n) => {}
            (_, false) => self.open_inline(&tag),
            (_, true) => self.close_inline(name),
        }
        Ok(())
    }

    fn block_type_for(&self, name: &str) -> BlockType {
        match name {
            "h1" => BlockType::HeaderOne,
            "h2" => BlockType::HeaderTwo,
            "h3" => BlockType::HeaderThree,
            "h4" => BlockType::HeaderFour,
            "h5" => BlockType::HeaderFive,
            "h6" => BlockType::HeaderSix,
            "li" => self
                .lists
                .last()
                .copied()
                .unwrap_or(BlockType::UnorderedListItem),
            "figure" => BlockType::Atomic,
            "blockquote" => BlockType::Blockquote,
            "pre" => BlockType::CodeBlock,
            _ => self.containers.last().copied().unwrap_or_default(),
        }
    }

    fn block_data_for(&self, tag: &TagToken) -> BlockData {
        let mut data = BlockData::new();
        if let Some(align) = tag.attr("style").and_then(|s| TEXT_ALIGN_RE.captures(s)) {
            data.insert(SmolStr::new("textAlign"), Value::from(&align[1]));
        }
        if let Some(hook) = &self.options.block_metadata {
            if let Some(extra) = hook(&tag.name.to_ascii_uppercase(), tag.class()) {
                data.extend(extra);
            }
        }
        data
    }

    fn open_block(&mut self, tag: &TagToken) -> Result<()> {
        let data = self.block_data_for(tag);
        // `<li><p>..</p></li>` and friends: the paragraph fills its container.
        if let Some(cur) = &mut self.current {
            if cur.explicit
                && cur.text.is_empty()
                && cur.block_type != BlockType::Unstyled
                && matches!(tag.name.as_str(), "p" | "div")
            {
                cur.data.extend(data);
                return Ok(());
            }
        }
        self.flush()?;
        let block_type = self.block_type_for(&tag.name);
        let depth = if block_type.is_list() {
            self.lists.len().saturating_sub(1)
        } else {
            0
        };
        self.current = Some(PendingBlock {
            block_type,
            depth,
            data,
            text: String::new(),
            chars: Vec::new(),
            explicit: true,
        });
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let Some(mut pending) = self.current.take() else {
            return Ok(());
        };
        if pending.block_type != BlockType::CodeBlock && pending.text.ends_with('\n') {
            pending.text.pop();
            pending.chars.pop();
        }
        if !pending.explicit && pending.text.trim().is_empty() {
            return Ok(());
        }
        let mut block = Block::from_parts(pending.block_type, pending.text, pending.chars)?
            .with_depth(pending.depth);
        block.data = pending.data;
        self.blocks.push(block);
        Ok(())
    }

    fn inline_meta(&self) -> CharMeta {
        let styles: StyleSet = self.inline.iter().filter_map(|f| f.style.clone()).collect();
        let entity = self.inline.iter().rev().find_map(|f| f.entity);
        CharMeta::new(styles, entity)
    }

    fn ensure_block(&mut self) {
        if self.current.is_none() {
            let block_type = self.containers.last().copied().unwrap_or_default();
            self.current = Some(PendingBlock {
                block_type,
                depth: 0,
                data: BlockData::new(),
                text: String::new(),
                chars: Vec::new(),
                explicit: false,
            });
        }
    }

    fn text(&mut self, raw: &str) {
        if self.skip.is_some() {
            return;
        }
        let decoded = decode_entities(raw);
        if self.in_code() {
            self.push_text(&decoded, true);
            return;
        }
        let collapsed = SPACE_RUN_RE.replace_all(&decoded, " ");
        if self.current.is_none() && collapsed.trim().is_empty() {
            return;
        }
        self.push_text(&collapsed, false);
    }

    fn push_text(&mut self, text: &str, verbatim: bool) {
        self.ensure_block();
        let meta = self.inline_meta();
        let Some(cur) = &mut self.current else { return };
        let text = if !verbatim && (cur.text.is_empty() || cur.text.ends_with([' ', '\n'])) {
            text.trim_start_matches(' ')
        } else {
            text
        };
        cur.text.push_str(text);
        cur.chars
            .extend(std::iter::repeat_n(meta, text.chars().count()));
    }

    fn register(&mut self, entity: Entity) -> EntityKey {
        let key = EntityKey::generate();
        self.entities.insert(key, entity);
        key
    }

    fn entity_for(&self, tag: &TagToken) -> Option<Entity> {
        let upper = tag.name.to_ascii_uppercase();
        if let Some(hook) = &self.options.inline_entity {
            if let Some(entity) = hook(&upper, tag.class()) {
                return Some(entity);
            }
        }
        default_entity(tag)
    }

    fn open_inline(&mut self, tag: &TagToken) {
        let style = match tag.name.as_str() {
            "strong" | "b" => Some(SmolStr::new_static(styles::BOLD)),
            "em" | "i" => Some(SmolStr::new_static(styles::ITALIC)),
            "u" | "ins" => Some(SmolStr::new_static(styles::UNDERLINE)),
            "s" | "del" | "strike" => Some(SmolStr::new_static(styles::STRIKETHROUGH)),
            "code" if !self.in_code() => Some(SmolStr::new_static(styles::CODE)),
            "span" => tag.attr("data-style").map(SmolStr::new),
            _ => None,
        };
        let entity = self.entity_for(tag).map(|e| self.register(e));
        self.inline.push(Frame {
            tag: tag.name.clone(),
            style,
            entity,
        });
    }

    fn close_inline(&mut self, name: &str) {
        if let Some(idx) = self.inline.iter().rposition(|f| f.tag == name) {
            self.inline.truncate(idx);
        }
    }

    fn image(&mut self, tag: &TagToken) {
        let Some(entity) = self.entity_for(tag) else {
            return;
        };
        let key = self.register(entity);
        self.ensure_block();
        let mut meta = self.inline_meta();
        meta.entity = Some(key);
        if let Some(cur) = &mut self.current {
            cur.text.push(' ');
            cur.chars.push(meta);
        }
    }

    fn finish(mut self) -> Result<Document> {
        self.flush()?;
        Ok(Document::from_blocks(self.blocks, self.entities).prune_entities())
    }
}

fn default_entity(tag: &TagToken) -> Option<Entity> {
    match tag.name.as_str() {
        "a" => {
            let mut entity = Entity::new(EntityType::Link, Mutability::Mutable);
            for (attr, field) in [
                ("href", "url"),
                ("class", "className"),
                ("target", "target"),
                ("rel", "rel"),
            ] {
                if let Some(v) = tag.attr(attr).filter(|v| !v.is_empty()) {
                    entity = entity.with(field, v);
                }
            }
            Some(entity)
        }
        "img" => tag
            .attr("src")
            .map(|src| Entity::new(EntityType::Image, Mutability::Immutable).with("src", src)),
        "span" if tag.attr("data-entity").is_some() => {
            let kind = match tag.attr("data-entity") {
                Some("SPAN") | Some("") | None => EntityType::Span,
                Some(other) => EntityType::Other(SmolStr::new(other)),
            };
            let mut entity = Entity::new(kind, Mutability::Mutable);
            if let Some(class) = tag.attr("class").filter(|c| !c.is_empty()) {
                entity = entity.with("className", class);
            }
            Some(entity)
        }
        _ => None,
    }
}

/// Parse HTML into a document.
pub(super) fn parse(html: &str, options: &ImportOptions) -> Result<Document> {
    let mut importer = Importer::new(options);
    for token in tokenize(html) {
        match token {
            Token::Text(t) => importer.text(t),
            Token::Tag(tag) => importer.handle_tag(tag)?,
        }
    }
    importer.finish()
}

// === Export ===

fn block_tag(ty: BlockType) -> &'static str {
    match ty {
        BlockType::HeaderOne => "h1",
        BlockType::HeaderTwo => "h2",
        BlockType::HeaderThree => "h3",
        BlockType::HeaderFour => "h4",
        BlockType::HeaderFive => "h5",
        BlockType::HeaderSix => "h6",
        BlockType::UnorderedListItem | BlockType::OrderedListItem => "li",
        BlockType::Blockquote => "blockquote",
        BlockType::CodeBlock => "pre",
        BlockType::Atomic => "figure",
        BlockType::Unstyled => "p",
    }
}

fn list_tag(ty: BlockType) -> Option<&'static str> {
    match ty {
        BlockType::UnorderedListItem => Some("ul"),
        BlockType::OrderedListItem => Some("ol"),
        _ => None,
    }
}

fn style_tag(style: &str) -> Option<&'static str> {
    match style {
        styles::BOLD => Some("strong"),
        styles::ITALIC => Some("em"),
        styles::UNDERLINE => Some("u"),
        styles::CODE => Some("code"),
        styles::STRIKETHROUGH => Some("del"),
        _ => None,
    }
}

fn write_attr(w: &mut MarkupWriter, name: &str, value: &str) -> Result<()> {
    w.write(" ");
    w.write(name);
    w.write("=\"");
    escape_html(&mut *w, value)?;
    w.write("\"");
    Ok(())
}

fn open_entity(w: &mut MarkupWriter, entity: &Entity) -> Result<Option<&'static str>> {
    match entity.kind {
        EntityType::Link => {
            w.write("<a");
            if let Some(url) = entity.str_field("url") {
                w.write(" href=\"");
                escape_href(&mut *w, url)?;
                w.write("\"");
            }
            for (field, attr) in [("className", "class"), ("target", "target"), ("rel", "rel")] {
                if let Some(v) = entity.str_field(field).filter(|v| !v.is_empty()) {
                    write_attr(w, attr, v)?;
                }
            }
            w.write(">");
            Ok(Some("</a>"))
        }
        EntityType::Image => Ok(None),
        _ => {
            w.write("<span");
            write_attr(w, "data-entity", entity.kind.as_str())?;
            if let Some(class) = entity.class_name().filter(|c| !c.is_empty()) {
                write_attr(w, "class", class)?;
            }
            w.write(">");
            Ok(Some("</span>"))
        }
    }
}

fn write_text(w: &mut MarkupWriter, text: &str, code: bool) -> Result<()> {
    if code {
        escape_html(&mut *w, text)?;
        return Ok(());
    }
    let mut lines = text.split('\n');
    if let Some(first) = lines.next() {
        escape_html(&mut *w, first)?;
    }
    for line in lines {
        w.write("<br>");
        escape_html(&mut *w, line)?;
    }
    Ok(())
}

fn write_styled(w: &mut MarkupWriter, text: &str, styles: &StyleSet, code: bool) -> Result<()> {
    let mut closers = Vec::with_capacity(styles.len());
    for style in styles {
        match style_tag(style) {
            Some(tag) => {
                w.write("<");
                w.write(tag);
                w.write(">");
                closers.push(tag);
            }
            None => {
                w.write("<span");
                write_attr(w, "data-style", style)?;
                w.write(">");
                closers.push("span");
            }
        }
    }
    write_text(w, text, code)?;
    for tag in closers.into_iter().rev() {
        w.write("</");
        w.write(tag);
        w.write(">");
    }
    Ok(())
}

fn write_inline(w: &mut MarkupWriter, doc: &Document, block: &Block) -> Result<()> {
    let text: Vec<char> = block.text().chars().collect();
    let metas = block.chars();
    let code = block.block_type == BlockType::CodeBlock;
    let mut i = 0;
    while i < metas.len() {
        let entity_key = metas[i].entity;
        let mut j = i;
        while j < metas.len() && metas[j].entity == entity_key {
            j += 1;
        }
        let entity = entity_key.and_then(|k| doc.entity(k));
        if let Some(image) = entity.filter(|e| e.kind == EntityType::Image) {
            w.write("<img");
            if let Some(src) = image.str_field("src") {
                w.write(" src=\"");
                escape_href(&mut *w, src)?;
                w.write("\"");
            }
            w.write(">");
            i = j;
            continue;
        }
        let closer = match entity {
            Some(e) => open_entity(w, e)?,
            None => None,
        };
        let mut k = i;
        while k < j {
            let styles = &metas[k].styles;
            let mut m = k;
            while m < j && metas[m].styles == *styles {
                m += 1;
            }
            let run: String = text[k..m].iter().collect();
            write_styled(w, &run, styles, code)?;
            k = m;
        }
        if let Some(closer) = closer {
            w.write(closer);
        }
        i = j;
    }
    Ok(())
}

/// Render a document as HTML, one block per line.
pub(super) fn render(doc: &Document, options: &ExportOptions) -> Result<String> {
    let mut w = MarkupWriter::new();
    let mut lists: Vec<&'static str> = Vec::new();
    let close_list = |w: &mut MarkupWriter, tag: &str| {
        w.write("</");
        w.write(tag);
        w.write(">\n");
    };

    for block in doc.blocks() {
        match list_tag(block.block_type) {
            Some(tag) => {
                let want = block.depth + 1;
                while lists.len() > want {
                    if let Some(t) = lists.pop() {
                        close_list(&mut w, t);
                    }
                }
                if lists.len() == want && lists.last() != Some(&tag) {
                    if let Some(t) = lists.pop() {
                        close_list(&mut w, t);
                    }
                }
                while lists.len() < want {
                    w.write("<");
                    w.write(tag);
                    w.write(">\n");
                    lists.push(tag);
                }
            }
            None => {
                while let Some(t) = lists.pop() {
                    close_list(&mut w, t);
                }
            }
        }

        let tag = block_tag(block.block_type);
        w.write("<");
        w.write(tag);
        if let Some(key) = &options.editor_key {
            write_attr(&mut w, "data-editor", key)?;
        }
        if let Some(align) = block.data_str("textAlign") {
            write_attr(&mut w, "style", &format!("text-align: {align}"))?;
        }
        w.write(">");
        if block.is_empty() {
            w.write("<br>");
        } else {
            write_inline(&mut w, doc, block)?;
            // A trailing line break needs a placeholder `<br>` after it, or
            // the importer takes it for the placeholder itself.
            if block.block_type != BlockType::CodeBlock && block.text().ends_with('\n') {
                w.write("<br>");
            }
        }
        w.write("</");
        w.write(tag);
        w.write(">\n");
    }
    while let Some(t) = lists.pop() {
        close_list(&mut w, t);
    }

    let mut out = w.into_string();
    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::{DefaultConverter, rewrite_html};
    use crate::selection::SelectionState;
    use insta::assert_snapshot;

    fn parse_default(html: &str) -> Document {
        parse(html, &ImportOptions::default()).unwrap()
    }

    fn texts(doc: &Document) -> Vec<String> {
        doc.blocks().map(|b| b.text().to_string()).collect()
    }

    #[test]
    fn test_parse_paragraphs_and_headings() {
        let doc = parse_default("<h2>Title</h2><p>one</p>\n<p>two   words</p>");
        assert_eq!(texts(&doc), ["Title", "one", "two words"]);
        let types: Vec<_> = doc.blocks().map(|b| b.block_type).collect();
        assert_eq!(
            types,
            [BlockType::HeaderTwo, BlockType::Unstyled, BlockType::Unstyled]
        );
    }

    #[test]
    fn test_parse_inline_styles() {
        let doc = parse_default("<p>a <b>bold <i>both</i></b> end</p>");
        let block = doc.first_block();
        assert_eq!(block.text(), "a bold both end");
        assert!(block.chars()[2].has_style(styles::BOLD));
        assert!(!block.chars()[2].has_style(styles::ITALIC));
        assert!(block.chars()[7].has_style(styles::BOLD));
        assert!(block.chars()[7].has_style(styles::ITALIC));
        assert!(block.chars()[12].styles.is_empty());
    }

    #[test]
    fn test_parse_links() {
        let doc = parse_default(r#"<p>see <a href="https://x.test" target="_blank">here</a></p>"#);
        let block = doc.first_block();
        let key = block.entity_at(4).unwrap();
        let entity = doc.entity(key).unwrap();
        assert_eq!(entity.kind, EntityType::Link);
        assert_eq!(entity.str_field("url"), Some("https://x.test"));
        assert_eq!(entity.str_field("target"), Some("_blank"));
        assert_eq!(block.entity_at(0), None);
    }

    #[test]
    fn test_inline_entity_hook_wins() {
        let options = ImportOptions::with_inline_entity(|tag, class| {
            (tag == "A" && class.is_empty())
                .then(|| Entity::classed(EntityType::Link, "yellow-dropdown_option"))
        });
        let doc = parse(r#"<p><a>mark</a> <a class="x">other</a></p>"#, &options).unwrap();
        let block = doc.first_block();
        let first = doc.entity(block.entity_at(0).unwrap()).unwrap();
        assert_eq!(first.class_name(), Some("yellow-dropdown_option"));
        let second = doc.entity(block.entity_at(6).unwrap()).unwrap();
        assert_eq!(second.class_name(), Some("x"));
    }

    #[test]
    fn test_parse_lists_with_depth() {
        let doc = parse_default("<ul><li>a</li><ul><li>b</li></ul></ul><ol><li><p>c</p></li></ol>");
        let shape: Vec<_> = doc
            .blocks()
            .map(|b| (b.text().to_string(), b.block_type, b.depth))
            .collect();
        assert_eq!(
            shape,
            [
                ("a".to_string(), BlockType::UnorderedListItem, 0),
                ("b".to_string(), BlockType::UnorderedListItem, 1),
                ("c".to_string(), BlockType::OrderedListItem, 0),
            ]
        );
    }

    #[test]
    fn test_br_handling() {
        let doc = parse_default("<p>line<br>next</p><p><br></p><p>end</p>");
        assert_eq!(texts(&doc), ["line\nnext", "", "end"]);
    }

    #[test]
    fn test_trailing_soft_newline_survives_rewrite() {
        let doc = Document::from_blocks(
            vec![
                Block::new(BlockType::Unstyled, "ab\n"),
                Block::new(BlockType::Unstyled, "cd"),
                Block::new(BlockType::Unstyled, "\n"),
                Block::new(BlockType::Unstyled, ""),
            ],
            BTreeMap::new(),
        );
        let html = render(&doc, &ExportOptions::default()).unwrap();
        assert_snapshot!(html, @r"
        <p>ab<br><br></p>
        <p>cd</p>
        <p><br><br></p>
        <p><br></p>
        ");
        let back = rewrite_html(&DefaultConverter, &doc, &ImportOptions::default(), |h| h).unwrap();
        assert_eq!(texts(&back), ["ab\n", "cd", "\n", ""]);
    }

    #[test]
    fn test_stray_angle_brackets_are_text() {
        let doc = parse_default("<p>a <|slot|> b &lt;b&gt;</p>");
        assert_eq!(doc.first_block().text(), "a <|slot|> b <b>");
    }

    #[test]
    fn test_skips_script_and_comments() {
        let doc = parse_default("<!-- hi --><style>p{}</style><p>x</p><script>alert(1)</script>");
        assert_eq!(texts(&doc), ["x"]);
    }

    #[test]
    fn test_bare_text_becomes_block() {
        let doc = parse_default("just text");
        assert_eq!(texts(&doc), ["just text"]);
    }

    #[test]
    fn test_alignment_and_block_hook() {
        let options = ImportOptions::default().block_metadata(|tag, class| {
            (tag == "P" && class == "lead").then(|| {
                let mut data = BlockData::new();
                data.insert(SmolStr::new("lead"), Value::Bool(true));
                data
            })
        });
        let doc = parse(r#"<p class="lead" style="text-align: center">x</p>"#, &options).unwrap();
        let block = doc.first_block();
        assert_eq!(block.data_str("textAlign"), Some("center"));
        assert_eq!(block.data.get("lead"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_image_placeholder() {
        let doc = parse_default(r#"<p>pic <img src="a.png"> done</p>"#);
        let block = doc.first_block();
        assert_eq!(block.text(), "pic  done");
        let entity = doc.entity(block.entity_at(4).unwrap()).unwrap();
        assert_eq!(entity.kind, EntityType::Image);
        assert_eq!(entity.str_field("src"), Some("a.png"));
    }

    #[test]
    fn test_render_blocks() {
        let doc = parse_default(
            r#"<h1>Head</h1><p>plain <strong>bold</strong></p><ul><li>one</li><li>two</li></ul><p><br></p>"#,
        );
        let html = render(&doc, &ExportOptions::default()).unwrap();
        assert_snapshot!(html, @r"
        <h1>Head</h1>
        <p>plain <strong>bold</strong></p>
        <ul>
        <li>one</li>
        <li>two</li>
        </ul>
        <p><br></p>
        ");
    }

    #[test]
    fn test_render_entities_and_escaping() {
        let doc = Document::from_text("a < b link");
        let key = doc.first_block().key.clone();
        let (doc, link) = doc.create_entity(
            Entity::classed(EntityType::Link, "orange_insert-point").with("url", "https://x.test"),
        );
        let doc = doc
            .apply_entity(&SelectionState::in_block(key, 6, 10), Some(link))
            .unwrap();
        let options = ExportOptions {
            editor_key: Some(SmolStr::new("ed1")),
        };
        let html = render(&doc, &options).unwrap();
        assert_snapshot!(html, @r#"<p data-editor="ed1">a &lt; b <a href="https://x.test" class="orange_insert-point">link</a></p>"#);
    }

    #[test]
    fn test_render_then_parse_keeps_marks() {
        let doc = parse_default(
            r#"<p style="text-align: right">x <span data-style="red-dropdown_option">red</span> <a class="yellow-dropdown_option">hi</a></p>"#,
        );
        let again = parse_default(&render(&doc, &ExportOptions::default()).unwrap());
        let block = again.first_block();
        assert_eq!(block.text(), "x red hi");
        assert_eq!(block.data_str("textAlign"), Some("right"));
        assert!(block.chars()[2].has_style("red-dropdown_option"));
        let entity = again.entity(block.entity_at(6).unwrap()).unwrap();
        assert_eq!(entity.class_name(), Some("yellow-dropdown_option"));
    }
}
