use crate::canvas::{Canvas, Document, FontId, FontTable, Page};
use crate::decoration::{PageEvent, PageEventHandler};
use crate::diagnostics::Diagnostics;
use crate::error::ConvertError;
use crate::font::{FontCatalog, FontKey, FontRequest, FontSource};
use crate::types::{Margins, Pt, Size};
use kuchiki::traits::TendrilSink;
use kuchiki::{NodeData, NodeRef};
use std::collections::HashMap;
use std::sync::Arc;

/// Everything a layout engine needs to compose pages.
pub struct LayoutRequest<'a> {
    pub markup: &'a str,
    pub catalog: &'a FontCatalog,
    pub page_size: Size,
    pub margins: Margins,
    pub content_offset: (Pt, Pt),
}

/// Turns normalized markup into finalized pages. Engines allocate pages
/// through the sink and hand each one over with [`PageSink::finish_page`].
pub trait LayoutEngine: Send + Sync {
    fn layout(&self, request: &LayoutRequest<'_>, sink: &mut PageSink<'_>)
    -> Result<(), ConvertError>;
}

/// Collects finished pages, assigns ordinals and runs the decoration
/// handlers on each page as it is finalized.
pub struct PageSink<'a> {
    document: Document,
    handlers: &'a [Arc<dyn PageEventHandler>],
    font_source: &'a dyn FontSource,
    cjk_font: &'a str,
    diagnostics: &'a dyn Diagnostics,
}

impl<'a> PageSink<'a> {
    pub fn new(
        page_size: Size,
        handlers: &'a [Arc<dyn PageEventHandler>],
        font_source: &'a dyn FontSource,
        cjk_font: &'a str,
        diagnostics: &'a dyn Diagnostics,
    ) -> Self {
        Self {
            document: Document::new(page_size),
            handlers,
            font_source,
            cjk_font,
            diagnostics,
        }
    }

    pub fn page_size(&self) -> Size {
        self.document.page_size
    }

    pub fn fonts_mut(&mut self) -> &mut FontTable {
        &mut self.document.fonts
    }

    pub fn pages_finished(&self) -> usize {
        self.document.pages.len()
    }

    /// Seals the canvas into the next page and dispatches every handler on it,
    /// in registration order. Returns the page's 1-based number.
    pub fn finish_page(&mut self, canvas: Canvas) -> usize {
        let number = self.document.pages.len() + 1;
        let mut page = Page::new(number, self.document.page_size, canvas.into_commands());
        for handler in self.handlers {
            let mut event = PageEvent {
                page: &mut page,
                fonts: &mut self.document.fonts,
                font_source: self.font_source,
                cjk_font: self.cjk_font,
                diagnostics: self.diagnostics,
            };
            handler.on_page_finalized(&mut event);
        }
        self.document.pages.push(page);
        number
    }

    pub fn into_document(self) -> Document {
        self.document
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Inline {
    Text { text: String, bold: bool },
    Break,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Paragraph,
    Heading(u8),
    ListItem,
    Preformatted,
}

#[derive(Debug, Clone, PartialEq)]
struct Block {
    kind: BlockKind,
    inlines: Vec<Inline>,
}

const SKIPPED_TAGS: &[&str] = &["head", "script", "style", "title", "noscript", "template"];

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "header", "hr", "li", "main", "nav", "ol", "p", "pre", "section", "table",
    "tbody", "tfoot", "thead", "tr", "ul", "h1", "h2", "h3", "h4", "h5", "h6",
];

#[derive(Default)]
struct BlockCollector {
    blocks: Vec<Block>,
    current: Vec<Inline>,
    kind_stack: Vec<BlockKind>,
}

#[derive(Clone, Copy, Default)]
struct InlineContext {
    bold: bool,
    pre: bool,
}

impl BlockCollector {
    fn kind(&self) -> BlockKind {
        self.kind_stack.last().copied().unwrap_or(BlockKind::Paragraph)
    }

    fn push_text(&mut self, text: &str, bold: bool) {
        if text.is_empty() {
            return;
        }
        if let Some(Inline::Text {
            text: last,
            bold: last_bold,
        }) = self.current.last_mut()
        {
            if *last_bold == bold {
                last.push_str(text);
                return;
            }
        }
        self.current.push(Inline::Text {
            text: text.to_string(),
            bold,
        });
    }

    fn flush(&mut self) {
        let mut inlines = std::mem::take(&mut self.current);
        let kind = self.kind();
        if kind != BlockKind::Preformatted {
            trim_inlines(&mut inlines);
        }
        let has_text = inlines.iter().any(|inline| match inline {
            Inline::Text { text, .. } => !text.trim().is_empty(),
            Inline::Break => false,
        });
        if !has_text {
            return;
        }
        if kind == BlockKind::ListItem {
            inlines.insert(
                0,
                Inline::Text {
                    text: "\u{2022} ".to_string(),
                    bold: false,
                },
            );
        }
        self.blocks.push(Block { kind, inlines });
    }

    fn walk(&mut self, node: &NodeRef, ctx: InlineContext) {
        match node.data() {
            NodeData::Text(text) => {
                let text = text.borrow();
                if ctx.pre {
                    for (idx, line) in text.split('\n').enumerate() {
                        if idx > 0 {
                            self.current.push(Inline::Break);
                        }
                        self.push_text(line, ctx.bold);
                    }
                } else {
                    let collapsed = collapse_whitespace(&text);
                    let collapsed = match self.current.last() {
                        Some(Inline::Text { text, .. }) if text.ends_with(' ') => {
                            collapsed.trim_start().to_string()
                        }
                        None | Some(Inline::Break) => collapsed.trim_start().to_string(),
                        _ => collapsed,
                    };
                    self.push_text(&collapsed, ctx.bold);
                }
            }
            NodeData::Element(element) => {
                let tag = element.name.local.as_ref().to_ascii_lowercase();
                if SKIPPED_TAGS.contains(&tag.as_str()) {
                    return;
                }
                if tag == "br" {
                    self.current.push(Inline::Break);
                    return;
                }
                let mut child_ctx = ctx;
                if matches!(tag.as_str(), "b" | "strong" | "th") {
                    child_ctx.bold = true;
                }
                if BLOCK_TAGS.contains(&tag.as_str()) {
                    let kind = match tag.as_str() {
                        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                            child_ctx.bold = true;
                            BlockKind::Heading(tag.as_bytes()[1] - b'0')
                        }
                        "li" => BlockKind::ListItem,
                        "pre" => {
                            child_ctx.pre = true;
                            BlockKind::Preformatted
                        }
                        _ => self.kind(),
                    };
                    self.flush();
                    self.kind_stack.push(kind);
                    for child in node.children() {
                        self.walk(&child, child_ctx);
                    }
                    self.flush();
                    self.kind_stack.pop();
                } else {
                    for child in node.children() {
                        self.walk(&child, child_ctx);
                    }
                    if matches!(tag.as_str(), "td" | "th") {
                        self.push_text(" ", child_ctx.bold);
                    }
                }
            }
            _ => {
                for child in node.children() {
                    self.walk(&child, ctx);
                }
            }
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() && ch != '\u{00A0}' && ch != '\u{3000}' {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

fn trim_inlines(inlines: &mut Vec<Inline>) {
    while matches!(inlines.first(), Some(Inline::Break)) {
        inlines.remove(0);
    }
    while matches!(inlines.last(), Some(Inline::Break)) {
        inlines.pop();
    }
    if let Some(Inline::Text { text, .. }) = inlines.first_mut() {
        *text = text.trim_start().to_string();
    }
    if let Some(Inline::Text { text, .. }) = inlines.last_mut() {
        *text = text.trim_end().to_string();
    }
}

fn collect_blocks(markup: &str) -> Vec<Block> {
    let document = kuchiki::parse_html().one(markup);
    let mut collector = BlockCollector::default();
    collector.walk(&document, InlineContext::default());
    collector.flush();
    collector.blocks
}

fn is_cjk(ch: char) -> bool {
    matches!(
        ch as u32,
        0x2E80..=0x9FFF
            | 0xAC00..=0xD7AF
            | 0xF900..=0xFAFF
            | 0xFE30..=0xFE4F
            | 0xFF00..=0xFFEF
            | 0x20000..=0x2FA1F
    )
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    text: String,
    bold: bool,
    space_before: bool,
    hard_break: bool,
}

fn tokenize(inlines: &[Inline], preserve_spaces: bool) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut pending_space = false;
    for inline in inlines {
        match inline {
            Inline::Break => {
                tokens.push(Token {
                    text: String::new(),
                    bold: false,
                    space_before: false,
                    hard_break: true,
                });
                pending_space = false;
            }
            Inline::Text { text, bold } => {
                let mut word = String::new();
                let flush = |word: &mut String, pending: &mut bool, tokens: &mut Vec<Token>| {
                    if !word.is_empty() {
                        tokens.push(Token {
                            text: std::mem::take(word),
                            bold: *bold,
                            space_before: *pending,
                            hard_break: false,
                        });
                        *pending = false;
                    }
                };
                for ch in text.chars() {
                    if ch == ' ' && !preserve_spaces {
                        flush(&mut word, &mut pending_space, &mut tokens);
                        pending_space = true;
                    } else if is_cjk(ch) {
                        flush(&mut word, &mut pending_space, &mut tokens);
                        word.push(ch);
                        flush(&mut word, &mut pending_space, &mut tokens);
                    } else {
                        word.push(ch);
                    }
                }
                flush(&mut word, &mut pending_space, &mut tokens);
            }
        }
    }
    tokens
}

/// Built-in engine: block text only, greedy line filling, CJK text may break
/// between any two characters.
#[derive(Debug, Clone)]
pub struct FlowLayout {
    base_size: f32,
    padding: f32,
    family: Option<String>,
}

impl Default for FlowLayout {
    fn default() -> Self {
        Self {
            base_size: 12.0,
            padding: 36.0,
            family: None,
        }
    }
}

impl FlowLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_size(mut self, size: f32) -> Self {
        self.base_size = size;
        self
    }

    pub fn with_padding(mut self, padding: f32) -> Self {
        self.padding = padding;
        self
    }

    /// Family requested for body text; the catalog default when unset.
    pub fn with_family(mut self, family: impl Into<String>) -> Self {
        self.family = Some(family.into());
        self
    }

    fn font_size(&self, kind: BlockKind) -> Pt {
        let scale = match kind {
            BlockKind::Heading(1) => 2.0,
            BlockKind::Heading(2) => 1.5,
            BlockKind::Heading(3) => 1.25,
            BlockKind::Heading(4) => 1.1,
            BlockKind::Heading(5) => 1.0,
            BlockKind::Heading(_) => 0.9,
            _ => 1.0,
        };
        Pt::from_f32(self.base_size * scale)
    }
}

struct FlowState<'r, 's, 'a> {
    request: &'r LayoutRequest<'r>,
    sink: &'s mut PageSink<'a>,
    canvas: Canvas,
    font_ids: HashMap<FontKey, FontId>,
    left: Pt,
    right: Pt,
    top: Pt,
    bottom: Pt,
    cursor_y: Pt,
    lines_on_page: usize,
}

impl FlowState<'_, '_, '_> {
    fn fresh_canvas(offset: (Pt, Pt)) -> Canvas {
        let mut canvas = Canvas::new();
        if offset != (Pt::ZERO, Pt::ZERO) {
            canvas.translate(offset.0, offset.1);
        }
        canvas
    }

    fn font_id(&mut self, key: FontKey) -> FontId {
        if let Some(id) = self.font_ids.get(&key) {
            return *id;
        }
        let id = self
            .sink
            .fonts_mut()
            .register(self.request.catalog.program(key));
        self.font_ids.insert(key, id);
        id
    }

    fn has_content(&self) -> bool {
        self.lines_on_page > 0
    }

    fn break_page(&mut self) {
        let canvas = std::mem::replace(
            &mut self.canvas,
            Self::fresh_canvas(self.request.content_offset),
        );
        self.sink.finish_page(canvas);
        self.cursor_y = self.top;
        self.lines_on_page = 0;
    }

    fn place_line(&mut self, line: &[Token], keys: (FontKey, FontKey), size: Pt, line_height: Pt) {
        if self.has_content() && self.cursor_y - line_height < self.bottom {
            self.break_page();
        }
        let catalog = self.request.catalog;
        let baseline = self.cursor_y - size;
        let mut x = self.left;
        for (idx, token) in line.iter().enumerate() {
            let key = if token.bold { keys.1 } else { keys.0 };
            if token.space_before && idx > 0 {
                x += catalog.measure(key, size, " ");
            }
            for run in catalog.split_runs(key, &token.text) {
                let font = self.font_id(run.font);
                self.canvas.set_font(font, size);
                let width = catalog.program(run.font).measure(size, &run.text);
                self.canvas.draw_string(x, baseline, run.text);
                x += width;
            }
        }
        self.cursor_y = self.cursor_y - line_height;
        self.lines_on_page += 1;
    }
}

fn wrap(
    tokens: Vec<Token>,
    catalog: &FontCatalog,
    keys: (FontKey, FontKey),
    size: Pt,
    available: Pt,
) -> Vec<Vec<Token>> {
    let mut lines: Vec<Vec<Token>> = Vec::new();
    let mut line: Vec<Token> = Vec::new();
    let mut width = Pt::ZERO;
    let key_for = |bold: bool| if bold { keys.1 } else { keys.0 };

    for token in tokens {
        if token.hard_break {
            lines.push(std::mem::take(&mut line));
            width = Pt::ZERO;
            continue;
        }
        let key = key_for(token.bold);
        let space = if token.space_before && !line.is_empty() {
            catalog.measure(key, size, " ")
        } else {
            Pt::ZERO
        };
        let token_width = catalog.measure(key, size, &token.text);
        if !line.is_empty() && width + space + token_width > available {
            lines.push(std::mem::take(&mut line));
            width = Pt::ZERO;
        }
        if line.is_empty() && token_width > available {
            // Hard-split a single overlong word.
            let mut chunk = String::new();
            let mut chunk_width = Pt::ZERO;
            for ch in token.text.chars() {
                let ch_width = catalog.measure(key, size, ch.encode_utf8(&mut [0u8; 4]));
                if !chunk.is_empty() && chunk_width + ch_width > available {
                    lines.push(vec![Token {
                        text: std::mem::take(&mut chunk),
                        bold: token.bold,
                        space_before: false,
                        hard_break: false,
                    }]);
                    chunk_width = Pt::ZERO;
                }
                chunk.push(ch);
                chunk_width += ch_width;
            }
            if !chunk.is_empty() {
                line.push(Token {
                    text: chunk,
                    bold: token.bold,
                    space_before: false,
                    hard_break: false,
                });
                width = chunk_width;
            }
            continue;
        }
        let space = if line.is_empty() { Pt::ZERO } else { space };
        width = width + space + token_width;
        line.push(token);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

impl LayoutEngine for FlowLayout {
    fn layout(
        &self,
        request: &LayoutRequest<'_>,
        sink: &mut PageSink<'_>,
    ) -> Result<(), ConvertError> {
        let size = request.page_size;
        let inner_width = size.width - request.margins.left - request.margins.right;
        let inner_height = size.height - request.margins.top - request.margins.bottom;
        // Padding never takes more than half of either inner dimension.
        let padding = Pt::from_f32(self.padding)
            .min(inner_width.mul_ratio(1, 4))
            .min(inner_height.mul_ratio(1, 4))
            .max(Pt::ZERO);
        let left = request.margins.left + padding;
        let right = size.width - request.margins.right - padding;
        let top = size.height - request.margins.top - padding;
        let bottom = request.margins.bottom + padding;
        if right <= left || top <= bottom {
            return Err(ConvertError::Render(format!(
                "page {}x{} pt leaves no room for content",
                size.width.to_f32(),
                size.height.to_f32()
            )));
        }

        let catalog = request.catalog;
        let family = self
            .family
            .clone()
            .unwrap_or_else(|| catalog.default_family().to_string());
        let keys = (
            catalog.resolve(&FontRequest::new(family.clone(), false)),
            catalog.resolve(&FontRequest::new(family, true)),
        );

        let blocks = collect_blocks(request.markup);
        log::debug!(
            target: crate::diagnostics::LOG_TARGET,
            "flow layout: {} blocks",
            blocks.len()
        );

        let mut state = FlowState {
            request,
            sink,
            canvas: FlowState::fresh_canvas(request.content_offset),
            font_ids: HashMap::new(),
            left,
            right,
            top,
            bottom,
            cursor_y: top,
            lines_on_page: 0,
        };

        for block in blocks {
            let font_size = self.font_size(block.kind);
            let line_height = catalog
                .line_height(keys.0, font_size)
                .max(font_size * 1.2);
            let tokens = tokenize(&block.inlines, block.kind == BlockKind::Preformatted);
            let available = state.right - state.left;
            for line in wrap(tokens, catalog, keys, font_size, available) {
                state.place_line(&line, keys, font_size, line_height);
            }
            state.cursor_y = state.cursor_y - font_size.mul_ratio(1, 2);
        }

        let canvas = std::mem::take(&mut state.canvas);
        if state.has_content() || state.sink.pages_finished() == 0 {
            state.sink.finish_page(canvas);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;
    use crate::decoration::{FooterHandler, HeaderHandler, WatermarkHandler};
    use crate::diagnostics::RecordingDiagnostics;
    use crate::font::FontResolver;
    use crate::test_support::TestFontSource;

    fn builtin_catalog() -> FontCatalog {
        FontResolver::new(
            Arc::new(TestFontSource::builtin_only()),
            Arc::new(RecordingDiagnostics::new()),
        )
        .resolve(None)
        .expect("catalog")
    }

    fn cjk_catalog() -> FontCatalog {
        FontResolver::new(
            Arc::new(TestFontSource::bundled()),
            Arc::new(RecordingDiagnostics::new()),
        )
        .resolve(None)
        .expect("catalog")
    }

    fn run_layout(
        markup: &str,
        catalog: &FontCatalog,
        size: Size,
        handlers: &[Arc<dyn PageEventHandler>],
    ) -> Document {
        let source = TestFontSource::bundled();
        let diag = RecordingDiagnostics::new();
        let mut sink = PageSink::new(size, handlers, &source, "STSongStd-Light", &diag);
        let request = LayoutRequest {
            markup,
            catalog,
            page_size: size,
            margins: Margins::ZERO,
            content_offset: (Pt::ZERO, Pt::ZERO),
        };
        FlowLayout::new()
            .layout(&request, &mut sink)
            .expect("layout");
        sink.into_document()
    }

    fn drawn_text(doc: &Document) -> String {
        doc.pages
            .iter()
            .flat_map(|page| page.content().iter())
            .filter_map(|c| match c {
                Command::DrawString { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("|")
    }

    #[test]
    fn blocks_follow_markup_structure() {
        let blocks = collect_blocks(
            "<html><head><title>t</title><style>p{}</style></head>\
             <body><h1>Title</h1><p>Hello <b>bold</b>\n  world</p><ul><li>one</li></ul></body></html>",
        );
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].kind, BlockKind::Heading(1));
        assert_eq!(
            blocks[1].inlines,
            vec![
                Inline::Text {
                    text: "Hello ".to_string(),
                    bold: false
                },
                Inline::Text {
                    text: "bold".to_string(),
                    bold: true
                },
                Inline::Text {
                    text: " world".to_string(),
                    bold: false
                },
            ]
        );
        assert_eq!(blocks[2].kind, BlockKind::ListItem);
    }

    #[test]
    fn cjk_text_tokenizes_per_char() {
        let tokens = tokenize(
            &[Inline::Text {
                text: "ab 中文c".to_string(),
                bold: false,
            }],
            false,
        );
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["ab", "中", "文", "c"]);
        assert!(tokens[1].space_before);
        assert!(!tokens[2].space_before);
    }

    #[test]
    fn empty_markup_still_produces_one_page() {
        let doc = run_layout("", &builtin_catalog(), Size::a4(), &[]);
        assert_eq!(doc.page_count(), 1);
        assert_eq!(doc.pages[0].number(), 1);
    }

    #[test]
    fn tiny_pages_shrink_the_padding() {
        let size = Size::from_mm(25.0, 25.0);
        let doc = run_layout("<p>x</p>", &builtin_catalog(), size, &[]);
        assert_eq!(doc.page_count(), 1);
        assert_eq!(drawn_text(&doc), "x");
        let quarter = size.width.mul_ratio(1, 4);
        for cmd in doc.pages[0].content() {
            if let Command::DrawString { x, y, .. } = cmd {
                assert_eq!(*x, quarter);
                assert!(*y > Pt::ZERO && *y < size.height);
            }
        }
    }

    #[test]
    fn long_documents_paginate() {
        let markup: String = (0..200).map(|i| format!("<p>Paragraph {i}</p>")).collect();
        let doc = run_layout(&markup, &builtin_catalog(), Size::from_mm(100.0, 105.0), &[]);
        assert!(doc.page_count() > 1);
        for (idx, page) in doc.pages.iter().enumerate() {
            assert_eq!(page.number(), idx + 1);
            for cmd in page.content() {
                if let Command::DrawString { y, .. } = cmd {
                    assert!(*y >= Pt::ZERO);
                }
            }
        }
        assert!(drawn_text(&doc).contains("Paragraph|199"));
    }

    #[test]
    fn wide_lines_wrap_inside_the_page() {
        let words = vec!["word"; 100].join(" ");
        let doc = run_layout(&format!("<p>{words}</p>"), &builtin_catalog(), Size::a4(), &[]);
        let mut baselines: Vec<Pt> = Vec::new();
        for cmd in doc.pages[0].content() {
            if let Command::DrawString { y, .. } = cmd {
                if !baselines.contains(y) {
                    baselines.push(*y);
                }
            }
        }
        assert!(baselines.len() > 1);
    }

    #[test]
    fn mixed_text_uses_fallback_fonts() {
        let doc = run_layout("<p>abc 中文</p>", &cjk_catalog(), Size::a4(), &[]);
        assert_eq!(doc.fonts.len(), 1);
        assert_eq!(drawn_text(&doc), "abc|中|文");
    }

    #[test]
    fn handlers_run_once_per_page_in_order() {
        let handlers: Vec<Arc<dyn PageEventHandler>> = vec![
            Arc::new(HeaderHandler::new("H")),
            Arc::new(FooterHandler::new("F")),
            Arc::new(WatermarkHandler::new("W")),
        ];
        let markup: String = (0..200).map(|i| format!("<p>Line {i}</p>")).collect();
        let doc = run_layout(&markup, &builtin_catalog(), Size::a4(), &handlers);
        assert!(doc.page_count() >= 2);
        // Watermark only on page 1; on later pages the watermark layer was
        // prepended last and therefore paints first.
        assert_eq!(doc.pages[0].prepended().len(), 1);
        let second = &doc.pages[1];
        assert_eq!(second.prepended().len(), 3);
        assert!(second.prepended()[0]
            .iter()
            .any(|c| matches!(c, Command::SetOpacity { .. })));
        let footer_text = second.prepended()[1].iter().any(
            |c| matches!(c, Command::DrawString { text, .. } if text == "F"),
        );
        assert!(footer_text);
    }

    #[test]
    fn content_offset_translates_every_page() {
        let source = TestFontSource::bundled();
        let diag = RecordingDiagnostics::new();
        let catalog = builtin_catalog();
        let mut sink = PageSink::new(Size::a4(), &[], &source, "STSongStd-Light", &diag);
        let request = LayoutRequest {
            markup: "<p>x</p>",
            catalog: &catalog,
            page_size: Size::a4(),
            margins: Margins::ZERO,
            content_offset: (Pt::from_i32(5), Pt::from_i32(-3)),
        };
        FlowLayout::new().layout(&request, &mut sink).expect("layout");
        let doc = sink.into_document();
        assert_eq!(
            doc.pages[0].content()[0],
            Command::Translate(Pt::from_i32(5), Pt::from_i32(-3))
        );
    }
}
