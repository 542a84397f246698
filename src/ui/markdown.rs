//! Markdown rendering for chat entries and file previews.
//!
//! Parsing is split from painting: [`parse_blocks`] turns source text into a
//! flat list of [`Block`]s which [`show_blocks`] lays out with egui widgets.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use eframe::egui::text::{LayoutJob, TextFormat};
use eframe::egui::{self, Color32, CornerRadius, FontId, Frame, Margin, RichText, Stroke};
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

use crate::theme::Theme;
use crate::ui::highlight::CodeHighlighter;

const PARSED_LIMIT: usize = 512;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanStyle {
    pub strong: bool,
    pub emphasis: bool,
    pub code: bool,
    pub strike: bool,
    pub link: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub style: SpanStyle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, spans: Vec<Span> },
    Paragraph(Vec<Span>),
    Code { language: String, text: String },
    ListItem { depth: usize, marker: String, spans: Vec<Span> },
    Quote(Vec<Span>),
    Table { header: Vec<String>, rows: Vec<Vec<String>> },
    Rule,
}

#[derive(Default)]
struct TableBuilder {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: String,
}

#[derive(Default)]
struct BlockBuilder {
    blocks: Vec<Block>,
    spans: Vec<Span>,
    strong: usize,
    emphasis: usize,
    strike: usize,
    link: usize,
    heading: Option<u8>,
    quote: usize,
    lists: Vec<Option<u64>>,
    items: Vec<(usize, Option<String>)>,
    code: Option<(String, String)>,
    table: Option<TableBuilder>,
}

impl BlockBuilder {
    fn style(&self) -> SpanStyle {
        SpanStyle {
            strong: self.strong > 0 || self.heading.is_some(),
            emphasis: self.emphasis > 0,
            code: false,
            strike: self.strike > 0,
            link: self.link > 0,
        }
    }

    fn push_text(&mut self, text: &str, style: SpanStyle) {
        if let Some(table) = self.table.as_mut() {
            table.cell.push_str(text);
            return;
        }
        match self.spans.last_mut() {
            Some(last) if last.style == style => last.text.push_str(text),
            _ => self.spans.push(Span {
                text: text.to_string(),
                style,
            }),
        }
    }

    fn flush(&mut self) {
        if self.spans.is_empty() {
            return;
        }
        let spans = std::mem::take(&mut self.spans);
        let block = if let Some(level) = self.heading {
            Block::Heading { level, spans }
        } else if let Some((depth, marker)) = self.items.last_mut() {
            Block::ListItem {
                depth: *depth,
                marker: marker.take().unwrap_or_default(),
                spans,
            }
        } else if self.quote > 0 {
            Block::Quote(spans)
        } else {
            Block::Paragraph(spans)
        };
        self.blocks.push(block);
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {}
            Tag::Heading { level, .. } => {
                self.flush();
                self.heading = Some(level as u8);
            }
            Tag::BlockQuote { .. } => {
                self.flush();
                self.quote += 1;
            }
            Tag::CodeBlock(kind) => {
                self.flush();
                let language = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .unwrap_or_default()
                        .to_ascii_lowercase(),
                    CodeBlockKind::Indented => String::new(),
                };
                self.code = Some((language, String::new()));
            }
            Tag::List(start) => {
                self.flush();
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush();
                let depth = self.lists.len().saturating_sub(1);
                let marker = match self.lists.last_mut() {
                    Some(Some(next)) => {
                        let marker = format!("{next}.");
                        *next += 1;
                        marker
                    }
                    _ => "•".to_string(),
                };
                self.items.push((depth, Some(marker)));
            }
            Tag::Table(_) => {
                self.flush();
                self.table = Some(TableBuilder::default());
            }
            Tag::Emphasis => self.emphasis += 1,
            Tag::Strong => self.strong += 1,
            Tag::Strikethrough => self.strike += 1,
            Tag::Link { .. } => self.link += 1,
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.flush(),
            TagEnd::Heading(_) => {
                self.flush();
                self.heading = None;
            }
            TagEnd::BlockQuote { .. } => {
                self.flush();
                self.quote = self.quote.saturating_sub(1);
            }
            TagEnd::CodeBlock => {
                if let Some((language, mut text)) = self.code.take() {
                    if text.ends_with('\n') {
                        text.pop();
                    }
                    self.blocks.push(Block::Code { language, text });
                }
            }
            TagEnd::List(_) => {
                self.flush();
                self.lists.pop();
            }
            TagEnd::Item => {
                self.flush();
                self.items.pop();
            }
            TagEnd::TableHead => {
                if let Some(table) = self.table.as_mut() {
                    table.header = std::mem::take(&mut table.row);
                }
            }
            TagEnd::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    let row = std::mem::take(&mut table.row);
                    table.rows.push(row);
                }
            }
            TagEnd::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    let cell = std::mem::take(&mut table.cell);
                    table.row.push(cell.trim().to_string());
                }
            }
            TagEnd::Table => {
                if let Some(table) = self.table.take() {
                    self.blocks.push(Block::Table {
                        header: table.header,
                        rows: table.rows,
                    });
                }
            }
            TagEnd::Emphasis => self.emphasis = self.emphasis.saturating_sub(1),
            TagEnd::Strong => self.strong = self.strong.saturating_sub(1),
            TagEnd::Strikethrough => self.strike = self.strike.saturating_sub(1),
            TagEnd::Link => self.link = self.link.saturating_sub(1),
            _ => {}
        }
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => {
                if let Some((_, code)) = self.code.as_mut() {
                    code.push_str(&text);
                } else {
                    let style = self.style();
                    self.push_text(&text, style);
                }
            }
            Event::Code(text) => {
                let style = SpanStyle {
                    code: true,
                    ..self.style()
                };
                self.push_text(&text, style);
            }
            Event::Html(text) | Event::InlineHtml(text) => {
                let style = self.style();
                self.push_text(&text, style);
            }
            Event::SoftBreak => {
                let style = self.style();
                self.push_text(" ", style);
            }
            Event::HardBreak => {
                let style = self.style();
                self.push_text("\n", style);
            }
            Event::Rule => {
                self.flush();
                self.blocks.push(Block::Rule);
            }
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Block> {
        self.flush();
        self.blocks
    }
}

pub fn parse_blocks(source: &str) -> Vec<Block> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut builder = BlockBuilder::default();
    for event in Parser::new_ext(source, options) {
        builder.event(event);
    }
    builder.finish()
}

/// Keeps parsed blocks between frames so unchanged text is parsed once.
#[derive(Default)]
pub struct MarkdownCache {
    parsed: HashMap<u64, Arc<[Block]>>,
}

impl MarkdownCache {
    pub fn blocks(&mut self, source: &str) -> Arc<[Block]> {
        let mut hasher = DefaultHasher::new();
        source.hash(&mut hasher);
        let key = hasher.finish();

        if let Some(blocks) = self.parsed.get(&key) {
            return Arc::clone(blocks);
        }
        if self.parsed.len() >= PARSED_LIMIT {
            self.parsed.clear();
        }
        let blocks: Arc<[Block]> = parse_blocks(source).into();
        self.parsed.insert(key, Arc::clone(&blocks));
        blocks
    }
}

fn heading_size(level: u8) -> f32 {
    match level {
        1 => 22.0,
        2 => 19.0,
        3 => 17.0,
        _ => 15.0,
    }
}

fn spans_job(spans: &[Span], theme: &Theme, size: f32, base: Color32) -> LayoutJob {
    let mut job = LayoutJob::default();
    for span in spans {
        let font = if span.style.code {
            FontId::monospace(size - 1.0)
        } else {
            FontId::proportional(size)
        };
        let color = if span.style.link {
            theme.accent_primary
        } else if span.style.strong {
            theme.text_on_accent
        } else {
            base
        };
        let mut format = TextFormat::simple(font, color);
        format.italics = span.style.emphasis;
        if span.style.code {
            format.background = theme.surface_3;
        }
        if span.style.strike {
            format.strikethrough = Stroke::new(1.0, color);
        }
        if span.style.link {
            format.underline = Stroke::new(1.0, color);
        }
        job.append(&span.text, 0.0, format);
    }
    job
}

fn show_code(
    ui: &mut egui::Ui,
    theme: &Theme,
    highlighter: &mut CodeHighlighter,
    language: &str,
    text: &str,
) {
    Frame::new()
        .fill(theme.surface_0)
        .inner_margin(Margin::same(theme.spacing_8 as i8))
        .corner_radius(CornerRadius::same(theme.radius_8))
        .show(ui, |ui| {
            ui.set_width(ui.available_width());
            if !language.is_empty() {
                ui.label(RichText::new(language).color(theme.text_muted).size(11.0));
            }
            let job = highlighter.layout(text, language, &FontId::monospace(13.0), theme.text_primary);
            ui.label(job);
        });
}

fn show_table(ui: &mut egui::Ui, theme: &Theme, index: usize, header: &[String], rows: &[Vec<String>]) {
    Frame::new()
        .stroke(Stroke::new(1.0, theme.border_subtle))
        .inner_margin(Margin::same(theme.spacing_4 as i8))
        .corner_radius(CornerRadius::same(theme.radius_8))
        .show(ui, |ui| {
            egui::Grid::new(ui.id().with(("markdown_table", index)))
                .striped(true)
                .spacing([theme.spacing_12, theme.spacing_4])
                .show(ui, |ui| {
                    for cell in header {
                        ui.label(RichText::new(cell).strong().color(theme.text_on_accent));
                    }
                    ui.end_row();
                    for row in rows {
                        for cell in row {
                            ui.label(RichText::new(cell).color(theme.text_primary));
                        }
                        ui.end_row();
                    }
                });
        });
}

pub fn show_blocks(
    ui: &mut egui::Ui,
    theme: &Theme,
    highlighter: &mut CodeHighlighter,
    blocks: &[Block],
) {
    ui.spacing_mut().item_spacing.y = theme.spacing_4;
    for (index, block) in blocks.iter().enumerate() {
        match block {
            Block::Heading { level, spans } => {
                ui.add_space(theme.spacing_4);
                ui.label(spans_job(spans, theme, heading_size(*level), theme.text_on_accent));
            }
            Block::Paragraph(spans) => {
                ui.label(spans_job(spans, theme, 14.0, theme.text_primary));
            }
            Block::Code { language, text } => show_code(ui, theme, highlighter, language, text),
            Block::ListItem {
                depth,
                marker,
                spans,
            } => {
                ui.horizontal_top(|ui| {
                    ui.add_space(theme.spacing_16 * (*depth as f32 + 1.0));
                    let marker = if marker.is_empty() { " " } else { marker.as_str() };
                    ui.label(RichText::new(marker).color(theme.text_muted));
                    ui.label(spans_job(spans, theme, 14.0, theme.text_primary));
                });
            }
            Block::Quote(spans) => {
                Frame::new()
                    .fill(theme.surface_2)
                    .inner_margin(Margin::symmetric(theme.spacing_12 as i8, theme.spacing_4 as i8))
                    .corner_radius(CornerRadius::same(theme.radius_8))
                    .show(ui, |ui| {
                        ui.label(spans_job(spans, theme, 14.0, theme.text_muted));
                    });
            }
            Block::Table { header, rows } => show_table(ui, theme, index, header, rows),
            Block::Rule => {
                ui.separator();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(spans: &[Span]) -> String {
        spans.iter().map(|span| span.text.as_str()).collect()
    }

    #[test]
    fn headings_and_inline_styles() {
        let blocks = parse_blocks("## Plan\n\nRun **fast** and `cargo` ~~never~~.");
        assert_eq!(blocks.len(), 2);

        let Block::Heading { level, spans } = &blocks[0] else {
            panic!("expected heading, got {:?}", blocks[0]);
        };
        assert_eq!(*level, 2);
        assert_eq!(plain(spans), "Plan");

        let Block::Paragraph(spans) = &blocks[1] else {
            panic!("expected paragraph, got {:?}", blocks[1]);
        };
        assert_eq!(plain(spans), "Run fast and cargo never.");
        assert!(spans.iter().any(|span| span.text == "fast" && span.style.strong));
        assert!(spans.iter().any(|span| span.text == "cargo" && span.style.code));
        assert!(spans.iter().any(|span| span.text == "never" && span.style.strike));
    }

    #[test]
    fn fenced_code_keeps_language_and_text() {
        let blocks = parse_blocks("```Python title\nprint('hi')\n```\n");
        assert_eq!(
            blocks,
            vec![Block::Code {
                language: "python".to_string(),
                text: "print('hi')".to_string(),
            }]
        );
    }

    #[test]
    fn nested_lists_number_and_indent() {
        let blocks = parse_blocks("1. one\n2. two\n   - inner\n");
        let items: Vec<(usize, String, String)> = blocks
            .iter()
            .filter_map(|block| match block {
                Block::ListItem {
                    depth,
                    marker,
                    spans,
                } => Some((*depth, marker.clone(), plain(spans))),
                _ => None,
            })
            .collect();
        assert_eq!(
            items,
            vec![
                (0, "1.".to_string(), "one".to_string()),
                (0, "2.".to_string(), "two".to_string()),
                (1, "•".to_string(), "inner".to_string()),
            ]
        );
    }

    #[test]
    fn tables_collect_header_and_rows() {
        let blocks = parse_blocks("| 指标 | 数量 |\n| --- | --- |\n| 输入 | 10 |\n| 输出 | 5 |\n");
        assert_eq!(
            blocks,
            vec![Block::Table {
                header: vec!["指标".to_string(), "数量".to_string()],
                rows: vec![
                    vec!["输入".to_string(), "10".to_string()],
                    vec!["输出".to_string(), "5".to_string()],
                ],
            }]
        );
    }

    #[test]
    fn quotes_and_rules() {
        let blocks = parse_blocks("> careful\n\n---\n\nafter");
        assert!(matches!(&blocks[0], Block::Quote(spans) if plain(spans) == "careful"));
        assert_eq!(blocks[1], Block::Rule);
        assert!(matches!(&blocks[2], Block::Paragraph(spans) if plain(spans) == "after"));
    }

    #[test]
    fn hard_breaks_become_newlines() {
        let blocks = parse_blocks("first  \nsecond");
        let Block::Paragraph(spans) = &blocks[0] else {
            panic!("expected paragraph, got {:?}", blocks[0]);
        };
        assert_eq!(plain(spans), "first\nsecond");
    }

    #[test]
    fn cache_reuses_parsed_blocks() {
        let mut cache = MarkdownCache::default();
        let first = cache.blocks("# hi");
        let second = cache.blocks("# hi");
        assert!(Arc::ptr_eq(&first, &second));
    }
}
