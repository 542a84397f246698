pub mod chat_panel;
pub mod editor_panel;
pub mod highlight;
pub mod markdown;
pub mod overlay;
pub mod tree_panel;

use eframe::egui::{self, FontId, RichText};

use crate::theme::Theme;
use highlight::CodeHighlighter;
use markdown::MarkdownCache;

/// Per-frame caches shared by everything that paints file or chat content.
#[derive(Default)]
pub struct ContentRenderer {
    markdown: MarkdownCache,
    code: CodeHighlighter,
}

impl ContentRenderer {
    pub fn markdown(&mut self, ui: &mut egui::Ui, theme: &Theme, source: &str) {
        let blocks = self.markdown.blocks(source);
        ui.vertical(|ui| markdown::show_blocks(ui, theme, &mut self.code, &blocks));
    }

    pub fn code(&mut self, ui: &mut egui::Ui, theme: &Theme, language: &str, source: &str) {
        let job = self
            .code
            .layout(source, language, &FontId::monospace(13.0), theme.text_primary);
        ui.label(job);
    }

    pub fn plain(&self, ui: &mut egui::Ui, theme: &Theme, source: &str) {
        ui.label(
            RichText::new(source)
                .monospace()
                .size(13.0)
                .color(theme.text_primary),
        );
    }

    pub fn highlighter(&mut self) -> &mut CodeHighlighter {
        &mut self.code
    }
}
