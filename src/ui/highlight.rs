use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use eframe::egui::text::{LayoutJob, TextFormat};
use eframe::egui::{Color32, FontId};
use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, Theme as SyntectTheme, ThemeSet};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

const CACHE_LIMIT: usize = 256;

struct SyntectAssets {
    syntax_set: SyntaxSet,
    theme: SyntectTheme,
}

fn syntect_assets() -> &'static SyntectAssets {
    static ASSETS: OnceLock<SyntectAssets> = OnceLock::new();
    ASSETS.get_or_init(|| {
        let syntax_set = SyntaxSet::load_defaults_newlines();
        let mut theme_set = ThemeSet::load_defaults();
        let theme = theme_set
            .themes
            .remove("base16-ocean.dark")
            .or_else(|| theme_set.themes.into_values().next())
            .unwrap_or_default();
        SyntectAssets { syntax_set, theme }
    })
}

fn find_syntax<'a>(set: &'a SyntaxSet, language: &str) -> Option<&'a SyntaxReference> {
    if language.is_empty() {
        return None;
    }
    let token = match language {
        "javascript" => "js",
        "typescript" => "ts",
        "python" => "py",
        "markdown" => "md",
        other => other,
    };
    set.find_syntax_by_token(token)
        .or_else(|| set.find_syntax_by_extension(token))
}

/// Syntax highlighting into egui layout jobs, cached by source and language.
#[derive(Default)]
pub struct CodeHighlighter {
    cache: HashMap<u64, LayoutJob>,
}

impl CodeHighlighter {
    pub fn layout(&mut self, code: &str, language: &str, font: &FontId, fallback: Color32) -> LayoutJob {
        let mut hasher = DefaultHasher::new();
        code.hash(&mut hasher);
        language.hash(&mut hasher);
        font.size.to_bits().hash(&mut hasher);
        let key = hasher.finish();

        if let Some(job) = self.cache.get(&key) {
            return job.clone();
        }
        if self.cache.len() >= CACHE_LIMIT {
            self.cache.clear();
        }
        let job = highlight(code, language, font, fallback);
        self.cache.insert(key, job.clone());
        job
    }
}

/// Highlights `code`; unknown languages come back as plain monospace text.
pub fn highlight(code: &str, language: &str, font: &FontId, fallback: Color32) -> LayoutJob {
    let assets = syntect_assets();
    let mut job = LayoutJob::default();

    let Some(syntax) = find_syntax(&assets.syntax_set, language) else {
        job.append(code, 0.0, TextFormat::simple(font.clone(), fallback));
        return job;
    };

    let mut lines = HighlightLines::new(syntax, &assets.theme);
    for line in LinesWithEndings::from(code) {
        let ranges = match lines.highlight_line(line, &assets.syntax_set) {
            Ok(ranges) => ranges,
            Err(_) => {
                job.append(line, 0.0, TextFormat::simple(font.clone(), fallback));
                continue;
            }
        };
        for (style, text) in ranges {
            let color = style.foreground;
            let mut format = TextFormat::simple(
                font.clone(),
                Color32::from_rgb(color.r, color.g, color.b),
            );
            format.italics = style.font_style.contains(FontStyle::ITALIC);
            if style.font_style.contains(FontStyle::UNDERLINE) {
                format.underline = eframe::egui::Stroke::new(1.0, format.color);
            }
            job.append(text, 0.0, format);
        }
    }
    job
}
