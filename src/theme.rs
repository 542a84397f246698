use std::path::{Path, PathBuf};
use std::sync::Arc;

use eframe::egui::{
    self, Color32, CornerRadius, FontData, FontDefinitions, FontFamily, FontId, Frame, Margin,
    Stroke, TextStyle,
};
use tracing::{debug, info, warn};

use crate::format::LogKind;
use crate::state::toast::ToastLevel;

const CJK_FONT_NAME: &str = "cjk";

/// System fonts tried for CJK coverage, in order of preference.
const CJK_FONT_CANDIDATES: [&str; 8] = [
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/google-noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
    "/usr/share/fonts/wenquanyi/wqy-microhei/wqy-microhei.ttc",
    "/System/Library/Fonts/PingFang.ttc",
    "/System/Library/Fonts/STHeiti Light.ttc",
    "C:\\Windows\\Fonts\\msyh.ttc",
];

#[derive(Debug, Clone)]
pub struct Theme {
    pub surface_0: Color32,
    pub surface_1: Color32,
    pub surface_2: Color32,
    pub surface_3: Color32,
    pub accent_primary: Color32,
    pub accent_muted: Color32,
    pub success: Color32,
    pub warning: Color32,
    pub danger: Color32,
    pub info: Color32,
    pub text_primary: Color32,
    pub text_muted: Color32,
    pub text_on_accent: Color32,
    pub border_subtle: Color32,
    pub hover_overlay: Color32,
    pub tree_active_fill: Color32,
    pub user_bubble: Color32,
    pub spacing_4: f32,
    pub spacing_8: f32,
    pub spacing_12: f32,
    pub spacing_16: f32,
    pub radius_8: u8,
    pub radius_10: u8,
    pub radius_12: u8,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            surface_0: Color32::from_rgb(0x0F, 0x11, 0x15),
            surface_1: Color32::from_rgb(0x16, 0x1A, 0x20),
            surface_2: Color32::from_rgb(0x1C, 0x22, 0x2B),
            surface_3: Color32::from_rgb(0x22, 0x2A, 0x35),
            accent_primary: Color32::from_rgb(0x3B, 0x82, 0xF6),
            accent_muted: Color32::from_rgb(0x2F, 0x6E, 0xD8),
            success: Color32::from_rgb(0x22, 0xC5, 0x5E),
            warning: Color32::from_rgb(0xF5, 0x9E, 0x0B),
            danger: Color32::from_rgb(0xEF, 0x44, 0x44),
            info: Color32::from_rgb(0x38, 0xBD, 0xF8),
            text_primary: Color32::from_rgb(0xE6, 0xED, 0xF3),
            text_muted: Color32::from_rgb(0x8B, 0x94, 0x9E),
            text_on_accent: Color32::from_rgb(0xF8, 0xFB, 0xFF),
            border_subtle: Color32::from_rgba_premultiplied(255, 255, 255, 13),
            hover_overlay: Color32::from_rgba_premultiplied(255, 255, 255, 10),
            tree_active_fill: Color32::from_rgba_premultiplied(0x2F, 0x6E, 0xD8, 160),
            user_bubble: Color32::from_rgb(0x1E, 0x3A, 0x5F),
            spacing_4: 4.0,
            spacing_8: Self::P8,
            spacing_12: Self::P12,
            spacing_16: Self::P16,
            radius_8: Self::R8,
            radius_10: 10,
            radius_12: Self::R12,
        }
    }
}

impl Theme {
    pub const R8: u8 = 8;
    pub const R12: u8 = 12;
    pub const P8: f32 = 8.0;
    pub const P12: f32 = 12.0;
    pub const P16: f32 = 16.0;

    pub fn apply_visuals(&self, ctx: &egui::Context) {
        let mut visuals = egui::Visuals::dark();
        visuals.panel_fill = self.surface_1;
        visuals.override_text_color = Some(self.text_primary);
        visuals.widgets.noninteractive.fg_stroke.color = self.text_primary;
        visuals.widgets.noninteractive.bg_fill = self.surface_2;
        visuals.widgets.noninteractive.weak_bg_fill = self.surface_2;
        visuals.widgets.noninteractive.bg_stroke = Stroke::new(1.0, self.border_subtle);
        visuals.widgets.inactive.bg_fill = self.surface_2;
        visuals.widgets.inactive.fg_stroke.color = self.text_primary;
        visuals.widgets.inactive.bg_stroke = Stroke::NONE;
        visuals.widgets.hovered.bg_fill = self.surface_3;
        visuals.widgets.hovered.bg_stroke = Stroke::NONE;
        visuals.widgets.hovered.fg_stroke.color = self.text_primary;
        visuals.widgets.active.bg_fill = self.accent_muted;
        visuals.widgets.active.bg_stroke = Stroke::NONE;
        visuals.widgets.active.fg_stroke.color = self.text_primary;
        visuals.widgets.open.bg_fill = self.surface_3;
        visuals.widgets.open.bg_stroke = Stroke::NONE;
        visuals.selection.bg_fill = self.accent_muted;
        visuals.hyperlink_color = self.accent_primary;
        visuals.extreme_bg_color = self.surface_0;
        visuals.window_fill = self.surface_1;
        visuals.window_stroke = Stroke::new(1.0, self.border_subtle);
        visuals.window_corner_radius = CornerRadius::same(self.radius_10);
        visuals.window_shadow = egui::epaint::Shadow {
            offset: [0, 8],
            blur: 24,
            spread: 0,
            color: Color32::from_rgba_premultiplied(0, 0, 0, 64),
        };
        let mut style = (*ctx.style()).clone();
        style.visuals = visuals;
        style.spacing.item_spacing = egui::vec2(8.0, 8.0);
        style.spacing.button_padding = egui::vec2(10.0, 6.0);
        style.text_styles.insert(TextStyle::Heading, FontId::proportional(17.0));
        style.text_styles.insert(TextStyle::Body, FontId::proportional(14.0));
        style.text_styles.insert(TextStyle::Monospace, FontId::monospace(13.0));
        style.text_styles.insert(TextStyle::Small, FontId::proportional(12.0));
        ctx.set_style(style);
    }

    pub fn panel_frame(&self, fill: Color32, inner_padding: i8) -> Frame {
        Frame::new()
            .fill(fill)
            .inner_margin(Margin::same(inner_padding))
            .corner_radius(CornerRadius::same(self.radius_12))
            .stroke(Stroke::NONE)
            .shadow(egui::epaint::Shadow {
                offset: [0, 4],
                blur: 18,
                spread: 0,
                color: Color32::from_rgba_premultiplied(0, 0, 0, 40),
            })
    }

    pub fn card_frame(&self) -> Frame {
        self.panel_frame(self.surface_2, self.spacing_12 as i8)
    }

    pub fn composer_frame(&self) -> Frame {
        Frame::new()
            .fill(self.surface_2)
            .inner_margin(Margin::symmetric(self.spacing_12 as i8, 10))
            .corner_radius(CornerRadius::same(self.radius_12))
            .stroke(Stroke::NONE)
    }

    pub fn toast_color(&self, level: ToastLevel) -> Color32 {
        match level {
            ToastLevel::Info => self.info,
            ToastLevel::Success => self.success,
            ToastLevel::Warning => self.warning,
            ToastLevel::Error => self.danger,
        }
    }

    pub fn log_accent(&self, kind: LogKind) -> Color32 {
        match kind {
            LogKind::Thoughts => self.warning,
            LogKind::ToolArgs | LogKind::ActivatingTool => self.accent_primary,
            LogKind::TokenUsage => self.info,
            LogKind::ToolResult | LogKind::TaskComplete => self.success,
        }
    }
}

fn font_candidates(configured: Option<&Path>) -> Vec<PathBuf> {
    configured
        .map(Path::to_path_buf)
        .into_iter()
        .chain(CJK_FONT_CANDIDATES.iter().map(PathBuf::from))
        .collect()
}

/// Adds a CJK-capable fallback font so Chinese labels and messages render.
///
/// The configured path wins; otherwise the first readable system font from a
/// fixed list is used. Without one, egui's bundled fonts are left as they are.
pub fn install_fonts(ctx: &egui::Context, configured: Option<&Path>) {
    let loaded = font_candidates(configured).into_iter().find_map(|path| {
        match std::fs::read(&path) {
            Ok(bytes) => Some((path, bytes)),
            Err(err) => {
                if configured.is_some_and(|wanted| wanted == path.as_path()) {
                    warn!(path = %path.display(), %err, "configured font could not be read");
                } else {
                    debug!(path = %path.display(), %err, "font candidate unavailable");
                }
                None
            }
        }
    });

    let Some((path, bytes)) = loaded else {
        warn!("no CJK font found; Chinese text may not render");
        return;
    };

    info!(path = %path.display(), "installing CJK fallback font");
    let mut fonts = FontDefinitions::default();
    fonts.font_data.insert(
        CJK_FONT_NAME.to_string(),
        Arc::new(FontData::from_owned(bytes)),
    );
    for family in [FontFamily::Proportional, FontFamily::Monospace] {
        fonts
            .families
            .entry(family)
            .or_default()
            .push(CJK_FONT_NAME.to_string());
    }
    ctx.set_fonts(fonts);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_font_is_tried_first() {
        let candidates = font_candidates(Some(Path::new("/opt/fonts/custom.ttf")));
        assert_eq!(candidates[0], PathBuf::from("/opt/fonts/custom.ttf"));
        assert_eq!(candidates.len(), CJK_FONT_CANDIDATES.len() + 1);
        assert_eq!(font_candidates(None).len(), CJK_FONT_CANDIDATES.len());
    }

    #[test]
    fn every_toast_level_has_distinct_color() {
        let theme = Theme::default();
        let colors = [
            theme.toast_color(ToastLevel::Info),
            theme.toast_color(ToastLevel::Success),
            theme.toast_color(ToastLevel::Warning),
            theme.toast_color(ToastLevel::Error),
        ];
        for (index, color) in colors.iter().enumerate() {
            assert!(!colors[index + 1..].contains(color));
        }
    }
}
