use std::time::Instant;

use eframe::egui::{
    self, Align2, CornerRadius, Id, Key, Margin, Order, ProgressBar, RichText, Stroke, Vec2,
};

use crate::state::dialog::{clamp_to_viewport, ContextMenu, Dialog, DialogKind};
use crate::state::toast::Toasts;
use crate::state::UserAction;
use crate::theme::Theme;

const TOAST_WIDTH: f32 = 300.0;
const MENU_WIDTH: f32 = 150.0;
const MENU_ITEM_HEIGHT: f32 = 28.0;

pub fn show_toasts(
    ctx: &egui::Context,
    theme: &Theme,
    toasts: &Toasts,
    now: Instant,
    emit: &mut dyn FnMut(UserAction),
) {
    if toasts.is_empty() {
        return;
    }
    egui::Area::new(Id::new("toast_stack"))
        .order(Order::Foreground)
        .anchor(Align2::RIGHT_TOP, [-theme.spacing_16, theme.spacing_16 + 32.0])
        .interactable(true)
        .show(ctx, |ui| {
            ui.set_width(TOAST_WIDTH);
            for toast in toasts.iter() {
                let accent = theme.toast_color(toast.level);
                egui::Frame::new()
                    .fill(theme.surface_3)
                    .stroke(Stroke::new(1.0, accent))
                    .inner_margin(Margin::same(theme.spacing_8 as i8))
                    .corner_radius(CornerRadius::same(theme.radius_8))
                    .show(ui, |ui| {
                        ui.set_width(TOAST_WIDTH);
                        ui.horizontal(|ui| {
                            ui.label(RichText::new(toast.message.as_str()).color(theme.text_primary));
                            ui.with_layout(egui::Layout::right_to_left(egui::Align::Min), |ui| {
                                if ui.small_button("✕").clicked() {
                                    emit(UserAction::DismissToast(toast.id));
                                }
                            });
                        });
                        ui.add(
                            ProgressBar::new(toast.remaining(now))
                                .desired_height(3.0)
                                .fill(accent),
                        );
                    });
                ui.add_space(theme.spacing_4);
            }
        });
}

pub fn show_dialog(
    ctx: &egui::Context,
    theme: &Theme,
    dialog: &mut Dialog,
    emit: &mut dyn FnMut(UserAction),
) {
    let mut confirm = false;
    let mut cancel = false;

    let response = egui::Modal::new(Id::new("workspace_dialog")).show(ctx, |ui| {
        ui.set_width(320.0);
        ui.label(RichText::new(dialog.title.as_str()).size(16.0).strong());
        ui.add_space(theme.spacing_8);

        match &mut dialog.kind {
            DialogKind::Prompt { label, value } => {
                ui.label(RichText::new(label.as_str()).color(theme.text_muted));
                let input = ui.add(egui::TextEdit::singleline(value).desired_width(f32::INFINITY));
                if !input.has_focus() && !input.lost_focus() {
                    input.request_focus();
                }
                if input.lost_focus() && ui.input(|i| i.key_pressed(Key::Enter)) {
                    confirm = true;
                }
            }
            DialogKind::Confirm { message } => {
                ui.label(RichText::new(message.as_str()).color(theme.text_primary));
            }
        }

        ui.add_space(theme.spacing_12);
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            let confirm_button = egui::Button::new(RichText::new("确定").color(theme.text_on_accent))
                .fill(theme.accent_primary);
            if ui.add(confirm_button).clicked() {
                confirm = true;
            }
            if ui.button("取消").clicked() {
                cancel = true;
            }
        });
    });

    if confirm {
        emit(UserAction::ConfirmDialog);
    } else if cancel || response.should_close() {
        emit(UserAction::CancelDialog);
    }
}

pub fn show_context_menu(
    ctx: &egui::Context,
    theme: &Theme,
    menu: &ContextMenu,
    emit: &mut dyn FnMut(UserAction),
) {
    let items = menu.items();
    let size = Vec2::new(
        MENU_WIDTH,
        MENU_ITEM_HEIGHT * items.len() as f32 + theme.spacing_16,
    );
    let position = clamp_to_viewport(menu.position, size, ctx.screen_rect());

    let area = egui::Area::new(Id::new("tree_context_menu"))
        .order(Order::Foreground)
        .fixed_pos(position)
        .show(ctx, |ui| {
            egui::Frame::popup(ui.style()).show(ui, |ui| {
                ui.set_width(MENU_WIDTH);
                for item in items {
                    let button = egui::Button::new(item.label())
                        .frame(false)
                        .min_size(Vec2::new(MENU_WIDTH, MENU_ITEM_HEIGHT - theme.spacing_4));
                    if ui.add(button).clicked() {
                        emit(UserAction::MenuSelected(item));
                    }
                }
            });
        });

    let dismissed = area.response.clicked_elsewhere() || ctx.input(|i| i.key_pressed(Key::Escape));
    if dismissed {
        emit(UserAction::CloseContextMenu);
    }
}
