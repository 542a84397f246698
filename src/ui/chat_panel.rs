use eframe::egui::{self, Align, CornerRadius, Key, Layout, Margin, RichText, ScrollArea};

use crate::event::Sender;
use crate::format::LogKind;
use crate::state::chat::{ChatEntry, ChatLog, THINKING_TEXT};
use crate::state::UserAction;
use crate::theme::Theme;
use crate::ui::ContentRenderer;

const WELCOME_TEXT: &str = "欢迎使用 Manus，输入任务开始对话。";

pub fn show(
    ui: &mut egui::Ui,
    theme: &Theme,
    renderer: &mut ContentRenderer,
    chat: &mut ChatLog,
    emit: &mut dyn FnMut(UserAction),
) {
    ui.strong("对话");
    ui.separator();

    let transcript_height = (ui.available_height() - 120.0).max(120.0);
    ScrollArea::vertical()
        .id_salt("chat_transcript")
        .max_height(transcript_height)
        .auto_shrink([false, false])
        .stick_to_bottom(true)
        .show(ui, |ui| {
            if chat.shows_welcome() {
                ui.add_space(theme.spacing_16);
                ui.vertical_centered(|ui| {
                    ui.label(RichText::new(WELCOME_TEXT).color(theme.text_muted).size(14.0));
                });
            }

            let last = chat.entries().len().saturating_sub(1);
            for (index, entry) in chat.entries().iter().enumerate() {
                match entry {
                    ChatEntry::Message { sender, markdown } => {
                        show_message(ui, theme, renderer, *sender, markdown);
                    }
                    ChatEntry::Log { kind, markdown } => {
                        show_log(ui, theme, renderer, *kind, markdown);
                    }
                    ChatEntry::Thinking => {
                        ui.horizontal(|ui| {
                            if index == last && chat.is_busy() {
                                ui.spinner();
                            }
                            ui.label(RichText::new(THINKING_TEXT).color(theme.text_muted).italics());
                        });
                    }
                }
                ui.add_space(theme.spacing_8);
            }
        });

    ui.separator();
    show_composer(ui, theme, chat, emit);
}

fn show_message(
    ui: &mut egui::Ui,
    theme: &Theme,
    renderer: &mut ContentRenderer,
    sender: Sender,
    markdown: &str,
) {
    let (fill, layout, label) = match sender {
        Sender::User => (theme.user_bubble, Layout::top_down(Align::Max), "你"),
        Sender::Assistant => (theme.surface_2, Layout::top_down(Align::Min), "Manus"),
        Sender::System | Sender::Other => (theme.surface_1, Layout::top_down(Align::Center), "系统"),
    };

    ui.with_layout(layout, |ui| {
        ui.label(RichText::new(label).color(theme.text_muted).size(11.0));
        egui::Frame::new()
            .fill(fill)
            .inner_margin(Margin::same(theme.spacing_12 as i8))
            .corner_radius(CornerRadius::same(theme.radius_12))
            .show(ui, |ui| {
                ui.set_max_width(ui.available_width() * 0.85);
                renderer.markdown(ui, theme, markdown);
            });
    });
}

fn show_log(
    ui: &mut egui::Ui,
    theme: &Theme,
    renderer: &mut ContentRenderer,
    kind: LogKind,
    markdown: &str,
) {
    theme.card_frame().show(ui, |ui| {
        ui.set_width(ui.available_width());
        ui.horizontal(|ui| {
            ui.label(RichText::new(kind.icon()).size(14.0));
            ui.label(
                RichText::new(kind.title())
                    .color(theme.log_accent(kind))
                    .size(13.0)
                    .strong(),
            );
        });
        ui.add_space(theme.spacing_4);
        renderer.markdown(ui, theme, markdown);
    });
}

fn show_composer(
    ui: &mut egui::Ui,
    theme: &Theme,
    chat: &mut ChatLog,
    emit: &mut dyn FnMut(UserAction),
) {
    let busy = chat.is_busy();
    let hint = if busy {
        "Manus正在处理中..."
    } else {
        "输入任务，Enter 发送，Shift+Enter 换行"
    };

    let input_id = ui.id().with("chat_input");
    let enter_pressed = ui.memory(|memory| memory.has_focus(input_id))
        && ui.input_mut(take_send_key);

    let mut send_now = enter_pressed;
    theme.composer_frame().show(ui, |ui| {
        ui.horizontal(|ui| {
            let width = ui.available_width() - 72.0;
            ui.add_enabled(
                !busy,
                egui::TextEdit::multiline(&mut chat.input)
                    .id(input_id)
                    .desired_rows(2)
                    .desired_width(width.max(80.0))
                    .hint_text(hint),
            );
            let clicked = ui
                .add_enabled(
                    !busy && !chat.input.trim().is_empty(),
                    egui::Button::new("发送"),
                )
                .clicked();
            send_now |= clicked;
        });
    });

    if send_now && !busy {
        emit(UserAction::SendMessage);
    }
}

/// Removes unshifted Enter presses before the text edit sees them, so they
/// send instead of inserting a newline. Shift+Enter is left in place.
fn take_send_key(input: &mut egui::InputState) -> bool {
    let before = input.events.len();
    input.events.retain(|event| {
        !matches!(
            event,
            egui::Event::Key { key: Key::Enter, pressed: true, modifiers, .. } if !modifiers.shift
        )
    });
    input.events.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::Modifiers;

    fn enter(modifiers: Modifiers) -> egui::Event {
        egui::Event::Key {
            key: Key::Enter,
            physical_key: None,
            pressed: true,
            repeat: false,
            modifiers,
        }
    }

    fn run_frame(events: Vec<egui::Event>) -> (bool, bool) {
        let ctx = egui::Context::default();
        let raw = egui::RawInput {
            events,
            ..Default::default()
        };
        let mut outcome = (false, false);
        let _ = ctx.run(raw, |ctx| {
            outcome = ctx.input_mut(|input| {
                let sent = take_send_key(input);
                let enter_left = input
                    .events
                    .iter()
                    .any(|event| matches!(event, egui::Event::Key { key: Key::Enter, .. }));
                (sent, enter_left)
            });
        });
        outcome
    }

    #[test]
    fn plain_enter_sends_and_is_consumed() {
        assert_eq!(run_frame(vec![enter(Modifiers::NONE)]), (true, false));
    }

    #[test]
    fn shift_enter_is_left_for_the_newline() {
        assert_eq!(run_frame(vec![enter(Modifiers::SHIFT)]), (false, true));
    }

    #[test]
    fn no_enter_means_no_send() {
        assert_eq!(run_frame(Vec::new()), (false, false));
    }
}
