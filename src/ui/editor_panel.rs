use eframe::egui::{self, FontId, Key, KeyboardShortcut, Modifiers, RichText, ScrollArea};

use crate::state::editor::{file_name, ContentKind, EditorPane, OpenDocument};
use crate::state::UserAction;
use crate::theme::Theme;
use crate::ui::ContentRenderer;

const SAVE_SHORTCUT: KeyboardShortcut = KeyboardShortcut::new(Modifiers::COMMAND, Key::S);

pub fn show(
    ui: &mut egui::Ui,
    theme: &Theme,
    renderer: &mut ContentRenderer,
    editor: &mut EditorPane,
    emit: &mut dyn FnMut(UserAction),
) {
    match editor {
        EditorPane::Empty => {
            header(ui, theme, "未打开文件");
            ui.separator();
            ui.label(RichText::new("从左侧选择一个文件").color(theme.text_muted));
        }
        EditorPane::Loading { path } => {
            header(ui, theme, file_name(path));
            ui.separator();
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label(RichText::new("加载中...").color(theme.text_muted));
            });
        }
        EditorPane::Failed { path, message } => {
            header(ui, theme, file_name(path));
            ui.separator();
            ui.label(RichText::new(message.as_str()).color(theme.danger));
        }
        EditorPane::Open(document) => show_document(ui, theme, renderer, document, emit),
    }
}

fn header(ui: &mut egui::Ui, theme: &Theme, title: &str) {
    ui.label(
        RichText::new(title)
            .color(theme.text_primary)
            .size(15.0)
            .strong(),
    );
}

fn show_document(
    ui: &mut egui::Ui,
    theme: &Theme,
    renderer: &mut ContentRenderer,
    document: &mut OpenDocument,
    emit: &mut dyn FnMut(UserAction),
) {
    ui.horizontal(|ui| {
        header(ui, theme, document.name());
        ui.label(RichText::new(document.path.as_str()).color(theme.text_muted).size(12.0));
        if document.editable() {
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                toolbar(ui, &*document, emit);
            });
        }
    });
    ui.separator();

    if document.is_editing() && ui.input_mut(|input| input.consume_shortcut(&SAVE_SHORTCUT)) {
        emit(UserAction::Save);
    }

    let kind = document.kind;
    ScrollArea::vertical()
        .id_salt(("editor_body", document.path.as_str()))
        .auto_shrink([false, false])
        .show(ui, |ui| match document.editing.as_mut() {
            Some(session) if session.previewing => {
                show_content(ui, theme, renderer, kind, &session.buffer);
            }
            Some(session) => {
                let language = source_language(kind);
                let highlighter = renderer.highlighter();
                let mut layouter = |ui: &egui::Ui, text: &str, wrap_width: f32| {
                    let mut job =
                        highlighter.layout(text, language, &FontId::monospace(13.0), theme.text_primary);
                    job.wrap.max_width = wrap_width;
                    ui.fonts(|fonts| fonts.layout_job(job))
                };
                ui.add(
                    egui::TextEdit::multiline(&mut session.buffer)
                        .code_editor()
                        .desired_width(f32::INFINITY)
                        .desired_rows(30)
                        .layouter(&mut layouter),
                );
            }
            None => show_content(ui, theme, renderer, kind, &document.content),
        });
}

fn toolbar(ui: &mut egui::Ui, document: &OpenDocument, emit: &mut dyn FnMut(UserAction)) {
    // Right-to-left layout: buttons are added in reverse visual order.
    let Some(session) = document.editing.as_ref() else {
        if ui.button("编辑").clicked() {
            emit(UserAction::EnterEdit);
        }
        return;
    };

    if document.kind.previewable() {
        let label = if session.previewing { "编辑源码" } else { "预览" };
        if ui.button(label).clicked() {
            emit(UserAction::TogglePreview);
        }
    }
    if ui.button("取消").clicked() {
        emit(UserAction::CancelEdit);
    }
    let saving = session.saving.is_some();
    let label = if saving { "保存中..." } else { "保存" };
    if ui.add_enabled(!saving, egui::Button::new(label)).clicked() {
        emit(UserAction::Save);
    }
}

fn source_language(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Markdown => "markdown",
        ContentKind::Html => "html",
        ContentKind::Code(language) => language,
        ContentKind::Plain => "",
    }
}

fn show_content(
    ui: &mut egui::Ui,
    theme: &Theme,
    renderer: &mut ContentRenderer,
    kind: ContentKind,
    content: &str,
) {
    if content.is_empty() {
        ui.label(RichText::new("文件为空").color(theme.text_muted).italics());
        return;
    }
    match kind {
        ContentKind::Markdown => renderer.markdown(ui, theme, content),
        // No HTML engine in egui; show the highlighted source instead.
        ContentKind::Html => renderer.code(ui, theme, "html", content),
        ContentKind::Code(language) => renderer.code(ui, theme, language, content),
        ContentKind::Plain => renderer.plain(ui, theme, content),
    }
}
