use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant};

use eframe::egui::{self, Color32, RichText, ScrollArea};
use tracing::warn;

use crate::backend::Backend;
use crate::event::AppEvent;
use crate::state::{ConnectionStatus, ConsoleState, Effect, UserAction};
use crate::theme::Theme;
use crate::ui::{chat_panel, editor_panel, overlay, tree_panel, ContentRenderer};

const TOAST_REPAINT_INTERVAL: Duration = Duration::from_millis(100);

pub struct ConsoleApp {
    rx: Receiver<AppEvent>,
    backend: Backend,
    state: ConsoleState,
    theme: Theme,
    renderer: ContentRenderer,
    server_url: String,
    events_closed: bool,
}

impl ConsoleApp {
    pub fn new(
        rx: Receiver<AppEvent>,
        backend: Backend,
        mut state: ConsoleState,
        theme: Theme,
        server_url: String,
    ) -> Self {
        let startup = state.startup();
        let app = Self {
            rx,
            backend,
            state,
            theme,
            renderer: ContentRenderer::default(),
            server_url,
            events_closed: false,
        };
        app.execute(startup);
        app
    }

    fn execute(&self, effects: Vec<Effect>) {
        for effect in effects {
            self.backend.execute(effect);
        }
    }

    fn drain_events(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    let effects = self.state.apply(event);
                    self.execute(effects);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.events_closed {
                        warn!("backend event channel disconnected");
                        self.events_closed = true;
                    }
                    break;
                }
            }
        }
    }

    fn dispatch(&mut self, actions: Vec<UserAction>) {
        for action in actions {
            let effects = self.state.handle(action);
            self.execute(effects);
        }
    }

    fn connection_label(&self) -> (String, Color32) {
        match self.state.connection {
            ConnectionStatus::Connected => ("已连接".to_string(), self.theme.success),
            ConnectionStatus::Connecting => ("连接中...".to_string(), self.theme.warning),
            ConnectionStatus::Reconnecting(attempt) => {
                (format!("重新连接中 ({attempt})"), self.theme.warning)
            }
            ConnectionStatus::Disconnected => ("已断开".to_string(), self.theme.text_muted),
            ConnectionStatus::Failed => ("连接失败".to_string(), self.theme.danger),
        }
    }

    fn render_top_bar(&self, ctx: &egui::Context) {
        let (status_label, status_color) = self.connection_label();
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.strong("Manus 控制台");
                ui.separator();
                ui.label(RichText::new(status_label).color(status_color));
                ui.separator();
                ui.label(
                    RichText::new(self.server_url.as_str())
                        .color(self.theme.text_muted)
                        .size(12.0),
                );
            });
        });
    }

    fn render_diagnostics(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("diagnostics_panel").show(ctx, |ui| {
            egui::CollapsingHeader::new("Diagnostics")
                .default_open(false)
                .show(ui, |ui| {
                    ScrollArea::vertical()
                        .id_salt("diagnostics_log")
                        .max_height(120.0)
                        .stick_to_bottom(true)
                        .show(ui, |ui| {
                            for entry in self.state.diagnostics() {
                                ui.label(RichText::new(entry.as_str()).monospace().size(12.0));
                            }
                        });
                });
        });
    }

    fn render_panels(&mut self, ctx: &egui::Context, actions: &mut Vec<UserAction>) {
        let theme = &self.theme;
        let state = &mut self.state;
        let renderer = &mut self.renderer;

        egui::SidePanel::left("workspace_panel")
            .resizable(true)
            .default_width(260.0)
            .show(ctx, |ui| {
                let active = state.editor.active_path();
                tree_panel::show(ui, theme, &state.tree, active, &mut |action| {
                    actions.push(action)
                });
            });

        egui::SidePanel::right("chat_panel")
            .resizable(true)
            .default_width(420.0)
            .show(ctx, |ui| {
                chat_panel::show(ui, theme, renderer, &mut state.chat, &mut |action| {
                    actions.push(action)
                });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            editor_panel::show(ui, theme, renderer, &mut state.editor, &mut |action| {
                actions.push(action)
            });
        });
    }

    fn render_overlays(&mut self, ctx: &egui::Context, actions: &mut Vec<UserAction>) {
        let theme = &self.theme;
        let state = &mut self.state;
        let mut emit = |action| actions.push(action);

        overlay::show_toasts(ctx, theme, &state.toasts, Instant::now(), &mut emit);
        if let Some(menu) = state.context_menu.as_ref() {
            overlay::show_context_menu(ctx, theme, menu, &mut emit);
        }
        if let Some(dialog) = state.dialog.as_mut() {
            overlay::show_dialog(ctx, theme, dialog, &mut emit);
        }
    }
}

impl eframe::App for ConsoleApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();
        self.state.toasts.prune(Instant::now());

        // Actions are applied after painting so a click never reaches an
        // overlay opened by that same click.
        let mut actions = Vec::new();
        self.render_top_bar(ctx);
        self.render_diagnostics(ctx);
        self.render_panels(ctx, &mut actions);
        self.render_overlays(ctx, &mut actions);
        self.dispatch(actions);

        if !self.state.toasts.is_empty() {
            ctx.request_repaint_after(TOAST_REPAINT_INTERVAL);
        }
    }
}
