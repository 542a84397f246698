mod app;
mod backend;
mod config;
mod error;
mod event;
mod format;
mod state;
mod theme;
mod ui;

use std::sync::mpsc;

use app::ConsoleApp;
use backend::{Backend, EventSink};
use eframe::egui;
use state::ConsoleState;
use theme::Theme;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = config::load_from_env()?;
    info!(server = %config.server_url, "starting manus console");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("manus-console-runtime")
        .build()?;
    let handle = runtime.handle().clone();

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Manus 控制台")
            .with_inner_size([1440.0, 900.0])
            .with_min_inner_size([1024.0, 640.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Manus Console",
        native_options,
        Box::new(move |creation_context| {
            let ctx = creation_context.egui_ctx.clone();
            let theme = Theme::default();
            theme.apply_visuals(&ctx);
            theme::install_fonts(&ctx, config.ui.font_path.as_deref());

            let (tx, rx) = mpsc::channel();
            let backend = Backend::start(&config, handle, EventSink::new(tx, ctx))?;
            let state = ConsoleState::new(config.toast_duration());
            Ok(Box::new(ConsoleApp::new(
                rx,
                backend,
                state,
                theme,
                config.server_url.clone(),
            )))
        }),
    )?;

    drop(runtime);
    Ok(())
}
