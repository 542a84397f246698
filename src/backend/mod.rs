mod http;
mod packet;
mod socket;

use std::sync::mpsc::Sender;

use eframe::egui;
use tokio::runtime::Handle;
use tracing::warn;

use crate::config::ConsoleConfig;
use crate::error::BackendError;
use crate::event::{ApiReply, AppEvent};
use crate::state::Effect;

use http::ApiClient;
use socket::SocketClient;

pub use http::FileContent;

/// Delivers events to the UI thread and wakes it up.
#[derive(Clone)]
pub struct EventSink {
    tx: Sender<AppEvent>,
    ctx: egui::Context,
}

impl EventSink {
    pub fn new(tx: Sender<AppEvent>, ctx: egui::Context) -> Self {
        Self { tx, ctx }
    }

    pub fn send(&self, event: AppEvent) {
        if self.tx.send(event).is_err() {
            warn!("ui event channel closed; dropping event");
            return;
        }
        self.ctx.request_repaint();
    }
}

/// Runs [`Effect`]s on the tokio runtime and reports results as [`AppEvent`]s.
pub struct Backend {
    api: ApiClient,
    socket: SocketClient,
    runtime: Handle,
    sink: EventSink,
}

impl Backend {
    pub fn start(
        config: &ConsoleConfig,
        runtime: Handle,
        sink: EventSink,
    ) -> Result<Self, BackendError> {
        let api = ApiClient::new(&config.server_url, config.request_timeout())?;
        let socket = SocketClient::spawn(
            &runtime,
            &config.server_url,
            config.channel.clone(),
            sink.clone(),
        )?;
        Ok(Self {
            api,
            socket,
            runtime,
            sink,
        })
    }

    pub fn execute(&self, effect: Effect) {
        if let Effect::Emit(event) = effect {
            self.socket.emit(&event);
            return;
        }

        let api = self.api.clone();
        let sink = self.sink.clone();
        self.runtime.spawn(async move {
            if let Some(reply) = perform(&api, effect).await {
                sink.send(AppEvent::Api(reply));
            }
        });
    }
}

async fn perform(api: &ApiClient, effect: Effect) -> Option<ApiReply> {
    let reply = match effect {
        Effect::LoadWorkspace => ApiReply::Workspace(api.workspace().await),
        Effect::FetchFile(path) => {
            let result = api.file(&path).await;
            ApiReply::File { path, result }
        }
        Effect::SaveFile { path, content } => {
            let result = api.save_file(&path, &content).await;
            ApiReply::Saved {
                path,
                content,
                result,
            }
        }
        Effect::CreateFile(path) => {
            let result = api.create_file(&path).await;
            ApiReply::FileCreated { path, result }
        }
        Effect::CreateDirectory(path) => {
            let result = api.create_directory(&path).await;
            ApiReply::DirectoryCreated { path, result }
        }
        Effect::Rename { path, new_name } => {
            let result = api.rename(&path, &new_name).await;
            ApiReply::Renamed { path, result }
        }
        Effect::Delete(path) => {
            let result = api.delete(&path).await;
            ApiReply::Deleted { path, result }
        }
        Effect::Move {
            source,
            destination,
        } => {
            let result = api.move_entry(&source, &destination).await;
            ApiReply::Moved { source, result }
        }
        Effect::Emit(_) => return None,
    };
    Some(reply)
}
