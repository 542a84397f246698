//! Application state and the single reducer that mutates it.
//!
//! [`ConsoleState::apply`] handles everything arriving from the server and
//! [`ConsoleState::handle`] everything the user does. Both return the
//! [`Effect`]s the backend should run; neither performs I/O.

pub mod chat;
pub mod dialog;
pub mod editor;
pub mod toast;
pub mod tree;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use egui::Pos2;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::event::{ApiReply, AppEvent, ChangeKind, ClientEvent, ServerEvent, WorkspaceChange};
use chat::ChatLog;
use dialog::{ContextMenu, Dialog, MenuItem, MenuTarget, Mutation};
use editor::EditorPane;
use toast::Toasts;
use tree::{check_drop, DropRejection, FileTree};

const DIAGNOSTICS_LIMIT: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    LoadWorkspace,
    FetchFile(String),
    SaveFile { path: String, content: String },
    CreateFile(String),
    CreateDirectory(String),
    Rename { path: String, new_name: String },
    Delete(String),
    Move { source: String, destination: String },
    Emit(ClientEvent),
}

#[derive(Debug, Clone, PartialEq)]
pub enum UserAction {
    RefreshTree,
    ToggleDirectory(String),
    OpenFile(String),
    ShowContextMenu { target: MenuTarget, position: Pos2 },
    CloseContextMenu,
    MenuSelected(MenuItem),
    NewFileAtRoot,
    NewDirectoryAtRoot,
    ConfirmDialog,
    CancelDialog,
    Drop { source: String, target: String, target_is_dir: bool },
    EnterEdit,
    CancelEdit,
    TogglePreview,
    Save,
    SendMessage,
    DismissToast(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Reconnecting(u32),
    Disconnected,
    Failed,
}

pub struct ConsoleState {
    pub tree: FileTree,
    pub editor: EditorPane,
    pub chat: ChatLog,
    pub toasts: Toasts,
    pub dialog: Option<Dialog>,
    pub context_menu: Option<ContextMenu>,
    pub connection: ConnectionStatus,
    diagnostics: Vec<String>,
    pending_open: Option<String>,
    pending_expand: Option<String>,
}

fn timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_secs().to_string(),
        Err(_) => "0".to_string(),
    }
}

impl ConsoleState {
    pub fn new(toast_duration: Duration) -> Self {
        Self {
            tree: FileTree::default(),
            editor: EditorPane::default(),
            chat: ChatLog::default(),
            toasts: Toasts::new(toast_duration),
            dialog: None,
            context_menu: None,
            connection: ConnectionStatus::Connecting,
            diagnostics: Vec::new(),
            pending_open: None,
            pending_expand: None,
        }
    }

    /// Requests issued once at startup. The history request is buffered by the
    /// channel until the first connection.
    pub fn startup(&mut self) -> Vec<Effect> {
        self.tree.mark_loading();
        vec![
            Effect::LoadWorkspace,
            Effect::Emit(ClientEvent::GetMessageHistory),
        ]
    }

    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    fn log_diagnostic(&mut self, message: impl Into<String>) {
        if self.diagnostics.len() >= DIAGNOSTICS_LIMIT {
            self.diagnostics.remove(0);
        }
        self.diagnostics
            .push(format!("[{}] {}", timestamp(), message.into()));
    }

    pub fn apply(&mut self, event: AppEvent) -> Vec<Effect> {
        match event {
            AppEvent::Server(event) => self.apply_server(event),
            AppEvent::Api(reply) => self.apply_reply(reply),
        }
    }

    fn apply_server(&mut self, event: ServerEvent) -> Vec<Effect> {
        match event {
            ServerEvent::Connected => {
                self.connection = ConnectionStatus::Connected;
                self.log_diagnostic("channel connected");
                self.toasts.success("已连接到服务器");
                Vec::new()
            }
            ServerEvent::Disconnected { reason } => {
                self.connection = ConnectionStatus::Disconnected;
                self.log_diagnostic(format!("channel disconnected: {reason}"));
                self.toasts.warning("已断开连接，尝试重新连接...");
                Vec::new()
            }
            ServerEvent::ConnectError { message } => {
                if self.connection == ConnectionStatus::Connecting {
                    self.connection = ConnectionStatus::Disconnected;
                }
                self.log_diagnostic(format!("channel connect error: {message}"));
                self.toasts.error("连接错误，请检查网络连接");
                Vec::new()
            }
            ServerEvent::ReconnectAttempt { attempt } => {
                self.connection = ConnectionStatus::Reconnecting(attempt);
                self.log_diagnostic(format!("reconnect attempt {attempt}"));
                self.toasts.warning(format!("尝试重新连接 ({attempt})"));
                Vec::new()
            }
            ServerEvent::Reconnected { attempts } => {
                self.log_diagnostic(format!("reconnected after {attempts} attempts"));
                self.toasts
                    .success(format!("重新连接成功，尝试次数: {attempts}"));
                vec![
                    Effect::LoadWorkspace,
                    Effect::Emit(ClientEvent::GetMessageHistory),
                ]
            }
            ServerEvent::ReconnectFailed => {
                self.connection = ConnectionStatus::Failed;
                self.log_diagnostic("reconnection attempts exhausted");
                self.toasts.error("无法重新连接到服务器");
                Vec::new()
            }
            ServerEvent::NewMessage(message) => {
                self.chat.push_message(message);
                Vec::new()
            }
            ServerEvent::Thinking => {
                self.chat.push_thinking();
                Vec::new()
            }
            ServerEvent::MessageHistory(messages) => {
                debug!(count = messages.len(), "message history received");
                self.chat.push_history(messages);
                Vec::new()
            }
            ServerEvent::FileUpdate { path, content } => {
                if self.editor.apply_remote_update(&path, content) {
                    debug!(%path, "open file updated remotely");
                }
                Vec::new()
            }
            ServerEvent::WorkspaceChange(change) => self.apply_workspace_change(change),
            ServerEvent::Log(payload) => {
                self.chat.push_log(&payload);
                Vec::new()
            }
        }
    }

    fn apply_workspace_change(&mut self, change: WorkspaceChange) -> Vec<Effect> {
        let effects = match change.kind {
            ChangeKind::Created => vec![Effect::LoadWorkspace],
            ChangeKind::Deleted => {
                self.editor.clear_if_under(&change.path, change.is_directory);
                vec![Effect::LoadWorkspace]
            }
            // Content changes of the open file arrive as `file_update`.
            ChangeKind::Modified => Vec::new(),
            ChangeKind::Moved => {
                if let Some(dest) = change.dest_path.as_deref() {
                    self.editor.relocate(&change.path, dest);
                }
                vec![Effect::LoadWorkspace]
            }
            ChangeKind::Other => Vec::new(),
        };

        let subject = if change.is_directory { "目录" } else { "文件" };
        let message = format!("{subject} {} 已{}", change.path, change.kind.verb());
        if change.kind == ChangeKind::Deleted {
            self.toasts.warning(message);
        } else {
            self.toasts.info(message);
        }
        effects
    }

    fn apply_reply(&mut self, reply: ApiReply) -> Vec<Effect> {
        match reply {
            ApiReply::Workspace(Ok(nodes)) => self.finish_reload(nodes),
            ApiReply::Workspace(Err(err)) => {
                self.log_diagnostic(format!("workspace load failed: {err}"));
                self.tree.fail(format!("加载失败: {err}"));
                Vec::new()
            }
            ApiReply::File { path, result } => {
                if let Err(err) = &result {
                    self.log_diagnostic(format!("failed to open {path}: {err}"));
                }
                self.editor.finish_open(path, result);
                Vec::new()
            }
            ApiReply::Saved {
                path,
                content,
                result,
            } => {
                self.editor.finish_save(&path, content, &result);
                match result {
                    Ok(()) => {
                        self.toasts.success(format!("文件 {path} 已保存"));
                    }
                    Err(err) => {
                        self.log_diagnostic(format!("save of {path} failed: {err}"));
                        self.toasts.error(format!("保存失败：{err}"));
                    }
                }
                Vec::new()
            }
            ApiReply::FileCreated { path, result } => match result {
                Ok(()) => {
                    self.toasts.success("文件创建成功");
                    self.pending_open = Some(path);
                    vec![Effect::LoadWorkspace]
                }
                Err(err) => self.mutation_failed("创建文件失败", err),
            },
            ApiReply::DirectoryCreated { path, result } => match result {
                Ok(()) => {
                    self.toasts.success("文件夹创建成功");
                    self.pending_expand = Some(path);
                    vec![Effect::LoadWorkspace]
                }
                Err(err) => self.mutation_failed("创建文件夹失败", err),
            },
            ApiReply::Renamed { path, result } => match result {
                Ok(new_path) => {
                    self.toasts.success("重命名成功");
                    self.editor.relocate(&path, &new_path);
                    vec![Effect::LoadWorkspace]
                }
                Err(err) => self.mutation_failed("重命名失败", err),
            },
            ApiReply::Deleted { path, result } => match result {
                Ok(()) => {
                    self.toasts.success("删除成功");
                    self.editor.clear_if_under(&path, true);
                    vec![Effect::LoadWorkspace]
                }
                Err(err) => self.mutation_failed("删除失败", err),
            },
            ApiReply::Moved { source, result } => match result {
                Ok(destination) => {
                    self.toasts.success("移动成功");
                    self.editor.relocate(&source, &destination);
                    vec![Effect::LoadWorkspace]
                }
                Err(err) => self.mutation_failed("移动失败", err),
            },
        }
    }

    fn mutation_failed(&mut self, prefix: &str, err: ApiError) -> Vec<Effect> {
        warn!(%err, "{prefix}");
        self.log_diagnostic(format!("{prefix}: {err}"));
        self.toasts.error(format!("{prefix}: {err}"));
        Vec::new()
    }

    fn finish_reload(&mut self, nodes: Vec<tree::TreeNode>) -> Vec<Effect> {
        let dropped = self.tree.reconcile(nodes);
        if !dropped.is_empty() {
            debug!(?dropped, "expanded directories no longer present after reload");
        }

        // Pending targets are resolved against the first reload after the
        // mutation only; a path the server renamed on the way is dropped.
        if let Some(path) = self.pending_expand.take() {
            if self.tree.contains(&path) {
                self.tree.expand(&path);
            } else {
                debug!(%path, "created directory missing from reloaded tree");
            }
        }

        match self.pending_open.take() {
            Some(path) if self.tree.contains(&path) => {
                if let Some((parent, _)) = path.rsplit_once('/') {
                    self.tree.expand(parent);
                }
                self.editor.begin_open(path.clone());
                vec![Effect::FetchFile(path)]
            }
            Some(path) => {
                debug!(%path, "created file missing from reloaded tree");
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    pub fn handle(&mut self, action: UserAction) -> Vec<Effect> {
        match action {
            UserAction::RefreshTree => {
                self.tree.mark_loading();
                vec![Effect::LoadWorkspace]
            }
            UserAction::ToggleDirectory(path) => {
                self.tree.toggle(&path);
                Vec::new()
            }
            UserAction::OpenFile(path) => {
                self.context_menu = None;
                self.pending_open = None;
                info!(%path, "opening file");
                self.editor.begin_open(path.clone());
                vec![Effect::FetchFile(path)]
            }
            UserAction::ShowContextMenu { target, position } => {
                self.context_menu = Some(ContextMenu { target, position });
                Vec::new()
            }
            UserAction::CloseContextMenu => {
                self.context_menu = None;
                Vec::new()
            }
            UserAction::MenuSelected(item) => {
                if let Some(menu) = self.context_menu.take() {
                    self.dialog = Some(Dialog::for_menu(item, &menu.target));
                }
                Vec::new()
            }
            UserAction::NewFileAtRoot => {
                self.dialog = Some(Dialog::new_file(""));
                Vec::new()
            }
            UserAction::NewDirectoryAtRoot => {
                self.dialog = Some(Dialog::new_directory(""));
                Vec::new()
            }
            UserAction::ConfirmDialog => {
                let Some(mutation) = self.dialog.take().and_then(Dialog::resolve) else {
                    return Vec::new();
                };
                vec![match mutation {
                    Mutation::CreateFile(path) => Effect::CreateFile(path),
                    Mutation::CreateDirectory(path) => Effect::CreateDirectory(path),
                    Mutation::Rename { path, new_name } => Effect::Rename { path, new_name },
                    Mutation::Delete(path) => Effect::Delete(path),
                }]
            }
            UserAction::CancelDialog => {
                self.dialog = None;
                Vec::new()
            }
            UserAction::Drop {
                source,
                target,
                target_is_dir,
            } => match check_drop(&source, &target, target_is_dir) {
                Ok(()) => vec![Effect::Move {
                    source,
                    destination: target,
                }],
                Err(DropRejection::IntoOwnSubtree) => {
                    self.toasts.error("错误：不能将目录移动到其子目录中");
                    Vec::new()
                }
                Err(rejection) => {
                    debug!(?rejection, %source, %target, "drop ignored");
                    Vec::new()
                }
            },
            UserAction::EnterEdit => {
                self.editor.enter_edit();
                Vec::new()
            }
            UserAction::CancelEdit => {
                self.editor.cancel_edit();
                Vec::new()
            }
            UserAction::TogglePreview => {
                self.editor.toggle_preview();
                Vec::new()
            }
            UserAction::Save => match self.editor.begin_save() {
                Some((path, content)) => vec![Effect::SaveFile { path, content }],
                None => Vec::new(),
            },
            UserAction::SendMessage => match self.chat.begin_send() {
                Some(message) => vec![Effect::Emit(ClientEvent::SendMessage { message })],
                None => Vec::new(),
            },
            UserAction::DismissToast(id) => {
                self.toasts.dismiss(id);
                Vec::new()
            }
        }
    }
}
