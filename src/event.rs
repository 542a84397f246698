use serde::Deserialize;
use serde_json::{json, Value};

use crate::backend::FileContent;
use crate::error::ApiError;
use crate::format::LogPayload;
use crate::state::tree::TreeNode;

/// Everything the UI thread reacts to, delivered in arrival order.
#[derive(Debug, Clone)]
pub enum AppEvent {
    Server(ServerEvent),
    Api(ApiReply),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Connected,
    Disconnected { reason: String },
    ConnectError { message: String },
    ReconnectAttempt { attempt: u32 },
    Reconnected { attempts: u32 },
    ReconnectFailed,
    NewMessage(WireMessage),
    Thinking,
    MessageHistory(Vec<WireMessage>),
    FileUpdate { path: String, content: String },
    WorkspaceChange(WorkspaceChange),
    Log(LogPayload),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
    System,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WireMessage {
    pub sender: Sender,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Deleted,
    Modified,
    Moved,
    #[serde(other)]
    Other,
}

impl ChangeKind {
    pub fn verb(self) -> &'static str {
        match self {
            Self::Created => "创建",
            Self::Deleted => "删除",
            Self::Modified => "修改",
            Self::Moved => "移动",
            Self::Other => "变更",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkspaceChange {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub path: String,
    #[serde(default)]
    pub is_directory: bool,
    #[serde(default)]
    pub dest_path: Option<String>,
}

#[derive(Deserialize)]
struct FileUpdatePayload {
    path: String,
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct ContentPayload {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct ToolPayload {
    #[serde(default)]
    tool_name: String,
    #[serde(default)]
    result: String,
}

#[derive(Deserialize)]
struct TaskCompletePayload {
    #[serde(default)]
    message: String,
}

impl ServerEvent {
    /// Decodes a named channel event. Unknown names yield `Ok(None)`.
    pub fn decode(name: &str, payload: Value) -> Result<Option<Self>, serde_json::Error> {
        let event = match name {
            "new_message" => Self::NewMessage(serde_json::from_value(payload)?),
            "thinking" => Self::Thinking,
            "message_history" => Self::MessageHistory(serde_json::from_value(payload)?),
            "file_update" => {
                let update: FileUpdatePayload = serde_json::from_value(payload)?;
                Self::FileUpdate {
                    path: update.path,
                    content: update.content,
                }
            }
            "workspace_change" => Self::WorkspaceChange(serde_json::from_value(payload)?),
            "agent_thoughts" => {
                let body: ContentPayload = serde_json::from_value(payload)?;
                Self::Log(LogPayload::Thoughts(body.content))
            }
            "tool_args" => {
                let body: ContentPayload = serde_json::from_value(payload)?;
                Self::Log(LogPayload::ToolArgs(body.content))
            }
            "token_usage" => {
                let body: ContentPayload = serde_json::from_value(payload)?;
                Self::Log(LogPayload::TokenUsage(body.content))
            }
            "activating_tool" => {
                let body: ToolPayload = serde_json::from_value(payload)?;
                Self::Log(LogPayload::ActivatingTool {
                    tool_name: body.tool_name,
                })
            }
            "tool_result" => {
                let body: ToolPayload = serde_json::from_value(payload)?;
                Self::Log(LogPayload::ToolResult {
                    tool_name: body.tool_name,
                    result: body.result,
                })
            }
            "task_complete" => {
                let body: TaskCompletePayload = serde_json::from_value(payload)?;
                Self::Log(LogPayload::TaskComplete {
                    message: body.message,
                })
            }
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

/// Client to server channel events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    GetMessageHistory,
    SendMessage { message: String },
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetMessageHistory => "get_message_history",
            Self::SendMessage { .. } => "send_message",
        }
    }

    pub fn payload(&self) -> Option<Value> {
        match self {
            Self::GetMessageHistory => None,
            Self::SendMessage { message } => Some(json!({ "message": message })),
        }
    }
}

/// Completion of an HTTP request issued for an [`crate::state::Effect`].
#[derive(Debug, Clone)]
pub enum ApiReply {
    Workspace(Result<Vec<TreeNode>, ApiError>),
    File {
        path: String,
        result: Result<FileContent, ApiError>,
    },
    Saved {
        path: String,
        content: String,
        result: Result<(), ApiError>,
    },
    FileCreated {
        path: String,
        result: Result<(), ApiError>,
    },
    DirectoryCreated {
        path: String,
        result: Result<(), ApiError>,
    },
    Renamed {
        path: String,
        result: Result<String, ApiError>,
    },
    Deleted {
        path: String,
        result: Result<(), ApiError>,
    },
    Moved {
        source: String,
        result: Result<String, ApiError>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_workspace_change() {
        let event = ServerEvent::decode(
            "workspace_change",
            json!({"type": "moved", "path": "a.txt", "is_directory": false, "dest_path": "b/a.txt"}),
        )
        .expect("payload decodes")
        .expect("event is known");
        assert_eq!(
            event,
            ServerEvent::WorkspaceChange(WorkspaceChange {
                kind: ChangeKind::Moved,
                path: "a.txt".to_string(),
                is_directory: false,
                dest_path: Some("b/a.txt".to_string()),
            })
        );
    }

    #[test]
    fn unknown_change_type_maps_to_other() {
        let event = ServerEvent::decode("workspace_change", json!({"type": "touched", "path": "x"}))
            .expect("payload decodes");
        let Some(ServerEvent::WorkspaceChange(change)) = event else {
            panic!("expected workspace change, got {event:?}");
        };
        assert_eq!(change.kind, ChangeKind::Other);
        assert_eq!(change.kind.verb(), "变更");
    }

    #[test]
    fn decodes_log_events_into_payloads() {
        let event = ServerEvent::decode("tool_result", json!({"tool_name": "bash", "result": "ok"}))
            .expect("payload decodes");
        assert_eq!(
            event,
            Some(ServerEvent::Log(LogPayload::ToolResult {
                tool_name: "bash".to_string(),
                result: "ok".to_string(),
            }))
        );
    }

    #[test]
    fn message_history_keeps_order() {
        let event = ServerEvent::decode(
            "message_history",
            json!([{"sender": "user", "content": "hi"}, {"sender": "assistant", "content": "hello"}]),
        )
        .expect("payload decodes");
        let Some(ServerEvent::MessageHistory(messages)) = event else {
            panic!("expected history, got {event:?}");
        };
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender, Sender::User);
        assert_eq!(messages[1].content, "hello");
    }

    #[test]
    fn unknown_events_are_ignored_and_bad_payloads_error() {
        assert_eq!(ServerEvent::decode("mystery", Value::Null).expect("ignored"), None);
        assert!(ServerEvent::decode("file_update", json!({"content": 1})).is_err());
    }

    #[test]
    fn send_message_payload_shape() {
        let event = ClientEvent::SendMessage {
            message: "run".to_string(),
        };
        assert_eq!(event.name(), "send_message");
        assert_eq!(event.payload(), Some(json!({"message": "run"})));
        assert_eq!(ClientEvent::GetMessageHistory.payload(), None);
    }
}
