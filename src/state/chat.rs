use crate::event::{Sender, WireMessage};
use crate::format::{format_chat_message, LogKind, LogPayload};

pub const THINKING_TEXT: &str = "Manus正在思考...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEntry {
    Message { sender: Sender, markdown: String },
    Log { kind: LogKind, markdown: String },
    Thinking,
}

/// Ordered conversation log plus the composer state.
#[derive(Debug, Clone)]
pub struct ChatLog {
    entries: Vec<ChatEntry>,
    pub input: String,
    busy: bool,
    welcome: bool,
}

impl Default for ChatLog {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            input: String::new(),
            busy: false,
            welcome: true,
        }
    }
}

impl ChatLog {
    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn shows_welcome(&self) -> bool {
        self.welcome && self.entries.is_empty()
    }

    pub fn push_message(&mut self, message: WireMessage) {
        if message.sender == Sender::Assistant {
            self.busy = false;
        }
        self.entries.push(ChatEntry::Message {
            sender: message.sender,
            markdown: format_chat_message(&message.content),
        });
    }

    /// Appends replayed history. A reconnect replays the full history again;
    /// nothing is deduplicated.
    pub fn push_history(&mut self, messages: Vec<WireMessage>) {
        self.welcome = false;
        for message in messages {
            self.entries.push(ChatEntry::Message {
                sender: message.sender,
                markdown: format_chat_message(&message.content),
            });
        }
    }

    pub fn push_thinking(&mut self) {
        self.entries.push(ChatEntry::Thinking);
    }

    pub fn push_log(&mut self, payload: &LogPayload) {
        if payload.kind() == LogKind::TaskComplete {
            self.busy = false;
        }
        self.entries.push(ChatEntry::Log {
            kind: payload.kind(),
            markdown: payload.to_markdown(),
        });
    }

    /// Takes the composed message for sending. Returns `None` when the input is
    /// blank or a previous message is still awaiting its reply.
    pub fn begin_send(&mut self) -> Option<String> {
        if self.busy {
            return None;
        }
        let message = self.input.trim().to_string();
        if message.is_empty() {
            return None;
        }
        self.busy = true;
        self.input.clear();
        Some(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(sender: Sender, content: &str) -> WireMessage {
        WireMessage {
            sender,
            content: content.to_string(),
        }
    }

    #[test]
    fn double_send_yields_one_message() {
        let mut chat = ChatLog::default();
        chat.input = "run tests".to_string();
        assert_eq!(chat.begin_send(), Some("run tests".to_string()));
        chat.input = "again".to_string();
        assert_eq!(chat.begin_send(), None);
        assert!(chat.is_busy());
        assert_eq!(chat.input, "again");
    }

    #[test]
    fn blank_input_is_not_sent() {
        let mut chat = ChatLog::default();
        chat.input = "   ".to_string();
        assert_eq!(chat.begin_send(), None);
        assert!(!chat.is_busy());
    }

    #[test]
    fn assistant_reply_or_task_complete_clears_busy() {
        let mut chat = ChatLog::default();
        chat.input = "one".to_string();
        chat.begin_send();
        chat.push_message(message(Sender::User, "one"));
        assert!(chat.is_busy(), "the echoed user message does not release input");
        chat.push_message(message(Sender::Assistant, "done"));
        assert!(!chat.is_busy());

        chat.input = "two".to_string();
        chat.begin_send();
        chat.push_log(&LogPayload::TaskComplete {
            message: "任务已完成，请查看结果。".to_string(),
        });
        assert!(!chat.is_busy());
    }

    #[test]
    fn history_replaces_welcome_and_keeps_order() {
        let mut chat = ChatLog::default();
        assert!(chat.shows_welcome());
        chat.push_history(vec![
            message(Sender::User, "hi"),
            message(Sender::Assistant, "hello"),
        ]);
        assert!(!chat.shows_welcome());
        assert_eq!(chat.entries().len(), 2);
        assert!(matches!(
            &chat.entries()[1],
            ChatEntry::Message { sender: Sender::Assistant, markdown } if markdown == "hello"
        ));
    }

    #[test]
    fn thinking_and_logs_are_appended_in_order() {
        let mut chat = ChatLog::default();
        chat.push_thinking();
        chat.push_log(&LogPayload::ActivatingTool {
            tool_name: "bash".to_string(),
        });
        assert_eq!(chat.entries()[0], ChatEntry::Thinking);
        assert_eq!(
            chat.entries()[1],
            ChatEntry::Log {
                kind: LogKind::ActivatingTool,
                markdown: "**正在使用工具:** `bash`".to_string(),
            }
        );
    }
}
