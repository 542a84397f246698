//! Pure transforms from agent log payloads to Markdown.
//!
//! Every function here is total: empty input gives empty output and malformed
//! input degrades to a literal rendering instead of failing.

mod escape;
mod thoughts;
mod token_usage;
mod tool_args;
mod tool_result;

pub use thoughts::format_thoughts;
pub use token_usage::format_token_usage;
pub use tool_args::format_tool_args;
pub use tool_result::format_tool_result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Thoughts,
    ToolArgs,
    TokenUsage,
    ActivatingTool,
    ToolResult,
    TaskComplete,
}

impl LogKind {
    pub fn title(self) -> &'static str {
        match self {
            Self::Thoughts => "Manus的思考",
            Self::ToolArgs => "工具参数",
            Self::TokenUsage => "Token使用情况",
            Self::ActivatingTool => "激活工具",
            Self::ToolResult => "工具执行结果",
            Self::TaskComplete => "任务状态",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Self::Thoughts => "💡",
            Self::ToolArgs => "🔧",
            Self::TokenUsage => "📊",
            Self::ActivatingTool => "⚙",
            Self::ToolResult => "✔",
            Self::TaskComplete => "☑",
        }
    }
}

/// A log payload as delivered by the agent, tagged by kind so each formatter
/// has an explicit input contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogPayload {
    Thoughts(String),
    ToolArgs(String),
    TokenUsage(String),
    ActivatingTool { tool_name: String },
    ToolResult { tool_name: String, result: String },
    TaskComplete { message: String },
}

impl LogPayload {
    pub fn kind(&self) -> LogKind {
        match self {
            Self::Thoughts(_) => LogKind::Thoughts,
            Self::ToolArgs(_) => LogKind::ToolArgs,
            Self::TokenUsage(_) => LogKind::TokenUsage,
            Self::ActivatingTool { .. } => LogKind::ActivatingTool,
            Self::ToolResult { .. } => LogKind::ToolResult,
            Self::TaskComplete { .. } => LogKind::TaskComplete,
        }
    }

    pub fn to_markdown(&self) -> String {
        match self {
            Self::Thoughts(content) => format_thoughts(content),
            Self::ToolArgs(content) => format_tool_args(content),
            Self::TokenUsage(content) => format_token_usage(content),
            Self::ActivatingTool { tool_name } => {
                format!("**正在使用工具:** `{tool_name}`")
            }
            Self::ToolResult { tool_name, result } => format!(
                "**工具执行完成:** `{tool_name}`\n\n{}",
                format_tool_result(result)
            ),
            Self::TaskComplete { message } => format!("✔ {message}"),
        }
    }
}

/// Prepares conversational text for Markdown rendering: line breaks outside
/// fenced code become hard breaks so messages keep their shape.
pub fn format_chat_message(content: &str) -> String {
    if content.is_empty() {
        return String::new();
    }

    let mut out = String::with_capacity(content.len() + 16);
    let mut in_fence = false;
    let mut lines = content.split('\n').peekable();
    while let Some(line) = lines.next() {
        let is_marker = line.trim_start().starts_with("```");
        out.push_str(line);
        if lines.peek().is_none() {
            break;
        }
        if !in_fence && !is_marker && !line.trim().is_empty() {
            out.push_str("  ");
        }
        out.push('\n');
        if is_marker {
            in_fence = !in_fence;
        }
    }
    out
}
