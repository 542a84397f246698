use super::escape::{escape_markdown, fenced, table_cell};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Strings longer than this are summarized in the parameter table.
const LONG_TEXT_CHARS: usize = 50;
const UNKNOWN_COMMAND: &str = "未知命令";
const UNSPECIFIED: &str = "未指定";

fn html_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)</?[a-z][\s\S]*>").unwrap_or_else(|err| panic!("valid tag regex: {err}"))
    })
}

/// Renders tool-call arguments as parameter tables plus a command-specific
/// detail section. Arguments that are not JSON objects come back as a fenced
/// code block.
pub fn format_tool_args(content: &str) -> String {
    if content.is_empty() {
        return String::new();
    }

    match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(object)) => {
            let mut out = format!(
                "## 工具参数解析: `{}`\n\n",
                command_name(&object).unwrap_or(UNKNOWN_COMMAND)
            );
            out.push_str(&format_object(&object));
            out
        }
        Ok(_) => fenced(content, ""),
        Err(_) => format_embedded_objects(content),
    }
}

fn format_embedded_objects(content: &str) -> String {
    let candidates = scan_objects(content);
    if candidates.is_empty() {
        return fenced(content, "");
    }

    let mut out = String::from("## 工具参数解析\n\n");
    let last = candidates.len() - 1;
    for (index, candidate) in candidates.iter().enumerate() {
        match serde_json::from_str::<Map<String, Value>>(candidate) {
            Ok(object) => {
                out.push_str(&format!(
                    "### 命令 {}: `{}`\n\n",
                    index + 1,
                    command_name(&object).unwrap_or(UNKNOWN_COMMAND)
                ));
                out.push_str(&format_object(&object));
                if index < last {
                    out.push_str("\n\n---\n\n");
                }
            }
            Err(_) => {
                out.push_str(&fenced(candidate, ""));
                out.push_str("\n\n");
            }
        }
    }
    out
}

/// Finds top-level `{...}` spans by brace matching, ignoring braces inside
/// JSON string literals.
fn scan_objects(content: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (index, ch) in content.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = index;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    spans.push(&content[start..=index]);
                }
            }
            _ => {}
        }
    }

    spans
}

fn command_name(object: &Map<String, Value>) -> Option<&str> {
    object
        .get("command")
        .and_then(Value::as_str)
        .filter(|command| !command.is_empty())
}

fn format_object(object: &Map<String, Value>) -> String {
    let mut out = String::from("| 参数 | 值 |\n|------|------|\n");

    for (key, value) in object {
        let cell = match value {
            Value::String(text) if key == "command" => format!("**{}**", table_cell(text)),
            Value::String(text) if key == "path" => format!("`{}`", table_cell(text)),
            Value::String(text) if text.chars().count() > LONG_TEXT_CHARS => {
                format!("*长文本 ({} 字符)*", text.chars().count())
            }
            Value::String(text) => table_cell(text),
            Value::Number(number) => number.to_string(),
            Value::Bool(flag) => (if *flag { "是" } else { "否" }).to_string(),
            Value::Null | Value::Array(_) | Value::Object(_) => "*复杂数据*".to_string(),
        };
        out.push_str(&format!("| `{}` | {} |\n", table_cell(key), cell));
    }

    let Some(command) = command_name(object) else {
        return out;
    };

    out.push_str("\n### 详细信息\n\n");
    let path = string_field(object, "path");
    match command {
        "str_replace" => {
            out.push_str("**替换操作:**\n\n");
            out.push_str(&format!("- 文件: `{}`\n", path.unwrap_or(UNSPECIFIED)));
            out.push_str(&format!(
                "- 查找: `{}`\n",
                escape_markdown(string_field(object, "old_str").unwrap_or(UNSPECIFIED))
            ));
            out.push_str(&format!(
                "- 替换为: `{}`\n",
                escape_markdown(string_field(object, "new_str").unwrap_or(UNSPECIFIED))
            ));
        }
        "insert" => {
            out.push_str("**插入操作:**\n\n");
            out.push_str(&format!("- 文件: `{}`\n", path.unwrap_or(UNSPECIFIED)));
            out.push_str(&format!("- 行号: {}\n\n", insert_line(object)));
            if let Some(new_str) = string_field(object, "new_str") {
                let language = path.and_then(language_for_path).unwrap_or("");
                out.push_str("**插入内容:**\n\n");
                out.push_str(&fenced(new_str, language));
                out.push('\n');
            }
        }
        "append" => {
            out.push_str("**追加操作:**\n\n");
            out.push_str(&format!("- 文件: `{}`\n\n", path.unwrap_or(UNSPECIFIED)));
            if let Some(new_str) = string_field(object, "new_str") {
                out.push_str("**追加内容:**\n\n");
                out.push_str(&fenced(new_str, ""));
                out.push('\n');
            }
        }
        _ => {
            for (key, value) in object {
                let Some(text) = value.as_str() else {
                    continue;
                };
                if text.chars().count() <= LONG_TEXT_CHARS {
                    continue;
                }
                out.push_str(&format!("\n**{key}:**\n\n"));
                out.push_str(&fenced(text, long_value_language(key, text)));
                out.push('\n');
            }
        }
    }

    out
}

fn string_field<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

fn insert_line(object: &Map<String, Value>) -> String {
    match object.get("insert_line") {
        Some(Value::Number(number)) if number.as_f64() != Some(0.0) => number.to_string(),
        Some(Value::String(text)) if !text.is_empty() => text.clone(),
        _ => UNSPECIFIED.to_string(),
    }
}

fn language_for_path(path: &str) -> Option<&'static str> {
    let extension = path.rsplit_once('.')?.1.to_ascii_lowercase();
    match extension.as_str() {
        "html" | "htm" => Some("html"),
        "js" => Some("javascript"),
        "css" => Some("css"),
        "py" => Some("python"),
        _ => None,
    }
}

fn long_value_language(key: &str, value: &str) -> &'static str {
    if key == "path" {
        if let Some(language) = language_for_path(value) {
            return language;
        }
    }
    if html_tag_regex().is_match(value) {
        return "html";
    }
    ""
}

#[cfg(test)]
mod tests {
    use super::{format_tool_args, scan_objects};

    #[test]
    fn non_json_becomes_fenced_block() {
        assert_eq!(format_tool_args("not json"), "```\nnot json\n```");
    }

    #[test]
    fn str_replace_renders_table_and_details() {
        let markdown = format_tool_args(
            r#"{"command":"str_replace","path":"a.py","old_str":"x","new_str":"y"}"#,
        );
        assert!(markdown.starts_with("## 工具参数解析: `str_replace`\n\n"));
        assert!(markdown.contains("| `command` | **str_replace** |"));
        assert!(markdown.contains("| `path` | `a.py` |"));
        assert!(markdown.contains("**替换操作:**"));
        assert!(markdown.contains("- 文件: `a.py`"));
        assert!(markdown.contains("- 查找: `x`"));
        assert!(markdown.contains("- 替换为: `y`"));
    }

    #[test]
    fn table_rows_follow_argument_order() {
        let markdown = format_tool_args(r#"{"zeta":1,"alpha":true,"mid":null}"#);
        let zeta = markdown.find("`zeta`").expect("zeta row present");
        let alpha = markdown.find("`alpha`").expect("alpha row present");
        let mid = markdown.find("`mid`").expect("mid row present");
        assert!(zeta < alpha && alpha < mid);
        assert!(markdown.contains("| `alpha` | 是 |"));
        assert!(markdown.contains("| `mid` | *复杂数据* |"));
        assert!(markdown.contains("未知命令"));
        assert!(!markdown.contains("详细信息"));
    }

    #[test]
    fn long_strings_are_summarized_and_shown_in_detail() {
        let code = "<div>".repeat(20);
        let args = serde_json::json!({"command": "create", "file_text": code}).to_string();
        let markdown = format_tool_args(&args);
        assert!(markdown.contains("| `file_text` | *长文本 (100 字符)* |"));
        assert!(markdown.contains("**file_text:**"));
        assert!(markdown.contains("```html\n<div>"));
    }

    #[test]
    fn replacement_values_are_markdown_escaped() {
        let markdown = format_tool_args(
            r#"{"command":"str_replace","path":"a.md","old_str":"*a*","new_str":"[b]"}"#,
        );
        assert!(markdown.contains("- 查找: `\\*a\\*`"));
        assert!(markdown.contains("- 替换为: `\\[b\\]`"));
    }

    #[test]
    fn insert_uses_line_number_and_path_language() {
        let markdown = format_tool_args(
            r#"{"command":"insert","path":"main.py","insert_line":12,"new_str":"print(1)"}"#,
        );
        assert!(markdown.contains("**插入操作:**"));
        assert!(markdown.contains("- 行号: 12"));
        assert!(markdown.contains("```python\nprint(1)\n```"));
    }

    #[test]
    fn several_embedded_objects_are_rendered_in_turn() {
        let content = r#"{"command":"view","path":"a.txt"} {"command":"append","path":"b.txt","new_str":"tail"}"#;
        let markdown = format_tool_args(content);
        assert!(markdown.starts_with("## 工具参数解析\n\n"));
        assert!(markdown.contains("### 命令 1: `view`"));
        assert!(markdown.contains("### 命令 2: `append`"));
        assert!(markdown.contains("\n\n---\n\n"));
        assert!(markdown.contains("**追加内容:**\n\n```\ntail\n```"));
    }

    #[test]
    fn broken_embedded_object_falls_back_to_code() {
        let markdown = format_tool_args("prefix {not: json} suffix");
        assert!(markdown.contains("```\n{not: json}\n```"));
    }

    #[test]
    fn scanner_respects_nesting_and_strings() {
        let spans = scan_objects(r#"x {"a":{"b":"}"}} y {"c":1}"#);
        assert_eq!(spans, vec![r#"{"a":{"b":"}"}}"#, r#"{"c":1}"#]);
    }

    #[test]
    fn scalar_json_is_shown_as_code() {
        assert_eq!(format_tool_args("42"), "```\n42\n```");
    }
}
