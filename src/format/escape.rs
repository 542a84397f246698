/// Backslash-escapes the Markdown metacharacters that agent payloads commonly
/// contain, so literal values survive rendering.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '*' | '_' | '[' | ']' | '(' | ')' | '#' | '+' | '-' | '`') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Makes a value safe to place inside a single Markdown table cell.
pub fn table_cell(text: &str) -> String {
    text.replace('|', "\\|")
        .replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
}

/// Wraps `text` in a fenced code block, widening the fence when the text itself
/// contains backtick runs.
pub fn fenced(text: &str, language: &str) -> String {
    let longest_run = text
        .split(|ch| ch != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest_run.max(2) + 1);
    format!("{fence}{language}\n{text}\n{fence}")
}
