use regex::Regex;
use std::sync::OnceLock;

/// Stands in for `:` inside inline code while headings are promoted.
const SHIELDED_COLON: char = '\u{E000}';

fn inline_code_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"`[^`\n]+`").unwrap_or_else(|err| panic!("valid inline code regex: {err}"))
    })
}

fn label_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^([^\n]+?):[ \t]*$")
            .unwrap_or_else(|err| panic!("valid label line regex: {err}"))
    })
}

fn numbered_item_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^(\s*)\d+\.\s").unwrap_or_else(|err| panic!("valid list regex: {err}"))
    })
}

fn section_label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(Next Steps|Steps to Implement|Proposed Enhancement|Summary|Overview|思考过程|分析|计划|实现步骤|Step \d+):([^:])",
        )
        .unwrap_or_else(|err| panic!("valid section label regex: {err}"))
    })
}

fn inline_fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"```([^`\n]+)```")
            .unwrap_or_else(|err| panic!("valid inline fence regex: {err}"))
    })
}

/// Turns free-form agent reasoning into Markdown.
///
/// `Label:` lines become `###` headings, numbered items become bullets and a
/// handful of well-known section labels are bolded. Colons inside inline code
/// are shielded first so code never turns into a heading.
pub fn format_thoughts(content: &str) -> String {
    let content = content.trim();
    if content.is_empty() {
        return String::new();
    }

    let content = inline_fence_regex().replace_all(content, "\n```\n$1\n```\n");
    let (prose, fences) = split_fences(&content);

    let mut out = String::with_capacity(content.len() + 64);
    for (index, segment) in prose.iter().enumerate() {
        out.push_str(&format_prose(segment));
        if let Some(fence) = fences.get(index) {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(fence);
            out.push('\n');
        }
    }

    out.trim_end().to_string()
}

fn format_prose(segment: &str) -> String {
    let shielded = inline_code_regex().replace_all(segment, |caps: &regex::Captures<'_>| {
        caps[0].replace(':', &SHIELDED_COLON.to_string())
    });

    let promoted = label_line_regex().replace_all(&shielded, "### $1");
    let bulleted = numbered_item_regex().replace_all(&promoted, "$1- ");
    let emphasized = section_label_regex().replace_all(&bulleted, "**$1:**$2");
    let untruncated = strip_ellipsis(&emphasized);

    separate_paragraphs(&untruncated).replace(SHIELDED_COLON, ":")
}

/// Agents cut long thoughts with a trailing `...`; drop those markers unless
/// they end a line on their own.
fn strip_ellipsis(text: &str) -> String {
    if text.contains("...") && !text.contains("...\n") {
        text.replace("...", "")
    } else {
        text.to_string()
    }
}

/// Every single line break becomes a paragraph break so each reasoning line
/// renders on its own.
fn separate_paragraphs(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let lines: Vec<&str> = text.split('\n').collect();
    for (index, line) in lines.iter().enumerate() {
        out.push_str(line);
        let Some(next) = lines.get(index + 1) else {
            break;
        };
        out.push('\n');
        if !line.trim().is_empty() && !next.trim().is_empty() && !is_list_item(next) {
            out.push('\n');
        }
    }
    out
}

fn is_list_item(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("- ") || trimmed.starts_with("* ")
}

/// Splits text into prose segments and the fenced blocks between them.
/// `prose.len() == fences.len() + 1` always holds.
fn split_fences(text: &str) -> (Vec<String>, Vec<String>) {
    let mut prose = vec![String::new()];
    let mut fences = Vec::new();
    let mut current_fence: Option<String> = None;

    for line in text.split('\n') {
        let is_marker = line.trim_start().starts_with("```");
        match current_fence.as_mut() {
            Some(fence) => {
                fence.push('\n');
                fence.push_str(line);
                if is_marker {
                    if let Some(done) = current_fence.take() {
                        fences.push(done);
                        prose.push(String::new());
                    }
                }
            }
            None if is_marker => current_fence = Some(line.to_string()),
            None => {
                if let Some(segment) = prose.last_mut() {
                    if !segment.is_empty() {
                        segment.push('\n');
                    }
                    segment.push_str(line);
                }
            }
        }
    }

    if let Some(unterminated) = current_fence {
        fences.push(unterminated);
        prose.push(String::new());
    }

    (prose, fences)
}

#[cfg(test)]
mod tests {
    use super::format_thoughts;

    #[test]
    fn promotes_label_lines_to_headings() {
        let markdown = format_thoughts("Plan:\nread the file");
        assert_eq!(markdown, "### Plan\n\nread the file");
    }

    #[test]
    fn numbered_items_become_bullets() {
        let markdown = format_thoughts("1. open\n2. edit\n3. save");
        assert_eq!(markdown, "- open\n- edit\n- save");
    }

    #[test]
    fn bolds_known_section_labels() {
        let markdown = format_thoughts("Summary: all done");
        assert_eq!(markdown, "**Summary:** all done");

        let markdown = format_thoughts("Step 2: write tests");
        assert_eq!(markdown, "**Step 2:** write tests");
    }

    #[test]
    fn inline_code_colons_never_become_headings() {
        let markdown = format_thoughts("call `obj.method:`\nnext line");
        assert!(!markdown.contains("###"), "got {markdown}");
        assert!(markdown.contains("`obj.method:`"));
    }

    #[test]
    fn fenced_code_is_left_alone() {
        let input = "Check this:\n```python\nif x:\n    y = 1\n```\nDone";
        let markdown = format_thoughts(input);
        assert!(markdown.starts_with("### Check this\n"));
        assert!(markdown.contains("```python\nif x:\n    y = 1\n```"));
        assert!(markdown.ends_with("Done"));
    }

    #[test]
    fn single_line_fences_are_expanded() {
        let markdown = format_thoughts("run ```ls -la``` now");
        assert!(markdown.contains("```\nls -la\n```"), "got {markdown}");
    }

    #[test]
    fn trailing_ellipsis_is_removed() {
        assert_eq!(format_thoughts("thinking about it..."), "thinking about it");
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert_eq!(format_thoughts(""), "");
        assert_eq!(format_thoughts("   \n  "), "");
    }
}
