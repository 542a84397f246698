use super::escape::fenced;
use regex::Regex;
use std::sync::OnceLock;

const FILE_CONTENT_MARKERS: [&str; 2] = ["cat -n", "file content"];
const COMMAND_OUTPUT_MARKERS: [&str; 2] = ["Observed output", "executed:"];

fn fenced_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"```[^`]+```").unwrap_or_else(|err| panic!("valid fenced block regex: {err}"))
    })
}

fn numbered_lines_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:[ \t]+\d+[ \t]+[^\n]+(?:\n|$))+")
            .unwrap_or_else(|err| panic!("valid numbered lines regex: {err}"))
    })
}

fn command_split_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"executed:|output of cmd")
            .unwrap_or_else(|err| panic!("valid command split regex: {err}"))
    })
}

/// Re-wraps file listings and command output from a tool result as code
/// blocks; everything else passes through unchanged.
pub fn format_tool_result(result: &str) -> String {
    if result.is_empty() {
        return String::new();
    }

    if FILE_CONTENT_MARKERS.iter().any(|marker| result.contains(marker)) {
        if let Some(block) = fenced_block_regex().find(result) {
            return block.as_str().to_string();
        }
        if let Some(lines) = numbered_lines_regex().find(result) {
            return fenced(lines.as_str().trim_end_matches('\n'), "");
        }
    }

    if COMMAND_OUTPUT_MARKERS.iter().any(|marker| result.contains(marker)) {
        let parts: Vec<&str> = command_split_regex().split(result).collect();
        if parts.len() > 1 {
            if let Some(output) = parts.last() {
                return fenced(output.trim(), "");
            }
        }
    }

    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::format_tool_result;

    #[test]
    fn extracts_numbered_file_listing() {
        let result = "Here's the result of running `cat -n` on /tmp/a.py:\n     1\timport os\n     2\tprint(os.getcwd())\n";
        let markdown = format_tool_result(result);
        assert_eq!(
            markdown,
            "```\n     1\timport os\n     2\tprint(os.getcwd())\n```"
        );
    }

    #[test]
    fn keeps_existing_fenced_block_for_file_content() {
        let result = "file content:\n```\nhello\n```\ntrailer";
        assert_eq!(format_tool_result(result), "```\nhello\n```");
    }

    #[test]
    fn takes_trailing_command_output() {
        let result = "Observed output of cmd `python_execute` executed:\n{'observation': 'ok'}\n";
        assert_eq!(format_tool_result(result), "```\n{'observation': 'ok'}\n```");
    }

    #[test]
    fn passes_other_results_through() {
        assert_eq!(format_tool_result("Search done"), "Search done");
        assert_eq!(format_tool_result(""), "");
    }
}
