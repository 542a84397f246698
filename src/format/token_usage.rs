use regex::Regex;
use std::sync::OnceLock;

fn usage_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"Input=(\d+), Completion=(\d+), .*? Total=(\d+)")
            .unwrap_or_else(|err| panic!("token usage pattern is valid: {err}"))
    })
}

/// Renders `Input=<n>, Completion=<n>, ... Total=<n>` as a three-row table.
/// Anything that does not match is returned unchanged.
pub fn format_token_usage(content: &str) -> String {
    if content.is_empty() {
        return String::new();
    }

    let Some(captures) = usage_pattern().captures(content) else {
        return content.to_string();
    };

    format!(
        "| 类型 | 数量 |\n|------|------|\n| 输入 | {} |\n| 输出 | {} |\n| 总计 | {} |",
        &captures[1], &captures[2], &captures[3]
    )
}

#[cfg(test)]
mod tests {
    use super::format_token_usage;

    #[test]
    fn renders_three_row_table() {
        let table = format_token_usage("Input=10, Completion=5, x Total=15");
        let rows: Vec<&str> = table.lines().collect();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[2], "| 输入 | 10 |");
        assert_eq!(rows[3], "| 输出 | 5 |");
        assert_eq!(rows[4], "| 总计 | 15 |");
    }

    #[test]
    fn matches_real_agent_log_line() {
        let table = format_token_usage(
            "Input=1520, Completion=88, Cumulative Input=4100, Cumulative Completion=300, Total=1608, Cumulative Total=4400",
        );
        assert!(table.contains("| 输入 | 1520 |"));
        assert!(table.contains("| 总计 | 1608 |"));
    }

    #[test]
    fn unmatched_input_passes_through() {
        assert_eq!(format_token_usage("no numbers here"), "no numbers here");
        assert_eq!(format_token_usage("Input=1, Total=2"), "Input=1, Total=2");
        assert_eq!(format_token_usage(""), "");
    }
}
