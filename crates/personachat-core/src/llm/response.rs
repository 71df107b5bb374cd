use once_cell::sync::Lazy;
use regex::Regex;

const THINK_END: &str = "</think>";

static NEWLINE_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{2,}").expect("newline pattern compiles"));

/// Clean a raw model reply before it is shown and stored: drop any reasoning
/// block closed by `</think>`, collapse blank-line runs, trim leading whitespace.
pub fn preprocess_response(raw: &str) -> String {
    let visible = match raw.find(THINK_END) {
        Some(idx) => &raw[idx + THINK_END.len()..],
        None => raw,
    };
    NEWLINE_RUNS
        .replace_all(visible, "\n")
        .trim_start()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_reasoning_block() {
        let raw = "<think>plan\n\nsteps</think>\n\nHello there";
        assert_eq!(preprocess_response(raw), "Hello there");
    }

    #[test]
    fn test_collapses_blank_lines() {
        assert_eq!(preprocess_response("  a\n\n\nb\nc"), "a\nb\nc");
    }

    #[test]
    fn test_plain_reply_untouched() {
        assert_eq!(preprocess_response("just text"), "just text");
    }
}
