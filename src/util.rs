use chrono::{SecondsFormat, Utc};

pub fn now_utc_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn normalize_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Single-line preview of chunk text for console output and traces,
/// truncated on a character boundary.
pub fn preview(text: &str, max_chars: usize) -> String {
    let normalized = normalize_whitespace(text);
    let mut chars = normalized.chars();
    let truncated: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{truncated}...")
    } else {
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_whitespace, preview};

    #[test]
    fn normalize_whitespace_collapses_runs_and_newlines() {
        assert_eq!(
            normalize_whitespace("  physical\n\tAI   systems "),
            "physical AI systems"
        );
    }

    #[test]
    fn preview_keeps_short_text_unchanged() {
        assert_eq!(preview("humanoid robotics", 50), "humanoid robotics");
    }

    #[test]
    fn preview_truncates_long_text_with_ellipsis() {
        let text = "a".repeat(30);
        assert_eq!(preview(&text, 10), format!("{}...", "a".repeat(10)));
    }

    #[test]
    fn preview_respects_multibyte_boundaries() {
        let text = "héllo wörld";
        let truncated = preview(text, 4);
        assert_eq!(truncated, "héll...");
    }
}
