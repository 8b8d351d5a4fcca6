// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Token budgeting for generated briefs.
//!
//! Token counts are approximated as ⌈chars / 3.5⌉. When a brief exceeds
//! its budget, content lines are dropped from the end — headers (lines
//! starting with `#`) are always retained so the document structure stays
//! navigable — and a truncation notice is appended.

/// Budget bounds for `max_tokens`.
pub const MIN_TOKENS: usize = 100;
pub const MAX_TOKENS: usize = 8000;
pub const DEFAULT_TOKENS: usize = 2000;

const TRUNCATION_NOTICE: &str = "*…truncated to fit the token budget*";

/// ⌈chars / 3.5⌉.
pub fn estimate_tokens(text: &str) -> usize {
    let chars = text.chars().count();
    (chars * 2).div_ceil(7)
}

/// Clamp a requested budget into [100, 8000]; `None` means the default.
pub fn clamp_max_tokens(requested: Option<i64>) -> usize {
    match requested {
        None => DEFAULT_TOKENS,
        Some(n) => (n.max(0) as usize).clamp(MIN_TOKENS, MAX_TOKENS),
    }
}

/// Fit `content` into `max_tokens`. Returns (content, token_count,
/// truncated).
pub fn apply_budget(content: String, max_tokens: usize) -> (String, usize, bool) {
    let tokens = estimate_tokens(&content);
    if tokens <= max_tokens {
        return (content, tokens, false);
    }

    let mut lines: Vec<&str> = content.lines().collect();
    loop {
        // Drop the last line that is not a header.
        let Some(pos) = lines.iter().rposition(|l| !l.trim_start().starts_with('#')) else {
            break;
        };
        lines.remove(pos);
        let candidate = lines.join("\n");
        if estimate_tokens(&candidate) + estimate_tokens(TRUNCATION_NOTICE) + 1 <= max_tokens {
            break;
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out.push_str(TRUNCATION_NOTICE);
    let tokens = estimate_tokens(&out);
    (out, tokens, true)
}

// ── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1); // 3 / 3.5 → 1
        assert_eq!(estimate_tokens("abcdefg"), 2); // 7 / 3.5 = 2
        assert_eq!(estimate_tokens("abcdefgh"), 3); // 8 / 3.5 → 3
    }

    #[test]
    fn clamp_applies_bounds_and_default() {
        assert_eq!(clamp_max_tokens(None), DEFAULT_TOKENS);
        assert_eq!(clamp_max_tokens(Some(50)), MIN_TOKENS);
        assert_eq!(clamp_max_tokens(Some(999_999)), MAX_TOKENS);
        assert_eq!(clamp_max_tokens(Some(4000)), 4000);
        assert_eq!(clamp_max_tokens(Some(-7)), MIN_TOKENS);
    }

    #[test]
    fn content_within_budget_is_untouched() {
        let text = "# Title\nshort body".to_string();
        let (out, tokens, truncated) = apply_budget(text.clone(), 1000);
        assert_eq!(out, text);
        assert!(!truncated);
        assert_eq!(tokens, estimate_tokens(&out));
    }

    #[test]
    fn truncation_drops_tail_lines_but_keeps_headers() {
        let mut text = String::from("# Brief\n## Section\n");
        for i in 0..200 {
            text.push_str(&format!("content line number {i} with some padding text\n"));
        }
        let (out, tokens, truncated) = apply_budget(text, MIN_TOKENS);
        assert!(truncated);
        assert!(tokens <= MIN_TOKENS + estimate_tokens(TRUNCATION_NOTICE) + 1);
        assert!(out.contains("# Brief"), "headers must survive truncation");
        assert!(out.contains("## Section"));
        assert!(out.ends_with(TRUNCATION_NOTICE));
        assert!(!out.contains("line number 199"), "tail content must be gone");
    }

    #[test]
    fn all_header_document_stops_cleanly() {
        let text = "# A\n## B\n### C".to_string();
        let (out, _, truncated) = apply_budget(text, 1);
        assert!(truncated);
        assert!(out.contains("# A"));
    }
}
