// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Keyword extraction and the routing score function.
//!
//! Every ingested action pairs its tool with the keywords tokenized from
//! `tool_name + input`; the resulting (keyword, tool) counters feed
//! [`score_for`]. The function is one concrete choice inside the external
//! contract: monotonic in success rate and in log-usage, clamped to
//! [0.1, 5.0]. The SQL upsert in `queries::routing` applies the same
//! formula so concurrent writers resolve through `ON CONFLICT` without an
//! in-memory accumulator.

pub const SCORE_MIN: f32 = 0.1;
pub const SCORE_MAX: f32 = 5.0;

/// Longest keyword list extracted from a single action.
pub const MAX_KEYWORDS: usize = 12;

const MIN_KEYWORD_LEN: usize = 3;

/// Words too common to carry routing signal.
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "into", "this", "that", "are", "was",
    "file", "files", "run", "use", "using", "all", "not", "new", "get", "set",
];

/// Tokenize `tool_name + input` into routing keywords.
///
/// Lowercased, split on anything non-alphanumeric, short words and
/// stopwords dropped, first occurrence wins, capped at [`MAX_KEYWORDS`].
/// The tool name itself is always the first keyword so a tool can be found
/// by its own name even when the input is opaque.
pub fn extract_keywords(tool_name: &str, input: Option<&str>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(MAX_KEYWORDS);

    let tool = tool_name.to_lowercase();
    if !tool.is_empty() {
        seen.push(tool);
    }

    let Some(input) = input else { return seen };
    for token in input
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= MIN_KEYWORD_LEN)
        .filter(|t| !STOPWORDS.contains(t))
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
    {
        if seen.len() >= MAX_KEYWORDS {
            break;
        }
        if !seen.iter().any(|k| k == token) {
            seen.push(token.to_string());
        }
    }
    seen
}

/// The implicit-update score for a (keyword, tool) pair with the given
/// counters.
pub fn score_for(success_count: i64, usage_count: i64) -> f32 {
    if usage_count <= 0 {
        return SCORE_MIN;
    }
    let rate = success_count as f32 / usage_count as f32;
    let usage_bonus = ((1 + usage_count) as f32).ln() * 0.35;
    clamp_score(0.25 + 3.0 * rate + usage_bonus)
}

pub fn clamp_score(score: f32) -> f32 {
    score.clamp(SCORE_MIN, SCORE_MAX)
}

// ── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_name_is_always_first_keyword() {
        let kws = extract_keywords("Read", Some("read src/main"));
        assert_eq!(kws[0], "read");
        assert!(kws.contains(&"src".to_string()));
        assert!(kws.contains(&"main".to_string()));
    }

    #[test]
    fn tokenizer_drops_short_words_stopwords_and_numbers() {
        let kws = extract_keywords("Bash", Some("run the tests for pr 12345 at v2"));
        assert!(!kws.contains(&"the".to_string()));
        assert!(!kws.contains(&"for".to_string()));
        assert!(!kws.contains(&"pr".to_string()), "len < 3 dropped");
        assert!(!kws.contains(&"12345".to_string()), "pure digits dropped");
        assert!(kws.contains(&"tests".to_string()));
    }

    #[test]
    fn tokenizer_dedupes_and_caps() {
        let input = "alpha alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu nu xi";
        let kws = extract_keywords("Grep", Some(input));
        assert_eq!(kws.len(), MAX_KEYWORDS);
        assert_eq!(
            kws.iter().filter(|k| *k == "alpha").count(),
            1,
            "duplicates collapse"
        );
    }

    #[test]
    fn no_input_yields_just_the_tool() {
        assert_eq!(extract_keywords("Edit", None), vec!["edit".to_string()]);
    }

    #[test]
    fn score_is_monotonic_in_success_rate() {
        let low = score_for(1, 10);
        let high = score_for(9, 10);
        assert!(high > low, "higher success rate must score higher");
    }

    #[test]
    fn score_is_monotonic_in_usage_at_fixed_rate() {
        let young = score_for(5, 10);
        let seasoned = score_for(50, 100);
        assert!(
            seasoned > young,
            "same rate with more usage must score higher (log bonus)"
        );
    }

    #[test]
    fn score_respects_clamp_bounds() {
        assert!(score_for(0, 1) >= SCORE_MIN);
        // A perfect tool with huge usage saturates at the cap.
        assert_eq!(score_for(1_000_000, 1_000_000), SCORE_MAX);
        assert_eq!(score_for(0, 0), SCORE_MIN);
    }

    #[test]
    fn clamp_score_bounds_both_ends() {
        assert_eq!(clamp_score(-3.0), SCORE_MIN);
        assert_eq!(clamp_score(9.9), SCORE_MAX);
        assert_eq!(clamp_score(2.5), 2.5);
    }
}
