//! Character-based token estimation.
//!
//! One estimator shared by the synthesis builder (batch sizing) and the Q&A
//! engine (answer-context budgeting) so both bound prompts the same way.

/// Approximate tokens per character for mixed prose and code.
const TOKENS_PER_CHAR: f64 = 0.25;

/// Multiplier covering delimiters, labels, and template scaffolding added
/// around raw content when a prompt is assembled.
const FORMATTING_OVERHEAD: f64 = 1.5;

/// Estimate the token footprint of `text` once embedded in a prompt.
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() as f64 * TOKENS_PER_CHAR * FORMATTING_OVERHEAD).ceil() as usize
}

/// Estimate the combined token footprint of several fragments.
pub fn estimate_tokens_all<'a, I>(fragments: I) -> usize
where
    I: IntoIterator<Item = &'a str>,
{
    fragments.into_iter().map(estimate_tokens).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn test_scaling() {
        // 1000 chars * 0.25 * 1.5 = 375
        let text = "a".repeat(1000);
        assert_eq!(estimate_tokens(&text), 375);
    }

    #[test]
    fn test_rounds_up() {
        assert_eq!(estimate_tokens("ab"), 1);
    }

    #[test]
    fn test_sum_matches_parts() {
        let a = "x".repeat(100);
        let b = "y".repeat(200);
        assert_eq!(
            estimate_tokens_all([a.as_str(), b.as_str()]),
            estimate_tokens(&a) + estimate_tokens(&b)
        );
    }
}
