//! Output-language enforcement for prompts and responses.

use tracing::warn;

use crate::core::config::FirewallConfig;

/// Fixed inbound density threshold for English output.
const INBOUND_DENSITY_THRESHOLD: f64 = 0.01;

/// Verdict on an inbound model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundVerdict {
    /// Response satisfies the language constraint.
    Clean,
    /// Density exceeded; the caller should retry once with a reinforced
    /// language instruction.
    RetryNeeded,
}

/// Pre-send and post-receive language checks.
#[derive(Debug, Clone)]
pub struct PromptFirewall {
    language: String,
    config: FirewallConfig,
}

impl PromptFirewall {
    /// Create a firewall bound to the configured output language.
    pub fn new(language: impl Into<String>, config: FirewallConfig) -> Self {
        Self {
            language: language.into(),
            config,
        }
    }

    fn enforces_ascii(&self) -> bool {
        self.language.eq_ignore_ascii_case("english")
    }

    /// Check an outbound prompt. When the language is English and non-ASCII
    /// density exceeds the configured threshold, the offending characters
    /// are stripped and a warning is returned alongside the scrubbed prompt.
    pub fn check_outbound(&self, prompt: &str) -> (String, Option<String>) {
        if !self.enforces_ascii() {
            return (prompt.to_string(), None);
        }

        let density = non_ascii_density(prompt);
        if density <= self.config.outbound_density_threshold {
            return (prompt.to_string(), None);
        }

        let scrubbed: String = prompt.chars().filter(char::is_ascii).collect();
        let warning = format!(
            "outbound prompt non-ASCII density {:.3} exceeded threshold {:.3}; offending region stripped",
            density, self.config.outbound_density_threshold
        );
        warn!(density, "{warning}");
        (scrubbed, Some(warning))
    }

    /// Check an inbound response against the 1% density rule.
    pub fn check_inbound(&self, response: &str) -> InboundVerdict {
        if !self.enforces_ascii() {
            return InboundVerdict::Clean;
        }
        if non_ascii_density(response) > INBOUND_DENSITY_THRESHOLD {
            InboundVerdict::RetryNeeded
        } else {
            InboundVerdict::Clean
        }
    }

    /// Instruction appended to the prompt on the single reinforced retry.
    pub fn reinforcement(&self) -> String {
        format!(
            "\n\nIMPORTANT: Respond strictly in {}. Do not include text in any other language.",
            self.language
        )
    }

    /// Warning recorded on page metadata when the reinforced retry also
    /// fails and the response is accepted as-is.
    pub fn acceptance_warning(&self, response: &str) -> String {
        format!(
            "response non-{} character density {:.3} exceeded 1% after reinforced retry; accepted as-is",
            self.language,
            non_ascii_density(response)
        )
    }

    /// Configured output language.
    pub fn language(&self) -> &str {
        &self.language
    }
}

/// Fraction of characters outside the ASCII range.
pub fn non_ascii_density(text: &str) -> f64 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let non_ascii = text.chars().filter(|c| !c.is_ascii()).count();
    non_ascii as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn firewall() -> PromptFirewall {
        PromptFirewall::new("English", FirewallConfig::default())
    }

    #[test]
    fn test_density_computation() {
        assert_eq!(non_ascii_density(""), 0.0);
        assert_eq!(non_ascii_density("abcd"), 0.0);
        assert!((non_ascii_density("ab\u{00e9}\u{00e9}") - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_outbound_clean_passes_through() {
        let (prompt, warning) = firewall().check_outbound("all ascii content");
        assert_eq!(prompt, "all ascii content");
        assert!(warning.is_none());
    }

    #[test]
    fn test_outbound_scrubs_dense_prompt() {
        let dense = "\u{4f60}\u{597d}\u{4e16}\u{754c} hi";
        let (prompt, warning) = firewall().check_outbound(dense);
        assert_eq!(prompt, " hi");
        assert!(warning.is_some());
    }

    #[test]
    fn test_non_english_language_skips_checks() {
        let fw = PromptFirewall::new("Japanese", FirewallConfig::default());
        let text = "\u{3053}\u{3093}\u{306b}\u{3061}\u{306f}";
        let (prompt, warning) = fw.check_outbound(text);
        assert_eq!(prompt, text);
        assert!(warning.is_none());
        assert_eq!(fw.check_inbound(text), InboundVerdict::Clean);
    }

    #[test]
    fn test_inbound_over_one_percent_flags_retry() {
        let mut response = "a".repeat(100);
        response.push_str("\u{00e9}\u{00e9}");
        assert_eq!(firewall().check_inbound(&response), InboundVerdict::RetryNeeded);
    }

    #[test]
    fn test_inbound_under_one_percent_clean() {
        let mut response = "a".repeat(1000);
        response.push('\u{00e9}');
        assert_eq!(firewall().check_inbound(&response), InboundVerdict::Clean);
    }

    #[test]
    fn test_reinforcement_names_language() {
        assert!(firewall().reinforcement().contains("English"));
    }
}
