//! Generation phase implementations.
//!
//! Every generator follows the same contract: render the phase prompt with
//! named parameters, call the model through the retry policy, run the
//! inbound language check (with its single reinforced retry), parse the
//! structured block, and return the page plus its summary. Notes for the
//! current target arrive pre-joined as a corrections string; when it is
//! empty the prompt section is omitted entirely.

pub mod architecture;
pub mod directories;
pub mod files;
pub mod overview;
pub mod workflows;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::core::config::OyaConfig;
use crate::core::errors::Result;
use crate::core::repository::Repository;
use crate::llm::{generate_with_retry, GenerationRequest, LlmClient};
use crate::parse::symbols::ParsedSymbol;
use crate::prompt::firewall::InboundVerdict;
use crate::prompt::renderer::{PromptRenderer, RenderedPrompt};
use crate::summary::schema::FileSummary;

/// Shared inputs every phase generator needs.
pub struct PhaseContext<'a> {
    /// Repository under documentation
    pub repo: &'a Repository,
    /// Run configuration
    pub config: &'a OyaConfig,
    /// LLM client
    pub llm: &'a dyn LlmClient,
    /// Prompt renderer bound to the output language
    pub renderer: &'a PromptRenderer,
    /// Cooperative cancellation token
    pub cancel: CancellationToken,
}

impl PhaseContext<'_> {
    /// Dispatch a rendered prompt and apply the inbound language firewall.
    ///
    /// A flagged response earns exactly one reinforced retry; if that also
    /// fails the response is accepted with a warning recorded for the page
    /// metadata. Returns the response text plus accumulated warnings.
    pub async fn checked_generate(&self, prompt: RenderedPrompt) -> Result<(String, Vec<String>)> {
        let mut warnings = Vec::new();
        if let Some(warning) = prompt.warning {
            warnings.push(warning);
        }

        let request =
            GenerationRequest::new(prompt.text.clone(), self.config.llm.temperature);
        let response = generate_with_retry(
            self.llm,
            &request,
            self.config.generation.max_retries,
            &self.cancel,
        )
        .await?;

        let firewall = self.renderer.firewall();
        match firewall.check_inbound(&response) {
            InboundVerdict::Clean => Ok((response, warnings)),
            InboundVerdict::RetryNeeded => {
                warn!("response failed language check, retrying with reinforced instruction");
                let reinforced = GenerationRequest::new(
                    format!("{}{}", prompt.text, firewall.reinforcement()),
                    self.config.llm.temperature,
                );
                let second = generate_with_retry(
                    self.llm,
                    &reinforced,
                    self.config.generation.max_retries,
                    &self.cancel,
                )
                .await?;

                if firewall.check_inbound(&second) == InboundVerdict::RetryNeeded {
                    let warning = firewall.acceptance_warning(&second);
                    warn!("{warning}");
                    warnings.push(warning);
                }
                Ok((second, warnings))
            }
        }
    }
}

/// Render symbols as one line each for prompt context.
pub fn format_symbols(symbols: &[ParsedSymbol]) -> String {
    if symbols.is_empty() {
        return "(none detected)".to_string();
    }
    symbols
        .iter()
        .map(ParsedSymbol::render)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render file summaries as compact prompt context.
pub fn format_file_summaries(summaries: &[&FileSummary]) -> String {
    if summaries.is_empty() {
        return "(none)".to_string();
    }
    summaries
        .iter()
        .map(|s| {
            format!(
                "- {} [{}]: {} (abstractions: {})",
                s.file_path,
                s.layer,
                s.purpose,
                if s.key_abstractions.is_empty() {
                    "none".to_string()
                } else {
                    s.key_abstractions.join(", ")
                }
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::symbols::SymbolKind;
    use crate::summary::schema::Layer;

    #[test]
    fn test_format_symbols_empty() {
        assert_eq!(format_symbols(&[]), "(none detected)");
    }

    #[test]
    fn test_format_file_summaries() {
        let summary = FileSummary {
            file_path: "src/a.py".into(),
            purpose: "Does things.".into(),
            layer: Layer::Api,
            key_abstractions: vec!["Thing".into()],
            internal_deps: vec![],
            external_deps: vec![],
        };
        let text = format_file_summaries(&[&summary]);
        assert!(text.contains("src/a.py [api]"));
        assert!(text.contains("Thing"));
    }

    #[test]
    fn test_format_symbols_lines() {
        let symbols = vec![
            ParsedSymbol::new("main", SymbolKind::Function, "a.py", 1),
            ParsedSymbol::new("App", SymbolKind::Class, "a.py", 5),
        ];
        let text = format_symbols(&symbols);
        assert_eq!(text.lines().count(), 2);
    }

    mod firewall_retry {
        use super::*;
        use crate::core::repository::Repository;
        use crate::llm::MockLlmClient;
        use crate::prompt::renderer::{PromptRenderer, RenderedPrompt};
        use tempfile::TempDir;
        use tokio_util::sync::CancellationToken;

        fn dense_response() -> String {
            let mut text = "a".repeat(50);
            text.push_str(&"\u{00e9}".repeat(50));
            text
        }

        fn prompt() -> RenderedPrompt {
            RenderedPrompt {
                text: "describe the module".to_string(),
                warning: None,
            }
        }

        async fn run_checked(llm: &MockLlmClient) -> (String, Vec<String>) {
            let dir = TempDir::new().unwrap();
            let repo = Repository::open(dir.path()).unwrap();
            let config = OyaConfig::default();
            let renderer = PromptRenderer::new("English", config.firewall.clone()).unwrap();
            let ctx = PhaseContext {
                repo: &repo,
                config: &config,
                llm,
                renderer: &renderer,
                cancel: CancellationToken::new(),
            };
            ctx.checked_generate(prompt()).await.unwrap()
        }

        #[tokio::test]
        async fn test_reinforced_retry_recovers() {
            // First response is too dense; the reinforced prompt gets a
            // clean one.
            let llm = MockLlmClient::new()
                .with_response_for("Respond strictly in English", "clean english output")
                .with_default_response(dense_response());

            let (response, warnings) = run_checked(&llm).await;
            assert_eq!(response, "clean english output");
            assert!(warnings.is_empty());
            assert_eq!(llm.generate_calls(), 2);
        }

        #[tokio::test]
        async fn test_second_failure_accepted_with_warning() {
            let llm = MockLlmClient::new().with_default_response(dense_response());

            let (response, warnings) = run_checked(&llm).await;
            assert_eq!(response, dense_response());
            assert_eq!(warnings.len(), 1);
            assert!(warnings[0].contains("after reinforced retry"));
            assert_eq!(llm.generate_calls(), 2);
        }

        #[tokio::test]
        async fn test_clean_response_passes_once() {
            let llm = MockLlmClient::new().with_default_response("all fine");
            let (response, warnings) = run_checked(&llm).await;
            assert_eq!(response, "all fine");
            assert!(warnings.is_empty());
            assert_eq!(llm.generate_calls(), 1);
        }
    }
}
