//! Hybrid retrieval and evidence-gated answer generation.
//!
//! Two subqueries run in parallel: semantic (vector top-K) and lexical
//! (BM25 top-K). A failing subquery degrades to the survivor and is reported
//! in `search_quality`, never silently. Live notes join the merged list and
//! outrank wiki pages. Answers only flow once the evidence gate passes (or
//! in loose mode, with a limited-evidence disclaimer attached).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::core::config::{GateMode, OyaConfig};
use crate::core::errors::Result;
use crate::core::repository::{Repository, WikiLayout};
use crate::core::tokens::estimate_tokens;
use crate::index::fts::FtsIndex;
use crate::index::indexer::EmbeddingMetadata;
use crate::index::vector::VectorStore;
use crate::llm::retry::{embed_with_retry, generate_with_retry};
use crate::llm::{GenerationRequest, LlmClient};
use crate::prompt::firewall::InboundVerdict;
use crate::prompt::renderer::PromptRenderer;
use crate::qa::citations::{parse_citations, Citation};
use crate::store::notes::{NoteScope, NotesStore};

/// Refusal text used when the evidence gate blocks an answer.
const REFUSAL_DISCLAIMER: &str = "I could not find enough relevant material in the generated wiki \
     to answer this question reliably. Try regenerating the wiki or rephrasing the question.";

/// Disclaimer attached to loose-mode answers with thin evidence.
const LIMITED_EVIDENCE_DISCLAIMER: &str =
    "Limited evidence: the retrieved material only partially covers this question.";

/// How retrieval held up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchQuality {
    /// Both subqueries succeeded.
    Full,
    /// Only the semantic subquery survived.
    SemanticOnly,
    /// Only the lexical subquery survived.
    LexicalOnly,
    /// Both subqueries failed.
    Failed,
}

impl SearchQuality {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::SemanticOnly => "semantic_only",
            Self::LexicalOnly => "lexical_only",
            Self::Failed => "failed",
        }
    }
}

/// Answer confidence derived from evidence count and best distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// A grounded answer.
#[derive(Debug, Clone)]
pub struct QaAnswer {
    /// Answer body (refusal text when gated)
    pub answer: String,
    /// Validated citations
    pub citations: Vec<Citation>,
    /// Derived confidence
    pub confidence: Confidence,
    /// Disclaimer, when one applies
    pub disclaimer: Option<String>,
    /// Retrieval quality
    pub search_quality: SearchQuality,
    /// Non-fatal warnings (embedding mismatch, firewall acceptance)
    pub warnings: Vec<String>,
}

/// One merged retrieval result.
#[derive(Debug, Clone)]
struct RetrievedItem {
    path: String,
    label: String,
    content: String,
    is_note: bool,
    semantic_distance: Option<f32>,
    lexical_score: Option<f64>,
}

impl RetrievedItem {
    fn type_priority(&self) -> u8 {
        if self.is_note {
            0
        } else {
            1
        }
    }

    /// Best relevance from either side, in [0, 1).
    fn relevance(&self) -> f64 {
        let semantic = self
            .semantic_distance
            .map(|d| f64::from(1.0 - d).max(0.0))
            .unwrap_or(0.0);
        let lexical = self
            .lexical_score
            .map(|s| s.max(0.0) / (s.max(0.0) + 1.0))
            .unwrap_or(0.0);
        semantic.max(lexical)
    }
}

/// Grounded Q&A over the promoted wiki set.
pub struct QaEngine {
    config: OyaConfig,
    repo_name: String,
    llm: Arc<dyn LlmClient>,
    renderer: PromptRenderer,
    vector: VectorStore,
    fts: FtsIndex,
    notes: NotesStore,
    metadata_path: PathBuf,
}

impl QaEngine {
    /// Open the engine over a repository's production artifact set.
    pub fn open(repo: &Repository, config: OyaConfig, llm: Arc<dyn LlmClient>) -> Result<Self> {
        let layout = WikiLayout::new(repo.production_dir());
        let renderer =
            PromptRenderer::new(config.generation.language.clone(), config.firewall.clone())?;
        Ok(Self {
            repo_name: repo.name(),
            vector: VectorStore::open(&layout.vector_dir())?,
            fts: FtsIndex::open(&layout.fts_db())?,
            notes: NotesStore::new(layout.notes_dir()),
            metadata_path: layout.embedding_metadata_file(),
            config,
            llm,
            renderer,
        })
    }

    /// Answer a question grounded in the indexed wiki plus live notes.
    pub async fn ask(&self, question: &str) -> Result<QaAnswer> {
        let mut warnings = Vec::new();
        if let Some(mismatch) = self.embedding_mismatch() {
            warnings.push(mismatch);
        }

        let (items, search_quality) = self.retrieve(question).await;

        let retrieval = &self.config.retrieval;
        let evidence: Vec<&RetrievedItem> = items
            .iter()
            .filter(|item| {
                matches!(item.semantic_distance, Some(d) if d <= retrieval.distance_threshold)
            })
            .collect();
        let best_distance = evidence
            .iter()
            .filter_map(|item| item.semantic_distance)
            .fold(f32::INFINITY, f32::min);

        let gate_passed = evidence.len() >= retrieval.min_evidence;
        if !gate_passed && retrieval.gate_mode == GateMode::Gated {
            return Ok(QaAnswer {
                answer: REFUSAL_DISCLAIMER.to_string(),
                citations: Vec::new(),
                confidence: Confidence::Low,
                disclaimer: Some(REFUSAL_DISCLAIMER.to_string()),
                search_quality,
                warnings,
            });
        }

        let context = assemble_context(&items, retrieval.context_tokens);
        let params = json!({
            "repo_name": self.repo_name,
            "context": if context.is_empty() { "(no material retrieved)".to_string() } else { context },
            "question": question,
            "language": self.config.generation.language,
        });
        let prompt = self.renderer.render("qa", &params)?;
        if let Some(warning) = &prompt.warning {
            warnings.push(warning.clone());
        }

        let cancel = CancellationToken::new();
        let request = GenerationRequest::new(prompt.text.clone(), self.config.llm.temperature);
        let mut response = generate_with_retry(
            self.llm.as_ref(),
            &request,
            self.config.generation.max_retries,
            &cancel,
        )
        .await?;

        let firewall = self.renderer.firewall();
        if firewall.check_inbound(&response) == InboundVerdict::RetryNeeded {
            let reinforced = GenerationRequest::new(
                format!("{}{}", prompt.text, firewall.reinforcement()),
                self.config.llm.temperature,
            );
            response = generate_with_retry(
                self.llm.as_ref(),
                &reinforced,
                self.config.generation.max_retries,
                &cancel,
            )
            .await?;
            if firewall.check_inbound(&response) == InboundVerdict::RetryNeeded {
                warnings.push(firewall.acceptance_warning(&response));
            }
        }

        let (answer, raw_citations) = parse_citations(&response);
        let citations = validate_citations(raw_citations, &items);

        let confidence = if !gate_passed {
            Confidence::Low
        } else if evidence.len() >= 4 && best_distance <= 0.5 {
            Confidence::High
        } else {
            Confidence::Medium
        };

        let disclaimer = if !gate_passed {
            Some(LIMITED_EVIDENCE_DISCLAIMER.to_string())
        } else {
            None
        };

        Ok(QaAnswer {
            answer,
            citations,
            confidence,
            disclaimer,
            search_quality,
            warnings,
        })
    }

    /// Issue the two subqueries in parallel, merge, and attach live notes.
    async fn retrieve(&self, question: &str) -> (Vec<RetrievedItem>, SearchQuality) {
        let top_k = self.config.retrieval.top_k;

        let semantic_future = async {
            let cancel = CancellationToken::new();
            let embedding = embed_with_retry(
                self.llm.as_ref(),
                question,
                self.config.generation.max_retries,
                &cancel,
            )
            .await?;
            self.vector.query(&embedding, top_k)
        };
        let lexical_future = async { self.fts.search(question, top_k) };

        let (semantic, lexical) = tokio::join!(semantic_future, lexical_future);

        let semantic = match semantic {
            Ok(hits) => Some(hits),
            Err(err) => {
                warn!(error = %err, "semantic subquery failed, degrading to lexical-only");
                None
            }
        };
        let lexical = match lexical {
            Ok(hits) => Some(hits),
            Err(err) => {
                warn!(error = %err, "lexical subquery failed, degrading to semantic-only");
                None
            }
        };

        let search_quality = match (&semantic, &lexical) {
            (Some(_), Some(_)) => SearchQuality::Full,
            (Some(_), None) => SearchQuality::SemanticOnly,
            (None, Some(_)) => SearchQuality::LexicalOnly,
            (None, None) => SearchQuality::Failed,
        };

        // Merge: dedup by path keeping each side's best score.
        let mut by_path: HashMap<String, RetrievedItem> = HashMap::new();
        for hit in semantic.unwrap_or_default() {
            by_path.insert(
                hit.id.clone(),
                RetrievedItem {
                    path: hit.id,
                    label: format!("{}:{}", hit.page_type, hit.title),
                    content: hit.document,
                    is_note: false,
                    semantic_distance: Some(hit.distance),
                    lexical_score: None,
                },
            );
        }
        for hit in lexical.unwrap_or_default() {
            by_path
                .entry(hit.path.clone())
                .and_modify(|item| item.lexical_score = Some(hit.score))
                .or_insert(RetrievedItem {
                    path: hit.path,
                    label: format!("{}:{}", hit.page_type, hit.title),
                    // Lexical-only hits carry no stored document; the vector
                    // row is the canonical content source.
                    content: String::new(),
                    is_note: false,
                    semantic_distance: None,
                    lexical_score: Some(hit.score),
                });
        }

        // Live notes: general notes always participate, targeted notes when
        // they share vocabulary with the question.
        let question_terms: Vec<String> = question
            .to_ascii_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect::<Vec<_>>();
        for note in self.notes.snapshot().all() {
            let include = note.scope == NoteScope::General || {
                let haystack =
                    format!("{} {}", note.target, note.content).to_ascii_lowercase();
                question_terms
                    .iter()
                    .any(|term| term.len() > 2 && haystack.contains(term.as_str()))
            };
            if include {
                let path = format!("notes/{}", note.id);
                by_path.insert(
                    path.clone(),
                    RetrievedItem {
                        path,
                        label: format!("note:{}", note.scope),
                        content: note.content.clone(),
                        is_note: true,
                        semantic_distance: None,
                        lexical_score: None,
                    },
                );
            }
        }

        let mut items: Vec<RetrievedItem> = by_path.into_values().collect();
        items.sort_by(|a, b| {
            a.type_priority().cmp(&b.type_priority()).then(
                b.relevance()
                    .partial_cmp(&a.relevance())
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
        });

        (items, search_quality)
    }

    /// Warning when the configured embedding provider/model differs from the
    /// one recorded at indexing time. No automatic reindex.
    fn embedding_mismatch(&self) -> Option<String> {
        let recorded = EmbeddingMetadata::read(&self.metadata_path)?;
        let provider = self.llm.provider();
        let model = self.llm.embedding_model();
        if recorded.provider != provider || recorded.model != model {
            Some(format!(
                "embedding model mismatch: index built with {}/{}, configured {}/{}; semantic \
                 retrieval quality may degrade until the wiki is reindexed",
                recorded.provider, recorded.model, provider, model
            ))
        } else {
            None
        }
    }
}

/// Concatenate labeled results up to the token budget.
fn assemble_context(items: &[RetrievedItem], budget_tokens: usize) -> String {
    let mut out = String::new();
    let mut spent = 0usize;
    for item in items {
        let block = format!("[{}] ({})\n{}\n\n", item.path, item.label, item.content);
        let cost = estimate_tokens(&block);
        if spent + cost > budget_tokens && !out.is_empty() {
            break;
        }
        spent += cost;
        out.push_str(&block);
    }
    out.trim_end().to_string()
}

/// Keep citations whose path is a prefix of a retrieved path; invalid ones
/// are dropped with a warning. An empty survivor set falls back to the top-3
/// retrieved paths.
fn validate_citations(raw: Vec<Citation>, items: &[RetrievedItem]) -> Vec<Citation> {
    let mut valid: Vec<Citation> = Vec::new();
    for citation in raw {
        let grounded = items.iter().any(|item| item.path.starts_with(&citation.path));
        if grounded {
            if !valid.iter().any(|existing| existing.path == citation.path) {
                valid.push(citation);
            }
        } else {
            warn!(path = %citation.path, "dropping citation not present in retrieved set");
        }
    }

    if valid.is_empty() {
        valid = items
            .iter()
            .take(3)
            .map(|item| Citation {
                path: item.path.clone(),
                lines: None,
            })
            .collect();
    }
    valid
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(path: &str, is_note: bool, distance: Option<f32>, score: Option<f64>) -> RetrievedItem {
        RetrievedItem {
            path: path.to_string(),
            label: "file:x".to_string(),
            content: "content".to_string(),
            is_note,
            semantic_distance: distance,
            lexical_score: score,
        }
    }

    #[test]
    fn test_notes_outrank_wiki_pages() {
        let mut items = vec![
            item("files/a.md", false, Some(0.1), None),
            item("notes/n1", true, None, None),
        ];
        items.sort_by(|a, b| {
            a.type_priority().cmp(&b.type_priority()).then(
                b.relevance()
                    .partial_cmp(&a.relevance())
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
        });
        assert!(items[0].is_note);
    }

    #[test]
    fn test_relevance_prefers_lower_distance() {
        let close = item("a", false, Some(0.1), None);
        let far = item("b", false, Some(0.9), None);
        assert!(close.relevance() > far.relevance());
    }

    #[test]
    fn test_validate_citations_drops_unknown() {
        let items = vec![item("files/a.md", false, Some(0.2), None)];
        let raw = vec![
            Citation {
                path: "files/a.md".to_string(),
                lines: None,
            },
            Citation {
                path: "files/fabricated.md".to_string(),
                lines: None,
            },
        ];
        let valid = validate_citations(raw, &items);
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].path, "files/a.md");
    }

    #[test]
    fn test_validate_citations_prefix_rule() {
        let items = vec![item("files/a-py.md", false, Some(0.2), None)];
        let raw = vec![Citation {
            path: "files/a-py".to_string(),
            lines: None,
        }];
        let valid = validate_citations(raw, &items);
        assert_eq!(valid.len(), 1);
    }

    #[test]
    fn test_empty_citations_fall_back_to_top_three() {
        let items = vec![
            item("files/a.md", false, Some(0.1), None),
            item("files/b.md", false, Some(0.2), None),
            item("files/c.md", false, Some(0.3), None),
            item("files/d.md", false, Some(0.4), None),
        ];
        let valid = validate_citations(Vec::new(), &items);
        assert_eq!(valid.len(), 3);
        assert_eq!(valid[0].path, "files/a.md");
    }

    #[test]
    fn test_context_respects_budget() {
        let items: Vec<RetrievedItem> = (0..50)
            .map(|i| {
                let mut it = item(&format!("files/{i}.md"), false, Some(0.1), None);
                it.content = "word ".repeat(400);
                it
            })
            .collect();
        let context = assemble_context(&items, 500);
        assert!(estimate_tokens(&context) <= 1_200);
        assert!(!context.is_empty());
    }
}
