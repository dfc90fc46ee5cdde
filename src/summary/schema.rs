//! Summary records produced by the generation phases.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Architectural layer assigned to every source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Api,
    Domain,
    Infrastructure,
    Utility,
    Config,
    Test,
}

impl Layer {
    /// All valid layers, in display order.
    pub const ALL: [Layer; 6] = [
        Layer::Api,
        Layer::Domain,
        Layer::Infrastructure,
        Layer::Utility,
        Layer::Config,
        Layer::Test,
    ];

    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Domain => "domain",
            Self::Infrastructure => "infrastructure",
            Self::Utility => "utility",
            Self::Config => "config",
            Self::Test => "test",
        }
    }

    /// Parse a layer name, coercing anything outside the valid set to
    /// [`Layer::Utility`].
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "api" => Self::Api,
            "domain" => Self::Domain,
            "infrastructure" => Self::Infrastructure,
            "utility" => Self::Utility,
            "config" => Self::Config,
            "test" => Self::Test,
            _ => Self::Utility,
        }
    }

    /// Static description used for the algorithmic layer grouping.
    pub fn purpose(&self) -> &'static str {
        match self {
            Self::Api => "External interface surface: endpoints, handlers, and entry points",
            Self::Domain => "Core business logic and domain models",
            Self::Infrastructure => "Persistence, transport, and integration plumbing",
            Self::Utility => "Shared helpers and cross-cutting utilities",
            Self::Config => "Configuration, settings, and environment wiring",
            Self::Test => "Test suites and fixtures",
        }
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured summary of one source file, produced by the Files phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSummary {
    /// Repo-relative path
    pub file_path: String,
    /// One-sentence purpose
    pub purpose: String,
    /// Architectural layer
    pub layer: Layer,
    /// Names of the key abstractions defined here
    pub key_abstractions: Vec<String>,
    /// Repo-relative paths this file depends on
    pub internal_deps: Vec<String>,
    /// External package names this file depends on
    pub external_deps: Vec<String>,
}

impl FileSummary {
    /// Fallback summary used when structured extraction fails.
    pub fn fallback(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            purpose: "Unknown".to_string(),
            layer: Layer::Utility,
            key_abstractions: Vec::new(),
            internal_deps: Vec::new(),
            external_deps: Vec::new(),
        }
    }
}

/// Structured summary of one directory, produced by the Directories phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorySummary {
    /// Repo-relative directory path; empty for the repository root
    pub directory_path: String,
    /// One-sentence purpose
    pub purpose: String,
    /// Direct child file names
    pub contains: Vec<String>,
    /// Role this directory plays in the wider system
    pub role_in_system: String,
}

impl DirectorySummary {
    /// Fallback summary used when structured extraction fails.
    pub fn fallback(directory_path: impl Into<String>, contains: Vec<String>) -> Self {
        Self {
            directory_path: directory_path.into(),
            purpose: "Unknown".to_string(),
            contains,
            role_in_system: "Unknown".to_string(),
        }
    }
}

/// Per-layer grouping inside the synthesis map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerInfo {
    /// Layer description
    pub purpose: String,
    /// Files classified into this layer
    pub files: Vec<String>,
    /// Directories whose direct files appear in this layer
    pub directories: Vec<String>,
}

/// A key component named by the synthesis step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyComponent {
    /// Component name
    pub name: String,
    /// Defining file
    #[serde(default)]
    pub file: String,
    /// Role in the system
    #[serde(default)]
    pub role: String,
    /// Layer the component belongs to
    #[serde(default)]
    pub layer: String,
}

/// Codebase-wide layered model aggregated from file and directory summaries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynthesisMap {
    /// Layer name to grouping; a layer appears iff at least one file is
    /// classified into it
    pub layers: IndexMap<String, LayerInfo>,
    /// Deduplicated key components
    pub key_components: Vec<KeyComponent>,
    /// Layer-level dependency edges; cycles are stored as reported
    pub dependency_graph: IndexMap<String, Vec<String>>,
    /// One short paragraph describing the project
    pub project_summary: String,
}

impl SynthesisMap {
    /// Whether the map carries no content at all.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
            && self.key_components.is_empty()
            && self.dependency_graph.is_empty()
            && self.project_summary.is_empty()
    }
}

/// Wiki page classification, derived from the page's path prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageType {
    Overview,
    Architecture,
    Workflow,
    Directory,
    File,
    /// Catch-all for pages outside the known prefixes.
    Wiki,
}

impl PageType {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overview => "overview",
            Self::Architecture => "architecture",
            Self::Workflow => "workflow",
            Self::Directory => "directory",
            Self::File => "file",
            Self::Wiki => "wiki",
        }
    }

    /// Classify a wiki-relative page path by its prefix.
    pub fn from_page_path(path: &str) -> Self {
        if path == "overview.md" {
            Self::Overview
        } else if path == "architecture.md" {
            Self::Architecture
        } else if path.starts_with("workflows/") {
            Self::Workflow
        } else if path.starts_with("directories/") {
            Self::Directory
        } else if path.starts_with("files/") {
            Self::File
        } else {
            Self::Wiki
        }
    }

    /// Parse a stored type name, defaulting to [`PageType::Wiki`].
    pub fn parse_lenient(value: &str) -> Self {
        match value {
            "overview" => Self::Overview,
            "architecture" => Self::Architecture,
            "workflow" => Self::Workflow,
            "directory" => Self::Directory,
            "file" => Self::File,
            _ => Self::Wiki,
        }
    }
}

impl std::fmt::Display for PageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generated wiki page plus the metadata persisted alongside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedPage {
    /// Markdown content
    pub content: String,
    /// Page classification
    pub page_type: PageType,
    /// Wiki-relative path, e.g. `files/src-a-py.md`
    pub path: String,
    /// Word count of the content
    pub word_count: usize,
    /// Source path this page documents; empty for synthesized pages
    pub target: String,
    /// Content hash for files, signature hash for directories
    pub source_hash: String,
    /// Generation timestamp
    pub generated_at: DateTime<Utc>,
    /// Warnings attached during generation (firewall, fallback summaries)
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl GeneratedPage {
    /// Build a page, computing the word count from `content`.
    pub fn new(
        content: String,
        page_type: PageType,
        path: impl Into<String>,
        target: impl Into<String>,
        source_hash: impl Into<String>,
    ) -> Self {
        let word_count = content.split_whitespace().count();
        Self {
            content,
            page_type,
            path: path.into(),
            word_count,
            target: target.into(),
            source_hash: source_hash.into(),
            generated_at: Utc::now(),
            warnings: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_lenient_parse() {
        assert_eq!(Layer::parse_lenient("API"), Layer::Api);
        assert_eq!(Layer::parse_lenient(" domain "), Layer::Domain);
        assert_eq!(Layer::parse_lenient("frontend"), Layer::Utility);
        assert_eq!(Layer::parse_lenient(""), Layer::Utility);
    }

    #[test]
    fn test_every_layer_round_trips() {
        for layer in Layer::ALL {
            assert_eq!(Layer::parse_lenient(layer.as_str()), layer);
        }
    }

    #[test]
    fn test_fallback_file_summary() {
        let summary = FileSummary::fallback("src/a.py");
        assert_eq!(summary.purpose, "Unknown");
        assert_eq!(summary.layer, Layer::Utility);
    }

    #[test]
    fn test_page_type_classification() {
        assert_eq!(PageType::from_page_path("overview.md"), PageType::Overview);
        assert_eq!(
            PageType::from_page_path("architecture.md"),
            PageType::Architecture
        );
        assert_eq!(
            PageType::from_page_path("workflows/cli.md"),
            PageType::Workflow
        );
        assert_eq!(
            PageType::from_page_path("directories/src.md"),
            PageType::Directory
        );
        assert_eq!(PageType::from_page_path("files/src-a-py.md"), PageType::File);
        assert_eq!(PageType::from_page_path("extra/page.md"), PageType::Wiki);
    }

    #[test]
    fn test_page_word_count() {
        let page = GeneratedPage::new(
            "# Title\n\nTwo words here.".to_string(),
            PageType::File,
            "files/a-py.md",
            "a.py",
            "hash",
        );
        assert_eq!(page.word_count, 5);
    }
}
