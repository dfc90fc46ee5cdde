//! Error types for the oya-rs library.
//!
//! Structured error types for every stage of the generation pipeline and the
//! Q&A engine. The taxonomy mirrors the dispositions in the error-handling
//! design: locally recoverable conditions (parse failures, malformed model
//! output, per-page indexing errors) carry enough context to log and skip,
//! while fatal conditions (auth, storage writes) propagate to the
//! orchestrator.

use std::io;

use thiserror::Error;

/// Main result type for oya operations.
pub type Result<T> = std::result::Result<T, OyaError>;

/// Comprehensive error type for all oya operations.
#[derive(Error, Debug)]
pub enum OyaError {
    /// I/O related errors (file operations, directory walks).
    #[error("I/O error: {message}")]
    Io {
        /// Human-readable error message
        message: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Configuration errors.
    #[error("Configuration error: {message}")]
    Config {
        /// Error description
        message: String,
        /// Configuration field that caused the error
        field: Option<String>,
    },

    /// Source parsing errors.
    #[error("Parse error in {language}: {message}")]
    Parse {
        /// Language being parsed
        language: String,
        /// Error description
        message: String,
        /// File path where the error occurred
        file_path: Option<String>,
    },

    /// Prompt template rendering errors.
    #[error("Template error: {message}")]
    Template {
        /// Error description
        message: String,
    },

    /// LLM authentication failure. Fatal: aborts the run.
    #[error("LLM auth error: {message}")]
    LlmAuth {
        /// Error description
        message: String,
    },

    /// LLM rate limiting. Retried with exponential backoff.
    #[error("LLM rate limited: {message}")]
    LlmRateLimit {
        /// Error description
        message: String,
    },

    /// Transient LLM transport failure (timeouts, 5xx). Retried.
    #[error("LLM transient error: {message}")]
    LlmTransient {
        /// Error description
        message: String,
    },

    /// The model returned output the caller cannot use. Non-retriable; the
    /// caller falls back.
    #[error("Malformed LLM output: {message}")]
    MalformedOutput {
        /// Error description
        message: String,
    },

    /// Cooperative cancellation was observed at a suspension point.
    #[error("Operation cancelled")]
    Cancelled,

    /// Page store and index persistence errors. Fatal during page writes.
    #[error("Storage error: {message}")]
    Storage {
        /// Error description
        message: String,
        /// Underlying storage error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Generation pipeline errors.
    #[error("Pipeline error at phase '{phase}': {message}")]
    Pipeline {
        /// Phase where the error occurred
        phase: String,
        /// Error description
        message: String,
    },

    /// A second orchestrator attempted to run against the same repository.
    #[error("Concurrent generation refused: {message}")]
    Concurrency {
        /// Error description
        message: String,
    },

    /// Validation errors for input data.
    #[error("Validation error: {message}")]
    Validation {
        /// Error description
        message: String,
        /// Field or input that failed validation
        field: Option<String>,
    },

    /// Generic internal errors.
    #[error("Internal error: {message}")]
    Internal {
        /// Error description
        message: String,
    },
}

impl OyaError {
    /// Create a new I/O error with context.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a new configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new configuration error with field context.
    pub fn config_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new parse error.
    pub fn parse(language: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            language: language.into(),
            message: message.into(),
            file_path: None,
        }
    }

    /// Create a new parse error with file context.
    pub fn parse_in_file(
        language: impl Into<String>,
        message: impl Into<String>,
        file_path: impl Into<String>,
    ) -> Self {
        Self::Parse {
            language: language.into(),
            message: message.into(),
            file_path: Some(file_path.into()),
        }
    }

    /// Create a new template error.
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
        }
    }

    /// Create a new malformed-output error.
    pub fn malformed_output(message: impl Into<String>) -> Self {
        Self::MalformedOutput {
            message: message.into(),
        }
    }

    /// Create a new storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new pipeline error.
    pub fn pipeline(phase: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Pipeline {
            phase: phase.into(),
            message: message.into(),
        }
    }

    /// Create a new concurrency error.
    pub fn concurrency(message: impl Into<String>) -> Self {
        Self::Concurrency {
            message: message.into(),
        }
    }

    /// Create a new validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the retry policy applies to this error.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::LlmRateLimit { .. } | Self::LlmTransient { .. })
    }

    /// Whether this error makes continuing the run unsafe.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::LlmAuth { .. } | Self::Storage { .. } | Self::Cancelled | Self::Concurrency { .. }
        )
    }
}

impl From<io::Error> for OyaError {
    fn from(err: io::Error) -> Self {
        Self::io("I/O operation failed", err)
    }
}

impl From<serde_json::Error> for OyaError {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed_output(format!("JSON deserialization failed: {err}"))
    }
}

impl From<serde_yaml::Error> for OyaError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::config(format!("YAML error: {err}"))
    }
}

impl From<rusqlite::Error> for OyaError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage {
            message: format!("SQLite operation failed: {err}"),
            source: Some(Box::new(err)),
        }
    }
}

impl From<handlebars::RenderError> for OyaError {
    fn from(err: handlebars::RenderError) -> Self {
        Self::template(format!("render failed: {err}"))
    }
}

impl From<git2::Error> for OyaError {
    fn from(err: git2::Error) -> Self {
        Self::internal(format!("git operation failed: {err}"))
    }
}

impl From<reqwest::Error> for OyaError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            Self::LlmTransient {
                message: err.to_string(),
            }
        } else {
            Self::Internal {
                message: format!("HTTP error: {err}"),
            }
        }
    }
}
