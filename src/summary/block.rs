//! Extraction of structured summary blocks from model output.
//!
//! Summaries are embedded in page output as a fenced block delimited by
//! `---` lines with a YAML-like key/value body. Parsing is deliberately
//! permissive: unknown keys are ignored, scalars coerce to single-item lists
//! where a list is expected, and any extraction failure yields the fallback
//! summary with the original body left untouched.

use indexmap::IndexMap;
use tracing::warn;

use crate::summary::schema::{DirectorySummary, FileSummary, Layer};

/// A parsed field value: scalar or list.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Scalar(String),
    List(Vec<String>),
}

/// Permissively parsed key/value body of a summary block.
#[derive(Debug, Clone, Default)]
pub struct BlockFields {
    fields: IndexMap<String, FieldValue>,
}

impl BlockFields {
    /// Scalar value for `key`; for lists, the first element.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.fields.get(key)? {
            FieldValue::Scalar(value) => Some(value.as_str()),
            FieldValue::List(items) => items.first().map(String::as_str),
        }
    }

    /// List value for `key`, coercing a scalar into a single-item list.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        match self.fields.get(key) {
            Some(FieldValue::List(items)) => items.clone(),
            Some(FieldValue::Scalar(value)) if !value.is_empty() => vec![value.clone()],
            _ => Vec::new(),
        }
    }

    fn insert(&mut self, key: String, value: FieldValue) {
        self.fields.insert(key, value);
    }

    fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Locate the first `---` delimited block in `body` and parse it.
///
/// Returns the parsed fields plus the body with the block removed. `None`
/// when no well-formed block exists.
pub fn extract_block(body: &str) -> Option<(BlockFields, String)> {
    let lines: Vec<&str> = body.lines().collect();
    let start = lines.iter().position(|line| line.trim() == "---")?;
    let end = lines[start + 1..]
        .iter()
        .position(|line| line.trim() == "---")?
        + start
        + 1;

    let fields = parse_body(&lines[start + 1..end]);
    if fields.is_empty() {
        return None;
    }

    let mut remaining: Vec<&str> = Vec::with_capacity(lines.len());
    remaining.extend_from_slice(&lines[..start]);
    remaining.extend_from_slice(&lines[end + 1..]);
    let cleaned = remaining.join("\n").trim_matches('\n').to_string();

    Some((fields, cleaned))
}

fn parse_body(lines: &[&str]) -> BlockFields {
    let mut fields = BlockFields::default();
    let mut pending_key: Option<String> = None;
    let mut pending_items: Vec<String> = Vec::new();

    let flush = |key: &mut Option<String>, items: &mut Vec<String>, fields: &mut BlockFields| {
        if let Some(key) = key.take() {
            fields.insert(key, FieldValue::List(std::mem::take(items)));
        }
    };

    for raw in lines {
        let line = raw.trim_end();
        if line.trim().is_empty() {
            continue;
        }

        // Continuation item under an open list key.
        if let Some(item) = line.trim().strip_prefix("- ") {
            if pending_key.is_some() {
                pending_items.push(clean_scalar(item));
                continue;
            }
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        flush(&mut pending_key, &mut pending_items, &mut fields);

        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();

        if value.is_empty() {
            pending_key = Some(key);
        } else if value.starts_with('[') && value.ends_with(']') {
            let items = value[1..value.len() - 1]
                .split(',')
                .map(clean_scalar)
                .filter(|item| !item.is_empty())
                .collect();
            fields.insert(key, FieldValue::List(items));
        } else {
            fields.insert(key, FieldValue::Scalar(clean_scalar(value)));
        }
    }
    flush(&mut pending_key, &mut pending_items, &mut fields);

    fields
}

fn clean_scalar(value: &str) -> String {
    value.trim().trim_matches('"').trim_matches('\'').to_string()
}

/// Extract a [`FileSummary`] from model output for `file_path`.
///
/// On failure the fallback summary is returned together with the original
/// body; the pipeline never crashes on malformed output.
pub fn parse_file_summary(file_path: &str, output: &str) -> (FileSummary, String) {
    match extract_block(output) {
        Some((fields, body)) => {
            let summary = FileSummary {
                file_path: file_path.to_string(),
                purpose: fields.get_str("purpose").unwrap_or("Unknown").to_string(),
                layer: Layer::parse_lenient(fields.get_str("layer").unwrap_or("")),
                key_abstractions: fields.get_list("key_abstractions"),
                internal_deps: fields.get_list("internal_deps"),
                external_deps: fields.get_list("external_deps"),
            };
            (summary, body)
        }
        None => {
            warn!(file = %file_path, "no structured block in model output, using fallback summary");
            (FileSummary::fallback(file_path), output.to_string())
        }
    }
}

/// Extract a [`DirectorySummary`] from model output for `directory_path`.
pub fn parse_directory_summary(
    directory_path: &str,
    contains: &[String],
    output: &str,
) -> (DirectorySummary, String) {
    match extract_block(output) {
        Some((fields, body)) => {
            let parsed_contains = fields.get_list("contains");
            let summary = DirectorySummary {
                directory_path: directory_path.to_string(),
                purpose: fields.get_str("purpose").unwrap_or("Unknown").to_string(),
                contains: if parsed_contains.is_empty() {
                    contains.to_vec()
                } else {
                    parsed_contains
                },
                role_in_system: fields
                    .get_str("role_in_system")
                    .unwrap_or("Unknown")
                    .to_string(),
            };
            (summary, body)
        }
        None => {
            warn!(
                directory = %directory_path,
                "no structured block in model output, using fallback summary"
            );
            (
                DirectorySummary::fallback(directory_path, contains.to_vec()),
                output.to_string(),
            )
        }
    }
}
