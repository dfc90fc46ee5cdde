//! Parsed symbol records shared by all language parsers.

use serde::{Deserialize, Serialize};

/// Classification of an extracted symbol.
///
/// Language-specific kinds with no mapping fall back to [`SymbolKind::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Class,
    Method,
    Import,
    Export,
    Route,
    CliCommand,
    Interface,
    TypeAlias,
    Enum,
    Decorator,
    Other,
}

impl SymbolKind {
    /// Stable lowercase name used in prompt context and storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Method => "method",
            Self::Import => "import",
            Self::Export => "export",
            Self::Route => "route",
            Self::CliCommand => "cli_command",
            Self::Interface => "interface",
            Self::TypeAlias => "type_alias",
            Self::Enum => "enum",
            Self::Decorator => "decorator",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A symbol extracted from a source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedSymbol {
    /// Symbol name.
    pub name: String,
    /// Symbol classification.
    pub kind: SymbolKind,
    /// Repo-relative path of the defining file.
    pub file: String,
    /// 1-based line number of the definition.
    pub line: usize,
    /// Decorator names attached to the definition, without the leading `@`.
    pub decorators: Vec<String>,
}

impl ParsedSymbol {
    /// Construct a symbol with no decorators.
    pub fn new(name: impl Into<String>, kind: SymbolKind, file: impl Into<String>, line: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            file: file.into(),
            line,
            decorators: Vec::new(),
        }
    }

    /// One-line rendering used as prompt context.
    pub fn render(&self) -> String {
        if self.decorators.is_empty() {
            format!("{} {} (line {})", self.kind, self.name, self.line)
        } else {
            format!(
                "{} {} (line {}, decorators: {})",
                self.kind,
                self.name,
                self.line,
                self.decorators.join(", ")
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(SymbolKind::CliCommand.as_str(), "cli_command");
        assert_eq!(SymbolKind::TypeAlias.as_str(), "type_alias");
    }

    #[test]
    fn test_render() {
        let mut sym = ParsedSymbol::new("handler", SymbolKind::Route, "src/app.py", 10);
        assert_eq!(sym.render(), "route handler (line 10)");
        sym.decorators.push("app.get".to_string());
        assert!(sym.render().contains("decorators: app.get"));
    }
}
