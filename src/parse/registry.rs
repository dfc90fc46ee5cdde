//! Suffix-keyed parser dispatch.
//!
//! The registry maps file suffixes to parser handles; unknown suffixes fall
//! through to the [`GenericParser`] registered under the wildcard key. Parse
//! failures degrade to an empty symbol list plus the import pre-pass, with a
//! logged warning.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::core::errors::Result;
use crate::parse::generic::GenericParser;
use crate::parse::imports::extract_imports;
use crate::parse::symbols::ParsedSymbol;
use crate::parse::treesitter::{Grammar, TreeSitterParser};

/// A language-specific symbol extractor.
pub trait FileParser: Send + Sync {
    /// Canonical language key for log context.
    fn language(&self) -> &'static str;

    /// Extract `(symbols, imports)` from `source`. Imports are unordered.
    fn parse(&self, file: &str, source: &str) -> Result<(Vec<ParsedSymbol>, Vec<String>)>;
}

/// Dispatches files to language parsers by suffix.
pub struct ParserRegistry {
    by_suffix: HashMap<&'static str, Arc<dyn FileParser>>,
    fallback: Arc<dyn FileParser>,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserRegistry {
    /// Build the registry with the built-in language table.
    pub fn new() -> Self {
        let mut by_suffix: HashMap<&'static str, Arc<dyn FileParser>> = HashMap::new();

        let python: Arc<dyn FileParser> = Arc::new(TreeSitterParser::new(Grammar::Python));
        let javascript: Arc<dyn FileParser> = Arc::new(TreeSitterParser::new(Grammar::JavaScript));
        let typescript: Arc<dyn FileParser> = Arc::new(TreeSitterParser::new(Grammar::TypeScript));
        let rust: Arc<dyn FileParser> = Arc::new(TreeSitterParser::new(Grammar::Rust));
        let go: Arc<dyn FileParser> = Arc::new(TreeSitterParser::new(Grammar::Go));

        for suffix in ["py", "pyi"] {
            by_suffix.insert(suffix, python.clone());
        }
        for suffix in ["js", "jsx", "mjs", "cjs"] {
            by_suffix.insert(suffix, javascript.clone());
        }
        for suffix in ["ts", "tsx"] {
            by_suffix.insert(suffix, typescript.clone());
        }
        by_suffix.insert("rs", rust);
        by_suffix.insert("go", go);

        Self {
            by_suffix,
            fallback: Arc::new(GenericParser::new()),
        }
    }

    /// Suffix of a repo-relative path, lowercased.
    pub fn suffix_of(path: &str) -> &str {
        path.rsplit('/')
            .next()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext)
            .unwrap_or("")
    }

    /// Parser handle for the given path.
    pub fn parser_for(&self, path: &str) -> &Arc<dyn FileParser> {
        self.by_suffix
            .get(Self::suffix_of(path))
            .unwrap_or(&self.fallback)
    }

    /// Parse a file, never failing.
    ///
    /// On parser error, the symbol list is empty and imports come from the
    /// conservative pre-pass so prompt context retains dependency hints.
    pub fn parse(&self, path: &str, source: &str) -> (Vec<ParsedSymbol>, Vec<String>) {
        let parser = self.parser_for(path);
        match parser.parse(path, source) {
            Ok((symbols, mut imports)) => {
                if imports.is_empty() {
                    imports = extract_imports(Self::suffix_of(path), source);
                }
                (symbols, imports)
            }
            Err(err) => {
                warn!(
                    file = %path,
                    language = parser.language(),
                    error = %err,
                    "parse failed, degrading to import pre-pass"
                );
                (Vec::new(), extract_imports(Self::suffix_of(path), source))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::symbols::SymbolKind;

    #[test]
    fn test_suffix_extraction() {
        assert_eq!(ParserRegistry::suffix_of("src/app.py"), "py");
        assert_eq!(ParserRegistry::suffix_of("a/b/Component.test.tsx"), "tsx");
        assert_eq!(ParserRegistry::suffix_of("Makefile"), "");
    }

    #[test]
    fn test_dispatch_by_suffix() {
        let registry = ParserRegistry::new();
        assert_eq!(registry.parser_for("x.py").language(), "python");
        assert_eq!(registry.parser_for("x.rs").language(), "rust");
        assert_eq!(registry.parser_for("x.weird").language(), "generic");
        assert_eq!(registry.parser_for("Makefile").language(), "generic");
    }

    #[test]
    fn test_parse_never_fails() {
        let registry = ParserRegistry::new();
        let (symbols, imports) = registry.parse("src/app.py", "def go():\n    pass\n");
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].kind, SymbolKind::Function);
        assert!(imports.is_empty());
    }

    #[test]
    fn test_fallback_parses_unknown_suffix() {
        let registry = ParserRegistry::new();
        let (symbols, _) = registry.parse("script.lua", "function greet()\nend\n");
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].name, "greet");
    }
}
