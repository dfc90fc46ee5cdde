//! Fallback parser for unrecognized file suffixes.
//!
//! Recognizes only top-level definitions by indentation and keyword
//! heuristics. Anything it cannot classify is ignored rather than guessed.

use regex::Regex;

use crate::core::errors::Result;
use crate::parse::registry::FileParser;
use crate::parse::symbols::{ParsedSymbol, SymbolKind};

/// Keyword patterns matched at zero indentation, with their symbol kinds.
struct Rule {
    pattern: Regex,
    kind: SymbolKind,
}

/// Line-based fallback parser registered under the wildcard suffix.
pub struct GenericParser {
    rules: Vec<Rule>,
    import_pattern: Regex,
}

impl Default for GenericParser {
    fn default() -> Self {
        Self::new()
    }
}

impl GenericParser {
    /// Build the fallback parser with its keyword table.
    pub fn new() -> Self {
        let table: &[(&str, SymbolKind)] = &[
            (r"^def\s+(\w+)", SymbolKind::Function),
            (r"^function\s+(\w+)", SymbolKind::Function),
            (r"^(?:pub\s+)?fn\s+(\w+)", SymbolKind::Function),
            (r"^func\s+(\w+)", SymbolKind::Function),
            (r"^class\s+(\w+)", SymbolKind::Class),
            (r"^(?:pub\s+)?struct\s+(\w+)", SymbolKind::Class),
            (r"^interface\s+(\w+)", SymbolKind::Interface),
            (r"^(?:pub\s+)?trait\s+(\w+)", SymbolKind::Interface),
            (r"^(?:pub\s+)?enum\s+(\w+)", SymbolKind::Enum),
            (r"^type\s+(\w+)\s*=", SymbolKind::TypeAlias),
            (r"^module\s+(\w+)", SymbolKind::Other),
        ];

        let rules = table
            .iter()
            .map(|(pattern, kind)| Rule {
                // Patterns are static and known-valid.
                pattern: Regex::new(pattern).expect("static pattern"),
                kind: *kind,
            })
            .collect();

        let import_pattern =
            Regex::new(r#"^(?:import\s+\S+|from\s+\S+\s+import|use\s+\S+|require\s*\(|include\s+\S+)"#)
                .expect("static pattern");

        Self {
            rules,
            import_pattern,
        }
    }
}

impl FileParser for GenericParser {
    fn language(&self) -> &'static str {
        "generic"
    }

    fn parse(&self, file: &str, source: &str) -> Result<(Vec<ParsedSymbol>, Vec<String>)> {
        let mut symbols = Vec::new();
        let mut imports = Vec::new();

        for (idx, line) in source.lines().enumerate() {
            // Top-level only: indented definitions belong to an enclosing
            // scope this parser cannot model.
            if line.starts_with(' ') || line.starts_with('\t') {
                continue;
            }

            if self.import_pattern.is_match(line) {
                imports.push(line.trim().to_string());
                continue;
            }

            for rule in &self.rules {
                if let Some(captures) = rule.pattern.captures(line) {
                    if let Some(name) = captures.get(1) {
                        symbols.push(ParsedSymbol::new(
                            name.as_str(),
                            rule.kind,
                            file,
                            idx + 1,
                        ));
                    }
                    break;
                }
            }
        }

        Ok((symbols, imports))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_level_definitions_only() {
        let source = "def outer():\n    def inner():\n        pass\nclass Thing:\n    pass\n";
        let (symbols, _) = GenericParser::new().parse("x.unknown", source).unwrap();
        let names: Vec<&str> = symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["outer", "Thing"]);
    }

    #[test]
    fn test_mixed_language_keywords() {
        let source = "fn run() {}\nstruct Config {}\ntrait Render {}\ntype Alias = u32;\n";
        let (symbols, _) = GenericParser::new().parse("x.unknown", source).unwrap();
        assert_eq!(symbols.len(), 4);
        assert_eq!(symbols[1].kind, SymbolKind::Class);
        assert_eq!(symbols[2].kind, SymbolKind::Interface);
        assert_eq!(symbols[3].kind, SymbolKind::TypeAlias);
    }

    #[test]
    fn test_imports_collected() {
        let source = "import os\nuse std::fmt;\nfrom x import y\n";
        let (_, imports) = GenericParser::new().parse("x.unknown", source).unwrap();
        assert_eq!(imports.len(), 3);
    }
}
