//! Tree-sitter backed language parsers.
//!
//! Each parser walks the syntax tree and maps language node kinds onto the
//! shared [`SymbolKind`] vocabulary. Decorator-driven kinds (routes, CLI
//! commands) are recognized from Python decorator names.

use tree_sitter::{Language, Node, Parser};

use crate::core::errors::{OyaError, Result};
use crate::parse::registry::FileParser;
use crate::parse::symbols::{ParsedSymbol, SymbolKind};

/// Language keys with a compiled grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    Python,
    JavaScript,
    TypeScript,
    Rust,
    Go,
}

impl Grammar {
    fn language(self) -> Language {
        match self {
            Self::Python => tree_sitter_python::LANGUAGE.into(),
            Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Self::Rust => tree_sitter_rust::LANGUAGE.into(),
            Self::Go => tree_sitter_go::LANGUAGE.into(),
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Rust => "rust",
            Self::Go => "go",
        }
    }
}

/// A [`FileParser`] driven by a tree-sitter grammar.
pub struct TreeSitterParser {
    grammar: Grammar,
}

impl TreeSitterParser {
    /// Create a parser for the given grammar.
    pub fn new(grammar: Grammar) -> Self {
        Self { grammar }
    }
}

impl FileParser for TreeSitterParser {
    fn language(&self) -> &'static str {
        self.grammar.key()
    }

    fn parse(&self, file: &str, source: &str) -> Result<(Vec<ParsedSymbol>, Vec<String>)> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.grammar.language())
            .map_err(|e| OyaError::parse(self.grammar.key(), format!("grammar load failed: {e}")))?;

        let tree = parser.parse(source, None).ok_or_else(|| {
            OyaError::parse_in_file(self.grammar.key(), "parser returned no tree", file)
        })?;

        let mut symbols = Vec::new();
        let mut imports = Vec::new();
        let bytes = source.as_bytes();
        collect(
            self.grammar,
            tree.root_node(),
            bytes,
            file,
            false,
            &mut symbols,
            &mut imports,
        );
        Ok((symbols, imports))
    }
}

fn collect(
    grammar: Grammar,
    node: Node<'_>,
    source: &[u8],
    file: &str,
    in_type: bool,
    symbols: &mut Vec<ParsedSymbol>,
    imports: &mut Vec<String>,
) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match grammar {
            Grammar::Python => visit_python(child, source, file, in_type, symbols, imports),
            Grammar::JavaScript | Grammar::TypeScript => {
                visit_ecma(grammar, child, source, file, in_type, symbols, imports)
            }
            Grammar::Rust => visit_rust(child, source, file, in_type, symbols, imports),
            Grammar::Go => visit_go(child, source, file, symbols, imports),
        }
    }
}

fn node_text<'a>(node: Node<'_>, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

fn field_name(node: Node<'_>, source: &[u8]) -> Option<String> {
    node.child_by_field_name("name")
        .map(|n| node_text(n, source).to_string())
        .filter(|n| !n.is_empty())
}

fn line_of(node: Node<'_>) -> usize {
    node.start_position().row + 1
}

fn visit_python(
    node: Node<'_>,
    source: &[u8],
    file: &str,
    in_class: bool,
    symbols: &mut Vec<ParsedSymbol>,
    imports: &mut Vec<String>,
) {
    match node.kind() {
        "function_definition" => {
            if let Some(name) = field_name(node, source) {
                let kind = if in_class {
                    SymbolKind::Method
                } else {
                    SymbolKind::Function
                };
                symbols.push(ParsedSymbol::new(name, kind, file, line_of(node)));
            }
            // Nested definitions inside function bodies are not indexed.
        }
        "class_definition" => {
            if let Some(name) = field_name(node, source) {
                symbols.push(ParsedSymbol::new(name, SymbolKind::Class, file, line_of(node)));
            }
            if let Some(body) = node.child_by_field_name("body") {
                collect(Grammar::Python, body, source, file, true, symbols, imports);
            }
        }
        "decorated_definition" => {
            let decorators: Vec<String> = {
                let mut cursor = node.walk();
                node.named_children(&mut cursor)
                    .filter(|c| c.kind() == "decorator")
                    .map(|c| node_text(c, source).trim_start_matches('@').trim().to_string())
                    .collect()
            };
            let mut cursor = node.walk();
            for inner in node.named_children(&mut cursor) {
                if inner.kind() == "function_definition" || inner.kind() == "class_definition" {
                    let before = symbols.len();
                    visit_python(inner, source, file, in_class, symbols, imports);
                    for sym in symbols.iter_mut().skip(before) {
                        sym.decorators = decorators.clone();
                        if let Some(kind) = decorator_kind(&decorators) {
                            sym.kind = kind;
                        }
                    }
                }
            }
        }
        "import_statement" | "import_from_statement" => {
            imports.push(node_text(node, source).to_string());
            symbols.push(ParsedSymbol::new(
                first_import_name(node, source),
                SymbolKind::Import,
                file,
                line_of(node),
            ));
        }
        _ => {}
    }
}

/// Map Python decorator names onto route and CLI-command kinds.
fn decorator_kind(decorators: &[String]) -> Option<SymbolKind> {
    for decorator in decorators {
        let lower = decorator.to_ascii_lowercase();
        if lower.contains("route")
            || lower.contains(".get(")
            || lower.contains(".post(")
            || lower.contains(".put(")
            || lower.contains(".delete(")
            || lower.contains(".patch(")
        {
            return Some(SymbolKind::Route);
        }
        if lower.contains("command") || lower.contains("cli.") || lower.starts_with("click") {
            return Some(SymbolKind::CliCommand);
        }
    }
    None
}

fn first_import_name(node: Node<'_>, source: &[u8]) -> String {
    let text = node_text(node, source);
    text.split_whitespace()
        .nth(1)
        .unwrap_or(text)
        .trim_end_matches(',')
        .to_string()
}

fn visit_ecma(
    grammar: Grammar,
    node: Node<'_>,
    source: &[u8],
    file: &str,
    in_class: bool,
    symbols: &mut Vec<ParsedSymbol>,
    imports: &mut Vec<String>,
) {
    match node.kind() {
        "function_declaration" | "generator_function_declaration" => {
            if let Some(name) = field_name(node, source) {
                symbols.push(ParsedSymbol::new(name, SymbolKind::Function, file, line_of(node)));
            }
        }
        "class_declaration" => {
            if let Some(name) = field_name(node, source) {
                symbols.push(ParsedSymbol::new(name, SymbolKind::Class, file, line_of(node)));
            }
            if let Some(body) = node.child_by_field_name("body") {
                collect(grammar, body, source, file, true, symbols, imports);
            }
        }
        "method_definition" => {
            if in_class {
                if let Some(name) = field_name(node, source) {
                    symbols.push(ParsedSymbol::new(name, SymbolKind::Method, file, line_of(node)));
                }
            }
        }
        "interface_declaration" => {
            if let Some(name) = field_name(node, source) {
                symbols.push(ParsedSymbol::new(
                    name,
                    SymbolKind::Interface,
                    file,
                    line_of(node),
                ));
            }
        }
        "type_alias_declaration" => {
            if let Some(name) = field_name(node, source) {
                symbols.push(ParsedSymbol::new(
                    name,
                    SymbolKind::TypeAlias,
                    file,
                    line_of(node),
                ));
            }
        }
        "enum_declaration" => {
            if let Some(name) = field_name(node, source) {
                symbols.push(ParsedSymbol::new(name, SymbolKind::Enum, file, line_of(node)));
            }
        }
        "import_statement" => {
            imports.push(node_text(node, source).to_string());
            symbols.push(ParsedSymbol::new(
                node_text(node, source).to_string(),
                SymbolKind::Import,
                file,
                line_of(node),
            ));
        }
        "export_statement" => {
            symbols.push(ParsedSymbol::new(
                node_text(node, source)
                    .lines()
                    .next()
                    .unwrap_or("export")
                    .to_string(),
                SymbolKind::Export,
                file,
                line_of(node),
            ));
            collect(grammar, node, source, file, in_class, symbols, imports);
        }
        "lexical_declaration" | "variable_declaration" => {
            // Top-level arrow functions assigned to constants.
            let mut cursor = node.walk();
            for declarator in node.named_children(&mut cursor) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                let has_fn = declarator
                    .child_by_field_name("value")
                    .map(|v| v.kind() == "arrow_function" || v.kind() == "function_expression")
                    .unwrap_or(false);
                if has_fn {
                    if let Some(name) = field_name(declarator, source) {
                        symbols.push(ParsedSymbol::new(
                            name,
                            SymbolKind::Function,
                            file,
                            line_of(declarator),
                        ));
                    }
                }
            }
        }
        _ => {}
    }
}

fn visit_rust(
    node: Node<'_>,
    source: &[u8],
    file: &str,
    in_impl: bool,
    symbols: &mut Vec<ParsedSymbol>,
    imports: &mut Vec<String>,
) {
    match node.kind() {
        "function_item" => {
            if let Some(name) = field_name(node, source) {
                let kind = if in_impl {
                    SymbolKind::Method
                } else {
                    SymbolKind::Function
                };
                symbols.push(ParsedSymbol::new(name, kind, file, line_of(node)));
            }
        }
        "struct_item" => {
            if let Some(name) = field_name(node, source) {
                symbols.push(ParsedSymbol::new(name, SymbolKind::Class, file, line_of(node)));
            }
        }
        "enum_item" => {
            if let Some(name) = field_name(node, source) {
                symbols.push(ParsedSymbol::new(name, SymbolKind::Enum, file, line_of(node)));
            }
        }
        "trait_item" => {
            if let Some(name) = field_name(node, source) {
                symbols.push(ParsedSymbol::new(
                    name,
                    SymbolKind::Interface,
                    file,
                    line_of(node),
                ));
            }
        }
        "type_item" => {
            if let Some(name) = field_name(node, source) {
                symbols.push(ParsedSymbol::new(
                    name,
                    SymbolKind::TypeAlias,
                    file,
                    line_of(node),
                ));
            }
        }
        "use_declaration" => {
            imports.push(node_text(node, source).to_string());
            symbols.push(ParsedSymbol::new(
                node_text(node, source)
                    .trim_start_matches("use ")
                    .trim_end_matches(';')
                    .to_string(),
                SymbolKind::Import,
                file,
                line_of(node),
            ));
        }
        "impl_item" => {
            if let Some(body) = node.child_by_field_name("body") {
                collect(Grammar::Rust, body, source, file, true, symbols, imports);
            }
        }
        "mod_item" => {
            if let Some(body) = node.child_by_field_name("body") {
                collect(Grammar::Rust, body, source, file, in_impl, symbols, imports);
            }
        }
        _ => {}
    }
}

fn visit_go(
    node: Node<'_>,
    source: &[u8],
    file: &str,
    symbols: &mut Vec<ParsedSymbol>,
    imports: &mut Vec<String>,
) {
    match node.kind() {
        "function_declaration" => {
            if let Some(name) = field_name(node, source) {
                symbols.push(ParsedSymbol::new(name, SymbolKind::Function, file, line_of(node)));
            }
        }
        "method_declaration" => {
            if let Some(name) = field_name(node, source) {
                symbols.push(ParsedSymbol::new(name, SymbolKind::Method, file, line_of(node)));
            }
        }
        "type_declaration" => {
            let mut cursor = node.walk();
            for spec in node.named_children(&mut cursor) {
                if spec.kind() != "type_spec" {
                    continue;
                }
                let Some(name) = field_name(spec, source) else {
                    continue;
                };
                let kind = match spec.child_by_field_name("type").map(|t| t.kind()) {
                    Some("interface_type") => SymbolKind::Interface,
                    Some("struct_type") => SymbolKind::Class,
                    _ => SymbolKind::TypeAlias,
                };
                symbols.push(ParsedSymbol::new(name, kind, file, line_of(spec)));
            }
        }
        "import_declaration" => {
            imports.push(node_text(node, source).to_string());
            symbols.push(ParsedSymbol::new(
                "import",
                SymbolKind::Import,
                file,
                line_of(node),
            ));
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(grammar: Grammar, source: &str) -> (Vec<ParsedSymbol>, Vec<String>) {
        TreeSitterParser::new(grammar).parse("test", source).unwrap()
    }

    #[test]
    fn test_python_functions_and_classes() {
        let source = "import os\n\nclass Greeter:\n    def hello(self):\n        pass\n\ndef main():\n    pass\n";
        let (symbols, imports) = parse(Grammar::Python, source);

        let names: Vec<(&str, SymbolKind)> =
            symbols.iter().map(|s| (s.name.as_str(), s.kind)).collect();
        assert!(names.contains(&("Greeter", SymbolKind::Class)));
        assert!(names.contains(&("hello", SymbolKind::Method)));
        assert!(names.contains(&("main", SymbolKind::Function)));
        assert_eq!(imports.len(), 1);
    }

    #[test]
    fn test_python_route_decorator() {
        let source = "@app.route(\"/users\")\ndef list_users():\n    pass\n";
        let (symbols, _) = parse(Grammar::Python, source);
        let route = symbols.iter().find(|s| s.name == "list_users").unwrap();
        assert_eq!(route.kind, SymbolKind::Route);
        assert_eq!(route.decorators, vec!["app.route(\"/users\")"]);
    }

    #[test]
    fn test_python_cli_decorator() {
        let source = "@click.command()\ndef sync():\n    pass\n";
        let (symbols, _) = parse(Grammar::Python, source);
        let cmd = symbols.iter().find(|s| s.name == "sync").unwrap();
        assert_eq!(cmd.kind, SymbolKind::CliCommand);
    }

    #[test]
    fn test_rust_items() {
        let source = "use std::fmt;\n\npub struct Config;\n\npub trait Render {\n    fn render(&self);\n}\n\nimpl Config {\n    pub fn load() {}\n}\n\nfn main() {}\n";
        let (symbols, _) = parse(Grammar::Rust, source);
        let names: Vec<(&str, SymbolKind)> =
            symbols.iter().map(|s| (s.name.as_str(), s.kind)).collect();
        assert!(names.contains(&("Config", SymbolKind::Class)));
        assert!(names.contains(&("Render", SymbolKind::Interface)));
        assert!(names.contains(&("load", SymbolKind::Method)));
        assert!(names.contains(&("main", SymbolKind::Function)));
    }

    #[test]
    fn test_typescript_types() {
        let source = "interface User { id: number }\ntype Id = string;\nexport function find(id: Id) {}\n";
        let (symbols, _) = parse(Grammar::TypeScript, source);
        let names: Vec<(&str, SymbolKind)> =
            symbols.iter().map(|s| (s.name.as_str(), s.kind)).collect();
        assert!(names.contains(&("User", SymbolKind::Interface)));
        assert!(names.contains(&("Id", SymbolKind::TypeAlias)));
        assert!(names.contains(&("find", SymbolKind::Function)));
    }

    #[test]
    fn test_go_declarations() {
        let source = "package main\n\nimport \"fmt\"\n\ntype Server struct{}\n\nfunc (s *Server) Run() {}\n\nfunc main() { fmt.Println() }\n";
        let (symbols, imports) = parse(Grammar::Go, source);
        let names: Vec<(&str, SymbolKind)> =
            symbols.iter().map(|s| (s.name.as_str(), s.kind)).collect();
        assert!(names.contains(&("Server", SymbolKind::Class)));
        assert!(names.contains(&("Run", SymbolKind::Method)));
        assert!(names.contains(&("main", SymbolKind::Function)));
        assert_eq!(imports.len(), 1);
    }
}
