//! Conservative import extraction pre-pass.
//!
//! Scans only the first 50 lines with language-specific patterns so prompt
//! context still includes imports when full parsing fails.

use regex::Regex;

/// Number of leading lines the pre-pass inspects.
const SCAN_LINES: usize = 50;

/// Extract import targets from the head of `source`, dispatched on the file
/// suffix. Results are deduplicated and unordered.
pub fn extract_imports(suffix: &str, source: &str) -> Vec<String> {
    let patterns = patterns_for(suffix);
    let mut seen = std::collections::HashSet::new();
    let mut imports = Vec::new();

    for line in source.lines().take(SCAN_LINES) {
        for pattern in &patterns {
            if let Some(captures) = pattern.captures(line) {
                for group in captures.iter().skip(1).flatten() {
                    let name = group.as_str().trim().to_string();
                    if !name.is_empty() && seen.insert(name.clone()) {
                        imports.push(name);
                    }
                }
            }
        }
    }

    imports
}

fn patterns_for(suffix: &str) -> Vec<Regex> {
    let raw: &[&str] = match suffix {
        "py" | "pyi" => &[
            r"^\s*from\s+([\w\.]+)\s+import",
            r"^\s*import\s+([\w\.]+)",
        ],
        "js" | "jsx" | "mjs" | "cjs" | "ts" | "tsx" => &[
            r#"^\s*import\s+.*?from\s+['"]([^'"]+)['"]"#,
            r#"^\s*import\s+['"]([^'"]+)['"]"#,
            r#"require\s*\(\s*['"]([^'"]+)['"]\s*\)"#,
        ],
        "rs" => &[r"^\s*use\s+([\w:]+)"],
        "go" => &[r#"^\s*(?:import\s+)?"([\w\./\-]+)""#],
        "rb" => &[r#"^\s*require(?:_relative)?\s+['"]([^'"]+)['"]"#],
        "java" | "kt" | "scala" => &[r"^\s*import\s+([\w\.]+)"],
        _ => &[
            r"^\s*import\s+([\w\.\-/]+)",
            r"^\s*use\s+([\w:]+)",
            r#"^\s*#include\s+[<"]([^>"]+)[>"]"#,
        ],
    };

    raw.iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_imports() {
        let source = "import os\nfrom collections import OrderedDict\nimport os\n";
        let imports = extract_imports("py", source);
        assert_eq!(imports, vec!["os", "collections"]);
    }

    #[test]
    fn test_javascript_imports() {
        let source = "import fs from 'fs'\nimport './style.css'\nconst x = require(\"lodash\")\n";
        let imports = extract_imports("js", source);
        assert!(imports.contains(&"fs".to_string()));
        assert!(imports.contains(&"./style.css".to_string()));
        assert!(imports.contains(&"lodash".to_string()));
    }

    #[test]
    fn test_rust_imports() {
        let source = "use std::fmt;\nuse serde::Serialize;\n";
        let imports = extract_imports("rs", source);
        assert_eq!(imports, vec!["std::fmt", "serde::Serialize"]);
    }

    #[test]
    fn test_scan_window_limit() {
        let mut source = String::new();
        for _ in 0..60 {
            source.push_str("x = 1\n");
        }
        source.push_str("import late\n");
        let imports = extract_imports("py", &source);
        assert!(imports.is_empty());
    }
}
