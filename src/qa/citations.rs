//! Parsing of the `[CITATIONS]` block from answer output.

use regex::Regex;

/// One citation extracted from an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    /// Cited wiki-relative path
    pub path: String,
    /// Optional 1-based line span
    pub lines: Option<(u32, u32)>,
}

/// Split an answer into its body and the citations listed in the trailing
/// `[CITATIONS]` block. An absent block yields the full text and no
/// citations.
pub fn parse_citations(text: &str) -> (String, Vec<Citation>) {
    let Some(marker_pos) = text.find("[CITATIONS]") else {
        return (text.trim().to_string(), Vec::new());
    };

    let answer = text[..marker_pos].trim().to_string();
    let block = &text[marker_pos + "[CITATIONS]".len()..];

    // `path: files/x.md, lines: 10-20` with optional leading dash.
    let line_pattern =
        Regex::new(r"^(?:-\s*)?path:\s*([^,\s]+)\s*(?:,\s*lines:\s*(\d+)\s*-\s*(\d+))?\s*$")
            .expect("static pattern");

    let mut citations = Vec::new();
    for line in block.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(captures) = line_pattern.captures(line) {
            let path = captures[1].to_string();
            let lines = match (captures.get(2), captures.get(3)) {
                (Some(start), Some(end)) => {
                    match (start.as_str().parse(), end.as_str().parse()) {
                        (Ok(s), Ok(e)) => Some((s, e)),
                        _ => None,
                    }
                }
                _ => None,
            };
            citations.push(Citation { path, lines });
        }
    }

    (answer, citations)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_block_with_spans() {
        let text = "The router dispatches requests [1].\n\n[CITATIONS]\npath: files/src-router-py.md, lines: 10-25\npath: architecture.md\n";
        let (answer, citations) = parse_citations(text);
        assert_eq!(answer, "The router dispatches requests [1].");
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].path, "files/src-router-py.md");
        assert_eq!(citations[0].lines, Some((10, 25)));
        assert_eq!(citations[1].path, "architecture.md");
        assert_eq!(citations[1].lines, None);
    }

    #[test]
    fn test_dash_prefixed_entries() {
        let text = "Answer.\n[CITATIONS]\n- path: overview.md\n";
        let (_, citations) = parse_citations(text);
        assert_eq!(citations[0].path, "overview.md");
    }

    #[test]
    fn test_missing_block() {
        let (answer, citations) = parse_citations("Just an answer with no block.");
        assert_eq!(answer, "Just an answer with no block.");
        assert!(citations.is_empty());
    }

    #[test]
    fn test_garbage_lines_skipped() {
        let text = "Answer.\n[CITATIONS]\nnot a citation line\npath: files/a-py.md\n";
        let (_, citations) = parse_citations(text);
        assert_eq!(citations.len(), 1);
    }
}
