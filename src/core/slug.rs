//! Path/slug conversion for wiki page names.
//!
//! A source path such as `lib/Pkg/Mod.py` becomes the slug `lib-Pkg-Mod-py`.
//! Reversal relies on a closed allowlist of known extensions to split the
//! trailing suffix back off; directory paths use the same separator with no
//! extension, and the repository root maps to the slug `root`.

/// Slug used for the repository root directory.
pub const ROOT_SLUG: &str = "root";

/// Extensions the reversal step recognizes. Paths outside this set still
/// produce valid slugs, but only paths whose extension is listed round-trip.
const KNOWN_EXTENSIONS: &[&str] = &[
    "py", "pyi", "js", "jsx", "mjs", "cjs", "ts", "tsx", "rs", "go", "rb", "java", "c", "h",
    "cpp", "hpp", "cc", "cs", "php", "swift", "kt", "scala", "sh", "bash", "sql", "md", "rst",
    "txt", "json", "yaml", "yml", "toml", "ini", "cfg", "xml", "html", "css", "scss", "vue",
    "svelte", "proto", "graphql", "tf", "dockerfile", "mk",
];

/// Convert a repo-relative file or directory path to a wiki slug.
pub fn path_to_slug(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() || trimmed == "." {
        return ROOT_SLUG.to_string();
    }

    trimmed
        .chars()
        .map(|c| match c {
            '/' | '.' | ' ' => '-',
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' => c,
            _ => '-',
        })
        .collect()
}

/// Reverse a slug produced by [`path_to_slug`] back to a path.
///
/// The final `-`-separated segment is treated as an extension when it appears
/// in the known set; every other separator becomes `/`.
pub fn slug_to_path(slug: &str) -> String {
    if slug == ROOT_SLUG {
        return String::new();
    }

    let segments: Vec<&str> = slug.split('-').collect();
    match segments.split_last() {
        Some((last, rest)) if !rest.is_empty() && is_known_extension(last) => {
            format!("{}.{}", rest.join("/"), last)
        }
        _ => segments.join("/"),
    }
}

/// Whether the reversal allowlist contains `ext`.
pub fn is_known_extension(ext: &str) -> bool {
    KNOWN_EXTENSIONS
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_path_to_slug() {
        assert_eq!(path_to_slug("lib/Pkg/Mod.py"), "lib-Pkg-Mod-py");
        assert_eq!(path_to_slug("src/a.py"), "src-a-py");
        assert_eq!(path_to_slug("src/server/router.ts"), "src-server-router-ts");
    }

    #[test]
    fn test_directory_path_to_slug() {
        assert_eq!(path_to_slug("src/server"), "src-server");
        assert_eq!(path_to_slug(""), ROOT_SLUG);
        assert_eq!(path_to_slug("."), ROOT_SLUG);
    }

    #[test]
    fn test_round_trip_known_extensions() {
        for path in [
            "lib/Pkg/Mod.py",
            "src/a.py",
            "src/index.ts",
            "deep/tree/of/dirs/file.rs",
            "config.yaml",
        ] {
            assert_eq!(slug_to_path(&path_to_slug(path)), path, "path {path}");
        }
    }

    #[test]
    fn test_round_trip_directories() {
        for path in ["src", "src/server", "a/b/c"] {
            assert_eq!(slug_to_path(&path_to_slug(path)), path, "path {path}");
        }
        assert_eq!(slug_to_path(ROOT_SLUG), "");
    }

    #[test]
    fn test_unknown_extension_stays_joined() {
        // "zz" is not in the allowlist, so the last segment is not split off.
        assert_eq!(slug_to_path("src-blob-zz"), "src/blob/zz");
    }

    #[test]
    fn test_slug_sanitizes_odd_characters() {
        assert_eq!(path_to_slug("src/weird name.py"), "src-weird-name-py");
    }
}
