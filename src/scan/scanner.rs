//! Deterministic candidate-file enumeration.
//!
//! Four exclusion layers are applied in order: the built-in deny list, the
//! per-repo `.oyaignore` file (gitignore syntax), a null-byte binary
//! predicate, and a maximum-size threshold. Explicit allow patterns win over
//! all of them. Unreadable files are skipped with a warning; they never abort
//! a run.

use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::core::errors::{OyaError, Result};
use crate::core::repository::{HIDDEN_DIR, QUARANTINE_SUFFIX, STAGING_SUFFIX};

/// Built-in deny patterns: version control, build outputs, dependency
/// caches, package manifests, media, logs, and secrets.
const DENY_PATTERNS: &[&str] = &[
    "**/.git/**",
    "**/.hg/**",
    "**/.svn/**",
    "**/node_modules/**",
    "**/target/**",
    "**/build/**",
    "**/dist/**",
    "**/__pycache__/**",
    "**/.venv/**",
    "**/venv/**",
    "**/.tox/**",
    "**/.mypy_cache/**",
    "**/.pytest_cache/**",
    "**/coverage/**",
    "**/*.lock",
    "**/package-lock.json",
    "**/yarn.lock",
    "**/pnpm-lock.yaml",
    "**/*.min.js",
    "**/*.map",
    "**/*.png",
    "**/*.jpg",
    "**/*.jpeg",
    "**/*.gif",
    "**/*.svg",
    "**/*.ico",
    "**/*.pdf",
    "**/*.zip",
    "**/*.tar",
    "**/*.gz",
    "**/*.mp3",
    "**/*.mp4",
    "**/*.woff",
    "**/*.woff2",
    "**/*.ttf",
    "**/*.log",
    "**/.oya.lock",
    "**/.env",
    "**/.env.*",
    "**/*.pem",
    "**/*.key",
    "**/id_rsa*",
];

/// Bytes inspected by the binary predicate.
const BINARY_SNIFF_LEN: usize = 8192;

/// Result of a repository scan.
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Repo-relative file paths, deterministically sorted.
    pub files: Vec<String>,
    /// File path to raw text content.
    pub contents: HashMap<String, String>,
}

impl ScanResult {
    /// Render an indented file tree of the scanned paths for prompt context.
    pub fn file_tree(&self) -> String {
        let mut out = String::new();
        for path in &self.files {
            let depth = path.matches('/').count();
            let name = path.rsplit('/').next().unwrap_or(path);
            for _ in 0..depth {
                out.push_str("  ");
            }
            out.push_str(name);
            out.push('\n');
        }
        out
    }
}

/// Enumerates candidate files under the configured filter rules.
pub struct RepositoryScanner {
    root: PathBuf,
    deny: GlobSet,
    allow: Option<GlobSet>,
    user_ignore: Option<Gitignore>,
    max_file_size: u64,
}

impl RepositoryScanner {
    /// Create a scanner for `root` with the given size cap in kilobytes.
    ///
    /// `ignore_file` points at the user-supplied `.oyaignore`; a missing file
    /// simply disables that layer.
    pub fn new(root: impl Into<PathBuf>, ignore_file: &Path, max_file_size_kb: u64) -> Result<Self> {
        let root = root.into();
        let deny = build_globset(DENY_PATTERNS)?;

        let user_ignore = if ignore_file.is_file() {
            let mut builder = GitignoreBuilder::new(&root);
            if let Some(err) = builder.add(ignore_file) {
                warn!(file = %ignore_file.display(), error = %err, "ignoring unreadable ignore file");
                None
            } else {
                match builder.build() {
                    Ok(gi) => Some(gi),
                    Err(err) => {
                        warn!(error = %err, "failed to compile ignore patterns");
                        None
                    }
                }
            }
        } else {
            None
        };

        Ok(Self {
            root,
            deny,
            allow: None,
            user_ignore,
            max_file_size: max_file_size_kb * 1024,
        })
    }

    /// Register allow patterns that reinclude paths past every exclusion
    /// layer.
    pub fn with_allow_patterns(mut self, patterns: &[&str]) -> Result<Self> {
        if !patterns.is_empty() {
            self.allow = Some(build_globset(patterns)?);
        }
        Ok(self)
    }

    /// Walk the repository and return the filtered file list plus contents.
    pub fn scan(&self) -> Result<ScanResult> {
        let mut files = Vec::new();
        let mut contents = HashMap::new();

        let artifact_dirs = [
            HIDDEN_DIR.to_string(),
            format!("{HIDDEN_DIR}{STAGING_SUFFIX}"),
            format!("{HIDDEN_DIR}{QUARANTINE_SUFFIX}"),
        ];

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                let name = entry.file_name().to_string_lossy();
                !(entry.file_type().is_dir() && artifact_dirs.iter().any(|d| *d == name))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "failed to walk directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = match entry.path().strip_prefix(&self.root) {
                Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
                Err(_) => continue,
            };

            if !self.should_include(&relative, entry.path()) {
                continue;
            }

            match read_text(entry.path()) {
                Ok(Some(text)) => {
                    files.push(relative.clone());
                    contents.insert(relative, text);
                }
                Ok(None) => {
                    debug!(path = %relative, "skipping binary file");
                }
                Err(err) => {
                    warn!(path = %relative, error = %err, "skipping unreadable file");
                }
            }
        }

        files.sort();
        debug!(count = files.len(), "scan completed");
        Ok(ScanResult { files, contents })
    }

    fn should_include(&self, relative: &str, absolute: &Path) -> bool {
        if let Some(allow) = &self.allow {
            if allow.is_match(relative) {
                return true;
            }
        }

        if self.deny.is_match(relative) {
            return false;
        }

        if let Some(ignore) = &self.user_ignore {
            if ignore.matched_path_or_any_parents(relative, false).is_ignore() {
                return false;
            }
        }

        match absolute.metadata() {
            Ok(meta) if meta.len() > self.max_file_size => {
                debug!(path = %relative, size = meta.len(), "skipping oversized file");
                false
            }
            Ok(_) => true,
            Err(err) => {
                warn!(path = %relative, error = %err, "skipping unreadable file");
                false
            }
        }
    }
}

/// SHA-256 content hash of a file's bytes, hex-encoded.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn build_globset(patterns: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|err| OyaError::config(format!("Invalid glob pattern '{pattern}': {err}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|err| OyaError::config(format!("Failed to build glob set: {err}")))
}

/// Read a file as text, returning `Ok(None)` when the null-byte heuristic
/// flags it as binary.
fn read_text(path: &Path) -> std::io::Result<Option<String>> {
    let mut file = fs::File::open(path)?;
    let mut sniff = vec![0u8; BINARY_SNIFF_LEN];
    let read = file.read(&mut sniff)?;
    if sniff[..read].contains(&0) {
        return Ok(None);
    }

    let bytes = fs::read(path)?;
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scanner_for(dir: &TempDir) -> RepositoryScanner {
        let ignore = dir.path().join(".oyaignore");
        RepositoryScanner::new(dir.path(), &ignore, 500).unwrap()
    }

    #[test]
    fn test_scan_orders_deterministically() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/b.py"), "y = 2\n").unwrap();
        fs::write(dir.path().join("src/a.py"), "x = 1\n").unwrap();

        let result = scanner_for(&dir).scan().unwrap();
        assert_eq!(result.files, vec!["src/a.py", "src/b.py"]);
        assert_eq!(result.contents["src/a.py"], "x = 1\n");
    }

    #[test]
    fn test_deny_list_excludes_caches() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::write(dir.path().join("node_modules/pkg/index.js"), "x").unwrap();
        fs::write(dir.path().join("app.log"), "log line").unwrap();
        fs::write(dir.path().join("main.py"), "pass\n").unwrap();

        let result = scanner_for(&dir).scan().unwrap();
        assert_eq!(result.files, vec!["main.py"]);
    }

    #[test]
    fn test_user_ignore_file_applies() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".oyaignore"), "generated/\n*.tmp\n").unwrap();
        fs::create_dir_all(dir.path().join("generated")).unwrap();
        fs::write(dir.path().join("generated/out.py"), "x").unwrap();
        fs::write(dir.path().join("scratch.tmp"), "x").unwrap();
        fs::write(dir.path().join("main.py"), "pass\n").unwrap();

        let result = scanner_for(&dir).scan().unwrap();
        assert_eq!(result.files, vec![".oyaignore", "main.py"]);
    }

    #[test]
    fn test_binary_files_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("blob.dat"), b"abc\x00def").unwrap();
        fs::write(dir.path().join("main.py"), "pass\n").unwrap();

        let result = scanner_for(&dir).scan().unwrap();
        assert_eq!(result.files, vec!["main.py"]);
    }

    #[test]
    fn test_size_threshold() {
        let dir = TempDir::new().unwrap();
        let ignore = dir.path().join(".oyaignore");
        fs::write(dir.path().join("big.py"), "x".repeat(2048)).unwrap();
        fs::write(dir.path().join("small.py"), "pass\n").unwrap();

        let scanner = RepositoryScanner::new(dir.path(), &ignore, 1).unwrap();
        let result = scanner.scan().unwrap();
        assert_eq!(result.files, vec!["small.py"]);
    }

    #[test]
    fn test_allow_pattern_overrides_deny() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.log"), "keep me").unwrap();

        let ignore = dir.path().join(".oyaignore");
        let scanner = RepositoryScanner::new(dir.path(), &ignore, 500)
            .unwrap()
            .with_allow_patterns(&["notes.log"])
            .unwrap();
        let result = scanner.scan().unwrap();
        assert_eq!(result.files, vec!["notes.log"]);
    }

    #[test]
    fn test_artifact_directories_excluded() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".oya/wiki")).unwrap();
        fs::write(dir.path().join(".oya/wiki/overview.md"), "# x").unwrap();
        fs::write(dir.path().join("main.py"), "pass\n").unwrap();

        let result = scanner_for(&dir).scan().unwrap();
        assert_eq!(result.files, vec!["main.py"]);
    }

    #[test]
    fn test_content_hash_stable() {
        assert_eq!(content_hash("X"), content_hash("X"));
        assert_ne!(content_hash("X"), content_hash("X'"));
        assert_eq!(content_hash("X").len(), 64);
    }

    #[test]
    fn test_file_tree_rendering() {
        let result = ScanResult {
            files: vec!["a.py".into(), "src/b.py".into()],
            contents: HashMap::new(),
        };
        let tree = result.file_tree();
        assert!(tree.contains("a.py"));
        assert!(tree.contains("  b.py"));
    }
}
