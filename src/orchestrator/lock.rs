//! Single-orchestrator lock per repository.
//!
//! A PID lock file refuses concurrent runs against the same repository. A
//! lock left behind by a dead process is detected and reclaimed, which is
//! what lets a restarted orchestrator promote a stale `running` marker to
//! `incomplete` and carry on.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::core::errors::{OyaError, Result};

/// Held for the duration of a run; the lock file is removed on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Acquire the lock at `path`, refusing when a live orchestrator holds
    /// it.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| OyaError::io("Failed to create lock directory", e))?;
        }

        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let _ = write!(file, "{}", std::process::id());
                    return Ok(Self { path });
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    if Self::holder_is_alive(&path) {
                        return Err(OyaError::concurrency(format!(
                            "another generation is already running for this repository (lock: {})",
                            path.display()
                        )));
                    }
                    warn!(lock = %path.display(), "removing stale lock from dead process");
                    let _ = std::fs::remove_file(&path);
                }
                Err(err) => return Err(OyaError::io("Failed to create lock file", err)),
            }
        }

        Err(OyaError::concurrency(
            "could not acquire the generation lock",
        ))
    }

    fn holder_is_alive(path: &Path) -> bool {
        let Some(pid) = std::fs::read_to_string(path)
            .ok()
            .and_then(|raw| raw.trim().parse::<u32>().ok())
        else {
            // Unreadable lock: assume live and refuse rather than clobber.
            return true;
        };

        if pid == std::process::id() {
            return true;
        }

        #[cfg(target_os = "linux")]
        {
            Path::new(&format!("/proc/{pid}")).exists()
        }
        #[cfg(not(target_os = "linux"))]
        {
            true
        }
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_and_release() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".oya.lock");

        {
            let _lock = RunLock::acquire(&path).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_second_acquire_refused() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".oya.lock");

        let _lock = RunLock::acquire(&path).unwrap();
        let err = RunLock::acquire(&path).unwrap_err();
        assert!(matches!(err, OyaError::Concurrency { .. }));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_stale_lock_reclaimed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".oya.lock");
        // A pid that cannot exist on this machine.
        std::fs::write(&path, "4194305").unwrap();

        let _lock = RunLock::acquire(&path).unwrap();
        assert!(path.exists());
    }
}
