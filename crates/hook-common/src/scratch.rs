//! Per-session scratch files under the metrics directory.
//!
//! Scratch state (active trajectory, active claims, session identity) is
//! hot per-session data: one session runs one hook at a time, so these
//! files need no cross-process locking. The shared store mirrors whatever
//! must survive the session.

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default scratch location when `METRICS_DIR` is not set.
const DEFAULT_DIR: &str = "/tmp/claude-metrics";

/// Handle to the per-session scratch directory.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    dir: PathBuf,
}

impl ScratchDir {
    /// Resolve from the `METRICS_DIR` environment variable, falling back
    /// to `/tmp/claude-metrics`. The directory is created on first use.
    pub fn new() -> Self {
        let dir = std::env::var("METRICS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DIR));
        Self::at(dir)
    }

    /// Use an explicit directory (tests, embedding).
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let _ = fs::create_dir_all(&dir);
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a named scratch file.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Load a JSON scratch file; `None` when absent.
    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let path = self.path(name);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read scratch file: {}", path.display()))?;
        let value = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse scratch file: {}", path.display()))?;
        Ok(Some(value))
    }

    /// Like `load`, but a corrupt or unreadable file is treated as absent.
    pub fn load_or_none<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.load(name).ok().flatten()
    }

    /// Save a JSON scratch file.
    pub fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.path(name);
        let content = serde_json::to_string_pretty(value)?;
        fs::write(&path, content)
            .with_context(|| format!("failed to write scratch file: {}", path.display()))?;
        Ok(())
    }

    /// Delete a scratch file if present.
    pub fn delete(&self, name: &str) -> Result<()> {
        let path = self.path(name);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("failed to delete scratch file: {}", path.display()))?;
        }
        Ok(())
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }
}

impl Default for ScratchDir {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::tempdir;

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct TestState {
        counter: u32,
        message: String,
    }

    #[test]
    fn save_and_load() {
        let dir = tempdir().unwrap();
        let scratch = ScratchDir::at(dir.path());

        let state = TestState {
            counter: 42,
            message: "hello".to_string(),
        };
        scratch.save("state.json", &state).unwrap();

        let loaded: Option<TestState> = scratch.load("state.json").unwrap();
        assert_eq!(loaded, Some(state));
    }

    #[test]
    fn load_missing_is_none() {
        let dir = tempdir().unwrap();
        let scratch = ScratchDir::at(dir.path());
        let loaded: Option<TestState> = scratch.load("nope.json").unwrap();
        assert_eq!(loaded, None);
    }

    #[test]
    fn corrupt_file_is_none_with_lossy_load() {
        let dir = tempdir().unwrap();
        let scratch = ScratchDir::at(dir.path());
        std::fs::write(scratch.path("bad.json"), "{nope").unwrap();

        assert!(scratch.load::<TestState>("bad.json").is_err());
        assert_eq!(scratch.load_or_none::<TestState>("bad.json"), None);
    }

    #[test]
    fn delete_removes_file() {
        let dir = tempdir().unwrap();
        let scratch = ScratchDir::at(dir.path());
        scratch.save("x.json", &TestState::default()).unwrap();
        assert!(scratch.exists("x.json"));
        scratch.delete("x.json").unwrap();
        assert!(!scratch.exists("x.json"));
    }
}
