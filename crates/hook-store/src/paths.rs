//! Store file layout under the orchestrator home.

use camino::Utf8PathBuf;

/// Default orchestrator home directory name under `$HOME`.
const DEFAULT_HOME_DIR: &str = ".hive-flow";

/// Resolved locations of the shared store documents.
///
/// The same files are read and written by the external orchestrator, so
/// the layout is part of the contract, not an implementation detail.
#[derive(Debug, Clone)]
pub struct StorePaths {
    home: Utf8PathBuf,
}

impl StorePaths {
    /// Resolve from `HIVE_FLOW_HOME`, falling back to `~/.hive-flow`.
    pub fn resolve() -> Self {
        if let Ok(home) = std::env::var("HIVE_FLOW_HOME") {
            if !home.trim().is_empty() {
                return Self::at(home);
            }
        }

        let base = dirs::home_dir()
            .and_then(|p| Utf8PathBuf::from_path_buf(p).ok())
            .unwrap_or_else(|| Utf8PathBuf::from("/tmp"));
        Self {
            home: base.join(DEFAULT_HOME_DIR),
        }
    }

    /// Use an explicit home (tests, embedding).
    pub fn at(home: impl Into<Utf8PathBuf>) -> Self {
        Self { home: home.into() }
    }

    pub fn home(&self) -> &Utf8PathBuf {
        &self.home
    }

    /// `<home>/memory/store.json`
    pub fn memory_file(&self) -> Utf8PathBuf {
        self.home.join("memory").join("store.json")
    }

    /// `<home>/claims/claims.json`
    pub fn claims_file(&self) -> Utf8PathBuf {
        self.home.join("claims").join("claims.json")
    }
}
