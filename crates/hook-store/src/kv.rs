//! Key/value side of the store.
//!
//! Keys are namespaced by textual prefix (`session:`, `trajectory:`,
//! `pattern:`, `agent:`, `task:`) plus the `*:last` convenience aliases.
//! Values are arbitrary JSON.

use crate::lock;
use crate::paths::StorePaths;
use anyhow::{Context, Result};
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;

/// One stored entry. `access_count` is bumped on every retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub key: String,
    pub value: Value,
    pub stored_at: String,
    #[serde(default)]
    pub access_count: u64,
    #[serde(default)]
    pub last_accessed: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDoc {
    #[serde(default)]
    entries: BTreeMap<String, Entry>,
}

/// Outcome of a write, as exposed to hook callers. Filesystem trouble is
/// a contract value, never a raised error.
#[derive(Debug, Clone, Serialize)]
pub struct StoreOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

impl StoreOutcome {
    fn ok() -> Self {
        Self {
            success: true,
            reason: None,
        }
    }

    fn io() -> Self {
        Self {
            success: false,
            reason: Some("io"),
        }
    }
}

/// Handle to the KV document.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    paths: StorePaths,
}

impl MemoryStore {
    pub fn open_default() -> Self {
        Self {
            paths: StorePaths::resolve(),
        }
    }

    pub fn at(paths: StorePaths) -> Self {
        Self { paths }
    }

    /// Upsert an entry. A rewrite resets the access counter.
    pub fn store(&self, key: &str, value: Value) -> StoreOutcome {
        let key = key.to_string();
        let result = self.with_doc_mut(|doc| {
            let now = hook_common::timestamp();
            doc.entries.insert(
                key.clone(),
                Entry {
                    key: key.clone(),
                    value,
                    stored_at: now.clone(),
                    access_count: 0,
                    last_accessed: now,
                },
            );
        });
        match result {
            Ok(()) => StoreOutcome::ok(),
            Err(_) => StoreOutcome::io(),
        }
    }

    /// Fetch a value, bumping its access counter. Missing key or any
    /// filesystem trouble reads as `None`.
    pub fn retrieve(&self, key: &str) -> Option<Value> {
        self.with_doc_mut(|doc| {
            let entry = doc.entries.get_mut(key)?;
            entry.access_count += 1;
            entry.last_accessed = hook_common::timestamp();
            Some(entry.value.clone())
        })
        .ok()
        .flatten()
    }

    /// Remove an entry (used to reset `*:last` aliases and `:active`
    /// markers). Removing an absent key is a no-op success.
    pub fn remove(&self, key: &str) -> StoreOutcome {
        match self.with_doc_mut(|doc| {
            doc.entries.remove(key);
        }) {
            Ok(()) => StoreOutcome::ok(),
            Err(_) => StoreOutcome::io(),
        }
    }

    /// All entries whose key starts with `prefix`, lock-free snapshot.
    pub fn list(&self, prefix: &str) -> Vec<Entry> {
        let doc = read_doc(&self.paths.memory_file());
        doc.entries
            .into_values()
            .filter(|e| e.key.starts_with(prefix))
            .collect()
    }

    /// Lock-free peek that does not touch the access counter.
    pub fn peek(&self, key: &str) -> Option<Value> {
        let doc = read_doc(&self.paths.memory_file());
        doc.entries.get(key).map(|e| e.value.clone())
    }

    fn with_doc_mut<T>(&self, f: impl FnOnce(&mut StoreDoc) -> T) -> Result<T> {
        let file = self.paths.memory_file();
        let lock_path = file.with_extension("json.lock");
        let _guard = lock::acquire(lock_path.as_std_path())?;

        let mut doc = read_doc(&file);
        let out = f(&mut doc);
        atomic_write(&file, &doc)?;
        Ok(out)
    }
}

fn read_doc(path: &Utf8Path) -> StoreDoc {
    match std::fs::read_to_string(path) {
        Ok(content) if !content.trim().is_empty() => {
            serde_json::from_str(&content).unwrap_or_default()
        }
        _ => StoreDoc::default(),
    }
}

/// Write to a sibling temp file, then rename over the target so readers
/// never observe a torn document.
pub(crate) fn atomic_write<T: Serialize>(path: &Utf8Path, value: &T) -> Result<()> {
    let parent = path
        .parent()
        .context("store file has no parent directory")?;
    std::fs::create_dir_all(parent)
        .with_context(|| format!("failed to create store dir: {parent}"))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temp file in: {parent}"))?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.write_all(b"\n")?;
    tmp.persist(path)
        .with_context(|| format!("failed to replace store file: {path}"))?;
    Ok(())
}
