//! Project and session identity resolution.
//!
//! Both functions are idempotent for the lifetime of a session: the
//! project name is derived from stable inputs, and the session id is
//! cached to a scratch file the first time it is generated.

use crate::scratch::ScratchDir;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

/// Scratch file holding the generated session id.
pub const SESSION_ID_FILE: &str = "session_id";

/// Resolve the current project name.
///
/// Order: `CLAUDE_PROJECT_NAME` override, basename of the git work-tree
/// root, basename of the current directory.
pub fn project_name() -> String {
    if let Ok(name) = env::var("CLAUDE_PROJECT_NAME") {
        if !name.trim().is_empty() {
            return name;
        }
    }

    if let Some(root) = git_toplevel() {
        if let Some(name) = basename(&root) {
            return name;
        }
    }

    env::current_dir()
        .ok()
        .and_then(|d| basename(&d))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Resolve the current session id.
///
/// Order: `CLAUDE_SESSION_ID` override, cached scratch file, freshly
/// derived value (pid + wall clock) persisted to the scratch file so
/// later hooks in the same session agree.
pub fn session_id(scratch: &ScratchDir) -> String {
    session_id_with_override(scratch, env::var("CLAUDE_SESSION_ID").ok())
}

fn session_id_with_override(scratch: &ScratchDir, override_id: Option<String>) -> String {
    if let Some(id) = override_id {
        if !id.trim().is_empty() {
            return id;
        }
    }

    let path = scratch.path(SESSION_ID_FILE);
    if let Ok(text) = fs::read_to_string(&path) {
        let cached = text.trim();
        if !cached.is_empty() {
            return cached.to_string();
        }
    }

    let id = derive_session_id();
    let _ = fs::write(&path, &id);
    id
}

fn derive_session_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let seed = format!("{}-{}", std::process::id(), nanos);
    let digest = format!("{:x}", md5::compute(seed.as_bytes()));
    format!("session-{}", &digest[..8])
}

fn git_toplevel() -> Option<PathBuf> {
    let output = Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if root.is_empty() {
        None
    } else {
        Some(PathBuf::from(root))
    }
}

fn basename(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}
