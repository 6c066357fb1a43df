//! PreToolUse hook for Write|Edit|MultiEdit: claim the file before the
//! edit runs.
//!
//! When several agents work the same tree in parallel, the first editor
//! of a file takes a claim on it; a conflicting edit from another session
//! is answered with a block decision so the host refuses the tool call.
//! The hook itself still exits 0 — the block is a decision, not a
//! failure.

use hook_common::identity;
use hook_common::log::HookLogger;
use hook_common::prelude::*;
use hook_store::ClaimStore;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// Per-session record of the files we hold, so the post hook can release
/// them even when its payload loses the file path.
const SCRATCH_FILE: &str = "active_file_claims.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct FileClaimState {
    #[serde(default)]
    claimed_files: BTreeMap<String, ClaimRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClaimRecord {
    claimed_at: String,
    session_id: String,
}

fn main() {
    let scratch = ScratchDir::new();
    let logger = HookLogger::new(scratch.clone(), "coordination", "file-claim");
    let input = HookInput::from_stdin();
    let session_id = identity::session_id(&scratch);
    let claims = ClaimStore::open_default();

    let output = run(&scratch, &claims, &input, &session_id, &logger);
    output.write_stdout();
}

fn run(
    scratch: &ScratchDir,
    claims: &ClaimStore,
    input: &HookInput,
    session_id: &str,
    logger: &HookLogger,
) -> HookOutput {
    if !input.tool_name.is_empty() && !input.is_write_tool() {
        return HookOutput::none();
    }

    let Some(file_path) = input.file_path() else {
        logger.log("no file_path in tool_input, allowing operation");
        return HookOutput::none();
    };
    let abs_path = absolutize(file_path);

    let mut state: FileClaimState = scratch.load_or_none(SCRATCH_FILE).unwrap_or_default();
    if state.claimed_files.contains_key(&abs_path) {
        logger.log(format!("already claimed by us: {abs_path}"));
        return HookOutput::none();
    }

    let issue_id = format!("file:{abs_path}");
    let claimant = format!("agent:{session_id}:editor");
    let outcome = claims.claim(&issue_id, &claimant, None);

    if outcome.success {
        state.claimed_files.insert(
            abs_path.clone(),
            ClaimRecord {
                claimed_at: hook_common::timestamp(),
                session_id: session_id.to_string(),
            },
        );
        if let Err(e) = scratch.save(SCRATCH_FILE, &state) {
            logger.log(format!("failed to record claim in scratch: {e:#}"));
        }
        logger.log(format!("claimed file: {abs_path}"));
        return HookOutput::none();
    }

    if let Some(existing) = outcome.existing {
        let reason = format!("File claimed by {}", existing.claimant);
        logger.log(format!("blocking edit of {abs_path}: {reason}"));
        return HookOutput::block(reason);
    }

    // Store trouble: fail open, an unclaimed edit beats a stuck session.
    logger.log(format!(
        "claim store unavailable for {abs_path} ({}), allowing operation",
        outcome.reason.unwrap_or("unknown")
    ));
    HookOutput::none()
}

/// Lexically absolute form of a path: joined to the cwd when relative,
/// with `.` and `..` components resolved without touching the filesystem
/// (the target may not exist yet).
fn absolutize(path: &str) -> String {
    let path = Path::new(path);
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("/"))
            .join(path)
    };

    let mut parts: Vec<std::ffi::OsString> = Vec::new();
    for component in joined.components() {
        match component {
            Component::Normal(p) => parts.push(p.to_os_string()),
            Component::ParentDir => {
                parts.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }

    let mut out = PathBuf::from("/");
    for part in parts {
        out.push(part);
    }
    out.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hook_store::{ClaimFilter, StorePaths};
    use tempfile::tempdir;

    fn fixtures() -> (tempfile::TempDir, ScratchDir, ClaimStore, HookLogger) {
        let dir = tempdir().unwrap();
        let scratch = ScratchDir::at(dir.path().join("scratch"));
        let claims = ClaimStore::at(StorePaths::at(dir.path().join("store").to_str().unwrap()));
        let logger = HookLogger::new(scratch.clone(), "coordination", "file-claim");
        (dir, scratch, claims, logger)
    }

    fn write_input(path: &str) -> HookInput {
        HookInput::from_str_lossy(&format!(
            r#"{{"tool_name": "Write", "tool_input": {{"file_path": "{path}"}}}}"#
        ))
    }

    #[test]
    fn first_session_claims_second_is_blocked() {
        let (_dir, scratch, claims, logger) = fixtures();
        let input = write_input("/tmp/x.py");

        let first = run(&scratch, &claims, &input, "session-a", &logger);
        assert!(first.decision.is_none());

        // Session B uses its own scratch; the shared store carries the claim.
        let other = tempdir().unwrap();
        let scratch_b = ScratchDir::at(other.path());
        let second = run(&scratch_b, &claims, &input, "session-b", &logger);
        assert!(matches!(second.decision, Some(Decision::Block)));
        assert!(second.reason.unwrap().contains("agent:session-a:editor"));
    }

    #[test]
    fn reclaim_by_same_session_is_idempotent() {
        let (_dir, scratch, claims, logger) = fixtures();
        let input = write_input("/tmp/x.py");

        run(&scratch, &claims, &input, "session-a", &logger);
        let again = run(&scratch, &claims, &input, "session-a", &logger);
        assert!(again.decision.is_none());

        let active = claims.list_claims(&ClaimFilter::default());
        assert_eq!(active.len(), 1);
    }

    #[test]
    fn non_write_tools_pass_through() {
        let (_dir, scratch, claims, logger) = fixtures();
        let input = HookInput::from_str_lossy(
            r#"{"tool_name": "Read", "tool_input": {"file_path": "/tmp/x.py"}}"#,
        );
        let output = run(&scratch, &claims, &input, "session-a", &logger);
        assert!(output.decision.is_none());
        assert!(claims.list_claims(&ClaimFilter::default()).is_empty());
    }

    #[test]
    fn missing_file_path_allows_operation() {
        let (_dir, scratch, claims, logger) = fixtures();
        let input = HookInput::from_str_lossy(r#"{"tool_name": "Edit", "tool_input": {}}"#);
        let output = run(&scratch, &claims, &input, "session-a", &logger);
        assert!(output.decision.is_none());
    }

    #[test]
    fn claim_is_recorded_in_scratch() {
        let (_dir, scratch, claims, logger) = fixtures();
        run(&scratch, &claims, &write_input("/tmp/x.py"), "session-a", &logger);

        let state: FileClaimState = scratch.load_or_none(SCRATCH_FILE).unwrap();
        assert!(state.claimed_files.contains_key("/tmp/x.py"));
        assert_eq!(state.claimed_files["/tmp/x.py"].session_id, "session-a");
    }

    #[test]
    fn absolutize_resolves_dot_segments() {
        assert_eq!(absolutize("/a/b/../c/./d"), "/a/c/d");
        assert_eq!(absolutize("/a//b"), "/a/b");
        let relative = absolutize("rel.txt");
        assert!(relative.starts_with('/'));
        assert!(relative.ends_with("/rel.txt"));
    }
}
