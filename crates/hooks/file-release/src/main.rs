//! PostToolUse hook for Write|Edit|MultiEdit: release the file claim and
//! wake any waiters.
//!
//! Also keeps the session's edit/error tallies current; the meta-learning
//! pass reads them at Stop. Every failure here is logged and swallowed —
//! a leaked claim is recovered by the stuck detector, never by failing
//! the hook.

use hook_common::identity;
use hook_common::log::HookLogger;
use hook_common::prelude::*;
use hook_gateway::Gateway;
use hook_store::ClaimStore;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

const SCRATCH_FILE: &str = "active_file_claims.json";
const EDIT_COUNTS_FILE: &str = "file_edit_counts.json";
const SESSION_ANALYSIS_FILE: &str = "session_analysis.json";

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

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionAnalysis {
    #[serde(default)]
    session: SessionCounters,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionCounters {
    #[serde(default)]
    tool_calls: u64,
    #[serde(default)]
    errors: u64,
}

fn main() {
    let scratch = ScratchDir::new();
    let logger = HookLogger::new(scratch.clone(), "coordination", "file-release");
    let input = HookInput::from_stdin();
    // Touch the session identity so a release-only session still pins one.
    let _ = identity::session_id(&scratch);
    let claims = ClaimStore::open_default();
    let gateway = Gateway::resolve();

    let output = run(&scratch, &claims, Some(&gateway), &input, &logger);
    output.write_stdout();
}

fn run(
    scratch: &ScratchDir,
    claims: &ClaimStore,
    gateway: Option<&Gateway>,
    input: &HookInput,
    logger: &HookLogger,
) -> HookOutput {
    if !input.tool_name.is_empty() && !input.is_write_tool() {
        return HookOutput::none();
    }

    record_session_activity(scratch, input);

    let Some(file_path) = input.file_path() else {
        logger.log("no file_path in tool_input");
        return HookOutput::none();
    };
    let abs_path = absolutize(file_path);

    bump_edit_count(scratch, &abs_path);

    let mut state: FileClaimState = scratch.load_or_none(SCRATCH_FILE).unwrap_or_default();
    let Some(record) = state.claimed_files.get(&abs_path).cloned() else {
        logger.log(format!("file not in our claims, skipping release: {abs_path}"));
        return HookOutput::none();
    };

    let issue_id = format!("file:{abs_path}");
    // The claimant is rebuilt from the record so a drifting session id
    // cannot orphan the claim.
    let claimant = format!("agent:{}:editor", record.session_id);
    let outcome = claims.release(&issue_id, &claimant);
    if outcome.success {
        logger.log(format!("released file: {abs_path}"));
    } else {
        logger.log(format!(
            "release failed for {abs_path}: {}",
            outcome.reason.unwrap_or("unknown")
        ));
    }

    // Wake waiters; pollers cover the case where broadcast is unavailable.
    if let Some(gateway) = gateway {
        let message = format!("File released: {abs_path}");
        gateway.run_detached(&["hooks", "notify", "--message", &message, "--target", "all"]);
    }

    state.claimed_files.remove(&abs_path);
    if let Err(e) = scratch.save(SCRATCH_FILE, &state) {
        logger.log(format!("failed to update scratch: {e:#}"));
    }

    HookOutput::none()
}

fn bump_edit_count(scratch: &ScratchDir, abs_path: &str) {
    let mut counts: BTreeMap<String, u64> =
        scratch.load_or_none(EDIT_COUNTS_FILE).unwrap_or_default();
    *counts.entry(abs_path.to_string()).or_insert(0) += 1;
    let _ = scratch.save(EDIT_COUNTS_FILE, &counts);
}

fn record_session_activity(scratch: &ScratchDir, input: &HookInput) {
    let mut analysis: SessionAnalysis =
        scratch.load_or_none(SESSION_ANALYSIS_FILE).unwrap_or_default();
    analysis.session.tool_calls += 1;
    if !input.tool_succeeded() {
        analysis.session.errors += 1;
    }
    let _ = scratch.save(SESSION_ANALYSIS_FILE, &analysis);
}

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
