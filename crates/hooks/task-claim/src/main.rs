//! PreToolUse hook for the Task tool: register an informational claim on
//! the spawned subagent task.
//!
//! Task claims never block — they exist so dashboards and other agents
//! can see what is running. The task always proceeds, claim or no claim.

use hook_common::identity;
use hook_common::log::HookLogger;
use hook_common::prelude::*;
use hook_store::ClaimStore;

/// Scratch list shared with the task-release hook.
const SCRATCH_FILE: &str = "active_task_claims.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct TaskClaimState {
    #[serde(default)]
    claims: Vec<TaskClaimRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TaskClaimRecord {
    task_id: String,
    issue_id: String,
    claimant: String,
    description: String,
    claimed_at: String,
    claim_success: bool,
}

fn main() {
    let scratch = ScratchDir::new();
    let logger = HookLogger::new(scratch.clone(), "coordination", "task-claim");
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
    if !input.tool_name.is_empty() && !input.is_task() {
        return HookOutput::none();
    }

    let description: String = input
        .task_description()
        .unwrap_or("unknown task")
        .chars()
        .take(200)
        .collect();

    let task_id = generate_task_id(&description);
    let issue_id = format!("task:{task_id}");
    let claimant = format!("agent:{session_id}:task");

    logger.log(format!("claiming task {task_id}: {description}"));
    let outcome = claims.claim(&issue_id, &claimant, Some(&description));

    // Recorded regardless of claim success so release still cleans up.
    let mut state: TaskClaimState = scratch.load_or_none(SCRATCH_FILE).unwrap_or_default();
    state.claims.push(TaskClaimRecord {
        task_id: task_id.clone(),
        issue_id,
        claimant,
        description,
        claimed_at: hook_common::timestamp(),
        claim_success: outcome.success,
    });
    if let Err(e) = scratch.save(SCRATCH_FILE, &state) {
        logger.log(format!("failed to record task claim: {e:#}"));
    }

    logger.log(format!(
        "task claim registered: {task_id} (claimed={})",
        outcome.success
    ));

    // Informational only: the task always proceeds.
    HookOutput::none()
}

/// `task-<hash>-<HHMMSS>`: description hash for affinity, time for
/// uniqueness.
fn generate_task_id(description: &str) -> String {
    let digest = format!("{:x}", md5::compute(description.as_bytes()));
    let clock = chrono::Utc::now().format("%H%M%S");
    format!("task-{}-{}", &digest[..8], clock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hook_store::{ClaimFilter, ClaimStatus, StorePaths};
    use tempfile::tempdir;

    fn fixtures() -> (tempfile::TempDir, ScratchDir, ClaimStore, HookLogger) {
        let dir = tempdir().unwrap();
        let scratch = ScratchDir::at(dir.path().join("scratch"));
        let claims = ClaimStore::at(StorePaths::at(dir.path().join("store").to_str().unwrap()));
        let logger = HookLogger::new(scratch.clone(), "coordination", "task-claim");
        (dir, scratch, claims, logger)
    }

    fn task_input(description: &str) -> HookInput {
        HookInput::from_str_lossy(&format!(
            r#"{{"tool_name": "Task", "tool_input": {{"description": "{description}"}}}}"#
        ))
    }

    #[test]
    fn claim_is_informational_and_always_allows() {
        let (_dir, scratch, claims, logger) = fixtures();

        let output = run(&scratch, &claims, &task_input("Implement feature X"), "sess-1", &logger);
        assert!(output.decision.is_none());

        let active = claims.list_claims(&ClaimFilter {
            status: Some(ClaimStatus::Active),
            claimant_prefix: Some("agent:sess-1:task".to_string()),
        });
        assert_eq!(active.len(), 1);
        assert!(active[0].issue_id.starts_with("task:task-"));
        assert_eq!(active[0].claim.context.as_deref(), Some("Implement feature X"));
    }

    #[test]
    fn conflict_still_allows_the_task() {
        let (_dir, scratch, claims, logger) = fixtures();

        // Two claims of the same description in the same second collide on
        // the issue id; the second must still pass.
        let input = task_input("same task");
        run(&scratch, &claims, &input, "sess-1", &logger);
        let output = run(&scratch, &claims, &input, "sess-2", &logger);
        assert!(output.decision.is_none());

        let state: TaskClaimState = scratch.load_or_none(SCRATCH_FILE).unwrap();
        assert_eq!(state.claims.len(), 2);
    }

    #[test]
    fn records_are_appended_for_release() {
        let (_dir, scratch, claims, logger) = fixtures();

        run(&scratch, &claims, &task_input("task one"), "sess-1", &logger);
        run(&scratch, &claims, &task_input("task two"), "sess-1", &logger);

        let state: TaskClaimState = scratch.load_or_none(SCRATCH_FILE).unwrap();
        assert_eq!(state.claims.len(), 2);
        assert!(state.claims.iter().all(|c| c.claimant == "agent:sess-1:task"));
        assert!(state.claims.iter().all(|c| c.claim_success));
    }

    #[test]
    fn non_task_tools_pass_through() {
        let (_dir, scratch, claims, logger) = fixtures();
        let input = HookInput::from_str_lossy(r#"{"tool_name": "Bash"}"#);

        run(&scratch, &claims, &input, "sess-1", &logger);
        assert!(claims.list_claims(&ClaimFilter::default()).is_empty());
        assert!(!scratch.exists(SCRATCH_FILE));
    }

    #[test]
    fn task_id_shape() {
        let id = generate_task_id("demo");
        assert!(id.starts_with("task-"));
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 6);
    }
}
