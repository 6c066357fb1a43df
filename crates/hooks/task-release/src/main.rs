//! SubagentStop hook: release the task claims recorded by task-claim and
//! broadcast completion to the other agents.

use hook_common::identity;
use hook_common::log::HookLogger;
use hook_common::prelude::*;
use hook_gateway::Gateway;
use hook_store::ClaimStore;

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
    #[serde(default)]
    claim_success: bool,
}

fn main() {
    let scratch = ScratchDir::new();
    let logger = HookLogger::new(scratch.clone(), "coordination", "task-release");
    let input = HookInput::from_stdin();
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
    let agent_id = input.agent_id.as_deref().unwrap_or("unknown");
    logger.log(format!("subagent stop for agent: {agent_id}"));

    let state: TaskClaimState = scratch.load_or_none(SCRATCH_FILE).unwrap_or_default();
    if state.claims.is_empty() {
        logger.log("no active task claims to release");
        return HookOutput::none();
    }

    let mut released = 0usize;
    for record in &state.claims {
        let outcome = claims.release(&record.issue_id, &record.claimant);
        if outcome.success {
            released += 1;
            if let Some(gateway) = gateway {
                let message = format!("Task completed: {}", truncate(&record.description, 100));
                gateway.run_detached(&[
                    "hooks",
                    "notify",
                    "--message",
                    &message,
                    "--target",
                    "all",
                ]);
            }
            logger.log(format!("released task {}", record.task_id));
        } else {
            logger.log(format!(
                "failed to release task {}: {}",
                record.task_id,
                outcome.reason.unwrap_or("unknown")
            ));
        }
    }

    if let Err(e) = scratch.save(SCRATCH_FILE, &TaskClaimState::default()) {
        logger.log(format!("failed to clear task claims: {e:#}"));
    }
    logger.log(format!(
        "released {released}/{} task claims",
        state.claims.len()
    ));

    HookOutput::none()
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
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
        let logger = HookLogger::new(scratch.clone(), "coordination", "task-release");
        (dir, scratch, claims, logger)
    }

    fn seed(scratch: &ScratchDir, claims: &ClaimStore, task_id: &str, session: &str) {
        let issue_id = format!("task:{task_id}");
        let claimant = format!("agent:{session}:task");
        claims.claim(&issue_id, &claimant, None);

        let mut state: TaskClaimState = scratch.load_or_none(SCRATCH_FILE).unwrap_or_default();
        state.claims.push(TaskClaimRecord {
            task_id: task_id.to_string(),
            issue_id,
            claimant,
            description: "demo task".to_string(),
            claimed_at: hook_common::timestamp(),
            claim_success: true,
        });
        scratch.save(SCRATCH_FILE, &state).unwrap();
    }

    #[test]
    fn releases_all_recorded_claims() {
        let (_dir, scratch, claims, logger) = fixtures();
        seed(&scratch, &claims, "task-1", "sess-1");
        seed(&scratch, &claims, "task-2", "sess-1");

        let input = HookInput::from_str_lossy(r#"{"agent_id": "worker-9"}"#);
        let output = run(&scratch, &claims, None, &input, &logger);
        assert!(output.decision.is_none());

        assert!(claims.list_claims(&ClaimFilter::default()).is_empty());
        let state: TaskClaimState = scratch.load_or_none(SCRATCH_FILE).unwrap();
        assert!(state.claims.is_empty());
    }

    #[test]
    fn empty_state_is_a_quiet_noop() {
        let (_dir, scratch, claims, logger) = fixtures();
        let output = run(&scratch, &claims, None, &HookInput::default(), &logger);
        assert!(output.decision.is_none());
    }

    #[test]
    fn foreign_claims_are_left_alone() {
        let (_dir, scratch, claims, logger) = fixtures();
        seed(&scratch, &claims, "task-mine", "sess-1");
        claims.claim("task:task-other", "agent:sess-2:task", None);

        run(&scratch, &claims, None, &HookInput::default(), &logger);

        let remaining = claims.list_claims(&ClaimFilter::default());
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].issue_id, "task:task-other");
    }
}
