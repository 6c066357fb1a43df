//! Stop hook: checkpoint the session so a crash or interrupt can be
//! detected and recovered on the next prompt.
//!
//! Writes the session record under its own key and the `:last` alias,
//! flushes any trajectory the stop left open (as failed, with the rate
//! of its partial steps), and emits a best-effort metrics batch.

use hook_common::identity;
use hook_common::log::HookLogger;
use hook_common::prelude::*;
use hook_metrics::{Emitter, FieldValue};
use hook_store::trajectory::{self, ActiveTrajectory, ACTIVE_TRAJECTORY_FILE};
use hook_store::{ClaimFilter, ClaimStatus, ClaimStore, MemoryStore};
use serde_json::json;

const SESSION_STATE_FILE: &str = "session_state.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionState {
    #[serde(default)]
    session_id: String,
    #[serde(default)]
    project: String,
    #[serde(default)]
    started_at: String,
    #[serde(default)]
    task: Option<String>,
}

fn main() {
    let deadline = Deadline::standard();
    let scratch = ScratchDir::new();
    let logger = HookLogger::new(scratch.clone(), "session", "session-checkpoint");
    let _ = HookInput::from_stdin();
    let project = identity::project_name();
    let session_id = identity::session_id(&scratch);
    let store = MemoryStore::open_default();
    let mut emitter = Emitter::new(scratch.clone());

    let output = run(&scratch, &store, &project, &session_id, &mut emitter, &logger);

    // Opportunistic: the claim-board gauge rides along with the
    // checkpoint, but only while there is budget left to spend.
    if !deadline.expired() {
        record_claim_stats(&ClaimStore::open_default(), &project, &mut emitter);
        emitter.flush();
    }

    output.write_stdout();
}

fn run(
    scratch: &ScratchDir,
    store: &MemoryStore,
    project: &str,
    session_id: &str,
    emitter: &mut Emitter,
    logger: &HookLogger,
) -> HookOutput {
    logger.log(format!("checkpoint for session {session_id} ({project})"));

    let flushed_task = flush_open_trajectory(scratch, store, emitter, logger);

    let state: SessionState = scratch.load_or_none(SESSION_STATE_FILE).unwrap_or_default();
    let started_at = if state.started_at.is_empty() {
        hook_common::timestamp()
    } else {
        state.started_at.clone()
    };
    let now = hook_common::timestamp();
    let cwd = std::env::current_dir()
        .map(|d| d.display().to_string())
        .unwrap_or_default();

    let record = json!({
        "session_id": session_id,
        "project": project,
        "cwd": cwd,
        "started_at": started_at,
        "ended_at": now,
        "last_activity": now,
        "completed": true,
        "task": flushed_task.or(state.task),
    });

    let keyed = store.store(&format!("session:{project}:{session_id}"), record.clone());
    let alias = store.store(&format!("session:{project}:last"), record);
    if !keyed.success || !alias.success {
        logger.log("failed to persist session record");
    } else {
        logger.log("checkpoint complete");
    }

    HookOutput::none()
}

/// An open trajectory at Stop means the task never reached its own `end`
/// event: close it as failed with whatever steps it gathered.
fn flush_open_trajectory(
    scratch: &ScratchDir,
    store: &MemoryStore,
    emitter: &mut Emitter,
    logger: &HookLogger,
) -> Option<String> {
    let open: ActiveTrajectory = scratch.load_or_none(ACTIVE_TRAJECTORY_FILE)?;
    let task = open.task.clone();
    let rate = trajectory::finalize(store, scratch, &open, "failed");
    logger.log(format!(
        "flushed unclosed trajectory {} as failed (rate {rate:.2})",
        open.id
    ));

    emitter.record(
        "claude_trajectories",
        &[("project", &open.project), ("status", "failed")],
        &[
            ("success_rate", FieldValue::Float(rate)),
            ("steps", FieldValue::Int(open.steps.len() as i64)),
        ],
    );
    Some(task)
}

fn record_claim_stats(claims: &ClaimStore, project: &str, emitter: &mut Emitter) {
    let active = claims
        .list_claims(&ClaimFilter {
            status: Some(ClaimStatus::Active),
            ..Default::default()
        })
        .len();
    let stealable = claims
        .list_claims(&ClaimFilter {
            status: Some(ClaimStatus::Stealable),
            ..Default::default()
        })
        .len();

    emitter.record(
        "claude_mcp_system",
        &[("project", project)],
        &[
            ("active_claims", FieldValue::Int(active as i64)),
            ("stealable_claims", FieldValue::Int(stealable as i64)),
            ("session_completed", FieldValue::Bool(true)),
        ],
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use hook_store::trajectory::Step;
    use hook_store::StorePaths;
    use tempfile::tempdir;

    fn fixtures() -> (tempfile::TempDir, ScratchDir, MemoryStore, HookLogger) {
        let dir = tempdir().unwrap();
        let scratch = ScratchDir::at(dir.path().join("scratch"));
        let store = MemoryStore::at(StorePaths::at(dir.path().join("store").to_str().unwrap()));
        let logger = HookLogger::new(scratch.clone(), "session", "session-checkpoint");
        (dir, scratch, store, logger)
    }

    #[test]
    fn checkpoint_marks_session_completed_under_both_keys() {
        let (_dir, scratch, store, logger) = fixtures();
        let mut emitter = Emitter::spool_only(scratch.clone());

        let output = run(&scratch, &store, "demo", "sess-1", &mut emitter, &logger);
        assert!(output.decision.is_none());

        for key in ["session:demo:sess-1", "session:demo:last"] {
            let record = store.retrieve(key).unwrap();
            assert_eq!(record["completed"], true);
            assert_eq!(record["project"], "demo");
            assert_eq!(record["session_id"], "sess-1");
            assert!(record["ended_at"].as_str().is_some());
        }
    }

    #[test]
    fn open_trajectory_is_flushed_as_failed() {
        let (_dir, scratch, store, logger) = fixtures();
        let mut emitter = Emitter::spool_only(scratch.clone());

        let mut open = ActiveTrajectory::start("demo", "interrupted work");
        open.steps.push(Step {
            action: "Task".to_string(),
            success: true,
            quality: 1.0,
            timestamp: hook_common::timestamp(),
        });
        open.steps.push(Step {
            action: "Task".to_string(),
            success: false,
            quality: 0.2,
            timestamp: hook_common::timestamp(),
        });
        scratch.save(ACTIVE_TRAJECTORY_FILE, &open).unwrap();

        run(&scratch, &store, "demo", "sess-1", &mut emitter, &logger);

        let stored = store
            .retrieve(&format!("trajectory:demo:{}", open.id))
            .unwrap();
        assert_eq!(stored["status"], "failed");
        assert_eq!(stored["success_rate"], 0.5);
        assert!(!scratch.exists(ACTIVE_TRAJECTORY_FILE));

        // The flushed task lands in the session record for restore hints.
        let session = store.retrieve("session:demo:last").unwrap();
        assert_eq!(session["task"], "interrupted work");
    }

    #[test]
    fn started_at_survives_from_session_state() {
        let (_dir, scratch, store, logger) = fixtures();
        let mut emitter = Emitter::spool_only(scratch.clone());
        scratch
            .save(
                SESSION_STATE_FILE,
                &SessionState {
                    session_id: "sess-1".to_string(),
                    project: "demo".to_string(),
                    started_at: "2026-01-01T00:00:00Z".to_string(),
                    task: Some("long task".to_string()),
                },
            )
            .unwrap();

        run(&scratch, &store, "demo", "sess-1", &mut emitter, &logger);

        let record = store.retrieve("session:demo:last").unwrap();
        assert_eq!(record["started_at"], "2026-01-01T00:00:00Z");
        assert_eq!(record["task"], "long task");
    }
}
