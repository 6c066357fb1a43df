//! Stop hook: when a session ends (normally or not), any claims it still
//! holds are parked as stealable so another agent can take over the work
//! without waiting for a release that will never come.

use hook_common::identity;
use hook_common::log::HookLogger;
use hook_common::prelude::*;
use hook_store::ClaimStore;

/// Reason recorded on every parked claim.
const STEAL_REASON: &str = "blocked-timeout";
/// Per-session identity snapshot, cleared once the session is swept.
const SESSION_STATE_FILE: &str = "session_state.json";

fn main() {
    let scratch = ScratchDir::new();
    let logger = HookLogger::new(scratch.clone(), "coordination", "stuck-detector");
    let _ = HookInput::from_stdin();
    let session_id = identity::session_id(&scratch);
    let claims = ClaimStore::open_default();

    let output = run(&scratch, &claims, &session_id, &logger);
    output.write_stdout();
}

fn run(
    scratch: &ScratchDir,
    claims: &ClaimStore,
    session_id: &str,
    logger: &HookLogger,
) -> HookOutput {
    logger.log(format!("stop sweep for session: {session_id}"));

    let moved = claims.sweep_session(session_id, STEAL_REASON);
    if moved.is_empty() {
        logger.log(format!("no active claims for session {session_id}"));
    } else {
        logger.log(format!(
            "marked {} claim(s) stealable: {}",
            moved.len(),
            moved.join(", ")
        ));
    }

    if let Err(e) = scratch.delete(SESSION_STATE_FILE) {
        logger.log(format!("failed to clear session state: {e:#}"));
    }

    HookOutput::none()
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
        let logger = HookLogger::new(scratch.clone(), "coordination", "stuck-detector");
        (dir, scratch, claims, logger)
    }

    #[test]
    fn session_claims_become_stealable() {
        let (_dir, scratch, claims, logger) = fixtures();
        claims.claim("file:/a", "agent:sess-A:editor", None);
        claims.claim("file:/b", "agent:sess-A:editor", None);
        claims.claim("file:/c", "agent:sess-B:editor", None);

        let output = run(&scratch, &claims, "sess-A", &logger);
        assert!(output.decision.is_none());

        let stealable = claims.list_claims(&ClaimFilter {
            status: Some(ClaimStatus::Stealable),
            ..Default::default()
        });
        assert_eq!(stealable.len(), 2);
        for view in &stealable {
            assert_eq!(view.claim.steal_reason.as_deref(), Some(STEAL_REASON));
        }

        // The other session's claim still stands.
        let active = claims.list_claims(&ClaimFilter {
            status: Some(ClaimStatus::Active),
            ..Default::default()
        });
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].claim.claimant, "agent:sess-B:editor");
    }

    #[test]
    fn parked_claims_can_be_stolen_by_the_next_session() {
        let (_dir, scratch, claims, logger) = fixtures();
        claims.claim("file:/a", "agent:sess-A:editor", None);
        run(&scratch, &claims, "sess-A", &logger);

        let stolen = claims.steal("file:/a", "agent:sess-B:editor");
        assert!(stolen.success);
        assert_eq!(stolen.previous.unwrap().claimant, "agent:sess-A:editor");
    }

    #[test]
    fn empty_board_is_a_quiet_noop() {
        let (_dir, scratch, claims, logger) = fixtures();
        let output = run(&scratch, &claims, "sess-A", &logger);
        assert!(output.decision.is_none());
    }

    #[test]
    fn session_state_scratch_is_cleared() {
        let (_dir, scratch, claims, logger) = fixtures();
        scratch
            .save(SESSION_STATE_FILE, &serde_json::json!({"session_id": "sess-A"}))
            .unwrap();

        run(&scratch, &claims, "sess-A", &logger);
        assert!(!scratch.exists(SESSION_STATE_FILE));
    }
}
