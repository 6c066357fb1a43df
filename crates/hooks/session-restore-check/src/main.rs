//! UserPromptSubmit hook: if the previous session for this project ended
//! without a checkpoint, tell the model about it once.
//!
//! The `session:{project}:last` alias is consumed on injection — the
//! per-session record stays behind for post-mortems, but a second
//! consecutive prompt gets `{}` again.

use chrono::{DateTime, Duration, Utc};
use hook_common::identity;
use hook_common::log::HookLogger;
use hook_common::prelude::*;
use hook_store::MemoryStore;

/// A non-completed session younger than this is assumed to still be the
/// same session (rapid restart loops must not trigger recovery noise).
const GRACE_WINDOW_MINUTES: i64 = 5;

fn main() {
    let scratch = ScratchDir::new();
    let logger = HookLogger::new(scratch.clone(), "session", "session-restore-check");
    let _ = HookInput::from_stdin();
    let project = identity::project_name();
    let store = MemoryStore::open_default();

    let output = run(&store, &project, &logger);
    output.write_stdout();
}

fn run(store: &MemoryStore, project: &str, logger: &HookLogger) -> HookOutput {
    let alias_key = format!("session:{project}:last");
    let Some(last) = store.retrieve(&alias_key) else {
        logger.log("no previous session found");
        return HookOutput::none();
    };

    if !was_interrupted(&last) {
        logger.log("last session completed normally or is still fresh");
        return HookOutput::none();
    }

    let session_id = last
        .get("session_id")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");
    let task = last
        .get("task")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown task");
    let cwd = last.get("cwd").and_then(|v| v.as_str()).unwrap_or("unknown");

    // Consume the alias: exactly one injection per interrupted session.
    store.remove(&alias_key);

    let context = format!(
        "[Interrupted session detected: {task}] Previous session '{session_id}' in {cwd} \
         ended without a checkpoint. Consider reviewing uncommitted changes and resuming \
         where it left off."
    );
    logger.log(format!("injecting recovery context for {session_id}"));
    HookOutput::with_context(context)
}

/// Interrupted: not marked completed and older than the grace window.
fn was_interrupted(last: &serde_json::Value) -> bool {
    if last
        .get("completed")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
    {
        return false;
    }

    let started = last
        .get("started_at")
        .or_else(|| last.get("timestamp"))
        .and_then(|v| v.as_str());
    match started.and_then(|s| DateTime::parse_from_rfc3339(s).ok()) {
        Some(started) => {
            Utc::now() - started.with_timezone(&Utc) >= Duration::minutes(GRACE_WINDOW_MINUTES)
        }
        // No parseable timestamp: nothing says it is fresh, report it.
        None => true,
    }
}
