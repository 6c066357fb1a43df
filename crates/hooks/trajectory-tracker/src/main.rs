//! Trajectory tracker: one executable, three lifecycle events.
//!
//! ```text
//! trajectory-tracker --event start   # PreToolUse (Task)
//! trajectory-tracker --event step    # PostToolUse (Task)
//! trajectory-tracker --event end     # Stop
//! ```
//!
//! The event name is part of the host contract; dispatch happens on the
//! flag at entry. The active trajectory lives in scratch while the task
//! runs and moves into the shared store at `end`.

use clap::{Parser, ValueEnum};
use hook_common::identity;
use hook_common::log::HookLogger;
use hook_common::prelude::*;
use hook_metrics::{Emitter, FieldValue};
use hook_store::trajectory::{self, ActiveTrajectory, Step, ACTIVE_TRAJECTORY_FILE};
use hook_store::MemoryStore;
use serde_json::json;

const SESSION_STATE_FILE: &str = "session_state.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Event {
    /// PreToolUse: open a trajectory for the spawned task
    Start,
    /// PostToolUse: append one step
    Step,
    /// Stop: finalize and store
    End,
}

#[derive(Debug, Parser)]
#[command(name = "trajectory-tracker", about = "Record per-task trajectories")]
struct Cli {
    #[arg(long, value_enum)]
    event: Event,
}

fn main() {
    let cli = Cli::parse();
    let scratch = ScratchDir::new();
    let logger = HookLogger::new(scratch.clone(), "trajectory", "trajectory-tracker");
    let input = HookInput::from_stdin();
    let project = identity::project_name();
    let session_id = identity::session_id(&scratch);
    let store = MemoryStore::open_default();

    let output = match cli.event {
        Event::Start => on_start(&scratch, &store, &input, &project, &session_id, &logger),
        Event::Step => on_step(&scratch, &input, &logger),
        Event::End => {
            let mut emitter = Emitter::new(scratch.clone());
            let output = on_end(&scratch, &store, &mut emitter, &logger);
            emitter.flush();
            output
        }
    };
    output.write_stdout();
}

fn on_start(
    scratch: &ScratchDir,
    store: &MemoryStore,
    input: &HookInput,
    project: &str,
    session_id: &str,
    logger: &HookLogger,
) -> HookOutput {
    if !input.tool_name.is_empty() && !input.is_task() {
        return HookOutput::none();
    }

    if scratch.exists(ACTIVE_TRAJECTORY_FILE) {
        logger.log("trajectory already active, keeping it");
        return HookOutput::none();
    }

    let task = input.task_description().unwrap_or("unknown");
    let trajectory = ActiveTrajectory::start(project, task);

    if let Err(e) = scratch.save(ACTIVE_TRAJECTORY_FILE, &trajectory) {
        logger.log(format!("failed to save active trajectory: {e:#}"));
        return HookOutput::none();
    }
    store.store(
        &format!("trajectory:{project}:active"),
        serde_json::to_value(&trajectory).unwrap_or_default(),
    );

    note_session_activity(scratch, store, project, session_id, &trajectory);

    logger.log(format!("started trajectory {}: {}", trajectory.id, trajectory.task));
    HookOutput::none()
}

fn on_step(scratch: &ScratchDir, input: &HookInput, logger: &HookLogger) -> HookOutput {
    let Some(mut trajectory) = scratch.load_or_none::<ActiveTrajectory>(ACTIVE_TRAJECTORY_FILE)
    else {
        logger.log("no active trajectory for step");
        return HookOutput::none();
    };

    let success = input.tool_succeeded();
    let step = Step {
        action: if input.tool_name.is_empty() {
            "Task".to_string()
        } else {
            input.tool_name.clone()
        },
        success,
        quality: input.step_quality().unwrap_or(1.0).clamp(0.0, 1.0),
        timestamp: hook_common::timestamp(),
    };

    trajectory.steps.push(step);
    if let Err(e) = scratch.save(ACTIVE_TRAJECTORY_FILE, &trajectory) {
        logger.log(format!("failed to record step: {e:#}"));
        return HookOutput::none();
    }

    logger.log(format!(
        "recorded step {} for {} (success={success})",
        trajectory.steps.len(),
        trajectory.id
    ));
    HookOutput::none()
}

fn on_end(
    scratch: &ScratchDir,
    store: &MemoryStore,
    emitter: &mut Emitter,
    logger: &HookLogger,
) -> HookOutput {
    let Some(open) = scratch.load_or_none::<ActiveTrajectory>(ACTIVE_TRAJECTORY_FILE) else {
        logger.log("no active trajectory to end");
        return HookOutput::none();
    };

    let rate = trajectory::finalize(store, scratch, &open, "completed");
    logger.log(format!(
        "ended trajectory {}: steps={}, rate={rate:.2}",
        open.id,
        open.steps.len()
    ));

    emitter.record(
        "claude_trajectories",
        &[("project", &open.project), ("status", "completed")],
        &[
            ("success_rate", FieldValue::Float(rate)),
            ("steps", FieldValue::Int(open.steps.len() as i64)),
        ],
    );

    HookOutput::none()
}

/// First tool event of a session also opens the session record: a later
/// prompt can then tell an interrupted session from a finished one.
fn note_session_activity(
    scratch: &ScratchDir,
    store: &MemoryStore,
    project: &str,
    session_id: &str,
    trajectory: &ActiveTrajectory,
) {
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

    let mut state: SessionState = scratch.load_or_none(SESSION_STATE_FILE).unwrap_or_default();
    if state.started_at.is_empty() || state.session_id != session_id {
        state = SessionState {
            session_id: session_id.to_string(),
            project: project.to_string(),
            started_at: hook_common::timestamp(),
            task: None,
        };
    }
    state.task = Some(trajectory.task.clone());
    let _ = scratch.save(SESSION_STATE_FILE, &state);

    let record = json!({
        "session_id": session_id,
        "project": project,
        "started_at": state.started_at,
        "last_activity": hook_common::timestamp(),
        "completed": false,
        "task": trajectory.task,
    });
    store.store(&format!("session:{project}:{session_id}"), record.clone());
    store.store(&format!("session:{project}:last"), record);
}
