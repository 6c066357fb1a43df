//! Trajectory records: the per-task action sequences mined for lessons.
//!
//! The active trajectory lives in a per-session scratch file while the
//! task runs; completion (or a checkpoint flushing an interrupted
//! session) moves it into the shared store and prepends a summary to the
//! per-project index.

use crate::kv::MemoryStore;
use hook_common::ScratchDir;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Scratch file holding the in-flight trajectory.
pub const ACTIVE_TRAJECTORY_FILE: &str = "active_trajectory.json";
/// Index keeps the most recent summaries, newest first.
pub const INDEX_CAP: usize = 100;
/// A trajectory counts as successful at or above this step success rate.
pub const SUCCESS_RATE_FLOOR: f64 = 0.5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub action: String,
    pub success: bool,
    pub quality: f64,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveTrajectory {
    pub id: String,
    pub project: String,
    pub task: String,
    pub status: String,
    pub steps: Vec<Step>,
    pub started_at: String,
}

/// Compact summary kept in `trajectory:{project}:index`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub task: String,
    pub success: bool,
    pub steps: usize,
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_rate: Option<f64>,
}

impl ActiveTrajectory {
    pub fn start(project: &str, task: &str) -> Self {
        let task: String = task.chars().take(200).collect();
        Self {
            id: generate_trajectory_id(&task),
            project: project.to_string(),
            task,
            status: "in_progress".to_string(),
            steps: Vec::new(),
            started_at: hook_common::timestamp(),
        }
    }

    /// Successful steps over total, never stored stale: recomputed at
    /// finalization from whatever steps exist.
    pub fn success_rate(&self) -> f64 {
        let successes = self.steps.iter().filter(|s| s.success).count();
        successes as f64 / self.steps.len().max(1) as f64
    }
}

/// `traj-<hash>-<HHMMSS>`: content hash for affinity, time for uniqueness.
pub fn generate_trajectory_id(task: &str) -> String {
    let digest = format!("{:x}", md5::compute(task.as_bytes()));
    let clock = chrono::Utc::now().format("%H%M%S");
    format!("traj-{}-{}", &digest[..8], clock)
}

/// Move a trajectory into the store with the given terminal status,
/// prepend its index summary, and clear the active markers. Returns the
/// computed success rate.
pub fn finalize(
    store: &MemoryStore,
    scratch: &ScratchDir,
    trajectory: &ActiveTrajectory,
    status: &str,
) -> f64 {
    let rate = trajectory.success_rate();
    let now = hook_common::timestamp();

    store.store(
        &format!("trajectory:{}:{}", trajectory.project, trajectory.id),
        json!({
            "id": trajectory.id,
            "project": trajectory.project,
            "task": trajectory.task,
            "status": status,
            "steps": trajectory.steps,
            "started_at": trajectory.started_at,
            "ended_at": now,
            "success": rate >= SUCCESS_RATE_FLOOR,
            "success_rate": rate,
            "total_steps": trajectory.steps.len(),
        }),
    );

    let index_key = format!("trajectory:{}:index", trajectory.project);
    let mut index: Vec<IndexEntry> = store
        .retrieve(&index_key)
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();
    index.insert(
        0,
        IndexEntry {
            id: trajectory.id.clone(),
            task: trajectory.task.chars().take(100).collect(),
            success: rate >= SUCCESS_RATE_FLOOR,
            steps: trajectory.steps.len(),
            ts: now,
            success_rate: Some(rate),
        },
    );
    index.truncate(INDEX_CAP);
    store.store(&index_key, serde_json::to_value(index).unwrap_or_default());

    store.remove(&format!("trajectory:{}:active", trajectory.project));
    let _ = scratch.delete(ACTIVE_TRAJECTORY_FILE);

    rate
}
