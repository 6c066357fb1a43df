//! Common utilities for the hook executables.
//!
//! Every hook in this workspace shares the same plumbing:
//! - JSON input/output on stdin/stdout (the host ABI)
//! - project and session identity resolution
//! - per-session scratch files under the metrics directory
//! - append-only log files
//! - a wall-clock deadline guard

pub mod deadline;
pub mod identity;
pub mod input;
pub mod log;
pub mod output;
pub mod scratch;

pub use deadline::Deadline;
pub use input::{HookInput, ToolInput};
pub use output::{Decision, HookOutput};
pub use scratch::ScratchDir;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::deadline::Deadline;
    pub use crate::input::{HookInput, ToolInput};
    pub use crate::log::hook_log;
    pub use crate::output::{Decision, HookOutput};
    pub use crate::scratch::ScratchDir;
    pub use anyhow::{Context, Result};
    pub use serde::{Deserialize, Serialize};
}

/// ISO-8601 UTC timestamp used across all persistent records.
pub fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
