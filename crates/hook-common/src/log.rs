//! Append-only log files for hooks.
//!
//! One timestamped line per event, grouped by subsystem
//! (`coordination.log`, `trajectory.log`, `learning.log`, ...). Logging
//! must never interfere with a hook's result, so every failure here is
//! swallowed.

use crate::scratch::ScratchDir;
use std::fs::OpenOptions;
use std::io::Write;

/// Append one line to `<scratch>/<subsystem>.log`.
pub fn hook_log(scratch: &ScratchDir, subsystem: &str, hook: &str, msg: &str) {
    let path = scratch.path(&format!("{subsystem}.log"));
    let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) else {
        return;
    };
    let _ = writeln!(file, "{} - [{}] {}", crate::timestamp(), hook, msg);
}

/// Bound logger for a single hook binary.
#[derive(Debug, Clone)]
pub struct HookLogger {
    scratch: ScratchDir,
    subsystem: &'static str,
    hook: &'static str,
}

impl HookLogger {
    pub fn new(scratch: ScratchDir, subsystem: &'static str, hook: &'static str) -> Self {
        Self {
            scratch,
            subsystem,
            hook,
        }
    }

    pub fn log(&self, msg: impl AsRef<str>) {
        hook_log(&self.scratch, self.subsystem, self.hook, msg.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn appends_timestamped_lines() {
        let dir = tempdir().unwrap();
        let scratch = ScratchDir::at(dir.path());

        hook_log(&scratch, "coordination", "file-claim", "claimed /tmp/x.py");
        hook_log(&scratch, "coordination", "file-release", "released /tmp/x.py");

        let content = std::fs::read_to_string(scratch.path("coordination.log")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("[file-claim] claimed /tmp/x.py"));
        assert!(lines[1].contains("[file-release]"));
    }

    #[test]
    fn logger_binds_names() {
        let dir = tempdir().unwrap();
        let scratch = ScratchDir::at(dir.path());
        let logger = HookLogger::new(scratch.clone(), "trajectory", "trajectory-tracker");

        logger.log("started traj-abc");
        let content = std::fs::read_to_string(scratch.path("trajectory.log")).unwrap();
        assert!(content.contains("[trajectory-tracker] started traj-abc"));
    }
}
