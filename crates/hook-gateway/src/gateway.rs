//! Subprocess plumbing for the orchestrator CLI.

use serde::Serialize;
use std::io::Write;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default per-call budget; callers may raise it up to [`MAX_TIMEOUT`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Hard ceiling on any orchestrator call.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(30);

/// Why an invocation failed. Reported to callers, never propagated as a
/// process failure to the host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayFailure {
    #[error("orchestrator binary not installed")]
    NotInstalled,
    #[error("orchestrator call timed out after {0:?}")]
    Timeout(Duration),
    #[error("orchestrator exited with status {0}")]
    NonzeroExit(i32),
    #[error("orchestrator produced non-JSON output")]
    InvalidJson,
}

impl GatewayFailure {
    /// Stable machine-readable code for logs and result payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotInstalled => "not_installed",
            Self::Timeout(_) => "timeout",
            Self::NonzeroExit(_) => "nonzero_exit",
            Self::InvalidJson => "invalid_json",
        }
    }
}

/// Result of one orchestrator invocation. Parsing is best-effort: when
/// stdout is not JSON, `parsed` stays empty and callers fall back to the
/// raw strings.
#[derive(Debug, Clone)]
pub struct GatewayResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub parsed: Option<serde_json::Value>,
    pub failure: Option<GatewayFailure>,
}

impl GatewayResult {
    fn failed(failure: GatewayFailure) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: String::new(),
            parsed: None,
            failure: Some(failure),
        }
    }

    /// Combined output, preferring stdout (mirrors how the orchestrator
    /// reports errors on either stream).
    pub fn output(&self) -> &str {
        if self.stdout.trim().is_empty() {
            self.stderr.trim()
        } else {
            self.stdout.trim()
        }
    }
}

/// Handle to the orchestrator binary.
#[derive(Debug, Clone)]
pub struct Gateway {
    bin: String,
}

impl Gateway {
    /// Resolve the binary from `HIVE_FLOW_BIN`, default `hive-flow`.
    pub fn resolve() -> Self {
        let bin = std::env::var("HIVE_FLOW_BIN")
            .ok()
            .filter(|b| !b.trim().is_empty())
            .unwrap_or_else(|| "hive-flow".to_string());
        Self { bin }
    }

    /// Use an explicit binary (tests wire a stub here).
    pub fn with_bin(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    /// Invoke a subcommand synchronously with a wall-clock budget.
    pub fn run(&self, args: &[&str], timeout: Duration) -> GatewayResult {
        self.run_with_stdin::<()>(args, None, timeout)
    }

    /// Invoke a subcommand, optionally feeding a JSON payload on stdin.
    pub fn run_with_stdin<T: Serialize>(
        &self,
        args: &[&str],
        payload: Option<&T>,
        timeout: Duration,
    ) -> GatewayResult {
        let timeout = timeout.min(MAX_TIMEOUT);

        let mut command = Command::new(&self.bin);
        command
            .args(args)
            .stdin(if payload.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(_) => return GatewayResult::failed(GatewayFailure::NotInstalled),
        };

        if let Some(payload) = payload {
            if let Some(mut stdin) = child.stdin.take() {
                let body = serde_json::to_vec(payload).unwrap_or_default();
                let _ = stdin.write_all(&body);
                // stdin drops here, closing the pipe
            }
        }

        match wait_with_timeout(&mut child, timeout) {
            WaitOutcome::Finished => collect(child),
            WaitOutcome::TimedOut => {
                let _ = child.kill();
                let _ = child.wait();
                GatewayResult::failed(GatewayFailure::Timeout(timeout))
            }
        }
    }

    /// Fire-and-forget invocation, detached from the hook's lifetime.
    /// Used for notifications and background sync that must never sit on
    /// the synchronous path.
    pub fn run_detached(&self, args: &[&str]) -> bool {
        Command::new(&self.bin)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .is_ok()
    }
}

enum WaitOutcome {
    Finished,
    TimedOut,
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> WaitOutcome {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return WaitOutcome::Finished,
            Ok(None) => {
                if start.elapsed() > timeout {
                    return WaitOutcome::TimedOut;
                }
                thread::sleep(Duration::from_millis(10));
            }
            Err(_) => return WaitOutcome::Finished,
        }
    }
}

fn collect(child: Child) -> GatewayResult {
    let output = match child.wait_with_output() {
        Ok(output) => output,
        Err(_) => return GatewayResult::failed(GatewayFailure::NotInstalled),
    };

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    let parsed = serde_json::from_str(stdout.trim()).ok();

    let failure = if !success {
        Some(GatewayFailure::NonzeroExit(output.status.code().unwrap_or(-1)))
    } else if parsed.is_none() && !stdout.trim().is_empty() {
        Some(GatewayFailure::InvalidJson)
    } else {
        None
    };

    GatewayResult {
        success,
        stdout,
        stderr,
        parsed,
        failure,
    }
}
