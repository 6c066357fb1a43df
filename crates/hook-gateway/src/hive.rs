//! Swarm lifecycle over the orchestrator's `hive-mind` subcommand family.
//!
//! Each operation wraps one gateway invocation and normalizes the answer
//! into a `{success, ...}` record. Ids are taken from parsed JSON when
//! the orchestrator emits it, with a regex fallback over raw output for
//! older orchestrator builds that print human-readable lines.

use crate::gateway::{Gateway, GatewayFailure, GatewayResult, DEFAULT_TIMEOUT, MAX_TIMEOUT};
use regex::Regex;
use serde::Serialize;
use std::time::Duration;

/// Swarm topologies the orchestrator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Topology {
    #[default]
    HierarchicalMesh,
    Mesh,
    Star,
    Ring,
}

impl Topology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HierarchicalMesh => "hierarchical-mesh",
            Self::Mesh => "mesh",
            Self::Star => "star",
            Self::Ring => "ring",
        }
    }
}

impl std::fmt::Display for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InitResult {
    pub success: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hive_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpawnResult {
    pub success: bool,
    pub output: String,
    pub workers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitResult {
    pub success: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResult {
    pub success: bool,
    pub output: String,
    pub workers_active: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsensusResult {
    pub success: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpResult {
    pub success: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

/// Initialize a hive with the given topology.
pub fn init_swarm(gateway: &Gateway, topology: Topology) -> InitResult {
    let result = gateway.run(&["hive-mind", "init", "-t", topology.as_str()], DEFAULT_TIMEOUT);
    InitResult {
        hive_id: extract_id(&result, "hive_id", r"(?i)hive[_\s]?id[:\s]+([a-zA-Z0-9_-]+)"),
        success: result.success,
        output: result.output().to_string(),
        reason: failure_code(&result),
    }
}

/// Spawn `count` workers into the hive.
pub fn spawn_workers(gateway: &Gateway, count: u32) -> SpawnResult {
    let count_arg = count.to_string();
    let result = gateway.run(&["hive-mind", "spawn", "-n", &count_arg], DEFAULT_TIMEOUT);

    let workers = if let Some(list) = result
        .parsed
        .as_ref()
        .and_then(|v| v.get("workers"))
        .and_then(|v| v.as_array())
    {
        list.iter()
            .filter_map(|w| w.as_str().map(str::to_string))
            .collect()
    } else {
        match Regex::new(r"(?i)worker[_\s]?id[:\s]+([a-zA-Z0-9_-]+)") {
            Ok(re) => re
                .captures_iter(result.output())
                .map(|c| c[1].to_string())
                .collect(),
            Err(_) => Vec::new(),
        }
    };

    SpawnResult {
        success: result.success,
        workers,
        output: result.output().to_string(),
        reason: failure_code(&result),
    }
}

/// Submit a task for parallel execution.
///
/// The orchestrator's task queue needs its companion server; without one
/// it reports the submission as unsupported. That is a known limitation
/// of the deployment, not a bug — callers treat it as non-fatal.
pub fn submit_task(gateway: &Gateway, description: &str, priority: Option<&str>) -> SubmitResult {
    let mut args = vec!["hive-mind", "task", "-d", description];
    if let Some(priority) = priority.filter(|p| *p != "normal") {
        args.extend(["--priority", priority]);
    }
    let result = gateway.run(&args, DEFAULT_TIMEOUT);

    let reason = if server_missing(&result) {
        Some("not_supported")
    } else {
        failure_code(&result)
    };

    SubmitResult {
        task_id: extract_id(&result, "task_id", r"(?i)task[_\s]?id[:\s]+([a-zA-Z0-9_-]+)"),
        success: result.success,
        output: result.output().to_string(),
        reason,
    }
}

/// Query hive health: topology, worker count, task counts.
pub fn get_status(gateway: &Gateway, verbose: bool) -> StatusResult {
    let mut args = vec!["hive-mind", "status"];
    if verbose {
        args.push("--verbose");
    }
    let result = gateway.run(&args, DEFAULT_TIMEOUT);

    let workers_active = result
        .parsed
        .as_ref()
        .and_then(|v| v.get("workers_active"))
        .and_then(|v| v.as_u64())
        .map(|n| n as u32)
        .or_else(|| {
            Regex::new(r"(?i)workers?(?:[_\s]?active)?[:\s]+(\d+)")
                .ok()
                .and_then(|re| re.captures(result.output()))
                .and_then(|c| c[1].parse().ok())
        })
        .unwrap_or(0);

    StatusResult {
        success: result.success,
        workers_active,
        output: result.output().to_string(),
        reason: failure_code(&result),
    }
}

/// Propose a consensus vote to the hive.
pub fn propose_consensus(gateway: &Gateway, topic: &str, options: &[String]) -> ConsensusResult {
    let options_json = serde_json::to_string(options).unwrap_or_else(|_| "[]".to_string());
    let result = gateway.run(
        &[
            "hive-mind",
            "consensus",
            "propose",
            "--topic",
            topic,
            "--options",
            &options_json,
        ],
        Duration::from_secs(30).min(MAX_TIMEOUT),
    );

    ConsensusResult {
        proposal_id: extract_id(
            &result,
            "proposal_id",
            r"(?i)proposal[_\s]?id[:\s]+([a-zA-Z0-9_-]+)",
        ),
        success: result.success,
        output: result.output().to_string(),
        reason: failure_code(&result),
    }
}

/// Publish a message to workers.
pub fn broadcast_message(gateway: &Gateway, message: &str, target: Option<&str>) -> OpResult {
    let mut args = vec!["hive-mind", "broadcast", "-m", message];
    if let Some(target) = target.filter(|t| *t != "all") {
        args.extend(["--target", target]);
    }
    let result = gateway.run(&args, DEFAULT_TIMEOUT);
    OpResult {
        success: result.success,
        output: result.output().to_string(),
        reason: failure_code(&result),
    }
}

/// Terminate the hive. Always attempted, even on a degraded deployment.
pub fn shutdown_swarm(gateway: &Gateway, graceful: bool) -> OpResult {
    let mut args = vec!["hive-mind", "shutdown"];
    if !graceful {
        args.push("--force");
    }
    let result = gateway.run(&args, DEFAULT_TIMEOUT);
    OpResult {
        success: result.success,
        output: result.output().to_string(),
        reason: failure_code(&result),
    }
}

fn failure_code(result: &GatewayResult) -> Option<&'static str> {
    match &result.failure {
        // Unparseable-but-successful output is not a caller-visible failure;
        // the raw string is still available.
        Some(GatewayFailure::InvalidJson) if result.success => None,
        Some(failure) => Some(failure.code()),
        None => None,
    }
}

fn server_missing(result: &GatewayResult) -> bool {
    if result.success {
        return false;
    }
    let haystack = format!("{} {}", result.output(), result.stderr).to_lowercase();
    haystack.contains("not_supported")
        || haystack.contains("not supported")
        || haystack.contains("no server")
        || haystack.contains("server not running")
        || haystack.contains("server is not running")
}

fn extract_id(result: &GatewayResult, json_key: &str, pattern: &str) -> Option<String> {
    if let Some(id) = result
        .parsed
        .as_ref()
        .and_then(|v| v.get(json_key))
        .and_then(|v| v.as_str())
    {
        return Some(id.to_string());
    }
    let re = Regex::new(pattern).ok()?;
    re.captures(result.output()).map(|c| c[1].to_string())
}
