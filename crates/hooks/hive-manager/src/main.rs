//! Swarm lifecycle controller, backing the `/swarm` skill command.
//!
//! ```text
//! hive-manager init --topology hierarchical-mesh
//! hive-manager status
//! hive-manager spawn 3
//! hive-manager task "Implement feature X"
//! hive-manager consensus --topic "approach" --option fast --option safe
//! hive-manager broadcast "pausing for review"
//! hive-manager shutdown
//! ```
//!
//! Each subcommand prints a one-line confirmation (full JSON with
//! `--json`). Task submission without the orchestrator's companion
//! server reports `not_supported` and exits 0 — a known deployment
//! limitation, not an error.

use clap::{Parser, Subcommand};
use hook_common::log::HookLogger;
use hook_common::ScratchDir;
use hook_gateway::hive;
use hook_gateway::{Gateway, Topology};
use hook_metrics::{Emitter, FieldValue};

#[derive(Debug, Parser)]
#[command(name = "hive-manager", about = "Swarm lifecycle management")]
struct Cli {
    /// Print the full JSON result instead of a one-line confirmation
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Initialize a new hive
    Init {
        #[arg(long, value_enum, default_value_t = Topology::HierarchicalMesh)]
        topology: Topology,
    },
    /// Show hive status
    Status {
        #[arg(long)]
        verbose: bool,
    },
    /// Spawn workers into the hive
    Spawn {
        #[arg(default_value_t = 3)]
        count: u32,
    },
    /// Submit a task for parallel execution
    Task {
        description: String,
        #[arg(long, default_value = "normal")]
        priority: String,
    },
    /// Propose a consensus vote
    Consensus {
        #[arg(long)]
        topic: String,
        /// Option to vote on (repeatable)
        #[arg(long = "option", required = true)]
        options: Vec<String>,
    },
    /// Broadcast a message to all workers
    Broadcast {
        message: String,
        #[arg(long, default_value = "all")]
        target: String,
    },
    /// Terminate the hive
    Shutdown {
        /// Skip the graceful drain
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    let scratch = ScratchDir::new();
    let logger = HookLogger::new(scratch.clone(), "swarm", "hive-manager");
    let gateway = Gateway::resolve();

    let exit = dispatch(&cli, &gateway, &scratch, &logger);
    std::process::exit(exit);
}

fn dispatch(cli: &Cli, gateway: &Gateway, scratch: &ScratchDir, logger: &HookLogger) -> i32 {
    match &cli.command {
        Commands::Init { topology } => {
            logger.log(format!("init topology={topology}"));
            let result = hive::init_swarm(gateway, *topology);
            report(cli.json, &result, result.success, || {
                if result.success {
                    match &result.hive_id {
                        Some(id) => format!("Hive initialized (topology: {topology}, id: {id})"),
                        None => format!("Hive initialized (topology: {topology})"),
                    }
                } else {
                    format!("Hive init failed: {}", describe(&result.reason, &result.output))
                }
            })
        }
        Commands::Status { verbose } => {
            let result = hive::get_status(gateway, *verbose);
            if result.success {
                let mut emitter = Emitter::new(scratch.clone());
                emitter.record(
                    "claude_mcp_agents",
                    &[],
                    &[("workers_active", FieldValue::Int(result.workers_active as i64))],
                );
                emitter.flush();
            }
            report(cli.json, &result, result.success, || {
                if result.success {
                    format!("Hive status: {} worker(s) active", result.workers_active)
                } else {
                    format!("Hive status unavailable: {}", describe(&result.reason, &result.output))
                }
            })
        }
        Commands::Spawn { count } => {
            logger.log(format!("spawn count={count}"));
            let result = hive::spawn_workers(gateway, *count);
            report(cli.json, &result, result.success, || {
                if result.success {
                    format!("Spawned {count} worker(s)")
                } else {
                    format!("Spawn failed: {}", describe(&result.reason, &result.output))
                }
            })
        }
        Commands::Task {
            description,
            priority,
        } => {
            logger.log(format!("submit task: {description}"));
            let result = hive::submit_task(gateway, description, Some(priority));
            if result.success {
                let mut emitter = Emitter::new(scratch.clone());
                emitter.record(
                    "claude_mcp_tasks",
                    &[("priority", priority)],
                    &[("submitted", FieldValue::Int(1))],
                );
                emitter.flush();
            }
            // Submission without a companion server is a known limitation,
            // not a failure exit.
            let ok = result.success || result.reason == Some("not_supported");
            report(cli.json, &result, ok, || {
                if result.success {
                    match &result.task_id {
                        Some(id) => format!("Task submitted (id: {id})"),
                        None => "Task submitted".to_string(),
                    }
                } else if result.reason == Some("not_supported") {
                    "Task submission not supported (orchestrator server not running)".to_string()
                } else {
                    format!("Task submission failed: {}", describe(&result.reason, &result.output))
                }
            })
        }
        Commands::Consensus { topic, options } => {
            logger.log(format!("consensus topic={topic}"));
            let result = hive::propose_consensus(gateway, topic, options);
            report(cli.json, &result, result.success, || {
                if result.success {
                    match &result.proposal_id {
                        Some(id) => format!("Consensus proposed (id: {id})"),
                        None => "Consensus proposed".to_string(),
                    }
                } else {
                    format!("Consensus failed: {}", describe(&result.reason, &result.output))
                }
            })
        }
        Commands::Broadcast { message, target } => {
            let result = hive::broadcast_message(gateway, message, Some(target));
            report(cli.json, &result, result.success, || {
                if result.success {
                    format!("Broadcast sent to {target}")
                } else {
                    format!("Broadcast failed: {}", describe(&result.reason, &result.output))
                }
            })
        }
        Commands::Shutdown { force } => {
            logger.log(format!("shutdown graceful={}", !force));
            let result = hive::shutdown_swarm(gateway, !force);
            report(cli.json, &result, result.success, || {
                if result.success {
                    "Hive shut down".to_string()
                } else {
                    format!("Shutdown failed: {}", describe(&result.reason, &result.output))
                }
            })
        }
    }
}

fn report<T: serde::Serialize>(
    json: bool,
    result: &T,
    ok: bool,
    line: impl FnOnce() -> String,
) -> i32 {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(result).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        println!("{}", line());
    }
    if ok {
        0
    } else {
        1
    }
}

fn describe(reason: &Option<&'static str>, output: &str) -> String {
    match reason {
        Some(reason) if output.is_empty() => (*reason).to_string(),
        Some(reason) => format!("{reason} ({output})"),
        None if output.is_empty() => "unknown".to_string(),
        None => output.to_string(),
    }
}
