//! Gateway to the external orchestrator CLI.
//!
//! The orchestrator is an independent component with its own lifecycle;
//! it is invoked as a subprocess and is always optional. This crate is
//! the only place in the workspace that knows subprocess semantics —
//! everything else programs against the gateway's JSON-shaped results.

pub mod gateway;
pub mod hive;

pub use gateway::{Gateway, GatewayFailure, GatewayResult};
pub use hive::Topology;
