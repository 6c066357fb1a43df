//! Best-effort metrics emission in influx line protocol.
//!
//! Records are appended to a local spool file and pushed to the TSDB over
//! plain TCP with a short timeout. Emission is opportunistic: it runs at
//! hook end, never on the blocking path, and every failure is swallowed —
//! a missed metric is always preferable to a slow or failing hook.

pub mod emit;
pub mod ilp;

pub use emit::Emitter;
pub use ilp::{to_ilp, FieldValue};
