//! Shared persistent state for all hooks and the external orchestrator.
//!
//! Two plain JSON documents under the orchestrator home:
//!
//! ```text
//! <home>/memory/store.json    key/value entries
//! <home>/claims/claims.json   claim board (active / stealable / contests)
//! ```
//!
//! Multiple hook processes (and the orchestrator itself) mutate these
//! concurrently, so every write is an advisory-locked read-modify-write
//! followed by an atomic replace. Readers take no lock: a stale but
//! internally consistent snapshot is acceptable everywhere a read-only
//! path is used.

pub mod claims;
pub mod kv;
pub mod lock;
pub mod paths;
pub mod trajectory;

pub use claims::{
    Claim, ClaimFilter, ClaimOutcome, ClaimStatus, ClaimStore, ClaimView, ReleaseOutcome,
    StealOutcome,
};
pub use kv::{Entry, MemoryStore, StoreOutcome};
pub use paths::StorePaths;
