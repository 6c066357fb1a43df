//! Claim side of the store: mutual exclusion for files, visibility for
//! tasks.
//!
//! A claim is owned by the claimant that created it until released or
//! stolen; ownership is identity, not process lifetime. Claims whose
//! session dies are parked in the `stealable` section so a later session
//! can take over without the original owner's release.

use crate::kv::atomic_write;
use crate::lock;
use crate::paths::StorePaths;
use anyhow::Result;
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Active,
    Stealable,
    Completed,
}

/// One claim record. `issue_id` is the map key; for file locks it is
/// `file:{abs_path}`, for task visibility `task:{task_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub claimant: String,
    pub status: ClaimStatus,
    pub claimed_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Progress in percent, when the claimant reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steal_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steal_context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marked_stealable_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_for: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ClaimsDoc {
    #[serde(default)]
    claims: BTreeMap<String, Claim>,
    #[serde(default)]
    stealable: BTreeMap<String, Claim>,
    #[serde(default)]
    contests: BTreeMap<String, Value>,
}

/// Result of a claim attempt. A conflict is data, not an error.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing: Option<Claim>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReleaseOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<Claim>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StealOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<Claim>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

/// A claim paired with its id, for listings.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimView {
    pub issue_id: String,
    #[serde(flatten)]
    pub claim: Claim,
}

/// Filter for `list_claims`.
#[derive(Debug, Clone, Default)]
pub struct ClaimFilter {
    pub status: Option<ClaimStatus>,
    pub claimant_prefix: Option<String>,
}

/// Handle to the claims document.
#[derive(Debug, Clone)]
pub struct ClaimStore {
    paths: StorePaths,
}

impl ClaimStore {
    pub fn open_default() -> Self {
        Self {
            paths: StorePaths::resolve(),
        }
    }

    pub fn at(paths: StorePaths) -> Self {
        Self { paths }
    }

    /// Claim an issue.
    ///
    /// - free id: granted (a stale stealable record for the id is dropped)
    /// - held by the same claimant: idempotent success, `claimed_at`
    ///   deliberately untouched
    /// - held by another claimant: conflict carrying the existing claim
    pub fn claim(&self, issue_id: &str, claimant: &str, context: Option<&str>) -> ClaimOutcome {
        let issue_id = issue_id.to_string();
        let claimant = claimant.to_string();
        let context = context.map(str::to_string);

        let result = self.with_doc_mut(move |doc| {
            if let Some(existing) = doc.claims.get(&issue_id) {
                if existing.claimant == claimant {
                    return ClaimOutcome {
                        success: true,
                        existing: None,
                        reason: None,
                    };
                }
                return ClaimOutcome {
                    success: false,
                    existing: Some(existing.clone()),
                    reason: Some("conflict"),
                };
            }

            // A fresh claim supersedes any parked stealable record.
            doc.stealable.remove(&issue_id);

            doc.claims.insert(
                issue_id,
                Claim {
                    claimant,
                    status: ClaimStatus::Active,
                    claimed_at: hook_common::timestamp(),
                    context,
                    progress: None,
                    steal_reason: None,
                    steal_context: None,
                    marked_stealable_at: None,
                    available_for: None,
                },
            );
            ClaimOutcome {
                success: true,
                existing: None,
                reason: None,
            }
        });

        result.unwrap_or(ClaimOutcome {
            success: false,
            existing: None,
            reason: Some("io"),
        })
    }

    /// Release a claim. Only the owner may release; a missing id is
    /// `not_found`, a claimant mismatch `not_authorized`.
    pub fn release(&self, issue_id: &str, claimant: &str) -> ReleaseOutcome {
        let issue_id = issue_id.to_string();
        let claimant = claimant.to_string();

        let result = self.with_doc_mut(move |doc| {
            let Some(existing) = doc.claims.get(&issue_id) else {
                return ReleaseOutcome {
                    success: false,
                    previous: None,
                    reason: Some("not_found"),
                };
            };
            if existing.claimant != claimant {
                return ReleaseOutcome {
                    success: false,
                    previous: Some(existing.clone()),
                    reason: Some("not_authorized"),
                };
            }
            let previous = doc.claims.remove(&issue_id);
            ReleaseOutcome {
                success: true,
                previous,
                reason: None,
            }
        });

        result.unwrap_or(ReleaseOutcome {
            success: false,
            previous: None,
            reason: Some("io"),
        })
    }

    /// Park an active claim in the stealable section.
    pub fn mark_stealable(&self, issue_id: &str, reason: &str) -> ReleaseOutcome {
        let issue_id = issue_id.to_string();
        let reason = reason.to_string();

        let result = self.with_doc_mut(move |doc| {
            let Some(mut claim) = doc.claims.remove(&issue_id) else {
                return ReleaseOutcome {
                    success: false,
                    previous: None,
                    reason: Some("not_found"),
                };
            };
            claim.status = ClaimStatus::Stealable;
            claim.steal_reason = Some(reason);
            claim.marked_stealable_at = Some(hook_common::timestamp());
            claim.available_for = Some("any".to_string());
            doc.stealable.insert(issue_id, claim.clone());
            ReleaseOutcome {
                success: true,
                previous: Some(claim),
                reason: None,
            }
        });

        result.unwrap_or(ReleaseOutcome {
            success: false,
            previous: None,
            reason: Some("io"),
        })
    }

    /// Take over a stealable claim under a new claimant.
    pub fn steal(&self, issue_id: &str, new_claimant: &str) -> StealOutcome {
        let issue_id = issue_id.to_string();
        let new_claimant = new_claimant.to_string();

        let result = self.with_doc_mut(move |doc| {
            let Some(previous) = doc.stealable.remove(&issue_id) else {
                return StealOutcome {
                    success: false,
                    previous: None,
                    reason: Some("not_found"),
                };
            };
            doc.claims.insert(
                issue_id,
                Claim {
                    claimant: new_claimant,
                    status: ClaimStatus::Active,
                    claimed_at: hook_common::timestamp(),
                    context: previous.context.clone(),
                    progress: None,
                    steal_reason: None,
                    steal_context: None,
                    marked_stealable_at: None,
                    available_for: None,
                },
            );
            StealOutcome {
                success: true,
                previous: Some(previous),
                reason: None,
            }
        });

        result.unwrap_or(StealOutcome {
            success: false,
            previous: None,
            reason: Some("io"),
        })
    }

    /// Park every active claim held by the given session. Returns the
    /// affected issue ids. This is the stuck-detector sweep.
    pub fn sweep_session(&self, session_id: &str, reason: &str) -> Vec<String> {
        let prefix = format!("agent:{session_id}:");
        let reason = reason.to_string();

        self.with_doc_mut(move |doc| {
            let ids: Vec<String> = doc
                .claims
                .iter()
                .filter(|(_, c)| c.claimant.starts_with(&prefix))
                .map(|(id, _)| id.clone())
                .collect();

            for id in &ids {
                if let Some(mut claim) = doc.claims.remove(id) {
                    claim.status = ClaimStatus::Stealable;
                    claim.steal_reason = Some(reason.clone());
                    claim.steal_context =
                        Some("Session ended with active claim".to_string());
                    claim.marked_stealable_at = Some(hook_common::timestamp());
                    claim.available_for = Some("any".to_string());
                    doc.stealable.insert(id.clone(), claim);
                }
            }
            ids
        })
        .unwrap_or_default()
    }

    /// Snapshot of claims matching the filter, lock-free.
    pub fn list_claims(&self, filter: &ClaimFilter) -> Vec<ClaimView> {
        let doc = read_doc(&self.paths.claims_file());
        let mut views = Vec::new();

        let include = |status: ClaimStatus| filter.status.map_or(true, |s| s == status);

        if include(ClaimStatus::Active) {
            views.extend(doc.claims.iter().map(|(id, c)| ClaimView {
                issue_id: id.clone(),
                claim: c.clone(),
            }));
        }
        if include(ClaimStatus::Stealable) {
            views.extend(doc.stealable.iter().map(|(id, c)| ClaimView {
                issue_id: id.clone(),
                claim: c.clone(),
            }));
        }

        if let Some(prefix) = &filter.claimant_prefix {
            views.retain(|v| v.claim.claimant.starts_with(prefix.as_str()));
        }
        views
    }

    fn with_doc_mut<T>(&self, f: impl FnOnce(&mut ClaimsDoc) -> T) -> Result<T> {
        let file = self.paths.claims_file();
        let lock_path = file.with_extension("json.lock");
        let _guard = lock::acquire(lock_path.as_std_path())?;

        let mut doc = read_doc(&file);
        let out = f(&mut doc);
        atomic_write(&file, &doc)?;
        Ok(out)
    }
}

fn read_doc(path: &Utf8Path) -> ClaimsDoc {
    match std::fs::read_to_string(path) {
        Ok(content) if !content.trim().is_empty() => {
            serde_json::from_str(&content).unwrap_or_default()
        }
        _ => ClaimsDoc::default(),
    }
}
