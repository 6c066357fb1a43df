//! Stop hook: extract patterns from what the session left behind.
//!
//! Three detectors, all driven by compile-time thresholds:
//! - high rework: the same file edited over and over
//! - high error rate: too many failing tool calls
//! - quality drop: declining success trend across recent trajectories
//!
//! Detected patterns land in the store under `pattern:{fingerprint}` and
//! are forwarded to the orchestrator's pattern index fire-and-forget.

use hook_common::identity;
use hook_common::log::HookLogger;
use hook_common::prelude::*;
use hook_gateway::Gateway;
use hook_metrics::{Emitter, FieldValue};
use hook_store::trajectory::IndexEntry;
use hook_store::MemoryStore;
use serde_json::json;
use std::collections::BTreeMap;

const EDIT_COUNTS_FILE: &str = "file_edit_counts.json";
const SESSION_ANALYSIS_FILE: &str = "session_analysis.json";

/// A file edited more than this many times signals rework churn.
const THRESHOLD_REWORK_EDITS: u64 = 3;
/// Error rate above this fraction of tool calls signals trouble.
const THRESHOLD_ERROR_RATE: f64 = 0.25;
/// Success-rate drop across recent trajectories that counts as a decline.
const THRESHOLD_QUALITY_DROP: f64 = 0.15;
/// Minimum samples before the trend detector speaks up.
const MIN_QUALITY_SAMPLES: usize = 3;
/// How many recent index entries feed the trend detector.
const QUALITY_WINDOW: usize = 10;

#[derive(Debug, Clone, Serialize)]
struct Pattern {
    text: String,
    pattern_type: &'static str,
    confidence: f64,
    metadata: serde_json::Value,
}

fn main() {
    let scratch = ScratchDir::new();
    let logger = HookLogger::new(scratch.clone(), "learning", "meta-learning");
    let _ = HookInput::from_stdin();
    let project = identity::project_name();
    let store = MemoryStore::open_default();
    let gateway = Gateway::resolve();
    let mut emitter = Emitter::new(scratch.clone());

    let output = run(&scratch, &store, Some(&gateway), &project, &mut emitter, &logger);
    emitter.flush();
    output.write_stdout();
}

fn run(
    scratch: &ScratchDir,
    store: &MemoryStore,
    gateway: Option<&Gateway>,
    project: &str,
    emitter: &mut Emitter,
    logger: &HookLogger,
) -> HookOutput {
    let edit_counts: BTreeMap<String, u64> =
        scratch.load_or_none(EDIT_COUNTS_FILE).unwrap_or_default();
    let analysis: serde_json::Value = scratch
        .load_or_none(SESSION_ANALYSIS_FILE)
        .unwrap_or(serde_json::Value::Null);
    let quality_scores = load_quality_scores(store, project);

    logger.log(format!(
        "session data: {} edited files, {} quality samples",
        edit_counts.len(),
        quality_scores.len()
    ));

    let mut patterns = Vec::new();
    patterns.extend(extract_rework_pattern(&edit_counts));
    patterns.extend(extract_error_pattern(&analysis));
    patterns.extend(extract_quality_drop_pattern(&quality_scores));

    logger.log(format!("extracted {} pattern(s)", patterns.len()));

    for pattern in &patterns {
        store_pattern(store, gateway, project, pattern, logger);
        emitter.record(
            "claude_strategy_metrics",
            &[("project", project), ("pattern_type", pattern.pattern_type)],
            &[("confidence", FieldValue::Float(pattern.confidence))],
        );
    }

    HookOutput::none()
}

/// Success rates of the most recent trajectories, oldest first (the
/// index keeps newest first).
fn load_quality_scores(store: &MemoryStore, project: &str) -> Vec<f64> {
    let Some(value) = store.retrieve(&format!("trajectory:{project}:index")) else {
        return Vec::new();
    };
    let Ok(index) = serde_json::from_value::<Vec<IndexEntry>>(value) else {
        return Vec::new();
    };

    index
        .iter()
        .take(QUALITY_WINDOW)
        .rev()
        .map(|entry| {
            entry
                .success_rate
                .unwrap_or(if entry.success { 1.0 } else { 0.5 })
        })
        .collect()
}

fn extract_rework_pattern(edit_counts: &BTreeMap<String, u64>) -> Option<Pattern> {
    let churned: Vec<(&String, u64)> = edit_counts
        .iter()
        .filter(|(_, &count)| count > THRESHOLD_REWORK_EDITS)
        .map(|(path, &count)| (path, count))
        .collect();
    if churned.is_empty() {
        return None;
    }

    let max_edits = churned.iter().map(|(_, c)| *c).max().unwrap_or(0);
    let confidence =
        (0.5 + 0.1 * (max_edits.saturating_sub(THRESHOLD_REWORK_EDITS)) as f64).min(1.0);
    let files: Vec<&str> = churned.iter().map(|(p, _)| p.as_str()).collect();

    Some(Pattern {
        text: format!(
            "{} file(s) needed more than {THRESHOLD_REWORK_EDITS} edits last session \
             (worst: {max_edits}); plan the change before writing to cut rework",
            files.len()
        ),
        pattern_type: "high_rework",
        confidence,
        metadata: json!({"files": files, "max_edits": max_edits}),
    })
}

fn extract_error_pattern(analysis: &serde_json::Value) -> Option<Pattern> {
    let session = analysis.get("session")?;
    let error_rate = match session.get("error_rate").and_then(|v| v.as_f64()) {
        Some(rate) => rate,
        None => {
            let tool_calls = session.get("tool_calls").and_then(|v| v.as_u64())?;
            if tool_calls == 0 {
                return None;
            }
            let errors = session.get("errors").and_then(|v| v.as_u64()).unwrap_or(0);
            errors as f64 / tool_calls as f64
        }
    };

    if error_rate <= THRESHOLD_ERROR_RATE {
        return None;
    }

    let confidence = (0.4 + (error_rate - THRESHOLD_ERROR_RATE) * 2.0).min(1.0);
    Some(Pattern {
        text: format!(
            "{:.0}% of tool calls failed last session; verify commands and file paths \
             before running them",
            error_rate * 100.0
        ),
        pattern_type: "high_error",
        confidence,
        metadata: json!({"error_rate": error_rate}),
    })
}

fn extract_quality_drop_pattern(scores: &[f64]) -> Option<Pattern> {
    if scores.len() < MIN_QUALITY_SAMPLES {
        return None;
    }

    // Least-squares slope over the sample index.
    let n = scores.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = scores.iter().sum::<f64>() / n;
    let numerator: f64 = scores
        .iter()
        .enumerate()
        .map(|(i, y)| (i as f64 - x_mean) * (y - y_mean))
        .sum();
    let denominator: f64 = (0..scores.len())
        .map(|i| (i as f64 - x_mean).powi(2))
        .sum();
    if denominator == 0.0 {
        return None;
    }
    let slope = numerator / denominator;

    let drop = scores[0] - scores[scores.len() - 1];
    if drop <= THRESHOLD_QUALITY_DROP || slope >= 0.0 {
        return None;
    }

    let confidence = (0.6 + drop.min(0.4)).min(1.0);
    Some(Pattern {
        text: format!(
            "Task success rate dropped by {drop:.2} over recent sessions; prefer smaller, \
             independently verifiable steps"
        ),
        pattern_type: "quality_drop",
        confidence,
        metadata: json!({"total_drop": drop, "slope": slope}),
    })
}

fn store_pattern(
    store: &MemoryStore,
    gateway: Option<&Gateway>,
    project: &str,
    pattern: &Pattern,
    logger: &HookLogger,
) {
    // One fingerprint per project+type: a re-detection refreshes the
    // lesson instead of piling up duplicates.
    let digest = format!("{:x}", md5::compute(format!("{project}:{}", pattern.pattern_type)));
    let key = format!("pattern:{}", &digest[..12]);

    let outcome = store.store(
        &key,
        json!({
            "text": pattern.text,
            "pattern_type": pattern.pattern_type,
            "confidence": pattern.confidence,
            "project": project,
            "metadata": pattern.metadata,
            "created_at": hook_common::timestamp(),
        }),
    );
    if outcome.success {
        logger.log(format!(
            "stored pattern {} (confidence={:.2})",
            pattern.pattern_type, pattern.confidence
        ));
    } else {
        logger.log(format!("failed to store pattern {}", pattern.pattern_type));
    }

    if let Some(gateway) = gateway {
        let confidence = format!("{:.2}", pattern.confidence);
        gateway.run_detached(&[
            "pattern",
            "store",
            "--pattern",
            &pattern.text,
            "--type",
            pattern.pattern_type,
            "--confidence",
            &confidence,
        ]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hook_store::StorePaths;
    use serde_json::json;
    use tempfile::tempdir;

    fn fixtures() -> (tempfile::TempDir, ScratchDir, MemoryStore, HookLogger) {
        let dir = tempdir().unwrap();
        let scratch = ScratchDir::at(dir.path().join("scratch"));
        let store = MemoryStore::at(StorePaths::at(dir.path().join("store").to_str().unwrap()));
        let logger = HookLogger::new(scratch.clone(), "learning", "meta-learning");
        (dir, scratch, store, logger)
    }

    #[test]
    fn rework_detector_needs_more_than_threshold_edits() {
        let mut counts = BTreeMap::new();
        counts.insert("/a".to_string(), 3u64);
        assert!(extract_rework_pattern(&counts).is_none());

        counts.insert("/b".to_string(), 6);
        let pattern = extract_rework_pattern(&counts).unwrap();
        assert_eq!(pattern.pattern_type, "high_rework");
        // 0.5 + 0.1 * (6 - 3)
        assert!((pattern.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn rework_confidence_is_capped_at_one() {
        let mut counts = BTreeMap::new();
        counts.insert("/a".to_string(), 50u64);
        let pattern = extract_rework_pattern(&counts).unwrap();
        assert_eq!(pattern.confidence, 1.0);
    }

    #[test]
    fn error_detector_uses_rate_or_counts() {
        let quiet = json!({"session": {"tool_calls": 10, "errors": 2}});
        assert!(extract_error_pattern(&quiet).is_none());

        let noisy = json!({"session": {"tool_calls": 10, "errors": 5}});
        let pattern = extract_error_pattern(&noisy).unwrap();
        assert_eq!(pattern.pattern_type, "high_error");
        // 0.4 + (0.5 - 0.25) * 2
        assert!((pattern.confidence - 0.9).abs() < 1e-9);

        let explicit = json!({"session": {"error_rate": 0.5}});
        assert!(extract_error_pattern(&explicit).is_some());
    }

    #[test]
    fn quality_detector_wants_samples_and_a_real_decline() {
        assert!(extract_quality_drop_pattern(&[1.0, 0.5]).is_none()); // too few
        assert!(extract_quality_drop_pattern(&[0.9, 0.9, 0.9]).is_none()); // flat
        assert!(extract_quality_drop_pattern(&[0.5, 0.7, 0.9]).is_none()); // rising

        let pattern = extract_quality_drop_pattern(&[0.9, 0.7, 0.5]).unwrap();
        assert_eq!(pattern.pattern_type, "quality_drop");
        // 0.6 + min(0.4, 0.4)
        assert!((pattern.confidence - 1.0).abs() < 1e-9);

        let mild = extract_quality_drop_pattern(&[0.8, 0.7, 0.6]).unwrap();
        assert!((mild.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn run_stores_patterns_under_fingerprints() {
        let (_dir, scratch, store, logger) = fixtures();
        let mut emitter = Emitter::spool_only(scratch.clone());

        let mut counts = BTreeMap::new();
        counts.insert("/hot.rs".to_string(), 7u64);
        scratch.save(EDIT_COUNTS_FILE, &counts).unwrap();

        run(&scratch, &store, None, "demo", &mut emitter, &logger);

        let patterns = store.list("pattern:");
        assert_eq!(patterns.len(), 1);
        let value = &patterns[0].value;
        assert_eq!(value["pattern_type"], "high_rework");
        assert_eq!(value["project"], "demo");
        assert!(value["confidence"].as_f64().unwrap() <= 1.0);

        // Re-running overwrites the same fingerprint, no duplicates.
        run(&scratch, &store, None, "demo", &mut emitter, &logger);
        assert_eq!(store.list("pattern:").len(), 1);
    }

    #[test]
    fn quiet_session_extracts_nothing() {
        let (_dir, scratch, store, logger) = fixtures();
        let mut emitter = Emitter::spool_only(scratch.clone());

        let output = run(&scratch, &store, None, "demo", &mut emitter, &logger);
        assert!(output.decision.is_none());
        assert!(store.list("pattern:").is_empty());
    }
}
