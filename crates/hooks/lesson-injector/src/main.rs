//! UserPromptSubmit hook: surface lessons mined from earlier sessions.
//!
//! Patterns come from the orchestrator's pattern index when it answers
//! within budget, otherwise from a linear scan of the shared store. The
//! confidence band decides the phrasing: HIGH lessons are stated
//! outright, MEDIUM ones get a `Consider:` prefix, LOW ones never
//! surface. At most three lessons per prompt.

use hook_common::identity;
use hook_common::log::HookLogger;
use hook_common::prelude::*;
use hook_gateway::Gateway;
use hook_store::MemoryStore;
use std::collections::HashSet;
use std::time::Duration;

const CONFIDENCE_HIGH: f64 = 0.8;
const CONFIDENCE_MEDIUM: f64 = 0.5;
const MAX_LESSONS: usize = 3;
/// The pattern search must answer fast or not at all.
const SEARCH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
struct Lesson {
    text: String,
    confidence: f64,
    overlap: usize,
}

fn main() {
    let deadline = Deadline::standard();
    let scratch = ScratchDir::new();
    let logger = HookLogger::new(scratch.clone(), "learning", "lesson-injector");
    let input = HookInput::from_stdin();
    let project = identity::project_name();
    let store = MemoryStore::open_default();
    let gateway = Gateway::resolve();

    let output = run(&store, Some(&gateway), &input, &project, &deadline, &logger);
    output.write_stdout();
}

fn run(
    store: &MemoryStore,
    gateway: Option<&Gateway>,
    input: &HookInput,
    project: &str,
    deadline: &Deadline,
    logger: &HookLogger,
) -> HookOutput {
    let Some(prompt) = input.prompt.as_deref().filter(|p| !p.trim().is_empty()) else {
        logger.log("no prompt, skipping");
        return HookOutput::none();
    };

    let query: String = prompt.chars().take(100).collect();
    let mut lessons = gateway
        .filter(|_| !deadline.expired())
        .and_then(|g| search_via_gateway(g, project, &query, deadline.clamp(SEARCH_TIMEOUT)))
        .unwrap_or_default();
    if lessons.is_empty() {
        lessons = search_store(store, project, prompt);
    }

    // Confidence first; prompt overlap breaks ties.
    lessons.retain(|l| l.confidence >= CONFIDENCE_MEDIUM);
    lessons.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.overlap.cmp(&a.overlap))
    });
    lessons.truncate(MAX_LESSONS);

    if lessons.is_empty() {
        logger.log("no lessons above the confidence floor");
        return HookOutput::none();
    }

    let mut lines = vec!["[Lessons from past sessions]".to_string()];
    for lesson in &lessons {
        if lesson.confidence >= CONFIDENCE_HIGH {
            lines.push(format!("- {}", lesson.text));
        } else {
            lines.push(format!("- Consider: {}", lesson.text));
        }
    }

    logger.log(format!("injecting {} lesson(s)", lessons.len()));
    HookOutput::with_context(lines.join("\n"))
}

fn search_via_gateway(
    gateway: &Gateway,
    project: &str,
    query: &str,
    timeout: Duration,
) -> Option<Vec<Lesson>> {
    let result = gateway.run(
        &[
            "pattern",
            "search",
            "-q",
            query,
            "-n",
            "5",
            "--min-confidence",
            "0.5",
            "--project",
            project,
        ],
        timeout,
    );
    if !result.success {
        return None;
    }

    let items = result.parsed?.as_array()?.to_vec();
    let lessons: Vec<Lesson> = items
        .iter()
        .filter_map(|item| {
            let text = item
                .get("text")
                .or_else(|| item.get("pattern"))
                .and_then(|v| v.as_str())?;
            Some(Lesson {
                text: text.to_string(),
                confidence: item
                    .get("confidence")
                    .and_then(|v| v.as_f64())
                    .unwrap_or(0.0),
                overlap: 0,
            })
        })
        .collect();
    if lessons.is_empty() {
        None
    } else {
        Some(lessons)
    }
}

/// Store-level fallback: every `pattern:` entry for this project (or
/// with no project tag), scored by token overlap with the prompt.
fn search_store(store: &MemoryStore, project: &str, prompt: &str) -> Vec<Lesson> {
    let prompt_tokens = tokenize(prompt);

    store
        .list("pattern:")
        .into_iter()
        .filter_map(|entry| {
            let value = entry.value;
            let text = value
                .get("text")
                .or_else(|| value.get("pattern"))
                .and_then(|v| v.as_str())?
                .to_string();

            if let Some(tagged) = value.get("project").and_then(|v| v.as_str()) {
                if tagged != project {
                    return None;
                }
            }

            let confidence = value
                .get("confidence")
                .or_else(|| value.get("conf"))
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0);
            let overlap = tokenize(&text).intersection(&prompt_tokens).count();

            Some(Lesson {
                text,
                confidence,
                overlap,
            })
        })
        .collect()
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hook_store::StorePaths;
    use serde_json::json;
    use tempfile::tempdir;

    fn fixtures() -> (tempfile::TempDir, MemoryStore, HookLogger) {
        let dir = tempdir().unwrap();
        let store = MemoryStore::at(StorePaths::at(dir.path().join("store").to_str().unwrap()));
        let scratch = ScratchDir::at(dir.path().join("scratch"));
        let logger = HookLogger::new(scratch, "learning", "lesson-injector");
        (dir, store, logger)
    }

    fn prompt_input(prompt: &str) -> HookInput {
        HookInput::from_str_lossy(&format!(r#"{{"prompt": "{prompt}"}}"#))
    }

    fn seed(store: &MemoryStore, key: &str, text: &str, confidence: f64) {
        store.store(
            &format!("pattern:{key}"),
            json!({"text": text, "confidence": confidence}),
        );
    }

    #[test]
    fn bands_order_and_cap_hold() {
        let (_dir, store, logger) = fixtures();
        seed(&store, "a", "use checkpoints", 0.9);
        seed(&store, "b", "shrink edits", 0.6);
        seed(&store, "c", "noise", 0.3);

        let output = run(&store, None, &prompt_input("anything at all"), "demo", &Deadline::standard(), &logger);
        let context = output.additional_context.unwrap();
        let lines: Vec<&str> = context.lines().collect();

        assert_eq!(lines[0], "[Lessons from past sessions]");
        assert_eq!(lines.len(), 3); // header + two lessons, LOW filtered
        assert_eq!(lines[1], "- use checkpoints");
        assert_eq!(lines[2], "- Consider: shrink edits");
    }

    #[test]
    fn at_most_three_lessons() {
        let (_dir, store, logger) = fixtures();
        for (i, confidence) in [0.95, 0.9, 0.85, 0.8, 0.7].iter().enumerate() {
            seed(&store, &format!("p{i}"), &format!("lesson {i}"), *confidence);
        }

        let output = run(&store, None, &prompt_input("go"), "demo", &Deadline::standard(), &logger);
        let context = output.additional_context.unwrap();
        assert_eq!(context.lines().count(), 1 + MAX_LESSONS);
        // Descending confidence ordering.
        assert_eq!(context.lines().nth(1).unwrap(), "- lesson 0");
    }

    #[test]
    fn foreign_project_patterns_are_filtered() {
        let (_dir, store, logger) = fixtures();
        store.store(
            "pattern:other",
            json!({"text": "alien lesson", "confidence": 0.9, "project": "elsewhere"}),
        );
        store.store(
            "pattern:ours",
            json!({"text": "local lesson", "confidence": 0.9, "project": "demo"}),
        );

        let output = run(&store, None, &prompt_input("go"), "demo", &Deadline::standard(), &logger);
        let context = output.additional_context.unwrap();
        assert!(context.contains("local lesson"));
        assert!(!context.contains("alien lesson"));
    }

    #[test]
    fn empty_prompt_and_empty_store_are_quiet() {
        let (_dir, store, logger) = fixtures();
        assert!(run(&store, None, &HookInput::default(), "demo", &Deadline::standard(), &logger)
            .additional_context
            .is_none());
        assert!(run(&store, None, &prompt_input("hello"), "demo", &Deadline::standard(), &logger)
            .additional_context
            .is_none());
    }

    #[test]
    fn overlap_breaks_confidence_ties() {
        let (_dir, store, logger) = fixtures();
        seed(&store, "a", "tune the parser tests", 0.9);
        seed(&store, "b", "tune the deploy scripts", 0.9);

        let output = run(&store, None, &prompt_input("fix the parser"), "demo", &Deadline::standard(), &logger);
        let context = output.additional_context.unwrap();
        assert_eq!(context.lines().nth(1).unwrap(), "- tune the parser tests");
    }

    #[test]
    fn tokenize_lowercases_and_drops_tiny_tokens() {
        let tokens = tokenize("Fix the parser in CI!");
        assert!(tokens.contains("fix"));
        assert!(tokens.contains("parser"));
        assert!(!tokens.contains("in"));
        assert!(!tokens.contains("ci"));
    }
}
