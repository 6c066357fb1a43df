//! UserPromptSubmit hook backing `/vsample [N] <request>`.
//!
//! Rewrites the request into a dual-track sampling instruction: generate
//! N candidate responses on two independent tracks, self-select the best
//! of each, then compare. Every accepted invocation is appended to a
//! daily JSONL log under the scratch directory.

use hook_common::log::HookLogger;
use hook_common::prelude::*;
use regex::Regex;
use std::fs::OpenOptions;
use std::io::Write;

const DEFAULT_SAMPLES: u32 = 5;
const MAX_SAMPLES: u32 = 10;

fn main() {
    let scratch = ScratchDir::new();
    let logger = HookLogger::new(scratch.clone(), "ux", "vsample");
    let input = HookInput::from_stdin();

    let output = run(&scratch, &input, &logger);
    output.write_stdout();
}

fn run(scratch: &ScratchDir, input: &HookInput, logger: &HookLogger) -> HookOutput {
    let Some(prompt) = input.prompt.as_deref() else {
        return HookOutput::none();
    };
    if !prompt.trim_start().starts_with("/vsample") {
        return HookOutput::none();
    }

    let Some((samples, request)) = parse_command(prompt) else {
        return HookOutput::none();
    };

    if request.is_empty() {
        return HookOutput::block(
            "Usage: /vsample [N] <your request>\n\
             Examples:\n  \
             /vsample write a haiku about caching\n  \
             /vsample 7 explain the borrow checker",
        );
    }

    append_log(scratch, samples, &request, logger);
    logger.log(format!("rewriting request with {samples} samples"));

    HookOutput::with_context(build_instruction(samples, &request))
}

/// `/vsample [N] <request>` — N defaults to 5, clamped to 1..=10.
fn parse_command(prompt: &str) -> Option<(u32, String)> {
    let re = Regex::new(r"^/vsample(?:\s+(\d+))?\s*(.*)$").ok()?;
    let caps = re.captures(prompt.trim())?;

    let samples = caps
        .get(1)
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .unwrap_or(DEFAULT_SAMPLES)
        .clamp(1, MAX_SAMPLES);
    let request = caps.get(2).map(|m| m.as_str().trim().to_string())?;

    Some((samples, request))
}

fn build_instruction(samples: u32, request: &str) -> String {
    format!(
        "[Verbalized sampling request] Run two independent generation tracks for the \
         request below.\n\
         Track A: generate {samples} distinct candidate responses, then select the best \
         one and explain the choice in one sentence.\n\
         Track B: independently generate {samples} distinct candidate responses with a \
         different angle of attack, then select the best one and explain the choice in \
         one sentence.\n\
         Finish with a short comparison of the two selected responses and name an \
         overall winner.\n\n\
         Request: {request}"
    )
}

fn append_log(scratch: &ScratchDir, samples: u32, request: &str, logger: &HookLogger) {
    let name = format!("vsample-{}.jsonl", chrono::Utc::now().format("%Y%m%d"));
    let record = serde_json::json!({
        "ts": hook_common::timestamp(),
        "samples": samples,
        "request": request,
    });

    let path = scratch.path(&name);
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(mut file) => {
            let _ = writeln!(file, "{record}");
        }
        Err(e) => logger.log(format!("failed to append vsample log: {e}")),
    }
}
