//! Hook output generation for stdout.
//!
//! A hook answers the host with exactly one JSON object. The no-op answer
//! is `{}`; the only user-visible decisions are `block` (refuse the tool
//! call, with a reason) and `warn` (advisory message). `additionalContext`
//! is appended to the next model input.

use serde::{Deserialize, Serialize};
use std::io::{self, Write};

/// Decision for PreToolUse hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Refuse the tool call
    Block,
    /// Let it proceed with an advisory message
    Warn,
}

/// Main hook output structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HookOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,

    /// Reason shown to the user on block
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Advisory message on warn
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Context appended to the next model input
    #[serde(rename = "additionalContext", skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,

    /// Free-form pass-through for event-specific payloads
    #[serde(rename = "hookSpecificOutput", skip_serializing_if = "Option::is_none")]
    pub hook_specific_output: Option<serde_json::Value>,
}

impl HookOutput {
    /// The no-op answer: serializes to `{}`.
    pub fn none() -> Self {
        Self::default()
    }

    /// Refuse the tool call with a reason.
    pub fn block(reason: impl Into<String>) -> Self {
        Self {
            decision: Some(Decision::Block),
            reason: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Allow the tool call with an advisory message.
    pub fn warn(message: impl Into<String>) -> Self {
        Self {
            decision: Some(Decision::Warn),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Inject context into the next model input.
    pub fn with_context(context: impl Into<String>) -> Self {
        Self {
            additional_context: Some(context.into()),
            ..Self::default()
        }
    }

    /// Serialize and write to stdout. Failures are swallowed: a hook that
    /// cannot print must still exit 0.
    pub fn write_stdout(&self) {
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        let mut stdout = io::stdout();
        let _ = stdout.write_all(json.as_bytes());
        let _ = stdout.write_all(b"\n");
        let _ = stdout.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_is_empty_object() {
        let json = serde_json::to_string(&HookOutput::none()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn block_carries_reason() {
        let json = serde_json::to_string(&HookOutput::block("File claimed by agent:x:editor")).unwrap();
        assert!(json.contains("\"decision\":\"block\""));
        assert!(json.contains("File claimed by agent:x:editor"));
        assert!(!json.contains("message"));
    }

    #[test]
    fn warn_carries_message() {
        let json = serde_json::to_string(&HookOutput::warn("heads up")).unwrap();
        assert!(json.contains("\"decision\":\"warn\""));
        assert!(json.contains("heads up"));
    }

    #[test]
    fn context_uses_camel_case_key() {
        let json = serde_json::to_string(&HookOutput::with_context("[Lessons]")).unwrap();
        assert!(json.contains("\"additionalContext\":\"[Lessons]\""));
    }
}
