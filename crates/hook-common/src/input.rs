//! Hook input parsing from stdin.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, Read};

/// Tools whose invocation mutates a file and therefore goes through the
/// file-claim gate.
pub const WRITE_TOOLS: &[&str] = &["Write", "Edit", "MultiEdit"];

/// Main hook input structure received from the host.
///
/// Keys vary by lifecycle event; everything is optional so a hook never
/// fails on a sparse or unfamiliar payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HookInput {
    /// The name of the tool being called (e.g., "Bash", "Edit", "Task")
    #[serde(default)]
    pub tool_name: String,

    /// Tool-specific input parameters
    #[serde(default)]
    pub tool_input: ToolInput,

    /// Tool response (for PostToolUse hooks); shape is tool-specific
    #[serde(default)]
    pub tool_response: Option<serde_json::Value>,

    /// Hook event name (e.g., "UserPromptSubmit", "Stop")
    #[serde(default)]
    pub hook_event_name: Option<String>,

    /// User prompt (for UserPromptSubmit hooks)
    #[serde(default)]
    pub prompt: Option<String>,

    /// Working directory the host reports for this event
    #[serde(default)]
    pub cwd: Option<String>,

    /// Session ID, when the host supplies one
    #[serde(default)]
    pub session_id: Option<String>,

    /// Subagent id (for SubagentStop hooks)
    #[serde(default)]
    pub agent_id: Option<String>,

    /// Additional fields
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Tool input parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolInput {
    /// Command for Bash tool
    #[serde(default)]
    pub command: Option<String>,

    /// File path for Read/Edit/Write tools
    #[serde(default)]
    pub file_path: Option<String>,

    /// Some Edit payloads carry the target under `path` instead
    #[serde(default)]
    pub path: Option<String>,

    /// Content for Write tool
    #[serde(default)]
    pub content: Option<String>,

    /// Short description for Task tool
    #[serde(default)]
    pub description: Option<String>,

    /// Prompt for Task tool
    #[serde(default)]
    pub prompt: Option<String>,

    /// Subagent type for Task tool
    #[serde(default)]
    pub subagent_type: Option<String>,

    /// Additional fields
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl HookInput {
    /// Read and parse hook input from stdin.
    ///
    /// Malformed or empty stdin yields the default (empty) input rather
    /// than an error: a hook must never fail on host input.
    pub fn from_stdin() -> Self {
        let mut raw = String::new();
        if io::stdin().read_to_string(&mut raw).is_err() {
            return Self::default();
        }
        Self::from_str_lossy(&raw)
    }

    /// Parse a JSON payload, degrading to the empty input on failure.
    pub fn from_str_lossy(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::default();
        }
        serde_json::from_str(raw).unwrap_or_default()
    }

    /// Check if this event is for a write-class tool (Write/Edit/MultiEdit).
    pub fn is_write_tool(&self) -> bool {
        WRITE_TOOLS.contains(&self.tool_name.as_str())
    }

    /// Check if this is a Task tool call.
    pub fn is_task(&self) -> bool {
        self.tool_name == "Task"
    }

    /// Target file path for file-mutating tools, checking both spellings.
    pub fn file_path(&self) -> Option<&str> {
        self.tool_input
            .file_path
            .as_deref()
            .or(self.tool_input.path.as_deref())
    }

    /// Task description, falling back to the subagent prompt.
    pub fn task_description(&self) -> Option<&str> {
        self.tool_input
            .description
            .as_deref()
            .or(self.tool_input.prompt.as_deref())
    }

    /// Whether the tool response reports an error.
    ///
    /// Success is the default: a missing or unrecognized response shape
    /// counts as success.
    pub fn tool_succeeded(&self) -> bool {
        match &self.tool_response {
            Some(serde_json::Value::Object(map)) => !map
                .get("is_error")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            Some(serde_json::Value::String(s)) => !s.to_lowercase().contains("error"),
            _ => true,
        }
    }

    /// Host-supplied per-step quality, when present.
    pub fn step_quality(&self) -> Option<f64> {
        self.tool_response
            .as_ref()
            .and_then(|v| v.get("quality"))
            .and_then(|v| v.as_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_write_input() {
        let input =
            HookInput::from_str_lossy(r#"{"tool_name": "Edit", "tool_input": {"file_path": "/some/file.py"}}"#);
        assert!(input.is_write_tool());
        assert_eq!(input.file_path(), Some("/some/file.py"));
    }

    #[test]
    fn parse_path_spelling() {
        let input = HookInput::from_str_lossy(r#"{"tool_name": "Edit", "tool_input": {"path": "/alt/spelling.rs"}}"#);
        assert_eq!(input.file_path(), Some("/alt/spelling.rs"));
    }

    #[test]
    fn parse_task_input() {
        let input = HookInput::from_str_lossy(
            r#"{"tool_name": "Task", "tool_input": {"prompt": "refactor the parser", "subagent_type": "worker"}}"#,
        );
        assert!(input.is_task());
        assert_eq!(input.task_description(), Some("refactor the parser"));
    }

    #[test]
    fn parse_user_prompt() {
        let input = HookInput::from_str_lossy(r#"{"hook_event_name": "UserPromptSubmit", "prompt": "Hello"}"#);
        assert_eq!(input.hook_event_name.as_deref(), Some("UserPromptSubmit"));
        assert_eq!(input.prompt.as_deref(), Some("Hello"));
    }

    #[test]
    fn malformed_input_degrades_to_empty() {
        let input = HookInput::from_str_lossy("{not json");
        assert!(input.tool_name.is_empty());
        let input = HookInput::from_str_lossy("");
        assert!(input.prompt.is_none());
    }

    #[test]
    fn tool_success_defaults_true() {
        let input = HookInput::from_str_lossy(r#"{"tool_name": "Task"}"#);
        assert!(input.tool_succeeded());

        let input = HookInput::from_str_lossy(r#"{"tool_response": {"is_error": true}}"#);
        assert!(!input.tool_succeeded());

        let input = HookInput::from_str_lossy(r#"{"tool_response": {"is_error": false, "quality": 0.4}}"#);
        assert!(input.tool_succeeded());
        assert_eq!(input.step_quality(), Some(0.4));
    }
}
