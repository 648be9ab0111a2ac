//! Core tool trait and handler types

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::provider::{FunctionDefinition, ToolDefinition};

/// Errors a tool handler can produce.
///
/// These never bubble out of the runner as `Err`; they are rendered into
/// `ToolResult.error` strings so the Planner can observe them on the next
/// iteration.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Path resolves outside the sandbox root
    #[error("Path outside allowed root: {0}")]
    PathDenied(String),

    /// Command's first token is not on the allowlist
    #[error("Command not allowed: {0}")]
    CommandDenied(String),

    /// Shell metacharacter or traversal pattern found (strict exec mode)
    #[error("Dangerous pattern detected: {0}")]
    DangerousPattern(&'static str),

    /// `exec_cmd` is disabled by configuration
    #[error("Command execution is disabled")]
    ExecDisabled,

    /// Command exceeded its effective timeout
    #[error("Command timed out after {0}s")]
    Timeout(u64),

    /// Command could not be spawned or captured
    #[error("{0}")]
    Exec(String),

    /// Target file does not exist
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Target exists but is not a regular file
    #[error("Not a file: {0}")]
    NotAFile(String),

    /// Target directory does not exist
    #[error("Directory not found: {0}")]
    DirNotFound(String),

    /// Target exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADir(String),

    /// Search path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(String),

    /// `edit_file` text not present
    #[error("Text not found in {0}")]
    EditNotFound(String),

    /// `edit_file` text occurs more than once
    #[error("Text appears {count} times in {path} (must be unique)")]
    EditAmbiguous { path: String, count: usize },

    /// Arguments failed to decode
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    /// Filesystem failure while handling the tool
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl ToolError {
    /// Exit code carried into the `ToolResult`
    pub fn exit_code(&self) -> i32 {
        match self {
            ToolError::Timeout(_) => 124,
            ToolError::Exec(_) => 1,
            _ => 0,
        }
    }
}

/// Raw output of a tool handler before translation into a `ToolResult`
#[derive(Debug, Clone)]
pub struct HandlerOutput {
    /// Tool output text
    pub output: String,
    /// Exit code; 0 for non-exec tools
    pub exit_code: i32,
}

impl HandlerOutput {
    /// Output with exit code 0
    pub fn new(output: impl Into<String>) -> Self {
        HandlerOutput {
            output: output.into(),
            exit_code: 0,
        }
    }

    /// Set the exit code
    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = exit_code;
        self
    }
}

/// A workspace tool callable by the LLM
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name
    fn name(&self) -> &str;

    /// Get the tool description
    fn description(&self) -> &str;

    /// Get the JSON Schema for tool parameters
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the given argument object
    async fn run(&self, args: &Map<String, Value>) -> Result<HandlerOutput, ToolError>;

    /// Convert to an OpenAI-style tool definition for native function calling
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: self.name().to_string(),
                description: self.description().to_string(),
                parameters: self.parameters_schema(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ToolError::Timeout(5).exit_code(), 124);
        assert_eq!(ToolError::Exec("spawn failed".into()).exit_code(), 1);
        assert_eq!(ToolError::PathDenied("../x".into()).exit_code(), 0);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ToolError::PathDenied("../../etc/passwd".into()).to_string(),
            "Path outside allowed root: ../../etc/passwd"
        );
        assert_eq!(
            ToolError::CommandDenied("rm".into()).to_string(),
            "Command not allowed: rm"
        );
        assert_eq!(
            ToolError::EditAmbiguous {
                path: "a.txt".into(),
                count: 2
            }
            .to_string(),
            "Text appears 2 times in a.txt (must be unique)"
        );
        assert_eq!(
            ToolError::Timeout(1).to_string(),
            "Command timed out after 1s"
        );
    }
}
