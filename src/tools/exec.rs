//! Shell command execution tool
//!
//! Runs commands through `sh -c` with the workspace as working directory.
//! The allowlist and (optionally) the shell-metacharacter scan run before a
//! shell ever sees the command; execution time is capped by the effective
//! timeout and the child is killed on expiry.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::process::Command;
use tracing::debug;

use super::args::{decode, ExecCmdArgs};
use super::traits::{HandlerOutput, Tool, ToolError};
use crate::constraints::Constraints;

/// Built-in tool: execute a shell command
pub struct ExecCmdTool {
    constraints: Arc<Constraints>,
}

impl ExecCmdTool {
    pub fn new(constraints: Arc<Constraints>) -> Self {
        ExecCmdTool { constraints }
    }
}

#[async_trait]
impl Tool for ExecCmdTool {
    fn name(&self) -> &str {
        "exec_cmd"
    }

    fn description(&self) -> &str {
        "Execute a shell command"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Shell command to execute"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Optional: timeout in seconds"
                }
            },
            "required": ["command"]
        })
    }

    async fn run(&self, args: &Map<String, Value>) -> Result<HandlerOutput, ToolError> {
        let args: ExecCmdArgs = decode(self.name(), &["command", "timeout"], args)?;

        if !self.constraints.exec_enabled() {
            return Err(ToolError::ExecDisabled);
        }

        if self.constraints.strict_exec() {
            if let Some(pattern) = Constraints::scan_shell_metacharacters(&args.command) {
                return Err(ToolError::DangerousPattern(pattern));
            }
        }

        if !self.constraints.validate_command(&args.command) {
            return Err(ToolError::CommandDenied(
                Constraints::command_name(&args.command).to_string(),
            ));
        }

        let timeout = self.constraints.effective_timeout(args.timeout);
        debug!("Executing command with {}s timeout: {}", timeout, args.command);

        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(&args.command)
            .current_dir(self.constraints.allowed_root())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let result = tokio::time::timeout(Duration::from_secs(timeout), command.output()).await;

        match result {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

                let mut combined = stdout;
                if !stderr.is_empty() {
                    let stderr = self
                        .constraints
                        .truncate_output(&stderr, self.constraints.max_stderr_size());
                    combined.push_str("\n[stderr]\n");
                    combined.push_str(&stderr);
                }
                let combined = self
                    .constraints
                    .truncate_output(&combined, self.constraints.max_output_size());

                Ok(HandlerOutput::new(combined)
                    .with_exit_code(output.status.code().unwrap_or(-1)))
            }
            Ok(Err(e)) => Err(ToolError::Exec(e.to_string())),
            Err(_) => Err(ToolError::Timeout(timeout)),
        }
    }
}
