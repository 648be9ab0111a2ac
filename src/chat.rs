//! Conversational facade - single linear transcript per user
//!
//! An alternative driver for chat-style usage. Unlike the agent loop it
//! keeps one persistent message list per user key and feeds tool results
//! back into the transcript. Tool calls are taken from the model's native
//! `tool_calls` array when present; otherwise the assistant text is scanned
//! for free-text `TOOL_CALL: { … }` blocks. Exactly one of the two paths
//! runs per reply.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::audit::AuditLog;
use crate::config::{Config, DebugLevel};
use crate::constraints::Constraints;
use crate::error::{Error, Result};
use crate::provider::{Message, VllmClient};
use crate::scan;
use crate::state::{ToolCall, ToolResult};
use crate::tools::{ToolRegistry, ToolRunner};

/// Tool-call round-trips allowed per user message
const MAX_ITERATIONS: u32 = 5;

/// Chat driver keeping one linear transcript per user
pub struct ChatAgent {
    client: VllmClient,
    tool_runner: ToolRunner,
    enable_function_calling: bool,
    system_prompt: String,
    transcripts: HashMap<String, Vec<Message>>,
}

impl ChatAgent {
    /// Assemble a chat agent from configuration
    pub fn new(config: Config) -> Result<Self> {
        let audit = if config.audit.enabled {
            let log = AuditLog::open(&config.audit.log_path)?;
            let log = if config.debug.level == DebugLevel::Verbose {
                log.with_full_fidelity()
            } else {
                log
            };
            Some(Arc::new(log))
        } else {
            None
        };

        let constraints = Arc::new(Constraints::new(&config.workspace.dir, &config.security)?);
        let registry = ToolRegistry::with_workspace_tools(constraints);
        let system_prompt = compose_system_prompt(&config, &registry.catalog_text());
        let tool_runner = ToolRunner::new(registry, audit);

        Ok(ChatAgent {
            client: VllmClient::new(&config.vllm)?,
            tool_runner,
            enable_function_calling: config.vllm.enable_function_calling,
            system_prompt,
            transcripts: HashMap::new(),
        })
    }

    /// Handle one user message, running tool rounds until the model replies
    /// without calls or the iteration bound is hit.
    pub async fn chat(&mut self, user_id: &str, text: &str) -> Result<String> {
        let system_prompt = self.system_prompt.clone();
        self.transcripts
            .entry(user_id.to_string())
            .or_insert_with(|| vec![Message::system(system_prompt)])
            .push(Message::user(text));

        for iteration in 1..=MAX_ITERATIONS {
            info!("Chat iteration {}/{} for user {}", iteration, MAX_ITERATIONS, user_id);

            let messages = self.transcripts[user_id].clone();
            let tools = if self.enable_function_calling {
                Some(self.tool_runner.registry().definitions())
            } else {
                None
            };

            let response = self.client.chat_completion(messages, tools, false).await?;
            let message = response
                .choices
                .first()
                .map(|c| c.message.clone())
                .ok_or_else(|| Error::ModelMalformed("response has no choices".to_string()))?;

            // Native function calling wins; the content is not re-scanned.
            let native_calls = VllmClient::native_tool_calls(&response);
            if !native_calls.is_empty() {
                debug!("Model made {} native tool calls", native_calls.len());
                let transcript = self.transcripts.get_mut(user_id).unwrap();
                transcript.push(message);

                for native in &native_calls {
                    let args = match serde_json::from_str(&native.function.arguments) {
                        Ok(serde_json::Value::Object(args)) => args,
                        Ok(_) | Err(_) => {
                            warn!(
                                "Unparseable arguments for {}: {}",
                                native.function.name, native.function.arguments
                            );
                            serde_json::Map::new()
                        }
                    };
                    let call = ToolCall::new(&native.function.name, args);
                    let result = self.tool_runner.execute_single(&call, iteration).await;
                    self.transcripts
                        .get_mut(user_id)
                        .unwrap()
                        .push(Message::tool(&native.id, render_result(&result)));
                }
                continue;
            }

            let content = message.content_str().to_string();

            // Free-text fallback path
            let parsed = scan::extract_tool_call_blocks(&content);
            if parsed.is_empty() {
                self.transcripts
                    .get_mut(user_id)
                    .unwrap()
                    .push(Message::assistant(content.clone()));
                return Ok(content);
            }

            debug!("Parsed {} free-text tool calls", parsed.len());
            self.transcripts
                .get_mut(user_id)
                .unwrap()
                .push(Message::assistant(content));

            for parsed_call in parsed {
                let call = ToolCall::new(&parsed_call.name, parsed_call.args);
                let result = self.tool_runner.execute_single(&call, iteration).await;
                // Free-text models see tool output as a user turn
                self.transcripts.get_mut(user_id).unwrap().push(Message::user(format!(
                    "Tool result for {}:\n{}",
                    parsed_call.name,
                    render_result(&result)
                )));
            }
        }

        Ok(format!(
            "Reached maximum tool iterations ({MAX_ITERATIONS}). Please try a more specific request."
        ))
    }

    /// Drop a user's transcript
    pub fn reset(&mut self, user_id: &str) {
        self.transcripts.remove(user_id);
    }

    /// Number of messages in a user's transcript
    pub fn transcript_len(&self, user_id: &str) -> usize {
        self.transcripts.get(user_id).map(|t| t.len()).unwrap_or(0)
    }
}

/// Compose the facade system message from the static config strings
fn compose_system_prompt(config: &Config, tool_catalog: &str) -> String {
    format!(
        "{role}\n\n{workspace_note}\n{tools_note}\n\n\
         Available tools:\n{tool_catalog}\n\n\
         When you need a tool and native function calling is unavailable, reply with a block of the form:\n\
         TOOL_CALL: {{\"name\": \"<tool_name>\", \"args\": {{ ... }}}}",
        role = config.system_prompt.role,
        workspace_note = config.system_prompt.workspace_note,
        tools_note = config.system_prompt.tools_note,
    )
}

/// Render a tool result for the transcript
fn render_result(result: &ToolResult) -> String {
    if result.success {
        if result.output.is_empty() {
            "(no output)".to_string()
        } else {
            result.output.clone()
        }
    } else {
        format!("Error: {}", result.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_result() {
        assert_eq!(
            render_result(&ToolResult::success("list_dir", "a.txt")),
            "a.txt"
        );
        assert_eq!(render_result(&ToolResult::success("exec_cmd", "")), "(no output)");
        assert_eq!(
            render_result(&ToolResult::failure("read_file", "File not found: x")),
            "Error: File not found: x"
        );
    }

    #[test]
    fn test_compose_system_prompt_sections() {
        let config = Config::default();
        let prompt = compose_system_prompt(&config, "1. list_dir");
        assert!(prompt.contains(&config.system_prompt.role));
        assert!(prompt.contains("Available tools:\n1. list_dir"));
        assert!(prompt.contains("TOOL_CALL:"));
    }
}
