//! Responder - the natural-language response LLM role
//!
//! Converts the loop's tool results into a user-facing reply. The reply text
//! is taken verbatim from the model; final-answer classification, the
//! operation summary, and the next-action hint are derived locally.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::agent::prompts::{self, MEMORY_CONTEXT_BUDGET, RESPONDER_USER_MESSAGE};
use crate::audit::AuditLog;
use crate::error::Result;
use crate::memory::Memory;
use crate::provider::{Message, VllmClient};
use crate::state::{AgentState, ResponderOutput, ToolResult};

/// Keywords anchoring next-action extraction
const NEXT_ACTION_ANCHORS: [&str; 3] = ["next", "should", "then"];

/// Source of responder replies; implemented by [`Responder`] and test mocks
#[async_trait]
pub trait ResponseSource: Send + Sync {
    /// Generate a reply from the loop's tool results
    async fn respond(
        &self,
        user_request: &str,
        tool_results: &[ToolResult],
        loop_id: u32,
        memory: &Memory,
        state: &AgentState,
    ) -> Result<ResponderOutput>;
}

/// LLM-backed responder
pub struct Responder {
    client: VllmClient,
    audit: Option<Arc<AuditLog>>,
}

impl Responder {
    /// Create a responder over a model client
    pub fn new(client: VllmClient, audit: Option<Arc<AuditLog>>) -> Self {
        Responder { client, audit }
    }

    /// A reply is final when no tasks remain and the loop's tools did not
    /// all fail.
    fn is_final_answer(state: &AgentState, tool_results: &[ToolResult]) -> bool {
        if !state.remaining_tasks.is_empty() {
            return false;
        }

        let all_failed = !tool_results.is_empty() && tool_results.iter().all(|r| !r.success);
        !all_failed
    }

    /// Per-tool ✓/✗ summary joined by `; `
    fn extract_summary(response_text: &str, tool_results: &[ToolResult]) -> String {
        let parts: Vec<String> = tool_results
            .iter()
            .map(|result| {
                if result.success {
                    format!("✓ {} succeeded", result.tool_name)
                } else {
                    let error: String = result.error.chars().take(50).collect();
                    format!("✗ {} failed: {}", result.tool_name, error)
                }
            })
            .collect();

        if parts.is_empty() {
            response_text.chars().take(100).collect()
        } else {
            parts.join("; ")
        }
    }

    /// First keyword-anchored sentence plus its following line
    fn extract_next_action(response_text: &str) -> String {
        let lines: Vec<&str> = response_text.lines().collect();

        for (index, line) in lines.iter().enumerate() {
            let lower = line.to_lowercase();
            if NEXT_ACTION_ANCHORS.iter().any(|anchor| lower.contains(anchor)) {
                let mut picked = vec![*line];
                if let Some(following) = lines.get(index + 1) {
                    picked.push(following);
                }
                return picked.join("\n").trim().to_string();
            }
        }

        String::new()
    }
}

#[async_trait]
impl ResponseSource for Responder {
    async fn respond(
        &self,
        user_request: &str,
        tool_results: &[ToolResult],
        loop_id: u32,
        memory: &Memory,
        state: &AgentState,
    ) -> Result<ResponderOutput> {
        let system_prompt = prompts::responder_system_prompt(
            &memory.to_context(MEMORY_CONTEXT_BUDGET),
            state,
            tool_results,
            user_request,
        );

        let messages = vec![
            Message::system(system_prompt),
            Message::user(RESPONDER_USER_MESSAGE),
        ];

        let response = match self.client.chat_completion(messages, None, false).await {
            Ok(response) => response,
            Err(e) => {
                if let Some(ref audit) = self.audit {
                    audit.log_error(
                        loop_id,
                        "ResponderLLMError",
                        &e.to_string(),
                        serde_json::json!({"user_request": user_request}),
                    );
                }
                return Err(e);
            }
        };

        let response_text = VllmClient::message_text(&response)?;
        debug!("Responder reply length: {} chars", response_text.len());

        let is_final = Self::is_final_answer(state, tool_results);
        let summary = Self::extract_summary(&response_text, tool_results);
        let next_action = if is_final {
            String::new()
        } else {
            Self::extract_next_action(&response_text)
        };

        if let Some(ref audit) = self.audit {
            audit.log_responder_response(loop_id, &response_text, tool_results.len());
        }

        Ok(ResponderOutput {
            response: response_text,
            summary,
            next_action,
            is_final_answer: is_final,
        })
    }
}
