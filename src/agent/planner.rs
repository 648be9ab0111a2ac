//! Planner - the tool-selection LLM role
//!
//! Builds a system prompt from memory, state, and the tool catalog, queries
//! the model, and parses a strict JSON decision. A reply that is missing the
//! required fields aborts the request with `PlannerInvalidOutput`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::agent::prompts::{self, MEMORY_CONTEXT_BUDGET, PLANNER_USER_MESSAGE};
use crate::audit::AuditLog;
use crate::error::{Error, Result};
use crate::memory::Memory;
use crate::provider::{Message, VllmClient};
use crate::scan;
use crate::state::{AgentState, PlannerOutput, ToolCall};

/// Cap on `reason_brief`, characters
const REASON_BRIEF_LIMIT: usize = 300;

/// Source of planner decisions; implemented by [`Planner`] and by test mocks
#[async_trait]
pub trait PlanSource: Send + Sync {
    /// Decide the next tool calls for the request
    async fn plan(
        &self,
        user_request: &str,
        memory: &Memory,
        state: &AgentState,
    ) -> Result<PlannerOutput>;
}

/// LLM-backed planner
pub struct Planner {
    client: VllmClient,
    /// Rendered tool catalog included in every prompt
    tool_catalog: String,
    audit: Option<Arc<AuditLog>>,
}

impl Planner {
    /// Create a planner over a model client and a rendered tool catalog
    pub fn new(client: VllmClient, tool_catalog: String, audit: Option<Arc<AuditLog>>) -> Self {
        Planner {
            client,
            tool_catalog,
            audit,
        }
    }

    /// Check whether the candidate calls repeat the previous loop's calls
    /// elementwise (name and args).
    ///
    /// Advisory only; the hard protection is the max-loop bound.
    pub fn check_repeated_calls(state: &AgentState, candidate: &[ToolCall]) -> bool {
        if candidate.is_empty() {
            return false;
        }

        let Some(previous) = state
            .history
            .last()
            .and_then(|record| record.planner_output.as_ref())
        else {
            return false;
        };

        previous.tool_calls == candidate
    }

    fn parse_output(&self, response_text: &str) -> Result<PlannerOutput> {
        let json_str = scan::extract_first_object(response_text)
            .unwrap_or_else(|| response_text.trim());

        let data: Value = serde_json::from_str(json_str).map_err(|e| {
            Error::PlannerInvalidOutput(format!(
                "{}; response: {}",
                e,
                clip(response_text, 500)
            ))
        })?;

        let Some(need_tools) = data.get("need_tools").and_then(|v| v.as_bool()) else {
            return Err(Error::PlannerInvalidOutput(
                "Missing 'need_tools' field".to_string(),
            ));
        };

        let mut tool_calls = Vec::new();
        if need_tools {
            let empty = Vec::new();
            let raw_calls = match data.get("tool_calls") {
                None => &empty,
                Some(Value::Array(calls)) => calls,
                Some(_) => {
                    return Err(Error::PlannerInvalidOutput(
                        "'tool_calls' must be a list".to_string(),
                    ))
                }
            };

            for raw in raw_calls {
                let Some(object) = raw.as_object() else {
                    return Err(Error::PlannerInvalidOutput(
                        "Each tool call must be an object".to_string(),
                    ));
                };
                let Some(tool_name) = object.get("tool_name").and_then(|v| v.as_str()) else {
                    return Err(Error::PlannerInvalidOutput(
                        "Each tool call must have 'tool_name'".to_string(),
                    ));
                };
                let args = match object.get("args") {
                    None | Some(Value::Null) => serde_json::Map::new(),
                    Some(Value::Object(args)) => args.clone(),
                    Some(_) => {
                        return Err(Error::PlannerInvalidOutput(
                            "'args' must be an object".to_string(),
                        ))
                    }
                };
                tool_calls.push(ToolCall::new(tool_name, args));
            }
        }

        let reason_brief = clip(
            data.get("reason_brief").and_then(|v| v.as_str()).unwrap_or(""),
            REASON_BRIEF_LIMIT,
        );
        let stop_condition = data
            .get("stop_condition")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        Ok(PlannerOutput {
            need_tools,
            tool_calls,
            reason_brief,
            stop_condition,
            raw_response: response_text.to_string(),
        })
    }
}

#[async_trait]
impl PlanSource for Planner {
    async fn plan(
        &self,
        user_request: &str,
        memory: &Memory,
        state: &AgentState,
    ) -> Result<PlannerOutput> {
        let system_prompt = prompts::planner_system_prompt(
            &self.tool_catalog,
            &memory.to_context(MEMORY_CONTEXT_BUDGET),
            state,
            user_request,
        );

        let messages = vec![
            Message::system(system_prompt),
            Message::user(PLANNER_USER_MESSAGE),
        ];

        let response = match self.client.chat_completion(messages, None, false).await {
            Ok(response) => response,
            Err(e) => {
                if let Some(ref audit) = self.audit {
                    audit.log_error(
                        state.loop_count,
                        "PlannerLLMError",
                        &e.to_string(),
                        serde_json::json!({"user_request": user_request}),
                    );
                }
                return Err(e);
            }
        };

        let response_text = VllmClient::message_text(&response)?;
        debug!("Planner raw reply: {}", clip(&response_text, 500));

        let output = self.parse_output(&response_text)?;

        if Self::check_repeated_calls(state, &output.tool_calls) {
            debug!("Planner repeated the previous loop's tool calls");
        }

        if let Some(ref audit) = self.audit {
            audit.log_planner_decision(state.loop_count, &output);
        }

        Ok(output)
    }
}

fn clip(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
