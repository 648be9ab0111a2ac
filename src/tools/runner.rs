//! Tool runner - dispatch planner tool calls under the constraints envelope
//!
//! Maps tool calls over the registry, times every invocation, translates
//! handler outcomes into uniform `ToolResult`s (`success` iff `error` is
//! empty), and mirrors each call to the audit log regardless of outcome.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::registry::ToolRegistry;
use crate::audit::AuditLog;
use crate::state::{ToolCall, ToolResult};

/// Executes the Planner's tool calls against the registry
pub struct ToolRunner {
    registry: ToolRegistry,
    audit: Option<Arc<AuditLog>>,
}

impl ToolRunner {
    /// Create a runner over a registry
    pub fn new(registry: ToolRegistry, audit: Option<Arc<AuditLog>>) -> Self {
        ToolRunner { registry, audit }
    }

    /// The underlying registry
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute a sequence of tool calls in order
    pub async fn execute_calls(&self, calls: &[ToolCall], loop_id: u32) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.execute_single(call, loop_id).await);
        }
        results
    }

    /// Execute a single tool call
    pub async fn execute_single(&self, call: &ToolCall, loop_id: u32) -> ToolResult {
        let start = Instant::now();

        let Some(tool) = self.registry.get(&call.tool_name) else {
            let result = ToolResult::failure(
                &call.tool_name,
                format!("Unknown tool: {}", call.tool_name),
            );
            warn!("Unknown tool requested: {}", call.tool_name);
            self.log(loop_id, call, &result);
            return result;
        };

        info!("Executing tool: {} (loop {})", call.tool_name, loop_id);
        debug!(
            "Tool {} arguments: {}",
            call.tool_name,
            serde_json::Value::Object(call.args.clone())
        );

        let outcome = tool.run(&call.args).await;
        let duration_sec = start.elapsed().as_secs_f64();

        let result = match outcome {
            Ok(handler) => {
                debug!(
                    "Tool {} succeeded in {:.2}s, output length {}",
                    call.tool_name,
                    duration_sec,
                    handler.output.len()
                );
                ToolResult::success(&call.tool_name, handler.output)
                    .with_exit_code(handler.exit_code)
                    .with_duration(duration_sec)
            }
            Err(error) => {
                warn!("Tool {} failed: {}", call.tool_name, error);
                ToolResult::failure(&call.tool_name, error.to_string())
                    .with_exit_code(error.exit_code())
                    .with_duration(duration_sec)
            }
        };

        self.log(loop_id, call, &result);
        result
    }

    fn log(&self, loop_id: u32, call: &ToolCall, result: &ToolResult) {
        if let Some(ref audit) = self.audit {
            audit.log_tool_call(loop_id, call, result);
        }
    }
}
