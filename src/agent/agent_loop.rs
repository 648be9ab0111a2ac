//! Agent loop - the bounded Planner → ToolRunner → Responder driver
//!
//! Runs up to `max_loops` iterations per request, checking termination
//! heuristics after each one. Any step failure aborts the request with a
//! user-visible error naming the loop; hitting the bound synthesizes a
//! terminal summary of discovered facts and remaining tasks.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::agent::planner::{PlanSource, Planner};
use crate::agent::responder::{Responder, ResponseSource};
use crate::audit::AuditLog;
use crate::error::Result;
use crate::memory::Memory;
use crate::state::{AgentState, PlannerOutput, ResponderOutput};
use crate::tools::ToolRunner;

/// Stats over one completed (or aborted) request
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionSummary {
    pub total_loops: u32,
    pub max_loops: u32,
    pub facts_discovered: usize,
    pub remaining_tasks: usize,
    pub completed: bool,
    pub tool_calls_total: usize,
    pub tool_success_rate: f64,
}

/// The bounded orchestration loop.
///
/// Owns the per-request state and the long-term memory; the planner and
/// responder borrow both for the duration of one call.
pub struct AgentLoop<P = Planner, R = Responder>
where
    P: PlanSource,
    R: ResponseSource,
{
    planner: P,
    tool_runner: ToolRunner,
    responder: R,
    memory: Memory,
    state: AgentState,
    audit: Option<Arc<AuditLog>>,
    max_loops: u32,
    loop_wait: Duration,
}

impl<P, R> AgentLoop<P, R>
where
    P: PlanSource,
    R: ResponseSource,
{
    /// Assemble a loop from its collaborators
    pub fn new(
        planner: P,
        tool_runner: ToolRunner,
        responder: R,
        memory: Memory,
        audit: Option<Arc<AuditLog>>,
        max_loops: u32,
        loop_wait_sec: f64,
    ) -> Self {
        AgentLoop {
            planner,
            tool_runner,
            responder,
            memory,
            state: AgentState::new(),
            audit,
            max_loops,
            loop_wait: Duration::from_secs_f64(loop_wait_sec),
        }
    }

    /// The per-request state
    pub fn state(&self) -> &AgentState {
        &self.state
    }

    /// Mutable access to the per-request state
    pub fn state_mut(&mut self) -> &mut AgentState {
        &mut self.state
    }

    /// The long-term memory
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Mutable access to the long-term memory
    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    /// Execute the loop for one request.
    ///
    /// Always returns a user-visible string: the final answer, an error
    /// response naming the failed loop, or the max-loop terminal summary.
    pub async fn run(&mut self, user_request: &str) -> String {
        self.state.reset(user_request);
        self.state.max_loops = self.max_loops;

        for loop_id in 1..=self.max_loops {
            info!("Agent loop iteration {}/{}", loop_id, self.max_loops);

            match self.run_iteration(user_request, loop_id).await {
                Ok(Some(response)) => return response,
                Ok(None) => {
                    if loop_id < self.max_loops {
                        tokio::time::sleep(self.loop_wait).await;
                    }
                }
                Err(e) => {
                    warn!("Error in loop {}: {}", loop_id, e);
                    if let Some(ref audit) = self.audit {
                        audit.log_error(
                            loop_id,
                            "LoopError",
                            &e.to_string(),
                            serde_json::json!({"user_request": user_request}),
                        );
                    }
                    return self.error_response(&e.to_string(), loop_id);
                }
            }
        }

        self.limit_response()
    }

    /// One Planner → ToolRunner → Responder pass.
    ///
    /// Returns `Some(response)` when a stop condition holds.
    async fn run_iteration(&mut self, user_request: &str, loop_id: u32) -> Result<Option<String>> {
        self.state.start_loop(loop_id);

        let plan = self
            .planner
            .plan(user_request, &self.memory, &self.state)
            .await?;
        self.state.add_planner_output(plan.clone());

        let tool_results = if plan.need_tools && !plan.tool_calls.is_empty() {
            let results = self
                .tool_runner
                .execute_calls(&plan.tool_calls, loop_id)
                .await;
            self.state.add_tool_results(results.clone());
            results
        } else {
            Vec::new()
        };

        let responder_output = self
            .responder
            .respond(user_request, &tool_results, loop_id, &self.memory, &self.state)
            .await?;
        self.state.add_responder_output(responder_output.clone());

        if self.should_stop(&plan, &responder_output) {
            Ok(Some(responder_output.response))
        } else {
            Ok(None)
        }
    }

    /// Stop when the planner needs no tools, the responder produced a final
    /// answer, or nothing remains to do and facts were gathered.
    fn should_stop(&self, plan: &PlannerOutput, responder_output: &ResponderOutput) -> bool {
        if !plan.need_tools {
            return true;
        }

        if responder_output.is_final_answer {
            return true;
        }

        self.state.remaining_tasks.is_empty() && !self.state.facts.is_empty()
    }

    /// Terminal summary when the loop bound is reached
    fn limit_response(&self) -> String {
        let mut parts = vec![
            format!(
                "Reached maximum loop limit ({} iterations).",
                self.max_loops
            ),
            String::new(),
            "Summary of findings:".to_string(),
        ];

        if self.state.facts.is_empty() {
            parts.push("  (No facts discovered)".to_string());
        } else {
            parts.push("\nFacts discovered:".to_string());
            for fact in &self.state.facts {
                parts.push(format!("  - {fact}"));
            }
        }

        if self.state.remaining_tasks.is_empty() {
            parts.push("\nAll tasks completed!".to_string());
        } else {
            parts.push("\nRemaining tasks:".to_string());
            for task in &self.state.remaining_tasks {
                parts.push(format!("  - {task}"));
            }
            parts.push(String::new());
            parts.push("Please review the audit log for more details.".to_string());
        }

        parts.join("\n")
    }

    /// User-visible error naming the loop that failed
    fn error_response(&self, error_msg: &str, loop_id: u32) -> String {
        format!(
            "Error occurred during execution (Loop {}):\n{}\n\nPlease check the audit log for details.\nDiscovered facts so far: {}\n",
            loop_id,
            error_msg,
            self.state.facts.len()
        )
    }

    /// Stats over the request that just ran
    pub fn execution_summary(&self) -> ExecutionSummary {
        let all_results: Vec<_> = self
            .state
            .history
            .iter()
            .flat_map(|record| record.tool_results.iter())
            .collect();

        let tool_success_rate = if all_results.is_empty() {
            0.0
        } else {
            all_results.iter().filter(|r| r.success).count() as f64 / all_results.len() as f64
        };

        ExecutionSummary {
            total_loops: self.state.loop_count,
            max_loops: self.max_loops,
            facts_discovered: self.state.facts.len(),
            remaining_tasks: self.state.remaining_tasks.len(),
            completed: self.state.remaining_tasks.is_empty(),
            tool_calls_total: all_results.len(),
            tool_success_rate,
        }
    }

    /// Multi-line execution summary for CLI output
    pub fn summary_text(&self) -> String {
        let summary = self.execution_summary();
        let mut lines = vec![
            format!(
                "Loops executed: {}/{}",
                summary.total_loops, summary.max_loops
            ),
            format!("Facts discovered: {}", summary.facts_discovered),
            format!("Remaining tasks: {}", summary.remaining_tasks),
            format!(
                "Completed: {}",
                if summary.completed { "Yes" } else { "No" }
            ),
            format!("Tool calls: {}", summary.tool_calls_total),
        ];
        if summary.tool_calls_total > 0 {
            lines.push(format!(
                "Tool success rate: {:.1}%",
                summary.tool_success_rate * 100.0
            ));
        }
        lines.join("\n")
    }
}
