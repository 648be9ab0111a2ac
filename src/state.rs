//! Short-term per-request state
//!
//! Tracks the progress of a single request through the agent loop: the loop
//! counter, one `LoopRecord` per iteration, accumulated facts, the pending
//! task list, and the last tool results. Owned by the agent loop; the
//! Planner and Responder borrow it read-only while building prompts.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A tool call produced by the Planner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool name (one of the six registered tools)
    pub tool_name: String,
    /// Arguments as a JSON object
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl ToolCall {
    /// Create a tool call from a name and argument object
    pub fn new(tool_name: impl Into<String>, args: Map<String, Value>) -> Self {
        ToolCall {
            tool_name: tool_name.into(),
            args,
        }
    }
}

/// Result of one tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Name of the tool that ran
    pub tool_name: String,
    /// Whether the execution succeeded
    pub success: bool,
    /// Tool output (meaningful on success)
    #[serde(default)]
    pub output: String,
    /// Error message (meaningful on failure)
    #[serde(default)]
    pub error: String,
    /// Process exit code; 0 for successful non-exec tools
    #[serde(default)]
    pub exit_code: i32,
    /// Wall-clock duration, seconds
    #[serde(default)]
    pub duration_sec: f64,
}

impl ToolResult {
    /// Create a successful result
    pub fn success(tool_name: impl Into<String>, output: impl Into<String>) -> Self {
        ToolResult {
            tool_name: tool_name.into(),
            success: true,
            output: output.into(),
            error: String::new(),
            exit_code: 0,
            duration_sec: 0.0,
        }
    }

    /// Create a failed result
    pub fn failure(tool_name: impl Into<String>, error: impl Into<String>) -> Self {
        ToolResult {
            tool_name: tool_name.into(),
            success: false,
            output: String::new(),
            error: error.into(),
            exit_code: 0,
            duration_sec: 0.0,
        }
    }

    /// Set the exit code
    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = exit_code;
        self
    }

    /// Set the duration
    pub fn with_duration(mut self, duration_sec: f64) -> Self {
        self.duration_sec = duration_sec;
        self
    }
}

/// Output from the Planner LLM
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlannerOutput {
    /// Whether tools are needed this iteration
    pub need_tools: bool,
    /// Tool calls to execute (empty when `need_tools` is false)
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    /// Brief reasoning, capped at 300 characters
    #[serde(default)]
    pub reason_brief: String,
    /// What the Planner considers the completion signal
    #[serde(default)]
    pub stop_condition: String,
    /// The raw model reply the plan was parsed from
    #[serde(skip)]
    pub raw_response: String,
}

/// Output from the Responder LLM
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponderOutput {
    /// Natural language response to the user
    pub response: String,
    /// Summary of executed operations
    #[serde(default)]
    pub summary: String,
    /// What to do next if unresolved
    #[serde(default)]
    pub next_action: String,
    /// Whether this is a final answer
    #[serde(default)]
    pub is_final_answer: bool,
}

/// Record of one iteration of the Planner-ToolRunner-Responder loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopRecord {
    /// Iteration number, starting at 1
    pub loop_id: u32,
    /// RFC 3339 timestamp of when the record was opened
    pub timestamp: String,
    /// The Planner's decision
    pub planner_output: Option<PlannerOutput>,
    /// Results from tool execution
    #[serde(default)]
    pub tool_results: Vec<ToolResult>,
    /// The Responder's reply
    pub responder_output: Option<ResponderOutput>,
}

impl LoopRecord {
    fn new(loop_id: u32) -> Self {
        LoopRecord {
            loop_id,
            timestamp: Utc::now().to_rfc3339(),
            planner_output: None,
            tool_results: Vec::new(),
            responder_output: None,
        }
    }
}

/// Short-term state for a single request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    /// Current loop number
    pub loop_count: u32,
    /// Loop cap, mirrored here for context rendering
    pub max_loops: u32,
    /// The user's original request
    pub user_request: String,
    /// One record per iteration, strictly increasing by loop id
    pub history: Vec<LoopRecord>,
    /// Facts gathered so far (de-duplicated, insertion-ordered)
    pub facts: Vec<String>,
    /// Pending tasks (de-duplicated, insertion-ordered)
    pub remaining_tasks: Vec<String>,
    /// Tool results from the most recent execution
    pub last_tool_results: Vec<ToolResult>,
    /// RFC 3339 timestamp of state creation
    pub created_at: String,
}

impl Default for AgentState {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentState {
    /// Create empty state
    pub fn new() -> Self {
        AgentState {
            loop_count: 0,
            max_loops: 5,
            user_request: String::new(),
            history: Vec::new(),
            facts: Vec::new(),
            remaining_tasks: Vec::new(),
            last_tool_results: Vec::new(),
            created_at: Utc::now().to_rfc3339(),
        }
    }

    /// Reset state for a new request, preserving nothing
    pub fn reset(&mut self, user_request: impl Into<String>) {
        self.loop_count = 0;
        self.user_request = user_request.into();
        self.history.clear();
        self.facts.clear();
        self.remaining_tasks.clear();
        self.last_tool_results.clear();
        self.created_at = Utc::now().to_rfc3339();
    }

    /// Mark the start of a new loop iteration
    pub fn start_loop(&mut self, loop_id: u32) {
        self.loop_count = loop_id;
    }

    /// Record the Planner's decision for the current loop
    pub fn add_planner_output(&mut self, output: PlannerOutput) {
        self.current_record().planner_output = Some(output);
    }

    /// Record tool execution results for the current loop
    pub fn add_tool_results(&mut self, results: Vec<ToolResult>) {
        self.last_tool_results = results.clone();
        self.current_record().tool_results = results;
    }

    /// Record the Responder's reply for the current loop
    pub fn add_responder_output(&mut self, output: ResponderOutput) {
        self.current_record().responder_output = Some(output);
    }

    /// Add a discovered fact; duplicates are ignored
    pub fn add_fact(&mut self, fact: impl Into<String>) {
        let fact = fact.into();
        if !self.facts.contains(&fact) {
            self.facts.push(fact);
        }
    }

    /// Add a pending task; duplicates are ignored
    pub fn add_task(&mut self, task: impl Into<String>) {
        let task = task.into();
        if !self.remaining_tasks.contains(&task) {
            self.remaining_tasks.push(task);
        }
    }

    /// Mark a task as completed
    pub fn complete_task(&mut self, task: &str) {
        self.remaining_tasks.retain(|t| t != task);
    }

    fn current_record(&mut self) -> &mut LoopRecord {
        let needs_new = self
            .history
            .last()
            .map(|record| record.loop_id != self.loop_count)
            .unwrap_or(true);

        if needs_new {
            self.history.push(LoopRecord::new(self.loop_count));
        }
        self.history.last_mut().unwrap()
    }

    /// Summary of recent loop history for the Planner's context
    pub fn history_summary(&self, max_loops: usize) -> String {
        let start = self.history.len().saturating_sub(max_loops);
        let recent = &self.history[start..];

        if recent.is_empty() {
            return "## Loop History (none yet)".to_string();
        }

        let mut lines = vec![format!("## Loop History (recent {} loops)", recent.len())];
        for record in recent {
            lines.push(format!("\nLoop {}:", record.loop_id));

            if let Some(ref planner) = record.planner_output {
                lines.push(format!(
                    "  Planner decision: {} (tools: {})",
                    planner.reason_brief,
                    planner.tool_calls.len()
                ));
            }

            for result in &record.tool_results {
                let status = if result.success { "✓" } else { "✗" };
                if !result.error.is_empty() {
                    lines.push(format!(
                        "  {} {}: ERROR: {}",
                        status,
                        result.tool_name,
                        preview(&result.error, 80)
                    ));
                } else {
                    let shown = if result.output.is_empty() {
                        "(no output)".to_string()
                    } else {
                        preview(&result.output, 80)
                    };
                    lines.push(format!("  {} {}: {}", status, result.tool_name, shown));
                }
            }

            if let Some(ref responder) = record.responder_output {
                lines.push(format!("  Response: {}", preview(&responder.response, 100)));
            }
        }

        lines.join("\n")
    }

    /// Render state as context for LLM prompts
    pub fn to_context(&self) -> String {
        let mut parts = vec![
            "## Current State".to_string(),
            format!("Loop: {}/{}", self.loop_count, self.max_loops),
            format!("Facts gathered: {}", self.facts.len()),
            format!("Tasks remaining: {}", self.remaining_tasks.len()),
        ];

        if !self.facts.is_empty() {
            parts.push("\n## Facts Gathered".to_string());
            let start = self.facts.len().saturating_sub(5);
            for fact in &self.facts[start..] {
                parts.push(format!("- {}", fact));
            }
        }

        if !self.remaining_tasks.is_empty() {
            parts.push("\n## Remaining Tasks".to_string());
            for task in &self.remaining_tasks {
                parts.push(format!("- {}", task));
            }
        }

        if !self.last_tool_results.is_empty() {
            parts.push("\n## Last Tool Results".to_string());
            let start = self.last_tool_results.len().saturating_sub(3);
            for result in &self.last_tool_results[start..] {
                let status = if result.success { "success" } else { "error" };
                parts.push(format!(
                    "- {}: {} - {}",
                    result.tool_name,
                    status,
                    preview(&result.output, 80)
                ));
            }
        }

        parts.join("\n")
    }

    /// Serialize state to pretty JSON for diagnostics
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }

    /// One-paragraph summary of the state
    pub fn summary(&self) -> String {
        format!(
            "State: loop {}/{}, {} facts, {} remaining tasks, {} last tool results, since {}",
            self.loop_count,
            self.max_loops,
            self.facts.len(),
            self.remaining_tasks.len(),
            self.last_tool_results.len(),
            self.created_at,
        )
    }
}

/// First `max` characters with newlines flattened to spaces
fn preview(s: &str, max: usize) -> String {
    s.chars().take(max).map(|c| if c == '\n' { ' ' } else { c }).collect()
}
