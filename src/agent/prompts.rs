//! Prompt assembly for the Planner and Responder roles

use crate::state::{AgentState, ToolResult};

/// Character budget for the memory context block
pub const MEMORY_CONTEXT_BUDGET: usize = 2000;

/// Recent loops summarized into the planner prompt
pub const HISTORY_SUMMARY_LOOPS: usize = 3;

/// Fixed user message appended after the planner system prompt
pub const PLANNER_USER_MESSAGE: &str = "Generate a plan by responding with valid JSON.";

/// Fixed user message appended after the responder system prompt
pub const RESPONDER_USER_MESSAGE: &str =
    "Generate a natural language response based on the tool results above.";

const PLANNER_INSTRUCTIONS: &str = r#"You are a planning agent for an OS automation system.

Your role is to decide what tools to call next based on:
1. The user's request
2. Your long-term memory (preferences, environment, decisions)
3. The current state (facts gathered, tasks remaining, loop history)

Output MUST be valid JSON with this exact structure:
{
  "need_tools": boolean,
  "tool_calls": [
    {"tool_name": "...", "args": {...}},
    ...
  ],
  "reason_brief": "string (max 300 chars)",
  "stop_condition": "string - what signals completion?"
}

RULES:
1. If no tools needed (e.g., can answer from memory), set need_tools=false and leave tool_calls empty
2. Only call tools that are available (see list below)
3. Prevent infinite loops: check history, don't repeat same calls
4. Be concise in reason_brief
5. Always output valid JSON, never include explanations outside JSON

FORBIDDEN:
- Making assumptions beyond what tools return
- Suggesting destructive operations without explicit user consent
- Calling tools in wrong order (dependencies matter)"#;

const RESPONDER_INSTRUCTIONS: &str = r#"You are a response agent for an OS automation system.

Your role is to explain the results of executed tools to the user in clear, natural language.
Keep responses SHORT and EASY TO READ.

RULES:
1. Only state facts from the tool results below
2. If tool execution failed, explain why briefly
3. Be VERY CONCISE - avoid unnecessary words
4. Use bullet points or numbered lists for clarity
5. Do NOT make assumptions beyond what tools returned
6. Do NOT speculate about system state
7. Respond in the same language as the user

OUTPUT FORMAT (choose the most appropriate):
If showing file/directory listing:
  - List items with bullet points, one per line, no extra explanation
If showing command output:
  - Show the output directly, brief explanation only if needed
If tool failed:
  - State what was attempted, why it failed, and 1-2 fix options

IMPORTANT: Keep it SHORT. One paragraph maximum unless complex."#;

/// Build the planner system prompt
pub fn planner_system_prompt(
    tool_catalog: &str,
    memory_context: &str,
    state: &AgentState,
    user_request: &str,
) -> String {
    let current_goal = state
        .remaining_tasks
        .first()
        .map(|s| s.as_str())
        .unwrap_or("Complete the request");

    format!(
        "{PLANNER_INSTRUCTIONS}\n\n\
         Available Tools:\n{tool_catalog}\n\n\
         Long-term Memory (preferences, environment, repeated decisions):\n{memory_context}\n\n\
         Current State (loop progress, facts, remaining tasks):\n{state_context}\n\n\
         {history}\n\n\
         User Request (original):\n{user_request}\n\n\
         Current Goal: {current_goal}\n\n\
         Output your JSON response:",
        state_context = state.to_context(),
        history = state.history_summary(HISTORY_SUMMARY_LOOPS),
    )
}

/// Build the responder system prompt
pub fn responder_system_prompt(
    memory_context: &str,
    state: &AgentState,
    tool_results: &[ToolResult],
    user_request: &str,
) -> String {
    let current_goal = state
        .remaining_tasks
        .first()
        .map(|s| s.as_str())
        .unwrap_or("Complete the request");

    format!(
        "{RESPONDER_INSTRUCTIONS}\n\n\
         User's Memory (preferences, environment, history):\n{memory_context}\n\n\
         Current State:\n{state_context}\n\n\
         Facts gathered so far: {facts}\n\
         Remaining tasks: {tasks}\n\n\
         {results}\n\n\
         Original User Request:\n{user_request}\n\n\
         User's Goal: {current_goal}\n\n\
         Generate your response:",
        state_context = state.to_context(),
        facts = state.facts.len(),
        tasks = state.remaining_tasks.len(),
        results = format_tool_results(tool_results),
    )
}

/// Render the loop's tool results for the responder prompt
pub fn format_tool_results(tool_results: &[ToolResult]) -> String {
    if tool_results.is_empty() {
        return "No tools were executed in this loop.".to_string();
    }

    let mut lines = vec!["Tool Execution Results (Loop):".to_string()];

    for (index, result) in tool_results.iter().enumerate() {
        lines.push(format!("\n{}. {}", index + 1, result.tool_name));

        if result.success {
            lines.push("   Status: ✓ Success".to_string());

            let total = result.output.chars().count();
            let mut shown: String = result.output.chars().take(200).collect();
            if total > 200 {
                shown.push_str(&format!("... ({} more chars)", total - 200));
            }
            lines.push(format!("   Output: {shown}"));
        } else {
            lines.push("   Status: ✗ Failed".to_string());
            lines.push(format!("   Error: {}", result.error));
        }

        if result.duration_sec > 0.0 {
            lines.push(format!("   Duration: {:.2}s", result.duration_sec));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planner_prompt_contains_sections() {
        let mut state = AgentState::new();
        state.add_task("count files");

        let prompt = planner_system_prompt("1. list_dir", "(No memory yet)", &state, "count them");
        assert!(prompt.contains("Available Tools:\n1. list_dir"));
        assert!(prompt.contains("(No memory yet)"));
        assert!(prompt.contains("User Request (original):\ncount them"));
        assert!(prompt.contains("Current Goal: count files"));
        assert!(prompt.contains("need_tools"));
    }

    #[test]
    fn test_planner_prompt_default_goal() {
        let state = AgentState::new();
        let prompt = planner_system_prompt("", "", &state, "x");
        assert!(prompt.contains("Current Goal: Complete the request"));
    }

    #[test]
    fn test_format_tool_results_empty() {
        assert_eq!(
            format_tool_results(&[]),
            "No tools were executed in this loop."
        );
    }

    #[test]
    fn test_format_tool_results_success_and_failure() {
        let results = vec![
            ToolResult::success("list_dir", "a.txt\nb.txt").with_duration(0.12),
            ToolResult::failure("exec_cmd", "Command not allowed: rm"),
        ];

        let block = format_tool_results(&results);
        assert!(block.contains("1. list_dir"));
        assert!(block.contains("Status: ✓ Success"));
        assert!(block.contains("Duration: 0.12s"));
        assert!(block.contains("2. exec_cmd"));
        assert!(block.contains("Status: ✗ Failed"));
        assert!(block.contains("Error: Command not allowed: rm"));
    }

    #[test]
    fn test_format_tool_results_long_output_preview() {
        let results = vec![ToolResult::success("read_file", "x".repeat(450))];
        let block = format_tool_results(&results);
        assert!(block.contains("... (250 more chars)"));
    }
}
