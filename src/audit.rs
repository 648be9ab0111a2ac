//! Append-only audit trail
//!
//! Every planner decision, tool invocation, responder reply, and error is
//! mirrored to a JSONL file (one JSON object per line, flushed per write)
//! and kept in memory for in-process querying. Entries are never mutated
//! after they are written. Append failures are logged, never fatal.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::Result;
use crate::state::{PlannerOutput, ToolCall, ToolResult};

/// Preview cap for outputs and errors in standard (non-verbose) sinks
const PREVIEW_LIMIT: usize = 500;

/// One audit record, tagged by `event_type` on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// A tool invocation and its outcome
    ToolCall {
        timestamp: String,
        loop_id: u32,
        tool_name: String,
        args: Value,
        output: String,
        error: String,
        exit_code: i32,
        duration_sec: f64,
        success: bool,
    },
    /// A planner decision
    PlannerDecision {
        timestamp: String,
        loop_id: u32,
        decision: Value,
        reasoning: String,
    },
    /// A responder reply
    ResponderResponse {
        timestamp: String,
        loop_id: u32,
        response_preview: String,
        tool_count_processed: usize,
    },
    /// An error event
    Error {
        timestamp: String,
        loop_id: u32,
        error_type: String,
        error_message: String,
        context: Value,
    },
}

impl AuditEvent {
    /// Loop id the event belongs to
    pub fn loop_id(&self) -> u32 {
        match self {
            AuditEvent::ToolCall { loop_id, .. }
            | AuditEvent::PlannerDecision { loop_id, .. }
            | AuditEvent::ResponderResponse { loop_id, .. }
            | AuditEvent::Error { loop_id, .. } => *loop_id,
        }
    }

    /// True when this is a tool-call record
    pub fn is_tool_call(&self) -> bool {
        matches!(self, AuditEvent::ToolCall { .. })
    }
}

/// Per-tool call statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolStats {
    pub calls: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_duration_sec: f64,
}

/// Summary over all tool-call records
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolSummary {
    pub total_calls: usize,
    pub successful: usize,
    pub failed: usize,
    pub by_tool: HashMap<String, ToolStats>,
    pub total_duration_sec: f64,
}

/// Analysis of one loop iteration
#[derive(Debug, Clone, Serialize)]
pub struct LoopAnalysis {
    pub loop_id: u32,
    pub entries_count: usize,
    pub tools_called: Vec<String>,
    pub total_duration_sec: f64,
    pub all_successful: bool,
    pub errors: Vec<(String, String)>,
}

/// Append-only JSONL audit log with in-memory querying
pub struct AuditLog {
    log_path: PathBuf,
    /// `Some(limit)` truncates output/error previews; `None` is full fidelity
    preview_limit: Option<usize>,
    entries: Mutex<Vec<AuditEvent>>,
}

impl AuditLog {
    /// Open an audit log at the given path.
    ///
    /// The parent directory is created; an existing file is appended to, not
    /// rewound. Use [`AuditLog::load_from_file`] to read prior entries.
    pub fn open(log_path: impl Into<PathBuf>) -> Result<Self> {
        let log_path = log_path.into();
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        Ok(AuditLog {
            log_path,
            preview_limit: Some(PREVIEW_LIMIT),
            entries: Mutex::new(Vec::new()),
        })
    }

    /// Switch to the full-fidelity sink: outputs and errors are written
    /// untruncated.
    pub fn with_full_fidelity(mut self) -> Self {
        self.preview_limit = None;
        self
    }

    /// Path of the JSONL file
    pub fn path(&self) -> &Path {
        &self.log_path
    }

    /// Log a tool invocation outcome
    pub fn log_tool_call(&self, loop_id: u32, call: &ToolCall, result: &ToolResult) {
        self.append(AuditEvent::ToolCall {
            timestamp: Utc::now().to_rfc3339(),
            loop_id,
            tool_name: result.tool_name.clone(),
            args: Value::Object(call.args.clone()),
            output: self.clip(&result.output),
            error: self.clip(&result.error),
            exit_code: result.exit_code,
            duration_sec: result.duration_sec,
            success: result.success,
        });
    }

    /// Log a planner decision
    pub fn log_planner_decision(&self, loop_id: u32, plan: &PlannerOutput) {
        let decision = serde_json::json!({
            "need_tools": plan.need_tools,
            "tool_calls": plan.tool_calls,
            "stop_condition": plan.stop_condition,
        });
        self.append(AuditEvent::PlannerDecision {
            timestamp: Utc::now().to_rfc3339(),
            loop_id,
            decision,
            reasoning: self.clip(&plan.reason_brief),
        });
    }

    /// Log a responder reply
    pub fn log_responder_response(&self, loop_id: u32, response: &str, tool_count: usize) {
        self.append(AuditEvent::ResponderResponse {
            timestamp: Utc::now().to_rfc3339(),
            loop_id,
            response_preview: clip_chars(response, 300),
            tool_count_processed: tool_count,
        });
    }

    /// Log an error event
    pub fn log_error(&self, loop_id: u32, error_type: &str, error_message: &str, context: Value) {
        self.append(AuditEvent::Error {
            timestamp: Utc::now().to_rfc3339(),
            loop_id,
            error_type: error_type.to_string(),
            error_message: error_message.to_string(),
            context,
        });
    }

    fn clip(&self, s: &str) -> String {
        match self.preview_limit {
            Some(limit) => clip_chars(s, limit),
            None => s.to_string(),
        }
    }

    fn append(&self, event: AuditEvent) {
        if let Err(e) = self.append_to_file(&event) {
            warn!("Failed to append to audit log: {}", e);
        }
        self.entries.lock().unwrap().push(event);
    }

    fn append_to_file(&self, event: &AuditEvent) -> std::io::Result<()> {
        let line = serde_json::to_string(event)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()
    }

    /// Get entries, optionally filtered by loop id
    pub fn get_entries(&self, loop_id: Option<u32>) -> Vec<AuditEvent> {
        let entries = self.entries.lock().unwrap();
        match loop_id {
            None => entries.clone(),
            Some(id) => entries.iter().filter(|e| e.loop_id() == id).cloned().collect(),
        }
    }

    /// Get the last `n` entries
    pub fn last_entries(&self, n: usize) -> Vec<AuditEvent> {
        let entries = self.entries.lock().unwrap();
        let start = entries.len().saturating_sub(n);
        entries[start..].to_vec()
    }

    /// Number of in-memory entries
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Whether the in-memory log is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the in-memory entries with the contents of the JSONL file.
    ///
    /// Unparseable lines are skipped with a warning.
    pub fn load_from_file(&self) {
        if !self.log_path.exists() {
            return;
        }

        let content = match std::fs::read_to_string(&self.log_path) {
            Ok(c) => c,
            Err(e) => {
                warn!("Failed to load audit log: {}", e);
                return;
            }
        };

        let mut loaded = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditEvent>(line) {
                Ok(event) => loaded.push(event),
                Err(e) => warn!("Skipping unparseable audit line: {}", e),
            }
        }

        *self.entries.lock().unwrap() = loaded;
    }

    /// Summary over all tool-call records (entries tagged `tool_call`)
    pub fn tool_summary(&self) -> ToolSummary {
        let mut summary = ToolSummary::default();

        for event in self.entries.lock().unwrap().iter() {
            let AuditEvent::ToolCall {
                tool_name,
                success,
                duration_sec,
                ..
            } = event
            else {
                continue;
            };

            summary.total_calls += 1;
            summary.total_duration_sec += duration_sec;
            if *success {
                summary.successful += 1;
            } else {
                summary.failed += 1;
            }

            let stats = summary.by_tool.entry(tool_name.clone()).or_default();
            stats.calls += 1;
            stats.total_duration_sec += duration_sec;
            if *success {
                stats.successful += 1;
            } else {
                stats.failed += 1;
            }
        }

        summary
    }

    /// Analyze one loop's execution
    pub fn analyze_loop(&self, loop_id: u32) -> LoopAnalysis {
        let entries = self.get_entries(Some(loop_id));

        let mut analysis = LoopAnalysis {
            loop_id,
            entries_count: entries.len(),
            tools_called: Vec::new(),
            total_duration_sec: 0.0,
            all_successful: true,
            errors: Vec::new(),
        };

        for event in &entries {
            let AuditEvent::ToolCall {
                tool_name,
                success,
                duration_sec,
                error,
                ..
            } = event
            else {
                continue;
            };

            if !analysis.tools_called.contains(tool_name) {
                analysis.tools_called.push(tool_name.clone());
            }
            analysis.total_duration_sec += duration_sec;
            if !success {
                analysis.all_successful = false;
                analysis.errors.push((tool_name.clone(), error.clone()));
            }
        }

        analysis
    }

    /// Export a human-readable summary
    pub fn export_summary(&self) -> String {
        let summary = self.tool_summary();
        let mut lines = vec![
            "=== Audit Log Summary ===".to_string(),
            format!("Total tool calls: {}", summary.total_calls),
            format!("Successful: {}", summary.successful),
            format!("Failed: {}", summary.failed),
            format!("Total duration: {:.2}s", summary.total_duration_sec),
            String::new(),
            "By Tool:".to_string(),
        ];

        let mut names: Vec<_> = summary.by_tool.keys().collect();
        names.sort();
        for name in names {
            let stats = &summary.by_tool[name];
            lines.push(format!(
                "  {}: {} calls ({}✓ {}✗) {:.2}s",
                name, stats.calls, stats.successful, stats.failed, stats.total_duration_sec
            ));
        }

        lines.join("\n")
    }

    /// Clear the in-memory entries and delete the JSONL file
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
        if self.log_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.log_path) {
                warn!("Failed to remove audit log file: {}", e);
            }
        }
    }
}

/// First `max` characters of a string
fn clip_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn tool_call(name: &str) -> ToolCall {
        ToolCall::new(name, serde_json::Map::new())
    }

    #[test]
    fn test_entries_appear_in_order() {
        let dir = tempdir().unwrap();
        let log = AuditLog::open(dir.path().join("runlog.jsonl")).unwrap();

        let plan = PlannerOutput {
            need_tools: true,
            ..PlannerOutput::default()
        };
        log.log_planner_decision(1, &plan);
        log.log_tool_call(1, &tool_call("list_dir"), &ToolResult::success("list_dir", "a"));
        log.log_responder_response(1, "done", 1);

        let entries = log.get_entries(Some(1));
        assert_eq!(entries.len(), 3);
        assert!(matches!(entries[0], AuditEvent::PlannerDecision { .. }));
        assert!(matches!(entries[1], AuditEvent::ToolCall { .. }));
        assert!(matches!(entries[2], AuditEvent::ResponderResponse { .. }));
    }

    #[test]
    fn test_load_from_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("runlog.jsonl");
        let log = AuditLog::open(&path).unwrap();

        for loop_id in 1..=3 {
            log.log_tool_call(
                loop_id,
                &tool_call("grep"),
                &ToolResult::success("grep", "match"),
            );
        }

        let reloaded = AuditLog::open(&path).unwrap();
        assert!(reloaded.is_empty());
        reloaded.load_from_file();
        assert_eq!(reloaded.len(), 3);
        assert_eq!(reloaded.get_entries(Some(2)).len(), 1);
    }

    #[test]
    fn test_tool_call_event_type_tag() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("runlog.jsonl");
        let log = AuditLog::open(&path).unwrap();
        log.log_tool_call(1, &tool_call("read_file"), &ToolResult::success("read_file", "x"));

        let line = std::fs::read_to_string(&path).unwrap();
        let value: Value = serde_json::from_str(line.lines().next().unwrap()).unwrap();
        assert_eq!(value["event_type"], "tool_call");
    }

    #[test]
    fn test_preview_truncation_and_full_fidelity() {
        let dir = tempdir().unwrap();
        let log = AuditLog::open(dir.path().join("a.jsonl")).unwrap();
        let long_output = "x".repeat(2000);
        log.log_tool_call(
            1,
            &tool_call("read_file"),
            &ToolResult::success("read_file", long_output.clone()),
        );
        match &log.get_entries(None)[0] {
            AuditEvent::ToolCall { output, .. } => assert_eq!(output.len(), 500),
            _ => panic!("expected tool call"),
        }

        let verbose = AuditLog::open(dir.path().join("b.jsonl"))
            .unwrap()
            .with_full_fidelity();
        verbose.log_tool_call(
            1,
            &tool_call("read_file"),
            &ToolResult::success("read_file", long_output),
        );
        match &verbose.get_entries(None)[0] {
            AuditEvent::ToolCall { output, .. } => assert_eq!(output.len(), 2000),
            _ => panic!("expected tool call"),
        }
    }

    #[test]
    fn test_tool_summary_counts_only_tool_calls() {
        let dir = tempdir().unwrap();
        let log = AuditLog::open(dir.path().join("runlog.jsonl")).unwrap();

        log.log_tool_call(
            1,
            &tool_call("list_dir"),
            &ToolResult::success("list_dir", "").with_duration(0.5),
        );
        log.log_tool_call(
            1,
            &tool_call("exec_cmd"),
            &ToolResult::failure("exec_cmd", "Command not allowed: rm").with_duration(0.1),
        );
        log.log_error(1, "LoopError", "boom", json!({}));

        let summary = log.tool_summary();
        assert_eq!(summary.total_calls, 2);
        assert_eq!(summary.successful, 1);
        assert_eq!(summary.failed, 1);
        assert!((summary.total_duration_sec - 0.6).abs() < 1e-9);
        assert_eq!(summary.by_tool["list_dir"].calls, 1);
    }

    #[test]
    fn test_analyze_loop() {
        let dir = tempdir().unwrap();
        let log = AuditLog::open(dir.path().join("runlog.jsonl")).unwrap();

        log.log_tool_call(
            2,
            &tool_call("grep"),
            &ToolResult::failure("grep", "Path not found: x"),
        );
        log.log_tool_call(2, &tool_call("grep"), &ToolResult::success("grep", "hit"));
        log.log_tool_call(3, &tool_call("list_dir"), &ToolResult::success("list_dir", ""));

        let analysis = log.analyze_loop(2);
        assert_eq!(analysis.entries_count, 2);
        assert_eq!(analysis.tools_called, vec!["grep"]);
        assert!(!analysis.all_successful);
        assert_eq!(analysis.errors.len(), 1);
    }
}
