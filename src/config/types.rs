//! Configuration types
//!
//! One section struct per concern, each with serde defaults so a partial
//! config file (or none at all) still produces a runnable agent.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// vLLM endpoint configuration
    #[serde(default)]
    pub vllm: VllmConfig,

    /// Workspace (sandbox root) configuration
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Security constraints for tool execution
    #[serde(default)]
    pub security: SecurityConfig,

    /// Long-term memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Audit logging configuration
    #[serde(default)]
    pub audit: AuditConfig,

    /// Agent loop configuration
    #[serde(default)]
    pub agent: AgentConfig,

    /// Debug output configuration
    #[serde(default)]
    pub debug: DebugConfig,

    /// Static strings composed into the chat facade's system message
    #[serde(default)]
    pub system_prompt: SystemPromptConfig,
}

/// vLLM endpoint configuration (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VllmConfig {
    /// Base URL of the endpoint, e.g. `http://localhost:8000/v1`
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model name to request
    #[serde(default = "default_model")]
    pub model: String,
    /// API key; vLLM typically accepts any value
    #[serde(skip_serializing, default = "default_api_key")]
    pub api_key: SecretString,
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Whether to send the tools catalog for native function calling
    #[serde(default = "default_true")]
    pub enable_function_calling: bool,
}

impl Default for VllmConfig {
    fn default() -> Self {
        VllmConfig {
            base_url: default_base_url(),
            model: default_model(),
            api_key: default_api_key(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            enable_function_calling: true,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000/v1".to_string()
}

fn default_model() -> String {
    "default".to_string()
}

fn default_api_key() -> SecretString {
    SecretString::from("dummy")
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2048
}

/// Workspace configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Sandbox root directory; created if missing
    #[serde(default = "default_workspace_dir")]
    pub dir: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        WorkspaceConfig {
            dir: default_workspace_dir(),
        }
    }
}

fn default_workspace_dir() -> PathBuf {
    PathBuf::from("./workspace")
}

/// Security constraints for tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Whether `exec_cmd` is available at all
    #[serde(default = "default_true")]
    pub exec_enabled: bool,
    /// Hard cap on command execution time, seconds
    #[serde(default = "default_timeout_sec")]
    pub timeout_sec: u64,
    /// Maximum combined tool output size, characters
    #[serde(default = "default_max_output_size")]
    pub max_output_size: usize,
    /// Maximum stderr size folded into combined output, characters
    #[serde(default = "default_max_stderr_size")]
    pub max_stderr_size: usize,
    /// Allowed command names (first token); empty means allow-all
    #[serde(default)]
    pub allowed_commands: Vec<String>,
    /// Reject shell metacharacters and traversal patterns before execution
    #[serde(default)]
    pub strict_exec: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        SecurityConfig {
            exec_enabled: true,
            timeout_sec: default_timeout_sec(),
            max_output_size: default_max_output_size(),
            max_stderr_size: default_max_stderr_size(),
            allowed_commands: Vec::new(),
            strict_exec: false,
        }
    }
}

fn default_timeout_sec() -> u64 {
    30
}

fn default_max_output_size() -> usize {
    200_000
}

fn default_max_stderr_size() -> usize {
    50_000
}

/// Long-term memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Path to the memory backing file
    #[serde(default = "default_memory_path")]
    pub path: PathBuf,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        MemoryConfig {
            path: default_memory_path(),
        }
    }
}

fn default_memory_path() -> PathBuf {
    PathBuf::from("./data/memory.json")
}

/// Audit logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Whether audit logging is active
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Path to the JSONL log file
    #[serde(default = "default_audit_path")]
    pub log_path: PathBuf,
}

impl Default for AuditConfig {
    fn default() -> Self {
        AuditConfig {
            enabled: true,
            log_path: default_audit_path(),
        }
    }
}

fn default_audit_path() -> PathBuf {
    PathBuf::from("./data/runlog.jsonl")
}

/// Agent loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum Planner-ToolRunner-Responder iterations per request
    #[serde(default = "default_max_loops")]
    pub max_loops: u32,
    /// Pacing sleep between iterations, seconds
    #[serde(default = "default_loop_wait_sec")]
    pub loop_wait_sec: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            max_loops: default_max_loops(),
            loop_wait_sec: default_loop_wait_sec(),
        }
    }
}

fn default_max_loops() -> u32 {
    5
}

fn default_loop_wait_sec() -> f64 {
    0.5
}

/// Debug output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebugConfig {
    /// Whether debug output is enabled
    #[serde(default)]
    pub enabled: bool,
    /// Verbosity level
    #[serde(default)]
    pub level: DebugLevel,
    /// Optional file to mirror debug output to
    pub log_file: Option<PathBuf>,
}

/// Debug verbosity level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebugLevel {
    /// No debug output
    #[default]
    None,
    /// High-level progress only
    Basic,
    /// Full request/response and tool detail; audit sink keeps full fidelity
    Verbose,
}

impl DebugLevel {
    /// Tracing filter directive for this level
    pub fn env_filter(&self) -> &'static str {
        match self {
            DebugLevel::None => "opsagent=warn",
            DebugLevel::Basic => "opsagent=info",
            DebugLevel::Verbose => "opsagent=debug",
        }
    }
}

/// Static strings the chat facade composes into its system message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemPromptConfig {
    /// Who the assistant is
    #[serde(default = "default_role")]
    pub role: String,
    /// Note describing the workspace
    #[serde(default = "default_workspace_note")]
    pub workspace_note: String,
    /// Note describing tool usage
    #[serde(default = "default_tools_note")]
    pub tools_note: String,
}

impl Default for SystemPromptConfig {
    fn default() -> Self {
        SystemPromptConfig {
            role: default_role(),
            workspace_note: default_workspace_note(),
            tools_note: default_tools_note(),
        }
    }
}

fn default_role() -> String {
    "You are an OS automation assistant with access to a sandboxed workspace.".to_string()
}

fn default_workspace_note() -> String {
    "All file paths are relative to the workspace directory.".to_string()
}

fn default_tools_note() -> String {
    "Use the available tools to inspect and modify the workspace before answering.".to_string()
}

fn default_true() -> bool {
    true
}
