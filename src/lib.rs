//! # OpsAgent
//!
//! An LLM-driven autonomous OS-automation agent built with Rust.
//!
//! ## Architecture
//!
//! OpsAgent is organized around a bounded Planner → ToolRunner → Responder
//! loop over a sandboxed workspace:
//!
//! - **Provider** (`provider`): OpenAI-compatible chat-completion client for a
//!   vLLM endpoint
//! - **Constraints** (`constraints`): path containment, command allowlist,
//!   timeouts, and output-size policies
//! - **Tools** (`tools`): the six workspace tools behind a `Tool` trait and
//!   registry, executed by the `ToolRunner`
//! - **Memory** (`memory`): durable long-term memory (preferences,
//!   environment, decisions, facts)
//! - **State** (`state`): short-term per-request working set
//! - **Audit** (`audit`): append-only JSONL trail of every decision and tool
//!   call
//! - **Agent** (`agent`): Planner, Responder, and the orchestration loop
//! - **Chat** (`chat`): single-transcript conversational driver with
//!   free-text tool-call parsing
//!
//! ## Design Principles
//!
//! 1. **Security first**: every file access resolves inside the workspace
//!    root; commands pass an allowlist before a shell ever sees them
//! 2. **Everything audited**: planner decisions, tool invocations, and
//!    responder outputs are mirrored to an append-only log
//! 3. **Bounded loops**: no reasoning loop runs unbounded; termination
//!    heuristics plus a hard iteration cap
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use opsagent::agent::Agent;
//! use opsagent::config::Config;
//! use opsagent::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::default();
//!     let mut agent = Agent::new(config)?;
//!     let reply = agent.run("List the files in the workspace").await;
//!     println!("{reply}");
//!     Ok(())
//! }
//! ```

// Modular configuration
pub mod config;

// vLLM chat-completion client
pub mod provider;

// Security constraints for tool execution
pub mod constraints;

// Brace-balanced JSON extraction
pub mod scan;

// Short-term per-request state
pub mod state;

// Long-term durable memory
pub mod memory;

// Append-only audit trail
pub mod audit;

// Workspace tools and the tool runner
pub mod tools;

// Planner, Responder, and the agent loop
pub mod agent;

// Conversational facade (single linear transcript per user)
pub mod chat;

// Error types
pub mod error;

// Re-export commonly used items
pub use error::{Error, Result};

pub use agent::{Agent, AgentLoop, ExecutionSummary, Planner, Responder};
pub use audit::{AuditEvent, AuditLog};
pub use chat::ChatAgent;
pub use constraints::Constraints;
pub use memory::Memory;
pub use state::{
    AgentState, LoopRecord, PlannerOutput, ResponderOutput, ToolCall, ToolResult,
};
pub use tools::{Tool, ToolRegistry, ToolRunner};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const NAME: &str = env!("CARGO_PKG_NAME");
