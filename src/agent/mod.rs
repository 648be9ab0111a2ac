//! Agent module - the Planner/Responder roles and the orchestration loop
//!
//! `Agent` is the integrated assembly: it wires the model client, the
//! constraints, the tool runner, memory, and the audit log together from a
//! single `Config` value.

pub mod agent_loop;
pub mod planner;
pub mod prompts;
pub mod responder;

pub use agent_loop::{AgentLoop, ExecutionSummary};
pub use planner::{PlanSource, Planner};
pub use responder::{Responder, ResponseSource};

use std::sync::Arc;

use crate::audit::AuditLog;
use crate::config::{Config, DebugLevel};
use crate::constraints::Constraints;
use crate::error::Result;
use crate::memory::Memory;
use crate::provider::VllmClient;
use crate::state::AgentState;
use crate::tools::{ToolRegistry, ToolRunner};

/// Integrated agent: Memory + State + AuditLog + Constraints + ToolRunner +
/// Planner + Responder behind the bounded agent loop.
pub struct Agent {
    agent_loop: AgentLoop,
    audit: Option<Arc<AuditLog>>,
}

impl Agent {
    /// Assemble an agent from configuration.
    ///
    /// Creates the workspace and data directories as needed.
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
        let tool_catalog = registry.catalog_text();
        let tool_runner = ToolRunner::new(registry, audit.clone());

        let client = VllmClient::new(&config.vllm)?;
        let planner = Planner::new(client.clone(), tool_catalog, audit.clone());
        let responder = Responder::new(client, audit.clone());

        let memory = Memory::open(&config.memory.path);

        let agent_loop = AgentLoop::new(
            planner,
            tool_runner,
            responder,
            memory,
            audit.clone(),
            config.agent.max_loops,
            config.agent.loop_wait_sec,
        );

        Ok(Agent { agent_loop, audit })
    }

    /// Run the agent on a user request; always returns a user-visible string
    pub async fn run(&mut self, user_request: &str) -> String {
        self.agent_loop.run(user_request).await
    }

    /// Stats over the request that just ran
    pub fn execution_summary(&self) -> ExecutionSummary {
        self.agent_loop.execution_summary()
    }

    /// Multi-line execution summary for CLI output
    pub fn summary_text(&self) -> String {
        self.agent_loop.summary_text()
    }

    /// The per-request state
    pub fn state(&self) -> &AgentState {
        self.agent_loop.state()
    }

    /// The long-term memory
    pub fn memory(&self) -> &Memory {
        self.agent_loop.memory()
    }

    /// Mutable access to the long-term memory
    pub fn memory_mut(&mut self) -> &mut Memory {
        self.agent_loop.memory_mut()
    }

    /// Persist memory to its backing file
    pub fn save_memory(&mut self) {
        self.agent_loop.memory_mut().save();
    }

    /// Human-readable audit summary, when audit logging is enabled
    pub fn audit_summary(&self) -> Option<String> {
        self.audit.as_ref().map(|audit| audit.export_summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::tempdir;

    fn test_config(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.workspace.dir = dir.join("workspace");
        config.memory.path = dir.join("data/memory.json");
        config.audit.log_path = dir.join("data/runlog.jsonl");
        config
    }

    #[test]
    fn test_agent_assembly_creates_directories() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());

        let agent = Agent::new(config).unwrap();
        assert!(dir.path().join("workspace").is_dir());
        assert!(agent.audit_summary().is_some());
    }

    #[test]
    fn test_agent_without_audit() {
        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.audit.enabled = false;

        let agent = Agent::new(config).unwrap();
        assert!(agent.audit_summary().is_none());
    }
}
