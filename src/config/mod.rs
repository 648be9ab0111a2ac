//! Configuration module
//!
//! Split into focused submodules: `types` holds the serde config structs with
//! their defaults, `io` handles loading from disk and environment overrides.

pub mod io;
pub mod types;

pub use io::{load_config, load_config_from_env, load_config_from_path, save_config};
pub use types::{
    AgentConfig, AuditConfig, Config, DebugConfig, DebugLevel, MemoryConfig, SecurityConfig,
    SystemPromptConfig, VllmConfig, WorkspaceConfig,
};
