//! Tools module - the sandboxed workspace tools
//!
//! Each tool is a self-contained struct implementing the `Tool` trait.
//! Tools are registered into a `ToolRegistry`; the `ToolRunner` dispatches
//! planner tool calls against the registry, translates handler outcomes into
//! uniform `ToolResult`s, and mirrors every invocation to the audit log.
//!
//! ## Built-in Tools
//!
//! - **list_dir**: List files and directories
//! - **read_file**: Read file contents with line offset/limit
//! - **write_file**: Write or create a file
//! - **edit_file**: Replace a unique text occurrence in a file
//! - **exec_cmd**: Execute a shell command under the allowlist
//! - **grep**: Substring search across files

mod args;
mod exec;
mod fs;
mod grep;
mod registry;
mod runner;
mod traits;

// Core trait and types
pub use traits::{HandlerOutput, Tool, ToolError};

// Typed tool arguments
pub use args::{EditFileArgs, ExecCmdArgs, GrepArgs, ListDirArgs, ReadFileArgs, WriteFileArgs};

// Registry and runner
pub use registry::ToolRegistry;
pub use runner::ToolRunner;

// Built-in tools
pub use exec::ExecCmdTool;
pub use fs::{EditFileTool, ListDirTool, ReadFileTool, WriteFileTool};
pub use grep::GrepTool;
