//! Filesystem tools
//!
//! The four workspace file tools. Every path passes through the constraints
//! before any filesystem access.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::args::{decode, EditFileArgs, ListDirArgs, ReadFileArgs, WriteFileArgs};
use super::traits::{HandlerOutput, Tool, ToolError};
use crate::constraints::Constraints;

/// Built-in tool: list a directory
pub struct ListDirTool {
    constraints: Arc<Constraints>,
}

impl ListDirTool {
    pub fn new(constraints: Arc<Constraints>) -> Self {
        ListDirTool { constraints }
    }
}

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List files and directories"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory path (default: current workspace)"
                }
            }
        })
    }

    async fn run(&self, args: &Map<String, Value>) -> Result<HandlerOutput, ToolError> {
        let args: ListDirArgs = decode(self.name(), &["path"], args)?;

        let dir = self
            .constraints
            .resolve(&args.path)
            .ok_or_else(|| ToolError::PathDenied(args.path.clone()))?;

        let metadata = tokio::fs::metadata(&dir)
            .await
            .map_err(|_| ToolError::DirNotFound(args.path.clone()))?;
        if !metadata.is_dir() {
            return Err(ToolError::NotADir(args.path));
        }

        let mut entries = Vec::new();
        let mut reader = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            entries.push(if is_dir { format!("{name}/") } else { name });
        }
        entries.sort();

        Ok(HandlerOutput::new(entries.join("\n")))
    }
}

/// Built-in tool: read a file by logical lines
pub struct ReadFileTool {
    constraints: Arc<Constraints>,
}

impl ReadFileTool {
    pub fn new(constraints: Arc<Constraints>) -> Self {
        ReadFileTool { constraints }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read file contents"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path"
                },
                "offset": {
                    "type": "integer",
                    "description": "Optional: starting line number"
                },
                "limit": {
                    "type": "integer",
                    "description": "Optional: maximum lines to read"
                }
            },
            "required": ["path"]
        })
    }

    async fn run(&self, args: &Map<String, Value>) -> Result<HandlerOutput, ToolError> {
        let args: ReadFileArgs = decode(self.name(), &["path", "offset", "limit"], args)?;

        let file = require_file(&self.constraints, &args.path).await?;

        let bytes = tokio::fs::read(&file).await?;
        let content = String::from_utf8(bytes).map_err(|_| {
            ToolError::Io(std::io::Error::other(format!(
                "File is not valid UTF-8: {}",
                args.path
            )))
        })?;

        // Slice by logical lines, line endings preserved
        let lines: Vec<&str> = content.split_inclusive('\n').collect();
        let start = args.offset.min(lines.len());
        let end = match args.limit {
            Some(limit) => (start + limit).min(lines.len()),
            None => lines.len(),
        };
        let selected = lines[start..end].concat();

        let max = self.constraints.max_output_size();
        Ok(HandlerOutput::new(
            self.constraints.truncate_output(&selected, max),
        ))
    }
}

/// Built-in tool: write or create a file
pub struct WriteFileTool {
    constraints: Arc<Constraints>,
}

impl WriteFileTool {
    pub fn new(constraints: Arc<Constraints>) -> Self {
        WriteFileTool { constraints }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write or create a file"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path"
                },
                "content": {
                    "type": "string",
                    "description": "Content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn run(&self, args: &Map<String, Value>) -> Result<HandlerOutput, ToolError> {
        let args: WriteFileArgs = decode(self.name(), &["path", "content"], args)?;

        let file = self
            .constraints
            .resolve(&args.path)
            .ok_or_else(|| ToolError::PathDenied(args.path.clone()))?;

        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&file, &args.content).await?;

        Ok(HandlerOutput::new(format!(
            "Wrote {} bytes to {}",
            args.content.len(),
            args.path
        )))
    }
}

/// Built-in tool: replace a unique text occurrence in a file
pub struct EditFileTool {
    constraints: Arc<Constraints>,
}

impl EditFileTool {
    pub fn new(constraints: Arc<Constraints>) -> Self {
        EditFileTool { constraints }
    }
}

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Edit a file by replacing text"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path"
                },
                "oldText": {
                    "type": "string",
                    "description": "Text to find (must appear exactly once)"
                },
                "newText": {
                    "type": "string",
                    "description": "Text to replace with"
                }
            },
            "required": ["path", "oldText", "newText"]
        })
    }

    async fn run(&self, args: &Map<String, Value>) -> Result<HandlerOutput, ToolError> {
        let args: EditFileArgs = decode(self.name(), &["path", "oldText", "newText"], args)?;

        let file = require_file(&self.constraints, &args.path).await?;

        let content = tokio::fs::read_to_string(&file).await.map_err(|e| {
            ToolError::Io(std::io::Error::other(format!(
                "Failed to read {}: {}",
                args.path, e
            )))
        })?;

        let count = content.matches(&args.old_text).count();
        if count == 0 {
            return Err(ToolError::EditNotFound(args.path));
        }
        if count > 1 {
            return Err(ToolError::EditAmbiguous {
                path: args.path,
                count,
            });
        }

        let edited = content.replacen(&args.old_text, &args.new_text, 1);
        tokio::fs::write(&file, edited).await?;

        Ok(HandlerOutput::new(format!(
            "Successfully edited {}",
            args.path
        )))
    }
}

/// Resolve a path and require it to be an existing regular file.
async fn require_file(constraints: &Constraints, path: &str) -> Result<PathBuf, ToolError> {
    let resolved = constraints
        .resolve(path)
        .ok_or_else(|| ToolError::PathDenied(path.to_string()))?;

    let metadata = tokio::fs::metadata(&resolved)
        .await
        .map_err(|_| ToolError::FileNotFound(path.to_string()))?;
    if !metadata.is_file() {
        return Err(ToolError::NotAFile(path.to_string()));
    }

    Ok(resolved)
}
