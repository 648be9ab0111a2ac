//! Substring search tool
//!
//! Plain substring matching, no regex and no case folding. Directories are
//! walked recursively; files that are not valid UTF-8 are skipped.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use walkdir::WalkDir;

use super::args::{decode, GrepArgs};
use super::traits::{HandlerOutput, Tool, ToolError};
use crate::constraints::Constraints;

/// Built-in tool: search for text in files
pub struct GrepTool {
    constraints: Arc<Constraints>,
}

impl GrepTool {
    pub fn new(constraints: Arc<Constraints>) -> Self {
        GrepTool { constraints }
    }
}

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &str {
        "grep"
    }

    fn description(&self) -> &str {
        "Search for text in files"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Text pattern to search"
                },
                "path": {
                    "type": "string",
                    "description": "File or directory path"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn run(&self, args: &Map<String, Value>) -> Result<HandlerOutput, ToolError> {
        let args: GrepArgs = decode(self.name(), &["pattern", "path"], args)?;

        let target = self
            .constraints
            .resolve(&args.path)
            .ok_or_else(|| ToolError::PathDenied(args.path.clone()))?;

        let metadata = tokio::fs::metadata(&target)
            .await
            .map_err(|_| ToolError::PathNotFound(args.path.clone()))?;

        let mut matches = Vec::new();

        if metadata.is_file() {
            let content = tokio::fs::read_to_string(&target).await.map_err(|e| {
                ToolError::Io(std::io::Error::other(format!(
                    "Failed to read {}: {}",
                    args.path, e
                )))
            })?;
            let name = target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| args.path.clone());
            scan_lines(&content, &args.pattern, &name, &mut matches);
        } else {
            for entry in WalkDir::new(&target)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if !entry.file_type().is_file() {
                    continue;
                }
                // Skip binary and otherwise unreadable files
                let Ok(content) = std::fs::read_to_string(entry.path()) else {
                    continue;
                };
                let shown = relative_to(entry.path(), self.constraints.allowed_root());
                scan_lines(&content, &args.pattern, &shown, &mut matches);
            }
        }

        let output = if matches.is_empty() {
            "(no matches)".to_string()
        } else {
            matches.join("\n")
        };

        let max = self.constraints.max_output_size();
        Ok(HandlerOutput::new(
            self.constraints.truncate_output(&output, max),
        ))
    }
}

fn scan_lines(content: &str, pattern: &str, shown_path: &str, matches: &mut Vec<String>) {
    for (number, line) in content.lines().enumerate() {
        if line.contains(pattern) {
            matches.push(format!("{}:{}: {}", shown_path, number + 1, line.trim_end()));
        }
    }
}

fn relative_to(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityConfig;
    use serde_json::json;
    use tempfile::tempdir;

    fn tool(dir: &std::path::Path) -> GrepTool {
        GrepTool::new(Arc::new(
            Constraints::new(dir, &SecurityConfig::default()).unwrap(),
        ))
    }

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_grep_single_file_line_numbers() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "alpha\nbeta\ngamma beta\n").unwrap();

        let output = tool(dir.path())
            .run(&object(json!({"pattern": "beta", "path": "f.txt"})))
            .await
            .unwrap();
        assert_eq!(output.output, "f.txt:2: beta\nf.txt:3: gamma beta");
    }

    #[tokio::test]
    async fn test_grep_directory_recursive_relative_paths() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("top.txt"), "needle here\n").unwrap();
        std::fs::write(dir.path().join("sub/deep.txt"), "another needle\n").unwrap();

        let output = tool(dir.path())
            .run(&object(json!({"pattern": "needle"})))
            .await
            .unwrap();
        assert!(output.output.contains("top.txt:1: needle here"));
        assert!(output.output.contains("sub/deep.txt:1: another needle"));
    }

    #[tokio::test]
    async fn test_grep_no_matches() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "nothing\n").unwrap();

        let output = tool(dir.path())
            .run(&object(json!({"pattern": "absent"})))
            .await
            .unwrap();
        assert_eq!(output.output, "(no matches)");
    }

    #[tokio::test]
    async fn test_grep_skips_non_utf8_in_directory() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("bin.dat"), [0xff, 0xfe, 0x00]).unwrap();
        std::fs::write(dir.path().join("ok.txt"), "needle\n").unwrap();

        let output = tool(dir.path())
            .run(&object(json!({"pattern": "needle"})))
            .await
            .unwrap();
        assert_eq!(output.output, "ok.txt:1: needle");
    }

    #[tokio::test]
    async fn test_grep_missing_path() {
        let dir = tempdir().unwrap();
        let err = tool(dir.path())
            .run(&object(json!({"pattern": "x", "path": "missing"})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Path not found: missing");
    }
}
