//! Typed tool arguments
//!
//! Tool arguments arrive as an untyped JSON object from the model. Each tool
//! decodes them into a typed struct in one step; unknown fields are logged
//! and ignored so model drift does not break execution.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::traits::ToolError;

/// Arguments for `list_dir`
#[derive(Debug, Clone, Deserialize)]
pub struct ListDirArgs {
    /// Directory path, relative to the workspace
    #[serde(default = "default_path")]
    pub path: String,
}

/// Arguments for `read_file`
#[derive(Debug, Clone, Deserialize)]
pub struct ReadFileArgs {
    /// File path
    pub path: String,
    /// Starting line offset
    #[serde(default)]
    pub offset: usize,
    /// Maximum lines to read
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Arguments for `write_file`
#[derive(Debug, Clone, Deserialize)]
pub struct WriteFileArgs {
    /// File path
    pub path: String,
    /// Content to write
    #[serde(default)]
    pub content: String,
}

/// Arguments for `edit_file`
#[derive(Debug, Clone, Deserialize)]
pub struct EditFileArgs {
    /// File path
    pub path: String,
    /// Text to find; must appear exactly once
    #[serde(rename = "oldText")]
    pub old_text: String,
    /// Replacement text
    #[serde(rename = "newText")]
    pub new_text: String,
}

/// Arguments for `exec_cmd`
#[derive(Debug, Clone, Deserialize)]
pub struct ExecCmdArgs {
    /// Shell command to execute
    pub command: String,
    /// Requested timeout in seconds; capped by the constraints
    #[serde(default)]
    pub timeout: Option<u64>,
}

/// Arguments for `grep`
#[derive(Debug, Clone, Deserialize)]
pub struct GrepArgs {
    /// Substring pattern to search for
    pub pattern: String,
    /// File or directory path
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_path() -> String {
    ".".to_string()
}

/// Decode an argument object into a typed struct.
///
/// Fields not in `known` are logged and dropped rather than rejected.
pub(crate) fn decode<T: DeserializeOwned>(
    tool: &str,
    known: &[&str],
    args: &Map<String, Value>,
) -> Result<T, ToolError> {
    for key in args.keys() {
        if !known.contains(&key.as_str()) {
            debug!("Ignoring unknown {} argument: {}", tool, key);
        }
    }

    let filtered: Map<String, Value> = args
        .iter()
        .filter(|(key, _)| known.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    serde_json::from_value(Value::Object(filtered)).map_err(|e| ToolError::InvalidArgs(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_decode_with_defaults() {
        let args: ListDirArgs = decode("list_dir", &["path"], &Map::new()).unwrap();
        assert_eq!(args.path, ".");

        let args: ReadFileArgs = decode(
            "read_file",
            &["path", "offset", "limit"],
            &object(json!({"path": "a.txt"})),
        )
        .unwrap();
        assert_eq!(args.offset, 0);
        assert_eq!(args.limit, None);
    }

    #[test]
    fn test_decode_unknown_fields_ignored() {
        let args: GrepArgs = decode(
            "grep",
            &["pattern", "path"],
            &object(json!({"pattern": "x", "path": "src", "case_sensitive": true})),
        )
        .unwrap();
        assert_eq!(args.pattern, "x");
        assert_eq!(args.path, "src");
    }

    #[test]
    fn test_decode_missing_required_field() {
        let err = decode::<ReadFileArgs>("read_file", &["path", "offset", "limit"], &Map::new())
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgs(_)));
        assert!(err.to_string().contains("path"));
    }

    #[test]
    fn test_decode_edit_file_camel_case() {
        let args: EditFileArgs = decode(
            "edit_file",
            &["path", "oldText", "newText"],
            &object(json!({"path": "a.txt", "oldText": "foo", "newText": "bar"})),
        )
        .unwrap();
        assert_eq!(args.old_text, "foo");
        assert_eq!(args.new_text, "bar");
    }
}
