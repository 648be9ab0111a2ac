//! Tool registry - manages available tools for the agent

use std::collections::HashMap;
use std::sync::Arc;

use crate::constraints::Constraints;
use crate::provider::ToolDefinition;

use super::exec::ExecCmdTool;
use super::fs::{EditFileTool, ListDirTool, ReadFileTool, WriteFileTool};
use super::grep::GrepTool;
use super::traits::Tool;

/// Registry of available tools
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
    /// Registration order, for stable catalog rendering
    order: Vec<String>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        ToolRegistry {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Registry pre-populated with the six workspace tools
    pub fn with_workspace_tools(constraints: Arc<Constraints>) -> Self {
        let mut registry = Self::new();
        registry.register(ListDirTool::new(constraints.clone()));
        registry.register(ReadFileTool::new(constraints.clone()));
        registry.register(WriteFileTool::new(constraints.clone()));
        registry.register(EditFileTool::new(constraints.clone()));
        registry.register(ExecCmdTool::new(constraints.clone()));
        registry.register(GrepTool::new(constraints));
        registry
    }

    /// Register a tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, Box::new(tool));
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Get all tool definitions, in registration order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| t.to_definition())
            .collect()
    }

    /// List tool names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    /// Get tool count
    pub fn count(&self) -> usize {
        self.tools.len()
    }

    /// Render a numbered text catalog for the planner prompt.
    ///
    /// Argument descriptions come from the JSON schema properties.
    pub fn catalog_text(&self) -> String {
        let mut specs = Vec::new();

        for (index, name) in self.order.iter().enumerate() {
            let Some(tool) = self.tools.get(name) else {
                continue;
            };

            let schema = tool.parameters_schema();
            let args: serde_json::Map<String, serde_json::Value> = schema
                .get("properties")
                .and_then(|p| p.as_object())
                .map(|properties| {
                    properties
                        .iter()
                        .map(|(arg, def)| {
                            let description = def
                                .get("description")
                                .and_then(|d| d.as_str())
                                .unwrap_or_default();
                            (arg.clone(), serde_json::Value::from(description))
                        })
                        .collect()
                })
                .unwrap_or_default();

            specs.push(format!(
                "{}. {}\n   Description: {}\n   Args: {}",
                index + 1,
                tool.name(),
                tool.description(),
                serde_json::Value::Object(args)
            ));
        }

        specs.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityConfig;
    use tempfile::tempdir;

    fn workspace_registry(dir: &std::path::Path) -> ToolRegistry {
        let constraints = Arc::new(Constraints::new(dir, &SecurityConfig::default()).unwrap());
        ToolRegistry::with_workspace_tools(constraints)
    }

    #[test]
    fn test_workspace_tools_registered_in_order() {
        let dir = tempdir().unwrap();
        let registry = workspace_registry(dir.path());

        assert_eq!(
            registry.names(),
            vec!["list_dir", "read_file", "write_file", "edit_file", "exec_cmd", "grep"]
        );
        assert_eq!(registry.count(), 6);
        assert!(registry.get("read_file").is_some());
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn test_definitions_are_function_schemas() {
        let dir = tempdir().unwrap();
        let registry = workspace_registry(dir.path());

        let definitions = registry.definitions();
        assert_eq!(definitions.len(), 6);
        assert!(definitions.iter().all(|d| d.tool_type == "function"));
        assert_eq!(definitions[0].function.name, "list_dir");
    }

    #[test]
    fn test_catalog_text_numbered() {
        let dir = tempdir().unwrap();
        let registry = workspace_registry(dir.path());

        let catalog = registry.catalog_text();
        assert!(catalog.starts_with("1. list_dir"));
        assert!(catalog.contains("6. grep"));
        assert!(catalog.contains("Description: Read file contents"));
    }
}
