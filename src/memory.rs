//! Long-term durable memory
//!
//! A JSON-backed store of user preferences, environment facts, repeated
//! decisions, and timestamped discovered facts. Survives across runs; every
//! mutation updates `last_updated` and rewrites the backing file.
//! Persistence is best-effort: a failed write is logged, never fatal.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// A recorded repeated decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedDecision {
    /// The decision value
    pub value: Value,
    /// RFC 3339 timestamp
    pub recorded_at: String,
}

/// A timestamped discovered fact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedFact {
    /// The fact text
    pub fact: String,
    /// RFC 3339 timestamp
    pub recorded_at: String,
}

/// The persisted memory structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryData {
    /// Schema version
    pub version: String,
    /// RFC 3339 creation timestamp
    pub created_at: String,
    /// RFC 3339 timestamp of the last mutation
    pub last_updated: String,
    /// User preferences (language, output granularity, ...)
    #[serde(default)]
    pub user_preferences: HashMap<String, Value>,
    /// Environment facts (OS, work directory, ...)
    #[serde(default)]
    pub environment: HashMap<String, Value>,
    /// Repeated decisions by category and key
    #[serde(default)]
    pub repeated_decisions: HashMap<String, HashMap<String, RecordedDecision>>,
    /// Discovered facts by category, in insertion order
    #[serde(default)]
    pub facts: HashMap<String, Vec<RecordedFact>>,
}

impl Default for MemoryData {
    fn default() -> Self {
        let now = Utc::now().to_rfc3339();
        MemoryData {
            version: "1.0".to_string(),
            created_at: now.clone(),
            last_updated: now,
            user_preferences: HashMap::new(),
            environment: HashMap::new(),
            repeated_decisions: HashMap::new(),
            facts: HashMap::new(),
        }
    }
}

/// Long-term memory shared (read-mostly) by the Planner and Responder
#[derive(Debug)]
pub struct Memory {
    path: PathBuf,
    data: MemoryData,
}

impl Memory {
    /// Open memory at the given path, loading existing data when present.
    ///
    /// The parent directory is created; a corrupt or unreadable file is
    /// logged and replaced by empty memory.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("Failed to create memory directory: {}", e);
            }
        }

        let mut memory = Memory {
            path,
            data: MemoryData::default(),
        };
        memory.load();
        memory
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reload from the backing file; keeps current data on failure
    pub fn load(&mut self) {
        if !self.path.exists() {
            return;
        }

        match std::fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str::<MemoryData>(&content) {
                Ok(data) => self.data = data,
                Err(e) => warn!("Failed to parse memory file: {}", e),
            },
            Err(e) => warn!("Failed to load memory: {}", e),
        }
    }

    /// Persist to the backing file. Updates `last_updated` first; a write
    /// failure is logged, not returned.
    pub fn save(&mut self) {
        self.data.last_updated = Utc::now().to_rfc3339();

        let serialized = match serde_json::to_string_pretty(&self.data) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize memory: {}", e);
                return;
            }
        };

        if let Err(e) = std::fs::write(&self.path, serialized) {
            warn!("Failed to save memory: {}", e);
        }
    }

    /// Set a user preference and persist
    pub fn set_preference(&mut self, key: impl Into<String>, value: Value) {
        self.data.user_preferences.insert(key.into(), value);
        self.save();
    }

    /// Get a user preference
    pub fn get_preference(&self, key: &str) -> Option<&Value> {
        self.data.user_preferences.get(key)
    }

    /// Set an environment fact and persist
    pub fn set_environment(&mut self, key: impl Into<String>, value: Value) {
        self.data.environment.insert(key.into(), value);
        self.save();
    }

    /// Get an environment fact
    pub fn get_environment(&self, key: &str) -> Option<&Value> {
        self.data.environment.get(key)
    }

    /// Record a repeated decision under a category and persist
    pub fn record_decision(
        &mut self,
        category: impl Into<String>,
        key: impl Into<String>,
        value: Value,
    ) {
        self.data
            .repeated_decisions
            .entry(category.into())
            .or_default()
            .insert(
                key.into(),
                RecordedDecision {
                    value,
                    recorded_at: Utc::now().to_rfc3339(),
                },
            );
        self.save();
    }

    /// Get a recorded decision value
    pub fn get_decision(&self, category: &str, key: &str) -> Option<&Value> {
        self.data
            .repeated_decisions
            .get(category)?
            .get(key)
            .map(|d| &d.value)
    }

    /// Record a discovered fact under a category and persist
    pub fn record_fact(&mut self, category: impl Into<String>, fact: impl Into<String>) {
        self.data
            .facts
            .entry(category.into())
            .or_default()
            .push(RecordedFact {
                fact: fact.into(),
                recorded_at: Utc::now().to_rfc3339(),
            });
        self.save();
    }

    /// Get facts for one category, in insertion order
    pub fn get_facts(&self, category: &str) -> Vec<&str> {
        self.data
            .facts
            .get(category)
            .map(|facts| facts.iter().map(|f| f.fact.as_str()).collect())
            .unwrap_or_default()
    }

    /// Render memory as a compact context block for LLM prompts, truncated
    /// to `max_chars`.
    pub fn to_context(&self, max_chars: usize) -> String {
        let mut parts = Vec::new();

        if !self.data.user_preferences.is_empty() {
            parts.push("## User Preferences".to_string());
            let mut keys: Vec<_> = self.data.user_preferences.keys().collect();
            keys.sort();
            for key in keys {
                parts.push(format!("- {}: {}", key, self.data.user_preferences[key]));
            }
        }

        if !self.data.environment.is_empty() {
            parts.push("\n## Environment".to_string());
            let mut keys: Vec<_> = self.data.environment.keys().collect();
            keys.sort();
            for key in keys {
                parts.push(format!("- {}: {}", key, self.data.environment[key]));
            }
        }

        if !self.data.facts.is_empty() {
            parts.push("\n## Known Facts".to_string());
            let mut categories: Vec<_> = self.data.facts.keys().collect();
            categories.sort();
            for category in categories {
                let facts = &self.data.facts[category];
                let start = facts.len().saturating_sub(3);
                for fact in &facts[start..] {
                    parts.push(format!("- {}: {}", category, fact.fact));
                }
            }
        }

        let context = parts.join("\n");
        if context.is_empty() {
            return "(No memory yet)".to_string();
        }

        if context.chars().count() > max_chars {
            let cut: String = context.chars().take(max_chars).collect();
            format!("{cut}\n... (truncated)")
        } else {
            context
        }
    }

    /// Delete the backing file and reset to empty memory
    pub fn clear(&mut self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!("Failed to remove memory file: {}", e);
            }
        }
        self.data = MemoryData::default();
    }

    /// One-paragraph summary of memory contents
    pub fn summary(&self) -> String {
        format!(
            "Memory: {} preferences, {} environment entries, {} decisions, {} facts, last updated {}",
            self.data.user_preferences.len(),
            self.data.environment.len(),
            self.data
                .repeated_decisions
                .values()
                .map(|m| m.len())
                .sum::<usize>(),
            self.data.facts.values().map(|v| v.len()).sum::<usize>(),
            self.data.last_updated,
        )
    }
}
