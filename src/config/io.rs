//! Configuration I/O - Loading and saving configuration
//!
//! Handles reading configuration from files and environment variables.

use std::path::Path;

use secrecy::SecretString;

use super::types::Config;
use crate::error::{Error, Result};

/// Load configuration from a conventional path, falling back to environment
/// variables when no file exists.
///
/// Looks for `./config/opsagent.json`, `./opsagent.toml`, then
/// `<user config dir>/opsagent/config.json`.
pub fn load_config() -> Result<Config> {
    let mut candidates = vec![
        std::path::PathBuf::from("./config/opsagent.json"),
        std::path::PathBuf::from("./opsagent.toml"),
    ];
    if let Some(config_dir) = dirs::config_dir() {
        candidates.push(config_dir.join("opsagent").join("config.json"));
    }

    for path in &candidates {
        if path.exists() {
            return load_config_from_path(path);
        }
    }

    load_config_from_env()
}

/// Load configuration from a specific path
pub fn load_config_from_path(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    // Detect format by extension
    let config: Config = if path.extension().is_some_and(|ext| ext == "json") {
        // Parse as JSON5 (more lenient than strict JSON)
        json5::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid JSON config: {}", e)))?
    } else if path.extension().is_some_and(|ext| ext == "toml") {
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid TOML config: {}", e)))?
    } else {
        // Try JSON5 first, then TOML
        json5::from_str(&content)
            .or_else(|_| toml::from_str(&content).map_err(|e| Error::Config(e.to_string())))
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?
    };

    Ok(config)
}

/// Load configuration from environment variables
pub fn load_config_from_env() -> Result<Config> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    let mut config = Config::default();

    if let Ok(base_url) = std::env::var("OPSAGENT_BASE_URL") {
        config.vllm.base_url = base_url;
    }
    if let Ok(model) = std::env::var("OPSAGENT_MODEL") {
        config.vllm.model = model;
    }
    if let Ok(api_key) = std::env::var("OPSAGENT_API_KEY") {
        config.vllm.api_key = SecretString::from(api_key);
    }
    if let Ok(workspace) = std::env::var("OPSAGENT_WORKSPACE") {
        config.workspace.dir = std::path::PathBuf::from(workspace);
    }
    if let Ok(allowed) = std::env::var("OPSAGENT_ALLOWED_COMMANDS") {
        config.security.allowed_commands = allowed
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Ok(max_loops) = std::env::var("OPSAGENT_MAX_LOOPS") {
        if let Ok(n) = max_loops.parse() {
            config.agent.max_loops = n;
        }
    }

    Ok(config)
}

/// Save configuration to a file
pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    let content = if path.extension().is_some_and(|ext| ext == "toml") {
        toml::to_string_pretty(config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?
    } else {
        serde_json::to_string_pretty(config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test_config.json");

        let config = Config::default();
        save_config(&config, &path).unwrap();

        let loaded = load_config_from_path(&path).unwrap();
        assert_eq!(loaded.vllm.model, config.vllm.model);
        assert_eq!(loaded.agent.max_loops, config.agent.max_loops);
    }

    #[test]
    fn test_load_toml_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("opsagent.toml");
        std::fs::write(
            &path,
            "[vllm]\nbase_url = \"http://model:8000/v1\"\nmodel = \"qwen\"\n\n[agent]\nmax_loops = 3\n",
        )
        .unwrap();

        let loaded = load_config_from_path(&path).unwrap();
        assert_eq!(loaded.vllm.model, "qwen");
        assert_eq!(loaded.agent.max_loops, 3);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = load_config_from_path(Path::new("/nonexistent/opsagent.json")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
