//! `sitescript.toml` configuration

use crate::error::{Result, ScriptError};
use crate::value::Lists;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub limits: Limits,
    /// Server-seeded list data, `[[lists.saints]]` tables of string fields
    pub lists: Lists,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig::default(),
            limits: Limits::default(),
            lists: Lists::new(),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Service directory holding scripts, templates and static files
    pub root: PathBuf,
    /// Routes file, relative to `root`
    pub routes: String,
    pub static_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
            root: PathBuf::from("service"),
            routes: "routes.conf".to_string(),
            static_prefix: "/static/".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Execution budgets for scripts and templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_steps: usize,
    pub max_template_nodes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_steps: 100_000,
            max_template_nodes: 1000,
        }
    }
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Config> {
        toml::from_str(text).map_err(|e| ScriptError::ConfigError(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Config> {
        let text = fs::read_to_string(path).map_err(|e| {
            ScriptError::ConfigError(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.server.address(), "0.0.0.0:8080");
        assert_eq!(config.limits.max_template_nodes, 1000);
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::from_toml_str(
            r#"
            log_level = "debug"

            [server]
            port = 9000

            [limits]
            max_steps = 50

            [[lists.saints]]
            value = "Francis"

            [[lists.saints]]
            value = "Clare"
            feast = "August 11"
            "#,
        )
        .unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.limits.max_steps, 50);
        assert_eq!(config.limits.max_template_nodes, 1000);

        let saints = &config.lists["saints"];
        assert_eq!(saints.len(), 2);
        assert_eq!(saints[1]["feast"], "August 11");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = Config::from_toml_str("[server]\nport = \"eighty\"").unwrap_err();
        assert!(matches!(err, ScriptError::ConfigError(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/sitescript.toml")).unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }
}
