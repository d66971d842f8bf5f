//! Runtime configuration, persisted as TOML.
//!
//! ```toml
//! [llm]
//! backend = "ollama"          # or "openai"
//! base_url = "http://localhost:11434"
//! model = "llama3.1"
//! timeout_secs = 120
//!
//! [store]
//! data_dir = "/var/lib/medkg" # omit for an in-memory graph
//! seed_on_start = true
//! ```
//!
//! Environment variables override the file: `MEDKG_LLM_BACKEND`,
//! `MEDKG_LLM_URL`, `MEDKG_LLM_MODEL`, `MEDKG_LLM_API_KEY`, `MEDKG_DATA_DIR`.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::MedResult;
use crate::graph::GraphWriter;
use crate::llm::{LlmBackend, LlmConfig};
use crate::seeds::SeedPack;
use crate::store::MemGraph;

/// Errors from configuration loading.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(medkg::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}: {message}")]
    #[diagnostic(
        code(medkg::config::parse),
        help("Check the TOML syntax. Valid sections are [llm] and [store].")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(medkg::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value for {variable}: \"{value}\"")]
    #[diagnostic(
        code(medkg::config::env),
        help("MEDKG_LLM_BACKEND accepts \"ollama\" or \"openai\".")
    )]
    InvalidEnv { variable: String, value: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Graph storage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding `medkg.redb`. `None` keeps the graph in memory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Apply the bundled seed pack when the store is opened.
    #[serde(default = "default_seed_on_start")]
    pub seed_on_start: bool,
}

fn default_seed_on_start() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            seed_on_start: default_seed_on_start(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl MedConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Load the file if given (defaults otherwise), then apply the process
    /// environment.
    pub fn resolve(path: Option<&Path>) -> ConfigResult<Self> {
        let config = match path {
            Some(p) => Self::load(p)?,
            None => Self::default(),
        };
        config.with_env(|name| std::env::var(name).ok())
    }

    /// Apply environment overrides read through `lookup`. Empty values are
    /// ignored.
    pub fn with_env<F>(mut self, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("MEDKG_LLM_BACKEND") {
            self.llm.backend = match v.trim().to_ascii_lowercase().as_str() {
                "ollama" => LlmBackend::Ollama,
                "openai" => LlmBackend::OpenAi,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        variable: "MEDKG_LLM_BACKEND".into(),
                        value: v,
                    });
                }
            };
        }
        if let Some(v) = get("MEDKG_LLM_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = get("MEDKG_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = get("MEDKG_LLM_API_KEY") {
            self.llm.api_key = Some(v);
        }
        if let Some(v) = get("MEDKG_DATA_DIR") {
            self.store.data_dir = Some(PathBuf::from(v));
        }
        Ok(self)
    }

    /// Open the configured graph, seeding it when asked to. A persistent
    /// graph that already records the bundled pack's version is left as is.
    pub fn open_store(&self) -> MedResult<MemGraph> {
        let graph = match &self.store.data_dir {
            Some(dir) => MemGraph::open(dir)?,
            None => MemGraph::new(),
        };
        if self.store.seed_on_start {
            SeedPack::bundled()?.apply_once(&GraphWriter::new(&graph))?;
        }
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use crate::store::GraphStore;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults() {
        let c = MedConfig::default();
        assert_eq!(c.llm.base_url, "http://localhost:11434");
        assert_eq!(c.llm.model, "llama3.1");
        assert!(c.store.data_dir.is_none());
        assert!(c.store.seed_on_start);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let c: MedConfig = toml::from_str("[store]\nseed_on_start = false\n").unwrap();
        assert!(!c.store.seed_on_start);
        assert_eq!(c.llm, LlmConfig::default());
    }

    #[test]
    fn env_overrides_file() {
        let c = MedConfig::default()
            .with_env(env(&[
                ("MEDKG_LLM_BACKEND", "OpenAI"),
                ("MEDKG_LLM_URL", "https://api.groq.com/openai/v1"),
                ("MEDKG_LLM_MODEL", "llama-3.1-8b-instant"),
                ("MEDKG_LLM_API_KEY", "secret"),
                ("MEDKG_DATA_DIR", "/tmp/medkg"),
            ]))
            .unwrap();
        assert_eq!(c.llm.backend, LlmBackend::OpenAi);
        assert_eq!(c.llm.model, "llama-3.1-8b-instant");
        assert_eq!(c.llm.api_key.as_deref(), Some("secret"));
        assert_eq!(c.store.data_dir, Some(PathBuf::from("/tmp/medkg")));
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let c = MedConfig::default()
            .with_env(env(&[("MEDKG_LLM_MODEL", "  ")]))
            .unwrap();
        assert_eq!(c.llm.model, "llama3.1");
    }

    #[test]
    fn bad_backend_is_rejected() {
        let err = MedConfig::default()
            .with_env(env(&[("MEDKG_LLM_BACKEND", "claude")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("medkg.toml");
        let mut c = MedConfig::default();
        c.llm.backend = LlmBackend::OpenAi;
        c.store.data_dir = Some(dir.path().join("data"));
        c.save(&path).unwrap();
        assert_eq!(MedConfig::load(&path).unwrap(), c);
    }

    #[test]
    fn open_store_seeds_in_memory_graph() {
        let g = MedConfig::default().open_store().unwrap();
        assert!(g.node_count() > 0);
        assert!(!g.is_persistent());
    }
}
