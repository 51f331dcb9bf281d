use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Default configuration file, looked up relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "ragbot.yaml";

/// Configuration for the whole bot.
///
/// Covers the language model, the embedding model, where vectors are stored,
/// and how the HTTP endpoint is exposed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub rag: RagConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Configuration for the chat model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: String,
    pub temperature: f64,
}

/// Configuration for embedding generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    pub embedding_model: String,
    /// Dimension of the vectors produced by `embedding_model`.
    ///
    /// Only backends that need a fixed vector size at creation time (Qdrant)
    /// read this.
    pub embedding_dim: usize,
}

/// Vector database backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum StorageMode {
    /// Chroma server reached over its REST API (default)
    Chroma { url: String },
    /// Qdrant server reached over gRPC
    Qdrant { url: String },
    /// Process-local store, lost on exit
    Memory,
}

impl Default for StorageMode {
    fn default() -> Self {
        Self::Chroma {
            url: "http://localhost:8000".to_string(),
        }
    }
}

/// Where and under which name the document embeddings live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageMode,
    /// Fixed collection name. When unset a fresh name is generated for every
    /// process, see [`StorageConfig::resolve_collection_name`].
    #[serde(default)]
    pub collection_name: Option<String>,
    #[serde(default = "default_collection_prefix")]
    pub collection_prefix: String,
}

fn default_collection_prefix() -> String {
    "ollama-embeddings".to_string()
}

impl StorageConfig {
    /// Returns the configured collection name, or `<prefix>-<uuid>`.
    ///
    /// Call this once at startup and hand the result to the retriever: a
    /// generated name is only stable for the lifetime of the process.
    pub fn resolve_collection_name(&self) -> String {
        match &self.collection_name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => format!("{}-{}", self.collection_prefix, uuid::Uuid::new_v4()),
        }
    }
}

/// HTTP endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    /// Question answered when a request carries no prompt.
    pub default_prompt: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "llama3.1:latest".to_string(),
            base_url: "http://localhost:11434".to_string(),
            temperature: 0.8,
        }
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            embedding_model: "nomic-embed-text:latest".to_string(),
            embedding_dim: 768,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageMode::default(),
            collection_name: None,
            collection_prefix: default_collection_prefix(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            default_prompt: crate::knowledge::MAIN_PROMPT.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from `path` if it exists, otherwise use defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads `path` (or defaults), reads `.env`, then applies environment
    /// overrides.
    pub fn from_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::load_or_default(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies `PORT`, `CHROMADB_PATH` and `OLLAMA_HOST`.
    ///
    /// `lookup` abstracts the environment so overrides can be exercised
    /// without touching process state.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT").filter(|v| !v.is_empty()) {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                key: "PORT",
                value: port.clone(),
            })?;
        }

        if let Some(url) = lookup("CHROMADB_PATH").filter(|v| !v.is_empty()) {
            self.storage.backend = StorageMode::Chroma { url };
        }

        if let Some(host) = lookup("OLLAMA_HOST").filter(|v| !v.is_empty()) {
            self.llm.base_url = host;
        }

        Ok(())
    }
}
