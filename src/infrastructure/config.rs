use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::application::services::{DEFAULT_INDEX_MEMO_CAPACITY, DEFAULT_SYSTEM_PROMPT};
use crate::domain::SplitterConfig;

pub const CONFIG_PATH_ENV: &str = "DOC_QA_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Full service configuration: engine settings plus prompt text.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(flatten)]
    pub config: Config,
    pub prompts: PromptsConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub tokenizer: TokenizerConfig,
    pub splitter: SplitterConfig,
    pub retrieval: RetrievalConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origins: vec!["*".to_string()],
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Total deadline for embedding calls; longest silence allowed while a
    /// chat answer streams.
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.1,
            timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Falls back to `llm.base_url` when unset.
    pub base_url: Option<String>,
    pub model: String,
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: "text-embedding-ada-002".to_string(),
            batch_size: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenizerConfig {
    pub encoding: String,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            encoding: "r50k_base".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    /// Built indexes kept in memory across sessions.
    pub index_memo_capacity: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            index_memo_capacity: DEFAULT_INDEX_MEMO_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    File,
    Redis,
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub dir: PathBuf,
    pub redis_url: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::File,
            dir: PathBuf::from(".cache"),
            redis_url: "redis://localhost:6379".to_string(),
        }
    }
}

impl CacheConfig {
    pub fn files_dir(&self) -> PathBuf {
        self.dir.join("files")
    }

    pub fn embeddings_dir(&self) -> PathBuf {
        self.dir.join("embeddings")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Used when `RUST_LOG` is not set.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            filter: "doc_qa=debug,api=debug,tower_http=debug".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PromptsConfig {
    pub system: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl AppConfig {
    /// Reads `$DOC_QA_CONFIG` (or `config.yaml` when present), then applies
    /// environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(raw)?;
        config.config.splitter.validate()?;
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cfg = &mut self.config;
        if let Some(host) = lookup("SERVER_HOST") {
            cfg.server.host = host;
        }
        if let Some(port) = lookup("SERVER_PORT") {
            cfg.server.port = port.parse().context("SERVER_PORT must be a port number")?;
        }
        if let Some(dir) = lookup("CACHE_DIR") {
            cfg.cache.dir = PathBuf::from(dir);
        }
        if let Some(backend) = lookup("CACHE_BACKEND") {
            cfg.cache.backend = serde_yaml::from_str(&backend)
                .with_context(|| format!("unknown CACHE_BACKEND '{backend}'"))?;
        }
        if let Some(url) = lookup("REDIS_URL") {
            cfg.cache.redis_url = url;
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            cfg.llm.base_url = url;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            cfg.logging.format = serde_yaml::from_str(&format)
                .with_context(|| format!("unknown LOG_FORMAT '{format}'"))?;
        }
        Ok(())
    }
}
