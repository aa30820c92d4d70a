//! Configuration management for the Loreweaver knowledge base.
//!
//! This module handles loading and merging configuration from multiple
//! sources:
//! - Built-in defaults
//! - Config file (`loreweaver.yaml`)
//! - Environment variables (`LOREWEAVER_*`)
//!
//! It also owns backend resolution: the explicit, ordered step that turns
//! the configuration into a sequence of [`BackendDescriptor`] candidates,
//! executed once at startup. Availability is never re-probed on hot paths.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, AppResult};

/// Default snapshot file name, relative to the working directory.
const DEFAULT_SNAPSHOT_FILE: &str = "loreweaver_snapshot.json";

/// Default dimension for the trigram backend.
const DEFAULT_TRIGRAM_DIMENSIONS: usize = 384;

/// Fallback dimension for remote models missing from the dimension table.
const DEFAULT_REMOTE_DIMENSIONS: usize = 1536;

/// Third-party embedding services supported by the remote backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteService {
    OpenAi,
    DashScope,
    HuggingFace,
}

impl RemoteService {
    /// Parse a service name from configuration.
    pub fn parse(name: &str) -> AppResult<Self> {
        match name.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "dashscope" => Ok(Self::DashScope),
            "huggingface" => Ok(Self::HuggingFace),
            other => Err(AppError::Config(format!(
                "Unknown embedding service: '{}'. Supported: openai, dashscope, huggingface",
                other
            ))),
        }
    }

    /// Service name as used in configuration and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::DashScope => "dashscope",
            Self::HuggingFace => "huggingface",
        }
    }

    /// Environment variable consulted for this service's credential.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::DashScope => "DASHSCOPE_API_KEY",
            Self::HuggingFace => "HUGGINGFACE_API_KEY",
        }
    }

    /// Default embedding model for this service.
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "text-embedding-3-small",
            Self::DashScope => "text-embedding-v2",
            Self::HuggingFace => "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2",
        }
    }

    /// Declared embedding dimension for a (service, model) pair.
    ///
    /// The dimension is a fixed property of the model, known before any
    /// request is made; it is never inferred from a response.
    pub fn dimension_for(&self, model: &str) -> Option<usize> {
        let dim = match (self, model) {
            (Self::OpenAi, "text-embedding-ada-002") => 1536,
            (Self::OpenAi, "text-embedding-3-small") => 1536,
            (Self::OpenAi, "text-embedding-3-large") => 3072,
            (Self::DashScope, "text-embedding-v1") => 1536,
            (Self::DashScope, "text-embedding-v2") => 1536,
            (
                Self::HuggingFace,
                "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2",
            ) => 384,
            (Self::HuggingFace, "sentence-transformers/distiluse-base-multilingual-cased") => 512,
            _ => return None,
        };
        Some(dim)
    }
}

/// Embedding backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// Backend kind: "auto", "remote", "local" or "trigram"
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Remote service name (used when the remote backend is selected)
    #[serde(default = "default_service")]
    pub service: String,

    /// Embedding model identifier; service default when absent
    pub model: Option<String>,

    /// Declared dimension override for models missing from the table
    pub dimensions: Option<usize>,

    /// Explicit API key; takes precedence over the environment
    pub api_key: Option<String>,

    /// Environment variable holding the credential; service default when absent
    pub api_key_env: Option<String>,

    /// Custom endpoint override for the remote service
    pub endpoint: Option<String>,

    /// Cache directory for local model files
    pub cache_dir: Option<PathBuf>,

    /// Allow fetching missing local model files from the model hub.
    /// When false, missing files fail fast at construction.
    #[serde(default)]
    pub allow_download: bool,

    /// Dimension for the trigram backend
    #[serde(default = "default_trigram_dimensions")]
    pub trigram_dimensions: usize,
}

fn default_backend() -> String {
    "auto".to_string()
}

fn default_service() -> String {
    "dashscope".to_string()
}

fn default_trigram_dimensions() -> usize {
    DEFAULT_TRIGRAM_DIMENSIONS
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            service: default_service(),
            model: None,
            dimensions: None,
            api_key: None,
            api_key_env: None,
            endpoint: None,
            cache_dir: None,
            allow_download: false,
            trigram_dimensions: DEFAULT_TRIGRAM_DIMENSIONS,
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path of the knowledge base snapshot file
    pub snapshot_path: PathBuf,

    /// Embedding backend settings
    #[serde(default)]
    pub embedding: EmbeddingSettings,

    /// Log level override
    pub log_level: Option<String>,

    /// Disable colored output
    #[serde(default)]
    pub no_color: bool,
}

/// Config file structure (`loreweaver.yaml`).
#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    snapshot_path: Option<PathBuf>,
    embedding: Option<EmbeddingSettings>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_FILE),
            embedding: EmbeddingSettings::default(),
            log_level: None,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, config file and environment.
    ///
    /// Environment variables (highest precedence):
    /// - `LOREWEAVER_CONFIG`: path to the YAML config file
    /// - `LOREWEAVER_SNAPSHOT`: snapshot file path
    /// - `LOREWEAVER_BACKEND`: backend kind (auto/remote/local/trigram)
    /// - `LOREWEAVER_SERVICE`: remote service name
    /// - `LOREWEAVER_MODEL`: embedding model identifier
    /// - `RUST_LOG`: log level
    /// - `NO_COLOR`: disable colored output
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        let config_path = std::env::var("LOREWEAVER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("loreweaver.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        if let Ok(snapshot) = std::env::var("LOREWEAVER_SNAPSHOT") {
            config.snapshot_path = PathBuf::from(snapshot);
        }

        if let Ok(backend) = std::env::var("LOREWEAVER_BACKEND") {
            config.embedding.backend = backend;
        }

        if let Ok(service) = std::env::var("LOREWEAVER_SERVICE") {
            config.embedding.service = service;
        }

        if let Ok(model) = std::env::var("LOREWEAVER_MODEL") {
            config.embedding.model = Some(model);
        }

        config.log_level = std::env::var("RUST_LOG").ok().or(config.log_level);

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &PathBuf) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(snapshot_path) = config_file.snapshot_path {
            result.snapshot_path = snapshot_path;
        }

        if let Some(embedding) = config_file.embedding {
            result.embedding = embedding;
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        Ok(result)
    }

    /// Resolve the remote credential: explicit setting first, then the
    /// configured environment variable, then the service default variable.
    pub fn resolve_api_key(&self, service: RemoteService) -> Option<String> {
        if let Some(ref key) = self.embedding.api_key {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }

        let env_var = self
            .embedding
            .api_key_env
            .clone()
            .unwrap_or_else(|| service.api_key_env().to_string());

        std::env::var(&env_var).ok().filter(|k| !k.is_empty())
    }

    /// Produce the ordered backend candidates for this configuration.
    ///
    /// This is the single configuration-resolution step: the first
    /// candidate that constructs successfully becomes the process-wide
    /// backend, and availability is never re-checked afterwards.
    ///
    /// - `remote`: remote only; a missing credential is a fatal error
    /// - `local`: local encoder only
    /// - `trigram`: trigram only
    /// - `auto`: remote (when a credential is present), then local,
    ///   then trigram
    pub fn backend_candidates(&self) -> AppResult<Vec<BackendDescriptor>> {
        if self.embedding.trigram_dimensions == 0 {
            return Err(AppError::Config(
                "trigram_dimensions must be greater than zero".to_string(),
            ));
        }

        let kind = self.embedding.backend.to_lowercase();
        match kind.as_str() {
            "remote" => {
                let descriptor = self.remote_descriptor()?.ok_or_else(|| {
                    AppError::Config(format!(
                        "Remote embedding backend selected but no API key is available \
                         for service '{}'",
                        self.embedding.service
                    ))
                })?;
                Ok(vec![descriptor])
            }
            "local" => Ok(vec![self.local_descriptor()]),
            "trigram" => Ok(vec![self.trigram_descriptor()]),
            "auto" => {
                let mut candidates = Vec::new();
                if let Some(remote) = self.remote_descriptor()? {
                    candidates.push(remote);
                }
                candidates.push(self.local_descriptor());
                candidates.push(self.trigram_descriptor());
                Ok(candidates)
            }
            other => Err(AppError::Config(format!(
                "Unknown embedding backend: '{}'. Supported: auto, remote, local, trigram",
                other
            ))),
        }
    }

    /// Build the remote descriptor, or `None` when no credential exists.
    fn remote_descriptor(&self) -> AppResult<Option<BackendDescriptor>> {
        let service = RemoteService::parse(&self.embedding.service)?;

        let Some(api_key) = self.resolve_api_key(service) else {
            return Ok(None);
        };

        let model = self
            .embedding
            .model
            .clone()
            .unwrap_or_else(|| service.default_model().to_string());

        let dimension = self
            .embedding
            .dimensions
            .or_else(|| service.dimension_for(&model))
            .unwrap_or(DEFAULT_REMOTE_DIMENSIONS);

        Ok(Some(BackendDescriptor::Remote {
            service,
            model,
            dimension,
            api_key,
            endpoint: self.embedding.endpoint.clone(),
        }))
    }

    fn local_descriptor(&self) -> BackendDescriptor {
        BackendDescriptor::Local {
            model: self.embedding.model.clone(),
            cache_dir: self.embedding.cache_dir.clone(),
            allow_download: self.embedding.allow_download,
        }
    }

    fn trigram_descriptor(&self) -> BackendDescriptor {
        BackendDescriptor::Trigram {
            dimension: self.embedding.trigram_dimensions,
        }
    }
}

/// A fully resolved embedding backend description.
///
/// Produced once at startup by [`AppConfig::backend_candidates`]; the
/// embeddings crate turns it into a concrete backend without consulting
/// the environment again.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendDescriptor {
    /// Remote embedding service
    Remote {
        service: RemoteService,
        model: String,
        dimension: usize,
        api_key: String,
        endpoint: Option<String>,
    },
    /// Local ONNX sequence encoder
    Local {
        model: Option<String>,
        cache_dir: Option<PathBuf>,
        allow_download: bool,
    },
    /// Deterministic trigram-hash encoder
    Trigram { dimension: usize },
}
