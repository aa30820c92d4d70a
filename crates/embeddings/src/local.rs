//! Local ONNX sequence encoder.
//!
//! Loads a pretrained sentence-embedding model from a local cache
//! directory via fastembed. Missing model files fail fast with a
//! configuration error unless downloading from the model hub was
//! explicitly allowed, in which case the fetch happens once at
//! construction and failures there propagate as initialization errors.
//!
//! Compiled without the `local-embeddings` feature, construction always
//! fails with a configuration error so that backend resolution falls
//! through to the next candidate.

#[cfg(feature = "local-embeddings")]
mod native {
    use loreweaver_core::{AppError, AppResult};
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Instant;
    use tracing::info;

    /// Default model when configuration names none.
    const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";

    /// Default cache directory, matching the fastembed convention.
    const DEFAULT_CACHE_DIR: &str = ".fastembed_cache";

    /// Supported local models with their fixed dimensions. The dimension
    /// is a property of the model architecture, declared here rather
    /// than inferred from an encode call.
    fn lookup_model(name: &str) -> AppResult<(fastembed::EmbeddingModel, usize)> {
        match name {
            "all-MiniLM-L6-v2" => Ok((fastembed::EmbeddingModel::AllMiniLML6V2, 384)),
            "bge-small-en-v1.5" => Ok((fastembed::EmbeddingModel::BGESmallENV15, 384)),
            "bge-base-en-v1.5" => Ok((fastembed::EmbeddingModel::BGEBaseENV15, 768)),
            "nomic-embed-text-v1.5" => Ok((fastembed::EmbeddingModel::NomicEmbedTextV15, 768)),
            other => Err(AppError::Config(format!(
                "Unknown local embedding model: '{}'. Supported: all-MiniLM-L6-v2, \
                 bge-small-en-v1.5, bge-base-en-v1.5, nomic-embed-text-v1.5",
                other
            ))),
        }
    }

    /// Local embedding encoder backed by an ONNX model.
    #[derive(Clone)]
    pub struct LocalEncoder {
        model: Arc<fastembed::TextEmbedding>,
        model_name: String,
        dimension: usize,
    }

    impl std::fmt::Debug for LocalEncoder {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("LocalEncoder")
                .field("model_name", &self.model_name)
                .field("dimension", &self.dimension)
                .finish()
        }
    }

    impl LocalEncoder {
        /// Load the encoder from the cache directory.
        ///
        /// With `allow_download` false and an empty cache this fails fast;
        /// with it true, fastembed fetches the model files from the hub
        /// and persists them under the cache directory before returning.
        pub async fn new(
            model: Option<String>,
            cache_dir: Option<PathBuf>,
            allow_download: bool,
        ) -> AppResult<Self> {
            let model_name = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
            let (embedding_model, dimension) = lookup_model(&model_name)?;

            let cache_dir = cache_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR));
            if !allow_download && !cache_populated(&cache_dir) {
                return Err(AppError::Config(format!(
                    "Local model files for '{}' not found under {:?}; \
                     place the model files there or enable allow_download",
                    model_name, cache_dir
                )));
            }

            let start = Instant::now();
            let name_for_log = model_name.clone();

            // ONNX model loading is blocking work.
            let model = tokio::task::spawn_blocking(move || {
                let options = fastembed::InitOptions::new(embedding_model)
                    .with_cache_dir(cache_dir)
                    .with_show_download_progress(false);
                fastembed::TextEmbedding::try_new(options)
            })
            .await
            .map_err(|e| AppError::Other(format!("Model load task failed: {}", e)))?
            .map_err(|e| {
                AppError::Embedding(format!("Failed to load local model: {}", e))
            })?;

            info!(
                model = %name_for_log,
                dimension,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Local embedding model loaded"
            );

            Ok(Self {
                model: Arc::new(model),
                model_name: name_for_log,
                dimension,
            })
        }

        /// Declared embedding dimension.
        pub fn dimension(&self) -> usize {
            self.dimension
        }

        /// Model identifier.
        pub fn model_name(&self) -> &str {
            &self.model_name
        }

        /// Encode a batch of texts, one vector per input.
        pub async fn encode(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }

            let model = Arc::clone(&self.model);
            let owned: Vec<String> = texts.to_vec();
            let expected = texts.len();
            let dimension = self.dimension;

            let vectors = tokio::task::spawn_blocking(move || model.embed(owned, None))
                .await
                .map_err(|e| AppError::Other(format!("Encode task failed: {}", e)))?
                .map_err(|e| AppError::Embedding(format!("Local encode failed: {}", e)))?;

            if vectors.len() != expected {
                return Err(AppError::Embedding(format!(
                    "Model returned {} embeddings for {} inputs",
                    vectors.len(),
                    expected
                )));
            }

            for vector in &vectors {
                if vector.len() != dimension {
                    return Err(AppError::Embedding(format!(
                        "Model returned {} dimensions, expected {}",
                        vector.len(),
                        dimension
                    )));
                }
            }

            Ok(vectors)
        }
    }

    /// True when the cache directory exists and contains anything.
    fn cache_populated(dir: &std::path::Path) -> bool {
        std::fs::read_dir(dir)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false)
    }
}

#[cfg(feature = "local-embeddings")]
pub use native::LocalEncoder;

#[cfg(not(feature = "local-embeddings"))]
mod stub {
    use loreweaver_core::{AppError, AppResult};
    use std::path::PathBuf;

    /// Placeholder encoder for builds without the `local-embeddings`
    /// feature. Construction always fails, so no instance can exist;
    /// the uninhabited field lets the accessors compile without panics.
    #[derive(Debug, Clone)]
    pub struct LocalEncoder {
        never: std::convert::Infallible,
    }

    impl LocalEncoder {
        pub async fn new(
            _model: Option<String>,
            _cache_dir: Option<PathBuf>,
            _allow_download: bool,
        ) -> AppResult<Self> {
            Err(AppError::Config(
                "Local embedding backend requires the 'local-embeddings' feature".to_string(),
            ))
        }

        pub fn dimension(&self) -> usize {
            match self.never {}
        }

        pub fn model_name(&self) -> &str {
            match self.never {}
        }

        pub async fn encode(&self, _texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            match self.never {}
        }
    }
}

#[cfg(not(feature = "local-embeddings"))]
pub use stub::LocalEncoder;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_model_files_fail_fast() {
        let temp = tempfile::TempDir::new().unwrap();
        let empty_cache = temp.path().join("models");

        // Works in both build modes: without the feature construction is
        // always a configuration error; with it, the empty cache and
        // forbidden download also fail fast.
        let result = LocalEncoder::new(None, Some(empty_cache), false).await;
        assert!(result.is_err());
    }

    #[cfg(feature = "local-embeddings")]
    #[tokio::test]
    async fn test_unknown_model_rejected() {
        let result = LocalEncoder::new(Some("not-a-model".to_string()), None, true).await;
        assert!(result.is_err());
    }
}
