//! Embedding backends for the Loreweaver knowledge base.
//!
//! A backend converts text into fixed-dimension vectors. Three
//! interchangeable implementations exist: a local ONNX encoder, a remote
//! embedding-service client and a deterministic trigram encoder. The
//! dispatch is an explicit tagged choice rather than a trait object, so
//! the knowledge base's dimension-reconciliation logic can stay
//! backend-agnostic while construction remains a one-time, ordered
//! resolution step.

pub mod local;
pub mod remote;
pub mod trigram;

pub use local::LocalEncoder;
pub use remote::RemoteClient;
pub use trigram::TrigramEncoder;

use loreweaver_core::{AppError, AppResult, BackendDescriptor};
use tracing::{info, warn};

/// An embedding backend: `dimension` is a fixed property known before
/// any call, and `encode` returns exactly one vector of that length per
/// input text, deterministic for a fixed configuration.
#[derive(Debug, Clone)]
pub enum EmbeddingBackend {
    Local(LocalEncoder),
    Remote(RemoteClient),
    Trigram(TrigramEncoder),
}

impl EmbeddingBackend {
    /// Construct a backend from a resolved descriptor.
    pub async fn from_descriptor(descriptor: &BackendDescriptor) -> AppResult<Self> {
        match descriptor {
            BackendDescriptor::Remote {
                service,
                model,
                dimension,
                api_key,
                endpoint,
            } => {
                let client = RemoteClient::new(
                    *service,
                    model.clone(),
                    *dimension,
                    api_key.clone(),
                    endpoint.clone(),
                )?;
                Ok(Self::Remote(client))
            }
            BackendDescriptor::Local {
                model,
                cache_dir,
                allow_download,
            } => {
                let encoder =
                    LocalEncoder::new(model.clone(), cache_dir.clone(), *allow_download).await?;
                Ok(Self::Local(encoder))
            }
            BackendDescriptor::Trigram { dimension } => {
                if *dimension == 0 {
                    return Err(AppError::Config(
                        "Trigram backend dimension must be greater than zero".to_string(),
                    ));
                }
                Ok(Self::Trigram(TrigramEncoder::new(*dimension)))
            }
        }
    }

    /// Try descriptor candidates in order and keep the first that
    /// constructs. Executed once at startup; failures are logged and the
    /// last error surfaces if every candidate is unusable.
    pub async fn resolve(candidates: &[BackendDescriptor]) -> AppResult<Self> {
        let mut last_error = None;

        for descriptor in candidates {
            match Self::from_descriptor(descriptor).await {
                Ok(backend) => {
                    info!(
                        backend = backend.name(),
                        dimension = backend.dimension(),
                        "Embedding backend resolved"
                    );
                    return Ok(backend);
                }
                Err(e) => {
                    warn!("Embedding backend candidate failed to initialize: {}", e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            AppError::Config("No embedding backend candidates configured".to_string())
        }))
    }

    /// Backend kind for logs and confirmation messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::Remote(_) => "remote",
            Self::Trigram(_) => "trigram",
        }
    }

    /// Declared embedding dimension of this backend.
    pub fn dimension(&self) -> usize {
        match self {
            Self::Local(encoder) => encoder.dimension(),
            Self::Remote(client) => client.dimension(),
            Self::Trigram(encoder) => encoder.dimension(),
        }
    }

    /// Encode a batch of texts into one vector per input.
    ///
    /// The remote variant degrades to zero-vectors on request failure
    /// instead of erroring; local encode failures propagate.
    pub async fn encode(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        match self {
            Self::Local(encoder) => encoder.encode(texts).await,
            Self::Remote(client) => Ok(client.encode(texts).await),
            Self::Trigram(encoder) => Ok(encoder.encode(texts)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_trigram() {
        let candidates = vec![BackendDescriptor::Trigram { dimension: 96 }];
        let backend = EmbeddingBackend::resolve(&candidates).await.unwrap();

        assert_eq!(backend.name(), "trigram");
        assert_eq!(backend.dimension(), 96);
    }

    #[tokio::test]
    async fn test_resolve_falls_through_failed_candidates() {
        let temp = tempfile::TempDir::new().unwrap();

        // The local candidate fails (empty cache, downloads forbidden, or
        // feature disabled) and resolution falls through to trigram.
        let candidates = vec![
            BackendDescriptor::Local {
                model: None,
                cache_dir: Some(temp.path().join("empty")),
                allow_download: false,
            },
            BackendDescriptor::Trigram { dimension: 64 },
        ];

        let backend = EmbeddingBackend::resolve(&candidates).await.unwrap();
        assert_eq!(backend.name(), "trigram");
    }

    #[tokio::test]
    async fn test_zero_dimension_descriptor_rejected() {
        let result =
            EmbeddingBackend::from_descriptor(&BackendDescriptor::Trigram { dimension: 0 }).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_resolve_no_candidates() {
        let result = EmbeddingBackend::resolve(&[]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_encode_shape() {
        let backend = EmbeddingBackend::Trigram(TrigramEncoder::new(48));
        let texts = vec!["ancient oath".to_string(), "broken crown".to_string()];

        let vectors = backend.encode(&texts).await.unwrap();
        assert_eq!(vectors.len(), 2);
        assert!(vectors.iter().all(|v| v.len() == 48));
    }

    #[tokio::test]
    async fn test_encode_empty_batch() {
        let backend = EmbeddingBackend::Trigram(TrigramEncoder::new(48));
        let vectors = backend.encode(&[]).await.unwrap();
        assert!(vectors.is_empty());
    }
}
