//! Remote embedding-service client.
//!
//! Calls one of several third-party embedding APIs (OpenAI, DashScope,
//! HuggingFace Inference) selected by configuration. Requests carry a
//! timeout and a bounded retry with exponential backoff; once retries are
//! exhausted the client returns zero-vectors of the declared dimension
//! instead of raising, so a transient API outage degrades retrieval
//! quality rather than crashing the caller.

use loreweaver_core::{AppError, AppResult, RemoteService};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum attempts for a failing request
const MAX_RETRIES: u32 = 3;

/// Initial backoff duration in milliseconds
const INITIAL_BACKOFF_MS: u64 = 100;

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 30;

const OPENAI_DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";
const DASHSCOPE_DEFAULT_ENDPOINT: &str =
    "https://dashscope.aliyuncs.com/api/v1/services/embeddings/text-embedding/text-embedding";
const HUGGINGFACE_DEFAULT_ENDPOINT: &str =
    "https://api-inference.huggingface.co/pipeline/feature-extraction";

/// Client for a remote embedding service.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    client: Client,
    service: RemoteService,
    model: String,
    dimension: usize,
    api_key: String,
    endpoint: Option<String>,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbedding {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct DashScopeRequest<'a> {
    model: &'a str,
    input: DashScopeInput<'a>,
}

#[derive(Debug, Serialize)]
struct DashScopeInput<'a> {
    texts: &'a [String],
}

#[derive(Debug, Deserialize)]
struct DashScopeResponse {
    output: DashScopeOutput,
}

#[derive(Debug, Deserialize)]
struct DashScopeOutput {
    embeddings: Vec<DashScopeEmbedding>,
}

#[derive(Debug, Deserialize)]
struct DashScopeEmbedding {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct HuggingFaceRequest<'a> {
    inputs: &'a str,
}

impl RemoteClient {
    /// Create a new remote client.
    ///
    /// A missing credential is a configuration error: the system cannot
    /// function with a remote backend that can never authenticate.
    pub fn new(
        service: RemoteService,
        model: impl Into<String>,
        dimension: usize,
        api_key: impl Into<String>,
        endpoint: Option<String>,
    ) -> AppResult<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(AppError::Config(format!(
                "No API key configured for embedding service '{}'",
                service.as_str()
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Embedding(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            service,
            model: model.into(),
            dimension,
            api_key,
            endpoint,
        })
    }

    /// Declared embedding dimension (fixed property of the model).
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Service identifier for logs.
    pub fn service_name(&self) -> &'static str {
        self.service.as_str()
    }

    /// Model identifier.
    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// Encode a batch of texts, one vector per input.
    ///
    /// Never fails: after the bounded retries a failing request yields
    /// zero-vectors of the declared dimension and a warning.
    pub async fn encode(&self, texts: &[String]) -> Vec<Vec<f32>> {
        if texts.is_empty() {
            return Vec::new();
        }

        match self.service {
            RemoteService::OpenAi | RemoteService::DashScope => {
                match self.batch_with_retries(texts).await {
                    Ok(vectors) => vectors,
                    Err(e) => {
                        warn!(
                            service = self.service.as_str(),
                            model = %self.model,
                            batch = texts.len(),
                            "Embedding request failed after {} attempts, \
                             returning zero-vectors: {}",
                            MAX_RETRIES,
                            e
                        );
                        self.zero_vectors(texts.len())
                    }
                }
            }
            // The HuggingFace pipeline accepts one text per request, so
            // failures degrade per text rather than per batch.
            RemoteService::HuggingFace => {
                let mut vectors = Vec::with_capacity(texts.len());
                for text in texts {
                    match self.single_with_retries(text).await {
                        Ok(vector) => vectors.push(vector),
                        Err(e) => {
                            warn!(
                                model = %self.model,
                                "HuggingFace embedding failed, using zero-vector: {}",
                                e
                            );
                            vectors.push(vec![0.0; self.dimension]);
                        }
                    }
                }
                vectors
            }
        }
    }

    async fn batch_with_retries(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let mut attempt = 0;
        loop {
            match self.batch_once(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) => {
                    attempt += 1;
                    if attempt >= MAX_RETRIES {
                        return Err(e);
                    }
                    let backoff_ms = INITIAL_BACKOFF_MS * 2_u64.pow(attempt);
                    debug!(
                        "Embedding request failed (attempt {}/{}), retrying in {}ms: {}",
                        attempt, MAX_RETRIES, backoff_ms, e
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
            }
        }
    }

    async fn single_with_retries(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut attempt = 0;
        loop {
            match self.huggingface_once(text).await {
                Ok(vector) => return Ok(vector),
                Err(e) => {
                    attempt += 1;
                    if attempt >= MAX_RETRIES {
                        return Err(e);
                    }
                    let backoff_ms = INITIAL_BACKOFF_MS * 2_u64.pow(attempt);
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
            }
        }
    }

    async fn batch_once(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let vectors = match self.service {
            RemoteService::OpenAi => {
                let base = self
                    .endpoint
                    .as_deref()
                    .unwrap_or(OPENAI_DEFAULT_ENDPOINT)
                    .trim_end_matches('/');
                let url = format!("{}/embeddings", base);

                let body: OpenAiResponse = self
                    .post_json(
                        &url,
                        &OpenAiRequest {
                            model: &self.model,
                            input: texts,
                        },
                    )
                    .await?;

                body.data.into_iter().map(|e| e.embedding).collect()
            }
            RemoteService::DashScope => {
                let url = self
                    .endpoint
                    .as_deref()
                    .unwrap_or(DASHSCOPE_DEFAULT_ENDPOINT)
                    .to_string();

                let body: DashScopeResponse = self
                    .post_json(
                        &url,
                        &DashScopeRequest {
                            model: &self.model,
                            input: DashScopeInput { texts },
                        },
                    )
                    .await?;

                body.output
                    .embeddings
                    .into_iter()
                    .map(|e| e.embedding)
                    .collect()
            }
            // Not routed here; HuggingFace requests are issued per text.
            RemoteService::HuggingFace => {
                return Err(AppError::Embedding(
                    "HuggingFace does not support batch requests".to_string(),
                ))
            }
        };

        self.validate_batch(texts.len(), vectors)
    }

    async fn huggingface_once(&self, text: &str) -> AppResult<Vec<f32>> {
        let base = self
            .endpoint
            .as_deref()
            .unwrap_or(HUGGINGFACE_DEFAULT_ENDPOINT)
            .trim_end_matches('/');
        let url = format!("{}/{}", base, self.model);

        let vector: Vec<f32> = self.post_json(&url, &HuggingFaceRequest { inputs: text }).await?;

        if vector.len() != self.dimension {
            return Err(AppError::Embedding(format!(
                "Service returned {} dimensions, expected {}",
                vector.len(),
                self.dimension
            )));
        }

        Ok(vector)
    }

    async fn post_json<B, R>(&self, url: &str, body: &B) -> AppResult<R>
    where
        B: Serialize,
        R: for<'de> Deserialize<'de>,
    {
        debug!(service = self.service.as_str(), url, "Sending embedding request");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Embedding(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(AppError::Embedding(format!(
                "{} API error ({}): {}",
                self.service.as_str(),
                status,
                error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Embedding(format!("Failed to parse response: {}", e)))
    }

    /// Check count and per-vector dimension of a batch response.
    fn validate_batch(
        &self,
        expected: usize,
        vectors: Vec<Vec<f32>>,
    ) -> AppResult<Vec<Vec<f32>>> {
        if vectors.len() != expected {
            return Err(AppError::Embedding(format!(
                "Service returned {} embeddings for {} inputs",
                vectors.len(),
                expected
            )));
        }

        for vector in &vectors {
            if vector.len() != self.dimension {
                return Err(AppError::Embedding(format!(
                    "Service returned {} dimensions, expected {}",
                    vector.len(),
                    self.dimension
                )));
            }
        }

        Ok(vectors)
    }

    fn zero_vectors(&self, count: usize) -> Vec<Vec<f32>> {
        vec![vec![0.0; self.dimension]; count]
    }
}
