//! Embedding gateway: live provider with deterministic fallback.
//!
//! The live path calls an OpenAI-compatible embeddings endpoint with
//! bounded retries (exponential backoff plus jitter on rate limits,
//! timeouts, and 5xx). When the provider is unconfigured or retries are
//! exhausted, a deterministic pseudo-random vector seeded from a stable
//! hash of the input keeps the pipeline functional; ranking quality
//! degrades but nothing breaks.

use engram_protocol::EMBEDDING_DIM;
use pgvector::Vector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, warn};

const EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
const EMBEDDING_MODEL: &str = "text-embedding-3-small";
const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_millis(250);

/// Gateway configuration, read from the environment at startup.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingConfig {
    /// Provider API key (`OPENAI_API_KEY`); deterministic fallback when
    /// absent.
    pub api_key: Option<String>,
    /// Override for the provider endpoint (tests, proxies).
    pub endpoint: Option<String>,
}

impl EmbeddingConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            endpoint: None,
        }
    }
}

/// The embedding provider, selected once at startup.
pub enum EmbeddingGateway {
    Live(OpenAiEmbedder),
    Deterministic(DeterministicEmbedder),
}

impl EmbeddingGateway {
    pub fn from_config(config: EmbeddingConfig) -> Self {
        match config.api_key {
            Some(key) => {
                debug!(model = EMBEDDING_MODEL, "embedding gateway: live provider");
                Self::Live(OpenAiEmbedder::new(key, config.endpoint))
            }
            None => {
                warn!("no embedding key configured, using deterministic fallback");
                Self::Deterministic(DeterministicEmbedder)
            }
        }
    }

    /// Embed one text into a unit vector of [`EMBEDDING_DIM`] dimensions.
    ///
    /// This call performs no database I/O and must not be made while
    /// holding a pool connection.
    pub async fn embed(&self, text: &str) -> Vector {
        match self {
            Self::Live(live) => match live.embed(text).await {
                Ok(vector) => vector,
                Err(err) => {
                    warn!(%err, "embedding provider failed, falling back to deterministic");
                    DeterministicEmbedder.embed(text)
                }
            },
            Self::Deterministic(det) => det.embed(text),
        }
    }
}

/// Live provider client.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(api_key: String, endpoint: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            api_key,
            endpoint: endpoint.unwrap_or_else(|| EMBEDDINGS_URL.to_string()),
        }
    }

    /// Call the provider with bounded retries.
    pub async fn embed(&self, text: &str) -> Result<Vector, reqwest::Error> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.request(text).await {
                Ok(vector) => return Ok(vector),
                Err(err) if attempt < MAX_ATTEMPTS && is_transient(&err) => {
                    let backoff = BACKOFF_BASE * 2u32.pow(attempt - 1)
                        + Duration::from_millis(rand::thread_rng().gen_range(0..100));
                    debug!(attempt, backoff_ms = backoff.as_millis() as u64, %err,
                           "transient embedding failure, retrying");
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn request(&self, text: &str) -> Result<Vector, reqwest::Error> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": EMBEDDING_MODEL,
                "input": text,
            }))
            .send()
            .await?
            .error_for_status()?;

        let body: EmbeddingsResponse = response.json().await?;
        let embedding = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .unwrap_or_default();
        Ok(Vector::from(embedding))
    }
}

fn is_transient(err: &reqwest::Error) -> bool {
    if err.is_timeout() || err.is_connect() {
        return true;
    }
    match err.status() {
        Some(status) => status.as_u16() == 429 || status.is_server_error(),
        None => false,
    }
}

/// Deterministic fallback: a unit vector seeded from a stable hash of the
/// input, so equal texts always embed identically.
pub struct DeterministicEmbedder;

impl DeterministicEmbedder {
    pub fn embed(&self, text: &str) -> Vector {
        let digest = Sha256::digest(text.as_bytes());
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&digest);
        let mut rng = StdRng::from_seed(seed);

        let mut values: Vec<f32> = (0..EMBEDDING_DIM)
            .map(|_| rng.gen_range(-1.0f32..1.0))
            .collect();
        let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut values {
                *v /= norm;
            }
        }
        Vector::from(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_embeddings_are_stable() {
        let a = DeterministicEmbedder.embed("the same text");
        let b = DeterministicEmbedder.embed("the same text");
        assert_eq!(a.as_slice(), b.as_slice());
    }

    #[test]
    fn deterministic_embeddings_differ_by_input() {
        let a = DeterministicEmbedder.embed("text one");
        let b = DeterministicEmbedder.embed("text two");
        assert_ne!(a.as_slice(), b.as_slice());
    }

    #[test]
    fn deterministic_embeddings_are_unit_vectors() {
        let v = DeterministicEmbedder.embed("normalise me");
        assert_eq!(v.as_slice().len(), EMBEDDING_DIM);
        let norm: f32 = v.as_slice().iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4, "norm was {}", norm);
    }

    #[test]
    fn gateway_without_key_is_deterministic() {
        let gateway = EmbeddingGateway::from_config(EmbeddingConfig::default());
        assert!(matches!(gateway, EmbeddingGateway::Deterministic(_)));
    }
}
