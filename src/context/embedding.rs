use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::clients::{http_client, DEFAULT_REQUEST_TIMEOUT};
use crate::error::QuizError;

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, QuizError>;

    /// Embed several texts, in order. Override when the backend batches.
    async fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, QuizError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

#[derive(Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize, Debug)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

/// Embeddings from a local Ollama server's `/api/embeddings`.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: HttpClient,
    endpoint: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: http_client(DEFAULT_REQUEST_TIMEOUT),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    #[instrument(target = "rag_quiz::context", skip(self, text), fields(model = %self.model, len = text.len()))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>, QuizError> {
        let url = format!("{}/api/embeddings", self.endpoint);
        let response = self
            .client
            .post(&url)
            .json(&OllamaEmbeddingRequest { model: &self.model, prompt: text })
            .send()
            .await
            .map_err(|e| QuizError::Embedding(format!("Ollama request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QuizError::Embedding(format!("Ollama returned {}: {}", status, body)));
        }

        let parsed = response
            .json::<OllamaEmbeddingResponse>()
            .await
            .map_err(|e| QuizError::Embedding(format!("Ollama response deserialization failed: {}", e)))?;
        if parsed.embedding.is_empty() {
            return Err(QuizError::Embedding(format!("model {} returned an empty embedding", self.model)));
        }
        debug!(target: "rag_quiz::context", dims = parsed.embedding.len(), "embedded");
        Ok(parsed.embedding)
    }
}

/// Offline embedder: lowercase word tokens hashed into a fixed number of
/// buckets, L2-normalised. Deterministic across runs and platforms.
#[derive(Debug, Clone, Copy)]
pub struct HashingEmbedder {
    dims: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dims];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let bucket = (fnv1a(&token.to_lowercase()) % self.dims as u64) as usize;
            v[bucket] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, b| (hash ^ b as u64).wrapping_mul(0x0100_0000_01b3))
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, QuizError> {
        Ok(self.vector(text))
    }
}

#[async_trait]
impl Embedder for Box<dyn Embedder> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, QuizError> {
        (**self).embed(text).await
    }

    async fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, QuizError> {
        (**self).embed_all(texts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hashing_is_deterministic_and_normalised() {
        let e = HashingEmbedder::default();
        let a = e.embed("Ownership and Borrowing").await.unwrap();
        let b = e.embed("ownership and borrowing").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 256);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn empty_text_is_zero_vector() {
        let v = HashingEmbedder::new(8).embed("  ").await.unwrap();
        assert_eq!(v, vec![0.0; 8]);
    }

    #[tokio::test]
    async fn embed_all_keeps_order() {
        let e = HashingEmbedder::new(16);
        let texts = vec!["alpha".to_string(), "beta".to_string()];
        let all = e.embed_all(&texts).await.unwrap();
        assert_eq!(all, vec![e.vector("alpha"), e.vector("beta")]);
    }

    #[tokio::test]
    async fn unreachable_ollama_is_embedding_error() {
        let e = OllamaEmbedder::new("http://127.0.0.1:9", "all-minilm");
        assert!(matches!(e.embed("x").await, Err(QuizError::Embedding(_))));
    }

    #[tokio::test]
    async fn stalled_ollama_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let accepted = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let e = OllamaEmbedder::new(endpoint, "all-minilm").with_timeout(Duration::from_millis(50));
        let outcome = tokio::time::timeout(Duration::from_secs(5), e.embed("x")).await;
        assert!(matches!(outcome, Ok(Err(QuizError::Embedding(_)))));
        accepted.abort();
    }
}
