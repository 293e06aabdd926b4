//! Environment-driven configuration.
//!
//! `.env` is loaded once (silently ignored when absent), then every setting
//! falls back to a default that matches a stock local Ollama install.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::clients::{ClientType, DEFAULT_REQUEST_TIMEOUT};
use crate::core::RetryPolicy;
use crate::planner::MAX_QUESTIONS;

/// Trait for types that can retrieve their configuration key from environment variables
pub trait KeyFromEnv {
    /// The environment variable name for this client's API key
    const KEY_NAME: &'static str;

    /// Find the API key by checking `.env` and then the process environment
    fn find_key() -> Option<String> {
        let _ = dotenvy::dotenv();
        env::var(Self::KEY_NAME).ok().filter(|k| !k.trim().is_empty())
    }

    /// Like `find_key`, but names the missing variable on failure.
    fn require_key() -> Result<String, String> {
        Self::find_key().ok_or_else(|| format!("environment variable {} is not set", Self::KEY_NAME))
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub client: ClientType,
    pub ollama_endpoint: String,
    pub quiz_model: String,
    pub embedding_model: String,
    /// `false` selects the offline hashing embedder.
    pub use_ollama_embeddings: bool,
    pub bind_address: String,
    pub retry: RetryPolicy,
    pub max_upload_bytes: usize,
    pub retrieval_k: usize,
    pub transcript_dir: Option<String>,
    /// Largest question count a single request may ask for.
    pub max_questions: usize,
    /// Deadline for the question-count call. `None` waits indefinitely.
    pub intent_timeout: Option<Duration>,
    /// Per-request deadline on the underlying HTTP clients.
    pub request_timeout: Duration,
    /// Browser origins allowed to call the API.
    pub cors_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            client: ClientType::Ollama,
            ollama_endpoint: "http://localhost:11434".to_string(),
            quiz_model: "llama3.2".to_string(),
            embedding_model: "all-minilm".to_string(),
            use_ollama_embeddings: true,
            bind_address: "127.0.0.1:8000".to_string(),
            retry: RetryPolicy::default(),
            max_upload_bytes: 20 * 1024 * 1024,
            retrieval_k: 4,
            transcript_dir: None,
            max_questions: MAX_QUESTIONS,
            intent_timeout: Some(Duration::from_secs(60)),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        let client = match env::var("QUIZ_CLIENT") {
            Ok(raw) => ClientType::from_str(&raw)?,
            Err(_) => defaults.client,
        };

        let mut retry = defaults.retry.clone();
        if let Some(secs) = parse_var::<u64>("QUIZ_ATTEMPT_TIMEOUT_SECS")? {
            retry.attempt_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(attempts) = parse_var::<usize>("QUIZ_MAX_ATTEMPTS")? {
            retry.max_attempts = attempts.max(1);
        }
        if let Some(ms) = parse_var::<u64>("QUIZ_RETRY_BACKOFF_MS")? {
            retry.backoff = Duration::from_millis(ms);
        }

        let intent_timeout = match parse_var::<u64>("QUIZ_INTENT_TIMEOUT_SECS")? {
            Some(secs) => (secs > 0).then(|| Duration::from_secs(secs)),
            None => defaults.intent_timeout,
        };
        let request_timeout = parse_var::<u64>("QUIZ_REQUEST_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);
        let cors_origins = match env::var("QUIZ_CORS_ORIGINS") {
            Ok(raw) => split_list(&raw),
            Err(_) => defaults.cors_origins,
        };

        let embedder = env::var("QUIZ_EMBEDDER").unwrap_or_else(|_| "ollama".to_string());

        Ok(Self {
            client,
            ollama_endpoint: env::var("OLLAMA_ENDPOINT").unwrap_or(defaults.ollama_endpoint),
            quiz_model: env::var("QUIZ_MODEL").unwrap_or(defaults.quiz_model),
            embedding_model: env::var("EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            use_ollama_embeddings: !embedder.eq_ignore_ascii_case("hashing"),
            bind_address: env::var("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            retry,
            max_upload_bytes: parse_var("QUIZ_MAX_UPLOAD_BYTES")?.unwrap_or(defaults.max_upload_bytes),
            retrieval_k: parse_var("QUIZ_RETRIEVAL_K")?.unwrap_or(defaults.retrieval_k),
            transcript_dir: env::var("QUIZ_TRANSCRIPT_DIR").ok().filter(|d| !d.is_empty()),
            max_questions: parse_var("QUIZ_MAX_QUESTIONS")?.unwrap_or(defaults.max_questions),
            intent_timeout,
            request_timeout,
            cors_origins,
        })
    }
}

/// Comma-separated list, blanks dropped.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>, String> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| format!("{} has an invalid value: {:?}", name, raw)),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_var_reports_bad_values() {
        env::set_var("RAG_QUIZ_TEST_BAD_NUMBER", "twelve");
        let err = parse_var::<usize>("RAG_QUIZ_TEST_BAD_NUMBER").unwrap_err();
        assert!(err.contains("RAG_QUIZ_TEST_BAD_NUMBER"));
        assert_eq!(parse_var::<usize>("RAG_QUIZ_TEST_UNSET_VARIABLE").unwrap(), None);
    }

    #[test]
    fn defaults_target_local_ollama() {
        let config = AppConfig::default();
        assert_eq!(config.client, ClientType::Ollama);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retrieval_k, 4);
        assert_eq!(config.max_questions, 100);
        assert_eq!(config.intent_timeout, Some(Duration::from_secs(60)));
        assert!(config.cors_origins.iter().any(|o| o == "http://localhost:5173"));
    }

    #[test]
    fn origin_list_skips_blanks() {
        assert_eq!(
            split_list(" https://quiz.example.com, ,http://localhost:3000 "),
            vec!["https://quiz.example.com", "http://localhost:3000"]
        );
        assert!(split_list("").is_empty());
    }
}
