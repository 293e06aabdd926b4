use crate::clients::{http_client, DEFAULT_REQUEST_TIMEOUT};
use crate::config::KeyFromEnv;
use crate::core::LowLevelClient;
use crate::error::{AIError, DeepSeekError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Serialize)]
struct DeepSeekRequest {
    model: String,
    messages: Vec<DeepSeekMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct DeepSeekMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct DeepSeekResponse {
    choices: Vec<DeepSeekChoice>,
}

#[derive(Debug, Deserialize)]
struct DeepSeekChoice {
    message: DeepSeekResponseMessage,
}

#[derive(Debug, Deserialize)]
struct DeepSeekResponseMessage {
    content: String,
}

/// Configuration for DeepSeek (or any OpenAI-compatible chat endpoint)
#[derive(Debug, Clone)]
pub struct DeepSeekConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub json_mode: bool,
    pub request_timeout: Duration,
}

impl Default for DeepSeekConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.deepseek.com/v1".to_string(),
            model: "deepseek-chat".to_string(),
            max_tokens: 8192,
            temperature: 0.0,
            json_mode: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Clone)]
pub struct DeepSeekClient {
    config: DeepSeekConfig,
    client: Client,
}

// Hand-written so the API key never ends up in logs.
impl std::fmt::Debug for DeepSeekClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeepSeekClient")
            .field("model", &self.config.model)
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

impl KeyFromEnv for DeepSeekClient {
    const KEY_NAME: &'static str = "DEEPSEEK_API_KEY";
}

impl DeepSeekClient {
    /// Create a new DeepSeek client with full configuration
    pub fn new(config: DeepSeekConfig) -> Self {
        info!(model = %config.model, "Creating new DeepSeek client");
        let client = http_client(config.request_timeout);
        Self { config, client }
    }

    /// Fill the API key from `DEEPSEEK_API_KEY` (environment or `.env`).
    pub fn from_env(mut config: DeepSeekConfig) -> Result<Self, AIError> {
        config.api_key = Self::require_key().map_err(|_| DeepSeekError::Authentication)?;
        Ok(Self::new(config))
    }

    async fn complete(&self, messages: Vec<DeepSeekMessage>) -> Result<String, AIError> {
        let request = DeepSeekRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            response_format: self.config.json_mode.then_some(ResponseFormat { kind: "json_object" }),
        };

        debug!("Sending request to DeepSeek API");
        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url.trim_end_matches('/')))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP request failed");
                AIError::DeepSeek(DeepSeekError::Http(e.to_string()))
            })?;

        debug!(status = %response.status(), "Received response from DeepSeek API");

        if response.status() == 429 {
            warn!("DeepSeek API rate limit exceeded");
            return Err(AIError::DeepSeek(DeepSeekError::RateLimit));
        }

        if response.status() == 401 {
            error!("DeepSeek API authentication failed");
            return Err(AIError::DeepSeek(DeepSeekError::Authentication));
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %error_text, "DeepSeek API error");
            return Err(AIError::DeepSeek(DeepSeekError::Api(error_text)));
        }

        let deepseek_response: DeepSeekResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse DeepSeek response JSON");
            AIError::DeepSeek(DeepSeekError::Http(e.to_string()))
        })?;

        deepseek_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                error!("No choices in DeepSeek response");
                AIError::DeepSeek(DeepSeekError::Api("No choices in response".to_string()))
            })
    }
}

#[async_trait]
impl LowLevelClient for DeepSeekClient {
    #[instrument(skip(self, prompt), fields(prompt_len = prompt.len(), model = %self.config.model))]
    async fn ask_raw(&self, prompt: String) -> Result<String, AIError> {
        self.complete(vec![DeepSeekMessage { role: "user".to_string(), content: prompt }]).await
    }

    #[instrument(skip(self, system, user), fields(user_len = user.len(), model = %self.config.model))]
    async fn ask_chat(&self, system: String, user: String) -> Result<String, AIError> {
        self.complete(vec![
            DeepSeekMessage { role: "system".to_string(), content: system },
            DeepSeekMessage { role: "user".to_string(), content: user },
        ])
        .await
    }

    fn clone_box(&self) -> Box<dyn LowLevelClient> {
        Box::new(self.clone())
    }
}
