use crate::clients::{http_client, DEFAULT_REQUEST_TIMEOUT};
use crate::core::LowLevelClient;
use crate::error::{AIError, OllamaError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, instrument};

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: i32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

/// Configuration for a local Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub num_predict: i32,
    /// Ask the server to constrain output to JSON.
    pub json_format: bool,
    pub request_timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            temperature: 0.0,
            num_predict: 8192,
            json_format: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl OllamaConfig {
    pub fn with_json_format(mut self, json_format: bool) -> Self {
        self.json_format = json_format;
        self
    }
}

#[derive(Clone, Debug)]
pub struct OllamaClient {
    config: OllamaConfig,
    client: Client,
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new(OllamaConfig::default())
    }
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Self {
        info!(model = %config.model, endpoint = %config.endpoint, json = config.json_format, "Creating new Ollama client");
        let client = http_client(config.request_timeout);
        Self { config, client }
    }

    async fn chat(&self, messages: Vec<OllamaMessage>) -> Result<String, AIError> {
        let request = OllamaChatRequest {
            model: self.config.model.clone(),
            messages,
            stream: false,
            format: self.config.json_format.then_some("json"),
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_predict: self.config.num_predict,
            },
        };

        let url = format!("{}/api/chat", self.config.endpoint.trim_end_matches('/'));
        debug!(%url, "Sending request to Ollama");
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP request failed");
                AIError::Ollama(OllamaError::Http(e.to_string()))
            })?;

        debug!(status = %response.status(), "Received response from Ollama");

        if response.status() == 404 {
            error!(model = %self.config.model, "Ollama model not found");
            return Err(AIError::Ollama(OllamaError::ModelNotFound(self.config.model.clone())));
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %error_text, "Ollama API error");
            return Err(AIError::Ollama(OllamaError::Api(error_text)));
        }

        let parsed: OllamaChatResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse Ollama response JSON");
            AIError::Ollama(OllamaError::Http(e.to_string()))
        })?;

        info!(response_len = parsed.message.content.len(), "Successfully received Ollama response");
        Ok(parsed.message.content)
    }
}

#[async_trait]
impl LowLevelClient for OllamaClient {
    #[instrument(skip(self, prompt), fields(prompt_len = prompt.len(), model = %self.config.model))]
    async fn ask_raw(&self, prompt: String) -> Result<String, AIError> {
        self.chat(vec![OllamaMessage { role: "user", content: prompt }]).await
    }

    #[instrument(skip(self, system, user), fields(user_len = user.len(), model = %self.config.model))]
    async fn ask_chat(&self, system: String, user: String) -> Result<String, AIError> {
        self.chat(vec![
            OllamaMessage { role: "system", content: system },
            OllamaMessage { role: "user", content: user },
        ])
        .await
    }

    fn clone_box(&self) -> Box<dyn LowLevelClient> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_format_only_when_requested() {
        let body = |json_format| {
            serde_json::to_value(OllamaChatRequest {
                model: "m".into(),
                messages: vec![],
                stream: false,
                format: OllamaConfig::default().with_json_format(json_format).json_format.then_some("json"),
                options: OllamaOptions { temperature: 0.0, num_predict: 10 },
            })
            .unwrap()
        };
        assert_eq!(body(true)["format"], "json");
        assert!(body(false).get("format").is_none());
    }

    #[tokio::test]
    async fn silent_server_hits_request_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let accepted = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = OllamaClient::new(OllamaConfig {
            endpoint,
            request_timeout: Duration::from_millis(50),
            ..OllamaConfig::default()
        });
        let started = std::time::Instant::now();
        let err = client.ask_raw("hello".into()).await.unwrap_err();
        assert!(matches!(err, AIError::Ollama(OllamaError::Http(_))));
        assert!(started.elapsed() < Duration::from_secs(5));
        accepted.abort();
    }
}
