use crate::clients::{DeepSeekClient, DeepSeekConfig, MockClient, MockHandle, OllamaClient, OllamaConfig};
use crate::config::AppConfig;
use crate::core::LowLevelClient;
use crate::error::AIError;
use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;

/// Which backend a [`FlexibleClient`] talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientType {
    Ollama,
    DeepSeek,
    Mock,
}

impl FromStr for ClientType {
    type Err = String;

    /// Case insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "deepseek" => Ok(Self::DeepSeek),
            "mock" => Ok(Self::Mock),
            _ => Err(format!("Unknown client type: '{}'. Supported: ollama, deepseek, mock", s)),
        }
    }
}

impl std::fmt::Display for ClientType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientType::Ollama => write!(f, "ollama"),
            ClientType::DeepSeek => write!(f, "deepseek"),
            ClientType::Mock => write!(f, "mock"),
        }
    }
}

/// Cheaply clonable client that hides which backend is in use.
#[derive(Debug, Clone)]
pub struct FlexibleClient {
    inner: Arc<dyn LowLevelClient>,
    kind: ClientType,
}

impl FlexibleClient {
    pub fn new(client: Box<dyn LowLevelClient>, kind: ClientType) -> Self {
        Self { inner: Arc::from(client), kind }
    }

    pub fn ollama(config: OllamaConfig) -> Self {
        Self::new(Box::new(OllamaClient::new(config)), ClientType::Ollama)
    }

    pub fn deepseek(config: DeepSeekConfig) -> Result<Self, AIError> {
        Ok(Self::new(Box::new(DeepSeekClient::from_env(config)?), ClientType::DeepSeek))
    }

    /// Create a FlexibleClient with a mock and return the handle for scripting it
    pub fn mock() -> (Self, Arc<MockHandle>) {
        let (mock_client, handle) = MockClient::new();
        (Self::new(Box::new(mock_client), ClientType::Mock), handle)
    }

    /// Build the client selected by `config`. `json_output` asks the backend
    /// to constrain its reply to JSON, which the generation step wants and
    /// the question-count call does not.
    pub fn from_config(config: &AppConfig, json_output: bool) -> Result<Self, AIError> {
        match config.client {
            ClientType::Ollama => Ok(Self::ollama(OllamaConfig {
                endpoint: config.ollama_endpoint.clone(),
                model: config.quiz_model.clone(),
                json_format: json_output,
                request_timeout: config.request_timeout,
                ..OllamaConfig::default()
            })),
            ClientType::DeepSeek => Self::deepseek(DeepSeekConfig {
                json_mode: json_output,
                request_timeout: config.request_timeout,
                ..DeepSeekConfig::default()
            }),
            ClientType::Mock => Ok(Self::mock().0),
        }
    }

    pub fn kind(&self) -> ClientType {
        self.kind
    }
}

#[async_trait]
impl LowLevelClient for FlexibleClient {
    async fn ask_raw(&self, prompt: String) -> Result<String, AIError> {
        self.inner.ask_raw(prompt).await
    }

    async fn ask_chat(&self, system: String, user: String) -> Result<String, AIError> {
        self.inner.ask_chat(system, user).await
    }

    fn clone_box(&self) -> Box<dyn LowLevelClient> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::MockResponse;

    #[test]
    fn client_type_parsing() {
        assert_eq!("ollama".parse::<ClientType>(), Ok(ClientType::Ollama));
        assert_eq!("DeepSeek".parse::<ClientType>(), Ok(ClientType::DeepSeek));
        assert_eq!(" mock ".parse::<ClientType>(), Ok(ClientType::Mock));
        assert!("claude".parse::<ClientType>().is_err());
    }

    #[tokio::test]
    async fn clones_share_the_backend() {
        let (client, handle) = FlexibleClient::mock();
        handle.add_response(MockResponse::Success("a".into()));
        handle.add_response(MockResponse::Success("b".into()));

        let other = client.clone();
        assert_eq!(client.ask_raw("1".into()).await.unwrap(), "a");
        assert_eq!(other.ask_raw("2".into()).await.unwrap(), "b");
        assert_eq!(handle.call_count(), 2);
    }

    #[test]
    fn from_config_reports_selected_backend() {
        let config = AppConfig { client: ClientType::Mock, ..AppConfig::default() };
        assert_eq!(FlexibleClient::from_config(&config, true).unwrap().kind(), ClientType::Mock);

        let config = AppConfig { client: ClientType::Ollama, ..AppConfig::default() };
        assert_eq!(FlexibleClient::from_config(&config, false).unwrap().kind(), ClientType::Ollama);
    }
}
