//! Turning "make me a dozen questions about chapter 2" into a count.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::core::LowLevelClient;
use crate::error::QuizError;
use crate::json_utils::first_integer;
use crate::prompts::INTENT_INSTRUCTION;

#[async_trait]
pub trait IntentResolver: Send + Sync {
    async fn resolve(&self, prompt: &str) -> Result<usize, QuizError>;
}

/// Asks the model for the number and reads the first integer in its reply.
#[derive(Debug, Clone)]
pub struct LlmIntentResolver<C: LowLevelClient> {
    client: C,
    timeout: Option<Duration>,
}

impl<C: LowLevelClient> LlmIntentResolver<C> {
    pub fn new(client: C) -> Self {
        Self { client, timeout: None }
    }

    /// Give up on the model after `timeout`; `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl<C: LowLevelClient> IntentResolver for LlmIntentResolver<C> {
    #[instrument(target = "rag_quiz::intent", skip(self, prompt), fields(prompt_len = prompt.len()))]
    async fn resolve(&self, prompt: &str) -> Result<usize, QuizError> {
        let call = self.client.ask_chat(INTENT_INSTRUCTION.to_string(), prompt.to_string());
        let reply = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                warn!(target: "rag_quiz::intent", ?limit, "intent call timed out");
                QuizError::IntentTimeout(limit)
            })??,
            None => call.await?,
        };

        match first_integer(&reply) {
            Some(count) => {
                info!(target: "rag_quiz::intent", count, "resolved question count");
                Ok(count)
            }
            None => {
                warn!(target: "rag_quiz::intent", reply = %reply, "no integer in intent reply");
                Err(QuizError::IntentUnresolved(reply))
            }
        }
    }
}

/// A count known up front, e.g. from a CLI flag.
#[derive(Debug, Clone, Copy)]
pub struct FixedIntent(pub usize);

#[async_trait]
impl IntentResolver for FixedIntent {
    async fn resolve(&self, _prompt: &str) -> Result<usize, QuizError> {
        Ok(self.0)
    }
}
