//! One generation call: context + batch size in, typed quiz draft out.
//!
//! [`LlmGenerationStep`] is the only place that sees raw model text for quiz
//! generation. The controller only ever deals in [`QuizDraft`] and
//! [`GenerationError`].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::core::LowLevelClient;
use crate::error::GenerationError;
use crate::interceptors::{Exchange, Interceptor};
use crate::json_utils::extract_first;
use crate::prompts::{quiz_prompt, schema_hint};
use crate::schema::{Quiz, QuizDraft};

#[async_trait]
pub trait GenerationStep: Send + Sync {
    /// Ask for `batch_size` questions grounded in `context`. The number of
    /// questions returned is not guaranteed to match.
    async fn generate(&self, context: &str, batch_size: usize) -> Result<QuizDraft, GenerationError>;
}

#[async_trait]
impl<G: GenerationStep + ?Sized> GenerationStep for Arc<G> {
    async fn generate(&self, context: &str, batch_size: usize) -> Result<QuizDraft, GenerationError> {
        self.as_ref().generate(context, batch_size).await
    }
}

/// Generation step backed by a language model.
#[derive(Debug, Clone)]
pub struct LlmGenerationStep<C: LowLevelClient> {
    client: C,
    schema_hint: Option<String>,
    interceptor: Option<Arc<dyn Interceptor>>,
}

impl<C: LowLevelClient> LlmGenerationStep<C> {
    pub fn new(client: C) -> Self {
        Self { client, schema_hint: None, interceptor: None }
    }

    /// Append the JSON schema of [`Quiz`] to every prompt.
    pub fn with_schema_hint(mut self) -> Self {
        self.schema_hint = Some(schema_hint::<Quiz>());
        self
    }

    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptor = Some(interceptor);
        self
    }
}

/// Parse a quiz draft out of raw model text.
pub fn parse_quiz_draft(raw: &str) -> Result<QuizDraft, GenerationError> {
    extract_first::<QuizDraft>(raw).ok_or_else(|| {
        let preview: String = raw.chars().take(200).collect();
        GenerationError::Malformed(preview)
    })
}

#[async_trait]
impl<C: LowLevelClient> GenerationStep for LlmGenerationStep<C> {
    #[instrument(target = "rag_quiz::generation", skip(self, context), fields(context_len = context.len()))]
    async fn generate(&self, context: &str, batch_size: usize) -> Result<QuizDraft, GenerationError> {
        let prompt = quiz_prompt(context, batch_size, self.schema_hint.as_deref());
        let raw = self.client.ask_raw(prompt.clone()).await?;
        debug!(target: "rag_quiz::generation", response_len = raw.len(), "model replied");

        if let Some(interceptor) = &self.interceptor {
            let exchange = Exchange { batch_size, prompt: &prompt, response: &raw };
            if let Err(e) = interceptor.save(exchange).await {
                warn!(target: "rag_quiz::generation", error = %e, "failed to record transcript");
            }
        }

        let draft = parse_quiz_draft(&raw)?;
        debug!(target: "rag_quiz::generation", questions = draft.questions.len(), "parsed quiz draft");
        Ok(draft)
    }
}
