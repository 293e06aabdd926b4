//! One request end to end: document + free-text prompt in, quiz report out.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::clients::FlexibleClient;
use crate::config::AppConfig;
use crate::context::{ContextProvider, Document, RetrievalContextProvider};
use crate::controller::{BatchController, QuizReport};
use crate::error::QuizError;
use crate::generation::{GenerationStep, LlmGenerationStep};
use crate::intent::{IntentResolver, LlmIntentResolver};
use crate::interceptors::FileInterceptor;

pub struct QuizPipeline {
    context: Arc<dyn ContextProvider>,
    intent: Arc<dyn IntentResolver>,
    controller: BatchController<Arc<dyn GenerationStep>>,
}

impl QuizPipeline {
    pub fn new(
        context: Arc<dyn ContextProvider>,
        intent: Arc<dyn IntentResolver>,
        controller: BatchController<Arc<dyn GenerationStep>>,
    ) -> Self {
        Self { context, intent, controller }
    }

    /// Wire up the configured model backend and embedder.
    pub fn from_config(config: &AppConfig) -> Result<Self, QuizError> {
        let client = FlexibleClient::from_config(config, true)?;
        let backend = client.kind();
        let mut step = LlmGenerationStep::new(client);
        if let Some(dir) = &config.transcript_dir {
            step = step.with_interceptor(Arc::new(FileInterceptor::new(dir)));
        }
        let intent = LlmIntentResolver::new(FlexibleClient::from_config(config, false)?)
            .with_timeout(config.intent_timeout);
        let context = RetrievalContextProvider::from_config(config);
        let controller = BatchController::new(Arc::new(step) as Arc<dyn GenerationStep>, config.retry.clone())
            .with_max_total(config.max_questions);

        info!(
            target: "rag_quiz::pipeline",
            client = %backend,
            model = %config.quiz_model,
            ollama_embeddings = config.use_ollama_embeddings,
            max_questions = config.max_questions,
            "pipeline ready"
        );
        Ok(Self::new(Arc::new(context), Arc::new(intent), controller))
    }

    /// Replace how the question count is obtained, e.g. with a [`crate::intent::FixedIntent`].
    pub fn with_intent(mut self, intent: Arc<dyn IntentResolver>) -> Self {
        self.intent = intent;
        self
    }

    /// Retrieval and intent resolution run concurrently. The first fatal error,
    /// including an out-of-range count, cancels the other; batch failures never do.
    #[instrument(target = "rag_quiz::pipeline", skip_all, fields(filename = %doc.filename))]
    pub async fn run(&self, doc: &Document, prompt: &str) -> Result<QuizReport, QuizError> {
        let count = async {
            let count = self.intent.resolve(prompt).await?;
            self.controller.check_count(count)?;
            Ok::<_, QuizError>(count)
        };
        let (count, context) = tokio::try_join!(count, self.context.context_for(doc))?;
        info!(target: "rag_quiz::pipeline", count, context_len = context.len(), "starting generation");
        self.controller.run(&context, count).await
    }
}
