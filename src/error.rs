use std::time::Duration;
use thiserror::Error;

/// Request-level failures. Only these ever reach the caller of the pipeline.
#[derive(Error, Debug)]
pub enum QuizError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("No filename provided")]
    MissingFilename,
    #[error("MINIMUM {minimum} QUESTIONS ARE REQUIRED TO BE GENERATED (requested {requested})")]
    BelowMinimumCount { requested: usize, minimum: usize },
    #[error("At most {maximum} questions can be generated per quiz (requested {requested})")]
    AboveMaximumCount { requested: usize, maximum: usize },
    #[error("Question count request timed out after {0:?}")]
    IntentTimeout(Duration),
    #[error("Could not read a question count from: {0:?}")]
    IntentUnresolved(String),
    #[error("Failed to load document: {0}")]
    DocumentLoad(String),
    #[error("Embedding error: {0}")]
    Embedding(String),
    #[error("AI error: {0}")]
    Ai(#[from] AIError),
}

/// Failure of a single generation attempt. Contained by the batch controller.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("generation call failed: {0}")]
    Call(#[from] AIError),
    #[error("generation call timed out after {0:?}")]
    Timeout(Duration),
    #[error("model output did not contain a quiz: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum AIError {
    #[error("Ollama API error: {0}")]
    Ollama(#[from] OllamaError),
    #[error("DeepSeek API error: {0}")]
    DeepSeek(#[from] DeepSeekError),
    #[error("Mock error: {0}")]
    Mock(String),
}

#[derive(Error, Debug)]
pub enum OllamaError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("Model not found: {0}")]
    ModelNotFound(String),
}

#[derive(Error, Debug)]
pub enum DeepSeekError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("Rate limit exceeded")]
    RateLimit,
    #[error("Authentication failed")]
    Authentication,
}

/// Why one attempt at a batch did not produce an accepted batch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AttemptFailure {
    #[error("generation failed: {0}")]
    Call(String),
    #[error("only {valid}/{wanted} complete questions")]
    Incomplete { valid: usize, wanted: usize },
}
