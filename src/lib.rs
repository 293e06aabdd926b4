pub mod clients;
pub mod config;
pub mod context;
pub mod controller;
pub mod core;
pub mod error;
pub mod generation;
pub mod intent;
pub mod interceptors;
pub mod json_utils;
pub mod pipeline;
pub mod planner;
pub mod prompts;
pub mod schema;
pub mod server;

// Convenient re-exports
pub use config::AppConfig;
pub use controller::{BatchController, QuizReport};
pub use error::{GenerationError, QuizError};
pub use json_utils::extract_all;
pub use pipeline::QuizPipeline;
pub use schema::{Question, QuestionType, Quiz};
