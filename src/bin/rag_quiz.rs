use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use tracing::info;

use rag_quiz::clients::ClientType;
use rag_quiz::context::Document;
use rag_quiz::intent::FixedIntent;
use rag_quiz::{server, AppConfig, QuizPipeline};

#[derive(Parser)]
#[command(author, version, about = "Generate multiple-choice quizzes from documents", long_about = None)]
#[command(after_help = "ENVIRONMENT VARIABLES:
    QUIZ_CLIENT                 Model backend (ollama|deepseek|mock) [default: ollama]
    OLLAMA_ENDPOINT             Ollama base URL [default: http://localhost:11434]
    QUIZ_MODEL                  Generation model [default: llama3.2]
    EMBEDDING_MODEL             Ollama embedding model [default: all-minilm]
    QUIZ_EMBEDDER               ollama|hashing [default: ollama]
    DEEPSEEK_API_KEY            API key for the DeepSeek backend
    QUIZ_ATTEMPT_TIMEOUT_SECS   Per-attempt timeout, 0 disables [default: 180]
    QUIZ_INTENT_TIMEOUT_SECS    Question-count call timeout, 0 disables [default: 60]
    QUIZ_REQUEST_TIMEOUT_SECS   HTTP timeout for model and embedding calls [default: 300]
    QUIZ_MAX_QUESTIONS          Largest question count per quiz [default: 100]
    QUIZ_CORS_ORIGINS           Comma-separated browser origins [default: http://localhost:3000,http://localhost:5173]
    QUIZ_TRANSCRIPT_DIR         Write every prompt/response pair here
    RUST_LOG                    Log filter [default: rag_quiz=info]")]
struct Cli {
    /// Override QUIZ_CLIENT
    #[arg(long, global = true)]
    client: Option<ClientType>,

    /// Use the offline hashing embedder instead of Ollama embeddings
    #[arg(long, global = true)]
    hashing_embedder: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Address to bind, overrides BIND_ADDRESS
        #[arg(long)]
        bind: Option<String>,
    },
    /// Generate one quiz from a local file
    #[command(group(ArgGroup::new("amount").required(true).args(["prompt", "count"])))]
    Generate {
        /// PDF, DOCX or plain text file
        #[arg(long)]
        file: PathBuf,

        /// Free-text request, e.g. "make 10 questions"
        #[arg(long)]
        prompt: Option<String>,

        /// Exact number of questions, skipping the intent call
        #[arg(long)]
        count: Option<usize>,

        /// Write the quiz JSON here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rag_quiz=info")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env().map_err(anyhow::Error::msg).context("invalid configuration")?;
    if let Some(client) = cli.client {
        config.client = client;
    }
    if cli.hashing_embedder {
        config.use_ollama_embeddings = false;
    }

    match cli.command {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind_address = bind;
            }
            let pipeline = Arc::new(QuizPipeline::from_config(&config)?);
            server::serve(pipeline, &config).await.context("server failed")?;
        }
        Command::Generate { file, prompt, count, out } => {
            let doc = Document::from_path(&file)?;
            let mut pipeline = QuizPipeline::from_config(&config)?;
            if let Some(count) = count {
                pipeline = pipeline.with_intent(Arc::new(FixedIntent(count)));
            }

            let report = pipeline.run(&doc, prompt.as_deref().unwrap_or_default()).await?;
            info!(
                target: "rag_quiz::cli",
                questions = report.quiz.len(),
                requested = report.requested,
                complete = report.is_complete(),
                "done"
            );

            let json = serde_json::to_string_pretty(&report.quiz)?;
            match out {
                Some(path) => std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?,
                None => println!("{}", json),
            }
        }
    }
    Ok(())
}
