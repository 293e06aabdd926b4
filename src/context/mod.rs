//! Document to prompt context: load, chunk, embed, retrieve.

pub mod chunking;
pub mod embedding;
pub mod index;
pub mod loading;

pub use chunking::{Chunk, RecursiveSplitter};
pub use embedding::{Embedder, HashingEmbedder, OllamaEmbedder};
pub use index::{ScoredChunk, VectorIndex};
pub use loading::{Document, DocumentKind};

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::config::AppConfig;
use crate::error::QuizError;
use crate::prompts::RETRIEVAL_QUERY;

pub const DEFAULT_TOP_K: usize = 4;

#[async_trait]
pub trait ContextProvider: Send + Sync {
    async fn context_for(&self, doc: &Document) -> Result<String, QuizError>;
}

/// Retrieval over a throwaway per-document index.
pub struct RetrievalContextProvider<E: Embedder> {
    embedder: E,
    splitter: RecursiveSplitter,
    k: usize,
}

impl<E: Embedder> RetrievalContextProvider<E> {
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            splitter: RecursiveSplitter::default(),
            k: DEFAULT_TOP_K,
        }
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k.max(1);
        self
    }

    pub fn with_splitter(mut self, splitter: RecursiveSplitter) -> Self {
        self.splitter = splitter;
        self
    }
}

impl RetrievalContextProvider<Box<dyn Embedder>> {
    pub fn from_config(config: &AppConfig) -> Self {
        let embedder: Box<dyn Embedder> = if config.use_ollama_embeddings {
            Box::new(
                OllamaEmbedder::new(&config.ollama_endpoint, &config.embedding_model)
                    .with_timeout(config.request_timeout),
            )
        } else {
            Box::new(HashingEmbedder::default())
        };
        Self::new(embedder).with_k(config.retrieval_k)
    }
}

#[async_trait]
impl<E: Embedder> ContextProvider for RetrievalContextProvider<E> {
    #[instrument(target = "rag_quiz::context", skip(self, doc), fields(filename = %doc.filename, kind = ?doc.kind))]
    async fn context_for(&self, doc: &Document) -> Result<String, QuizError> {
        let owned = doc.clone();
        let text = tokio::task::spawn_blocking(move || owned.text())
            .await
            .map_err(|e| QuizError::DocumentLoad(format!("extraction task failed: {}", e)))??;

        let chunks = self.splitter.chunk(&text);
        if chunks.is_empty() {
            warn!(target: "rag_quiz::context", "document produced no chunks");
            return Ok(String::new());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_all(&texts).await?;
        let mut index = VectorIndex::new();
        for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
            index.insert(chunk, embedding);
        }

        let query = self.embedder.embed(RETRIEVAL_QUERY).await?;
        let hits = index.top_k(&query, self.k);
        info!(target: "rag_quiz::context", chunks = index.len(), retrieved = hits.len(), "context retrieved");

        Ok(hits.into_iter().map(|h| h.chunk.text).collect::<Vec<_>>().join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_doc(body: &str) -> Document {
        Document::new("notes.txt", DocumentKind::Text, body.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn relevant_chunk_ranks_first() {
        let body = "The mitochondria is the powerhouse of the cell.\n\n\
                    Practice quiz questions help retention of quiz material.\n\n\
                    Rivers flow downhill toward the sea.";
        let provider = RetrievalContextProvider::new(HashingEmbedder::default())
            .with_splitter(RecursiveSplitter::new(60, 0))
            .with_k(1);
        let context = provider.context_for(&text_doc(body)).await.unwrap();
        assert_eq!(context, "Practice quiz questions help retention of quiz material.");
    }

    #[tokio::test]
    async fn joins_top_k_with_blank_lines() {
        let body = "alpha one.\n\nbeta two.\n\ngamma three.";
        let provider = RetrievalContextProvider::new(HashingEmbedder::default())
            .with_splitter(RecursiveSplitter::new(12, 0))
            .with_k(3);
        let context = provider.context_for(&text_doc(body)).await.unwrap();
        assert_eq!(context.split("\n\n").count(), 3);
        for part in ["alpha one.", "beta two.", "gamma three."] {
            assert!(context.contains(part));
        }
    }

    #[tokio::test]
    async fn empty_document_gives_empty_context() {
        let provider = RetrievalContextProvider::new(HashingEmbedder::default());
        assert_eq!(provider.context_for(&text_doc("  \n ")).await.unwrap(), "");
    }

    #[tokio::test]
    async fn load_errors_propagate() {
        let provider = RetrievalContextProvider::new(HashingEmbedder::default());
        let doc = Document::new("bad.docx", DocumentKind::Docx, b"nope".to_vec());
        assert!(matches!(provider.context_for(&doc).await, Err(QuizError::DocumentLoad(_))));
    }
}
