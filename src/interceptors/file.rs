use super::{Exchange, Interceptor};
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Writes each exchange to `<base>/generation_<timestamp>_<seq>.md`.
#[derive(Debug)]
pub struct FileInterceptor {
    base_path: PathBuf,
    seq: AtomicU64,
}

impl FileInterceptor {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self { base_path: base_path.into(), seq: AtomicU64::new(0) }
    }
}

#[async_trait]
impl Interceptor for FileInterceptor {
    async fn save(&self, exchange: Exchange<'_>) -> std::io::Result<()> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let filename = format!("generation_{}_{:04}.md", Utc::now().format("%Y%m%d_%H%M%S_%3f"), seq);
        let file_path = self.base_path.join(filename);

        fs::create_dir_all(&self.base_path).await?;

        let content = format!(
            "# Batch size\n\n{}\n\n# Prompt\n\n{}\n\n# Response\n\n{}\n",
            exchange.batch_size, exchange.prompt, exchange.response
        );

        let mut file = fs::File::create(&file_path).await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
