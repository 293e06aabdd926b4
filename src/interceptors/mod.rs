//! Optional recording of what was sent to and received from the model.

use async_trait::async_trait;
use std::fmt::Debug;

/// One generation attempt as seen on the wire.
#[derive(Debug, Clone, Copy)]
pub struct Exchange<'a> {
    pub batch_size: usize,
    pub prompt: &'a str,
    pub response: &'a str,
}

#[async_trait]
pub trait Interceptor: Send + Sync + Debug {
    async fn save(&self, exchange: Exchange<'_>) -> std::io::Result<()>;
}

pub mod file;
pub use file::FileInterceptor;
