pub mod deepseek;
pub mod flexible;
pub mod mock;
pub mod ollama;

pub use deepseek::*;
pub use flexible::*;
pub use mock::*;
pub use ollama::*;

use std::time::Duration;

/// Whole-request timeout for every outbound model or embedding call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// HTTP client that gives up on a request after `timeout`.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to a default HTTP client");
            reqwest::Client::new()
        })
}
