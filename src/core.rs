//! Model client abstraction and the retry policy shared by the generation loop.
//!
//! Everything that talks to a language model goes through [`LowLevelClient`],
//! which deals only in raw text. Typed parsing lives one level up, in
//! [`crate::generation`] and [`crate::intent`].

use crate::error::AIError;
use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;

/// Low-level model client abstraction.
///
/// Implementors provide `ask_raw`, which executes a prompt and returns the raw
/// model text. Chat-style providers may override `ask_chat` to send a real
/// system message; the default folds it into the prompt.
#[async_trait]
pub trait LowLevelClient: Send + Sync + Debug {
    /// The only method that implementations must provide
    async fn ask_raw(&self, prompt: String) -> Result<String, AIError>;

    /// System instruction plus user message.
    async fn ask_chat(&self, system: String, user: String) -> Result<String, AIError> {
        self.ask_raw(format!("{}\n\n{}", system, user)).await
    }

    /// Clone this client into a boxed trait object
    fn clone_box(&self) -> Box<dyn LowLevelClient>;
}

impl Clone for Box<dyn LowLevelClient> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

#[async_trait]
impl LowLevelClient for Box<dyn LowLevelClient> {
    async fn ask_raw(&self, prompt: String) -> Result<String, AIError> {
        self.as_ref().ask_raw(prompt).await
    }

    async fn ask_chat(&self, system: String, user: String) -> Result<String, AIError> {
        self.as_ref().ask_chat(system, user).await
    }

    fn clone_box(&self) -> Box<dyn LowLevelClient> {
        self.as_ref().clone_box()
    }
}

/// How many times a batch is attempted, and how each attempt is bounded.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts per batch, including the first one.
    pub max_attempts: usize,
    /// Pause between failed attempts.
    pub backoff: Duration,
    /// Upper bound on a single generation call. `None` waits indefinitely.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::ZERO,
            attempt_timeout: Some(Duration::from_secs(180)),
        }
    }
}

impl RetryPolicy {
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Delay before attempt number `attempt` (1-based). Linear in the attempt
    /// index, saturating at `Duration::MAX`.
    pub fn delay_before(&self, attempt: usize) -> Duration {
        if attempt <= 1 {
            Duration::ZERO
        } else {
            let steps = u32::try_from(attempt - 1).unwrap_or(u32::MAX);
            self.backoff.saturating_mul(steps)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_three_attempts() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_before(2), Duration::ZERO);
    }

    #[test]
    fn backoff_grows_linearly() {
        let policy = RetryPolicy::default().with_backoff(Duration::from_millis(100));
        assert_eq!(policy.delay_before(1), Duration::ZERO);
        assert_eq!(policy.delay_before(2), Duration::from_millis(100));
        assert_eq!(policy.delay_before(3), Duration::from_millis(200));
    }

    #[test]
    fn huge_backoff_saturates() {
        let policy = RetryPolicy::default().with_backoff(Duration::MAX);
        assert_eq!(policy.delay_before(3), Duration::MAX);
        let policy = RetryPolicy::default().with_backoff(Duration::from_secs(1));
        assert_eq!(policy.delay_before(usize::MAX), Duration::from_secs(u32::MAX as u64));
    }
}
