//! The batch controller: splits a requested question count into batches,
//! drives the generation step for each with bounded retries, and folds the
//! accepted questions into a quiz.
//!
//! Per request the flow is
//! `Planning → (BatchAttempt ⇄ Retry) → BatchAccepted | Abandoned → … → Done`,
//! with `BelowMinimumCount` as the only hard stop. A batch that exhausts its
//! attempts is dropped and the run continues, so the finished quiz can be
//! shorter than requested; [`QuizReport::is_complete`] tells the two apart.

use tracing::{debug, info, instrument, warn};

use crate::core::RetryPolicy;
use crate::error::{AttemptFailure, GenerationError, QuizError};
use crate::generation::GenerationStep;
use crate::planner::{batch_count, next_batch_size, BATCH_SIZE, MAX_QUESTIONS};
use crate::schema::{validate, Question, Quiz, QuizDraft, DEFAULT_QUIZ_NAME};

/// Questions accepted so far and the name of the first accepted batch.
///
/// Each batch consumes the accumulator and yields the next one; accepted
/// questions are only ever appended.
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    accepted: Vec<Question>,
    quiz_name: Option<String>,
}

impl Accumulator {
    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }

    pub fn quiz_name(&self) -> Option<&str> {
        self.quiz_name.as_deref()
    }

    /// Append a batch. The first accepted name is kept for the whole quiz.
    #[must_use]
    pub fn accept(mut self, batch: Vec<Question>, name: String) -> Self {
        self.accepted.extend(batch);
        self.quiz_name.get_or_insert(name);
        self
    }

    /// Build the quiz, never longer than `total`.
    pub fn finish(mut self, total: usize) -> Quiz {
        self.accepted.truncate(total);
        Quiz {
            quiz_name: self.quiz_name.unwrap_or_else(|| DEFAULT_QUIZ_NAME.to_string()),
            questions: self.accepted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Accepted,
    /// Every attempt failed; the batch contributes nothing.
    Abandoned,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    /// Zero-based batch number
    pub index: usize,
    pub size: usize,
    pub attempts: usize,
    pub failures: Vec<AttemptFailure>,
    pub outcome: BatchOutcome,
}

/// A finished run: the quiz plus how it was produced.
#[derive(Debug, Clone)]
pub struct QuizReport {
    pub quiz: Quiz,
    pub requested: usize,
    pub batches: Vec<BatchReport>,
}

impl QuizReport {
    /// Whether the quiz has exactly the requested number of questions.
    pub fn is_complete(&self) -> bool {
        self.quiz.len() == self.requested
    }

    /// Total calls made to the generation step.
    pub fn generation_calls(&self) -> usize {
        self.batches.iter().map(|b| b.attempts).sum()
    }

    pub fn abandoned_batches(&self) -> usize {
        self.batches.iter().filter(|b| b.outcome == BatchOutcome::Abandoned).count()
    }
}

pub struct BatchController<G> {
    step: G,
    policy: RetryPolicy,
    batch_size: usize,
    max_total: usize,
}

impl<G: GenerationStep> BatchController<G> {
    pub fn new(step: G, policy: RetryPolicy) -> Self {
        Self { step, policy, batch_size: BATCH_SIZE, max_total: MAX_QUESTIONS }
    }

    /// Override the batch size; it also becomes the minimum total.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Largest total `run` accepts.
    pub fn with_max_total(mut self, max_total: usize) -> Self {
        self.max_total = max_total;
        self
    }

    /// Reject totals outside `batch_size..=max_total` before any work is done.
    pub fn check_count(&self, total: usize) -> Result<(), QuizError> {
        if total < self.batch_size {
            warn!(target: "rag_quiz::controller", total, minimum = self.batch_size, "requested count below minimum");
            return Err(QuizError::BelowMinimumCount { requested: total, minimum: self.batch_size });
        }
        if total > self.max_total {
            warn!(target: "rag_quiz::controller", total, maximum = self.max_total, "requested count above maximum");
            return Err(QuizError::AboveMaximumCount { requested: total, maximum: self.max_total });
        }
        Ok(())
    }

    /// Generate `total` questions from `context`.
    ///
    /// Fails only when `total` is out of bounds. Everything else is
    /// retried and, if it keeps failing, skipped.
    #[instrument(target = "rag_quiz::controller", skip(self, context), fields(context_len = context.len()))]
    pub async fn run(&self, context: &str, total: usize) -> Result<QuizReport, QuizError> {
        self.check_count(total)?;

        let batches = batch_count(total, self.batch_size);
        let mut acc = Accumulator::default();
        let mut reports = Vec::new();

        for index in 0..batches {
            let size = next_batch_size(total, acc.len(), self.batch_size);
            info!(target: "rag_quiz::controller", batch = index + 1, batches, size, "generating batch");

            let (next, report) = self.run_batch(acc, context, index, size).await;
            acc = next;
            reports.push(report);

            if acc.len() >= total {
                break;
            }
        }

        let quiz = acc.finish(total);
        let report = QuizReport { quiz, requested: total, batches: reports };
        info!(
            target: "rag_quiz::controller",
            questions = report.quiz.len(),
            requested = total,
            calls = report.generation_calls(),
            abandoned = report.abandoned_batches(),
            "quiz assembled"
        );
        Ok(report)
    }

    async fn run_batch(&self, acc: Accumulator, context: &str, index: usize, size: usize) -> (Accumulator, BatchReport) {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut failures = Vec::new();

        for attempt in 1..=max_attempts {
            let delay = self.policy.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let failure = match self.attempt(context, size).await {
                Ok(draft) => {
                    let mut valid = validate(draft.questions);
                    if valid.len() >= size {
                        valid.truncate(size);
                        debug!(target: "rag_quiz::controller", batch = index + 1, attempt, "batch accepted");
                        let report = BatchReport {
                            index,
                            size,
                            attempts: attempt,
                            failures,
                            outcome: BatchOutcome::Accepted,
                        };
                        return (acc.accept(valid, draft.quiz_name), report);
                    }
                    AttemptFailure::Incomplete { valid: valid.len(), wanted: size }
                }
                Err(e) => AttemptFailure::Call(e.to_string()),
            };

            warn!(
                target: "rag_quiz::controller",
                batch = index + 1,
                attempt,
                max_attempts,
                reason = %failure,
                "batch attempt rejected"
            );
            failures.push(failure);
        }

        warn!(target: "rag_quiz::controller", batch = index + 1, size, "batch abandoned after exhausting attempts");
        let report = BatchReport {
            index,
            size,
            attempts: max_attempts,
            failures,
            outcome: BatchOutcome::Abandoned,
        };
        (acc, report)
    }

    async fn attempt(&self, context: &str, size: usize) -> Result<QuizDraft, GenerationError> {
        match self.policy.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, self.step.generate(context, size))
                .await
                .unwrap_or(Err(GenerationError::Timeout(limit))),
            None => self.step.generate(context, size).await,
        }
    }
}
