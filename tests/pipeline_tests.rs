
use std::io::{Cursor, Write};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rag_quiz::clients::{FlexibleClient, MockResponse};
use rag_quiz::context::{ContextProvider, Document, DocumentKind};
use rag_quiz::controller::BatchOutcome;
use rag_quiz::core::RetryPolicy;
use rag_quiz::error::AttemptFailure;
use rag_quiz::generation::{GenerationStep, LlmGenerationStep};
use rag_quiz::intent::{FixedIntent, LlmIntentResolver};
use rag_quiz::interceptors::FileInterceptor;
use rag_quiz::{BatchController, QuizError, QuizPipeline};
use test_utils::*;

const NOTES: &str = "Box<T> allocates its value on the heap.\n\n\
                     Rc<T> adds shared ownership through reference counting.\n\n\
                     Practice quiz questions about smart pointers.";

fn no_timeout() -> RetryPolicy {
    RetryPolicy::default().with_attempt_timeout(None)
}

#[tokio::test]
async fn twelve_questions_take_three_batches() {
    init_tracing();
    let m = mock_pipeline(no_timeout());
    m.intent.add_response(MockResponse::Success("12".into()));
    m.generation.add_responses([
        MockResponse::Success(quiz_json("Smart Pointers", 5, 0)),
        MockResponse::Success(quiz_json("Ignored Name", 5, 0)),
        MockResponse::Success(quiz_json("Also Ignored", 2, 0)),
    ]);

    let report = m.pipeline.run(&text_doc(NOTES), "give me 12 questions").await.unwrap();

    assert_eq!(report.quiz.quiz_name, "Smart Pointers");
    assert_eq!(report.quiz.len(), 12);
    assert!(report.is_complete());
    assert_eq!(report.generation_calls(), 3);

    let prompts = m.generation.prompts();
    assert!(prompts[0].contains("Create EXACTLY 5 questions"));
    assert!(prompts[1].contains("Create EXACTLY 5 questions"));
    assert!(prompts[2].contains("Create EXACTLY 2 questions"));
    assert!(prompts.iter().all(|p| p.contains("smart pointers")));
}

#[tokio::test]
async fn incomplete_batch_is_retried() {
    init_tracing();
    let m = mock_pipeline(no_timeout());
    m.intent.add_response(MockResponse::Success("5".into()));
    m.generation.add_responses([
        MockResponse::Success(quiz_json("First Try", 3, 2)),
        MockResponse::Success(quiz_json("Second Try", 5, 0)),
    ]);

    let report = m.pipeline.run(&text_doc(NOTES), "5").await.unwrap();

    assert_eq!(report.quiz.len(), 5);
    assert_eq!(report.quiz.quiz_name, "Second Try");
    assert_eq!(report.batches.len(), 1);
    assert_eq!(report.batches[0].attempts, 2);
    assert_eq!(report.batches[0].failures, vec![AttemptFailure::Incomplete { valid: 3, wanted: 5 }]);
}

#[tokio::test]
async fn over_delivery_is_truncated_in_order() {
    let m = mock_pipeline(no_timeout());
    m.intent.add_response(MockResponse::Success("5".into()));
    m.generation.add_response(MockResponse::Success(quiz_json("Extra", 7, 0)));

    let report = m.pipeline.run(&text_doc(NOTES), "5").await.unwrap();

    let texts: Vec<_> = report.quiz.questions.iter().map(|q| q.question.as_str()).collect();
    assert_eq!(texts, vec!["Question 0?", "Question 1?", "Question 2?", "Question 3?", "Question 4?"]);
}

#[tokio::test]
async fn failing_batch_is_abandoned_and_later_batches_continue() {
    let m = mock_pipeline(no_timeout());
    m.intent.add_response(MockResponse::Success("10".into()));
    m.generation.add_responses([
        MockResponse::Error("overloaded".into()),
        MockResponse::Success("I cannot help with that".into()),
        MockResponse::Success(quiz_json("Short", 1, 4)),
        MockResponse::Success(quiz_json("Recovered", 5, 0)),
    ]);

    let report = m.pipeline.run(&text_doc(NOTES), "10").await.unwrap();

    assert_eq!(report.quiz.quiz_name, "Recovered");
    assert_eq!(report.quiz.len(), 5);
    assert!(!report.is_complete());
    assert_eq!(report.batches[0].outcome, BatchOutcome::Abandoned);
    assert_eq!(report.batches[0].failures.len(), 3);
    assert!(matches!(report.batches[0].failures[0], AttemptFailure::Call(_)));
    assert_eq!(report.batches[1].outcome, BatchOutcome::Accepted);
    assert_eq!(m.generation.call_count(), 4);
}

#[tokio::test]
async fn hung_attempt_times_out_and_is_retried() {
    let policy = RetryPolicy::default().with_attempt_timeout(Some(Duration::from_millis(20)));
    let m = mock_pipeline(policy);
    m.intent.add_response(MockResponse::Success("5".into()));
    m.generation.add_responses([
        MockResponse::Delayed(Duration::from_secs(5), quiz_json("Too Late", 5, 0)),
        MockResponse::Success(quiz_json("On Time", 5, 0)),
    ]);

    let report = m.pipeline.run(&text_doc(NOTES), "5").await.unwrap();

    assert_eq!(report.quiz.quiz_name, "On Time");
    assert_eq!(report.batches[0].attempts, 2);
    assert!(matches!(&report.batches[0].failures[0], AttemptFailure::Call(msg) if msg.contains("timed out")));
}

#[tokio::test]
async fn below_minimum_makes_no_generation_calls() {
    let m = mock_pipeline(no_timeout());
    m.intent.add_response(MockResponse::Success("4".into()));

    let err = m.pipeline.run(&text_doc(NOTES), "four").await.unwrap_err();

    assert!(matches!(err, QuizError::BelowMinimumCount { requested: 4, minimum: 5 }));
    assert_eq!(m.generation.call_count(), 0);
}

#[tokio::test]
async fn absurd_count_is_rejected_before_generation() {
    let m = mock_pipeline(no_timeout());
    m.intent.add_response(MockResponse::Success("100000000000".into()));

    let err = m.pipeline.run(&text_doc(NOTES), "as many as possible").await.unwrap_err();

    assert!(matches!(err, QuizError::AboveMaximumCount { requested: 100_000_000_000, maximum: 100 }));
    assert_eq!(m.generation.call_count(), 0);
}

#[tokio::test]
async fn stalled_intent_call_times_out() {
    let m = mock_pipeline(no_timeout());
    let (client, handle) = FlexibleClient::mock();
    handle.add_response(MockResponse::Delayed(Duration::from_secs(3), "5".into()));
    let resolver = LlmIntentResolver::new(client).with_timeout(Some(Duration::from_millis(20)));
    let pipeline = m.pipeline.with_intent(Arc::new(resolver));

    let started = std::time::Instant::now();
    let err = pipeline.run(&text_doc(NOTES), "five").await.unwrap_err();

    assert!(matches!(err, QuizError::IntentTimeout(_)));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(m.generation.call_count(), 0);
}

/// Retrieval that never finishes.
struct Stalled;

#[async_trait]
impl ContextProvider for Stalled {
    async fn context_for(&self, _doc: &Document) -> Result<String, QuizError> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn bad_count_does_not_wait_for_retrieval() {
    let (client, generation) = FlexibleClient::mock();
    let step: Arc<dyn GenerationStep> = Arc::new(LlmGenerationStep::new(client));
    let pipeline = QuizPipeline::new(Arc::new(Stalled), Arc::new(FixedIntent(3)), BatchController::new(step, no_timeout()));

    let outcome = tokio::time::timeout(Duration::from_secs(1), pipeline.run(&text_doc(NOTES), "three")).await;

    assert!(matches!(outcome, Ok(Err(QuizError::BelowMinimumCount { requested: 3, .. }))));
    assert_eq!(generation.call_count(), 0);
}

#[tokio::test]
async fn unreadable_intent_is_fatal() {
    let m = mock_pipeline(no_timeout());
    m.intent.add_response(MockResponse::Success("several".into()));

    let err = m.pipeline.run(&text_doc(NOTES), "a bunch").await.unwrap_err();

    assert!(matches!(err, QuizError::IntentUnresolved(_)));
    assert_eq!(m.generation.call_count(), 0);
}

#[tokio::test]
async fn fixed_intent_skips_the_intent_call() {
    let m = mock_pipeline(no_timeout());
    let pipeline = m.pipeline.with_intent(Arc::new(FixedIntent(5)));
    m.generation.add_response(MockResponse::Success(quiz_json("Fixed", 5, 0)));

    let report = pipeline.run(&text_doc(NOTES), "").await.unwrap();

    assert_eq!(report.quiz.len(), 5);
    assert_eq!(m.intent.call_count(), 0);
}

#[tokio::test]
async fn docx_text_reaches_the_prompt() {
    let mut buf = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        zip.start_file("word/document.xml", zip::write::FileOptions::default()).unwrap();
        zip.write_all(b"<w:document><w:body><w:p><w:r><w:t>Lifetimes bound references.</w:t></w:r></w:p></w:body></w:document>")
            .unwrap();
        zip.finish().unwrap();
    }
    let doc = Document::new("lecture.docx", DocumentKind::Docx, buf.into_inner());

    let m = mock_pipeline(no_timeout());
    m.intent.add_response(MockResponse::Success("5".into()));
    m.generation.add_response(MockResponse::Success(quiz_json("Lifetimes", 5, 0)));

    m.pipeline.run(&doc, "5").await.unwrap();
    assert!(m.generation.prompts()[0].contains("Lifetimes bound references."));
}

#[tokio::test]
async fn transcripts_are_written_per_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let transcripts = dir.path().join("transcripts");
    let interceptor = Arc::new(FileInterceptor::new(&transcripts));
    let m = mock_pipeline_with(no_timeout(), move |step| step.with_interceptor(interceptor));
    m.intent.add_response(MockResponse::Success("5".into()));
    m.generation.add_responses([
        MockResponse::Success("not json".into()),
        MockResponse::Success(quiz_json("Logged", 5, 0)),
    ]);

    m.pipeline.run(&text_doc(NOTES), "5").await.unwrap();

    let files = std::fs::read_dir(&transcripts).unwrap().count();
    assert_eq!(files, 2);
}
