//! Prompt text sent to the model.
//!
//! The quiz prompt is the de facto protocol between the batch controller and
//! the model: field names and nesting here must match [`crate::schema`].

use schemars::{schema_for, JsonSchema};

/// Retrieval query used to pick context chunks.
pub const RETRIEVAL_QUERY: &str = "quiz questions";

/// System instruction for the question-count call.
pub const INTENT_INSTRUCTION: &str = "IDENTIFY THE NUMBER OF QUESTIONS AND STRICTLY RETURN THE VALUE ONLY";

const QUIZ_TEMPLATE: &str = r#"You are an expert quiz generator. Create EXACTLY {num_questions} questions.

CRITICAL: Output complete, valid JSON. DO NOT truncate.

Structure:
- quiz_name: Concise title (3-8 words) summarizing the document
- questions: Array with EXACTLY {num_questions} question objects

Each question object:
- question: Question text
- type: "scq" (single correct), "mcq" (multiple correct), "ve" (verify/explain)
- options: Array ["A) option1", "B) option2", "C) option3", "D) option4"]
- correct_option_content: Full text of correct answer
- correct_option_letter: Letter only (A, B, C, or D)
- context: Brief source excerpt (under 100 chars)
- explanation: Detailed solution
- difficulty: -2.0 to 2.0 (decimals allowed: -1.5, 0, 0.5, 1.0, etc.)
- sub_topics: Array of 2-3 specific subtopics
- reframe: Object with {
    "reframe_qns": false,
    "reformed_qns": "",
    "reframe_options": false,
    "reformed_options": ""
}

Return ONLY valid JSON with this EXACT structure (no markdown, no code blocks):

{
"quiz_name": "...",
"questions":
[
    {"question": "...",
    "type": "...",
    "options": ["A) ...", "B) ...", "C) ...", "D) ..."],
    "correct_option_content": "...",
    "correct_option_letter": "...",
    "context": "...",
    "explanation": "...",
    "difficulty": 0.0,
    "sub_topics": ["...", "..."],
    "reframe": {
    "reframe_qns": false,
    "reformed_qns": "...",
    "reframe_options": false,
    "reformed_options": "..."
    }
    }
]
}

FOLLOWING ARE THE "CORRECT" EXAMPLES OF A OUTPUT FORMAT JSON YOU MUST REPLACE CONTENT ACCORDINGLY:

{
"quiz_name": "Brief Quiz Title",
"questions": [
    {
    "question": "What is...?",
    "type": "scq",
    "options": ["A) Option one", "B) Option two", "C) Option three", "D) Option four"],
    "correct_option_content": "Option one",
    "correct_option_letter": "A",
    "context": "Brief source excerpt",
    "explanation": "This is correct because...",
    "difficulty": 0.5,
    "sub_topics": ["topic1", "topic2"],
    "reframe": {"reframe_qns": false, "reformed_qns": "", "reframe_options": false, "reformed_options": ""}
    }
]
}
{schema}
DOCUMENT CONTEXT:
{context}
JSON OUTPUT:"#;

/// Render the generation prompt for one batch.
pub fn quiz_prompt(context: &str, num_questions: usize, schema_hint: Option<&str>) -> String {
    let schema = schema_hint
        .map(|s| format!("\nThe JSON must validate against this schema:\n{}\n", s))
        .unwrap_or_default();
    QUIZ_TEMPLATE
        .replace("{num_questions}", &num_questions.to_string())
        .replace("{schema}", &schema)
        .replace("{context}", context)
}

/// Pretty JSON schema for `T`, used as an optional hint in the quiz prompt.
pub fn schema_hint<T: JsonSchema>() -> String {
    let schema = schema_for!(T);
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| "Schema serialization failed".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Quiz;

    #[test]
    fn prompt_carries_count_and_context() {
        let p = quiz_prompt("Rust ownership rules.", 5, None);
        assert!(p.contains("Create EXACTLY 5 questions"));
        assert!(p.contains("EXACTLY 5 question objects"));
        assert!(p.ends_with("DOCUMENT CONTEXT:\nRust ownership rules.\nJSON OUTPUT:"));
        assert!(!p.contains("{num_questions}"));
        assert!(!p.contains("validate against this schema"));
    }

    #[test]
    fn context_placeholders_are_not_reexpanded() {
        let p = quiz_prompt("literal {num_questions}", 2, None);
        assert!(p.contains("literal {num_questions}"));
    }

    #[test]
    fn schema_hint_names_wire_fields() {
        let hint = schema_hint::<Quiz>();
        assert!(hint.contains("quiz_name"));
        assert!(hint.contains("correct_option_letter"));
        let p = quiz_prompt("ctx", 3, Some(&hint));
        assert!(p.contains("validate against this schema"));
    }
}
