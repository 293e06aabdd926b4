//! Quiz contract: the validated shapes returned to callers, and the looser
//! draft shapes model output is parsed into before validation.
//!
//! The serialized field names are the wire contract shared with the prompt
//! and with existing clients, so they must not change.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Name used when no batch was ever accepted.
pub const DEFAULT_QUIZ_NAME: &str = "Generated Quiz";

/// Maximum length (in characters) of a question's source excerpt.
pub const MAX_CONTEXT_CHARS: usize = 100;

pub const OPTION_LETTERS: [char; 4] = ['A', 'B', 'C', 'D'];

pub const DIFFICULTY_MIN: f64 = -2.0;
pub const DIFFICULTY_MAX: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    /// Single correct option
    Scq,
    /// Multiple correct options
    Mcq,
    /// Verify / explain
    Ve,
}

impl QuestionType {
    /// Lenient parse of the `type` field as models actually emit it.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase().replace(['-', '_'], " ");
        match normalized.as_str() {
            "scq" | "single" | "single correct" | "single choice" => Some(Self::Scq),
            "mcq" | "multiple" | "multi correct" | "multiple correct" | "multiple choice" => Some(Self::Mcq),
            "ve" | "verify" | "explain" | "verify explain" | "verify/explain" => Some(Self::Ve),
            _ => None,
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scq => write!(f, "scq"),
            Self::Mcq => write!(f, "mcq"),
            Self::Ve => write!(f, "ve"),
        }
    }
}

/// Optional alternate phrasing suggested by the generator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Reframe {
    #[serde(default)]
    pub reframe_qns: bool,
    #[serde(default)]
    pub reformed_qns: String,
    #[serde(default)]
    pub reframe_options: bool,
    #[serde(default)]
    pub reformed_options: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Question {
    /// The question text
    pub question: String,
    /// Question type: scq, mcq, or ve
    #[serde(rename = "type")]
    pub kind: QuestionType,
    /// 4 options as ["A) ...", "B) ...", "C) ...", "D) ..."]
    pub options: Vec<String>,
    /// Full text of correct answer
    pub correct_option_content: String,
    /// Letter only: A, B, C, or D
    pub correct_option_letter: String,
    /// Source excerpt under 100 chars
    pub context: String,
    /// Why this answer is correct
    pub explanation: String,
    /// Difficulty from -2.0 to 2.0, decimals allowed
    pub difficulty: f64,
    /// 2-3 relevant subtopics
    pub sub_topics: Vec<String>,
    #[serde(default)]
    pub reframe: Reframe,
}

impl Question {
    /// The option the correct letter points at.
    pub fn correct_option(&self) -> Option<&str> {
        let letter = self.correct_option_letter.chars().next()?;
        let idx = OPTION_LETTERS.iter().position(|c| *c == letter)?;
        self.options.get(idx).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Quiz {
    /// Concise title (3-8 words)
    pub quiz_name: String,
    /// Array of question objects
    pub questions: Vec<Question>,
}

impl Quiz {
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// A quiz as parsed from model output, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct QuizDraft {
    pub quiz_name: String,
    #[serde(default)]
    pub questions: Vec<QuestionDraft>,
}

/// A question as parsed from model output.
///
/// `difficulty` and `sub_topics` are the fields models most often drop, so
/// they are optional here and gate validation.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionDraft {
    pub question: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub options: Vec<String>,
    pub correct_option_content: String,
    pub correct_option_letter: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default, deserialize_with = "lenient_difficulty")]
    pub difficulty: Option<f64>,
    #[serde(default)]
    pub sub_topics: Option<Vec<String>>,
    #[serde(default)]
    pub reframe: Reframe,
}

/// Accepts `0.5`, `"0.5"` and `null`.
fn lenient_difficulty<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) => Some(n),
        Some(Raw::Text(s)) => s.trim().parse::<f64>().ok(),
        None => None,
    })
}

fn normalize_letter(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches([')', '.', ':']).trim();
    let mut chars = trimmed.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    if chars.next().is_some() || !OPTION_LETTERS.contains(&letter) {
        return None;
    }
    Some(letter.to_string())
}

fn truncate_chars(text: String, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text,
    }
}

impl QuestionDraft {
    /// Returns the validated question, or `None` when a required field is
    /// missing or an invariant does not hold. Nothing is repaired except
    /// trimming an over-long context excerpt.
    pub fn into_question(self) -> Option<Question> {
        let difficulty = self.difficulty?;
        let sub_topics = self.sub_topics?;

        if !difficulty.is_finite() || !(DIFFICULTY_MIN..=DIFFICULTY_MAX).contains(&difficulty) {
            return None;
        }
        if self.options.len() != OPTION_LETTERS.len() {
            return None;
        }
        let kind = QuestionType::parse(&self.kind)?;
        let correct_option_letter = normalize_letter(&self.correct_option_letter)?;

        Some(Question {
            question: self.question,
            kind,
            options: self.options,
            correct_option_content: self.correct_option_content,
            correct_option_letter,
            context: truncate_chars(self.context, MAX_CONTEXT_CHARS),
            explanation: self.explanation,
            difficulty,
            sub_topics,
            reframe: self.reframe,
        })
    }
}

/// Keep the structurally complete questions, in order.
pub fn validate(drafts: Vec<QuestionDraft>) -> Vec<Question> {
    drafts.into_iter().filter_map(QuestionDraft::into_question).collect()
}
