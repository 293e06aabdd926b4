//! Locating JSON inside free-form model output.
//!
//! Models asked for "JSON only" still wrap it in code fences, prefix it with
//! prose or nest it under an extra key. These helpers find every balanced
//! object/array in the text (string-aware) and try to deserialize them,
//! outermost first.

use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Object,
    Array,
}

/// Byte span of a balanced JSON structure, with its nested structures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonSpan {
    pub start: usize,
    /// Exclusive end
    pub end: usize,
    pub kind: NodeType,
    pub children: Vec<JsonSpan>,
}

impl JsonSpan {
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}

struct Open {
    start: usize,
    kind: NodeType,
    children: Vec<JsonSpan>,
}

/// Find all balanced root structures. Mismatched closers are ignored and
/// unterminated structures (truncated output) are dropped.
#[instrument(target = "rag_quiz::json", skip(text), fields(text_len = text.len()))]
pub fn find_json_structures(text: &str) -> Vec<JsonSpan> {
    let mut roots = Vec::new();
    let mut stack: Vec<Open> = Vec::new();
    let mut in_string = false;
    let mut escape = false;

    for (i, b) in text.bytes().enumerate() {
        if in_string {
            match (escape, b) {
                (true, _) => escape = false,
                (false, b'\\') => escape = true,
                (false, b'"') => in_string = false,
                _ => {}
            }
            continue;
        }

        let closing = match b {
            b'"' => {
                in_string = true;
                None
            }
            b'{' => {
                stack.push(Open { start: i, kind: NodeType::Object, children: Vec::new() });
                None
            }
            b'[' => {
                stack.push(Open { start: i, kind: NodeType::Array, children: Vec::new() });
                None
            }
            b'}' => Some(NodeType::Object),
            b']' => Some(NodeType::Array),
            _ => None,
        };

        let Some(kind) = closing else { continue };
        if stack.last().map(|open| open.kind) != Some(kind) {
            continue;
        }
        if let Some(open) = stack.pop() {
            let span = JsonSpan { start: open.start, end: i + 1, kind, children: open.children };
            match stack.last_mut() {
                Some(parent) => parent.children.push(span),
                None => roots.push(span),
            }
        }
    }

    debug!(target: "rag_quiz::json", roots = roots.len(), unterminated = stack.len(), "scanned for json");
    roots
}

/// Parse the first `T` in the text: the whole text, then each structure
/// outermost-first in order of appearance.
pub fn extract_first<T: DeserializeOwned>(text: &str) -> Option<T> {
    if let Ok(v) = serde_json::from_str::<T>(text.trim()) {
        return Some(v);
    }

    fn search<T: DeserializeOwned>(text: &str, span: &JsonSpan) -> Option<T> {
        if let Ok(v) = serde_json::from_str::<T>(span.slice(text)) {
            return Some(v);
        }
        span.children.iter().find_map(|child| search(text, child))
    }

    find_json_structures(text)
        .iter()
        .find_map(|span| search(text, span))
}

/// Extract all occurrences of `T`. A structure that parses as `Vec<T>` or `T`
/// is consumed whole; otherwise its children are searched.
pub fn extract_all<T: DeserializeOwned>(text: &str) -> Vec<T> {
    if let Ok(v) = serde_json::from_str::<Vec<T>>(text.trim()) {
        return v;
    }

    fn collect<T: DeserializeOwned>(text: &str, span: &JsonSpan, out: &mut Vec<T>) {
        let s = span.slice(text);
        if let Ok(vs) = serde_json::from_str::<Vec<T>>(s) {
            out.extend(vs);
            return;
        }
        if let Ok(v) = serde_json::from_str::<T>(s) {
            out.push(v);
            return;
        }
        for child in &span.children {
            collect(text, child, out);
        }
    }

    let mut out = Vec::new();
    for span in find_json_structures(text) {
        collect(text, &span, &mut out);
    }
    out
}

/// First unsigned integer in the text, e.g. `"12"` from `"You asked for 12 questions."`.
pub fn first_integer(text: &str) -> Option<usize> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..].chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}
