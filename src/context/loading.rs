//! Document type detection and text extraction.

use std::io::{Cursor, Read};
use std::path::Path;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::QuizError;

pub const PDF_MIME: &str = "application/pdf";
pub const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const TEXT_MIME: &str = "text/plain";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Text,
}

impl DocumentKind {
    /// Map a declared content type. Parameters like `; charset=utf-8` are ignored.
    pub fn from_content_type(content_type: &str) -> Result<Self, QuizError> {
        let essence = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        match essence.as_str() {
            PDF_MIME => Ok(Self::Pdf),
            DOCX_MIME => Ok(Self::Docx),
            TEXT_MIME => Ok(Self::Text),
            _ => Err(QuizError::UnsupportedFileType(content_type.to_string())),
        }
    }

    /// Guess from a file extension, for local files without a content type.
    pub fn from_path(path: &Path) -> Result<Self, QuizError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            "txt" | "md" | "text" => Ok(Self::Text),
            _ => Err(QuizError::UnsupportedFileType(path.display().to_string())),
        }
    }
}

/// An uploaded file whose type has already been checked. Cloning shares the bytes.
#[derive(Debug, Clone)]
pub struct Document {
    pub filename: String,
    pub kind: DocumentKind,
    pub bytes: Bytes,
}

impl Document {
    pub fn new(filename: impl Into<String>, kind: DocumentKind, bytes: impl Into<Bytes>) -> Self {
        Self { filename: filename.into(), kind, bytes: bytes.into() }
    }

    /// Read a local file, inferring its kind from the extension.
    pub fn from_path(path: &Path) -> Result<Self, QuizError> {
        let kind = DocumentKind::from_path(path)?;
        let bytes = std::fs::read(path).map_err(|e| QuizError::DocumentLoad(format!("{}: {}", path.display(), e)))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { filename, kind, bytes: Bytes::from(bytes) })
    }

    /// Extract plain text.
    pub fn text(&self) -> Result<String, QuizError> {
        let text = match self.kind {
            DocumentKind::Text => String::from_utf8_lossy(&self.bytes).into_owned(),
            DocumentKind::Pdf => pdf_extract::extract_text_from_mem(&self.bytes)
                .map_err(|e| QuizError::DocumentLoad(format!("failed to extract text from PDF: {}", e)))?,
            DocumentKind::Docx => docx_text(&self.bytes)?,
        };

        if text.trim().is_empty() {
            warn!(target: "rag_quiz::context", filename = %self.filename, "no text extracted; image-only or empty document?");
        }
        debug!(target: "rag_quiz::context", filename = %self.filename, chars = text.len(), "document loaded");
        Ok(text)
    }
}

/// Pull the visible text out of a .docx (a zip holding `word/document.xml`).
pub fn docx_text(bytes: &[u8]) -> Result<String, QuizError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| QuizError::DocumentLoad(format!("not a valid docx archive: {}", e)))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| QuizError::DocumentLoad(format!("docx has no document body: {}", e)))?
        .read_to_string(&mut xml)
        .map_err(|e| QuizError::DocumentLoad(format!("failed to read docx body: {}", e)))?;
    Ok(word_xml_text(&xml))
}

/// Text content of WordprocessingML: `<w:t>` runs, with paragraph ends,
/// breaks and tabs turned into whitespace.
fn word_xml_text(xml: &str) -> String {
    let mut out = String::new();
    let mut rest = xml;
    let mut in_text_run = false;

    while let Some(open) = rest.find('<') {
        if in_text_run {
            out.push_str(&decode_entities(&rest[..open]));
        }
        let Some(close) = rest[open..].find('>') else { break };
        let tag = &rest[open + 1..open + close];
        let name = tag.trim_start_matches('/').split(|c: char| c.is_whitespace() || c == '/').next().unwrap_or_default();

        match (name, tag.starts_with('/')) {
            ("w:t", false) => in_text_run = !tag.ends_with('/'),
            ("w:t", true) => in_text_run = false,
            ("w:p", true) => out.push('\n'),
            ("w:br" | "w:cr", false) => out.push('\n'),
            ("w:tab", false) => out.push('\t'),
            _ => {}
        }
        rest = &rest[open + close + 1..];
    }
    out
}

/// Single pass over XML character data: the five named entities plus decimal
/// and hex character references. Anything unrecognised is copied through.
fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').and_then(|semi| Some((entity(&rest[1..semi])?, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn entity(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "amp" => Some('&'),
        _ => {
            let code = match name.strip_prefix('#')? {
                hex if hex.starts_with(['x', 'X']) => u32::from_str_radix(&hex[1..], 16).ok()?,
                dec => dec.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn content_types_map_to_kinds() {
        assert_eq!(DocumentKind::from_content_type("application/pdf").unwrap(), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_content_type("text/plain; charset=utf-8").unwrap(), DocumentKind::Text);
        assert_eq!(DocumentKind::from_content_type(DOCX_MIME).unwrap(), DocumentKind::Docx);
        assert!(matches!(
            DocumentKind::from_content_type("image/png"),
            Err(QuizError::UnsupportedFileType(t)) if t == "image/png"
        ));
    }

    #[test]
    fn extensions_map_to_kinds() {
        assert_eq!(DocumentKind::from_path(Path::new("notes.TXT")).unwrap(), DocumentKind::Text);
        assert_eq!(DocumentKind::from_path(Path::new("a/b/report.docx")).unwrap(), DocumentKind::Docx);
        assert!(DocumentKind::from_path(Path::new("slides.pptx")).is_err());
    }

    #[test]
    fn plain_text_is_lossy_utf8() {
        let doc = Document::new("a.txt", DocumentKind::Text, b"caf\xc3\xa9 \xff".to_vec());
        assert_eq!(doc.text().unwrap(), "café \u{fffd}");
    }

    #[test]
    fn word_xml_keeps_runs_and_paragraphs() {
        let xml = r#"<w:document><w:body><w:p><w:r><w:t>Hello</w:t></w:r><w:r><w:t xml:space="preserve"> world &amp; co</w:t></w:r></w:p><w:p><w:r><w:tab/><w:t>Next</w:t></w:r></w:p></w:body></w:document>"#;
        assert_eq!(word_xml_text(xml), "Hello world & co\n\tNext\n");
    }

    #[test]
    fn character_references_are_decoded_once() {
        assert_eq!(decode_entities("it&#8217;s &#x2019; &amp;lt; &#X41;"), "it\u{2019}s \u{2019} &lt; A");
        assert_eq!(decode_entities("R&D &#xD800; &bogus; &#;"), "R&D &#xD800; &bogus; &#;");
        let xml = "<w:p><w:r><w:t>caf&#233; &#8220;quoted&#8221;</w:t></w:r></w:p>";
        assert_eq!(word_xml_text(xml), "caf\u{e9} \u{201c}quoted\u{201d}\n");
    }

    #[test]
    fn docx_archive_round_trip() {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            zip.start_file("word/document.xml", zip::write::FileOptions::default()).unwrap();
            zip.write_all(b"<w:p><w:r><w:t>Ownership</w:t></w:r></w:p>").unwrap();
            zip.finish().unwrap();
        }
        let doc = Document::new("a.docx", DocumentKind::Docx, buf.into_inner());
        assert_eq!(doc.text().unwrap(), "Ownership\n");
    }

    #[test]
    fn corrupt_docx_is_a_load_error() {
        let doc = Document::new("a.docx", DocumentKind::Docx, b"not a zip".to_vec());
        assert!(matches!(doc.text(), Err(QuizError::DocumentLoad(_))));
    }
}
