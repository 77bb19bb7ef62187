//! Images and documents sent over the chat channel.
//!
//! [`MediaKind::classify`] routes a content type, [`extract`] and [`ocr`]
//! turn bytes into text, and [`analyzer::MediaAnalyzer`] turns that text (or
//! the image itself) into a reply via the completion service.

pub mod analyzer;
pub mod extract;
pub mod ocr;

/// Document formats the built-in extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    /// Plain text, and the fallback for unknown content types.
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Document(DocumentKind),
}

impl MediaKind {
    pub fn classify(content_type: &str) -> Self {
        let ct = content_type.trim().to_lowercase();
        if ct.starts_with("image/") {
            Self::Image
        } else if ct.contains("pdf") {
            Self::Document(DocumentKind::Pdf)
        } else if ct.contains("wordprocessingml") {
            Self::Document(DocumentKind::Docx)
        } else {
            Self::Document(DocumentKind::Text)
        }
    }
}

/// What the user wants done with an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaMode {
    #[default]
    Summarize,
    Explain,
}

const EXPLAIN_WORDS: &[&str] = &["explica", "explícame", "explicame", "explicar"];

impl MediaMode {
    /// Pick the mode from the caption sent with the attachment.
    pub fn from_caption(caption: &str) -> Self {
        let caption = caption.to_lowercase();
        if EXPLAIN_WORDS.iter().any(|w| caption.contains(w)) {
            Self::Explain
        } else {
            Self::Summarize
        }
    }
}
