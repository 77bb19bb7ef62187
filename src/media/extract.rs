//! Document text extraction.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;

use super::DocumentKind;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("DOCX extraction failed: {0}")]
    Docx(String),
    #[error("OCR failed: {0}")]
    Ocr(String),
    #[error("extraction task failed: {0}")]
    Task(String),
}

/// Turns document bytes into plain text.
///
/// Synchronous; callers in async contexts should use `tokio::task::spawn_blocking`.
pub trait DocumentExtractor: Send + Sync {
    fn extract(&self, kind: DocumentKind, data: &[u8]) -> Result<String, ExtractError>;
}

/// PDF via `pdf-extract`, DOCX via the `word/document.xml` text runs, anything
/// else as lossy UTF-8.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinExtractor;

impl DocumentExtractor for BuiltinExtractor {
    fn extract(&self, kind: DocumentKind, data: &[u8]) -> Result<String, ExtractError> {
        match kind {
            DocumentKind::Pdf => pdf_text(data),
            DocumentKind::Docx => docx_text(data),
            DocumentKind::Text => Ok(String::from_utf8_lossy(data).into_owned()),
        }
    }
}

fn pdf_text(data: &[u8]) -> Result<String, ExtractError> {
    // pdf-extract panics on some malformed inputs.
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(data)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(ExtractError::Pdf(e.to_string())),
        Err(_) => Err(ExtractError::Pdf("parser panicked".into())),
    }
}

pub fn docx_text(data: &[u8]) -> Result<String, ExtractError> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(data)).map_err(|e| ExtractError::Docx(e.to_string()))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| ExtractError::Docx(e.to_string()))?
        .read_to_string(&mut xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    document_xml_text(&xml)
}

/// Paragraph text of a WordprocessingML body, one paragraph per line.
///
/// `mc:Fallback` subtrees repeat the content of their `mc:Choice` sibling and
/// are skipped.
fn document_xml_text(xml: &str) -> Result<String, ExtractError> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut paragraph = String::new();
    let mut in_text = false;
    let mut fallback_depth = 0usize;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| ExtractError::Docx(e.to_string()))?;
        match event {
            Event::Start(tag) => match tag.name().as_ref() {
                b"mc:Fallback" => fallback_depth += 1,
                _ if fallback_depth > 0 => {}
                b"w:t" => in_text = true,
                _ => {}
            },
            Event::End(tag) => match tag.name().as_ref() {
                b"mc:Fallback" => fallback_depth = fallback_depth.saturating_sub(1),
                _ if fallback_depth > 0 => {}
                b"w:t" => in_text = false,
                b"w:p" => {
                    out.push_str(paragraph.trim_end());
                    out.push('\n');
                    paragraph.clear();
                }
                _ => {}
            },
            Event::Empty(tag) if fallback_depth == 0 => match tag.name().as_ref() {
                b"w:tab" => paragraph.push('\t'),
                b"w:br" | b"w:cr" => paragraph.push('\n'),
                b"w:p" => out.push('\n'),
                _ => {}
            },
            Event::Text(text) if in_text && fallback_depth == 0 => {
                let text = text
                    .unescape()
                    .map_err(|e| ExtractError::Docx(e.to_string()))?;
                paragraph.push_str(&text);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    out.push_str(&paragraph);
    Ok(out.trim().to_string())
}
