//! Turns an attachment into a study-oriented reply.
//!
//! Documents are extracted to text and summarized or explained. Images go to
//! the vision model first and fall back to OCR when the answer is thin or the
//! call fails. Every path ends in a user-facing string.

use std::sync::Arc;

use base64::Engine;

use super::extract::{DocumentExtractor, ExtractError};
use super::ocr::Ocr;
use super::{DocumentKind, MediaKind, MediaMode};
use crate::completion::{
    ChatMessage, CompletionError, CompletionRequest, CompletionService, ContentPart, ImageUrl,
};
use crate::persona::TUTOR_PERSONA;

pub const NO_TEXT_MESSAGE: &str = "No pude extraer texto del documento. Si es un PDF escaneado, \
envíalo como foto o usa un PDF con texto real.";

const IMAGE_GOAL: &str = "analiza y resuelve si es un ejercicio; explica paso a paso";
/// OCR output must be longer than this to be worth analyzing.
const MIN_OCR_CHARS: usize = 20;
/// How much OCR text is echoed back to the user.
const OCR_EXCERPT_CHARS: usize = 600;

#[derive(Debug, Clone)]
pub struct AnalyzerSettings {
    pub temperature: f32,
    pub ocr_language: String,
    /// Vision answers shorter than this trigger an OCR pass.
    pub vision_min_chars: usize,
}

impl AnalyzerSettings {
    pub fn from_config(config: &crate::config::AkiraConfig) -> Self {
        Self {
            temperature: config.completion.analysis_temperature,
            ocr_language: config.media.ocr_language.clone(),
            vision_min_chars: config.media.vision_min_chars,
        }
    }
}

pub struct MediaAnalyzer {
    completion: Arc<dyn CompletionService>,
    extractor: Arc<dyn DocumentExtractor>,
    ocr: Arc<dyn Ocr>,
    settings: AnalyzerSettings,
}

impl MediaAnalyzer {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        extractor: Arc<dyn DocumentExtractor>,
        ocr: Arc<dyn Ocr>,
        settings: AnalyzerSettings,
    ) -> Self {
        Self {
            completion,
            extractor,
            ocr,
            settings,
        }
    }

    /// Built-in extractor and the configured tesseract binary.
    pub fn from_config(
        completion: Arc<dyn CompletionService>,
        config: &crate::config::AkiraConfig,
    ) -> Self {
        Self::new(
            completion,
            Arc::new(super::extract::BuiltinExtractor),
            Arc::new(super::ocr::TesseractOcr::new(&config.media.ocr_command)),
            AnalyzerSettings::from_config(config),
        )
    }

    pub async fn analyze(&self, content_type: &str, data: Vec<u8>, mode: MediaMode) -> String {
        match MediaKind::classify(content_type) {
            MediaKind::Image => self.analyze_image(content_type, &data).await,
            MediaKind::Document(kind) => self.analyze_document(kind, data, mode).await,
        }
    }

    async fn analyze_document(&self, kind: DocumentKind, data: Vec<u8>, mode: MediaMode) -> String {
        let extractor = Arc::clone(&self.extractor);
        let extracted = tokio::task::spawn_blocking(move || extractor.extract(kind, &data))
            .await
            .map_err(|e| ExtractError::Task(e.to_string()))
            .and_then(|r| r);

        let text = match extracted {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => return NO_TEXT_MESSAGE.to_string(),
            Err(e) => {
                tracing::warn!(kind = ?kind, error = %e, "document extraction failed");
                return NO_TEXT_MESSAGE.to_string();
            }
        };
        tracing::debug!(kind = ?kind, chars = text.chars().count(), "document text extracted");

        let result = match mode {
            MediaMode::Summarize => self.summarize(&text, "resumen para estudiar").await,
            MediaMode::Explain => self.explain(&text, "explica paso a paso").await,
        };
        result.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "document analysis failed");
            crate::persona::processing_apology(&e)
        })
    }

    /// Images always get the solve-and-explain goal; the caption mode only
    /// applies to documents.
    async fn analyze_image(&self, content_type: &str, data: &[u8]) -> String {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(TUTOR_PERSONA),
            ChatMessage::user_parts(vec![
                ContentPart::Text {
                    text: format!("Objetivo: {IMAGE_GOAL}"),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: data_url(content_type, data),
                    },
                },
            ]),
        ])
        .with_temperature(self.settings.temperature);

        match self.completion.complete(request).await {
            Ok(vision) => {
                if vision.chars().count() < self.settings.vision_min_chars {
                    if let Some(ocr_text) = self.ocr_text(data).await {
                        match self.summarize(&ocr_text, "texto detectado por OCR en imagen").await {
                            Ok(analysis) => {
                                return format!(
                                    "Texto detectado (OCR):\n{}\n\nAnálisis:\n{analysis}",
                                    excerpt(&ocr_text)
                                )
                            }
                            Err(e) => tracing::warn!(error = %e, "OCR analysis failed"),
                        }
                    }
                }
                vision
            }
            Err(vision_err) => {
                tracing::warn!(error = %vision_err, "vision request failed, trying OCR");
                let Some(ocr_text) = self.ocr_text(data).await else {
                    return image_apology(&vision_err);
                };
                match self
                    .summarize(&ocr_text, "texto detectado por OCR (fallback)")
                    .await
                {
                    Ok(analysis) => format!(
                        "[Visión falló: {vision_err}]\n\nTexto (OCR):\n{}\n\nAnálisis:\n{analysis}",
                        excerpt(&ocr_text)
                    ),
                    Err(e) => image_apology(&e),
                }
            }
        }
    }

    /// OCR text long enough to analyze, if any.
    async fn ocr_text(&self, data: &[u8]) -> Option<String> {
        match self.ocr.recognize(data, &self.settings.ocr_language).await {
            Ok(text) if text.chars().count() > MIN_OCR_CHARS => Some(text),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "OCR failed");
                None
            }
        }
    }

    async fn summarize(&self, text: &str, focus: &str) -> Result<String, CompletionError> {
        let system = format!(
            "Resume en español con puntos clave y ejemplos si aplica. \
             Concluye en 1-2 líneas. Enfócate en: {focus}. \
             Si hay listas, usa viñetas."
        );
        self.analysis(system, text.to_string()).await
    }

    async fn explain(&self, text: &str, instruction: &str) -> Result<String, CompletionError> {
        let system = "Explica en español como para un estudiante de secundaria, paso a paso, \
                      claro y conciso. Incluye ejemplos simples si ayuda. \
                      Si hay fórmulas, escríbelas en texto plano.";
        self.analysis(
            system.to_string(),
            format!("Instrucción: {instruction}\n\nTexto:\n{text}"),
        )
        .await
    }

    async fn analysis(&self, system: String, user: String) -> Result<String, CompletionError> {
        let request =
            CompletionRequest::new(vec![ChatMessage::system(system), ChatMessage::user(user)])
                .with_temperature(self.settings.temperature);
        self.completion.complete(request).await
    }
}

fn image_apology(detail: &dyn std::fmt::Display) -> String {
    format!("No pude analizar la imagen todavía 🤕 Detalle: {detail}")
}

fn data_url(content_type: &str, data: &[u8]) -> String {
    let ct = if content_type.trim().is_empty() {
        "image/jpeg"
    } else {
        content_type.trim()
    };
    let encoded = base64::engine::general_purpose::STANDARD.encode(data);
    format!("data:{ct};base64,{encoded}")
}

fn excerpt(text: &str) -> String {
    match text.char_indices().nth(OCR_EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
