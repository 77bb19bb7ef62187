//! Optical character recognition for photographed text.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::extract::ExtractError;

#[async_trait]
pub trait Ocr: Send + Sync {
    /// Recognize text in an encoded image. `language` is a tesseract-style hint.
    async fn recognize(&self, image: &[u8], language: &str) -> Result<String, ExtractError>;
}

/// Runs the `tesseract` CLI as a child process, image on stdin, text on stdout.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    command: String,
}

impl TesseractOcr {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl Ocr for TesseractOcr {
    async fn recognize(&self, image: &[u8], language: &str) -> Result<String, ExtractError> {
        let mut child = Command::new(&self.command)
            .args(["stdin", "stdout", "-l", language])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExtractError::Ocr(format!("failed to start {}: {e}", self.command)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(image)
                .await
                .map_err(|e| ExtractError::Ocr(e.to_string()))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ExtractError::Ocr(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::Ocr(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
