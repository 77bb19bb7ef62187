#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use akira::akira::{Akira, AkiraSettings};
use akira::completion::{CompletionError, CompletionRequest, CompletionService};
use akira::media::analyzer::{AnalyzerSettings, MediaAnalyzer};
use akira::media::extract::{DocumentExtractor, ExtractError};
use akira::media::ocr::Ocr;
use akira::media::DocumentKind;
use akira::memory::types::UserState;
use akira::store::file::FileStateStore;
use akira::store::{StateStore, StoreError, UserKey};

/// Completion service that replays scripted results and records every request.
///
/// Once the script runs out it answers `respuesta <n>` with the call number.
#[derive(Default)]
pub struct ScriptedCompletion {
    script: Mutex<VecDeque<Result<String, CompletionError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    delay: Option<Duration>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn then_ok(self, text: impl Into<String>) -> Self {
        self.script.lock().unwrap().push_back(Ok(text.into()));
        self
    }

    pub fn then_err(self, err: CompletionError) -> Self {
        self.script.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("respuesta {call}")))
    }
}

/// Extractor returning fixed text, or failing when `None`.
pub struct FixedExtractor(pub Option<String>);

impl DocumentExtractor for FixedExtractor {
    fn extract(&self, _kind: DocumentKind, _data: &[u8]) -> Result<String, ExtractError> {
        self.0
            .clone()
            .ok_or_else(|| ExtractError::Pdf("no text layer".into()))
    }
}

/// OCR returning fixed text, or failing when `None`.
pub struct FixedOcr(pub Option<String>);

#[async_trait]
impl Ocr for FixedOcr {
    async fn recognize(&self, _image: &[u8], _language: &str) -> Result<String, ExtractError> {
        self.0
            .clone()
            .ok_or_else(|| ExtractError::Ocr("tesseract not installed".into()))
    }
}

/// Store whose reads succeed (always empty) and whose writes always fail.
pub struct ReadOnlyStore;

impl StateStore for ReadOnlyStore {
    fn backend(&self) -> &'static str {
        "read-only"
    }

    fn read(&self, _key: &UserKey) -> Result<Option<UserState>, StoreError> {
        Ok(None)
    }

    fn save(&self, key: &UserKey, _state: &UserState) -> Result<(), StoreError> {
        Err(StoreError::Io {
            key: key.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        })
    }

    fn remove(&self, _key: &UserKey) -> Result<bool, StoreError> {
        Ok(false)
    }

    fn keys(&self) -> Result<Vec<UserKey>, StoreError> {
        Ok(Vec::new())
    }
}

/// File store whose next `read` fails with an I/O error once armed.
pub struct FlakyStore {
    inner: FileStateStore,
    fail_next_read: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: FileStateStore) -> Self {
        Self {
            inner,
            fail_next_read: AtomicBool::new(false),
        }
    }

    pub fn fail_next_read(&self) {
        self.fail_next_read.store(true, Ordering::SeqCst);
    }
}

impl StateStore for FlakyStore {
    fn backend(&self) -> &'static str {
        "flaky"
    }

    fn read(&self, key: &UserKey) -> Result<Option<UserState>, StoreError> {
        if self.fail_next_read.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Io {
                key: key.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::WouldBlock, "busy"),
            });
        }
        self.inner.read(key)
    }

    fn save(&self, key: &UserKey, state: &UserState) -> Result<(), StoreError> {
        self.inner.save(key, state)
    }

    fn remove(&self, key: &UserKey) -> Result<bool, StoreError> {
        self.inner.remove(key)
    }

    fn keys(&self) -> Result<Vec<UserKey>, StoreError> {
        self.inner.keys()
    }
}

pub fn analyzer_settings() -> AnalyzerSettings {
    AnalyzerSettings {
        temperature: 0.2,
        ocr_language: "spa".into(),
        vision_min_chars: 120,
    }
}

pub fn analyzer(
    completion: Arc<ScriptedCompletion>,
    extractor: impl DocumentExtractor + 'static,
    ocr: impl Ocr + 'static,
) -> MediaAnalyzer {
    MediaAnalyzer::new(
        completion,
        Arc::new(extractor),
        Arc::new(ocr),
        analyzer_settings(),
    )
}

/// A JSON store in a fresh temp directory. Keep the `TempDir` alive.
pub fn temp_store() -> (Arc<FileStateStore>, TempDir) {
    let tmp = TempDir::new().unwrap();
    let store = FileStateStore::open(tmp.path().join("users")).unwrap();
    (Arc::new(store), tmp)
}

pub fn akira_with(
    store: Arc<dyn StateStore>,
    completion: Arc<ScriptedCompletion>,
    settings: AkiraSettings,
) -> Akira {
    let media = analyzer(
        Arc::clone(&completion),
        FixedExtractor(None),
        FixedOcr(None),
    );
    Akira::new(store, completion, media, settings)
}

/// An orchestrator over a temp JSON store with default settings.
pub fn test_akira(completion: Arc<ScriptedCompletion>) -> (Akira, Arc<FileStateStore>, TempDir) {
    let (store, tmp) = temp_store();
    let akira = akira_with(store.clone(), completion, AkiraSettings::default());
    (akira, store, tmp)
}
