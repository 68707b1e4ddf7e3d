//! In-memory fakes for the provider seams, shared by unit tests.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::llm::{DocumentStore, LanguageModel};
use crate::models::DocumentRef;

#[derive(Default)]
pub struct FakeStore {
    files: Vec<DocumentRef>,
    list_calls: AtomicUsize,
    uploaded: Mutex<Vec<PathBuf>>,
}

impl FakeStore {
    pub fn with_files(files: Vec<DocumentRef>) -> Self {
        Self {
            files,
            ..Self::default()
        }
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn uploaded(&self) -> Vec<PathBuf> {
        self.uploaded.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentStore for FakeStore {
    async fn list_files(&self) -> Result<Vec<DocumentRef>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.files.clone())
    }

    async fn upload(&self, path: &Path) -> Result<DocumentRef> {
        let mut uploaded = self.uploaded.lock().unwrap();
        uploaded.push(path.to_path_buf());
        Ok(DocumentRef {
            id: format!("file-{}", uploaded.len()),
            filename: path.file_name().unwrap().to_string_lossy().into_owned(),
        })
    }
}

/// One recorded model invocation.
#[derive(Debug, Clone)]
pub struct Call {
    pub prompt: String,
    pub document: Option<DocumentRef>,
}

/// Answers document calls with `"summary of <filename>"` and text calls
/// with a fixed reply.
pub struct FakeModel {
    reply: String,
    fail: bool,
    calls: Mutex<Vec<Call>>,
}

impl FakeModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::replying("")
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    fn model_name(&self) -> &str {
        "fake"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.calls.lock().unwrap().push(Call {
            prompt: prompt.to_string(),
            document: None,
        });
        if self.fail {
            bail!("OpenAI API error 500 Internal Server Error: upstream exploded");
        }
        Ok(self.reply.clone())
    }

    async fn complete_with_document(&self, prompt: &str, document: &DocumentRef) -> Result<String> {
        self.calls.lock().unwrap().push(Call {
            prompt: prompt.to_string(),
            document: Some(document.clone()),
        });
        if self.fail {
            bail!("OpenAI API error 500 Internal Server Error: upstream exploded");
        }
        Ok(format!("summary of {}", document.filename))
    }
}
