//! Hosted language model access.
//!
//! Two seams are defined here:
//! - **[`LanguageModel`]** — turns a prompt (optionally with an attached
//!   document) into text.
//! - **[`DocumentStore`]** — lists and uploads files held by the provider.
//!
//! [`OpenAIClient`] implements both against the OpenAI REST API. Calls are
//! issued one at a time and never retried; any transport or API error is
//! returned to the caller as-is.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::config::LlmConfig;
use crate::models::DocumentRef;

/// A text-generation backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-4.1"`).
    fn model_name(&self) -> &str;

    /// Text-only call.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Call grounded on one previously uploaded document.
    async fn complete_with_document(&self, prompt: &str, document: &DocumentRef) -> Result<String>;
}

/// The provider-side file store that holds reference documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every file currently held by the provider.
    async fn list_files(&self) -> Result<Vec<DocumentRef>>;

    /// Upload a local file and return its handle.
    async fn upload(&self, path: &Path) -> Result<DocumentRef>;
}

/// OpenAI client covering the Responses and Files APIs.
pub struct OpenAIClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAIClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no API key is configured or the HTTP client
    /// cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config.require_api_key()?.to_string();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Send a single user message made of `content` parts to `POST /responses`.
    async fn create_response(&self, content: Vec<Value>) -> Result<String> {
        let body = json!({
            "model": self.model,
            "input": [
                {
                    "role": "user",
                    "content": content,
                }
            ],
        });

        let response = self
            .client
            .post(self.endpoint("responses"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, body_text);
        }

        let json: Value = response.json().await?;
        parse_output_text(&json)
    }
}

#[async_trait]
impl LanguageModel for OpenAIClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn complete(&self, prompt: &str) -> Result<String> {
        debug!(prompt_chars = prompt.len(), "text completion");
        self.create_response(vec![json!({ "type": "input_text", "text": prompt })])
            .await
    }

    #[instrument(skip_all, fields(model = %self.model, file_id = %document.id))]
    async fn complete_with_document(&self, prompt: &str, document: &DocumentRef) -> Result<String> {
        debug!(filename = %document.filename, "document-grounded completion");
        self.create_response(vec![
            json!({ "type": "input_file", "file_id": document.id }),
            json!({ "type": "input_text", "text": prompt }),
        ])
        .await
    }
}

#[async_trait]
impl DocumentStore for OpenAIClient {
    async fn list_files(&self) -> Result<Vec<DocumentRef>> {
        let response = self
            .client
            .get(self.endpoint("files"))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, body_text);
        }

        let json: Value = response.json().await?;
        let data = json
            .get("data")
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing data array"))?;
        serde_json::from_value(data).with_context(|| "Invalid OpenAI file listing")
    }

    #[instrument(skip(self))]
    async fn upload(&self, path: &Path) -> Result<DocumentRef> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read document: {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow::anyhow!("document path has no file name: {}", path.display()))?;

        let form = Form::new()
            .text("purpose", "user_data")
            .part("file", Part::bytes(bytes).file_name(filename));

        let response = self
            .client
            .post(self.endpoint("files"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, body_text);
        }

        let document: DocumentRef = response.json().await?;
        debug!(file_id = %document.id, "uploaded document");
        Ok(document)
    }
}

/// Extract the generated text from a Responses API payload.
///
/// Concatenates every `output_text` part of every `message` item, in order.
pub fn parse_output_text(json: &Value) -> Result<String> {
    if let Some(text) = json.get("output_text").and_then(|t| t.as_str()) {
        return Ok(text.to_string());
    }

    let output = json
        .get("output")
        .and_then(|o| o.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing output array"))?;

    let text = output
        .iter()
        .filter(|item| item.get("type").and_then(|t| t.as_str()) == Some("message"))
        .filter_map(|item| item.get("content").and_then(|c| c.as_array()))
        .flatten()
        .filter(|part| part.get("type").and_then(|t| t.as_str()) == Some("output_text"))
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect::<String>();

    Ok(text)
}
