use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::documents::LoadStrategy;
use crate::models::Marker;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
    #[serde(default)]
    pub articles: ArticlesConfig,
    #[serde(default)]
    pub markers: MarkersConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Directory served under `/static` (browser client assets).
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            static_dir: default_static_dir(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("./static")
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            username: default_username(),
            password: None,
        }
    }
}

fn default_username() -> String {
    "admin".to_string()
}

impl AuthConfig {
    /// The shared-secret password. The server refuses to start without one.
    pub fn require_password(&self) -> Result<&str> {
        match self.password.as_deref() {
            Some(p) if !p.is_empty() => Ok(p),
            _ => bail!("auth.password must be set (or APP_PASSWORD exported) to serve requests"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_model() -> String {
    "gpt-4.1".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_timeout_secs() -> u64 {
    600
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default = "default_docs_root")]
    pub root: PathBuf,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            root: default_docs_root(),
        }
    }
}

fn default_strategy() -> String {
    "remote".to_string()
}
fn default_docs_root() -> PathBuf {
    PathBuf::from("./docs")
}

#[derive(Debug, Deserialize, Clone)]
pub struct PromptsConfig {
    #[serde(default = "default_prompts_dir")]
    pub dir: PathBuf,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            dir: default_prompts_dir(),
        }
    }
}

fn default_prompts_dir() -> PathBuf {
    PathBuf::from("./prompts")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArticlesConfig {
    /// General training guidance, scraped for every plan.
    #[serde(default = "default_training_articles")]
    pub training: Vec<String>,
    /// Recovery and heart-rate-variability guidance, scraped for every daily workout.
    #[serde(default = "default_recovery_articles")]
    pub recovery: Vec<String>,
}

impl Default for ArticlesConfig {
    fn default() -> Self {
        Self {
            training: default_training_articles(),
            recovery: default_recovery_articles(),
        }
    }
}

fn default_training_articles() -> Vec<String> {
    [
        "https://roxlyfe.com/hyrox-training-plan-fundamentals/",
        "https://support.runna.com/en/articles/6781532-the-ultimate-functional-fitness-and-hyrox-running-training-guide",
        "https://www.hyroxtrainingplans.com/blog/hyrox-training-periodization-seasonal-breakdown",
        "https://www.purefitness.com/blogs/hyrox-training-plan-a-free-workout-plan-to-get-hyrox-ready",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_recovery_articles() -> Vec<String> {
    [
        "https://www.precisionhydration.com/performance-advice/performance/hrv-optimise-training-and-recovery",
        "https://www.trainingpeaks.com/coach-blog/hrv-guided-training",
        "https://www.trainingpeaks.com/coach-blog/the-coachs-guide-to-hrv-monitoring",
        "https://www.trainingpeaks.com/coach-blog/the-whole-picture-an-introduction-to-total-load",
        "https://www.kubios.com/blog/hrv-guided-training",
        "https://simplifaster.com/articles/interpreting-hrv-trends-athletes",
        "https://www.athleticlab.com/heart-rate-variability-based-training-by-jason-winegar",
        "https://www.frontiersin.org/journals/physiology/articles/10.3389/fphys.2014.00073/full",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct MarkersConfig {
    #[serde(default = "default_allowed_markers")]
    pub allowed: Vec<Marker>,
}

impl Default for MarkersConfig {
    fn default() -> Self {
        Self {
            allowed: default_allowed_markers(),
        }
    }
}

fn default_allowed_markers() -> Vec<Marker> {
    Marker::ALL.to_vec()
}

impl LlmConfig {
    /// The provider API key. Only required by commands that call the model.
    pub fn require_api_key(&self) -> Result<&str> {
        match self.api_key.as_deref() {
            Some(k) if !k.is_empty() => Ok(k),
            _ => bail!("llm.api_key must be set (or OPENAI_API_KEY exported)"),
        }
    }
}

/// Load configuration from `path`, apply process environment overrides, and validate.
///
/// A missing file is not an error: every setting has a default, and the
/// secrets normally come from the environment.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        parse_config(&content)?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config)?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

/// Overlay `PORT`, `APP_PASSWORD`, and `OPENAI_API_KEY` onto `config`.
///
/// `lookup` abstracts the environment so tests need not mutate process state.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("PORT") {
        let port: u16 = port
            .trim()
            .parse()
            .with_context(|| format!("PORT must be a valid port number, got '{}'", port))?;
        let host = config
            .server
            .bind
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| config.server.bind.clone());
        config.server.bind = format!("{}:{}", host, port);
    }

    if let Some(password) = lookup("APP_PASSWORD") {
        config.auth.password = Some(password);
    }

    if config.llm.api_key.is_none() {
        config.llm.api_key = lookup("OPENAI_API_KEY");
    }

    Ok(())
}

pub fn validate_config(config: &Config) -> Result<()> {
    config
        .documents
        .strategy
        .parse::<LoadStrategy>()
        .with_context(|| "Invalid [documents] configuration")?;

    if config.markers.allowed.is_empty() {
        bail!("markers.allowed must list at least one marker");
    }

    if config.llm.model.trim().is_empty() {
        bail!("llm.model must not be empty");
    }

    if config.llm.timeout_secs == 0 {
        bail!("llm.timeout_secs must be > 0");
    }

    if config.auth.username.is_empty() {
        bail!("auth.username must not be empty");
    }

    Ok(())
}
