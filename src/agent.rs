//! The research, plan, and daily-workout pipelines.
//!
//! ```text
//! build_research_report(marker)
//!     load documents ──▶ summarize each (document call) ──▶ join with blank lines
//!
//! build_training_plan(goal, marker)
//!     research report ─┐
//!     scrape training ─┴▶ build_training_plan prompt ──▶ text call
//!
//! generate_daily_workout(plan, week, day, metrics)
//!     scrape recovery ─┐
//!     metrics block  ──┴▶ daily_workout prompt ──▶ text call
//! ```
//!
//! Every step runs sequentially. Cost and latency of the research report
//! grow linearly with the number of matching documents.

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::config::{ArticlesConfig, Config};
use crate::documents::{DocumentLoader, LoadStrategy};
use crate::llm::{DocumentStore, LanguageModel, OpenAIClient};
use crate::models::{present, DocumentRef, HealthMetrics, Marker, TrainingPlan};
use crate::prompts::{PromptLibrary, PromptTemplate};
use crate::scrape::Scraper;

pub struct ResearchAgent {
    llm: Arc<dyn LanguageModel>,
    loader: DocumentLoader,
    scraper: Scraper,
    prompts: PromptLibrary,
    articles: ArticlesConfig,
}

impl ResearchAgent {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        loader: DocumentLoader,
        scraper: Scraper,
        prompts: PromptLibrary,
        articles: ArticlesConfig,
    ) -> Self {
        Self {
            llm,
            loader,
            scraper,
            prompts,
            articles,
        }
    }

    /// Wire an agent to the OpenAI API using `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Arc::new(OpenAIClient::new(&config.llm)?);
        let store: Arc<dyn DocumentStore> = client.clone();
        let loader = DocumentLoader::from_config(&config.documents, store)?;

        Ok(Self::new(
            client,
            loader,
            Scraper::new()?,
            PromptLibrary::new(config.prompts.dir.clone()),
            config.articles.clone(),
        ))
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    pub fn document_strategy(&self) -> LoadStrategy {
        self.loader.strategy()
    }

    /// Summarize every reference document for `marker` and join the
    /// summaries, in document order, separated by a blank line.
    #[instrument(skip(self))]
    pub async fn build_research_report(&self, marker: Marker) -> Result<String> {
        let documents = self.loader.load(marker).await?;

        let mut summaries = Vec::with_capacity(documents.len());
        for document in &documents {
            summaries.push(self.summarize_document(document, marker).await?);
        }

        info!(documents = documents.len(), "research report built");
        Ok(summaries.join("\n\n"))
    }

    async fn summarize_document(&self, document: &DocumentRef, marker: Marker) -> Result<String> {
        let prompt = self.prompts.assemble(
            PromptTemplate::ProcessStudy,
            &[("gene_string", marker.as_str())],
        )?;
        debug!(filename = %document.filename, "summarizing document");
        self.llm.complete_with_document(&prompt, document).await
    }

    /// Produce a full training plan for `goal`, grounded on the research
    /// report for `marker` and the general training articles.
    #[instrument(skip(self))]
    pub async fn build_training_plan(&self, goal: &str, marker: Marker) -> Result<TrainingPlan> {
        let research_report = self.build_research_report(marker).await?;
        let training_guidelines = self.scraper.build_content(&self.articles.training).await;

        let prompt = self.prompts.assemble(
            PromptTemplate::BuildTrainingPlan,
            &[
                ("research_report", &research_report),
                ("goal", goal),
                ("training_guidelines", &training_guidelines),
                ("gene_string", marker.as_str()),
            ],
        )?;
        debug!(%prompt, "final training plan prompt");

        let plan = self.llm.complete(&prompt).await?;
        Ok(TrainingPlan {
            plan,
            research_report,
        })
    }

    /// Produce one day's workout from an existing plan, adjusted by
    /// recovery guidance and whichever health metrics were supplied.
    #[instrument(skip(self, training_plan, metrics))]
    pub async fn generate_daily_workout(
        &self,
        training_plan: &str,
        week_number: &str,
        day_of_week: &str,
        metrics: &HealthMetrics,
    ) -> Result<String> {
        let research_articles = self.scraper.build_content(&self.articles.recovery).await;
        let health_metrics = health_metrics_block(metrics);

        let prompt = self.prompts.assemble(
            PromptTemplate::DailyWorkout,
            &[
                ("training_plan", training_plan),
                ("week_number", week_number),
                ("day_of_week", day_of_week),
                ("research_articles", &research_articles),
                ("health_metrics", &health_metrics),
            ],
        )?;
        debug!(%prompt, "final workout prompt");

        self.llm.complete(&prompt).await
    }
}

/// Markdown block listing the metrics that were supplied, or an empty
/// string when none were.
pub fn health_metrics_block(metrics: &HealthMetrics) -> String {
    if metrics.is_empty() {
        return String::new();
    }

    let mut block = String::from("\n\n## Current Health Metrics:\n");
    if let Some(hrv) = present(metrics.hrv.as_ref()) {
        block.push_str(&format!("- HRV: {}ms\n", hrv));
    }
    if let Some(rhr) = present(metrics.resting_heart_rate.as_ref()) {
        block.push_str(&format!("- Resting Heart Rate: {}bpm\n", rhr));
    }
    if let Some(sleep) = present(metrics.hours_of_sleep.as_ref()) {
        block.push_str(&format!("- Hours of Sleep: {} hours\n", sleep));
    }
    block
}
