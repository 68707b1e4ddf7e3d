//! # Genoplan
//!
//! Genotype-aware training plans from hosted language models.
//!
//! Given a fitness goal and a genetic marker, Genoplan gathers the reference
//! studies already uploaded to the model provider, summarizes each one,
//! combines the summaries with scraped coaching articles, and asks the model
//! for a training plan. A second pipeline turns an existing plan plus
//! optional recovery metrics into a single day's workout.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌─────────────┐
//! │ documents  │──▶│              │──▶│             │
//! │ (provider) │   │    agent     │   │     llm     │
//! ├────────────┤   │  pipelines   │   │ (Responses) │
//! │  scrape    │──▶│              │◀──│             │
//! └────────────┘   └──────┬───────┘   └─────────────┘
//!                         │ prompts
//!              ┌──────────┴──────────┐
//!              ▼                     ▼
//!         ┌──────────┐         ┌──────────┐
//!         │   CLI    │         │   HTTP   │
//!         │(genoplan)│         │ (server) │
//!         └──────────┘         └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`models`] | Markers, document handles, request scalars |
//! | [`documents`] | Reference document loading |
//! | [`scrape`] | Article scraping |
//! | [`prompts`] | Template storage and substitution |
//! | [`llm`] | Language model and file store clients |
//! | [`agent`] | Research, plan, and workout pipelines |
//! | [`server`] | Authenticated HTTP API |

pub mod agent;
pub mod config;
pub mod documents;
pub mod llm;
pub mod models;
pub mod prompts;
pub mod scrape;
pub mod server;

#[cfg(test)]
pub(crate) mod testing;
