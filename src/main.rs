//! # Genoplan CLI (`genoplan`)
//!
//! Runs the HTTP server or drives the pipelines directly from a terminal.
//!
//! ## Usage
//!
//! ```bash
//! genoplan --config ./config/genoplan.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `genoplan serve` | Start the authenticated HTTP server |
//! | `genoplan plan` | Build a research report and training plan |
//! | `genoplan research` | Build only the research report for a marker |
//! | `genoplan workout` | Generate one day's workout from a saved plan |
//! | `genoplan markers` | List the selectable markers |
//! | `genoplan check` | Validate configuration and prompt templates |
//!
//! ## Examples
//!
//! ```bash
//! export OPENAI_API_KEY=sk-...
//! genoplan plan --gene adrb2 --goal "finish hyrox in under 90 minutes" --output plan.md
//! genoplan workout --plan-file plan.md --week 3 --day Tuesday --hrv 62
//! APP_PASSWORD=secret genoplan serve
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use genoplan::agent::ResearchAgent;
use genoplan::config::{self, Config};
use genoplan::documents::LoadStrategy;
use genoplan::models::{HealthMetrics, Marker, Scalar};
use genoplan::prompts::PromptLibrary;
use genoplan::server;

/// Genoplan — genotype-aware training plans from hosted language models.
#[derive(Parser)]
#[command(name = "genoplan", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/genoplan.toml`. A missing file falls back to
    /// built-in defaults plus `PORT`, `APP_PASSWORD`, and `OPENAI_API_KEY`.
    #[arg(long, global = true, default_value = "./config/genoplan.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Binds to `[server].bind` (port overridable with `PORT`) and requires
    /// a password from `[auth].password` or `APP_PASSWORD`.
    Serve,

    /// Build a research report and training plan.
    Plan {
        /// Genetic marker (e.g. `adrb2`).
        #[arg(long)]
        gene: String,

        /// Free-text fitness goal.
        #[arg(long)]
        goal: String,

        /// Write the plan to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Also write the research report to this file.
        #[arg(long)]
        report_output: Option<PathBuf>,
    },

    /// Build only the research report for a marker.
    Research {
        /// Genetic marker (e.g. `nos3`).
        #[arg(long)]
        gene: String,

        /// Write the report to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Generate a single day's workout from a saved training plan.
    Workout {
        /// File containing the training plan text.
        #[arg(long)]
        plan_file: PathBuf,

        /// Week of the plan.
        #[arg(long)]
        week: String,

        /// Day of the week (e.g. `Tuesday`).
        #[arg(long)]
        day: String,

        /// Heart rate variability in milliseconds.
        #[arg(long)]
        hrv: Option<String>,

        /// Resting heart rate in beats per minute.
        #[arg(long)]
        resting_heart_rate: Option<String>,

        /// Hours slept last night.
        #[arg(long)]
        hours_of_sleep: Option<String>,

        /// Write the workout to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// List the selectable markers.
    Markers,

    /// Validate configuration and prompt templates without calling any service.
    Check,
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = match verbose {
        0 => "genoplan=info,tower_http=info",
        1 => "genoplan=debug,tower_http=debug",
        _ => "genoplan=trace,tower_http=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn resolve_marker(cfg: &Config, gene: &str) -> Result<Marker> {
    Marker::resolve(gene, &cfg.markers.allowed).with_context(|| {
        let allowed: Vec<&str> = cfg.markers.allowed.iter().map(|m| m.as_str()).collect();
        format!("'{}' is not one of: {}", gene, allowed.join(", "))
    })
}

fn emit(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}

fn optional_metric(value: Option<String>) -> Option<Scalar> {
    value.map(Scalar::Text)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Plan {
            gene,
            goal,
            output,
            report_output,
        } => {
            let marker = resolve_marker(&cfg, &gene)?;
            if goal.trim().is_empty() {
                anyhow::bail!("--goal must not be empty");
            }
            let agent = ResearchAgent::from_config(&cfg)?;
            let plan = agent.build_training_plan(&goal, marker).await?;
            if let Some(path) = report_output.as_deref() {
                emit(&plan.research_report, Some(path))?;
            }
            emit(&plan.plan, output.as_deref())?;
        }
        Commands::Research { gene, output } => {
            let marker = resolve_marker(&cfg, &gene)?;
            let agent = ResearchAgent::from_config(&cfg)?;
            let report = agent.build_research_report(marker).await?;
            emit(&report, output.as_deref())?;
        }
        Commands::Workout {
            plan_file,
            week,
            day,
            hrv,
            resting_heart_rate,
            hours_of_sleep,
            output,
        } => {
            let plan = std::fs::read_to_string(&plan_file)
                .with_context(|| format!("Failed to read plan file: {}", plan_file.display()))?;
            let metrics = HealthMetrics {
                hrv: optional_metric(hrv),
                resting_heart_rate: optional_metric(resting_heart_rate),
                hours_of_sleep: optional_metric(hours_of_sleep),
            };
            let agent = ResearchAgent::from_config(&cfg)?;
            let workout = agent
                .generate_daily_workout(&plan, &week, &day, &metrics)
                .await?;
            emit(&workout, output.as_deref())?;
        }
        Commands::Markers => {
            for marker in &cfg.markers.allowed {
                println!("{}", marker);
            }
        }
        Commands::Check => {
            let prompts = PromptLibrary::new(cfg.prompts.dir.clone());
            prompts.validate()?;
            let strategy: LoadStrategy = cfg.documents.strategy.parse()?;
            println!("{:<12} {}", "model", cfg.llm.model);
            println!("{:<12} {:?}", "documents", strategy);
            println!("{:<12} {}", "prompts", prompts.dir().display());
            println!("{:<12} {}", "static", cfg.server.static_dir.display());
            println!(
                "{:<12} {}",
                "password",
                if cfg.auth.require_password().is_ok() { "set" } else { "MISSING" }
            );
            println!(
                "{:<12} {}",
                "api key",
                if cfg.llm.require_api_key().is_ok() { "set" } else { "MISSING" }
            );
            println!("Configuration OK.");
        }
    }

    Ok(())
}
