//! Prompt templates and named-placeholder substitution.
//!
//! Templates are plain text files in the configured prompts directory,
//! read fresh on every use so they can be edited without a restart.
//!
//! # Syntax
//!
//! | Token | Meaning |
//! |-------|---------|
//! | `{name}` | Replaced with the value of field `name` |
//! | `{{` | A literal `{` |
//! | `}}` | A literal `}` |
//!
//! A placeholder with no matching field is an error, as is an unbalanced
//! brace. Fields that the template never references are ignored. Values
//! are inserted as-is; no escaping is applied.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

/// The three prompts the pipelines use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTemplate {
    /// Summarize one attached study for a marker.
    ProcessStudy,
    /// Synthesize a full program from the research report and guidelines.
    BuildTrainingPlan,
    /// Derive one day's session from a plan and recovery metrics.
    DailyWorkout,
}

impl PromptTemplate {
    pub const ALL: [PromptTemplate; 3] = [
        PromptTemplate::ProcessStudy,
        PromptTemplate::BuildTrainingPlan,
        PromptTemplate::DailyWorkout,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            PromptTemplate::ProcessStudy => "process_study.txt",
            PromptTemplate::BuildTrainingPlan => "build_training_plan.txt",
            PromptTemplate::DailyWorkout => "daily_workout.txt",
        }
    }

    /// Fields the pipeline supplies when rendering this template.
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            PromptTemplate::ProcessStudy => &["gene_string"],
            PromptTemplate::BuildTrainingPlan => &[
                "research_report",
                "goal",
                "training_guidelines",
                "gene_string",
            ],
            PromptTemplate::DailyWorkout => &[
                "training_plan",
                "week_number",
                "day_of_week",
                "research_articles",
                "health_metrics",
            ],
        }
    }
}

/// Directory-backed template storage.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    dir: PathBuf,
}

impl PromptLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read the raw text of `template`.
    pub fn load(&self, template: PromptTemplate) -> Result<String> {
        let path = self.dir.join(template.file_name());
        std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read prompt template: {}", path.display()))
    }

    /// Read `template` and substitute `fields` into it.
    pub fn assemble(&self, template: PromptTemplate, fields: &[(&str, &str)]) -> Result<String> {
        let text = self.load(template)?;
        render(&text, fields).with_context(|| format!("Invalid template {}", template.file_name()))
    }

    /// Check that every template exists, parses, and only references
    /// fields its pipeline supplies.
    pub fn validate(&self) -> Result<()> {
        for template in PromptTemplate::ALL {
            let text = self.load(template)?;
            let names = placeholders(&text)
                .with_context(|| format!("Invalid template {}", template.file_name()))?;
            for name in names {
                if !template.fields().iter().any(|field| *field == name) {
                    bail!(
                        "Template {} references unknown placeholder '{{{}}}' (allowed: {})",
                        template.file_name(),
                        name,
                        template.fields().join(", ")
                    );
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, PartialEq)]
enum Segment<'a> {
    Literal(&'a str),
    Brace(char),
    Field(&'a str),
}

fn parse(template: &str) -> Result<Vec<Segment<'_>>> {
    let mut segments = Vec::new();
    let bytes = template.as_bytes();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' | b'}' if bytes.get(i + 1) == Some(&bytes[i]) => {
                if literal_start < i {
                    segments.push(Segment::Literal(&template[literal_start..i]));
                }
                segments.push(Segment::Brace(bytes[i] as char));
                i += 2;
                literal_start = i;
            }
            b'{' => {
                if literal_start < i {
                    segments.push(Segment::Literal(&template[literal_start..i]));
                }
                let rest = &template[i + 1..];
                let end = rest
                    .find(['{', '}'])
                    .filter(|&pos| rest.as_bytes()[pos] == b'}')
                    .ok_or_else(|| anyhow::anyhow!("unclosed '{{' at byte {}", i))?;
                let name = &rest[..end];
                if name.is_empty() {
                    bail!("empty placeholder '{{}}' at byte {}", i);
                }
                segments.push(Segment::Field(name));
                i += end + 2;
                literal_start = i;
            }
            b'}' => bail!("single '}}' at byte {}", i),
            _ => i += 1,
        }
    }

    if literal_start < bytes.len() {
        segments.push(Segment::Literal(&template[literal_start..]));
    }
    Ok(segments)
}

/// Names of every placeholder in `template`, in order of appearance.
pub fn placeholders(template: &str) -> Result<Vec<&str>> {
    Ok(parse(template)?
        .into_iter()
        .filter_map(|s| match s {
            Segment::Field(name) => Some(name),
            _ => None,
        })
        .collect())
}

/// Substitute `fields` into `template`.
pub fn render(template: &str, fields: &[(&str, &str)]) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    for segment in parse(template)? {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Brace(c) => out.push(c),
            Segment::Field(name) => {
                let value = fields
                    .iter()
                    .find(|(key, _)| *key == name)
                    .map(|(_, value)| *value)
                    .ok_or_else(|| anyhow::anyhow!("missing value for placeholder '{{{}}}'", name))?;
                out.push_str(value);
            }
        }
    }
    Ok(out)
}
