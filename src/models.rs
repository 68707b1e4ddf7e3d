//! Core value types shared by the pipelines and the HTTP boundary.
//!
//! Nothing here outlives a single request: markers, document handles,
//! loosely typed request scalars, and the two text products of the plan
//! pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A genetic marker that selects which reference documents and prompt
/// content apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Marker {
    Actn3,
    Ppargc1a,
    Adrb2,
    Nos3,
}

impl Marker {
    /// Every marker the system knows about, in display order.
    pub const ALL: [Marker; 4] = [Marker::Actn3, Marker::Ppargc1a, Marker::Adrb2, Marker::Nos3];

    /// Lowercase identifier used in filenames, prompts, and the wire format.
    pub fn as_str(&self) -> &'static str {
        match self {
            Marker::Actn3 => "actn3",
            Marker::Ppargc1a => "ppargc1a",
            Marker::Adrb2 => "adrb2",
            Marker::Nos3 => "nos3",
        }
    }

    /// Resolve a raw request value against a whitelist.
    ///
    /// Matching is exact: `"ADRB2"` is not `"adrb2"`.
    pub fn resolve(raw: &str, allowed: &[Marker]) -> Result<Marker, ValidationError> {
        raw.parse::<Marker>()
            .ok()
            .filter(|m| allowed.contains(m))
            .ok_or(ValidationError::InvalidGene)
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Marker {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Marker::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown marker: '{}'", s))
    }
}

/// Handle to a file held in the language model provider's storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: String,
    pub filename: String,
}

/// A loosely typed JSON scalar from a request body.
///
/// Browser forms send week numbers and health metrics as either strings
/// or numbers, so both are accepted and rendered back verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl Scalar {
    /// Whether the value counts as "provided".
    ///
    /// Empty strings, `false`, and numeric zero are treated as absent.
    pub fn is_present(&self) -> bool {
        match self {
            Scalar::Bool(b) => *b,
            Scalar::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
            Scalar::Text(s) => !s.is_empty(),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

/// Keep a scalar only if it counts as provided.
pub fn present(value: Option<&Scalar>) -> Option<&Scalar> {
    value.filter(|v| v.is_present())
}

/// Optional recovery metrics supplied alongside a daily workout request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthMetrics {
    /// Heart rate variability, in milliseconds.
    #[serde(default)]
    pub hrv: Option<Scalar>,
    /// Resting heart rate, in beats per minute.
    #[serde(default)]
    pub resting_heart_rate: Option<Scalar>,
    /// Hours slept the previous night.
    #[serde(default)]
    pub hours_of_sleep: Option<Scalar>,
}

impl HealthMetrics {
    pub fn is_empty(&self) -> bool {
        present(self.hrv.as_ref()).is_none()
            && present(self.resting_heart_rate.as_ref()).is_none()
            && present(self.hours_of_sleep.as_ref()).is_none()
    }
}

/// Output of the plan pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingPlan {
    /// Plan text returned verbatim by the synthesis call.
    pub plan: String,
    /// Joined per-document summaries the plan was grounded on.
    pub research_report: String,
}

/// Caller input that fails validation. Surfaces as HTTP 400.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Both gene and goal are required")]
    MissingPlanFields,
    #[error("Invalid gene selected")]
    InvalidGene,
    #[error("Training plan, week number, and day of week are required")]
    MissingWorkoutFields,
    #[error("Invalid request body: {0}")]
    MalformedBody(String),
}
