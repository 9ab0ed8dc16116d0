//! Medication and interaction-record models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Clinical severity of a drug-drug interaction.
///
/// Ordered from least to most severe so callers can sort findings
/// by clinical weight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Mild,
    Moderate,
    Severe,
    Contraindicated,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::None => "none",
            Severity::Mild => "mild",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
            Severity::Contraindicated => "contraindicated",
        };
        f.write_str(s)
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Severity::None),
            "mild" | "minor" => Ok(Severity::Mild),
            "moderate" => Ok(Severity::Moderate),
            "severe" | "major" => Ok(Severity::Severe),
            "contraindicated" => Ok(Severity::Contraindicated),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// A medication known to the system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Medication {
    /// Unique identifier (UUID string).
    pub id: String,
    /// Display name (generic or brand).
    pub name: String,
}

impl Medication {
    /// Create a new medication with a generated id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
        }
    }
}

/// One entry in a medication's interaction cache.
///
/// Keyed by the *other* medication's id; a pair appears at most once
/// per medication. The reverse-written side may omit the recommendation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionRecord {
    pub related_medication_id: String,
    pub has_interaction: bool,
    pub severity: Severity,
    pub description: String,
    pub recommendation: Option<String>,
    pub calculated_at: DateTime<Utc>,
}
