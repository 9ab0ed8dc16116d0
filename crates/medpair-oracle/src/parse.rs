//! Strict parsing of oracle output.
//!
//! The whole batch is validated before anything is returned: a response
//! missing the `interactions` list, or any entry missing its required
//! fields, fails with a protocol error and nothing is partially applied.

use medpair_core::{OracleAssessment, OracleError, OracleJudgment, Severity};
use serde::Deserialize;

/// Raw response shape, with every field optional so validation can report
/// precisely what is missing.
#[derive(Debug, Deserialize)]
struct RawAssessment {
    interactions: Option<Vec<RawJudgment>>,
}

#[derive(Debug, Deserialize)]
struct RawJudgment {
    medication_id: Option<String>,
    has_interaction: Option<bool>,
    severity: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    recommendation: Option<String>,
}

/// Parse model output into a validated assessment.
///
/// Tolerates prose around the JSON object (models often add it) but is
/// strict about the object itself.
pub fn parse_assessment(text: &str) -> Result<OracleAssessment, OracleError> {
    // Try to find JSON in the response (in case the model adds extra text).
    // The closing brace is searched after the opening one; a stray `}`
    // earlier in the prose must not produce an inverted slice.
    let json_start = text
        .find('{')
        .ok_or_else(|| OracleError::Protocol("no JSON object found in response".into()))?;
    let json_end = text[json_start..]
        .rfind('}')
        .map(|offset| json_start + offset)
        .ok_or_else(|| OracleError::Protocol("no closing brace found in response".into()))?;

    let raw: RawAssessment = serde_json::from_str(&text[json_start..=json_end])
        .map_err(|e| OracleError::Protocol(format!("malformed JSON: {e}")))?;

    let interactions = raw
        .interactions
        .ok_or_else(|| OracleError::Protocol("response missing 'interactions' list".into()))?;

    let mut judgments = Vec::with_capacity(interactions.len());
    for (index, entry) in interactions.into_iter().enumerate() {
        judgments.push(validate_entry(index, entry)?);
    }

    Ok(OracleAssessment {
        interactions: judgments,
    })
}

fn validate_entry(index: usize, entry: RawJudgment) -> Result<OracleJudgment, OracleError> {
    let medication_id = entry
        .medication_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| OracleError::Protocol(format!("entry {index} missing medication_id")))?;
    let has_interaction = entry
        .has_interaction
        .ok_or_else(|| OracleError::Protocol(format!("entry {index} missing has_interaction")))?;
    let severity: Severity = entry
        .severity
        .ok_or_else(|| OracleError::Protocol(format!("entry {index} missing severity")))?
        .parse()
        .map_err(|e| OracleError::Protocol(format!("entry {index}: {e}")))?;

    Ok(OracleJudgment {
        medication_id,
        has_interaction,
        severity,
        description: entry.description.unwrap_or_default(),
        recommendation: entry.recommendation.filter(|r| !r.is_empty()),
    })
}
