//! Assessment prompts for pairwise interaction judgment.
//!
//! The oracle is asked to judge one primary medication against a batch of
//! candidates and reply with JSON only. The system prompt and per-batch
//! user prompt travel in the request's `system`/`prompt` fields.

use medpair_core::OracleCandidate;

/// System prompt for interaction assessment.
pub const SYSTEM_PROMPT: &str = r#"You are a clinical pharmacology assistant that assesses drug-drug interactions.

Given a primary medication and a list of candidate medications, judge each candidate independently:
- has_interaction: whether a clinically relevant interaction with the primary medication exists
- severity: one of "none", "mild", "moderate", "severe", "contraindicated"
- description: a short clinical description of the interaction mechanism
- recommendation: practical guidance for the prescriber (may be omitted when has_interaction is false)

Judge conservatively: report an interaction only when it is clinically established.
Output JSON only, with an "interactions" array containing one entry per candidate."#;

/// User prompt for one assessment batch.
pub fn make_assessment_prompt(primary_name: &str, candidates: &[OracleCandidate]) -> String {
    let mut listing = String::new();
    for candidate in candidates {
        listing.push_str(&format!("- id: {}, name: {}\n", candidate.id, candidate.name));
    }

    format!(
        r#"Assess the interaction between the primary medication "{primary_name}" and each of these candidates:

{listing}
Return a JSON object with an "interactions" array. Each entry must have:
- medication_id: The candidate's id, copied verbatim from the list above
- has_interaction: true or false
- severity: "none", "mild", "moderate", "severe" or "contraindicated"
- description: Short description of the interaction (empty string if none)
- recommendation: Guidance for the prescriber (null if none)"#
    )
}
