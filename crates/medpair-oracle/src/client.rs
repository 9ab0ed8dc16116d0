//! HTTP client for the assessment oracle.
//!
//! Talks to an Ollama-compatible `/api/generate` endpoint with a blocking
//! client. Transport failures (connect, timeout, 5xx) are retryable;
//! everything else about the payload is a terminal protocol error.

use medpair_core::{InteractionOracle, OracleAssessment, OracleCandidate, OracleError};
use serde::{Deserialize, Serialize};

use crate::parse::parse_assessment;
use crate::prompts::{make_assessment_prompt, SYSTEM_PROMPT};

/// Chat-style oracle client over HTTP.
pub struct ChatOracleClient {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl ChatOracleClient {
    /// Create a client for the given endpoint and model.
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        }
    }

    /// Default local instance at the standard Ollama port, 5-minute timeout.
    pub fn default_local(model: &str) -> Self {
        Self::new("http://localhost:11434", model, 300)
    }

    /// The model name in use.
    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Request body for `/api/generate`.
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
}

/// Response body from `/api/generate`.
#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl InteractionOracle for ChatOracleClient {
    fn assess(
        &self,
        primary_name: &str,
        candidates: &[OracleCandidate],
    ) -> Result<OracleAssessment, OracleError> {
        let url = format!("{}/api/generate", self.base_url);
        let prompt = make_assessment_prompt(primary_name, candidates);
        let body = GenerateRequest {
            model: &self.model,
            prompt: &prompt,
            system: SYSTEM_PROMPT,
            stream: false,
        };

        tracing::debug!(
            primary = %primary_name,
            candidates = candidates.len(),
            model = %self.model,
            "requesting assessment"
        );

        let response = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_connect() {
                OracleError::Transport(format!("cannot reach oracle at {}", self.base_url))
            } else if e.is_timeout() {
                OracleError::Transport(format!("request timed out after {}s", self.timeout_secs))
            } else {
                OracleError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            if status.is_server_error() {
                return Err(OracleError::Transport(format!(
                    "oracle returned {status}: {body}"
                )));
            }
            return Err(OracleError::Protocol(format!(
                "oracle rejected request with {status}: {body}"
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| OracleError::Protocol(format!("unreadable response envelope: {e}")))?;

        parse_assessment(&parsed.response).map_err(|e| {
            // Keep the raw payload in the log for diagnosis; protocol
            // failures are terminal and need an operator to look at them.
            tracing::error!(raw = %parsed.response, error = %e, "oracle protocol error");
            e
        })
    }
}
