//! Assessment-oracle contract.
//!
//! The oracle is an external chat-style AI service that judges whether a
//! primary medication interacts with each of a batch of candidates. This
//! module owns only the structural contract; the HTTP adapter lives in
//! the `medpair-oracle` crate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Severity;

/// Oracle failures, split by retryability.
#[derive(Error, Debug)]
pub enum OracleError {
    /// Network-level failure (unreachable, timeout, 5xx). Retryable.
    #[error("oracle transport error: {0}")]
    Transport(String),

    /// The oracle responded but the payload violates the expected shape.
    /// Terminal: retrying reproduces the same malformed output.
    #[error("oracle protocol error: {0}")]
    Protocol(String),
}

impl OracleError {
    /// Whether the job layer may retry after this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OracleError::Transport(_))
    }
}

/// A candidate submitted for assessment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OracleCandidate {
    pub id: String,
    pub name: String,
}

/// One judgment returned by the oracle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OracleJudgment {
    pub medication_id: String,
    pub has_interaction: bool,
    pub severity: Severity,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub recommendation: Option<String>,
}

/// A validated oracle response: one judgment per assessed candidate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OracleAssessment {
    pub interactions: Vec<OracleJudgment>,
}

/// Contract for the external interaction-assessment service.
pub trait InteractionOracle: Send + Sync {
    /// Judge the primary medication against each candidate. Implementations
    /// must validate the response shape and return `Protocol` errors rather
    /// than partial data.
    fn assess(
        &self,
        primary_name: &str,
        candidates: &[OracleCandidate],
    ) -> Result<OracleAssessment, OracleError>;
}

/// Scripted oracle for tests: returns configured judgments keyed by
/// candidate id and counts invocations.
pub struct MockOracle {
    judgments: Mutex<Vec<OracleJudgment>>,
    calls: AtomicUsize,
    failure: Mutex<Option<String>>,
    latency: std::time::Duration,
}

impl MockOracle {
    pub fn new(judgments: Vec<OracleJudgment>) -> Self {
        Self {
            judgments: Mutex::new(judgments),
            calls: AtomicUsize::new(0),
            failure: Mutex::new(None),
            latency: std::time::Duration::ZERO,
        }
    }

    /// Simulate a slow oracle, widening race windows in concurrency tests.
    pub fn with_latency(mut self, latency: std::time::Duration) -> Self {
        self.latency = latency;
        self
    }

    /// An oracle that reports every candidate as non-interacting.
    pub fn all_negative() -> Self {
        Self::new(Vec::new())
    }

    /// Make every subsequent call fail with a protocol error.
    pub fn fail_with_protocol(message: &str) -> Self {
        let oracle = Self::new(Vec::new());
        *oracle.failure.lock().unwrap() = Some(message.to_string());
        oracle
    }

    /// Number of `assess` invocations so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl InteractionOracle for MockOracle {
    fn assess(
        &self,
        _primary_name: &str,
        candidates: &[OracleCandidate],
    ) -> Result<OracleAssessment, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }

        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(OracleError::Protocol(message));
        }

        let scripted = self.judgments.lock().unwrap();
        let interactions = candidates
            .iter()
            .map(|c| {
                scripted
                    .iter()
                    .find(|j| j.medication_id == c.id)
                    .cloned()
                    .unwrap_or(OracleJudgment {
                        medication_id: c.id.clone(),
                        has_interaction: false,
                        severity: Severity::None,
                        description: String::new(),
                        recommendation: None,
                    })
            })
            .collect();

        Ok(OracleAssessment { interactions })
    }
}
