//! Pairwise check job.
//!
//! Triggered when a user's medication set changes. Enumerates the user's
//! other active, in-window medications and delegates to the verification
//! engine. Newly detected interactions are handed to the alert emitter
//! collaborator; its failures never roll back the cache commit.

mod runner;

pub use runner::{JobReport, JobRunner, JobStatus, RetryPolicy};

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::db::{Database, DbError};
use crate::engine::{EngineError, InteractionEngine, InteractionFinding};
use crate::models::UserMedication;

/// Job failures.
#[derive(Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("co-medication source error: {0}")]
    Source(#[from] DbError),
}

impl JobError {
    pub fn is_retryable(&self) -> bool {
        match self {
            JobError::Engine(e) => e.is_retryable(),
            JobError::Source(_) => false,
        }
    }
}

/// Source of a user's active co-medications (consumed read-only).
pub trait CoMedicationSource: Send + Sync {
    fn active_medications_for(
        &self,
        user_id: &str,
        excluding_medication: &str,
    ) -> Result<Vec<UserMedication>, DbError>;
}

/// Database-backed co-medication source.
pub struct DbCoMedicationSource {
    db: Arc<Mutex<Database>>,
}

impl DbCoMedicationSource {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }
}

impl CoMedicationSource for DbCoMedicationSource {
    fn active_medications_for(
        &self,
        user_id: &str,
        excluding_medication: &str,
    ) -> Result<Vec<UserMedication>, DbError> {
        self.db
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .active_user_medications(user_id, excluding_medication)
    }
}

/// Consumer of newly detected interactions (external collaborator).
pub trait AlertSink: Send + Sync {
    /// Create user-facing alerts; returns how many were created. Errors
    /// are reported but never undo the cache commit.
    fn on_interactions_detected(
        &self,
        trigger: &UserMedication,
        findings: &[InteractionFinding],
    ) -> Result<usize, String>;
}

/// Alert sink that does nothing, for deployments without alerting wired up.
pub struct NullAlertSink;

impl AlertSink for NullAlertSink {
    fn on_interactions_detected(
        &self,
        _trigger: &UserMedication,
        _findings: &[InteractionFinding],
    ) -> Result<usize, String> {
        Ok(0)
    }
}

/// Why a job ended without doing work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The user holds no other active medications.
    NoCoMedications,
    /// Every relevant pair was already cached.
    AlreadyChecked,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoCoMedications => f.write_str("no co-medications"),
            SkipReason::AlreadyChecked => f.write_str("already checked"),
        }
    }
}

/// Terminal result of one job run.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed {
        findings: Vec<InteractionFinding>,
        alerts_created: usize,
    },
    Skipped(SkipReason),
}

/// One pairwise check, runnable for any triggering user-medication.
pub struct PairwiseCheckJob {
    engine: Arc<InteractionEngine>,
    source: Arc<dyn CoMedicationSource>,
    alerts: Arc<dyn AlertSink>,
}

impl PairwiseCheckJob {
    pub fn new(
        engine: Arc<InteractionEngine>,
        source: Arc<dyn CoMedicationSource>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            engine,
            source,
            alerts,
        }
    }

    /// Run the check for one triggering user-medication.
    pub fn run(&self, trigger: &UserMedication) -> Result<JobOutcome, JobError> {
        let others = self
            .source
            .active_medications_for(&trigger.user_id, &trigger.medication_id)?;

        if others.is_empty() {
            tracing::info!(
                user = %trigger.user_id,
                medication = %trigger.medication_id,
                "skipped: no co-medications"
            );
            return Ok(JobOutcome::Skipped(SkipReason::NoCoMedications));
        }

        // The user may hold the same medication under two entries.
        let mut seen = HashSet::new();
        let candidates: Vec<String> = others
            .into_iter()
            .map(|um| um.medication_id)
            .filter(|id| seen.insert(id.clone()))
            .collect();

        let outcome = self
            .engine
            .check_interactions(&trigger.medication_id, &candidates)?;

        if !outcome.oracle_called {
            tracing::info!(
                user = %trigger.user_id,
                medication = %trigger.medication_id,
                cached = outcome.findings.len(),
                "skipped: already checked"
            );
            return Ok(JobOutcome::Skipped(SkipReason::AlreadyChecked));
        }

        let fresh: Vec<InteractionFinding> = outcome
            .findings
            .iter()
            .filter(|f| f.source == crate::engine::FindingSource::Fresh)
            .cloned()
            .collect();

        let alerts_created = if fresh.is_empty() {
            0
        } else {
            match self.alerts.on_interactions_detected(trigger, &fresh) {
                Ok(count) => count,
                Err(e) => {
                    // Fire-and-forget: the cache commit stands regardless.
                    tracing::error!(
                        user = %trigger.user_id,
                        error = %e,
                        "alert emitter failed"
                    );
                    0
                }
            }
        };

        tracing::info!(
            user = %trigger.user_id,
            medication = %trigger.medication_id,
            fresh = outcome.fresh_count,
            alerts = alerts_created,
            "pairwise check completed"
        );

        Ok(JobOutcome::Completed {
            findings: outcome.findings,
            alerts_created,
        })
    }
}
