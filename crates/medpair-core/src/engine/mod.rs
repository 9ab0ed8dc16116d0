//! Interaction verification engine.
//!
//! Given a primary medication and a set of candidates, partitions the
//! candidates into cached and uncached, asks the oracle only for uncached
//! pairs, and commits positive judgments symmetrically through the cache
//! store. Pair-scoped locks plus a second cache read under those locks
//! guarantee the oracle is consulted at most once per unordered pair, no
//! matter how many jobs race on it.

mod locks;

pub use locks::{LockTimeout, PairLockGuard, PairLockTable};

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db::{Database, DbError, PairJudgment};
use crate::models::{InteractionRecord, PairKey, Severity};
use crate::oracle::{InteractionOracle, OracleCandidate, OracleError};

/// Engine failures.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Self-pair or otherwise malformed input. Caller bug; not retried.
    #[error("invalid pair: {0}")]
    InvalidPair(String),

    #[error("too many candidates: {given} exceeds batch cap {max}")]
    TooManyCandidates { given: usize, max: usize },

    #[error("unknown medication: {0}")]
    UnknownMedication(String),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    LockTimeout(#[from] LockTimeout),
}

impl EngineError {
    /// Whether the job layer may retry after this failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Oracle(e) => e.is_retryable(),
            EngineError::LockTimeout(_) => true,
            _ => false,
        }
    }
}

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum candidates per check, bounding oracle request size.
    pub max_candidates: usize,
    /// Whether `has_interaction = false` judgments are cached. Off by
    /// default: the original system re-asks the oracle for known-safe
    /// pairs, and that behavior is preserved until a product decision
    /// changes it.
    pub cache_negative_results: bool,
    /// Upper bound on pair-lock acquisition.
    pub lock_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_candidates: 10,
            cache_negative_results: false,
            lock_timeout: Duration::from_secs(30),
        }
    }
}

/// Where a finding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingSource {
    Cached,
    Fresh,
}

/// One interaction finding, enriched with the related medication's name.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionFinding {
    pub medication_id: String,
    pub medication_name: String,
    pub has_interaction: bool,
    pub severity: Severity,
    pub description: String,
    pub recommendation: Option<String>,
    pub calculated_at: DateTime<Utc>,
    pub source: FindingSource,
}

impl InteractionFinding {
    fn from_record(record: InteractionRecord, name: String, source: FindingSource) -> Self {
        Self {
            medication_id: record.related_medication_id,
            medication_name: name,
            has_interaction: record.has_interaction,
            severity: record.severity,
            description: record.description,
            recommendation: record.recommendation,
            calculated_at: record.calculated_at,
            source,
        }
    }
}

/// Result of one `check_interactions` call.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub findings: Vec<InteractionFinding>,
    /// Whether this call reached the oracle at all.
    pub oracle_called: bool,
    /// Findings newly committed by this call.
    pub fresh_count: usize,
}

impl CheckOutcome {
    fn cache_only(findings: Vec<InteractionFinding>) -> Self {
        Self {
            findings,
            oracle_called: false,
            fresh_count: 0,
        }
    }
}

/// The interaction verification engine.
pub struct InteractionEngine {
    db: Arc<Mutex<Database>>,
    locks: Arc<PairLockTable>,
    oracle: Arc<dyn InteractionOracle>,
    config: EngineConfig,
}

impl InteractionEngine {
    pub fn new(
        db: Arc<Mutex<Database>>,
        locks: Arc<PairLockTable>,
        oracle: Arc<dyn InteractionOracle>,
        config: EngineConfig,
    ) -> Self {
        Self {
            db,
            locks,
            oracle,
            config,
        }
    }

    fn db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Check the primary medication against a set of candidate ids.
    ///
    /// Cached pairs are answered from the store; uncached pairs go to the
    /// oracle in one batch, under pair-scoped locks. Positive judgments are
    /// committed symmetrically before this returns. Findings come back in
    /// no particular order.
    pub fn check_interactions(
        &self,
        primary_id: &str,
        candidates: &[String],
    ) -> Result<CheckOutcome, EngineError> {
        let candidates = dedupe(candidates);

        if candidates.iter().any(|c| c == primary_id) {
            return Err(EngineError::InvalidPair(format!(
                "candidate set contains primary {primary_id}"
            )));
        }
        if candidates.len() > self.config.max_candidates {
            return Err(EngineError::TooManyCandidates {
                given: candidates.len(),
                max: self.config.max_candidates,
            });
        }

        // First partition, outside any pair lock. The cache-hit path is
        // side-effect-free.
        let (primary_name, mut findings, uncached) = {
            let db = self.db();
            let primary = db
                .get_medication(primary_id)?
                .ok_or_else(|| EngineError::UnknownMedication(primary_id.to_string()))?;

            let cached_ids = db.cached_related_ids(primary_id)?;
            let names = db.resolve_medication_names(&candidates)?;

            let mut cached_findings = Vec::new();
            let mut uncached = Vec::new();
            let records: HashMap<String, InteractionRecord> = db
                .load_interaction_cache(primary_id)?
                .into_iter()
                .map(|r| (r.related_medication_id.clone(), r))
                .collect();

            for id in &candidates {
                if cached_ids.contains(id) {
                    match (records.get(id), names.get(id)) {
                        (Some(record), Some(name)) => cached_findings.push(
                            InteractionFinding::from_record(
                                record.clone(),
                                name.clone(),
                                FindingSource::Cached,
                            ),
                        ),
                        _ => {
                            tracing::warn!(candidate = %id, "cached entry without resolvable name, skipping");
                        }
                    }
                } else if let Some(name) = names.get(id) {
                    uncached.push(OracleCandidate {
                        id: id.clone(),
                        name: name.clone(),
                    });
                } else {
                    tracing::warn!(candidate = %id, "unknown candidate id, skipping");
                }
            }

            (primary.name, cached_findings, uncached)
        };

        if uncached.is_empty() {
            tracing::debug!(primary = %primary_id, hits = findings.len(), "all candidates cached");
            return Ok(CheckOutcome::cache_only(findings));
        }

        // Serialize with other jobs touching the same pairs. The db mutex
        // is not held while waiting.
        let keys: Vec<PairKey> = uncached
            .iter()
            .filter_map(|c| PairKey::new(primary_id, &c.id))
            .collect();
        let _guards = self.locks.acquire_all(keys, self.config.lock_timeout)?;

        // Second partition under the locks: pairs another job committed
        // while we waited move to the cached side.
        let survivors = {
            let db = self.db();
            let cached_now = db.cached_related_ids(primary_id)?;
            let records: HashMap<String, InteractionRecord> = db
                .load_interaction_cache(primary_id)?
                .into_iter()
                .map(|r| (r.related_medication_id.clone(), r))
                .collect();

            let mut survivors = Vec::new();
            for candidate in uncached {
                if cached_now.contains(&candidate.id) {
                    if let Some(record) = records.get(&candidate.id) {
                        findings.push(InteractionFinding::from_record(
                            record.clone(),
                            candidate.name,
                            FindingSource::Cached,
                        ));
                    }
                } else {
                    survivors.push(candidate);
                }
            }
            survivors
        };

        if survivors.is_empty() {
            tracing::debug!(primary = %primary_id, "raced pairs resolved by concurrent job");
            return Ok(CheckOutcome::cache_only(findings));
        }

        tracing::info!(
            primary = %primary_name,
            uncached = survivors.len(),
            "consulting oracle"
        );
        let assessment = self.oracle.assess(&primary_name, &survivors)?;

        let requested: HashSet<&str> = survivors.iter().map(|c| c.id.as_str()).collect();
        let names: HashMap<&str, &str> = survivors
            .iter()
            .map(|c| (c.id.as_str(), c.name.as_str()))
            .collect();
        let calculated_at = Utc::now();
        let mut fresh_count = 0;

        for judgment in assessment.interactions {
            if !requested.contains(judgment.medication_id.as_str()) {
                tracing::warn!(
                    medication_id = %judgment.medication_id,
                    "oracle judged a medication we did not ask about, ignoring"
                );
                continue;
            }
            if !judgment.has_interaction && !self.config.cache_negative_results {
                tracing::debug!(
                    medication_id = %judgment.medication_id,
                    "negative judgment not cached"
                );
                continue;
            }

            let pair_judgment = PairJudgment {
                has_interaction: judgment.has_interaction,
                severity: judgment.severity,
                description: judgment.description.clone(),
                recommendation: judgment.recommendation.clone(),
                calculated_at,
            };
            self.db()
                .commit_pair(primary_id, &judgment.medication_id, &pair_judgment)?;

            if judgment.has_interaction {
                let name = names
                    .get(judgment.medication_id.as_str())
                    .map(|n| n.to_string())
                    .unwrap_or_default();
                findings.push(InteractionFinding {
                    medication_id: judgment.medication_id,
                    medication_name: name,
                    has_interaction: true,
                    severity: judgment.severity,
                    description: judgment.description,
                    recommendation: judgment.recommendation,
                    calculated_at,
                    source: FindingSource::Fresh,
                });
                fresh_count += 1;
            }
        }

        Ok(CheckOutcome {
            findings,
            oracle_called: true,
            fresh_count,
        })
    }
}

fn dedupe(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}
