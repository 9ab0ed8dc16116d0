//! Medpair Core Library
//!
//! Pairwise medication interaction checking with a symmetric, at-most-once
//! assessment cache.
//!
//! # Architecture
//!
//! ```text
//! medication activation event
//!             │
//!             ▼
//!    Pairwise Check Job ──── enumerates active co-medications
//!             │
//!             ▼
//!   Verification Engine ──── partitions candidates: cached / uncached
//!             │
//!     ┌───────┴────────┐
//!     ▼                ▼
//! cache hit       pair locks → oracle (one batched call)
//!     │                │
//!     │                ▼
//!     │        commit_pair (both directions, one transaction)
//!     │                │
//!     └───────┬────────┘
//!             ▼
//!       Alert Emitter (external, fire-and-forget)
//! ```
//!
//! # Core Principle
//!
//! **The oracle is consulted at most once per unordered medication pair.**
//! Pair-scoped locks plus an idempotent bidirectional commit make
//! concurrent, overlapping jobs safe without a global lock.
//!
//! # Modules
//!
//! - [`db`]: SQLite cache store; `commit_pair` is the only cache write path
//! - [`models`]: Domain types (Medication, InteractionRecord, PairKey, etc.)
//! - [`oracle`]: Contract for the external assessment service
//! - [`engine`]: Verification engine with cached/uncached partitioning
//! - [`job`]: Pairwise check job and worker-pool runner

pub mod db;
pub mod engine;
pub mod job;
pub mod models;
pub mod oracle;

// Re-export commonly used types
pub use db::{CommitOutcome, Database, DbError, NamedInteraction, PairJudgment};
pub use engine::{
    CheckOutcome, EngineConfig, EngineError, FindingSource, InteractionEngine,
    InteractionFinding, LockTimeout, PairLockTable,
};
pub use job::{
    AlertSink, CoMedicationSource, DbCoMedicationSource, JobOutcome, JobRunner, JobStatus,
    NullAlertSink, PairwiseCheckJob, RetryPolicy, SkipReason,
};
pub use models::{InteractionRecord, Medication, PairKey, Severity, UserMedication};
pub use oracle::{
    InteractionOracle, MockOracle, OracleAssessment, OracleCandidate, OracleError, OracleJudgment,
};
