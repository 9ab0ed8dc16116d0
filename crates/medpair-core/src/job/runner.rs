//! Worker-pool job runner.
//!
//! Each medication-activation event enqueues one independent job; jobs run
//! in parallel on a fixed pool of worker threads with no ordering
//! guarantee, including between jobs for the same user. Retryable failures
//! (transport, lock contention) get bounded automatic retries with
//! backoff; protocol and input errors fail immediately.

use std::fmt;
use std::sync::mpsc::{self, Receiver, SendError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use super::{JobOutcome, PairwiseCheckJob, SkipReason};
use crate::models::UserMedication;

/// Retry policy for retryable job failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Base backoff; attempt `n` waits `n * backoff`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Terminal state of one job instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Completed { findings: usize, alerts: usize },
    Skipped(SkipReason),
    Failed { error: String, retryable: bool },
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Completed { findings, alerts } => {
                write!(f, "completed ({findings} findings, {alerts} alerts)")
            }
            JobStatus::Skipped(reason) => write!(f, "skipped: {reason}"),
            JobStatus::Failed { error, .. } => write!(f, "failed: {error}"),
        }
    }
}

/// Report emitted when a job reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub user_medication_id: String,
    pub status: JobStatus,
    pub attempts: u32,
}

/// Fixed-size worker pool draining a queue of pairwise check triggers.
///
/// Dropping the runner closes the queue, lets in-flight jobs finish, and
/// joins the workers.
pub struct JobRunner {
    queue: Option<Sender<UserMedication>>,
    reports: Receiver<JobReport>,
    workers: Vec<JoinHandle<()>>,
}

impl JobRunner {
    /// Start `worker_count` workers over the given job definition.
    pub fn start(job: Arc<PairwiseCheckJob>, worker_count: usize, retry: RetryPolicy) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel::<UserMedication>();
        let (report_tx, report_rx) = mpsc::channel::<JobReport>();
        let queue_rx = Arc::new(Mutex::new(queue_rx));

        let workers = (0..worker_count.max(1))
            .map(|worker| {
                let job = job.clone();
                let queue_rx = queue_rx.clone();
                let report_tx = report_tx.clone();
                let retry = retry.clone();
                std::thread::spawn(move || {
                    tracing::debug!(worker, "job worker started");
                    worker_loop(&job, &queue_rx, &report_tx, &retry);
                    tracing::debug!(worker, "job worker stopped");
                })
            })
            .collect();

        Self {
            queue: Some(queue_tx),
            reports: report_rx,
            workers,
        }
    }

    /// Enqueue one triggering user-medication.
    pub fn enqueue(&self, trigger: UserMedication) -> Result<(), SendError<UserMedication>> {
        match &self.queue {
            Some(queue) => queue.send(trigger),
            None => Err(SendError(trigger)),
        }
    }

    /// Block for the next terminal job report.
    pub fn next_report(&self, timeout: Duration) -> Option<JobReport> {
        self.reports.recv_timeout(timeout).ok()
    }

    /// Close the queue and wait for in-flight jobs to finish.
    pub fn shutdown(&mut self) {
        self.queue.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for JobRunner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    job: &PairwiseCheckJob,
    queue: &Arc<Mutex<Receiver<UserMedication>>>,
    reports: &Sender<JobReport>,
    retry: &RetryPolicy,
) {
    loop {
        // Hold the queue lock only for the receive itself.
        let trigger = {
            let rx = queue.lock().unwrap_or_else(|e| e.into_inner());
            rx.recv()
        };
        let trigger = match trigger {
            Ok(t) => t,
            Err(_) => return, // queue closed
        };

        let report = run_with_retry(job, &trigger, retry);
        // Receiver may be gone during shutdown; nothing left to report to.
        let _ = reports.send(report);
    }
}

fn run_with_retry(
    job: &PairwiseCheckJob,
    trigger: &UserMedication,
    retry: &RetryPolicy,
) -> JobReport {
    let mut attempts = 0;
    loop {
        attempts += 1;
        match job.run(trigger) {
            Ok(JobOutcome::Completed {
                findings,
                alerts_created,
            }) => {
                return JobReport {
                    user_medication_id: trigger.id.clone(),
                    status: JobStatus::Completed {
                        findings: findings.len(),
                        alerts: alerts_created,
                    },
                    attempts,
                }
            }
            Ok(JobOutcome::Skipped(reason)) => {
                return JobReport {
                    user_medication_id: trigger.id.clone(),
                    status: JobStatus::Skipped(reason),
                    attempts,
                }
            }
            Err(e) => {
                let retryable = e.is_retryable();
                if retryable && attempts < retry.max_attempts {
                    tracing::warn!(
                        user_medication = %trigger.id,
                        attempt = attempts,
                        error = %e,
                        "job failed, retrying"
                    );
                    std::thread::sleep(retry.backoff * attempts);
                    continue;
                }
                tracing::error!(
                    user_medication = %trigger.id,
                    attempts,
                    error = %e,
                    "job failed"
                );
                return JobReport {
                    user_medication_id: trigger.id.clone(),
                    status: JobStatus::Failed {
                        error: e.to_string(),
                        retryable,
                    },
                    attempts,
                };
            }
        }
    }
}
