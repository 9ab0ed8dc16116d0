//! Pair-scoped locking.
//!
//! In-process lock table keyed by canonical [`PairKey`]. All workers share
//! one process and one cache store, so an in-process table satisfies the
//! at-most-once requirement without a distributed lock. Acquisition is
//! bounded: a stuck lock times out and fails the caller instead of
//! deadlocking the worker pool.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::models::PairKey;

/// Lock acquisition timed out. Transient contention; retryable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("timed out acquiring lock for pair {pair} after {waited_ms}ms")]
pub struct LockTimeout {
    pub pair: PairKey,
    pub waited_ms: u64,
}

/// Lock table serializing writers per unordered medication pair.
#[derive(Debug, Default)]
pub struct PairLockTable {
    held: Mutex<HashSet<PairKey>>,
    released: Condvar,
}

impl PairLockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for one pair, waiting up to `timeout`.
    pub fn acquire(&self, key: PairKey, timeout: Duration) -> Result<PairLockGuard<'_>, LockTimeout> {
        let start = Instant::now();
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());

        while held.contains(&key) {
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Err(LockTimeout {
                    pair: key,
                    waited_ms: elapsed.as_millis() as u64,
                });
            }
            let (guard, wait) = self
                .released
                .wait_timeout(held, timeout - elapsed)
                .unwrap_or_else(|e| e.into_inner());
            held = guard;
            if wait.timed_out() && held.contains(&key) {
                return Err(LockTimeout {
                    pair: key,
                    waited_ms: start.elapsed().as_millis() as u64,
                });
            }
        }

        held.insert(key.clone());
        Ok(PairLockGuard { table: self, key })
    }

    /// Acquire locks for several pairs. Keys are sorted into canonical
    /// order first so overlapping multi-pair callers cannot deadlock.
    /// On timeout, already-acquired guards are dropped (released).
    pub fn acquire_all(
        &self,
        mut keys: Vec<PairKey>,
        timeout: Duration,
    ) -> Result<Vec<PairLockGuard<'_>>, LockTimeout> {
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            guards.push(self.acquire(key, timeout)?);
        }
        Ok(guards)
    }

    #[cfg(test)]
    fn held_count(&self) -> usize {
        self.held.lock().unwrap().len()
    }
}

/// RAII guard for one pair lock; releases and notifies waiters on drop.
#[derive(Debug)]
pub struct PairLockGuard<'a> {
    table: &'a PairLockTable,
    key: PairKey,
}

impl PairLockGuard<'_> {
    pub fn key(&self) -> &PairKey {
        &self.key
    }
}

impl Drop for PairLockGuard<'_> {
    fn drop(&mut self) {
        let mut held = self.table.held.lock().unwrap_or_else(|e| e.into_inner());
        held.remove(&self.key);
        self.table.released.notify_all();
    }
}
