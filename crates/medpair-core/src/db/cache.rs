//! Interaction cache store.
//!
//! The `interaction_cache` table is the single source of truth for pair
//! judgments. All mutation goes through [`Database::commit_pair`], which
//! writes both directions of a pair inside one transaction and is a no-op
//! when the pair is already cached. Nothing else in the system writes to
//! this table.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rusqlite::{params, Transaction};

use super::{Database, DbError, DbResult};
use crate::models::{InteractionRecord, PairKey, Severity};

/// The judgment committed for a pair.
#[derive(Debug, Clone, PartialEq)]
pub struct PairJudgment {
    pub has_interaction: bool,
    pub severity: Severity,
    pub description: String,
    pub recommendation: Option<String>,
    pub calculated_at: DateTime<Utc>,
}

/// Result of a `commit_pair` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Both directions written (or the missing reverse backfilled).
    Committed,
    /// The primary direction was already cached; nothing was modified.
    AlreadyCached,
}

/// An interaction record joined with the related medication's display name.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedInteraction {
    pub record: InteractionRecord,
    pub related_name: String,
}

impl Database {
    /// Load a medication's interaction cache, oldest entry first.
    pub fn load_interaction_cache(&self, medication_id: &str) -> DbResult<Vec<InteractionRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT related_id, has_interaction, severity, description, recommendation, calculated_at
            FROM interaction_cache
            WHERE medication_id = ?
            ORDER BY calculated_at, related_id
            "#,
        )?;

        let rows = stmt.query_map([medication_id], |row| {
            Ok(InteractionRow {
                related_id: row.get(0)?,
                has_interaction: row.get(1)?,
                severity: row.get(2)?,
                description: row.get(3)?,
                recommendation: row.get(4)?,
                calculated_at: row.get(5)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.try_into()?);
        }
        Ok(records)
    }

    /// Ids of medications already cached against the given one.
    pub fn cached_related_ids(&self, medication_id: &str) -> DbResult<HashSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT related_id FROM interaction_cache WHERE medication_id = ?")?;
        let rows = stmt.query_map([medication_id], |row| row.get::<_, String>(0))?;

        let mut ids = HashSet::new();
        for row in rows {
            ids.insert(row?);
        }
        Ok(ids)
    }

    /// Whether the `primary → related` direction is cached.
    pub fn has_cached_pair(&self, primary: &str, related: &str) -> DbResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM interaction_cache WHERE medication_id = ?1 AND related_id = ?2",
            params![primary, related],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Total number of cached directions (two per committed pair).
    pub fn cached_pair_count(&self) -> DbResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM interaction_cache", [], |row| {
                row.get(0)
            })?;
        Ok(count as u64)
    }

    /// Read model: all interactions for a medication, joined with the
    /// related medication's display name, most severe first.
    pub fn interactions_for(&self, medication_id: &str) -> DbResult<Vec<NamedInteraction>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT c.related_id, c.has_interaction, c.severity, c.description,
                   c.recommendation, c.calculated_at, m.name
            FROM interaction_cache c
            JOIN medications m ON m.id = c.related_id
            WHERE c.medication_id = ?
            "#,
        )?;

        let rows = stmt.query_map([medication_id], |row| {
            Ok((
                InteractionRow {
                    related_id: row.get(0)?,
                    has_interaction: row.get(1)?,
                    severity: row.get(2)?,
                    description: row.get(3)?,
                    recommendation: row.get(4)?,
                    calculated_at: row.get(5)?,
                },
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut interactions = Vec::new();
        for row in rows {
            let (raw, related_name) = row?;
            interactions.push(NamedInteraction {
                record: raw.try_into()?,
                related_name,
            });
        }
        interactions.sort_by(|a, b| b.record.severity.cmp(&a.record.severity));
        Ok(interactions)
    }

    /// Commit a judgment for an unordered pair, writing both directions
    /// atomically.
    ///
    /// Idempotent: if the `primary → related` direction already exists the
    /// call returns [`CommitOutcome::AlreadyCached`] without modification.
    /// The reverse direction is re-checked independently and only written
    /// if absent; it reuses the judgment but drops the recommendation.
    pub fn commit_pair(
        &mut self,
        primary: &str,
        related: &str,
        judgment: &PairJudgment,
    ) -> DbResult<CommitOutcome> {
        let key = PairKey::new(primary, related)
            .ok_or_else(|| DbError::InvalidPair(format!("self-pair for {primary}")))?;

        let tx = self.conn.transaction()?;

        // Re-check under the transaction: two racing callers may both have
        // passed an earlier "uncached" check.
        if direction_exists(&tx, primary, related)? {
            tracing::debug!(pair = %key, "commit skipped, already cached");
            tx.commit()?;
            return Ok(CommitOutcome::AlreadyCached);
        }

        insert_direction(&tx, primary, related, judgment, true)?;

        if !direction_exists(&tx, related, primary)? {
            insert_direction(&tx, related, primary, judgment, false)?;
        }

        tx.commit()?;
        tracing::debug!(pair = %key, severity = %judgment.severity, "pair committed");
        Ok(CommitOutcome::Committed)
    }
}

fn direction_exists(tx: &Transaction<'_>, from: &str, to: &str) -> DbResult<bool> {
    let count: i64 = tx.query_row(
        "SELECT COUNT(*) FROM interaction_cache WHERE medication_id = ?1 AND related_id = ?2",
        params![from, to],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn insert_direction(
    tx: &Transaction<'_>,
    from: &str,
    to: &str,
    judgment: &PairJudgment,
    with_recommendation: bool,
) -> DbResult<()> {
    let recommendation = if with_recommendation {
        judgment.recommendation.as_deref()
    } else {
        None
    };
    tx.execute(
        r#"
        INSERT INTO interaction_cache
            (medication_id, related_id, has_interaction, severity, description, recommendation, calculated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            from,
            to,
            judgment.has_interaction,
            judgment.severity.to_string(),
            judgment.description,
            recommendation,
            judgment.calculated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Intermediate row struct for database mapping.
struct InteractionRow {
    related_id: String,
    has_interaction: bool,
    severity: String,
    description: String,
    recommendation: Option<String>,
    calculated_at: String,
}

impl TryFrom<InteractionRow> for InteractionRecord {
    type Error = DbError;

    fn try_from(row: InteractionRow) -> Result<Self, Self::Error> {
        Ok(InteractionRecord {
            related_medication_id: row.related_id,
            has_interaction: row.has_interaction,
            severity: row
                .severity
                .parse()
                .map_err(DbError::InvalidValue)?,
            description: row.description,
            recommendation: row.recommendation,
            calculated_at: chrono::DateTime::parse_from_rfc3339(&row.calculated_at)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| DbError::InvalidValue(format!("bad timestamp: {e}")))?,
        })
    }
}
