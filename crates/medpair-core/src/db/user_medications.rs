//! User-medication database operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::UserMedication;

impl Database {
    /// Insert or update a user-medication link.
    pub fn upsert_user_medication(&self, um: &UserMedication) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO user_medications (id, user_id, medication_id, active, start_date, end_date)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                active = excluded.active,
                start_date = excluded.start_date,
                end_date = excluded.end_date
            "#,
            params![
                um.id,
                um.user_id,
                um.medication_id,
                um.active,
                um.start_date.to_rfc3339(),
                um.end_date.map(|d| d.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Get a user-medication by id.
    pub fn get_user_medication(&self, id: &str) -> DbResult<Option<UserMedication>> {
        let result = self
            .conn
            .query_row(
                r#"
                SELECT id, user_id, medication_id, active, start_date, end_date
                FROM user_medications
                WHERE id = ?
                "#,
                [id],
                |row| {
                    Ok(UserMedicationRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        medication_id: row.get(2)?,
                        active: row.get(3)?,
                        start_date: row.get(4)?,
                        end_date: row.get(5)?,
                    })
                },
            )
            .optional()?;

        result.map(|row| row.try_into()).transpose()
    }

    /// All of a user's active, currently-in-window medications, excluding
    /// the given medication id. The date-window check runs in Rust so it
    /// shares `UserMedication::is_in_window` with the rest of the system.
    pub fn active_user_medications(
        &self,
        user_id: &str,
        excluding_medication: &str,
    ) -> DbResult<Vec<UserMedication>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, user_id, medication_id, active, start_date, end_date
            FROM user_medications
            WHERE user_id = ?1 AND active = 1 AND medication_id <> ?2
            ORDER BY start_date
            "#,
        )?;

        let rows = stmt.query_map(params![user_id, excluding_medication], |row| {
            Ok(UserMedicationRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                medication_id: row.get(2)?,
                active: row.get(3)?,
                start_date: row.get(4)?,
                end_date: row.get(5)?,
            })
        })?;

        let now = Utc::now();
        let mut medications = Vec::new();
        for row in rows {
            let um: UserMedication = row?.try_into()?;
            if um.is_in_window(now) {
                medications.push(um);
            }
        }
        Ok(medications)
    }

    /// Mark a user-medication inactive (soft delete).
    pub fn deactivate_user_medication(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("UPDATE user_medications SET active = 0 WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct UserMedicationRow {
    id: String,
    user_id: String,
    medication_id: String,
    active: bool,
    start_date: String,
    end_date: Option<String>,
}

impl TryFrom<UserMedicationRow> for UserMedication {
    type Error = DbError;

    fn try_from(row: UserMedicationRow) -> Result<Self, Self::Error> {
        Ok(UserMedication {
            id: row.id,
            user_id: row.user_id,
            medication_id: row.medication_id,
            active: row.active,
            start_date: parse_timestamp(&row.start_date)?,
            end_date: row.end_date.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

fn parse_timestamp(text: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::InvalidValue(format!("bad timestamp '{text}': {e}")))
}
