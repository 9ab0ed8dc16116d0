//! Medication database operations.

use std::collections::HashMap;

use rusqlite::{params, OptionalExtension};

use super::{Database, DbResult};
use crate::models::Medication;

impl Database {
    /// Insert or update a medication.
    pub fn upsert_medication(&self, medication: &Medication) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO medications (id, name, updated_at)
            VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                updated_at = datetime('now')
            "#,
            params![medication.id, medication.name],
        )?;
        Ok(())
    }

    /// Get a medication by id.
    pub fn get_medication(&self, id: &str) -> DbResult<Option<Medication>> {
        let result = self
            .conn
            .query_row(
                "SELECT id, name FROM medications WHERE id = ?",
                [id],
                |row| {
                    Ok(Medication {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(result)
    }

    /// Resolve a set of ids to display names. Ids without a row are absent
    /// from the returned map.
    pub fn resolve_medication_names(&self, ids: &[String]) -> DbResult<HashMap<String, String>> {
        let mut names = HashMap::with_capacity(ids.len());
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM medications WHERE id = ?")?;
        for id in ids {
            let name: Option<String> = stmt
                .query_row([id.as_str()], |row| row.get(0))
                .optional()?;
            if let Some(name) = name {
                names.insert(id.clone(), name);
            }
        }
        Ok(names)
    }

    /// List all medications ordered by name.
    pub fn list_medications(&self) -> DbResult<Vec<Medication>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM medications ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(Medication {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;

        let mut medications = Vec::new();
        for row in rows {
            medications.push(row?);
        }
        Ok(medications)
    }

    /// Delete a medication. Cache rows referencing it are cascaded.
    pub fn delete_medication(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM medications WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_upsert_and_get() {
        let db = setup_db();

        let medication = Medication::new("Warfarin");
        db.upsert_medication(&medication).unwrap();

        let retrieved = db.get_medication(&medication.id).unwrap().unwrap();
        assert_eq!(retrieved.name, "Warfarin");
    }

    #[test]
    fn test_upsert_updates_name() {
        let db = setup_db();

        let mut medication = Medication::new("Warfarin");
        db.upsert_medication(&medication).unwrap();

        medication.name = "Warfarin Sodium".into();
        db.upsert_medication(&medication).unwrap();

        let retrieved = db.get_medication(&medication.id).unwrap().unwrap();
        assert_eq!(retrieved.name, "Warfarin Sodium");
    }

    #[test]
    fn test_resolve_names_skips_unknown_ids() {
        let db = setup_db();

        let warfarin = Medication::new("Warfarin");
        db.upsert_medication(&warfarin).unwrap();

        let names = db
            .resolve_medication_names(&[warfarin.id.clone(), "missing-id".into()])
            .unwrap();
        assert_eq!(names.len(), 1);
        assert_eq!(names[&warfarin.id], "Warfarin");
    }

    #[test]
    fn test_list_ordered_by_name() {
        let db = setup_db();

        db.upsert_medication(&Medication::new("Zolpidem")).unwrap();
        db.upsert_medication(&Medication::new("Aspirin")).unwrap();

        let listed = db.list_medications().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "Aspirin");
    }

    #[test]
    fn test_delete_missing_returns_false() {
        let db = setup_db();
        assert!(!db.delete_medication("nope").unwrap());
    }
}
