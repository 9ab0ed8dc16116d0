//! SQLite schema definition.

/// Complete database schema for medpair.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Medications
-- ============================================================================

CREATE TABLE IF NOT EXISTS medications (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_medications_name ON medications(name);

-- ============================================================================
-- User Medications (read-only here, owned by a collaborator)
-- ============================================================================

CREATE TABLE IF NOT EXISTS user_medications (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    medication_id TEXT NOT NULL REFERENCES medications(id) ON DELETE CASCADE,
    active INTEGER NOT NULL DEFAULT 1,
    start_date TEXT NOT NULL,
    end_date TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_user_meds_user ON user_medications(user_id, active);
CREATE INDEX IF NOT EXISTS idx_user_meds_medication ON user_medications(medication_id);

-- ============================================================================
-- Interaction Cache (append-only; single source of truth for pair judgments)
-- ============================================================================

-- One row per direction; commit_pair writes both directions in one
-- transaction so the table stays symmetric. A pair appears at most once
-- per direction (primary key) and never references itself (check).
CREATE TABLE IF NOT EXISTS interaction_cache (
    medication_id TEXT NOT NULL REFERENCES medications(id) ON DELETE CASCADE,
    related_id TEXT NOT NULL REFERENCES medications(id) ON DELETE CASCADE,
    has_interaction INTEGER NOT NULL,
    severity TEXT NOT NULL CHECK (severity IN ('none', 'mild', 'moderate', 'severe', 'contraindicated')),
    description TEXT NOT NULL DEFAULT '',
    recommendation TEXT,
    calculated_at TEXT NOT NULL,
    PRIMARY KEY (medication_id, related_id),
    CHECK (medication_id <> related_id)
);

CREATE INDEX IF NOT EXISTS idx_cache_related ON interaction_cache(related_id);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    fn seed_medications(conn: &Connection) {
        conn.execute(
            "INSERT INTO medications (id, name) VALUES ('med-a', 'Warfarin'), ('med-b', 'Aspirin')",
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_self_pair_rejected_by_check() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        seed_medications(&conn);

        let result = conn.execute(
            "INSERT INTO interaction_cache (medication_id, related_id, has_interaction, severity, calculated_at)
             VALUES ('med-a', 'med-a', 1, 'moderate', datetime('now'))",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_direction_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        seed_medications(&conn);

        conn.execute(
            "INSERT INTO interaction_cache (medication_id, related_id, has_interaction, severity, calculated_at)
             VALUES ('med-a', 'med-b', 1, 'moderate', datetime('now'))",
            [],
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO interaction_cache (medication_id, related_id, has_interaction, severity, calculated_at)
             VALUES ('med-a', 'med-b', 1, 'severe', datetime('now'))",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_severity_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        seed_medications(&conn);

        let result = conn.execute(
            "INSERT INTO interaction_cache (medication_id, related_id, has_interaction, severity, calculated_at)
             VALUES ('med-a', 'med-b', 1, 'catastrophic', datetime('now'))",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_deleting_medication_cascades_cache_rows() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        seed_medications(&conn);

        conn.execute(
            "INSERT INTO interaction_cache (medication_id, related_id, has_interaction, severity, calculated_at)
             VALUES ('med-a', 'med-b', 1, 'moderate', datetime('now')),
                    ('med-b', 'med-a', 1, 'moderate', datetime('now'))",
            [],
        )
        .unwrap();

        conn.execute("DELETE FROM medications WHERE id = 'med-a'", [])
            .unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM interaction_cache", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(count, 0);
    }
}
