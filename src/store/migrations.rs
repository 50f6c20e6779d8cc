//! Version-tracked database migrations for the libSQL backend.
//!
//! Each migration has a version number and SQL. `run_migrations()` checks
//! the current version and applies only the new ones sequentially.

use libsql::Connection;

use crate::error::StoreError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "candidates_and_slots",
        sql: r#"
            CREATE TABLE IF NOT EXISTS candidates (
                id TEXT PRIMARY KEY,
                first_name TEXT,
                status TEXT NOT NULL DEFAULT 'unknown',
                has_completed_jobs INTEGER NOT NULL DEFAULT 0,
                pending_since TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE INDEX IF NOT EXISTS idx_candidates_status ON candidates(status);

            CREATE TABLE IF NOT EXISTS candidate_messages (
                id TEXT PRIMARY KEY,
                candidate_id TEXT NOT NULL,
                text TEXT NOT NULL,
                sent_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_candidate_messages_candidate
                ON candidate_messages(candidate_id, sent_at);

            CREATE TABLE IF NOT EXISTS interview_slots (
                id TEXT PRIMARY KEY,
                starts_at TEXT NOT NULL,
                duration_minutes INTEGER NOT NULL DEFAULT 30,
                meeting_link TEXT NOT NULL,
                booked_by TEXT,
                booked_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_interview_slots_starts_at ON interview_slots(starts_at);
        "#,
    },
    Migration {
        version: 2,
        name: "escalations",
        sql: r#"
            CREATE TABLE IF NOT EXISTS escalations (
                id TEXT PRIMARY KEY,
                candidate_id TEXT NOT NULL,
                priority TEXT NOT NULL,
                category TEXT NOT NULL,
                department TEXT NOT NULL,
                requires_specialist INTEGER NOT NULL DEFAULT 0,
                reasons TEXT NOT NULL DEFAULT '[]',
                message_excerpt TEXT NOT NULL,
                created_at TEXT NOT NULL,
                response_target_time TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'open',
                resolved_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_escalations_status ON escalations(status);
            CREATE INDEX IF NOT EXISTS idx_escalations_candidate ON escalations(candidate_id);
        "#,
    },
    Migration {
        version: 3,
        name: "escalation_reminders",
        sql: r#"
            ALTER TABLE escalations ADD COLUMN last_reminder_sent_at TEXT;
            ALTER TABLE escalations ADD COLUMN reminder_count INTEGER NOT NULL DEFAULT 0;
        "#,
    },
];

/// Run all pending migrations.
pub async fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| StoreError::Migration(format!("Failed to create _migrations table: {e}")))?;

    let current_version = get_current_version(conn).await?;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            conn.execute_batch(migration.sql).await.map_err(|e| {
                StoreError::Migration(format!(
                    "Migration V{} ({}) failed: {e}",
                    migration.version, migration.name
                ))
            })?;
            seed_version(conn, migration.version, migration.name).await?;
        }
    }

    tracing::info!(
        version = get_current_version(conn).await?,
        "Database migrations complete"
    );
    Ok(())
}

/// Get the highest applied migration version, or 0 if none.
async fn get_current_version(conn: &Connection) -> Result<i64, StoreError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| StoreError::Migration(format!("Failed to query migration version: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| StoreError::Migration(format!("Failed to read migration version: {e}")))?;

    match row {
        Some(row) => row.get::<i64>(0).map_err(|e| {
            StoreError::Migration(format!("Failed to parse migration version: {e}"))
        }),
        None => Ok(0),
    }
}

/// Insert a version record into `_migrations`.
async fn seed_version(conn: &Connection, version: i64, name: &str) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR IGNORE INTO _migrations (version, name) VALUES (?1, ?2)",
        libsql::params![version, name],
    )
    .await
    .map_err(|e| StoreError::Migration(format!("Failed to record migration V{version}: {e}")))?;
    Ok(())
}
