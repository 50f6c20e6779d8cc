//! libSQL backend: async `CandidateStore` implementation.
//!
//! Supports local file and in-memory databases. Timestamps are stored as
//! fixed-width RFC 3339 strings so they compare correctly as text.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::StoreError;
use crate::escalation::model::{EscalationReason, EscalationRecord, EscalationStatus};
use crate::pipeline::types::CandidateStatus;
use crate::store::migrations;
use crate::store::traits::{
    BookingResult, CandidateProfile, CandidateStore, InterviewSlot, RecentMessage,
    RecentMessageStats,
};

/// libSQL store.
///
/// Holds a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                StoreError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, StoreError> {
        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    // ── Seeding helpers ─────────────────────────────────────────────

    /// Insert or replace a candidate profile.
    pub async fn upsert_candidate(&self, profile: &CandidateProfile) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT INTO candidates (id, first_name, status, has_completed_jobs, pending_since)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    first_name = excluded.first_name,
                    status = excluded.status,
                    has_completed_jobs = excluded.has_completed_jobs,
                    pending_since = excluded.pending_since",
                params![
                    profile.candidate_id.as_str(),
                    opt_text(profile.first_name.as_deref()),
                    profile.status.as_str(),
                    profile.has_completed_jobs as i64,
                    opt_text(profile.pending_since.map(fmt_ts).as_deref()),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("upsert_candidate: {e}")))?;
        Ok(())
    }

    /// Record an inbound candidate message for activity counters.
    pub async fn insert_candidate_message(
        &self,
        candidate_id: &str,
        text: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT INTO candidate_messages (id, candidate_id, text, sent_at) VALUES (?1, ?2, ?3, ?4)",
                params![Uuid::new_v4().to_string(), candidate_id, text, fmt_ts(sent_at)],
            )
            .await
            .map_err(|e| StoreError::Query(format!("insert_candidate_message: {e}")))?;
        Ok(())
    }

    /// Publish an interview slot.
    pub async fn insert_slot(&self, slot: &InterviewSlot) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT INTO interview_slots (id, starts_at, duration_minutes, meeting_link) VALUES (?1, ?2, ?3, ?4)",
                params![
                    slot.id.as_str(),
                    fmt_ts(slot.starts_at),
                    i64::from(slot.duration_minutes),
                    slot.meeting_link.as_str(),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("insert_slot: {e}")))?;
        Ok(())
    }
}

// ── Helper functions ────────────────────────────────────────────────

fn fmt_ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_optional_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.as_deref().map(parse_datetime)
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn parse_enum<T: std::str::FromStr<Err = String>>(s: &str) -> Result<T, StoreError> {
    s.parse().map_err(StoreError::Serialization)
}

const ESCALATION_COLUMNS: &str = "id, candidate_id, priority, category, department, requires_specialist, reasons, message_excerpt, created_at, response_target_time, status, last_reminder_sent_at, reminder_count, resolved_at";

fn row_to_escalation(row: &libsql::Row) -> Result<EscalationRecord, StoreError> {
    let get_err = |e: libsql::Error| StoreError::Query(format!("escalation row parse: {e}"));

    let id_str: String = row.get(0).map_err(get_err)?;
    let candidate_id: String = row.get(1).map_err(get_err)?;
    let priority: String = row.get(2).map_err(get_err)?;
    let category: String = row.get(3).map_err(get_err)?;
    let department: String = row.get(4).map_err(get_err)?;
    let requires_specialist: i64 = row.get(5).map_err(get_err)?;
    let reasons: String = row.get(6).map_err(get_err)?;
    let message_excerpt: String = row.get(7).map_err(get_err)?;
    let created_at: String = row.get(8).map_err(get_err)?;
    let target: String = row.get(9).map_err(get_err)?;
    let status: String = row.get(10).map_err(get_err)?;
    let last_reminder: Option<String> = row.get(11).ok();
    let reminder_count: i64 = row.get(12).unwrap_or(0);
    let resolved_at: Option<String> = row.get(13).ok();

    let reasons: Vec<EscalationReason> = serde_json::from_str(&reasons)
        .map_err(|e| StoreError::Serialization(format!("escalation reasons: {e}")))?;

    Ok(EscalationRecord {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| StoreError::Serialization(format!("escalation id: {e}")))?,
        candidate_id,
        priority: parse_enum(&priority)?,
        category: parse_enum(&category)?,
        department: parse_enum(&department)?,
        requires_specialist: requires_specialist != 0,
        reasons,
        message_excerpt,
        created_at: parse_datetime(&created_at),
        response_target_time: parse_datetime(&target),
        status: if status == "resolved" {
            EscalationStatus::Resolved
        } else {
            EscalationStatus::Open
        },
        last_reminder_sent_at: parse_optional_datetime(last_reminder),
        reminder_count: reminder_count.max(0) as u32,
        resolved_at: parse_optional_datetime(resolved_at),
    })
}

fn status_to_str(status: EscalationStatus) -> &'static str {
    match status {
        EscalationStatus::Open => "open",
        EscalationStatus::Resolved => "resolved",
    }
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl CandidateStore for LibSqlStore {
    async fn get_candidate_profile(
        &self,
        candidate_id: &str,
    ) -> Result<Option<CandidateProfile>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, first_name, status, has_completed_jobs, pending_since FROM candidates WHERE id = ?1",
                params![candidate_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("get_candidate_profile: {e}")))?;

        let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("get_candidate_profile: {e}")))?
        else {
            return Ok(None);
        };

        let get_err = |e: libsql::Error| StoreError::Query(format!("candidate row parse: {e}"));
        let id: String = row.get(0).map_err(get_err)?;
        let first_name: Option<String> = row.get(1).ok();
        let status: String = row.get(2).map_err(get_err)?;
        let has_completed_jobs: i64 = row.get(3).unwrap_or(0);
        let pending_since: Option<String> = row.get(4).ok();

        Ok(Some(CandidateProfile {
            candidate_id: id,
            first_name,
            status: status.parse().unwrap_or_default(),
            has_completed_jobs: has_completed_jobs != 0,
            pending_since: parse_optional_datetime(pending_since),
        }))
    }

    async fn get_recent_message_stats(
        &self,
        candidate_id: &str,
        window_days: u32,
    ) -> Result<RecentMessageStats, StoreError> {
        let cutoff = Utc::now() - Duration::days(i64::from(window_days));
        let mut rows = self
            .conn()
            .query(
                "SELECT text, sent_at FROM candidate_messages
                 WHERE candidate_id = ?1 AND sent_at >= ?2
                 ORDER BY sent_at DESC",
                params![candidate_id, fmt_ts(cutoff)],
            )
            .await
            .map_err(|e| StoreError::Query(format!("get_recent_message_stats: {e}")))?;

        let mut messages = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("get_recent_message_stats: {e}")))?
        {
            let text: String = row
                .get(0)
                .map_err(|e| StoreError::Query(format!("message row parse: {e}")))?;
            let sent_at: String = row
                .get(1)
                .map_err(|e| StoreError::Query(format!("message row parse: {e}")))?;
            messages.push(RecentMessage {
                text,
                sent_at: parse_datetime(&sent_at),
            });
        }
        Ok(RecentMessageStats { messages })
    }

    async fn record_escalation(&self, record: &EscalationRecord) -> Result<(), StoreError> {
        let reasons = serde_json::to_string(&record.reasons)
            .map_err(|e| StoreError::Serialization(format!("escalation reasons: {e}")))?;
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO escalations ({ESCALATION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
                ),
                params![
                    record.id.to_string(),
                    record.candidate_id.as_str(),
                    record.priority.as_str(),
                    record.category.as_str(),
                    record.department.as_str(),
                    record.requires_specialist as i64,
                    reasons,
                    record.message_excerpt.as_str(),
                    fmt_ts(record.created_at),
                    fmt_ts(record.response_target_time),
                    status_to_str(record.status),
                    opt_text(record.last_reminder_sent_at.map(fmt_ts).as_deref()),
                    i64::from(record.reminder_count),
                    opt_text(record.resolved_at.map(fmt_ts).as_deref()),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("record_escalation: {e}")))?;

        debug!(escalation_id = %record.id, priority = %record.priority, "Escalation recorded");
        Ok(())
    }

    async fn get_escalation(&self, id: Uuid) -> Result<Option<EscalationRecord>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {ESCALATION_COLUMNS} FROM escalations WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("get_escalation: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_escalation(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("get_escalation: {e}"))),
        }
    }

    async fn list_open_escalations(&self) -> Result<Vec<EscalationRecord>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {ESCALATION_COLUMNS} FROM escalations WHERE status = 'open' ORDER BY created_at ASC"
                ),
                (),
            )
            .await
            .map_err(|e| StoreError::Query(format!("list_open_escalations: {e}")))?;

        let mut records = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("list_open_escalations: {e}")))?
        {
            records.push(row_to_escalation(&row)?);
        }
        Ok(records)
    }

    async fn mark_reminder_sent(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let count = self
            .conn()
            .execute(
                "UPDATE escalations SET last_reminder_sent_at = ?1, reminder_count = reminder_count + 1 WHERE id = ?2",
                params![fmt_ts(at), id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("mark_reminder_sent: {e}")))?;

        if count == 0 {
            return Err(StoreError::NotFound {
                entity: "escalation".into(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn resolve_escalation(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let conn = self.conn();
        conn.execute(
            "UPDATE escalations SET status = 'resolved', resolved_at = ?1 WHERE id = ?2 AND status = 'open'",
            params![fmt_ts(at), id.to_string()],
        )
        .await
        .map_err(|e| StoreError::Query(format!("resolve_escalation: {e}")))?;

        Ok(self.get_escalation(id).await?.is_some())
    }

    async fn get_available_slots(
        &self,
        horizon_days: u32,
    ) -> Result<Vec<InterviewSlot>, StoreError> {
        let now = Utc::now();
        let until = now + Duration::days(i64::from(horizon_days));
        let mut rows = self
            .conn()
            .query(
                "SELECT id, starts_at, duration_minutes, meeting_link FROM interview_slots
                 WHERE booked_by IS NULL AND starts_at > ?1 AND starts_at <= ?2
                 ORDER BY starts_at ASC",
                params![fmt_ts(now), fmt_ts(until)],
            )
            .await
            .map_err(|e| StoreError::Query(format!("get_available_slots: {e}")))?;

        let mut slots = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("get_available_slots: {e}")))?
        {
            let get_err = |e: libsql::Error| StoreError::Query(format!("slot row parse: {e}"));
            let id: String = row.get(0).map_err(get_err)?;
            let starts_at: String = row.get(1).map_err(get_err)?;
            let duration: i64 = row.get(2).unwrap_or(30);
            let meeting_link: String = row.get(3).map_err(get_err)?;
            slots.push(InterviewSlot {
                id,
                starts_at: parse_datetime(&starts_at),
                duration_minutes: duration.max(0) as u32,
                meeting_link,
            });
        }
        Ok(slots)
    }

    async fn book_slot(
        &self,
        candidate_id: &str,
        slot: &InterviewSlot,
    ) -> Result<BookingResult, StoreError> {
        let conn = self.conn();
        let count = conn
            .execute(
                "UPDATE interview_slots SET booked_by = ?1, booked_at = ?2
                 WHERE id = ?3 AND (booked_by IS NULL OR booked_by = ?1)",
                params![candidate_id, fmt_ts(Utc::now()), slot.id.as_str()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("book_slot: {e}")))?;

        if count > 0 {
            info!(candidate_id, slot_id = %slot.id, "Interview slot booked");
            return Ok(BookingResult::Success);
        }

        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM interview_slots WHERE id = ?1",
                params![slot.id.as_str()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("book_slot: {e}")))?;
        let exists = match rows.next().await {
            Ok(Some(row)) => row.get::<i64>(0).unwrap_or(0) > 0,
            _ => false,
        };
        if exists {
            debug!(candidate_id, slot_id = %slot.id, "Slot already held by another candidate");
            Ok(BookingResult::Conflict)
        } else {
            Err(StoreError::NotFound {
                entity: "interview_slot".into(),
                id: slot.id.clone(),
            })
        }
    }

    async fn release_slot(&self, candidate_id: &str, slot_id: &str) -> Result<bool, StoreError> {
        let count = self
            .conn()
            .execute(
                "UPDATE interview_slots SET booked_by = NULL, booked_at = NULL
                 WHERE id = ?1 AND booked_by = ?2",
                params![slot_id, candidate_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("release_slot: {e}")))?;
        if count > 0 {
            info!(candidate_id, slot_id, "Interview slot released");
        }
        Ok(count > 0)
    }
}
