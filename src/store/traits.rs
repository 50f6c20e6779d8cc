//! `CandidateStore` trait: the single async persistence seam for the router.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::escalation::model::EscalationRecord;
use crate::pipeline::types::CandidateStatus;

/// What the marketplace knows about a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub candidate_id: String,
    pub first_name: Option<String>,
    pub status: CandidateStatus,
    pub has_completed_jobs: bool,
    /// When the candidate entered the pending queue.
    pub pending_since: Option<DateTime<Utc>>,
}

impl CandidateProfile {
    pub fn new(candidate_id: impl Into<String>, status: CandidateStatus) -> Self {
        Self {
            candidate_id: candidate_id.into(),
            first_name: None,
            status,
            has_completed_jobs: false,
            pending_since: None,
        }
    }

    pub fn with_first_name(mut self, name: impl Into<String>) -> Self {
        self.first_name = Some(name.into());
        self
    }

    pub fn with_completed_jobs(mut self) -> Self {
        self.has_completed_jobs = true;
        self
    }

    pub fn pending_since(mut self, at: DateTime<Utc>) -> Self {
        self.pending_since = Some(at);
        self
    }
}

/// A message the candidate sent earlier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentMessage {
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

/// Candidate messages inside a lookback window, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecentMessageStats {
    pub messages: Vec<RecentMessage>,
}

impl RecentMessageStats {
    /// Messages sent at or after `since`.
    pub fn since(&self, since: DateTime<Utc>) -> impl Iterator<Item = &RecentMessage> {
        self.messages.iter().filter(move |m| m.sent_at >= since)
    }
}

/// A bookable verification-interview slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewSlot {
    pub id: String,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub meeting_link: String,
}

/// Outcome of an atomic slot booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingResult {
    Success,
    /// Someone else holds the slot.
    Conflict,
}

/// Backend-agnostic persistence consumed by the router.
#[async_trait]
pub trait CandidateStore: Send + Sync {
    // ── Candidates ──────────────────────────────────────────────────

    /// Look up a candidate profile. `Ok(None)` when the candidate is unknown.
    async fn get_candidate_profile(
        &self,
        candidate_id: &str,
    ) -> Result<Option<CandidateProfile>, StoreError>;

    /// Candidate messages from the last `window_days` days.
    async fn get_recent_message_stats(
        &self,
        candidate_id: &str,
        window_days: u32,
    ) -> Result<RecentMessageStats, StoreError>;

    // ── Escalations ─────────────────────────────────────────────────

    /// Append an escalation record.
    async fn record_escalation(&self, record: &EscalationRecord) -> Result<(), StoreError>;

    async fn get_escalation(&self, id: Uuid) -> Result<Option<EscalationRecord>, StoreError>;

    /// All records still open, oldest first.
    async fn list_open_escalations(&self) -> Result<Vec<EscalationRecord>, StoreError>;

    /// Stamp a reminder and bump the reminder counter.
    async fn mark_reminder_sent(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Mark a record resolved. Returns `false` when no such record exists.
    async fn resolve_escalation(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError>;

    // ── Interview slots ─────────────────────────────────────────────

    /// Unbooked slots starting between now and `horizon_days` from now.
    async fn get_available_slots(&self, horizon_days: u32)
    -> Result<Vec<InterviewSlot>, StoreError>;

    /// Atomically claim a slot for a candidate.
    async fn book_slot(
        &self,
        candidate_id: &str,
        slot: &InterviewSlot,
    ) -> Result<BookingResult, StoreError>;

    /// Give a candidate's slot back to the pool. Returns `false` when the
    /// candidate does not hold it.
    async fn release_slot(&self, candidate_id: &str, slot_id: &str) -> Result<bool, StoreError>;
}
