//! In-memory `CandidateStore` for tests and demos.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::escalation::model::{EscalationRecord, EscalationStatus};
use crate::store::traits::{
    BookingResult, CandidateProfile, CandidateStore, InterviewSlot, RecentMessage,
    RecentMessageStats,
};

struct SlotRow {
    slot: InterviewSlot,
    booked_by: Option<String>,
}

/// Everything lives behind `RwLock`s; cheap to build per test.
#[derive(Default)]
pub struct InMemoryStore {
    profiles: RwLock<HashMap<String, CandidateProfile>>,
    messages: RwLock<HashMap<String, Vec<RecentMessage>>>,
    escalations: RwLock<Vec<EscalationRecord>>,
    slots: RwLock<Vec<SlotRow>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    book_calls: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_candidate(&self, profile: CandidateProfile) {
        self.profiles
            .write()
            .await
            .insert(profile.candidate_id.clone(), profile);
    }

    pub async fn add_message(&self, candidate_id: &str, text: &str, sent_at: DateTime<Utc>) {
        self.messages
            .write()
            .await
            .entry(candidate_id.to_string())
            .or_default()
            .push(RecentMessage {
                text: text.to_string(),
                sent_at,
            });
    }

    pub async fn add_slot(&self, slot: InterviewSlot) {
        self.slots.write().await.push(SlotRow {
            slot,
            booked_by: None,
        });
    }

    /// Make candidate and message reads fail, to exercise degraded paths.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make escalation writes fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of `book_slot` calls that reached the store.
    pub fn book_calls(&self) -> usize {
        self.book_calls.load(Ordering::SeqCst)
    }

    /// Snapshot of every escalation ever recorded.
    pub async fn escalations(&self) -> Vec<EscalationRecord> {
        self.escalations.read().await.clone()
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("reads disabled".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CandidateStore for InMemoryStore {
    async fn get_candidate_profile(
        &self,
        candidate_id: &str,
    ) -> Result<Option<CandidateProfile>, StoreError> {
        self.check_reads()?;
        Ok(self.profiles.read().await.get(candidate_id).cloned())
    }

    async fn get_recent_message_stats(
        &self,
        candidate_id: &str,
        window_days: u32,
    ) -> Result<RecentMessageStats, StoreError> {
        self.check_reads()?;
        let cutoff = Utc::now() - Duration::days(i64::from(window_days));
        let mut messages: Vec<RecentMessage> = self
            .messages
            .read()
            .await
            .get(candidate_id)
            .map(|all| all.iter().filter(|m| m.sent_at >= cutoff).cloned().collect())
            .unwrap_or_default();
        messages.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        Ok(RecentMessageStats { messages })
    }

    async fn record_escalation(&self, record: &EscalationRecord) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("writes disabled".into()));
        }
        self.escalations.write().await.push(record.clone());
        Ok(())
    }

    async fn get_escalation(&self, id: Uuid) -> Result<Option<EscalationRecord>, StoreError> {
        Ok(self
            .escalations
            .read()
            .await
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn list_open_escalations(&self) -> Result<Vec<EscalationRecord>, StoreError> {
        let mut open: Vec<EscalationRecord> = self
            .escalations
            .read()
            .await
            .iter()
            .filter(|r| r.status == EscalationStatus::Open)
            .cloned()
            .collect();
        open.sort_by_key(|r| r.created_at);
        Ok(open)
    }

    async fn mark_reminder_sent(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut records = self.escalations.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "escalation".into(),
                id: id.to_string(),
            })?;
        record.last_reminder_sent_at = Some(at);
        record.reminder_count += 1;
        Ok(())
    }

    async fn resolve_escalation(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut records = self.escalations.write().await;
        match records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                if record.status == EscalationStatus::Open {
                    record.status = EscalationStatus::Resolved;
                    record.resolved_at = Some(at);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_available_slots(
        &self,
        horizon_days: u32,
    ) -> Result<Vec<InterviewSlot>, StoreError> {
        let now = Utc::now();
        let until = now + Duration::days(i64::from(horizon_days));
        let mut slots: Vec<InterviewSlot> = self
            .slots
            .read()
            .await
            .iter()
            .filter(|row| row.booked_by.is_none())
            .filter(|row| row.slot.starts_at > now && row.slot.starts_at <= until)
            .map(|row| row.slot.clone())
            .collect();
        slots.sort_by_key(|s| s.starts_at);
        Ok(slots)
    }

    async fn book_slot(
        &self,
        candidate_id: &str,
        slot: &InterviewSlot,
    ) -> Result<BookingResult, StoreError> {
        self.book_calls.fetch_add(1, Ordering::SeqCst);
        let mut slots = self.slots.write().await;
        let row = slots
            .iter_mut()
            .find(|row| row.slot.id == slot.id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "interview_slot".into(),
                id: slot.id.clone(),
            })?;
        match &row.booked_by {
            Some(holder) if holder != candidate_id => Ok(BookingResult::Conflict),
            _ => {
                row.booked_by = Some(candidate_id.to_string());
                Ok(BookingResult::Success)
            }
        }
    }

    async fn release_slot(&self, candidate_id: &str, slot_id: &str) -> Result<bool, StoreError> {
        let mut slots = self.slots.write().await;
        match slots
            .iter_mut()
            .find(|row| row.slot.id == slot_id && row.booked_by.as_deref() == Some(candidate_id))
        {
            Some(row) => {
                row.booked_by = None;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
