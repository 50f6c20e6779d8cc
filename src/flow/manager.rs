//! ConversationFlowManager: per-candidate scheduling sessions, slot search,
//! and idempotent booking.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, FixedOffset, Utc, Weekday};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::FlowError;
use crate::flow::signals::{FlowSignal, SlotPreferences, detect_signal};
use crate::flow::state::FlowState;
use crate::pipeline::types::CandidateStatus;
use crate::store::{BookingResult, CandidateStore, InterviewSlot};

/// Most slots offered at once.
pub const MAX_OFFERED_SLOTS: usize = 5;

/// Unfinished flows untouched for this long are dropped.
const SESSION_IDLE_HOURS: i64 = 24;

/// In-memory state of one unfinished scheduling conversation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowSession {
    pub state: FlowState,
    pub preferences: Option<SlotPreferences>,
    pub offered: Vec<InterviewSlot>,
    pub selected: Option<InterviewSlot>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl FlowSession {
    fn transition(&mut self, target: FlowState) -> Result<(), FlowError> {
        if !self.state.can_transition_to(target) {
            return Err(FlowError::InvalidTransition {
                from: self.state.to_string(),
                to: target.to_string(),
            });
        }
        debug!(from = %self.state, to = %target, "Flow transition");
        self.state = target;
        self.updated_at = Some(Utc::now());
        Ok(())
    }

    fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.updated_at
            .is_some_and(|at| now - at > chrono::Duration::hours(SESSION_IDLE_HOURS))
    }
}

/// Result of `book_slot`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingOutcome {
    Booked(InterviewSlot),
    /// The candidate already holds this slot; the store was not touched.
    AlreadyBooked(InterviewSlot),
    /// Someone else took the slot; these are still open.
    Conflict { alternatives: Vec<InterviewSlot> },
}

/// What a flow message did, for the generator to put into words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    /// Asked when the candidate is free.
    AskAvailability,
    SlotsOffered(Vec<InterviewSlot>),
    /// Nothing matched the stated availability.
    NoSlots,
    /// Picked a slot; waiting for a yes.
    ConfirmSlot(InterviewSlot),
    Booked(InterviewSlot),
    AlreadyScheduled(InterviewSlot),
    Conflict { alternatives: Vec<InterviewSlot> },
    InvalidPick { offered: Vec<InterviewSlot> },
    Declined,
    /// Mid-flow message with no scheduling signal; repeat the current step.
    Reprompt {
        state: FlowState,
        offered: Vec<InterviewSlot>,
    },
}

/// Suggested next step for a candidate, by status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    ScheduleInterview,
    AttendInterview,
    AwaitReview,
    BrowseJobs,
    ContactSupport,
}

/// Where a candidate stands in the verification queue.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueStatus {
    pub status: CandidateStatus,
    pub days_waiting: Option<i64>,
    pub booked_slot: Option<InterviewSlot>,
    pub next_step: NextStep,
}

/// Coordinates interview scheduling across candidates.
///
/// Only unfinished flows keep a session. A candidate with an upcoming
/// booking and no open flow is in `Scheduled`.
pub struct ConversationFlowManager {
    store: Arc<dyn CandidateStore>,
    sessions: RwLock<HashMap<String, FlowSession>>,
    /// Upcoming booked slot per candidate.
    bookings: RwLock<HashMap<String, InterviewSlot>>,
    business_offset: FixedOffset,
    horizon_days: u32,
}

impl ConversationFlowManager {
    pub fn new(
        store: Arc<dyn CandidateStore>,
        business_offset: FixedOffset,
        horizon_days: u32,
    ) -> Self {
        Self {
            store,
            sessions: RwLock::new(HashMap::new()),
            bookings: RwLock::new(HashMap::new()),
            business_offset,
            horizon_days,
        }
    }

    pub async fn current_state(&self, candidate_id: &str) -> FlowState {
        if let Some(session) = self.sessions.read().await.get(candidate_id) {
            return session.state;
        }
        if self.booked_slot(candidate_id).await.is_some() {
            FlowState::Scheduled
        } else {
            FlowState::InitialEngagement
        }
    }

    /// Snapshot of a candidate's unfinished flow.
    pub async fn session(&self, candidate_id: &str) -> Option<FlowSession> {
        self.sessions.read().await.get(candidate_id).cloned()
    }

    /// The candidate's upcoming interview, if any.
    pub async fn booked_slot(&self, candidate_id: &str) -> Option<InterviewSlot> {
        self.bookings
            .read()
            .await
            .get(candidate_id)
            .filter(|slot| slot.starts_at > Utc::now())
            .cloned()
    }

    async fn load(&self, candidate_id: &str) -> FlowSession {
        match self.session(candidate_id).await {
            Some(session) => session,
            None => FlowSession {
                state: self.current_state(candidate_id).await,
                ..FlowSession::default()
            },
        }
    }

    /// Keep the session only while its flow is unfinished, and drop
    /// abandoned ones.
    async fn store_session(&self, candidate_id: &str, session: FlowSession) {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        if session.state.is_active() {
            sessions.insert(candidate_id.to_string(), session);
        } else {
            sessions.remove(candidate_id);
        }
        sessions.retain(|_, s| !s.is_stale(now));
    }

    fn today(&self, now: DateTime<Utc>) -> Weekday {
        now.with_timezone(&self.business_offset).weekday()
    }

    /// Detect a scheduling sub-intent for this candidate's current state.
    pub async fn detect_signal(&self, candidate_id: &str, text: &str) -> Option<FlowSignal> {
        let state = self.current_state(candidate_id).await;
        detect_signal(text, state, self.today(Utc::now()))
    }

    /// Advance the candidate's flow for an inbound message.
    ///
    /// `Ok(None)` means the message carries no scheduling signal.
    pub async fn handle_message(
        &self,
        candidate_id: &str,
        text: &str,
    ) -> Result<Option<FlowOutcome>, FlowError> {
        let mut session = self.load(candidate_id).await;
        let Some(signal) = detect_signal(text, session.state, self.today(Utc::now())) else {
            return Ok(None);
        };
        debug!(candidate_id, state = %session.state, ?signal, "Flow signal");

        let outcome = self.apply(candidate_id, &mut session, signal).await?;
        self.store_session(candidate_id, session).await;
        Ok(Some(outcome))
    }

    /// Repeat the current step for a mid-flow message without a signal.
    pub async fn reprompt(&self, candidate_id: &str) -> FlowOutcome {
        let session = self.load(candidate_id).await;
        FlowOutcome::Reprompt {
            state: session.state,
            offered: session.offered,
        }
    }

    async fn apply(
        &self,
        candidate_id: &str,
        session: &mut FlowSession,
        signal: FlowSignal,
    ) -> Result<FlowOutcome, FlowError> {
        match signal {
            FlowSignal::Decline => {
                session.transition(FlowState::InitialEngagement)?;
                session.offered.clear();
                session.selected = None;
                session.preferences = None;
                info!(candidate_id, "Scheduling declined");
                Ok(FlowOutcome::Declined)
            }
            FlowSignal::StartScheduling(_) if session.state == FlowState::Scheduled => {
                match self.booked_slot(candidate_id).await {
                    Some(slot) => Ok(FlowOutcome::AlreadyScheduled(slot)),
                    None => {
                        session.transition(FlowState::SchedulingStarted)?;
                        session.transition(FlowState::CollectingAvailability)?;
                        Ok(FlowOutcome::AskAvailability)
                    }
                }
            }
            FlowSignal::StartScheduling(prefs) => {
                session.transition(FlowState::SchedulingStarted)?;
                match prefs {
                    Some(prefs) => self.offer(session, prefs).await,
                    None => {
                        session.transition(FlowState::CollectingAvailability)?;
                        Ok(FlowOutcome::AskAvailability)
                    }
                }
            }
            FlowSignal::Availability(prefs) => self.offer(session, prefs).await,
            FlowSignal::SlotPick(index) => {
                let Some(slot) = index
                    .checked_sub(1)
                    .and_then(|i| session.offered.get(i))
                    .cloned()
                else {
                    return Ok(FlowOutcome::InvalidPick {
                        offered: session.offered.clone(),
                    });
                };
                if session.state == FlowState::ConfirmingBooking {
                    session.transition(FlowState::OfferingSlots)?;
                }
                session.transition(FlowState::ConfirmingBooking)?;
                session.selected = Some(slot.clone());
                Ok(FlowOutcome::ConfirmSlot(slot))
            }
            FlowSignal::Confirm => {
                let Some(slot) = session.selected.clone() else {
                    return Err(FlowError::NoSuchOffer { index: 0 });
                };
                match self.book_for_session(candidate_id, session, &slot).await? {
                    BookingOutcome::Booked(slot) | BookingOutcome::AlreadyBooked(slot) => {
                        session.transition(FlowState::Scheduled)?;
                        session.offered.clear();
                        session.selected = None;
                        Ok(FlowOutcome::Booked(slot))
                    }
                    BookingOutcome::Conflict { alternatives } => {
                        session.selected = None;
                        if alternatives.is_empty() {
                            session.transition(FlowState::CollectingAvailability)?;
                        } else {
                            session.transition(FlowState::OfferingSlots)?;
                        }
                        session.offered = alternatives.clone();
                        Ok(FlowOutcome::Conflict { alternatives })
                    }
                }
            }
            FlowSignal::RejectSlot => {
                if let Some(rejected) = session.selected.take() {
                    session.offered.retain(|s| s.id != rejected.id);
                }
                if session.offered.is_empty() {
                    session.transition(FlowState::CollectingAvailability)?;
                    Ok(FlowOutcome::AskAvailability)
                } else {
                    session.transition(FlowState::OfferingSlots)?;
                    Ok(FlowOutcome::SlotsOffered(session.offered.clone()))
                }
            }
            FlowSignal::Reschedule => {
                session.transition(FlowState::CollectingAvailability)?;
                session.offered.clear();
                session.selected = None;
                Ok(FlowOutcome::AskAvailability)
            }
        }
    }

    async fn offer(
        &self,
        session: &mut FlowSession,
        prefs: SlotPreferences,
    ) -> Result<FlowOutcome, FlowError> {
        let slots = self.find_matching_slots(&prefs, self.horizon_days).await?;
        session.preferences = Some(prefs);
        if slots.is_empty() {
            if session.state != FlowState::CollectingAvailability {
                session.transition(FlowState::CollectingAvailability)?;
            }
            session.offered.clear();
            return Ok(FlowOutcome::NoSlots);
        }
        session.transition(FlowState::OfferingSlots)?;
        session.offered = slots.clone();
        Ok(FlowOutcome::SlotsOffered(slots))
    }

    /// Open slots within `horizon_days` that fit `prefs` in business time.
    ///
    /// Future slots only, earliest first, at most five.
    pub async fn find_matching_slots(
        &self,
        prefs: &SlotPreferences,
        horizon_days: u32,
    ) -> Result<Vec<InterviewSlot>, FlowError> {
        let now = Utc::now();
        let mut slots: Vec<InterviewSlot> = self
            .store
            .get_available_slots(horizon_days)
            .await?
            .into_iter()
            .filter(|s| s.starts_at > now)
            .filter(|s| prefs.matches(&s.starts_at.with_timezone(&self.business_offset)))
            .collect();
        slots.sort_by_key(|s| s.starts_at);
        slots.truncate(MAX_OFFERED_SLOTS);
        Ok(slots)
    }

    /// Book `slot` for a candidate.
    ///
    /// Re-booking the slot the candidate already holds returns
    /// `AlreadyBooked` without touching the store. Booking a different slot
    /// releases the one held before. A conflict comes back with alternative
    /// slots rather than an error.
    pub async fn book_slot(
        &self,
        candidate_id: &str,
        slot: &InterviewSlot,
    ) -> Result<BookingOutcome, FlowError> {
        let mut session = self.load(candidate_id).await;
        let outcome = self.book_for_session(candidate_id, &mut session, slot).await?;
        self.store_session(candidate_id, session).await;
        Ok(outcome)
    }

    async fn book_for_session(
        &self,
        candidate_id: &str,
        session: &mut FlowSession,
        slot: &InterviewSlot,
    ) -> Result<BookingOutcome, FlowError> {
        if self
            .booked_slot(candidate_id)
            .await
            .is_some_and(|b| b.id == slot.id)
        {
            debug!(candidate_id, slot_id = %slot.id, "Slot already booked by this candidate");
            return Ok(BookingOutcome::AlreadyBooked(slot.clone()));
        }

        match self.store.book_slot(candidate_id, slot).await? {
            BookingResult::Success => {
                info!(candidate_id, slot_id = %slot.id, "Interview booked");
                let previous = {
                    let now = Utc::now();
                    let mut bookings = self.bookings.write().await;
                    let previous = bookings.insert(candidate_id.to_string(), slot.clone());
                    bookings.retain(|_, b| b.starts_at > now);
                    previous
                };
                if let Some(previous) = previous.filter(|p| p.id != slot.id) {
                    self.release(candidate_id, &previous).await;
                }
                Ok(BookingOutcome::Booked(slot.clone()))
            }
            BookingResult::Conflict => {
                warn!(candidate_id, slot_id = %slot.id, "Booking conflict, re-offering");
                let prefs = session.preferences.clone().unwrap_or_default();
                let mut alternatives = self.find_matching_slots(&prefs, self.horizon_days).await?;
                alternatives.retain(|s| s.id != slot.id);
                Ok(BookingOutcome::Conflict { alternatives })
            }
        }
    }

    async fn release(&self, candidate_id: &str, slot: &InterviewSlot) {
        match self.store.release_slot(candidate_id, &slot.id).await {
            Ok(true) => info!(candidate_id, slot_id = %slot.id, "Previous interview slot released"),
            Ok(false) => debug!(candidate_id, slot_id = %slot.id, "Previous slot was not held"),
            Err(e) => warn!(candidate_id, slot_id = %slot.id, error = %e, "Failed to release slot"),
        }
    }

    /// Where the candidate stands and what they should do next.
    pub async fn check_queue_status(&self, candidate_id: &str) -> Result<QueueStatus, FlowError> {
        let profile = self.store.get_candidate_profile(candidate_id).await?;
        let booked_slot = self.booked_slot(candidate_id).await;

        let status = profile.as_ref().map(|p| p.status).unwrap_or_default();
        let days_waiting = profile
            .as_ref()
            .and_then(|p| p.pending_since)
            .map(|since| (Utc::now() - since).num_days().max(0));

        let next_step = match (&booked_slot, status) {
            (Some(_), _) => NextStep::AttendInterview,
            (None, CandidateStatus::Pending) => NextStep::ScheduleInterview,
            (None, CandidateStatus::Active) => NextStep::BrowseJobs,
            (None, CandidateStatus::Suspended | CandidateStatus::Inactive) => {
                NextStep::ContactSupport
            }
            (None, CandidateStatus::Unknown) => NextStep::AwaitReview,
        };

        Ok(QueueStatus {
            status,
            days_waiting,
            booked_slot,
            next_step,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CandidateProfile, InMemoryStore};
    use chrono::Duration;

    fn slot(id: &str, hours_ahead: i64) -> InterviewSlot {
        InterviewSlot {
            id: id.into(),
            starts_at: Utc::now() + Duration::hours(hours_ahead),
            duration_minutes: 30,
            meeting_link: format!("https://meet.example.com/{id}"),
        }
    }

    async fn manager_with_slots(ids: &[(&str, i64)]) -> (Arc<InMemoryStore>, ConversationFlowManager) {
        let store = Arc::new(InMemoryStore::new());
        for (id, hours) in ids {
            store.add_slot(slot(id, *hours)).await;
        }
        let offset = FixedOffset::east_opt(0).unwrap();
        let manager = ConversationFlowManager::new(store.clone(), offset, 14);
        (store, manager)
    }

    #[tokio::test]
    async fn full_booking_flow() {
        let (_store, manager) = manager_with_slots(&[("a", 30), ("b", 50)]).await;

        let out = manager.handle_message("c-1", "can I book an interview").await.unwrap();
        assert_eq!(out, Some(FlowOutcome::AskAvailability));
        assert_eq!(manager.current_state("c-1").await, FlowState::CollectingAvailability);

        let out = manager.handle_message("c-1", "anytime is fine").await.unwrap();
        match out {
            Some(FlowOutcome::SlotsOffered(slots)) => assert_eq!(slots.len(), 2),
            other => panic!("expected offer, got {other:?}"),
        }

        let out = manager.handle_message("c-1", "2").await.unwrap();
        assert!(matches!(out, Some(FlowOutcome::ConfirmSlot(ref s)) if s.id == "b"));

        let out = manager.handle_message("c-1", "yes").await.unwrap();
        assert!(matches!(out, Some(FlowOutcome::Booked(ref s)) if s.id == "b"));
        assert_eq!(manager.current_state("c-1").await, FlowState::Scheduled);
    }

    #[tokio::test]
    async fn no_signal_outside_flow() {
        let (_store, manager) = manager_with_slots(&[]).await;
        assert_eq!(manager.handle_message("c-1", "hello").await.unwrap(), None);
        assert_eq!(manager.current_state("c-1").await, FlowState::InitialEngagement);
    }

    #[tokio::test]
    async fn matching_slots_are_capped_and_sorted() {
        let (_store, manager) = manager_with_slots(&[
            ("f", 60),
            ("a", 2),
            ("e", 50),
            ("c", 20),
            ("b", 10),
            ("d", 40),
            ("past", -3),
        ])
        .await;
        let slots = manager
            .find_matching_slots(&SlotPreferences::any(), 14)
            .await
            .unwrap();
        let ids: Vec<&str> = slots.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn rebooking_same_slot_skips_store() {
        let (store, manager) = manager_with_slots(&[("a", 30)]).await;
        let s = slot("a", 30);
        let first = manager.book_slot("c-1", &s).await.unwrap();
        assert!(matches!(first, BookingOutcome::Booked(_)));
        let second = manager.book_slot("c-1", &s).await.unwrap();
        assert!(matches!(second, BookingOutcome::AlreadyBooked(_)));
        assert_eq!(store.book_calls(), 1);
    }

    #[tokio::test]
    async fn conflict_offers_alternatives() {
        let (store, manager) = manager_with_slots(&[("a", 30), ("b", 50)]).await;
        manager.handle_message("c-1", "book interview anytime").await.unwrap();
        manager.handle_message("c-1", "1").await.unwrap();

        // Someone else grabs slot "a" before the candidate confirms.
        store.book_slot("other", &slot("a", 30)).await.unwrap();

        let out = manager.handle_message("c-1", "yes").await.unwrap();
        match out {
            Some(FlowOutcome::Conflict { alternatives }) => {
                assert_eq!(alternatives.len(), 1);
                assert_eq!(alternatives[0].id, "b");
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(manager.current_state("c-1").await, FlowState::OfferingSlots);
    }

    #[tokio::test]
    async fn decline_resets_flow() {
        let (_store, manager) = manager_with_slots(&[("a", 30)]).await;
        manager.handle_message("c-1", "schedule interview").await.unwrap();
        let out = manager.handle_message("c-1", "never mind").await.unwrap();
        assert_eq!(out, Some(FlowOutcome::Declined));
        assert_eq!(manager.current_state("c-1").await, FlowState::InitialEngagement);
    }

    #[tokio::test]
    async fn invalid_pick_keeps_offer() {
        let (_store, manager) = manager_with_slots(&[("a", 30)]).await;
        manager.handle_message("c-1", "book interview anytime").await.unwrap();
        let out = manager.handle_message("c-1", "4").await.unwrap();
        assert!(matches!(out, Some(FlowOutcome::InvalidPick { ref offered }) if offered.len() == 1));
        assert_eq!(manager.current_state("c-1").await, FlowState::OfferingSlots);
    }

    #[tokio::test]
    async fn no_slots_stays_collecting() {
        let (_store, manager) = manager_with_slots(&[]).await;
        manager.handle_message("c-1", "schedule interview").await.unwrap();
        let out = manager.handle_message("c-1", "monday morning").await.unwrap();
        assert_eq!(out, Some(FlowOutcome::NoSlots));
        assert_eq!(manager.current_state("c-1").await, FlowState::CollectingAvailability);
    }

    #[tokio::test]
    async fn queue_status_for_pending_candidate() {
        let (store, manager) = manager_with_slots(&[("a", 30)]).await;
        store
            .add_candidate(
                CandidateProfile::new("c-1", CandidateStatus::Pending)
                    .pending_since(Utc::now() - Duration::days(4)),
            )
            .await;

        let status = manager.check_queue_status("c-1").await.unwrap();
        assert_eq!(status.status, CandidateStatus::Pending);
        assert_eq!(status.days_waiting, Some(4));
        assert_eq!(status.next_step, NextStep::ScheduleInterview);

        manager.book_slot("c-1", &slot("a", 30)).await.unwrap();
        let status = manager.check_queue_status("c-1").await.unwrap();
        assert_eq!(status.next_step, NextStep::AttendInterview);
        assert!(status.booked_slot.is_some());
    }

    #[tokio::test]
    async fn rescheduling_releases_the_old_slot() {
        let (store, manager) = manager_with_slots(&[("a", 30), ("b", 50)]).await;
        manager.handle_message("c-1", "book interview anytime").await.unwrap();
        manager.handle_message("c-1", "1").await.unwrap();
        manager.handle_message("c-1", "yes").await.unwrap();
        assert_eq!(manager.booked_slot("c-1").await.unwrap().id, "a");

        let out = manager.handle_message("c-1", "I need to reschedule").await.unwrap();
        assert_eq!(out, Some(FlowOutcome::AskAvailability));
        manager.handle_message("c-1", "anytime is fine").await.unwrap();
        let out = manager.handle_message("c-1", "1").await.unwrap();
        assert!(matches!(out, Some(FlowOutcome::ConfirmSlot(ref s)) if s.id == "b"));
        let out = manager.handle_message("c-1", "yes").await.unwrap();
        assert!(matches!(out, Some(FlowOutcome::Booked(ref s)) if s.id == "b"));

        let open = manager
            .find_matching_slots(&SlotPreferences::any(), 14)
            .await
            .unwrap();
        let ids: Vec<&str> = open.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
        assert_eq!(store.book_slot("c-2", &slot("a", 30)).await.unwrap(), BookingResult::Success);
    }

    #[tokio::test]
    async fn saying_no_returns_to_the_offer() {
        let (_store, manager) = manager_with_slots(&[("a", 30), ("b", 50)]).await;
        manager.handle_message("c-1", "book interview anytime").await.unwrap();
        manager.handle_message("c-1", "1").await.unwrap();

        let out = manager.handle_message("c-1", "no").await.unwrap();
        match out {
            Some(FlowOutcome::SlotsOffered(slots)) => {
                assert_eq!(slots.len(), 1);
                assert_eq!(slots[0].id, "b");
            }
            other => panic!("expected the remaining offer, got {other:?}"),
        }
        assert_eq!(manager.current_state("c-1").await, FlowState::OfferingSlots);
    }

    #[tokio::test]
    async fn finished_flows_keep_no_session() {
        let (_store, manager) = manager_with_slots(&[("a", 30)]).await;
        manager.handle_message("c-1", "schedule interview").await.unwrap();
        assert!(manager.session("c-1").await.is_some());
        manager.handle_message("c-1", "never mind").await.unwrap();
        assert!(manager.session("c-1").await.is_none());

        manager.handle_message("c-2", "book interview anytime").await.unwrap();
        manager.handle_message("c-2", "1").await.unwrap();
        manager.handle_message("c-2", "yes").await.unwrap();
        assert!(manager.session("c-2").await.is_none());
        assert_eq!(manager.current_state("c-2").await, FlowState::Scheduled);
        assert!(manager.sessions.read().await.is_empty());
    }

    #[tokio::test]
    async fn abandoned_sessions_are_dropped() {
        let (_store, manager) = manager_with_slots(&[("a", 30)]).await;
        manager.sessions.write().await.insert(
            "ghost".into(),
            FlowSession {
                state: FlowState::CollectingAvailability,
                updated_at: Some(Utc::now() - Duration::hours(SESSION_IDLE_HOURS + 1)),
                ..FlowSession::default()
            },
        );

        manager.handle_message("c-1", "schedule interview").await.unwrap();
        let sessions = manager.sessions.read().await;
        assert!(!sessions.contains_key("ghost"));
        assert!(sessions.contains_key("c-1"));
    }
}
