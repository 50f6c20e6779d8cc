//! Context enrichment: a per-request snapshot of what we know about the candidate.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Timelike, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::flow::FlowState;
use crate::pipeline::patterns::is_trouble_message;
use crate::pipeline::types::{CandidateStatus, TimeOfDay};
use crate::store::CandidateStore;

/// Lookback window for issue counting.
const ISSUE_WINDOW_DAYS: u32 = 7;

/// Business hours, start inclusive and end exclusive.
pub const BUSINESS_HOURS: std::ops::Range<u32> = 9..18;

/// Ephemeral view of a candidate, rebuilt for every message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextSnapshot {
    pub candidate_id: String,
    pub status: CandidateStatus,
    /// Messages in the last 24 hours.
    pub message_count_recent: usize,
    /// Messages in the last 7 days that reported a problem.
    pub recent_issue_count: usize,
    pub is_first_message: bool,
    pub conversation_flow: FlowState,
    pub time_of_day: TimeOfDay,
    pub days_since_pending: Option<i64>,
    pub first_name: Option<String>,
    pub has_completed_jobs: bool,
    pub is_off_hours: bool,
    /// Built from defaults because the store could not be read.
    pub degraded: bool,
}

impl ContextSnapshot {
    /// Snapshot used when nothing could be read about the candidate.
    pub fn fallback(
        candidate_id: &str,
        flow: FlowState,
        local_now: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            candidate_id: candidate_id.to_string(),
            status: CandidateStatus::Unknown,
            message_count_recent: 0,
            recent_issue_count: 0,
            is_first_message: true,
            conversation_flow: flow,
            time_of_day: TimeOfDay::of(&local_now),
            days_since_pending: None,
            first_name: None,
            has_completed_jobs: false,
            is_off_hours: !BUSINESS_HOURS.contains(&local_now.hour()),
            degraded: true,
        }
    }
}

/// Builds `ContextSnapshot`s from the candidate store.
pub struct ContextEnricher {
    store: Arc<dyn CandidateStore>,
    business_offset: FixedOffset,
}

impl ContextEnricher {
    pub fn new(store: Arc<dyn CandidateStore>, business_offset: FixedOffset) -> Self {
        Self {
            store,
            business_offset,
        }
    }

    pub async fn enrich(&self, candidate_id: &str, flow: FlowState) -> ContextSnapshot {
        self.enrich_at(candidate_id, flow, Utc::now()).await
    }

    /// Same as `enrich`, with an explicit clock. Never fails: read errors
    /// and unknown candidates produce a degraded default snapshot.
    pub async fn enrich_at(
        &self,
        candidate_id: &str,
        flow: FlowState,
        now: DateTime<Utc>,
    ) -> ContextSnapshot {
        match self.try_enrich(candidate_id, flow, now).await {
            Ok(snapshot) => {
                debug!(
                    candidate_id,
                    status = %snapshot.status,
                    recent = snapshot.message_count_recent,
                    issues = snapshot.recent_issue_count,
                    "Context enriched"
                );
                snapshot
            }
            Err(e) => {
                warn!(candidate_id, error = %e, "Context unavailable, using defaults");
                ContextSnapshot::fallback(
                    candidate_id,
                    flow,
                    now.with_timezone(&self.business_offset),
                )
            }
        }
    }

    async fn try_enrich(
        &self,
        candidate_id: &str,
        flow: FlowState,
        now: DateTime<Utc>,
    ) -> Result<ContextSnapshot, PipelineError> {
        let profile = self
            .store
            .get_candidate_profile(candidate_id)
            .await?
            .ok_or_else(|| PipelineError::DataUnavailable(format!("no profile for {candidate_id}")))?;
        let stats = self
            .store
            .get_recent_message_stats(candidate_id, ISSUE_WINDOW_DAYS)
            .await?;

        let message_count_recent = stats.since(now - Duration::hours(24)).count();
        let recent_issue_count = stats
            .since(now - Duration::days(i64::from(ISSUE_WINDOW_DAYS)))
            .filter(|m| is_trouble_message(&m.text))
            .count();
        let days_since_pending = match profile.status {
            CandidateStatus::Pending => profile
                .pending_since
                .map(|since| (now - since).num_days().max(0)),
            _ => None,
        };
        let local_now = now.with_timezone(&self.business_offset);

        Ok(ContextSnapshot {
            candidate_id: candidate_id.to_string(),
            status: profile.status,
            message_count_recent,
            recent_issue_count,
            is_first_message: message_count_recent <= 1,
            conversation_flow: flow,
            time_of_day: TimeOfDay::of(&local_now),
            days_since_pending,
            first_name: profile.first_name,
            has_completed_jobs: profile.has_completed_jobs,
            is_off_hours: !BUSINESS_HOURS.contains(&local_now.hour()),
            degraded: false,
        })
    }
}
