//! Periodic overdue-escalation sweep.
//!
//! Every tick, open escalations past their response target get a reminder
//! event for operators, at most once per `min_interval` per escalation.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::escalation::router::log_delivery;
use crate::notify::{AdminEvent, Notifier};
use crate::store::CandidateStore;

const MIN_TICK: Duration = Duration::from_secs(1);

pub struct OverdueSweep {
    store: Arc<dyn CandidateStore>,
    notifier: Arc<dyn Notifier>,
    min_interval: chrono::Duration,
}

impl OverdueSweep {
    pub fn new(
        store: Arc<dyn CandidateStore>,
        notifier: Arc<dyn Notifier>,
        min_interval: Duration,
    ) -> Self {
        let min_interval =
            chrono::Duration::from_std(min_interval).unwrap_or(chrono::Duration::minutes(15));
        Self {
            store,
            notifier,
            min_interval,
        }
    }

    /// Send reminders for every overdue escalation that is due one.
    /// Returns how many reminders went out.
    pub async fn sweep_overdue(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let open = self.store.list_open_escalations().await?;
        let mut sent = 0;
        for record in open.into_iter().filter(|r| r.reminder_due(now, self.min_interval)) {
            if let Err(e) = self.store.mark_reminder_sent(record.id, now).await {
                warn!(escalation_id = %record.id, error = %e, "Failed to mark reminder sent");
                continue;
            }
            let overdue_minutes = (now - record.response_target_time).num_minutes();
            info!(
                escalation_id = %record.id,
                priority = %record.priority,
                overdue_minutes,
                "Escalation overdue, reminding operators"
            );
            let id = record.id;
            let mut escalation = record;
            escalation.last_reminder_sent_at = Some(now);
            escalation.reminder_count += 1;
            let event = AdminEvent::EscalationReminder {
                escalation,
                overdue_minutes,
            };
            log_delivery("admins", id, self.notifier.broadcast_to_admins(&event).await);
            sent += 1;
        }
        Ok(sent)
    }

    /// Run the sweep on a fixed interval until the task is aborted.
    /// Intervals shorter than a second are raised to one.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let interval = interval.max(MIN_TICK);
        tokio::spawn(async move {
            info!("Overdue sweep started (interval: {}s)", interval.as_secs());
            let mut tick = tokio::time::interval(interval);
            loop {
                tick.tick().await;
                match self.sweep_overdue(Utc::now()).await {
                    Ok(0) => {}
                    Ok(sent) => debug!(sent, "Overdue sweep sent reminders"),
                    Err(e) => warn!(error = %e, "Overdue sweep failed"),
                }
            }
        })
    }
}
