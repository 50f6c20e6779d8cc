//! Escalation notifications: admin events, candidate acknowledgements, and
//! the sinks that deliver them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::error::NotifyError;
use crate::escalation::EscalationRecord;

/// Events pushed to operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdminEvent {
    EscalationCreated {
        escalation: EscalationRecord,
    },
    EscalationReminder {
        escalation: EscalationRecord,
        overdue_minutes: i64,
    },
    EscalationResolved {
        id: Uuid,
        resolved_at: DateTime<Utc>,
    },
}

impl AdminEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EscalationCreated { .. } => "escalation_created",
            Self::EscalationReminder { .. } => "escalation_reminder",
            Self::EscalationResolved { .. } => "escalation_resolved",
        }
    }
}

/// Events pushed to a candidate's session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CandidateEvent {
    EscalationAcknowledged {
        escalation_id: Uuid,
        message: String,
        expected_response: String,
    },
}

/// Delivery of escalation events.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn broadcast_to_admins(&self, event: &AdminEvent) -> Result<(), NotifyError>;

    async fn broadcast_to_candidate(
        &self,
        candidate_id: &str,
        event: &CandidateEvent,
    ) -> Result<(), NotifyError>;
}

// ── In-process broadcast ────────────────────────────────────────────

/// Fans events out to in-process subscribers (the admin WebSocket).
#[derive(Clone)]
pub struct BroadcastNotifier {
    admin_tx: broadcast::Sender<AdminEvent>,
    candidate_tx: broadcast::Sender<(String, CandidateEvent)>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (admin_tx, _) = broadcast::channel(capacity.max(1));
        let (candidate_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            admin_tx,
            candidate_tx,
        }
    }

    pub fn subscribe_admin(&self) -> broadcast::Receiver<AdminEvent> {
        self.admin_tx.subscribe()
    }

    pub fn subscribe_candidates(&self) -> broadcast::Receiver<(String, CandidateEvent)> {
        self.candidate_tx.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn broadcast_to_admins(&self, event: &AdminEvent) -> Result<(), NotifyError> {
        self.admin_tx
            .send(event.clone())
            .map(|receivers| debug!(receivers, kind = event.kind(), "Admin event broadcast"))
            .map_err(|_| NotifyError::NoListeners {
                name: "admin".into(),
            })
    }

    async fn broadcast_to_candidate(
        &self,
        candidate_id: &str,
        event: &CandidateEvent,
    ) -> Result<(), NotifyError> {
        self.candidate_tx
            .send((candidate_id.to_string(), event.clone()))
            .map(|_| ())
            .map_err(|_| NotifyError::NoListeners {
                name: "candidate".into(),
            })
    }
}

// ── Webhook ─────────────────────────────────────────────────────────

/// POSTs admin events as JSON to an operator webhook.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub const TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(url: impl Into<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Self::TIMEOUT)
            .build()
            .map_err(|e| NotifyError::DeliveryFailed {
                name: "webhook".into(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn broadcast_to_admins(&self, event: &AdminEvent) -> Result<(), NotifyError> {
        let body = serde_json::to_value(event)?;
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::DeliveryFailed {
                name: "webhook".into(),
                reason: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(NotifyError::DeliveryFailed {
                name: "webhook".into(),
                reason: format!("HTTP {}", response.status()),
            });
        }
        debug!(kind = event.kind(), "Admin event posted to webhook");
        Ok(())
    }

    /// Candidates are not reachable through the operator webhook.
    async fn broadcast_to_candidate(
        &self,
        _candidate_id: &str,
        _event: &CandidateEvent,
    ) -> Result<(), NotifyError> {
        Ok(())
    }
}

// ── Fan-out ─────────────────────────────────────────────────────────

/// Delivers to every inner notifier concurrently. One sink failing does not
/// stop the others; the first error is reported.
pub struct FanoutNotifier {
    sinks: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new(sinks: Vec<Arc<dyn Notifier>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    async fn broadcast_to_admins(&self, event: &AdminEvent) -> Result<(), NotifyError> {
        let results =
            futures::future::join_all(self.sinks.iter().map(|s| s.broadcast_to_admins(event)))
                .await;
        results.into_iter().collect()
    }

    async fn broadcast_to_candidate(
        &self,
        candidate_id: &str,
        event: &CandidateEvent,
    ) -> Result<(), NotifyError> {
        let results = futures::future::join_all(
            self.sinks
                .iter()
                .map(|s| s.broadcast_to_candidate(candidate_id, event)),
        )
        .await;
        results.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, extract::State, routing::post};
    use tokio::net::TcpListener;
    use tokio::sync::Mutex;

    fn resolved() -> AdminEvent {
        AdminEvent::EscalationResolved {
            id: Uuid::new_v4(),
            resolved_at: Utc::now(),
        }
    }

    #[test]
    fn admin_events_are_tagged() {
        let json = serde_json::to_value(resolved()).unwrap();
        assert_eq!(json["type"], "escalation_resolved");
        assert_eq!(resolved().kind(), "escalation_resolved");
    }

    #[tokio::test]
    async fn broadcast_reaches_subscribers() {
        let notifier = BroadcastNotifier::default();
        let mut rx = notifier.subscribe_admin();
        notifier.broadcast_to_admins(&resolved()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().kind(), "escalation_resolved");
    }

    #[tokio::test]
    async fn broadcast_without_listeners_reports_it() {
        let notifier = BroadcastNotifier::default();
        let err = notifier.broadcast_to_admins(&resolved()).await.unwrap_err();
        assert!(matches!(err, NotifyError::NoListeners { .. }));
    }

    #[tokio::test]
    async fn webhook_posts_json() {
        let received: Arc<Mutex<Vec<serde_json::Value>>> = Arc::default();
        let app = Router::new()
            .route(
                "/hook",
                post(
                    |State(seen): State<Arc<Mutex<Vec<serde_json::Value>>>>,
                     Json(body): Json<serde_json::Value>| async move {
                        seen.lock().await.push(body);
                    },
                ),
            )
            .with_state(received.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let webhook = WebhookNotifier::new(format!("http://127.0.0.1:{port}/hook")).unwrap();
        webhook.broadcast_to_admins(&resolved()).await.unwrap();

        let seen = received.lock().await;
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["type"], "escalation_resolved");
    }

    #[tokio::test]
    async fn webhook_failure_is_an_error() {
        // Nothing listens on port 9 locally.
        let webhook = WebhookNotifier::new("http://127.0.0.1:9/hook").unwrap();
        let err = webhook.broadcast_to_admins(&resolved()).await.unwrap_err();
        assert!(matches!(err, NotifyError::DeliveryFailed { .. }));
    }

    #[tokio::test]
    async fn fanout_delivers_to_every_sink() {
        let a = BroadcastNotifier::default();
        let b = BroadcastNotifier::default();
        let mut rx_a = a.subscribe_admin();
        let mut rx_b = b.subscribe_admin();
        let fanout = FanoutNotifier::new(vec![Arc::new(a), Arc::new(b)]);
        fanout.broadcast_to_admins(&resolved()).await.unwrap();
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }
}
