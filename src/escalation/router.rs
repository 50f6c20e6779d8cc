//! Escalation router: categorize, prioritize, persist, acknowledge, notify.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{NotifyError, StoreError};
use crate::escalation::model::{
    EscalationCategory, EscalationPriority, EscalationReason, EscalationRecord, EscalationStatus,
};
use crate::notify::{AdminEvent, CandidateEvent, Notifier};
use crate::pipeline::context::ContextSnapshot;
use crate::pipeline::patterns::is_data_request;
use crate::pipeline::types::{
    BestMatch, CandidateResponse, CandidateStatus, InboundMessage, IntentCategory, MessageType,
    ResponseSource,
};
use crate::safety::ResponseValidator;
use crate::store::CandidateStore;

/// Longest message excerpt kept on a record.
pub const EXCERPT_CHARS: usize = 200;

const GENERIC_ACK: &str =
    "Thanks for your message. A member of our team will follow up with you soon.";

/// A created escalation and the acknowledgement to send the candidate.
#[derive(Debug, Clone)]
pub struct EscalationOutcome {
    pub record: EscalationRecord,
    pub acknowledgement: CandidateResponse,
}

/// Reasons implied by what the candidate asked about.
pub fn reasons_for_intent(intent: IntentCategory, text: &str) -> Vec<EscalationReason> {
    let mut reasons = Vec::new();
    match intent {
        IntentCategory::UrgentEscalation => reasons.push(EscalationReason::UrgentRequest),
        IntentCategory::Complaint => reasons.push(EscalationReason::Complaint),
        IntentCategory::PaymentInquiry => reasons.push(EscalationReason::Payment),
        IntentCategory::TechnicalSupport => reasons.push(EscalationReason::Technical),
        _ => {}
    }
    if is_data_request(text) {
        reasons.push(EscalationReason::DataRequest);
    }
    reasons
}

/// Most specific category the reasons point at.
pub fn infer_category(reasons: &[EscalationReason]) -> EscalationCategory {
    let has = |r: EscalationReason| reasons.contains(&r);
    if has(EscalationReason::Complaint) {
        EscalationCategory::Complaint
    } else if has(EscalationReason::Payment) {
        EscalationCategory::Payment
    } else if has(EscalationReason::Technical) {
        EscalationCategory::Technical
    } else if has(EscalationReason::DataRequest) {
        EscalationCategory::DataRequest
    } else if has(EscalationReason::LowConfidence)
        || has(EscalationReason::ValidationFailed)
        || has(EscalationReason::GenerativeUnavailable)
    {
        EscalationCategory::LowConfidence
    } else {
        EscalationCategory::General
    }
}

pub fn status_priority(status: CandidateStatus) -> EscalationPriority {
    match status {
        CandidateStatus::Suspended => EscalationPriority::Urgent,
        CandidateStatus::Pending | CandidateStatus::Unknown => EscalationPriority::Medium,
        CandidateStatus::Active | CandidateStatus::Inactive => EscalationPriority::Low,
    }
}

/// Max of category, intent, status and the explicit urgency flag. Never
/// lower than any input.
pub fn final_priority(
    category: EscalationCategory,
    best: &BestMatch,
    status: CandidateStatus,
    urgent: bool,
) -> EscalationPriority {
    let explicit = if urgent {
        EscalationPriority::Urgent
    } else {
        EscalationPriority::Low
    };
    [
        category.route().base_priority,
        EscalationPriority::from(best.priority),
        status_priority(status),
        explicit,
    ]
    .into_iter()
    .max()
    .unwrap_or(EscalationPriority::Low)
}

/// Acknowledgement text for a category, with the response-time estimate.
pub fn acknowledgement_text(category: EscalationCategory, priority: EscalationPriority) -> String {
    let lead = match category {
        EscalationCategory::Technical => {
            "Sorry about the technical trouble. A member of our support team will look into it."
        }
        EscalationCategory::Payment => {
            "Thanks for flagging this payment question. A member of our finance team will review it."
        }
        EscalationCategory::Complaint => {
            "We are sorry about your experience. Someone from our customer success team will follow up personally."
        }
        EscalationCategory::DataRequest => {
            "Thanks for your request about your data. Our compliance team will handle it."
        }
        EscalationCategory::LowConfidence => {
            "Thanks for your message. A member of our team will get back to you on this."
        }
        EscalationCategory::General => {
            "Thanks for reaching out. A member of our team will follow up with you."
        }
    };
    format!("{lead} Expected response time: about {}.", priority.human_eta())
}

pub struct EscalationRouter {
    store: Arc<dyn CandidateStore>,
    notifier: Arc<dyn Notifier>,
    validator: Arc<ResponseValidator>,
}

impl EscalationRouter {
    pub fn new(
        store: Arc<dyn CandidateStore>,
        notifier: Arc<dyn Notifier>,
        validator: Arc<ResponseValidator>,
    ) -> Self {
        Self {
            store,
            notifier,
            validator,
        }
    }

    /// Record an escalation and notify admins and the candidate.
    ///
    /// Fails only when the record cannot be stored. Notification failures are
    /// logged and leave the record in place.
    pub async fn create_escalation(
        &self,
        ctx: &ContextSnapshot,
        message: &InboundMessage,
        best: &BestMatch,
        reasons: &[EscalationReason],
        urgent: bool,
    ) -> Result<EscalationOutcome, StoreError> {
        self.create_escalation_at(ctx, message, best, reasons, urgent, Utc::now())
            .await
    }

    /// Like [`create_escalation`](Self::create_escalation), but the candidate
    /// is acknowledged with `holding` (plus the response-time estimate) when
    /// that text passes validation.
    pub async fn create_holding_escalation(
        &self,
        ctx: &ContextSnapshot,
        message: &InboundMessage,
        best: &BestMatch,
        reasons: &[EscalationReason],
        urgent: bool,
        holding: &str,
    ) -> Result<EscalationOutcome, StoreError> {
        self.create(ctx, message, best, reasons, urgent, Some(holding), Utc::now())
            .await
    }

    pub async fn create_escalation_at(
        &self,
        ctx: &ContextSnapshot,
        message: &InboundMessage,
        best: &BestMatch,
        reasons: &[EscalationReason],
        urgent: bool,
        now: DateTime<Utc>,
    ) -> Result<EscalationOutcome, StoreError> {
        self.create(ctx, message, best, reasons, urgent, None, now).await
    }

    #[allow(clippy::too_many_arguments)]
    async fn create(
        &self,
        ctx: &ContextSnapshot,
        message: &InboundMessage,
        best: &BestMatch,
        reasons: &[EscalationReason],
        urgent: bool,
        holding: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<EscalationOutcome, StoreError> {
        let category = infer_category(reasons);
        let route = category.route();
        let urgent = urgent
            || (ctx.is_off_hours && best.intent == IntentCategory::UrgentEscalation);
        let priority = final_priority(category, best, ctx.status, urgent);

        let mut unique = Vec::with_capacity(reasons.len());
        for reason in reasons {
            if !unique.contains(reason) {
                unique.push(*reason);
            }
        }
        let record = EscalationRecord {
            id: Uuid::new_v4(),
            candidate_id: message.candidate_id.clone(),
            priority,
            category,
            department: route.department,
            requires_specialist: route.requires_specialist,
            reasons: unique,
            message_excerpt: message.excerpt(EXCERPT_CHARS),
            created_at: now,
            response_target_time: now + priority.sla(),
            status: EscalationStatus::Open,
            last_reminder_sent_at: None,
            reminder_count: 0,
            resolved_at: None,
        };
        self.store.record_escalation(&record).await?;
        info!(
            escalation_id = %record.id,
            candidate_id = %record.candidate_id,
            priority = %record.priority,
            category = record.category.as_str(),
            department = record.department.as_str(),
            "Escalation created"
        );

        let acknowledgement = self.acknowledgement(&record, best, holding);
        self.notify_created(&record, &acknowledgement).await;

        Ok(EscalationOutcome {
            record,
            acknowledgement,
        })
    }

    fn acknowledgement(
        &self,
        record: &EscalationRecord,
        best: &BestMatch,
        holding: Option<&str>,
    ) -> CandidateResponse {
        let build = |text: String| {
            let mut response = CandidateResponse::text(
                text,
                best.intent,
                best.confidence.clamp(0.0, 1.0),
                ResponseSource::Escalation,
            )
            .with_message_type(MessageType::Escalation)
            .escalating();
            response.escalation_id = Some(record.id);
            response
        };

        if let Some(holding) = holding {
            let response = build(format!(
                "{} Expected response time: about {}.",
                holding.trim_end(),
                record.priority.human_eta()
            ));
            if self.validator.is_valid(&response) {
                return response;
            }
        }

        let response = build(acknowledgement_text(record.category, record.priority));
        let validation = self.validator.validate(&response);
        if validation.is_valid {
            return response;
        }
        warn!(gates = ?validation.failed_gates(), "Acknowledgement rejected, using generic text");
        build(format!(
            "{GENERIC_ACK} Expected response time: about {}.",
            record.priority.human_eta()
        ))
    }

    async fn notify_created(&self, record: &EscalationRecord, ack: &CandidateResponse) {
        let admin_event = AdminEvent::EscalationCreated {
            escalation: record.clone(),
        };
        let candidate_event = CandidateEvent::EscalationAcknowledged {
            escalation_id: record.id,
            message: ack.content.clone(),
            expected_response: record.priority.human_eta().to_string(),
        };
        let (admins, candidate) = futures::join!(
            self.notifier.broadcast_to_admins(&admin_event),
            self.notifier
                .broadcast_to_candidate(&record.candidate_id, &candidate_event),
        );
        log_delivery("admins", record.id, admins);
        log_delivery("candidate", record.id, candidate);
    }

    /// Mark an escalation resolved. `Ok(false)` when no such record exists.
    pub async fn resolve(&self, id: Uuid) -> Result<bool, StoreError> {
        let now = Utc::now();
        if !self.store.resolve_escalation(id, now).await? {
            return Ok(false);
        }
        info!(escalation_id = %id, "Escalation resolved");
        let event = AdminEvent::EscalationResolved {
            id,
            resolved_at: now,
        };
        log_delivery("admins", id, self.notifier.broadcast_to_admins(&event).await);
        Ok(true)
    }
}

pub(crate) fn log_delivery(sink: &str, id: Uuid, result: Result<(), NotifyError>) {
    match result {
        Ok(()) => {}
        Err(NotifyError::NoListeners { name }) => {
            debug!(escalation_id = %id, sink, listener = %name, "No listeners for escalation event");
        }
        Err(e) => warn!(escalation_id = %id, sink, error = %e, "Escalation notification failed"),
    }
}
