//! Message router: the single entry point for inbound candidate messages.
//!
//! Flow:
//! 1. Context enrichment (never fails; degrades to defaults)
//! 2. Intent classification
//! 3. Cache lookup
//! 4. Local template / scheduling-flow draft, validated
//! 5. Generative fallback when the draft is missing, weak or rejected
//! 6. Escalation to a human when the reply still needs one
//! 7. Cache store
//!
//! Every fault, panics included, is caught here and turned into a polite
//! escalation acknowledgement. Callers never see an error.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::config::RouterConfig;
use crate::error::PipelineError;
use crate::escalation::{EscalationReason, EscalationRouter, reasons_for_intent};
use crate::flow::{ConversationFlowManager, FlowState};
use crate::llm::{FallbackOutcome, GenerativeFailure, GenerativeFallback, LlmProvider};
use crate::notify::Notifier;
use crate::pipeline::cache::{ResponseCache, cache_key, is_cacheable};
use crate::pipeline::classifier::{IntentClassifier, general_help};
use crate::pipeline::context::{ContextEnricher, ContextSnapshot};
use crate::pipeline::types::{
    BestMatch, CallerContext, CandidateResponse, Channel, InboundMessage, IntentCategory,
    MessageType, ResponseSource,
};
use crate::responses::ResponseGenerator;
use crate::safety::ResponseValidator;
use crate::store::CandidateStore;

/// Shown when even the escalation record could not be written.
const FAULT_TEXT: &str =
    "Sorry, something went wrong on our side. A member of our team will follow up with you.";

pub struct MessageRouter {
    enricher: ContextEnricher,
    classifier: IntentClassifier,
    cache: Arc<ResponseCache>,
    flow: Arc<ConversationFlowManager>,
    generator: ResponseGenerator,
    validator: Arc<ResponseValidator>,
    fallback: GenerativeFallback,
    escalations: Arc<EscalationRouter>,
    threshold: f32,
    business_offset: chrono::FixedOffset,
}

impl MessageRouter {
    /// Wire up every stage from configuration. `llm` is `None` when no
    /// model is configured; the generative fallback then always escalates.
    pub fn new(
        config: &RouterConfig,
        store: Arc<dyn CandidateStore>,
        notifier: Arc<dyn Notifier>,
        llm: Option<Arc<dyn LlmProvider>>,
    ) -> Self {
        let offset = config.business_offset();
        let validator = Arc::new(ResponseValidator::new());
        let flow = Arc::new(ConversationFlowManager::new(
            store.clone(),
            offset,
            config.slot_horizon_days,
        ));
        Self {
            enricher: ContextEnricher::new(store.clone(), offset),
            classifier: IntentClassifier::default(),
            cache: Arc::new(ResponseCache::new(config.cache_capacity, config.cache_ttl)),
            generator: ResponseGenerator::new(flow.clone(), offset, config.template_seed),
            flow,
            fallback: GenerativeFallback::new(llm, config.retry_policy(), validator.clone()),
            escalations: Arc::new(EscalationRouter::new(store, notifier, validator.clone())),
            validator,
            threshold: config.fallback_threshold,
            business_offset: offset,
        }
    }

    /// Share a cache created elsewhere.
    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn escalations(&self) -> &Arc<EscalationRouter> {
        &self.escalations
    }

    /// Route one message and return the reply to send. Never fails.
    pub async fn process_message(
        &self,
        candidate_id: &str,
        text: &str,
        channel: Channel,
        caller: CallerContext,
    ) -> CandidateResponse {
        let message = InboundMessage::new(candidate_id, text, channel);
        let started = Instant::now();

        let result = AssertUnwindSafe(self.route(&message, &caller))
            .catch_unwind()
            .await;
        let response = match result {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                error!(candidate_id = %message.candidate_id, error = %e, "Pipeline fault");
                self.fault_response(&message).await
            }
            Err(panic) => {
                error!(
                    candidate_id = %message.candidate_id,
                    panic = %panic_message(panic.as_ref()),
                    "Pipeline panicked"
                );
                self.fault_response(&message).await
            }
        };

        info!(
            candidate_id = %message.candidate_id,
            channel = %message.channel,
            intent = %response.intent,
            confidence = response.confidence,
            source = ?response.source,
            escalate = response.escalate,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Message routed"
        );
        response
    }

    async fn route(
        &self,
        message: &InboundMessage,
        caller: &CallerContext,
    ) -> Result<CandidateResponse, PipelineError> {
        let flow_state = self.flow.current_state(&message.candidate_id).await;
        let ctx = self.enricher.enrich(&message.candidate_id, flow_state).await;
        let best = self.classifier.classify(&message.text, &ctx);
        debug!(
            candidate_id = %message.candidate_id,
            intent = %best.intent,
            confidence = best.confidence,
            flow = flow_state.as_str(),
            "Classified"
        );

        let key = cache_key(
            &message.candidate_id,
            &message.text,
            ctx.status,
            flow_state,
            message.channel,
        );
        if !caller.urgent {
            if let Some(mut hit) = self.cache.get(&key).await {
                debug!(candidate_id = %message.candidate_id, "Cache hit");
                hit.source = ResponseSource::Cache;
                return Ok(hit);
            }
        }

        let mut reasons = reasons_for_intent(best.intent, &message.text);
        if caller.urgent {
            reasons.push(EscalationReason::UrgentRequest);
        }

        let (mut response, flow_reply) = match self.local_draft(message, &best, &ctx).await {
            LocalDraft::Accepted {
                response,
                flow_reply,
            } => (response, flow_reply),
            LocalDraft::Rejected => {
                reasons.push(EscalationReason::ValidationFailed);
                (self.generative(message, &best, &ctx, caller, &mut reasons).await, false)
            }
            LocalDraft::Skipped => {
                if best.confidence < self.threshold {
                    reasons.push(EscalationReason::LowConfidence);
                }
                (self.generative(message, &best, &ctx, caller, &mut reasons).await, false)
            }
        };

        let needs_human = reasons
            .iter()
            .any(|r| matches!(r, EscalationReason::Complaint | EscalationReason::UrgentRequest));
        if response.escalate || needs_human {
            response = self
                .escalate(&ctx, message, &best, &reasons, caller.urgent, response)
                .await?;
        }

        if is_cacheable(&response, flow_reply) {
            self.cache.insert(key, response.clone()).await;
        }
        Ok(response)
    }

    /// Template or flow reply, if the message qualifies for one and it
    /// passes validation.
    async fn local_draft(
        &self,
        message: &InboundMessage,
        best: &BestMatch,
        ctx: &ContextSnapshot,
    ) -> LocalDraft {
        let in_flow = ctx.conversation_flow.is_active();
        // Holding replies go out whatever the confidence; a human follows up.
        let confident = best.confidence >= self.threshold || needs_holding_reply(best.intent);
        if !in_flow && !(ResponseGenerator::handles(best.intent) && confident) {
            return LocalDraft::Skipped;
        }

        let draft = match self.generator.generate(message, best, ctx).await {
            Ok(Some(draft)) => draft,
            Ok(None) => return LocalDraft::Skipped,
            Err(e) => {
                warn!(candidate_id = %message.candidate_id, error = %e, "Local draft failed");
                return LocalDraft::Skipped;
            }
        };
        if !draft.flow_reply && !confident {
            return LocalDraft::Skipped;
        }

        let validation = self.validator.validate(&draft.response);
        if !validation.is_valid {
            warn!(
                candidate_id = %message.candidate_id,
                family = draft.family,
                gates = ?validation.failed_gates(),
                "Local draft rejected"
            );
            return LocalDraft::Rejected;
        }
        LocalDraft::Accepted {
            response: draft.response,
            flow_reply: draft.flow_reply,
        }
    }

    async fn generative(
        &self,
        message: &InboundMessage,
        best: &BestMatch,
        ctx: &ContextSnapshot,
        caller: &CallerContext,
        reasons: &mut Vec<EscalationReason>,
    ) -> CandidateResponse {
        match self
            .fallback
            .generate(message, best, ctx, &caller.history)
            .await
        {
            FallbackOutcome::Generated(response) => response,
            FallbackOutcome::Failed { response, failure } => {
                reasons.push(match failure {
                    GenerativeFailure::Rejected { .. } => EscalationReason::ValidationFailed,
                    _ => EscalationReason::GenerativeUnavailable,
                });
                response
            }
        }
    }

    /// Record an escalation and turn `draft` into the acknowledgement.
    ///
    /// A holding template keeps its own wording with the response-time
    /// estimate appended; anything else is replaced by the category
    /// acknowledgement.
    async fn escalate(
        &self,
        ctx: &ContextSnapshot,
        message: &InboundMessage,
        best: &BestMatch,
        reasons: &[EscalationReason],
        urgent: bool,
        draft: CandidateResponse,
    ) -> Result<CandidateResponse, PipelineError> {
        let is_holding = draft.source == ResponseSource::Internal && draft.escalate;
        let created = if is_holding {
            self.escalations
                .create_holding_escalation(ctx, message, best, reasons, urgent, &draft.content)
                .await
        } else {
            self.escalations
                .create_escalation(ctx, message, best, reasons, urgent)
                .await
        };
        let outcome = created.map_err(PipelineError::EscalationNotRecorded)?;

        if !is_holding {
            return Ok(outcome.acknowledgement);
        }
        // Same words the candidate was notified with; keep the template's actions.
        let mut holding = draft;
        holding.content = outcome.acknowledgement.content;
        holding.message_type = MessageType::Escalation;
        holding.escalation_id = Some(outcome.record.id);
        Ok(holding)
    }

    /// Generic escalation after a fault. Recording is best effort; when even
    /// that fails the candidate gets the fault text.
    async fn fault_response(&self, message: &InboundMessage) -> CandidateResponse {
        let best = general_help(0.0, "pipeline fault");
        let local_now = Utc::now().with_timezone(&self.business_offset);
        let ctx = ContextSnapshot::fallback(
            &message.candidate_id,
            FlowState::InitialEngagement,
            local_now,
        );
        let attempt = AssertUnwindSafe(self.escalations.create_escalation(
            &ctx,
            message,
            &best,
            &[EscalationReason::PipelineFault],
            false,
        ))
        .catch_unwind()
        .await;
        match attempt {
            Ok(Ok(outcome)) => outcome.acknowledgement,
            Ok(Err(e)) => {
                error!(candidate_id = %message.candidate_id, error = %e, "Fault escalation could not be recorded");
                fault_text_response(&best)
            }
            Err(_) => fault_text_response(&best),
        }
    }
}

enum LocalDraft {
    Accepted {
        response: CandidateResponse,
        flow_reply: bool,
    },
    /// Drafted, but the validator refused it.
    Rejected,
    /// No local reply applies.
    Skipped,
}

fn needs_holding_reply(intent: IntentCategory) -> bool {
    matches!(intent, IntentCategory::UrgentEscalation | IntentCategory::Complaint)
}

fn fault_text_response(best: &BestMatch) -> CandidateResponse {
    CandidateResponse::text(FAULT_TEXT, best.intent, 0.0, ResponseSource::Escalation)
        .with_message_type(MessageType::Escalation)
        .escalating()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
