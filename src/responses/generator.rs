//! Template-driven response generation.
//!
//! Picks a family from the dispatch table (or from the scheduling flow),
//! chooses a variant without repeating the last one this candidate saw,
//! fills placeholders and renders the text for the channel.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::FixedOffset;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::flow::{ConversationFlowManager, FlowOutcome, FlowState};
use crate::pipeline::context::ContextSnapshot;
use crate::pipeline::patterns::is_data_request;
use crate::pipeline::types::{
    BestMatch, CandidateResponse, CandidateStatus, ChannelStyle, InboundMessage, IntentCategory,
    MessageType, ResponseSource,
};
use crate::responses::actions;
use crate::responses::format::format_for_channel;
use crate::responses::templates::{TemplateFamily, select_family};
use crate::store::InterviewSlot;

/// Confidence reported on scheduling-flow replies.
pub const FLOW_CONFIDENCE: f32 = 0.9;

/// (candidate, family) pairs whose last variant is remembered.
const VARIANT_MEMORY: usize = 10_000;

/// A generated reply before validation.
#[derive(Debug, Clone)]
pub struct Draft {
    pub response: CandidateResponse,
    pub family: &'static str,
    /// Produced by the scheduling flow. Never cached.
    pub flow_reply: bool,
}

/// Placeholder values for one reply.
#[derive(Debug, Default)]
struct Fill {
    first_name: Option<String>,
    days_waiting: Option<i64>,
    slot: Option<InterviewSlot>,
    slot_list: Option<String>,
}

pub struct ResponseGenerator {
    flow: Arc<ConversationFlowManager>,
    business_offset: FixedOffset,
    rng: Mutex<StdRng>,
    last_variant: Mutex<RecentVariants>,
}

type VariantKey = (String, &'static str);

/// Last variant index served per (candidate, family), oldest entry evicted
/// first once full.
struct RecentVariants {
    capacity: usize,
    order: VecDeque<VariantKey>,
    last: HashMap<VariantKey, usize>,
}

impl RecentVariants {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            last: HashMap::new(),
        }
    }

    fn get(&self, key: &VariantKey) -> Option<usize> {
        self.last.get(key).copied()
    }

    fn insert(&mut self, key: VariantKey, index: usize) {
        if self.last.insert(key.clone(), index).is_some() {
            return;
        }
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.last.remove(&oldest);
            }
        }
    }

    fn len(&self) -> usize {
        self.last.len()
    }
}

impl ResponseGenerator {
    /// `seed` makes variant choice reproducible; `None` seeds from entropy.
    pub fn new(
        flow: Arc<ConversationFlowManager>,
        business_offset: FixedOffset,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            flow,
            business_offset,
            rng: Mutex::new(rng),
            last_variant: Mutex::new(RecentVariants::new(VARIANT_MEMORY)),
        }
    }

    /// Whether an intent has a local handler. General help does not.
    pub fn handles(intent: IntentCategory) -> bool {
        select_family(intent, CandidateStatus::Unknown).is_some()
    }

    /// Draft a reply. `Ok(None)` means there is no local handler and the
    /// caller should try the generative fallback.
    pub async fn generate(
        &self,
        message: &InboundMessage,
        best: &BestMatch,
        ctx: &ContextSnapshot,
    ) -> Result<Option<Draft>, PipelineError> {
        let style = message.channel.style();

        if let Some(outcome) = self.consult_flow(message, best, ctx).await? {
            return Ok(Some(self.render_flow(message, ctx, &outcome, style)));
        }

        let Some(mut family) = select_family(best.intent, ctx.status) else {
            debug!(candidate_id = %message.candidate_id, intent = %best.intent, "No local handler");
            return Ok(None);
        };
        if best.intent == IntentCategory::AccountManagement && is_data_request(&message.text) {
            family = TemplateFamily::DataRequestHolding;
        }

        let mut fill = Fill {
            first_name: ctx.first_name.clone(),
            days_waiting: ctx.days_since_pending,
            ..Fill::default()
        };
        if family == TemplateFamily::PendingVerification {
            match self.flow.check_queue_status(&message.candidate_id).await {
                Ok(queue) => {
                    if let Some(slot) = queue.booked_slot {
                        family = TemplateFamily::PendingVerificationBooked;
                        fill.slot = Some(slot);
                    }
                    fill.days_waiting = queue.days_waiting.or(fill.days_waiting);
                }
                Err(e) => {
                    warn!(candidate_id = %message.candidate_id, error = %e, "Queue status unavailable");
                }
            }
        }

        let content = self.render(&message.candidate_id, family, style, &fill);
        let mut response = CandidateResponse::text(
            content,
            best.intent,
            best.confidence,
            ResponseSource::Internal,
        )
        .with_actions(actions::for_intent(best.intent, ctx.status));
        if family.escalates() {
            response = response.escalating();
        }

        Ok(Some(Draft {
            response,
            family: family.name(),
            flow_reply: false,
        }))
    }

    /// Run the scheduling flow when the candidate is mid-flow or asking to
    /// schedule. Returns the outcome if the flow handled the message.
    async fn consult_flow(
        &self,
        message: &InboundMessage,
        best: &BestMatch,
        ctx: &ContextSnapshot,
    ) -> Result<Option<FlowOutcome>, PipelineError> {
        let in_flow = ctx.conversation_flow.is_active();
        let wants_interview = best.intent == IntentCategory::InterviewScheduling
            && ctx.status != CandidateStatus::Active;
        let rescheduling = best.intent == IntentCategory::InterviewScheduling
            && ctx.conversation_flow == FlowState::Scheduled;
        if !(in_flow || wants_interview || rescheduling) {
            return Ok(None);
        }

        if let Some(outcome) = self
            .flow
            .handle_message(&message.candidate_id, &message.text)
            .await?
        {
            return Ok(Some(outcome));
        }

        // Mid-flow chatter with nothing else to say: repeat the current step.
        let unclear = matches!(
            best.intent,
            IntentCategory::InterviewScheduling | IntentCategory::GeneralHelp
        );
        if in_flow && unclear {
            return Ok(Some(self.flow.reprompt(&message.candidate_id).await));
        }
        Ok(None)
    }

    fn render_flow(
        &self,
        message: &InboundMessage,
        ctx: &ContextSnapshot,
        outcome: &FlowOutcome,
        style: ChannelStyle,
    ) -> Draft {
        let mut fill = Fill {
            first_name: ctx.first_name.clone(),
            ..Fill::default()
        };
        let (family, message_type) = match outcome {
            FlowOutcome::AskAvailability => (TemplateFamily::AskAvailability, MessageType::Text),
            FlowOutcome::SlotsOffered(slots) => {
                fill.slot_list = Some(self.slot_list(slots));
                (TemplateFamily::SlotOffer, MessageType::SlotOffer)
            }
            FlowOutcome::NoSlots => (TemplateFamily::NoSlots, MessageType::Text),
            FlowOutcome::ConfirmSlot(slot) => {
                fill.slot = Some(slot.clone());
                (TemplateFamily::ConfirmSlot, MessageType::Text)
            }
            FlowOutcome::Booked(slot) => {
                fill.slot = Some(slot.clone());
                (TemplateFamily::Booked, MessageType::BookingConfirmation)
            }
            FlowOutcome::AlreadyScheduled(slot) => {
                fill.slot = Some(slot.clone());
                (TemplateFamily::AlreadyScheduled, MessageType::BookingConfirmation)
            }
            FlowOutcome::Conflict { alternatives } if alternatives.is_empty() => {
                (TemplateFamily::ConflictNoAlternatives, MessageType::Text)
            }
            FlowOutcome::Conflict { alternatives } => {
                fill.slot_list = Some(self.slot_list(alternatives));
                (TemplateFamily::Conflict, MessageType::SlotOffer)
            }
            FlowOutcome::InvalidPick { offered } if offered.is_empty() => {
                (TemplateFamily::AskAvailability, MessageType::Text)
            }
            FlowOutcome::InvalidPick { offered } => {
                fill.slot_list = Some(self.slot_list(offered));
                (TemplateFamily::InvalidPick, MessageType::SlotOffer)
            }
            FlowOutcome::Declined => (TemplateFamily::Declined, MessageType::Text),
            FlowOutcome::Reprompt {
                state: FlowState::OfferingSlots,
                offered,
            } if !offered.is_empty() => {
                fill.slot_list = Some(self.slot_list(offered));
                (TemplateFamily::SlotOffer, MessageType::SlotOffer)
            }
            FlowOutcome::Reprompt {
                state: FlowState::ConfirmingBooking,
                ..
            } => (TemplateFamily::RepromptConfirm, MessageType::Text),
            FlowOutcome::Reprompt { .. } => (TemplateFamily::AskAvailability, MessageType::Text),
        };

        let content = self.render(&message.candidate_id, family, style, &fill);
        let response = CandidateResponse::text(
            content,
            IntentCategory::InterviewScheduling,
            FLOW_CONFIDENCE,
            ResponseSource::Internal,
        )
        .with_message_type(message_type)
        .with_actions(actions::for_flow(outcome, self.business_offset));

        Draft {
            response,
            family: family.name(),
            flow_reply: true,
        }
    }

    fn render(
        &self,
        candidate_id: &str,
        family: TemplateFamily,
        style: ChannelStyle,
        fill: &Fill,
    ) -> String {
        let variants = family.variants(style);
        let index = self.pick_variant(candidate_id, family, variants.len());
        let template = variants.get(index).copied().unwrap_or_default();
        let filled = self.fill(template, fill);
        format_for_channel(&filled, style)
    }

    /// Random variant, never the one this candidate saw last from `family`.
    fn pick_variant(&self, candidate_id: &str, family: TemplateFamily, count: usize) -> usize {
        if count <= 1 {
            return 0;
        }
        let key = (candidate_id.to_string(), family.name());
        let mut last = self.last_variant.lock().unwrap_or_else(PoisonError::into_inner);
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let index = match last.get(&key) {
            Some(prev) if prev < count => {
                let i = rng.gen_range(0..count - 1);
                if i >= prev { i + 1 } else { i }
            }
            _ => rng.gen_range(0..count),
        };
        last.insert(key, index);
        index
    }

    fn fill(&self, template: &str, fill: &Fill) -> String {
        let mut text = template.to_string();
        text = match &fill.first_name {
            Some(name) => text.replace("{first_name}", name.trim()),
            None => text.replace(", {first_name}", "").replace("{first_name}", "there"),
        };
        if text.contains("{days_waiting}") {
            let days = match fill.days_waiting {
                Some(0) => "less than a day".to_string(),
                Some(1) => "1 day".to_string(),
                Some(n) => format!("{n} days"),
                None => "a few days".to_string(),
            };
            text = text.replace("{days_waiting}", &days);
        }
        if let Some(slot) = &fill.slot {
            text = text
                .replace("{slot_time}", &self.slot_time(slot))
                .replace("{meeting_link}", &slot.meeting_link);
        }
        if let Some(list) = &fill.slot_list {
            text = text.replace("{slot_list}", list);
        }
        // Anything still in braces is caught by the validator.
        text
    }

    fn slot_time(&self, slot: &InterviewSlot) -> String {
        slot.starts_at
            .with_timezone(&self.business_offset)
            .format("%a %-d %b, %H:%M")
            .to_string()
    }

    fn slot_list(&self, slots: &[InterviewSlot]) -> String {
        slots
            .iter()
            .enumerate()
            .map(|(i, slot)| format!("{}. {}", i + 1, self.slot_time(slot)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{Channel, Priority, TimeOfDay};
    use crate::safety::ResponseValidator;
    use crate::store::{CandidateProfile, InMemoryStore};
    use chrono::{Duration, Utc};

    fn ctx(status: CandidateStatus, flow: FlowState) -> ContextSnapshot {
        ContextSnapshot {
            candidate_id: "c-1".into(),
            status,
            message_count_recent: 1,
            recent_issue_count: 0,
            is_first_message: false,
            conversation_flow: flow,
            time_of_day: TimeOfDay::Afternoon,
            days_since_pending: Some(3),
            first_name: Some("Sari".into()),
            has_completed_jobs: false,
            is_off_hours: false,
            degraded: false,
        }
    }

    fn best(intent: IntentCategory, confidence: f32) -> BestMatch {
        BestMatch {
            intent,
            confidence,
            priority: intent.priority(),
            matched_pattern: None,
            keywords: Vec::new(),
            alternatives: Vec::new(),
            fallback_reason: None,
            elapsed_micros: 0,
        }
    }

    fn slot(id: &str, hours_ahead: i64) -> InterviewSlot {
        InterviewSlot {
            id: id.into(),
            starts_at: Utc::now() + Duration::hours(hours_ahead),
            duration_minutes: 30,
            meeting_link: format!("https://meet.example.com/{id}"),
        }
    }

    async fn setup(slots: &[InterviewSlot]) -> (Arc<InMemoryStore>, ResponseGenerator) {
        let store = Arc::new(InMemoryStore::new());
        for s in slots {
            store.add_slot(s.clone()).await;
        }
        let offset = FixedOffset::east_opt(0).unwrap();
        let flow = Arc::new(ConversationFlowManager::new(store.clone(), offset, 14));
        (store, ResponseGenerator::new(flow, offset, Some(7)))
    }

    #[tokio::test]
    async fn pending_greeting_offers_interview() {
        let (_store, responder) = setup(&[]).await;
        let msg = InboundMessage::new("c-1", "hi", Channel::Whatsapp);
        let draft = responder
            .generate(&msg, &best(IntentCategory::Greeting, 0.75), &ctx(CandidateStatus::Pending, FlowState::InitialEngagement))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(draft.family, "pending_greeting");
        assert!(draft.response.content.contains("Sari"));
        assert_eq!(draft.response.next_actions[0].id, "schedule_interview");
        assert!(!draft.response.escalate);
        assert!(ResponseValidator::new().is_valid(&draft.response));
    }

    #[tokio::test]
    async fn general_help_has_no_draft() {
        let (_store, responder) = setup(&[]).await;
        let msg = InboundMessage::new("c-1", "blah", Channel::Web);
        let draft = responder
            .generate(&msg, &best(IntentCategory::GeneralHelp, 0.3), &ctx(CandidateStatus::Active, FlowState::InitialEngagement))
            .await
            .unwrap();
        assert!(draft.is_none());
        assert!(!ResponseGenerator::handles(IntentCategory::GeneralHelp));
        assert!(ResponseGenerator::handles(IntentCategory::Greeting));
    }

    #[tokio::test]
    async fn never_repeats_last_variant() {
        let (_store, responder) = setup(&[]).await;
        let msg = InboundMessage::new("c-1", "hello", Channel::Whatsapp);
        let context = ctx(CandidateStatus::Pending, FlowState::InitialEngagement);
        let mut previous = String::new();
        for _ in 0..20 {
            let draft = responder
                .generate(&msg, &best(IntentCategory::Greeting, 0.75), &context)
                .await
                .unwrap()
                .unwrap();
            assert_ne!(draft.response.content, previous);
            previous = draft.response.content;
        }
    }

    #[test]
    fn variant_memory_is_bounded() {
        let mut recent = RecentVariants::new(2);
        recent.insert(("c-1".into(), "greeting"), 0);
        recent.insert(("c-2".into(), "greeting"), 1);
        recent.insert(("c-1".into(), "greeting"), 2);
        assert_eq!(recent.len(), 2);

        recent.insert(("c-3".into(), "greeting"), 0);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent.get(&("c-1".into(), "greeting")), None);
        assert_eq!(recent.get(&("c-2".into(), "greeting")), Some(1));
        assert_eq!(recent.get(&("c-3".into(), "greeting")), Some(0));
    }

    #[tokio::test]
    async fn missing_name_reads_naturally() {
        let (_store, responder) = setup(&[]).await;
        let mut context = ctx(CandidateStatus::Active, FlowState::InitialEngagement);
        context.first_name = None;
        let msg = InboundMessage::new("c-1", "thanks", Channel::Sms);
        for _ in 0..6 {
            let draft = responder
                .generate(&msg, &best(IntentCategory::Gratitude, 0.7), &context)
                .await
                .unwrap()
                .unwrap();
            assert!(!draft.response.content.contains('{'));
            assert!(!draft.response.content.contains(", !"));
        }
    }

    #[tokio::test]
    async fn every_family_passes_validation() {
        let (store, responder) = setup(&[slot("a", 30)]).await;
        store
            .add_candidate(
                CandidateProfile::new("c-1", CandidateStatus::Pending)
                    .pending_since(Utc::now() - Duration::days(3)),
            )
            .await;
        let validator = ResponseValidator::new();
        let statuses = [
            CandidateStatus::Pending,
            CandidateStatus::Active,
            CandidateStatus::Suspended,
            CandidateStatus::Inactive,
            CandidateStatus::Unknown,
        ];
        for channel in [Channel::Web, Channel::Whatsapp] {
            for intent in IntentCategory::ALL {
                if intent == IntentCategory::InterviewScheduling {
                    continue;
                }
                for status in statuses {
                    let msg = InboundMessage::new("c-1", "hello there", channel);
                    let context = ctx(status, FlowState::InitialEngagement);
                    // Several rounds to cover the variants.
                    for _ in 0..4 {
                        let Some(draft) = responder
                            .generate(&msg, &best(intent, 0.8), &context)
                            .await
                            .unwrap()
                        else {
                            continue;
                        };
                        let result = validator.validate(&draft.response);
                        assert!(
                            result.is_valid,
                            "{} failed {:?}: {}",
                            draft.family, result.errors, draft.response.content
                        );
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn scheduling_flow_renders_offer_and_booking() {
        let (_store, responder) = setup(&[slot("a", 30), slot("b", 60)]).await;
        let pending = |flow| ctx(CandidateStatus::Pending, flow);
        let validator = ResponseValidator::new();

        let msg = InboundMessage::new("c-1", "book interview anytime", Channel::Whatsapp);
        let draft = responder
            .generate(&msg, &best(IntentCategory::InterviewScheduling, 0.9), &pending(FlowState::InitialEngagement))
            .await
            .unwrap()
            .unwrap();
        assert!(draft.flow_reply);
        assert_eq!(draft.response.message_type, MessageType::SlotOffer);
        assert!(draft.response.content.contains("1. "));
        assert!(draft.response.content.contains("2. "));
        assert_eq!(draft.response.next_actions.len(), 2);
        assert!(validator.is_valid(&draft.response));

        let msg = InboundMessage::new("c-1", "1", Channel::Whatsapp);
        let draft = responder
            .generate(&msg, &best(IntentCategory::GeneralHelp, 0.3), &pending(FlowState::OfferingSlots))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(draft.family, "confirm_slot");
        assert!(validator.is_valid(&draft.response));

        let msg = InboundMessage::new("c-1", "yes", Channel::Whatsapp);
        let draft = responder
            .generate(&msg, &best(IntentCategory::GeneralHelp, 0.3), &pending(FlowState::ConfirmingBooking))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(draft.response.message_type, MessageType::BookingConfirmation);
        assert!(draft.response.content.contains("https://meet.example.com/a"));
        assert!(validator.is_valid(&draft.response));
    }

    #[tokio::test]
    async fn mid_flow_chatter_reprompts() {
        let (_store, responder) = setup(&[slot("a", 30)]).await;
        let msg = InboundMessage::new("c-1", "schedule interview", Channel::Web);
        responder
            .generate(&msg, &best(IntentCategory::InterviewScheduling, 0.9), &ctx(CandidateStatus::Pending, FlowState::InitialEngagement))
            .await
            .unwrap();

        let msg = InboundMessage::new("c-1", "hmm what", Channel::Web);
        let draft = responder
            .generate(&msg, &best(IntentCategory::GeneralHelp, 0.3), &ctx(CandidateStatus::Pending, FlowState::CollectingAvailability))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(draft.family, "ask_availability");
        assert!(draft.flow_reply);
    }

    #[tokio::test]
    async fn urgent_and_data_requests_escalate() {
        let (_store, responder) = setup(&[]).await;
        let context = ctx(CandidateStatus::Active, FlowState::InitialEngagement);

        let msg = InboundMessage::new("c-1", "URGENT need help now", Channel::Web);
        let mut urgent = best(IntentCategory::UrgentEscalation, 0.9);
        urgent.priority = Priority::Urgent;
        let draft = responder.generate(&msg, &urgent, &context).await.unwrap().unwrap();
        assert!(draft.response.escalate);

        let msg = InboundMessage::new("c-1", "please delete my account", Channel::Web);
        let draft = responder
            .generate(&msg, &best(IntentCategory::AccountManagement, 0.7), &context)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(draft.family, "data_request_holding");
        assert!(draft.response.escalate);
    }

    #[tokio::test]
    async fn verification_mentions_booked_interview() {
        let (store, responder) = setup(&[slot("a", 30)]).await;
        store
            .add_candidate(CandidateProfile::new("c-1", CandidateStatus::Pending))
            .await;
        responder.flow.book_slot("c-1", &slot("a", 30)).await.unwrap();

        let msg = InboundMessage::new("c-1", "what is my status", Channel::Web);
        let draft = responder
            .generate(&msg, &best(IntentCategory::VerificationStatus, 0.8), &ctx(CandidateStatus::Pending, FlowState::InitialEngagement))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(draft.family, "pending_verification_booked");
        assert!(draft.response.content.contains("https://meet.example.com/a"));
    }
}
