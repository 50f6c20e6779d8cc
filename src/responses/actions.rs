//! Quick-action suggestions attached to replies.

use chrono::FixedOffset;

use crate::flow::{FlowOutcome, FlowState};
use crate::pipeline::types::{CandidateStatus, IntentCategory, QuickAction};
use crate::store::InterviewSlot;

/// Most quick actions on one reply.
pub const MAX_ACTIONS: usize = 4;

/// Actions for an intent-driven reply.
pub fn for_intent(intent: IntentCategory, status: CandidateStatus) -> Vec<QuickAction> {
    use CandidateStatus as S;
    use IntentCategory as I;

    let mut actions = match (intent, status) {
        (I::UrgentEscalation | I::Complaint, _) => Vec::new(),
        (I::TechnicalSupport, _) => vec![
            QuickAction::new("update_app", "Update the app"),
            QuickAction::new("contact_support", "Talk to support"),
        ],
        (I::AccountManagement, _) => vec![QuickAction::new("edit_profile", "Edit profile")],
        (
            I::Greeting
            | I::Gratitude
            | I::VerificationStatus
            | I::JobSearch
            | I::PaymentInquiry
            | I::InterviewScheduling
            | I::GeneralHelp,
            S::Pending,
        ) => vec![
            QuickAction::new("schedule_interview", "Schedule interview"),
            QuickAction::new("check_status", "Check my status"),
        ],
        (I::PaymentInquiry, S::Active) => vec![
            QuickAction::new("view_earnings", "View earnings"),
            QuickAction::new("report_missing_payment", "Report a missing payment"),
        ],
        (_, S::Active) => vec![
            QuickAction::new("browse_jobs", "Browse jobs"),
            QuickAction::new("view_earnings", "View earnings"),
        ],
        (_, S::Suspended | S::Inactive | S::Unknown) => {
            vec![QuickAction::new("contact_support", "Talk to support")]
        }
    };
    actions.truncate(MAX_ACTIONS);
    actions
}

/// Actions for a scheduling-flow reply.
pub fn for_flow(outcome: &FlowOutcome, business_offset: FixedOffset) -> Vec<QuickAction> {
    let mut actions = match outcome {
        FlowOutcome::SlotsOffered(slots)
        | FlowOutcome::Conflict {
            alternatives: slots,
        }
        | FlowOutcome::InvalidPick { offered: slots } => slot_picks(slots, business_offset),
        FlowOutcome::Reprompt {
            state: FlowState::OfferingSlots,
            offered,
        } => slot_picks(offered, business_offset),
        FlowOutcome::ConfirmSlot(_)
        | FlowOutcome::Reprompt {
            state: FlowState::ConfirmingBooking,
            ..
        } => vec![
            QuickAction::new("confirm_booking", "Yes, book it"),
            QuickAction::new("choose_another_time", "Choose another time"),
        ],
        FlowOutcome::Booked(slot) | FlowOutcome::AlreadyScheduled(slot) => vec![
            QuickAction::new("join_interview", "Join interview").with_param("link", &slot.meeting_link),
            QuickAction::new("reschedule_interview", "Reschedule"),
        ],
        FlowOutcome::AskAvailability | FlowOutcome::NoSlots | FlowOutcome::Reprompt { .. } => vec![
            QuickAction::new("availability_anytime", "Any time works"),
            QuickAction::new("cancel_scheduling", "Not now"),
        ],
        FlowOutcome::Declined => vec![QuickAction::new("schedule_interview", "Schedule interview")],
    };
    actions.truncate(MAX_ACTIONS);
    actions
}

fn slot_picks(slots: &[InterviewSlot], business_offset: FixedOffset) -> Vec<QuickAction> {
    slots
        .iter()
        .take(MAX_ACTIONS)
        .enumerate()
        .map(|(i, slot)| {
            let label = slot
                .starts_at
                .with_timezone(&business_offset)
                .format("%a %-d %b, %H:%M")
                .to_string();
            QuickAction::new("select_slot", label)
                .with_param("index", (i + 1).to_string())
                .with_param("slot_id", &slot.id)
        })
        .collect()
}
