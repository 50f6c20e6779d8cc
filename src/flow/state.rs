//! Interview-scheduling flow states.

use serde::{Deserialize, Serialize};

/// Where a candidate is in the interview-scheduling conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    /// No scheduling in progress.
    #[default]
    InitialEngagement,
    SchedulingStarted,
    CollectingAvailability,
    OfferingSlots,
    ConfirmingBooking,
    Scheduled,
}

impl FlowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InitialEngagement => "initial_engagement",
            Self::SchedulingStarted => "scheduling_started",
            Self::CollectingAvailability => "collecting_availability",
            Self::OfferingSlots => "offering_slots",
            Self::ConfirmingBooking => "confirming_booking",
            Self::Scheduled => "scheduled",
        }
    }

    /// A flow is active while the candidate is mid-scheduling.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::InitialEngagement | Self::Scheduled)
    }

    /// Allowed state transitions.
    ///
    /// ```text
    /// InitialEngagement ─► SchedulingStarted ─► CollectingAvailability ─► OfferingSlots
    ///        ▲                                          ▲                     │   ▲
    ///        │                                          └─────────────────────┤   │ (conflict)
    ///        │                                                                ▼   │
    ///        └──────────── (decline) ◄──────────── any active ─── ConfirmingBooking
    ///                                                                         │
    ///                                               Scheduled ◄───────────────┘
    ///                                                   │ (reschedule)
    ///                                                   └─► CollectingAvailability
    /// ```
    pub fn can_transition_to(&self, target: FlowState) -> bool {
        use FlowState::*;

        if self.is_active() && target == InitialEngagement {
            return true;
        }

        matches!(
            (self, target),
            (InitialEngagement, SchedulingStarted)
                | (InitialEngagement, CollectingAvailability)
                | (SchedulingStarted, CollectingAvailability)
                | (SchedulingStarted, OfferingSlots)
                | (CollectingAvailability, OfferingSlots)
                | (CollectingAvailability, CollectingAvailability)
                | (OfferingSlots, OfferingSlots)
                | (OfferingSlots, CollectingAvailability)
                | (OfferingSlots, ConfirmingBooking)
                | (ConfirmingBooking, Scheduled)
                | (ConfirmingBooking, OfferingSlots)
                | (ConfirmingBooking, CollectingAvailability)
                | (Scheduled, CollectingAvailability)
                | (Scheduled, SchedulingStarted)
        )
    }
}

impl std::fmt::Display for FlowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        use FlowState::*;
        let path = [
            InitialEngagement,
            SchedulingStarted,
            CollectingAvailability,
            OfferingSlots,
            ConfirmingBooking,
            Scheduled,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn cannot_skip_to_scheduled() {
        use FlowState::*;
        assert!(!InitialEngagement.can_transition_to(Scheduled));
        assert!(!OfferingSlots.can_transition_to(Scheduled));
        assert!(!CollectingAvailability.can_transition_to(ConfirmingBooking));
    }

    #[test]
    fn decline_returns_to_initial_from_active_states() {
        use FlowState::*;
        for state in [
            SchedulingStarted,
            CollectingAvailability,
            OfferingSlots,
            ConfirmingBooking,
        ] {
            assert!(state.is_active());
            assert!(state.can_transition_to(InitialEngagement));
        }
        assert!(!Scheduled.is_active());
        assert!(!Scheduled.can_transition_to(InitialEngagement));
    }

    #[test]
    fn reschedule_reopens_availability() {
        assert!(FlowState::Scheduled.can_transition_to(FlowState::CollectingAvailability));
    }

    #[test]
    fn serde_names() {
        let json = serde_json::to_string(&FlowState::OfferingSlots).unwrap();
        assert_eq!(json, "\"offering_slots\"");
    }
}
