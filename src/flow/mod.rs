//! Multi-turn conversation flows: interview scheduling.

pub mod manager;
pub mod signals;
pub mod state;

pub use manager::{
    BookingOutcome, ConversationFlowManager, FlowOutcome, FlowSession, NextStep, QueueStatus,
};
pub use signals::{FlowSignal, SlotPreferences};
pub use state::FlowState;
