//! Human escalation: records, routing, and the overdue sweep.

pub mod model;
pub mod router;
pub mod sweep;

pub use model::{
    CategoryRoute, Department, EscalationCategory, EscalationPriority, EscalationReason,
    EscalationRecord, EscalationStatus,
};
pub use router::{EscalationOutcome, EscalationRouter, reasons_for_intent};
pub use sweep::OverdueSweep;
