//! Persistence layer: candidate profiles, activity, escalations, and interview slots.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use memory::InMemoryStore;
pub use traits::{
    BookingResult, CandidateProfile, CandidateStore, InterviewSlot, RecentMessage,
    RecentMessageStats,
};
