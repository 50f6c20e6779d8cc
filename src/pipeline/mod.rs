//! Message routing pipeline.
//!
//! Every inbound message flows through `MessageRouter::process_message`:
//! context enrichment, intent classification, cache, local templates and
//! the scheduling flow, generative fallback, and escalation.

pub mod cache;
pub mod classifier;
pub mod context;
pub mod patterns;
pub mod processor;
pub mod types;

pub use cache::ResponseCache;
pub use classifier::IntentClassifier;
pub use context::{ContextEnricher, ContextSnapshot};
pub use processor::MessageRouter;
