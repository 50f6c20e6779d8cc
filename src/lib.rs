//! Chat Router: conversation routing for marketplace worker chat.

pub mod api;
pub mod config;
pub mod error;
pub mod escalation;
pub mod flow;
pub mod llm;
pub mod notify;
pub mod pipeline;
pub mod responses;
pub mod safety;
pub mod store;
