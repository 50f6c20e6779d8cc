//! Error types for the chat router.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Candidate store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },
}

impl LlmError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::AuthFailed { .. })
    }
}

/// Notification fan-out errors.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notifier {name} has no listeners")]
    NoListeners { name: String },

    #[error("Notifier {name} delivery failed: {reason}")]
    DeliveryFailed { name: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Conversation flow errors.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("Flow cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("No offered slot at position {index}")]
    NoSuchOffer { index: usize },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Routing pipeline errors.
///
/// None of these ever reach a caller of `process_message`; the orchestrator
/// converts them into a validated escalation response.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Context data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Escalation could not be recorded: {0}")]
    EscalationNotRecorded(StoreError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Flow error: {0}")]
    Flow(#[from] FlowError),
}
