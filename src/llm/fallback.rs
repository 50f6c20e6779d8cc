//! Generative fallback: ask the external model when local rules can't answer.

use std::sync::Arc;

use tracing::{info, warn};

use crate::llm::prompts::build_messages;
use crate::llm::provider::{CompletionRequest, LlmProvider, completion_cost};
use crate::llm::retry::{AttemptFailure, RetryPolicy, complete_with_retry};
use crate::pipeline::context::ContextSnapshot;
use crate::pipeline::types::{
    BestMatch, CandidateResponse, ConversationTurn, InboundMessage, ResponseSource,
};
use crate::responses::actions;
use crate::responses::format::{format_for_channel, strip_markup};
use crate::safety::ResponseValidator;

/// Longest generated reply, in characters.
pub const MAX_GENERATED_CHARS: usize = 400;
/// Confidence reported on a generated reply that passed validation.
pub const GENERATIVE_CONFIDENCE: f32 = 0.75;

const SAFE_TEXT: &str =
    "Thanks for your message. A member of our team will look at this and get back to you.";

const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: u32 = 300;

/// Why the fallback could not produce a usable reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerativeFailure {
    Unconfigured,
    Timeout,
    Provider(String),
    EmptyOrMalformed,
    Rejected { gates: Vec<String> },
}

impl GenerativeFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unconfigured => "unconfigured",
            Self::Timeout => "timeout",
            Self::Provider(_) => "provider_error",
            Self::EmptyOrMalformed => "empty_or_malformed",
            Self::Rejected { .. } => "validation_rejected",
        }
    }
}

impl std::fmt::Display for GenerativeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Provider(reason) => write!(f, "provider_error: {reason}"),
            Self::Rejected { gates } => write!(f, "validation_rejected: {}", gates.join(", ")),
            other => f.write_str(other.as_str()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum FallbackOutcome {
    Generated(CandidateResponse),
    /// A fixed safe reply flagged `escalate`, with the reason.
    Failed {
        response: CandidateResponse,
        failure: GenerativeFailure,
    },
}

impl FallbackOutcome {
    pub fn response(&self) -> &CandidateResponse {
        match self {
            Self::Generated(response) | Self::Failed { response, .. } => response,
        }
    }
}

pub struct GenerativeFallback {
    provider: Option<Arc<dyn LlmProvider>>,
    policy: RetryPolicy,
    validator: Arc<ResponseValidator>,
}

impl GenerativeFallback {
    pub fn new(
        provider: Option<Arc<dyn LlmProvider>>,
        policy: RetryPolicy,
        validator: Arc<ResponseValidator>,
    ) -> Self {
        Self {
            provider,
            policy,
            validator,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    pub async fn generate(
        &self,
        message: &InboundMessage,
        best: &BestMatch,
        ctx: &ContextSnapshot,
        history: &[ConversationTurn],
    ) -> FallbackOutcome {
        match self.try_generate(message, best, ctx, history).await {
            Ok(response) => FallbackOutcome::Generated(response),
            Err(failure) => {
                warn!(
                    candidate_id = %message.candidate_id,
                    failure = %failure,
                    "Generative fallback failed"
                );
                FallbackOutcome::Failed {
                    response: safe_response(best),
                    failure,
                }
            }
        }
    }

    async fn try_generate(
        &self,
        message: &InboundMessage,
        best: &BestMatch,
        ctx: &ContextSnapshot,
        history: &[ConversationTurn],
    ) -> Result<CandidateResponse, GenerativeFailure> {
        let provider = self.provider.as_deref().ok_or(GenerativeFailure::Unconfigured)?;
        let style = message.channel.style();
        let request = CompletionRequest::new(build_messages(&message.text, best, ctx, style, history))
            .with_temperature(TEMPERATURE)
            .with_max_tokens(MAX_TOKENS);

        let completion = complete_with_retry(provider, &request, &self.policy)
            .await
            .map_err(|failure| match failure {
                AttemptFailure::TimedOut => GenerativeFailure::Timeout,
                AttemptFailure::Provider(e) => GenerativeFailure::Provider(e.to_string()),
            })?;
        info!(
            candidate_id = %message.candidate_id,
            model = provider.model_name(),
            input_tokens = completion.input_tokens,
            output_tokens = completion.output_tokens,
            cost_usd = %completion_cost(provider, &completion),
            "Generative completion"
        );

        let text = cap_length(
            &format_for_channel(&strip_markup(&completion.content), style),
            MAX_GENERATED_CHARS,
        );
        if text.trim().is_empty() {
            return Err(GenerativeFailure::EmptyOrMalformed);
        }

        let response = CandidateResponse::text(
            text,
            best.intent,
            GENERATIVE_CONFIDENCE,
            ResponseSource::Generative,
        )
        .with_actions(actions::for_intent(best.intent, ctx.status));

        let validation = self.validator.validate(&response);
        if !validation.is_valid {
            let gates = validation.failed_gates();
            warn!(candidate_id = %message.candidate_id, gates = ?gates, "Generated reply rejected");
            return Err(GenerativeFailure::Rejected { gates });
        }
        Ok(response)
    }
}

/// Fixed reply used whenever generation fails. Always escalates.
pub fn safe_response(best: &BestMatch) -> CandidateResponse {
    CandidateResponse::text(
        SAFE_TEXT,
        best.intent,
        best.confidence.clamp(0.0, 1.0),
        ResponseSource::Generative,
    )
    .escalating()
}

/// Trim to `max` characters, preferring a sentence end, then a word break.
pub fn cap_length(text: &str, max: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max {
        return text.to_string();
    }
    let head: String = text.chars().take(max).collect();

    let sentence_end = head
        .char_indices()
        .filter(|(i, c)| {
            matches!(c, '.' | '!' | '?')
                && head[i + c.len_utf8()..].starts_with(char::is_whitespace)
        })
        .map(|(i, c)| i + c.len_utf8())
        .last();
    if let Some(end) = sentence_end.filter(|end| *end >= head.len() / 2) {
        return head[..end].to_string();
    }

    // Leave room for the ellipsis.
    let body: String = head.chars().take(max.saturating_sub(1)).collect();
    match body.rfind(char::is_whitespace) {
        Some(cut) if cut > 0 => format!("{}…", body[..cut].trim_end()),
        _ => format!("{body}…"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::flow::FlowState;
    use crate::llm::provider::{CompletionResponse, FinishReason};
    use crate::pipeline::types::{CandidateStatus, Channel, IntentCategory, Priority, TimeOfDay};
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::time::Duration;

    struct Canned(&'static str);

    #[async_trait]
    impl LlmProvider for Canned {
        fn model_name(&self) -> &str {
            "canned"
        }

        fn cost_per_token(&self) -> (Decimal, Decimal) {
            (Decimal::new(1, 6), Decimal::new(2, 6))
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            Ok(CompletionResponse {
                content: self.0.to_string(),
                input_tokens: 100,
                output_tokens: 20,
                finish_reason: FinishReason::Stop,
            })
        }
    }

    struct Slow;

    #[async_trait]
    impl LlmProvider for Slow {
        fn model_name(&self) -> &str {
            "slow"
        }

        fn cost_per_token(&self) -> (Decimal, Decimal) {
            (Decimal::ZERO, Decimal::ZERO)
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(LlmError::RequestFailed {
                provider: "slow".into(),
                reason: "too late".into(),
            })
        }
    }

    fn fallback(provider: Option<Arc<dyn LlmProvider>>) -> GenerativeFallback {
        GenerativeFallback::new(provider, RetryPolicy::default(), Arc::new(ResponseValidator::new()))
    }

    fn ctx() -> ContextSnapshot {
        ContextSnapshot {
            candidate_id: "c-1".into(),
            status: CandidateStatus::Active,
            message_count_recent: 0,
            recent_issue_count: 0,
            is_first_message: true,
            conversation_flow: FlowState::InitialEngagement,
            time_of_day: TimeOfDay::Morning,
            days_since_pending: None,
            first_name: None,
            has_completed_jobs: false,
            is_off_hours: false,
            degraded: false,
        }
    }

    fn best() -> BestMatch {
        BestMatch {
            intent: IntentCategory::GeneralHelp,
            confidence: 0.3,
            priority: Priority::Normal,
            matched_pattern: None,
            keywords: Vec::new(),
            alternatives: Vec::new(),
            fallback_reason: Some("no pattern matched".into()),
            elapsed_micros: 0,
        }
    }

    fn msg() -> InboundMessage {
        InboundMessage::new("c-1", "what's the dress code for warehouse shifts?", Channel::Web)
    }

    #[tokio::test]
    async fn strips_markup_and_validates() {
        let provider: Arc<dyn LlmProvider> = Arc::new(Canned(
            "**Good question!** Most warehouse shifts ask for closed shoes and comfortable clothes. Check the job details for anything specific.",
        ));
        let outcome = fallback(Some(provider)).generate(&msg(), &best(), &ctx(), &[]).await;
        match outcome {
            FallbackOutcome::Generated(response) => {
                assert!(!response.content.contains("**"));
                assert_eq!(response.source, ResponseSource::Generative);
                assert!(!response.escalate);
            }
            other => panic!("expected generated reply, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn overpromise_is_rejected() {
        let provider: Arc<dyn LlmProvider> =
            Arc::new(Canned("No worries, I've notified the team and they will sort it."));
        let outcome = fallback(Some(provider)).generate(&msg(), &best(), &ctx(), &[]).await;
        match outcome {
            FallbackOutcome::Failed { response, failure } => {
                assert!(response.escalate);
                assert_eq!(response.content, SAFE_TEXT);
                assert_eq!(
                    failure,
                    GenerativeFailure::Rejected {
                        gates: vec!["overpromise".into()]
                    }
                );
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unconfigured_fails_safe() {
        let outcome = fallback(None).generate(&msg(), &best(), &ctx(), &[]).await;
        assert!(matches!(
            outcome,
            FallbackOutcome::Failed {
                failure: GenerativeFailure::Unconfigured,
                ..
            }
        ));
        assert!(outcome.response().escalate);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_fails_safe() {
        let provider: Arc<dyn LlmProvider> = Arc::new(Slow);
        let outcome = fallback(Some(provider)).generate(&msg(), &best(), &ctx(), &[]).await;
        assert!(matches!(
            outcome,
            FallbackOutcome::Failed {
                failure: GenerativeFailure::Timeout,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn blank_completion_is_malformed() {
        let provider: Arc<dyn LlmProvider> = Arc::new(Canned("  **  "));
        let outcome = fallback(Some(provider)).generate(&msg(), &best(), &ctx(), &[]).await;
        assert!(matches!(
            outcome,
            FallbackOutcome::Failed {
                failure: GenerativeFailure::EmptyOrMalformed,
                ..
            }
        ));
    }

    #[test]
    fn safe_text_passes_validation() {
        assert!(ResponseValidator::new().is_valid(&safe_response(&best())));
    }

    #[test]
    fn cap_prefers_sentence_end() {
        let text = format!("{} Second sentence runs on and on.", "First sentence here.".repeat(10));
        let capped = cap_length(&text, 220);
        assert!(capped.chars().count() <= 220);
        assert!(capped.ends_with('.'));
    }

    #[test]
    fn cap_falls_back_to_word_break() {
        let text = "word ".repeat(100);
        let capped = cap_length(&text, 50);
        assert!(capped.chars().count() <= 50);
        assert!(capped.ends_with("word…"));
    }

    #[test]
    fn short_text_untouched() {
        assert_eq!(cap_length("  Hello there.  ", 400), "Hello there.");
    }
}
