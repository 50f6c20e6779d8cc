//! Bounded, iterative retry around a completion call.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::LlmError;
use crate::llm::provider::{CompletionRequest, CompletionResponse, LlmProvider};

/// Attempts, per-attempt timeout, and linear backoff step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub timeout: Duration,
    /// Sleep `backoff * attempt` between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            timeout: Duration::from_secs(8),
            backoff: Duration::from_millis(500),
        }
    }
}

/// How the last attempt failed.
#[derive(Debug)]
pub enum AttemptFailure {
    TimedOut,
    Provider(LlmError),
}

impl std::fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TimedOut => f.write_str("timed out"),
            Self::Provider(e) => write!(f, "{e}"),
        }
    }
}

/// Call `provider.complete` up to `policy.attempts` times.
///
/// Each attempt is bounded by `policy.timeout`; a timed-out attempt is
/// dropped, which cancels it. A provider's retry-after hint is honored up to
/// `policy.timeout`. Non-retryable provider errors end the loop early.
pub async fn complete_with_retry(
    provider: &dyn LlmProvider,
    request: &CompletionRequest,
    policy: &RetryPolicy,
) -> Result<CompletionResponse, AttemptFailure> {
    let attempts = policy.attempts.max(1);
    let mut last = AttemptFailure::TimedOut;

    for attempt in 1..=attempts {
        let outcome = tokio::time::timeout(policy.timeout, provider.complete(request.clone())).await;
        let wait = match outcome {
            Ok(Ok(response)) => {
                debug!(attempt, model = provider.model_name(), "Completion succeeded");
                return Ok(response);
            }
            Ok(Err(e)) if !e.is_retryable() => {
                warn!(attempt, error = %e, "Completion failed, not retrying");
                return Err(AttemptFailure::Provider(e));
            }
            Ok(Err(e)) => {
                warn!(attempt, error = %e, "Completion failed");
                let wait = match &e {
                    LlmError::RateLimited {
                        retry_after: Some(after),
                        ..
                    } => (*after).min(policy.timeout),
                    _ => policy.backoff * attempt,
                };
                last = AttemptFailure::Provider(e);
                wait
            }
            Err(_) => {
                warn!(attempt, timeout_ms = policy.timeout.as_millis() as u64, "Completion timed out");
                last = AttemptFailure::TimedOut;
                policy.backoff * attempt
            }
        };
        if attempt < attempts {
            tokio::time::sleep(wait).await;
        }
    }
    Err(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::{ChatMessage, FinishReason};
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Plays back scripted results, one per call.
    struct Scripted {
        script: Mutex<Vec<Step>>,
        calls: AtomicU32,
    }

    enum Step {
        Reply(&'static str),
        Fail(LlmError),
        Hang,
    }

    impl Scripted {
        fn new(mut steps: Vec<Step>) -> Self {
            steps.reverse();
            Self {
                script: Mutex::new(steps),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for Scripted {
        fn model_name(&self) -> &str {
            "scripted"
        }

        fn cost_per_token(&self) -> (Decimal, Decimal) {
            (Decimal::ZERO, Decimal::ZERO)
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self.script.lock().unwrap().pop().unwrap_or(Step::Hang);
            match step {
                Step::Reply(text) => Ok(CompletionResponse {
                    content: text.to_string(),
                    input_tokens: 10,
                    output_tokens: 5,
                    finish_reason: FinishReason::Stop,
                }),
                Step::Fail(e) => Err(e),
                Step::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    unreachable!("attempt should have timed out")
                }
            }
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest::new(vec![ChatMessage::user("hello")])
    }

    fn failed() -> LlmError {
        LlmError::RequestFailed {
            provider: "test".into(),
            reason: "boom".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_then_succeeds() {
        let provider = Scripted::new(vec![Step::Fail(failed()), Step::Reply("ok")]);
        let out = complete_with_retry(&provider, &request(), &RetryPolicy::default())
            .await
            .unwrap();
        assert_eq!(out.content, "ok");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_exhaust_attempts() {
        let provider = Scripted::new(vec![Step::Hang, Step::Hang]);
        let err = complete_with_retry(&provider, &request(), &RetryPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AttemptFailure::TimedOut));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn auth_failure_stops_early() {
        let provider = Scripted::new(vec![
            Step::Fail(LlmError::AuthFailed {
                provider: "test".into(),
            }),
            Step::Reply("never"),
        ]);
        let err = complete_with_retry(&provider, &request(), &RetryPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AttemptFailure::Provider(LlmError::AuthFailed { .. })));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn long_retry_after_is_capped() {
        let provider = Scripted::new(vec![
            Step::Fail(LlmError::RateLimited {
                provider: "test".into(),
                retry_after: Some(Duration::from_secs(60)),
            }),
            Step::Reply("ok"),
        ]);
        let policy = RetryPolicy::default();
        let started = tokio::time::Instant::now();
        let out = complete_with_retry(&provider, &request(), &policy)
            .await
            .unwrap();
        assert_eq!(out.content, "ok");
        let waited = started.elapsed();
        assert!(waited >= policy.timeout);
        assert!(waited < Duration::from_secs(60));
    }
}
