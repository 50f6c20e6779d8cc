//! Intent classifier: scores a message against the pattern library and
//! reduces the hits to a single `BestMatch`.

use std::cmp::Ordering;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::pipeline::context::ContextSnapshot;
use crate::pipeline::patterns::PatternLibrary;
use crate::pipeline::types::{BestMatch, CandidateStatus, IntentCategory, IntentMatch};

/// Boost when several patterns agree on the winning intent.
pub const MULTI_MATCH_BOOST: f32 = 1.1;
/// Confidence of the general-help fallback when the winner is below its threshold.
pub const BELOW_THRESHOLD_CONFIDENCE: f32 = 0.4;
/// Confidence of the general-help fallback when nothing matched.
pub const NO_MATCH_CONFIDENCE: f32 = 0.3;
/// Confidence of the general-help fallback for blank input.
pub const EMPTY_INPUT_CONFIDENCE: f32 = 0.1;
/// Soft time budget for one classification.
pub const CLASSIFY_BUDGET: Duration = Duration::from_millis(100);

/// Deterministic, pattern-based intent classifier.
pub struct IntentClassifier {
    library: PatternLibrary,
    budget: Duration,
}

impl IntentClassifier {
    pub fn new(library: PatternLibrary) -> Self {
        Self {
            library,
            budget: CLASSIFY_BUDGET,
        }
    }

    /// Classify a message. Never panics; blank or unmatched input falls back
    /// to general help.
    pub fn classify(&self, text: &str, ctx: &ContextSnapshot) -> BestMatch {
        let started = Instant::now();
        let mut best = self.select(text, ctx);

        let elapsed = started.elapsed();
        best.elapsed_micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        if elapsed > self.budget {
            warn!(
                candidate_id = %ctx.candidate_id,
                elapsed_ms = elapsed.as_millis() as u64,
                "Classification exceeded time budget"
            );
        }
        debug!(
            candidate_id = %ctx.candidate_id,
            intent = %best.intent,
            confidence = best.confidence,
            fallback = best.is_fallback(),
            "Message classified"
        );
        best
    }

    fn select(&self, text: &str, ctx: &ContextSnapshot) -> BestMatch {
        if text.trim().is_empty() {
            return general_help(EMPTY_INPUT_CONFIDENCE, "empty message");
        }

        let mut matches = self.library.scan(text);
        if matches.is_empty() {
            return general_help(NO_MATCH_CONFIDENCE, "no pattern matched");
        }

        for m in &mut matches {
            m.confidence = (m.confidence * context_multiplier(m.category, ctx)).min(1.0);
        }
        matches.sort_by(rank);

        let mut matches = matches.into_iter();
        let Some(top) = matches.next() else {
            return general_help(NO_MATCH_CONFIDENCE, "no pattern matched");
        };
        let alternatives: Vec<IntentMatch> =
            matches.filter(|m| m.category == top.category).collect();

        let mut confidence = top.confidence;
        if !alternatives.is_empty() {
            confidence = (confidence * MULTI_MATCH_BOOST).min(1.0);
        }

        let threshold = top.category.min_confidence();
        if confidence < threshold {
            return general_help(
                BELOW_THRESHOLD_CONFIDENCE,
                &format!(
                    "{} confidence {confidence:.2} below threshold {threshold:.2}",
                    top.category
                ),
            );
        }

        BestMatch {
            intent: top.category,
            confidence,
            priority: top.priority,
            matched_pattern: Some(top.matched_pattern),
            keywords: top.keywords,
            alternatives,
            fallback_reason: None,
            elapsed_micros: 0,
        }
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(PatternLibrary::standard())
    }
}

/// Priority first, then confidence, both descending.
fn rank(a: &IntentMatch, b: &IntentMatch) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| b.confidence.total_cmp(&a.confidence))
}

/// Product of the context adjustments that apply to `category`.
fn context_multiplier(category: IntentCategory, ctx: &ContextSnapshot) -> f32 {
    let mut factor = 1.0;
    match category {
        IntentCategory::VerificationStatus if ctx.status == CandidateStatus::Pending => {
            factor *= 1.2
        }
        IntentCategory::InterviewScheduling if ctx.status == CandidateStatus::Pending => {
            factor *= 1.25
        }
        IntentCategory::TechnicalSupport if ctx.recent_issue_count >= 2 => factor *= 1.15,
        IntentCategory::UrgentEscalation if ctx.is_off_hours => factor *= 1.15,
        IntentCategory::PaymentInquiry
            if ctx.status == CandidateStatus::Active && ctx.has_completed_jobs =>
        {
            factor *= 1.1
        }
        _ => {}
    }
    factor
}

pub(crate) fn general_help(confidence: f32, reason: &str) -> BestMatch {
    let intent = IntentCategory::GeneralHelp;
    BestMatch {
        intent,
        confidence,
        priority: intent.priority(),
        matched_pattern: None,
        keywords: Vec::new(),
        alternatives: Vec::new(),
        fallback_reason: Some(reason.to_string()),
        elapsed_micros: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::FlowState;
    use crate::pipeline::patterns::CategoryPatterns;
    use crate::pipeline::types::{Priority, TimeOfDay};

    fn ctx(status: CandidateStatus) -> ContextSnapshot {
        ContextSnapshot {
            candidate_id: "c-1".into(),
            status,
            message_count_recent: 1,
            recent_issue_count: 0,
            is_first_message: true,
            conversation_flow: FlowState::InitialEngagement,
            time_of_day: TimeOfDay::Afternoon,
            days_since_pending: None,
            first_name: None,
            has_completed_jobs: false,
            is_off_hours: false,
            degraded: false,
        }
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn blank_input_falls_back_low() {
        let c = IntentClassifier::default();
        for text in ["", "   ", "\n\t"] {
            let best = c.classify(text, &ctx(CandidateStatus::Active));
            assert_eq!(best.intent, IntentCategory::GeneralHelp);
            assert!(approx(best.confidence, EMPTY_INPUT_CONFIDENCE));
            assert!(best.is_fallback());
        }
    }

    #[test]
    fn unmatched_input_falls_back() {
        let c = IntentClassifier::default();
        let best = c.classify("purple elephants dance", &ctx(CandidateStatus::Active));
        assert_eq!(best.intent, IntentCategory::GeneralHelp);
        assert!(approx(best.confidence, NO_MATCH_CONFIDENCE));
    }

    #[test]
    fn urgent_scenario() {
        let c = IntentClassifier::default();
        let best = c.classify("URGENT need help now!", &ctx(CandidateStatus::Active));
        assert_eq!(best.intent, IntentCategory::UrgentEscalation);
        assert_eq!(best.priority, Priority::Urgent);
        assert!(best.confidence >= 0.7);
        assert!(!best.alternatives.is_empty());
    }

    #[test]
    fn urgent_beats_higher_confidence_lower_priority() {
        let c = IntentClassifier::default();
        // Greeting phrase scores 0.75+, "asap" keyword scores 0.75.
        let best = c.classify("good morning, I need my otp asap", &ctx(CandidateStatus::Active));
        assert_eq!(best.priority, Priority::Urgent);
        assert_eq!(best.intent, IntentCategory::UrgentEscalation);
    }

    #[test]
    fn payment_boosted_for_active_workers() {
        let c = IntentClassifier::default();
        let text = "when will i get paid ah?";
        let plain = c.classify(text, &ctx(CandidateStatus::Active));
        let mut worker = ctx(CandidateStatus::Active);
        worker.has_completed_jobs = true;
        let boosted = c.classify(text, &worker);

        assert_eq!(boosted.intent, IntentCategory::PaymentInquiry);
        assert!(approx(boosted.confidence, plain.confidence * 1.1));
    }

    #[test]
    fn pending_boosts_interview_scheduling() {
        let c = IntentClassifier::default();
        let active = c.classify("interview", &ctx(CandidateStatus::Active));
        let pending = c.classify("interview", &ctx(CandidateStatus::Pending));
        assert_eq!(pending.intent, IntentCategory::InterviewScheduling);
        assert!(approx(pending.confidence, active.confidence * 1.25));
    }

    #[test]
    fn repeated_issues_boost_technical() {
        let c = IntentClassifier::default();
        let mut troubled = ctx(CandidateStatus::Active);
        troubled.recent_issue_count = 2;
        let base = c.classify("login", &ctx(CandidateStatus::Active));
        let boosted = c.classify("login", &troubled);
        assert!(approx(boosted.confidence, base.confidence * 1.15));
    }

    #[test]
    fn below_threshold_becomes_general_help() {
        let library = PatternLibrary::new(vec![CategoryPatterns::new(
            IntentCategory::UrgentEscalation,
            &[],
            &["hurry"],
            0.6,
            0.6,
        )]);
        let c = IntentClassifier::new(library);
        let best = c.classify("hurry", &ctx(CandidateStatus::Active));
        assert_eq!(best.intent, IntentCategory::GeneralHelp);
        assert!(approx(best.confidence, BELOW_THRESHOLD_CONFIDENCE));
        assert!(best.fallback_reason.unwrap().contains("urgent_escalation"));
    }

    #[test]
    fn selected_priority_is_max_of_matches() {
        let c = IntentClassifier::default();
        let library = PatternLibrary::standard();
        let samples = [
            "hi, my payment is missing and the app crashed",
            "thanks, any jobs this week?",
            "urgent, I want to complain about my salary",
            "hello can you help with my profile",
            "I got injured, accident at work",
        ];
        for text in samples {
            let max = library.scan(text).iter().map(|m| m.priority).max().unwrap();
            let best = c.classify(text, &ctx(CandidateStatus::Active));
            assert_eq!(best.priority, max, "{text}");
        }
    }

    #[test]
    fn confidence_stays_in_unit_interval() {
        let c = IntentClassifier::default();
        let mut everything = ctx(CandidateStatus::Pending);
        everything.is_off_hours = true;
        everything.recent_issue_count = 5;
        let best = c.classify(
            "urgent emergency asap sos danger need help now help me now",
            &everything,
        );
        assert!(best.confidence <= 1.0 && best.confidence >= 0.0);
    }
}
