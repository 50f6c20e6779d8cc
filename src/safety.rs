//! Response validator: the single safety and policy gate every outbound
//! response passes through, whatever produced it.
//!
//! Six gates, all of which must pass:
//! structural, content, anti-overpromise, safety, confidence, and intent.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::pipeline::types::{CandidateResponse, IntentCategory};

pub const MAX_ACTIONS: usize = 4;
pub const MIN_CONTENT_CHARS: usize = 10;
pub const MAX_CONTENT_CHARS: usize = 500;
pub const MAX_EMOJI: usize = 5;
const MAX_PUNCTUATION_RATIO: f32 = 0.3;
const MAX_CAPS_RATIO: f32 = 0.5;
const CAPS_MIN_LETTERS: usize = 20;

/// The gate a check belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gate {
    Structural,
    Content,
    Overpromise,
    Safety,
    Confidence,
    Intent,
}

impl Gate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structural => "structural",
            Self::Content => "content",
            Self::Overpromise => "overpromise",
            Self::Safety => "safety",
            Self::Confidence => "confidence",
            Self::Intent => "intent",
        }
    }
}

impl std::fmt::Display for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of validation.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    /// Names of the failed gates, deduplicated, in gate order.
    pub fn failed_gates(&self) -> Vec<String> {
        let mut gates: Vec<Gate> = Vec::new();
        for e in &self.errors {
            if !gates.contains(&e.gate) {
                gates.push(e.gate);
            }
        }
        gates.iter().map(|g| g.as_str().to_string()).collect()
    }

    pub fn failed(&self, gate: Gate) -> bool {
        self.errors.iter().any(|e| e.gate == gate)
    }
}

/// A validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub gate: Gate,
    pub message: String,
}

impl ValidationError {
    fn new(gate: Gate, message: impl Into<String>) -> Self {
        Self {
            gate,
            message: message.into(),
        }
    }
}

// ── Overpromise patterns ────────────────────────────────────────────

const BANNED_PHRASES: &[&str] = &[
    // Timing guarantees
    "right away",
    "immediately",
    "instantly",
    "in no time",
    "as we speak",
    // False action claims
    "i've notified",
    "i have notified",
    "i've escalated",
    "i have escalated",
    "i've forwarded",
    "i've booked",
    "i've processed",
    "i've fixed",
    "i've approved",
    "i've transferred",
    // Absolute guarantees
    "guaranteed",
    "we guarantee",
    "i guarantee",
    "i promise",
    "we promise",
    "100%",
    "100 percent",
    "without fail",
    "never happen again",
];

static TIME_COMMITMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:within|in)\s+(?:the\s+next\s+)?\d+\s*(?:seconds?|secs?|minutes?|mins?|hours?|hrs?|days?)\b|\b(?:by|before)\s+(?:today|tonight|tomorrow|end of (?:the )?day)\b",
    )
    .expect("valid time commitment regex")
});

static ACTION_CLAIM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:i|we)(?:'ve|'ll| have| will| just| already)*\s+(?:already\s+|just\s+)?(?:notified|escalated|forwarded|booked|processed|fixed|sent|transferred|refunded|approved|resolved|contacted|informed|alerted)\b",
    )
    .expect("valid action claim regex")
});

static SYSTEM_STATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:has|have)\s+(?:now\s+)?been\s+(?:approved|confirmed|processed|resolved|fixed|refunded|credited|transferred|verified)\b|\byour\s+(?:account|payment|application|verification|issue)\s+is\s+(?:now\s+)?(?:approved|verified|fixed|resolved|processed)\b",
    )
    .expect("valid system state regex")
});

static PROFANITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:fuck\w*|shit\w*|bitch\w*|bastard\w*|asshole\w*|cunt\w*|dickhead\w*|wtf|stfu|retard\w*|idiot\w*|moron\w*|slut\w*|whore\w*)\b",
    )
    .expect("valid profanity regex")
});

// ── Character classes ───────────────────────────────────────────────

const ALLOWED_PUNCTUATION: &str = ".,!?'\"’‘“”:;-–()/&%$#@*+=_~•…";

pub fn is_emoji(c: char) -> bool {
    matches!(
        c as u32,
        0x1F300..=0x1FAFF | 0x2600..=0x27BF | 0x1F1E6..=0x1F1FF | 0x2B50 | 0x2B55
    )
}

/// Invisible joiners and selectors that ride along with emoji.
pub fn is_emoji_modifier(c: char) -> bool {
    matches!(c as u32, 0xFE0F | 0x200D | 0x1F3FB..=0x1F3FF)
}

fn is_allowed_char(c: char) -> bool {
    c.is_alphanumeric()
        || c == ' '
        || c == '\n'
        || ALLOWED_PUNCTUATION.contains(c)
        || is_emoji(c)
        || is_emoji_modifier(c)
}

/// Count of visible emoji in `text`.
pub fn emoji_count(text: &str) -> usize {
    text.chars()
        .filter(|c| is_emoji(*c) && !is_emoji_modifier(*c))
        .count()
}

/// Lowercase with typographic apostrophes unified.
fn fold(text: &str) -> String {
    text.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'")
}

// ── Validator ───────────────────────────────────────────────────────

/// Validates candidate-facing responses.
#[derive(Debug, Clone)]
pub struct ResponseValidator {
    allowed_intents: HashSet<IntentCategory>,
}

impl ResponseValidator {
    /// Validator that allows every intent.
    pub fn new() -> Self {
        Self {
            allowed_intents: IntentCategory::ALL.into_iter().collect(),
        }
    }

    /// Restrict gate (f) to the given intents.
    pub fn with_allowed_intents(intents: impl IntoIterator<Item = IntentCategory>) -> Self {
        Self {
            allowed_intents: intents.into_iter().collect(),
        }
    }

    /// Run every gate. Never short-circuits, so all failures are reported.
    pub fn validate(&self, response: &CandidateResponse) -> ValidationResult {
        let mut errors = Vec::new();
        check_structure(response, &mut errors);
        check_content(&response.content, &mut errors);
        check_overpromise(&response.content, &mut errors);
        check_safety(&response.content, &mut errors);

        if !response.confidence.is_finite() || !(0.0..=1.0).contains(&response.confidence) {
            errors.push(ValidationError::new(
                Gate::Confidence,
                format!("confidence {} outside [0, 1]", response.confidence),
            ));
        }
        if !self.allowed_intents.contains(&response.intent) {
            errors.push(ValidationError::new(
                Gate::Intent,
                format!("intent {} not allowed", response.intent),
            ));
        }

        let result = ValidationResult {
            is_valid: errors.is_empty(),
            errors,
        };
        if !result.is_valid {
            debug!(gates = ?result.failed_gates(), intent = %response.intent, "Response rejected");
        }
        result
    }

    pub fn is_valid(&self, response: &CandidateResponse) -> bool {
        self.validate(response).is_valid
    }
}

impl Default for ResponseValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn check_structure(response: &CandidateResponse, errors: &mut Vec<ValidationError>) {
    if response.content.trim().is_empty() {
        errors.push(ValidationError::new(Gate::Structural, "empty content"));
    }
    if response.next_actions.len() > MAX_ACTIONS {
        errors.push(ValidationError::new(
            Gate::Structural,
            format!("{} quick actions exceeds {MAX_ACTIONS}", response.next_actions.len()),
        ));
    }
    let mut seen = HashSet::new();
    for action in &response.next_actions {
        if action.id.trim().is_empty() {
            errors.push(ValidationError::new(Gate::Structural, "quick action with empty id"));
        } else if !seen.insert(action.id.as_str()) {
            errors.push(ValidationError::new(
                Gate::Structural,
                format!("duplicate quick action id {}", action.id),
            ));
        }
    }
}

fn check_content(content: &str, errors: &mut Vec<ValidationError>) {
    let chars = content.chars().count();
    if !(MIN_CONTENT_CHARS..=MAX_CONTENT_CHARS).contains(&chars) {
        errors.push(ValidationError::new(
            Gate::Content,
            format!("length {chars} outside {MIN_CONTENT_CHARS}..={MAX_CONTENT_CHARS}"),
        ));
    }

    if let Some(bad) = content.chars().find(|c| !is_allowed_char(*c)) {
        errors.push(ValidationError::new(
            Gate::Content,
            format!("disallowed character {bad:?}"),
        ));
    }

    let word_count = content.split_whitespace().count();
    let limit = (word_count / 5).max(3);
    let mut counts: HashMap<String, usize> = HashMap::new();
    for word in content
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
    {
        *counts.entry(word.to_lowercase()).or_default() += 1;
    }
    if let Some((word, n)) = counts.iter().find(|(_, n)| **n > limit) {
        errors.push(ValidationError::new(
            Gate::Content,
            format!("word {word:?} repeated {n} times"),
        ));
    }
}

fn check_overpromise(content: &str, errors: &mut Vec<ValidationError>) {
    let folded = fold(content);
    if let Some(phrase) = BANNED_PHRASES.iter().find(|p| folded.contains(*p)) {
        errors.push(ValidationError::new(
            Gate::Overpromise,
            format!("banned phrase {phrase:?}"),
        ));
    }
    for (family, re) in [
        ("time commitment", &*TIME_COMMITMENT_RE),
        ("action claim", &*ACTION_CLAIM_RE),
        ("system state claim", &*SYSTEM_STATE_RE),
    ] {
        if let Some(m) = re.find(&folded) {
            errors.push(ValidationError::new(
                Gate::Overpromise,
                format!("{family}: {:?}", m.as_str()),
            ));
        }
    }
}

fn check_safety(content: &str, errors: &mut Vec<ValidationError>) {
    let folded = fold(content);
    if PROFANITY_RE.is_match(&folded) {
        errors.push(ValidationError::new(Gate::Safety, "profanity"));
    }

    let visible: Vec<char> = content.chars().filter(|c| !c.is_whitespace()).collect();
    if !visible.is_empty() {
        let punct = visible.iter().filter(|c| c.is_ascii_punctuation()).count();
        let ratio = punct as f32 / visible.len() as f32;
        if ratio > MAX_PUNCTUATION_RATIO {
            errors.push(ValidationError::new(
                Gate::Safety,
                format!("punctuation density {ratio:.2}"),
            ));
        }
    }

    let letters: Vec<char> = content.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() >= CAPS_MIN_LETTERS {
        let upper = letters.iter().filter(|c| c.is_uppercase()).count();
        let ratio = upper as f32 / letters.len() as f32;
        if ratio > MAX_CAPS_RATIO {
            errors.push(ValidationError::new(
                Gate::Safety,
                format!("caps ratio {ratio:.2}"),
            ));
        }
    }

    let emoji = emoji_count(content);
    if emoji > MAX_EMOJI {
        errors.push(ValidationError::new(
            Gate::Safety,
            format!("{emoji} emoji exceeds {MAX_EMOJI}"),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{QuickAction, ResponseSource};

    fn response(content: &str) -> CandidateResponse {
        CandidateResponse::text(
            content,
            IntentCategory::GeneralHelp,
            0.8,
            ResponseSource::Internal,
        )
    }

    fn gates(content: &str) -> Vec<String> {
        ResponseValidator::new().validate(&response(content)).failed_gates()
    }

    #[test]
    fn overpromises_injected_into_templates_are_rejected() {
        use crate::pipeline::types::ChannelStyle;
        use crate::responses::TemplateFamily;

        let regex_samples = [
            "You will hear back within 2 hours",
            "We have notified the finance team",
            "Your payment has been approved",
        ];
        let validator = ResponseValidator::new();
        for family in TemplateFamily::ALL {
            for style in [ChannelStyle::Structured, ChannelStyle::Conversational] {
                for variant in family.variants(style) {
                    for phrase in BANNED_PHRASES.iter().copied().chain(regex_samples) {
                        for content in [
                            format!("{variant} {phrase}."),
                            format!("{} {variant}", phrase.to_uppercase()),
                        ] {
                            let result = validator.validate(&response(&content));
                            assert!(
                                result.failed(Gate::Overpromise),
                                "{}: {content:?}",
                                family.name()
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn plain_reply_passes() {
        let v = ResponseValidator::new();
        let r = response("Thanks for your message! Our team will look into it and reply soon. 😊");
        let result = v.validate(&r);
        assert!(result.is_valid, "{:?}", result.errors);
    }

    #[test]
    fn structural_gate() {
        let v = ResponseValidator::new();
        let too_many = response("Here are a few things you can do next.").with_actions(
            (0..5).map(|i| QuickAction::new(format!("a{i}"), "Go")).collect(),
        );
        assert!(v.validate(&too_many).failed(Gate::Structural));

        let dupes = response("Here are a few things you can do next.").with_actions(vec![
            QuickAction::new("same", "One"),
            QuickAction::new("same", "Two"),
        ]);
        assert!(v.validate(&dupes).failed(Gate::Structural));

        let blank_id = response("Here are a few things you can do next.")
            .with_actions(vec![QuickAction::new(" ", "One")]);
        assert!(v.validate(&blank_id).failed(Gate::Structural));

        assert!(v.validate(&response("   ")).failed(Gate::Structural));
    }

    #[test]
    fn content_length_bounds() {
        assert!(gates("Too short").contains(&"content".to_string()));
        assert!(gates(&"word ".repeat(120)).contains(&"content".to_string()));
    }

    #[test]
    fn unfilled_placeholders_rejected() {
        assert_eq!(gates("Hi {first_name}, how can we help today?"), vec!["content"]);
        assert_eq!(gates("Hello <b>there</b>, how can we help?"), vec!["content"]);
        assert_eq!(gates("Path C:\\temp is not a reply here"), vec!["content"]);
    }

    #[test]
    fn repeated_words_rejected() {
        assert!(gates("help help help help me with this").contains(&"content".to_string()));
        // Short words do not count.
        assert!(gates("a a a a a is fine for this short reply").is_empty());
    }

    #[test]
    fn overpromise_phrases_and_families() {
        for bad in [
            "I've notified the team about your payment.",
            "We have escalated this to the finance group.",
            "Someone will reply within 5 minutes, hang on.",
            "Your account has been approved, welcome aboard!",
            "We guarantee you will get paid on Friday.",
            "We will fix this right away for you.",
            "Your payment is now processed, thanks for waiting.",
        ] {
            assert!(
                gates(bad).contains(&"overpromise".to_string()),
                "should reject: {bad}"
            );
        }
    }

    #[test]
    fn honest_acknowledgements_pass() {
        for ok in [
            "Thanks for flagging this. A member of our support team will follow up. Expected response time: about 30 minutes.",
            "You're booked in for Monday 10:00. Here is your link: https://meet.example.com/abc",
            "We've received your message and a person from our team will take a look.",
        ] {
            assert!(gates(ok).is_empty(), "should pass: {ok} -> {:?}", gates(ok));
        }
    }

    #[test]
    fn safety_gate() {
        assert!(gates("This is shit service, sorry about that.").contains(&"safety".to_string()));
        assert!(gates("!!!???!!!??? what ...").contains(&"safety".to_string()));
        assert!(gates("PLEASE CALL US NOW ABOUT THIS ISSUE").contains(&"safety".to_string()));
        assert!(gates("Great news 🎉🎉🎉🎉🎉🎉 for you").contains(&"safety".to_string()));
        // Short shouty text is below the caps threshold.
        assert!(gates("OK, noted. Thanks!").is_empty());
    }

    #[test]
    fn confidence_gate() {
        let v = ResponseValidator::new();
        let mut r = response("A perfectly reasonable reply.");
        r.confidence = 1.5;
        assert!(v.validate(&r).failed(Gate::Confidence));
        r.confidence = f32::NAN;
        assert!(v.validate(&r).failed(Gate::Confidence));
    }

    #[test]
    fn intent_allow_list() {
        let v = ResponseValidator::with_allowed_intents([IntentCategory::Greeting]);
        let r = response("A perfectly reasonable reply.");
        assert_eq!(v.validate(&r).failed_gates(), vec!["intent"]);
    }

    #[test]
    fn reports_every_failed_gate() {
        let mut r = response("I've booked it {slot}");
        r.confidence = -0.1;
        let result = ResponseValidator::new().validate(&r);
        assert_eq!(
            result.failed_gates(),
            vec!["content", "overpromise", "confidence"]
        );
    }
}
