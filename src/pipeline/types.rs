//! Shared types for the routing pipeline.

use std::collections::BTreeMap;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Channels ────────────────────────────────────────────────────────

/// Chat channel a message arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Whatsapp,
    Telegram,
    Sms,
    Web,
}

/// How a channel renders text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStyle {
    /// Rich client: keeps emphasis and bullet markers.
    Structured,
    /// Chat-app style: plain sentences, contractions, few emoji.
    Conversational,
}

impl Channel {
    pub fn style(&self) -> ChannelStyle {
        match self {
            Self::Web => ChannelStyle::Structured,
            Self::Whatsapp | Self::Telegram | Self::Sms => ChannelStyle::Conversational,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Whatsapp => "whatsapp",
            Self::Telegram => "telegram",
            Self::Sms => "sms",
            Self::Web => "web",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Inbound message ─────────────────────────────────────────────────

/// A chat message from a candidate. Built once per request, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: Uuid,
    pub candidate_id: String,
    pub text: String,
    pub channel: Channel,
    pub timestamp: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(candidate_id: impl Into<String>, text: impl Into<String>, channel: Channel) -> Self {
        Self {
            id: Uuid::new_v4(),
            candidate_id: candidate_id.into(),
            text: text.into(),
            channel,
            timestamp: Utc::now(),
        }
    }

    /// First `max` characters of the text, for logs and audit records.
    pub fn excerpt(&self, max: usize) -> String {
        self.text.chars().take(max).collect()
    }
}

/// A prior turn of the conversation, supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// "candidate" or "assistant".
    pub role: String,
    pub content: String,
}

impl ConversationTurn {
    pub fn candidate(content: impl Into<String>) -> Self {
        Self {
            role: "candidate".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

/// Extra context a transport may pass along with a message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallerContext {
    /// Recent conversation turns, oldest first.
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
    /// The transport already knows this is urgent (e.g. an SOS button).
    #[serde(default)]
    pub urgent: bool,
}

// ── Candidate status ────────────────────────────────────────────────

/// Lifecycle status of a candidate on the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    /// Signed up, awaiting verification interview.
    Pending,
    /// Verified and able to take jobs.
    Active,
    Suspended,
    Inactive,
    #[default]
    Unknown,
}

impl CandidateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Inactive => "inactive",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CandidateStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            "inactive" => Ok(Self::Inactive),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("Unknown candidate status: {other}")),
        }
    }
}

// ── Time of day ─────────────────────────────────────────────────────

/// Coarse time-of-day bucket, evaluated in business time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => Self::Morning,
            12..=16 => Self::Afternoon,
            17..=21 => Self::Evening,
            _ => Self::Night,
        }
    }

    pub fn of<Tz: chrono::TimeZone>(time: &DateTime<Tz>) -> Self {
        Self::from_hour(time.hour())
    }
}

// ── Intents & priority ──────────────────────────────────────────────

/// Classified purpose of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentCategory {
    UrgentEscalation,
    PaymentInquiry,
    TechnicalSupport,
    Complaint,
    InterviewScheduling,
    VerificationStatus,
    AccountManagement,
    JobSearch,
    Greeting,
    Gratitude,
    GeneralHelp,
}

impl IntentCategory {
    pub const ALL: [IntentCategory; 11] = [
        Self::UrgentEscalation,
        Self::PaymentInquiry,
        Self::TechnicalSupport,
        Self::Complaint,
        Self::InterviewScheduling,
        Self::VerificationStatus,
        Self::AccountManagement,
        Self::JobSearch,
        Self::Greeting,
        Self::Gratitude,
        Self::GeneralHelp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UrgentEscalation => "urgent_escalation",
            Self::PaymentInquiry => "payment_inquiry",
            Self::TechnicalSupport => "technical_support",
            Self::Complaint => "complaint",
            Self::InterviewScheduling => "interview_scheduling",
            Self::VerificationStatus => "verification_status",
            Self::AccountManagement => "account_management",
            Self::JobSearch => "job_search",
            Self::Greeting => "greeting",
            Self::Gratitude => "gratitude",
            Self::GeneralHelp => "general_help",
        }
    }

    /// Minimum confidence a match must reach to be trusted.
    pub fn min_confidence(&self) -> f32 {
        match self {
            Self::UrgentEscalation => 0.7,
            Self::PaymentInquiry | Self::TechnicalSupport | Self::Complaint => 0.5,
            Self::InterviewScheduling | Self::VerificationStatus | Self::AccountManagement => 0.45,
            Self::JobSearch => 0.4,
            Self::Greeting | Self::Gratitude => 0.3,
            Self::GeneralHelp => 0.2,
        }
    }

    pub fn priority(&self) -> Priority {
        match self {
            Self::UrgentEscalation => Priority::Urgent,
            Self::PaymentInquiry | Self::TechnicalSupport | Self::Complaint => Priority::High,
            _ => Priority::Normal,
        }
    }
}

impl std::fmt::Display for IntentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Urgency tier of an intent match. `Urgent > High > Normal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Normal,
    High,
    Urgent,
}

// ── Classification results ──────────────────────────────────────────

/// One pattern hit against one intent category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentMatch {
    pub category: IntentCategory,
    pub confidence: f32,
    pub priority: Priority,
    pub matched_pattern: String,
    pub keywords: Vec<String>,
}

/// The single match the classifier settled on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BestMatch {
    pub intent: IntentCategory,
    pub confidence: f32,
    pub priority: Priority,
    pub matched_pattern: Option<String>,
    pub keywords: Vec<String>,
    /// Other matches for the winning intent.
    pub alternatives: Vec<IntentMatch>,
    /// Why the general-help fallback replaced the raw match, if it did.
    pub fallback_reason: Option<String>,
    pub elapsed_micros: u64,
}

impl BestMatch {
    pub fn is_fallback(&self) -> bool {
        self.fallback_reason.is_some()
    }
}

// ── Responses ───────────────────────────────────────────────────────

/// What kind of message a response is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    SlotOffer,
    BookingConfirmation,
    Escalation,
}

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Internal,
    Cache,
    Generative,
    Escalation,
}

/// Advisory UI affordance. Rendering it is the transport's business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickAction {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

impl QuickAction {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// A reply on its way back to the candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResponse {
    pub content: String,
    pub intent: IntentCategory,
    pub confidence: f32,
    pub message_type: MessageType,
    pub next_actions: Vec<QuickAction>,
    pub escalate: bool,
    pub source: ResponseSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_id: Option<Uuid>,
}

impl CandidateResponse {
    pub fn text(
        content: impl Into<String>,
        intent: IntentCategory,
        confidence: f32,
        source: ResponseSource,
    ) -> Self {
        Self {
            content: content.into(),
            intent,
            confidence,
            message_type: MessageType::Text,
            next_actions: Vec::new(),
            escalate: false,
            source,
            escalation_id: None,
        }
    }

    pub fn with_actions(mut self, actions: Vec<QuickAction>) -> Self {
        self.next_actions = actions;
        self
    }

    pub fn with_message_type(mut self, message_type: MessageType) -> Self {
        self.message_type = message_type;
        self
    }

    pub fn escalating(mut self) -> Self {
        self.escalate = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_is_totally_ordered() {
        assert!(Priority::Urgent > Priority::High);
        assert!(Priority::High > Priority::Normal);
        let mut tiers = vec![Priority::High, Priority::Urgent, Priority::Normal];
        tiers.sort();
        assert_eq!(tiers, vec![Priority::Normal, Priority::High, Priority::Urgent]);
    }

    #[test]
    fn intent_display_matches_serde() {
        for intent in IntentCategory::ALL {
            let json = serde_json::to_string(&intent).unwrap();
            assert_eq!(format!("\"{intent}\""), json);
        }
    }

    #[test]
    fn thresholds_span_urgent_to_general_help() {
        assert_eq!(IntentCategory::UrgentEscalation.min_confidence(), 0.7);
        assert_eq!(IntentCategory::GeneralHelp.min_confidence(), 0.2);
        for intent in IntentCategory::ALL {
            let t = intent.min_confidence();
            assert!((0.2..=0.7).contains(&t), "{intent} threshold {t}");
        }
    }

    #[test]
    fn channel_styles() {
        assert_eq!(Channel::Web.style(), ChannelStyle::Structured);
        assert_eq!(Channel::Whatsapp.style(), ChannelStyle::Conversational);
        assert_eq!(Channel::Sms.style(), ChannelStyle::Conversational);
    }

    #[test]
    fn time_of_day_buckets() {
        assert_eq!(TimeOfDay::from_hour(9), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(14), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(19), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_hour(2), TimeOfDay::Night);
    }

    #[test]
    fn candidate_status_parses() {
        assert_eq!("pending".parse::<CandidateStatus>(), Ok(CandidateStatus::Pending));
        assert!("banana".parse::<CandidateStatus>().is_err());
    }

    #[test]
    fn response_serialization_omits_empty_fields() {
        let response = CandidateResponse::text(
            "Thanks for reaching out to us!",
            IntentCategory::Greeting,
            0.8,
            ResponseSource::Internal,
        );
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["intent"], "greeting");
        assert_eq!(json["source"], "internal");
        assert_eq!(json["message_type"], "text");
        assert!(json.get("escalation_id").is_none());
    }

    #[test]
    fn quick_action_params_roundtrip() {
        let action = QuickAction::new("select_slot", "Pick slot 1").with_param("index", "1");
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["params"]["index"], "1");
        let bare = serde_json::to_value(QuickAction::new("browse_jobs", "Browse jobs")).unwrap();
        assert!(bare.get("params").is_none());
    }
}
