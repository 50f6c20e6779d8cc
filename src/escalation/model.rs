//! Escalation records, priorities, and routing categories.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::types::Priority;

/// Human-queue urgency. `Urgent > High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl EscalationPriority {
    pub const ALL: [EscalationPriority; 4] = [Self::Low, Self::Medium, Self::High, Self::Urgent];

    /// Fixed response-time target for this tier.
    pub fn sla(&self) -> Duration {
        match self {
            Self::Urgent => Duration::minutes(5),
            Self::High => Duration::minutes(30),
            Self::Medium => Duration::hours(1),
            Self::Low => Duration::hours(4),
        }
    }

    /// SLA phrased for a candidate.
    pub fn human_eta(&self) -> &'static str {
        match self {
            Self::Urgent => "5 minutes",
            Self::High => "30 minutes",
            Self::Medium => "1 hour",
            Self::Low => "4 hours",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl From<Priority> for EscalationPriority {
    fn from(p: Priority) -> Self {
        match p {
            Priority::Normal => Self::Low,
            Priority::High => Self::High,
            Priority::Urgent => Self::Urgent,
        }
    }
}

impl std::fmt::Display for EscalationPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EscalationPriority {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            other => Err(format!("Unknown escalation priority: {other}")),
        }
    }
}

/// Why a message was handed to a human.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    Technical,
    Payment,
    Complaint,
    DataRequest,
    LowConfidence,
    UrgentRequest,
    ValidationFailed,
    GenerativeUnavailable,
    PipelineFault,
}

/// Routing bucket derived from the escalation reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationCategory {
    Technical,
    Payment,
    Complaint,
    DataRequest,
    LowConfidence,
    General,
}

impl EscalationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Technical => "technical",
            Self::Payment => "payment",
            Self::Complaint => "complaint",
            Self::DataRequest => "data_request",
            Self::LowConfidence => "low_confidence",
            Self::General => "general",
        }
    }
}

impl std::str::FromStr for EscalationCategory {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "technical" => Ok(Self::Technical),
            "payment" => Ok(Self::Payment),
            "complaint" => Ok(Self::Complaint),
            "data_request" => Ok(Self::DataRequest),
            "low_confidence" => Ok(Self::LowConfidence),
            "general" => Ok(Self::General),
            other => Err(format!("Unknown escalation category: {other}")),
        }
    }
}

/// Team that owns an escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Department {
    TechnicalSupport,
    Finance,
    CustomerSuccess,
    Compliance,
    Operations,
}

impl Department {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TechnicalSupport => "technical_support",
            Self::Finance => "finance",
            Self::CustomerSuccess => "customer_success",
            Self::Compliance => "compliance",
            Self::Operations => "operations",
        }
    }
}

impl std::str::FromStr for Department {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "technical_support" => Ok(Self::TechnicalSupport),
            "finance" => Ok(Self::Finance),
            "customer_success" => Ok(Self::CustomerSuccess),
            "compliance" => Ok(Self::Compliance),
            "operations" => Ok(Self::Operations),
            other => Err(format!("Unknown department: {other}")),
        }
    }
}

/// Routing properties of a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryRoute {
    pub base_priority: EscalationPriority,
    pub department: Department,
    pub requires_specialist: bool,
}

impl EscalationCategory {
    pub fn route(&self) -> CategoryRoute {
        use EscalationPriority::*;
        let (base_priority, department, requires_specialist) = match self {
            Self::Technical => (High, Department::TechnicalSupport, false),
            Self::Payment => (High, Department::Finance, true),
            Self::Complaint => (High, Department::CustomerSuccess, true),
            Self::DataRequest => (Medium, Department::Compliance, true),
            Self::LowConfidence => (Medium, Department::Operations, false),
            Self::General => (Low, Department::Operations, false),
        };
        CategoryRoute {
            base_priority,
            department,
            requires_specialist,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationStatus {
    Open,
    Resolved,
}

/// A handoff to a human operator. Never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationRecord {
    pub id: Uuid,
    pub candidate_id: String,
    pub priority: EscalationPriority,
    pub category: EscalationCategory,
    pub department: Department,
    pub requires_specialist: bool,
    pub reasons: Vec<EscalationReason>,
    /// Start of the candidate's message (max 200 chars).
    pub message_excerpt: String,
    pub created_at: DateTime<Utc>,
    /// `created_at + SLA`, fixed at creation.
    pub response_target_time: DateTime<Utc>,
    pub status: EscalationStatus,
    pub last_reminder_sent_at: Option<DateTime<Utc>>,
    pub reminder_count: u32,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl EscalationRecord {
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == EscalationStatus::Open && now > self.response_target_time
    }

    /// Whether a reminder may go out at `now` given the minimum resend interval.
    pub fn reminder_due(&self, now: DateTime<Utc>, min_interval: Duration) -> bool {
        self.is_overdue(now)
            && self
                .last_reminder_sent_at
                .is_none_or(|last| now - last >= min_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(created_at: DateTime<Utc>, priority: EscalationPriority) -> EscalationRecord {
        EscalationRecord {
            id: Uuid::new_v4(),
            candidate_id: "c-1".into(),
            priority,
            category: EscalationCategory::General,
            department: Department::Operations,
            requires_specialist: false,
            reasons: vec![EscalationReason::LowConfidence],
            message_excerpt: "hello".into(),
            created_at,
            response_target_time: created_at + priority.sla(),
            status: EscalationStatus::Open,
            last_reminder_sent_at: None,
            reminder_count: 0,
            resolved_at: None,
        }
    }

    #[test]
    fn sla_table() {
        assert_eq!(EscalationPriority::Urgent.sla(), Duration::minutes(5));
        assert_eq!(EscalationPriority::High.sla(), Duration::minutes(30));
        assert_eq!(EscalationPriority::Medium.sla(), Duration::hours(1));
        assert_eq!(EscalationPriority::Low.sla(), Duration::hours(4));
    }

    #[test]
    fn priorities_are_ordered() {
        let mut all = EscalationPriority::ALL.to_vec();
        all.reverse();
        all.sort();
        assert_eq!(all, EscalationPriority::ALL.to_vec());
    }

    #[test]
    fn overdue_and_reminder_due() {
        let created = Utc::now() - Duration::minutes(10);
        let mut r = record(created, EscalationPriority::Urgent);
        let now = Utc::now();
        assert!(r.is_overdue(now));
        assert!(r.reminder_due(now, Duration::minutes(15)));

        r.last_reminder_sent_at = Some(now - Duration::minutes(1));
        assert!(!r.reminder_due(now, Duration::minutes(15)));
        assert!(r.reminder_due(now + Duration::minutes(15), Duration::minutes(15)));

        r.status = EscalationStatus::Resolved;
        assert!(!r.is_overdue(now + Duration::hours(5)));
    }

    #[test]
    fn not_overdue_before_target() {
        let r = record(Utc::now(), EscalationPriority::Low);
        assert!(!r.is_overdue(Utc::now()));
    }

    #[test]
    fn category_routes() {
        let payment = EscalationCategory::Payment.route();
        assert_eq!(payment.department, Department::Finance);
        assert!(payment.requires_specialist);
        assert_eq!(
            EscalationCategory::General.route().base_priority,
            EscalationPriority::Low
        );
    }

    #[test]
    fn string_roundtrips() {
        for p in EscalationPriority::ALL {
            assert_eq!(p.as_str().parse::<EscalationPriority>(), Ok(p));
        }
        assert_eq!("data_request".parse(), Ok(EscalationCategory::DataRequest));
        assert_eq!("finance".parse(), Ok(Department::Finance));
    }
}
