//! Database models

use chrono::{DateTime, Utc};
use dialcast_common::types::{
    AgentId, CallRecordId, CampaignId, ContactId, PhoneNumberId, RecipientId, TemplateId, UserId,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Campaign status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Running,
    Paused,
    Recurring,
    Completed,
    Cancelled,
    Failed,
}

impl CampaignStatus {
    /// Terminal statuses are never left again by the engine
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CampaignStatus::Completed | CampaignStatus::Cancelled | CampaignStatus::Failed
        )
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CampaignStatus::Draft => write!(f, "draft"),
            CampaignStatus::Scheduled => write!(f, "scheduled"),
            CampaignStatus::Running => write!(f, "running"),
            CampaignStatus::Paused => write!(f, "paused"),
            CampaignStatus::Recurring => write!(f, "recurring"),
            CampaignStatus::Completed => write!(f, "completed"),
            CampaignStatus::Cancelled => write!(f, "cancelled"),
            CampaignStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for CampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(CampaignStatus::Draft),
            "scheduled" => Ok(CampaignStatus::Scheduled),
            "running" => Ok(CampaignStatus::Running),
            "paused" => Ok(CampaignStatus::Paused),
            "recurring" => Ok(CampaignStatus::Recurring),
            "completed" => Ok(CampaignStatus::Completed),
            "cancelled" => Ok(CampaignStatus::Cancelled),
            "failed" => Ok(CampaignStatus::Failed),
            _ => Err(format!("Invalid campaign status: {}", s)),
        }
    }
}

/// Recurrence cadence for recurring campaign parents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceType {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl std::fmt::Display for RecurrenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecurrenceType::Hourly => write!(f, "hourly"),
            RecurrenceType::Daily => write!(f, "daily"),
            RecurrenceType::Weekly => write!(f, "weekly"),
            RecurrenceType::Monthly => write!(f, "monthly"),
        }
    }
}

impl std::str::FromStr for RecurrenceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hourly" => Ok(RecurrenceType::Hourly),
            "daily" => Ok(RecurrenceType::Daily),
            "weekly" => Ok(RecurrenceType::Weekly),
            "monthly" => Ok(RecurrenceType::Monthly),
            _ => Err(format!("Invalid recurrence type: {}", s)),
        }
    }
}

/// Campaign model
///
/// One outbound-calling run, or (status `recurring`) a parent template whose
/// spawned children are the rows that actually run.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub user_id: UserId,
    pub name: String,
    pub caller_number: String,
    pub agent_id: AgentId,
    pub purpose: Option<String>,
    pub goal: Option<String>,
    pub template_id: Option<TemplateId>,
    pub send_now: bool,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub window_start: String,
    pub window_end: String,
    pub window_days: Vec<i32>,
    pub max_concurrency: i32,
    pub recurrence_type: Option<String>,
    pub recurrence_interval: i32,
    pub recurrence_end_date: Option<DateTime<Utc>>,
    pub recurrence_max_runs: Option<i32>,
    pub run_count: i32,
    pub parent_campaign_id: Option<CampaignId>,
    pub occurrence_number: Option<i32>,
    pub total_recipients: i32,
    pub completed_count: i32,
    pub failed_count: i32,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Campaign {
    /// Get status enum
    pub fn status_enum(&self) -> Option<CampaignStatus> {
        self.status.parse().ok()
    }

    /// Get recurrence type enum
    pub fn recurrence_type_enum(&self) -> Option<RecurrenceType> {
        self.recurrence_type.as_deref().and_then(|t| t.parse().ok())
    }

    /// A recurring parent holds the template; it is never dialed itself
    pub fn is_recurring_parent(&self) -> bool {
        self.recurrence_type.is_some() && self.parent_campaign_id.is_none()
    }

    /// Calculate progress percentage over terminal recipients
    pub fn progress_percentage(&self) -> f64 {
        if self.total_recipients == 0 {
            0.0
        } else {
            ((self.completed_count + self.failed_count) as f64 / self.total_recipients as f64)
                * 100.0
        }
    }
}

/// Create campaign input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCampaign {
    pub user_id: UserId,
    pub name: String,
    pub caller_number: String,
    pub agent_id: AgentId,
    pub purpose: Option<String>,
    pub goal: Option<String>,
    pub template_id: Option<TemplateId>,
    pub send_now: bool,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub window_start: String,
    pub window_end: String,
    pub window_days: Vec<i32>,
    pub max_concurrency: i32,
    pub recurrence_type: Option<RecurrenceType>,
    pub recurrence_interval: i32,
    pub recurrence_end_date: Option<DateTime<Utc>>,
    pub recurrence_max_runs: Option<i32>,
    pub parent_campaign_id: Option<CampaignId>,
    pub occurrence_number: Option<i32>,
    pub status: CampaignStatus,
}

/// Update campaign input (draft campaigns only)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCampaign {
    pub name: Option<String>,
    pub caller_number: Option<String>,
    pub agent_id: Option<AgentId>,
    pub purpose: Option<String>,
    pub goal: Option<String>,
    pub template_id: Option<TemplateId>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub window_start: Option<String>,
    pub window_end: Option<String>,
    pub window_days: Option<Vec<i32>>,
    pub max_concurrency: Option<i32>,
}

/// Recipient status
///
/// `calling` is the exclusive in-flight marker and the only status counted
/// against the concurrency budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientStatus {
    Pending,
    Calling,
    Completed,
    Failed,
    Skipped,
}

impl std::fmt::Display for RecipientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecipientStatus::Pending => write!(f, "pending"),
            RecipientStatus::Calling => write!(f, "calling"),
            RecipientStatus::Completed => write!(f, "completed"),
            RecipientStatus::Failed => write!(f, "failed"),
            RecipientStatus::Skipped => write!(f, "skipped"),
        }
    }
}

impl std::str::FromStr for RecipientStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RecipientStatus::Pending),
            "calling" => Ok(RecipientStatus::Calling),
            "completed" => Ok(RecipientStatus::Completed),
            "failed" => Ok(RecipientStatus::Failed),
            "skipped" => Ok(RecipientStatus::Skipped),
            _ => Err(format!("Invalid recipient status: {}", s)),
        }
    }
}

/// Campaign recipient model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Recipient {
    pub id: RecipientId,
    pub campaign_id: CampaignId,
    pub sort_order: i32,
    pub phone_number: String,
    pub name: Option<String>,
    pub contact_id: Option<ContactId>,
    pub call_record_id: Option<CallRecordId>,
    pub status: String,
    pub error_message: Option<String>,
    pub attempted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Recipient {
    /// Get status enum
    pub fn status_enum(&self) -> Option<RecipientStatus> {
        self.status.parse().ok()
    }
}

/// Create recipient input; campaign id and sort order are assigned on insert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecipient {
    pub phone_number: String,
    pub name: Option<String>,
    pub contact_id: Option<ContactId>,
}

/// Call record status, tracking one bridged attempt through the provider's
/// call lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Initiated,
    Ringing,
    InProgress,
    Completed,
    Busy,
    Failed,
    NoAnswer,
}

impl CallStatus {
    /// Map a provider status-callback value to our status
    pub fn from_provider(s: &str) -> Option<CallStatus> {
        match s {
            "initiated" | "queued" => Some(CallStatus::Initiated),
            "ringing" => Some(CallStatus::Ringing),
            "in-progress" | "answered" => Some(CallStatus::InProgress),
            "completed" => Some(CallStatus::Completed),
            "busy" => Some(CallStatus::Busy),
            "failed" => Some(CallStatus::Failed),
            "no-answer" => Some(CallStatus::NoAnswer),
            _ => None,
        }
    }

    /// Terminal call statuses resolve the recipient attempt
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CallStatus::Completed | CallStatus::Busy | CallStatus::Failed | CallStatus::NoAnswer
        )
    }

    /// Human-readable failure reason recorded on the recipient, if the
    /// terminal status is a failure
    pub fn failure_reason(&self) -> Option<&'static str> {
        match self {
            CallStatus::Busy => Some("Line busy"),
            CallStatus::NoAnswer => Some("No answer"),
            CallStatus::Failed => Some("Call failed"),
            _ => None,
        }
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallStatus::Initiated => write!(f, "initiated"),
            CallStatus::Ringing => write!(f, "ringing"),
            CallStatus::InProgress => write!(f, "in_progress"),
            CallStatus::Completed => write!(f, "completed"),
            CallStatus::Busy => write!(f, "busy"),
            CallStatus::Failed => write!(f, "failed"),
            CallStatus::NoAnswer => write!(f, "no_answer"),
        }
    }
}

impl std::str::FromStr for CallStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initiated" => Ok(CallStatus::Initiated),
            "ringing" => Ok(CallStatus::Ringing),
            "in_progress" => Ok(CallStatus::InProgress),
            "completed" => Ok(CallStatus::Completed),
            "busy" => Ok(CallStatus::Busy),
            "failed" => Ok(CallStatus::Failed),
            "no_answer" => Ok(CallStatus::NoAnswer),
            _ => Err(format!("Invalid call status: {}", s)),
        }
    }
}

/// Call record model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CallRecord {
    pub id: CallRecordId,
    pub user_id: UserId,
    pub campaign_id: Option<CampaignId>,
    pub recipient_id: Option<RecipientId>,
    pub contact_id: Option<ContactId>,
    pub to_number: String,
    pub from_number: String,
    pub direction: String,
    pub status: String,
    pub provider_call_id: Option<String>,
    pub conference_name: Option<String>,
    pub call_purpose: Option<String>,
    pub call_goal: Option<String>,
    pub template_id: Option<TemplateId>,
    pub duration_seconds: i32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CallRecord {
    /// Get status enum
    pub fn status_enum(&self) -> Option<CallStatus> {
        self.status.parse().ok()
    }
}

/// Create call record input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCallRecord {
    pub user_id: UserId,
    pub campaign_id: Option<CampaignId>,
    pub recipient_id: Option<RecipientId>,
    pub contact_id: Option<ContactId>,
    pub to_number: String,
    pub from_number: String,
    pub conference_name: Option<String>,
    pub call_purpose: Option<String>,
    pub call_goal: Option<String>,
    pub template_id: Option<TemplateId>,
}

/// Provisioned phone number model, used to validate campaign caller ids
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PhoneNumber {
    pub id: PhoneNumberId,
    pub user_id: UserId,
    pub number: String,
    pub label: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl PhoneNumber {
    /// Only active numbers may originate calls
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

/// Per-status recipient counts for one campaign
#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize)]
pub struct CampaignRecipientCounts {
    pub pending: i64,
    pub calling: i64,
    pub completed: i64,
    pub failed: i64,
    pub skipped: i64,
}

impl CampaignRecipientCounts {
    /// Total recipients across all statuses
    pub fn total(&self) -> i64 {
        self.pending + self.calling + self.completed + self.failed + self.skipped
    }

    /// A campaign is drained when nothing is waiting and nothing is in flight
    pub fn is_drained(&self) -> bool {
        self.pending == 0 && self.calling == 0
    }
}

/// Campaign statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignStats {
    pub campaign_id: CampaignId,
    pub status: String,
    pub total_recipients: i32,
    pub pending: i64,
    pub calling: i64,
    pub completed: i64,
    pub failed: i64,
    pub skipped: i64,
    pub completed_count: i32,
    pub failed_count: i32,
    pub progress_percentage: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn campaign_status_round_trips() {
        for status in [
            CampaignStatus::Draft,
            CampaignStatus::Scheduled,
            CampaignStatus::Running,
            CampaignStatus::Paused,
            CampaignStatus::Recurring,
            CampaignStatus::Completed,
            CampaignStatus::Cancelled,
            CampaignStatus::Failed,
        ] {
            let parsed: CampaignStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("sending".parse::<CampaignStatus>().is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(CampaignStatus::Completed.is_terminal());
        assert!(CampaignStatus::Cancelled.is_terminal());
        assert!(CampaignStatus::Failed.is_terminal());
        assert!(!CampaignStatus::Running.is_terminal());
        assert!(!CampaignStatus::Recurring.is_terminal());
        assert!(!CampaignStatus::Paused.is_terminal());
    }

    #[test]
    fn provider_status_mapping() {
        assert_eq!(CallStatus::from_provider("initiated"), Some(CallStatus::Initiated));
        assert_eq!(CallStatus::from_provider("ringing"), Some(CallStatus::Ringing));
        assert_eq!(CallStatus::from_provider("in-progress"), Some(CallStatus::InProgress));
        assert_eq!(CallStatus::from_provider("answered"), Some(CallStatus::InProgress));
        assert_eq!(CallStatus::from_provider("completed"), Some(CallStatus::Completed));
        assert_eq!(CallStatus::from_provider("busy"), Some(CallStatus::Busy));
        assert_eq!(CallStatus::from_provider("failed"), Some(CallStatus::Failed));
        assert_eq!(CallStatus::from_provider("no-answer"), Some(CallStatus::NoAnswer));
        assert_eq!(CallStatus::from_provider("canceled-by-unicorns"), None);
    }

    #[test]
    fn terminal_call_statuses_and_reasons() {
        assert!(CallStatus::Completed.is_terminal());
        assert!(CallStatus::Busy.is_terminal());
        assert!(CallStatus::NoAnswer.is_terminal());
        assert!(!CallStatus::Ringing.is_terminal());

        assert_eq!(CallStatus::Busy.failure_reason(), Some("Line busy"));
        assert_eq!(CallStatus::NoAnswer.failure_reason(), Some("No answer"));
        assert_eq!(CallStatus::Failed.failure_reason(), Some("Call failed"));
        assert_eq!(CallStatus::Completed.failure_reason(), None);
    }

    #[test]
    fn drained_counts() {
        let mut counts = CampaignRecipientCounts {
            pending: 0,
            calling: 0,
            completed: 2,
            failed: 1,
            skipped: 0,
        };
        assert!(counts.is_drained());
        assert_eq!(counts.total(), 3);

        counts.calling = 1;
        assert!(!counts.is_drained());
    }

    #[test]
    fn progress_over_terminal_recipients() {
        let campaign = Campaign {
            id: uuid::Uuid::new_v4(),
            user_id: uuid::Uuid::new_v4(),
            name: "test".to_string(),
            caller_number: "+15550001111".to_string(),
            agent_id: uuid::Uuid::new_v4(),
            purpose: None,
            goal: None,
            template_id: None,
            send_now: false,
            scheduled_at: None,
            window_start: "00:00".to_string(),
            window_end: "23:59".to_string(),
            window_days: vec![0, 1, 2, 3, 4, 5, 6],
            max_concurrency: 2,
            recurrence_type: None,
            recurrence_interval: 1,
            recurrence_end_date: None,
            recurrence_max_runs: None,
            run_count: 0,
            parent_campaign_id: None,
            occurrence_number: None,
            total_recipients: 4,
            completed_count: 1,
            failed_count: 1,
            status: "running".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };
        assert_eq!(campaign.progress_percentage(), 50.0);
        assert_eq!(campaign.status_enum(), Some(CampaignStatus::Running));
        assert!(!campaign.is_recurring_parent());
    }
}
