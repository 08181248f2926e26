use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    PendingInvite,
    InviteSent,
    Connected,
    Messaged,
    Responded,
    Completed,
    Error,
}

impl LeadStatus {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::PendingInvite => "pending_invite",
            LeadStatus::InviteSent => "invite_sent",
            LeadStatus::Connected => "connected",
            LeadStatus::Messaged => "messaged",
            LeadStatus::Responded => "responded",
            LeadStatus::Completed => "completed",
            LeadStatus::Error => "error",
        }
    }

    pub(crate) fn parse(raw: &str) -> Result<Self, SequencerError> {
        match raw {
            "pending_invite" => Ok(LeadStatus::PendingInvite),
            "invite_sent" => Ok(LeadStatus::InviteSent),
            "connected" => Ok(LeadStatus::Connected),
            "messaged" => Ok(LeadStatus::Messaged),
            "responded" => Ok(LeadStatus::Responded),
            "completed" => Ok(LeadStatus::Completed),
            "error" => Ok(LeadStatus::Error),
            other => Err(SequencerError::Storage(format!(
                "unknown lead status {}",
                other
            ))),
        }
    }

    /// Statuses the scheduler actively polls for pending work.
    pub fn is_processable(&self) -> bool {
        matches!(
            self,
            LeadStatus::PendingInvite | LeadStatus::Connected | LeadStatus::Messaged
        )
    }
}

#[derive(Debug, Clone)]
pub struct Lead {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub public_identifier: String,
    /// Provider-internal opaque id, cached after the first resolution.
    pub member_id: Option<String>,
    pub conversation_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub position: String,
    pub location: String,
    pub industry: String,
    /// Already a first-level connection; bypasses invite-specific gating.
    pub first_level: bool,
    pub status: LeadStatus,
    pub current_step: usize,
    pub last_step_sent_at: Option<DateTime<Utc>>,
    pub invite_sent_at: Option<DateTime<Utc>>,
    pub last_message_sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignStatus {
    Active,
    Paused,
    Archived,
}

impl CampaignStatus {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Active => "active",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Archived => "archived",
        }
    }

    pub(crate) fn parse(raw: &str) -> Result<Self, SequencerError> {
        match raw {
            "active" => Ok(CampaignStatus::Active),
            "paused" => Ok(CampaignStatus::Paused),
            "archived" => Ok(CampaignStatus::Archived),
            other => Err(SequencerError::Storage(format!(
                "unknown campaign status {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    pub client_id: String,
    pub status: CampaignStatus,
    /// IANA timezone name; anything unresolvable falls back to UTC.
    pub timezone: String,
    pub sequence: Vec<Step>,
}

impl Campaign {
    pub fn tz(&self) -> Tz {
        calendar::resolve_timezone(&self.timezone)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    ConnectionRequest,
    Message,
}

impl StepAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepAction::ConnectionRequest => "connection_request",
            StepAction::Message => "message",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub step_order: usize,
    #[serde(rename = "action_type")]
    pub action: StepAction,
    pub message: String,
    #[serde(default)]
    pub delay_hours: i64,
    #[serde(default)]
    pub delay_working_days: i64,
    #[serde(default)]
    pub min_delay_hours: Option<i64>,
    #[serde(default)]
    pub min_delay_working_days: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    Connected,
    Disconnected,
}

impl AccountStatus {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Connected => "connected",
            AccountStatus::Disconnected => "disconnected",
        }
    }

    pub(crate) fn parse(raw: &str) -> Result<Self, SequencerError> {
        match raw {
            "connected" => Ok(AccountStatus::Connected),
            "disconnected" => Ok(AccountStatus::Disconnected),
            other => Err(SequencerError::Storage(format!(
                "unknown account status {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LinkedInAccount {
    pub account_id: String,
    pub client_id: String,
    pub status: AccountStatus,
}

/// Per-account, per-day outbound counters. A missing row reads as zeros.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateUsage {
    pub invites_sent: i64,
    pub messages_sent: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    ConnectionRequestSent,
    ConnectionRequestFailed,
    MessageSent,
    MessageFailed,
    StepExecuted,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ConnectionRequestSent => "connection_request_sent",
            EventKind::ConnectionRequestFailed => "connection_request_failed",
            EventKind::MessageSent => "message_sent",
            EventKind::MessageFailed => "message_failed",
            EventKind::StepExecuted => "step_executed",
        }
    }

    pub(crate) fn parse(raw: &str) -> Result<Self, SequencerError> {
        match raw {
            "connection_request_sent" => Ok(EventKind::ConnectionRequestSent),
            "connection_request_failed" => Ok(EventKind::ConnectionRequestFailed),
            "message_sent" => Ok(EventKind::MessageSent),
            "message_failed" => Ok(EventKind::MessageFailed),
            "step_executed" => Ok(EventKind::StepExecuted),
            other => Err(SequencerError::Storage(format!(
                "unknown event type {}",
                other
            ))),
        }
    }
}

/// Append-only audit record of one attempted action.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub kind: EventKind,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Payload for the executor's domain events (sent/failed).
#[derive(Debug, Clone, Serialize)]
pub struct ActionEventPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_response: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Payload for the engine's execution-audit event.
#[derive(Debug, Clone, Serialize)]
pub struct StepExecutedPayload<'a> {
    pub step: &'a Step,
    pub rendered_message: &'a str,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of one executor call, returned verbatim to the scheduler, which
/// applies the state transition.
#[derive(Debug, Clone)]
pub struct ActionResult {
    pub success: bool,
    pub provider_response: Option<serde_json::Value>,
    pub error: Option<String>,
    /// Data-integrity failure; the lead needs manual intervention.
    pub terminal: bool,
}

impl ActionResult {
    pub(crate) fn ok(provider_response: Option<serde_json::Value>) -> Self {
        Self {
            success: true,
            provider_response,
            error: None,
            terminal: false,
        }
    }

    pub(crate) fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            provider_response: None,
            error: Some(error.into()),
            terminal: false,
        }
    }

    pub(crate) fn terminal(error: impl Into<String>) -> Self {
        Self {
            success: false,
            provider_response: None,
            error: Some(error.into()),
            terminal: true,
        }
    }
}

/// Structural validation result for a campaign sequence.
#[derive(Debug, Clone, Default)]
pub struct SequenceReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SequencerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("datetime parse error: {0}")]
    DateTimeParse(#[from] chrono::ParseError),
    #[error("uuid parse error: {0}")]
    UuidParse(#[from] uuid::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("provider error: {0}")]
    Provider(#[from] linkedin_module::ProviderError),
    #[error("lead {0} not found")]
    LeadNotFound(Uuid),
    #[error("campaign {0} not found")]
    CampaignNotFound(Uuid),
}
