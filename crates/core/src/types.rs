//! Dispatch domain types — campaigns, recipients, delivery records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

// ─── Campaign ──────────────────────────────────────────────────────────────

/// Messaging channel a campaign dispatches over. Selects the delivery
/// adapter and the rate-limit bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Sms,
    Whatsapp,
    Email,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Sms => "sms",
            Channel::Whatsapp => "whatsapp",
            Channel::Email => "email",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Active,
    Paused,
    Completed,
    Failed,
}

impl CampaignStatus {
    /// Completed and Failed campaigns never dispatch again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CampaignStatus::Completed | CampaignStatus::Failed)
    }
}

/// Which slice of a quiz's submissions a campaign targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudienceScope {
    All,
    Completed,
    Abandoned,
}

/// Filter used to pick recipients from a lead source at dispatch time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudienceSelector {
    pub scope: AudienceScope,
    #[serde(default)]
    pub min_date: Option<DateTime<Utc>>,
    pub source_quiz_id: Uuid,
}

/// A configured, schedulable bulk-messaging unit over one channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub owner_id: String,
    pub channel: Channel,
    pub message_template: String,
    pub audience: AudienceSelector,
    pub status: CampaignStatus,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Template and audience may only be edited before dispatch begins or
    /// while dispatch is suspended.
    pub fn is_editable(&self) -> bool {
        matches!(self.status, CampaignStatus::Draft | CampaignStatus::Paused)
    }
}

// ─── Recipient ─────────────────────────────────────────────────────────────

/// A resolved target address plus personalization variables. Produced fresh
/// by the target resolver on each dispatch cycle, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    pub identity: String,
    #[serde(default)]
    pub variables: HashMap<String, String>,
    pub is_complete: bool,
    pub submitted_at: DateTime<Utc>,
}

// ─── Delivery ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
    Bounced,
}

impl DeliveryStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeliveryStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Bounced => "bounced",
        }
    }
}

/// One logged attempt to deliver a rendered message to one recipient.
/// Records are append-only; a retry appends a new record with the next
/// attempt_number rather than mutating the prior one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub campaign_id: Uuid,
    pub recipient_identity: String,
    pub attempt_number: u32,
    pub status: DeliveryStatus,
    pub error_detail: Option<String>,
    /// Adapter-supplied: a failure that must not be retried.
    #[serde(default)]
    pub permanent_failure: bool,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// What a delivery adapter reports back for a single send. Ordinary
/// delivery failures are outcomes, not errors — adapters reserve `Err` for
/// validation and configuration problems.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub status: DeliveryStatus,
    pub error_detail: Option<String>,
    #[serde(default)]
    pub permanent: bool,
}

impl DeliveryOutcome {
    pub fn sent() -> Self {
        Self {
            status: DeliveryStatus::Sent,
            error_detail: None,
            permanent: false,
        }
    }

    /// An attempt handed off to an out-of-process carrier (the WhatsApp
    /// extension); resolved later via the report surface.
    pub fn pending() -> Self {
        Self {
            status: DeliveryStatus::Pending,
            error_detail: None,
            permanent: false,
        }
    }

    pub fn failed(detail: impl Into<String>, permanent: bool) -> Self {
        Self {
            status: DeliveryStatus::Failed,
            error_detail: Some(detail.into()),
            permanent,
        }
    }

    pub fn bounced(detail: impl Into<String>) -> Self {
        Self {
            status: DeliveryStatus::Bounced,
            error_detail: Some(detail.into()),
            permanent: true,
        }
    }
}
