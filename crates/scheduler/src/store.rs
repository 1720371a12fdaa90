//! In-memory campaign store backed by DashMap.
//!
//! Production: replace with the relational Campaign table behind the same
//! API surface. Lifecycle changes go through the state machine; callers
//! never write `status` directly.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use funnel_core::error::{DispatchError, DispatchResult};
use funnel_core::types::{AudienceSelector, Campaign, CampaignStatus, Channel};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::state_machine::CampaignStateMachine;

/// Billing seam: whether an owner may create a campaign on a channel.
/// The real balance lives in the billing system; the engine only asks
/// a yes/no question before accepting a campaign.
pub trait CreditGate: Send + Sync {
    fn has_credits(&self, owner_id: &str, channel: Channel) -> bool;
}

/// Development gate that always allows creation.
pub struct AllowAllCredits;

impl CreditGate for AllowAllCredits {
    fn has_credits(&self, _owner_id: &str, _channel: Channel) -> bool {
        true
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCampaign {
    pub channel: Channel,
    pub message_template: String,
    pub audience: AudienceSelector,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCampaign {
    pub message_template: Option<String>,
    pub audience: Option<AudienceSelector>,
    pub scheduled_for: Option<DateTime<Utc>>,
}

pub struct CampaignStore {
    campaigns: DashMap<Uuid, Campaign>,
    state_machine: CampaignStateMachine,
    credit_gate: Box<dyn CreditGate>,
}

impl CampaignStore {
    pub fn new(credit_gate: Box<dyn CreditGate>) -> Self {
        info!("Campaign store initialized (in-memory, development mode)");
        Self {
            campaigns: DashMap::new(),
            state_machine: CampaignStateMachine::new(),
            credit_gate,
        }
    }

    /// Create a campaign in `draft`. The scheduler's next cycle moves it to
    /// `scheduled` or straight to `active` when no schedule was given.
    pub fn create(&self, owner_id: &str, req: NewCampaign) -> DispatchResult<Campaign> {
        if req.message_template.trim().is_empty() {
            return Err(DispatchError::validation("message_template is empty"));
        }
        if let Some(scheduled_for) = req.scheduled_for {
            if scheduled_for <= Utc::now() {
                return Err(DispatchError::validation(
                    "scheduled_for must be in the future",
                ));
            }
        }
        if !self.credit_gate.has_credits(owner_id, req.channel) {
            return Err(DispatchError::validation(format!(
                "owner {} has no {} credits",
                owner_id,
                req.channel.as_str()
            )));
        }

        let now = Utc::now();
        let campaign = Campaign {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            channel: req.channel,
            message_template: req.message_template,
            audience: req.audience,
            status: CampaignStatus::Draft,
            scheduled_for: req.scheduled_for,
            created_at: now,
            updated_at: now,
        };

        info!(
            campaign_id = %campaign.id,
            owner_id = %owner_id,
            channel = campaign.channel.as_str(),
            "Campaign created"
        );
        metrics::counter!("campaigns.created", "channel" => campaign.channel.as_str())
            .increment(1);

        self.campaigns.insert(campaign.id, campaign.clone());
        Ok(campaign)
    }

    /// Owner-scoped fetch. Campaigns belonging to other owners read as
    /// absent rather than forbidden.
    pub fn get(&self, id: Uuid, owner_id: &str) -> Option<Campaign> {
        self.campaigns
            .get(&id)
            .filter(|c| c.owner_id == owner_id)
            .map(|c| c.clone())
    }

    /// Unscoped fetch for the dispatcher.
    pub fn get_any(&self, id: Uuid) -> Option<Campaign> {
        self.campaigns.get(&id).map(|c| c.clone())
    }

    pub fn list(&self, owner_id: &str) -> Vec<Campaign> {
        let mut campaigns: Vec<Campaign> = self
            .campaigns
            .iter()
            .filter(|c| c.owner_id == owner_id)
            .map(|c| c.value().clone())
            .collect();
        campaigns.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        campaigns
    }

    /// All campaigns the dispatcher should look at this cycle.
    pub fn dispatchable(&self) -> Vec<Campaign> {
        self.campaigns
            .iter()
            .filter(|c| {
                matches!(
                    c.status,
                    CampaignStatus::Draft | CampaignStatus::Scheduled | CampaignStatus::Active
                )
            })
            .map(|c| c.value().clone())
            .collect()
    }

    /// Edit template/audience/schedule. Only permitted in draft or paused.
    pub fn update(
        &self,
        id: Uuid,
        owner_id: &str,
        req: UpdateCampaign,
    ) -> DispatchResult<Campaign> {
        let mut entry = self
            .campaigns
            .get_mut(&id)
            .filter(|c| c.owner_id == owner_id)
            .ok_or_else(|| DispatchError::not_found(format!("campaign {} not found", id)))?;

        if !entry.is_editable() {
            return Err(DispatchError::validation(format!(
                "campaign in status {:?} cannot be edited",
                entry.status
            )));
        }

        if let Some(template) = req.message_template {
            if template.trim().is_empty() {
                return Err(DispatchError::validation("message_template is empty"));
            }
            entry.message_template = template;
        }
        if let Some(audience) = req.audience {
            entry.audience = audience;
        }
        if let Some(scheduled_for) = req.scheduled_for {
            if scheduled_for <= Utc::now() {
                return Err(DispatchError::validation(
                    "scheduled_for must be in the future",
                ));
            }
            entry.scheduled_for = Some(scheduled_for);
        }
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    /// Pause an active campaign or resume a paused one.
    pub fn toggle(&self, id: Uuid, owner_id: &str) -> DispatchResult<Campaign> {
        let current = self
            .get(id, owner_id)
            .ok_or_else(|| DispatchError::not_found(format!("campaign {} not found", id)))?;

        let target = match current.status {
            CampaignStatus::Active => CampaignStatus::Paused,
            CampaignStatus::Paused => CampaignStatus::Active,
            other => {
                return Err(DispatchError::validation(format!(
                    "campaign in status {:?} cannot be toggled",
                    other
                )))
            }
        };

        let updated = self.transition(id, target)?;
        info!(
            campaign_id = %id,
            status = ?updated.status,
            "Campaign toggled"
        );
        metrics::counter!("campaigns.toggled").increment(1);
        Ok(updated)
    }

    /// Move a campaign through the state machine. Invalid transitions are
    /// validation errors.
    pub fn transition(&self, id: Uuid, to: CampaignStatus) -> DispatchResult<Campaign> {
        let mut entry = self
            .campaigns
            .get_mut(&id)
            .ok_or_else(|| DispatchError::not_found(format!("campaign {} not found", id)))?;

        let next = self.state_machine.transition(entry.status, to)?;
        entry.status = next;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }
}
