//! WhatsApp delivery via the out-of-process browser extension.
//!
//! Nothing is sent from here. `send` parks the rendered payload on a
//! queryable surface; the extension pulls it over HTTP, performs the actual
//! delivery in the user's WhatsApp Web session, and reports the outcome
//! back. Until that report arrives the attempt stays pending.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use funnel_core::config::ExtensionConfig;
use funnel_core::error::DispatchResult;
use funnel_core::types::DeliveryOutcome;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One queued message the extension has yet to deliver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingSend {
    pub campaign_id: Uuid,
    pub recipient_identity: String,
    pub payload: String,
    pub queued_at: DateTime<Utc>,
}

/// Bridge between the dispatcher and the browser extension.
pub struct WhatsAppBridge {
    /// Not-yet-attempted sends, keyed by campaign.
    queues: DashMap<Uuid, Vec<PendingSend>>,
    last_heartbeat: Mutex<Option<DateTime<Utc>>>,
    freshness_window: Duration,
}

impl WhatsAppBridge {
    pub fn new(config: &ExtensionConfig) -> Self {
        info!(
            freshness_window_secs = config.freshness_window_secs,
            "WhatsApp extension bridge initialized"
        );
        Self {
            queues: DashMap::new(),
            last_heartbeat: Mutex::new(None),
            freshness_window: Duration::seconds(config.freshness_window_secs as i64),
        }
    }

    /// Queue one rendered payload for the extension and report the attempt
    /// as pending. Never a synchronous send.
    pub async fn send(
        &self,
        campaign_id: Uuid,
        identity: &str,
        payload: &str,
    ) -> DispatchResult<DeliveryOutcome> {
        if !self.is_connected() {
            warn!(campaign_id = %campaign_id, "Queueing WhatsApp send while extension is offline");
        }

        self.queues.entry(campaign_id).or_default().push(PendingSend {
            campaign_id,
            recipient_identity: identity.to_string(),
            payload: payload.to_string(),
            queued_at: Utc::now(),
        });

        metrics::counter!("channels.whatsapp.queued").increment(1);

        debug!(campaign_id = %campaign_id, to = %identity, "WhatsApp send queued for extension");

        Ok(DeliveryOutcome::pending())
    }

    /// Snapshot of a campaign's undelivered queue. Non-destructive: entries
    /// leave the queue only when the extension reports their outcome, so a
    /// crashed extension can re-pull the same batch.
    pub fn pending_sends(&self, campaign_id: Uuid) -> Vec<PendingSend> {
        self.queues
            .get(&campaign_id)
            .map(|entry| entry.clone())
            .unwrap_or_default()
    }

    /// Remove a recipient's queued send once its outcome has been reported.
    /// Returns false if nothing was queued for that recipient.
    pub fn resolve(&self, campaign_id: Uuid, identity: &str) -> bool {
        match self.queues.get_mut(&campaign_id) {
            Some(mut entry) => {
                let before = entry.len();
                entry.retain(|p| p.recipient_identity != identity);
                before != entry.len()
            }
            None => false,
        }
    }

    /// Record a liveness ping from the extension.
    pub fn heartbeat(&self) {
        *self.last_heartbeat.lock() = Some(Utc::now());
        metrics::counter!("channels.whatsapp.heartbeats").increment(1);
    }

    /// Connected iff the last heartbeat is within the freshness window.
    /// Computed on read; there is no cached connected flag to go stale.
    pub fn is_connected(&self) -> bool {
        self.last_heartbeat
            .lock()
            .map(|last| Utc::now() - last <= self.freshness_window)
            .unwrap_or(false)
    }

    pub fn last_heartbeat(&self) -> Option<DateTime<Utc>> {
        *self.last_heartbeat.lock()
    }
}
