//! The periodic dispatch driver.
//!
//! One timer loop advances every campaign: draft/scheduled campaigns are
//! promoted when due, active campaigns get a dispatch pass. Within a cycle
//! campaigns run concurrently, but a per-campaign guard serializes work for
//! any single campaign so overlapping cycles can never double-send.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use funnel_audience::TargetResolver;
use funnel_channels::DeliveryRouter;
use funnel_core::config::SchedulerConfig;
use funnel_core::error::DispatchError;
use funnel_core::template;
use funnel_core::types::{
    Campaign, CampaignStatus, DeliveryOutcome, DeliveryRecord, DeliveryStatus,
};
use funnel_ledger::DeliveryLedger;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::store::CampaignStore;
use crate::throttle::RateLimiterSet;

/// What a dispatch pass should do with one recipient this cycle.
#[derive(Debug, PartialEq, Eq)]
enum Eligibility {
    /// No usable record yet, or a retry whose backoff has elapsed.
    Send,
    /// Terminal, pending, or out of attempts. Nothing to do ever again.
    Skip,
    /// Retryable, but the backoff window has not elapsed yet.
    Defer,
}

fn eligibility(
    latest: Option<&DeliveryRecord>,
    now: DateTime<Utc>,
    max_attempts: u32,
    backoff_base_secs: u64,
) -> Eligibility {
    let Some(record) = latest else {
        return Eligibility::Send;
    };
    match record.status {
        DeliveryStatus::Pending | DeliveryStatus::Sent | DeliveryStatus::Bounced => {
            Eligibility::Skip
        }
        DeliveryStatus::Failed => {
            if record.permanent_failure || record.attempt_number >= max_attempts {
                return Eligibility::Skip;
            }
            let backoff =
                Duration::seconds((backoff_base_secs << (record.attempt_number - 1)) as i64);
            if now >= record.created_at + backoff {
                Eligibility::Send
            } else {
                Eligibility::Defer
            }
        }
    }
}

/// A recipient counts toward completion once no future cycle will touch it:
/// delivered, bounced, permanently failed, or out of retry attempts.
fn is_settled(latest: Option<&DeliveryRecord>, max_attempts: u32) -> bool {
    match latest {
        None => false,
        Some(record) => match record.status {
            DeliveryStatus::Sent | DeliveryStatus::Bounced => true,
            DeliveryStatus::Pending => false,
            DeliveryStatus::Failed => {
                record.permanent_failure || record.attempt_number >= max_attempts
            }
        },
    }
}

enum SendResult {
    Outcome(DeliveryOutcome),
    /// Credentials missing or revoked: the whole campaign stops.
    Fatal(String),
}

pub struct Dispatcher {
    store: Arc<CampaignStore>,
    resolver: TargetResolver,
    router: DeliveryRouter,
    ledger: Arc<DeliveryLedger>,
    limiter: RateLimiterSet,
    config: SchedulerConfig,
    /// Per-campaign guards: a cycle skips a campaign whose previous pass is
    /// still in flight.
    guards: DashMap<Uuid, Arc<Mutex<()>>>,
    /// Last instant the resolved audience contained a recipient with no
    /// delivery history. Drives the completion quiet period.
    last_audience_growth: DashMap<Uuid, DateTime<Utc>>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<CampaignStore>,
        resolver: TargetResolver,
        router: DeliveryRouter,
        ledger: Arc<DeliveryLedger>,
        limiter: RateLimiterSet,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            resolver,
            router,
            ledger,
            limiter,
            config,
            guards: DashMap::new(),
            last_audience_growth: DashMap::new(),
        }
    }

    pub fn store(&self) -> Arc<CampaignStore> {
        self.store.clone()
    }

    pub fn ledger(&self) -> Arc<DeliveryLedger> {
        self.ledger.clone()
    }

    pub fn router(&self) -> &DeliveryRouter {
        &self.router
    }

    /// Run dispatch cycles forever.
    pub async fn run(self: Arc<Self>) {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(self.config.tick_interval_secs));
        info!(
            tick_interval_secs = self.config.tick_interval_secs,
            "Dispatch scheduler running"
        );
        loop {
            interval.tick().await;
            self.tick().await;
        }
    }

    /// One scheduling cycle over every campaign.
    pub async fn tick(self: &Arc<Self>) {
        let now = Utc::now();
        let mut handles = Vec::new();

        for campaign in self.store.dispatchable() {
            match campaign.status {
                CampaignStatus::Draft => self.promote_draft(&campaign),
                CampaignStatus::Scheduled => {
                    if campaign.scheduled_for.map(|at| now >= at).unwrap_or(true) {
                        self.activate(campaign.id);
                    }
                }
                CampaignStatus::Active => {
                    let dispatcher = self.clone();
                    handles.push(tokio::spawn(async move {
                        dispatcher.dispatch_campaign(campaign.id).await;
                    }));
                }
                _ => {}
            }
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Campaign dispatch task panicked");
            }
        }
    }

    fn promote_draft(&self, campaign: &Campaign) {
        match campaign.scheduled_for {
            Some(_) => {
                if let Err(e) = self
                    .store
                    .transition(campaign.id, CampaignStatus::Scheduled)
                {
                    warn!(campaign_id = %campaign.id, error = %e, "Failed to schedule campaign");
                }
            }
            // No schedule: the campaign activates on creation.
            None => self.activate(campaign.id),
        }
    }

    fn activate(&self, id: Uuid) {
        match self.store.transition(id, CampaignStatus::Active) {
            Ok(_) => {
                info!(campaign_id = %id, "Campaign activated");
                self.last_audience_growth.insert(id, Utc::now());
            }
            Err(e) => warn!(campaign_id = %id, error = %e, "Failed to activate campaign"),
        }
    }

    /// One dispatch pass for one active campaign: resolve the audience, diff
    /// against the ledger, send to every recipient with no open attempt.
    async fn dispatch_campaign(&self, id: Uuid) {
        let guard = Arc::clone(&*self.guards.entry(id).or_insert_with(|| Arc::new(Mutex::new(()))));
        let Ok(_lock) = guard.try_lock() else {
            debug!(campaign_id = %id, "Previous dispatch pass still running, skipping");
            return;
        };

        let Some(campaign) = self.store.get_any(id) else {
            return;
        };
        if campaign.status != CampaignStatus::Active {
            return;
        }

        let recipients = match self.resolver.resolve(&campaign.audience) {
            Ok(recipients) => recipients,
            Err(DispatchError::NotFound(msg)) => {
                error!(campaign_id = %id, error = %msg, "Audience source missing, failing campaign");
                let _ = self.store.transition(id, CampaignStatus::Failed);
                return;
            }
            Err(e) => {
                error!(campaign_id = %id, error = %e, "Audience resolution error");
                return;
            }
        };

        let now = Utc::now();
        let has_new = recipients
            .iter()
            .any(|r| self.ledger.latest(id, &r.identity).is_none());
        if has_new {
            self.last_audience_growth.insert(id, now);
        } else {
            self.last_audience_growth.entry(id).or_insert(now);
        }

        let mut all_settled = true;

        for recipient in &recipients {
            // Cooperative pause: re-check status before every send, never
            // mid-send.
            let Some(current) = self.store.get_any(id) else {
                return;
            };
            if current.status != CampaignStatus::Active {
                debug!(campaign_id = %id, "Campaign no longer active, stopping pass");
                return;
            }

            let latest = self.ledger.latest(id, &recipient.identity);
            if !is_settled(latest.as_ref(), self.config.max_attempts) {
                all_settled = false;
            }
            match eligibility(
                latest.as_ref(),
                Utc::now(),
                self.config.max_attempts,
                self.config.retry_backoff_base_secs,
            ) {
                Eligibility::Skip | Eligibility::Defer => continue,
                Eligibility::Send => {}
            }

            if !self.limiter.try_acquire(campaign.channel) {
                debug!(
                    campaign_id = %id,
                    channel = campaign.channel.as_str(),
                    "Provider rate budget exhausted, deferring rest of pass"
                );
                all_settled = false;
                break;
            }

            let payload = template::render(&campaign.message_template, &recipient.variables);
            let attempt_number = self.ledger.next_attempt_number(id, &recipient.identity);

            let outcome = match self
                .perform_send(&campaign, &recipient.identity, &payload)
                .await
            {
                SendResult::Outcome(outcome) => outcome,
                SendResult::Fatal(msg) => {
                    error!(campaign_id = %id, error = %msg, "Configuration error, failing campaign");
                    let _ = self.store.transition(id, CampaignStatus::Failed);
                    return;
                }
            };

            metrics::counter!(
                "dispatch.sends",
                "channel" => campaign.channel.as_str(),
                "status" => outcome.status.as_str()
            )
            .increment(1);

            let record = DeliveryRecord {
                campaign_id: id,
                recipient_identity: recipient.identity.clone(),
                attempt_number,
                status: outcome.status,
                error_detail: outcome.error_detail.clone(),
                permanent_failure: outcome.permanent,
                sent_at: match outcome.status {
                    DeliveryStatus::Sent => Some(Utc::now()),
                    _ => None,
                },
                created_at: Utc::now(),
            };
            if !is_settled(Some(&record), self.config.max_attempts) {
                all_settled = false;
            }
            self.ledger.record(record);
        }

        if all_settled && self.ledger.pending_count(id) == 0 {
            self.maybe_complete(id);
        }
    }

    /// Complete an active campaign once nothing is outstanding and the
    /// audience has been quiet long enough.
    fn maybe_complete(&self, id: Uuid) {
        let quiet_since = self
            .last_audience_growth
            .get(&id)
            .map(|entry| *entry)
            .unwrap_or_else(Utc::now);
        let quiet_for = Utc::now() - quiet_since;
        if quiet_for < Duration::seconds(self.config.quiet_period_secs as i64) {
            return;
        }

        match self.store.transition(id, CampaignStatus::Completed) {
            Ok(_) => {
                info!(campaign_id = %id, "Campaign completed");
                metrics::counter!("dispatch.campaigns_completed").increment(1);
                self.last_audience_growth.remove(&id);
                self.guards.remove(&id);
            }
            Err(e) => warn!(campaign_id = %id, error = %e, "Failed to complete campaign"),
        }
    }

    async fn perform_send(&self, campaign: &Campaign, identity: &str, payload: &str) -> SendResult {
        let send = self
            .router
            .send(campaign.channel, campaign.id, identity, payload);
        let timeout = std::time::Duration::from_secs(self.config.send_timeout_secs);

        match tokio::time::timeout(timeout, send).await {
            Err(_) => SendResult::Outcome(DeliveryOutcome::failed("timeout", false)),
            Ok(Ok(outcome)) => SendResult::Outcome(outcome),
            Ok(Err(DispatchError::Configuration(msg))) => SendResult::Fatal(msg),
            // Pre-flight rejections (payload too long, malformed identity)
            // are permanent per-recipient failures, not campaign failures.
            Ok(Err(DispatchError::Validation(msg))) => {
                SendResult::Outcome(DeliveryOutcome::failed(msg, true))
            }
            Ok(Err(DispatchError::Provider { message, permanent })) => {
                SendResult::Outcome(DeliveryOutcome::failed(message, permanent))
            }
            Ok(Err(other)) => SendResult::Outcome(DeliveryOutcome::failed(other.to_string(), false)),
        }
    }
}
