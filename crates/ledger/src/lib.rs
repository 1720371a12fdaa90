//! Delivery ledger — append-only log of per-recipient delivery attempts and
//! the source of truth for campaign status counts.
//!
//! Status counts are served from running counters maintained with each
//! write, so reads never scan history. History itself is append-only: a
//! retry appends a new record with the next attempt number; resolving a
//! pending attempt (the WhatsApp extension reporting back) closes that same
//! attempt's record.
//!
//! Production: replace with the relational DeliveryRecord table behind the
//! same API surface.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use funnel_core::error::{DispatchError, DispatchResult};
use funnel_core::types::{DeliveryOutcome, DeliveryRecord, DeliveryStatus};
use parking_lot::RwLock;
use tracing::warn;
use uuid::Uuid;

#[derive(Default)]
struct StatusCounters {
    pending: AtomicU64,
    sent: AtomicU64,
    failed: AtomicU64,
    bounced: AtomicU64,
}

impl StatusCounters {
    fn counter(&self, status: DeliveryStatus) -> &AtomicU64 {
        match status {
            DeliveryStatus::Pending => &self.pending,
            DeliveryStatus::Sent => &self.sent,
            DeliveryStatus::Failed => &self.failed,
            DeliveryStatus::Bounced => &self.bounced,
        }
    }

    fn increment(&self, status: DeliveryStatus) {
        self.counter(status).fetch_add(1, Ordering::Relaxed);
    }

    fn decrement(&self, status: DeliveryStatus) {
        self.counter(status).fetch_sub(1, Ordering::Relaxed);
    }

    fn load(&self, status: DeliveryStatus) -> u64 {
        self.counter(status).load(Ordering::Relaxed)
    }
}

/// Thread-safe delivery ledger keyed by campaign.
#[derive(Default)]
pub struct DeliveryLedger {
    history: DashMap<Uuid, RwLock<Vec<DeliveryRecord>>>,
    counters: DashMap<Uuid, StatusCounters>,
}

impl DeliveryLedger {
    pub fn new() -> Self {
        Self {
            history: DashMap::new(),
            counters: DashMap::new(),
        }
    }

    /// Append one delivery record and bump the matching running counter.
    pub fn record(&self, record: DeliveryRecord) {
        self.counters
            .entry(record.campaign_id)
            .or_default()
            .increment(record.status);

        metrics::counter!(
            "ledger.records",
            "status" => record.status.as_str()
        )
        .increment(1);

        self.history
            .entry(record.campaign_id)
            .or_default()
            .write()
            .push(record);
    }

    /// Resolve the single pending record for a recipient to its terminal
    /// outcome. This closes the attempt the pending record opened; it does
    /// not create a new attempt.
    pub fn complete_pending(
        &self,
        campaign_id: Uuid,
        recipient_identity: &str,
        outcome: &DeliveryOutcome,
    ) -> DispatchResult<DeliveryRecord> {
        if !outcome.status.is_terminal() {
            return Err(DispatchError::validation(
                "outcome for a pending attempt must be terminal",
            ));
        }

        let entry = self.history.get(&campaign_id).ok_or_else(|| {
            DispatchError::not_found(format!("no delivery history for campaign {}", campaign_id))
        })?;

        let mut records = entry.write();
        let record = records
            .iter_mut()
            .rev()
            .find(|r| {
                r.recipient_identity == recipient_identity && r.status == DeliveryStatus::Pending
            })
            .ok_or_else(|| {
                DispatchError::not_found(format!(
                    "no pending delivery for {} in campaign {}",
                    recipient_identity, campaign_id
                ))
            })?;

        record.status = outcome.status;
        record.error_detail = outcome.error_detail.clone();
        record.permanent_failure = outcome.permanent;
        record.sent_at = Some(Utc::now());

        let resolved = record.clone();
        drop(records);

        if let Some(counters) = self.counters.get(&campaign_id) {
            counters.decrement(DeliveryStatus::Pending);
            counters.increment(outcome.status);
        } else {
            // History existed without counters: repair rather than drift.
            warn!(campaign_id = %campaign_id, "Ledger counters missing for campaign");
            self.counters
                .entry(campaign_id)
                .or_default()
                .increment(outcome.status);
        }

        metrics::counter!(
            "ledger.pending_resolved",
            "status" => outcome.status.as_str()
        )
        .increment(1);

        Ok(resolved)
    }

    /// Per-status record counts for a campaign, served from the running
    /// counters without touching history.
    pub fn counts_by_status(&self, campaign_id: Uuid) -> HashMap<DeliveryStatus, u64> {
        let mut counts = HashMap::new();
        if let Some(counters) = self.counters.get(&campaign_id) {
            for status in [
                DeliveryStatus::Pending,
                DeliveryStatus::Sent,
                DeliveryStatus::Failed,
                DeliveryStatus::Bounced,
            ] {
                let count = counters.load(status);
                if count > 0 {
                    counts.insert(status, count);
                }
            }
        }
        counts
    }

    /// Number of records that are not yet terminal.
    pub fn pending_count(&self, campaign_id: Uuid) -> u64 {
        self.counters
            .get(&campaign_id)
            .map(|c| c.load(DeliveryStatus::Pending))
            .unwrap_or(0)
    }

    /// Up to `limit` most recent records for a campaign, newest first.
    pub fn list(&self, campaign_id: Uuid, limit: usize) -> Vec<DeliveryRecord> {
        self.history
            .get(&campaign_id)
            .map(|entry| {
                let records = entry.read();
                records.iter().rev().take(limit).cloned().collect()
            })
            .unwrap_or_default()
    }

    /// The most recent record for one recipient, if any. Drives the
    /// scheduler's diff between the resolved audience and prior attempts.
    pub fn latest(&self, campaign_id: Uuid, recipient_identity: &str) -> Option<DeliveryRecord> {
        self.history.get(&campaign_id).and_then(|entry| {
            entry
                .read()
                .iter()
                .rev()
                .find(|r| r.recipient_identity == recipient_identity)
                .cloned()
        })
    }

    /// Attempt number the next record for this recipient must carry.
    pub fn next_attempt_number(&self, campaign_id: Uuid, recipient_identity: &str) -> u32 {
        self.latest(campaign_id, recipient_identity)
            .map(|r| r.attempt_number + 1)
            .unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        campaign_id: Uuid,
        identity: &str,
        attempt: u32,
        status: DeliveryStatus,
    ) -> DeliveryRecord {
        DeliveryRecord {
            campaign_id,
            recipient_identity: identity.to_string(),
            attempt_number: attempt,
            status,
            error_detail: None,
            permanent_failure: false,
            sent_at: match status {
                DeliveryStatus::Pending => None,
                _ => Some(Utc::now()),
            },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_counts_track_records() {
        let ledger = DeliveryLedger::new();
        let campaign_id = Uuid::new_v4();

        ledger.record(record(campaign_id, "+551199", 1, DeliveryStatus::Sent));
        ledger.record(record(campaign_id, "+551188", 1, DeliveryStatus::Failed));
        ledger.record(record(campaign_id, "+551188", 2, DeliveryStatus::Sent));

        let counts = ledger.counts_by_status(campaign_id);
        assert_eq!(counts.get(&DeliveryStatus::Sent), Some(&2));
        assert_eq!(counts.get(&DeliveryStatus::Failed), Some(&1));
        assert_eq!(counts.get(&DeliveryStatus::Pending), None);
    }

    #[test]
    fn test_counts_for_unknown_campaign_are_empty() {
        let ledger = DeliveryLedger::new();
        assert!(ledger.counts_by_status(Uuid::new_v4()).is_empty());
    }

    #[test]
    fn test_complete_pending_resolves_in_place() {
        let ledger = DeliveryLedger::new();
        let campaign_id = Uuid::new_v4();
        ledger.record(record(campaign_id, "+551199", 1, DeliveryStatus::Pending));
        assert_eq!(ledger.pending_count(campaign_id), 1);

        let resolved = ledger
            .complete_pending(campaign_id, "+551199", &DeliveryOutcome::sent())
            .unwrap();
        assert_eq!(resolved.status, DeliveryStatus::Sent);
        assert_eq!(resolved.attempt_number, 1);
        assert!(resolved.sent_at.is_some());

        // Same attempt resolved, no new record appended.
        assert_eq!(ledger.list(campaign_id, 10).len(), 1);
        assert_eq!(ledger.pending_count(campaign_id), 0);
        let counts = ledger.counts_by_status(campaign_id);
        assert_eq!(counts.get(&DeliveryStatus::Sent), Some(&1));
    }

    #[test]
    fn test_complete_pending_without_pending_is_not_found() {
        let ledger = DeliveryLedger::new();
        let campaign_id = Uuid::new_v4();
        ledger.record(record(campaign_id, "+551199", 1, DeliveryStatus::Sent));

        let result = ledger.complete_pending(campaign_id, "+551199", &DeliveryOutcome::sent());
        assert!(matches!(result, Err(DispatchError::NotFound(_))));
    }

    #[test]
    fn test_complete_pending_rejects_non_terminal_outcome() {
        let ledger = DeliveryLedger::new();
        let campaign_id = Uuid::new_v4();
        ledger.record(record(campaign_id, "+551199", 1, DeliveryStatus::Pending));

        let result = ledger.complete_pending(campaign_id, "+551199", &DeliveryOutcome::pending());
        assert!(matches!(result, Err(DispatchError::Validation(_))));
    }

    #[test]
    fn test_list_is_most_recent_first_and_limited() {
        let ledger = DeliveryLedger::new();
        let campaign_id = Uuid::new_v4();
        ledger.record(record(campaign_id, "+551199", 1, DeliveryStatus::Failed));
        ledger.record(record(campaign_id, "+551199", 2, DeliveryStatus::Failed));
        ledger.record(record(campaign_id, "+551199", 3, DeliveryStatus::Sent));

        let listed = ledger.list(campaign_id, 2);
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].attempt_number, 3);
        assert_eq!(listed[1].attempt_number, 2);
    }

    #[test]
    fn test_next_attempt_number_is_gap_free() {
        let ledger = DeliveryLedger::new();
        let campaign_id = Uuid::new_v4();
        assert_eq!(ledger.next_attempt_number(campaign_id, "+551199"), 1);

        ledger.record(record(campaign_id, "+551199", 1, DeliveryStatus::Failed));
        assert_eq!(ledger.next_attempt_number(campaign_id, "+551199"), 2);

        ledger.record(record(campaign_id, "+551199", 2, DeliveryStatus::Failed));
        assert_eq!(ledger.next_attempt_number(campaign_id, "+551199"), 3);

        // Other recipients do not affect this recipient's sequence.
        ledger.record(record(campaign_id, "+551188", 1, DeliveryStatus::Sent));
        assert_eq!(ledger.next_attempt_number(campaign_id, "+551199"), 3);
    }

    #[test]
    fn test_latest_picks_newest_record_for_recipient() {
        let ledger = DeliveryLedger::new();
        let campaign_id = Uuid::new_v4();
        ledger.record(record(campaign_id, "+551199", 1, DeliveryStatus::Failed));
        ledger.record(record(campaign_id, "+551188", 1, DeliveryStatus::Sent));
        ledger.record(record(campaign_id, "+551199", 2, DeliveryStatus::Sent));

        let latest = ledger.latest(campaign_id, "+551199").unwrap();
        assert_eq!(latest.attempt_number, 2);
        assert_eq!(latest.status, DeliveryStatus::Sent);
    }
}
