//! End-to-end dispatch flow over the in-memory stores: campaign creation,
//! activation, audience resolution, per-recipient rendering and delivery,
//! ledger bookkeeping, pause/resume, and completion.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use funnel_audience::{InMemorySubmissionStore, Submission, TargetResolver};
use funnel_channels::{DeliveryRouter, EmailAdapter, SmsAdapter, WhatsAppBridge};
use funnel_core::config::{
    EmailProviderConfig, ExtensionConfig, RateLimitConfig, SchedulerConfig, SmsProviderConfig,
};
use funnel_core::types::{
    AudienceScope, AudienceSelector, CampaignStatus, Channel, DeliveryOutcome, DeliveryStatus,
};
use funnel_ledger::DeliveryLedger;
use funnel_scheduler::{
    AllowAllCredits, CampaignStore, Dispatcher, NewCampaign, RateLimiterSet,
};
use uuid::Uuid;

struct Harness {
    dispatcher: Arc<Dispatcher>,
    store: Arc<CampaignStore>,
    ledger: Arc<DeliveryLedger>,
    bridge: Arc<WhatsAppBridge>,
    submissions: Arc<InMemorySubmissionStore>,
    quiz_id: Uuid,
}

fn harness(quiet_period_secs: u64) -> Harness {
    let submissions = Arc::new(InMemorySubmissionStore::new());
    let quiz_id = Uuid::new_v4();
    submissions.register_quiz(quiz_id);

    let bridge = Arc::new(WhatsAppBridge::new(&ExtensionConfig {
        freshness_window_secs: 120,
    }));
    let router = DeliveryRouter::new(
        SmsAdapter::new(SmsProviderConfig {
            account_sid: "AC_test".to_string(),
            auth_token: "token".to_string(),
            from_number: "+15551234567".to_string(),
        }),
        bridge.clone(),
        EmailAdapter::new(EmailProviderConfig {
            api_key: "SG.test".to_string(),
            from_email: "offers@example.com".to_string(),
            from_name: "Offers".to_string(),
        }),
    );

    let store = Arc::new(CampaignStore::new(Box::new(AllowAllCredits)));
    let ledger = Arc::new(DeliveryLedger::new());
    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        TargetResolver::new(submissions.clone()),
        router,
        ledger.clone(),
        RateLimiterSet::new(&RateLimitConfig {
            sms_per_minute: 1000,
            whatsapp_per_minute: 1000,
            email_per_minute: 1000,
        }),
        SchedulerConfig {
            tick_interval_secs: 1,
            quiet_period_secs,
            max_attempts: 3,
            retry_backoff_base_secs: 0,
            send_timeout_secs: 10,
        },
    ));

    Harness {
        dispatcher,
        store,
        ledger,
        bridge,
        submissions,
        quiz_id,
    }
}

fn submission(identity: &str, vars: &[(&str, &str)], is_complete: bool) -> Submission {
    Submission {
        identity: identity.to_string(),
        variables: vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        is_complete,
        submitted_at: Utc::now(),
    }
}

fn campaign_request(quiz_id: Uuid, channel: Channel, template: &str) -> NewCampaign {
    NewCampaign {
        channel,
        message_template: template.to_string(),
        audience: AudienceSelector {
            scope: AudienceScope::All,
            min_date: None,
            source_quiz_id: quiz_id,
        },
        scheduled_for: None,
    }
}

#[tokio::test]
async fn test_sms_campaign_end_to_end() {
    let h = harness(3600);
    h.submissions.add_submission(
        h.quiz_id,
        submission("+5511999990000", &[("nome", "Ana"), ("dias", "2")], true),
    );
    h.submissions.add_submission(
        h.quiz_id,
        submission("+5511888880000", &[("nome", "Bruno")], false),
    );

    let campaign = h
        .store
        .create(
            "owner-1",
            campaign_request(
                h.quiz_id,
                Channel::Sms,
                "Oi {nome}, sua oferta expira em {dias} dias",
            ),
        )
        .unwrap();

    // First cycle activates, second dispatches.
    h.dispatcher.tick().await;
    assert_eq!(
        h.store.get_any(campaign.id).unwrap().status,
        CampaignStatus::Active
    );
    h.dispatcher.tick().await;

    let counts = h.ledger.counts_by_status(campaign.id);
    assert_eq!(counts.get(&DeliveryStatus::Sent), Some(&2));
    assert_eq!(counts.len(), 1);

    let records = h.ledger.list(campaign.id, 10);
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.attempt_number == 1));
    assert!(records.iter().all(|r| r.sent_at.is_some()));
}

#[tokio::test]
async fn test_repeated_ticks_never_double_send() {
    let h = harness(3600);
    h.submissions.add_submission(
        h.quiz_id,
        submission("+5511999990000", &[("nome", "Ana")], true),
    );

    let campaign = h
        .store
        .create("owner-1", campaign_request(h.quiz_id, Channel::Sms, "Oi {nome}"))
        .unwrap();

    for _ in 0..5 {
        h.dispatcher.tick().await;
    }

    assert_eq!(h.ledger.list(campaign.id, 10).len(), 1);
    let counts = h.ledger.counts_by_status(campaign.id);
    assert_eq!(counts.get(&DeliveryStatus::Sent), Some(&1));
}

#[tokio::test]
async fn test_whatsapp_renders_and_flows_through_extension() {
    let h = harness(0);
    h.submissions.add_submission(
        h.quiz_id,
        submission("+5511999990000", &[("nome", "Ana"), ("dias", "2")], true),
    );
    h.submissions.add_submission(
        h.quiz_id,
        submission("+5511888880000", &[("nome", "Bruno")], false),
    );

    let campaign = h
        .store
        .create(
            "owner-1",
            campaign_request(
                h.quiz_id,
                Channel::Whatsapp,
                "Oi {nome}, sua oferta expira em {dias} dias",
            ),
        )
        .unwrap();

    h.dispatcher.tick().await;
    h.dispatcher.tick().await;

    // Both attempts are parked on the bridge, pending in the ledger.
    let pending = h.bridge.pending_sends(campaign.id);
    assert_eq!(pending.len(), 2);
    let by_identity: HashMap<&str, &str> = pending
        .iter()
        .map(|p| (p.recipient_identity.as_str(), p.payload.as_str()))
        .collect();
    assert_eq!(
        by_identity["+5511999990000"],
        "Oi Ana, sua oferta expira em 2 dias"
    );
    // Missing variable stays verbatim in the rendered payload.
    assert_eq!(
        by_identity["+5511888880000"],
        "Oi Bruno, sua oferta expira em {dias} dias"
    );
    assert_eq!(h.ledger.pending_count(campaign.id), 2);

    // The extension reports both outcomes.
    for identity in ["+5511999990000", "+5511888880000"] {
        h.ledger
            .complete_pending(campaign.id, identity, &DeliveryOutcome::sent())
            .unwrap();
        assert!(h.bridge.resolve(campaign.id, identity));
    }

    let counts = h.ledger.counts_by_status(campaign.id);
    assert_eq!(counts.get(&DeliveryStatus::Sent), Some(&2));
    assert_eq!(h.ledger.pending_count(campaign.id), 0);

    // With nothing outstanding and a zero quiet period, the next cycle
    // completes the campaign.
    h.dispatcher.tick().await;
    assert_eq!(
        h.store.get_any(campaign.id).unwrap().status,
        CampaignStatus::Completed
    );
}

#[tokio::test]
async fn test_pause_halts_new_sends_until_resume() {
    let h = harness(3600);
    h.submissions.add_submission(
        h.quiz_id,
        submission("+5511999990000", &[("nome", "Ana")], true),
    );
    h.submissions.add_submission(
        h.quiz_id,
        submission("+5511888880000", &[("nome", "Bruno")], true),
    );

    let campaign = h
        .store
        .create("owner-1", campaign_request(h.quiz_id, Channel::Sms, "Oi {nome}"))
        .unwrap();

    h.dispatcher.tick().await;
    h.dispatcher.tick().await;
    assert_eq!(h.ledger.list(campaign.id, 10).len(), 2);

    h.store.toggle(campaign.id, "owner-1").unwrap();
    // A lead arriving while paused must not be contacted.
    h.submissions.add_submission(
        h.quiz_id,
        submission("+5511777770000", &[("nome", "Carla")], true),
    );
    h.dispatcher.tick().await;
    assert_eq!(h.ledger.list(campaign.id, 10).len(), 2);

    h.store.toggle(campaign.id, "owner-1").unwrap();
    h.dispatcher.tick().await;
    assert_eq!(h.ledger.list(campaign.id, 10).len(), 3);
    assert!(h
        .ledger
        .latest(campaign.id, "+5511777770000")
        .is_some());
}

#[tokio::test]
async fn test_scheduled_campaign_waits_until_due() {
    let h = harness(3600);
    h.submissions.add_submission(
        h.quiz_id,
        submission("+5511999990000", &[("nome", "Ana")], true),
    );

    let campaign = h
        .store
        .create(
            "owner-1",
            NewCampaign {
                scheduled_for: Some(Utc::now() + Duration::milliseconds(150)),
                ..campaign_request(h.quiz_id, Channel::Sms, "Oi {nome}")
            },
        )
        .unwrap();

    h.dispatcher.tick().await;
    assert_eq!(
        h.store.get_any(campaign.id).unwrap().status,
        CampaignStatus::Scheduled
    );

    // Not due yet: stays scheduled, nothing dispatched.
    h.dispatcher.tick().await;
    assert_eq!(h.ledger.list(campaign.id, 10).len(), 0);

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    h.dispatcher.tick().await;
    assert_eq!(
        h.store.get_any(campaign.id).unwrap().status,
        CampaignStatus::Active
    );
    h.dispatcher.tick().await;
    assert_eq!(h.ledger.list(campaign.id, 10).len(), 1);
}

#[tokio::test]
async fn test_oversized_sms_template_fails_recipients_without_retry() {
    let h = harness(3600);
    h.submissions.add_submission(
        h.quiz_id,
        submission("+5511999990000", &[], true),
    );

    let long_template = "a".repeat(161);
    let campaign = h
        .store
        .create(
            "owner-1",
            campaign_request(h.quiz_id, Channel::Sms, &long_template),
        )
        .unwrap();

    h.dispatcher.tick().await;
    h.dispatcher.tick().await;
    h.dispatcher.tick().await;

    // One pre-flight rejection, never retried, campaign itself survives.
    let records = h.ledger.list(campaign.id, 10);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, DeliveryStatus::Failed);
    assert!(records[0].permanent_failure);
    assert!(records[0].error_detail.as_deref().unwrap().contains("161"));
    assert_ne!(
        h.store.get_any(campaign.id).unwrap().status,
        CampaignStatus::Failed
    );
}

#[tokio::test]
async fn test_missing_quiz_fails_campaign() {
    let h = harness(3600);
    let unknown_quiz = Uuid::new_v4();

    let campaign = h
        .store
        .create(
            "owner-1",
            campaign_request(unknown_quiz, Channel::Sms, "Oi {nome}"),
        )
        .unwrap();

    h.dispatcher.tick().await;
    h.dispatcher.tick().await;

    assert_eq!(
        h.store.get_any(campaign.id).unwrap().status,
        CampaignStatus::Failed
    );
}

#[tokio::test]
async fn test_completion_waits_for_quiet_period() {
    let h = harness(3600);
    h.submissions.add_submission(
        h.quiz_id,
        submission("+5511999990000", &[("nome", "Ana")], true),
    );

    let campaign = h
        .store
        .create("owner-1", campaign_request(h.quiz_id, Channel::Sms, "Oi {nome}"))
        .unwrap();

    h.dispatcher.tick().await;
    h.dispatcher.tick().await;
    h.dispatcher.tick().await;

    // Everything is sent but the quiet period has not elapsed: the campaign
    // keeps watching for late leads.
    let counts = h.ledger.counts_by_status(campaign.id);
    assert_eq!(counts.get(&DeliveryStatus::Sent), Some(&1));
    assert_eq!(
        h.store.get_any(campaign.id).unwrap().status,
        CampaignStatus::Active
    );
}
