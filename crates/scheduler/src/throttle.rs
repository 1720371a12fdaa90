//! Send-rate limiting, scoped per channel-provider credential — the
//! resource that is actually constrained externally.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use funnel_core::config::RateLimitConfig;
use funnel_core::types::Channel;
use parking_lot::Mutex;

/// Sliding one-minute window counter for a single provider credential.
struct ProviderWindow {
    max_per_minute: u64,
    minute_counter: AtomicU64,
    last_reset: Mutex<DateTime<Utc>>,
}

impl ProviderWindow {
    fn new(max_per_minute: u64) -> Self {
        Self {
            max_per_minute,
            minute_counter: AtomicU64::new(0),
            last_reset: Mutex::new(Utc::now()),
        }
    }

    fn try_acquire(&self) -> bool {
        self.maybe_reset();
        let taken = self.minute_counter.fetch_add(1, Ordering::Relaxed);
        if taken >= self.max_per_minute {
            self.minute_counter.fetch_sub(1, Ordering::Relaxed);
            return false;
        }
        true
    }

    fn maybe_reset(&self) {
        let now = Utc::now();
        let mut last = self.last_reset.lock();
        if (now - *last).num_seconds() >= 60 {
            self.minute_counter.store(0, Ordering::Relaxed);
            *last = now;
        }
    }

    fn current(&self) -> u64 {
        self.minute_counter.load(Ordering::Relaxed)
    }
}

/// One rate-limit window per channel provider.
pub struct RateLimiterSet {
    sms: ProviderWindow,
    whatsapp: ProviderWindow,
    email: ProviderWindow,
}

impl RateLimiterSet {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            sms: ProviderWindow::new(config.sms_per_minute),
            whatsapp: ProviderWindow::new(config.whatsapp_per_minute),
            email: ProviderWindow::new(config.email_per_minute),
        }
    }

    fn window(&self, channel: Channel) -> &ProviderWindow {
        match channel {
            Channel::Sms => &self.sms,
            Channel::Whatsapp => &self.whatsapp,
            Channel::Email => &self.email,
        }
    }

    /// Take one send slot for the channel's provider. Returns false when
    /// the minute budget is exhausted; the caller defers to a later cycle.
    pub fn try_acquire(&self, channel: Channel) -> bool {
        let acquired = self.window(channel).try_acquire();
        if !acquired {
            metrics::counter!(
                "dispatch.throttled",
                "channel" => channel.as_str()
            )
            .increment(1);
        }
        acquired
    }

    pub fn current_rate(&self, channel: Channel) -> u64 {
        self.window(channel).current()
    }
}
