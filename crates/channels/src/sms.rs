//! Twilio-shaped SMS adapter with a hard 160-character pre-flight guard.

use funnel_core::config::SmsProviderConfig;
use funnel_core::error::{DispatchError, DispatchResult};
use funnel_core::types::DeliveryOutcome;
use tracing::{debug, info};
use uuid::Uuid;

/// Single-message SMS length ceiling. Campaign messages never concatenate;
/// anything longer is rejected before the provider is touched.
pub const MAX_SMS_CHARS: usize = 160;

pub struct SmsAdapter {
    config: SmsProviderConfig,
}

impl SmsAdapter {
    pub fn new(config: SmsProviderConfig) -> Self {
        info!(
            account_sid = %config.account_sid,
            from = %config.from_number,
            "SMS adapter initialized"
        );
        Self { config }
    }

    /// Send one rendered payload to one phone number.
    ///
    /// Payloads over 160 characters fail with `Validation` before any
    /// provider interaction. Malformed phone numbers fail the same way.
    /// Provider-level rejections come back as failed outcomes, not errors.
    pub async fn send(&self, identity: &str, payload: &str) -> DispatchResult<DeliveryOutcome> {
        let char_count = payload.chars().count();
        if char_count > MAX_SMS_CHARS {
            return Err(DispatchError::validation(format!(
                "SMS payload is {} characters, limit is {}",
                char_count, MAX_SMS_CHARS
            )));
        }

        if !is_plausible_phone_number(identity) {
            return Err(DispatchError::validation(format!(
                "malformed phone number: {}",
                identity
            )));
        }

        if self.config.account_sid.is_empty() {
            return Err(DispatchError::configuration(
                "SMS provider credentials missing (account_sid)",
            ));
        }

        // Simulates the Twilio API call. In production: POST to
        // https://api.twilio.com/2010-04-01/Accounts/{sid}/Messages.json
        let provider_id = format!("SM{}", Uuid::new_v4().simple());

        debug!(
            to = %identity,
            from = %self.config.from_number,
            provider_id = %provider_id,
            segments = calculate_segments(payload),
            "SMS accepted by provider"
        );

        metrics::counter!("channels.sms.sent").increment(1);

        Ok(DeliveryOutcome::sent())
    }
}

/// E.164-ish sanity check: leading `+`, then 7 to 15 digits.
fn is_plausible_phone_number(identity: &str) -> bool {
    match identity.strip_prefix('+') {
        Some(digits) => {
            (7..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

/// Segment count for provider bookkeeping: GSM-7 bodies pack 160 chars into
/// one segment (153 when concatenated), UCS-2 bodies 70 (67 concatenated).
pub fn calculate_segments(payload: &str) -> u32 {
    if payload.is_empty() {
        return 1;
    }
    let chars = payload.chars().count() as u32;
    if payload.is_ascii() {
        if chars <= 160 {
            1
        } else {
            chars.div_ceil(153)
        }
    } else if chars <= 70 {
        1
    } else {
        chars.div_ceil(67)
    }
}
