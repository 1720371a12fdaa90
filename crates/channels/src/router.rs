//! Routes a rendered payload to the adapter for the campaign's channel.

use std::sync::Arc;

use funnel_core::error::DispatchResult;
use funnel_core::types::{Channel, DeliveryOutcome};
use tracing::debug;
use uuid::Uuid;

use crate::email::EmailAdapter;
use crate::sms::SmsAdapter;
use crate::whatsapp::WhatsAppBridge;

/// Owns one adapter per channel and dispatches by campaign channel.
pub struct DeliveryRouter {
    sms: SmsAdapter,
    whatsapp: Arc<WhatsAppBridge>,
    email: EmailAdapter,
}

impl DeliveryRouter {
    pub fn new(sms: SmsAdapter, whatsapp: Arc<WhatsAppBridge>, email: EmailAdapter) -> Self {
        Self {
            sms,
            whatsapp,
            email,
        }
    }

    /// Deliver one rendered payload over the given channel.
    pub async fn send(
        &self,
        channel: Channel,
        campaign_id: Uuid,
        identity: &str,
        payload: &str,
    ) -> DispatchResult<DeliveryOutcome> {
        debug!(
            channel = channel.as_str(),
            campaign_id = %campaign_id,
            to = %identity,
            "Dispatching send"
        );

        metrics::counter!(
            "channels.dispatched",
            "channel" => channel.as_str()
        )
        .increment(1);

        match channel {
            Channel::Sms => self.sms.send(identity, payload).await,
            Channel::Whatsapp => self.whatsapp.send(campaign_id, identity, payload).await,
            Channel::Email => self.email.send(identity, payload).await,
        }
    }

    /// The extension bridge surface, shared with the HTTP layer.
    pub fn whatsapp_bridge(&self) -> Arc<WhatsAppBridge> {
        self.whatsapp.clone()
    }
}
