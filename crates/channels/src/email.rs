//! SendGrid-shaped email adapter.
//!
//! Fully synchronous: a sent outcome means the downstream email service
//! accepted the message, not that it was delivered or opened.

use funnel_core::config::EmailProviderConfig;
use funnel_core::error::{DispatchError, DispatchResult};
use funnel_core::types::DeliveryOutcome;
use tracing::{debug, info};
use uuid::Uuid;

pub struct EmailAdapter {
    config: EmailProviderConfig,
}

impl EmailAdapter {
    pub fn new(config: EmailProviderConfig) -> Self {
        info!(from = %config.from_email, "Email adapter initialized");
        Self { config }
    }

    pub async fn send(&self, identity: &str, payload: &str) -> DispatchResult<DeliveryOutcome> {
        if !is_plausible_email(identity) {
            return Err(DispatchError::validation(format!(
                "malformed email address: {}",
                identity
            )));
        }

        if self.config.from_email.is_empty() {
            return Err(DispatchError::configuration(
                "email provider sender address missing",
            ));
        }

        // Simulates the SendGrid API call. In production: POST to
        // https://api.sendgrid.com/v3/mail/send with this payload.
        let _body = serde_json::json!({
            "personalizations": [{ "to": [{ "email": identity }] }],
            "from": {
                "email": self.config.from_email,
                "name": self.config.from_name
            },
            "content": [{ "type": "text/plain", "value": payload }]
        });

        let provider_id = format!("sg-{}", Uuid::new_v4());

        debug!(
            to = %identity,
            provider_id = %provider_id,
            "Email accepted by provider"
        );

        metrics::counter!("channels.email.sent").increment(1);

        Ok(DeliveryOutcome::sent())
    }
}

fn is_plausible_email(identity: &str) -> bool {
    match identity.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use funnel_core::types::DeliveryStatus;

    fn test_config() -> EmailProviderConfig {
        EmailProviderConfig {
            api_key: "SG.test_key".to_string(),
            from_email: "offers@example.com".to_string(),
            from_name: "Offers".to_string(),
        }
    }

    #[tokio::test]
    async fn test_send_accepted() {
        let adapter = EmailAdapter::new(test_config());
        let outcome = adapter
            .send("ana@example.com", "Oi Ana, sua oferta chegou")
            .await
            .unwrap();
        assert_eq!(outcome.status, DeliveryStatus::Sent);
    }

    #[tokio::test]
    async fn test_malformed_address_rejected() {
        let adapter = EmailAdapter::new(test_config());
        let result = adapter.send("not-an-email", "oi").await;
        assert!(matches!(result, Err(DispatchError::Validation(_))));
    }

    #[tokio::test]
    async fn test_missing_sender_is_configuration_error() {
        let adapter = EmailAdapter::new(EmailProviderConfig {
            api_key: String::new(),
            from_email: String::new(),
            from_name: String::new(),
        });
        let result = adapter.send("ana@example.com", "oi").await;
        assert!(matches!(result, Err(DispatchError::Configuration(_))));
    }
}
