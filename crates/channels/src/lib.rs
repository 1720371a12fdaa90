//! Delivery adapters — one per channel {sms, whatsapp, email}.
//!
//! Adapters report ordinary delivery failures as `DeliveryOutcome`s; `Err`
//! is reserved for validation problems (payload too long, malformed
//! identity) and configuration problems (missing credentials).

pub mod email;
pub mod router;
pub mod sms;
pub mod whatsapp;

pub use email::EmailAdapter;
pub use router::DeliveryRouter;
pub use sms::SmsAdapter;
pub use whatsapp::{PendingSend, WhatsAppBridge};
