//! Dispatch scheduling — campaign lifecycle, rate limiting, and the
//! periodic driver that moves messages from audience to adapter.

pub mod dispatcher;
pub mod state_machine;
pub mod store;
pub mod throttle;

pub use dispatcher::Dispatcher;
pub use state_machine::CampaignStateMachine;
pub use store::{AllowAllCredits, CampaignStore, CreditGate, NewCampaign, UpdateCampaign};
pub use throttle::RateLimiterSet;
