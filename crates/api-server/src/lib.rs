//! HTTP/JSON surface of the dispatch engine — campaign management, delivery
//! logs, and the WhatsApp extension bridge.

pub mod auth;
pub mod handlers;
pub mod models;
pub mod router;
pub mod server;

pub use handlers::ApiState;
pub use server::ApiServer;
