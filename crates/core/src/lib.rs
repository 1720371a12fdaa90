pub mod config;
pub mod error;
pub mod template;
pub mod types;

pub use config::AppConfig;
pub use error::{DispatchError, DispatchResult};
