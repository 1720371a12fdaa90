use thiserror::Error;

pub type DispatchResult<T> = Result<T, DispatchError>;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Provider-side delivery failure. `permanent` distinguishes errors that
    /// must not be retried (invalid phone number) from transient ones
    /// (timeout, provider 5xx).
    #[error("Provider error: {message}")]
    Provider { message: String, permanent: bool },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatchError {
    pub fn validation(msg: impl Into<String>) -> Self {
        DispatchError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        DispatchError::NotFound(msg.into())
    }

    pub fn provider(msg: impl Into<String>, permanent: bool) -> Self {
        DispatchError::Provider {
            message: msg.into(),
            permanent,
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        DispatchError::Configuration(msg.into())
    }
}
