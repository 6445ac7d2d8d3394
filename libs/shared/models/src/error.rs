use thiserror::Error;

pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";
pub const NETWORK_FAILURE_MESSAGE: &str = "Network error. Please try again.";

/// Every failure a cell can surface to a view. Cloneable so a cached failure
/// can be handed to every observer of the same query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Map a non-2xx HTTP status to an error kind. `message` is the backend's
    /// envelope message when one was sent.
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        let message = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string());

        let error = match status {
            401 | 403 => AppError::Auth(message),
            404 => AppError::NotFound(message),
            400..=499 => AppError::Validation(message),
            _ => AppError::Server(message),
        };

        tracing::error!("API error ({}): {}", status, error);
        error
    }

    /// The bare message suitable for an inline banner.
    pub fn message(&self) -> &str {
        match self {
            AppError::Network(msg)
            | AppError::Auth(msg)
            | AppError::Validation(msg)
            | AppError::Server(msg)
            | AppError::NotFound(msg)
            | AppError::Storage(msg)
            | AppError::Serialization(msg)
            | AppError::Internal(msg) => msg,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, AppError::Auth(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}
