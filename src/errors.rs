use thiserror::Error;

use crate::notifications::NotificationKind;

/// Failures raised by the persistent store. Never fatal to a session:
/// the reconciler logs these and keeps serving the in-memory cart.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Failures raised by the remote cart gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("product not found: {0}")]
    ProductNotFound(String),

    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("service error ({status}): {message}")]
    Service { status: u16, message: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("unauthorized")]
    Unauthorized,
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::MalformedResponse(err.to_string())
        } else {
            GatewayError::Network(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum CartError {
    #[error("product not found: {0}")]
    ProductNotFound(String),

    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("service error: {0}")]
    Service(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<GatewayError> for CartError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::ProductNotFound(id) => CartError::ProductNotFound(id),
            GatewayError::InvalidQuantity(msg) => CartError::InvalidQuantity(msg),
            GatewayError::Network(msg) => CartError::Network(msg),
            GatewayError::Service { status, message } => {
                CartError::Service(format!("{} ({})", message, status))
            }
            GatewayError::MalformedResponse(msg) => {
                CartError::Other(anyhow::anyhow!("malformed gateway response: {}", msg))
            }
            GatewayError::Unauthorized => {
                CartError::Unauthorized("gateway rejected credentials".to_string())
            }
        }
    }
}

impl CartError {
    /// Maps an error to the notification taxonomy surfaced to the user.
    /// Not-found and invalid-quantity keep their identity; everything
    /// else collapses into a generic failure.
    pub fn notification_kind(&self) -> NotificationKind {
        match self {
            Self::ProductNotFound(_) => NotificationKind::ProductNotFound,
            Self::InvalidQuantity(_) => NotificationKind::InvalidQuantity,
            _ => NotificationKind::Failure,
        }
    }
}
