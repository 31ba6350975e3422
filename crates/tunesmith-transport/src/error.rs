use tunesmith_protocol::ProtocolError;

/// Errors that can occur while talking to the backend.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request never produced an HTTP response (DNS, refused
    /// connection, TLS, timeout, truncated body).
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// The backend rejected the bearer token or credentials (401/403).
    #[error("unauthorized")]
    Unauthorized(Option<String>),

    /// Any other non-2xx status.
    #[error("backend returned HTTP {status}")]
    Status {
        status: u16,
        message: Option<String>,
    },

    /// A 2xx body that doesn't match the contract.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The HTTP client could not be built from the given configuration.
    #[error("invalid HTTP client configuration: {0}")]
    Config(String),
}

impl TransportError {
    /// The reason the backend put in its error body, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Unauthorized(message) | Self::Status { message, .. } => {
                message.as_deref()
            }
            _ => None,
        }
    }
}
