//! Error types for the protocol layer.
//!
//! Each crate in Tunesmith defines its own error enum. When you see a
//! `ProtocolError`, the problem is in turning bodies into bytes (or back),
//! not in networking or session bookkeeping.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: the backend answered with HTML instead of JSON,
    /// a required field such as `token` is missing, or the body was
    /// truncated.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The body decoded but violates the contract, e.g. an empty token.
    #[error("invalid body: {0}")]
    InvalidBody(String),
}
