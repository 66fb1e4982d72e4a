//! Error types for the HTTP transport layer.

use proxy402::PaymentError;

/// Errors that can occur while encoding or decoding x402 header values.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Base64 decoding failed.
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl From<HttpError> for PaymentError {
    fn from(error: HttpError) -> Self {
        Self::MalformedPaymentHeader(error.to_string())
    }
}
