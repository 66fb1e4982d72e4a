//! Error taxonomy for the client-side payment flow.
//!
//! Every failure the handler can surface is one [`PaymentError`] variant.
//! Callers that need to decide between retrying, prompting the user, or
//! fixing their setup use [`PaymentError::class`].

use crate::amount::TokenAmount;
use crate::proto::UnixTimestamp;

/// Coarse classification of a [`PaymentError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// A transient failure; repeating the request may succeed.
    Retryable,
    /// The user must act (fund the wallet, approve the signature, pay again).
    UserAction,
    /// A setup or integration bug; repeating will fail the same way.
    Configuration,
}

/// Errors returned by the payment handler.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// The 402 response did not carry a usable challenge.
    #[error("malformed payment challenge: {0}")]
    MalformedChallenge(String),

    /// The challenge names a network this client is not configured for.
    #[error("unsupported network: {0}")]
    UnsupportedNetwork(String),

    /// An `X-PAYMENT` header value could not be decoded.
    #[error("malformed payment header: {0}")]
    MalformedPaymentHeader(String),

    /// The payer's token balance does not cover the required amount.
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        /// Amount demanded by the challenge.
        required: TokenAmount,
        /// Balance reported by the token contract.
        available: TokenAmount,
    },

    /// The signer refused to sign (user rejection or timeout).
    #[error("signing declined: {0}")]
    SigningDeclined(String),

    /// The wallet could not be moved to the required chain.
    #[error("failed to switch wallet to chain {chain_id}: {reason}")]
    ChainSwitchFailed {
        /// The chain the wallet was asked to switch to.
        chain_id: u64,
        /// Reason reported by the wallet.
        reason: String,
    },

    /// The signed authorization is no longer valid.
    #[error("payment authorization expired (valid before {valid_before})")]
    AuthorizationExpired {
        /// End of the authorization's validity window.
        valid_before: UnixTimestamp,
    },

    /// The server answered the paid retry with another 402.
    #[error(
        "payment rejected by server{}",
        .reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default()
    )]
    PaymentRejected {
        /// Error string from the server's second challenge, if any.
        reason: Option<String>,
    },

    /// The HTTP request or a chain RPC call failed.
    #[error("transport error: {0}")]
    TransportError(String),

    /// The request body is a stream and cannot be replayed with a payment.
    #[error("request cannot be cloned for a paid retry")]
    RequestNotCloneable,
}

impl PaymentError {
    /// Classifies the error by who can resolve it.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::TransportError(_) | Self::ChainSwitchFailed { .. } => ErrorClass::Retryable,
            Self::InsufficientFunds { .. }
            | Self::SigningDeclined(_)
            | Self::AuthorizationExpired { .. }
            | Self::PaymentRejected { .. } => ErrorClass::UserAction,
            Self::UnsupportedNetwork(_)
            | Self::MalformedChallenge(_)
            | Self::MalformedPaymentHeader(_)
            | Self::RequestNotCloneable => ErrorClass::Configuration,
        }
    }

    /// Returns `true` if repeating the operation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.class(), ErrorClass::Retryable)
    }
}
