//! Construction of single-use ERC-3009 authorizations.
//!
//! An authorization is derived from the challenge, the payer address and the
//! current time. It has no side effects beyond drawing a nonce, and it is
//! never reused: every paid retry builds a fresh one.

use alloy_primitives::{Address, B256};
use proxy402::proto::UnixTimestamp;
use rand::RngExt;
use rand::rng;

use crate::exact::{Eip3009Authorization, PaymentRequirements};

/// Seconds `validAfter` is backdated to cover block-timestamp lag.
pub const CLOCK_SKEW_MARGIN_SECS: u64 = 5;

/// Draws a fresh 32-byte nonce from the thread-local CSPRNG.
#[must_use]
pub fn random_nonce() -> B256 {
    let nonce: [u8; 32] = rng().random();
    B256::from(nonce)
}

/// Builds the authorization for `requirements` paid by `from`, with a random nonce.
#[must_use]
pub fn build_authorization(
    requirements: &PaymentRequirements,
    from: Address,
    now: UnixTimestamp,
) -> Eip3009Authorization {
    build_authorization_with_nonce(requirements, from, now, random_nonce())
}

/// Builds the authorization with a caller-supplied nonce.
///
/// `validAfter` is `now` minus [`CLOCK_SKEW_MARGIN_SECS`] (floored at zero)
/// and `validBefore` is `now` plus `maxTimeoutSeconds`.
#[must_use]
pub fn build_authorization_with_nonce(
    requirements: &PaymentRequirements,
    from: Address,
    now: UnixTimestamp,
    nonce: B256,
) -> Eip3009Authorization {
    Eip3009Authorization {
        from,
        to: requirements.pay_to,
        value: requirements.max_amount_required,
        valid_after: now - CLOCK_SKEW_MARGIN_SECS,
        valid_before: now + requirements.max_timeout_seconds,
        nonce,
    }
}
