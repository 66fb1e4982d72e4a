//! Wire types for the EIP-155 "exact" payment scheme.
//!
//! The client signs an ERC-3009 `transferWithAuthorization` over EIP-712
//! and ships the signature together with the authorization it covers.

use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_sol_types::sol;
use proxy402::TokenAmount;
use proxy402::proto::{self, ExactScheme, UnixTimestamp};
use serde::{Deserialize, Serialize};

/// EIP-712 message of an ERC-3009 transfer authorization.
///
/// Who may move how many tokens to whom, and during which window. Every
/// integer serializes as a decimal string; the nonce is 32-byte hex.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip3009Authorization {
    /// The address authorizing the transfer (token owner).
    pub from: Address,

    /// The recipient address for the transfer.
    pub to: Address,

    /// The amount of tokens to transfer (in token's smallest unit).
    pub value: TokenAmount,

    /// The authorization is not valid before this timestamp (inclusive).
    pub valid_after: UnixTimestamp,

    /// The authorization expires at this timestamp (exclusive).
    pub valid_before: UnixTimestamp,

    /// A unique 32-byte nonce to prevent replay attacks.
    pub nonce: B256,
}

impl Eip3009Authorization {
    /// Returns `true` once `now` has reached `validBefore`.
    #[must_use]
    pub fn is_expired_at(&self, now: UnixTimestamp) -> bool {
        now >= self.valid_before
    }
}

impl From<&Eip3009Authorization> for TransferWithAuthorization {
    fn from(authorization: &Eip3009Authorization) -> Self {
        Self {
            from: authorization.from,
            to: authorization.to,
            value: authorization.value.into(),
            validAfter: U256::from(authorization.valid_after.as_secs()),
            validBefore: U256::from(authorization.valid_before.as_secs()),
            nonce: authorization.nonce,
        }
    }
}

/// The `payload` field of an exact-scheme payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmPayload {
    /// The signature over the authorization's EIP-712 hash.
    ///
    /// 65 bytes for an externally owned account; wallets backed by a
    /// contract may return a longer EIP-1271 signature.
    pub signature: Bytes,

    /// The authorization that was signed.
    pub authorization: Eip3009Authorization,
}

/// The `extra` field of exact-scheme requirements: the token's EIP-712 domain.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirementsExtra {
    /// The token name as used in the EIP-712 domain.
    pub name: String,

    /// The token version as used in the EIP-712 domain.
    pub version: String,
}

sol!(
    /// Solidity-compatible struct definition for ERC-3009 `transferWithAuthorization`.
    ///
    /// The EIP-712 hash of this struct under the token's domain is what the
    /// payer signs and what the token contract recovers on settlement.
    #[derive(Serialize, Deserialize)]
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
);

/// Payment requirements with EVM-specific types.
pub type PaymentRequirements =
    proto::PaymentRequirements<ExactScheme, Address, PaymentRequirementsExtra>;

/// A signed exact-scheme payment, ready for the `X-PAYMENT` header.
pub type SignedPayment = proto::PaymentPayload<ExactScheme, ExactEvmPayload>;
