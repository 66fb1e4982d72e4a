//! Wire format types for x402 protocol version 1.
//!
//! These are the JSON documents exchanged with a paid HTTP endpoint: the
//! [`PaymentRequirements`] a server issues in its 402 challenge (optionally
//! wrapped in a [`PaymentRequired`] envelope), the [`PaymentPayload`] the
//! client sends back in `X-PAYMENT`, and the [`SettleResponse`] a server may
//! return in `X-PAYMENT-RESPONSE`.
//!
//! # Wire Format
//!
//! All types serialize to JSON using camelCase field names. Integer-valued
//! amounts and timestamps are decimal strings.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

use crate::amount::TokenAmount;
use crate::error::PaymentError;

mod encoding;
mod timestamp;
mod version;

pub use encoding::Base64Bytes;
pub use timestamp::UnixTimestamp;
pub use version::Version;

/// Version marker for x402 protocol version 1; serializes as the integer `1`.
pub type X402Version1 = Version<1>;

/// Convenience constant for constructing V1 protocol messages.
pub const V1: X402Version1 = Version;

/// The `"exact"` payment scheme: transfer exactly `maxAmountRequired`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ExactScheme;

impl ExactScheme {
    /// The string literal value: `"exact"`.
    pub const VALUE: &'static str = "exact";
}

impl std::fmt::Display for ExactScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(Self::VALUE)
    }
}

impl AsRef<str> for ExactScheme {
    fn as_ref(&self) -> &str {
        Self::VALUE
    }
}

impl FromStr for ExactScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == Self::VALUE {
            Ok(Self)
        } else {
            Err(format!("expected '{}', got '{s}'", Self::VALUE))
        }
    }
}

impl Serialize for ExactScheme {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(Self::VALUE)
    }
}

impl<'de> Deserialize<'de> for ExactScheme {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Payment terms issued by the server in a 402 challenge.
///
/// `scheme`, `network`, `maxAmountRequired`, `payTo`, `asset` and
/// `maxTimeoutSeconds` are required; a document missing any of them does
/// not deserialize. The descriptive fields are optional.
///
/// # Type Parameters
///
/// - `TScheme` - The scheme identifier type (default: `String`)
/// - `TAddress` - The address type (default: `String`)
/// - `TExtra` - Scheme-specific extra data type (default: `serde_json::Value`)
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements<TScheme = String, TAddress = String, TExtra = serde_json::Value> {
    /// The payment scheme (e.g., "exact").
    pub scheme: TScheme,
    /// The network name (e.g., "base-sepolia").
    pub network: String,
    /// The amount to authorize, in the asset's smallest unit.
    pub max_amount_required: TokenAmount,
    /// The recipient address.
    pub pay_to: TAddress,
    /// The token contract address.
    pub asset: TAddress,
    /// Upper bound in seconds on the authorization's validity window.
    pub max_timeout_seconds: u64,
    /// The resource URL being paid for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Human-readable description of the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// MIME type of the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Optional JSON schema for the resource output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
    /// Scheme-specific extra data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<TExtra>,
}

impl PaymentRequirements {
    /// Converts the string-typed requirements into concrete types.
    ///
    /// An `extra` that does not deserialize into `TExtra` is dropped rather
    /// than treated as an error; it is only a hint.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::MalformedChallenge`] naming the first field
    /// (`scheme`, `payTo` or `asset`) that fails to parse.
    pub fn as_concrete<TScheme, TAddress, TExtra>(
        &self,
    ) -> Result<PaymentRequirements<TScheme, TAddress, TExtra>, PaymentError>
    where
        TScheme: FromStr,
        TAddress: FromStr,
        TExtra: DeserializeOwned,
    {
        let invalid = |field: &str, value: &str| {
            PaymentError::MalformedChallenge(format!("invalid {field}: {value:?}"))
        };
        let scheme = self
            .scheme
            .parse::<TScheme>()
            .map_err(|_| invalid("scheme", &self.scheme))?;
        let pay_to = self
            .pay_to
            .parse::<TAddress>()
            .map_err(|_| invalid("payTo", &self.pay_to))?;
        let asset = self
            .asset
            .parse::<TAddress>()
            .map_err(|_| invalid("asset", &self.asset))?;
        let extra = self
            .extra
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok());
        Ok(PaymentRequirements {
            scheme,
            network: self.network.clone(),
            max_amount_required: self.max_amount_required,
            pay_to,
            asset,
            max_timeout_seconds: self.max_timeout_seconds,
            resource: self.resource.clone(),
            description: self.description.clone(),
            mime_type: self.mime_type.clone(),
            output_schema: self.output_schema.clone(),
            extra,
        })
    }
}

/// HTTP 402 response body listing the acceptable payment methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    /// Protocol version (always 1).
    pub x402_version: X402Version1,
    /// Acceptable payment methods.
    #[serde(default)]
    pub accepts: Vec<PaymentRequirements>,
    /// Why the server asked for payment, or why a previous payment failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PaymentRequired {
    /// Picks the first accepted method using `scheme`, else the first method.
    #[must_use]
    pub fn preferred(&self, scheme: &str) -> Option<&PaymentRequirements> {
        self.accepts
            .iter()
            .find(|r| r.scheme == scheme)
            .or_else(|| self.accepts.first())
    }
}

/// A signed payment sent in the `X-PAYMENT` header.
///
/// # Type Parameters
///
/// - `TScheme` - The scheme identifier type (default: `String`)
/// - `TPayload` - The scheme-specific payload type (default: raw JSON)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload<TScheme = String, TPayload = serde_json::Value> {
    /// Protocol version (always 1).
    pub x402_version: X402Version1,
    /// The payment scheme (e.g., "exact").
    pub scheme: TScheme,
    /// The network name (e.g., "base-sepolia").
    pub network: String,
    /// The scheme-specific signed payload.
    pub payload: TPayload,
}

/// Settlement result returned by a paid endpoint in `X-PAYMENT-RESPONSE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleResponse {
    /// Settlement succeeded.
    Success {
        /// The address that paid, when reported.
        payer: Option<String>,
        /// The on-chain transaction hash.
        transaction: String,
        /// The network where settlement occurred.
        network: String,
    },
    /// Settlement failed.
    Error {
        /// Machine-readable reason for failure.
        reason: String,
        /// The address that attempted to pay, when reported.
        payer: Option<String>,
        /// The network where settlement was attempted.
        network: String,
    },
}

impl SettleResponse {
    /// Returns `true` if the settlement succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns the settlement transaction hash, if any.
    #[must_use]
    pub fn transaction(&self) -> Option<&str> {
        match self {
            Self::Success { transaction, .. } => Some(transaction),
            Self::Error { .. } => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettleResponseWire {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payer: Option<String>,
    #[serde(default)]
    transaction: String,
    network: String,
}

impl Serialize for SettleResponse {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let wire = match self {
            Self::Success {
                payer,
                transaction,
                network,
            } => SettleResponseWire {
                success: true,
                error_reason: None,
                payer: payer.clone(),
                transaction: transaction.clone(),
                network: network.clone(),
            },
            Self::Error {
                reason,
                payer,
                network,
            } => SettleResponseWire {
                success: false,
                error_reason: Some(reason.clone()),
                payer: payer.clone(),
                transaction: String::new(),
                network: network.clone(),
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SettleResponse {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = SettleResponseWire::deserialize(deserializer)?;
        if wire.success {
            if wire.transaction.is_empty() {
                return Err(serde::de::Error::missing_field("transaction"));
            }
            Ok(Self::Success {
                payer: wire.payer,
                transaction: wire.transaction,
                network: wire.network,
            })
        } else {
            let reason = wire
                .error_reason
                .ok_or_else(|| serde::de::Error::missing_field("errorReason"))?;
            Ok(Self::Error {
                reason,
                payer: wire.payer,
                network: wire.network,
            })
        }
    }
}
