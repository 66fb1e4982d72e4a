//! Token amounts in a token's smallest unit.
//!
//! Amounts in x402 are `uint256` values (e.g. `1000000` for 1 USDC). They are
//! carried on the wire as decimal strings so that no JSON parser along the way
//! routes them through a binary floating-point number.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use alloy_primitives::U256;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An arbitrary-precision unsigned token amount (up to `uint256`).
///
/// # Serialization
///
/// Always serialized as a decimal string. Deserialization accepts a decimal
/// string or a JSON integer that fits in `u64`; JSON floats, negative numbers,
/// hex strings and empty strings are rejected.
///
/// ```json
/// "1000000"
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenAmount(pub U256);

/// Error returned when a string is not a valid decimal token amount.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid token amount {0:?}: expected a non-negative decimal integer")]
pub struct ParseTokenAmountError(String);

impl TokenAmount {
    /// The zero amount.
    pub const ZERO: Self = Self(U256::ZERO);

    /// Returns the inner [`U256`] value.
    #[must_use]
    pub const fn inner(&self) -> U256 {
        self.0
    }

    /// Returns `true` if the amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Formats the amount as a human-readable decimal with the given number of
    /// token decimals, trimming trailing zeros (`1500000` with 6 decimals is `"1.5"`).
    #[must_use]
    pub fn format_units(&self, decimals: u8) -> String {
        let mut scale = U256::from(1u8);
        for _ in 0..decimals {
            scale *= U256::from(10u8);
        }
        let whole = self.0 / scale;
        let fraction = self.0 % scale;
        if fraction.is_zero() {
            return whole.to_string();
        }
        let fraction = format!("{fraction:0>width$}", width = usize::from(decimals));
        format!("{whole}.{}", fraction.trim_end_matches('0'))
    }
}

impl FromStr for TokenAmount {
    type Err = ParseTokenAmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseTokenAmountError(s.to_owned()));
        }
        U256::from_str_radix(s, 10)
            .map(Self)
            .map_err(|_| ParseTokenAmountError(s.to_owned()))
    }
}

impl Display for TokenAmount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<U256> for TokenAmount {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl From<TokenAmount> for U256 {
    fn from(value: TokenAmount) -> Self {
        value.0
    }
}

impl From<u64> for TokenAmount {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

struct TokenAmountVisitor;

impl Visitor<'_> for TokenAmountVisitor {
    type Value = TokenAmount;

    fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal integer string or a non-negative integer")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(TokenAmount::from(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        u64::try_from(v)
            .map(TokenAmount::from)
            .map_err(|_| E::custom("token amount must not be negative"))
    }

    fn visit_f64<E: de::Error>(self, _v: f64) -> Result<Self::Value, E> {
        Err(E::custom(
            "token amount must be an integer string, not a floating-point number",
        ))
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TokenAmountVisitor)
    }
}
