//! Parsing of `402 Payment Required` challenges.
//!
//! A challenge is one JSON document, read from the `PAYMENT-REQUIRED` header
//! (base64) when present and from the body otherwise. It is either a bare
//! requirements object or the `{ x402Version, error, accepts }` envelope.
//! Responses with any other status are never inspected.

use alloy_primitives::Address;
use http::{HeaderMap, StatusCode};
use proxy402::PaymentError;
use proxy402::proto::{Base64Bytes, ExactScheme, PaymentRequired, PaymentRequirements};
use serde_json::Value;
use tracing::debug;

use crate::constants::PAYMENT_REQUIRED_HEADER;

/// The outcome of looking at a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Challenge {
    /// Not a 402; hand the response back untouched.
    PassThrough,
    /// A 402 carrying payment terms.
    Payment(PaymentChallenge),
}

/// Payment terms extracted from a 402 response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentChallenge {
    /// The selected payment method.
    pub requirements: PaymentRequirements,
    /// The server's explanation, when it sent the envelope form.
    pub error: Option<String>,
}

/// Classifies a response and, for a 402, extracts its payment terms.
///
/// # Errors
///
/// Returns [`PaymentError::MalformedChallenge`] if a 402 carries no usable
/// requirements document. Never fails for other statuses.
pub fn parse_challenge(
    status: StatusCode,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Challenge, PaymentError> {
    if status != StatusCode::PAYMENT_REQUIRED {
        return Ok(Challenge::PassThrough);
    }
    parse_payment_required(headers, body).map(Challenge::Payment)
}

/// Extracts the payment terms of a response already known to be a 402.
///
/// # Errors
///
/// Returns [`PaymentError::MalformedChallenge`] if neither the header nor the
/// body holds a valid requirements document.
pub fn parse_payment_required(
    headers: &HeaderMap,
    body: &[u8],
) -> Result<PaymentChallenge, PaymentError> {
    if let Some(header) = headers.get(PAYMENT_REQUIRED_HEADER) {
        debug!("reading challenge from {PAYMENT_REQUIRED_HEADER} header");
        let document = Base64Bytes::from(header.as_bytes())
            .decode()
            .map_err(|e| malformed(format!("invalid {PAYMENT_REQUIRED_HEADER} header: {e}")))?;
        return parse_document(&document);
    }
    parse_document(body)
}

fn parse_document(document: &[u8]) -> Result<PaymentChallenge, PaymentError> {
    let value: Value = serde_json::from_slice(document)
        .map_err(|e| malformed(format!("challenge is not JSON: {e}")))?;
    let challenge = if value.get("accepts").is_some() {
        let envelope: PaymentRequired =
            serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;
        let requirements = envelope
            .preferred(ExactScheme::VALUE)
            .cloned()
            .ok_or_else(|| malformed("challenge accepts no payment method".to_owned()))?;
        PaymentChallenge {
            requirements,
            error: envelope.error,
        }
    } else {
        PaymentChallenge {
            requirements: serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?,
            error: None,
        }
    };
    // payTo and asset must be 20-byte addresses.
    challenge
        .requirements
        .as_concrete::<String, Address, Value>()?;
    Ok(challenge)
}

/// Reads the `error` string of a response body, if it has one.
///
/// Used on the answer to a paid retry, where the body need not be a valid
/// challenge.
pub(crate) fn error_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<Value>(body)
        .ok()?
        .get("error")?
        .as_str()
        .map(str::to_owned)
}

const fn malformed(message: String) -> PaymentError {
    PaymentError::MalformedChallenge(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::prelude::*;
    use http::HeaderValue;
    use proxy402::TokenAmount;
    use serde_json::json;

    fn requirements() -> Value {
        json!({
            "scheme": "exact",
            "network": "base-sepolia",
            "maxAmountRequired": "1000000",
            "resource": "https://proxy402.com/abc123",
            "description": "Payment for GET https://example.com",
            "mimeType": "",
            "payTo": "0x209693Bc6afc0C5328bA36FaF03C514EF312287C",
            "maxTimeoutSeconds": 300,
            "asset": "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
            "extra": { "name": "USDC", "version": "2" }
        })
    }

    fn body(value: &Value) -> Vec<u8> {
        serde_json::to_vec(value).unwrap()
    }

    #[test]
    fn test_non_402_passes_through() {
        for status in [
            StatusCode::OK,
            StatusCode::NOT_FOUND,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::UNAUTHORIZED,
        ] {
            let parsed = parse_challenge(status, &HeaderMap::new(), b"garbage").unwrap();
            assert_eq!(parsed, Challenge::PassThrough);
        }
    }

    #[test]
    fn test_bare_requirements_body() {
        let parsed = parse_challenge(
            StatusCode::PAYMENT_REQUIRED,
            &HeaderMap::new(),
            &body(&requirements()),
        )
        .unwrap();
        let Challenge::Payment(challenge) = parsed else {
            panic!("expected a payment challenge");
        };
        assert_eq!(
            challenge.requirements.max_amount_required,
            TokenAmount::from(1_000_000u64)
        );
        assert_eq!(challenge.requirements.max_timeout_seconds, 300);
        assert!(challenge.error.is_none());
    }

    #[test]
    fn test_envelope_prefers_supported_scheme() {
        let mut other = requirements();
        other["scheme"] = json!("upto");
        let envelope = json!({
            "x402Version": 1,
            "error": "X-PAYMENT header is required",
            "accepts": [other, requirements()],
        });
        let challenge = parse_payment_required(&HeaderMap::new(), &body(&envelope)).unwrap();
        assert_eq!(challenge.requirements.scheme, "exact");
        assert_eq!(challenge.error.as_deref(), Some("X-PAYMENT header is required"));
    }

    #[test]
    fn test_header_takes_precedence_over_body() {
        let envelope = json!({ "x402Version": 1, "accepts": [requirements()] });
        let mut headers = HeaderMap::new();
        headers.insert(
            PAYMENT_REQUIRED_HEADER,
            HeaderValue::from_str(&BASE64_STANDARD.encode(body(&envelope))).unwrap(),
        );
        let challenge = parse_payment_required(&headers, b"<html>pay up</html>").unwrap();
        assert_eq!(challenge.requirements.network, "base-sepolia");
    }

    #[test]
    fn test_missing_fields_are_malformed() {
        for field in [
            "scheme",
            "network",
            "maxAmountRequired",
            "payTo",
            "asset",
            "maxTimeoutSeconds",
        ] {
            let mut value = requirements();
            value.as_object_mut().unwrap().remove(field);
            assert!(
                matches!(
                    parse_payment_required(&HeaderMap::new(), &body(&value)),
                    Err(PaymentError::MalformedChallenge(_))
                ),
                "missing {field}"
            );
        }
    }

    #[test]
    fn test_other_malformed_documents() {
        let mut float_amount = requirements();
        float_amount["maxAmountRequired"] = json!(1.5);
        let empty_accepts = json!({ "x402Version": 1, "accepts": [] });
        let wrong_version = json!({ "x402Version": 2, "accepts": [requirements()] });
        let mut short_address = requirements();
        short_address["payTo"] = json!("0x2096");
        for document in [
            b"not json".to_vec(),
            body(&short_address),
            body(&float_amount),
            body(&empty_accepts),
            body(&wrong_version),
        ] {
            assert!(matches!(
                parse_payment_required(&HeaderMap::new(), &document),
                Err(PaymentError::MalformedChallenge(_))
            ));
        }
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(br#"{"error":"authorization expired"}"#).as_deref(),
            Some("authorization expired")
        );
        assert_eq!(error_message(b"plain text"), None);
    }
}
