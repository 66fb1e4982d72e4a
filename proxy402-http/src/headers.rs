//! Encoding and decoding of the `X-PAYMENT` and `X-PAYMENT-RESPONSE` headers.
//!
//! Both headers carry standard base64 over a JSON document. Amounts and
//! timestamps inside the document are decimal strings, so values beyond
//! 2^53 survive any JSON implementation on the other end.

use base64::prelude::*;
use proxy402::PaymentError;
use proxy402::proto::SettleResponse;
use proxy402_evm::exact::SignedPayment;
use serde::de::DeserializeOwned;

use crate::error::HttpError;

/// Encodes a signed payment as the value of the `X-PAYMENT` header.
///
/// # Errors
///
/// Returns [`HttpError::Serialize`] if JSON serialization fails.
pub fn encode_payment(payment: &SignedPayment) -> Result<String, HttpError> {
    let json = serde_json::to_vec(payment)?;
    Ok(BASE64_STANDARD.encode(&json))
}

/// Decodes an `X-PAYMENT` header value.
///
/// # Errors
///
/// Returns [`PaymentError::MalformedPaymentHeader`] on bad base64, bad JSON,
/// or a document missing required fields.
pub fn decode_payment(header_value: &str) -> Result<SignedPayment, PaymentError> {
    Ok(decode_json(header_value)?)
}

/// Decodes an `X-PAYMENT-RESPONSE` header value.
///
/// # Errors
///
/// Returns [`PaymentError::MalformedPaymentHeader`] on bad base64 or JSON.
pub fn decode_payment_response(header_value: &str) -> Result<SettleResponse, PaymentError> {
    Ok(decode_json(header_value)?)
}

fn decode_json<T: DeserializeOwned>(header_value: &str) -> Result<T, HttpError> {
    let bytes = BASE64_STANDARD.decode(header_value.trim())?;
    Ok(serde_json::from_slice(&bytes)?)
}
