//! HTTP header names used by the x402 v1 exchange.
//!
//! Names are lowercase so they can be inserted into an [`http::HeaderMap`]
//! directly; lookups are case-insensitive either way.

/// `X-PAYMENT`: the signed payment (client to server).
pub const X_PAYMENT_HEADER: &str = "x-payment";

/// `X-PAYMENT-RESPONSE`: the settlement result (server to client).
pub const X_PAYMENT_RESPONSE_HEADER: &str = "x-payment-response";

/// `PAYMENT-REQUIRED`: the 402 challenge, when a server sends it as a
/// header instead of the body.
pub const PAYMENT_REQUIRED_HEADER: &str = "payment-required";
