#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! HTTP side of the Proxy402 x402 payment client.
//!
//! Detects `402 Payment Required` challenges, encodes signed payments into
//! the `X-PAYMENT` header and retries the request once, either through
//! [`PaymentClient::send`] or as [`reqwest_middleware`] middleware.
//!
//! # Modules
//!
//! - [`challenge`] - Classifying responses and parsing 402 challenges
//! - [`client`] - The [`PaymentClient`] retry flow and middleware
//! - [`constants`] - Header names
//! - [`error`] - Header codec errors
//! - [`headers`] - Base64 encoding of `X-PAYMENT` and `X-PAYMENT-RESPONSE`

pub mod challenge;
pub mod client;
pub mod constants;
pub mod error;
pub mod headers;

pub use challenge::{Challenge, PaymentChallenge, parse_challenge};
pub use client::{
    BalanceCheck, PaidResponse, PaymentClient, PaymentReceipt, ReqwestWithPayments,
    ReqwestWithPaymentsBuild, send_presigned,
};
