#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for the Proxy402 x402 payment client.
//!
//! This crate provides the chain-agnostic building blocks of the client-side
//! HTTP 402 Payment Required flow: the wire format of payment challenges and
//! signed payments, the arbitrary-precision token amount type, Unix timestamps
//! for authorization windows, and the error taxonomy shared by every layer.
//!
//! # Overview
//!
//! When a client requests a paid resource, the server answers `402` with
//! [`PaymentRequirements`](proto::PaymentRequirements). The client signs a
//! time-bounded authorization, wraps it in a
//! [`PaymentPayload`](proto::PaymentPayload) and retries the request with it.
//! A facilitator behind the server verifies and settles the authorization;
//! the client never talks to it directly.
//!
//! Chain-specific signing lives in `proxy402-evm`; the HTTP state machine
//! lives in `proxy402-http`.
//!
//! # Modules
//!
//! - [`amount`] - Arbitrary-precision token amounts that serialize as decimal strings
//! - [`error`] - The [`PaymentError`](error::PaymentError) taxonomy
//! - [`proto`] - Wire format types, base64 encoding and timestamps

pub mod amount;
pub mod error;
pub mod proto;

pub use amount::TokenAmount;
pub use error::{ErrorClass, PaymentError};

use std::future::Future;
use std::pin::Pin;

/// A boxed, `Send` future; the return type of object-safe async capabilities.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
