//! EVM "exact" payment scheme.
//!
//! The payer authorizes a transfer of exactly `maxAmountRequired` with an
//! ERC-3009 `transferWithAuthorization` signature.

pub mod types;

pub use types::*;
