//! EIP-712 typed data for `eth_signTypedData_v4`.
//!
//! [`TypedData`] is the full `(domain, types, primaryType, message)` tuple.
//! Wallets receive it serialized as JSON; local keys sign its EIP-712 hash.
//! Both routes hash the same document, so they yield the same signature.

use std::collections::BTreeMap;

use alloy_primitives::{Address, B256};
use alloy_sol_types::{SolStruct, eip712_domain};
use serde::{Deserialize, Serialize};

use crate::chain::ChainId;
use crate::exact::{Eip3009Authorization, PaymentRequirementsExtra, TransferWithAuthorization};

/// Name of the EIP-712 primary type signed for exact payments.
pub const PRIMARY_TYPE: &str = "TransferWithAuthorization";

/// A token's EIP-712 domain name and version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DomainMetadata {
    /// Domain `name` (e.g., `"USD Coin"`).
    pub name: String,
    /// Domain `version` (e.g., `"2"`).
    pub version: String,
}

impl DomainMetadata {
    /// Creates domain metadata from a name and version.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl From<PaymentRequirementsExtra> for DomainMetadata {
    fn from(extra: PaymentRequirementsExtra) -> Self {
        Self::new(extra.name, extra.version)
    }
}

/// The `domain` object of the typed data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedDataDomain {
    /// Token name.
    pub name: String,
    /// Token version.
    pub version: String,
    /// Chain the authorization is valid on.
    pub chain_id: ChainId,
    /// The token contract.
    pub verifying_contract: Address,
}

/// One member of an EIP-712 struct type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedField {
    /// Member name.
    pub name: String,
    /// Solidity type name.
    #[serde(rename = "type")]
    pub kind: String,
}

impl TypedField {
    fn new(name: &str, kind: &str) -> Self {
        Self {
            name: name.to_owned(),
            kind: kind.to_owned(),
        }
    }
}

/// An EIP-712 document describing one ERC-3009 transfer authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedData {
    /// Struct type definitions, including `EIP712Domain`.
    pub types: BTreeMap<String, Vec<TypedField>>,
    /// The type of `message`.
    pub primary_type: String,
    /// The signing domain.
    pub domain: TypedDataDomain,
    /// The authorization being signed.
    pub message: Eip3009Authorization,
}

impl TypedData {
    /// Builds the typed data for `authorization` under the given token domain.
    #[must_use]
    pub fn transfer_with_authorization(
        domain: &DomainMetadata,
        chain_id: ChainId,
        verifying_contract: Address,
        authorization: Eip3009Authorization,
    ) -> Self {
        let types = BTreeMap::from([
            (
                "EIP712Domain".to_owned(),
                vec![
                    TypedField::new("name", "string"),
                    TypedField::new("version", "string"),
                    TypedField::new("chainId", "uint256"),
                    TypedField::new("verifyingContract", "address"),
                ],
            ),
            (
                PRIMARY_TYPE.to_owned(),
                vec![
                    TypedField::new("from", "address"),
                    TypedField::new("to", "address"),
                    TypedField::new("value", "uint256"),
                    TypedField::new("validAfter", "uint256"),
                    TypedField::new("validBefore", "uint256"),
                    TypedField::new("nonce", "bytes32"),
                ],
            ),
        ]);
        Self {
            types,
            primary_type: PRIMARY_TYPE.to_owned(),
            domain: TypedDataDomain {
                name: domain.name.clone(),
                version: domain.version.clone(),
                chain_id,
                verifying_contract,
            },
            message: authorization,
        }
    }

    /// Computes the EIP-712 signing hash of the document.
    #[must_use]
    pub fn signing_hash(&self) -> B256 {
        let domain = eip712_domain! {
            name: self.domain.name.clone(),
            version: self.domain.version.clone(),
            chain_id: self.domain.chain_id,
            verifying_contract: self.domain.verifying_contract,
        };
        TransferWithAuthorization::from(&self.message).eip712_signing_hash(&domain)
    }
}
