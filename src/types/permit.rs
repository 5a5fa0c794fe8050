//! Gasless allowance signatures.

use super::contracts::{PermitDetails, PermitPayload, PermitSingle};
use crate::constants::PERMIT_REGISTRY;
use alloy::primitives::{
    Address, B256, Bytes, ChainId, U256,
    aliases::{U48, U160},
};
use alloy::sol_types::{SolStruct, SolValue, eip712_domain};

/// Computes the EIP-712 digest the user must sign for a [`PermitSingle`].
///
/// The domain binds the signature to the permit registry on one chain, so a
/// signature can never be replayed cross-chain.
pub fn permit_signing_hash(permit: &PermitSingle, chain_id: ChainId) -> B256 {
    let domain = eip712_domain! {
        name: "Permit2",
        chain_id: chain_id,
        verifying_contract: PERMIT_REGISTRY,
    };
    permit.eip712_signing_hash(&domain)
}

/// A signed gasless allowance.
///
/// Created during the allowance signing step, consumed exactly once when
/// building the first call of a payment operation, then discarded. Never
/// persisted or reused across operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowanceSignature {
    /// Token the allowance covers.
    pub token: Address,
    /// Authorized amount.
    pub amount: U160,
    /// Timestamp after which the allowance is void.
    pub expiration: U48,
    /// One-time nonce the signature was created against.
    pub nonce: U48,
    /// The spender the allowance is bound to.
    pub spender: Address,
    /// Deadline after which the signature itself is void.
    pub sig_deadline: U256,
    /// Raw signature bytes.
    pub signature: Bytes,
}

impl AllowanceSignature {
    /// Reassembles the [`PermitSingle`] this signature was produced over.
    pub fn permit(&self) -> PermitSingle {
        PermitSingle {
            details: PermitDetails {
                token: self.token,
                amount: self.amount,
                expiration: self.expiration,
                nonce: self.nonce,
            },
            spender: self.spender,
            sigDeadline: self.sig_deadline,
        }
    }

    /// Consumes the signature into the opaque metadata blob embedded in the
    /// first on-chain call of the operation.
    pub fn into_metadata(self) -> Bytes {
        let payload = PermitPayload { permit: self.permit(), signature: self.signature };
        payload.abi_encode().into()
    }
}
