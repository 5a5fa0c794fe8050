//! Prepared call type.

use alloy::primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// One fully-built contract call, ready to hand to a signing backend.
///
/// Byte-identical inputs to the call builder always produce a byte-identical
/// [`PreparedCall`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedCall {
    /// The call target.
    pub target: Address,
    /// ABI-encoded call data.
    pub data: Bytes,
    /// Native value attached to the call.
    pub value: U256,
}

impl PreparedCall {
    /// Creates a call with no attached native value.
    pub fn new(target: Address, data: impl Into<Bytes>) -> Self {
        Self { target, data: data.into(), value: U256::ZERO }
    }

    /// Attaches native value to the call.
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}
