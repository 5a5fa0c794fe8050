//! Orchestrator constants.

use alloy::primitives::{Address, address};
use std::time::Duration;

/// Sentinel address denoting the chain's native asset rather than an ERC-20.
pub const NATIVE_TOKEN: Address = address!("0x000000000000000000000000000000000000EEEe");

/// The canonical permit registry.
///
/// Deployed at the same address on every supported chain via deterministic
/// deployment, so a single constant is sufficient.
pub const PERMIT_REGISTRY: Address = address!("0x000000000022D473030F116dDEE9F6B43aC78BA3");

/// How far in the future a gasless allowance expires.
pub const ALLOWANCE_EXPIRATION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// How long the signature over a gasless allowance stays valid.
///
/// Kept short: the signature is consumed by the first call of the operation it
/// was created for and never reused.
pub const ALLOWANCE_SIG_DEADLINE: Duration = Duration::from_secs(30 * 60);

/// Timeout applied to every read-only RPC call (allowance reads, directory
/// lookups, balance snapshots).
pub const RPC_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Number of additional attempts for a timed out read-only RPC call.
pub const RPC_READ_RETRIES: usize = 1;

/// Default interval between relay status polls.
pub const RELAY_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Default timeout for relay HTTP requests.
pub const RELAY_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum length of an error message surfaced to the caller.
///
/// Raw provider errors can embed entire revert payloads.
pub const DISPLAY_ERROR_MAX_LEN: usize = 256;

/// Maximum memo length before the verification engine flags it.
pub const MEMO_WARN_LEN: usize = 256;

/// How long to wait for a submitted transaction before considering it dropped.
pub const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Interval between receipt polls while waiting for confirmation.
pub const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(1_500);
