//! Spending authorization for ERC-20 payments.
//!
//! Entered only for operations that move an ERC-20 token. The flow prefers a
//! gasless off-chain authorization bound to the permit registry and falls back
//! to a direct on-chain approval of the destination spender when the signing
//! step throws (user rejection, wallet incompatibility). The two paths are
//! mutually exclusive per attempt: a fallback approval targets the destination
//! spender directly, never the registry, so allowance is never double-spent.

use crate::{
    config::RpcConfig,
    constants::{ALLOWANCE_EXPIRATION, ALLOWANCE_SIG_DEADLINE, PERMIT_REGISTRY},
    error::{AllowanceError, truncate_for_display},
    resolver::{ReadError, bounded_read},
    signers::OperationSigner,
    types::{
        AllowanceSignature, PreparedCall,
        contracts::{IAllowanceTransfer, IERC20, PermitDetails, PermitSingle},
        permit_signing_hash,
    },
};
use alloy::{
    primitives::{Address, ChainId, U256, aliases::U48},
    providers::DynProvider,
    sol_types::SolCall,
};
use chrono::Utc;
use tracing::{debug, warn};

impl From<ReadError> for AllowanceError {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::TimedOut => AllowanceError::Timeout,
            ReadError::Contract(err) => AllowanceError::Contract(err),
        }
    }
}

/// Establishes spending authorization for one chain's ERC-20 payment.
///
/// Returns `Some` signature for the gasless path, `None` when the fallback
/// approved the destination spender directly (the payment call then proceeds
/// without the permit metadata blob).
pub async fn ensure_authorization(
    signer: &dyn OperationSigner,
    provider: &DynProvider,
    rpc: &RpcConfig,
    chain_id: ChainId,
    token: Address,
    amount: U256,
    spender: Address,
) -> Result<Option<AllowanceSignature>, AllowanceError> {
    let owner = signer.address();

    // The registry can only move what the token lets it move.
    let erc20 = IERC20::new(token, provider.clone());
    let registry_allowance = bounded_read(rpc, || {
        let erc20 = erc20.clone();
        async move { erc20.allowance(owner, PERMIT_REGISTRY).call().await }
    })
    .await?;

    if registry_allowance < amount {
        debug!(chain_id, %token, "registry allowance insufficient, approving");
        approve(signer, chain_id, token, PERMIT_REGISTRY, U256::MAX).await?;
    }

    // One-time nonce for the authorization, read from the registry.
    let registry = IAllowanceTransfer::new(PERMIT_REGISTRY, provider.clone());
    let current = bounded_read(rpc, || {
        let registry = registry.clone();
        async move { registry.allowance(owner, token, spender).call().await }
    })
    .await?;

    let now = Utc::now().timestamp() as u64;
    let permit = PermitSingle {
        details: PermitDetails {
            token,
            amount: amount.saturating_to(),
            expiration: U48::from(now + ALLOWANCE_EXPIRATION.as_secs()),
            nonce: current.nonce,
        },
        spender,
        sigDeadline: U256::from(now + ALLOWANCE_SIG_DEADLINE.as_secs()),
    };

    match signer.sign_payload_hash(chain_id, permit_signing_hash(&permit, chain_id)).await {
        Ok(signature) => Ok(Some(AllowanceSignature {
            token,
            amount: permit.details.amount,
            expiration: permit.details.expiration,
            nonce: permit.details.nonce,
            spender,
            sig_deadline: permit.sigDeadline,
            signature,
        })),
        Err(err) if err.is_rejection() => {
            // A rejected signature prompt is not a wallet incompatibility;
            // still offer the direct path, which many wallets render more
            // familiarly.
            warn!(chain_id, %token, "allowance signature rejected, falling back to approval");
            approve(signer, chain_id, token, spender, amount).await?;
            Ok(None)
        }
        Err(err) => {
            warn!(chain_id, %token, %err, "allowance signing failed, falling back to approval");
            approve(signer, chain_id, token, spender, amount).await?;
            Ok(None)
        }
    }
}

/// Submits one ERC-20 approval transaction.
async fn approve(
    signer: &dyn OperationSigner,
    chain_id: ChainId,
    token: Address,
    spender: Address,
    amount: U256,
) -> Result<(), AllowanceError> {
    let call = PreparedCall::new(
        token,
        IERC20::approveCall { spender, amount }.abi_encode(),
    );
    match signer.send_call(chain_id, &call).await {
        Ok(_) => Ok(()),
        Err(err) if err.is_rejection() => Err(AllowanceError::Signer(err)),
        Err(err) => Err(AllowanceError::ApprovalFailed {
            spender,
            reason: truncate_for_display(err.to_string()),
        }),
    }
}
