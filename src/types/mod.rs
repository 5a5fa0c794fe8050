//! Orchestrator types.

mod call;
pub use call::PreparedCall;

pub mod contracts;

mod doubt;
pub use doubt::{Acknowledgement, DoubtSeverity, TransactionDoubt, required_acknowledgement};

mod permit;
pub use permit::{AllowanceSignature, permit_signing_hash};

mod request;
pub use request::{
    AdjustTiersParams, BundlingPreference, CashOutParams, DeployRevnetParams, DeploySuckersParams,
    FeeCall, LaunchProjectParams, OperationKind, OperationParams, OperationRequest, PayParams,
    QueueRulesetParams, UseAllowanceParams,
};

pub mod relay;

mod state;
pub use state::{BundleId, BundleState, BundleStatus, ChainState, ChainStatus, PaymentOption};
