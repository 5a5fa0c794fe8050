//! Orchestrator metrics.

use metrics::{Counter, Gauge, Histogram};
use metrics_derive::Metrics;

/// Metrics for the [`CoordinatorService`](crate::coordinator::CoordinatorService).
#[derive(Metrics)]
#[metrics(scope = "orchestrator")]
pub struct CoordinatorMetrics {
    /// Number of submitted bundles.
    pub bundles_submitted: Counter,
    /// Number of bundles that completed on every chain.
    pub bundles_completed: Counter,
    /// Number of bundles that ended failed.
    pub bundles_failed: Counter,
    /// Number of bundles cancelled by the caller.
    pub bundles_cancelled: Counter,
    /// Number of bundles currently in flight.
    pub bundles_in_flight: Gauge,
    /// Number of chains confirmed.
    pub chains_confirmed: Counter,
    /// Number of chains failed.
    pub chains_failed: Counter,
    /// Number of chain flows abandoned by the user.
    pub user_cancellations: Counter,
    /// Number of relay updates referencing chains outside a bundle's target
    /// set.
    pub relay_inconsistencies: Counter,
    /// Number of stale relay/executor updates discarded after cancellation.
    pub stale_updates_discarded: Counter,
    /// Time from submission to bundle completion, in milliseconds.
    pub completion_time: Histogram,
}
