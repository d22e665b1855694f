//! Hedged execution: racing duplicate attempts against additional nodes.
//!
//! One slow host (overloaded, or stalled in a GC pause) drags down the tail
//! latency of every query routed to it. Instead of waiting out the full
//! round trip, the driver can start the same query on another node after a
//! configurable delay, while the first request is still in flight. Whichever
//! attempt produces a result first is surfaced; the rest are cancelled.
//!
//! Hedging runs only for idempotent queries, since nothing guarantees that
//! exactly one node ends up applying a mutation. Retry behavior is
//! unaffected: each racing attempt retries independently.

use derive_more::Constructor;
use std::time::Duration;

/// The policy that decides whether and when the driver sends speculative
/// executions to further nodes while the current one has not replied yet.
pub trait SpeculativeExecutionPolicy {
    /// Number of speculative executions launched in addition to the primary
    /// one. Zero disables speculation entirely.
    fn attempts(&self) -> usize;

    /// Delay between successive speculative launches.
    fn delay(&self) -> Duration;
}

/// Launches a fixed number of additional executions, each one constant delay
/// after the previous.
#[derive(Debug, Clone, Copy, Constructor)]
pub struct ConstantSpeculativeExecutionPolicy {
    attempts: usize,
    delay: Duration,
}

impl SpeculativeExecutionPolicy for ConstantSpeculativeExecutionPolicy {
    fn attempts(&self) -> usize {
        self.attempts
    }

    fn delay(&self) -> Duration {
        self.delay
    }
}
