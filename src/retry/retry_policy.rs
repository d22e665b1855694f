use derive_more::{Constructor, Display};

use crate::error::Error;
use crate::query::RetryableQuery;

/// Action chosen by a retry policy for a failed attempt.
#[derive(Debug, PartialEq, Eq, Ord, PartialOrd, Hash, Copy, Clone, Display)]
pub enum RetryVerdict {
    /// Retry on the same host.
    Retry,
    /// Retry on the next host from the query plan.
    RetryNextHost,
    /// Stop and surface the error to the caller.
    Rethrow,
    /// Stop and surface the current result as-is.
    Ignore,
    /// Reserved for verdicts this version does not know about. Policies must
    /// not return it; the executor maps it to an unknown-verdict error.
    #[doc(hidden)]
    __Unknown,
}

/// Retry policy determines what to do in case of a failed attempt.
///
/// The contract is two-phase: [`attempt`](RetryPolicy::attempt) budgets the
/// total number of retries for a query, while
/// [`verdict`](RetryPolicy::verdict) chooses the per-error action. The two
/// are orthogonal, so a policy can e.g. allow three tries in total but always
/// move to a different host on timeouts.
pub trait RetryPolicy {
    /// Whether the query may be retried at all, given its attempt history.
    fn attempt(&self, query: &dyn RetryableQuery) -> bool;

    /// Chooses the action for given error.
    fn verdict(&self, error: &Error) -> RetryVerdict;
}

/// Retries up to a fixed number of times, always on the next host.
#[derive(Copy, Clone, Debug, Constructor)]
pub struct SimpleRetryPolicy {
    number_of_retries: usize,
}

impl RetryPolicy for SimpleRetryPolicy {
    fn attempt(&self, query: &dyn RetryableQuery) -> bool {
        query.attempt_count() <= self.number_of_retries
    }

    fn verdict(&self, _error: &Error) -> RetryVerdict {
        RetryVerdict::RetryNextHost
    }
}

/// Forwards all errors directly to the user, never retries.
#[derive(Default, Copy, Clone, Debug)]
pub struct FallthroughRetryPolicy;

impl RetryPolicy for FallthroughRetryPolicy {
    fn attempt(&self, _query: &dyn RetryableQuery) -> bool {
        false
    }

    fn verdict(&self, _error: &Error) -> RetryVerdict {
        RetryVerdict::Rethrow
    }
}
