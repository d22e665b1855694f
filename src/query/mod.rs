//! The query capability set consumed by the execution core, and the result
//! iterator surfaced back to the caller.
//!
//! The core is polymorphic over everything a query can do: execute against a
//! connection, record attempt telemetry, expose its retry and speculative
//! execution policies, derive a routing key, and keep itself alive while
//! attempt tasks still reference it. All of it is bundled into a single
//! [`ExecutableQuery`] trait so statements, prepared statements and batches
//! can share one execution path.

use async_trait::async_trait;
use bytes::Bytes;
use derivative::Derivative;
use derive_more::Constructor;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::cluster::Host;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::speculative_execution::SpeculativeExecutionPolicy;
use crate::token::Partitioner;
use crate::transport::Transport;

/// A single undecoded row. Decoding into concrete column types happens in
/// higher layers; the execution core moves rows around untouched.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Row(pub Bytes);

/// Lazy stream of rows produced by one attempt.
pub type RowStream = BoxStream<'static, Result<Row>>;

/// Result of one query execution: a lazy, finite stream of rows, or a
/// terminal error. Exactly one iterator is surfaced to the caller per
/// execution; iterators produced by losing speculative attempts are dropped
/// together with their row streams.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct ResultIter {
    #[derivative(Debug = "ignore")]
    rows: Option<RowStream>,
    error: Option<Error>,
    host: Option<Arc<Host>>,
}

impl ResultIter {
    /// Creates an iterator over given row stream.
    pub fn new(rows: RowStream) -> Self {
        ResultIter {
            rows: Some(rows),
            error: None,
            host: None,
        }
    }

    /// Creates an iterator with no rows and no error.
    pub fn empty() -> Self {
        ResultIter {
            rows: None,
            error: None,
            host: None,
        }
    }

    /// Creates an iterator carrying a terminal error.
    pub fn from_error(error: Error) -> Self {
        ResultIter {
            rows: None,
            error: Some(error),
            host: None,
        }
    }

    /// Terminal error of this execution, if any. Presence of an error is the
    /// normal failure surface of the driver.
    #[inline]
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// The host the producing attempt ran against.
    #[inline]
    pub fn host(&self) -> Option<&Arc<Host>> {
        self.host.as_ref()
    }

    pub(crate) fn set_host(&mut self, host: Arc<Host>) {
        self.host = Some(host);
    }

    /// Next row of the result, or `None` when the stream is exhausted.
    pub async fn next_row(&mut self) -> Option<Result<Row>> {
        match &mut self.rows {
            Some(rows) => rows.next().await,
            None => None,
        }
    }
}

/// Observation of one completed attempt, passed to
/// [`ExecutableQuery::record_attempt`] for telemetry. Never mutated after
/// creation.
#[derive(Clone, Debug, Constructor)]
pub struct AttemptInfo {
    pub keyspace: Option<Arc<String>>,
    pub start: Instant,
    pub end: Instant,
    pub host: Arc<Host>,
}

/// Retry-budget surface of a query, consumed by
/// [`RetryPolicy::attempt`](crate::retry::RetryPolicy::attempt).
pub trait RetryableQuery: Send + Sync {
    /// Number of attempts recorded for this query so far.
    fn attempt_count(&self) -> usize;
}

/// Full capability set the execution core needs from a unit of work.
///
/// The borrow/release pair is a liveness protocol: every attempt task borrows
/// the query before it is spawned and releases it when it finishes, so a
/// user-facing query can defer teardown until no attempt references it
/// anymore, even when the user has already let go of it.
#[async_trait]
pub trait ExecutableQuery<T: Transport>: RetryableQuery {
    /// Keeps the query alive for the lifetime of one execution task.
    fn borrow_for_execution(&self);

    /// Releases one execution borrow. Called exactly once per borrow, whether
    /// the task delivered its result, lost the race or was cancelled.
    fn release_after_execution(&self);

    /// Runs the query against given connection. Always returns an iterator;
    /// failures ride inside its error slot. Implementations should observe
    /// `context` and abandon the round trip when it is cancelled.
    async fn execute(&self, context: CancellationToken, connection: Arc<T>) -> ResultIter;

    /// Telemetry callback, invoked exactly once per completed attempt before
    /// the iterator is surfaced anywhere.
    fn record_attempt(&self, info: AttemptInfo, iter: &ResultIter);

    /// Retry policy for this query, if any.
    fn retry_policy(&self) -> Option<Arc<dyn RetryPolicy + Send + Sync>>;

    /// Speculative execution policy for this query, if any.
    fn speculative_execution_policy(&self) -> Option<Arc<dyn SpeculativeExecutionPolicy + Send + Sync>>;

    /// Serialized routing key, or `None` when the query is not routable.
    fn routing_key(&self) -> Result<Option<Bytes>>;

    /// Keyspace the query targets, if known upfront.
    fn keyspace(&self) -> Option<String>;

    /// Table the query targets, if known upfront.
    fn table(&self) -> Option<String>;

    /// Whether duplicate execution of this query is safe. Speculative
    /// execution is unconditionally disabled for non-idempotent queries.
    fn is_idempotent(&self) -> bool;

    /// Whether this is a lightweight transaction.
    fn is_lwt(&self) -> bool;

    /// Custom partitioner for the target table, if it does not live on the
    /// default Murmur3 ring.
    fn partitioner(&self) -> Option<Arc<dyn Partitioner + Send + Sync>>;

    /// Cancellation scope of this query. Deadlines are expected to arrive
    /// through this scope; the core imposes no timeout of its own.
    fn context(&self) -> &CancellationToken;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[test]
    fn error_iter_carries_error_and_no_rows() {
        let iter = ResultIter::from_error(Error::NoConnections);
        assert!(matches!(iter.error(), Some(Error::NoConnections)));
        assert!(iter.host().is_none());
    }

    #[tokio::test]
    async fn empty_iter_yields_no_rows() {
        let mut iter = ResultIter::empty();
        assert!(iter.error().is_none());
        assert!(iter.next_row().await.is_none());
    }

    #[tokio::test]
    async fn iter_streams_rows_in_order() {
        let rows = vec![
            Ok(Row(Bytes::from_static(b"first"))),
            Ok(Row(Bytes::from_static(b"second"))),
        ];

        let mut iter = ResultIter::new(stream::iter(rows).boxed());

        assert_eq!(
            iter.next_row().await.unwrap().unwrap(),
            Row(Bytes::from_static(b"first"))
        );
        assert_eq!(
            iter.next_row().await.unwrap().unwrap(),
            Row(Bytes::from_static(b"second"))
        );
        assert!(iter.next_row().await.is_none());
    }
}
