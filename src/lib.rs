//! **cedrus** is the query execution core of a native client driver for
//! token-partitioned wide-column databases, written in Rust on top of tokio.
//!
//! Given a query, the [`QueryExecutor`](crate::cluster::QueryExecutor) asks a
//! pluggable [routing policy](crate::load_balancing) for a lazy plan of
//! candidate hosts, borrows a token-affine connection from the per-host
//! [connection pools](crate::cluster::ClusterConnectionPool), and runs the
//! query with per-attempt [retry classification](crate::retry). For
//! idempotent queries, a [speculative execution
//! policy](crate::speculative_execution) can race additional attempts on a
//! timer; the first attempt to produce a result wins and the rest are
//! cancelled.
//!
//! The caller always receives a [`ResultIter`](crate::query::ResultIter):
//! failures ride inside its error slot, carrying either the per-attempt error
//! chosen by the retry policy or the full history of host selection failures.
//!
//! ## What lives elsewhere
//!
//! Wire protocol framing, authentication, topology discovery and result
//! decoding are the business of surrounding layers. They meet this crate at
//! narrow seams: the [`Transport`](crate::transport::Transport) and
//! [`ConnectionManager`](crate::cluster::ConnectionManager) traits on one
//! side, and the [`ExecutableQuery`](crate::query::ExecutableQuery)
//! capability bundle on the other. Statements, prepared statements and
//! batches all implement `ExecutableQuery` and share the single execution
//! path.
//!
//! ## Cancellation
//!
//! Every query carries a cancellation scope
//! ([`CancellationToken`](tokio_util::sync::CancellationToken)); deadlines
//! are expected to arrive through it. The executor derives a child scope per
//! execution and cancels it when a winner emerges, so losing speculative
//! attempts unwind instead of lingering.

pub mod cluster;
pub mod error;
pub mod future;
pub mod load_balancing;
pub mod query;
pub mod retry;
pub mod speculative_execution;
pub mod token;
pub mod transport;

pub type Error = error::Error;
pub type Result<T> = error::Result<T>;
