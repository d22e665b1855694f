use itertools::Itertools;
use std::io;
use std::result;
use std::sync::Arc;
use thiserror::Error as ThisError;

use crate::cluster::Host;

pub type Result<T> = result::Result<T, Error>;

/// Driver error type. Errors either describe host selection problems raised
/// while looking for a usable connection, or are produced by the query
/// execution itself and fed into retry classification. The variants
/// `Cancelled`, `DeadlineExceeded` and `NotFound` represent logical outcomes
/// of a request and never count against the health of the host that served
/// the attempt.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Internal IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// General error.
    #[error("General error: {0}")]
    General(String),
    /// Timed out waiting for an operation to complete.
    #[error("Timeout: {0}")]
    Timeout(String),
    /// The execution scope was cancelled.
    #[error("Execution cancelled")]
    Cancelled,
    /// The caller-provided deadline passed before the request completed.
    #[error("Deadline exceeded")]
    DeadlineExceeded,
    /// The requested entity does not exist.
    #[error("Not found")]
    NotFound,
    /// The routing policy produced a host that is absent or marked down.
    #[error("host missing or down")]
    HostMissingOrDown,
    /// No pool shard is registered for the host.
    #[error("no connection pool for host")]
    NoConnPool,
    /// The pool shard exists but has no usable connection right now.
    #[error("no connection to pick in host pool")]
    NoConnInHostPool,
    /// The host iterator emitted no hosts at all.
    #[error("no connections available")]
    NoConnections,
    /// The retry policy returned an unrecognized verdict.
    #[error("unknown retry verdict returned by retry policy")]
    UnknownRetryType,
    /// All candidate hosts failed; each underlying cause is preserved.
    #[error("{}", .errors.iter().join("; "))]
    HostSelection { errors: Vec<SelectHostError> },
}

impl Error {
    /// Outcomes of the request itself rather than symptoms of a failing
    /// host. These must not count toward removing a node from rotation.
    pub fn is_logical_outcome(&self) -> bool {
        matches!(
            self,
            Error::Cancelled | Error::DeadlineExceeded | Error::NotFound
        )
    }
}

impl From<String> for Error {
    fn from(error: String) -> Error {
        Error::General(error)
    }
}

impl From<&str> for Error {
    fn from(error: &str) -> Error {
        Error::General(error.to_string())
    }
}

impl Clone for Error {
    fn clone(&self) -> Self {
        match self {
            Error::Io(error) => Error::Io(io::Error::new(
                error.kind(),
                error
                    .get_ref()
                    .map(|error| error.to_string())
                    .unwrap_or_default(),
            )),
            Error::General(error) => Error::General(error.clone()),
            Error::Timeout(error) => Error::Timeout(error.clone()),
            Error::Cancelled => Error::Cancelled,
            Error::DeadlineExceeded => Error::DeadlineExceeded,
            Error::NotFound => Error::NotFound,
            Error::HostMissingOrDown => Error::HostMissingOrDown,
            Error::NoConnPool => Error::NoConnPool,
            Error::NoConnInHostPool => Error::NoConnInHostPool,
            Error::NoConnections => Error::NoConnections,
            Error::UnknownRetryType => Error::UnknownRetryType,
            Error::HostSelection { errors } => Error::HostSelection {
                errors: errors.clone(),
            },
        }
    }
}

fn display_host(host: &Option<Arc<Host>>) -> &str {
    host.as_ref()
        .map(|host| host.hostname())
        .unwrap_or("unknown host")
}

/// Failure to run an attempt on one candidate host, either because the host
/// did not pass the selection gates or because the attempt itself errored.
#[derive(Clone, Debug, ThisError)]
#[error("{}: {}", display_host(.host), .cause)]
pub struct SelectHostError {
    host: Option<Arc<Host>>,
    #[source]
    cause: Box<Error>,
}

impl SelectHostError {
    pub fn new(host: Option<Arc<Host>>, cause: Error) -> Self {
        SelectHostError {
            host,
            cause: Box::new(cause),
        }
    }

    #[inline]
    pub fn host(&self) -> Option<&Arc<Host>> {
        self.host.as_ref()
    }

    #[inline]
    pub fn cause(&self) -> &Error {
        &self.cause
    }
}
