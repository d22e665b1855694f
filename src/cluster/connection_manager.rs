use std::net::SocketAddr;
use tokio::sync::mpsc::Sender;

#[cfg(test)]
use mockall::*;

use crate::error::{Error, Result};
use crate::future::BoxFuture;
use crate::transport::Transport;

/// Manages establishing connections to nodes.
pub trait ConnectionManager<T: Transport>: Send + Sync {
    /// Tries to establish a new, ready to use connection, with an optional
    /// error handler notified when the connection breaks later on.
    fn connection(
        &self,
        error_handler: Option<Sender<Error>>,
        addr: SocketAddr,
    ) -> BoxFuture<Result<T>>;
}

#[cfg(test)]
mock! {
    pub ConnectionManager<T: Transport> {
    }

    #[allow(dead_code)]
    impl<T: Transport> ConnectionManager<T> for ConnectionManager<T> {
        fn connection<'a>(
            &'a self,
            error_handler: Option<Sender<Error>>,
            addr: SocketAddr,
        ) -> BoxFuture<'a, Result<T>>;
    }
}
