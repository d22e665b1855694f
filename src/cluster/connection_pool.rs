use arc_swap::ArcSwapOption;
use futures::future::join_all;
use fxhash::FxHashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use tracing::*;
use uuid::Uuid;

use crate::cluster::connection_manager::ConnectionManager;
use crate::cluster::host::Host;
use crate::error::{Error, Result};
use crate::token::Murmur3Token;
use crate::transport::Transport;

async fn new_connection<T: Transport, CM: ConnectionManager<T>>(
    connection_manager: &CM,
    broadcast_rpc_address: SocketAddr,
    timeout: Option<Duration>,
    error_handler: Option<mpsc::Sender<Error>>,
) -> Result<T> {
    if let Some(timeout) = timeout {
        tokio::time::timeout(
            timeout,
            connection_manager.connection(error_handler, broadcast_rpc_address),
        )
        .await
        .map_err(|_| {
            Error::Timeout(format!(
                "Timeout waiting for connection to: {broadcast_rpc_address}"
            ))
        })
        .and_then(|result| result)
    } else {
        connection_manager
            .connection(error_handler, broadcast_rpc_address)
            .await
    }
}

/// Configuration for per-host connection pools. By default each host gets a
/// single connection and establishment has no timeout.
#[derive(Clone, Copy)]
pub struct ConnectionPoolConfig {
    size: usize,
    connect_timeout: Option<Duration>,
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        ConnectionPoolConfig {
            size: 1,
            connect_timeout: None,
        }
    }
}

impl ConnectionPoolConfig {
    /// Creates a new configuration for pools of given size, with optional
    /// connect timeout.
    pub fn new(size: usize, connect_timeout: Option<Duration>) -> Self {
        assert!(size > 0);
        ConnectionPoolConfig {
            size,
            connect_timeout,
        }
    }
}

/// Pool of connections to one host. Connections are picked by token
/// affinity when the request carries a token, falling back to round-robin;
/// broken connections are skipped either way.
pub struct HostConnectionPool<T: Transport> {
    host: Arc<Host>,
    connections: RwLock<Vec<Arc<T>>>,
    current_index: AtomicUsize,
}

impl<T: Transport + 'static> HostConnectionPool<T> {
    /// Fills a new pool for given host. Connections which cannot be
    /// established right now are skipped; an empty pool is still usable and
    /// simply yields no connections until refilled.
    pub async fn new<CM: ConnectionManager<T>>(
        connection_manager: &CM,
        host: Arc<Host>,
        config: ConnectionPoolConfig,
        error_handler: Option<mpsc::Sender<Error>>,
    ) -> Self {
        let broadcast_rpc_address = host.broadcast_rpc_address();

        let connections: Vec<_> = join_all((0..config.size).map(|_| {
            new_connection(
                connection_manager,
                broadcast_rpc_address,
                config.connect_timeout,
                error_handler.clone(),
            )
        }))
        .await
        .into_iter()
        .filter_map(|connection| match connection {
            Ok(connection) => Some(Arc::new(connection)),
            Err(error) => {
                warn!(%error, %broadcast_rpc_address, "Failed to establish pool connection.");
                None
            }
        })
        .collect();

        HostConnectionPool {
            host,
            connections: RwLock::new(connections),
            current_index: AtomicUsize::new(0),
        }
    }

    /// Picks a live connection bound to given token, or `None` if no usable
    /// connection exists right now.
    pub async fn pick(&self, token: Option<Murmur3Token>) -> Option<Arc<T>> {
        let connections = self.connections.read().await;
        if connections.is_empty() {
            return None;
        }

        let len = connections.len();
        let mut index = match token {
            Some(token) => token.value.rem_euclid(len as i64) as usize,
            None => self.current_index.fetch_add(1, Ordering::Relaxed) % len,
        };

        let first_index = index;
        loop {
            let connection = &connections[index];
            if !connection.is_broken() {
                return Some(connection.clone());
            }

            index = (index + 1) % len;

            if index == first_index {
                // we've checked the whole pool and everything's down
                warn!(broadcast_rpc_address = %self.host.broadcast_rpc_address(), "All connections down to node.");
                return None;
            }
        }
    }
}

/// Registry of per-host connection pools, plus the keyspace the session
/// currently operates in. The execution core consumes only
/// [`get_pool`](ClusterConnectionPool::get_pool) and
/// [`keyspace`](ClusterConnectionPool::keyspace); registration is driven by
/// topology listeners at session level.
pub struct ClusterConnectionPool<T: Transport + 'static, CM: ConnectionManager<T> + 'static> {
    keyspace: ArcSwapOption<String>,
    pools: RwLock<FxHashMap<Uuid, Arc<HostConnectionPool<T>>>>,
    connection_manager: Arc<CM>,
    config: ConnectionPoolConfig,
}

impl<T: Transport + 'static, CM: ConnectionManager<T> + 'static> ClusterConnectionPool<T, CM> {
    pub fn new(connection_manager: CM, config: ConnectionPoolConfig) -> Self {
        ClusterConnectionPool {
            keyspace: ArcSwapOption::empty(),
            pools: RwLock::new(Default::default()),
            connection_manager: Arc::new(connection_manager),
            config,
        }
    }

    /// Keyspace the session currently operates in.
    #[inline]
    pub fn keyspace(&self) -> Option<Arc<String>> {
        self.keyspace.load_full()
    }

    /// Updates the current keyspace.
    pub fn set_keyspace(&self, keyspace: Option<String>) {
        self.keyspace.store(keyspace.map(Arc::new));
    }

    /// Creates and registers a pool for given host, replacing any previous
    /// one.
    pub async fn add_host(&self, host: Arc<Host>) {
        debug!(hostname = %host.hostname(), "Adding host connection pool.");

        let pool = Arc::new(
            HostConnectionPool::new(
                self.connection_manager.as_ref(),
                host.clone(),
                self.config,
                None,
            )
            .await,
        );

        self.pools.write().await.insert(host.host_id(), pool);
    }

    /// Drops the pool registered for given host, if any.
    pub async fn remove_host(&self, host: &Host) -> bool {
        self.pools.write().await.remove(&host.host_id()).is_some()
    }

    /// Pool shard registered for given host.
    pub async fn get_pool(&self, host: &Host) -> Option<Arc<HostConnectionPool<T>>> {
        self.pools.read().await.get(&host.host_id()).cloned()
    }
}
