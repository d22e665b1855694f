use atomic::{Atomic, Ordering};
use derive_more::Display;
use std::fmt::{Debug, Formatter};
use std::net::SocketAddr;
use uuid::Uuid;

/// Liveness of a node as observed by the driver.
#[derive(Copy, Clone, Debug, Display, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum HostState {
    Up,
    Down,
}

/// Identity and liveness of a cluster node. The execution core reads
/// [`is_up`](Host::is_up) when gating attempts and [`hostname`](Host::hostname)
/// when reporting host selection failures; state transitions are driven by
/// routing policies through [`SelectedHost::mark`](crate::load_balancing::SelectedHost::mark)
/// and by topology listeners.
pub struct Host {
    hostname: String,
    broadcast_rpc_address: SocketAddr,
    host_id: Uuid,
    state: Atomic<HostState>,
}

impl Debug for Host {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("hostname", &self.hostname)
            .field("broadcast_rpc_address", &self.broadcast_rpc_address)
            .field("host_id", &self.host_id)
            .field("state", &self.state())
            .finish()
    }
}

impl Host {
    /// Creates a new host, assumed up until marked otherwise.
    pub fn new(hostname: String, broadcast_rpc_address: SocketAddr, host_id: Uuid) -> Self {
        Host {
            hostname,
            broadcast_rpc_address,
            host_id,
            state: Atomic::new(HostState::Up),
        }
    }

    #[inline]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    #[inline]
    pub fn broadcast_rpc_address(&self) -> SocketAddr {
        self.broadcast_rpc_address
    }

    #[inline]
    pub fn host_id(&self) -> Uuid {
        self.host_id
    }

    #[inline]
    pub fn state(&self) -> HostState {
        self.state.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_up(&self) -> bool {
        self.state() == HostState::Up
    }

    #[inline]
    pub fn mark_up(&self) {
        self.state.store(HostState::Up, Ordering::Relaxed);
    }

    #[inline]
    pub fn mark_down(&self) {
        self.state.store(HostState::Down, Ordering::Relaxed);
    }
}
