//! The opaque connection surface consumed by the execution core.
//!
//! A transport is a live, pooled channel to one node. The core never talks
//! to the wire itself; queries are invoked against a transport and perform
//! their own framing. The core only needs to know whether a connection is
//! still usable and which node it belongs to.

use std::net::SocketAddr;

#[cfg(test)]
use mockall::*;

/// A borrowed channel to one host.
pub trait Transport: Send + Sync {
    /// Checks if the connection is broken (e.g. after read or write errors).
    fn is_broken(&self) -> bool;

    /// Returns associated node address.
    fn address(&self) -> SocketAddr;
}

#[cfg(test)]
mock! {
    pub Transport {
    }

    impl Transport for Transport {
        fn is_broken(&self) -> bool;

        fn address(&self) -> SocketAddr;
    }
}
