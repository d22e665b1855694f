use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::cluster::Host;
use crate::load_balancing::{
    DefaultSelectedHost, HostSelectionPolicy, QueryPlan, Request, SelectedHost,
};

/// Round-robin host selection. Every plan starts one host further into the
/// known host set, spreading load evenly regardless of tokens.
#[derive(Default)]
pub struct RoundRobinSelectionPolicy {
    hosts: ArcSwap<Vec<Arc<Host>>>,
    prev_idx: AtomicUsize,
}

impl RoundRobinSelectionPolicy {
    pub fn new() -> Self {
        Default::default()
    }

    /// Replaces the known host set, e.g. on topology refresh.
    pub fn init(&self, hosts: Vec<Arc<Host>>) {
        self.hosts.store(Arc::new(hosts));
    }
}

impl HostSelectionPolicy for RoundRobinSelectionPolicy {
    fn pick(&self, request: Request) -> QueryPlan {
        let hosts = self.hosts.load_full();
        if hosts.is_empty() {
            return Box::new(std::iter::empty());
        }

        let len = hosts.len();
        let start = self.prev_idx.fetch_add(1, Ordering::SeqCst) % len;
        let token = request.token;

        Box::new((0..len).map(move |offset| {
            let host = hosts[(start + offset) % len].clone();
            Box::new(DefaultSelectedHost::new(host, token)) as Box<dyn SelectedHost>
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use uuid::Uuid;

    fn host(hostname: &str) -> Arc<Host> {
        let address: SocketAddr = "127.0.0.1:9042".parse().unwrap();
        Arc::new(Host::new(hostname.to_string(), address, Uuid::new_v4()))
    }

    fn request() -> Request<'static> {
        Request::new(None, None, None, false)
    }

    fn hostnames(plan: QueryPlan) -> Vec<String> {
        plan.map(|selected| selected.host().unwrap().hostname().to_string())
            .collect()
    }

    #[test]
    fn empty_host_set_yields_empty_plan() {
        let policy = RoundRobinSelectionPolicy::new();
        assert!(policy.pick(request()).next().is_none());
    }

    #[test]
    fn plans_rotate_through_hosts() {
        let policy = RoundRobinSelectionPolicy::new();
        policy.init(vec![host("a"), host("b"), host("c")]);

        assert_eq!(hostnames(policy.pick(request())), ["a", "b", "c"]);
        assert_eq!(hostnames(policy.pick(request())), ["b", "c", "a"]);
        assert_eq!(hostnames(policy.pick(request())), ["c", "a", "b"]);
        assert_eq!(hostnames(policy.pick(request())), ["a", "b", "c"]);
    }
}
