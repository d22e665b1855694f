use arc_swap::ArcSwapOption;
use std::sync::Arc;

use crate::cluster::Host;
use crate::load_balancing::{
    DefaultSelectedHost, HostSelectionPolicy, QueryPlan, Request, SelectedHost,
};

/// Host selection always returning the single configured host. Useful for
/// single-node clusters and tests.
#[derive(Default)]
pub struct SingleNodeSelectionPolicy {
    host: ArcSwapOption<Host>,
}

impl SingleNodeSelectionPolicy {
    pub fn new(host: Arc<Host>) -> Self {
        SingleNodeSelectionPolicy {
            host: ArcSwapOption::new(Some(host)),
        }
    }

    /// Replaces the configured host.
    pub fn init(&self, host: Arc<Host>) {
        self.host.store(Some(host));
    }
}

impl HostSelectionPolicy for SingleNodeSelectionPolicy {
    fn pick(&self, request: Request) -> QueryPlan {
        let token = request.token;
        Box::new(
            self.host
                .load_full()
                .into_iter()
                .map(move |host| {
                    Box::new(DefaultSelectedHost::new(host, token)) as Box<dyn SelectedHost>
                }),
        )
    }
}
