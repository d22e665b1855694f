use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::select;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::*;

use crate::cluster::connection_manager::ConnectionManager;
use crate::cluster::connection_pool::ClusterConnectionPool;
use crate::error::{Error, Result, SelectHostError};
use crate::load_balancing::{HostSelectionPolicy, QueryPlan, Request, SelectedHost};
use crate::query::{AttemptInfo, ExecutableQuery, ResultIter, RetryableQuery};
use crate::retry::RetryVerdict;
use crate::speculative_execution::SpeculativeExecutionPolicy;
use crate::token::{Murmur3Partitioner, Partitioner};
use crate::transport::Transport;

/// Serializes access to a query plan shared by racing attempts, so no two
/// tasks can advance it at the same instant.
struct SharedQueryPlan {
    current_host: Mutex<QueryPlan>,
}

impl SharedQueryPlan {
    fn new(plan: QueryPlan) -> Self {
        SharedQueryPlan {
            current_host: Mutex::new(plan),
        }
    }
}

impl Iterator for &SharedQueryPlan {
    type Item = Box<dyn SelectedHost>;

    fn next(&mut self) -> Option<Self::Item> {
        self.current_host.lock().unwrap().next()
    }
}

/// Runs query executions against hosts chosen by a routing policy, walking
/// candidate hosts with per-attempt retry classification and racing
/// additional executions on a timer when the query's speculative execution
/// policy asks for them.
pub struct QueryExecutor<T: Transport + 'static, CM: ConnectionManager<T> + 'static> {
    pool: Arc<ClusterConnectionPool<T, CM>>,
    policy: Arc<dyn HostSelectionPolicy + Send + Sync>,
}

impl<T: Transport + 'static, CM: ConnectionManager<T> + 'static> QueryExecutor<T, CM> {
    pub fn new(
        pool: Arc<ClusterConnectionPool<T, CM>>,
        policy: Arc<dyn HostSelectionPolicy + Send + Sync>,
    ) -> Self {
        QueryExecutor { pool, policy }
    }

    /// Executes given query, returning the first result iterator produced by
    /// a winning attempt. Failures ride inside the iterator's error slot; the
    /// `Err` side of the return value is reserved and not produced by the
    /// current execution paths.
    pub async fn execute_query(&self, query: Arc<dyn ExecutableQuery<T>>) -> Result<ResultIter> {
        let keyspace = query.keyspace().or_else(|| {
            self.pool
                .keyspace()
                .map(|keyspace| keyspace.as_str().to_string())
        });

        let routing_key = query.routing_key().unwrap_or_else(|error| {
            warn!(%error, "Failed to compute routing key.");
            None
        });

        let token = routing_key.as_deref().map(|key| match query.partitioner() {
            Some(partitioner) => partitioner.hash(key),
            None => Murmur3Partitioner.hash(key),
        });

        let plan = self.policy.pick(Request::new(
            keyspace.as_deref(),
            token,
            routing_key.as_deref(),
            query.is_lwt(),
        ));

        // non-idempotent queries never speculate, regardless of policy
        match query.speculative_execution_policy() {
            Some(speculative_policy)
                if query.is_idempotent() && speculative_policy.attempts() > 0 =>
            {
                Ok(self
                    .execute_speculatively(query, plan, speculative_policy)
                    .await)
            }
            _ => {
                Ok(
                    Self::execute_plan(&self.pool, query.context().clone(), query.as_ref(), plan)
                        .await,
                )
            }
        }
    }

    async fn execute_speculatively(
        &self,
        query: Arc<dyn ExecutableQuery<T>>,
        plan: QueryPlan,
        speculative_policy: Arc<dyn SpeculativeExecutionPolicy + Send + Sync>,
    ) -> ResultIter {
        // racing attempts share the plan below, so next() calls must not
        // overlap
        let plan = Arc::new(SharedQueryPlan::new(plan));

        let context = query.context().child_token();
        let _cancel_guard = context.clone().drop_guard();

        let (results_sender, mut results) = mpsc::channel(1);

        query.borrow_for_execution();
        tokio::spawn(Self::run(
            self.pool.clone(),
            context.clone(),
            query.clone(),
            plan.clone(),
            results_sender.clone(),
        ));

        if let Some(iter) = self
            .speculate(
                &context,
                &query,
                speculative_policy.as_ref(),
                &plan,
                &results_sender,
                &mut results,
            )
            .await
        {
            return iter;
        }

        select! {
            Some(iter) = results.recv() => iter,
            _ = context.cancelled() => ResultIter::from_error(Error::Cancelled),
        }
    }

    /// Launches speculative executions on a timer, in addition to the already
    /// running primary one. Returns the winning iterator if one arrives while
    /// the timer is still live, or `None` once the attempt budget is spent.
    #[allow(clippy::too_many_arguments)]
    async fn speculate(
        &self,
        context: &CancellationToken,
        query: &Arc<dyn ExecutableQuery<T>>,
        speculative_policy: &(dyn SpeculativeExecutionPolicy + Send + Sync),
        plan: &Arc<SharedQueryPlan>,
        results_sender: &mpsc::Sender<ResultIter>,
        results: &mut mpsc::Receiver<ResultIter>,
    ) -> Option<ResultIter> {
        let delay = speculative_policy.delay();
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + delay, delay);

        for _ in 0..speculative_policy.attempts() {
            select! {
                _ = ticker.tick() => {
                    debug!("Launching speculative execution.");

                    query.borrow_for_execution();
                    tokio::spawn(Self::run(
                        self.pool.clone(),
                        context.clone(),
                        query.clone(),
                        plan.clone(),
                        results_sender.clone(),
                    ));
                }
                _ = context.cancelled() => return Some(ResultIter::from_error(Error::Cancelled)),
                iter = results.recv() => return iter,
            }
        }

        None
    }

    /// Runs one execution on behalf of the driver and delivers its iterator
    /// to the results channel, unless the execution scope is cancelled first.
    /// Either way, releases the query borrow taken before spawning.
    async fn run(
        pool: Arc<ClusterConnectionPool<T, CM>>,
        context: CancellationToken,
        query: Arc<dyn ExecutableQuery<T>>,
        plan: Arc<SharedQueryPlan>,
        results: mpsc::Sender<ResultIter>,
    ) {
        let iter = Self::execute_plan(&pool, context.clone(), query.as_ref(), &*plan).await;

        select! {
            _ = results.send(iter) => {}
            _ = context.cancelled() => {}
        }

        query.release_after_execution();
    }

    /// Single sequential execution: walks the plan host by host, running at
    /// most one attempt at a time, until an attempt completes or the plan and
    /// the retry budget are exhausted. Always returns an iterator.
    async fn execute_plan<I>(
        pool: &ClusterConnectionPool<T, CM>,
        context: CancellationToken,
        query: &dyn ExecutableQuery<T>,
        mut plan: I,
    ) -> ResultIter
    where
        I: Iterator<Item = Box<dyn SelectedHost>>,
    {
        let retry_policy = query.retry_policy();
        let retryable: &dyn RetryableQuery = query;

        let mut errors = Vec::new();
        let mut selected = plan.next();

        while let Some(selected_host) = selected.take() {
            let host = match selected_host.host() {
                Some(host) if host.is_up() => host,
                host => {
                    errors.push(SelectHostError::new(host, Error::HostMissingOrDown));
                    selected = plan.next();
                    continue;
                }
            };

            let shard = match pool.get_pool(&host).await {
                Some(shard) => shard,
                None => {
                    errors.push(SelectHostError::new(Some(host), Error::NoConnPool));
                    selected = plan.next();
                    continue;
                }
            };

            let connection = match shard.pick(selected_host.token()).await {
                Some(connection) => connection,
                None => {
                    errors.push(SelectHostError::new(Some(host), Error::NoConnInHostPool));
                    selected = plan.next();
                    continue;
                }
            };

            let start = Instant::now();
            let mut iter = query.execute(context.clone(), connection).await;
            let end = Instant::now();

            iter.set_host(host.clone());
            query.record_attempt(AttemptInfo::new(pool.keyspace(), start, end, host.clone()), &iter);

            let error = match iter.error() {
                None => {
                    selected_host.mark(None);
                    return iter;
                }
                Some(error) if error.is_logical_outcome() => {
                    // outcomes of the request itself; must not count toward
                    // removing the node from rotation
                    selected_host.mark(None);
                    return iter;
                }
                Some(error) => {
                    selected_host.mark(Some(error));
                    error.clone()
                }
            };

            // exit if no retry policy is defined or retry attempts were
            // reached
            let Some(retry_policy) = &retry_policy else {
                return iter;
            };

            if !retry_policy.attempt(retryable) {
                return iter;
            }

            errors.push(SelectHostError::new(Some(host), error.clone()));

            match retry_policy.verdict(&error) {
                RetryVerdict::Retry => selected = Some(selected_host),
                RetryVerdict::RetryNextHost => selected = plan.next(),
                RetryVerdict::Rethrow | RetryVerdict::Ignore => return iter,
                _ => return ResultIter::from_error(Error::UnknownRetryType),
            }
        }

        if errors.is_empty() {
            ResultIter::from_error(Error::NoConnections)
        } else {
            ResultIter::from_error(Error::HostSelection { errors })
        }
    }
}
