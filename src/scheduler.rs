//! Poll scheduler
//!
//! [`Poller`] owns the resolved registry, one connection per service and the
//! set of fetch tasks. The timer lives outside: whoever drives the poller
//! calls [`Poller::run_cycle`] on its own interval.
//!
//! A cycle spawns one task per (service, query) pair and returns without
//! waiting. Cycles are not serialized, so when the interval is shorter than
//! the network round trip, fetches from several cycles overlap; the backlog
//! is logged and counted but not throttled.
//!
//! Each task captures the lifecycle epoch at issue time. [`Poller::shutdown`]
//! bumps the epoch first, so completions arriving after teardown began are
//! dropped without touching the sink.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::client::{Connection, Connector, FetchResult};
use crate::error::{InitError, PollError};
use crate::extractor::extract;
use crate::model::{QueryId, Registry};
use crate::sink::MetricSink;
use crate::stats::{PollStats, StatsSnapshot};

/// Default time shutdown waits for in-flight fetches
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Generation counter shared with fetch tasks
#[derive(Debug, Default)]
struct Lifecycle {
    epoch: AtomicU64,
}

impl Lifecycle {
    fn current(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.current() == epoch
    }

    fn close(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }
}

/// Decrements the in-flight gauge however the task ends, aborts included
struct InFlight(Arc<PollStats>);

impl InFlight {
    fn start(stats: &Arc<PollStats>) -> Self {
        stats.in_flight.inc();
        Self(Arc::clone(stats))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.dec();
    }
}

/// Context a fetch task needs once its response arrives
struct Completion {
    registry: Arc<Registry>,
    service: usize,
    query: QueryId,
    epoch: u64,
    lifecycle: Arc<Lifecycle>,
    sink: Arc<dyn MetricSink>,
    stats: Arc<PollStats>,
    _in_flight: InFlight,
}

impl Completion {
    fn finish(self, result: FetchResult, completed_at: SystemTime) {
        if !self.lifecycle.is_current(self.epoch) {
            self.stats.late_completions.inc();
            debug!(
                service_index = self.service,
                query_index = self.query.index(),
                "Fetch completed after shutdown began; discarding"
            );
            return;
        }

        let service = &self.registry.services()[self.service];
        let query = self.registry.query(self.query);

        match result {
            Ok(payload) => {
                let samples = extract(service, query, &payload, completed_at);
                self.stats.samples_emitted.inc_by(samples.len() as u64);
                for sample in samples {
                    self.sink.emit(sample);
                }
            }
            Err(e) => {
                self.stats.fetch_failures.inc();
                warn!(
                    service = %service.name(),
                    query = %query.name(),
                    status = ?e.http_status(),
                    error = %e,
                    "Fetch failed; skipping query this cycle"
                );
            }
        }
    }
}

/// Outcome of [`Poller::shutdown`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Fetch tasks not yet reaped when shutdown began
    pub pending: usize,
    /// Tasks aborted after the grace period
    pub aborted: usize,
    /// Final statistics
    pub stats: StatsSnapshot,
}

/// Initialized registry plus live connections
pub struct Poller {
    registry: Arc<Registry>,
    connections: Vec<Option<Arc<dyn Connection>>>,
    sink: Arc<dyn MetricSink>,
    lifecycle: Arc<Lifecycle>,
    stats: Arc<PollStats>,
    tasks: JoinSet<()>,
}

impl Poller {
    /// Resolve query names and connect every service
    ///
    /// Consumes the registry; on error it is dropped, so a half-initialized
    /// registry can never be polled. A service whose connection cannot be
    /// created is logged and left out of every cycle.
    ///
    /// # Errors
    /// [`InitError::Resolve`] on a dangling query name,
    /// [`InitError::NoConnections`] when services exist but none connected.
    pub fn initialize(
        mut registry: Registry,
        connector: &dyn Connector,
        sink: Arc<dyn MetricSink>,
    ) -> Result<Self, InitError> {
        registry.resolve()?;

        let connections: Vec<Option<Arc<dyn Connection>>> = registry
            .services()
            .iter()
            .map(|service| match connector.connect(service) {
                Ok(conn) => {
                    info!(
                        service = %service.name(),
                        host = %service.host(),
                        queries = service.resolved_queries().len(),
                        "Service connected"
                    );
                    Some(conn)
                }
                Err(e) => {
                    error!(
                        service = %service.name(),
                        host = %service.host(),
                        error = %e,
                        "Failed to connect service; it will not be polled"
                    );
                    None
                }
            })
            .collect();

        let total = connections.len();
        if total > 0 && connections.iter().all(Option::is_none) {
            return Err(InitError::NoConnections(total));
        }

        Ok(Self {
            registry: Arc::new(registry),
            connections,
            sink,
            lifecycle: Arc::new(Lifecycle::default()),
            stats: Arc::new(PollStats::new()),
            tasks: JoinSet::new(),
        })
    }

    /// The resolved registry
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Names of services that have a live connection, in configuration order
    pub fn connected_services(&self) -> Vec<&str> {
        self.registry
            .services()
            .iter()
            .zip(&self.connections)
            .filter(|(_, conn)| conn.is_some())
            .map(|(service, _)| service.name())
            .collect()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Issue one fetch per (service, query) pair and return immediately
    ///
    /// Returns the number of fetches issued. Per-query failures surface later
    /// in the fetch tasks and never fail the cycle.
    ///
    /// # Errors
    /// [`PollError::NoRuntime`] when called outside a Tokio runtime.
    pub fn run_cycle(&mut self) -> Result<usize, PollError> {
        let runtime = Handle::try_current().map_err(|_| PollError::NoRuntime)?;

        while let Some(joined) = self.tasks.try_join_next() {
            if let Err(e) = joined {
                if e.is_panic() {
                    error!(error = %e, "Fetch task panicked");
                }
            }
        }

        let backlog = self.stats.in_flight.get();
        if backlog > 0 {
            warn!(
                in_flight = backlog,
                "Fetches from earlier cycles are still in flight"
            );
        }

        self.stats.cycles.inc();
        let epoch = self.lifecycle.current();
        let mut issued = 0;

        for (index, (service, conn)) in self
            .registry
            .services()
            .iter()
            .zip(&self.connections)
            .enumerate()
        {
            let Some(conn) = conn else {
                continue;
            };

            for &query_id in service.resolved_queries() {
                let fetch = conn.fetch(self.registry.query(query_id).endpoint());
                let completion = Completion {
                    registry: Arc::clone(&self.registry),
                    service: index,
                    query: query_id,
                    epoch,
                    lifecycle: Arc::clone(&self.lifecycle),
                    sink: Arc::clone(&self.sink),
                    stats: Arc::clone(&self.stats),
                    _in_flight: InFlight::start(&self.stats),
                };

                self.tasks.spawn_on(
                    async move {
                        let result = fetch.await;
                        completion.finish(result, SystemTime::now());
                    },
                    &runtime,
                );
                self.stats.fetches_issued.inc();
                issued += 1;
            }
        }

        debug!(issued, "Polling cycle dispatched");
        Ok(issued)
    }

    /// Wait for every issued fetch to complete, up to `limit`
    ///
    /// Returns `false` if some fetches were still outstanding at the deadline.
    /// Unlike [`Poller::shutdown`] the completions are processed normally.
    pub async fn wait_idle(&mut self, limit: Duration) -> bool {
        let tasks = &mut self.tasks;
        tokio::time::timeout(limit, async {
            while tasks.join_next().await.is_some() {}
        })
        .await
        .is_ok()
    }

    /// Stop accepting completions, close connections and release the registry
    ///
    /// Waits up to `grace` for outstanding fetch tasks, then aborts the rest.
    /// Completions that land meanwhile are discarded.
    pub async fn shutdown(mut self, grace: Duration) -> ShutdownReport {
        self.lifecycle.close();
        for conn in self.connections.iter().flatten() {
            conn.close();
        }

        let pending = self.tasks.len();
        let drained = self.wait_idle(grace).await;

        let aborted = if drained {
            0
        } else {
            let remaining = self.tasks.len();
            self.tasks.shutdown().await;
            remaining
        };

        self.connections.clear();

        let report = ShutdownReport {
            pending,
            aborted,
            stats: self.stats.snapshot(),
        };
        info!(
            pending = report.pending,
            aborted = report.aborted,
            late_completions = report.stats.late_completions,
            "Poller shut down"
        );
        report
    }
}
