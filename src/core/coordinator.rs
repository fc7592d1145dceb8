//! # Coordinator: races a request across workers and keeps the first success.
//!
//! The [`Coordinator`] owns the event bus, an optional [`SubscriberSet`], and
//! the race configuration. Each call to [`Coordinator::race`] builds a fresh
//! link table, result channel and race state, so concurrent races never
//! share bookkeeping.
//!
//! ## Algorithm
//! ```text
//! race(request, workers)
//!   ├─ workers empty                      → Err(NoWorkers), nothing spawned
//!   ├─ register coordinator, trap exits   (before any worker exists)
//!   ├─ spawn_linked(worker) for each      → pending = all handles
//!   ├─ loop receive_any():
//!   │     ├─ Success(r)         → decide: winner = r, stop
//!   │     ├─ Failure / Crashed  → pending -= 1
//!   │     └─ pending empty      → Err(AllWorkersFailed { last })
//!   ├─ [optional] deadline elapsed         → Err(TimedOut)
//!   ├─ cancel every still-pending handle  (non-blocking)
//!   ├─ drain late outcomes in background  → LateOutcomeDiscarded events
//!   └─ coordinator exits normally
//! ```
//!
//! ## Abnormal termination
//! If the race future is dropped before it decides, or the coordinator panics
//! while deciding, its process exits with an abnormal reason and the link
//! table kills every worker still linked to it.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use racevisor::{Coordinator, RaceConfig, WorkerError, WorkerFn, WorkerRef};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let coordinator = Coordinator::builder(RaceConfig::default()).build();
//!
//!     let replica = |name: &'static str, delay_ms: u64| -> WorkerRef<String, String> {
//!         WorkerFn::arc(name, move |req: Arc<String>, ctx: CancellationToken| async move {
//!             tokio::select! {
//!                 _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => {
//!                     Ok(format!("{name} answered {req}"))
//!                 }
//!                 _ = ctx.cancelled() => Err(WorkerError::Canceled),
//!             }
//!         })
//!     };
//!
//!     let answer = coordinator
//!         .race("ping".to_string(), vec![replica("slow", 200), replica("fast", 10)])
//!         .await?;
//!     assert_eq!(answer, "fast answered ping");
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::core::builder::CoordinatorBuilder;
use crate::core::channel::{ResultReceiver, result_channel};
use crate::core::config::RaceConfig;
use crate::core::link::{ExitReason, LinkTable, ProcessId};
use crate::core::runner::spawn_linked;
use crate::core::state::{RaceState, Step};
use crate::error::{RaceError, WorkerFault};
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::SubscriberSet;
use crate::workers::{Outcome, WorkerRef};

/// Global counter for race ids.
static RACE_SEQ: AtomicU64 = AtomicU64::new(1);

/// Races requests across workers; see the [module docs](self).
pub struct Coordinator {
    cfg: RaceConfig,
    bus: Bus,
    subs: Option<Arc<SubscriberSet>>,
    shutdown: CancellationToken,
}

impl Coordinator {
    /// Returns a builder for a coordinator with subscribers.
    pub fn builder(cfg: RaceConfig) -> CoordinatorBuilder {
        CoordinatorBuilder::new(cfg)
    }

    /// Creates a coordinator without subscribers.
    ///
    /// Events are still published on [`Coordinator::bus`].
    pub fn new(cfg: RaceConfig) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        Self {
            cfg,
            bus,
            subs: None,
            shutdown: CancellationToken::new(),
        }
    }

    pub(crate) fn with_subscribers(cfg: RaceConfig, bus: Bus, subs: Arc<SubscriberSet>) -> Self {
        let me = Self {
            cfg,
            bus,
            subs: Some(subs),
            shutdown: CancellationToken::new(),
        };
        me.subscriber_listener();
        me
    }

    /// Event bus every race publishes to.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Configuration in use.
    pub fn config(&self) -> &RaceConfig {
        &self.cfg
    }

    /// Dispatches `request` to every worker and returns the first success.
    ///
    /// Applies [`RaceConfig::timeout`] when it is non-zero.
    ///
    /// # Errors
    /// - [`RaceError::NoWorkers`] if `workers` is empty (nothing is spawned)
    /// - [`RaceError::AllWorkersFailed`] if every worker failed or crashed
    /// - [`RaceError::TimedOut`] if the configured deadline elapsed first
    pub async fn race<Req, Resp>(
        &self,
        request: Req,
        workers: Vec<WorkerRef<Req, Resp>>,
    ) -> Result<Resp, RaceError>
    where
        Req: Send + Sync + 'static,
        Resp: Send + 'static,
    {
        self.run(request, workers, self.cfg.race_timeout()).await
    }

    /// Like [`Coordinator::race`] with an explicit deadline for this call.
    ///
    /// A zero `timeout` disables the deadline.
    pub async fn race_with_timeout<Req, Resp>(
        &self,
        request: Req,
        workers: Vec<WorkerRef<Req, Resp>>,
        timeout: Duration,
    ) -> Result<Resp, RaceError>
    where
        Req: Send + Sync + 'static,
        Resp: Send + 'static,
    {
        let timeout = Some(timeout).filter(|d| *d > Duration::ZERO);
        self.run(request, workers, timeout).await
    }

    async fn run<Req, Resp>(
        &self,
        request: Req,
        workers: Vec<WorkerRef<Req, Resp>>,
        timeout: Option<Duration>,
    ) -> Result<Resp, RaceError>
    where
        Req: Send + Sync + 'static,
        Resp: Send + 'static,
    {
        if workers.is_empty() {
            return Err(RaceError::NoWorkers);
        }

        let race = RACE_SEQ.fetch_add(1, Ordering::Relaxed);
        let request = Arc::new(request);
        let links = Arc::new(LinkTable::new());
        let (results, mut rx) = result_channel::<Resp>();

        let root = CancellationToken::new();
        let me = links.register(root.clone());
        links.trap_exits(me, results.crash_sink());
        let exit = CoordinatorExit::new(Arc::clone(&links), me);

        let mut started = Event::new(EventKind::RaceStarted)
            .with_race(race)
            .with_workers(workers.len());
        if let Some(d) = timeout {
            started = started.with_timeout(d);
        }
        self.bus.publish(started);

        let mut state = RaceState::new(workers.len());
        for worker in &workers {
            let handle = spawn_linked(worker, &request, me, &root, &links, &results);
            tracing::trace!(race, worker = %handle.name(), pid = %handle.pid(), "worker spawned");
            state.track(handle);
        }
        drop(results);
        tracing::debug!(race, workers = workers.len(), "race dispatched");

        let verdict = match timeout {
            Some(dur) => match time::timeout(dur, self.decide(race, &mut state, &mut rx)).await {
                Ok(verdict) => verdict,
                Err(_elapsed) => {
                    state.close();
                    self.bus.publish(
                        Event::new(EventKind::RaceTimedOut)
                            .with_race(race)
                            .with_timeout(dur),
                    );
                    Err(RaceError::TimedOut { timeout: dur })
                }
            },
            None => self.decide(race, &mut state, &mut rx).await,
        };

        debug_assert!(state.is_decided());
        self.cancel_pending(race, &mut state);
        self.drain_late(race, rx);
        exit.finish();
        verdict
    }

    /// Receive loop: folds deliveries into `state` until a decision.
    async fn decide<Resp>(
        &self,
        race: u64,
        state: &mut RaceState,
        rx: &mut ResultReceiver<Resp>,
    ) -> Result<Resp, RaceError> {
        let burst = self.publish_burst();
        let mut published = 0usize;
        loop {
            // let the subscriber listener drain before the ring wraps
            if published >= burst {
                published = 0;
                tokio::task::yield_now().await;
            }
            if state.is_exhausted() {
                let err = state.all_failed();
                let mut ev = Event::new(EventKind::AllWorkersFailed)
                    .with_race(race)
                    .with_workers(state.finished());
                if let Some(fault) = err.last_fault() {
                    ev = ev.with_reason(fault.to_string());
                }
                self.bus.publish(ev);
                return Err(err);
            }

            let Some(delivery) = rx.receive_any().await else {
                tracing::warn!(race, pending = state.pending(), "result channel closed early");
                for (fault, handle) in state.orphan_pending() {
                    self.publish_fault(race, handle.pid(), &fault);
                    published += 1;
                }
                continue;
            };

            match state.apply(delivery) {
                Step::Won { response, handle } => {
                    for kind in [EventKind::WorkerSucceeded, EventKind::WinnerChosen] {
                        self.bus.publish(
                            Event::new(kind)
                                .with_race(race)
                                .with_worker(Arc::clone(handle.name()))
                                .with_pid(handle.pid()),
                        );
                    }
                    tracing::debug!(race, winner = ?state.winner(), "winner chosen");
                    return Ok(response);
                }
                Step::Counted { fault, handle } => {
                    self.publish_fault(race, handle.pid(), &fault);
                    published += 1;
                }
                Step::Discarded => {}
            }
        }
    }

    fn publish_fault(&self, race: u64, pid: ProcessId, fault: &WorkerFault) {
        let (kind, reason) = match fault {
            WorkerFault::Failure { error, .. } => (EventKind::WorkerFailed, error.to_string()),
            WorkerFault::Crash { reason, .. } => (EventKind::WorkerCrashed, reason.to_string()),
        };
        self.bus.publish(
            Event::new(kind)
                .with_race(race)
                .with_worker(fault.worker())
                .with_pid(pid)
                .with_reason(reason),
        );
    }

    /// Number of worker events published between two yields of a busy loop.
    fn publish_burst(&self) -> usize {
        (self.cfg.bus_capacity_clamped() / 2).max(1)
    }

    /// Cancels every handle still pending after the decision.
    ///
    /// Publishes one [`EventKind::StragglersCancelled`] for the whole batch.
    fn cancel_pending(&self, race: u64, state: &mut RaceState) {
        let pending = state.take_pending();
        if pending.is_empty() {
            return;
        }
        for handle in &pending {
            handle.cancel(self.cfg.abort_stragglers);
            tracing::trace!(race, worker = %handle.name(), pid = %handle.pid(), "worker cancelled");
        }
        self.bus.publish(
            Event::new(EventKind::StragglersCancelled)
                .with_race(race)
                .with_workers(pending.len()),
        );
    }

    /// Consumes outcomes that arrive after the decision.
    fn drain_late<Resp: Send + 'static>(&self, race: u64, mut rx: ResultReceiver<Resp>) {
        let bus = self.bus.clone();
        let burst = self.publish_burst();
        tokio::spawn(async move {
            let mut published = 0usize;
            while let Some(late) = rx.receive_any().await {
                let label = match &late.outcome {
                    Outcome::Success(_) => late.outcome.as_label().to_string(),
                    Outcome::Failure(e) => format!("{}: {e}", late.outcome.as_label()),
                    Outcome::Crashed(r) => format!("{}: {r}", late.outcome.as_label()),
                };
                bus.publish(
                    Event::new(EventKind::LateOutcomeDiscarded)
                        .with_race(race)
                        .with_pid(late.from)
                        .with_reason(label),
                );
                published += 1;
                if published >= burst {
                    published = 0;
                    tokio::task::yield_now().await;
                }
            }
        });
    }

    /// Forwards bus events to the subscriber set until the coordinator is dropped.
    fn subscriber_listener(&self) {
        let Some(set) = self.subs.clone() else {
            return;
        };
        let mut rx = self.bus.subscribe();
        let stop = self.shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(ev) => set.emit(&ev),
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "subscriber listener lagged");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        });
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new(RaceConfig::default())
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Exit hook for the coordinator's own process.
///
/// `finish` exits normally; dropping it unfinished (future cancelled or
/// panicking) exits abnormally and kills every linked worker.
struct CoordinatorExit {
    links: Arc<LinkTable>,
    pid: ProcessId,
    done: bool,
}

impl CoordinatorExit {
    fn new(links: Arc<LinkTable>, pid: ProcessId) -> Self {
        Self {
            links,
            pid,
            done: false,
        }
    }

    fn finish(mut self) {
        self.done = true;
        self.links.exit(self.pid, ExitReason::Normal);
    }
}

impl Drop for CoordinatorExit {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let reason = if std::thread::panicking() {
            ExitReason::Panicked("coordinator panicked".into())
        } else {
            ExitReason::Killed
        };
        tracing::debug!(pid = %self.pid, %reason, "coordinator exited before deciding");
        self.links.exit(self.pid, reason);
    }
}

/// Races `request` across `workers` with a default [`Coordinator`].
///
/// # Errors
/// See [`Coordinator::race`].
pub async fn race<Req, Resp>(
    request: Req,
    workers: Vec<WorkerRef<Req, Resp>>,
) -> Result<Resp, RaceError>
where
    Req: Send + Sync + 'static,
    Resp: Send + 'static,
{
    Coordinator::default().race(request, workers).await
}
