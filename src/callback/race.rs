//! # Callback-style race.
//!
//! Services receive the request and a [`Completion`]. They report through it
//! whenever they are done, from any thread or task. The caller's callback is
//! guarded by a [`Claim`] and fires exactly once:
//!
//! ```text
//! workers empty          → on_done(Err(NoWorkers)) immediately
//! first succeed(r)       → claim, cancel token, on_done(Ok(r))
//! last fail / crash      → claim, on_done(Err(AllWorkersFailed { last }))
//! anything after a claim → dropped
//! ```
//!
//! A [`Completion`] dropped without a report counts as a crash.

use std::borrow::Cow;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::callback::Claim;
use crate::core::ExitReason;
use crate::error::{RaceError, WorkerError, WorkerFault};

type DoneFn<R> = Box<dyn FnOnce(Result<R, RaceError>) + Send + 'static>;
type ServiceFn<Req, R> = dyn Fn(Arc<Req>, Completion<R>) + Send + Sync + 'static;

/// A named callback-style service.
pub struct Service<Req, R> {
    name: Cow<'static, str>,
    f: Box<ServiceFn<Req, R>>,
}

impl<Req, R> Service<Req, R> {
    /// Wraps a closure that starts the work and reports through the [`Completion`].
    pub fn new<F>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: Fn(Arc<Req>, Completion<R>) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(f),
        }
    }

    /// Service name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

struct Failures {
    count: usize,
    last: Option<WorkerFault>,
}

struct Shared<R> {
    total: usize,
    claim: Claim,
    token: CancellationToken,
    failures: Mutex<Failures>,
    on_done: Mutex<Option<DoneFn<R>>>,
}

impl<R> Shared<R> {
    fn fire(&self, verdict: Result<R, RaceError>) {
        let cb = self
            .on_done
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(cb) = cb {
            cb(verdict);
        }
    }

    fn success(&self, r: R) {
        if self.claim.try_claim() {
            self.token.cancel();
            self.fire(Ok(r));
        }
    }

    fn fault(&self, fault: WorkerFault) {
        let exhausted = {
            let mut f = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
            f.count += 1;
            f.last = Some(fault);
            (f.count == self.total).then(|| f.last.clone())
        };
        if let Some(last) = exhausted {
            if self.claim.try_claim() {
                self.fire(Err(RaceError::AllWorkersFailed {
                    workers: self.total,
                    last,
                }));
            }
        }
    }
}

/// Single-use reporting handle given to each service.
pub struct Completion<R> {
    shared: Arc<Shared<R>>,
    worker: Arc<str>,
    reported: bool,
}

impl<R> Completion<R> {
    /// Cancellation token for this race; cancelled once a winner is chosen.
    pub fn token(&self) -> &CancellationToken {
        &self.shared.token
    }

    /// Name of the service this handle belongs to.
    pub fn worker(&self) -> &str {
        &self.worker
    }

    /// Reports a response.
    pub fn succeed(mut self, response: R) {
        self.reported = true;
        self.shared.success(response);
    }

    /// Reports a logical failure.
    pub fn fail(mut self, error: WorkerError) {
        self.reported = true;
        self.shared.fault(WorkerFault::Failure {
            worker: self.worker.to_string(),
            error,
        });
    }

    /// Reports a result in one call.
    pub fn complete(self, result: Result<R, WorkerError>) {
        match result {
            Ok(r) => self.succeed(r),
            Err(e) => self.fail(e),
        }
    }
}

impl<R> Drop for Completion<R> {
    fn drop(&mut self) {
        if self.reported {
            return;
        }
        let reason = if std::thread::panicking() {
            ExitReason::Panicked("completion dropped while panicking".into())
        } else {
            ExitReason::Killed
        };
        self.shared.fault(WorkerFault::Crash {
            worker: self.worker.to_string(),
            reason,
        });
    }
}

/// Starts every service and calls `on_done` exactly once with the verdict.
///
/// Services are started on the calling thread in order. A service that
/// panics while starting is accounted as a crash.
pub fn race_callback<Req, R, F>(request: Req, services: Vec<Service<Req, R>>, on_done: F)
where
    Req: Send + Sync + 'static,
    R: Send + 'static,
    F: FnOnce(Result<R, RaceError>) + Send + 'static,
{
    if services.is_empty() {
        on_done(Err(RaceError::NoWorkers));
        return;
    }

    let shared = Arc::new(Shared {
        total: services.len(),
        claim: Claim::new(),
        token: CancellationToken::new(),
        failures: Mutex::new(Failures {
            count: 0,
            last: None,
        }),
        on_done: Mutex::new(Some(Box::new(on_done))),
    });
    let request = Arc::new(request);

    for service in &services {
        let completion = Completion {
            shared: Arc::clone(&shared),
            worker: Arc::from(service.name()),
            reported: false,
        };
        let req = Arc::clone(&request);
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| (service.f)(req, completion))) {
            let reason = ExitReason::from_panic(payload);
            tracing::debug!(worker = service.name(), %reason, "service panicked while starting");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn threaded(name: &'static str, ms: u64, answer: Result<u32, &'static str>) -> Service<u32, u32> {
        Service::new(name, move |req: Arc<u32>, done: Completion<u32>| {
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(ms));
                done.complete(answer.map(|a| a + *req).map_err(WorkerError::fail));
            });
        })
    }

    fn collect<Req, R>(req: Req, services: Vec<Service<Req, R>>) -> (Result<R, RaceError>, Arc<AtomicUsize>)
    where
        Req: Send + Sync + 'static,
        R: Send + 'static,
    {
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel();
        let counter = Arc::clone(&calls);
        race_callback(req, services, move |res| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(res);
        });
        let res = rx.recv_timeout(Duration::from_secs(5)).expect("callback fired");
        (res, calls)
    }

    #[test]
    fn first_success_fires_once() {
        let (res, calls) = collect(
            1,
            vec![threaded("fail", 5, Err("no")), threaded("ok", 20, Ok(10)), threaded("ok2", 60, Ok(20))],
        );
        assert_eq!(res.unwrap(), 11);
        thread::sleep(Duration::from_millis(100));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn last_failure_fires_all_failed() {
        let (res, _) = collect(0, vec![threaded("a", 5, Err("x")), threaded("b", 15, Err("y"))]);
        match res {
            Err(RaceError::AllWorkersFailed { workers, last }) => {
                assert_eq!(workers, 2);
                assert_eq!(last.unwrap().worker(), "b");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn no_services_fires_immediately() {
        let (res, calls) = collect::<u32, u32>(0, Vec::new());
        assert!(matches!(res, Err(RaceError::NoWorkers)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_or_panicking_services_are_crashes() {
        let forgetful = Service::new("forgetful", |_req: Arc<u32>, done: Completion<u32>| drop(done));
        let explosive = Service::new("explosive", |_req: Arc<u32>, _done: Completion<u32>| {
            panic!("service exploded")
        });
        let (res, _) = collect(0, vec![forgetful, explosive]);
        let err = res.unwrap_err();
        let last = err.last_fault().cloned().unwrap();
        assert!(last.is_crash());
        assert_eq!(last.worker(), "explosive");
    }

    #[test]
    fn winner_cancels_the_token() {
        let (seen_tx, seen_rx) = mpsc::channel();
        let watcher = Service::new("watcher", move |_req: Arc<u32>, done: Completion<u32>| {
            let seen_tx = seen_tx.clone();
            thread::spawn(move || {
                while !done.token().is_cancelled() {
                    thread::sleep(Duration::from_millis(1));
                }
                let _ = seen_tx.send(());
                done.fail(WorkerError::Canceled);
            });
        });
        let (res, _) = collect(0, vec![watcher, threaded("ok", 5, Ok(1))]);
        assert_eq!(res.unwrap(), 1);
        seen_rx.recv_timeout(Duration::from_secs(5)).expect("token cancelled");
    }
}
