//! # Supervision links between a coordinator and its workers.
//!
//! A [`LinkTable`] records bidirectional links between processes (the
//! coordinator and the workers it spawns) and propagates terminations along them.
//! It keeps two lookup tables, child→parent and parent→children, plus one entry
//! per live process.
//!
//! ## Exit propagation
//! ```text
//! exit(pid, reason)
//!   ├─ pid unknown (already exited)          → no-op
//!   └─ remove pid, then for every linked peer:
//!        ├─ peer traps exits                  → sink.exit_signal(pid, reason)
//!        ├─ reason == Normal                  → nothing (link just dissolves)
//!        └─ reason abnormal, peer not trapping → kill peer (cancel token, abort task)
//!                                               └─ exit(peer, Killed) cascades
//! ```
//!
//! ## Rules
//! - Every process exits **at most once**; later `exit` calls are ignored.
//! - Signals are handed to sinks **after** the table lock is released.
//! - A child registered under a parent that already exited is killed at once.
//! - Trap mode must be enabled on a coordinator **before** it links workers,
//!   otherwise an early worker crash would kill the coordinator instead of
//!   reaching it as a message.

use std::any::Any;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

/// Global counter for process identifiers.
static PID_SEQ: AtomicU64 = AtomicU64::new(1);

/// Identifies a supervised unit of work (a worker or a coordinator).
///
/// Unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(u64);

impl ProcessId {
    fn next() -> Self {
        Self(PID_SEQ.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric id.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

/// Why a process terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// The process finished on its own (it may still have reported a failure).
    Normal,
    /// The process panicked; carries the panic message.
    Panicked(Arc<str>),
    /// The process was torn down from outside (abort or linked kill).
    Killed,
}

impl ExitReason {
    /// Returns `true` for every reason except [`ExitReason::Normal`].
    pub fn is_abnormal(&self) -> bool {
        !matches!(self, ExitReason::Normal)
    }

    /// Builds a [`ExitReason::Panicked`] from a panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let msg = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic".to_string()
        };
        ExitReason::Panicked(msg.into())
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Normal => f.write_str("normal"),
            ExitReason::Panicked(msg) => write!(f, "panicked: {msg}"),
            ExitReason::Killed => f.write_str("killed"),
        }
    }
}

/// Receives exit signals on behalf of a process that traps exits.
///
/// Called outside of the table lock, possibly from a worker's watcher task.
pub trait ExitSink: Send + Sync + 'static {
    /// Linked process `from` terminated with `reason`.
    fn exit_signal(&self, from: ProcessId, reason: &ExitReason);
}

/// Per-process entry.
struct Process {
    token: CancellationToken,
    abort: Option<AbortHandle>,
    trap_exit: bool,
    sink: Option<Arc<dyn ExitSink>>,
}

impl Process {
    fn kill(&self) {
        self.token.cancel();
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }
}

#[derive(Default)]
struct Tables {
    procs: HashMap<ProcessId, Process>,
    parent_of: HashMap<ProcessId, ProcessId>,
    children_of: HashMap<ProcessId, HashSet<ProcessId>>,
}

impl Tables {
    /// Removes `pid` and all its links; returns its former peers.
    fn unlink_all(&mut self, pid: ProcessId) -> Vec<ProcessId> {
        let mut peers = Vec::new();
        if let Some(parent) = self.parent_of.remove(&pid) {
            if let Some(siblings) = self.children_of.get_mut(&parent) {
                siblings.remove(&pid);
            }
            peers.push(parent);
        }
        if let Some(children) = self.children_of.remove(&pid) {
            for child in children {
                self.parent_of.remove(&child);
                peers.push(child);
            }
        }
        peers
    }
}

/// Bidirectional supervision relation over a set of processes.
///
/// Shared as `Arc<LinkTable>` between a coordinator and the watcher of every
/// worker it spawned.
#[derive(Default)]
pub struct LinkTable {
    inner: Mutex<Tables>,
}

impl LinkTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a standalone process controlled by `token`.
    pub fn register(&self, token: CancellationToken) -> ProcessId {
        let pid = ProcessId::next();
        self.lock().procs.insert(
            pid,
            Process {
                token,
                abort: None,
                trap_exit: false,
                sink: None,
            },
        );
        pid
    }

    /// Registers a new process and links it to `parent` in one step.
    ///
    /// If `parent` has already exited the child is killed immediately, so a
    /// caller never ends up with work that outlives its supervisor.
    pub fn register_child(&self, parent: ProcessId, token: CancellationToken) -> ProcessId {
        let pid = ProcessId::next();
        let mut tables = self.lock();
        if !tables.procs.contains_key(&parent) {
            token.cancel();
            return pid;
        }
        tables.procs.insert(
            pid,
            Process {
                token,
                abort: None,
                trap_exit: false,
                sink: None,
            },
        );
        tables.parent_of.insert(pid, parent);
        tables.children_of.entry(parent).or_default().insert(pid);
        pid
    }

    /// Turns on trap mode for `pid`: exit signals from linked peers are handed
    /// to `sink` instead of killing the process.
    ///
    /// Returns `false` if `pid` is not alive.
    pub fn trap_exits(&self, pid: ProcessId, sink: Arc<dyn ExitSink>) -> bool {
        match self.lock().procs.get_mut(&pid) {
            Some(proc_) => {
                proc_.trap_exit = true;
                proc_.sink = Some(sink);
                true
            }
            None => false,
        }
    }

    /// Returns whether `pid` currently traps exits.
    pub fn is_trapping(&self, pid: ProcessId) -> bool {
        self.lock().procs.get(&pid).is_some_and(|p| p.trap_exit)
    }

    /// Attaches the abort handle of the task running `pid`.
    ///
    /// When the process is already gone the task is aborted right away.
    pub fn attach_abort(&self, pid: ProcessId, abort: AbortHandle) {
        let mut tables = self.lock();
        match tables.procs.get_mut(&pid) {
            Some(proc_) => proc_.abort = Some(abort),
            None => abort.abort(),
        }
    }

    /// Returns true if `pid` has not exited yet.
    pub fn is_alive(&self, pid: ProcessId) -> bool {
        self.lock().procs.contains_key(&pid)
    }

    /// Returns the live children linked under `parent`, sorted.
    pub fn children(&self, parent: ProcessId) -> Vec<ProcessId> {
        let tables = self.lock();
        let mut out: Vec<ProcessId> = tables
            .children_of
            .get(&parent)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        out.sort_unstable();
        out
    }

    /// Returns the parent of `child`, if linked.
    pub fn parent(&self, child: ProcessId) -> Option<ProcessId> {
        self.lock().parent_of.get(&child).copied()
    }

    /// Number of live processes.
    pub fn len(&self) -> usize {
        self.lock().procs.len()
    }

    /// Returns true if no process is alive.
    pub fn is_empty(&self) -> bool {
        self.lock().procs.is_empty()
    }

    /// Records the termination of `pid` and propagates it to linked peers.
    ///
    /// Returns `false` if `pid` had already exited.
    pub fn exit(&self, pid: ProcessId, reason: ExitReason) -> bool {
        let mut signals: Vec<(Arc<dyn ExitSink>, ProcessId, ExitReason)> = Vec::new();
        let mut first = true;
        {
            let mut tables = self.lock();
            let mut queue = VecDeque::from([(pid, reason)]);

            while let Some((dead, why)) = queue.pop_front() {
                if tables.procs.remove(&dead).is_none() {
                    if first {
                        return false;
                    }
                    continue;
                }
                first = false;

                for peer in tables.unlink_all(dead) {
                    let Some(entry) = tables.procs.get(&peer) else {
                        continue;
                    };
                    if entry.trap_exit {
                        if let Some(sink) = &entry.sink {
                            signals.push((Arc::clone(sink), dead, why.clone()));
                        }
                    } else if why.is_abnormal() {
                        entry.kill();
                        queue.push_back((peer, ExitReason::Killed));
                    }
                }
            }
        }

        for (sink, from, why) in signals {
            sink.exit_signal(from, &why);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(ProcessId, ExitReason)>>,
    }

    impl ExitSink for Recorder {
        fn exit_signal(&self, from: ProcessId, reason: &ExitReason) {
            self.seen.lock().unwrap().push((from, reason.clone()));
        }
    }

    #[test]
    fn trapping_parent_receives_child_crash_as_signal() {
        let table = LinkTable::new();
        let parent_token = CancellationToken::new();
        let parent = table.register(parent_token.clone());
        assert!(!table.is_trapping(parent));
        let rec = Arc::new(Recorder::default());
        assert!(table.trap_exits(parent, rec.clone()));
        assert!(table.is_trapping(parent));

        let child = table.register_child(parent, CancellationToken::new());
        assert_eq!(table.parent(child), Some(parent));
        assert!(!table.is_trapping(child));

        assert!(table.exit(child, ExitReason::Panicked("boom".into())));
        assert!(!parent_token.is_cancelled());
        assert!(table.is_alive(parent));

        let seen = rec.seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[(child, ExitReason::Panicked("boom".into()))]);
    }

    #[test]
    fn non_trapping_parent_is_killed_by_child_crash() {
        let table = LinkTable::new();
        let parent_token = CancellationToken::new();
        let parent = table.register(parent_token.clone());
        let child = table.register_child(parent, CancellationToken::new());
        let sibling_token = CancellationToken::new();
        let sibling = table.register_child(parent, sibling_token.clone());

        table.exit(child, ExitReason::Panicked("boom".into()));

        assert!(parent_token.is_cancelled());
        assert!(!table.is_alive(parent));
        // the kill cascades from the parent to the rest of its children
        assert!(sibling_token.is_cancelled());
        assert!(!table.is_alive(sibling));
        assert!(table.is_empty());
    }

    #[test]
    fn normal_exit_only_dissolves_links() {
        let table = LinkTable::new();
        let parent_token = CancellationToken::new();
        let parent = table.register(parent_token.clone());
        let child_token = CancellationToken::new();
        let child = table.register_child(parent, child_token.clone());

        table.exit(parent, ExitReason::Normal);

        assert!(!child_token.is_cancelled());
        assert!(table.is_alive(child));
        assert_eq!(table.parent(child), None);
    }

    #[test]
    fn abnormal_parent_exit_kills_children() {
        let table = LinkTable::new();
        let parent = table.register(CancellationToken::new());
        let rec = Arc::new(Recorder::default());
        table.trap_exits(parent, rec.clone());
        let tokens: Vec<_> = (0..4).map(|_| CancellationToken::new()).collect();
        for t in &tokens {
            table.register_child(parent, t.clone());
        }
        assert_eq!(table.children(parent).len(), 4);

        table.exit(parent, ExitReason::Killed);

        assert!(tokens.iter().all(CancellationToken::is_cancelled));
        assert!(table.is_empty());
        // a trapping process never signals itself
        assert!(rec.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn exit_is_reported_once() {
        let table = LinkTable::new();
        let parent = table.register(CancellationToken::new());
        let rec = Arc::new(Recorder::default());
        table.trap_exits(parent, rec.clone());
        let child = table.register_child(parent, CancellationToken::new());

        assert!(table.exit(child, ExitReason::Killed));
        assert!(!table.exit(child, ExitReason::Panicked("late".into())));
        assert_eq!(rec.seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn child_of_dead_parent_is_born_cancelled() {
        let table = LinkTable::new();
        let parent = table.register(CancellationToken::new());
        table.exit(parent, ExitReason::Normal);

        let token = CancellationToken::new();
        let child = table.register_child(parent, token.clone());
        assert!(token.is_cancelled());
        assert!(!table.is_alive(child));
    }

    #[test]
    fn dead_process_cannot_trap() {
        let table = LinkTable::new();
        let pid = table.register(CancellationToken::new());
        table.exit(pid, ExitReason::Normal);
        assert!(!table.trap_exits(pid, Arc::new(Recorder::default())));
        assert!(!table.is_trapping(pid));
    }

    #[test]
    fn panic_payloads_become_reasons() {
        let r = ExitReason::from_panic(Box::new("static msg"));
        assert_eq!(r, ExitReason::Panicked("static msg".into()));
        let r = ExitReason::from_panic(Box::new(String::from("owned")));
        assert_eq!(r.to_string(), "panicked: owned");
        let r = ExitReason::from_panic(Box::new(42u8));
        assert!(r.is_abnormal());
        assert!(!ExitReason::Normal.is_abnormal());
    }
}
