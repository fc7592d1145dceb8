//! Runtime core: the race coordinator and its supervision plumbing.
//!
//! The public entry points are [`Coordinator`] and the free function [`race`].
//!
//! Internal modules:
//! - [`link`]: link table, exit reasons and exit-signal propagation;
//! - [`channel`]: many-writer, single-reader result channel;
//! - [`state`]: per-race bookkeeping and the decision point;
//! - [`runner`]: spawns one worker linked under the coordinator;
//! - [`coordinator`]: the race algorithm;
//! - [`config`]: shared race settings.

mod builder;
mod channel;
mod config;
mod coordinator;
mod link;
mod runner;
mod state;

pub use builder::CoordinatorBuilder;
pub use config::RaceConfig;
pub use coordinator::{Coordinator, race};
pub use link::{ExitReason, ExitSink, LinkTable, ProcessId};
