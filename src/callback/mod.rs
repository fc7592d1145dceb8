//! # Callback variant.
//!
//! [`race_callback`] for code built around completion callbacks rather than
//! futures. [`Claim`] is the one-shot flag that guarantees a single verdict.

mod claim;
mod race;

pub use claim::Claim;
pub use race::{Completion, Service, race_callback};
