//! notiq-queue: batching notification queue and the process-wide
//! presentation arbiter.
//!
//! Producers append to a [`BatchQueue`] from any thread. A timer task (or
//! an explicit [`BatchQueue::commit`]) drains the batch and hands each item
//! to the [`PresentationArbiter`], which applies the global filter, holds
//! back network errors while offline, and lets only one modal alert on
//! screen at a time.

pub mod arbiter;
pub mod oracle;
pub mod presenter;
pub mod queue;

pub use arbiter::{ArbiterStats, PresentationArbiter, RetryReport};
pub use oracle::WatchOracle;
pub use presenter::{Presented, RecordingPresenter, TracingPresenter};
pub use queue::{BatchQueue, CommitReport};
