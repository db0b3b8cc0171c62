//! notiq-core: item model, filters, and the pure state machines behind the
//! notification queue.
//!
//! Nothing in this crate spawns tasks or reads a clock; time values are
//! passed in by the async layer (`notiq-queue`).

pub mod config;
pub mod connectivity;
pub mod deferred;
pub mod error;
pub mod filter;
pub mod modal;
pub mod presenter;
pub mod types;

pub use config::{ArbiterConfig, DeferPolicy, QueueConfig};
pub use connectivity::{ConnectivityOracle, Reachability, StaticOracle};
pub use deferred::{DeferReason, DeferredEntry, DeferredSet, Eviction};
pub use error::{ConfigError, DeliveryError, FilterStage, PresentError};
pub use filter::{ContentFilter, FilterSet};
pub use modal::{Admission, ModalLane, ModalState, Ticket};
pub use presenter::Presenter;
pub use types::{Alert, ErrorReport, ItemKind, Message, Payload, QueueItem};
