//! Collector Logic Module
//!
//! The collector task split into focused components:
//! - `state`: collector-owned state, statistics and logger wrapper
//! - `handlers`: command and event handlers
//! - `task`: the `CollectorTask` loop and channel coordination
//!
//! All collector state is serialized through the single `CollectorTask`. Transport
//! tasks and the consumer only ever exchange messages with it, so registry, store
//! and view never need locks.

pub mod handlers;
pub mod state;
pub mod task;

pub use handlers::{CollectorHandlers, HandlerOutput};
pub use state::{CollectorState, CollectorStats, LoggerWrapper};
pub use task::CollectorTask;
