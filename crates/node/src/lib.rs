//! Hosting service for the tally ledger.
//!
//! Serializes calls onto a single [`tally_core::Ledger`], supplies
//! timestamps, fans events out to subscribers, keeps a snapshot on disk and
//! exposes everything over HTTP.

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod metrics;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::NodeConfig;
pub use error::{NodeError, NodeResult};
pub use events::{EventPublisher, EventSubscriber};
pub use metrics::LedgerMetrics;
pub use service::{AccountView, LedgerService, LedgerStatus};
