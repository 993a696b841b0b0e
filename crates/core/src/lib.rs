//! Value-less accounting ledger with a permissionless, throttled faucet.
//!
//! The [`Ledger`] owns every balance, the total supply, the administrative
//! parameters and the per-account faucet timestamps. Each mutating call takes
//! the caller identity and the current time explicitly, checks all of its
//! preconditions against current state, then commits and returns the events
//! it emitted. Serializing calls is the host's job.

pub mod error;
pub mod events;
pub mod ledger;
pub mod snapshot;
pub mod types;

pub use error::{AuthorizationError, LedgerError, LedgerResult, ThrottleError, ValidationError};
pub use events::{EventLog, EventRecord, LedgerEvent};
pub use ledger::{Ledger, LedgerParams};
pub use snapshot::LedgerSnapshot;
pub use types::{Amount, Timestamp};
