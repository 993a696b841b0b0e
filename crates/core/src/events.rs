//! Ledger events and the append-only log that records them.

use serde::{Deserialize, Serialize};
use tally_common::utils::codec::decimal;
use tally_common::Address;

use crate::types::{Amount, Timestamp};

/// Immutable record of a successful state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum LedgerEvent {
    /// Balance movement. Mints use `Address::ZERO` as `from`.
    Transfer {
        from: Address,
        to: Address,
        #[serde(with = "decimal")]
        amount: Amount,
    },
    OwnershipTransferred {
        from: Address,
        to: Address,
        timestamp: Timestamp,
    },
    /// Cooldown change, in seconds.
    FaucetWaitingPeriodChanged {
        old: u64,
        new: u64,
        timestamp: Timestamp,
    },
    FaucetAmountChanged {
        #[serde(with = "decimal")]
        old: Amount,
        #[serde(with = "decimal")]
        new: Amount,
        timestamp: Timestamp,
    },
    MaxTransferLimitChanged {
        #[serde(with = "decimal")]
        old: Amount,
        #[serde(with = "decimal")]
        new: Amount,
        timestamp: Timestamp,
    },
}

impl LedgerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerEvent::Transfer { .. } => "Transfer",
            LedgerEvent::OwnershipTransferred { .. } => "OwnershipTransferred",
            LedgerEvent::FaucetWaitingPeriodChanged { .. } => "FaucetWaitingPeriodChanged",
            LedgerEvent::FaucetAmountChanged { .. } => "FaucetAmountChanged",
            LedgerEvent::MaxTransferLimitChanged { .. } => "MaxTransferLimitChanged",
        }
    }

    /// True for transfers whose sender is the null identity.
    pub fn is_mint(&self) -> bool {
        matches!(self, LedgerEvent::Transfer { from, .. } if from.is_zero())
    }
}

/// Event with its position in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub sequence: u64,
    #[serde(flatten)]
    pub event: LedgerEvent,
}

/// Append-only, ordered event log.
///
/// With a retention set, the oldest records are dropped in batches once the
/// log holds twice that many; sequence numbers are never reused.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    records: Vec<EventRecord>,
    next_sequence: u64,
    retention: Option<usize>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty log whose first record will carry `next_sequence`.
    pub fn starting_at(next_sequence: u64) -> Self {
        Self {
            records: Vec::new(),
            next_sequence,
            retention: None,
        }
    }

    pub fn set_retention(&mut self, retention: Option<usize>) {
        self.retention = retention.map(|keep| keep.max(1));
        self.trim();
    }

    pub fn append(&mut self, events: &[LedgerEvent]) {
        for event in events {
            self.records.push(EventRecord {
                sequence: self.next_sequence,
                event: event.clone(),
            });
            self.next_sequence += 1;
        }
        self.trim();
    }

    fn trim(&mut self) {
        if let Some(keep) = self.retention {
            if self.records.len() >= keep.saturating_mul(2) {
                let excess = self.records.len() - keep;
                self.records.drain(..excess);
            }
        }
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Records with `sequence >= since`.
    pub fn since(&self, since: u64) -> &[EventRecord] {
        let start = self.records.partition_point(|r| r.sequence < since);
        &self.records[start..]
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
