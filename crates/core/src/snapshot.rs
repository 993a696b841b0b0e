//! Serializable image of a ledger, for hosts that keep state across restarts.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tally_common::utils::codec::decimal;
use tally_common::Address;
use tracing::info;

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{Ledger, LedgerParams};
use crate::types::{Amount, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub address: Address,
    #[serde(with = "decimal")]
    pub balance: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub self_address: Address,
    pub params: LedgerParams,
    /// Sorted by address.
    pub balances: Vec<BalanceEntry>,
    #[serde(with = "decimal")]
    pub total_supply: Amount,
    pub last_requests: BTreeMap<Address, Timestamp>,
    pub next_event_sequence: u64,
}

impl Ledger {
    pub fn snapshot(&self) -> LedgerSnapshot {
        let mut balances: Vec<BalanceEntry> = self
            .balances()
            .iter()
            .map(|(address, balance)| BalanceEntry {
                address: *address,
                balance: balance.clone(),
            })
            .collect();
        balances.sort_by(|a, b| a.address.cmp(&b.address));

        LedgerSnapshot {
            self_address: self.self_address(),
            params: self.params(),
            balances,
            total_supply: self.total_supply().clone(),
            last_requests: self
                .last_requests()
                .iter()
                .map(|(k, v)| (*k, *v))
                .collect(),
            next_event_sequence: self.next_event_sequence(),
        }
    }

    /// Rebuilds a ledger, rejecting snapshots that break an invariant.
    ///
    /// The event log starts empty but keeps the sequence numbering.
    pub fn restore(snapshot: LedgerSnapshot) -> LedgerResult<Self> {
        snapshot
            .params
            .validate()
            .map_err(|e| LedgerError::CorruptSnapshot(format!("invalid parameters: {}", e)))?;

        let mut balances = HashMap::with_capacity(snapshot.balances.len());
        for entry in snapshot.balances {
            if balances.insert(entry.address, entry.balance).is_some() {
                return Err(LedgerError::CorruptSnapshot(format!(
                    "duplicate balance entry for {}",
                    entry.address
                )));
            }
        }

        let ledger = Ledger::from_parts(
            snapshot.self_address,
            snapshot.params,
            balances,
            snapshot.total_supply,
            snapshot.last_requests.into_iter().collect(),
            snapshot.next_event_sequence,
        );
        ledger
            .verify_invariants()
            .map_err(LedgerError::CorruptSnapshot)?;

        info!(
            "Restored ledger with {} accounts, supply {}",
            ledger.account_count(),
            ledger.total_supply()
        );
        Ok(ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn addr(n: u64) -> Address {
        Address::from_low_u64(n)
    }

    fn populated() -> Ledger {
        let mut params = LedgerParams::with_owner(addr(1));
        params.faucet_amount = Amount::from(100u32);
        params.faucet_cooldown = Duration::from_secs(10);
        let mut ledger = Ledger::new(addr(99), params).unwrap();
        ledger.faucet(&addr(2), 1_000).unwrap();
        ledger.faucet(&addr(3), 1_005).unwrap();
        ledger.transfer(&addr(2), &addr(4), Amount::from(40u32)).unwrap();
        ledger
    }

    #[test]
    fn test_restore_preserves_state() {
        let ledger = populated();
        let json = serde_json::to_string(&ledger.snapshot()).unwrap();
        let snapshot: LedgerSnapshot = serde_json::from_str(&json).unwrap();
        let mut restored = Ledger::restore(snapshot).unwrap();

        assert_eq!(restored.balance(&addr(2)), Amount::from(60u32));
        assert_eq!(restored.balance(&addr(4)), Amount::from(40u32));
        assert_eq!(restored.total_supply(), &Amount::from(200u32));
        assert_eq!(restored.last_request_time(&addr(3)), 1_005);
        assert_eq!(restored.faucet_cooldown(), Duration::from_secs(10));
        assert!(restored.events().is_empty());

        // Cooldowns survive the restart and numbering continues.
        assert!(restored.faucet(&addr(3), 1_010).is_err());
        restored.faucet(&addr(3), 1_015).unwrap();
        assert_eq!(restored.events()[0].sequence, 3);
    }

    #[test]
    fn test_restore_rejects_supply_mismatch() {
        let mut snapshot = populated().snapshot();
        snapshot.total_supply = Amount::from(201u32);
        assert!(matches!(
            Ledger::restore(snapshot),
            Err(LedgerError::CorruptSnapshot(_))
        ));
    }

    #[test]
    fn test_restore_rejects_duplicate_accounts() {
        let mut snapshot = populated().snapshot();
        let first = snapshot.balances[0].clone();
        snapshot.balances.push(first);
        assert!(matches!(
            Ledger::restore(snapshot),
            Err(LedgerError::CorruptSnapshot(_))
        ));
    }

    #[test]
    fn test_restore_rejects_balance_on_ledger_identity() {
        let mut snapshot = populated().snapshot();
        snapshot.balances.push(BalanceEntry {
            address: snapshot.self_address,
            balance: Amount::from(1u32),
        });
        snapshot.total_supply += 1u32;
        assert!(matches!(
            Ledger::restore(snapshot),
            Err(LedgerError::CorruptSnapshot(_))
        ));
    }

    #[test]
    fn test_restore_rejects_out_of_range_params() {
        let mut snapshot = populated().snapshot();
        snapshot.params.max_transfer_limit = Amount::from(1u32);
        assert!(matches!(
            Ledger::restore(snapshot),
            Err(LedgerError::CorruptSnapshot(_))
        ));
    }
}
