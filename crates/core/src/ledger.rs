use num_traits::{CheckedSub, Zero};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tally_common::utils::codec::decimal;
use tally_common::Address;
use tracing::{debug, warn};

use crate::error::{AuthorizationError, LedgerResult, ThrottleError, ValidationError};
use crate::events::{EventLog, EventRecord, LedgerEvent};
use crate::types::{
    default_faucet_amount, default_transfer_limit, max_faucet_amount, max_transfer_limit,
    min_transfer_limit, Amount, Timestamp, DEFAULT_FAUCET_COOLDOWN,
};

/// Administrative parameters a ledger starts with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerParams {
    pub owner: Address,
    #[serde(with = "decimal")]
    pub faucet_amount: Amount,
    pub faucet_cooldown: Duration,
    #[serde(with = "decimal")]
    pub max_transfer_limit: Amount,
}

impl LedgerParams {
    /// Default parameters owned by `owner`.
    pub fn with_owner(owner: Address) -> Self {
        Self {
            owner,
            faucet_amount: default_faucet_amount(),
            faucet_cooldown: DEFAULT_FAUCET_COOLDOWN,
            max_transfer_limit: default_transfer_limit(),
        }
    }

    /// Applies the same bounds the owner-gated setters enforce.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.owner.is_zero() {
            return Err(ValidationError::InvalidOwner.into());
        }
        check_faucet_amount(&self.faucet_amount)?;
        check_transfer_limit(&self.max_transfer_limit)?;
        Ok(())
    }
}

fn whole_seconds(period: Duration) -> Duration {
    Duration::from_secs(period.as_secs())
}

fn check_faucet_amount(amount: &Amount) -> Result<(), ValidationError> {
    if amount > max_faucet_amount() {
        return Err(ValidationError::AmountTooLarge);
    }
    Ok(())
}

fn check_transfer_limit(limit: &Amount) -> Result<(), ValidationError> {
    if limit < min_transfer_limit() {
        return Err(ValidationError::LimitTooLow);
    }
    if limit > max_transfer_limit() {
        return Err(ValidationError::LimitTooHigh);
    }
    Ok(())
}

/// The account table, supply counter and administrative parameters.
#[derive(Debug, Clone)]
pub struct Ledger {
    /// Reserved identity of the ledger itself; never a transfer recipient.
    self_address: Address,
    owner: Address,
    balances: HashMap<Address, Amount>,
    total_supply: Amount,
    last_request: HashMap<Address, Timestamp>,
    faucet_amount: Amount,
    faucet_cooldown: Duration,
    max_transfer_limit: Amount,
    log: EventLog,
}

impl Ledger {
    /// Empty ledger with zero supply.
    pub fn new(self_address: Address, params: LedgerParams) -> LedgerResult<Self> {
        params.validate()?;
        debug!(
            "Creating ledger {} owned by {}",
            self_address, params.owner
        );
        Ok(Self {
            self_address,
            owner: params.owner,
            balances: HashMap::new(),
            total_supply: Amount::zero(),
            last_request: HashMap::new(),
            faucet_amount: params.faucet_amount,
            faucet_cooldown: whole_seconds(params.faucet_cooldown),
            max_transfer_limit: params.max_transfer_limit,
            log: EventLog::new(),
        })
    }

    // --- Observers ---

    pub fn balance(&self, account: &Address) -> Amount {
        self.balances.get(account).cloned().unwrap_or_default()
    }

    pub fn total_supply(&self) -> &Amount {
        &self.total_supply
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn self_address(&self) -> Address {
        self.self_address
    }

    pub fn current_transfer_cap(&self) -> &Amount {
        &self.max_transfer_limit
    }

    pub fn faucet_amount(&self) -> &Amount {
        &self.faucet_amount
    }

    pub fn faucet_cooldown(&self) -> Duration {
        self.faucet_cooldown
    }

    /// Last successful faucet draw, or the epoch origin if there is none.
    pub fn last_request_time(&self, account: &Address) -> Timestamp {
        self.last_request.get(account).copied().unwrap_or(0)
    }

    /// Earliest time `account` may draw again. Unseen accounts may draw now.
    pub fn next_faucet_time(&self, account: &Address) -> Timestamp {
        match self.last_request.get(account) {
            Some(last) => last.saturating_add(self.faucet_cooldown.as_secs()),
            None => 0,
        }
    }

    /// Accounts that have ever been credited.
    pub fn account_count(&self) -> usize {
        self.balances.len()
    }

    pub fn events(&self) -> &[EventRecord] {
        self.log.records()
    }

    pub fn events_since(&self, sequence: u64) -> &[EventRecord] {
        self.log.since(sequence)
    }

    pub fn next_event_sequence(&self) -> u64 {
        self.log.next_sequence()
    }

    /// Keep roughly the `retention` most recent events in memory. `None`
    /// keeps everything.
    pub fn set_event_retention(&mut self, retention: Option<usize>) {
        self.log.set_retention(retention);
    }

    // --- Mutations ---

    /// Moves `amount` from `caller` to `to`. Supply is unchanged.
    pub fn transfer(
        &mut self,
        caller: &Address,
        to: &Address,
        amount: Amount,
    ) -> LedgerResult<Vec<LedgerEvent>> {
        if to == caller {
            debug!("Transfer rejected: {} tried to send to itself", caller);
            return Err(ValidationError::SelfTransfer.into());
        }
        // The ledger identity never takes part in a transfer.
        if *to == self.self_address || *caller == self.self_address {
            debug!("Transfer rejected: {} -> {} involves the ledger itself", caller, to);
            return Err(ValidationError::InvalidRecipient.into());
        }
        if amount > self.max_transfer_limit {
            debug!("Transfer rejected: {} exceeds cap {}", amount, self.max_transfer_limit);
            return Err(ValidationError::ExceedsTransferCap.into());
        }
        let sender_balance = self.balance(caller);
        let remaining = sender_balance
            .checked_sub(&amount)
            .ok_or(ValidationError::InsufficientBalance)?;

        // All checks passed; commit.
        self.balances.insert(*caller, remaining);
        *self.balances.entry(*to).or_default() += &amount;

        debug!("Transfer {} -> {}: {}", caller, to, amount);
        Ok(self.commit(vec![LedgerEvent::Transfer {
            from: *caller,
            to: *to,
            amount,
        }]))
    }

    /// Mints `faucet_amount` to `caller`, at most once per cooldown.
    pub fn faucet(&mut self, caller: &Address, now: Timestamp) -> LedgerResult<Vec<LedgerEvent>> {
        if *caller == self.self_address {
            debug!("Faucet rejected: the ledger cannot credit itself");
            return Err(ValidationError::InvalidRecipient.into());
        }
        if let Some(last) = self.last_request.get(caller) {
            // An unrepresentable retry time means the caller never becomes eligible.
            let blocked_until = match last.checked_add(self.faucet_cooldown.as_secs()) {
                Some(retry_at) if now >= retry_at => None,
                Some(retry_at) => Some(retry_at),
                None => Some(Timestamp::MAX),
            };
            if let Some(retry_at) = blocked_until {
                debug!("Faucet rejected for {}: cooldown until {}", caller, retry_at);
                return Err(ThrottleError::CooldownActive { retry_at }.into());
            }
        }

        let amount = self.faucet_amount.clone();
        self.total_supply += &amount;
        *self.balances.entry(*caller).or_default() += &amount;
        self.last_request.insert(*caller, now);

        debug!("Faucet minted {} to {}", amount, caller);
        Ok(self.commit(vec![LedgerEvent::Transfer {
            from: Address::ZERO,
            to: *caller,
            amount,
        }]))
    }

    /// Zero disables throttling. The cooldown has whole-second resolution,
    /// so any sub-second part of `new_period` is dropped before it is stored.
    pub fn set_faucet_waiting_period(
        &mut self,
        caller: &Address,
        new_period: Duration,
        now: Timestamp,
    ) -> LedgerResult<Vec<LedgerEvent>> {
        self.ensure_owner(caller)?;

        let new_period = whole_seconds(new_period);
        let old = std::mem::replace(&mut self.faucet_cooldown, new_period);
        debug!("Faucet waiting period {:?} -> {:?}", old, new_period);
        Ok(self.commit(vec![LedgerEvent::FaucetWaitingPeriodChanged {
            old: old.as_secs(),
            new: new_period.as_secs(),
            timestamp: now,
        }]))
    }

    pub fn set_faucet_amount(
        &mut self,
        caller: &Address,
        new_amount: Amount,
        now: Timestamp,
    ) -> LedgerResult<Vec<LedgerEvent>> {
        self.ensure_owner(caller)?;
        check_faucet_amount(&new_amount)?;

        let old = std::mem::replace(&mut self.faucet_amount, new_amount.clone());
        debug!("Faucet amount {} -> {}", old, new_amount);
        Ok(self.commit(vec![LedgerEvent::FaucetAmountChanged {
            old,
            new: new_amount,
            timestamp: now,
        }]))
    }

    pub fn set_max_transfer_limit(
        &mut self,
        caller: &Address,
        new_limit: Amount,
        now: Timestamp,
    ) -> LedgerResult<Vec<LedgerEvent>> {
        self.ensure_owner(caller)?;
        check_transfer_limit(&new_limit)?;

        let old = std::mem::replace(&mut self.max_transfer_limit, new_limit.clone());
        debug!("Max transfer limit {} -> {}", old, new_limit);
        Ok(self.commit(vec![LedgerEvent::MaxTransferLimitChanged {
            old,
            new: new_limit,
            timestamp: now,
        }]))
    }

    /// Single-step handover; the new owner does not need to accept.
    pub fn transfer_ownership(
        &mut self,
        caller: &Address,
        new_owner: &Address,
        now: Timestamp,
    ) -> LedgerResult<Vec<LedgerEvent>> {
        self.ensure_owner(caller)?;
        if new_owner.is_zero() {
            return Err(ValidationError::InvalidOwner.into());
        }

        let old = std::mem::replace(&mut self.owner, *new_owner);
        debug!("Ownership {} -> {}", old, new_owner);
        Ok(self.commit(vec![LedgerEvent::OwnershipTransferred {
            from: old,
            to: *new_owner,
            timestamp: now,
        }]))
    }

    /// Checks every structural invariant of the current state.
    pub fn verify_invariants(&self) -> Result<(), String> {
        let sum: Amount = self.balances.values().sum();
        if sum != self.total_supply {
            return Err(format!(
                "total supply {} does not match sum of balances {}",
                self.total_supply, sum
            ));
        }
        if self.owner.is_zero() {
            return Err("owner is the null address".to_string());
        }
        if !self.balance(&self.self_address).is_zero() {
            return Err(format!("ledger identity {} holds a balance", self.self_address));
        }
        check_faucet_amount(&self.faucet_amount).map_err(|e| e.to_string())?;
        check_transfer_limit(&self.max_transfer_limit).map_err(|e| e.to_string())?;
        Ok(())
    }

    fn ensure_owner(&self, caller: &Address) -> Result<(), AuthorizationError> {
        if *caller != self.owner {
            warn!("Owner-only call rejected for {}", caller);
            return Err(AuthorizationError::NotOwner);
        }
        Ok(())
    }

    fn commit(&mut self, events: Vec<LedgerEvent>) -> Vec<LedgerEvent> {
        debug_assert_eq!(self.verify_invariants(), Ok(()));
        self.log.append(&events);
        events
    }

    pub(crate) fn from_parts(
        self_address: Address,
        params: LedgerParams,
        balances: HashMap<Address, Amount>,
        total_supply: Amount,
        last_request: HashMap<Address, Timestamp>,
        next_sequence: u64,
    ) -> Self {
        Self {
            self_address,
            owner: params.owner,
            balances,
            total_supply,
            last_request,
            faucet_amount: params.faucet_amount,
            faucet_cooldown: whole_seconds(params.faucet_cooldown),
            max_transfer_limit: params.max_transfer_limit,
            log: EventLog::starting_at(next_sequence),
        }
    }

    pub(crate) fn params(&self) -> LedgerParams {
        LedgerParams {
            owner: self.owner,
            faucet_amount: self.faucet_amount.clone(),
            faucet_cooldown: self.faucet_cooldown,
            max_transfer_limit: self.max_transfer_limit.clone(),
        }
    }

    pub(crate) fn balances(&self) -> &HashMap<Address, Amount> {
        &self.balances
    }

    pub(crate) fn last_requests(&self) -> &HashMap<Address, Timestamp> {
        &self.last_request
    }
}
