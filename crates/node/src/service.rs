//! Serialized access to a single hosted ledger.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tally_common::utils::codec::decimal;
use tally_common::Address;
use tally_core::{
    Amount, EventRecord, Ledger, LedgerEvent, LedgerResult, LedgerSnapshot, Timestamp,
};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::NodeConfig;
use crate::error::{NodeError, NodeResult};
use crate::events::{EventPublisher, EventSubscriber};
use crate::metrics::LedgerMetrics;

/// Ledger parameters and aggregates
#[derive(Debug, Clone, Serialize)]
pub struct LedgerStatus {
    pub self_address: Address,
    pub owner: Address,
    #[serde(with = "decimal")]
    pub total_supply: Amount,
    #[serde(with = "decimal")]
    pub faucet_amount: Amount,
    pub faucet_cooldown_secs: u64,
    #[serde(with = "decimal")]
    pub max_transfer_limit: Amount,
    pub account_count: usize,
    pub next_event_sequence: u64,
    pub now: Timestamp,
}

/// One account as seen by clients
#[derive(Debug, Clone, Serialize)]
pub struct AccountView {
    pub address: Address,
    #[serde(with = "decimal")]
    pub balance: Amount,
    pub last_request_time: Timestamp,
    pub next_faucet_time: Timestamp,
}

pub struct LedgerService {
    ledger: Mutex<Ledger>,
    clock: Arc<dyn Clock>,
    publisher: EventPublisher,
    metrics: LedgerMetrics,
    snapshot_path: Option<PathBuf>,
    /// Set by every commit, cleared when a snapshot is taken.
    dirty: AtomicBool,
    persist_lock: Mutex<()>,
}

impl LedgerService {
    pub fn new(ledger: Ledger, clock: Arc<dyn Clock>, event_capacity: usize) -> NodeResult<Self> {
        let metrics = LedgerMetrics::new()?;
        metrics.set_accounts(ledger.account_count());

        Ok(Self {
            ledger: Mutex::new(ledger),
            clock,
            publisher: EventPublisher::new(event_capacity),
            metrics,
            snapshot_path: None,
            dirty: AtomicBool::new(false),
            persist_lock: Mutex::new(()),
        })
    }

    /// Persist to `path` on every `persist` call.
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Restore from the configured snapshot when it exists, otherwise start
    /// a fresh ledger from the configured parameters.
    pub async fn open(config: &NodeConfig, clock: Arc<dyn Clock>) -> NodeResult<Self> {
        let mut ledger = match &config.snapshot_path {
            Some(path) if tokio::fs::try_exists(path).await? => {
                info!("Loading ledger snapshot from {}", path.display());
                load_snapshot(path).await?
            }
            _ => {
                let params = config.ledger_params()?;
                info!(
                    "Creating ledger {} owned by {}",
                    config.ledger_address, params.owner
                );
                Ledger::new(config.ledger_address, params)?
            }
        };

        ledger.set_event_retention(Some(config.event_retention));

        let service = Self::new(ledger, clock, config.event_capacity)?;
        Ok(match &config.snapshot_path {
            Some(path) => service.with_snapshot_path(path.clone()),
            None => service,
        })
    }

    pub async fn transfer(
        &self,
        caller: &Address,
        to: &Address,
        amount: Amount,
    ) -> NodeResult<Vec<EventRecord>> {
        self.apply("transfer", caller, |ledger, _now| {
            ledger.transfer(caller, to, amount)
        })
        .await
    }

    pub async fn faucet(&self, caller: &Address) -> NodeResult<Vec<EventRecord>> {
        self.apply("faucet", caller, |ledger, now| ledger.faucet(caller, now))
            .await
    }

    pub async fn set_faucet_waiting_period(
        &self,
        caller: &Address,
        period: Duration,
    ) -> NodeResult<Vec<EventRecord>> {
        self.apply("set_faucet_waiting_period", caller, |ledger, now| {
            ledger.set_faucet_waiting_period(caller, period, now)
        })
        .await
    }

    pub async fn set_faucet_amount(
        &self,
        caller: &Address,
        amount: Amount,
    ) -> NodeResult<Vec<EventRecord>> {
        self.apply("set_faucet_amount", caller, |ledger, now| {
            ledger.set_faucet_amount(caller, amount, now)
        })
        .await
    }

    pub async fn set_max_transfer_limit(
        &self,
        caller: &Address,
        limit: Amount,
    ) -> NodeResult<Vec<EventRecord>> {
        self.apply("set_max_transfer_limit", caller, |ledger, now| {
            ledger.set_max_transfer_limit(caller, limit, now)
        })
        .await
    }

    pub async fn transfer_ownership(
        &self,
        caller: &Address,
        new_owner: &Address,
    ) -> NodeResult<Vec<EventRecord>> {
        self.apply("transfer_ownership", caller, |ledger, now| {
            ledger.transfer_ownership(caller, new_owner, now)
        })
        .await
    }

    /// Runs one mutation under the lock and fans out the committed records.
    async fn apply<F>(
        &self,
        operation: &'static str,
        caller: &Address,
        op: F,
    ) -> NodeResult<Vec<EventRecord>>
    where
        F: FnOnce(&mut Ledger, Timestamp) -> LedgerResult<Vec<LedgerEvent>>,
    {
        if caller.is_zero() {
            return Err(NodeError::MissingCaller);
        }

        let started = Instant::now();
        let mut ledger = self.ledger.lock().await;
        let now = self.clock.now();
        let first = ledger.next_event_sequence();

        match op(&mut *ledger, now) {
            Ok(_) => {
                let records = ledger.events_since(first).to_vec();
                self.metrics.set_accounts(ledger.account_count());
                self.dirty.store(true, Ordering::SeqCst);
                // Published under the lock so subscribers see commit order.
                for record in &records {
                    self.publisher.publish(record.clone());
                }
                drop(ledger);

                self.metrics
                    .record_operation(operation, started.elapsed(), None);
                debug!("{} by {} committed {} events", operation, caller, records.len());
                Ok(records)
            }
            Err(e) => {
                drop(ledger);
                self.metrics
                    .record_operation(operation, started.elapsed(), Some(e.code()));
                debug!("{} by {} rejected: {}", operation, caller, e);
                Err(e.into())
            }
        }
    }

    pub async fn account(&self, address: &Address) -> AccountView {
        let ledger = self.ledger.lock().await;
        AccountView {
            address: *address,
            balance: ledger.balance(address),
            last_request_time: ledger.last_request_time(address),
            next_faucet_time: ledger.next_faucet_time(address),
        }
    }

    pub async fn status(&self) -> LedgerStatus {
        let ledger = self.ledger.lock().await;
        LedgerStatus {
            self_address: ledger.self_address(),
            owner: ledger.owner(),
            total_supply: ledger.total_supply().clone(),
            faucet_amount: ledger.faucet_amount().clone(),
            faucet_cooldown_secs: ledger.faucet_cooldown().as_secs(),
            max_transfer_limit: ledger.current_transfer_cap().clone(),
            account_count: ledger.account_count(),
            next_event_sequence: ledger.next_event_sequence(),
            now: self.clock.now(),
        }
    }

    /// At most `limit` logged events with `sequence >= since`.
    pub async fn events_since(&self, since: u64, limit: usize) -> Vec<EventRecord> {
        let ledger = self.ledger.lock().await;
        ledger
            .events_since(since)
            .iter()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn subscribe(&self) -> EventSubscriber {
        self.publisher.subscribe()
    }

    /// End open event streams so that connections holding them can finish.
    pub fn close_event_streams(&self) {
        self.publisher.close();
    }

    /// Logged events from `since` plus a subscription that continues right
    /// after them, with no gap and no overlap.
    pub async fn subscribe_from(&self, since: u64) -> (Vec<EventRecord>, EventSubscriber) {
        let ledger = self.ledger.lock().await;
        let subscriber = self.publisher.subscribe();
        (ledger.events_since(since).to_vec(), subscriber)
    }

    pub fn metrics(&self) -> &LedgerMetrics {
        &self.metrics
    }

    pub async fn snapshot(&self) -> LedgerSnapshot {
        self.ledger.lock().await.snapshot()
    }

    /// Writes the snapshot next to its target and renames it into place.
    /// Concurrent calls are serialized.
    ///
    /// Returns `false` when no snapshot path is configured.
    pub async fn persist(&self) -> NodeResult<bool> {
        let Some(path) = &self.snapshot_path else {
            debug!("No snapshot path configured, skipping persist");
            return Ok(false);
        };

        let _guard = self.persist_lock.lock().await;
        let snapshot = {
            let ledger = self.ledger.lock().await;
            self.dirty.store(false, Ordering::SeqCst);
            ledger.snapshot()
        };

        if let Err(e) = write_snapshot(path, &snapshot).await {
            self.dirty.store(true, Ordering::SeqCst);
            return Err(e);
        }

        debug!(
            "Persisted ledger snapshot ({} accounts) to {}",
            snapshot.balances.len(),
            path.display()
        );
        Ok(true)
    }

    /// Persist only if something was committed since the last snapshot.
    pub async fn persist_if_dirty(&self) -> NodeResult<bool> {
        if !self.dirty.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.persist().await
    }

    /// Background task writing a snapshot every `every` while there are
    /// unsaved commits. `None` when persistence is off.
    pub fn spawn_snapshot_task(self: &Arc<Self>, every: Duration) -> Option<JoinHandle<()>> {
        if self.snapshot_path.is_none() || every.is_zero() {
            return None;
        }

        let service = Arc::clone(self);
        info!("Snapshotting every {:?}", every);
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if let Err(e) = service.persist_if_dirty().await {
                    warn!("Periodic snapshot failed: {}", e);
                }
            }
        }))
    }
}

async fn write_snapshot(path: &Path, snapshot: &LedgerSnapshot) -> NodeResult<()> {
    let bytes = serde_json::to_vec_pretty(snapshot)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

async fn load_snapshot(path: &Path) -> NodeResult<Ledger> {
    let bytes = tokio::fs::read(path).await?;
    let snapshot: LedgerSnapshot = serde_json::from_slice(&bytes).map_err(|e| {
        warn!("Unreadable snapshot at {}: {}", path.display(), e);
        NodeError::Storage(format!("unreadable snapshot {}: {}", path.display(), e))
    })?;
    Ok(Ledger::restore(snapshot)?)
}
