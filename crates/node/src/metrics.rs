use prometheus::{
    histogram_opts, opts, Encoder, Gauge, Histogram, IntCounter, IntCounterVec, Registry,
    TextEncoder,
};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{NodeError, NodeResult};

/// Prometheus metrics for the hosted ledger
#[derive(Debug)]
pub struct LedgerMetrics {
    registry: Registry,

    pub operations_total: IntCounterVec,
    pub operations_rejected_total: IntCounterVec,
    pub faucet_draws_total: IntCounter,
    pub transfers_total: IntCounter,
    pub accounts: Gauge,
    pub operation_duration: Histogram,
}

impl LedgerMetrics {
    pub fn new() -> NodeResult<Self> {
        Self::build().map_err(|e| NodeError::Internal(format!("metrics: {}", e)))
    }

    fn build() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let operations_total = IntCounterVec::new(
            opts!("tally_operations_total", "Ledger operations attempted"),
            &["operation"],
        )?;

        let operations_rejected_total = IntCounterVec::new(
            opts!(
                "tally_operations_rejected_total",
                "Ledger operations rejected, by error code"
            ),
            &["operation", "code"],
        )?;

        let faucet_draws_total = IntCounter::with_opts(opts!(
            "tally_faucet_draws_total",
            "Successful faucet draws"
        ))?;

        let transfers_total = IntCounter::with_opts(opts!(
            "tally_transfers_total",
            "Successful account-to-account transfers"
        ))?;

        let accounts = Gauge::with_opts(opts!(
            "tally_accounts",
            "Accounts known to the ledger"
        ))?;

        let operation_duration = Histogram::with_opts(histogram_opts!(
            "tally_operation_duration_seconds",
            "Time spent inside ledger operations"
        ))?;

        registry.register(Box::new(operations_total.clone()))?;
        registry.register(Box::new(operations_rejected_total.clone()))?;
        registry.register(Box::new(faucet_draws_total.clone()))?;
        registry.register(Box::new(transfers_total.clone()))?;
        registry.register(Box::new(accounts.clone()))?;
        registry.register(Box::new(operation_duration.clone()))?;

        info!("Metrics system initialized");
        Ok(Self {
            registry,
            operations_total,
            operations_rejected_total,
            faucet_draws_total,
            transfers_total,
            accounts,
            operation_duration,
        })
    }

    /// Record one ledger call. `rejected` carries the error code on failure.
    pub fn record_operation(&self, operation: &str, elapsed: Duration, rejected: Option<&str>) {
        self.operations_total.with_label_values(&[operation]).inc();
        self.operation_duration.observe(elapsed.as_secs_f64());

        match rejected {
            Some(code) => {
                self.operations_rejected_total
                    .with_label_values(&[operation, code])
                    .inc();
            }
            None => match operation {
                "faucet" => self.faucet_draws_total.inc(),
                "transfer" => self.transfers_total.inc(),
                _ => {}
            },
        }
        debug!("Recorded {} in {:?} (rejected: {:?})", operation, elapsed, rejected);
    }

    pub fn set_accounts(&self, count: usize) {
        self.accounts.set(count as f64);
    }

    /// Text exposition format
    pub fn gather(&self) -> NodeResult<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| NodeError::Internal(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| NodeError::Internal(e.to_string()))
    }
}
