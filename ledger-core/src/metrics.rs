//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `ledger_accounts_created_total` - Total accounts created
//! - `ledger_transactions_total` - Total committed transactions
//! - `ledger_commit_duration_seconds` - Histogram of unit-of-work latencies

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};
use std::sync::Arc;

/// Metrics collector
///
/// Each ledger instance carries its own registry so tests can open many
/// ledgers in one process.
#[derive(Clone)]
pub struct Metrics {
    /// Total accounts created
    pub accounts_created: IntCounter,

    /// Total committed transactions
    pub transactions_total: IntCounter,

    /// Unit-of-work commit latency
    pub commit_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let accounts_created = IntCounter::new(
            "ledger_accounts_created_total",
            "Total accounts created",
        )?;
        registry.register(Box::new(accounts_created.clone()))?;

        let transactions_total = IntCounter::new(
            "ledger_transactions_total",
            "Total committed transactions",
        )?;
        registry.register(Box::new(transactions_total.clone()))?;

        let commit_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_commit_duration_seconds",
                "Histogram of unit-of-work commit latencies",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0,
            ]),
        )?;
        registry.register(Box::new(commit_duration.clone()))?;

        Ok(Self {
            accounts_created,
            transactions_total,
            commit_duration,
            registry,
        })
    }

    /// Gather current metric families (for an exporter endpoint)
    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }
}
