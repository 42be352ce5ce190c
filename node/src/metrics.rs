//! # Prometheus Metrics
//!
//! Operational metrics for the execution host. The registry is rendered in
//! the Prometheus text exposition format at the end of `exec --metrics`.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] under
//! the `vault` namespace so they do not collide with any default global
//! registry consumers.

use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use vault_protocol::amount::{Wei, WEI_PER_UNIT};

/// Holds all Prometheus metric handles for the host.
#[derive(Clone)]
pub struct LedgerMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Calls executed, labelled by operation and outcome.
    pub calls_total: IntCounterVec,
    /// Events appended to the persistent log.
    pub events_persisted_total: IntCounter,
    /// Value held in custody by the vault, in whole units.
    pub contract_held_units: Gauge,
    /// Number of distinct principals that ever deposited.
    pub depositors: IntGauge,
    /// Histogram of per-call execution latency in seconds, persistence included.
    pub call_latency_seconds: Histogram,
}

impl LedgerMetrics {
    /// Creates and registers all metrics. Call once per process.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("vault".into()), None)?;

        let calls_total = IntCounterVec::new(
            Opts::new("calls_total", "Total number of executed calls"),
            &["op", "outcome"],
        )?;
        registry.register(Box::new(calls_total.clone()))?;

        let events_persisted_total = IntCounter::new(
            "events_persisted_total",
            "Total number of events appended to the ledger log",
        )?;
        registry.register(Box::new(events_persisted_total.clone()))?;

        let contract_held_units = Gauge::new(
            "contract_held_units",
            "Value held in custody by the vault, in whole units",
        )?;
        registry.register(Box::new(contract_held_units.clone()))?;

        let depositors = IntGauge::new("depositors", "Number of distinct depositors")?;
        registry.register(Box::new(depositors.clone()))?;

        let call_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "call_latency_seconds",
                "Per-call execution latency in seconds, persistence included",
            )
            .buckets(vec![
                0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1,
            ]),
        )?;
        registry.register(Box::new(call_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            calls_total,
            events_persisted_total,
            contract_held_units,
            depositors,
            call_latency_seconds,
        })
    }

    /// Records one executed call.
    pub fn observe_call(&self, op: &str, outcome: &str, seconds: f64) {
        self.calls_total.with_label_values(&[op, outcome]).inc();
        self.call_latency_seconds.observe(seconds);
    }

    /// Refreshes the vault gauges from the current ledger.
    pub fn set_ledger(&self, held: Wei, depositors: usize) {
        // Precision loss is acceptable for a gauge.
        self.contract_held_units
            .set(held as f64 / WEI_PER_UNIT as f64);
        self.depositors
            .set(i64::try_from(depositors).unwrap_or(i64::MAX));
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_namespaced_metrics() {
        let metrics = LedgerMetrics::new().unwrap();
        metrics.observe_call("deposit", "success", 0.000_2);
        metrics.observe_call("withdraw", "reverted", 0.000_1);
        metrics.set_ledger(3 * WEI_PER_UNIT / 2, 2);

        let text = metrics.encode().unwrap();
        assert!(text.contains(r#"vault_calls_total{op="deposit",outcome="success"} 1"#));
        assert!(text.contains(r#"vault_calls_total{op="withdraw",outcome="reverted"} 1"#));
        assert!(text.contains("vault_contract_held_units 1.5"));
        assert!(text.contains("vault_depositors 2"));
        assert!(text.contains("vault_call_latency_seconds_count 2"));
    }
}
