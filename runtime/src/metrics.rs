//! Prometheus metrics for the order-number generator.
//!
//! Every transition into degraded mode is counted, so operators can alert on
//! sustained non-atomic or emergency numbering:
//!
//! - `order_sequence_issued_total{mode}`: numbers issued, by numbering mode
//! - `order_sequence_transaction_conflicts_total`: transactions that lost a race
//! - `order_sequence_fallback_total{reason}`: switches to the non-atomic path
//! - `order_sequence_emergency_total`: emergency identifiers issued
//! - `order_sequence_corrupt_records_total`: corrupt counts recovered as zero
//! - `order_sequence_transaction_duration_seconds`: transactional attempt latency
//!
//! # Example
//!
//! ```rust,no_run
//! use order_sequence_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! println!("{}", server.render().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use order_sequence_core::counter_store::CounterStoreError;
use order_sequence_core::order_number::NumberingMode;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Numbers issued, labelled by `mode`.
pub const ISSUED_TOTAL: &str = "order_sequence_issued_total";
/// Transactions aborted by contention.
pub const TRANSACTION_CONFLICTS_TOTAL: &str = "order_sequence_transaction_conflicts_total";
/// Switches to the non-atomic fallback, labelled by `reason`.
pub const FALLBACK_TOTAL: &str = "order_sequence_fallback_total";
/// Emergency identifiers issued.
pub const EMERGENCY_TOTAL: &str = "order_sequence_emergency_total";
/// Corrupt counts recovered as zero.
pub const CORRUPT_RECORDS_TOTAL: &str = "order_sequence_corrupt_records_total";
/// Latency of one transactional attempt.
pub const TRANSACTION_DURATION_SECONDS: &str = "order_sequence_transaction_duration_seconds";

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics exporter.
///
/// Installs the global recorder and renders the scrape payload.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Socket address the scrape endpoint is advertised on
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a metrics recorder is already installed (e.g., in tests), the call
    /// succeeds without a handle and [`MetricsServer::render`] returns `None`.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                register_metrics();
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this server did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(ISSUED_TOTAL, "Total number of order numbers issued, by numbering mode");
    describe_counter!(
        TRANSACTION_CONFLICTS_TOTAL,
        "Total number of counter transactions aborted by contention"
    );
    describe_counter!(
        FALLBACK_TOTAL,
        "Total number of switches to the non-atomic fallback increment"
    );
    describe_counter!(EMERGENCY_TOTAL, "Total number of emergency order identifiers issued");
    describe_counter!(
        CORRUPT_RECORDS_TOTAL,
        "Total number of corrupt counter records recovered as zero"
    );
    describe_histogram!(
        TRANSACTION_DURATION_SECONDS,
        "Time taken by one transactional increment attempt"
    );
}

/// Sequence generator metrics recorder.
pub struct SequenceMetrics;

impl SequenceMetrics {
    /// Record an issued number.
    pub fn record_issued(mode: NumberingMode) {
        counter!(ISSUED_TOTAL, "mode" => mode.as_str()).increment(1);
    }

    /// Record one transactional attempt and its outcome.
    pub fn record_transaction(duration: Duration, outcome: Result<(), &CounterStoreError>) {
        histogram!(TRANSACTION_DURATION_SECONDS).record(duration.as_secs_f64());
        if outcome.is_err_and(CounterStoreError::is_contention) {
            counter!(TRANSACTION_CONFLICTS_TOTAL).increment(1);
        }
    }

    /// Record a switch to the non-atomic path.
    pub fn record_fallback(reason: &CounterStoreError) {
        counter!(FALLBACK_TOTAL, "reason" => reason.kind()).increment(1);
    }

    /// Record an emergency identifier.
    pub fn record_emergency() {
        counter!(EMERGENCY_TOTAL).increment(1);
    }

    /// Record a corrupt record recovered as zero.
    pub fn record_corrupt_record() {
        counter!(CORRUPT_RECORDS_TOTAL).increment(1);
    }
}
