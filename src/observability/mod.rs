//! Observability for the pNFS layer.
//!
//! Provides logging initialisation and the metrics recorded by layout and
//! data-server operations.

mod histograms;

pub use histograms::{
    ds_timer, layout_timer, LatencyTimer, DS_OP_DURATION, LATENCY_BUCKETS, LAYOUT_OP_DURATION,
};

use crate::config::ObservabilityConfig;
use crate::error::{FsalError, Result};
use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging.
pub fn init(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| FsalError::Internal(format!("Failed to init logging: {}", e)))?;
    } else {
        subscriber
            .with(fmt::layer())
            .try_init()
            .map_err(|e| FsalError::Internal(format!("Failed to init logging: {}", e)))?;
    }

    info!("Observability initialized");
    Ok(())
}

/// Install the Prometheus recorder and return a handle for rendering.
///
/// Serving the rendered text is left to the embedding server.
pub fn install_metrics_recorder() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .set_buckets(&LATENCY_BUCKETS)
        .map_err(|e| FsalError::Internal(format!("Invalid histogram buckets: {}", e)))?
        .install_recorder()
        .map_err(|e| FsalError::Internal(format!("Failed to install metrics recorder: {}", e)))?;

    register_metrics();
    Ok(handle)
}

fn register_metrics() {
    counter!("pnfs_layout_ops_total").absolute(0);
    counter!("pnfs_ds_reads_total").absolute(0);
    counter!("pnfs_ds_writes_total").absolute(0);
    counter!("pnfs_ds_bytes_read").absolute(0);
    counter!("pnfs_ds_bytes_written").absolute(0);
    counter!("pnfs_ds_io_holes_total").absolute(0);
}

/// Record a metadata-server layout operation and its outcome.
pub fn record_layout_op(op: &'static str, status: &str) {
    counter!(
        "pnfs_layout_ops_total",
        "op" => op,
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a data-server read.
pub fn record_ds_read(bytes: u64) {
    counter!("pnfs_ds_reads_total").increment(1);
    counter!("pnfs_ds_bytes_read").increment(bytes);
}

/// Record a data-server write.
pub fn record_ds_write(bytes: u64, stability: &'static str) {
    counter!("pnfs_ds_writes_total", "stability" => stability).increment(1);
    counter!("pnfs_ds_bytes_written").increment(bytes);
}

/// Record an I/O that landed on a stripe this node does not own.
pub fn record_io_hole() {
    counter!("pnfs_ds_io_holes_total").increment(1);
}
