//! Metrics recorder initialization.

use std::net::SocketAddr;

use {anyhow::Result, tracing::info};

#[derive(Debug, Clone, Default)]
pub struct MetricsRecorderConfig {
    /// Prometheus scrape endpoint. `None` leaves metrics disabled and every
    /// facade call a no-op.
    pub listen: Option<SocketAddr>,
}

/// Install the global metrics recorder and its scrape endpoint.
///
/// Returns `true` when an exporter was installed. Must be called from inside
/// a Tokio runtime: the exporter's HTTP server is spawned onto it.
pub fn init_metrics(config: MetricsRecorderConfig) -> Result<bool> {
    let Some(listen) = config.listen else {
        info!("metrics collection is disabled");
        return Ok(false);
    };

    #[cfg(feature = "prometheus")]
    {
        init_prometheus(listen)?;
        info!(%listen, "prometheus metrics exporter initialized");
        Ok(true)
    }

    #[cfg(not(feature = "prometheus"))]
    {
        info!(%listen, "metrics requested but the prometheus feature is not compiled in");
        Ok(false)
    }
}

#[cfg(feature = "prometheus")]
fn init_prometheus(listen: SocketAddr) -> Result<()> {
    use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

    let (recorder, exporter) = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(crate::jobs::DURATION_SECONDS.to_string()),
            &crate::buckets::JOB_DURATION,
        )?
        .with_http_listener(listen)
        .build()?;
    metrics::set_global_recorder(recorder)
        .map_err(|_| anyhow::anyhow!("a global metrics recorder is already installed"))?;
    tokio::spawn(async move {
        if let Err(e) = exporter.await {
            tracing::warn!(error = ?e, "prometheus exporter stopped");
        }
    });
    Ok(())
}
