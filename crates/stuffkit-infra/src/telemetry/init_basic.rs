use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::config::DEFAULT_LOG_FILTER;
use super::TelemetryConfig;

/// Initialize tracing without OpenTelemetry
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    let json = config.json_logs.then(|| tracing_subscriber::fmt::layer().json());
    let text = (!config.json_logs).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()))
        .with(json)
        .with(text)
        .try_init()?;

    tracing::info!(
        service = %config.service_name,
        "OpenTelemetry feature not enabled, using standard tracing"
    );
    Ok(())
}

pub async fn shutdown_telemetry() {
    tracing::debug!("Telemetry shutdown (OpenTelemetry feature not enabled)");
}
