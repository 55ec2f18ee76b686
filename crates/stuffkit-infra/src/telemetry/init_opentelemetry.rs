use opentelemetry::trace::TracerProvider as _;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::config::DEFAULT_LOG_FILTER;
use super::tracer::{build_provider, install};
use super::TelemetryConfig;

/// Initialize tracing, exporting spans over OTLP when configured
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    let json = config.json_logs.then(|| tracing_subscriber::fmt::layer().json());
    let text = (!config.json_logs).then(tracing_subscriber::fmt::layer);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    let endpoint = match (&config.endpoint, config.enabled) {
        (Some(endpoint), true) => endpoint,
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(json)
                .with(text)
                .try_init()?;
            tracing::info!("OpenTelemetry disabled, using standard tracing");
            return Ok(());
        }
    };

    let provider = build_provider(
        &config.service_name,
        &config.service_version,
        &config.environment,
        Some(endpoint.as_str()),
    )?;
    let tracer = provider.tracer(config.service_name.clone());
    install(&provider);

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .try_init()?;

    tracing::info!(
        endpoint = %endpoint,
        service = %config.service_name,
        environment = %config.environment,
        "OpenTelemetry initialized successfully"
    );
    Ok(())
}

pub async fn shutdown_telemetry() {
    tracing::info!("Shutting down OpenTelemetry...");
    opentelemetry::global::shutdown_tracer_provider();
    tracing::info!("OpenTelemetry shutdown complete");
}
