use anyhow::Result;
use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::{BaggagePropagator, TraceContextPropagator};
use opentelemetry_sdk::{runtime, trace as sdktrace, Resource};
use opentelemetry_semantic_conventions::resource::{SERVICE_NAME, SERVICE_VERSION};
use stuffkit_core::config::{env_opt, env_or};

/// Handle to the installed tracer provider
pub struct TracerGuard {
    provider: sdktrace::TracerProvider,
}

impl TracerGuard {
    pub fn tracer(&self, name: &'static str) -> sdktrace::Tracer {
        self.provider.tracer(name)
    }

    pub fn provider(&self) -> &sdktrace::TracerProvider {
        &self.provider
    }

    /// Flush buffered spans and stop the exporter.
    pub fn shutdown(self) -> Result<()> {
        self.provider
            .shutdown()
            .map_err(|e| anyhow::anyhow!("Failed to shut down tracer provider: {}", e))
    }
}

/// Install a global OTLP/gRPC tracer provider for `service_name`.
///
/// The collector comes from `OTEL_EXPORTER_OTLP_ENDPOINT`;
/// `DEPLOYMENT_ENVIRONMENT` overrides the `production` environment.
pub fn init_tracer(service_name: &str) -> Result<TracerGuard> {
    let endpoint = env_opt("OTEL_EXPORTER_OTLP_ENDPOINT");
    let environment = env_or("DEPLOYMENT_ENVIRONMENT", "production");
    let provider = build_provider(
        service_name,
        env!("CARGO_PKG_VERSION"),
        &environment,
        endpoint.as_deref(),
    )?;
    install(&provider);

    tracing::info!(
        service = %service_name,
        environment = %environment,
        endpoint = endpoint.as_deref().unwrap_or("default"),
        "Tracer initialized"
    );
    Ok(TracerGuard { provider })
}

/// Register `provider` globally with TraceContext and Baggage propagation.
pub(crate) fn install(provider: &sdktrace::TracerProvider) {
    global::set_tracer_provider(provider.clone());
    global::set_text_map_propagator(TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ]));
}

/// Batch-exporting provider; spans go to `endpoint`, or to the exporter's
/// default collector when `None`.
pub(crate) fn build_provider(
    service_name: &str,
    service_version: &str,
    environment: &str,
    endpoint: Option<&str>,
) -> Result<sdktrace::TracerProvider> {
    let mut builder = opentelemetry_otlp::SpanExporter::builder().with_tonic();
    if let Some(endpoint) = endpoint {
        builder = builder.with_endpoint(endpoint);
    }
    let exporter = builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build gRPC span exporter: {}", e))?;

    let resource = Resource::default().merge(&Resource::new(resource_attributes(
        service_name,
        service_version,
        environment,
    )));

    Ok(sdktrace::TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(resource)
        .build())
}

/// Service, deployment, host, process and OS attributes.
/// `OTEL_SERVICE_INSTANCE_ID` names the instance, otherwise a random id is used.
pub(crate) fn resource_attributes(
    service_name: &str,
    service_version: &str,
    environment: &str,
) -> Vec<KeyValue> {
    let host_name = hostname::get()
        .ok()
        .and_then(|h| h.to_str().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown".to_string());
    let instance_id =
        env_opt("OTEL_SERVICE_INSTANCE_ID").unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    vec![
        KeyValue::new(SERVICE_NAME, service_name.to_string()),
        KeyValue::new(SERVICE_VERSION, service_version.to_string()),
        KeyValue::new("deployment.environment", environment.to_string()),
        KeyValue::new("host.name", host_name),
        KeyValue::new("service.instance.id", instance_id),
        KeyValue::new("process.pid", i64::from(std::process::id())),
        KeyValue::new("os.type", std::env::consts::OS),
    ]
}
