//! Telemetry initialization
//!
//! [`init_telemetry`] installs the global `tracing` subscriber. With the
//! `observability-opentelemetry` feature and an OTLP endpoint configured, spans
//! are also exported through an OpenTelemetry tracer (see [`init_tracer`]).

mod config;

#[cfg(feature = "observability-opentelemetry")]
mod init_opentelemetry;

#[cfg(not(feature = "observability-opentelemetry"))]
mod init_basic;

#[cfg(feature = "observability-opentelemetry")]
mod tracer;

pub use config::TelemetryConfig;

#[cfg(feature = "observability-opentelemetry")]
pub use init_opentelemetry::{init_telemetry, shutdown_telemetry};

#[cfg(not(feature = "observability-opentelemetry"))]
pub use init_basic::{init_telemetry, shutdown_telemetry};

#[cfg(feature = "observability-opentelemetry")]
pub use tracer::{init_tracer, TracerGuard};
