//! Stuffkit Infrastructure Library
//!
//! This crate provides the thin vendor clients shared by stuffkit services:
//! - Sampled Google Analytics reporting (Universal Analytics and GA4)
//! - Transactional email through Mailgun and Mailjet
//! - Google Cloud Pub/Sub publishing and pull subscriptions
//! - IP2Proxy BIN database lookups
//! - Telemetry initialization (tracing subscriber and OTLP tracer)

#[cfg(feature = "analytics")]
pub mod analytics;

#[cfg(feature = "mail")]
pub mod mail;

#[cfg(feature = "messaging")]
pub mod messaging;

#[cfg(feature = "proxydb")]
pub mod proxydb;

#[cfg(feature = "observability-basic")]
pub mod telemetry;

// Re-export commonly used types
#[cfg(feature = "analytics")]
pub use analytics::{Analytics, AnalyticsQueue, Ga4Data, QueueConfig, SampleDecision};

#[cfg(feature = "mail")]
pub use mail::{send_via_mailgun, send_via_mailjet, MailError};

#[cfg(feature = "messaging")]
pub use messaging::{AckReply, MessagingError, Opts, Publisher, Subscription};

#[cfg(feature = "proxydb")]
pub use proxydb::{ProxyData, ProxyDbClient, ProxyDbError};

#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};
