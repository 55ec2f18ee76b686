use serde::Deserialize;
use stuffkit_core::config::{env_bool, env_opt, env_or};

pub(crate) const DEFAULT_LOG_FILTER: &str = "info,stuffkit=debug";
const DEFAULT_ENVIRONMENT: &str = "production";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Export spans over OTLP; needs `endpoint`
    pub enabled: bool,
    /// OTLP/gRPC collector, e.g. `http://localhost:4317`
    pub endpoint: Option<String>,
    pub service_name: String,
    pub service_version: String,
    pub environment: String,
    /// Emit log lines as JSON instead of text
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            service_name: "stuffkit".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: DEFAULT_ENVIRONMENT.to_string(),
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Read `OTEL_ENABLED`, `OTEL_EXPORTER_OTLP_ENDPOINT`, `OTEL_SERVICE_NAME`,
    /// `OTEL_SERVICE_VERSION`, `DEPLOYMENT_ENVIRONMENT` and `LOG_FORMAT`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let endpoint = env_opt("OTEL_EXPORTER_OTLP_ENDPOINT");
        Self {
            enabled: env_bool("OTEL_ENABLED", endpoint.is_some()),
            endpoint,
            service_name: env_or("OTEL_SERVICE_NAME", &defaults.service_name),
            service_version: env_or("OTEL_SERVICE_VERSION", &defaults.service_version),
            environment: env_or("DEPLOYMENT_ENVIRONMENT", DEFAULT_ENVIRONMENT),
            json_logs: env_or("LOG_FORMAT", "text").eq_ignore_ascii_case("json"),
        }
    }

    /// True when spans should be exported
    pub fn exports_traces(&self) -> bool {
        self.enabled && self.endpoint.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TelemetryConfig::default();
        assert!(!config.exports_traces());
        assert_eq!(config.environment, "production");
        assert_eq!(config.service_name, "stuffkit");
    }

    #[test]
    fn test_enabled_needs_endpoint() {
        let config = TelemetryConfig {
            enabled: true,
            ..Default::default()
        };
        assert!(!config.exports_traces());

        let config = TelemetryConfig {
            enabled: true,
            endpoint: Some("http://collector:4317".to_string()),
            ..Default::default()
        };
        assert!(config.exports_traces());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: TelemetryConfig =
            serde_json::from_str(r#"{"service_name":"clicks","json_logs":true}"#).unwrap();
        assert_eq!(config.service_name, "clicks");
        assert!(config.json_logs);
        assert_eq!(config.environment, "production");
    }
}
