//! Sampled Google Analytics reporting
//!
//! An [`AnalyticsQueue`] forwards the first `send_count` hits of every cycle
//! and drops the rest; once more than `reset_count` hits were seen the cycle
//! starts over. Delivery is best effort: HTTP failures are logged, never
//! returned.

mod payload;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use stuffkit_core::config::{env_opt, env_parse_or};

pub use payload::{Analytics, Ga4Data, MpEvent, MpEventParams, MpPayload};

pub const COLLECT_URL: &str = "https://www.google-analytics.com/collect";
pub const GA4_COLLECT_URL: &str = "https://www.google-analytics.com/mp/collect";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);
const MAX_IDLE_PER_HOST: usize = 100;
const TCP_KEEPALIVE: Duration = Duration::from_secs(600);

/// Sampling thresholds and property identifiers
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Hits forwarded per cycle
    pub send_count: u64,
    /// Hits seen before the cycle restarts
    pub reset_count: u64,
    /// Universal Analytics property (`UA-...`)
    pub tracking_id: String,
    pub api_secret: String,
    /// GA4 data stream (`G-...`)
    pub measurement_id: String,
}

impl QueueConfig {
    /// Read `GA_SEND_COUNT`, `GA_RESET_COUNT`, `GA_TRACKING_ID`,
    /// `GA_API_SECRET` and `GA_MEASUREMENT_ID`.
    pub fn from_env() -> Self {
        Self {
            send_count: env_parse_or("GA_SEND_COUNT", 0),
            reset_count: env_parse_or("GA_RESET_COUNT", 0),
            tracking_id: env_opt("GA_TRACKING_ID").unwrap_or_default(),
            api_secret: env_opt("GA_API_SECRET").unwrap_or_default(),
            measurement_id: env_opt("GA_MEASUREMENT_ID").unwrap_or_default(),
        }
    }
}

/// Outcome of the sampling counter for one hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleDecision {
    Send,
    Skip,
    /// Skipped, and the counter went back to zero
    Reset,
}

pub struct AnalyticsQueue {
    config: QueueConfig,
    counter: AtomicU64,
    http_client: reqwest::Client,
    collect_url: String,
    ga4_url: String,
}

impl AnalyticsQueue {
    pub fn new(config: QueueConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .tcp_keepalive(TCP_KEEPALIVE)
            .build()
            .context("Failed to create HTTP client for analytics")?;

        Ok(Self {
            config,
            counter: AtomicU64::new(0),
            http_client,
            collect_url: COLLECT_URL.to_string(),
            ga4_url: GA4_COLLECT_URL.to_string(),
        })
    }

    /// Send hits to other collect endpoints, e.g. a proxy or a test server.
    pub fn with_endpoints(mut self, collect_url: &str, ga4_url: &str) -> Self {
        self.collect_url = collect_url.to_string();
        self.ga4_url = ga4_url.to_string();
        self
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Hits counted in the current cycle
    pub fn current_count(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    fn sample(&self) -> SampleDecision {
        let seen = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        if seen <= self.config.send_count {
            SampleDecision::Send
        } else if seen > self.config.reset_count {
            self.counter.store(0, Ordering::SeqCst);
            SampleDecision::Reset
        } else {
            SampleDecision::Skip
        }
    }

    /// Report a pageview to the Universal Analytics collect endpoint.
    pub async fn push(&self, data: &Analytics) -> SampleDecision {
        let decision = self.sample();
        if decision != SampleDecision::Send {
            return decision;
        }

        let result = self
            .http_client
            .get(&self.collect_url)
            .query(&data.query_pairs(&self.config.tracking_id))
            .send()
            .await
            .and_then(|r| r.error_for_status());
        if let Err(e) = result {
            tracing::debug!(error = %e, client_id = %data.client_id, "Analytics hit not delivered");
        }
        decision
    }

    /// Report visit data through the GA4 Measurement Protocol.
    pub async fn push_ga4(&self, data: &Ga4Data) -> SampleDecision {
        let decision = self.sample();
        if decision != SampleDecision::Send {
            return decision;
        }

        let payload = data.to_payload();
        tracing::debug!(client_id = %payload.client_id, events = payload.events.len(), "Sending GA4 events");

        let result = self
            .http_client
            .post(&self.ga4_url)
            .query(&[
                ("api_secret", self.config.api_secret.as_str()),
                ("measurement_id", self.config.measurement_id.as_str()),
            ])
            .json(&payload)
            .send()
            .await
            .and_then(|r| r.error_for_status());
        if let Err(e) = result {
            tracing::debug!(error = %e, client_id = %data.client_id, "GA4 events not delivered");
        }
        decision
    }
}
