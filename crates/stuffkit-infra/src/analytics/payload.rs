//! Hit payloads for the Universal Analytics collect endpoint and the GA4
//! Measurement Protocol

use serde::{Deserialize, Serialize};

const PROTOCOL_VERSION: &str = "1";
const HIT_TYPE: &str = "pageview";
const ENGAGEMENT_TIME_MSEC: u32 = 10;

/// A Universal Analytics pageview
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Analytics {
    pub client_id: String,
    pub data_source: String,
    pub user_ip: String,
    pub user_agent: String,
    pub document_referer: String,
    pub campaign_name: String,
    pub campaign_source: String,
    pub campaign_medium: String,
    pub campaign_keyword: String,
    pub campaign_id: String,
    pub document_host: String,
    pub document_path: String,
    pub document_title: String,
}

impl Analytics {
    /// Query parameters of the collect request. Empty values are sent as-is.
    pub(crate) fn query_pairs<'a>(&'a self, tracking_id: &'a str) -> Vec<(&'static str, &'a str)> {
        vec![
            ("v", PROTOCOL_VERSION),
            ("tid", tracking_id),
            ("cid", &self.client_id),
            ("uip", &self.user_ip),
            ("ua", &self.user_agent),
            ("dr", &self.document_referer),
            ("ds", &self.data_source),
            ("ci", &self.campaign_id),
            ("cn", &self.campaign_name),
            ("cs", &self.campaign_source),
            ("cm", &self.campaign_medium),
            ("ck", &self.campaign_keyword),
            ("t", HIT_TYPE),
            ("dh", &self.document_host),
            ("dp", &self.document_path),
            ("dt", &self.document_title),
        ]
    }
}

/// Visit data reported to a GA4 property
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ga4Data {
    pub client_id: String,
    pub user_id: String,
    pub org_name: String,
    pub tracking_domain: String,
    pub hostname: String,
    pub keyword: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MpEventParams {
    pub engagement_time_msec: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub page_title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub page_location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MpEvent {
    pub name: String,
    pub params: MpEventParams,
}

/// Measurement Protocol request body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MpPayload {
    pub client_id: String,
    pub user_id: String,
    pub events: Vec<MpEvent>,
}

impl Ga4Data {
    /// Events: a page view titled with the hostname, a second one titled with
    /// the tracking domain, then one event each named after the organisation
    /// and the keyword. Empty fields skip their event.
    pub fn to_payload(&self) -> MpPayload {
        let page_view = |title: &str| MpEvent {
            name: "page_view".to_string(),
            params: MpEventParams {
                engagement_time_msec: ENGAGEMENT_TIME_MSEC,
                page_title: title.to_string(),
                page_location: self.location.clone(),
            },
        };
        let named = |name: &str| MpEvent {
            name: name.to_string(),
            params: MpEventParams {
                engagement_time_msec: ENGAGEMENT_TIME_MSEC,
                page_title: String::new(),
                page_location: String::new(),
            },
        };

        let mut events = vec![page_view(&self.hostname)];
        if !self.tracking_domain.is_empty() {
            events.push(page_view(&self.tracking_domain));
        }
        if !self.org_name.is_empty() {
            events.push(named(&self.org_name));
        }
        if !self.keyword.is_empty() {
            events.push(named(&self.keyword));
        }

        MpPayload {
            client_id: self.client_id.clone(),
            user_id: self.user_id.clone(),
            events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_with_all_fields() {
        let data = Ga4Data {
            client_id: "c1".to_string(),
            user_id: "u1".to_string(),
            org_name: "acme".to_string(),
            tracking_domain: "track.acme.io".to_string(),
            hostname: "acme.io".to_string(),
            keyword: "shoes".to_string(),
            location: "https://acme.io/landing".to_string(),
        };

        let value = serde_json::to_value(data.to_payload()).unwrap();
        assert_eq!(
            value,
            json!({
                "client_id": "c1",
                "user_id": "u1",
                "events": [
                    {"name": "page_view", "params": {"engagement_time_msec": 10, "page_title": "acme.io", "page_location": "https://acme.io/landing"}},
                    {"name": "page_view", "params": {"engagement_time_msec": 10, "page_title": "track.acme.io", "page_location": "https://acme.io/landing"}},
                    {"name": "acme", "params": {"engagement_time_msec": 10}},
                    {"name": "shoes", "params": {"engagement_time_msec": 10}},
                ]
            })
        );
    }

    #[test]
    fn test_payload_minimal_has_single_page_view() {
        let payload = Ga4Data {
            client_id: "c2".to_string(),
            ..Default::default()
        }
        .to_payload();

        assert_eq!(payload.events.len(), 1);
        let value = serde_json::to_value(&payload.events[0]).unwrap();
        assert_eq!(value, json!({"name": "page_view", "params": {"engagement_time_msec": 10}}));
    }

    #[test]
    fn test_collect_query_order_and_constants() {
        let hit = Analytics {
            client_id: "555".to_string(),
            document_path: "/offer".to_string(),
            ..Default::default()
        };
        let pairs = hit.query_pairs("UA-1-1");
        assert_eq!(pairs.len(), 16);
        assert_eq!(pairs[0], ("v", "1"));
        assert_eq!(pairs[1], ("tid", "UA-1-1"));
        assert_eq!(pairs[2], ("cid", "555"));
        assert!(pairs.contains(&("t", "pageview")));
        assert!(pairs.contains(&("dp", "/offer")));
        assert!(pairs.contains(&("dr", "")));
    }
}
