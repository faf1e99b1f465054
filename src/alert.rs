//! Heavy-traffic alerts derived from a pipeline result.
//!
//! Alerts are a downstream consumer: sinks are best-effort and a failed
//! delivery is logged, never propagated into the run.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::result::PipelineResult;

pub const HEAVY_TRAFFIC_INCIDENT: &str = "heavy_traffic";
pub const DEFAULT_ALERT_THRESHOLD: u32 = 5;

/// Alert payload accepted by the traffic backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub incident: String,
    pub location: String,
    pub count: u32,
}

impl Alert {
    pub fn heavy_traffic(lane_id: &str, count: u32) -> Self {
        Self {
            incident: HEAVY_TRAFFIC_INCIDENT.to_string(),
            location: format!("lane:{}", lane_id),
            count,
        }
    }

    /// The backend rejects payloads without an incident or a location.
    pub fn validate(&self) -> Result<()> {
        if self.incident.trim().is_empty() {
            return Err(anyhow!("alert is missing an incident"));
        }
        if self.location.trim().is_empty() {
            return Err(anyhow!("alert is missing a location"));
        }
        Ok(())
    }
}

/// When to raise heavy-traffic alerts and where to send them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlertPolicy {
    /// Lanes with strictly more vehicles than this raise an alert.
    pub threshold: u32,
    /// HTTP endpoint; alerts are only logged when unset.
    pub url: Option<String>,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_ALERT_THRESHOLD,
            url: None,
        }
    }
}

impl AlertPolicy {
    /// One alert per lane whose total is strictly above the threshold, in
    /// lane order.
    pub fn alerts_for(&self, result: &PipelineResult) -> Vec<Alert> {
        result
            .lanes
            .iter()
            .filter(|lane| lane.total > self.threshold)
            .map(|lane| Alert::heavy_traffic(&lane.lane_id, lane.total))
            .collect()
    }
}

pub trait AlertSink {
    fn name(&self) -> &'static str;

    fn send(&self, alert: &Alert) -> Result<()>;
}

/// Writes alerts to the log.
#[derive(Clone, Debug, Default)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn name(&self) -> &'static str {
        "log"
    }

    fn send(&self, alert: &Alert) -> Result<()> {
        log::warn!(
            "alert {} at {}: {} vehicles",
            alert.incident,
            alert.location,
            alert.count
        );
        Ok(())
    }
}

/// POSTs alerts as JSON.
#[cfg(feature = "alert-http")]
pub struct HttpAlertSink {
    url: url::Url,
    agent: ureq::Agent,
}

#[cfg(feature = "alert-http")]
impl HttpAlertSink {
    pub fn new(url: &str) -> Result<Self> {
        let url = url::Url::parse(url).map_err(|e| anyhow!("invalid alert url {}: {}", url, e))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!(
                "unsupported alert url scheme '{}'; expected http(s)",
                url.scheme()
            ));
        }
        let agent = ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(2))
            .build();
        Ok(Self { url, agent })
    }
}

#[cfg(feature = "alert-http")]
impl AlertSink for HttpAlertSink {
    fn name(&self) -> &'static str {
        "http"
    }

    fn send(&self, alert: &Alert) -> Result<()> {
        self.agent
            .post(self.url.as_str())
            .send_json(alert)
            .map_err(|e| anyhow!("POST {} failed: {}", self.url, e))?;
        Ok(())
    }
}

/// Validate and send every alert; returns how many were delivered.
pub fn dispatch(sink: &dyn AlertSink, alerts: &[Alert]) -> usize {
    let mut delivered = 0;
    for alert in alerts {
        let sent = alert.validate().and_then(|_| sink.send(alert));
        match sent {
            Ok(()) => delivered += 1,
            Err(e) => log::warn!("{} alert sink: {:#}", sink.name(), e),
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use crate::aggregate::{LaneCounts, LaneTally};
    use crate::classify::VehicleClass;
    use crate::result::LaneResult;

    fn lane(id: &str, cars: u32) -> LaneResult {
        let tally = LaneTally {
            counts: [(VehicleClass::Car, cars)].into_iter().collect::<LaneCounts>(),
            accepted: Vec::new(),
        };
        LaneResult::processed(id, tally, 10)
    }

    #[derive(Default)]
    struct Recorder {
        sent: RefCell<Vec<Alert>>,
        fail_on: Option<&'static str>,
    }

    impl AlertSink for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn send(&self, alert: &Alert) -> Result<()> {
            if self.fail_on == Some(alert.location.as_str()) {
                return Err(anyhow!("backend down"));
            }
            self.sent.borrow_mut().push(alert.clone());
            Ok(())
        }
    }

    #[test]
    fn alerts_only_above_threshold() {
        let result = PipelineResult {
            timestamp: 0.0,
            lanes: vec![lane("1", 5), lane("2", 6), lane("3", 0), lane("4", 40)],
        };
        let alerts = AlertPolicy::default().alerts_for(&result);
        assert_eq!(
            alerts,
            vec![Alert::heavy_traffic("2", 6), Alert::heavy_traffic("4", 40)]
        );
        assert_eq!(alerts[0].incident, "heavy_traffic");
        assert_eq!(alerts[0].location, "lane:2");

        let strict = AlertPolicy {
            threshold: 6,
            url: None,
        };
        assert_eq!(strict.alerts_for(&result), vec![Alert::heavy_traffic("4", 40)]);
    }

    #[test]
    fn dispatch_continues_after_failure() {
        let sink = Recorder {
            fail_on: Some("lane:a"),
            ..Recorder::default()
        };
        let alerts = vec![
            Alert::heavy_traffic("a", 9),
            Alert {
                incident: String::new(),
                location: "lane:b".to_string(),
                count: 9,
            },
            Alert::heavy_traffic("c", 7),
        ];
        assert_eq!(dispatch(&sink, &alerts), 1);
        assert_eq!(sink.sent.borrow().as_slice(), &[Alert::heavy_traffic("c", 7)]);
        assert_eq!(dispatch(&LogAlertSink, &alerts[2..]), 1);
    }

    #[test]
    fn payload_shape() {
        let v = serde_json::to_value(Alert::heavy_traffic("north", 12)).unwrap();
        assert_eq!(
            v,
            serde_json::json!({"incident": "heavy_traffic", "location": "lane:north", "count": 12})
        );
    }

    #[cfg(feature = "alert-http")]
    #[test]
    fn http_sink_rejects_bad_urls() {
        assert!(HttpAlertSink::new("not a url").is_err());
        assert!(HttpAlertSink::new("ftp://example.com/alerts").is_err());
        assert!(HttpAlertSink::new("http://127.0.0.1:3000/alerts").is_ok());
    }
}
