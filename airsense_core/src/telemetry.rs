//! Telemetry payload and delivery.
//!
//! Two transport shapes are supported: a persistent session (MQTT) that is
//! reconnected transparently after any fault, and a one-shot request (HTTP
//! webhook) whose status code decides success. Delivery problems are
//! returned as `PublishResult` values and never escape as errors.

use std::collections::BTreeMap;

use airsense_traits::{PublishChannel, RequestSink};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::AirError;
use crate::hw_error::map_transport_error;
use crate::reading::Reading;
use crate::util::round_to;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorRaw {
    pub adc: u16,
    pub rs_ohm: f64,
}

/// Wire format of one reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payload {
    pub timestamp: DateTime<Utc>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub gases: BTreeMap<String, f64>,
    pub sensor_raw: SensorRaw,
    pub aqi_status: &'static str,
}

impl Payload {
    pub fn from_reading(reading: &Reading, precision: u32) -> Self {
        Self {
            timestamp: reading.timestamp,
            temperature: reading.temperature_c.map(|t| round_to(t, 1)),
            humidity: reading.humidity_pct.map(|h| round_to(h, 1)),
            gases: reading
                .concentrations
                .iter()
                .map(|g| (g.key.clone(), round_to(g.ppm, precision)))
                .collect(),
            sensor_raw: SensorRaw {
                adc: reading.adc,
                rs_ohm: round_to(reading.resistance, precision),
            },
            aqi_status: reading.status.label(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PublishResult {
    Success,
    /// Transport fault (connection refused, broker gone, timeout).
    NetworkError(AirError),
    /// Request delivered but answered with a non-2xx status.
    ServerError(u16),
}

pub enum Transport {
    Session {
        channel: Box<dyn PublishChannel>,
        topic: String,
    },
    Request {
        sink: Box<dyn RequestSink>,
        url: String,
    },
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Session { topic, .. } => f.debug_struct("Session").field("topic", topic).finish(),
            Self::Request { url, .. } => f.debug_struct("Request").field("url", url).finish(),
        }
    }
}

#[derive(Debug)]
pub struct TelemetryPublisher {
    transport: Transport,
    precision: u32,
    /// Session believed usable; cleared on any fault.
    connected: bool,
}

impl TelemetryPublisher {
    pub fn new(transport: Transport, precision: u32) -> Self {
        Self {
            transport,
            precision,
            connected: false,
        }
    }

    pub fn session(channel: Box<dyn PublishChannel>, topic: impl Into<String>) -> Self {
        Self::new(
            Transport::Session {
                channel,
                topic: topic.into(),
            },
            2,
        )
    }

    pub fn request(sink: Box<dyn RequestSink>, url: impl Into<String>) -> Self {
        Self::new(
            Transport::Request {
                sink,
                url: url.into(),
            },
            2,
        )
    }

    pub fn is_session(&self) -> bool {
        matches!(self.transport, Transport::Session { .. })
    }

    pub fn is_connected(&self) -> bool {
        match &self.transport {
            Transport::Session { channel, .. } => self.connected && channel.is_connected(),
            Transport::Request { .. } => true,
        }
    }

    /// Open the session. No-op for request transports.
    pub fn connect(&mut self) -> Result<(), AirError> {
        if let Transport::Session { channel, .. } = &mut self.transport {
            if let Err(e) = channel.connect() {
                self.connected = false;
                return Err(map_transport_error(e.as_ref()));
            }
            self.connected = true;
            info!("telemetry session connected");
        }
        Ok(())
    }

    pub fn payload(&self, reading: &Reading) -> Payload {
        Payload::from_reading(reading, self.precision)
    }

    pub fn publish(&mut self, reading: &Reading) -> PublishResult {
        let body = match serde_json::to_vec(&self.payload(reading)) {
            Ok(b) => b,
            Err(e) => return PublishResult::NetworkError(AirError::Transport(e.to_string())),
        };
        let result = match &mut self.transport {
            Transport::Session { channel, topic } => {
                if !(self.connected && channel.is_connected()) {
                    debug!("reconnecting telemetry session");
                    if let Err(e) = channel.connect() {
                        self.connected = false;
                        let err = map_transport_error(e.as_ref());
                        warn!(error = %err, "telemetry reconnect failed");
                        return PublishResult::NetworkError(err);
                    }
                    self.connected = true;
                }
                match channel.publish(topic, &body) {
                    Ok(()) => PublishResult::Success,
                    Err(e) => {
                        self.connected = false;
                        PublishResult::NetworkError(map_transport_error(e.as_ref()))
                    }
                }
            }
            Transport::Request { sink, url } => {
                match sink.post(url, &[("Content-Type", "application/json")], &body) {
                    Ok(code) if (200..300).contains(&code) => {
                        debug!(code, "webhook accepted reading");
                        PublishResult::Success
                    }
                    Ok(code) => PublishResult::ServerError(code),
                    Err(e) => PublishResult::NetworkError(map_transport_error(e.as_ref())),
                }
            }
        };
        match &result {
            PublishResult::Success => {}
            PublishResult::NetworkError(e) => warn!(error = %e, "telemetry publish failed"),
            PublishResult::ServerError(code) => warn!(code, "telemetry endpoint rejected reading"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::AirQualityStatus;
    use crate::estimator::Concentrations;
    use airsense_traits::BoxError;

    fn reading() -> Reading {
        let mut c = Concentrations::default();
        c.set("CO2", 512.3456);
        c.set("Alcohol", 3.14159);
        Reading {
            timestamp: Utc::now(),
            temperature_c: Some(21.04),
            humidity_pct: None,
            adc: 1800,
            resistance: 9.87654,
            concentrations: c,
            status: AirQualityStatus::Good,
        }
    }

    #[test]
    fn payload_rounds_and_keys_gases() {
        let p = Payload::from_reading(&reading(), 2);
        assert_eq!(p.gases.get("co2"), Some(&512.35));
        assert_eq!(p.gases.get("alcohol"), Some(&3.14));
        assert_eq!(p.sensor_raw.rs_ohm, 9.88);
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["aqi_status"], "Good");
        assert!(v["humidity"].is_null());
        assert_eq!(v["sensor_raw"]["adc"], 1800);
    }

    struct StatusSink(u16);
    impl RequestSink for StatusSink {
        fn post(&mut self, _: &str, headers: &[(&str, &str)], _: &[u8]) -> Result<u16, BoxError> {
            assert!(headers.contains(&("Content-Type", "application/json")));
            Ok(self.0)
        }
    }

    #[test]
    fn request_status_maps_to_result() {
        let mut ok = TelemetryPublisher::request(Box::new(StatusSink(204)), "http://x");
        assert_eq!(ok.publish(&reading()), PublishResult::Success);
        let mut bad = TelemetryPublisher::request(Box::new(StatusSink(500)), "http://x");
        assert_eq!(bad.publish(&reading()), PublishResult::ServerError(500));
    }
}
