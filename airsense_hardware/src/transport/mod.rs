//! Telemetry transports. Each one implements either the session trait
//! (`PublishChannel`) or the request trait (`RequestSink`).

#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "mqtt")]
pub mod mqtt;
pub mod stdout;

#[cfg(feature = "http")]
pub use http::HttpSink;
#[cfg(feature = "mqtt")]
pub use mqtt::{MqttChannel, MqttSettings};
pub use stdout::StdoutChannel;
