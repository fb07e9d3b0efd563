//! Collaborator interfaces for the sensing node.
//!
//! Everything the sensing pipeline consumes from the outside world goes
//! through these traits: the analog gas channel, the climate sensor, the
//! network association, the display sink and the two telemetry transports.
//! Errors cross the boundary as `Box<dyn Error + Send + Sync>` and are mapped
//! to typed errors by `airsense_core`.

pub mod clock;

pub use clock::{Clock, MonotonicClock};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Analog gas sensor channel (MQ-135 style divider into an ADC).
pub trait GasAdc {
    /// One raw conversion, `0..=full_scale_code`.
    fn read_raw(&mut self) -> Result<u16, BoxError>;
}

/// Temperature and relative humidity pair from one measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Climate {
    pub temperature_c: f64,
    pub humidity_pct: f64,
}

/// Temperature/humidity sensor. Checksum and timeout faults surface as errors.
pub trait ClimateSensor {
    fn measure(&mut self) -> Result<Climate, BoxError>;
}

/// Station-mode network association.
pub trait Network {
    /// Start (or restart) association. Completion is observed via `is_associated`.
    fn associate(&mut self, ssid: &str, password: &str) -> Result<(), BoxError>;
    fn is_associated(&self) -> bool;
}

/// Character display sink: full-frame clear, draw, flush.
pub trait Display {
    fn clear(&mut self) -> Result<(), BoxError>;
    fn draw_text(&mut self, text: &str, x: i32, y: i32) -> Result<(), BoxError>;
    fn flush(&mut self) -> Result<(), BoxError>;
}

/// Persistent publish/subscribe session (connect once, publish repeatedly).
pub trait PublishChannel {
    fn connect(&mut self) -> Result<(), BoxError>;
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BoxError>;
    /// Best-effort liveness of the session; `false` forces a reconnect.
    fn is_connected(&self) -> bool;
}

/// One-shot request/response sink. Returns the response status code.
pub trait RequestSink {
    fn post(
        &mut self,
        url: &str,
        headers: &[(&str, &str)],
        payload: &[u8],
    ) -> Result<u16, BoxError>;
}

impl<T: GasAdc + ?Sized> GasAdc for Box<T> {
    fn read_raw(&mut self) -> Result<u16, BoxError> {
        (**self).read_raw()
    }
}

impl<T: ClimateSensor + ?Sized> ClimateSensor for Box<T> {
    fn measure(&mut self) -> Result<Climate, BoxError> {
        (**self).measure()
    }
}

impl<T: Network + ?Sized> Network for Box<T> {
    fn associate(&mut self, ssid: &str, password: &str) -> Result<(), BoxError> {
        (**self).associate(ssid, password)
    }
    fn is_associated(&self) -> bool {
        (**self).is_associated()
    }
}

impl<T: Display + ?Sized> Display for Box<T> {
    fn clear(&mut self) -> Result<(), BoxError> {
        (**self).clear()
    }
    fn draw_text(&mut self, text: &str, x: i32, y: i32) -> Result<(), BoxError> {
        (**self).draw_text(text, x, y)
    }
    fn flush(&mut self) -> Result<(), BoxError> {
        (**self).flush()
    }
}

impl<T: PublishChannel + ?Sized> PublishChannel for Box<T> {
    fn connect(&mut self) -> Result<(), BoxError> {
        (**self).connect()
    }
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BoxError> {
        (**self).publish(topic, payload)
    }
    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}

impl<T: RequestSink + ?Sized> RequestSink for Box<T> {
    fn post(
        &mut self,
        url: &str,
        headers: &[(&str, &str)],
        payload: &[u8],
    ) -> Result<u16, BoxError> {
        (**self).post(url, headers, payload)
    }
}
