//! Device adapters for the sensing node.
//!
//! The simulated devices are always available and back the default CLI build.
//! Linux IIO adapters live behind the `hardware` feature; the MQTT and HTTP
//! transports behind `mqtt` and `http`.

pub mod error;
#[cfg(feature = "hardware")]
pub mod iio;
pub mod transport;
pub mod util;

use airsense_traits::{BoxError, Climate, ClimateSensor, Display, GasAdc, Network};
use std::cell::Cell;

use crate::error::HwError;

/// Simulated MQ-135 channel: a base code with a slow triangular drift so the
/// display and telemetry have something to show.
pub struct SimulatedGasAdc {
    base: u16,
    amplitude: u16,
    tick: u32,
}

impl SimulatedGasAdc {
    pub fn new(base: u16) -> Self {
        Self {
            base,
            amplitude: 0,
            tick: 0,
        }
    }

    /// Add a triangular drift of +/- `amplitude` codes over 40 reads.
    pub fn with_drift(mut self, amplitude: u16) -> Self {
        self.amplitude = amplitude;
        self
    }
}

impl GasAdc for SimulatedGasAdc {
    fn read_raw(&mut self) -> Result<u16, BoxError> {
        let phase = (self.tick % 40) as i32;
        self.tick = self.tick.wrapping_add(1);
        let tri = if phase < 20 { phase } else { 40 - phase } - 10;
        let delta = tri * i32::from(self.amplitude) / 10;
        let code = (i32::from(self.base) + delta).clamp(0, 4095) as u16;
        tracing::trace!(code, "simulated adc read");
        Ok(code)
    }
}

/// Simulated DHT22. Optionally fails every `fail_every`-th measurement with a
/// checksum error to exercise the fault path.
pub struct SimulatedClimate {
    temperature_c: f64,
    humidity_pct: f64,
    fail_every: Option<u32>,
    count: u32,
}

impl SimulatedClimate {
    pub fn new(temperature_c: f64, humidity_pct: f64) -> Self {
        Self {
            temperature_c,
            humidity_pct,
            fail_every: None,
            count: 0,
        }
    }

    pub fn failing_every(mut self, n: u32) -> Self {
        self.fail_every = (n > 0).then_some(n);
        self
    }
}

impl ClimateSensor for SimulatedClimate {
    fn measure(&mut self) -> Result<Climate, BoxError> {
        self.count = self.count.wrapping_add(1);
        if let Some(n) = self.fail_every
            && self.count % n == 0
        {
            return Err(Box::new(HwError::Checksum));
        }
        Ok(Climate {
            temperature_c: self.temperature_c,
            humidity_pct: self.humidity_pct,
        })
    }
}

/// Simulated station interface that comes up after a number of status polls.
pub struct SimulatedNetwork {
    polls_until_up: u32,
    polls: Cell<u32>,
    started: bool,
}

impl SimulatedNetwork {
    pub fn new(polls_until_up: u32) -> Self {
        Self {
            polls_until_up,
            polls: Cell::new(0),
            started: false,
        }
    }
}

impl Network for SimulatedNetwork {
    fn associate(&mut self, ssid: &str, _password: &str) -> Result<(), BoxError> {
        tracing::debug!(ssid, "associating (simulated)");
        self.started = true;
        self.polls.set(0);
        Ok(())
    }

    fn is_associated(&self) -> bool {
        if !self.started {
            return false;
        }
        let n = self.polls.get().saturating_add(1);
        self.polls.set(n);
        n > self.polls_until_up
    }
}

/// Text-mode stand-in for the 128x64 OLED. Frames are echoed to stderr when
/// `echo` is set, otherwise only traced.
pub struct TerminalDisplay {
    echo: bool,
    frame: Vec<(i32, i32, String)>,
}

impl TerminalDisplay {
    pub fn new(echo: bool) -> Self {
        Self {
            echo,
            frame: Vec::new(),
        }
    }
}

impl Display for TerminalDisplay {
    fn clear(&mut self) -> Result<(), BoxError> {
        self.frame.clear();
        Ok(())
    }

    fn draw_text(&mut self, text: &str, x: i32, y: i32) -> Result<(), BoxError> {
        self.frame.push((x, y, text.to_string()));
        Ok(())
    }

    fn flush(&mut self) -> Result<(), BoxError> {
        let mut rows = self.frame.clone();
        rows.sort_by_key(|(x, y, _)| (*y, *x));
        if self.echo {
            eprintln!("+----------------+");
            for (_, _, text) in &rows {
                eprintln!("|{text:<16}|");
            }
            eprintln!("+----------------+");
        } else {
            for (x, y, text) in &rows {
                tracing::debug!(target: "display", x, y, text = %text, "draw");
            }
        }
        Ok(())
    }
}
