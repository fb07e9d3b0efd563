//! Linux adapters: IIO sysfs channels and interface link state.
//!
//! An MQ-135 wired into an ADC with an IIO driver exposes
//! `/sys/bus/iio/devices/iio:deviceN/in_voltageK_raw`; the in-kernel `dht11`
//! driver (which also handles DHT22) exposes `in_temp_input` and
//! `in_humidityrelative_input` in milli-units.

use std::path::{Path, PathBuf};

use airsense_traits::{BoxError, Climate, ClimateSensor, GasAdc, Network};
use tracing::debug;

use crate::error::HwError;
use crate::util::{read_sysfs_int, retry_on_timeout};

pub struct IioAdc {
    raw_path: PathBuf,
    full_scale: u16,
}

impl IioAdc {
    /// `device_dir` is the `iio:deviceN` directory, `channel` the voltage index.
    pub fn new(device_dir: &Path, channel: u8, full_scale: u16) -> Self {
        Self {
            raw_path: device_dir.join(format!("in_voltage{channel}_raw")),
            full_scale,
        }
    }
}

impl GasAdc for IioAdc {
    fn read_raw(&mut self) -> Result<u16, BoxError> {
        let v = retry_on_timeout(2, || read_sysfs_int(&self.raw_path))?;
        let code = v.clamp(0, i64::from(self.full_scale)) as u16;
        debug!(raw = v, code, "iio adc sample");
        Ok(code)
    }
}

pub struct IioClimate {
    temp_path: PathBuf,
    humidity_path: PathBuf,
    retries: u32,
}

impl IioClimate {
    pub fn new(device_dir: &Path) -> Self {
        Self {
            temp_path: device_dir.join("in_temp_input"),
            humidity_path: device_dir.join("in_humidityrelative_input"),
            retries: 3,
        }
    }
}

impl ClimateSensor for IioClimate {
    fn measure(&mut self) -> Result<Climate, BoxError> {
        let milli_c = retry_on_timeout(self.retries, || read_sysfs_int(&self.temp_path))?;
        let milli_rh = retry_on_timeout(self.retries, || read_sysfs_int(&self.humidity_path))?;
        Ok(Climate {
            temperature_c: milli_c as f64 / 1000.0,
            humidity_pct: milli_rh as f64 / 1000.0,
        })
    }
}

/// Network whose association is managed by the host (wpa_supplicant,
/// NetworkManager); `is_associated` follows the interface operstate.
pub struct LinkNetwork {
    operstate: PathBuf,
}

impl LinkNetwork {
    pub fn new(interface: &str) -> Self {
        Self {
            operstate: PathBuf::from(format!("/sys/class/net/{interface}/operstate")),
        }
    }

    #[cfg(test)]
    fn with_path(operstate: PathBuf) -> Self {
        Self { operstate }
    }
}

impl Network for LinkNetwork {
    fn associate(&mut self, ssid: &str, _password: &str) -> Result<(), BoxError> {
        if !self.operstate.exists() {
            return Err(Box::new(HwError::NotAssociated));
        }
        debug!(ssid, path = %self.operstate.display(), "waiting for host-managed link");
        Ok(())
    }

    fn is_associated(&self) -> bool {
        std::fs::read_to_string(&self.operstate)
            .map(|s| s.trim() == "up")
            .unwrap_or(false)
    }
}
