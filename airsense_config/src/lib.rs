#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the sensing node.
//!
//! - `Config` and its sections are deserialized from TOML and validated once
//!   at startup; `validate()` rejects malformed curves, rules and layouts.
//! - Every section has defaults matching the deployed two-page, six-gas node,
//!   so a config file usually only names the telemetry endpoint.
use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;

/// Analog front end: divider supply, load resistor and ADC resolution.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SensorCfg {
    pub supply_voltage: f64,
    /// Load resistor RL in kOhm; resistances come out in the same unit.
    pub load_resistance_kohm: f64,
    /// Maximum ADC code (4095 for 12-bit).
    pub full_scale_code: u16,
    /// Resistance reported when the divider saturates (voltage >= supply).
    pub saturation_sentinel: f64,
    /// IIO device directory of the gas ADC (hardware builds only).
    pub iio_device: Option<PathBuf>,
    pub adc_channel: u8,
    /// IIO device directory of the climate sensor; absent = no climate sensor.
    pub climate_device: Option<PathBuf>,
}

impl Default for SensorCfg {
    fn default() -> Self {
        Self {
            supply_voltage: 3.3,
            load_resistance_kohm: 10.0,
            full_scale_code: 4095,
            saturation_sentinel: 0.1,
            iio_device: None,
            adc_channel: 0,
            climate_device: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CalibrationCfg {
    pub samples: u32,
    pub interval_ms: u64,
    /// Rs/Ro of the sensor in clean air (datasheet, 3.6 for MQ-135).
    pub clean_air_factor: f64,
    /// Attempts before halting when `network.on_failure = "halt"`.
    pub max_attempts: u32,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            samples: 50,
            interval_ms: 100,
            clean_air_factor: 3.6,
            max_attempts: 3,
        }
    }
}

/// One power-law curve: ppm = a * (Rs/Ro)^b + offset_ppm
#[derive(Debug, Deserialize, Clone)]
pub struct GasCfg {
    pub name: String,
    /// Payload field name; defaults to the lowercase name.
    #[serde(default)]
    pub key: Option<String>,
    pub a: f64,
    pub b: f64,
    #[serde(default)]
    pub offset_ppm: f64,
}

impl GasCfg {
    pub fn payload_key(&self) -> String {
        self.key
            .clone()
            .unwrap_or_else(|| self.name.to_ascii_lowercase())
    }
}

fn gas(name: &str, key: &str, a: f64, b: f64, offset_ppm: f64) -> GasCfg {
    GasCfg {
        name: name.to_string(),
        key: Some(key.to_string()),
        a,
        b,
        offset_ppm,
    }
}

/// MQ-135 datasheet curves.
pub fn default_gases() -> Vec<GasCfg> {
    vec![
        gas("CO2", "co2", 110.47, -2.862, 400.0),
        gas("CO", "co", 605.18, -3.937, 0.0),
        gas("NH3", "nh3", 102.2, -2.473, 0.0),
        gas("Alcohol", "alcool", 77.255, -3.18, 0.0),
        gas("Benzene", "benzeno", 44.947, -3.445, 0.0),
        gas("Acetone", "acetona", 34.434, -3.369, 0.0),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct RuleCfg {
    pub gas: String,
    pub threshold_ppm: f64,
    pub score: u32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClassifierCfg {
    /// Score strictly above this is at least Alert.
    pub alert_above: u32,
    /// Score strictly above this is Danger.
    pub danger_above: u32,
    pub rules: Vec<RuleCfg>,
}

impl Default for ClassifierCfg {
    fn default() -> Self {
        let rule = |gas: &str, threshold_ppm: f64, score: u32| RuleCfg {
            gas: gas.to_string(),
            threshold_ppm,
            score,
        };
        Self {
            alert_above: 40,
            danger_above: 80,
            rules: vec![
                rule("CO2", 1000.0, 30),
                rule("NH3", 10.0, 40),
                rule("CO", 10.0, 40),
                rule("Alcohol", 100.0, 20),
            ],
        }
    }
}

/// One text line of a page. `text` is a template; see `airsense_core::display`.
#[derive(Debug, Deserialize, Clone)]
pub struct LineCfg {
    pub text: String,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PageCfg {
    pub lines: Vec<LineCfg>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DisplayCfg {
    /// Characters per line (128 px / 8 px font).
    pub width_chars: usize,
    /// Echo frames to stderr in simulated builds.
    pub echo: bool,
    pub pages: Vec<PageCfg>,
}

fn line(text: &str, x: i32, y: i32) -> LineCfg {
    LineCfg {
        text: text.to_string(),
        x,
        y,
    }
}

impl Default for DisplayCfg {
    fn default() -> Self {
        Self {
            width_chars: 16,
            echo: false,
            pages: vec![
                PageCfg {
                    lines: vec![
                        line("T:{temperature:1}C H:{humidity:0}%", 0, 0),
                        line("----------------", 0, 10),
                        line("CO2: {gas:CO2:0} ppm", 0, 20),
                        line("CO : {gas:CO:2} ppm", 0, 30),
                        line("Sts: {status}", 0, 50),
                        line(">> Pag {page}/{pages}", 80, 55),
                    ],
                },
                PageCfg {
                    lines: vec![
                        line("QUIMICOS (ppm)", 0, 0),
                        line("----------------", 0, 10),
                        line("NH3: {gas:NH3:2}", 0, 20),
                        line("Alc: {gas:Alcohol:2}", 0, 30),
                        line("Ben: {gas:Benzene:2}", 0, 40),
                        line(">> Pag {page}/{pages}", 80, 55),
                    ],
                },
            ],
        }
    }
}

/// What to do when association or calibration keeps failing at boot.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Show the error and stop.
    Halt,
    /// Back off and try again forever.
    #[default]
    Retry,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NetworkCfg {
    pub ssid: String,
    pub password: String,
    /// Status polls after starting association before giving up on an attempt.
    pub association_polls: u32,
    pub poll_interval_ms: u64,
    pub on_failure: FailurePolicy,
    pub retry_backoff_ms: u64,
    /// Host interface watched by the link-state network (hardware builds).
    pub interface: String,
}

impl Default for NetworkCfg {
    fn default() -> Self {
        Self {
            ssid: "Wokwi-GUEST".to_string(),
            password: String::new(),
            association_polls: 15,
            poll_interval_ms: 1000,
            on_failure: FailurePolicy::Retry,
            retry_backoff_ms: 3000,
            interface: "wlan0".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Mqtt,
    #[default]
    Http,
    Stdout,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpCfg {
    pub url: String,
    pub timeout_ms: u64,
}

impl Default for HttpCfg {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MqttCfg {
    pub server: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub topic: String,
    pub keep_alive_s: u64,
    pub connect_timeout_ms: u64,
}

impl Default for MqttCfg {
    fn default() -> Self {
        Self {
            server: String::new(),
            port: 1883,
            client_id: "esp32".to_string(),
            username: None,
            password: None,
            topic: "esp32/sensors".to_string(),
            keep_alive_s: 30,
            connect_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TelemetryCfg {
    pub transport: TransportKind,
    /// Decimal places for ppm and resistance values in the payload.
    pub precision: u32,
    pub http: HttpCfg,
    pub mqtt: MqttCfg,
}

impl Default for TelemetryCfg {
    fn default() -> Self {
        Self {
            transport: TransportKind::Http,
            precision: 2,
            http: HttpCfg::default(),
            mqtt: MqttCfg::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ControlCfg {
    /// Fixed cycle period.
    pub period_ms: u64,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self { period_ms: 3000 }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub sensor: SensorCfg,
    pub calibration: CalibrationCfg,
    #[serde(default = "default_gases")]
    pub gases: Vec<GasCfg>,
    pub classifier: ClassifierCfg,
    pub display: DisplayCfg,
    pub network: NetworkCfg,
    pub telemetry: TelemetryCfg,
    pub control: ControlCfg,
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sensor: SensorCfg::default(),
            calibration: CalibrationCfg::default(),
            gases: default_gases(),
            classifier: ClassifierCfg::default(),
            display: DisplayCfg::default(),
            network: NetworkCfg::default(),
            telemetry: TelemetryCfg::default(),
            control: ControlCfg::default(),
            logging: Logging::default(),
        }
    }
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

pub fn load_file(path: &std::path::Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {:?}: {}", path, e))?;
    cfg.validate()?;
    Ok(cfg)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Sensor
        if !(self.sensor.supply_voltage.is_finite() && self.sensor.supply_voltage > 0.0) {
            eyre::bail!("sensor.supply_voltage must be > 0");
        }
        if !(self.sensor.load_resistance_kohm.is_finite() && self.sensor.load_resistance_kohm > 0.0)
        {
            eyre::bail!("sensor.load_resistance_kohm must be > 0");
        }
        if self.sensor.full_scale_code == 0 {
            eyre::bail!("sensor.full_scale_code must be >= 1");
        }
        if !(self.sensor.saturation_sentinel.is_finite() && self.sensor.saturation_sentinel >= 0.0)
        {
            eyre::bail!("sensor.saturation_sentinel must be >= 0");
        }

        // Calibration
        if self.calibration.samples == 0 {
            eyre::bail!("calibration.samples must be >= 1");
        }
        if !(self.calibration.clean_air_factor.is_finite()
            && self.calibration.clean_air_factor > 0.0)
        {
            eyre::bail!("calibration.clean_air_factor must be > 0");
        }
        if self.calibration.interval_ms > 60 * 1000 {
            eyre::bail!("calibration.interval_ms is unreasonably large (>60s)");
        }
        if self.calibration.max_attempts == 0 {
            eyre::bail!("calibration.max_attempts must be >= 1");
        }

        // Gases
        if self.gases.is_empty() {
            eyre::bail!("at least one [[gases]] entry is required");
        }
        let mut names = HashSet::new();
        let mut keys = HashSet::new();
        for g in &self.gases {
            if g.name.trim().is_empty() {
                eyre::bail!("gases.name must not be empty");
            }
            if !(g.a.is_finite() && g.a > 0.0) {
                eyre::bail!("gases.{}.a must be > 0", g.name);
            }
            if !g.b.is_finite() {
                eyre::bail!("gases.{}.b must be finite", g.name);
            }
            if !(g.offset_ppm.is_finite() && g.offset_ppm >= 0.0) {
                eyre::bail!("gases.{}.offset_ppm must be >= 0", g.name);
            }
            if !names.insert(g.name.as_str()) {
                eyre::bail!("duplicate gas name {:?}", g.name);
            }
            if !keys.insert(g.payload_key()) {
                eyre::bail!("duplicate gas key {:?}", g.payload_key());
            }
        }

        // Classifier
        if self.classifier.danger_above < self.classifier.alert_above {
            eyre::bail!("classifier.danger_above must be >= classifier.alert_above");
        }
        for r in &self.classifier.rules {
            if !names.contains(r.gas.as_str()) {
                eyre::bail!("classifier rule references unknown gas {:?}", r.gas);
            }
            if !r.threshold_ppm.is_finite() {
                eyre::bail!("classifier rule for {} has non-finite threshold_ppm", r.gas);
            }
        }

        // Display
        if self.display.pages.is_empty() {
            eyre::bail!("display.pages must contain at least one page");
        }
        if self.display.width_chars == 0 {
            eyre::bail!("display.width_chars must be >= 1");
        }
        for (i, p) in self.display.pages.iter().enumerate() {
            if p.lines.is_empty() {
                eyre::bail!("display.pages[{i}] must contain at least one line");
            }
        }

        // Network
        if self.network.association_polls == 0 {
            eyre::bail!("network.association_polls must be >= 1");
        }
        if self.network.poll_interval_ms == 0 {
            eyre::bail!("network.poll_interval_ms must be >= 1");
        }

        // Telemetry
        if self.telemetry.precision > 6 {
            eyre::bail!("telemetry.precision must be in [0, 6]");
        }
        match self.telemetry.transport {
            TransportKind::Http => {
                if self.telemetry.http.url.trim().is_empty() {
                    eyre::bail!("telemetry.http.url is required for the http transport");
                }
                if self.telemetry.http.timeout_ms == 0 {
                    eyre::bail!("telemetry.http.timeout_ms must be >= 1");
                }
            }
            TransportKind::Mqtt => {
                if self.telemetry.mqtt.server.trim().is_empty() {
                    eyre::bail!("telemetry.mqtt.server is required for the mqtt transport");
                }
                if self.telemetry.mqtt.topic.trim().is_empty() {
                    eyre::bail!("telemetry.mqtt.topic must not be empty");
                }
            }
            TransportKind::Stdout => {}
        }

        // Control
        if self.control.period_ms == 0 {
            eyre::bail!("control.period_ms must be >= 1");
        }
        if self.control.period_ms > 60 * 60 * 1000 {
            eyre::bail!("control.period_ms is unreasonably large (>1h)");
        }

        Ok(())
    }
}
