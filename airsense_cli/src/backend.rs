//! Collaborator assembly: simulated devices by default, Linux IIO adapters
//! with the `hardware` feature, and the telemetry transport from config.

use std::time::Duration;

use airsense_config::{Config, TransportKind};
use airsense_core::{Pipeline, TelemetryPublisher, Transport};
use airsense_hardware::TerminalDisplay;
use airsense_hardware::transport::StdoutChannel;
use airsense_traits::{ClimateSensor, Display, GasAdc, Network};
use eyre::WrapErr;

/// Simulated ADC code override (tests, demos).
pub const SIM_ADC_ENV: &str = "AIRSENSE_SIM_ADC";

pub struct Backend {
    pub adc: Box<dyn GasAdc>,
    pub climate: Option<Box<dyn ClimateSensor>>,
    pub network: Box<dyn Network>,
    pub display: Box<dyn Display>,
}

#[cfg(not(feature = "hardware"))]
pub fn devices(cfg: &Config) -> eyre::Result<Backend> {
    use airsense_hardware::{SimulatedClimate, SimulatedGasAdc, SimulatedNetwork};

    let adc = match std::env::var(SIM_ADC_ENV) {
        Ok(v) => {
            let code: u16 = v
                .trim()
                .parse()
                .wrap_err_with(|| format!("{SIM_ADC_ENV} must be an ADC code, got {v:?}"))?;
            SimulatedGasAdc::new(code)
        }
        Err(_) => SimulatedGasAdc::new(1500).with_drift(60),
    };
    tracing::info!("using simulated devices");
    Ok(Backend {
        adc: Box::new(adc),
        climate: Some(Box::new(SimulatedClimate::new(24.0, 55.0))),
        network: Box::new(SimulatedNetwork::new(0)),
        display: Box::new(TerminalDisplay::new(cfg.display.echo)),
    })
}

#[cfg(feature = "hardware")]
pub fn devices(cfg: &Config) -> eyre::Result<Backend> {
    use airsense_hardware::iio::{IioAdc, IioClimate, LinkNetwork};

    let dir = cfg
        .sensor
        .iio_device
        .as_ref()
        .ok_or_else(|| eyre::eyre!("invalid configuration: sensor.iio_device is required with the hardware backend"))?;
    if !dir.is_dir() {
        eyre::bail!("open gas adc: {} is not a directory", dir.display());
    }
    let climate: Option<Box<dyn ClimateSensor>> = cfg
        .sensor
        .climate_device
        .as_ref()
        .map(|d| Box::new(IioClimate::new(d)) as Box<dyn ClimateSensor>);
    tracing::info!(adc = %dir.display(), channel = cfg.sensor.adc_channel, "using IIO devices");
    Ok(Backend {
        adc: Box::new(IioAdc::new(
            dir,
            cfg.sensor.adc_channel,
            cfg.sensor.full_scale_code,
        )),
        climate,
        network: Box::new(LinkNetwork::new(&cfg.network.interface)),
        display: Box::new(TerminalDisplay::new(cfg.display.echo)),
    })
}

pub fn publisher(cfg: &Config) -> TelemetryPublisher {
    let t = &cfg.telemetry;
    let transport = match t.transport {
        TransportKind::Stdout => Transport::Session {
            channel: Box::new(StdoutChannel),
            topic: t.mqtt.topic.clone(),
        },
        TransportKind::Http => {
            let sink = airsense_hardware::transport::HttpSink::new(Duration::from_millis(
                t.http.timeout_ms,
            ));
            Transport::Request {
                sink: Box::new(sink),
                url: t.http.url.clone(),
            }
        }
        TransportKind::Mqtt => {
            use airsense_hardware::transport::{MqttChannel, MqttSettings};
            let m = &t.mqtt;
            let channel = MqttChannel::new(MqttSettings {
                server: m.server.clone(),
                port: m.port,
                client_id: m.client_id.clone(),
                username: m.username.clone(),
                password: m.password.clone(),
                keep_alive: Duration::from_secs(m.keep_alive_s),
                connect_timeout: Duration::from_millis(m.connect_timeout_ms),
            });
            Transport::Session {
                channel: Box::new(channel),
                topic: m.topic.clone(),
            }
        }
    };
    TelemetryPublisher::new(transport, t.precision)
}

pub fn pipeline(cfg: &Config, period_ms: Option<u64>) -> eyre::Result<Pipeline> {
    let mut p = Pipeline::try_from(cfg).map_err(eyre::Report::new)?;
    if let Some(ms) = period_ms {
        if ms == 0 {
            eyre::bail!("invalid configuration: --period-ms must be >= 1");
        }
        p.period = Duration::from_millis(ms);
    }
    Ok(p)
}
