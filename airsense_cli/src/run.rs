//! Command execution: run loop, one-shot calibration, self-check.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use airsense_config::Config;
use airsense_core::{ControlLoop, LoopExit, Pipeline, RecalibrationHandle, TelemetryPublisher};
use airsense_traits::MonotonicClock;
use serde_json::json;

use crate::backend::{self, Backend};

const TIMER_TICK: Duration = Duration::from_millis(100);

fn assemble(
    devices: Backend,
    publisher: TelemetryPublisher,
    pipeline: Pipeline,
    recalibration: Option<RecalibrationHandle>,
) -> eyre::Result<ControlLoop> {
    let mut b = ControlLoop::builder()
        .with_adc(devices.adc)
        .with_network(devices.network)
        .with_display(devices.display)
        .with_publisher(publisher)
        .with_pipeline(pipeline)
        .with_clock(MonotonicClock::new());
    if let Some(c) = devices.climate {
        b = b.with_climate(c);
    }
    if let Some(h) = recalibration {
        b = b.with_recalibration(h);
    }
    b.build()
}

/// Request a recalibration every `every` until `shutdown` is set. The loop
/// picks the request up at its next cycle boundary.
fn spawn_recalibration_timer(
    handle: RecalibrationHandle,
    every: Duration,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<JoinHandle<()>> {
    let tick = TIMER_TICK.min(every);
    thread::Builder::new()
        .name("recalibration-timer".into())
        .spawn(move || {
            let mut last = Instant::now();
            while !shutdown.load(Ordering::Relaxed) {
                thread::sleep(tick);
                if last.elapsed() >= every {
                    tracing::debug!(every_s = every.as_secs_f64(), "periodic recalibration due");
                    handle.request();
                    last = Instant::now();
                }
            }
        })
        .map_err(|e| eyre::eyre!("spawn recalibration timer: {e}"))
}

pub fn run(
    cfg: &Config,
    cycles: Option<u64>,
    period_ms: Option<u64>,
    recalibrate_every_s: Option<u64>,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<()> {
    let pipeline = backend::pipeline(cfg, period_ms)?;
    let recalibration = match recalibrate_every_s {
        Some(0) => eyre::bail!("invalid configuration: --recalibrate-every-s must be >= 1"),
        Some(s) => {
            let handle = RecalibrationHandle::new();
            spawn_recalibration_timer(
                handle.clone(),
                Duration::from_secs(s),
                shutdown.clone(),
            )?;
            Some(handle)
        }
        None => None,
    };
    let mut ctl = assemble(
        backend::devices(cfg)?,
        backend::publisher(cfg),
        pipeline,
        recalibration,
    )?;
    tracing::info!(
        period_ms = ctl.pipeline().period.as_millis() as u64,
        transport = ?cfg.telemetry.transport,
        "starting sensing loop"
    );
    match ctl.run(&shutdown, cycles) {
        LoopExit::Completed(n) => {
            tracing::info!(cycles = n, "completed requested cycles");
            Ok(())
        }
        LoopExit::Shutdown => {
            tracing::info!(cycles = ctl.cycles(), "stopped");
            Ok(())
        }
        LoopExit::Halted(e) => Err(eyre::Report::new(e)),
    }
}

pub fn calibrate(cfg: &Config, json_mode: bool, shutdown: Arc<AtomicBool>) -> eyre::Result<()> {
    let pipeline = backend::pipeline(cfg, None)?;
    let mut ctl = assemble(
        backend::devices(cfg)?,
        backend::publisher(cfg),
        pipeline,
        None,
    )?;
    let st = ctl.calibrate(&shutdown).map_err(eyre::Report::new)?;
    if json_mode {
        println!(
            "{}",
            json!({
                "baseline_resistance": st.baseline_resistance(),
                "samples": st.samples(),
                "calibrated_at": st.calibrated_at(),
            })
        );
    } else {
        println!(
            "Ro = {:.4} (from {} samples at {})",
            st.baseline_resistance(),
            st.samples(),
            st.calibrated_at().to_rfc3339()
        );
    }
    Ok(())
}

pub fn self_check(cfg: &Config, json_mode: bool) -> eyre::Result<()> {
    let pipeline = backend::pipeline(cfg, None)?;
    let mut devices = backend::devices(cfg)?;
    let mut publisher = backend::publisher(cfg);

    let adc = devices.adc.read_raw();
    let climate = devices.climate.as_mut().map(|c| c.measure());
    let associated = devices.network.is_associated();
    let display = pipeline
        .presenter
        .show_message(devices.display.as_mut(), "Self check");
    let transport = if publisher.is_session() {
        publisher.connect().map_err(|e| e.to_string())
    } else {
        Ok(())
    };

    let adc_ok = adc.is_ok();
    let display_ok = display.is_ok();
    if json_mode {
        let climate_json = match &climate {
            None => json!(null),
            Some(Ok(c)) => json!({ "temperature_c": c.temperature_c, "humidity_pct": c.humidity_pct }),
            Some(Err(e)) => json!({ "error": e.to_string() }),
        };
        let adc_json = match &adc {
            Ok(code) => json!(code),
            Err(e) => json!({ "error": e.to_string() }),
        };
        let transport_json = match &transport {
            Ok(()) => json!("ok"),
            Err(e) => json!({ "error": e }),
        };
        let resistance = adc.as_ref().ok().map(|c| pipeline.model.resistance(*c));
        println!(
            "{}",
            json!({
                "adc": adc_json,
                "resistance": resistance,
                "climate": climate_json,
                "network_associated": associated,
                "display_ok": display_ok,
                "transport": transport_json,
            })
        );
    } else {
        match &adc {
            Ok(code) => println!(
                "adc: ok (code {code}, Rs {:.3})",
                pipeline.model.resistance(*code)
            ),
            Err(e) => println!("adc: FAILED ({e})"),
        }
        match &climate {
            None => println!("climate: not configured"),
            Some(Ok(c)) => println!(
                "climate: ok ({:.1} C, {:.1} %)",
                c.temperature_c, c.humidity_pct
            ),
            Some(Err(e)) => println!("climate: FAILED ({e})"),
        }
        println!(
            "network: {}",
            if associated { "associated" } else { "not associated" }
        );
        println!("display: {}", if display_ok { "ok" } else { "FAILED" });
        match &transport {
            Ok(()) => println!("transport: ok"),
            Err(e) => println!("transport: FAILED ({e})"),
        }
    }

    if !(adc_ok && display_ok) {
        eyre::bail!("self-check failed: required device not responding");
    }
    if !json_mode {
        println!("self-check: ok");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_requests_recalibration_until_shutdown() {
        let handle = RecalibrationHandle::new();
        let stop = Arc::new(AtomicBool::new(false));
        let worker =
            spawn_recalibration_timer(handle.clone(), Duration::from_millis(20), stop.clone())
                .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while !handle.is_requested() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(handle.take(), "timer never requested a recalibration");

        stop.store(true, Ordering::Relaxed);
        worker.join().unwrap();
    }
}
