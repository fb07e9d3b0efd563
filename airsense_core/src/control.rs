//! The sensing loop: bootstrap, calibrate, then fixed-period cycles.
//!
//! ```text
//! Bootstrapping -> Calibrating -> Running
//!        \              \
//!         +--------------+--> Halted   (only with FailurePolicy::Halt)
//! ```
//!
//! Per-cycle faults never end the loop; they come back as `CycleOutcome`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use airsense_traits::{Clock, ClimateSensor, Display, GasAdc, Network};
use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::builder::{ControlLoopBuilder, Pipeline};
use crate::calibration::{CalibrationState, RecalibrationHandle, calibrate};
use crate::display::PageState;
use crate::error::{AirError, SensorFault};
use crate::hw_error::map_sensor_error;
use crate::reading::{RawSample, Reading};
use crate::telemetry::{PublishResult, TelemetryPublisher};

const CALIBRATING: &str = "Calibrating...";
const CONNECTING: &str = "Connecting WiFi";
const PUBLISH_NOTICE: &str = "Pub Fail";

/// What to do when a bootstrap step keeps failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Show the error and stop.
    Halt,
    /// Back off and try again until it works or shutdown is requested.
    #[default]
    Retry,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BootPolicy {
    pub on_failure: FailurePolicy,
    /// Calibration attempts before halting (Halt policy only).
    pub calibration_attempts: u32,
    pub backoff: Duration,
}

impl Default for BootPolicy {
    fn default() -> Self {
        Self {
            on_failure: FailurePolicy::Retry,
            calibration_attempts: 3,
            backoff: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Association {
    pub ssid: String,
    pub password: String,
    /// Status polls per attempt.
    pub polls: u32,
    pub poll_interval: Duration,
}

impl Default for Association {
    fn default() -> Self {
        Self {
            ssid: "Wokwi-GUEST".into(),
            password: String::new(),
            polls: 15,
            poll_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    Bootstrapping,
    Calibrating,
    Running,
    Halted(AirError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopExit {
    /// Shutdown flag observed at a cycle (or retry) boundary.
    Shutdown,
    /// `max_cycles` cycles ran.
    Completed(u64),
    Halted(AirError),
}

#[derive(Debug)]
pub enum CycleOutcome {
    /// Reading rendered and handed to the transport.
    Completed {
        reading: Reading,
        publish: PublishResult,
        display: Option<AirError>,
    },
    /// Acquisition failed; nothing rendered, nothing published.
    SensorFault(SensorFault),
    /// No baseline yet; `bootstrap` or `calibrate` has not succeeded.
    NotReady,
}

impl CycleOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(
            self,
            Self::Completed {
                publish: PublishResult::Success,
                display: None,
                ..
            }
        )
    }
}

pub struct ControlLoop {
    pub(crate) adc: Box<dyn GasAdc>,
    pub(crate) climate: Option<Box<dyn ClimateSensor>>,
    pub(crate) network: Box<dyn Network>,
    pub(crate) display: Box<dyn Display>,
    pub(crate) publisher: TelemetryPublisher,
    pub(crate) pipeline: Pipeline,
    pub(crate) clock: Box<dyn Clock>,
    pub(crate) recalibration: RecalibrationHandle,
    pub(crate) state: LoopState,
    pub(crate) calibration: Option<CalibrationState>,
    pub(crate) page: PageState,
    pub(crate) notice: Option<&'static str>,
    /// Mid-run re-association failed; retry after the backoff before the
    /// next publish.
    pub(crate) reassociate: bool,
    pub(crate) cycles: u64,
}

impl core::fmt::Debug for ControlLoop {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ControlLoop")
            .field("state", &self.state)
            .field("calibration", &self.calibration)
            .field("page", &self.page)
            .field("cycles", &self.cycles)
            .finish()
    }
}

impl ControlLoop {
    pub fn builder() -> ControlLoopBuilder {
        ControlLoopBuilder::default()
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn calibration(&self) -> Option<&CalibrationState> {
        self.calibration.as_ref()
    }

    pub fn page(&self) -> PageState {
        self.page
    }

    /// Cycles run since construction, faulted ones included.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn recalibration_handle(&self) -> RecalibrationHandle {
        self.recalibration.clone()
    }

    /// Best-effort full-screen message; display errors are only logged.
    pub fn show_message(&mut self, text: &str) {
        let _ = self
            .pipeline
            .presenter
            .show_message(self.display.as_mut(), text);
    }

    /// Associate, open the telemetry session and calibrate.
    pub fn bootstrap(&mut self, shutdown: &AtomicBool) -> Result<(), AirError> {
        info!("bootstrapping");
        self.associate(shutdown)?;
        if self.publisher.is_session()
            && let Err(e) = self.publisher.connect()
        {
            warn!(error = %e, "initial telemetry connect failed; will retry on publish");
        }
        self.calibrate(shutdown)?;
        Ok(())
    }

    /// Bring the network up under the boot policy.
    pub fn associate(&mut self, shutdown: &AtomicBool) -> Result<(), AirError> {
        self.state = LoopState::Bootstrapping;
        self.with_boot_policy("association", 1, shutdown, |this| {
            this.show_message(CONNECTING);
            this.associate_network()
        })
    }

    /// Calibrate under the boot policy and enter `Running`.
    pub fn calibrate(&mut self, shutdown: &AtomicBool) -> Result<CalibrationState, AirError> {
        self.state = LoopState::Calibrating;
        let attempts = self.pipeline.boot.calibration_attempts;
        let st = self.with_boot_policy("calibration", attempts, shutdown, Self::calibrate_once)?;
        self.calibration = Some(st);
        self.page = self.pipeline.presenter.initial_page();
        self.state = LoopState::Running;
        Ok(st)
    }

    fn associate_network(&mut self) -> Result<(), AirError> {
        let a = &self.pipeline.association;
        self.network
            .associate(&a.ssid, &a.password)
            .map_err(|e| AirError::NetworkAssociation(e.to_string()))?;
        for poll in 0..a.polls {
            if self.network.is_associated() {
                info!(ssid = %a.ssid, polls = poll, "network associated");
                return Ok(());
            }
            debug!(poll, "waiting for association");
            self.clock.sleep(a.poll_interval);
        }
        if self.network.is_associated() {
            info!(ssid = %a.ssid, polls = a.polls, "network associated");
            return Ok(());
        }
        Err(AirError::NetworkAssociation(format!(
            "{} not associated after {} polls",
            a.ssid, a.polls
        )))
    }

    fn calibrate_once(&mut self) -> Result<CalibrationState, AirError> {
        self.show_message(CALIBRATING);
        calibrate(
            self.adc.as_mut(),
            &self.pipeline.model,
            self.clock.as_ref(),
            &self.pipeline.calibration,
        )
        .map_err(AirError::from)
    }

    fn with_boot_policy<T>(
        &mut self,
        what: &'static str,
        halt_after: u32,
        shutdown: &AtomicBool,
        mut op: impl FnMut(&mut Self) -> Result<T, AirError>,
    ) -> Result<T, AirError> {
        let mut attempt = 0u32;
        loop {
            attempt = attempt.saturating_add(1);
            let err = match op(self) {
                Ok(v) => return Ok(v),
                Err(e) => e,
            };
            if self.pipeline.boot.on_failure == FailurePolicy::Halt && attempt >= halt_after.max(1)
            {
                return Err(self.halt(err));
            }
            if shutdown.load(Ordering::Relaxed) {
                return Err(err);
            }
            warn!(what, attempt, error = %err, "bootstrap step failed; retrying");
            self.clock.sleep(self.pipeline.boot.backoff);
        }
    }

    fn halt(&mut self, err: AirError) -> AirError {
        error!(error = %err, "halting");
        self.show_message(err.display_message());
        self.state = LoopState::Halted(err.clone());
        err
    }

    fn acquire(&mut self) -> Result<RawSample, SensorFault> {
        let adc = self
            .adc
            .read_raw()
            .map_err(|e| map_sensor_error(e.as_ref()))?;
        let (temperature_c, humidity_pct) = match self.climate.as_mut() {
            Some(c) => {
                let m = c.measure().map_err(|e| map_sensor_error(e.as_ref()))?;
                (Some(m.temperature_c), Some(m.humidity_pct))
            }
            None => (None, None),
        };
        Ok(RawSample {
            adc,
            temperature_c,
            humidity_pct,
        })
    }

    /// Pure part of a cycle: model, estimate, classify.
    pub fn process(&self, raw: RawSample, calibration: &CalibrationState) -> Reading {
        let p = &self.pipeline;
        let resistance = p.model.resistance(raw.adc);
        let concentrations = p.gases.concentrations(resistance, calibration);
        let status = p.classifier.classify(&concentrations);
        Reading {
            timestamp: Utc::now(),
            temperature_c: raw.temperature_c,
            humidity_pct: raw.humidity_pct,
            adc: raw.adc,
            resistance,
            concentrations,
            status,
        }
    }

    fn recalibrate(&mut self) {
        info!("recalibration requested");
        match self.calibrate_once() {
            Ok(st) => {
                info!(
                    old = self.calibration.map(|c| c.baseline_resistance()),
                    new = st.baseline_resistance(),
                    "baseline replaced"
                );
                self.calibration = Some(st);
            }
            Err(e) => warn!(error = %e, "recalibration failed; keeping previous baseline"),
        }
    }

    /// Re-associate if the link dropped. On failure the fault is shown on
    /// the next frame and another attempt is scheduled.
    fn ensure_associated(&mut self) -> Result<(), AirError> {
        if self.network.is_associated() {
            self.reassociate = false;
            return Ok(());
        }
        warn!("network association lost; re-associating");
        match self.associate_network() {
            Ok(()) => {
                self.reassociate = false;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "re-association failed");
                self.notice = Some(e.display_message());
                self.reassociate = true;
                Err(e)
            }
        }
    }

    /// A failed mid-run re-association is waiting for its retry.
    pub fn reassociation_pending(&self) -> bool {
        self.reassociate
    }

    fn publish(&mut self, reading: &Reading) -> PublishResult {
        if self.reassociate {
            self.clock.sleep(self.pipeline.boot.backoff);
            if let Err(e) = self.ensure_associated() {
                return PublishResult::NetworkError(e);
            }
        }
        let publish = self.publisher.publish(reading);
        match &publish {
            PublishResult::Success => {}
            PublishResult::ServerError(_) => self.notice = Some(PUBLISH_NOTICE),
            PublishResult::NetworkError(_) => {
                self.notice = Some(PUBLISH_NOTICE);
                // a failure here already set its own notice
                let _ = self.ensure_associated();
            }
        }
        publish
    }

    /// One cycle without pacing.
    pub fn step(&mut self) -> CycleOutcome {
        if self.recalibration.take() {
            self.recalibrate();
        }
        let Some(cal) = self.calibration else {
            return CycleOutcome::NotReady;
        };

        let raw = match self.acquire() {
            Ok(r) => r,
            Err(fault) => {
                warn!(error = %fault, "sensor fault; skipping cycle");
                self.show_message(AirError::Sensor(fault.clone()).display_message());
                return CycleOutcome::SensorFault(fault);
            }
        };
        let reading = self.process(raw, &cal);
        info!(
            adc = reading.adc,
            rs = reading.resistance,
            temperature = reading.temperature_c,
            humidity = reading.humidity_pct,
            status = %reading.status,
            "reading"
        );
        for g in reading.concentrations.iter() {
            debug!(gas = %g.name, ppm = g.ppm, "concentration");
        }

        let (lines, next) = self.pipeline.presenter.render(&reading, self.page);
        let display = self
            .pipeline
            .presenter
            .present(self.display.as_mut(), &lines, self.notice.take())
            .err();
        self.page = next;

        let publish = self.publish(&reading);
        CycleOutcome::Completed {
            reading,
            publish,
            display,
        }
    }

    /// Bootstrap if needed, then cycle every `period` until shutdown,
    /// `max_cycles`, or a halt.
    pub fn run(&mut self, shutdown: &AtomicBool, max_cycles: Option<u64>) -> LoopExit {
        if let LoopState::Halted(e) = &self.state {
            return LoopExit::Halted(e.clone());
        }
        if self.state != LoopState::Running
            && let Err(e) = self.bootstrap(shutdown)
        {
            if let LoopState::Halted(h) = &self.state {
                return LoopExit::Halted(h.clone());
            }
            debug!(error = %e, "bootstrap interrupted by shutdown");
            return LoopExit::Shutdown;
        }

        let period = self.pipeline.period;
        let mut done = 0u64;
        loop {
            if shutdown.load(Ordering::Relaxed) {
                info!(cycles = done, "shutdown requested");
                return LoopExit::Shutdown;
            }
            if max_cycles.is_some_and(|m| done >= m) {
                return LoopExit::Completed(done);
            }
            let start = self.clock.now();
            let outcome = self.step();
            done = done.saturating_add(1);
            self.cycles = self.cycles.saturating_add(1);
            if !outcome.is_clean() {
                debug!(cycle = self.cycles, ?outcome, "cycle finished with faults");
            }
            // no trailing sleep after the last requested cycle
            if max_cycles.is_some_and(|m| done >= m) {
                return LoopExit::Completed(done);
            }
            self.clock.sleep_remaining(start, period);
        }
    }
}
