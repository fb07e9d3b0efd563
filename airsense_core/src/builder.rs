//! `Pipeline` (validated, collaborator-free configuration) and the
//! `ControlLoop` builder that pairs it with devices.

use std::time::Duration;

use airsense_traits::clock::{Clock, MonotonicClock};
use airsense_traits::{ClimateSensor, Display, GasAdc, Network};

use crate::calibration::{CalibrationParams, RecalibrationHandle};
use crate::classifier::Classifier;
use crate::control::{Association, BootPolicy, ControlLoop, LoopState};
use crate::display::DisplayPresenter;
use crate::error::{BuildError, Result};
use crate::estimator::GasTable;
use crate::resistance::ResistanceModel;
use crate::telemetry::TelemetryPublisher;

/// Everything the loop computes with, already validated.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub model: ResistanceModel,
    pub gases: GasTable,
    pub classifier: Classifier,
    pub presenter: DisplayPresenter,
    pub calibration: CalibrationParams,
    pub boot: BootPolicy,
    pub association: Association,
    /// Fixed cycle period.
    pub period: Duration,
}

#[derive(Default)]
pub struct ControlLoopBuilder {
    adc: Option<Box<dyn GasAdc>>,
    climate: Option<Box<dyn ClimateSensor>>,
    network: Option<Box<dyn Network>>,
    display: Option<Box<dyn Display>>,
    publisher: Option<TelemetryPublisher>,
    pipeline: Option<Pipeline>,
    clock: Option<Box<dyn Clock>>,
    recalibration: Option<RecalibrationHandle>,
}

impl ControlLoopBuilder {
    pub fn with_adc(mut self, adc: impl GasAdc + 'static) -> Self {
        self.adc = Some(Box::new(adc));
        self
    }

    /// Optional; without it readings carry no temperature or humidity.
    pub fn with_climate(mut self, climate: impl ClimateSensor + 'static) -> Self {
        self.climate = Some(Box::new(climate));
        self
    }

    pub fn with_network(mut self, network: impl Network + 'static) -> Self {
        self.network = Some(Box::new(network));
        self
    }

    pub fn with_display(mut self, display: impl Display + 'static) -> Self {
        self.display = Some(Box::new(display));
        self
    }

    pub fn with_publisher(mut self, publisher: TelemetryPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// Defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    /// Share an existing handle (e.g. one set by a timer thread).
    pub fn with_recalibration(mut self, handle: RecalibrationHandle) -> Self {
        self.recalibration = Some(handle);
        self
    }

    pub fn build(self) -> Result<ControlLoop> {
        let adc = self
            .adc
            .ok_or_else(|| eyre::Report::new(BuildError::MissingAdc))?;
        let network = self
            .network
            .ok_or_else(|| eyre::Report::new(BuildError::MissingNetwork))?;
        let display = self
            .display
            .ok_or_else(|| eyre::Report::new(BuildError::MissingDisplay))?;
        let publisher = self
            .publisher
            .ok_or_else(|| eyre::Report::new(BuildError::MissingPublisher))?;
        let pipeline = self
            .pipeline
            .ok_or_else(|| eyre::Report::new(BuildError::MissingPipeline))?;
        let page = pipeline.presenter.initial_page();
        Ok(ControlLoop {
            adc,
            climate: self.climate,
            network,
            display,
            publisher,
            clock: self
                .clock
                .unwrap_or_else(|| Box::new(MonotonicClock::new())),
            recalibration: self.recalibration.unwrap_or_default(),
            pipeline,
            state: LoopState::Bootstrapping,
            calibration: None,
            page,
            notice: None,
            reassociate: false,
            cycles: 0,
        })
    }
}
