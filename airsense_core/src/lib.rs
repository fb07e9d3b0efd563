#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Air-quality sensing pipeline (hardware-agnostic).
//!
//! All device interactions go through the `airsense_traits` collaborators;
//! this crate owns the computation and the loop around it.
//!
//! ## Architecture
//!
//! - **Resistance**: divider model, raw code to Rs (`resistance`)
//! - **Calibration**: clean-air baseline Ro (`calibration`)
//! - **Estimation**: per-gas power-law curves (`estimator`)
//! - **Classification**: weighted threshold score to status (`classifier`)
//! - **Display**: paginated templates (`display`)
//! - **Telemetry**: JSON payload over a session or request transport (`telemetry`)
//! - **Control**: bootstrap policy and fixed-period cycles (`control`)

pub mod builder;
pub mod calibration;
pub mod classifier;
pub mod control;
pub mod conversions;
pub mod display;
pub mod error;
pub mod estimator;
pub mod hw_error;
pub mod reading;
pub mod resistance;
pub mod telemetry;
pub mod util;

pub use builder::{ControlLoopBuilder, Pipeline};
pub use calibration::{CalibrationParams, CalibrationState, RecalibrationHandle, calibrate};
pub use classifier::{AirQualityStatus, Classifier, ScoreRule};
pub use control::{
    Association, BootPolicy, ControlLoop, CycleOutcome, FailurePolicy, LoopExit, LoopState,
};
pub use display::{DisplayPresenter, LineSpec, PageLayout, PageState, RenderedLine};
pub use error::{AirError, BuildError, CalibrationError, Result, SensorFault};
pub use estimator::{Concentrations, GasCurve, GasLevel, GasTable, estimate};
pub use reading::{RawSample, Reading};
pub use resistance::ResistanceModel;
pub use telemetry::{Payload, PublishResult, TelemetryPublisher, Transport};
