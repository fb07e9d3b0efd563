//! Clean-air baseline (Ro) acquisition.
//!
//! Ro = mean(Rs over N samples) / clean_air_factor. The ambient air is
//! presumed clean; nothing here can verify that.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use airsense_traits::{Clock, GasAdc};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::CalibrationError;
use crate::hw_error::map_sensor_error;
use crate::resistance::ResistanceModel;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationParams {
    pub samples: u32,
    pub interval: Duration,
    /// Rs/Ro in clean air (3.6 for MQ-135).
    pub clean_air_factor: f64,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            samples: 50,
            interval: Duration::from_millis(100),
            clean_air_factor: 3.6,
        }
    }
}

/// Baseline resistance of the current session.
///
/// Only obtainable through calibration (or `from_baseline`), so a value of
/// this type always carries a finite, strictly positive Ro.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationState {
    baseline_resistance: f64,
    calibrated_at: DateTime<Utc>,
    samples: u32,
}

impl CalibrationState {
    pub fn from_baseline(baseline_resistance: f64) -> Result<Self, CalibrationError> {
        if !(baseline_resistance.is_finite() && baseline_resistance > 0.0) {
            return Err(CalibrationError::InvalidBaseline(baseline_resistance));
        }
        Ok(Self {
            baseline_resistance,
            calibrated_at: Utc::now(),
            samples: 0,
        })
    }

    #[inline]
    pub fn baseline_resistance(&self) -> f64 {
        self.baseline_resistance
    }

    pub fn calibrated_at(&self) -> DateTime<Utc> {
        self.calibrated_at
    }

    /// Samples averaged into the baseline (0 when set directly).
    pub fn samples(&self) -> u32 {
        self.samples
    }
}

/// Ro from already-modelled resistances.
pub fn baseline_from_resistances(
    resistances: &[f64],
    clean_air_factor: f64,
) -> Result<f64, CalibrationError> {
    baseline_from_sum(resistances.iter().sum(), resistances.len(), clean_air_factor)
}

fn baseline_from_sum(
    sum: f64,
    count: usize,
    clean_air_factor: f64,
) -> Result<f64, CalibrationError> {
    if count == 0 {
        return Err(CalibrationError::InvalidBaseline(f64::NAN));
    }
    let ro = sum / count as f64 / clean_air_factor;
    if !(ro.is_finite() && ro > 0.0) {
        return Err(CalibrationError::InvalidBaseline(ro));
    }
    Ok(ro)
}

/// Sample the gas channel `params.samples` times, `params.interval` apart,
/// and derive Ro. A read error aborts the attempt.
pub fn calibrate<A, C>(
    adc: &mut A,
    model: &ResistanceModel,
    clock: &C,
    params: &CalibrationParams,
) -> Result<CalibrationState, CalibrationError>
where
    A: GasAdc + ?Sized,
    C: Clock + ?Sized,
{
    warn!(
        samples = params.samples,
        "calibrating baseline; ambient air is assumed to be clean"
    );
    let n = params.samples.max(1);
    let mut sum = 0.0;
    for i in 0..n {
        if i > 0 {
            clock.sleep(params.interval);
        }
        let code = adc
            .read_raw()
            .map_err(|e| CalibrationError::Sensor(map_sensor_error(e.as_ref())))?;
        let rs = model.resistance(code);
        debug!(sample = i, adc = code, rs, "calibration sample");
        sum += rs;
    }
    let ro = baseline_from_sum(sum, n as usize, params.clean_air_factor)?;
    info!(ro, samples = n, "calibration complete");
    Ok(CalibrationState {
        baseline_resistance: ro,
        calibrated_at: Utc::now(),
        samples: n,
    })
}

/// Cloneable request flag for an on-demand recalibration. The control loop
/// consumes it at the next cycle boundary.
#[derive(Debug, Clone, Default)]
pub struct RecalibrationHandle {
    requested: Arc<AtomicBool>,
}

impl RecalibrationHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Clear and return the pending request.
    pub fn take(&self) -> bool {
        self.requested.swap(false, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airsense_traits::BoxError;
    use airsense_traits::clock::test_clock::TestClock;

    struct FixedAdc(u16);
    impl GasAdc for FixedAdc {
        fn read_raw(&mut self) -> Result<u16, BoxError> {
            Ok(self.0)
        }
    }

    #[test]
    fn baseline_is_mean_over_factor() {
        let ro = baseline_from_resistances(&[8.0; 50], 3.6).unwrap();
        assert!((ro - 8.0 / 3.6).abs() < 1e-12);
    }

    #[test]
    fn zero_resistances_are_rejected() {
        let err = baseline_from_resistances(&[0.0; 10], 3.6).unwrap_err();
        assert!(matches!(err, CalibrationError::InvalidBaseline(v) if v == 0.0));
    }

    #[test]
    fn calibrate_spaces_samples_with_the_clock() {
        let clock = TestClock::new();
        let params = CalibrationParams {
            samples: 5,
            interval: Duration::from_millis(100),
            clean_air_factor: 3.6,
        };
        let st = calibrate(
            &mut FixedAdc(2000),
            &ResistanceModel::default(),
            &clock,
            &params,
        )
        .unwrap();
        assert_eq!(st.samples(), 5);
        assert_eq!(clock.total_slept(), Duration::from_millis(400));
        assert!(st.baseline_resistance() > 0.0);
    }

    #[test]
    fn large_sample_counts_average_without_buffering() {
        let clock = TestClock::new();
        let params = CalibrationParams {
            samples: 200_000,
            interval: Duration::ZERO,
            clean_air_factor: 3.6,
        };
        let model = ResistanceModel::default();
        let st = calibrate(&mut FixedAdc(2000), &model, &clock, &params).unwrap();
        assert_eq!(st.samples(), 200_000);
        let expected = model.resistance(2000) / 3.6;
        assert!((st.baseline_resistance() - expected).abs() < 1e-9);
    }

    #[test]
    fn disconnected_sensor_fails_calibration() {
        let clock = TestClock::new();
        let err = calibrate(
            &mut FixedAdc(0),
            &ResistanceModel::default(),
            &clock,
            &CalibrationParams::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CalibrationError::InvalidBaseline(_)));
    }

    #[test]
    fn handle_take_clears_request() {
        let h = RecalibrationHandle::new();
        let h2 = h.clone();
        assert!(!h.take());
        h2.request();
        assert!(h.is_requested());
        assert!(h.take());
        assert!(!h.take());
    }
}
