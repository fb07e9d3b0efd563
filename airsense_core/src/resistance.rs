//! Voltage-divider model: raw ADC code to sensor resistance.
//!
//! The sensor sits on the high side of a divider with load resistor RL, the
//! ADC measures the voltage across RL:
//!
//! ```text
//! V  = adc * (Vs / full_scale)
//! Rs = Vs * RL / V - RL
//! ```
//!
//! Rs comes out in the unit of RL (kOhm for the deployed 10k load).

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResistanceModel {
    pub supply_voltage: f64,
    pub load_resistance: f64,
    pub full_scale_code: u16,
    /// Reported when the divider saturates (V >= Vs).
    pub saturation_sentinel: f64,
}

impl Default for ResistanceModel {
    fn default() -> Self {
        Self {
            supply_voltage: 3.3,
            load_resistance: 10.0,
            full_scale_code: 4095,
            saturation_sentinel: 0.1,
        }
    }
}

impl ResistanceModel {
    #[inline]
    pub fn voltage(&self, adc: u16) -> f64 {
        f64::from(adc) * (self.supply_voltage / f64::from(self.full_scale_code.max(1)))
    }

    /// Estimated sensor resistance for one raw sample. Never negative.
    ///
    /// - zero volts (open circuit) gives `0.0`
    /// - a saturated divider gives `saturation_sentinel`
    pub fn resistance(&self, adc: u16) -> f64 {
        let v = self.voltage(adc);
        if v <= 0.0 {
            return 0.0;
        }
        if v >= self.supply_voltage {
            return self.saturation_sentinel;
        }
        ((self.supply_voltage * self.load_resistance) / v - self.load_resistance).max(0.0)
    }
}
