//! Small numeric helpers.

/// Round to `places` decimal places; non-finite values pass through.
#[inline]
pub fn round_to(v: f64, places: u32) -> f64 {
    if !v.is_finite() {
        return v;
    }
    let scale = 10f64.powi(places.min(12) as i32);
    (v * scale).round() / scale
}
