#![no_main]
use airsense_core::{GasCurve, GasTable, LineSpec};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let Ok(gases) = GasTable::new(vec![
        GasCurve::new("CO2", 110.47, -2.862).with_offset(400.0),
        GasCurve::new("NH3", 102.2, -2.473),
    ]) else {
        return;
    };
    let _ = LineSpec::parse(data, 0, 0, &gases);
});
