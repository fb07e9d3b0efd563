#![no_main]
use libfuzzer_sys::fuzz_target;

// Arbitrary TOML must either be rejected or produce a pipeline; never panic.
fuzz_target!(|data: &str| {
    if let Ok(cfg) = airsense_config::load_toml(data) {
        let _ = airsense_core::Pipeline::try_from(&cfg);
    }
});
