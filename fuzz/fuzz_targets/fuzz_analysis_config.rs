//! Fuzz target for analysis.json parsing and validation.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pa_config::{validate_analysis, AnalysisConfig};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(config) = AnalysisConfig::from_str(text) {
        let _ = validate_analysis(&config);
    }
});
