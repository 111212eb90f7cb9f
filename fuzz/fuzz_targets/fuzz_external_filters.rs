//! Fuzz target for the `--filters` JSON accepted by the CLI.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pa_common::ExternalFilter;

fuzz_target!(|data: &[u8]| {
    let _ = serde_json::from_slice::<Vec<ExternalFilter>>(data);
});
