//! Fuzz target: stored configuration blob
//!
//! Feeds arbitrary bytes to `BmsConfig::from_blob` and checks that any
//! blob it accepts also validates and re-encodes.
//!
//! cargo fuzz run fuzz_config_blob

#![no_main]

use bms_core::config::BmsConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(config) = BmsConfig::from_blob(data) {
        assert!(config.validate().is_ok());
        assert!(config.to_blob().is_ok());
    }
});
