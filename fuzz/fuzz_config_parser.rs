//! Fuzz target for the TOML settings parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser
//!
//! Feeds arbitrary text through `MatchbarConfig::parse()` and, when that
//! succeeds, through the runtime source builder (regex compilation included).

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(settings) = matchbar_config::MatchbarConfig::parse(s) {
            let _ = matchbar_core::config::Config::from_settings(&settings, Vec::new());
        }
    }
});
