//! Fuzz target for the paste tokenizer and search-prefix parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_paste_tokenizer

#![no_main]

use libfuzzer_sys::fuzz_target;
use matchbar_core::aggregate::{parse_search, ParseRules};
use matchbar_core::config::Config;
use matchbar_core::paste::tokenize;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let config = Config::new(Vec::new());
    let rules = ParseRules::new(&config, None);
    for token in tokenize(text, true) {
        assert!(!token.is_empty());
        let _ = parse_search(&token, &rules);
    }
});
