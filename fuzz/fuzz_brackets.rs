//! Fuzz target for bracket validation.
//!
//! Run with: cargo +nightly fuzz run fuzz_brackets
//!
//! Each byte picks `(`, `)` or a plain term. Every reported index must be in
//! range and point at a bracket.

#![no_main]

use libfuzzer_sys::fuzz_target;
use matchbar_core::matcher::Comparison;

fuzz_target!(|data: &[u8]| {
    let comparisons: Vec<Comparison> = data
        .iter()
        .map(|b| match b % 3 {
            0 => Comparison::Open,
            1 => Comparison::Close,
            _ => Comparison::Equals,
        })
        .collect();

    let mismatched = matchbar_core::validate_brackets(&comparisons);
    for index in mismatched {
        assert!(comparisons[index].is_bracket());
    }
});
