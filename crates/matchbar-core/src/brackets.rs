//! Bracket balance checking.
//!
//! Two greedy passes: every `(` (scanned from the end) claims the nearest
//! unclaimed `)` to its right, and every `)` (scanned from the start) claims
//! the nearest unclaimed `(` to its left. A bracket that finds no partner is
//! reported. Each pass keeps its own claim set, so one token is claimed at
//! most once per pass. This is not a stack parser: some malformed sequences
//! report more brackets than a minimal repair would need.

use crate::matcher::{Comparison, Matcher};

/// Indexes of unmatched brackets, openers first (in scan order), then closers.
pub fn validate_brackets(tokens: &[Comparison]) -> Vec<usize> {
    let mut mismatched = Vec::new();
    check_pass(tokens, &mut mismatched, true);
    check_pass(tokens, &mut mismatched, false);
    mismatched
}

/// [`validate_brackets`] over the comparisons of a matcher sequence.
pub fn mismatched_brackets(matchers: &[Matcher]) -> Vec<usize> {
    let tokens: Vec<Comparison> = matchers.iter().map(|m| m.comparison).collect();
    validate_brackets(&tokens)
}

fn check_pass(tokens: &[Comparison], mismatched: &mut Vec<usize>, open: bool) {
    let (first, last) = if open {
        (Comparison::Open, Comparison::Close)
    } else {
        (Comparison::Close, Comparison::Open)
    };
    let mut claimed: Vec<usize> = Vec::new();

    let outer: Box<dyn Iterator<Item = usize>> = if open {
        Box::new((0..tokens.len()).rev())
    } else {
        Box::new(0..tokens.len())
    };

    for index in outer {
        if tokens[index] != first {
            continue;
        }
        let mut partners: Box<dyn Iterator<Item = usize>> = if open {
            Box::new(index + 1..tokens.len())
        } else {
            Box::new((0..index).rev())
        };
        match partners.find(|&i| tokens[i] == last && !claimed.contains(&i)) {
            Some(partner) => claimed.push(partner),
            None => mismatched.push(index),
        }
    }
}
