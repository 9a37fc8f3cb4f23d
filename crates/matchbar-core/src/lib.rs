#![deny(unsafe_code)]

//! Matchbar expression-editing engine.
//!
//! Turns keystrokes and pasted text into an ordered list of typed
//! [`Matcher`]s. Suggestions come from a registry of host-supplied
//! [`DataSource`]s (some answering asynchronously), every commit is checked
//! against bracket, comparison and selection-limit rules, and the
//! [`SequenceController`] owns the list and broadcasts changes to hosts.

use std::future::Future;
use std::pin::Pin;

/// A type-erased, `Send`-safe, boxed future: the return type for async trait
/// methods that require dynamic dispatch (`dyn Trait`).
///
/// Native `async fn` in traits produces opaque return types that are **not**
/// object-safe. Traits consumed via `Arc<dyn Trait>` must return a concrete
/// `Pin<Box<dyn Future>>` instead. This alias keeps those signatures readable.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Suggestion aggregation across sources, with generation tokens.
pub mod aggregate;
/// Bracket balance checks.
pub mod brackets;
/// Runtime engine configuration.
pub mod config;
/// In-memory `tracing` capture for hosts.
pub mod diagnostics;
/// Transport-neutral keys and the slot text buffer.
pub mod keys;
/// The matcher data model and reorder payload.
pub mod matcher;
/// Bulk paste parsing.
pub mod paste;
/// The matcher list owner.
pub mod sequence;
/// The per-slot edit state machine.
pub mod session;
/// Lookup and value sources.
pub mod source;
/// Commit-time validation.
pub mod validate;

pub use aggregate::{Aggregator, Generation, ParsedSearch, Suggestion, Suggestions};
pub use brackets::{mismatched_brackets, validate_brackets};
pub use config::{Config, OperatorMode};
pub use diagnostics::{DiagnosticEntry, DiagnosticsLayer, DiagnosticsReader};
pub use keys::{Key, KeyInput, Modifiers};
pub use matcher::{Comparison, Matcher, Operator, ReorderPayload, Value};
pub use paste::{FreeTextAction, PasteOutcome, parse_paste};
pub use sequence::{SequenceController, SequenceEvent};
pub use session::{EditSession, KeyOutcome, SessionEvent, SessionState};
pub use source::{DataSource, LookupQuery, LookupSource, QueryRequest, SourceError, SourceInfo, ValueSource};
pub use validate::MatcherError;
