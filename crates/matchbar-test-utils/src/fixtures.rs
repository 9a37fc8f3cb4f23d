//! Reference data sources.
//!
//! The four sources every engine test leans on: a static list, a delayed
//! async list, a numeric predicate and a word regex. Each uses a different
//! precedence so category ordering is observable.

use std::time::Duration;

use matchbar_core::matcher::{Comparison, NUMBER_COMPARISONS, STRING_COMPARISONS};
use matchbar_core::source::{
    DataSource, LookupSource, QueryRequest, SourceError, SourceInfo, ValueSource, parse_number,
};
use regex::Regex;
use serde_json::json;

/// Items of [`list_source`].
pub const LIST_ITEMS: [&str; 3] = ["asdas", "assda", "loadsp"];

/// Items filtered by [`promise_source`].
pub const PROMISE_ITEMS: [&str; 3] = ["delayed", "aploked", "loadxx"];

/// Latency of [`promise_source`] answers.
pub const PROMISE_DELAY: Duration = Duration::from_millis(250);

/// Static list, precedence 2.
pub fn list_source() -> DataSource {
    let mut info = SourceInfo::new("list", "List");
    info.precedence = Some(2);
    info.comparisons = STRING_COMPARISONS.to_vec();
    LookupSource::from_items(info, LIST_ITEMS.iter().map(|s| json!(s)).collect())
        .ignore_case(true)
        .into()
}

/// Async list answering after `delay` with the items containing the search
/// text. Precedence 1.
pub fn promise_source_with_delay(delay: Duration) -> DataSource {
    let mut info = SourceInfo::new("promise", "Promise");
    info.precedence = Some(1);
    info.comparisons = STRING_COMPARISONS.to_vec();
    LookupSource::from_query(info, move |req: QueryRequest| async move {
        tokio::time::sleep(delay).await;
        let needle = req.text.to_lowercase();
        Ok::<_, SourceError>(
            PROMISE_ITEMS
                .iter()
                .filter(|item| item.contains(needle.as_str()))
                .map(|item| json!(item))
                .collect(),
        )
    })
    .into()
}

/// [`promise_source_with_delay`] with [`PROMISE_DELAY`].
pub fn promise_source() -> DataSource {
    promise_source_with_delay(PROMISE_DELAY)
}

/// Accepts any number. No precedence.
pub fn numeric_source() -> DataSource {
    let mut info = SourceInfo::new("numeric", "Numeric");
    info.comparisons = NUMBER_COMPARISONS.to_vec();
    ValueSource::predicate(info, |text| text.trim().parse::<f64>().is_ok(), parse_number).into()
}

/// Accepts words of two letters or more. Precedence 3.
pub fn word_source() -> DataSource {
    let mut info = SourceInfo::new("word", "Word");
    info.precedence = Some(3);
    info.comparisons = STRING_COMPARISONS.to_vec();
    let pattern = Regex::new(r"^[a-zA-Z]{2,}$").expect("valid word pattern");
    ValueSource::pattern(info, pattern, |text| text.into()).into()
}

/// A functional source: only offered while a function names it.
pub fn client_source() -> DataSource {
    let mut info = SourceInfo::new("Client", "Client");
    info.functional = true;
    info.comparisons = vec![Comparison::Equals];
    LookupSource::from_items(info, vec![json!("ACME"), json!("Globex"), json!("Initech")]).into()
}

/// The four reference sources, in registration order.
pub fn reference_sources() -> Vec<DataSource> {
    vec![list_source(), promise_source(), numeric_source(), word_source()]
}
