//! Data source registry.
//!
//! A [`DataSource`] is either a [`LookupSource`] (static items or an async
//! query) or a [`ValueSource`] (free-typed text validated by a pattern or
//! predicate and projected to a [`Value`]). Sources are supplied by the host
//! and treated as read-only by the engine.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use chrono::{Months, NaiveDate};
use regex::Regex;

use matchbar_config::SourceDef;

use crate::BoxFuture;
use crate::matcher::{Comparison, DEFAULT_COMPARISONS, Matcher, Operator, Value};

/// One raw item produced by a lookup source: a string, number or structured record.
pub type SourceItem = serde_json::Value;

/// Projects an item to its display text.
pub type TextGetter = Arc<dyn Fn(&SourceItem) -> String + Send + Sync>;

/// Projects an item to its matcher value.
pub type ValueGetter = Arc<dyn Fn(&SourceItem) -> Value + Send + Sync>;

/// Converts matched free text to a value.
pub type ValueProjector = Arc<dyn Fn(&str) -> Value + Send + Sync>;

/// Errors from async lookup queries.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    #[error("query failed: {0}")]
    Query(String),

    #[error("query timed out")]
    Timeout,
}

/// Errors turning settings-file definitions into runtime sources.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] matchbar_config::ConfigError),

    #[error("source {source_name:?} has an invalid pattern: {error}")]
    Pattern {
        source_name: String,
        error: regex::Error,
    },

    #[error("unknown comparison symbol {0:?}")]
    Comparison(String),

    #[error("unknown value kind {0:?}")]
    ValueKind(String),
}

/// Arguments handed to an async lookup.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    /// Search text with operator and comparison prefixes stripped.
    pub text: String,
    /// Operator parsed from the edit buffer.
    pub operator: Operator,
    /// Matchers currently in the sequence.
    pub matchers: Vec<Matcher>,
}

/// An async lookup. Each call is independent; callers may ignore the result.
pub trait LookupQuery: Send + Sync {
    fn query(&self, request: QueryRequest) -> BoxFuture<'static, Result<Vec<SourceItem>, SourceError>>;
}

impl<F, Fut> LookupQuery for F
where
    F: Fn(QueryRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<SourceItem>, SourceError>> + Send + 'static,
{
    fn query(&self, request: QueryRequest) -> BoxFuture<'static, Result<Vec<SourceItem>, SourceError>> {
        Box::pin(self(request))
    }
}

/// Fields shared by every source variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    /// Identity, stored on produced matchers.
    pub name: String,
    /// Category label.
    pub title: String,
    /// Legal comparisons.
    pub comparisons: Vec<Comparison>,
    /// Category ordering weight; higher sorts earlier.
    pub precedence: Option<u32>,
    /// Maximum concurrent matchers from this source.
    pub selection_limit: Option<usize>,
    /// Only offered while an active function names this source.
    pub functional: bool,
}

impl SourceInfo {
    pub fn new(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            comparisons: DEFAULT_COMPARISONS.to_vec(),
            precedence: None,
            selection_limit: None,
            functional: false,
        }
    }
}

/// Where a lookup source gets its items.
#[derive(Clone)]
pub enum Backing {
    Static(Vec<SourceItem>),
    Query(Arc<dyn LookupQuery>),
}

impl fmt::Debug for Backing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backing::Static(items) => f.debug_tuple("Static").field(&items.len()).finish(),
            Backing::Query(_) => f.write_str("Query(..)"),
        }
    }
}

/// A source of candidate items.
#[derive(Clone)]
pub struct LookupSource {
    pub info: SourceInfo,
    pub backing: Backing,
    pub text_getter: Option<TextGetter>,
    pub value_getter: Option<ValueGetter>,
    pub ignore_case: bool,
    pub item_limit: Option<usize>,
    pub search_start_length: Option<usize>,
    /// Whether bulk paste may auto-match against this source.
    pub match_on_paste: bool,
}

impl fmt::Debug for LookupSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookupSource")
            .field("info", &self.info)
            .field("backing", &self.backing)
            .field("ignore_case", &self.ignore_case)
            .field("item_limit", &self.item_limit)
            .field("search_start_length", &self.search_start_length)
            .field("match_on_paste", &self.match_on_paste)
            .finish_non_exhaustive()
    }
}

impl LookupSource {
    fn with_backing(info: SourceInfo, backing: Backing) -> Self {
        Self {
            info,
            backing,
            text_getter: None,
            value_getter: None,
            ignore_case: false,
            item_limit: None,
            search_start_length: None,
            match_on_paste: true,
        }
    }

    /// A lookup over a fixed item list.
    pub fn from_items(info: SourceInfo, items: Vec<SourceItem>) -> Self {
        Self::with_backing(info, Backing::Static(items))
    }

    /// A lookup backed by an async query.
    pub fn from_query(info: SourceInfo, query: impl LookupQuery + 'static) -> Self {
        Self::with_backing(info, Backing::Query(Arc::new(query)))
    }

    pub fn text_getter(mut self, getter: impl Fn(&SourceItem) -> String + Send + Sync + 'static) -> Self {
        self.text_getter = Some(Arc::new(getter));
        self
    }

    pub fn value_getter(mut self, getter: impl Fn(&SourceItem) -> Value + Send + Sync + 'static) -> Self {
        self.value_getter = Some(Arc::new(getter));
        self
    }

    pub fn ignore_case(mut self, ignore: bool) -> Self {
        self.ignore_case = ignore;
        self
    }

    pub fn item_limit(mut self, limit: usize) -> Self {
        self.item_limit = Some(limit);
        self
    }

    pub fn search_start_length(mut self, length: usize) -> Self {
        self.search_start_length = Some(length);
        self
    }

    pub fn match_on_paste(mut self, enabled: bool) -> Self {
        self.match_on_paste = enabled;
        self
    }

    /// Display text of an item.
    pub fn item_text(&self, item: &SourceItem) -> String {
        match (&self.text_getter, item) {
            (Some(getter), SourceItem::Object(_)) => getter(item),
            _ => plain_text(item),
        }
    }

    /// Matcher value of an item.
    pub fn item_value(&self, item: &SourceItem) -> Value {
        match (&self.value_getter, item) {
            (Some(getter), SourceItem::Object(_)) => getter(item),
            (_, SourceItem::Number(n)) => n.as_f64().map_or_else(|| Value::Text(n.to_string()), Value::Number),
            _ => Value::Text(plain_text(item)),
        }
    }

    /// Substring match of the item's display text against `search`.
    pub fn matches(&self, item: &SourceItem, search: &str) -> bool {
        let text = self.item_text(item);
        if self.ignore_case {
            text.to_uppercase().contains(&search.to_uppercase())
        } else {
            text.contains(search)
        }
    }

    /// Whether the item's display text equals `token` (honouring `ignore_case`).
    pub fn equals(&self, text: &str, token: &str) -> bool {
        if self.ignore_case {
            text.to_uppercase() == token.to_uppercase()
        } else {
            text == token
        }
    }
}

fn plain_text(item: &SourceItem) -> String {
    match item {
        SourceItem::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// How a value source recognises typed text.
#[derive(Clone)]
pub enum ValueMatch {
    Pattern(Regex),
    Predicate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl ValueMatch {
    pub fn is_match(&self, text: &str) -> bool {
        match self {
            ValueMatch::Pattern(re) => re.is_match(text),
            ValueMatch::Predicate(f) => f(text),
        }
    }
}

impl fmt::Debug for ValueMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueMatch::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            ValueMatch::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// A source that validates free-typed text directly.
#[derive(Clone)]
pub struct ValueSource {
    pub info: SourceInfo,
    pub matcher: ValueMatch,
    pub value: ValueProjector,
}

impl fmt::Debug for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueSource")
            .field("info", &self.info)
            .field("matcher", &self.matcher)
            .finish_non_exhaustive()
    }
}

impl ValueSource {
    /// A value source recognising text with a regular expression.
    pub fn pattern(
        info: SourceInfo,
        pattern: Regex,
        value: impl Fn(&str) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            info,
            matcher: ValueMatch::Pattern(pattern),
            value: Arc::new(value),
        }
    }

    /// A value source recognising text with a predicate.
    pub fn predicate(
        info: SourceInfo,
        predicate: impl Fn(&str) -> bool + Send + Sync + 'static,
        value: impl Fn(&str) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            info,
            matcher: ValueMatch::Predicate(Arc::new(predicate)),
            value: Arc::new(value),
        }
    }

    /// Project `text` when it is accepted.
    pub fn evaluate(&self, text: &str) -> Option<Value> {
        self.matcher.is_match(text).then(|| (self.value)(text))
    }
}

/// A searchable domain, discriminated by an explicit tag.
#[derive(Debug, Clone)]
pub enum DataSource {
    Lookup(LookupSource),
    Value(ValueSource),
}

/// Discriminant of a [`DataSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Lookup,
    Value,
}

impl From<LookupSource> for DataSource {
    fn from(source: LookupSource) -> Self {
        DataSource::Lookup(source)
    }
}

impl From<ValueSource> for DataSource {
    fn from(source: ValueSource) -> Self {
        DataSource::Value(source)
    }
}

impl DataSource {
    pub fn info(&self) -> &SourceInfo {
        match self {
            DataSource::Lookup(s) => &s.info,
            DataSource::Value(s) => &s.info,
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            DataSource::Lookup(_) => SourceKind::Lookup,
            DataSource::Value(_) => SourceKind::Value,
        }
    }

    pub fn name(&self) -> &str {
        &self.info().name
    }

    pub fn title(&self) -> &str {
        &self.info().title
    }

    /// Whether `comparison` is legal for this source.
    pub fn allows(&self, comparison: Comparison) -> bool {
        self.info().comparisons.contains(&comparison)
    }

    /// Build a runtime source from a settings-file definition.
    pub fn from_def(def: &SourceDef) -> Result<Self, BuildError> {
        let comparisons = def
            .comparisons
            .iter()
            .map(|s| Comparison::from_symbol(s).ok_or_else(|| BuildError::Comparison(s.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        let info = SourceInfo {
            name: def.name.clone(),
            title: def.title.clone(),
            comparisons,
            precedence: def.precedence,
            selection_limit: def.selection_limit,
            functional: def.functional,
        };

        if def.is_list() {
            let mut source = LookupSource::from_items(info, def.items.clone())
                .ignore_case(def.ignore_case)
                .match_on_paste(def.match_on_paste);
            source.item_limit = def.item_limit;
            source.search_start_length = def.search_start_length;
            if let Some(field) = def.text_field.clone() {
                source = source.text_getter(move |item| plain_text(&item[field.as_str()]));
            }
            if let Some(field) = def.value_field.clone() {
                source = source.value_getter(move |item| match &item[field.as_str()] {
                    SourceItem::Number(n) => n.as_f64().map_or_else(|| Value::Text(n.to_string()), Value::Number),
                    other => Value::Text(plain_text(other)),
                });
            }
            return Ok(DataSource::Lookup(source));
        }

        let pattern = def.pattern.as_deref().unwrap_or_default();
        let regex = Regex::new(pattern).map_err(|error| BuildError::Pattern {
            source_name: def.name.clone(),
            error,
        })?;
        let projector: ValueProjector = match def.value.as_str() {
            "text" => Arc::new(|text: &str| Value::Text(text.to_string())),
            "number" => Arc::new(parse_number),
            "date" => Arc::new(|text: &str| parse_date(text, chrono::Local::now().date_naive())),
            other => return Err(BuildError::ValueKind(other.to_string())),
        };
        Ok(DataSource::Value(ValueSource {
            info,
            matcher: ValueMatch::Pattern(regex),
            value: projector,
        }))
    }
}

/// Parse text as a number, keeping it as text when it is not one.
pub fn parse_number(text: &str) -> Value {
    text.trim()
        .parse::<f64>()
        .map_or_else(|_| Value::Text(text.to_string()), Value::Number)
}

/// Parse a date: `YYYY-MM-DD`, `DD/MM/YYYY`, or relative `<n>y` / `<n>m`
/// counted from `today`. Unparseable text stays text.
pub fn parse_date(text: &str, today: NaiveDate) -> Value {
    let text = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Value::Date(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%d/%m/%Y") {
        return Value::Date(date);
    }

    let Some(unit) = text.chars().last() else {
        return Value::Text(String::new());
    };
    let amount = text[..text.len() - unit.len_utf8()].parse::<u32>();
    let shifted = match (unit.to_ascii_lowercase(), amount) {
        ('y', Ok(years)) => years
            .checked_mul(12)
            .and_then(|months| today.checked_add_months(Months::new(months))),
        ('m', Ok(months)) => today.checked_add_months(Months::new(months)),
        _ => None,
    };
    shifted.map_or_else(|| Value::Text(text.to_string()), Value::Date)
}
