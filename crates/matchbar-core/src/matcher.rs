//! Matcher data model: operators, comparisons, values and committed matchers.
//!
//! A [`Matcher`] serialises to a flat JSON object
//! (`key, operator, comparison, source, value, text`). The same shape is the
//! payload of a [`ReorderPayload`], so it must stay round-trippable.

use std::fmt;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Source name stored on free-text and bracket matchers.
pub const FREE_TEXT_SOURCE: &str = "";

/// Namespace prefix of a reorder payload kind.
pub const REORDER_PREFIX: &str = "multi-select/matcher/";

/// How a matcher joins the term before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[default]
    #[serde(rename = "&", alias = "and")]
    And,
    #[serde(rename = "|", alias = "or")]
    Or,
    /// Leading term of a run, or a closing bracket.
    #[serde(rename = "")]
    Empty,
}

impl Operator {
    /// Word form used when displaying a matcher.
    pub fn word(self) -> &'static str {
        match self {
            Operator::And => "and",
            Operator::Or => "or",
            Operator::Empty => "",
        }
    }
}

/// Relational symbol applied to a matcher's value, or a bracket token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparison {
    #[default]
    #[serde(rename = "=")]
    Equals,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "!")]
    NotEquals,
    #[serde(rename = "*")]
    Like,
    #[serde(rename = "!*")]
    NotLike,
    #[serde(rename = "<*")]
    StartsWith,
    #[serde(rename = ">*")]
    EndsWith,
    #[serde(rename = "(")]
    Open,
    #[serde(rename = ")")]
    Close,
    /// Raw free text with no comparison.
    #[serde(rename = "")]
    Raw,
}

/// Comparisons offered by sources that only support (in)equality.
pub const DEFAULT_COMPARISONS: &[Comparison] = &[Comparison::Equals, Comparison::NotEquals];

/// Comparisons suited to text sources.
pub const STRING_COMPARISONS: &[Comparison] = &[
    Comparison::Equals,
    Comparison::NotEquals,
    Comparison::Like,
    Comparison::NotLike,
    Comparison::StartsWith,
    Comparison::EndsWith,
];

/// Comparisons suited to numeric and date sources.
pub const NUMBER_COMPARISONS: &[Comparison] = &[
    Comparison::Equals,
    Comparison::Greater,
    Comparison::Less,
    Comparison::GreaterOrEqual,
    Comparison::LessOrEqual,
    Comparison::NotEquals,
];

/// Two-character symbols, tried before the single-character ones.
pub(crate) const TWO_CHAR_COMPARISONS: [Comparison; 5] = [
    Comparison::GreaterOrEqual,
    Comparison::LessOrEqual,
    Comparison::NotLike,
    Comparison::StartsWith,
    Comparison::EndsWith,
];

pub(crate) const ONE_CHAR_COMPARISONS: [Comparison; 5] = [
    Comparison::Equals,
    Comparison::Greater,
    Comparison::Less,
    Comparison::NotEquals,
    Comparison::Like,
];

impl Comparison {
    /// The symbol typed and displayed for this comparison.
    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::Equals => "=",
            Comparison::Greater => ">",
            Comparison::Less => "<",
            Comparison::GreaterOrEqual => ">=",
            Comparison::LessOrEqual => "<=",
            Comparison::NotEquals => "!",
            Comparison::Like => "*",
            Comparison::NotLike => "!*",
            Comparison::StartsWith => "<*",
            Comparison::EndsWith => ">*",
            Comparison::Open => "(",
            Comparison::Close => ")",
            Comparison::Raw => "",
        }
    }

    /// Parse a symbol; the empty string is [`Comparison::Raw`].
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let comparison = match symbol {
            "=" => Comparison::Equals,
            ">" => Comparison::Greater,
            "<" => Comparison::Less,
            ">=" => Comparison::GreaterOrEqual,
            "<=" => Comparison::LessOrEqual,
            "!" => Comparison::NotEquals,
            "*" => Comparison::Like,
            "!*" => Comparison::NotLike,
            "<*" => Comparison::StartsWith,
            ">*" => Comparison::EndsWith,
            "(" => Comparison::Open,
            ")" => Comparison::Close,
            "" => Comparison::Raw,
            _ => return None,
        };
        Some(comparison)
    }

    /// Whether this is a `(` or `)` token.
    pub fn is_bracket(self) -> bool {
        matches!(self, Comparison::Open | Comparison::Close)
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// The typed value a matcher filters on.
///
/// Serialised untagged so the matcher JSON stays flat. Dates are written as
/// UTC midnight timestamps (`2030-06-01T00:00:00.000Z`) and only that exact
/// form reads back as a [`Value::Date`], so date-like text stays text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Date(#[serde(with = "midnight_utc")] NaiveDate),
    Text(String),
}

mod midnight_utc {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer, de};

    const FORMAT: &str = "%Y-%m-%dT00:00:00.000Z";

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&date.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let text = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&text, FORMAT)
            .ok()
            .filter(|date| date.format(FORMAT).to_string() == text)
            .ok_or_else(|| de::Error::custom(format!("not a midnight UTC timestamp: {text}")))
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Text(String::new())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Value::Number(n) => write!(f, "{n}"),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

/// A committed filter term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matcher {
    /// Opaque identifier, stable across edits.
    pub key: String,
    pub operator: Operator,
    pub comparison: Comparison,
    /// Name of the producing data source, or [`FREE_TEXT_SOURCE`].
    pub source: String,
    pub value: Value,
    /// Display text; may differ from `value`.
    pub text: String,
}

impl Matcher {
    /// Create a matcher with a freshly minted key.
    pub fn new(
        operator: Operator,
        comparison: Comparison,
        source: impl Into<String>,
        value: impl Into<Value>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            key: new_key(),
            operator,
            comparison,
            source: source.into(),
            value: value.into(),
            text: text.into(),
        }
    }

    /// Create a bracket matcher. A closing bracket never carries an operator.
    pub fn bracket(comparison: Comparison, operator: Operator) -> Self {
        debug_assert!(comparison.is_bracket());
        let operator = if comparison == Comparison::Close {
            Operator::Empty
        } else {
            operator
        };
        Self::new(operator, comparison, FREE_TEXT_SOURCE, "", "")
    }

    /// Create a free-text matcher carrying `text` verbatim.
    pub fn free_text(operator: Operator, text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(
            operator,
            Comparison::Raw,
            FREE_TEXT_SOURCE,
            Value::Text(text.clone()),
            text,
        )
    }

    /// Replace the key, keeping every other field.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Whether this is a bracket token.
    pub fn is_bracket(&self) -> bool {
        self.comparison.is_bracket()
    }

    /// Whether this matcher holds unmatched free text.
    pub fn is_free_text(&self) -> bool {
        self.comparison == Comparison::Raw
    }
}

/// Mint a process-unique matcher key.
pub fn new_key() -> String {
    static SEED: OnceLock<u64> = OnceLock::new();
    static NEXT: AtomicU64 = AtomicU64::new(1);

    let seed = SEED.get_or_init(|| {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    });
    format!("{:08x}-{}", seed & 0xffff_ffff, NEXT.fetch_add(1, Ordering::Relaxed))
}

/// Whether the matcher at `index` leads its run: the first matcher, or the
/// first one inside an opening bracket. Leading matchers show no operator.
pub fn is_first(matchers: &[Matcher], index: usize) -> bool {
    index == 0
        || matchers
            .get(index - 1)
            .is_some_and(|m| m.comparison == Comparison::Open)
}

/// Human-readable form of a matcher, e.g. `or >= 5`.
pub fn matcher_display(matcher: &Matcher, first: bool, hide_operators: bool) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(3);
    if !first
        && !hide_operators
        && matcher.operator != Operator::Empty
        && matcher.comparison != Comparison::Close
    {
        parts.push(matcher.operator.word());
    }
    if matcher.comparison != Comparison::Equals {
        parts.push(matcher.comparison.symbol());
    }
    parts.push(&matcher.text);
    parts.retain(|p| !p.is_empty());
    parts.join(" ")
}

/// Tooltip text: `source: text`, plus `(value)` when it differs from the text.
pub fn matcher_tooltip(matcher: &Matcher) -> String {
    let value = matcher.value.to_string();
    if value == matcher.text {
        format!("{}: {}", matcher.source, matcher.text)
    } else {
        format!("{}: {}({value})", matcher.source, matcher.text)
    }
}

/// Errors decoding a reorder payload.
#[derive(Debug, thiserror::Error)]
pub enum ReorderError {
    #[error("payload kind {0:?} is not a matcher payload")]
    UnknownKind(String),

    #[error("malformed matcher payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("payload kind does not match the carried matcher {0}")]
    KeyMismatch(String),

    #[error("matcher {0} cannot be dropped onto itself")]
    SelfDrop(String),
}

/// Transport-neutral "reorder by key" payload: a namespaced kind plus the
/// dragged matcher serialised as JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderPayload {
    /// `multi-select/matcher/<key>`.
    pub kind: String,
    /// The matcher as a JSON string.
    pub data: String,
}

impl ReorderPayload {
    /// Build the payload carried while `matcher` is being moved.
    pub fn for_matcher(matcher: &Matcher) -> Result<Self, ReorderError> {
        Ok(Self {
            kind: format!("{REORDER_PREFIX}{}", matcher.key),
            data: serde_json::to_string(matcher)?,
        })
    }

    /// Whether this payload carries the matcher with `key`.
    pub fn carries(&self, key: &str) -> bool {
        self.kind
            .strip_prefix(REORDER_PREFIX)
            .is_some_and(|k| k == key)
    }

    /// Decode the carried matcher.
    pub fn matcher(&self) -> Result<Matcher, ReorderError> {
        let Some(key) = self.kind.strip_prefix(REORDER_PREFIX) else {
            return Err(ReorderError::UnknownKind(self.kind.clone()));
        };
        let matcher: Matcher = serde_json::from_str(&self.data)?;
        if matcher.key != key {
            return Err(ReorderError::KeyMismatch(matcher.key));
        }
        Ok(matcher)
    }
}
