//! Suggestion aggregation.
//!
//! Typed text is parsed for a leading operator and comparison, then the
//! remaining search text is dispatched to every eligible source. Static
//! lookups and value sources answer synchronously. Async lookups are spawned
//! onto the runtime and answer through a channel; each answer carries the
//! [`Generation`] it was dispatched under and is dropped on arrival when a
//! newer keystroke has since been processed. Sources are never cancelled.

use std::fmt;
use std::sync::Arc;

use matchbar_config::Nemonic;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::matcher::{Comparison, Matcher, ONE_CHAR_COMPARISONS, Operator, TWO_CHAR_COMPARISONS, Value};
use crate::source::{Backing, DataSource, LookupSource, QueryRequest, SourceError, SourceInfo, SourceItem};

/// Title of the pseudo-category listing functions.
pub const FUNCTIONS_CATEGORY: &str = "Functions";

/// Per-keystroke token used to recognise stale async answers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One selectable suggestion.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    /// Producing source, or the function name for function options.
    pub source: String,
    pub value: Value,
    pub text: String,
    /// Selecting this option activates a function instead of committing.
    pub function: bool,
}

/// Options from one source title.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub title: String,
    /// Stored precedence (0 when the source has none).
    pub precedence: u32,
    pub options: Vec<Suggestion>,
    /// The functions pseudo-category, kept at the front.
    pub pinned: bool,
}

/// Ordered categories of suggestions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Suggestions {
    categories: Vec<Category>,
}

impl Suggestions {
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Total options across categories.
    pub fn total(&self) -> usize {
        self.categories.iter().map(|c| c.options.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Option at a flattened index.
    pub fn get(&self, index: usize) -> Option<&Suggestion> {
        self.options().nth(index)
    }

    /// All options in display order.
    pub fn options(&self) -> impl Iterator<Item = &Suggestion> {
        self.categories.iter().flat_map(|c| c.options.iter())
    }

    /// Category titles in display order.
    pub fn titles(&self) -> Vec<&str> {
        self.categories.iter().map(|c| c.title.as_str()).collect()
    }

    /// Flattened index of the first option of the category after (or before)
    /// the one holding `current`, wrapping around.
    pub fn category_jump(&self, current: usize, forward: bool) -> usize {
        let count = self.categories.len();
        if count == 0 {
            return 0;
        }
        let mut start = 0;
        let mut holder = count - 1;
        for (index, category) in self.categories.iter().enumerate() {
            if current < start + category.options.len() {
                holder = index;
                break;
            }
            start += category.options.len();
        }
        let target = if forward {
            (holder + 1) % count
        } else {
            (holder + count - 1) % count
        };
        self.start_of(target)
    }

    fn start_of(&self, category: usize) -> usize {
        self.categories[..category].iter().map(|c| c.options.len()).sum()
    }

    /// Merge options from one source. Options join an existing category of the
    /// same title (deduplicated by value) or open a new one positioned by
    /// precedence.
    pub(crate) fn merge(&mut self, info: &SourceInfo, options: Vec<Suggestion>, limit: usize) {
        if options.is_empty() {
            return;
        }
        if let Some(existing) = self.categories.iter_mut().find(|c| !c.pinned && c.title == info.title) {
            for option in options {
                if !existing.options.iter().any(|o| o.value == option.value) {
                    existing.options.push(option);
                }
            }
            existing.options.truncate(limit);
            return;
        }

        let mut options = options;
        options.truncate(limit);
        let category = Category {
            title: info.title.clone(),
            precedence: info.precedence.unwrap_or(0),
            options,
            pinned: false,
        };
        let position = info.precedence.filter(|p| *p > 0).and_then(|p| {
            self.categories
                .iter()
                .position(|c| !c.pinned && c.precedence < p)
        });
        match position {
            Some(index) => self.categories.insert(index, category),
            None => self.categories.push(category),
        }
    }

    fn pin_functions(&mut self, options: Vec<Suggestion>) {
        if options.is_empty() {
            return;
        }
        self.categories.insert(
            0,
            Category {
                title: FUNCTIONS_CATEGORY.to_string(),
                precedence: 0,
                options,
                pinned: true,
            },
        );
    }
}

/// Search text split into operator, comparison and residual text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSearch {
    pub operator: Option<Operator>,
    pub comparison: Option<Comparison>,
    pub text: String,
}

impl ParsedSearch {
    /// The bracket typed, when the text short-circuits to a bracket commit.
    pub fn bracket(&self) -> Option<Comparison> {
        self.comparison.filter(|c| c.is_bracket())
    }
}

/// What the parser may recognise.
#[derive(Debug, Clone, Copy)]
pub struct ParseRules<'a> {
    pub and_symbol: &'a str,
    pub or_symbol: &'a str,
    pub operators: bool,
    pub brackets: bool,
}

impl<'a> ParseRules<'a> {
    /// Rules for the configured mode, narrowed by the active function.
    pub fn new(config: &'a Config, function: Option<&Nemonic>) -> Self {
        Self {
            and_symbol: &config.and_symbol,
            or_symbol: &config.or_symbol,
            operators: config.mode.allows_operators() && !function.is_some_and(|f| f.no_and_or),
            brackets: config.mode.allows_brackets() && !function.is_some_and(|f| f.no_brackets),
        }
    }
}

/// Parse typed text. Two-character comparisons are tried before one-character
/// ones. Operator words need a following space or the end of text.
pub fn parse_search(text: &str, rules: &ParseRules<'_>) -> ParsedSearch {
    let mut parsed = ParsedSearch::default();
    let mut rest = text.trim();
    if rest.is_empty() {
        return parsed;
    }

    if rules.operators {
        let candidates = [
            (rules.and_symbol, Operator::And),
            (rules.or_symbol, Operator::Or),
            ("and", Operator::And),
            ("or", Operator::Or),
        ];
        if let Some((operator, tail)) = candidates
            .iter()
            .find_map(|(token, op)| strip_token(rest, token).map(|tail| (*op, tail)))
        {
            parsed.operator = Some(operator);
            rest = tail.trim_start();
        }
    }

    if rules.brackets {
        for bracket in [Comparison::Open, Comparison::Close] {
            if let Some(tail) = rest.strip_prefix(bracket.symbol()) {
                parsed.comparison = Some(bracket);
                parsed.text = tail.trim().to_string();
                return parsed;
            }
        }
    }

    if let Some((comparison, tail)) = TWO_CHAR_COMPARISONS
        .iter()
        .chain(ONE_CHAR_COMPARISONS.iter())
        .find_map(|c| rest.strip_prefix(c.symbol()).map(|tail| (*c, tail)))
    {
        parsed.comparison = Some(comparison);
        rest = tail;
    }

    parsed.text = rest.trim().to_string();
    parsed
}

fn strip_token<'t>(text: &'t str, token: &str) -> Option<&'t str> {
    if token.is_empty() {
        return None;
    }
    let head = text.get(..token.len())?;
    if !head.eq_ignore_ascii_case(token) {
        return None;
    }
    let tail = &text[token.len()..];
    let needs_boundary = token.ends_with(|c: char| c.is_alphanumeric());
    (!needs_boundary || tail.is_empty() || tail.starts_with(char::is_whitespace)).then_some(tail)
}

/// Whether `source` is offered under the active function.
pub fn is_eligible(source: &DataSource, function: Option<&Nemonic>) -> bool {
    match function {
        Some(function) => function.permits(source.name()),
        None => !source.info().functional,
    }
}

pub(crate) fn min_length(config: &Config, source: &DataSource) -> usize {
    match source {
        DataSource::Lookup(lookup) => lookup.search_start_length,
        DataSource::Value(_) => None,
    }
    .unwrap_or(config.search_start_length)
}

pub(crate) fn item_limit(config: &Config, source: &DataSource) -> usize {
    match source {
        DataSource::Lookup(lookup) => lookup.item_limit,
        DataSource::Value(_) => None,
    }
    .unwrap_or(config.default_item_limit)
}

pub(crate) fn lookup_options<'i>(
    source: &LookupSource,
    items: impl Iterator<Item = &'i SourceItem>,
    limit: usize,
) -> Vec<Suggestion> {
    items
        .take(limit)
        .map(|item| Suggestion {
            source: source.info.name.clone(),
            value: source.item_value(item),
            text: source.item_text(item),
            function: false,
        })
        .collect()
}

pub(crate) fn value_option(source: &DataSource, text: &str) -> Option<Suggestion> {
    let DataSource::Value(value_source) = source else {
        return None;
    };
    value_source.evaluate(text).map(|value| Suggestion {
        source: value_source.info.name.clone(),
        text: value.to_string(),
        value,
        function: false,
    })
}

/// An async lookup's answer.
#[derive(Debug)]
pub struct SourceResponse {
    pub generation: Generation,
    pub source: String,
    pub items: Result<Vec<SourceItem>, SourceError>,
}

/// One keystroke's search inputs.
#[derive(Debug, Clone, Copy)]
pub struct SearchRequest<'a> {
    pub text: &'a str,
    pub matchers: &'a [Matcher],
    pub function: Option<&'a Nemonic>,
    /// Offer the functions pseudo-category.
    pub allow_functions: bool,
}

/// Merges suggestions from every eligible source for the latest keystroke.
pub struct Aggregator {
    config: Arc<Config>,
    generation: Generation,
    suggestions: Suggestions,
    pending: usize,
    tx: mpsc::UnboundedSender<SourceResponse>,
    rx: mpsc::UnboundedReceiver<SourceResponse>,
}

impl fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aggregator")
            .field("generation", &self.generation)
            .field("suggestions", &self.suggestions)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl Aggregator {
    pub fn new(config: Arc<Config>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            config,
            generation: Generation::default(),
            suggestions: Suggestions::default(),
            pending: 0,
            tx,
            rx,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn suggestions(&self) -> &Suggestions {
        &self.suggestions
    }

    /// Async queries of the current generation still outstanding.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Drop all suggestions and orphan any in-flight queries.
    pub fn clear(&mut self) {
        self.generation = self.generation.next();
        self.suggestions = Suggestions::default();
        self.pending = 0;
    }

    /// Process a keystroke: mint a generation, parse the text and query
    /// sources. Returns the parse; a bracket parse issues no queries.
    pub fn search(&mut self, request: SearchRequest<'_>) -> ParsedSearch {
        self.clear();
        let config = Arc::clone(&self.config);
        let parsed = parse_search(request.text, &ParseRules::new(&config, request.function));
        if parsed.bracket().is_some() || parsed.text.is_empty() {
            return parsed;
        }

        let generation = self.generation;
        let length = parsed.text.chars().count();

        if request.allow_functions && request.function.is_none() && length >= config.search_start_length {
            let needle = parsed.text.to_lowercase();
            let options = config
                .functions
                .iter()
                .filter(|f| f.name.to_lowercase().contains(&needle))
                .take(config.default_item_limit)
                .map(|f| Suggestion {
                    source: f.name.clone(),
                    value: Value::Text(f.name.clone()),
                    text: f.name.clone(),
                    function: true,
                })
                .collect();
            self.suggestions.pin_functions(options);
        }

        for source in config.sources.iter().filter(|ds| is_eligible(ds, request.function)) {
            if length < min_length(&config, source) {
                continue;
            }
            let limit = item_limit(&config, source);
            match source {
                DataSource::Lookup(lookup) => match &lookup.backing {
                    Backing::Static(items) => {
                        let options = lookup_options(
                            lookup,
                            items.iter().filter(|item| lookup.matches(item, &parsed.text)),
                            limit,
                        );
                        self.suggestions.merge(&lookup.info, options, limit);
                    }
                    Backing::Query(query) => {
                        let future = query.query(QueryRequest {
                            text: parsed.text.clone(),
                            operator: parsed.operator.unwrap_or_default(),
                            matchers: request.matchers.to_vec(),
                        });
                        let tx = self.tx.clone();
                        let name = lookup.info.name.clone();
                        self.pending += 1;
                        tokio::spawn(async move {
                            let items = future.await;
                            let _ = tx.send(SourceResponse {
                                generation,
                                source: name,
                                items,
                            });
                        });
                    }
                },
                DataSource::Value(_) => {
                    if let Some(option) = value_option(source, &parsed.text) {
                        self.suggestions.merge(source.info(), vec![option], limit);
                    }
                }
            }
        }

        debug!(
            %generation,
            text = %parsed.text,
            options = self.suggestions.total(),
            pending = self.pending,
            "suggestions dispatched"
        );
        parsed
    }

    /// Merge an async answer. Returns whether the option list changed.
    pub fn apply(&mut self, response: SourceResponse) -> bool {
        if response.generation != self.generation {
            trace!(
                generation = %response.generation,
                current = %self.generation,
                source = %response.source,
                "discarding stale suggestions"
            );
            return false;
        }
        self.pending = self.pending.saturating_sub(1);

        let items = match response.items {
            Ok(items) => items,
            Err(error) => {
                warn!(source = %response.source, %error, "source query failed");
                return false;
            }
        };

        let config = Arc::clone(&self.config);
        let Some(source) = config.source(&response.source) else {
            return false;
        };
        let DataSource::Lookup(lookup) = source else {
            return false;
        };
        let limit = item_limit(&config, source);
        let before = self.suggestions.total();
        self.suggestions
            .merge(&lookup.info, lookup_options(lookup, items.iter(), limit), limit);
        trace!(
            generation = %response.generation,
            source = %response.source,
            items = items.len(),
            "suggestions merged"
        );
        self.suggestions.total() != before
    }

    /// Apply every answer that has already arrived.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(response) = self.rx.try_recv() {
            changed |= self.apply(response);
        }
        changed
    }

    /// Wait for the next async answer, current or stale.
    pub async fn next_response(&mut self) -> Option<SourceResponse> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OperatorMode;
    use crate::matcher::NUMBER_COMPARISONS;
    use crate::source::ValueSource;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    fn rules() -> ParseRules<'static> {
        ParseRules {
            and_symbol: "&",
            or_symbol: "|",
            operators: true,
            brackets: true,
        }
    }

    fn parsed(operator: Option<Operator>, comparison: Option<Comparison>, text: &str) -> ParsedSearch {
        ParsedSearch {
            operator,
            comparison,
            text: text.to_string(),
        }
    }

    fn list(name: &str, precedence: Option<u32>, items: &[&str]) -> DataSource {
        let mut info = SourceInfo::new(name, name.to_uppercase());
        info.precedence = precedence;
        LookupSource::from_items(info, items.iter().map(|s| json!(s)).collect()).into()
    }

    fn request(text: &str) -> SearchRequest<'_> {
        SearchRequest {
            text,
            matchers: &[],
            function: None,
            allow_functions: false,
        }
    }

    // ── Parsing ─────────────────────────────────────────────────────

    #[test]
    fn test_parse_operator_and_comparison() {
        assert_eq!(
            parse_search("& >= 1", &rules()),
            parsed(Some(Operator::And), Some(Comparison::GreaterOrEqual), "1")
        );
        assert_eq!(parse_search("* as", &rules()), parsed(None, Some(Comparison::Like), "as"));
        assert_eq!(
            parse_search("| !*x", &rules()),
            parsed(Some(Operator::Or), Some(Comparison::NotLike), "x")
        );
    }

    #[test]
    fn test_parse_operator_words_need_boundary() {
        assert_eq!(parse_search("and EUR", &rules()), parsed(Some(Operator::And), None, "EUR"));
        assert_eq!(parse_search("OR <5", &rules()), parsed(Some(Operator::Or), Some(Comparison::Less), "5"));
        assert_eq!(parse_search("andrew", &rules()), parsed(None, None, "andrew"));
        assert_eq!(parse_search("orange", &rules()), parsed(None, None, "orange"));
        assert_eq!(parse_search("or", &rules()), parsed(Some(Operator::Or), None, ""));
    }

    #[test]
    fn test_parse_operators_disabled() {
        let mut rules = rules();
        rules.operators = false;
        assert_eq!(parse_search("& x", &rules), parsed(None, None, "& x"));
        assert_eq!(parse_search("and x", &rules), parsed(None, None, "and x"));
    }

    #[test]
    fn test_parse_brackets() {
        assert_eq!(parse_search("(", &rules()), parsed(None, Some(Comparison::Open), ""));
        assert_eq!(parse_search("| (", &rules()), parsed(Some(Operator::Or), Some(Comparison::Open), ""));
        assert_eq!(parse_search(")", &rules()).bracket(), Some(Comparison::Close));

        let mut rules = rules();
        rules.brackets = false;
        assert_eq!(parse_search("(", &rules), parsed(None, None, "("));
    }

    #[test]
    fn test_parse_custom_symbols() {
        let rules = ParseRules {
            and_symbol: "+",
            or_symbol: "/",
            operators: true,
            brackets: false,
        };
        assert_eq!(parse_search("+ x", &rules), parsed(Some(Operator::And), None, "x"));
        assert_eq!(parse_search("/x", &rules), parsed(Some(Operator::Or), None, "x"));
        assert_eq!(parse_search("& x", &rules), parsed(None, None, "& x"));
    }

    #[test]
    fn test_rules_follow_mode_and_function() {
        let config = Config::new(vec![]).with_mode(OperatorMode::AgGrid);
        let rules = ParseRules::new(&config, None);
        assert!(rules.operators);
        assert!(!rules.brackets);

        let config = Config::new(vec![]);
        let mut function = Nemonic::new("f");
        function.no_and_or = true;
        function.no_brackets = true;
        let rules = ParseRules::new(&config, Some(&function));
        assert!(!rules.operators);
        assert!(!rules.brackets);
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(parse_search("   ", &rules()), ParsedSearch::default());
    }

    // ── Categories ──────────────────────────────────────────────────

    #[test]
    fn test_category_jump_wraps() {
        let mut suggestions = Suggestions::default();
        let option = |text: &str| Suggestion {
            source: "s".to_string(),
            value: Value::from(text),
            text: text.to_string(),
            function: false,
        };
        suggestions.merge(&SourceInfo::new("a", "A"), vec![option("1"), option("2")], 10);
        suggestions.merge(&SourceInfo::new("b", "B"), vec![option("3")], 10);
        suggestions.merge(&SourceInfo::new("c", "C"), vec![option("4"), option("5")], 10);
        assert_eq!(suggestions.category_jump(0, true), 2);
        assert_eq!(suggestions.category_jump(1, true), 2);
        assert_eq!(suggestions.category_jump(2, true), 3);
        assert_eq!(suggestions.category_jump(4, true), 0);
        assert_eq!(suggestions.category_jump(0, false), 3);
        assert_eq!(suggestions.category_jump(3, false), 2);
    }

    #[test]
    fn test_merge_dedups_and_limits() {
        let mut suggestions = Suggestions::default();
        let option = |text: &str| Suggestion {
            source: "s".to_string(),
            value: Value::from(text),
            text: text.to_string(),
            function: false,
        };
        let info = SourceInfo::new("s", "S");
        suggestions.merge(&info, vec![option("a"), option("b")], 3);
        suggestions.merge(&info, vec![option("b"), option("c"), option("d")], 3);
        assert_eq!(suggestions.categories().len(), 1);
        let texts: Vec<&str> = suggestions.options().map(|o| o.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    // ── Sync search ─────────────────────────────────────────────────

    #[test]
    fn test_precedence_orders_categories() {
        let config = Arc::new(Config::new(vec![
            list("low", Some(1), &["asd"]),
            list("none", None, &["asx"]),
            list("high", Some(3), &["asa"]),
            list("mid", Some(2), &["ask"]),
        ]));
        let mut aggregator = Aggregator::new(config);
        aggregator.search(request("as"));
        assert_eq!(aggregator.suggestions().titles(), vec!["HIGH", "MID", "LOW", "NONE"]);
        assert_eq!(aggregator.suggestions().total(), 4);
    }

    #[test]
    fn test_static_filter_and_ignore_case() {
        let ccy = LookupSource::from_items(SourceInfo::new("ccy", "Currency"), vec![json!("EUR"), json!("GBP"), json!("eur-x")]).ignore_case(true);
        let config = Arc::new(Config::new(vec![ccy.into(), list("cs", None, &["EUR", "eur"])]));
        let mut aggregator = Aggregator::new(config);
        aggregator.search(request("eur"));
        let texts: Vec<&str> = aggregator.suggestions().options().map(|o| o.text.as_str()).collect();
        assert_eq!(texts, vec!["EUR", "eur-x", "eur"]);
    }

    #[test]
    fn test_item_limit() {
        let items: Vec<&str> = vec!["a1", "a2", "a3", "a4"];
        let limited = match list("x", None, &items) {
            DataSource::Lookup(l) => l.item_limit(2),
            DataSource::Value(_) => unreachable!(),
        };
        let config = Arc::new(Config::new(vec![limited.into(), list("y", None, &items)]).with_item_limit(3));
        let mut aggregator = Aggregator::new(config);
        aggregator.search(request("a"));
        let counts: Vec<usize> = aggregator
            .suggestions()
            .categories()
            .iter()
            .map(|c| c.options.len())
            .collect();
        assert_eq!(counts, vec![2, 3]);
    }

    #[test]
    fn test_min_search_length() {
        let short = match list("x", None, &["abc"]) {
            DataSource::Lookup(l) => l.search_start_length(3),
            DataSource::Value(_) => unreachable!(),
        };
        let config = Arc::new(Config::new(vec![short.into(), list("y", None, &["abc"])]));
        let mut aggregator = Aggregator::new(config);
        aggregator.search(request("ab"));
        assert_eq!(aggregator.suggestions().titles(), vec!["Y"]);
        aggregator.search(request("abc"));
        assert_eq!(aggregator.suggestions().titles(), vec!["X", "Y"]);
    }

    #[test]
    fn test_value_source_single_option() {
        let mut info = SourceInfo::new("num", "Number");
        info.comparisons = NUMBER_COMPARISONS.to_vec();
        let numbers = ValueSource::predicate(info, |t| t.parse::<f64>().is_ok(), crate::source::parse_number);
        let config = Arc::new(Config::new(vec![numbers.into()]));
        let mut aggregator = Aggregator::new(config);
        let parsed = aggregator.search(request(">= 12"));
        assert_eq!(parsed.comparison, Some(Comparison::GreaterOrEqual));
        let option = aggregator.suggestions().get(0).cloned().unwrap();
        assert_eq!(option.value, Value::Number(12.0));
        assert_eq!(option.text, "12");
        aggregator.search(request("twelve"));
        assert!(aggregator.suggestions().is_empty());
    }

    #[test]
    fn test_functional_sources_and_functions_category() {
        let mut info = SourceInfo::new("client", "Client");
        info.functional = true;
        let client = LookupSource::from_items(info, vec![json!("topco")]);
        let config = Arc::new(
            Config::new(vec![client.into(), list("ccy", None, &["top"])])
                .with_functions(vec![Nemonic::new("Top clients").require("client")]),
        );
        let mut aggregator = Aggregator::new(Arc::clone(&config));

        let mut req = request("top");
        req.allow_functions = true;
        aggregator.search(req);
        assert_eq!(aggregator.suggestions().titles(), vec![FUNCTIONS_CATEGORY, "CCY"]);
        assert!(aggregator.suggestions().get(0).is_some_and(|o| o.function));

        let function = config.function("Top clients").cloned().unwrap();
        let mut req = request("top");
        req.function = Some(&function);
        req.allow_functions = true;
        aggregator.search(req);
        assert_eq!(aggregator.suggestions().titles(), vec!["Client"]);
    }

    #[test]
    fn test_bracket_parse_skips_sources() {
        let config = Arc::new(Config::new(vec![list("x", None, &["("])]));
        let mut aggregator = Aggregator::new(config);
        let parsed = aggregator.search(request("("));
        assert_eq!(parsed.bracket(), Some(Comparison::Open));
        assert!(aggregator.suggestions().is_empty());
    }

    // ── Async search ────────────────────────────────────────────────

    fn delayed(name: &str, precedence: Option<u32>) -> DataSource {
        let mut info = SourceInfo::new(name, name.to_uppercase());
        info.precedence = precedence;
        LookupSource::from_query(info, |req: QueryRequest| async move {
            // Shorter search text answers later.
            let delay = 500 / req.text.len() as u64;
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok::<_, SourceError>(vec![json!(format!("{}-result", req.text))])
        })
        .into()
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_results_merge() {
        let config = Arc::new(Config::new(vec![delayed("slow", Some(1)), list("fast", None, &["abc"])]));
        let mut aggregator = Aggregator::new(config);
        aggregator.search(request("ab"));
        assert_eq!(aggregator.pending(), 1);
        assert_eq!(aggregator.suggestions().titles(), vec!["FAST"]);

        let response = aggregator.next_response().await.unwrap();
        assert!(aggregator.apply(response));
        assert_eq!(aggregator.pending(), 0);
        assert_eq!(aggregator.suggestions().titles(), vec!["SLOW", "FAST"]);
        assert_eq!(aggregator.suggestions().get(0).unwrap().text, "ab-result");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_results_are_dropped() {
        let config = Arc::new(Config::new(vec![delayed("slow", None)]));
        let mut aggregator = Aggregator::new(config);
        aggregator.search(request("a"));
        aggregator.search(request("ab"));

        // "ab" answers first, then the stale "a".
        let first = aggregator.next_response().await.unwrap();
        assert_eq!(first.generation, aggregator.generation());
        assert!(aggregator.apply(first));
        let second = aggregator.next_response().await.unwrap();
        assert!(second.generation < aggregator.generation());
        assert!(!aggregator.apply(second));

        let texts: Vec<&str> = aggregator.suggestions().options().map(|o| o.text.as_str()).collect();
        assert_eq!(texts, vec!["ab-result"]);
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_failed_query_contributes_nothing() {
        let failing = LookupSource::from_query(SourceInfo::new("bad", "Bad"), |_req: QueryRequest| async {
            Err::<Vec<SourceItem>, _>(SourceError::Query("boom".to_string()))
        });
        let config = Arc::new(Config::new(vec![failing.into()]));
        let mut aggregator = Aggregator::new(config);
        aggregator.search(request("x"));
        let response = aggregator.next_response().await.unwrap();
        assert!(!aggregator.apply(response));
        assert!(aggregator.suggestions().is_empty());
        assert_eq!(aggregator.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_drains_arrived_responses() {
        let config = Arc::new(Config::new(vec![delayed("slow", None)]));
        let mut aggregator = Aggregator::new(config);
        aggregator.search(request("abcde"));
        assert!(!aggregator.poll());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(aggregator.poll());
        assert_eq!(aggregator.suggestions().total(), 1);
    }
}
