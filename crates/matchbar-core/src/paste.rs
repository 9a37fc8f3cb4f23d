//! Bulk paste: turn a block of pasted text into matchers in one pass.
//!
//! Tokens are separated by whitespace, commas and semicolons; double quotes
//! group a phrase. Operator, comparison and bracket prefixes are recognised
//! as they are when typing. Each remaining token must equal an option of an
//! eligible source exactly. Async lookups that opt in to paste matching get
//! one shared deadline; whatever has not answered by then counts as no match.

use std::collections::HashMap;

use matchbar_config::Nemonic;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

use crate::aggregate::{
    ParseRules, Suggestion, Suggestions, is_eligible, lookup_options, min_length, parse_search, value_option,
};
use crate::config::Config;
use crate::matcher::{Comparison, Matcher, Operator};
use crate::source::{Backing, DataSource, QueryRequest, SourceError, SourceItem};
use crate::validate::{ValidationContext, validate_matcher};

/// What happens to pasted tokens that match nothing, when the active
/// function allows free text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FreeTextAction {
    /// The whole pasted text becomes a single free-text matcher.
    #[default]
    Original,
    /// Each unmatched token becomes its own free-text matcher, in position.
    Individual,
    /// Unmatched tokens are joined with single spaces into one trailing
    /// free-text matcher.
    Combined,
}

impl FreeTextAction {
    pub fn from_name(name: &str) -> Self {
        match name {
            "individual" => FreeTextAction::Individual,
            "combined" => FreeTextAction::Combined,
            _ => FreeTextAction::Original,
        }
    }
}

/// Result of a paste.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PasteOutcome {
    /// Matchers to append, in order.
    pub matchers: Vec<Matcher>,
    /// Tokens that matched nothing and were not turned into free text.
    pub unmatched: Vec<String>,
}

/// Split pasted text into tokens. Brackets become tokens of their own when
/// `brackets` is set.
pub fn tokenize(text: &str, brackets: bool) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    let flush = |current: &mut String, tokens: &mut Vec<String>| {
        if !current.is_empty() {
            tokens.push(std::mem::take(current));
        }
    };

    for c in text.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                flush(&mut current, &mut tokens);
            }
            c if quoted => current.push(c),
            c if c.is_whitespace() || c == ',' || c == ';' => flush(&mut current, &mut tokens),
            '(' | ')' if brackets => {
                flush(&mut current, &mut tokens);
                tokens.push(c.to_string());
            }
            c => current.push(c),
        }
    }
    flush(&mut current, &mut tokens);
    tokens
}

enum Entry {
    Matched(Matcher),
    Bracket(Comparison),
    Unmatched(String),
}

type Pending = Vec<(String, JoinHandle<Result<Vec<SourceItem>, SourceError>>)>;

/// Parse pasted text against the configured sources.
pub async fn parse_paste(
    config: &Config,
    text: &str,
    matchers: &[Matcher],
    function: Option<&Nemonic>,
) -> PasteOutcome {
    let deadline = Instant::now() + config.paste_timeout;
    let rules = ParseRules::new(config, function);
    let tokens = tokenize(text, rules.brackets);
    let parsed: Vec<_> = tokens.iter().map(|t| parse_search(t, &rules)).collect();
    let sources: Vec<&DataSource> = config
        .sources
        .iter()
        .filter(|ds| is_eligible(ds, function))
        .collect();

    // Start every async lookup up front so they share the deadline.
    let mut queries: HashMap<usize, Pending> = HashMap::new();
    for (index, search) in parsed.iter().enumerate() {
        if search.bracket().is_some() || search.text.is_empty() {
            continue;
        }
        for source in &sources {
            let DataSource::Lookup(lookup) = source else {
                continue;
            };
            let Backing::Query(query) = &lookup.backing else {
                continue;
            };
            if !lookup.match_on_paste || search.text.chars().count() < min_length(config, source) {
                continue;
            }
            let future = query.query(QueryRequest {
                text: search.text.clone(),
                operator: search.operator.unwrap_or_default(),
                matchers: matchers.to_vec(),
            });
            queries
                .entry(index)
                .or_default()
                .push((lookup.info.name.clone(), tokio::spawn(future)));
        }
    }

    let mut accumulated: Vec<Matcher> = matchers.to_vec();
    let mut entries: Vec<(Option<Operator>, Entry)> = Vec::new();
    let mut operator = None;
    let mut comparison = None;

    for (index, search) in parsed.into_iter().enumerate() {
        operator = search.operator.or(operator);
        if let Some(bracket) = search.bracket() {
            entries.push((operator.take(), Entry::Bracket(bracket)));
            comparison = None;
            continue;
        }
        comparison = search.comparison.or(comparison);
        if search.text.is_empty() {
            continue;
        }

        let mut candidates = Suggestions::default();
        for source in &sources {
            match source {
                DataSource::Lookup(lookup) => {
                    if let Backing::Static(items) = &lookup.backing {
                        let exact = items
                            .iter()
                            .filter(|item| lookup.equals(&lookup.item_text(item), &search.text));
                        candidates.merge(&lookup.info, lookup_options(lookup, exact, usize::MAX), usize::MAX);
                    }
                }
                DataSource::Value(_) => {
                    if let Some(option) = value_option(source, &search.text) {
                        candidates.merge(source.info(), vec![option], usize::MAX);
                    }
                }
            }
        }
        for (name, handle) in queries.remove(&index).unwrap_or_default() {
            let items = match timeout_at(deadline, handle).await {
                Ok(Ok(Ok(items))) => items,
                Ok(Ok(Err(error))) => {
                    warn!(source = %name, %error, "paste lookup failed");
                    continue;
                }
                Ok(Err(error)) => {
                    warn!(source = %name, %error, "paste lookup task failed");
                    continue;
                }
                Err(_) => {
                    debug!(source = %name, token = %search.text, "paste lookup abandoned at deadline");
                    continue;
                }
            };
            let Some(DataSource::Lookup(lookup)) = config.source(&name) else {
                continue;
            };
            let exact = items
                .iter()
                .filter(|item| lookup.equals(&lookup.item_text(item), &search.text));
            candidates.merge(&lookup.info, lookup_options(lookup, exact, usize::MAX), usize::MAX);
        }

        let chosen = comparison.unwrap_or(config.default_comparison);
        let typed = operator.take();
        comparison = None;
        let matched = candidates
            .options()
            .filter(|option| config.source(&option.source).is_some_and(|ds| ds.allows(chosen)))
            .map(|option| to_matcher(option, typed.unwrap_or(Operator::And), chosen))
            .find(|candidate| {
                let context = ValidationContext {
                    matchers: &accumulated,
                    sources: &config.sources,
                    editing: None,
                    mode: config.mode,
                    or_symbol: &config.or_symbol,
                };
                validate_matcher(&context, candidate).is_ok()
            });

        match matched {
            Some(matcher) => {
                accumulated.push(matcher.clone());
                entries.push((typed, Entry::Matched(matcher)));
            }
            None => entries.push((typed, Entry::Unmatched(search.text))),
        }
    }

    let free_text = function.filter(|f| f.allow_free_text).map(|f| FreeTextAction::from_name(&f.paste_free_text));
    let outcome = finish(matchers, entries, free_text, text);
    debug!(
        tokens = tokens.len(),
        matched = outcome.matchers.len(),
        unmatched = outcome.unmatched.len(),
        "paste parsed"
    );
    outcome
}

fn to_matcher(option: &Suggestion, operator: Operator, comparison: Comparison) -> Matcher {
    Matcher::new(
        operator,
        comparison,
        option.source.clone(),
        option.value.clone(),
        option.text.clone(),
    )
}

/// Assign operators by position and apply the free-text action.
fn finish(
    existing: &[Matcher],
    entries: Vec<(Option<Operator>, Entry)>,
    free_text: Option<FreeTextAction>,
    text: &str,
) -> PasteOutcome {
    let mut outcome = PasteOutcome::default();
    let any_unmatched = entries.iter().any(|(_, e)| matches!(e, Entry::Unmatched(_)));

    if any_unmatched && free_text == Some(FreeTextAction::Original) {
        let operator = leading_operator(existing, &[], None);
        outcome.matchers.push(Matcher::free_text(operator, text.trim()));
        return outcome;
    }

    let mut leftovers = Vec::new();
    for (typed, entry) in entries {
        let operator = leading_operator(existing, &outcome.matchers, typed);
        match entry {
            Entry::Matched(mut matcher) => {
                matcher.operator = operator;
                outcome.matchers.push(matcher);
            }
            Entry::Bracket(bracket) => outcome.matchers.push(Matcher::bracket(bracket, operator)),
            Entry::Unmatched(token) => match free_text {
                Some(FreeTextAction::Individual) => outcome.matchers.push(Matcher::free_text(operator, token)),
                _ => leftovers.push(token),
            },
        }
    }

    if free_text == Some(FreeTextAction::Combined) && !leftovers.is_empty() {
        let operator = leading_operator(existing, &outcome.matchers, None);
        outcome.matchers.push(Matcher::free_text(operator, leftovers.join(" ")));
    } else {
        outcome.unmatched = leftovers;
    }
    outcome
}

fn leading_operator(existing: &[Matcher], produced: &[Matcher], typed: Option<Operator>) -> Operator {
    if let Some(operator) = typed {
        return operator;
    }
    let previous = produced.last().or(existing.last());
    if previous.is_none_or(|m| m.comparison == Comparison::Open) {
        Operator::Empty
    } else {
        Operator::And
    }
}
