//! Matcher validation: comparison legality, AgGrid `or` adjacency, selection
//! limits and function requirements.
//!
//! Every failure is recoverable. The error's `Display` text is the inline
//! message shown against the edit slot.

use matchbar_config::Nemonic;

use crate::config::OperatorMode;
use crate::matcher::{Comparison, Matcher, Operator};
use crate::source::DataSource;

/// A rejected commit or completion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatcherError {
    #[error("Comparison ({comparison}) isn't valid for {source_name}.")]
    ComparisonNotAllowed {
        comparison: Comparison,
        source_name: String,
    },

    #[error("Only matchers from the same source can be joined with {or_symbol} ({source_name} follows {previous}).")]
    OrAcrossSources {
        or_symbol: String,
        source_name: String,
        previous: String,
    },

    #[error("Datasource ({source_name}) is limited to {limit} items.")]
    SelectionLimit { source_name: String, limit: usize },

    #[error("{function} requires: {}", .missing.join(", "))]
    MissingSources {
        function: String,
        missing: Vec<String>,
    },

    #[error("Nothing matches {0:?}.")]
    NoMatch(String),
}

/// What a candidate matcher is validated against.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    /// The current sequence.
    pub matchers: &'a [Matcher],
    pub sources: &'a [DataSource],
    /// Index of the matcher being edited in place, if any.
    pub editing: Option<usize>,
    pub mode: OperatorMode,
    pub or_symbol: &'a str,
}

/// Validate a candidate matcher against the sequence it is joining.
pub fn validate_matcher(ctx: &ValidationContext<'_>, candidate: &Matcher) -> Result<(), MatcherError> {
    if candidate.is_bracket() {
        return Ok(());
    }

    if ctx.mode == OperatorMode::AgGrid && candidate.operator == Operator::Or {
        let previous = match ctx.editing {
            Some(index) => index.checked_sub(1).and_then(|p| ctx.matchers.get(p)),
            None => ctx.matchers.last(),
        };
        if let Some(previous) = previous
            && previous.source != candidate.source
        {
            return Err(MatcherError::OrAcrossSources {
                or_symbol: ctx.or_symbol.to_string(),
                source_name: candidate.source.clone(),
                previous: previous.source.clone(),
            });
        }
    }

    let limit = ctx
        .sources
        .iter()
        .find(|ds| ds.name() == candidate.source)
        .and_then(|ds| ds.info().selection_limit);
    if let Some(limit) = limit {
        let current = ctx
            .matchers
            .iter()
            .filter(|m| m.key != candidate.key && m.source == candidate.source)
            .count();
        if current >= limit {
            return Err(MatcherError::SelectionLimit {
                source_name: candidate.source.clone(),
                limit,
            });
        }
    }

    Ok(())
}

/// Check that `comparison` is legal for the source an option came from.
pub fn validate_comparison(source: &DataSource, comparison: Comparison) -> Result<(), MatcherError> {
    if comparison == Comparison::Raw || source.allows(comparison) {
        Ok(())
    } else {
        Err(MatcherError::ComparisonNotAllowed {
            comparison,
            source_name: source.name().to_string(),
        })
    }
}

/// Every required source of `function` must be represented among `matchers`.
pub fn validate_function_requirements(function: &Nemonic, matchers: &[Matcher]) -> Result<(), MatcherError> {
    let missing: Vec<String> = function
        .required_sources
        .iter()
        .filter(|required| !matchers.iter().any(|m| &m.source == *required))
        .cloned()
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(MatcherError::MissingSources {
            function: function.name.clone(),
            missing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{LookupSource, SourceInfo};
    use pretty_assertions::assert_eq;

    fn sources() -> Vec<DataSource> {
        let mut limited = SourceInfo::new("ccy", "Currency");
        limited.selection_limit = Some(2);
        vec![
            LookupSource::from_items(limited, vec![]).into(),
            LookupSource::from_items(SourceInfo::new("isin", "ISIN"), vec![]).into(),
        ]
    }

    fn m(key: &str, operator: Operator, source: &str) -> Matcher {
        Matcher::new(operator, Comparison::Equals, source, "v", "t").with_key(key)
    }

    fn ctx<'a>(matchers: &'a [Matcher], sources: &'a [DataSource], mode: OperatorMode) -> ValidationContext<'a> {
        ValidationContext {
            matchers,
            sources,
            editing: None,
            mode,
            or_symbol: "|",
        }
    }

    #[test]
    fn test_brackets_always_pass() {
        let sources = sources();
        let list = vec![m("a", Operator::Empty, "ccy"), m("b", Operator::And, "ccy")];
        let open = Matcher::bracket(Comparison::Open, Operator::Or);
        assert!(validate_matcher(&ctx(&list, &sources, OperatorMode::AgGrid), &open).is_ok());
    }

    #[test]
    fn test_selection_limit() {
        let sources = sources();
        let list = vec![m("a", Operator::Empty, "ccy"), m("b", Operator::And, "ccy")];
        let err = validate_matcher(
            &ctx(&list, &sources, OperatorMode::Complex),
            &m("c", Operator::And, "ccy"),
        )
        .unwrap_err();
        assert_eq!(
            err,
            MatcherError::SelectionLimit {
                source_name: "ccy".to_string(),
                limit: 2
            }
        );
        assert_eq!(err.to_string(), "Datasource (ccy) is limited to 2 items.");
    }

    #[test]
    fn test_selection_limit_excludes_edited_matcher() {
        let sources = sources();
        let list = vec![m("a", Operator::Empty, "ccy"), m("b", Operator::And, "ccy")];
        let replacement = m("b", Operator::And, "ccy");
        assert!(validate_matcher(&ctx(&list, &sources, OperatorMode::Complex), &replacement).is_ok());
    }

    #[test]
    fn test_unlimited_source() {
        let sources = sources();
        let list: Vec<Matcher> = (0..5).map(|i| m(&i.to_string(), Operator::And, "isin")).collect();
        assert!(validate_matcher(&ctx(&list, &sources, OperatorMode::Complex), &m("x", Operator::And, "isin")).is_ok());
    }

    #[test]
    fn test_aggrid_or_requires_same_source() {
        let sources = sources();
        let list = vec![m("a", Operator::Empty, "isin")];
        let context = ctx(&list, &sources, OperatorMode::AgGrid);
        assert!(validate_matcher(&context, &m("b", Operator::Or, "isin")).is_ok());
        assert!(validate_matcher(&context, &m("c", Operator::And, "ccy")).is_ok());
        let err = validate_matcher(&context, &m("d", Operator::Or, "ccy")).unwrap_err();
        assert!(matches!(err, MatcherError::OrAcrossSources { .. }));
        assert!(err.to_string().contains("joined with |"));
    }

    #[test]
    fn test_aggrid_or_uses_previous_by_index_when_editing() {
        let sources = sources();
        let list = vec![
            m("a", Operator::Empty, "ccy"),
            m("b", Operator::And, "isin"),
            m("c", Operator::And, "isin"),
        ];
        let mut context = ctx(&list, &sources, OperatorMode::AgGrid);
        context.editing = Some(1);
        // Previous by index is "a" (ccy), not the list's last matcher.
        assert!(validate_matcher(&context, &m("b", Operator::Or, "ccy")).is_ok());
        assert!(validate_matcher(&context, &m("b", Operator::Or, "isin")).is_err());

        context.editing = Some(0);
        assert!(validate_matcher(&context, &m("a", Operator::Or, "isin")).is_ok());
    }

    #[test]
    fn test_complex_mode_ignores_or_adjacency() {
        let sources = sources();
        let list = vec![m("a", Operator::Empty, "isin")];
        assert!(validate_matcher(&ctx(&list, &sources, OperatorMode::Complex), &m("b", Operator::Or, "ccy")).is_ok());
    }

    #[test]
    fn test_validate_comparison() {
        let sources = sources();
        assert!(validate_comparison(&sources[0], Comparison::Equals).is_ok());
        assert!(validate_comparison(&sources[0], Comparison::Raw).is_ok());
        let err = validate_comparison(&sources[0], Comparison::Greater).unwrap_err();
        assert_eq!(err.to_string(), "Comparison (>) isn't valid for ccy.");
    }

    #[test]
    fn test_function_requirements() {
        let function = Nemonic::new("Top clients").require("Client").require("ccy");
        let list = vec![m("a", Operator::Empty, "ccy")];
        let err = validate_function_requirements(&function, &list).unwrap_err();
        assert_eq!(
            err,
            MatcherError::MissingSources {
                function: "Top clients".to_string(),
                missing: vec!["Client".to_string()],
            }
        );
        assert_eq!(err.to_string(), "Top clients requires: Client");

        let list = vec![m("a", Operator::Empty, "ccy"), m("b", Operator::And, "Client")];
        assert!(validate_function_requirements(&function, &list).is_ok());
    }
}
