//! End-to-end engine behaviour over the reference sources.

use std::time::Duration;

use matchbar_config::Nemonic;
use matchbar_core::aggregate::{Aggregator, ParseRules, SearchRequest, parse_search};
use matchbar_core::config::Config;
use matchbar_core::keys::{Key, KeyInput, typed};
use matchbar_core::matcher::{Comparison, Matcher, Operator};
use matchbar_core::sequence::{SequenceController, SequenceEvent};
use matchbar_core::session::{EditSession, Selection};
use matchbar_core::source::{LookupSource, QueryRequest, SourceError, SourceInfo};
use matchbar_core::validate::{MatcherError, ValidationContext, validate_matcher};
use matchbar_core::{mismatched_brackets, validate_brackets};
use matchbar_test_utils::config::TestConfigBuilder;
use matchbar_test_utils::fixtures::client_source;
use matchbar_test_utils::settings::TestSettings;
use matchbar_test_utils::tracing_setup::init_test_tracing;
use pretty_assertions::assert_eq;
use serde_json::json;

fn search<'a>(text: &'a str) -> SearchRequest<'a> {
    SearchRequest {
        text,
        matchers: &[],
        function: None,
        allow_functions: false,
    }
}

// ── Parsing ─────────────────────────────────────────────────────────

#[test]
fn test_operator_and_two_char_comparison() {
    let config = TestConfigBuilder::new().build();
    let parsed = parse_search("& >= 1", &ParseRules::new(&config, None));
    assert_eq!(parsed.operator, Some(Operator::And));
    assert_eq!(parsed.comparison, Some(Comparison::GreaterOrEqual));
    assert_eq!(parsed.text, "1");
}

#[test]
fn test_like_comparison() {
    let config = TestConfigBuilder::new().build();
    let parsed = parse_search("* as", &ParseRules::new(&config, None));
    assert_eq!(parsed.operator, None);
    assert_eq!(parsed.comparison, Some(Comparison::Like));
    assert_eq!(parsed.text, "as");
}

// ── Brackets ────────────────────────────────────────────────────────

#[test]
fn test_bracket_validation_cases() {
    use Comparison::{Close, Equals, Open};
    assert!(validate_brackets(&[Open, Equals, Close, Open, Open, Close, Close]).is_empty());
    assert_eq!(validate_brackets(&[Close]), vec![0]);
    assert_eq!(validate_brackets(&[Open, Equals]), vec![0]);

    let list = vec![
        Matcher::bracket(Open, Operator::Empty),
        Matcher::new(Operator::Empty, Equals, "list", "asdas", "asdas"),
    ];
    assert_eq!(mismatched_brackets(&list), vec![0]);
}

// ── Aggregation ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_categories_follow_precedence() {
    let mut aggregator = Aggregator::new(TestConfigBuilder::new().shared());
    aggregator.search(search("lo"));
    assert_eq!(aggregator.suggestions().titles(), vec!["Word", "List"]);
    assert_eq!(aggregator.pending(), 1);

    let response = aggregator.next_response().await.unwrap();
    assert!(aggregator.apply(response));
    assert_eq!(aggregator.suggestions().titles(), vec!["Word", "List", "Promise"]);
    let promised: Vec<&str> = aggregator
        .suggestions()
        .options()
        .filter(|o| o.source == "promise")
        .map(|o| o.text.as_str())
        .collect();
    assert_eq!(promised, vec!["aploked", "loadxx"]);
}

#[tokio::test(start_paused = true)]
async fn test_out_of_order_answer_is_discarded() {
    init_test_tracing();
    // Short searches answer slowly, so the older query resolves last.
    let mut info = SourceInfo::new("remote", "Remote");
    info.precedence = Some(1);
    let remote = LookupSource::from_query(info, |req: QueryRequest| async move {
        let delay = if req.text.chars().count() < 3 { 500 } else { 10 };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok::<_, SourceError>(vec![json!(format!("{}-result", req.text))])
    });
    let mut aggregator = Aggregator::new(TestConfigBuilder::empty().source(remote).shared());

    aggregator.search(search("lo"));
    aggregator.search(search("loa"));

    let fresh = aggregator.next_response().await.unwrap();
    assert!(aggregator.apply(fresh));
    let stale = aggregator.next_response().await.unwrap();
    assert!(!aggregator.apply(stale));

    let texts: Vec<&str> = aggregator.suggestions().options().map(|o| o.text.as_str()).collect();
    assert_eq!(texts, vec!["loa-result"]);
    assert_eq!(aggregator.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_session_waits_for_async_options() {
    let mut session = EditSession::new(TestConfigBuilder::new().shared());
    let selection = Selection {
        matchers: &[],
        function: None,
        editing: None,
    };

    session.set_text("xx", &selection);
    assert_eq!(session.suggestions().titles(), vec!["Word"]);
    assert_eq!(session.pending(), 1);

    let changed = match session.next_response().await {
        Some(response) => session.apply(response),
        None => false,
    };
    assert!(changed);
    assert_eq!(session.suggestions().titles(), vec!["Word", "Promise"]);
    assert_eq!(session.active_suggestion().map(|o| o.text.as_str()), Some("xx"));
}

// ── Validation ──────────────────────────────────────────────────────

#[test]
fn test_selection_limit_excludes_edited_matcher() {
    let mut info = SourceInfo::new("ccy", "Currency");
    info.selection_limit = Some(2);
    let config: Config = TestConfigBuilder::empty()
        .source(LookupSource::from_items(info, vec![json!("EUR"), json!("GBP"), json!("USD")]))
        .build();

    let a = Matcher::new(Operator::Empty, Comparison::Equals, "ccy", "EUR", "EUR");
    let b = Matcher::new(Operator::And, Comparison::Equals, "ccy", "GBP", "GBP");
    let matchers = vec![a, b.clone()];
    let ctx = ValidationContext {
        matchers: &matchers,
        sources: &config.sources,
        editing: None,
        mode: config.mode,
        or_symbol: &config.or_symbol,
    };

    let third = Matcher::new(Operator::And, Comparison::Equals, "ccy", "USD", "USD");
    assert_eq!(
        validate_matcher(&ctx, &third),
        Err(MatcherError::SelectionLimit {
            source_name: "ccy".to_string(),
            limit: 2,
        })
    );

    let replacement = third.with_key(b.key.clone());
    let editing = ValidationContext {
        editing: Some(1),
        ..ctx
    };
    assert_eq!(validate_matcher(&editing, &replacement), Ok(()));
}

// ── Sequence ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_enter_with_missing_required_source() {
    let config = TestConfigBuilder::new()
        .source(client_source())
        .function(Nemonic::new("Top clients").require("Client").allow("list"))
        .shared();
    let mut controller = SequenceController::new(config);
    let mut events = controller.subscribe();

    for key in typed("top") {
        controller.handle_key(key);
    }
    controller.handle_key(KeyInput::new(Key::Enter));
    assert_eq!(controller.function().map(|f| f.name.as_str()), Some("Top clients"));

    controller.commit(Matcher::new(Operator::Empty, Comparison::Equals, "list", "asdas", "asdas"));
    assert!(controller.handle_key(KeyInput::new(Key::Enter)));

    let mut refused = None;
    while let Ok(event) = events.try_recv() {
        if let SequenceEvent::CompleteError { missing, .. } = event {
            refused = Some(missing);
        }
    }
    assert_eq!(refused, Some(vec!["Client".to_string()]));
    assert_eq!(controller.matchers().len(), 1);
    assert!(controller.function().is_some());
}

#[test]
fn test_swap_first_and_last() {
    let a = Matcher::new(Operator::Empty, Comparison::Equals, "list", "asdas", "asdas");
    let b = Matcher::new(Operator::And, Comparison::Like, "word", "ab", "ab");
    let c = Matcher::new(Operator::Or, Comparison::Greater, "numeric", 5.0, "5");
    let mut controller =
        SequenceController::with_matchers(TestConfigBuilder::new().shared(), vec![a.clone(), b.clone(), c.clone()]);

    assert!(controller.swap(&a.key, &c.key));
    assert_eq!(controller.matchers(), &[c, b, a]);
}

#[tokio::test(start_paused = true)]
async fn test_paste_uses_reference_sources() {
    let mut controller = SequenceController::new(TestConfigBuilder::new().shared());
    let outcome = controller.paste("loadsp >42 9zz").await;

    let got: Vec<(&str, Comparison, &str)> = controller
        .matchers()
        .iter()
        .map(|m| (m.source.as_str(), m.comparison, m.text.as_str()))
        .collect();
    assert_eq!(
        got,
        vec![
            ("word", Comparison::Equals, "loadsp"),
            ("numeric", Comparison::Greater, "42"),
        ]
    );
    assert_eq!(controller.matchers()[1].operator, Operator::And);
    assert_eq!(outcome.unmatched, vec!["9zz".to_string()]);
}

// ── Settings ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_settings_file_drives_suggestions() {
    let settings = TestSettings::with_toml(
        r#"
[operators]
and = "and"
or = "or"

[[sources]]
name = "ccy"
title = "Currency"
kind = "list"
items = ["EUR", "GBP", "USD"]
"#,
    )
    .await;
    let config = Config::from_settings(&settings.settings, Vec::new()).unwrap();
    assert_eq!(config.and_symbol, "and");

    let mut aggregator = Aggregator::new(std::sync::Arc::new(config));
    let parsed = aggregator.search(search("and = GB"));
    assert_eq!(parsed.operator, Some(Operator::And));
    let texts: Vec<&str> = aggregator.suggestions().options().map(|o| o.text.as_str()).collect();
    assert_eq!(texts, vec!["GBP"]);
}
