//! Built-in sources used when the settings file defines none.

use std::time::Duration;

use matchbar_config::Nemonic;
use matchbar_core::matcher::{NUMBER_COMPARISONS, STRING_COMPARISONS};
use matchbar_core::source::{DataSource, LookupSource, QueryRequest, SourceError, SourceInfo, ValueSource, parse_number};
use serde_json::json;

const ISSUERS: [(&str, &str); 6] = [
    ("US01", "US Treasury"),
    ("DE02", "Bund"),
    ("GB03", "Gilt"),
    ("FR04", "OAT"),
    ("IT05", "BTP"),
    ("JP06", "JGB"),
];

pub fn sources() -> Vec<DataSource> {
    let mut currency = SourceInfo::new("ccy", "Currency");
    currency.precedence = Some(2);
    currency.selection_limit = Some(3);

    let mut issuer = SourceInfo::new("issuer", "Issuer");
    issuer.precedence = Some(1);
    issuer.comparisons = STRING_COMPARISONS.to_vec();

    let mut amount = SourceInfo::new("amount", "Amount");
    amount.comparisons = NUMBER_COMPARISONS.to_vec();

    let mut client = SourceInfo::new("client", "Client");
    client.functional = true;

    vec![
        LookupSource::from_items(
            currency,
            ["EUR", "GBP", "USD", "JPY", "CHF"].iter().map(|c| json!(c)).collect(),
        )
        .ignore_case(true)
        .into(),
        LookupSource::from_query(issuer, |req: QueryRequest| async move {
            // Stands in for a remote lookup.
            tokio::time::sleep(Duration::from_millis(300)).await;
            let needle = req.text.to_lowercase();
            Ok::<_, SourceError>(
                ISSUERS
                    .iter()
                    .filter(|(_, name)| name.to_lowercase().contains(&needle))
                    .map(|(id, name)| json!({ "id": id, "name": name }))
                    .collect(),
            )
        })
        .text_getter(|item| item["name"].as_str().unwrap_or_default().to_string())
        .value_getter(|item| item["id"].as_str().unwrap_or_default().into())
        .into(),
        ValueSource::predicate(amount, |text| text.trim().parse::<f64>().is_ok(), parse_number).into(),
        LookupSource::from_items(client, vec![json!("ACME"), json!("Globex"), json!("Initech")]).into(),
    ]
}

pub fn functions() -> Vec<Nemonic> {
    let mut notes = Nemonic::new("Client notes").require("client");
    notes.allow_free_text = true;
    vec![Nemonic::new("Client exposure").require("client").allow("ccy"), notes]
}
