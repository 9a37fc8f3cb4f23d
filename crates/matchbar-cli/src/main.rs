#![deny(unsafe_code)]

//! matchbar CLI: drive the matcher engine from the command line.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use matchbar_config::MatchbarConfig;
use matchbar_core::aggregate::{Aggregator, SearchRequest};
use matchbar_core::config::Config;
use matchbar_core::matcher::Comparison;
use matchbar_core::paste::parse_paste;
use matchbar_core::validate_brackets;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// matchbar: typed matcher expressions with live suggestions.
#[derive(Parser)]
#[command(name = "matchbar", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "matchbar.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },

    /// Print the suggestions offered for typed text.
    Suggest {
        /// Text as typed into an empty slot, e.g. "& >= 10".
        text: String,

        /// Offer functions too, as an empty sequence would.
        #[arg(long)]
        functions: bool,
    },

    /// Parse pasted text into matchers and print them as JSON.
    Parse {
        text: String,

        /// Parse as if this function were active.
        #[arg(long)]
        function: Option<String>,
    },

    /// Report unmatched brackets in a sequence of comparison symbols.
    Brackets {
        /// Symbols such as `( = ) )`; anything that is not a bracket counts as a term.
        #[arg(required = true)]
        tokens: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = load_settings(&cli.config).await?;
    let found = loaded.is_some();
    let settings = loaded.unwrap_or_default();

    let filter = match cli.verbose {
        0 => settings.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();
    if !found {
        info!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    match cli.command {
        Commands::Config { show } => cmd_config(&cli.config, &settings, show)?,
        Commands::Suggest { text, functions } => cmd_suggest(&settings, &text, functions).await?,
        Commands::Parse { text, function } => cmd_parse(&settings, &text, function.as_deref()).await?,
        Commands::Brackets { tokens } => cmd_brackets(&tokens),
    }

    Ok(())
}

fn cmd_config(path: &Path, settings: &MatchbarConfig, show: bool) -> Result<()> {
    let config = build_config(settings)?;
    if show {
        let toml_str = toml::to_string_pretty(settings).context("rendering configuration")?;
        println!("{toml_str}");
    } else {
        println!(
            "Configuration at '{}' is valid ({} sources, {} functions).",
            path.display(),
            config.sources.len(),
            config.functions.len()
        );
    }
    Ok(())
}

async fn cmd_suggest(settings: &MatchbarConfig, text: &str, functions: bool) -> Result<()> {
    let config = Arc::new(build_config(settings)?);
    let mut aggregator = Aggregator::new(Arc::clone(&config));
    let parsed = aggregator.search(SearchRequest {
        text,
        matchers: &[],
        function: None,
        allow_functions: functions,
    });

    let deadline = tokio::time::Instant::now() + config.paste_timeout;
    while aggregator.pending() > 0 {
        match tokio::time::timeout_at(deadline, aggregator.next_response()).await {
            Ok(Some(response)) => {
                aggregator.apply(response);
            }
            Ok(None) => break,
            Err(_) => {
                warn!(pending = aggregator.pending(), "gave up waiting for lookups");
                break;
            }
        }
    }

    if let Some(bracket) = parsed.bracket() {
        println!("bracket {}", bracket.symbol());
        return Ok(());
    }
    println!(
        "operator={} comparison={} text={:?}",
        parsed.operator.map_or("-", |op| op.word()),
        parsed.comparison.map_or("-", Comparison::symbol),
        parsed.text
    );
    for category in aggregator.suggestions().categories() {
        println!("{}", category.title);
        for option in &category.options {
            if option.text == option.value.to_string() {
                println!("  {}", option.text);
            } else {
                println!("  {} ({})", option.text, option.value);
            }
        }
    }
    Ok(())
}

async fn cmd_parse(settings: &MatchbarConfig, text: &str, function: Option<&str>) -> Result<()> {
    let config = build_config(settings)?;
    let function = match function {
        Some(name) => Some(
            config
                .function(name)
                .with_context(|| format!("no function named {name:?}"))?,
        ),
        None => None,
    };
    let outcome = parse_paste(&config, text, &[], function).await;
    println!("{}", serde_json::to_string_pretty(&outcome.matchers)?);
    for token in &outcome.unmatched {
        eprintln!("unmatched: {token}");
    }
    Ok(())
}

fn cmd_brackets(tokens: &[String]) {
    let comparisons = bracket_tokens(tokens);
    let mismatched = validate_brackets(&comparisons);
    if mismatched.is_empty() {
        println!("balanced");
    } else {
        let list: Vec<String> = mismatched.iter().map(usize::to_string).collect();
        println!("mismatched at {}", list.join(", "));
    }
}

/// Brackets map to themselves; every other token is a plain term.
fn bracket_tokens(tokens: &[String]) -> Vec<Comparison> {
    tokens
        .iter()
        .map(|t| match Comparison::from_symbol(t.trim()) {
            Some(c) if c.is_bracket() => c,
            _ => Comparison::Equals,
        })
        .collect()
}

fn build_config(settings: &MatchbarConfig) -> Result<Config> {
    Config::from_settings(settings, Vec::new()).context("building engine configuration")
}

/// Load the settings file, or `None` when it does not exist.
async fn load_settings(path: &Path) -> Result<Option<MatchbarConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    MatchbarConfig::load(path)
        .await
        .map(Some)
        .with_context(|| format!("loading {}", path.display()))
}
