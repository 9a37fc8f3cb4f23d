//! Runtime configuration handed explicitly to edit sessions and sequences.

use std::time::Duration;

use matchbar_config::{DisplayConfig, MatchbarConfig, Nemonic};

use crate::matcher::Comparison;
use crate::source::{BuildError, DataSource};

/// Governs whether operators and brackets are parsed at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OperatorMode {
    /// No `and`/`or`, no brackets.
    Simple,
    /// `and`/`or` allowed; `or` may only join matchers of one source.
    AgGrid,
    /// `and`/`or` and brackets.
    #[default]
    Complex,
}

impl OperatorMode {
    /// Parse the settings-file spelling.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "simple" => Some(OperatorMode::Simple),
            "aggrid" => Some(OperatorMode::AgGrid),
            "complex" => Some(OperatorMode::Complex),
            _ => None,
        }
    }

    pub fn allows_operators(self) -> bool {
        self != OperatorMode::Simple
    }

    pub fn allows_brackets(self) -> bool {
        self == OperatorMode::Complex
    }
}

/// Resolved configuration for one editor instance. Read-only to the engine.
#[derive(Debug, Clone)]
pub struct Config {
    pub sources: Vec<DataSource>,
    pub functions: Vec<Nemonic>,
    pub and_symbol: String,
    pub or_symbol: String,
    pub default_comparison: Comparison,
    /// Union of every source's comparisons, in first-seen order.
    pub comparisons: Vec<Comparison>,
    pub default_item_limit: usize,
    pub mode: OperatorMode,
    pub search_start_length: usize,
    pub paste_timeout: Duration,
    pub display: DisplayConfig,
}

impl Config {
    /// Configuration with default settings over the given sources.
    pub fn new(sources: Vec<DataSource>) -> Self {
        let defaults = MatchbarConfig::default();
        Self {
            comparisons: comparison_union(&sources),
            sources,
            functions: Vec::new(),
            and_symbol: defaults.operators.and,
            or_symbol: defaults.operators.or,
            default_comparison: Comparison::Equals,
            default_item_limit: defaults.search.default_item_limit,
            mode: OperatorMode::default(),
            search_start_length: defaults.search.search_start_length,
            paste_timeout: Duration::from_millis(defaults.search.paste_timeout_ms),
            display: defaults.display,
        }
    }

    /// Resolve a settings file. File-defined sources come first, then `extra`
    /// (typically async lookups registered in code).
    pub fn from_settings(settings: &MatchbarConfig, extra: Vec<DataSource>) -> Result<Self, BuildError> {
        settings.validate()?;

        let mut sources = settings
            .sources
            .iter()
            .map(DataSource::from_def)
            .collect::<Result<Vec<_>, _>>()?;
        sources.extend(extra);

        let default_comparison = Comparison::from_symbol(&settings.operators.default_comparison)
            .ok_or_else(|| BuildError::Comparison(settings.operators.default_comparison.clone()))?;
        let mode = OperatorMode::from_name(&settings.operators.mode).unwrap_or_default();

        Ok(Self {
            comparisons: comparison_union(&sources),
            sources,
            functions: settings.functions.clone(),
            and_symbol: settings.operators.and.clone(),
            or_symbol: settings.operators.or.clone(),
            default_comparison,
            default_item_limit: settings.search.default_item_limit,
            mode,
            search_start_length: settings.search.search_start_length,
            paste_timeout: Duration::from_millis(settings.search.paste_timeout_ms),
            display: settings.display.clone(),
        })
    }

    pub fn with_functions(mut self, functions: Vec<Nemonic>) -> Self {
        self.functions = functions;
        self
    }

    pub fn with_mode(mut self, mode: OperatorMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_item_limit(mut self, limit: usize) -> Self {
        self.default_item_limit = limit;
        self
    }

    pub fn with_symbols(mut self, and: impl Into<String>, or: impl Into<String>) -> Self {
        self.and_symbol = and.into();
        self.or_symbol = or.into();
        self
    }

    pub fn with_paste_timeout(mut self, timeout: Duration) -> Self {
        self.paste_timeout = timeout;
        self
    }

    /// Look up a source by name.
    pub fn source(&self, name: &str) -> Option<&DataSource> {
        self.sources.iter().find(|ds| ds.name() == name)
    }

    /// Look up a function by name.
    pub fn function(&self, name: &str) -> Option<&Nemonic> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Symbol shown for `and`/`or` in edit buffers.
    pub fn operator_symbol(&self, operator: crate::matcher::Operator) -> &str {
        match operator {
            crate::matcher::Operator::And => &self.and_symbol,
            crate::matcher::Operator::Or => &self.or_symbol,
            crate::matcher::Operator::Empty => "",
        }
    }
}

fn comparison_union(sources: &[DataSource]) -> Vec<Comparison> {
    let mut union = Vec::new();
    for comparison in sources.iter().flat_map(|ds| ds.info().comparisons.iter()) {
        if !union.contains(comparison) {
            union.push(*comparison);
        }
    }
    union
}
