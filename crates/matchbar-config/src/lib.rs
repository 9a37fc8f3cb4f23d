#![deny(unsafe_code)]

//! Settings file loading and validation for matchbar.
//!
//! Loads TOML configuration files and validates them against expected schemas.
//! Provides the [`MatchbarConfig`] type as the central settings structure, the
//! [`sources`] module for declarative data sources and the [`functions`]
//! module for the function (nemonic) registry.

/// Declarative function definitions that scope which sources apply.
pub mod functions;
/// Declarative data source definitions (static lists and pattern sources).
pub mod sources;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use functions::{FREE_TEXT_ACTIONS, Nemonic};
pub use sources::{SOURCE_KINDS, SourceDef, VALUE_KINDS};

/// Every comparison symbol the editor understands, brackets included.
pub const COMPARISON_SYMBOLS: [&str; 12] = [
    "=", ">", "<", ">=", "<=", "!", "*", "!*", "<*", ">*", "(", ")",
];

/// Accepted values for `operators.mode`.
pub const OPERATOR_MODES: [&str; 3] = ["simple", "aggrid", "complex"];

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level settings for one matcher editor instance.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MatchbarConfig {
    /// Operator symbols and the operator mode.
    #[serde(default)]
    pub operators: OperatorConfig,

    /// Suggestion and paste tuning.
    #[serde(default)]
    pub search: SearchConfig,

    /// Drop-down sizing hints for hosts that render option lists.
    #[serde(default)]
    pub display: DisplayConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Declarative data sources.
    #[serde(default)]
    pub sources: Vec<SourceDef>,

    /// Function registry.
    #[serde(default)]
    pub functions: Vec<Nemonic>,
}

/// Operator symbols and parse mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorConfig {
    /// Symbol accepted (and displayed in edit buffers) for `and`.
    #[serde(default = "default_and_symbol")]
    pub and: String,

    /// Symbol accepted (and displayed in edit buffers) for `or`.
    #[serde(default = "default_or_symbol")]
    pub or: String,

    /// Comparison applied when none is typed.
    #[serde(default = "default_comparison")]
    pub default_comparison: String,

    /// Operator mode: "simple", "aggrid" or "complex".
    #[serde(default = "default_mode")]
    pub mode: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            and: default_and_symbol(),
            or: default_or_symbol(),
            default_comparison: default_comparison(),
            mode: default_mode(),
        }
    }
}

fn default_and_symbol() -> String {
    "&".to_string()
}

fn default_or_symbol() -> String {
    "|".to_string()
}

fn default_comparison() -> String {
    "=".to_string()
}

fn default_mode() -> String {
    "complex".to_string()
}

/// Suggestion and paste tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Maximum options per category when a source sets no limit of its own.
    #[serde(default = "default_item_limit")]
    pub default_item_limit: usize,

    /// Minimum length of the search text before sources are queried.
    #[serde(default = "default_search_start_length")]
    pub search_start_length: usize,

    /// How long a bulk paste waits for async sources, in milliseconds.
    #[serde(default = "default_paste_timeout_ms")]
    pub paste_timeout_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_item_limit: default_item_limit(),
            search_start_length: default_search_start_length(),
            paste_timeout_ms: default_paste_timeout_ms(),
        }
    }
}

fn default_item_limit() -> usize {
    10
}

fn default_search_start_length() -> usize {
    1
}

fn default_paste_timeout_ms() -> u64 {
    500
}

/// Drop-down sizing hints. The engine never reads these; hosts do.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Maximum visible rows in the option drop-down.
    #[serde(default)]
    pub max_drop_down_height: Option<u16>,

    /// Minimum width of the option drop-down in columns.
    #[serde(default)]
    pub min_drop_down_width: Option<u16>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl MatchbarConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config = Self::parse(&content)?;
        tracing::debug!(
            path = %path.display(),
            sources = config.sources.len(),
            functions = config.functions.len(),
            "Loaded matchbar config"
        );
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: MatchbarConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_operators()?;

        if self.search.default_item_limit == 0 {
            return Err(ConfigError::Validation(
                "search.default_item_limit must be at least 1".to_string(),
            ));
        }
        if self.search.paste_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "search.paste_timeout_ms must be non-zero".to_string(),
            ));
        }

        let mut names = std::collections::HashSet::new();
        for (i, source) in self.sources.iter().enumerate() {
            source.validate(i)?;
            if !names.insert(source.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "sources[{i}].name {:?} is defined more than once",
                    source.name
                )));
            }
        }

        let mut function_names = std::collections::HashSet::new();
        for (i, function) in self.functions.iter().enumerate() {
            function.validate(i)?;
            if !function_names.insert(function.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "functions[{i}].name {:?} is defined more than once",
                    function.name
                )));
            }
        }

        Ok(())
    }

    fn validate_operators(&self) -> Result<(), ConfigError> {
        let ops = &self.operators;
        for (field, symbol) in [("and", &ops.and), ("or", &ops.or)] {
            if symbol.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "operators.{field} must not be empty"
                )));
            }
            if symbol.chars().any(char::is_whitespace) {
                return Err(ConfigError::Validation(format!(
                    "operators.{field} must not contain whitespace, got {symbol:?}"
                )));
            }
            if COMPARISON_SYMBOLS.iter().any(|c| symbol.starts_with(c)) {
                return Err(ConfigError::Validation(format!(
                    "operators.{field} must not start with a comparison symbol, got {symbol:?}"
                )));
            }
        }
        if ops.and == ops.or {
            return Err(ConfigError::Validation(format!(
                "operators.and and operators.or must differ, both are {:?}",
                ops.and
            )));
        }
        if !COMPARISON_SYMBOLS[..10].contains(&ops.default_comparison.as_str()) {
            return Err(ConfigError::Validation(format!(
                "operators.default_comparison must be one of {:?}, got {:?}",
                &COMPARISON_SYMBOLS[..10],
                ops.default_comparison
            )));
        }
        if !OPERATOR_MODES.contains(&ops.mode.as_str()) {
            return Err(ConfigError::Validation(format!(
                "operators.mode must be one of {:?}, got {:?}",
                OPERATOR_MODES, ops.mode
            )));
        }
        Ok(())
    }

    /// Look up a function definition by name.
    pub fn function(&self, name: &str) -> Option<&Nemonic> {
        self.functions.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = MatchbarConfig::default();
        assert_eq!(config.operators.and, "&");
        assert_eq!(config.operators.or, "|");
        assert_eq!(config.operators.default_comparison, "=");
        assert_eq!(config.operators.mode, "complex");
        assert_eq!(config.search.default_item_limit, 10);
        assert_eq!(config.search.search_start_length, 1);
        assert_eq!(config.logging.level, "info");
        assert!(config.sources.is_empty());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config = MatchbarConfig::parse("").unwrap();
        assert_eq!(config.search.paste_timeout_ms, 500);
        assert!(config.display.max_drop_down_height.is_none());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            [operators]
            and = "and"
            or = "or"
            default_comparison = "*"
            mode = "aggrid"

            [search]
            default_item_limit = 5
            search_start_length = 2
            paste_timeout_ms = 250

            [display]
            max_drop_down_height = 8
            min_drop_down_width = 30

            [logging]
            level = "debug"

            [[sources]]
            name = "currency"
            title = "Currency"
            comparisons = ["=", "!"]
            items = ["EUR", "GBP"]

            [[functions]]
            name = "Top clients"
            required_sources = ["currency"]
        "#;
        let config = MatchbarConfig::parse(toml).unwrap();
        assert_eq!(config.operators.and, "and");
        assert_eq!(config.operators.mode, "aggrid");
        assert_eq!(config.search.default_item_limit, 5);
        assert_eq!(config.search.search_start_length, 2);
        assert_eq!(config.display.max_drop_down_height, Some(8));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.function("Top clients").unwrap().required_sources, vec!["currency"]);
        assert!(config.function("missing").is_none());
    }

    #[test]
    fn test_validation_rejects_bad_mode() {
        let toml = r#"
            [operators]
            mode = "fancy"
        "#;
        let err = MatchbarConfig::parse(toml).unwrap_err();
        assert!(err.to_string().contains("operators.mode"));
    }

    #[test]
    fn test_validation_rejects_identical_symbols() {
        let toml = r#"
            [operators]
            and = "+"
            or = "+"
        "#;
        assert!(MatchbarConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_comparison_like_symbol() {
        let toml = r#"
            [operators]
            and = ">>"
        "#;
        assert!(MatchbarConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_whitespace_symbol() {
        let toml = r#"
            [operators]
            or = "o r"
        "#;
        assert!(MatchbarConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_bracket_default_comparison() {
        let toml = r#"
            [operators]
            default_comparison = "("
        "#;
        assert!(MatchbarConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_zero_item_limit() {
        let toml = r#"
            [search]
            default_item_limit = 0
        "#;
        assert!(MatchbarConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_duplicate_source_names() {
        let toml = r#"
            [[sources]]
            name = "a"
            title = "A"
            items = ["x"]

            [[sources]]
            name = "a"
            title = "Other A"
            items = ["y"]
        "#;
        let err = MatchbarConfig::parse(toml).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_validation_rejects_duplicate_function_names() {
        let toml = r#"
            [[functions]]
            name = "f"

            [[functions]]
            name = "f"
        "#;
        assert!(MatchbarConfig::parse(toml).is_err());
    }

    // ── Async file-based loading ──────────────────────────────────────

    #[tokio::test]
    async fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("matchbar.toml");
        tokio::fs::write(&path, b"[search]\ndefault_item_limit = 3\n")
            .await
            .unwrap();

        let config = MatchbarConfig::load(&path).await.unwrap();
        assert_eq!(config.search.default_item_limit, 3);
    }

    #[tokio::test]
    async fn test_load_nonexistent_file() {
        let result = MatchbarConfig::load(Path::new("/nonexistent/matchbar.toml")).await;
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[tokio::test]
    async fn test_load_invalid_toml_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        tokio::fs::write(&path, b"not valid toml [[[").await.unwrap();

        let result = MatchbarConfig::load(&path).await;
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    // ── Error display ─────────────────────────────────────────────────

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Validation("bad value".to_string());
        assert_eq!(err.to_string(), "validation error: bad value");
    }
}
