//! Declarative data sources.
//!
//! Two kinds can be written in a settings file:
//!
//! - `list`: a static lookup over `items` (strings or tables). Tables are
//!   projected through `text_field` / `value_field`.
//! - `pattern`: a value source that accepts typed text matching `pattern` and
//!   converts it with the `value` kind (`text`, `number` or `date`).
//!
//! Async lookups cannot be expressed in TOML; hosts register those in code.
//!
//! ## TOML Example
//!
//! ```toml
//! [[sources]]
//! name = "issuer"
//! title = "Issuer"
//! kind = "list"
//! comparisons = ["=", "!", "*"]
//! ignore_case = true
//! text_field = "label"
//! value_field = "id"
//! items = [{ id = "US01", label = "US Treasury" }, { id = "DE02", label = "Bund" }]
//!
//! [[sources]]
//! name = "maturity"
//! title = "Maturity"
//! kind = "pattern"
//! comparisons = ["=", ">", "<"]
//! pattern = '^\d+[mMyY]$'
//! value = "date"
//! ```

use serde::{Deserialize, Serialize};

use crate::{COMPARISON_SYMBOLS, ConfigError};

/// Accepted values for `sources[].kind`.
pub const SOURCE_KINDS: [&str; 2] = ["list", "pattern"];

/// Accepted values for `sources[].value`.
pub const VALUE_KINDS: [&str; 3] = ["text", "number", "date"];

/// A data source as expressed in TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDef {
    /// Unique source name, stored on every matcher it produces.
    pub name: String,

    /// Category label shown above this source's options.
    pub title: String,

    /// Source kind: "list" or "pattern".
    #[serde(default = "default_kind")]
    pub kind: String,

    /// Comparison symbols legal for this source.
    #[serde(default = "default_comparisons")]
    pub comparisons: Vec<String>,

    /// Category ordering weight (higher sorts earlier).
    #[serde(default)]
    pub precedence: Option<u32>,

    /// Maximum number of matchers from this source at once.
    #[serde(default)]
    pub selection_limit: Option<usize>,

    /// Only offered while a function that names this source is active.
    #[serde(default)]
    pub functional: bool,

    /// Case-insensitive substring matching (list sources).
    #[serde(default)]
    pub ignore_case: bool,

    /// Per-source option limit (list sources).
    #[serde(default)]
    pub item_limit: Option<usize>,

    /// Per-source minimum search length (list sources).
    #[serde(default)]
    pub search_start_length: Option<usize>,

    /// Whether bulk paste may auto-match against this source.
    #[serde(default = "default_match_on_paste")]
    pub match_on_paste: bool,

    /// Static items (list sources).
    #[serde(default)]
    pub items: Vec<serde_json::Value>,

    /// Field of table items used as display text.
    #[serde(default)]
    pub text_field: Option<String>,

    /// Field of table items used as the matcher value.
    #[serde(default)]
    pub value_field: Option<String>,

    /// Regular expression typed text must match (pattern sources).
    #[serde(default)]
    pub pattern: Option<String>,

    /// How matched text is converted: "text", "number" or "date".
    #[serde(default = "default_value_kind")]
    pub value: String,
}

fn default_kind() -> String {
    "list".to_string()
}

fn default_comparisons() -> Vec<String> {
    vec!["=".to_string(), "!".to_string()]
}

fn default_match_on_paste() -> bool {
    true
}

fn default_value_kind() -> String {
    "text".to_string()
}

impl SourceDef {
    /// Whether this is a static list source.
    pub fn is_list(&self) -> bool {
        self.kind == "list"
    }

    /// Validate a single source entry; `index` is used in error messages.
    pub fn validate(&self, index: usize) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::Validation(format!(
                "sources[{index}].name must not be empty"
            )));
        }
        if self.title.is_empty() {
            return Err(ConfigError::Validation(format!(
                "sources[{index}].title must not be empty"
            )));
        }
        if !SOURCE_KINDS.contains(&self.kind.as_str()) {
            return Err(ConfigError::Validation(format!(
                "sources[{index}].kind must be one of {:?}, got {:?}",
                SOURCE_KINDS, self.kind
            )));
        }
        if self.comparisons.is_empty() {
            return Err(ConfigError::Validation(format!(
                "sources[{index}].comparisons must not be empty"
            )));
        }
        for symbol in &self.comparisons {
            // Brackets are structural tokens, never a source comparison.
            if !COMPARISON_SYMBOLS[..10].contains(&symbol.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "sources[{index}].comparisons contains unknown symbol {symbol:?}"
                )));
            }
        }
        if self.selection_limit == Some(0) {
            return Err(ConfigError::Validation(format!(
                "sources[{index}].selection_limit must be at least 1"
            )));
        }
        if self.item_limit == Some(0) {
            return Err(ConfigError::Validation(format!(
                "sources[{index}].item_limit must be at least 1"
            )));
        }

        match self.kind.as_str() {
            "list" => {
                if self.items.is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "sources[{index}].items is required when kind is \"list\""
                    )));
                }
                if self.pattern.is_some() {
                    return Err(ConfigError::Validation(format!(
                        "sources[{index}].pattern is only valid when kind is \"pattern\""
                    )));
                }
            }
            _ => {
                let Some(pattern) = &self.pattern else {
                    return Err(ConfigError::Validation(format!(
                        "sources[{index}].pattern is required when kind is \"pattern\""
                    )));
                };
                if let Err(e) = regex::Regex::new(pattern) {
                    return Err(ConfigError::Validation(format!(
                        "sources[{index}].pattern does not compile: {e}"
                    )));
                }
                if !VALUE_KINDS.contains(&self.value.as_str()) {
                    return Err(ConfigError::Validation(format!(
                        "sources[{index}].value must be one of {:?}, got {:?}",
                        VALUE_KINDS, self.value
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::MatchbarConfig;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_list_source_from_toml() {
        let toml = r#"
            [[sources]]
            name = "issuer"
            title = "Issuer"
            comparisons = ["=", "!", "*"]
            precedence = 3
            ignore_case = true
            text_field = "label"
            value_field = "id"
            items = [{ id = "US01", label = "US Treasury" }, { id = "DE02", label = "Bund" }]
        "#;
        let config = MatchbarConfig::parse(toml).unwrap();
        let source = &config.sources[0];
        assert!(source.is_list());
        assert_eq!(source.precedence, Some(3));
        assert!(source.ignore_case);
        assert!(source.match_on_paste);
        assert_eq!(source.items.len(), 2);
        assert_eq!(source.items[0]["label"], "US Treasury");
        assert_eq!(source.text_field.as_deref(), Some("label"));
    }

    #[test]
    fn test_pattern_source_from_toml() {
        let toml = r#"
            [[sources]]
            name = "coupon"
            title = "Coupon"
            kind = "pattern"
            comparisons = ["=", ">", "<", ">=", "<=", "!"]
            pattern = '^\d+(\.\d+)?$'
            value = "number"
        "#;
        let config = MatchbarConfig::parse(toml).unwrap();
        let source = &config.sources[0];
        assert!(!source.is_list());
        assert_eq!(source.value, "number");
        assert_eq!(source.comparisons.len(), 6);
    }

    #[test]
    fn test_default_comparisons() {
        let toml = r#"
            [[sources]]
            name = "ccy"
            title = "Currency"
            items = ["EUR"]
        "#;
        let config = MatchbarConfig::parse(toml).unwrap();
        assert_eq!(config.sources[0].comparisons, vec!["=", "!"]);
    }

    #[test]
    fn test_rejects_unknown_kind() {
        let toml = r#"
            [[sources]]
            name = "x"
            title = "X"
            kind = "remote"
        "#;
        let err = MatchbarConfig::parse(toml).unwrap_err();
        assert!(err.to_string().contains("sources[0].kind"));
    }

    #[test]
    fn test_rejects_list_without_items() {
        let toml = r#"
            [[sources]]
            name = "x"
            title = "X"
        "#;
        let err = MatchbarConfig::parse(toml).unwrap_err();
        assert!(err.to_string().contains("items is required"));
    }

    #[test]
    fn test_rejects_pattern_without_pattern() {
        let toml = r#"
            [[sources]]
            name = "x"
            title = "X"
            kind = "pattern"
        "#;
        let err = MatchbarConfig::parse(toml).unwrap_err();
        assert!(err.to_string().contains("pattern is required"));
    }

    #[test]
    fn test_rejects_bad_regex() {
        let toml = r#"
            [[sources]]
            name = "x"
            title = "X"
            kind = "pattern"
            pattern = "([a-z"
        "#;
        let err = MatchbarConfig::parse(toml).unwrap_err();
        assert!(err.to_string().contains("does not compile"));
    }

    #[test]
    fn test_rejects_bracket_comparison() {
        let toml = r#"
            [[sources]]
            name = "x"
            title = "X"
            comparisons = ["=", "("]
            items = ["a"]
        "#;
        assert!(MatchbarConfig::parse(toml).is_err());
    }

    #[test]
    fn test_rejects_bad_value_kind() {
        let toml = r#"
            [[sources]]
            name = "x"
            title = "X"
            kind = "pattern"
            pattern = "^a$"
            value = "money"
        "#;
        assert!(MatchbarConfig::parse(toml).is_err());
    }

    #[test]
    fn test_rejects_zero_selection_limit() {
        let toml = r#"
            [[sources]]
            name = "x"
            title = "X"
            selection_limit = 0
            items = ["a"]
        "#;
        assert!(MatchbarConfig::parse(toml).is_err());
    }
}
