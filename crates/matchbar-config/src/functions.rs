//! Function (nemonic) definitions.
//!
//! A function is a named higher-level operation. Once selected it scopes the
//! rest of the edit session to the sources it names and may switch off
//! operators or brackets.

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Accepted values for `functions[].paste_free_text`.
pub const FREE_TEXT_ACTIONS: [&str; 3] = ["original", "individual", "combined"];

/// A named function that scopes which data sources apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nemonic {
    /// Function name, matched case-insensitively while typing.
    pub name: String,

    /// Sources that must be represented before the sequence can complete.
    #[serde(default)]
    pub required_sources: Vec<String>,

    /// Sources that may be used but are not required.
    #[serde(default)]
    pub optional_sources: Vec<String>,

    /// Disable `and`/`or` parsing while active.
    #[serde(default)]
    pub no_and_or: bool,

    /// Disable bracket tokens while active.
    #[serde(default)]
    pub no_brackets: bool,

    /// Accept text that matches no source as a free-text matcher.
    #[serde(default)]
    pub allow_free_text: bool,

    /// What bulk paste does with unmatched text: "original", "individual" or "combined".
    #[serde(default = "default_paste_free_text")]
    pub paste_free_text: String,
}

fn default_paste_free_text() -> String {
    "original".to_string()
}

impl Nemonic {
    /// Create a function with no source scoping.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required_sources: Vec::new(),
            optional_sources: Vec::new(),
            no_and_or: false,
            no_brackets: false,
            allow_free_text: false,
            paste_free_text: default_paste_free_text(),
        }
    }

    /// Add a required source.
    pub fn require(mut self, source: impl Into<String>) -> Self {
        self.required_sources.push(source.into());
        self
    }

    /// Add an optional source.
    pub fn allow(mut self, source: impl Into<String>) -> Self {
        self.optional_sources.push(source.into());
        self
    }

    /// Whether `source` is named as required or optional.
    pub fn permits(&self, source: &str) -> bool {
        self.required_sources.iter().any(|s| s == source)
            || self.optional_sources.iter().any(|s| s == source)
    }

    /// Validate a single function entry; `index` is used in error messages.
    pub fn validate(&self, index: usize) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "functions[{index}].name must not be empty"
            )));
        }
        if self
            .required_sources
            .iter()
            .chain(&self.optional_sources)
            .any(|s| s.is_empty())
        {
            return Err(ConfigError::Validation(format!(
                "functions[{index}] names an empty source"
            )));
        }
        if !FREE_TEXT_ACTIONS.contains(&self.paste_free_text.as_str()) {
            return Err(ConfigError::Validation(format!(
                "functions[{index}].paste_free_text must be one of {:?}, got {:?}",
                FREE_TEXT_ACTIONS, self.paste_free_text
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MatchbarConfig;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_function_from_toml() {
        let toml = r#"
            [[functions]]
            name = "Top clients"
            required_sources = ["client"]
            optional_sources = ["currency"]
            no_brackets = true
            allow_free_text = true
            paste_free_text = "combined"
        "#;
        let config = MatchbarConfig::parse(toml).unwrap();
        let function = &config.functions[0];
        assert_eq!(function.name, "Top clients");
        assert!(function.no_brackets);
        assert!(!function.no_and_or);
        assert!(function.allow_free_text);
        assert_eq!(function.paste_free_text, "combined");
        assert!(function.permits("client"));
        assert!(function.permits("currency"));
        assert!(!function.permits("isin"));
    }

    #[test]
    fn test_builder_helpers() {
        let function = Nemonic::new("f").require("a").allow("b");
        assert_eq!(function.required_sources, vec!["a"]);
        assert_eq!(function.optional_sources, vec!["b"]);
        assert_eq!(function.paste_free_text, "original");
        assert!(function.validate(0).is_ok());
    }

    #[test]
    fn test_rejects_bad_paste_action() {
        let mut function = Nemonic::new("f");
        function.paste_free_text = "merge".to_string();
        assert!(function.validate(0).is_err());
    }

    #[test]
    fn test_rejects_empty_name() {
        assert!(Nemonic::new("  ").validate(3).is_err());
    }

    #[test]
    fn test_rejects_empty_source_reference() {
        let function = Nemonic::new("f").require("");
        assert!(function.validate(0).is_err());
    }
}
