//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised engine [`Config`] values
//! without repeating boilerplate across crate boundaries.

use std::sync::Arc;
use std::time::Duration;

use matchbar_config::Nemonic;
use matchbar_core::config::{Config, OperatorMode};
use matchbar_core::source::DataSource;

use crate::fixtures::reference_sources;

/// Fluent builder for [`Config`] in tests. Starts from the reference sources.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .mode(OperatorMode::AgGrid)
///     .function(Nemonic::new("Top clients").require("Client"))
///     .build();
/// ```
pub struct TestConfigBuilder {
    sources: Vec<DataSource>,
    functions: Vec<Nemonic>,
    mode: OperatorMode,
    item_limit: Option<usize>,
    paste_timeout: Option<Duration>,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            sources: reference_sources(),
            functions: Vec::new(),
            mode: OperatorMode::default(),
            item_limit: None,
            paste_timeout: None,
        }
    }

    /// Start with no sources at all.
    pub fn empty() -> Self {
        Self {
            sources: Vec::new(),
            ..Self::new()
        }
    }

    pub fn source(mut self, source: impl Into<DataSource>) -> Self {
        self.sources.push(source.into());
        self
    }

    pub fn function(mut self, function: Nemonic) -> Self {
        self.functions.push(function);
        self
    }

    pub fn mode(mut self, mode: OperatorMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn item_limit(mut self, limit: usize) -> Self {
        self.item_limit = Some(limit);
        self
    }

    pub fn paste_timeout(mut self, timeout: Duration) -> Self {
        self.paste_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Config {
        let mut config = Config::new(self.sources)
            .with_functions(self.functions)
            .with_mode(self.mode);
        if let Some(limit) = self.item_limit {
            config = config.with_item_limit(limit);
        }
        if let Some(timeout) = self.paste_timeout {
            config = config.with_paste_timeout(timeout);
        }
        config
    }

    /// Build behind an `Arc`, as sessions and controllers take it.
    pub fn shared(self) -> Arc<Config> {
        Arc::new(self.build())
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
