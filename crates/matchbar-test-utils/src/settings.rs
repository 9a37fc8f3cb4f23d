//! Settings-file helpers.
//!
//! [`TestSettings`] writes TOML to a temporary file and loads it through the
//! real [`MatchbarConfig::load`] path.

use std::path::PathBuf;

use matchbar_config::MatchbarConfig;
use tempfile::TempDir;

/// Loaded settings with an owned temp directory.
///
/// The temp directory is deleted when this value is dropped, even on panic.
pub struct TestSettings {
    pub settings: MatchbarConfig,
    pub path: PathBuf,
    _temp_dir: TempDir,
}

impl TestSettings {
    /// Write `toml_content` to a temp file and load it.
    pub async fn with_toml(toml_content: &str) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("matchbar.toml");
        tokio::fs::write(&path, toml_content)
            .await
            .expect("failed to write test settings");

        let settings = MatchbarConfig::load(&path)
            .await
            .expect("failed to parse test settings");

        Self {
            settings,
            path,
            _temp_dir: temp_dir,
        }
    }

    /// Overwrite the temp file with new content.
    pub async fn write(&self, toml_content: &str) {
        tokio::fs::write(&self.path, toml_content)
            .await
            .expect("failed to write updated settings");
    }
}
