use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{Config, ValidationResult};

/// Application state shared by the CLI commands
pub struct App {
    config: Arc<Config>,
    validation: ValidationResult,
}

impl App {
    /// Create a new application instance from the user's config file
    pub fn new() -> Result<Self> {
        let (config, validation) = Config::load_validated()?;
        Ok(Self {
            config: Arc::new(config),
            validation,
        })
    }

    /// Create an application instance from an already-built config
    pub fn with_config(config: Config) -> Result<Self> {
        let validation = config.validate();
        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }
        Ok(Self {
            config: Arc::new(config),
            validation,
        })
    }

    /// Make sure the data directory exists before the stores touch it
    pub fn initialize(&self) -> Result<()> {
        let data_dir = self.data_dir();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

        tracing::info!(
            data_dir = %data_dir.display(),
            warnings = self.validation.warnings.len(),
            "Application initialized"
        );
        Ok(())
    }

    /// Get reference to application config
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared handle to the config
    pub fn shared_config(&self) -> Arc<Config> {
        self.config.clone()
    }

    /// Warnings collected while validating the config
    pub fn warnings(&self) -> &ValidationResult {
        &self.validation
    }

    pub fn data_dir(&self) -> PathBuf {
        self.config.data_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_config_rejects_invalid() {
        let mut config = Config::default();
        config.storage.history_limit = 0;
        assert!(App::with_config(config).is_err());
    }

    #[test]
    fn test_initialize_creates_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.data_dir = Some(dir.path().join("data"));

        let app = App::with_config(config).unwrap();
        app.initialize().unwrap();

        assert!(dir.path().join("data").is_dir());
        assert!(app.warnings().is_valid());
    }
}
