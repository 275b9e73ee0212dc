//! Store configuration.

use crate::types::Version;

/// Schema name used when none is configured.
pub const DEFAULT_SCHEMA_NAME: &str = "evostore";

/// Configuration for opening an entity store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Schema version the application expects loaded entities to conform to.
    pub application_version: Version,

    /// Name of the schema records are stored under.
    pub schema_name: Option<String>,

    /// Whether to sync storage on every commit (safer but slower).
    pub sync_on_commit: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            application_version: Version::from("1.0"),
            schema_name: None,
            sync_on_commit: true,
        }
    }
}

impl StoreConfig {
    /// Creates a configuration for the given application version.
    #[must_use]
    pub fn new(application_version: impl Into<Version>) -> Self {
        Self {
            application_version: application_version.into(),
            ..Self::default()
        }
    }

    /// Sets the application version.
    #[must_use]
    pub fn application_version(mut self, version: impl Into<Version>) -> Self {
        self.application_version = version.into();
        self
    }

    /// Sets the schema name.
    #[must_use]
    pub fn schema_name(mut self, name: impl Into<String>) -> Self {
        self.schema_name = Some(name.into());
        self
    }

    /// Sets whether to sync storage on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Returns the configured schema name or [`DEFAULT_SCHEMA_NAME`].
    #[must_use]
    pub fn effective_schema_name(&self) -> &str {
        self.schema_name.as_deref().unwrap_or(DEFAULT_SCHEMA_NAME)
    }
}
