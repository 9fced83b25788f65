//! Configuration for the document store
//!
//! Provides a builder pattern for configuring schema synthesis and the row engine.

use serde::{Deserialize, Serialize};

/// Primary key strategy for root document tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IdType {
    /// Auto-incrementing integer assigned by the database
    #[default]
    Serial,
    /// Text UUID v4 generated by the engine before insert
    Uuid,
}

/// Locales known to the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizationConfig {
    /// Locale codes, e.g. `["en", "es"]`
    pub locales: Vec<String>,
    /// Locale used when a request does not name one
    #[serde(rename = "defaultLocale")]
    pub default_locale: String,
}

impl LocalizationConfig {
    /// Create a localization config; the first locale is the default
    pub fn new<I, S>(locales: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let locales: Vec<String> = locales.into_iter().map(Into::into).collect();
        let default_locale = locales.first().cloned().unwrap_or_default();
        Self {
            locales,
            default_locale,
        }
    }

    /// Override the default locale
    pub fn with_default(mut self, locale: impl Into<String>) -> Self {
        self.default_locale = locale.into();
        self
    }

    /// Whether `locale` is one of the configured locales
    pub fn contains(&self, locale: &str) -> bool {
        self.locales.iter().any(|l| l == locale)
    }
}

/// Configuration for the document store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// PostgreSQL database URL (unused by the in-memory backend)
    pub database_url: String,
    /// Localization settings; `None` disables locale side-tables entirely
    pub localization: Option<LocalizationConfig>,
    /// Reject reused block slugs whose field shape differs from the first occurrence
    pub strict_validation: bool,
    /// Build `unique` field indexes as plain indexes
    pub disable_unique: bool,
    /// Primary key strategy for root tables
    pub id_type: IdType,
    /// Whether root tables carry `created_at` / `updated_at`
    pub timestamps: bool,
}

impl StoreConfig {
    /// Create a new configuration builder
    pub fn builder(database_url: impl Into<String>) -> StoreConfigBuilder {
        StoreConfigBuilder::new(database_url)
    }
}

/// Builder for StoreConfig
#[derive(Debug)]
pub struct StoreConfigBuilder {
    database_url: String,
    localization: Option<LocalizationConfig>,
    strict_validation: bool,
    disable_unique: bool,
    id_type: IdType,
    timestamps: bool,
}

impl StoreConfigBuilder {
    /// Create a new builder with the database URL
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            localization: None,
            strict_validation: true,
            disable_unique: false,
            id_type: IdType::Serial,
            timestamps: true,
        }
    }

    /// Enable localization with the given settings
    pub fn localization(mut self, localization: LocalizationConfig) -> Self {
        self.localization = Some(localization);
        self
    }

    /// Shortcut for `localization(LocalizationConfig::new(locales))`
    pub fn locales<I, S>(self, locales: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.localization(LocalizationConfig::new(locales))
    }

    /// Enable or disable reused-block shape validation (default: true)
    pub fn strict_validation(mut self, enabled: bool) -> Self {
        self.strict_validation = enabled;
        self
    }

    /// Downgrade unique field indexes to plain indexes (default: false)
    pub fn disable_unique(mut self, disabled: bool) -> Self {
        self.disable_unique = disabled;
        self
    }

    /// Set the root table primary key strategy (default: Serial)
    pub fn id_type(mut self, id_type: IdType) -> Self {
        self.id_type = id_type;
        self
    }

    /// Enable or disable `created_at` / `updated_at` on root tables (default: true)
    pub fn timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> StoreConfig {
        StoreConfig {
            database_url: self.database_url,
            localization: self.localization,
            strict_validation: self.strict_validation,
            disable_unique: self.disable_unique,
            id_type: self.id_type,
            timestamps: self.timestamps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Defaults
    // =========================================================================

    #[test]
    fn test_default_config() {
        let config = StoreConfig::builder("postgres://localhost/test").build();

        assert_eq!(config.database_url, "postgres://localhost/test");
        assert!(config.localization.is_none());
        assert!(config.strict_validation);
        assert!(!config.disable_unique);
        assert_eq!(config.id_type, IdType::Serial);
        assert!(config.timestamps);
    }

    #[test]
    fn test_builder_accepts_string() {
        let config = StoreConfig::builder(String::from("postgres://localhost/db")).build();
        assert_eq!(config.database_url, "postgres://localhost/db");
    }

    // =========================================================================
    // Localization
    // =========================================================================

    #[test]
    fn test_locales_first_is_default() {
        let config = StoreConfig::builder("memory://")
            .locales(["en", "es"])
            .build();

        let localization = config.localization.unwrap();
        assert_eq!(localization.locales, vec!["en", "es"]);
        assert_eq!(localization.default_locale, "en");
        assert!(localization.contains("es"));
        assert!(!localization.contains("fr"));
    }

    #[test]
    fn test_localization_with_default() {
        let localization = LocalizationConfig::new(["en", "es"]).with_default("es");
        assert_eq!(localization.default_locale, "es");
    }

    #[test]
    fn test_localization_deserialization() {
        let json = r#"{"locales":["en","de"],"defaultLocale":"de"}"#;
        let localization: LocalizationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(localization.default_locale, "de");
    }

    // =========================================================================
    // Flags
    // =========================================================================

    #[test]
    fn test_full_custom_config() {
        let config = StoreConfig::builder("postgres://localhost/test")
            .strict_validation(false)
            .disable_unique(true)
            .id_type(IdType::Uuid)
            .timestamps(false)
            .build();

        assert!(!config.strict_validation);
        assert!(config.disable_unique);
        assert_eq!(config.id_type, IdType::Uuid);
        assert!(!config.timestamps);
    }

    #[test]
    fn test_id_type_serialization() {
        assert_eq!(serde_json::to_string(&IdType::Uuid).unwrap(), "\"uuid\"");
        assert_eq!(
            serde_json::from_str::<IdType>("\"serial\"").unwrap(),
            IdType::Serial
        );
    }
}
