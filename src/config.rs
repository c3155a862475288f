// Report configuration (branding + thresholds), loaded from TOML

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub brand_name: String,
    pub subtitle: String,

    /// Prefix stripped from store names in chart labels
    pub store_name_prefix: String,

    /// Cancel rate (%) above which the risk section turns red
    pub cancel_alert_threshold: f64,

    /// Target cancel rate (%) quoted in the alert
    pub cancel_target: f64,

    pub currency_symbol: String,
    pub footer: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig {
            brand_name: "Luckin Coffee".to_string(),
            subtitle: "US Operations".to_string(),
            store_name_prefix: "Luckin Coffee".to_string(),
            cancel_alert_threshold: 3.0,
            cancel_target: 2.0,
            currency_symbol: "$".to_string(),
            footer: "Internal Report | Confidential".to_string(),
        }
    }
}

impl ReportConfig {
    /// Load from a TOML file; omitted keys keep their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let config = Self::from_toml(&text).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })?;

        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: ReportConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: "<inline>".to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("cancel_alert_threshold", self.cancel_alert_threshold),
            ("cancel_target", self.cancel_target),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be between 0 and 100, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Store name as shown in the report
    pub fn display_store<'a>(&self, store: &'a str) -> &'a str {
        let prefix = self.store_name_prefix.trim();
        let stripped = if prefix.is_empty() {
            store
        } else {
            store.strip_prefix(prefix).unwrap_or(store)
        };

        let stripped = stripped.trim();
        if stripped.is_empty() {
            store.trim()
        } else {
            stripped
        }
    }
}
