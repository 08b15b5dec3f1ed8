//! Import configuration
//!
//! Envelope constants and pipeline tuning for one import run.

use addr_common::{AddrError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::dedup::CoordinateAddressKey;

/// Upper bound for the dedup key's coordinate precision
pub const MAX_DEDUP_PRECISION: u32 = 12;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestConfig {
    /// Target index of every dispatch envelope
    #[serde(default = "default_index_name")]
    pub index_name: String,
    /// Document type stamped on requests and envelopes
    #[serde(default = "default_document_type")]
    pub document_type: String,
    /// ISO 3166-1 alpha-3 code stamped on every record
    #[serde(default = "default_country_code")]
    pub country_code: String,
    /// Capacity of each stage buffer
    #[serde(default = "default_high_water_mark")]
    pub high_water_mark: usize,
    #[serde(default = "default_progress_interval_secs")]
    pub progress_interval_secs: u64,
    /// Decimal places of the coordinate part of the default dedup key
    #[serde(default = "default_dedup_precision")]
    pub dedup_precision: u32,
    /// Index mapping to read the field whitelist from
    #[serde(default)]
    pub schema_path: Option<PathBuf>,
}

fn default_index_name() -> String {
    "addresses".to_string()
}

fn default_document_type() -> String {
    "address".to_string()
}

fn default_country_code() -> String {
    "GBR".to_string()
}

fn default_high_water_mark() -> usize {
    64
}

fn default_progress_interval_secs() -> u64 {
    10
}

fn default_dedup_precision() -> u32 {
    CoordinateAddressKey::DEFAULT_PRECISION
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            index_name: default_index_name(),
            document_type: default_document_type(),
            country_code: default_country_code(),
            high_water_mark: default_high_water_mark(),
            progress_interval_secs: default_progress_interval_secs(),
            dedup_precision: default_dedup_precision(),
            schema_path: None,
        }
    }
}

impl IngestConfig {
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder::default()
    }

    /// Load from `INGEST_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            index_name: std::env::var("INGEST_INDEX_NAME").unwrap_or(defaults.index_name),
            document_type: std::env::var("INGEST_DOCUMENT_TYPE")
                .unwrap_or(defaults.document_type),
            country_code: std::env::var("INGEST_COUNTRY_CODE").unwrap_or(defaults.country_code),
            high_water_mark: env_number("INGEST_HIGH_WATER_MARK", defaults.high_water_mark)?,
            progress_interval_secs: env_number(
                "INGEST_PROGRESS_INTERVAL_SECS",
                defaults.progress_interval_secs,
            )?,
            dedup_precision: env_number("INGEST_DEDUP_PRECISION", defaults.dedup_precision)?,
            schema_path: std::env::var("INGEST_SCHEMA_PATH").ok().map(PathBuf::from),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.index_name.trim().is_empty() {
            return Err(AddrError::Config("index name must not be empty".to_string()));
        }
        if self.document_type.trim().is_empty() {
            return Err(AddrError::Config("document type must not be empty".to_string()));
        }
        if self.country_code.len() != 3
            || !self.country_code.bytes().all(|b| b.is_ascii_uppercase())
        {
            return Err(AddrError::Config(format!(
                "country code '{}' must be three uppercase letters",
                self.country_code
            )));
        }
        if self.high_water_mark == 0 {
            return Err(AddrError::Config("high-water mark must be at least 1".to_string()));
        }
        if self.progress_interval_secs == 0 {
            return Err(AddrError::Config("progress interval must be non-zero".to_string()));
        }
        if self.dedup_precision > MAX_DEDUP_PRECISION {
            return Err(AddrError::Config(format!(
                "dedup precision {} exceeds {}",
                self.dedup_precision, MAX_DEDUP_PRECISION
            )));
        }
        Ok(())
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs)
    }
}

fn env_number<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AddrError::Config(format!("{} is not a valid number: '{}'", name, raw))),
        Err(_) => Ok(default),
    }
}

#[derive(Debug, Default)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    pub fn index_name(mut self, name: impl Into<String>) -> Self {
        self.config.index_name = name.into();
        self
    }

    pub fn document_type(mut self, document_type: impl Into<String>) -> Self {
        self.config.document_type = document_type.into();
        self
    }

    pub fn country_code(mut self, code: impl Into<String>) -> Self {
        self.config.country_code = code.into();
        self
    }

    pub fn high_water_mark(mut self, capacity: usize) -> Self {
        self.config.high_water_mark = capacity;
        self
    }

    pub fn progress_interval_secs(mut self, secs: u64) -> Self {
        self.config.progress_interval_secs = secs;
        self
    }

    pub fn dedup_precision(mut self, precision: u32) -> Self {
        self.config.dedup_precision = precision;
        self
    }

    pub fn schema_path(mut self, path: Option<PathBuf>) -> Self {
        self.config.schema_path = path;
        self
    }

    /// Validated configuration
    pub fn build(self) -> Result<IngestConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = IngestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.index_name, "addresses");
        assert_eq!(config.country_code, "GBR");
        assert_eq!(config.high_water_mark, 64);
        assert_eq!(config.progress_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_builder_validates() {
        let config = IngestConfig::builder()
            .country_code("FRA")
            .high_water_mark(8)
            .build()
            .unwrap();
        assert_eq!(config.country_code, "FRA");
        assert_eq!(config.high_water_mark, 8);

        assert!(IngestConfig::builder().country_code("gb").build().is_err());
        assert!(IngestConfig::builder().country_code("gbr").build().is_err());
        assert!(IngestConfig::builder().high_water_mark(0).build().is_err());
        assert!(IngestConfig::builder().progress_interval_secs(0).build().is_err());
        assert!(IngestConfig::builder().dedup_precision(13).build().is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: IngestConfig = serde_json::from_str(r#"{"country_code":"DEU"}"#).unwrap();
        assert_eq!(config.country_code, "DEU");
        assert_eq!(config.document_type, "address");
        assert_eq!(config.schema_path, None);
    }

    #[test]
    fn test_env_number_reports_bad_values() {
        std::env::set_var("INGEST_TEST_BAD_NUMBER", "lots");
        let err = env_number::<usize>("INGEST_TEST_BAD_NUMBER", 1).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(env_number::<usize>("INGEST_TEST_UNSET_NUMBER", 5).unwrap(), 5);
    }
}
