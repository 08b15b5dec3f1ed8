//! Persisted field set for one document type

use addr_common::{AddrError, Result};
use serde_json::Value;
use std::path::Path;

const ADDRESS_FIELDS: &[&str] = &[
    "name",
    "admin0",
    "admin1",
    "admin2",
    "countryCode",
    "centerPoint",
    "postalCode",
    "suggest",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    document_type: String,
    fields: Vec<String>,
}

impl Schema {
    pub fn new(document_type: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            document_type: document_type.into(),
            fields,
        }
    }

    /// Built-in field set of the `address` document type
    pub fn address_default() -> Self {
        Self::new(
            "address",
            ADDRESS_FIELDS.iter().map(|f| f.to_string()).collect(),
        )
    }

    /// Read `mappings.<document_type>.properties` from an index mapping.
    pub fn from_mapping(mapping: &Value, document_type: &str) -> Result<Self> {
        let properties = mapping
            .get("mappings")
            .and_then(|m| m.get(document_type))
            .and_then(|t| t.get("properties"))
            .and_then(Value::as_object)
            .ok_or_else(|| {
                AddrError::Config(format!(
                    "schema has no mappings.{}.properties object",
                    document_type
                ))
            })?;

        Ok(Self::new(document_type, properties.keys().cloned().collect()))
    }

    pub async fn load(path: &Path, document_type: &str) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            AddrError::Config(format!("cannot read schema {}: {}", path.display(), e))
        })?;
        let mapping: Value = serde_json::from_str(&raw).map_err(|e| {
            AddrError::Config(format!("invalid schema {}: {}", path.display(), e))
        })?;
        Self::from_mapping(&mapping, document_type)
    }

    pub fn document_type(&self) -> &str {
        &self.document_type
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}
