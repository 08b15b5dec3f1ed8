//! Enrichment adapter bridge
//!
//! Reshapes deduplicated records into the enrichment service's request
//! envelope. Service output is passed on untouched; turning it into an
//! index write is the dispatch mapper's job.

use addr_common::{AddrError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::record::{AddressRecord, RecordId};

/// Document produced by the enrichment service
pub type EnrichedDocument = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayName {
    pub default: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CenterPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Input envelope of the enrichment service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentRequest {
    pub id: RecordId,
    #[serde(rename = "type")]
    pub document_type: String,
    pub name: DisplayName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin0: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin2: Option<String>,
    pub country_code: String,
    pub center_point: CenterPoint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
}

impl EnrichmentRequest {
    /// JSON object form, fields in declaration order
    pub fn into_document(self) -> Result<EnrichedDocument> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(AddrError::Enrichment(format!(
                "request serialized to a non-object value: {}",
                other
            ))),
        }
    }
}

/// Assigns ids and builds enrichment requests, in stream order.
#[derive(Debug, Clone)]
pub struct EnrichmentBridge {
    next_id: u64,
    country_code: String,
    document_type: String,
}

impl EnrichmentBridge {
    pub fn new(country_code: impl Into<String>, document_type: impl Into<String>) -> Self {
        Self {
            next_id: 1,
            country_code: country_code.into(),
            document_type: document_type.into(),
        }
    }

    /// Number of requests built so far
    pub fn issued(&self) -> u64 {
        self.next_id - 1
    }

    pub fn to_request(&mut self, record: &AddressRecord) -> EnrichmentRequest {
        let id = RecordId::Number(self.next_id);
        self.next_id += 1;

        EnrichmentRequest {
            id,
            document_type: self.document_type.clone(),
            name: DisplayName {
                default: record.display_name(),
            },
            admin0: record.country().map(str::to_string),
            admin1: record.region().map(str::to_string),
            admin2: record.locality().map(str::to_string),
            country_code: self.country_code.clone(),
            center_point: CenterPoint {
                lat: record.latitude(),
                lon: record.longitude(),
            },
            postal_code: record.postal_code().map(str::to_string),
        }
    }
}

/// External enrichment collaborator.
///
/// Implementations must return a document carrying the request's `id`
/// unchanged.
#[async_trait]
pub trait EnrichmentService: Send + Sync {
    async fn enrich(&self, request: EnrichmentRequest) -> Result<EnrichedDocument>;
}

/// Returns the request itself as the enriched document
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughEnricher;

#[async_trait]
impl EnrichmentService for PassthroughEnricher {
    async fn enrich(&self, request: EnrichmentRequest) -> Result<EnrichedDocument> {
        request.into_document()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_record() -> AddressRecord {
        AddressRecord::new("221B", "Baker Street", 51.5237, -0.1585)
            .unwrap()
            .with_name(Some("Museum".into()))
            .with_locality(Some("London".into()))
            .with_region(Some("England".into()))
            .with_country(Some("United Kingdom".into()))
            .with_postal_code(Some("NW1 6XE".into()))
    }

    #[test]
    fn test_request_shape() {
        let mut bridge = EnrichmentBridge::new("GBR", "address");
        let document = bridge.to_request(&full_record()).into_document().unwrap();

        assert_eq!(
            Value::Object(document.clone()),
            json!({
                "id": 1,
                "type": "address",
                "name": {"default": "Museum 221B Baker Street"},
                "admin0": "United Kingdom",
                "admin1": "England",
                "admin2": "London",
                "countryCode": "GBR",
                "centerPoint": {"lat": 51.5237, "lon": -0.1585},
                "postalCode": "NW1 6XE"
            })
        );
        let keys: Vec<&str> = document.keys().map(String::as_str).collect();
        assert_eq!(keys[..3], ["id", "type", "name"]);
    }

    #[test]
    fn test_ids_are_sequential_and_optional_fields_omitted() {
        let mut bridge = EnrichmentBridge::new("FRA", "address");
        let bare = AddressRecord::new("1", "Rue de Rivoli", 48.86, 2.34).unwrap();

        let first = bridge.to_request(&bare);
        let second = bridge.to_request(&bare);
        assert_eq!(first.id, RecordId::Number(1));
        assert_eq!(second.id, RecordId::Number(2));
        assert_eq!(bridge.issued(), 2);

        let document = second.into_document().unwrap();
        assert!(!document.contains_key("admin0"));
        assert!(!document.contains_key("postalCode"));
        assert_eq!(document["name"]["default"], "1 Rue de Rivoli");
        assert_eq!(document["countryCode"], "FRA");
    }

    #[tokio::test]
    async fn test_passthrough_keeps_id() {
        let mut bridge = EnrichmentBridge::new("GBR", "address");
        let request = bridge.to_request(&full_record());
        let document = PassthroughEnricher.enrich(request).await.unwrap();
        assert_eq!(document["id"], 1);
    }
}
