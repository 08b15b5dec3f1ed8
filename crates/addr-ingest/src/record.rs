//! Canonical address record produced by every dataset adapter

use serde::{Deserialize, Serialize};
use std::fmt;

/// A normalized address with a finite coordinate.
///
/// Records are immutable once built: fields are private and every stage
/// reads them through accessors. A record can only exist with a finite
/// latitude/longitude, so rows failing that check are never constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAddressRecord", into = "RawAddressRecord")]
pub struct AddressRecord {
    name: Option<String>,
    house_number: String,
    street: String,
    locality: Option<String>,
    region: Option<String>,
    postal_code: Option<String>,
    country: Option<String>,
    latitude: f64,
    longitude: f64,
}

impl AddressRecord {
    /// Build a record, returning `None` when either coordinate is not finite.
    pub fn new(
        house_number: impl Into<String>,
        street: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Option<Self> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return None;
        }

        Some(Self {
            name: None,
            house_number: house_number.into(),
            street: street.into(),
            locality: None,
            region: None,
            postal_code: None,
            country: None,
            latitude,
            longitude,
        })
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn with_locality(mut self, locality: Option<String>) -> Self {
        self.locality = locality;
        self
    }

    pub fn with_region(mut self, region: Option<String>) -> Self {
        self.region = region;
        self
    }

    pub fn with_postal_code(mut self, postal_code: Option<String>) -> Self {
        self.postal_code = postal_code;
        self
    }

    pub fn with_country(mut self, country: Option<String>) -> Self {
        self.country = country;
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn house_number(&self) -> &str {
        &self.house_number
    }

    pub fn street(&self) -> &str {
        &self.street
    }

    pub fn locality(&self) -> Option<&str> {
        self.locality.as_deref()
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn postal_code(&self) -> Option<&str> {
        self.postal_code.as_deref()
    }

    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Display name: building name (if any), house number and street.
    pub fn display_name(&self) -> String {
        [
            self.name.as_deref().unwrap_or(""),
            self.house_number.as_str(),
            self.street.as_str(),
        ]
        .join(" ")
        .trim()
        .to_string()
    }
}

impl fmt::Display for AddressRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:.6}, {:.6})",
            self.display_name(),
            self.latitude,
            self.longitude
        )
    }
}

/// Identifier assigned to a record on its way to the index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(u64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{}", n),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

/// Trim a raw field, mapping blank values to `None`.
pub fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Wire form used for JSON-lines input; validated on the way in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAddressRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    house_number: String,
    street: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    locality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    country: Option<String>,
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawAddressRecord> for AddressRecord {
    type Error = String;

    fn try_from(raw: RawAddressRecord) -> Result<Self, Self::Error> {
        if raw.house_number.trim().is_empty() || raw.street.trim().is_empty() {
            return Err("house number and street are required".to_string());
        }

        let record = AddressRecord::new(raw.house_number, raw.street, raw.latitude, raw.longitude)
            .ok_or_else(|| "latitude and longitude must be finite numbers".to_string())?;

        Ok(record
            .with_name(raw.name)
            .with_locality(raw.locality)
            .with_region(raw.region)
            .with_postal_code(raw.postal_code)
            .with_country(raw.country))
    }
}

impl From<AddressRecord> for RawAddressRecord {
    fn from(record: AddressRecord) -> Self {
        Self {
            name: record.name,
            house_number: record.house_number,
            street: record.street,
            locality: record.locality,
            region: record.region,
            postal_code: record.postal_code,
            country: record.country,
            latitude: record.latitude,
            longitude: record.longitude,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_finite_coordinates() {
        assert!(AddressRecord::new("1", "High St", f64::NAN, 0.0).is_none());
        assert!(AddressRecord::new("1", "High St", 51.5, f64::INFINITY).is_none());
        assert!(AddressRecord::new("1", "High St", 51.5, -0.12).is_some());
    }

    #[test]
    fn test_display_name_without_building_name() {
        let record = AddressRecord::new("12", "Baker Street", 51.52, -0.15).unwrap();
        assert_eq!(record.display_name(), "12 Baker Street");

        let named = record.with_name(Some("Rose Cottage".into()));
        assert_eq!(named.display_name(), "Rose Cottage 12 Baker Street");
    }

    #[test]
    fn test_json_decode_validates() {
        let ok: AddressRecord = serde_json::from_str(concat!(
            r#"{"houseNumber":"3","street":"Mill Lane","#,
            r#""latitude":52.1,"longitude":-1.2,"locality":"Oxford"}"#,
        ))
        .unwrap();
        assert_eq!(ok.locality(), Some("Oxford"));
        assert_eq!(ok.region(), None);

        let missing_street = serde_json::from_str::<AddressRecord>(
            r#"{"houseNumber":"3","street":" ","latitude":52.1,"longitude":-1.2}"#,
        );
        assert!(missing_street.is_err());
    }

    #[test]
    fn test_record_id_serializes_untagged() {
        assert_eq!(serde_json::to_string(&RecordId::Number(7)).unwrap(), "7");
        assert_eq!(
            serde_json::to_string(&RecordId::Text("gb-7".into())).unwrap(),
            "\"gb-7\""
        );
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty("  "), None);
        assert_eq!(non_empty(" Leeds "), Some("Leeds".to_string()));
    }
}
