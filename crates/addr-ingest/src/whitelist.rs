//! Top-level field whitelist
//!
//! A pure projection: fields outside the allowed set are dropped, survivors
//! keep their order and names.

use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::schema::Schema;

/// Fields allowed regardless of schema
pub const IMPLICIT_FIELDS: [&str; 2] = ["id", "type"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldWhitelist {
    allowed: HashSet<String>,
}

impl FieldWhitelist {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Schema fields plus `id` and `type`
    pub fn from_schema(schema: &Schema) -> Self {
        Self::new(
            schema
                .fields()
                .iter()
                .map(String::as_str)
                .chain(IMPLICIT_FIELDS),
        )
    }

    pub fn allows(&self, field: &str) -> bool {
        self.allowed.contains(field)
    }

    pub fn apply(&self, document: Map<String, Value>) -> Map<String, Value> {
        document
            .into_iter()
            .filter(|(field, _)| self.allows(field))
            .collect()
    }
}
