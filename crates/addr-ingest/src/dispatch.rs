//! Dispatch mapper and index clients
//!
//! The mapper takes the `id` out of an enriched document and wraps the rest
//! in the index client's write envelope. One envelope per document, in
//! input order.

use addr_common::{AddrError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::debug;

use crate::record::RecordId;

/// Write request understood by an [`IndexClient`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchEnvelope {
    #[serde(rename = "_index")]
    pub index_name: String,
    #[serde(rename = "_type")]
    pub document_type: String,
    #[serde(rename = "_id")]
    pub id: RecordId,
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct DispatchMapper {
    index_name: String,
    document_type: String,
}

impl DispatchMapper {
    pub fn new(index_name: impl Into<String>, document_type: impl Into<String>) -> Self {
        Self {
            index_name: index_name.into(),
            document_type: document_type.into(),
        }
    }

    /// Split `id` from the body; a missing or non-scalar id is an error.
    pub fn map(&self, document: Map<String, Value>) -> Result<DispatchEnvelope> {
        let mut id = None;
        // Rebuild instead of remove(): keeps the remaining fields in order
        let data: Map<String, Value> = document
            .into_iter()
            .filter_map(|(field, value)| {
                if field == "id" {
                    id = Some(value);
                    None
                } else {
                    Some((field, value))
                }
            })
            .collect();

        let id = match id {
            Some(Value::Number(n)) => n.as_u64().map(RecordId::Number),
            Some(Value::String(s)) if !s.is_empty() => Some(RecordId::Text(s)),
            _ => None,
        }
        .ok_or_else(|| AddrError::Dispatch("document has no usable id field".to_string()))?;

        Ok(DispatchEnvelope {
            index_name: self.index_name.clone(),
            document_type: self.document_type.clone(),
            id,
            data,
        })
    }
}

/// Persistence collaborator. Retries and failure policy are its own
/// concern; any error returned here ends the run.
#[async_trait]
pub trait IndexClient: Send + Sync {
    async fn write(&self, envelope: DispatchEnvelope) -> Result<()>;

    /// Flush buffered writes after the last envelope.
    async fn finish(&self) -> Result<()> {
        Ok(())
    }
}

type Sink = Box<dyn AsyncWrite + Send + Unpin>;

/// Writes each envelope as one JSON line
pub struct JsonLinesIndexClient {
    writer: Mutex<BufWriter<Sink>>,
    written: AtomicU64,
}

impl JsonLinesIndexClient {
    pub fn new(writer: Sink) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            written: AtomicU64::new(0),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(tokio::io::stdout()))
    }

    pub async fn create(path: &Path) -> Result<Self> {
        let file = tokio::fs::File::create(path).await.map_err(|e| {
            AddrError::Index(format!("cannot create output {}: {}", path.display(), e))
        })?;
        Ok(Self::new(Box::new(file)))
    }

    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl IndexClient for JsonLinesIndexClient {
    async fn write(&self, envelope: DispatchEnvelope) -> Result<()> {
        let mut line = serde_json::to_vec(&envelope)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(&line)
            .await
            .map_err(|e| AddrError::Index(e.to_string()))?;
        self.written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn finish(&self) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer
            .flush()
            .await
            .map_err(|e| AddrError::Index(e.to_string()))?;
        debug!(documents = self.written(), "Flushed index output");
        Ok(())
    }
}

/// Discards every envelope
#[derive(Debug, Default)]
pub struct NullIndexClient {
    written: AtomicU64,
}

impl NullIndexClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl IndexClient for NullIndexClient {
    async fn write(&self, _envelope: DispatchEnvelope) -> Result<()> {
        self.written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_map_extracts_id_and_keeps_order() {
        let mapper = DispatchMapper::new("addresses", "address");
        let raw = json!({"type": "address", "id": 12, "name": {"default": "x"}, "admin0": "UK"});
        let envelope = mapper.map(document(raw)).unwrap();

        assert_eq!(envelope.id, RecordId::Number(12));
        assert_eq!(envelope.index_name, "addresses");
        assert_eq!(envelope.document_type, "address");
        let keys: Vec<&str> = envelope.data.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["type", "name", "admin0"]);
    }

    #[test]
    fn test_map_requires_id() {
        let mapper = DispatchMapper::new("addresses", "address");
        assert!(mapper.map(document(json!({"name": "x"}))).is_err());
        assert!(mapper.map(document(json!({"id": null}))).is_err());
        assert!(mapper.map(document(json!({"id": -3}))).is_err());

        let text = mapper.map(document(json!({"id": "gb-1"}))).unwrap();
        assert_eq!(text.id, RecordId::Text("gb-1".into()));
    }

    #[test]
    fn test_envelope_wire_format() {
        let mapper = DispatchMapper::new("addresses", "address");
        let envelope = mapper.map(document(json!({"id": 3, "admin1": "Wales"}))).unwrap();
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({
                "_index": "addresses",
                "_type": "address",
                "_id": 3,
                "data": {"admin1": "Wales"}
            })
        );
    }

    #[tokio::test]
    async fn test_json_lines_client_flushes_on_finish() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let client = JsonLinesIndexClient::create(&path).await.unwrap();
        let mapper = DispatchMapper::new("addresses", "address");

        for id in 1..=2 {
            client.write(mapper.map(document(json!({"id": id}))).unwrap()).await.unwrap();
        }
        client.finish().await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: DispatchEnvelope = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.id, RecordId::Number(2));
        assert_eq!(client.written(), 2);
    }
}
