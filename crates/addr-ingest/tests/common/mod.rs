//! Shared fixtures for address import integration tests
//!
//! - On-disk dataset writers (OpenAddresses CSV, pipe-delimited dumps)
//! - Index clients that collect, stall or fail
//! - An OpenAddresses adapter that records file opens
//! - `init_tracing()` for log output captured by the test harness

#![allow(dead_code)]

use addr_common::{AddrError, Result};
use addr_ingest::adapter::{DatasetAdapter, FileReader, RecordStream};
use addr_ingest::adapters::OpenAddresses;
use addr_ingest::dispatch::{DispatchEnvelope, IndexClient};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

pub const OA_HEADER: &str = "LON,LAT,NUMBER,STREET,UNIT,CITY,DISTRICT,REGION,POSTCODE";

/// Route `tracing` output through the test writer; safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("addr_ingest=debug")
        .with_test_writer()
        .try_init();
}

/// Create `dir/name` holding an OpenAddresses export with the given rows
pub fn write_openaddresses(dir: &Path, name: &str, rows: &[&str]) -> PathBuf {
    let mut contents = String::from(OA_HEADER);
    contents.push('\n');
    for row in rows {
        contents.push_str(row);
        contents.push('\n');
    }
    write_file(dir, name, &contents)
}

/// Create `dir/name` holding pipe-delimited dump rows, newline-terminated
pub fn write_csvdump(dir: &Path, name: &str, rows: &[&str]) -> PathBuf {
    let contents: String = rows.iter().map(|row| format!("{}\n", row)).collect();
    write_file(dir, name, &contents)
}

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap_or_else(|e| panic!("write {}: {}", path.display(), e));
    path
}

/// Keeps every envelope in arrival order
#[derive(Default)]
pub struct CollectingIndexClient {
    envelopes: Mutex<Vec<DispatchEnvelope>>,
    finished: AtomicBool,
}

impl CollectingIndexClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn envelopes(&self) -> Vec<DispatchEnvelope> {
        self.envelopes.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// `name.default` of each collected document
    pub fn names(&self) -> Vec<String> {
        self.envelopes()
            .iter()
            .map(|e| e.data["name"]["default"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IndexClient for CollectingIndexClient {
    async fn write(&self, envelope: DispatchEnvelope) -> Result<()> {
        if let Ok(mut envelopes) = self.envelopes.lock() {
            envelopes.push(envelope);
        }
        Ok(())
    }

    async fn finish(&self) -> Result<()> {
        self.finished.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Never completes a write: the downstream consumer that never drains
#[derive(Default)]
pub struct StalledIndexClient {
    pub attempts: AtomicU64,
}

#[async_trait]
impl IndexClient for StalledIndexClient {
    async fn write(&self, _envelope: DispatchEnvelope) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Accepts `limit` writes, then fails every later one
pub struct FailingIndexClient {
    limit: u64,
    accepted: AtomicU64,
    pub finished: AtomicBool,
}

impl FailingIndexClient {
    pub fn after(limit: u64) -> Self {
        Self {
            limit,
            accepted: AtomicU64::new(0),
            finished: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl IndexClient for FailingIndexClient {
    async fn write(&self, _envelope: DispatchEnvelope) -> Result<()> {
        if self.accepted.fetch_add(1, Ordering::SeqCst) >= self.limit {
            return Err(AddrError::Index("cluster unavailable".to_string()));
        }
        Ok(())
    }

    async fn finish(&self) -> Result<()> {
        self.finished.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// OpenAddresses files, noting every file opened; `refusing` names one
/// file that fails to open
#[derive(Default)]
pub struct RecordingAdapter {
    inner: OpenAddresses,
    refuse: Option<&'static str>,
    opened: Mutex<Vec<String>>,
}

impl RecordingAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refusing(name: &'static str) -> Self {
        Self {
            refuse: Some(name),
            ..Self::default()
        }
    }

    /// File names passed to `open_file`, in order
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().map(|o| o.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl DatasetAdapter for RecordingAdapter {
    fn file_name_filter(&self, path: &Path) -> bool {
        self.inner.file_name_filter(path)
    }

    async fn open_file(&self, path: &Path) -> std::io::Result<FileReader> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if let Ok(mut opened) = self.opened.lock() {
            opened.push(name.clone());
        }
        if self.refuse == Some(name.as_str()) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "permission denied",
            ));
        }
        self.inner.open_file(path).await
    }

    fn address_stream(&self, dataset: &str, input: FileReader) -> RecordStream {
        self.inner.address_stream(dataset, input)
    }
}
