//! Dataset adapter contract
//!
//! Implement [`DatasetAdapter`] for every supported raw address format. An
//! adapter never sees the directory layout: the
//! [`DirectoryConcatenator`](crate::concat::DirectoryConcatenator) opens the
//! matching files through [`DatasetAdapter::open_file`] and hands the adapter
//! a single concatenated byte stream.

use addr_common::{AddrError, Result};
use async_trait::async_trait;
use csv_async::{AsyncReaderBuilder, ErrorKind, StringRecord};
use futures::stream::{BoxStream, StreamExt};
use std::path::Path;
use tokio::io::AsyncRead;
use tracing::debug;

use crate::record::AddressRecord;

/// Readable handle over one raw file (or the concatenation of many)
pub type FileReader = Box<dyn AsyncRead + Send + Unpin>;

/// Lazy, pull-based sequence of records produced by one dataset
pub type RecordStream = BoxStream<'static, Result<AddressRecord>>;

/// Per-format translator from raw files to [`AddressRecord`]s
#[async_trait]
pub trait DatasetAdapter: Send + Sync {
    /// Whether a file inside the dataset directory belongs to this format
    fn file_name_filter(&self, path: &Path) -> bool;

    /// Open one matching file. Override to strip per-file headers.
    async fn open_file(&self, path: &Path) -> std::io::Result<FileReader> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Box::new(file))
    }

    /// Turn the concatenated raw input into records.
    ///
    /// Rows failing the format's validity checks are dropped silently.
    /// Read failures surface as `Err` items and end the sequence. The
    /// returned stream must be driven lazily so file reads only advance
    /// as fast as records are consumed.
    fn address_stream(&self, dataset: &str, input: FileReader) -> RecordStream;
}

/// Options for [`delimited_rows`]
#[derive(Debug, Clone, Copy)]
pub struct DelimitedFormat {
    pub delimiter: u8,
    pub quoting: bool,
}

/// Stream the rows of a headerless delimited input.
///
/// Rows with encoding problems are skipped with a debug event; I/O errors
/// are reported as [`AddrError::DatasetRead`] and end the stream.
pub fn delimited_rows(
    dataset: &str,
    input: FileReader,
    format: DelimitedFormat,
) -> BoxStream<'static, Result<StringRecord>> {
    let dataset = dataset.to_string();
    let reader = AsyncReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(format.delimiter)
        .quoting(format.quoting)
        .create_reader(input);

    let mut failed = false;
    reader
        .into_records()
        .filter_map(move |row| {
            let item = match row {
                Ok(record) => Some(Ok(record)),
                Err(e) => match e.kind() {
                    ErrorKind::Io(io) => Some(Err(AddrError::DatasetRead {
                        dataset: dataset.clone(),
                        reason: io.to_string(),
                    })),
                    _ => {
                        debug!(dataset = %dataset, error = %e, "Skipping malformed row");
                        None
                    },
                },
            };
            futures::future::ready(item)
        })
        .take_while(move |item| {
            let keep = !failed;
            failed |= item.is_err();
            futures::future::ready(keep)
        })
        .boxed()
}

/// Field at `index`, trimmed; missing trailing columns read as empty.
pub fn column(row: &StringRecord, index: usize) -> &str {
    row.get(index).map(str::trim).unwrap_or("")
}

/// Parse a coordinate column, accepting only finite values.
pub fn parse_coordinate(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}
