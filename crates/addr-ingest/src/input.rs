//! JSON-lines record input
//!
//! Feeds already-normalized records into the pipeline without a dataset
//! adapter: one camelCase `AddressRecord` object per line.

use addr_common::{AddrError, Result};
use futures::stream::StreamExt;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tracing::warn;

use crate::adapter::RecordStream;
use crate::combiner::DatasetSource;
use crate::record::AddressRecord;

/// Name reported for JSON-lines input in dataset summaries
pub const RECORDS_SOURCE: &str = "records";

/// Runs after every registered dataset
pub const RECORDS_PRIORITY: u32 = u32::MAX;

/// Decode records line by line. Undecodable lines are dropped with a
/// warning; a read error ends the stream.
pub fn json_lines<R>(source: &str, reader: R) -> RecordStream
where
    R: AsyncBufRead + Send + Unpin + 'static,
{
    let source = source.to_string();
    let mut line_number = 0u64;
    let mut failed = false;

    LinesStream::new(reader.lines())
        .filter_map(move |line| {
            line_number += 1;
            let item = match line {
                Ok(line) if line.trim().is_empty() => None,
                Ok(line) => match serde_json::from_str::<AddressRecord>(&line) {
                    Ok(record) => Some(Ok(record)),
                    Err(e) => {
                        warn!(
                            source = %source,
                            line = line_number,
                            error = %e,
                            "Dropping invalid record"
                        );
                        None
                    },
                },
                Err(e) => Some(Err(AddrError::DatasetRead {
                    dataset: source.clone(),
                    reason: e.to_string(),
                })),
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

/// Open `path` (or stdin for `-`) as a combiner source.
pub async fn records_source(path: &Path) -> Result<DatasetSource> {
    let records = if path == Path::new("-") {
        json_lines(RECORDS_SOURCE, BufReader::new(tokio::io::stdin()))
    } else {
        let file = tokio::fs::File::open(path).await.map_err(|e| {
            AddrError::Config(format!("cannot open records file {}: {}", path.display(), e))
        })?;
        json_lines(RECORDS_SOURCE, BufReader::new(file))
    };

    Ok(DatasetSource::from_stream(RECORDS_SOURCE, RECORDS_PRIORITY, records))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn test_invalid_lines_are_dropped() {
        let raw = concat!(
            r#"{"houseNumber":"1","street":"Quay Street","latitude":53.48,"longitude":-2.25}"#,
            "\n\nnot json\n",
            r#"{"houseNumber":"2","street":"Quay Street","latitude":"north","longitude":-2.25}"#,
            "\n",
            r#"{"houseNumber":"3","street":"Quay Street","latitude":53.48,"longitude":-2.25}"#,
            "\n",
        );
        let reader = std::io::Cursor::new(raw.as_bytes().to_vec());
        let records: Vec<AddressRecord> = json_lines("test", reader).try_collect().await.unwrap();

        let numbers: Vec<&str> = records.iter().map(AddressRecord::house_number).collect();
        assert_eq!(numbers, vec!["1", "3"]);
    }

    #[tokio::test]
    async fn test_missing_file_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = records_source(&dir.path().join("none.jsonl")).await.unwrap_err();
        assert!(err.is_configuration());
    }
}
