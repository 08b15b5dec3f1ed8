//! OpenAddresses CSV exports
//!
//! Comma-separated files with a header line:
//! `LON,LAT,NUMBER,STREET,UNIT,CITY,DISTRICT,REGION,POSTCODE,...`.
//! Only the first four columns are required.

use async_trait::async_trait;
use csv_async::StringRecord;
use futures::stream::StreamExt;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::adapter::{
    column, delimited_rows, parse_coordinate, DatasetAdapter, DelimitedFormat, FileReader,
    RecordStream,
};
use crate::record::{non_empty, AddressRecord};

const LON: usize = 0;
const LAT: usize = 1;
const NUMBER: usize = 2;
const STREET: usize = 3;
const CITY: usize = 5;
const REGION: usize = 7;
const POSTCODE: usize = 8;

#[derive(Debug, Default, Clone, Copy)]
pub struct OpenAddresses;

impl OpenAddresses {
    pub fn new() -> Self {
        Self
    }

    /// Normalize one row; `None` when it fails the validity checks.
    pub fn normalize(row: &StringRecord) -> Option<AddressRecord> {
        let longitude = parse_coordinate(column(row, LON))?;
        let latitude = parse_coordinate(column(row, LAT))?;
        let number = column(row, NUMBER);
        let street = column(row, STREET);
        if number.is_empty() || street.is_empty() {
            return None;
        }

        AddressRecord::new(number, street, latitude, longitude).map(|record| {
            record
                .with_locality(non_empty(column(row, CITY)))
                .with_region(non_empty(column(row, REGION)))
                .with_postal_code(non_empty(column(row, POSTCODE)))
        })
    }
}

#[async_trait]
impl DatasetAdapter for OpenAddresses {
    fn file_name_filter(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
    }

    async fn open_file(&self, path: &Path) -> std::io::Result<FileReader> {
        let file = tokio::fs::File::open(path).await?;
        let mut reader = BufReader::new(file);
        let mut header = Vec::new();
        reader.read_until(b'\n', &mut header).await?;
        Ok(Box::new(reader))
    }

    fn address_stream(&self, dataset: &str, input: FileReader) -> RecordStream {
        let format = DelimitedFormat {
            delimiter: b',',
            quoting: true,
        };
        delimited_rows(dataset, input, format)
            .filter_map(|row| {
                futures::future::ready(match row {
                    Ok(row) => Self::normalize(&row).map(Ok),
                    Err(e) => Some(Err(e)),
                })
            })
            .boxed()
    }
}
