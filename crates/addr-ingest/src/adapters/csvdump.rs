//! Pipe-delimited address dumps
//!
//! Headerless, unquoted rows:
//! `name|number|street|locality|region|postal_code|country|lat|lon`

use async_trait::async_trait;
use csv_async::StringRecord;
use futures::stream::StreamExt;
use std::path::Path;

use crate::adapter::{
    column, delimited_rows, parse_coordinate, DatasetAdapter, DelimitedFormat, FileReader,
    RecordStream,
};
use crate::record::{non_empty, AddressRecord};

const NAME: usize = 0;
const NUMBER: usize = 1;
const STREET: usize = 2;
const LOCALITY: usize = 3;
const REGION: usize = 4;
const POSTAL_CODE: usize = 5;
const COUNTRY: usize = 6;
const LAT: usize = 7;
const LON: usize = 8;

#[derive(Debug, Default, Clone, Copy)]
pub struct CsvDump;

impl CsvDump {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(row: &StringRecord) -> Option<AddressRecord> {
        let latitude = parse_coordinate(column(row, LAT))?;
        let longitude = parse_coordinate(column(row, LON))?;
        let number = column(row, NUMBER);
        let street = column(row, STREET);
        if number.is_empty() || street.is_empty() {
            return None;
        }

        AddressRecord::new(number, street, latitude, longitude).map(|record| {
            record
                .with_name(non_empty(column(row, NAME)))
                .with_locality(non_empty(column(row, LOCALITY)))
                .with_region(non_empty(column(row, REGION)))
                .with_postal_code(non_empty(column(row, POSTAL_CODE)))
                .with_country(non_empty(column(row, COUNTRY)))
        })
    }
}

#[async_trait]
impl DatasetAdapter for CsvDump {
    fn file_name_filter(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
    }

    fn address_stream(&self, dataset: &str, input: FileReader) -> RecordStream {
        let format = DelimitedFormat {
            delimiter: b'|',
            quoting: false,
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
