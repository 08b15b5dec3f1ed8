//! Built-in dataset adapters
//!
//! - **openaddresses**: OpenAddresses CSV exports
//! - **csvdump**: pipe-delimited address dumps

pub mod csvdump;
pub mod openaddresses;

pub use csvdump::CsvDump;
pub use openaddresses::OpenAddresses;
