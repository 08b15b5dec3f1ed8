//! Address Import Library
//!
//! Streaming import of geospatial address records from heterogeneous
//! dataset exports into a search index.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐
//! │openaddresses │   │   csvdump    │   one directory per dataset
//! │ dir (prio 0) │   │ dir (prio 3) │
//! └──────┬───────┘   └──────┬───────┘
//!        │ concat           │ concat        DirectoryConcatenator
//!        ▼                  ▼
//!    adapter            adapter             DatasetAdapter
//!        └────────┬─────────┘
//!                 ▼
//!          unified stream                   combiner (sequential, by priority)
//!                 ▼
//!    dedup ─► enrich ─► whitelist ─► dispatch ─► IndexClient
//! ```
//!
//! # Supported datasets
//!
//! - **openaddresses**: OpenAddresses CSV exports
//! - **csvdump**: pipe-delimited address dumps
//!
//! # Example
//!
//! ```no_run
//! use addr_ingest::config::IngestConfig;
//! use addr_ingest::dispatch::JsonLinesIndexClient;
//! use addr_ingest::pipeline::ImportPipeline;
//! use addr_ingest::registry::{DatasetRegistry, SourceSpec};
//! use std::sync::Arc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let datasets = DatasetRegistry::builtin()
//!         .resolve(&[SourceSpec::new("openaddresses", "./data/oa")])?;
//!
//!     let index = Arc::new(JsonLinesIndexClient::stdout());
//!     let summary = ImportPipeline::new(IngestConfig::default(), index)
//!         .import_datasets(datasets)
//!         .await?;
//!     println!("{} addresses dispatched", summary.dispatched);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod adapter;
pub mod adapters;
pub mod combiner;
pub mod concat;
pub mod config;
pub mod dedup;
pub mod dispatch;
pub mod enrich;
pub mod input;
pub mod pipeline;
pub mod progress;
pub mod record;
pub mod registry;
pub mod schema;
pub mod whitelist;

pub use pipeline::{ImportPipeline, ImportSummary};
pub use record::{AddressRecord, RecordId};
pub use registry::{DatasetRegistry, SourceSpec};
