//! Import pipeline orchestration
//!
//! ```text
//! datasets ─► combiner ─┤hwm├─► dedup ─► bridge ─► enrich ─┤hwm├─► whitelist ─► dispatch ─► index
//!                                 │
//!                                 └─► progress counter ◄── progress reporter (timer)
//! ```
//!
//! Every `┤hwm├` is a bounded channel whose capacity is the configured
//! high-water mark. A stalled index client therefore stalls enrichment,
//! deduplication and finally the file reads; nothing buffers without bound.

use addr_common::{AddrError, Result};
use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::combiner::{unify, DatasetSource, DatasetSummary};
use crate::config::IngestConfig;
use crate::dedup::{CoordinateAddressKey, DedupKey, Deduplicator};
use crate::dispatch::{DispatchMapper, IndexClient};
use crate::enrich::{EnrichmentBridge, EnrichmentService, PassthroughEnricher};
use crate::progress::{ProgressCounter, ProgressReporter};
use crate::registry::ResolvedDataset;
use crate::schema::Schema;
use crate::whitelist::FieldWhitelist;

/// Outcome of one import run
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub datasets: Vec<DatasetSummary>,
    /// Records emitted by all datasets, before deduplication
    pub records_in: u64,
    pub unique: u64,
    pub duplicates: u64,
    pub dispatched: u64,
}

impl ImportSummary {
    pub fn failed_datasets(&self) -> impl Iterator<Item = &DatasetSummary> {
        self.datasets.iter().filter(|d| d.is_failed())
    }
}

/// Forwarding task behind one [`buffered_stage`]
#[derive(Debug)]
pub struct StageHandle {
    stage: &'static str,
    task: JoinHandle<()>,
}

impl StageHandle {
    pub fn stage(&self) -> &'static str {
        self.stage
    }

    /// Wait for the forwarding task. A task that panicked or was cancelled
    /// lost records, which is fatal for the run.
    pub async fn join(self) -> Result<()> {
        let StageHandle { stage, task } = self;
        task.await.map_err(|e| {
            let reason = if e.is_panic() {
                "panicked"
            } else {
                "was cancelled"
            };
            error!(stage, error = %e, "Pipeline stage {}", reason);
            AddrError::Pipeline(format!("{} stage {}", stage, reason))
        })
    }

    fn abort(&self) {
        self.task.abort();
    }
}

/// Forward `input` through a bounded channel of `capacity` items.
///
/// The forwarding task suspends while the channel is full and stops as
/// soon as the receiving side is dropped. The stream ends the same way
/// whether the task finished or crashed; join the handle to tell apart.
pub fn buffered_stage<T>(
    stage: &'static str,
    input: BoxStream<'static, T>,
    capacity: usize,
) -> (BoxStream<'static, T>, StageHandle)
where
    T: Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));

    let task = tokio::spawn(async move {
        let mut input = input;
        while let Some(item) = input.next().await {
            if tx.send(item).await.is_err() {
                debug!(stage, "Downstream closed, stopping stage");
                return;
            }
        }
        debug!(stage, "Stage input exhausted");
    });

    (ReceiverStream::new(rx).boxed(), StageHandle { stage, task })
}

/// Join `stages`, listed downstream first, stopping the rest at the first
/// failure.
async fn join_stages(stages: Vec<StageHandle>) -> Result<()> {
    let mut stages = stages.into_iter();
    while let Some(stage) = stages.next() {
        if let Err(e) = stage.join().await {
            stages.by_ref().for_each(|rest| rest.abort());
            return Err(e);
        }
    }
    Ok(())
}

pub struct ImportPipeline {
    config: IngestConfig,
    dedup_key: Arc<dyn DedupKey>,
    enricher: Arc<dyn EnrichmentService>,
    whitelist: FieldWhitelist,
    index: Arc<dyn IndexClient>,
    counter: ProgressCounter,
}

impl ImportPipeline {
    /// Pipeline with the default dedup key, a passthrough enricher and the
    /// built-in address schema.
    pub fn new(config: IngestConfig, index: Arc<dyn IndexClient>) -> Self {
        let dedup_key = Arc::new(CoordinateAddressKey::new(config.dedup_precision));
        Self {
            config,
            dedup_key,
            enricher: Arc::new(PassthroughEnricher),
            whitelist: FieldWhitelist::from_schema(&Schema::address_default()),
            index,
            counter: ProgressCounter::new(),
        }
    }

    pub fn with_dedup_key(mut self, key: Arc<dyn DedupKey>) -> Self {
        self.dedup_key = key;
        self
    }

    pub fn with_enricher(mut self, enricher: Arc<dyn EnrichmentService>) -> Self {
        self.enricher = enricher;
        self
    }

    pub fn with_schema(mut self, schema: &Schema) -> Self {
        self.whitelist = FieldWhitelist::from_schema(schema);
        self
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Counter read by the progress reporter
    pub fn progress_counter(&self) -> ProgressCounter {
        self.counter.clone()
    }

    /// Import resolved datasets, in priority order.
    pub async fn import_datasets(&self, datasets: Vec<ResolvedDataset>) -> Result<ImportSummary> {
        self.run(datasets.into_iter().map(DatasetSource::from).collect())
            .await
    }

    /// Drive every source through the full chain until the index client
    /// has accepted the last envelope.
    ///
    /// Dataset failures are reported in the summary; enrichment, dispatch
    /// and index failures abort the run, as does a crashed pipeline stage.
    pub async fn run(&self, sources: Vec<DatasetSource>) -> Result<ImportSummary> {
        self.config.validate()?;
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let capacity = self.config.high_water_mark;
        info!(
            %run_id,
            sources = sources.len(),
            high_water_mark = capacity,
            "Starting address import"
        );

        let (unified, completion) = unify(sources);
        let (unified, combiner_stage) = buffered_stage("combiner", unified, capacity);

        let dedup = Deduplicator::new(self.dedup_key.clone());
        let dedup_stats = dedup.stats();
        let counter = self.counter.clone();
        let unique = dedup.apply(unified).inspect(move |_| counter.increment());

        let mut bridge =
            EnrichmentBridge::new(&self.config.country_code, &self.config.document_type);
        let enricher = self.enricher.clone();
        let enriched = unique
            .map(move |record| {
                let request = bridge.to_request(&record);
                let enricher = enricher.clone();
                async move { enricher.enrich(request).await }
            })
            .buffered(capacity)
            .boxed();
        let (enriched, enrichment_stage) = buffered_stage("enrichment", enriched, capacity);

        let whitelist = self.whitelist.clone();
        let mapper = DispatchMapper::new(&self.config.index_name, &self.config.document_type);
        let mut envelopes = enriched.map(move |document| {
            let document = document?;
            mapper.map(whitelist.apply(document))
        });

        let reporter =
            ProgressReporter::start(self.counter.clone(), self.config.progress_interval());
        let mut dispatched = 0u64;
        let mut failure = None;

        while let Some(envelope) = envelopes.next().await {
            let written = match envelope {
                Ok(envelope) => self.index.write(envelope).await,
                Err(e) => Err(e),
            };
            if let Err(e) = written {
                failure = Some(e);
                break;
            }
            dispatched += 1;
        }
        // Closes every stage channel; upstream tasks stop on their next send
        drop(envelopes);

        let stages = vec![enrichment_stage, combiner_stage];
        let outcome = match failure {
            Some(e) => {
                stages.iter().for_each(StageHandle::abort);
                Err(e)
            },
            None => join_stages(stages).await,
        };

        let progress = reporter.stop().await;
        if let Err(e) = outcome {
            error!(%run_id, dispatched, error = %e, "Address import aborted");
            return Err(e);
        }

        let datasets = completion.wait().await.ok_or_else(|| {
            AddrError::Pipeline("combiner stopped before reporting dataset summaries".to_string())
        })?;

        self.index.finish().await?;

        let summary = ImportSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            records_in: datasets.iter().map(|d| d.records).sum(),
            datasets,
            unique: dedup_stats.unique(),
            duplicates: dedup_stats.duplicates(),
            dispatched,
        };

        for failed in summary.failed_datasets() {
            warn!(dataset = %failed.name, status = %failed.status, "Dataset did not complete");
        }
        info!(
            %run_id,
            records_in = summary.records_in,
            unique = summary.unique,
            duplicates = summary.duplicates,
            dispatched = summary.dispatched,
            progress_reports = progress.reports,
            elapsed_ms = (summary.finished_at - summary.started_at).num_milliseconds(),
            "Address import complete"
        );
        Ok(summary)
    }
}

impl fmt::Debug for ImportPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportPipeline")
            .field("config", &self.config)
            .field("whitelist", &self.whitelist)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::dispatch::NullIndexClient;
    use crate::record::AddressRecord;
    use futures::stream;

    fn records(streets: &[&str]) -> Vec<Result<AddressRecord>> {
        streets
            .iter()
            .enumerate()
            .map(|(i, street)| Ok(AddressRecord::new("1", *street, 50.0 + i as f64, 0.0).unwrap()))
            .collect()
    }

    #[tokio::test]
    async fn test_buffered_stage_preserves_order() {
        let input = stream::iter(0..100).boxed();
        let (output, handle) = buffered_stage("test", input, 4);
        let out: Vec<i32> = output.collect().await;
        assert_eq!(out, (0..100).collect::<Vec<_>>());
        handle.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_panicked_stage_fails_join() {
        let input = stream::iter(0..10)
            .map(|n| {
                if n == 3 {
                    panic!("stage input broke");
                }
                n
            })
            .boxed();
        let (output, handle) = buffered_stage("broken", input, 4);

        let out: Vec<i32> = output.collect().await;
        assert_eq!(out, vec![0, 1, 2]);
        let err = handle.join().await.unwrap_err();
        assert!(matches!(err, AddrError::Pipeline(_)));
        assert!(err.to_string().contains("broken stage panicked"));
    }

    #[tokio::test]
    async fn test_run_rejects_invalid_config() {
        let config = IngestConfig {
            high_water_mark: 0,
            ..IngestConfig::default()
        };
        let index = Arc::new(NullIndexClient::new());
        let source =
            DatasetSource::from_stream("memory", 0, stream::iter(records(&["A Street"])).boxed());

        let err = ImportPipeline::new(config, index.clone())
            .run(vec![source])
            .await
            .unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(index.written(), 0);
    }

    #[tokio::test]
    async fn test_run_counts() {
        let index = Arc::new(NullIndexClient::new());
        let pipeline = ImportPipeline::new(IngestConfig::default(), index.clone());
        let source = DatasetSource::from_stream(
            "memory",
            0,
            stream::iter(records(&["A Street", "B Street"])).boxed(),
        );
        let repeat = DatasetSource::from_stream(
            "repeat",
            1,
            stream::iter(records(&["A Street"])).boxed(),
        );

        let summary = pipeline.run(vec![repeat, source]).await.unwrap();
        assert_eq!(summary.records_in, 3);
        assert_eq!(summary.unique, 2);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.dispatched, 2);
        assert_eq!(index.written(), 2);
        assert_eq!(pipeline.progress_counter().get(), 2);
        assert_eq!(summary.datasets[0].name, "memory");
    }
}
