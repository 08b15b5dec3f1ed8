//! Unified stream combiner
//!
//! Sequential, priority-ordered concatenation of per-dataset record
//! streams. The dataset at priority *k* is fully drained before the one at
//! *k+1* is opened, so global order never depends on I/O timing.
//!
//! Completion is explicit: every dataset produces exactly one
//! [`DatasetSummary`], and the full list is delivered exactly once through
//! the [`CompletionSignal`] when the unified stream ends.

use futures::stream::{self, BoxStream, StreamExt};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;
use tokio::sync::oneshot;
use tracing::{error, info};

use crate::adapter::RecordStream;
use crate::record::AddressRecord;
use crate::registry::ResolvedDataset;

/// Unified, infallible record stream; dataset failures are absorbed into
/// the per-dataset summaries.
pub type UnifiedStream = BoxStream<'static, AddressRecord>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum DatasetStatus {
    Completed,
    Failed(String),
}

impl fmt::Display for DatasetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetStatus::Completed => f.write_str("completed"),
            DatasetStatus::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Outcome of one dataset within a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetSummary {
    pub name: String,
    pub priority: u32,
    pub directory: Option<PathBuf>,
    /// Records the dataset emitted before it ended, before deduplication
    pub records: u64,
    pub status: DatasetStatus,
}

impl DatasetSummary {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, DatasetStatus::Failed(_))
    }
}

/// Resolves once with every dataset summary when the unified stream ends
#[derive(Debug)]
pub struct CompletionSignal(oneshot::Receiver<Vec<DatasetSummary>>);

impl CompletionSignal {
    /// `None` if the unified stream was dropped before it completed.
    pub async fn wait(self) -> Option<Vec<DatasetSummary>> {
        self.0.await.ok()
    }
}

type OpenStream = Box<dyn FnOnce() -> RecordStream + Send>;

/// One input of the combiner; the underlying stream is opened only when
/// its turn comes.
pub struct DatasetSource {
    name: String,
    priority: u32,
    directory: Option<PathBuf>,
    open: OpenStream,
}

impl DatasetSource {
    /// Wrap an already-built record stream, e.g. JSON-lines input
    pub fn from_stream(name: impl Into<String>, priority: u32, records: RecordStream) -> Self {
        Self {
            name: name.into(),
            priority,
            directory: None,
            open: Box::new(move || records),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }
}

impl From<ResolvedDataset> for DatasetSource {
    fn from(dataset: ResolvedDataset) -> Self {
        Self {
            name: dataset.name().to_string(),
            priority: dataset.priority(),
            directory: Some(dataset.directory.clone()),
            open: Box::new(move || dataset.record_stream()),
        }
    }
}

impl fmt::Debug for DatasetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasetSource")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("directory", &self.directory)
            .finish_non_exhaustive()
    }
}

/// Concatenate `sources` in ascending priority order.
///
/// Sources sharing a priority keep their relative input order.
pub fn unify(mut sources: Vec<DatasetSource>) -> (UnifiedStream, CompletionSignal) {
    sources.sort_by_key(|source| source.priority);
    let (done_tx, done_rx) = oneshot::channel();

    let state = CombinerState {
        pending: sources.into(),
        active: None,
        summaries: Vec::new(),
        done: Some(done_tx),
    };

    let stream = stream::unfold(state, |mut state| async move {
        let record = state.advance().await?;
        Some((record, state))
    })
    .boxed();

    (stream, CompletionSignal(done_rx))
}

struct ActiveDataset {
    name: String,
    priority: u32,
    directory: Option<PathBuf>,
    records: u64,
    stream: RecordStream,
}

struct CombinerState {
    pending: VecDeque<DatasetSource>,
    active: Option<ActiveDataset>,
    summaries: Vec<DatasetSummary>,
    done: Option<oneshot::Sender<Vec<DatasetSummary>>>,
}

impl CombinerState {
    async fn advance(&mut self) -> Option<AddressRecord> {
        loop {
            if let Some(active) = self.active.as_mut() {
                match active.stream.next().await {
                    Some(Ok(record)) => {
                        active.records += 1;
                        return Some(record);
                    },
                    Some(Err(e)) => {
                        error!(dataset = %active.name, error = %e, "Dataset import failed");
                        self.close_active(DatasetStatus::Failed(e.to_string()));
                    },
                    None => self.close_active(DatasetStatus::Completed),
                }
                continue;
            }

            let Some(source) = self.pending.pop_front() else {
                self.complete();
                return None;
            };

            info!(
                dataset = %source.name,
                priority = source.priority,
                "Started importing dataset"
            );
            let stream = (source.open)();
            self.active = Some(ActiveDataset {
                name: source.name,
                priority: source.priority,
                directory: source.directory,
                records: 0,
                stream,
            });
        }
    }

    fn close_active(&mut self, status: DatasetStatus) {
        let Some(active) = self.active.take() else {
            return;
        };

        info!(
            dataset = %active.name,
            records = active.records,
            status = %status,
            "Finished importing dataset"
        );
        self.summaries.push(DatasetSummary {
            name: active.name,
            priority: active.priority,
            directory: active.directory,
            records: active.records,
            status,
        });
    }

    fn complete(&mut self) {
        if let Some(done) = self.done.take() {
            info!(datasets = self.summaries.len(), "Unified address stream complete");
            // Receiver may already be gone; the summaries are then unused
            let _ = done.send(std::mem::take(&mut self.summaries));
        }
    }
}
