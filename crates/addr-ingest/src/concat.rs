//! Directory concatenation
//!
//! Joins every matching file of one dataset directory into a single lazy
//! byte stream. Files are opened one at a time, only when the previous one
//! has been fully consumed, so at most one file handle and one read buffer
//! are live per dataset.

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::{debug, error, info};

use crate::adapter::{DatasetAdapter, FileReader};

/// Byte stream over the concatenated files of one dataset
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// Concatenates the files of a dataset directory that an adapter accepts
#[derive(Clone)]
pub struct DirectoryConcatenator {
    dataset: String,
    directory: PathBuf,
    adapter: Arc<dyn DatasetAdapter>,
}

impl DirectoryConcatenator {
    pub fn new(
        dataset: impl Into<String>,
        directory: impl Into<PathBuf>,
        adapter: Arc<dyn DatasetAdapter>,
    ) -> Self {
        Self {
            dataset: dataset.into(),
            directory: directory.into(),
            adapter,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// List matching regular files, non-recursively, in file-name order.
    pub async fn matching_files(&self) -> io::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.directory).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            // symlink_metadata: links are not followed, matching a plain listing
            let metadata = tokio::fs::symlink_metadata(&path).await?;
            if metadata.is_file() && self.adapter.file_name_filter(&path) {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }

    /// Lazily concatenated bytes of every matching file.
    ///
    /// The directory is listed on first poll. A listing, open or read
    /// failure is yielded once as an `Err` naming the file and ends the
    /// stream.
    pub fn byte_stream(&self) -> ByteStream {
        let state = ConcatState {
            source: self.clone(),
            pending: None,
            current: None,
            finished: false,
        };

        stream::unfold(state, |mut state| async move {
            let item = state.advance().await?;
            Some((item, state))
        })
        .boxed()
    }

    /// [`byte_stream`](Self::byte_stream) as an `AsyncRead` for adapters
    pub fn reader(&self) -> FileReader {
        Box::new(StreamReader::new(self.byte_stream()))
    }
}

struct OpenFile {
    path: PathBuf,
    bytes: ReaderStream<Box<dyn AsyncRead + Send + Unpin>>,
    last_byte: Option<u8>,
    total: u64,
}

struct ConcatState {
    source: DirectoryConcatenator,
    pending: Option<VecDeque<PathBuf>>,
    current: Option<OpenFile>,
    finished: bool,
}

impl ConcatState {
    /// Next chunk, or `None` once every file is consumed or a failure ended
    /// the stream.
    async fn advance(&mut self) -> Option<io::Result<Bytes>> {
        if self.finished {
            return None;
        }

        loop {
            if let Some(file) = self.current.as_mut() {
                match file.bytes.next().await {
                    Some(Ok(chunk)) => {
                        if let Some(&last) = chunk.last() {
                            file.last_byte = Some(last);
                        }
                        file.total += chunk.len() as u64;
                        return Some(Ok(chunk));
                    },
                    Some(Err(e)) => {
                        let path = file.path.clone();
                        return Some(Err(self.fail(&path, "Failed to read file", e)));
                    },
                    None => {
                        info!(
                            dataset = %self.source.dataset,
                            file = %file.path.display(),
                            bytes = file.total,
                            "Finished loading file"
                        );
                        let unterminated = file.last_byte.is_some_and(|b| b != b'\n');
                        self.current = None;
                        if unterminated {
                            return Some(Ok(Bytes::from_static(b"\n")));
                        }
                        continue;
                    },
                }
            }

            if self.pending.is_none() {
                match self.source.matching_files().await {
                    Ok(files) => {
                        info!(
                            dataset = %self.source.dataset,
                            directory = %self.source.directory.display(),
                            files = files.len(),
                            "Adding directory"
                        );
                        self.pending = Some(files.into());
                    },
                    Err(e) => {
                        let directory = self.source.directory.clone();
                        return Some(Err(self.fail(&directory, "Failed to list directory", e)));
                    },
                }
            }

            let next = self.pending.as_mut().and_then(VecDeque::pop_front);
            let Some(path) = next else {
                debug!(dataset = %self.source.dataset, "All files consumed");
                self.finished = true;
                return None;
            };

            info!(dataset = %self.source.dataset, file = %path.display(), "Started loading file");
            match self.source.adapter.open_file(&path).await {
                Ok(reader) => {
                    self.current = Some(OpenFile {
                        path,
                        bytes: ReaderStream::new(reader),
                        last_byte: None,
                        total: 0,
                    });
                },
                Err(e) => return Some(Err(self.fail(&path, "Failed to open file", e))),
            }
        }
    }

    fn fail(&mut self, path: &Path, message: &'static str, e: io::Error) -> io::Error {
        error!(
            dataset = %self.source.dataset,
            file = %path.display(),
            error = %e,
            "{}", message
        );
        self.finished = true;
        self.current = None;
        io::Error::new(e.kind(), format!("{}: {}", path.display(), e))
    }
}
