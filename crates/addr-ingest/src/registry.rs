//! Dataset registry and ordering
//!
//! The registry is a static table mapping dataset name to adapter and
//! priority. Priorities are unique; lower priorities are processed and
//! emitted first, whatever order the operator listed the sources in.

use addr_common::{AddrError, Result};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::adapter::{DatasetAdapter, RecordStream};
use crate::adapters::{CsvDump, OpenAddresses};
use crate::concat::DirectoryConcatenator;

/// One supported dataset format
#[derive(Clone)]
pub struct DatasetDescriptor {
    name: String,
    priority: u32,
    adapter: Arc<dyn DatasetAdapter>,
}

impl DatasetDescriptor {
    pub fn new(name: impl Into<String>, priority: u32, adapter: Arc<dyn DatasetAdapter>) -> Self {
        Self {
            name: name.into(),
            priority,
            adapter,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn adapter(&self) -> &Arc<dyn DatasetAdapter> {
        &self.adapter
    }
}

impl fmt::Debug for DatasetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasetDescriptor")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Operator request: import dataset `name` from `directory`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub name: String,
    pub directory: PathBuf,
}

impl SourceSpec {
    pub fn new(name: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            directory: directory.into(),
        }
    }
}

/// A requested dataset bound to its source directory
#[derive(Debug, Clone)]
pub struct ResolvedDataset {
    pub descriptor: DatasetDescriptor,
    pub directory: PathBuf,
}

impl ResolvedDataset {
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn priority(&self) -> u32 {
        self.descriptor.priority()
    }

    /// Lazy record sequence over every matching file in the directory
    pub fn record_stream(&self) -> RecordStream {
        let concat = DirectoryConcatenator::new(
            self.descriptor.name(),
            self.directory.clone(),
            self.descriptor.adapter().clone(),
        );
        self.descriptor
            .adapter()
            .address_stream(self.descriptor.name(), concat.reader())
    }
}

/// Table of supported datasets keyed by priority
#[derive(Debug, Clone, Default)]
pub struct DatasetRegistry {
    by_priority: BTreeMap<u32, DatasetDescriptor>,
}

impl DatasetRegistry {
    /// Registry without any dataset
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in datasets: `openaddresses` (0) and `csvdump` (3)
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for descriptor in [
            DatasetDescriptor::new("openaddresses", 0, Arc::new(OpenAddresses::new())),
            DatasetDescriptor::new("csvdump", 3, Arc::new(CsvDump::new())),
        ] {
            // Static table: names and priorities are distinct
            registry.by_priority.insert(descriptor.priority, descriptor);
        }
        registry
    }

    /// Add a dataset; names and priorities must be unique.
    pub fn register(&mut self, descriptor: DatasetDescriptor) -> Result<()> {
        if self.get(descriptor.name()).is_some() {
            return Err(AddrError::Config(format!(
                "dataset '{}' is already registered",
                descriptor.name()
            )));
        }
        if let Some(existing) = self.by_priority.get(&descriptor.priority) {
            return Err(AddrError::Config(format!(
                "priority {} is already used by dataset '{}'",
                descriptor.priority,
                existing.name()
            )));
        }

        self.by_priority.insert(descriptor.priority, descriptor);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&DatasetDescriptor> {
        self.by_priority.values().find(|d| d.name() == name)
    }

    /// Dataset names in processing order
    pub fn names(&self) -> Vec<&str> {
        self.by_priority.values().map(DatasetDescriptor::name).collect()
    }

    /// Bind the requested datasets to their directories, in priority order.
    ///
    /// Unknown or repeated names and missing directories are configuration
    /// errors raised before anything is read.
    pub fn resolve(&self, sources: &[SourceSpec]) -> Result<Vec<ResolvedDataset>> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(sources.len());

        for source in sources {
            let descriptor = self.get(&source.name).ok_or_else(|| AddrError::UnknownDataset {
                name: source.name.clone(),
                supported: self.names().join(", "),
            })?;

            if !seen.insert(source.name.as_str()) {
                return Err(AddrError::DuplicateDataset(source.name.clone()));
            }

            if !source.directory.is_dir() {
                return Err(AddrError::MissingDirectory {
                    dataset: source.name.clone(),
                    path: source.directory.clone(),
                });
            }

            resolved.push(ResolvedDataset {
                descriptor: descriptor.clone(),
                directory: source.directory.clone(),
            });
        }

        resolved.sort_by_key(ResolvedDataset::priority);
        Ok(resolved)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_order() {
        assert_eq!(DatasetRegistry::builtin().names(), vec!["openaddresses", "csvdump"]);
    }

    #[test]
    fn test_resolve_orders_by_priority_not_argument_order() {
        let oa = tempfile::tempdir().unwrap();
        let dump = tempfile::tempdir().unwrap();
        let registry = DatasetRegistry::builtin();

        let resolved = registry
            .resolve(&[
                SourceSpec::new("csvdump", dump.path()),
                SourceSpec::new("openaddresses", oa.path()),
            ])
            .unwrap();

        let names: Vec<&str> = resolved.iter().map(ResolvedDataset::name).collect();
        assert_eq!(names, vec!["openaddresses", "csvdump"]);
        assert_eq!(resolved[0].directory, oa.path());
    }

    #[test]
    fn test_resolve_only_requested_subset() {
        let dump = tempfile::tempdir().unwrap();
        let resolved = DatasetRegistry::builtin()
            .resolve(&[SourceSpec::new("csvdump", dump.path())])
            .unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].priority(), 3);
    }

    #[test]
    fn test_unknown_dataset_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = DatasetRegistry::builtin()
            .resolve(&[SourceSpec::new("tiger", dir.path())])
            .unwrap_err();
        assert!(matches!(err, AddrError::UnknownDataset { ref name, .. } if name == "tiger"));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_duplicate_and_missing_directory_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let registry = DatasetRegistry::builtin();

        let dup = registry
            .resolve(&[
                SourceSpec::new("csvdump", dir.path()),
                SourceSpec::new("csvdump", dir.path()),
            ])
            .unwrap_err();
        assert!(matches!(dup, AddrError::DuplicateDataset(_)));

        let missing = registry
            .resolve(&[SourceSpec::new("csvdump", dir.path().join("absent"))])
            .unwrap_err();
        assert!(matches!(missing, AddrError::MissingDirectory { .. }));
    }

    #[test]
    fn test_register_rejects_clashes() {
        let mut registry = DatasetRegistry::builtin();
        let clash_priority = DatasetDescriptor::new("other", 0, Arc::new(CsvDump::new()));
        assert!(registry.register(clash_priority).is_err());

        let clash_name = DatasetDescriptor::new("csvdump", 9, Arc::new(CsvDump::new()));
        assert!(registry.register(clash_name).is_err());

        let fresh = DatasetDescriptor::new("extra", 1, Arc::new(CsvDump::new()));
        registry.register(fresh).unwrap();
        assert_eq!(registry.names(), vec!["openaddresses", "extra", "csvdump"]);
    }
}
