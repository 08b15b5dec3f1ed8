//! Duplicate suppression
//!
//! The first record for each dedup key is forwarded; later ones are dropped
//! and counted. The seen-key set lives for one run and grows with the
//! number of unique keys only.

use futures::stream::StreamExt;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

use crate::combiner::UnifiedStream;
use crate::record::AddressRecord;

/// Equality function for duplicate detection
pub trait DedupKey: Send + Sync {
    fn key(&self, record: &AddressRecord) -> String;
}

impl<F> DedupKey for F
where
    F: Fn(&AddressRecord) -> String + Send + Sync,
{
    fn key(&self, record: &AddressRecord) -> String {
        self(record)
    }
}

/// Default key: rounded coordinate plus normalized house number and street
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinateAddressKey {
    precision: u32,
}

impl CoordinateAddressKey {
    pub const DEFAULT_PRECISION: u32 = 6;

    /// `precision` is the number of decimal places kept from each coordinate
    pub fn new(precision: u32) -> Self {
        Self { precision }
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    fn round(&self, value: f64) -> f64 {
        let factor = 10f64.powi(self.precision as i32);
        // + 0.0 folds -0.0 into 0.0
        (value * factor).round() / factor + 0.0
    }
}

impl Default for CoordinateAddressKey {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PRECISION)
    }
}

impl DedupKey for CoordinateAddressKey {
    fn key(&self, record: &AddressRecord) -> String {
        let places = self.precision as usize;
        format!(
            "{:.*}|{:.*}|{}|{}",
            places,
            self.round(record.latitude()),
            places,
            self.round(record.longitude()),
            normalize_text(record.house_number()),
            normalize_text(record.street()),
        )
    }
}

/// Lowercase and collapse runs of whitespace
fn normalize_text(value: &str) -> String {
    value
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Shared counters, readable while the stage runs
#[derive(Debug, Clone, Default)]
pub struct DedupStats {
    unique: Arc<AtomicU64>,
    duplicates: Arc<AtomicU64>,
}

impl DedupStats {
    pub fn unique(&self) -> u64 {
        self.unique.load(Ordering::Relaxed)
    }

    pub fn duplicates(&self) -> u64 {
        self.duplicates.load(Ordering::Relaxed)
    }
}

pub struct Deduplicator {
    key: Arc<dyn DedupKey>,
    seen: HashSet<String>,
    stats: DedupStats,
}

impl Deduplicator {
    pub fn new(key: Arc<dyn DedupKey>) -> Self {
        Self {
            key,
            seen: HashSet::new(),
            stats: DedupStats::default(),
        }
    }

    pub fn stats(&self) -> DedupStats {
        self.stats.clone()
    }

    /// Number of distinct keys seen so far
    pub fn seen_keys(&self) -> usize {
        self.seen.len()
    }

    /// Test-and-insert: `true` for the first record with this key.
    pub fn admit(&mut self, record: &AddressRecord) -> bool {
        let key = self.key.key(record);
        if self.seen.contains(&key) {
            self.stats.duplicates.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        trace!(key = %key, record = %record, "Forwarding address");
        self.seen.insert(key);
        self.stats.unique.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Filter a unified stream; the stage owns the seen-key set.
    pub fn apply(mut self, input: UnifiedStream) -> UnifiedStream {
        input
            .filter_map(move |record| {
                let keep = self.admit(&record);
                futures::future::ready(keep.then_some(record))
            })
            .boxed()
    }
}

impl std::fmt::Debug for Deduplicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deduplicator")
            .field("seen", &self.seen.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use futures::stream;

    fn record(number: &str, street: &str, lat: f64, lon: f64) -> AddressRecord {
        AddressRecord::new(number, street, lat, lon).unwrap()
    }

    #[test]
    fn test_default_key_normalizes_text_and_rounding() {
        let key = CoordinateAddressKey::default();
        let a = record("10", "Downing  Street", 51.5033641, -0.1276248);
        let b = record("10", " downing street ", 51.50336409, -0.12762481);
        assert_eq!(key.key(&a), key.key(&b));
        assert_eq!(key.key(&a), "51.503364|-0.127625|10|downing street");
    }

    #[test]
    fn test_negative_zero_is_folded() {
        let key = CoordinateAddressKey::new(2);
        let a = record("1", "Equator Road", -0.001, 0.0);
        let b = record("1", "Equator Road", 0.0, -0.0);
        assert_eq!(key.key(&a), key.key(&b));
    }

    #[test]
    fn test_admit_first_wins() {
        let mut dedup = Deduplicator::new(Arc::new(CoordinateAddressKey::default()));
        let first = record("4", "Mill Lane", 52.0, -1.0);
        assert!(dedup.admit(&first));
        assert!(!dedup.admit(&first.clone()));
        assert!(dedup.admit(&record("5", "Mill Lane", 52.0, -1.0)));

        let stats = dedup.stats();
        assert_eq!(stats.unique(), 2);
        assert_eq!(stats.duplicates(), 1);
        assert_eq!(dedup.seen_keys(), 2);
    }

    #[tokio::test]
    async fn test_apply_forwards_first_occurrence() {
        let original = record("1", "High Street", 51.0, -1.0).with_name(Some("first".into()));
        let copy = record("1", "HIGH STREET", 51.0, -1.0).with_name(Some("second".into()));
        let other = record("2", "High Street", 51.0, -1.0);

        let dedup = Deduplicator::new(Arc::new(CoordinateAddressKey::default()));
        let stats = dedup.stats();
        let input = stream::iter(vec![original, copy, other]).boxed();
        let out: Vec<AddressRecord> = dedup.apply(input).collect().await;

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].name(), Some("first"));
        assert_eq!(stats.duplicates(), 1);
    }

    #[test]
    fn test_custom_key_function() {
        let by_street = |r: &AddressRecord| r.street().to_string();
        let mut dedup = Deduplicator::new(Arc::new(by_street));
        assert!(dedup.admit(&record("1", "A", 1.0, 1.0)));
        assert!(!dedup.admit(&record("2", "A", 2.0, 2.0)));
    }
}
