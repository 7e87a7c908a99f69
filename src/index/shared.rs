//! Concurrent usage index and parallel batch ingestion.
//!
//! [`SharedUsageIndex`] can be written from many threads at once. Per-key sets live in a
//! [`DashMap`], whose entry API makes get-or-create-then-insert a single atomic step, and the
//! acceptance counter is an [`AtomicUsize`]. Batches of classes are spread over the rayon
//! thread pool with [`SharedUsageIndex::ingest_all`].
//!
//! # Examples
//!
//! ```rust
//! use usagescope::assembly::ClassAssembler;
//! use usagescope::classfile::AccessFlags;
//! use usagescope::{IndexConfig, SharedUsageIndex};
//!
//! let classes = (0..8)
//!     .map(|i| {
//!         ClassAssembler::new(&format!("a/Class{i}"))
//!             .field(AccessFlags::PRIVATE, "target", "La/Target;")
//!             .finish()
//!     })
//!     .collect::<usagescope::Result<Vec<_>>>()?;
//!
//! let shared = SharedUsageIndex::new(IndexConfig::with_namespaces(["a/"]));
//! let report = shared.ingest_all(&classes);
//! assert_eq!(report.indexed, 8);
//! assert!(report.failures.is_empty());
//!
//! let index = shared.into_index();
//! assert_eq!(index.get_usages("s:a/Target").len(), 8);
//! # Ok::<(), usagescope::Error>(())
//! ```

use std::{
    collections::HashSet,
    sync::atomic::{AtomicUsize, Ordering},
};

use dashmap::DashMap;
use rayon::prelude::*;
use tracing::{info, trace, warn};

use crate::{
    index::{config::IndexConfig, indexer::index_class, usages::UsageIndex, usages::UsageSink},
    Error, Result,
};

/// A class that could not be indexed during a batch.
#[derive(Debug)]
pub struct IngestFailure {
    /// Position of the class in the batch
    pub position: usize,
    /// Why it failed
    pub error: Error,
}

/// Outcome of a batch ingestion.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Number of classes indexed without error
    pub indexed: usize,
    /// Classes that failed, sorted by position
    pub failures: Vec<IngestFailure>,
}

impl IngestReport {
    /// Total number of classes in the batch.
    #[must_use]
    pub fn total(&self) -> usize {
        self.indexed + self.failures.len()
    }
}

/// Thread-safe variant of [`UsageIndex`] with the same filtering and counting rules.
#[derive(Debug, Default)]
pub struct SharedUsageIndex {
    config: IndexConfig,
    usages: DashMap<String, HashSet<String>>,
    accepted: AtomicUsize,
}

impl SharedUsageIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new(config: IndexConfig) -> Self {
        SharedUsageIndex {
            config,
            usages: DashMap::new(),
            accepted: AtomicUsize::new(0),
        }
    }

    /// The configuration this index was created with.
    #[must_use]
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Index one class file. May be called from several threads at once.
    ///
    /// # Errors
    /// See [`UsageIndex::ingest`].
    pub fn ingest(&self, bytes: &[u8]) -> Result<()> {
        let mut sink = self;
        index_class(bytes, &mut sink)
    }

    /// Index a batch of class files in parallel, continuing past failures.
    pub fn ingest_all<B>(&self, classes: &[B]) -> IngestReport
    where
        B: AsRef<[u8]> + Sync,
    {
        self.ingest_all_with_progress(classes, |_, _| {})
    }

    /// Index a batch of class files in parallel, calling `progress(done, total)` after each
    /// class. Calls arrive from worker threads in completion order.
    pub fn ingest_all_with_progress<B, F>(&self, classes: &[B], progress: F) -> IngestReport
    where
        B: AsRef<[u8]> + Sync,
        F: Fn(usize, usize) + Sync,
    {
        let total = classes.len();
        let done = AtomicUsize::new(0);

        let mut failures: Vec<IngestFailure> = classes
            .par_iter()
            .enumerate()
            .filter_map(|(position, bytes)| {
                let result = self.ingest(bytes.as_ref());
                progress(done.fetch_add(1, Ordering::Relaxed) + 1, total);

                match result {
                    Ok(()) => None,
                    Err(error) => {
                        warn!(position, %error, "failed to index class");
                        Some(IngestFailure { position, error })
                    }
                }
            })
            .collect();
        failures.sort_by_key(|failure| failure.position);

        let report = IngestReport {
            indexed: total - failures.len(),
            failures,
        };
        info!(
            indexed = report.indexed,
            failed = report.failures.len(),
            keys = self.key_count(),
            "batch indexed"
        );
        report
    }

    /// Record that `usage` references `key`. See [`UsageIndex::add_usage`].
    pub fn add_usage(&self, key: &str, usage: &str) {
        if !self.config.namespaces.accepts(key) {
            trace!(key, "filtered");
            return;
        }

        self.usages
            .entry(key.to_string())
            .or_default()
            .insert(usage.to_string());
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// All usages recorded against `key`; empty if there are none.
    #[must_use]
    pub fn get_usages(&self, key: &str) -> HashSet<String> {
        self.usages
            .get(key)
            .map(|set| set.value().clone())
            .unwrap_or_default()
    }

    /// Number of accepted insertions so far, counting duplicates.
    #[must_use]
    pub fn usage_count(&self) -> usize {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Number of distinct keys with at least one usage.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.usages.len()
    }

    /// Freeze into a single-threaded [`UsageIndex`] for querying.
    #[must_use]
    pub fn into_index(self) -> UsageIndex {
        UsageIndex::from_parts(
            self.config,
            self.usages.into_iter().collect(),
            self.accepted.into_inner(),
        )
    }
}

impl UsageSink for &SharedUsageIndex {
    fn add_usage(&mut self, key: &str, usage: &str) {
        SharedUsageIndex::add_usage(self, key, usage);
    }

    fn follows_lambdas(&self) -> bool {
        self.config.index_lambdas
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn concurrent_add_usage() {
        let shared = SharedUsageIndex::new(IndexConfig::with_namespaces(["a/"]));
        (0..1000).into_par_iter().for_each(|i| {
            shared.add_usage("s:a/Foo", &format!("m:a/Caller:m{}:()V", i % 100));
            shared.add_usage("s:java/lang/Object", "m:a/Caller:m:()V");
        });

        assert_eq!(shared.get_usages("s:a/Foo").len(), 100);
        assert_eq!(shared.usage_count(), 1000);
        assert_eq!(shared.key_count(), 1);
    }

    #[test]
    fn failures_are_reported_in_order() {
        let batch: Vec<Vec<u8>> = vec![
            vec![0xCA, 0xFE],
            vec![0x00, 0x00, 0x00, 0x00],
            vec![0xCA, 0xFE, 0xBA, 0xBE],
        ];
        let shared = SharedUsageIndex::default();
        let seen = Mutex::new(Vec::new());

        let report = shared.ingest_all_with_progress(&batch, |done, total| {
            assert_eq!(total, 3);
            seen.lock().unwrap().push(done);
        });

        assert_eq!(report.indexed, 0);
        assert_eq!(report.total(), 3);
        let positions: Vec<_> = report.failures.iter().map(|f| f.position).collect();
        assert_eq!(positions, [0, 1, 2]);
        assert!(matches!(report.failures[1].error, Error::InvalidMagic(0)));

        let mut seen = seen.into_inner().unwrap();
        seen.sort_unstable();
        assert_eq!(seen, [1, 2, 3]);
    }

    #[test]
    fn into_index_keeps_counter() {
        let shared = SharedUsageIndex::new(IndexConfig::unfiltered());
        shared.add_usage("s:x/Y", "m:x/Z:m:()V");
        shared.add_usage("s:x/Y", "m:x/Z:m:()V");

        let index = shared.into_index();
        assert_eq!(index.usage_count(), 2);
        assert_eq!(index.get_usages("s:x/Y").len(), 1);
        assert_eq!(index.config(), &IndexConfig::unfiltered());
    }
}
