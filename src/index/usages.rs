//! The usage index: referenced symbol key to the set of referencing members.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::{debug, trace};

use crate::{
    index::{config::IndexConfig, indexer::index_class, symbol::Symbol},
    Result,
};

/// Destination of the `(referenced key, referencing usage)` pairs the indexer discovers.
///
/// The indexer itself is filter-agnostic: it reports every reference it finds and leaves
/// namespace filtering to the sink.
pub trait UsageSink {
    /// Record that `usage` references `key`. Both are usage strings.
    fn add_usage(&mut self, key: &str, usage: &str);

    /// Whether `LambdaMetafactory` call sites should be followed to their implementation.
    fn follows_lambdas(&self) -> bool {
        true
    }
}

/// Single-threaded reverse-reference index.
///
/// Each key is the usage string of a referenced symbol (`s:`, `f:` or `m:` encoded); its value
/// is the set of usage strings of the fields and methods referencing it. Only keys accepted by
/// the configured [`crate::NamespaceFilter`] are stored.
///
/// [`UsageIndex::usage_count`] counts accepted insertions, not distinct usages: recording the
/// same usage twice leaves the set unchanged but still increments the counter, so ingesting
/// the same class twice adds the same amount to it each time.
///
/// # Examples
///
/// ```rust
/// use usagescope::{IndexConfig, UsageIndex};
///
/// let mut index = UsageIndex::new(IndexConfig::with_namespaces(["a/"]));
/// index.add_usage("f:a/Baz:x:I", "m:a/Foo:bar:()V");
/// index.add_usage("f:a/Baz:x:I", "m:a/Foo:bar:()V");
/// index.add_usage("s:java/lang/String", "m:a/Foo:bar:()V");
///
/// assert_eq!(index.get_usages("f:a/Baz:x:I").len(), 1);
/// assert!(index.get_usages("s:java/lang/String").is_empty());
/// assert_eq!(index.usage_count(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct UsageIndex {
    config: IndexConfig,
    usages: HashMap<String, HashSet<String>>,
    accepted: usize,
}

impl UsageIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new(config: IndexConfig) -> Self {
        UsageIndex {
            config,
            usages: HashMap::new(),
            accepted: 0,
        }
    }

    pub(crate) fn from_parts(
        config: IndexConfig,
        usages: HashMap<String, HashSet<String>>,
        accepted: usize,
    ) -> Self {
        UsageIndex {
            config,
            usages,
            accepted,
        }
    }

    /// The configuration this index was created with.
    #[must_use]
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Index one class file.
    ///
    /// Indexing is best effort: on error, the usages recorded for this class before the
    /// failure remain in the index.
    ///
    /// # Errors
    /// Returns a malformed-input error if the bytes are not a well-formed class file or
    /// contain an undecodable descriptor, and [`crate::Error::InvalidHandleTag`] for a lambda
    /// implementation handle with an unknown reference kind.
    pub fn ingest(&mut self, bytes: &[u8]) -> Result<()> {
        let before = self.accepted;
        let result = index_class(bytes, self);
        debug!(
            accepted = self.accepted - before,
            ok = result.is_ok(),
            "ingested class"
        );
        result
    }

    /// Record that `usage` references `key`.
    ///
    /// A no-op if `key` is outside the configured namespaces. Otherwise the usage is added to
    /// the key's set and the acceptance counter is incremented, even if the usage was
    /// already present.
    pub fn add_usage(&mut self, key: &str, usage: &str) {
        if !self.config.namespaces.accepts(key) {
            trace!(key, "filtered");
            return;
        }

        self.usages
            .entry(key.to_string())
            .or_default()
            .insert(usage.to_string());
        self.accepted += 1;
    }

    /// All usages recorded against `key`; empty if there are none.
    #[must_use]
    pub fn get_usages(&self, key: &str) -> HashSet<String> {
        self.usages.get(key).cloned().unwrap_or_default()
    }

    /// Borrowing variant of [`UsageIndex::get_usages`].
    #[must_use]
    pub fn usages(&self, key: &str) -> Option<&HashSet<String>> {
        self.usages.get(key)
    }

    /// Usages of `key`, grouped by the class that contains them, both levels sorted.
    ///
    /// Usage strings that do not decode as a symbol are left out.
    #[must_use]
    pub fn usages_by_class(&self, key: &str) -> BTreeMap<String, BTreeSet<String>> {
        let mut grouped: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for usage in self.usages.get(key).into_iter().flatten() {
            match Symbol::parse(usage) {
                Ok(symbol) => {
                    grouped
                        .entry(symbol.owner_class().to_string())
                        .or_default()
                        .insert(usage.clone());
                }
                Err(error) => trace!(usage = usage.as_str(), %error, "ungroupable usage"),
            }
        }
        grouped
    }

    /// Number of accepted insertions so far, counting duplicates.
    #[must_use]
    pub fn usage_count(&self) -> usize {
        self.accepted
    }

    /// Number of distinct keys with at least one usage.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.usages.len()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.usages.is_empty()
    }

    /// Iterate over every key with at least one usage, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.usages.keys().map(String::as_str)
    }
}

impl UsageSink for UsageIndex {
    fn add_usage(&mut self, key: &str, usage: &str) {
        UsageIndex::add_usage(self, key, usage);
    }

    fn follows_lambdas(&self) -> bool {
        self.config.index_lambdas
    }
}
