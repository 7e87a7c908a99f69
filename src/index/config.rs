//! Index configuration.
//!
//! The index only keeps references to symbols of the codebase under analysis. Which symbols
//! those are is decided by a [`NamespaceFilter`]: a list of internal-name prefixes such as
//! `net/minecraft`. References to anything else (the JDK, third-party libraries) are dropped
//! at insertion time.

use crate::index::symbol::untagged;

/// Internal-name prefixes of the codebase the default configuration targets
pub const DEFAULT_NAMESPACES: [&str; 2] = ["net/minecraft", "com/mojang"];

/// Prefix predicate over usage-string keys.
///
/// The usage tag (`s:`, `f:`, `m:`) is stripped before matching, so `m:net/minecraft/Foo:m:()V`
/// is matched by the prefix `net/minecraft` exactly like `s:net/minecraft/Foo`. Matching is
/// plain `str::starts_with`; a prefix without a trailing `/` therefore also matches sibling
/// packages that share the text (`net/minecraftforge`).
///
/// # Examples
///
/// ```rust
/// use usagescope::NamespaceFilter;
///
/// let filter = NamespaceFilter::new(["net/minecraft", "com/mojang"]);
/// assert!(filter.accepts("s:net/minecraft/Foo"));
/// assert!(filter.accepts("m:com/mojang/Bar:run:()V"));
/// assert!(!filter.accepts("s:java/lang/String"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceFilter {
    prefixes: Vec<String>,
}

impl NamespaceFilter {
    /// Create a filter from a list of prefixes.
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        NamespaceFilter {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    /// A filter that accepts every key.
    #[must_use]
    pub fn unfiltered() -> Self {
        Self::new([""])
    }

    /// The configured prefixes.
    #[must_use]
    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Returns `true` if the key belongs to one of the configured namespaces.
    #[must_use]
    pub fn accepts(&self, key: &str) -> bool {
        let name = untagged(key);
        self.prefixes
            .iter()
            .any(|prefix| name.starts_with(prefix.as_str()))
    }
}

impl Default for NamespaceFilter {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACES)
    }
}

/// Configuration of a [`crate::UsageIndex`] or [`crate::SharedUsageIndex`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// Which keys are retained
    pub namespaces: NamespaceFilter,

    /// Follow `LambdaMetafactory` call sites to the implementation method and index the
    /// descriptors involved. Disabling this loses every reference made only through a lambda
    /// or method reference.
    pub index_lambdas: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            namespaces: NamespaceFilter::default(),
            index_lambdas: true,
        }
    }
}

impl IndexConfig {
    /// Default behaviour restricted to the given namespaces.
    pub fn with_namespaces<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            namespaces: NamespaceFilter::new(prefixes),
            ..Self::default()
        }
    }

    /// Default behaviour without any namespace restriction.
    ///
    /// Every referenced symbol is kept, including the platform classes, so indexes built this
    /// way grow considerably larger.
    #[must_use]
    pub fn unfiltered() -> Self {
        Self {
            namespaces: NamespaceFilter::unfiltered(),
            ..Self::default()
        }
    }

    /// Only the references visible as plain instructions and declarations.
    #[must_use]
    pub fn without_lambdas(mut self) -> Self {
        self.index_lambdas = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_namespaces() {
        let filter = NamespaceFilter::default();
        assert!(filter.accepts("s:net/minecraft/world/Level"));
        assert!(filter.accepts("f:com/mojang/blaze3d/Foo:x:I"));
        assert!(!filter.accepts("s:java/lang/Object"));
        assert!(!filter.accepts("m:java/lang/Object:<init>:()V"));
        assert_eq!(filter.prefixes().len(), 2);
    }

    #[test]
    fn tag_is_stripped_before_matching() {
        let filter = NamespaceFilter::new(["a/"]);
        assert!(filter.accepts("s:a/Foo"));
        assert!(filter.accepts("m:a/Foo:bar:()V"));
        assert!(filter.accepts("a/Foo"));
        assert!(!filter.accepts("s:b/Foo"));
        // a bare prefix does not see through the tag text itself
        assert!(!NamespaceFilter::new(["s:"]).accepts("s:a/Foo"));
    }

    #[test]
    fn empty_filter_rejects_everything() {
        let filter = NamespaceFilter::new(Vec::<String>::new());
        assert!(!filter.accepts("s:a/Foo"));
        assert!(NamespaceFilter::unfiltered().accepts("s:java/lang/String"));
    }

    #[test]
    fn presets() {
        let config = IndexConfig::default();
        assert!(config.index_lambdas);
        assert_eq!(config.namespaces, NamespaceFilter::default());

        let config = IndexConfig::with_namespaces(["a/"]).without_lambdas();
        assert!(!config.index_lambdas);
        assert_eq!(config.namespaces.prefixes(), ["a/".to_string()]);

        assert!(IndexConfig::unfiltered().namespaces.accepts("s:anything"));
    }
}
