//! Reverse-reference ("find usages") indexing.
//!
//! The index answers one question: which fields and methods reference a given class, field or
//! method? It is built by feeding class files through [`index_class`], which reports every
//! reference to a [`UsageSink`]. Two sinks are provided:
//!
//! - [`UsageIndex`] - single-threaded, owned by the caller
//! - [`SharedUsageIndex`] - concurrent, with parallel batch ingestion
//!
//! Both filter keys through the [`NamespaceFilter`] of their [`IndexConfig`] and are queried by
//! usage string (see [`Symbol`]).
//!
//! # Examples
//!
//! ```rust
//! use usagescope::assembly::ClassAssembler;
//! use usagescope::classfile::AccessFlags;
//! use usagescope::disassembler::opcodes;
//! use usagescope::{IndexConfig, UsageIndex};
//!
//! let class = ClassAssembler::new("a/Foo")
//!     .method(AccessFlags::PUBLIC, "bar", "()V", |code| {
//!         code.field_insn(opcodes::GETSTATIC, "a/Baz", "x", "I")?;
//!         code.method_insn(opcodes::INVOKESTATIC, "a/Qux", "m", "(I)V")?;
//!         code.emit(opcodes::RETURN)?;
//!         Ok(())
//!     })?
//!     .finish()?;
//!
//! let mut index = UsageIndex::new(IndexConfig::with_namespaces(["a/"]));
//! index.ingest(&class)?;
//!
//! assert!(index.get_usages("f:a/Baz:x:I").contains("m:a/Foo:bar:()V"));
//! assert!(index.get_usages("m:a/Qux:m:(I)V").contains("m:a/Foo:bar:()V"));
//! # Ok::<(), usagescope::Error>(())
//! ```

mod config;
mod indexer;
mod shared;
mod symbol;
mod usages;

pub use config::{IndexConfig, NamespaceFilter, DEFAULT_NAMESPACES};
pub use indexer::{index_class, ALT_METAFACTORY, LAMBDA_METAFACTORY, METAFACTORY};
pub use shared::{IngestFailure, IngestReport, SharedUsageIndex};
pub use symbol::{
    untagged, MemberSymbol, Symbol, CLASS_TAG, CONSTRUCTOR_NAME, FIELD_TAG, METHOD_TAG,
};
pub use usages::{UsageIndex, UsageSink};
