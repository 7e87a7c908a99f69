// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # usagescope
//!
//! A "find usages" index for compiled JVM classes. Feed it class files and ask which fields
//! and methods reference a given class, field or method.
//!
//! ## Features
//!
//! - **Zero-copy parsing** - Class files are decoded in place; names borrow from the input
//! - **Bytecode aware** - Field accesses, invocations, type operands and lambda call sites
//!   are all followed through the instruction stream
//! - **Namespace filtering** - Only references into the configured package prefixes are kept
//! - **Parallel ingestion** - Large class sets are indexed across the rayon thread pool
//!
//! ## Quick Start
//!
//! ```rust
//! use usagescope::prelude::*;
//!
//! let bytes = ClassAssembler::new("net/minecraft/Foo")
//!     .method(AccessFlags::PUBLIC, "tick", "()V", |code| {
//!         code.method_insn(opcodes::INVOKESTATIC, "net/minecraft/Util", "now", "()J")?
//!             .emit(opcodes::POP2)?
//!             .emit(opcodes::RETURN)?;
//!         Ok(())
//!     })?
//!     .finish()?;
//!
//! let mut index = UsageIndex::default();
//! index.ingest(&bytes)?;
//!
//! let usages = index.get_usages(&Symbol::method("net/minecraft/Util", "now", "()J").usage());
//! assert!(usages.contains("m:net/minecraft/Foo:tick:()V"));
//! # Ok::<(), usagescope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`file`] - Big-endian readers and the [`Parser`] cursor
//! - [`classfile`] - Constant pool, members, attributes and descriptors
//! - [`disassembler`] - Table-driven bytecode decoding
//! - [`index`] - Symbols, namespace filtering and the usage indexes
//! - [`assembly`] - Class-file generation
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events: `debug` per indexed class, `trace` for filtered keys,
//! `warn` for classes that fail inside a batch and `info` when a batch completes. Install any
//! `tracing` subscriber to see them.

#[macro_use]
pub(crate) mod error;

/// Low-level input handling
///
/// Big-endian primitive reads through [`file::io::ClassIO`] and the bounds-checked
/// [`Parser`] cursor used by every decoder in the crate.
pub mod file;

/// JVM class-file structure
///
/// See [`classfile::ClassFile`] for the parsed form of a class and
/// [`classfile::descriptor`] for type descriptors.
pub mod classfile;

/// Bytecode instruction decoding
///
/// Covers every opcode from `nop` (`0x00`) to `jsr_w` (`0xC9`) and `breakpoint` (`0xCA`),
/// including the `wide` prefix and the padded switch instructions.
///
/// # Examples
///
/// ```rust
/// use usagescope::disassembler::{instructions, opcodes};
///
/// let code = [opcodes::ICONST_1, opcodes::ISTORE_1, opcodes::RETURN];
/// let mnemonics: Vec<_> = instructions(&code)
///     .map(|instruction| instruction.map(|i| i.mnemonic))
///     .collect::<usagescope::Result<_>>()?;
/// assert_eq!(mnemonics, ["iconst_1", "istore_1", "return"]);
/// # Ok::<(), usagescope::Error>(())
/// ```
pub mod disassembler;

/// Reverse-reference indexing
pub mod index;

/// Class-file generation
pub mod assembly;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use usagescope::prelude::*;
///
/// let index = UsageIndex::new(IndexConfig::with_namespaces(["com/example"]));
/// assert!(index.is_empty());
/// ```
pub mod prelude;

/// `usagescope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `usagescope` Error type
///
/// The single error type returned by every fallible operation in this crate.
pub use error::Error;

/// Bounds-checked cursor over big-endian class-file data
pub use file::parser::Parser;

pub use index::{
    index_class, IndexConfig, IngestFailure, IngestReport, MemberSymbol, NamespaceFilter,
    SharedUsageIndex, Symbol, UsageIndex, UsageSink,
};
