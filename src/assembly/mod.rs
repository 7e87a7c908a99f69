//! Class-file assembly.
//!
//! The inverse of [`crate::classfile`]: builds well-formed class-file bytes from declarations
//! and instruction sequences. It covers the structures the indexer consumes, which makes it
//! the fixture generator for tests, benchmarks and fuzz seeds.
//!
//! # Key Components
//!
//! - [`ClassAssembler`] - Class header, fields and methods, serialized by `finish`
//! - [`CodeEncoder`] - Instruction emission for one method body
//! - [`ConstantPoolBuilder`] - Deduplicating constant pool writer
//! - [`HandleConstant`] / [`BootstrapArgument`] - `invokedynamic` bootstrap inputs
//!
//! # Examples
//!
//! ```rust
//! use usagescope::assembly::{ClassAssembler, HandleConstant};
//! use usagescope::classfile::{AccessFlags, HandleKind};
//! use usagescope::disassembler::opcodes;
//! use usagescope::{IndexConfig, UsageIndex};
//!
//! let bytes = ClassAssembler::new("a/Foo")
//!     .method(AccessFlags::PUBLIC, "run", "()V", |code| {
//!         code.lambda(
//!             "applyAsInt",
//!             "()Ljava/util/function/IntSupplier;",
//!             "()I",
//!             HandleConstant::new(HandleKind::InvokeStatic, "a/Bar", "baz", "()I"),
//!             "()I",
//!         )?
//!         .emit(opcodes::POP)?
//!         .emit(opcodes::RETURN)?;
//!         Ok(())
//!     })?
//!     .finish()?;
//!
//! let mut index = UsageIndex::new(IndexConfig::with_namespaces(["a/"]));
//! index.ingest(&bytes)?;
//! assert!(index.get_usages("m:a/Bar:baz:()I").contains("m:a/Foo:run:()V"));
//! # Ok::<(), usagescope::Error>(())
//! ```

mod builder;
mod code;
mod pool;

pub use builder::ClassAssembler;
pub use code::{
    BootstrapArgument, CodeEncoder, HandleConstant, ALT_METAFACTORY_DESCRIPTOR,
    METAFACTORY_DESCRIPTOR,
};
pub use pool::ConstantPoolBuilder;
