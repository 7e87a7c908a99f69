//! # usagescope Prelude
//!
//! The types needed to build, query and feed a usage index, for glob import.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all usagescope operations
pub use crate::Error;

/// The result type used throughout usagescope
pub use crate::Result;

/// Low-level parsing cursor
pub use crate::Parser;

// ================================================================================================
// Indexing
// ================================================================================================

/// Usage indexes and the sink trait they implement
pub use crate::index::{index_class, SharedUsageIndex, UsageIndex, UsageSink};

/// Index configuration
pub use crate::index::{IndexConfig, NamespaceFilter, DEFAULT_NAMESPACES};

/// Batch ingestion results
pub use crate::index::{IngestFailure, IngestReport};

/// Symbol identities and their string encodings
pub use crate::index::{MemberSymbol, Symbol};

// ================================================================================================
// Class Files
// ================================================================================================

/// Parsed class structure
pub use crate::classfile::{AccessFlags, ClassFile, ConstantPool, HandleKind};

/// Descriptor decoding
pub use crate::classfile::descriptor::{
    parse_field_descriptor, parse_method_descriptor, FieldType, MethodDescriptor, PrimitiveType,
};

// ================================================================================================
// Bytecode
// ================================================================================================

/// Instruction decoding
pub use crate::disassembler::{decode_instruction, instructions, opcodes, Instruction, Operand};

/// Class-file generation
pub use crate::assembly::{BootstrapArgument, ClassAssembler, CodeEncoder, HandleConstant};
