//! Binary input handling for class files.
//!
//! Class bytes are supplied by the host (an archive reader, a network buffer, a test
//! assembler); this module only provides the cursor used to walk them.
//!
//! # Key Components
//!
//! - [`crate::file::parser::Parser`] - Cursor-based, bounds-checked reader over a byte slice
//! - [`crate::file::io`] - Big-endian primitive readers the parser is built on

pub mod io;
pub mod parser;
