//! JVM bytecode disassembler.
//!
//! This module decodes the instruction stream of a method's `Code` attribute into typed
//! [`Instruction`]s. Every opcode from `nop` (0x00) to `breakpoint` (0xCA) is supported,
//! including the `wide` prefix and the padded `tableswitch` / `lookupswitch` forms.
//!
//! # Key Types
//! - [`Instruction`] - A decoded instruction
//! - [`Operand`] - Instruction operands (immediates, locals, constant-pool indices, branches)
//! - [`OperandType`] - The operand encoding of an opcode
//!
//! # Main Functions
//! - [`decode_instruction`] - Decode a single instruction
//! - [`decode_stream`] - Decode a sequence of instructions
//! - [`instructions`] - Lazily decode a code array
//!
//! # Example
//! ```rust
//! use usagescope::disassembler::{decode_instruction, opcodes, Operand};
//! use usagescope::Parser;
//!
//! let bytecode = [opcodes::INVOKESTATIC, 0x00, 0x05];
//! let mut parser = Parser::new(&bytecode);
//! let instruction = decode_instruction(&mut parser)?;
//! assert_eq!(instruction.mnemonic, "invokestatic");
//! assert_eq!(instruction.operand, Operand::Constant(5));
//! # Ok::<(), usagescope::Error>(())
//! ```

mod decoder;
mod instruction;
pub mod opcodes;

pub use decoder::{
    decode_instruction, decode_stream, instruction_info, instructions, Instructions, INSTRUCTIONS,
};
pub use instruction::{Immediate, Instruction, InstructionInfo, Operand, OperandType};
