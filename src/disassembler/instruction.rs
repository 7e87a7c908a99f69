//! Decoded JVM instruction representation.
//!
//! An [`Instruction`] carries its position in the code array, its opcode and mnemonic, and a
//! typed [`Operand`]. Constant-pool operands are kept as raw indices; resolving them is up to
//! the consumer (see [`crate::classfile::ConstantPool`]).

use std::fmt;

/// The encoding shape of an opcode's operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    /// No operand bytes
    None,
    /// Signed byte (`bipush`)
    Int8,
    /// Signed short (`sipush`)
    Int16,
    /// Unsigned byte (`newarray` element type)
    UInt8,
    /// One-byte constant-pool index (`ldc`)
    ConstantU8,
    /// Two-byte constant-pool index
    Constant,
    /// Local variable index, one byte (two under `wide`)
    Local,
    /// `iinc`: local index and signed delta (both widened under `wide`)
    Increment,
    /// Signed 16-bit branch offset
    Branch16,
    /// Signed 32-bit branch offset
    Branch32,
    /// `tableswitch` jump table
    TableSwitch,
    /// `lookupswitch` match/offset pairs
    LookupSwitch,
    /// `invokeinterface`: index, argument count and a zero byte
    InvokeInterface,
    /// `invokedynamic`: index and two zero bytes
    InvokeDynamic,
    /// `multianewarray`: index and dimension count
    MultiNewArray,
    /// The `wide` prefix; the operand belongs to the following opcode
    Wide,
}

/// Static description of an opcode.
#[derive(Debug, Clone, Copy)]
pub struct InstructionInfo {
    /// Lower-case mnemonic
    pub mnemonic: &'static str,
    /// Operand encoding
    pub operand: OperandType,
}

impl InstructionInfo {
    pub(crate) const fn new(mnemonic: &'static str, operand: OperandType) -> Self {
        InstructionInfo { mnemonic, operand }
    }
}

/// Small immediate values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Immediate {
    Int8(i8),
    Int16(i16),
    UInt8(u8),
}

impl From<Immediate> for i32 {
    fn from(value: Immediate) -> Self {
        match value {
            Immediate::Int8(value) => i32::from(value),
            Immediate::Int16(value) => i32::from(value),
            Immediate::UInt8(value) => i32::from(value),
        }
    }
}

/// A decoded operand.
///
/// Branch offsets are relative to the offset of the instruction that carries them, as in the
/// class file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// No operand
    None,
    /// An inline constant
    Immediate(Immediate),
    /// A local variable slot
    Local(u16),
    /// `iinc` operands
    Increment {
        /// Local variable slot
        local: u16,
        /// Signed increment
        delta: i16,
    },
    /// A constant-pool index
    Constant(u16),
    /// `invokeinterface` operands
    InvokeInterface {
        /// `InterfaceMethodref` index
        index: u16,
        /// Argument slot count, including the receiver
        count: u8,
    },
    /// `invokedynamic` operand: an `InvokeDynamic` index
    InvokeDynamic(u16),
    /// `multianewarray` operands
    MultiNewArray {
        /// `Class` index of the array type
        index: u16,
        /// Number of dimensions to create
        dimensions: u8,
    },
    /// A branch offset
    Branch(i32),
    /// `tableswitch` operands
    TableSwitch {
        /// Offset of the default target
        default: i32,
        /// Lowest key
        low: i32,
        /// Highest key
        high: i32,
        /// One offset per key in `low..=high`
        offsets: Vec<i32>,
    },
    /// `lookupswitch` operands
    LookupSwitch {
        /// Offset of the default target
        default: i32,
        /// `(match, offset)` pairs, sorted by match
        pairs: Vec<(i32, i32)>,
    },
}

/// A single decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Offset of the first byte (the `wide` prefix, if present) in the code array
    pub offset: usize,
    /// Encoded length in bytes, including any `wide` prefix and switch padding
    pub size: usize,
    /// The opcode (the modified opcode for `wide` forms)
    pub opcode: u8,
    /// `true` if the instruction was prefixed by `wide`
    pub wide: bool,
    /// Lower-case mnemonic
    pub mnemonic: &'static str,
    /// Decoded operand
    pub operand: Operand,
}

impl Instruction {
    /// The constant-pool index this instruction refers to, if any.
    #[must_use]
    pub fn constant_index(&self) -> Option<u16> {
        match self.operand {
            Operand::Constant(index)
            | Operand::InvokeDynamic(index)
            | Operand::InvokeInterface { index, .. }
            | Operand::MultiNewArray { index, .. } => Some(index),
            _ => None,
        }
    }

    /// Absolute code offsets of every branch target, in operand order.
    #[must_use]
    pub fn branch_targets(&self) -> Vec<i64> {
        let base = self.offset as i64;
        match &self.operand {
            Operand::Branch(offset) => vec![base + i64::from(*offset)],
            Operand::TableSwitch {
                default, offsets, ..
            } => std::iter::once(default)
                .chain(offsets.iter())
                .map(|offset| base + i64::from(*offset))
                .collect(),
            Operand::LookupSwitch { default, pairs } => std::iter::once(*default)
                .chain(pairs.iter().map(|(_, offset)| *offset))
                .map(|offset| base + i64::from(offset))
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>5}: ", self.offset)?;
        if self.wide {
            write!(f, "wide ")?;
        }
        write!(f, "{}", self.mnemonic)?;

        match &self.operand {
            Operand::None => Ok(()),
            Operand::Immediate(value) => write!(f, " {}", i32::from(*value)),
            Operand::Local(local) => write!(f, " {local}"),
            Operand::Increment { local, delta } => write!(f, " {local}, {delta}"),
            Operand::Constant(index) | Operand::InvokeDynamic(index) => write!(f, " #{index}"),
            Operand::InvokeInterface { index, count } => write!(f, " #{index}, {count}"),
            Operand::MultiNewArray { index, dimensions } => write!(f, " #{index}, {dimensions}"),
            Operand::Branch(_)
            | Operand::TableSwitch { .. }
            | Operand::LookupSwitch { .. } => {
                let targets: Vec<String> = self
                    .branch_targets()
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                write!(f, " {}", targets.join(", "))
            }
        }
    }
}
