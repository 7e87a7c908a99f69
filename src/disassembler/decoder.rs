//! Bytecode decoding.
//!
//! Decoding is table driven: [`INSTRUCTIONS`] maps every opcode to its mnemonic and operand
//! encoding, and [`decode_instruction`] reads the operand bytes that encoding calls for. The
//! parser must cover exactly one method's code array, because the padding of `tableswitch`
//! and `lookupswitch` is aligned relative to its start.

use crate::{
    disassembler::{Immediate, Instruction, InstructionInfo, Operand, OperandType},
    file::parser::Parser,
    Result,
};

/// Mnemonic and operand encoding of every valid opcode, indexed by opcode.
pub static INSTRUCTIONS: [InstructionInfo; 0xCB] = [
    InstructionInfo::new("nop", OperandType::None), // 0x00
    InstructionInfo::new("aconst_null", OperandType::None), // 0x01
    InstructionInfo::new("iconst_m1", OperandType::None), // 0x02
    InstructionInfo::new("iconst_0", OperandType::None), // 0x03
    InstructionInfo::new("iconst_1", OperandType::None), // 0x04
    InstructionInfo::new("iconst_2", OperandType::None), // 0x05
    InstructionInfo::new("iconst_3", OperandType::None), // 0x06
    InstructionInfo::new("iconst_4", OperandType::None), // 0x07
    InstructionInfo::new("iconst_5", OperandType::None), // 0x08
    InstructionInfo::new("lconst_0", OperandType::None), // 0x09
    InstructionInfo::new("lconst_1", OperandType::None), // 0x0A
    InstructionInfo::new("fconst_0", OperandType::None), // 0x0B
    InstructionInfo::new("fconst_1", OperandType::None), // 0x0C
    InstructionInfo::new("fconst_2", OperandType::None), // 0x0D
    InstructionInfo::new("dconst_0", OperandType::None), // 0x0E
    InstructionInfo::new("dconst_1", OperandType::None), // 0x0F
    InstructionInfo::new("bipush", OperandType::Int8), // 0x10
    InstructionInfo::new("sipush", OperandType::Int16), // 0x11
    InstructionInfo::new("ldc", OperandType::ConstantU8), // 0x12
    InstructionInfo::new("ldc_w", OperandType::Constant), // 0x13
    InstructionInfo::new("ldc2_w", OperandType::Constant), // 0x14
    InstructionInfo::new("iload", OperandType::Local), // 0x15
    InstructionInfo::new("lload", OperandType::Local), // 0x16
    InstructionInfo::new("fload", OperandType::Local), // 0x17
    InstructionInfo::new("dload", OperandType::Local), // 0x18
    InstructionInfo::new("aload", OperandType::Local), // 0x19
    InstructionInfo::new("iload_0", OperandType::None), // 0x1A
    InstructionInfo::new("iload_1", OperandType::None), // 0x1B
    InstructionInfo::new("iload_2", OperandType::None), // 0x1C
    InstructionInfo::new("iload_3", OperandType::None), // 0x1D
    InstructionInfo::new("lload_0", OperandType::None), // 0x1E
    InstructionInfo::new("lload_1", OperandType::None), // 0x1F
    InstructionInfo::new("lload_2", OperandType::None), // 0x20
    InstructionInfo::new("lload_3", OperandType::None), // 0x21
    InstructionInfo::new("fload_0", OperandType::None), // 0x22
    InstructionInfo::new("fload_1", OperandType::None), // 0x23
    InstructionInfo::new("fload_2", OperandType::None), // 0x24
    InstructionInfo::new("fload_3", OperandType::None), // 0x25
    InstructionInfo::new("dload_0", OperandType::None), // 0x26
    InstructionInfo::new("dload_1", OperandType::None), // 0x27
    InstructionInfo::new("dload_2", OperandType::None), // 0x28
    InstructionInfo::new("dload_3", OperandType::None), // 0x29
    InstructionInfo::new("aload_0", OperandType::None), // 0x2A
    InstructionInfo::new("aload_1", OperandType::None), // 0x2B
    InstructionInfo::new("aload_2", OperandType::None), // 0x2C
    InstructionInfo::new("aload_3", OperandType::None), // 0x2D
    InstructionInfo::new("iaload", OperandType::None), // 0x2E
    InstructionInfo::new("laload", OperandType::None), // 0x2F
    InstructionInfo::new("faload", OperandType::None), // 0x30
    InstructionInfo::new("daload", OperandType::None), // 0x31
    InstructionInfo::new("aaload", OperandType::None), // 0x32
    InstructionInfo::new("baload", OperandType::None), // 0x33
    InstructionInfo::new("caload", OperandType::None), // 0x34
    InstructionInfo::new("saload", OperandType::None), // 0x35
    InstructionInfo::new("istore", OperandType::Local), // 0x36
    InstructionInfo::new("lstore", OperandType::Local), // 0x37
    InstructionInfo::new("fstore", OperandType::Local), // 0x38
    InstructionInfo::new("dstore", OperandType::Local), // 0x39
    InstructionInfo::new("astore", OperandType::Local), // 0x3A
    InstructionInfo::new("istore_0", OperandType::None), // 0x3B
    InstructionInfo::new("istore_1", OperandType::None), // 0x3C
    InstructionInfo::new("istore_2", OperandType::None), // 0x3D
    InstructionInfo::new("istore_3", OperandType::None), // 0x3E
    InstructionInfo::new("lstore_0", OperandType::None), // 0x3F
    InstructionInfo::new("lstore_1", OperandType::None), // 0x40
    InstructionInfo::new("lstore_2", OperandType::None), // 0x41
    InstructionInfo::new("lstore_3", OperandType::None), // 0x42
    InstructionInfo::new("fstore_0", OperandType::None), // 0x43
    InstructionInfo::new("fstore_1", OperandType::None), // 0x44
    InstructionInfo::new("fstore_2", OperandType::None), // 0x45
    InstructionInfo::new("fstore_3", OperandType::None), // 0x46
    InstructionInfo::new("dstore_0", OperandType::None), // 0x47
    InstructionInfo::new("dstore_1", OperandType::None), // 0x48
    InstructionInfo::new("dstore_2", OperandType::None), // 0x49
    InstructionInfo::new("dstore_3", OperandType::None), // 0x4A
    InstructionInfo::new("astore_0", OperandType::None), // 0x4B
    InstructionInfo::new("astore_1", OperandType::None), // 0x4C
    InstructionInfo::new("astore_2", OperandType::None), // 0x4D
    InstructionInfo::new("astore_3", OperandType::None), // 0x4E
    InstructionInfo::new("iastore", OperandType::None), // 0x4F
    InstructionInfo::new("lastore", OperandType::None), // 0x50
    InstructionInfo::new("fastore", OperandType::None), // 0x51
    InstructionInfo::new("dastore", OperandType::None), // 0x52
    InstructionInfo::new("aastore", OperandType::None), // 0x53
    InstructionInfo::new("bastore", OperandType::None), // 0x54
    InstructionInfo::new("castore", OperandType::None), // 0x55
    InstructionInfo::new("sastore", OperandType::None), // 0x56
    InstructionInfo::new("pop", OperandType::None), // 0x57
    InstructionInfo::new("pop2", OperandType::None), // 0x58
    InstructionInfo::new("dup", OperandType::None), // 0x59
    InstructionInfo::new("dup_x1", OperandType::None), // 0x5A
    InstructionInfo::new("dup_x2", OperandType::None), // 0x5B
    InstructionInfo::new("dup2", OperandType::None), // 0x5C
    InstructionInfo::new("dup2_x1", OperandType::None), // 0x5D
    InstructionInfo::new("dup2_x2", OperandType::None), // 0x5E
    InstructionInfo::new("swap", OperandType::None), // 0x5F
    InstructionInfo::new("iadd", OperandType::None), // 0x60
    InstructionInfo::new("ladd", OperandType::None), // 0x61
    InstructionInfo::new("fadd", OperandType::None), // 0x62
    InstructionInfo::new("dadd", OperandType::None), // 0x63
    InstructionInfo::new("isub", OperandType::None), // 0x64
    InstructionInfo::new("lsub", OperandType::None), // 0x65
    InstructionInfo::new("fsub", OperandType::None), // 0x66
    InstructionInfo::new("dsub", OperandType::None), // 0x67
    InstructionInfo::new("imul", OperandType::None), // 0x68
    InstructionInfo::new("lmul", OperandType::None), // 0x69
    InstructionInfo::new("fmul", OperandType::None), // 0x6A
    InstructionInfo::new("dmul", OperandType::None), // 0x6B
    InstructionInfo::new("idiv", OperandType::None), // 0x6C
    InstructionInfo::new("ldiv", OperandType::None), // 0x6D
    InstructionInfo::new("fdiv", OperandType::None), // 0x6E
    InstructionInfo::new("ddiv", OperandType::None), // 0x6F
    InstructionInfo::new("irem", OperandType::None), // 0x70
    InstructionInfo::new("lrem", OperandType::None), // 0x71
    InstructionInfo::new("frem", OperandType::None), // 0x72
    InstructionInfo::new("drem", OperandType::None), // 0x73
    InstructionInfo::new("ineg", OperandType::None), // 0x74
    InstructionInfo::new("lneg", OperandType::None), // 0x75
    InstructionInfo::new("fneg", OperandType::None), // 0x76
    InstructionInfo::new("dneg", OperandType::None), // 0x77
    InstructionInfo::new("ishl", OperandType::None), // 0x78
    InstructionInfo::new("lshl", OperandType::None), // 0x79
    InstructionInfo::new("ishr", OperandType::None), // 0x7A
    InstructionInfo::new("lshr", OperandType::None), // 0x7B
    InstructionInfo::new("iushr", OperandType::None), // 0x7C
    InstructionInfo::new("lushr", OperandType::None), // 0x7D
    InstructionInfo::new("iand", OperandType::None), // 0x7E
    InstructionInfo::new("land", OperandType::None), // 0x7F
    InstructionInfo::new("ior", OperandType::None), // 0x80
    InstructionInfo::new("lor", OperandType::None), // 0x81
    InstructionInfo::new("ixor", OperandType::None), // 0x82
    InstructionInfo::new("lxor", OperandType::None), // 0x83
    InstructionInfo::new("iinc", OperandType::Increment), // 0x84
    InstructionInfo::new("i2l", OperandType::None), // 0x85
    InstructionInfo::new("i2f", OperandType::None), // 0x86
    InstructionInfo::new("i2d", OperandType::None), // 0x87
    InstructionInfo::new("l2i", OperandType::None), // 0x88
    InstructionInfo::new("l2f", OperandType::None), // 0x89
    InstructionInfo::new("l2d", OperandType::None), // 0x8A
    InstructionInfo::new("f2i", OperandType::None), // 0x8B
    InstructionInfo::new("f2l", OperandType::None), // 0x8C
    InstructionInfo::new("f2d", OperandType::None), // 0x8D
    InstructionInfo::new("d2i", OperandType::None), // 0x8E
    InstructionInfo::new("d2l", OperandType::None), // 0x8F
    InstructionInfo::new("d2f", OperandType::None), // 0x90
    InstructionInfo::new("i2b", OperandType::None), // 0x91
    InstructionInfo::new("i2c", OperandType::None), // 0x92
    InstructionInfo::new("i2s", OperandType::None), // 0x93
    InstructionInfo::new("lcmp", OperandType::None), // 0x94
    InstructionInfo::new("fcmpl", OperandType::None), // 0x95
    InstructionInfo::new("fcmpg", OperandType::None), // 0x96
    InstructionInfo::new("dcmpl", OperandType::None), // 0x97
    InstructionInfo::new("dcmpg", OperandType::None), // 0x98
    InstructionInfo::new("ifeq", OperandType::Branch16), // 0x99
    InstructionInfo::new("ifne", OperandType::Branch16), // 0x9A
    InstructionInfo::new("iflt", OperandType::Branch16), // 0x9B
    InstructionInfo::new("ifge", OperandType::Branch16), // 0x9C
    InstructionInfo::new("ifgt", OperandType::Branch16), // 0x9D
    InstructionInfo::new("ifle", OperandType::Branch16), // 0x9E
    InstructionInfo::new("if_icmpeq", OperandType::Branch16), // 0x9F
    InstructionInfo::new("if_icmpne", OperandType::Branch16), // 0xA0
    InstructionInfo::new("if_icmplt", OperandType::Branch16), // 0xA1
    InstructionInfo::new("if_icmpge", OperandType::Branch16), // 0xA2
    InstructionInfo::new("if_icmpgt", OperandType::Branch16), // 0xA3
    InstructionInfo::new("if_icmple", OperandType::Branch16), // 0xA4
    InstructionInfo::new("if_acmpeq", OperandType::Branch16), // 0xA5
    InstructionInfo::new("if_acmpne", OperandType::Branch16), // 0xA6
    InstructionInfo::new("goto", OperandType::Branch16), // 0xA7
    InstructionInfo::new("jsr", OperandType::Branch16), // 0xA8
    InstructionInfo::new("ret", OperandType::Local), // 0xA9
    InstructionInfo::new("tableswitch", OperandType::TableSwitch), // 0xAA
    InstructionInfo::new("lookupswitch", OperandType::LookupSwitch), // 0xAB
    InstructionInfo::new("ireturn", OperandType::None), // 0xAC
    InstructionInfo::new("lreturn", OperandType::None), // 0xAD
    InstructionInfo::new("freturn", OperandType::None), // 0xAE
    InstructionInfo::new("dreturn", OperandType::None), // 0xAF
    InstructionInfo::new("areturn", OperandType::None), // 0xB0
    InstructionInfo::new("return", OperandType::None), // 0xB1
    InstructionInfo::new("getstatic", OperandType::Constant), // 0xB2
    InstructionInfo::new("putstatic", OperandType::Constant), // 0xB3
    InstructionInfo::new("getfield", OperandType::Constant), // 0xB4
    InstructionInfo::new("putfield", OperandType::Constant), // 0xB5
    InstructionInfo::new("invokevirtual", OperandType::Constant), // 0xB6
    InstructionInfo::new("invokespecial", OperandType::Constant), // 0xB7
    InstructionInfo::new("invokestatic", OperandType::Constant), // 0xB8
    InstructionInfo::new("invokeinterface", OperandType::InvokeInterface), // 0xB9
    InstructionInfo::new("invokedynamic", OperandType::InvokeDynamic), // 0xBA
    InstructionInfo::new("new", OperandType::Constant), // 0xBB
    InstructionInfo::new("newarray", OperandType::UInt8), // 0xBC
    InstructionInfo::new("anewarray", OperandType::Constant), // 0xBD
    InstructionInfo::new("arraylength", OperandType::None), // 0xBE
    InstructionInfo::new("athrow", OperandType::None), // 0xBF
    InstructionInfo::new("checkcast", OperandType::Constant), // 0xC0
    InstructionInfo::new("instanceof", OperandType::Constant), // 0xC1
    InstructionInfo::new("monitorenter", OperandType::None), // 0xC2
    InstructionInfo::new("monitorexit", OperandType::None), // 0xC3
    InstructionInfo::new("wide", OperandType::Wide), // 0xC4
    InstructionInfo::new("multianewarray", OperandType::MultiNewArray), // 0xC5
    InstructionInfo::new("ifnull", OperandType::Branch16), // 0xC6
    InstructionInfo::new("ifnonnull", OperandType::Branch16), // 0xC7
    InstructionInfo::new("goto_w", OperandType::Branch32), // 0xC8
    InstructionInfo::new("jsr_w", OperandType::Branch32), // 0xC9
    InstructionInfo::new("breakpoint", OperandType::None), // 0xCA
];

/// Look up the static description of an opcode.
#[must_use]
pub fn instruction_info(opcode: u8) -> Option<&'static InstructionInfo> {
    INSTRUCTIONS.get(opcode as usize)
}

/// Iterator that decodes one instruction per step.
///
/// Yields `Err` once and then stops if the bytecode is malformed.
pub struct Instructions<'a> {
    parser: Parser<'a>,
    failed: bool,
}

impl Iterator for Instructions<'_> {
    type Item = Result<Instruction>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || !self.parser.has_more_data() {
            return None;
        }

        let result = decode_instruction(&mut self.parser);
        self.failed = result.is_err();
        Some(result)
    }
}

/// Lazily decode the instructions of a code array.
///
/// # Examples
///
/// ```rust
/// use usagescope::disassembler::{instructions, opcodes};
///
/// // getstatic #2; return
/// let code = [opcodes::GETSTATIC, 0x00, 0x02, opcodes::RETURN];
/// let mnemonics: Vec<_> = instructions(&code)
///     .map(|instruction| instruction.map(|i| i.mnemonic))
///     .collect::<usagescope::Result<_>>()?;
/// assert_eq!(mnemonics, ["getstatic", "return"]);
/// # Ok::<(), usagescope::Error>(())
/// ```
#[must_use]
pub fn instructions(code: &[u8]) -> Instructions<'_> {
    Instructions {
        parser: Parser::new(code),
        failed: false,
    }
}

/// Decode every remaining instruction of the parser.
///
/// # Errors
/// Returns the first decoding error, see [`decode_instruction`].
pub fn decode_stream(parser: &mut Parser) -> Result<Vec<Instruction>> {
    let mut instructions = Vec::new();
    while parser.has_more_data() {
        instructions.push(decode_instruction(parser)?);
    }
    Ok(instructions)
}

/// Decode a single instruction at the current parser position.
///
/// The parser is advanced past the instruction, including any `wide` prefix and switch
/// padding.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for an invalid opcode, an invalid `wide` target or
/// an inconsistent switch table, and [`crate::Error::OutOfBounds`] if the operands are
/// truncated.
pub fn decode_instruction(parser: &mut Parser) -> Result<Instruction> {
    let offset = parser.pos();
    let mut opcode = parser.read_be::<u8>()?;
    let mut info = lookup(opcode)?;

    let mut wide = false;
    if info.operand == OperandType::Wide {
        wide = true;
        opcode = parser.read_be::<u8>()?;
        info = lookup(opcode)?;
        if !matches!(info.operand, OperandType::Local | OperandType::Increment) {
            return Err(malformed_error!(
                "Opcode {:#04x} ({}) cannot be widened",
                opcode,
                info.mnemonic
            ));
        }
    }

    let operand = match info.operand {
        OperandType::None => Operand::None,
        OperandType::Int8 => Operand::Immediate(Immediate::Int8(parser.read_be::<i8>()?)),
        OperandType::Int16 => Operand::Immediate(Immediate::Int16(parser.read_be::<i16>()?)),
        OperandType::UInt8 => Operand::Immediate(Immediate::UInt8(parser.read_be::<u8>()?)),
        OperandType::ConstantU8 => Operand::Constant(u16::from(parser.read_be::<u8>()?)),
        OperandType::Constant => Operand::Constant(parser.read_be::<u16>()?),
        OperandType::Local if wide => Operand::Local(parser.read_be::<u16>()?),
        OperandType::Local => Operand::Local(u16::from(parser.read_be::<u8>()?)),
        OperandType::Increment if wide => Operand::Increment {
            local: parser.read_be::<u16>()?,
            delta: parser.read_be::<i16>()?,
        },
        OperandType::Increment => Operand::Increment {
            local: u16::from(parser.read_be::<u8>()?),
            delta: i16::from(parser.read_be::<i8>()?),
        },
        OperandType::Branch16 => Operand::Branch(i32::from(parser.read_be::<i16>()?)),
        OperandType::Branch32 => Operand::Branch(parser.read_be::<i32>()?),
        OperandType::TableSwitch => decode_table_switch(parser)?,
        OperandType::LookupSwitch => decode_lookup_switch(parser)?,
        OperandType::InvokeInterface => {
            let index = parser.read_be::<u16>()?;
            let count = parser.read_be::<u8>()?;
            parser.advance()?;
            Operand::InvokeInterface { index, count }
        }
        OperandType::InvokeDynamic => {
            let index = parser.read_be::<u16>()?;
            parser.advance_by(2)?;
            Operand::InvokeDynamic(index)
        }
        OperandType::MultiNewArray => Operand::MultiNewArray {
            index: parser.read_be::<u16>()?,
            dimensions: parser.read_be::<u8>()?,
        },
        OperandType::Wide => {
            return Err(malformed_error!("Nested wide prefix at offset {}", offset));
        }
    };

    Ok(Instruction {
        offset,
        size: parser.pos() - offset,
        opcode,
        wide,
        mnemonic: info.mnemonic,
        operand,
    })
}

fn lookup(opcode: u8) -> Result<&'static InstructionInfo> {
    instruction_info(opcode).ok_or_else(|| malformed_error!("Invalid opcode: {:#04x}", opcode))
}

/// Ensures `count` entries of `entry_size` bytes remain before anything is allocated for them.
fn check_entries(parser: &Parser, count: usize, entry_size: usize) -> Result<()> {
    let length = count
        .checked_mul(entry_size)
        .ok_or(out_of_bounds_error!())?;
    parser.calc_end_position(length)?;
    Ok(())
}

fn decode_table_switch(parser: &mut Parser) -> Result<Operand> {
    parser.align(4)?;
    let default = parser.read_be::<i32>()?;
    let low = parser.read_be::<i32>()?;
    let high = parser.read_be::<i32>()?;
    if high < low {
        return Err(malformed_error!(
            "tableswitch high {} is below low {}",
            high,
            low
        ));
    }

    let count = usize::try_from(i64::from(high) - i64::from(low) + 1)
        .map_err(|_| out_of_bounds_error!())?;
    check_entries(parser, count, 4)?;

    let mut offsets = Vec::with_capacity(count);
    for _ in 0..count {
        offsets.push(parser.read_be::<i32>()?);
    }

    Ok(Operand::TableSwitch {
        default,
        low,
        high,
        offsets,
    })
}

fn decode_lookup_switch(parser: &mut Parser) -> Result<Operand> {
    parser.align(4)?;
    let default = parser.read_be::<i32>()?;
    let pair_count = parser.read_be::<i32>()?;
    let Ok(count) = usize::try_from(pair_count) else {
        return Err(malformed_error!(
            "lookupswitch with negative pair count {}",
            pair_count
        ));
    };
    check_entries(parser, count, 8)?;

    let mut pairs = Vec::with_capacity(count);
    for _ in 0..count {
        let key = parser.read_be::<i32>()?;
        let target = parser.read_be::<i32>()?;
        pairs.push((key, target));
    }

    Ok(Operand::LookupSwitch { default, pairs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{disassembler::opcodes, Error};

    fn decode_one(bytes: &[u8]) -> Result<Instruction> {
        decode_instruction(&mut Parser::new(bytes))
    }

    #[test]
    fn table_covers_every_opcode() {
        assert_eq!(INSTRUCTIONS.len(), 0xCB);
        assert_eq!(INSTRUCTIONS[opcodes::NOP as usize].mnemonic, "nop");
        assert_eq!(INSTRUCTIONS[opcodes::IINC as usize].mnemonic, "iinc");
        assert_eq!(
            INSTRUCTIONS[opcodes::INVOKEDYNAMIC as usize].mnemonic,
            "invokedynamic"
        );
        assert_eq!(INSTRUCTIONS[opcodes::GOTO_W as usize].mnemonic, "goto_w");
        assert_eq!(
            INSTRUCTIONS[opcodes::BREAKPOINT as usize].mnemonic,
            "breakpoint"
        );
        assert!(instruction_info(0xCB).is_none());
    }

    #[test]
    fn simple_operands() {
        let bipush = decode_one(&[opcodes::BIPUSH, 0xFF]).unwrap();
        assert_eq!(bipush.operand, Operand::Immediate(Immediate::Int8(-1)));
        assert_eq!(bipush.size, 2);

        let sipush = decode_one(&[opcodes::SIPUSH, 0x01, 0x00]).unwrap();
        assert_eq!(sipush.operand, Operand::Immediate(Immediate::Int16(256)));

        let ldc = decode_one(&[opcodes::LDC, 0x07]).unwrap();
        assert_eq!(ldc.constant_index(), Some(7));

        let ldc_w = decode_one(&[opcodes::LDC_W, 0x01, 0x07]).unwrap();
        assert_eq!(ldc_w.constant_index(), Some(0x0107));

        let aload = decode_one(&[opcodes::ALOAD, 0x04]).unwrap();
        assert_eq!(aload.operand, Operand::Local(4));
        assert_eq!(aload.constant_index(), None);

        let iinc = decode_one(&[opcodes::IINC, 0x01, 0xFE]).unwrap();
        assert_eq!(iinc.operand, Operand::Increment { local: 1, delta: -2 });

        let newarray = decode_one(&[opcodes::NEWARRAY, 10]).unwrap();
        assert_eq!(newarray.operand, Operand::Immediate(Immediate::UInt8(10)));
    }

    #[test]
    fn invoke_operands() {
        let interface =
            decode_one(&[opcodes::INVOKEINTERFACE, 0x00, 0x09, 0x02, 0x00]).unwrap();
        assert_eq!(
            interface.operand,
            Operand::InvokeInterface { index: 9, count: 2 }
        );
        assert_eq!(interface.size, 5);

        let dynamic = decode_one(&[opcodes::INVOKEDYNAMIC, 0x00, 0x0C, 0x00, 0x00]).unwrap();
        assert_eq!(dynamic.operand, Operand::InvokeDynamic(12));
        assert_eq!(dynamic.constant_index(), Some(12));

        let multi = decode_one(&[opcodes::MULTIANEWARRAY, 0x00, 0x03, 0x02]).unwrap();
        assert_eq!(
            multi.operand,
            Operand::MultiNewArray {
                index: 3,
                dimensions: 2
            }
        );
    }

    #[test]
    fn branches() {
        let mut parser = Parser::new(&[
            opcodes::NOP,
            opcodes::GOTO,
            0xFF,
            0xFF,
            opcodes::GOTO_W,
            0x00,
            0x00,
            0x01,
            0x00,
        ]);
        let stream = decode_stream(&mut parser).unwrap();
        assert_eq!(stream.len(), 3);
        assert_eq!(stream[1].operand, Operand::Branch(-1));
        assert_eq!(stream[1].branch_targets(), vec![0]);
        assert_eq!(stream[2].offset, 4);
        assert_eq!(stream[2].branch_targets(), vec![4 + 256]);
    }

    #[test]
    fn wide_forms() {
        let wide_load = decode_one(&[opcodes::WIDE, opcodes::ILOAD, 0x01, 0x00]).unwrap();
        assert!(wide_load.wide);
        assert_eq!(wide_load.opcode, opcodes::ILOAD);
        assert_eq!(wide_load.operand, Operand::Local(256));
        assert_eq!(wide_load.size, 4);

        let wide_iinc =
            decode_one(&[opcodes::WIDE, opcodes::IINC, 0x00, 0x02, 0xFF, 0x00]).unwrap();
        assert_eq!(
            wide_iinc.operand,
            Operand::Increment {
                local: 2,
                delta: -256
            }
        );
        assert_eq!(wide_iinc.size, 6);

        assert!(matches!(
            decode_one(&[opcodes::WIDE, opcodes::NOP]),
            Err(Error::Malformed { .. })
        ));
        assert!(matches!(
            decode_one(&[opcodes::WIDE, opcodes::WIDE]),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn table_switch_alignment() {
        // nop; tableswitch at offset 1, padded to 4
        let code = [
            opcodes::NOP,
            opcodes::TABLESWITCH,
            0, 0, // padding
            0, 0, 0, 20, // default
            0, 0, 0, 1, // low
            0, 0, 0, 2, // high
            0, 0, 0, 10, // 1
            0, 0, 0, 12, // 2
            opcodes::RETURN,
        ];
        let stream = decode_stream(&mut Parser::new(&code)).unwrap();
        assert_eq!(stream.len(), 3);

        let switch = &stream[1];
        assert_eq!(switch.size, 23);
        assert_eq!(
            switch.operand,
            Operand::TableSwitch {
                default: 20,
                low: 1,
                high: 2,
                offsets: vec![10, 12]
            }
        );
        assert_eq!(switch.branch_targets(), vec![21, 11, 13]);
        assert_eq!(stream[2].offset, 24);
    }

    #[test]
    fn lookup_switch() {
        let code = [
            opcodes::LOOKUPSWITCH,
            0, 0, 0, // padding
            0, 0, 0, 8, // default
            0, 0, 0, 1, // npairs
            0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 16, // -1 => 16
        ];
        let instruction = decode_one(&code).unwrap();
        assert_eq!(
            instruction.operand,
            Operand::LookupSwitch {
                default: 8,
                pairs: vec![(-1, 16)]
            }
        );
        assert_eq!(instruction.size, code.len());
    }

    #[test]
    fn malformed_switches() {
        let inverted = [
            opcodes::TABLESWITCH,
            0, 0, 0,
            0, 0, 0, 0,
            0, 0, 0, 5,
            0, 0, 0, 1,
        ];
        assert!(matches!(decode_one(&inverted), Err(Error::Malformed { .. })));

        let huge = [
            opcodes::TABLESWITCH,
            0, 0, 0,
            0, 0, 0, 0,
            0x80, 0, 0, 0,
            0x7F, 0xFF, 0xFF, 0xFF,
        ];
        assert!(matches!(decode_one(&huge), Err(Error::OutOfBounds { .. })));

        let negative = [
            opcodes::LOOKUPSWITCH,
            0, 0, 0,
            0, 0, 0, 0,
            0xFF, 0xFF, 0xFF, 0xFF,
        ];
        assert!(matches!(decode_one(&negative), Err(Error::Malformed { .. })));
    }

    #[test]
    fn invalid_and_truncated() {
        for opcode in 0xCB..=0xFF_u8 {
            assert!(matches!(decode_one(&[opcode]), Err(Error::Malformed { .. })));
        }
        assert!(matches!(
            decode_one(&[opcodes::GETFIELD, 0x00]),
            Err(Error::OutOfBounds { .. })
        ));
    }

    #[test]
    fn iterator_stops_after_error() {
        let code = [opcodes::NOP, 0xFF, opcodes::NOP];
        let results: Vec<_> = instructions(&code).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }
}
