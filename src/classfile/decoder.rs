//! Bytecode decoder.
//!
//! Walks a method's `code` array with a [`Parser`], producing one [`Instruction`] per opcode
//! together with its original offset. Branch offsets are resolved to [`Label`]s through the
//! caller's [`LabelMap`], so the same map can afterwards be used for exception ranges and the
//! other offset-based tables of the method.

use crate::{
    classfile::{
        instruction::{Instruction, Label, LabelMap, Operand},
        opcodes::{self, operand_layout, OperandLayout},
    },
    file::parser::Parser,
    Result,
};

/// Decode a complete `code` array.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for undefined opcodes, invalid `wide` prefixes and branch
/// targets outside the code, and [`crate::Error::OutOfBounds`] for truncated instructions.
pub fn decode(code: &[u8], labels: &mut LabelMap) -> Result<Vec<(u32, Instruction)>> {
    let mut parser = Parser::new(code);
    let mut instructions = Vec::new();

    while parser.has_more_data() {
        let offset = parser.pos();
        let instruction = decode_one(&mut parser, offset, labels)?;
        instructions.push((offset as u32, instruction));
    }

    Ok(instructions)
}

fn branch_target(code_len: usize, offset: usize, delta: i64, labels: &mut LabelMap) -> Result<Label> {
    let target = offset as i64 + delta;
    if target < 0 || target >= code_len as i64 {
        return Err(malformed_error!(
            "Branch at {} targets {} outside of code (length {})",
            offset,
            target,
            code_len
        ));
    }
    Ok(labels.at(target as u32))
}

fn decode_one(parser: &mut Parser, offset: usize, labels: &mut LabelMap) -> Result<Instruction> {
    let code_len = parser.len();
    let opcode = parser.read_be::<u8>()?;
    let Some(layout) = operand_layout(opcode) else {
        return Err(malformed_error!(
            "Undefined opcode {:#04x} at offset {}",
            opcode,
            offset
        ));
    };

    let (opcode, operand) = match layout {
        OperandLayout::None => (opcode, Operand::None),
        OperandLayout::Byte => (opcode, Operand::Byte(parser.read_be::<i8>()?)),
        OperandLayout::Short => (opcode, Operand::Short(parser.read_be::<i16>()?)),
        OperandLayout::ArrayType => (opcode, Operand::ArrayType(parser.read_be::<u8>()?)),
        OperandLayout::Local => (
            opcode,
            Operand::Local(u16::from(parser.read_be::<u8>()?)),
        ),
        OperandLayout::Iinc => (
            opcode,
            Operand::Iinc {
                index: u16::from(parser.read_be::<u8>()?),
                delta: i16::from(parser.read_be::<i8>()?),
            },
        ),
        // `ldc` and `ldc_w` only differ in index width
        OperandLayout::ConstantByte => (
            opcodes::LDC,
            Operand::Constant(u16::from(parser.read_be::<u8>()?)),
        ),
        OperandLayout::Constant => (opcode, Operand::Constant(parser.read_be::<u16>()?)),
        OperandLayout::Interface => {
            let index = parser.read_be::<u16>()?;
            let count = parser.read_be::<u8>()?;
            parser.advance_by(1)?;
            (opcode, Operand::Interface { index, count })
        }
        OperandLayout::Dynamic => {
            let index = parser.read_be::<u16>()?;
            parser.advance_by(2)?;
            (opcode, Operand::Dynamic(index))
        }
        OperandLayout::MultiArray => (
            opcode,
            Operand::MultiArray {
                index: parser.read_be::<u16>()?,
                dimensions: parser.read_be::<u8>()?,
            },
        ),
        OperandLayout::Branch => {
            let delta = i64::from(parser.read_be::<i16>()?);
            (
                opcode,
                Operand::Branch(branch_target(code_len, offset, delta, labels)?),
            )
        }
        OperandLayout::BranchWide => {
            let delta = i64::from(parser.read_be::<i32>()?);
            (
                opcode,
                Operand::Branch(branch_target(code_len, offset, delta, labels)?),
            )
        }
        OperandLayout::TableSwitch => {
            parser.align(4)?;
            let default = branch_target(
                code_len,
                offset,
                i64::from(parser.read_be::<i32>()?),
                labels,
            )?;
            let low = parser.read_be::<i32>()?;
            let high = parser.read_be::<i32>()?;
            if high < low {
                return Err(malformed_error!(
                    "tableswitch at {} has high {} below low {}",
                    offset,
                    high,
                    low
                ));
            }
            let count = (i64::from(high) - i64::from(low) + 1) as usize;
            parser.ensure_remaining(count.saturating_mul(4))?;
            let mut targets = Vec::with_capacity(count);
            for _ in 0..count {
                let delta = i64::from(parser.read_be::<i32>()?);
                targets.push(branch_target(code_len, offset, delta, labels)?);
            }
            (
                opcode,
                Operand::TableSwitch {
                    default,
                    low,
                    targets,
                },
            )
        }
        OperandLayout::LookupSwitch => {
            parser.align(4)?;
            let default = branch_target(
                code_len,
                offset,
                i64::from(parser.read_be::<i32>()?),
                labels,
            )?;
            let count = parser.read_be::<i32>()?;
            let count = usize::try_from(count).map_err(|_| {
                malformed_error!("lookupswitch at {} has negative pair count", offset)
            })?;
            parser.ensure_remaining(count.saturating_mul(8))?;
            let mut pairs = Vec::with_capacity(count);
            for _ in 0..count {
                let key = parser.read_be::<i32>()?;
                let delta = i64::from(parser.read_be::<i32>()?);
                pairs.push((key, branch_target(code_len, offset, delta, labels)?));
            }
            (opcode, Operand::LookupSwitch { default, pairs })
        }
        OperandLayout::Wide => {
            let modified = parser.read_be::<u8>()?;
            match modified {
                opcodes::IINC => (
                    modified,
                    Operand::Iinc {
                        index: parser.read_be::<u16>()?,
                        delta: parser.read_be::<i16>()?,
                    },
                ),
                opcodes::ILOAD..=opcodes::ALOAD
                | opcodes::ISTORE..=opcodes::ASTORE
                | opcodes::RET => (modified, Operand::Local(parser.read_be::<u16>()?)),
                other => {
                    return Err(malformed_error!(
                        "wide prefix at {} applied to opcode {:#04x}",
                        offset,
                        other
                    ))
                }
            }
        }
    };

    Ok(Instruction { opcode, operand })
}
