//! JVM opcode byte constants.
//!
//! Opcodes are named after their mnemonic in upper case (e.g. [`INVOKESTATIC`] = `0xB8`).
//! [`operand_layout`] describes how many operand bytes follow each opcode, which is all the
//! decoder needs to walk an instruction stream.
#![allow(missing_docs)]

// ── Constants ──────────────────────────────────────────────────────────────

pub const NOP: u8 = 0x00;
pub const ACONST_NULL: u8 = 0x01;
pub const ICONST_M1: u8 = 0x02;
pub const ICONST_0: u8 = 0x03;
pub const ICONST_1: u8 = 0x04;
pub const ICONST_5: u8 = 0x08;
pub const LCONST_0: u8 = 0x09;
pub const LCONST_1: u8 = 0x0A;
pub const FCONST_0: u8 = 0x0B;
pub const FCONST_1: u8 = 0x0C;
pub const FCONST_2: u8 = 0x0D;
pub const DCONST_0: u8 = 0x0E;
pub const DCONST_1: u8 = 0x0F;
pub const BIPUSH: u8 = 0x10;
pub const SIPUSH: u8 = 0x11;
pub const LDC: u8 = 0x12;
pub const LDC_W: u8 = 0x13;
pub const LDC2_W: u8 = 0x14;

// ── Loads ──────────────────────────────────────────────────────────────────

pub const ILOAD: u8 = 0x15;
pub const LLOAD: u8 = 0x16;
pub const FLOAD: u8 = 0x17;
pub const DLOAD: u8 = 0x18;
pub const ALOAD: u8 = 0x19;
pub const ILOAD_0: u8 = 0x1A;
pub const ALOAD_0: u8 = 0x2A;
pub const ALOAD_3: u8 = 0x2D;
pub const IALOAD: u8 = 0x2E;
pub const SALOAD: u8 = 0x35;

// ── Stores ─────────────────────────────────────────────────────────────────

pub const ISTORE: u8 = 0x36;
pub const LSTORE: u8 = 0x37;
pub const FSTORE: u8 = 0x38;
pub const DSTORE: u8 = 0x39;
pub const ASTORE: u8 = 0x3A;
pub const ISTORE_0: u8 = 0x3B;
pub const ASTORE_3: u8 = 0x4E;
pub const IASTORE: u8 = 0x4F;
pub const AASTORE: u8 = 0x53;
pub const SASTORE: u8 = 0x56;

// ── Stack ──────────────────────────────────────────────────────────────────

pub const POP: u8 = 0x57;
pub const POP2: u8 = 0x58;
pub const DUP: u8 = 0x59;
pub const SWAP: u8 = 0x5F;

// ── Arithmetic and conversions ─────────────────────────────────────────────

pub const IADD: u8 = 0x60;
pub const IINC: u8 = 0x84;
pub const I2L: u8 = 0x85;
pub const DCMPG: u8 = 0x98;

// ── Control flow ───────────────────────────────────────────────────────────

pub const IFEQ: u8 = 0x99;
pub const IF_ACMPNE: u8 = 0xA6;
pub const GOTO: u8 = 0xA7;
pub const JSR: u8 = 0xA8;
pub const RET: u8 = 0xA9;
pub const TABLESWITCH: u8 = 0xAA;
pub const LOOKUPSWITCH: u8 = 0xAB;
pub const IRETURN: u8 = 0xAC;
pub const LRETURN: u8 = 0xAD;
pub const FRETURN: u8 = 0xAE;
pub const DRETURN: u8 = 0xAF;
pub const ARETURN: u8 = 0xB0;
pub const RETURN: u8 = 0xB1;

// ── References ─────────────────────────────────────────────────────────────

pub const GETSTATIC: u8 = 0xB2;
pub const PUTSTATIC: u8 = 0xB3;
pub const GETFIELD: u8 = 0xB4;
pub const PUTFIELD: u8 = 0xB5;
pub const INVOKEVIRTUAL: u8 = 0xB6;
pub const INVOKESPECIAL: u8 = 0xB7;
pub const INVOKESTATIC: u8 = 0xB8;
pub const INVOKEINTERFACE: u8 = 0xB9;
pub const INVOKEDYNAMIC: u8 = 0xBA;
pub const NEW: u8 = 0xBB;
pub const NEWARRAY: u8 = 0xBC;
pub const ANEWARRAY: u8 = 0xBD;
pub const ARRAYLENGTH: u8 = 0xBE;
pub const ATHROW: u8 = 0xBF;
pub const CHECKCAST: u8 = 0xC0;
pub const INSTANCEOF: u8 = 0xC1;
pub const MONITORENTER: u8 = 0xC2;
pub const MONITOREXIT: u8 = 0xC3;

// ── Extended ───────────────────────────────────────────────────────────────

pub const WIDE: u8 = 0xC4;
pub const MULTIANEWARRAY: u8 = 0xC5;
pub const IFNULL: u8 = 0xC6;
pub const IFNONNULL: u8 = 0xC7;
pub const GOTO_W: u8 = 0xC8;
pub const JSR_W: u8 = 0xC9;

/// Shape of the operand bytes following an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandLayout {
    /// No operand
    None,
    /// `bipush`: signed byte
    Byte,
    /// `sipush`: signed short
    Short,
    /// `newarray`: primitive array type code
    ArrayType,
    /// Local variable index, one byte (two after `wide`)
    Local,
    /// `iinc`: local index and signed increment
    Iinc,
    /// `ldc`: one byte constant pool index
    ConstantByte,
    /// Two byte constant pool index
    Constant,
    /// `invokeinterface`: index, argument count, zero
    Interface,
    /// `invokedynamic`: index, two zero bytes
    Dynamic,
    /// `multianewarray`: index and dimensions
    MultiArray,
    /// Two byte branch offset
    Branch,
    /// Four byte branch offset
    BranchWide,
    /// `tableswitch`
    TableSwitch,
    /// `lookupswitch`
    LookupSwitch,
    /// `wide` prefix
    Wide,
}

/// Operand layout of `opcode`, or `None` for bytes that are not defined opcodes.
#[must_use]
pub fn operand_layout(opcode: u8) -> Option<OperandLayout> {
    Some(match opcode {
        NOP..=DCONST_1 => OperandLayout::None,
        BIPUSH => OperandLayout::Byte,
        SIPUSH => OperandLayout::Short,
        LDC => OperandLayout::ConstantByte,
        LDC_W | LDC2_W => OperandLayout::Constant,
        ILOAD..=ALOAD => OperandLayout::Local,
        ILOAD_0..=SALOAD => OperandLayout::None,
        ISTORE..=ASTORE => OperandLayout::Local,
        ISTORE_0..=0x83 => OperandLayout::None,
        IINC => OperandLayout::Iinc,
        I2L..=DCMPG => OperandLayout::None,
        IFEQ..=JSR => OperandLayout::Branch,
        RET => OperandLayout::Local,
        TABLESWITCH => OperandLayout::TableSwitch,
        LOOKUPSWITCH => OperandLayout::LookupSwitch,
        IRETURN..=RETURN => OperandLayout::None,
        GETSTATIC..=INVOKESTATIC => OperandLayout::Constant,
        INVOKEINTERFACE => OperandLayout::Interface,
        INVOKEDYNAMIC => OperandLayout::Dynamic,
        NEW => OperandLayout::Constant,
        NEWARRAY => OperandLayout::ArrayType,
        ANEWARRAY => OperandLayout::Constant,
        ARRAYLENGTH | ATHROW => OperandLayout::None,
        CHECKCAST | INSTANCEOF => OperandLayout::Constant,
        MONITORENTER | MONITOREXIT => OperandLayout::None,
        WIDE => OperandLayout::Wide,
        MULTIANEWARRAY => OperandLayout::MultiArray,
        IFNULL | IFNONNULL => OperandLayout::Branch,
        GOTO_W | JSR_W => OperandLayout::BranchWide,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts() {
        assert_eq!(operand_layout(ALOAD), Some(OperandLayout::Local));
        assert_eq!(operand_layout(ALOAD_0), Some(OperandLayout::None));
        assert_eq!(operand_layout(ASTORE_3), Some(OperandLayout::None));
        assert_eq!(operand_layout(IFNONNULL), Some(OperandLayout::Branch));
        assert_eq!(operand_layout(INVOKESTATIC), Some(OperandLayout::Constant));
        assert_eq!(operand_layout(0xCA), None);
        assert_eq!(operand_layout(0xFF), None);
    }

    #[test]
    fn every_defined_opcode_has_a_layout() {
        for opcode in 0x00..=JSR_W {
            assert!(operand_layout(opcode).is_some(), "{opcode:#x}");
        }
    }
}
