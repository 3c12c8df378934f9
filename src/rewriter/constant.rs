//! Constant values a replaced method body can return.

use std::fmt;

use crate::{
    classfile::{
        constpool::ConstantPool,
        descriptor::{FieldType, ReturnType},
        instruction::{Instruction, Operand},
        opcodes,
    },
    Result,
};

/// The value a constant-return body produces.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    /// Plain `return` from a `void` method
    Void,
    /// `null` from a reference-returning method
    Null,
    /// `boolean`
    Bool(bool),
    /// `int`, or a narrower integral type when the value fits
    Int(i32),
    /// `long`
    Long(i64),
    /// `float`
    Float(f32),
    /// `double`
    Double(f64),
    /// A string literal
    Str(String),
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantValue::Void => f.write_str("void"),
            ConstantValue::Null => f.write_str("null"),
            ConstantValue::Bool(value) => write!(f, "{value}"),
            ConstantValue::Int(value) => write!(f, "{value}"),
            ConstantValue::Long(value) => write!(f, "{value}L"),
            ConstantValue::Float(value) => write!(f, "{value}F"),
            ConstantValue::Double(value) => write!(f, "{value}D"),
            ConstantValue::Str(value) => write!(f, "{value:?}"),
        }
    }
}

const STRING_SUPERTYPES: [&str; 4] = [
    "java/lang/String",
    "java/lang/Object",
    "java/lang/CharSequence",
    "java/io/Serializable",
];

impl ConstantValue {
    /// Whether a method declaring `ret` may return this value.
    #[must_use]
    pub fn fits(&self, ret: &ReturnType) -> bool {
        let ReturnType::Value(field) = ret else {
            return matches!(self, ConstantValue::Void);
        };

        match (self, field) {
            (ConstantValue::Null, FieldType::Object(_) | FieldType::Array(_)) => true,
            (ConstantValue::Bool(_), FieldType::Boolean) => true,
            (ConstantValue::Int(_), FieldType::Int) => true,
            (ConstantValue::Int(value), FieldType::Boolean) => matches!(value, 0 | 1),
            (ConstantValue::Int(value), FieldType::Byte) => i8::try_from(*value).is_ok(),
            (ConstantValue::Int(value), FieldType::Short) => i16::try_from(*value).is_ok(),
            (ConstantValue::Int(value), FieldType::Char) => u16::try_from(*value).is_ok(),
            (ConstantValue::Long(_), FieldType::Long) => true,
            (ConstantValue::Float(_), FieldType::Float) => true,
            (ConstantValue::Double(_), FieldType::Double) => true,
            (ConstantValue::Str(_), FieldType::Object(name)) => {
                STRING_SUPERTYPES.contains(&name.as_str())
            }
            _ => false,
        }
    }

    /// Operand stack slots the pushed value occupies.
    #[must_use]
    pub fn slot_size(&self) -> u16 {
        match self {
            ConstantValue::Void => 0,
            ConstantValue::Long(_) | ConstantValue::Double(_) => 2,
            _ => 1,
        }
    }

    /// Instructions pushing this value, interning constants into `pool` where needed.
    ///
    /// # Errors
    /// Returns [`crate::Error::RewriteFailed`] if the constant pool is full.
    pub fn push_instructions(&self, pool: &mut ConstantPool) -> Result<Vec<Instruction>> {
        Ok(match self {
            ConstantValue::Void => Vec::new(),
            ConstantValue::Null => vec![Instruction::simple(opcodes::ACONST_NULL)],
            ConstantValue::Bool(value) => vec![push_int(i32::from(*value), pool)?],
            ConstantValue::Int(value) => vec![push_int(*value, pool)?],
            ConstantValue::Long(value) => vec![match value {
                0 => Instruction::simple(opcodes::LCONST_0),
                1 => Instruction::simple(opcodes::LCONST_1),
                _ => Instruction::constant(opcodes::LDC2_W, pool.intern_long(*value)?),
            }],
            ConstantValue::Float(value) => vec![match value.to_bits() {
                0x0000_0000 => Instruction::simple(opcodes::FCONST_0),
                0x3F80_0000 => Instruction::simple(opcodes::FCONST_1),
                0x4000_0000 => Instruction::simple(opcodes::FCONST_2),
                _ => Instruction::constant(opcodes::LDC, pool.intern_float(*value)?),
            }],
            ConstantValue::Double(value) => vec![match value.to_bits() {
                0x0000_0000_0000_0000 => Instruction::simple(opcodes::DCONST_0),
                0x3FF0_0000_0000_0000 => Instruction::simple(opcodes::DCONST_1),
                _ => Instruction::constant(opcodes::LDC2_W, pool.intern_double(*value)?),
            }],
            ConstantValue::Str(value) => vec![Instruction::constant(
                opcodes::LDC,
                pool.intern_string(value)?,
            )],
        })
    }
}

/// Shortest instruction pushing an `int`.
///
/// # Errors
/// Returns [`crate::Error::RewriteFailed`] if the constant pool is full.
pub fn push_int(value: i32, pool: &mut ConstantPool) -> Result<Instruction> {
    Ok(match value {
        -1..=5 => Instruction::simple((i32::from(opcodes::ICONST_0) + value) as u8),
        _ => {
            if let Ok(byte) = i8::try_from(value) {
                Instruction {
                    opcode: opcodes::BIPUSH,
                    operand: Operand::Byte(byte),
                }
            } else if let Ok(short) = i16::try_from(value) {
                Instruction {
                    opcode: opcodes::SIPUSH,
                    operand: Operand::Short(short),
                }
            } else {
                Instruction::constant(opcodes::LDC, pool.intern_integer(value)?)
            }
        }
    })
}

/// The return instruction for `ret`.
#[must_use]
pub fn return_opcode(ret: &ReturnType) -> u8 {
    match ret {
        ReturnType::Void => opcodes::RETURN,
        ReturnType::Value(field) => match field {
            FieldType::Long => opcodes::LRETURN,
            FieldType::Float => opcodes::FRETURN,
            FieldType::Double => opcodes::DRETURN,
            FieldType::Object(_) | FieldType::Array(_) => opcodes::ARETURN,
            _ => opcodes::IRETURN,
        },
    }
}

/// The load instruction for a local of type `field`.
#[must_use]
pub fn load_opcode(field: &FieldType) -> u8 {
    match field {
        FieldType::Long => opcodes::LLOAD,
        FieldType::Float => opcodes::FLOAD,
        FieldType::Double => opcodes::DLOAD,
        FieldType::Object(_) | FieldType::Array(_) => opcodes::ALOAD,
        _ => opcodes::ILOAD,
    }
}

/// The store instruction for a local of type `field`.
#[must_use]
pub fn store_opcode(field: &FieldType) -> u8 {
    match field {
        FieldType::Long => opcodes::LSTORE,
        FieldType::Float => opcodes::FSTORE,
        FieldType::Double => opcodes::DSTORE,
        FieldType::Object(_) | FieldType::Array(_) => opcodes::ASTORE,
        _ => opcodes::ISTORE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_return_types() {
        let int = ReturnType::Value(FieldType::Int);
        let string = ReturnType::parse("Ljava/lang/String;").unwrap();
        let pair = ReturnType::parse("Ljava/security/KeyPair;").unwrap();

        assert!(ConstantValue::Void.fits(&ReturnType::Void));
        assert!(!ConstantValue::Void.fits(&int));
        assert!(!ConstantValue::Null.fits(&ReturnType::Void));
        assert!(ConstantValue::Null.fits(&pair));
        assert!(!ConstantValue::Null.fits(&int));
        assert!(ConstantValue::Int(1).fits(&ReturnType::Value(FieldType::Boolean)));
        assert!(!ConstantValue::Int(2).fits(&ReturnType::Value(FieldType::Boolean)));
        assert!(!ConstantValue::Int(300).fits(&ReturnType::Value(FieldType::Byte)));
        assert!(ConstantValue::Str("x".into()).fits(&string));
        assert!(!ConstantValue::Str("x".into()).fits(&pair));
        assert!(!ConstantValue::Long(1).fits(&int));
    }

    #[test]
    fn shortest_int_push() {
        let mut pool = ConstantPool::new();
        assert_eq!(
            push_int(-1, &mut pool).unwrap(),
            Instruction::simple(opcodes::ICONST_M1)
        );
        assert_eq!(
            push_int(5, &mut pool).unwrap(),
            Instruction::simple(opcodes::ICONST_5)
        );
        assert_eq!(push_int(100, &mut pool).unwrap().opcode, opcodes::BIPUSH);
        assert_eq!(push_int(-300, &mut pool).unwrap().opcode, opcodes::SIPUSH);
        assert!(pool.is_empty());
        assert_eq!(push_int(1 << 20, &mut pool).unwrap().opcode, opcodes::LDC);
        assert!(!pool.is_empty());
    }

    #[test]
    fn pushes_and_returns() {
        let mut pool = ConstantPool::new();
        let pushed = ConstantValue::Double(0.5)
            .push_instructions(&mut pool)
            .unwrap();
        assert_eq!(pushed[0].opcode, opcodes::LDC2_W);
        assert_eq!(
            ConstantValue::Float(2.0).push_instructions(&mut pool).unwrap()[0],
            Instruction::simple(opcodes::FCONST_2)
        );
        assert!(ConstantValue::Void
            .push_instructions(&mut pool)
            .unwrap()
            .is_empty());
        assert_eq!(return_opcode(&ReturnType::Void), opcodes::RETURN);
        assert_eq!(
            return_opcode(&ReturnType::Value(FieldType::Char)),
            opcodes::IRETURN
        );
        assert_eq!(load_opcode(&FieldType::Double), opcodes::DLOAD);
        assert_eq!(store_opcode(&FieldType::Boolean), opcodes::ISTORE);
    }
}
