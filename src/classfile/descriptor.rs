//! Field and method descriptors.
//!
//! Descriptors are the erased type strings the JVM uses for linkage, e.g. `I`,
//! `Ljava/nio/ByteBuffer;`, `[[D` or `(Ljava/lang/String;I)Z`. They are the only type
//! information a call site carries, which is why redirected calls are adapted against the
//! *erased* return type.

use std::fmt;

use crate::{file::parser::Parser, Error, Result};

/// A field (value) type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// `B`
    Byte,
    /// `C`
    Char,
    /// `D`
    Double,
    /// `F`
    Float,
    /// `I`
    Int,
    /// `J`
    Long,
    /// `S`
    Short,
    /// `Z`
    Boolean,
    /// `L<internal name>;`
    Object(String),
    /// `[<component>`
    Array(Box<FieldType>),
}

impl FieldType {
    /// Parse a complete field descriptor.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDescriptor`] if `descriptor` is not exactly one field type.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let mut parser = Parser::new(descriptor.as_bytes());
        let field = Self::read(&mut parser)
            .map_err(|_| Error::InvalidDescriptor(descriptor.to_string()))?;
        if parser.has_more_data() {
            return Err(Error::InvalidDescriptor(descriptor.to_string()));
        }
        Ok(field)
    }

    pub(crate) fn read(parser: &mut Parser) -> Result<Self> {
        let tag = parser.read_be::<u8>()?;
        Ok(match tag {
            b'B' => FieldType::Byte,
            b'C' => FieldType::Char,
            b'D' => FieldType::Double,
            b'F' => FieldType::Float,
            b'I' => FieldType::Int,
            b'J' => FieldType::Long,
            b'S' => FieldType::Short,
            b'Z' => FieldType::Boolean,
            b'L' => {
                let name = parser.read_identifier(b";")?.to_string();
                parser.advance_by(1)?;
                FieldType::Object(name)
            }
            b'[' => FieldType::Array(Box::new(Self::read(parser)?)),
            other => return Err(malformed_error!("Unknown descriptor tag {}", other as char)),
        })
    }

    /// Number of local variable / operand stack slots a value of this type occupies.
    #[must_use]
    pub fn slot_size(&self) -> u16 {
        match self {
            FieldType::Long | FieldType::Double => 2,
            _ => 1,
        }
    }

    /// Internal name of the wrapper class boxing this primitive, and its unboxing method.
    ///
    /// Returns `None` for reference types.
    #[must_use]
    pub fn wrapper(&self) -> Option<(&'static str, &'static str)> {
        Some(match self {
            FieldType::Byte => ("java/lang/Byte", "byteValue"),
            FieldType::Char => ("java/lang/Character", "charValue"),
            FieldType::Double => ("java/lang/Double", "doubleValue"),
            FieldType::Float => ("java/lang/Float", "floatValue"),
            FieldType::Int => ("java/lang/Integer", "intValue"),
            FieldType::Long => ("java/lang/Long", "longValue"),
            FieldType::Short => ("java/lang/Short", "shortValue"),
            FieldType::Boolean => ("java/lang/Boolean", "booleanValue"),
            FieldType::Object(_) | FieldType::Array(_) => return None,
        })
    }

    /// Name usable in a `Class` constant: the internal name for classes, the descriptor for
    /// arrays. `None` for primitives.
    #[must_use]
    pub fn class_constant_name(&self) -> Option<String> {
        match self {
            FieldType::Object(name) => Some(name.clone()),
            FieldType::Array(_) => Some(self.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Byte => f.write_str("B"),
            FieldType::Char => f.write_str("C"),
            FieldType::Double => f.write_str("D"),
            FieldType::Float => f.write_str("F"),
            FieldType::Int => f.write_str("I"),
            FieldType::Long => f.write_str("J"),
            FieldType::Short => f.write_str("S"),
            FieldType::Boolean => f.write_str("Z"),
            FieldType::Object(name) => write!(f, "L{name};"),
            FieldType::Array(component) => write!(f, "[{component}"),
        }
    }
}

/// The return type of a method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReturnType {
    /// `V`
    Void,
    /// Any field type
    Value(FieldType),
}

impl ReturnType {
    /// Parse a return descriptor (`V` or a field descriptor).
    ///
    /// # Errors
    /// Returns [`Error::InvalidDescriptor`] if the text is not a return descriptor.
    pub fn parse(descriptor: &str) -> Result<Self> {
        if descriptor == "V" {
            return Ok(ReturnType::Void);
        }
        FieldType::parse(descriptor).map(ReturnType::Value)
    }

    /// Number of stack slots the returned value occupies.
    #[must_use]
    pub fn slot_size(&self) -> u16 {
        match self {
            ReturnType::Void => 0,
            ReturnType::Value(field) => field.slot_size(),
        }
    }
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnType::Void => f.write_str("V"),
            ReturnType::Value(field) => field.fmt(f),
        }
    }
}

/// A parsed method descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    /// Parameter types in declaration order
    pub params: Vec<FieldType>,
    /// Return type
    pub ret: ReturnType,
}

impl MethodDescriptor {
    /// Parse a method descriptor such as `(IJ)Ljava/lang/String;`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDescriptor`] on any syntax error.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let invalid = || Error::InvalidDescriptor(descriptor.to_string());

        let mut parser = Parser::new(descriptor.as_bytes());
        if parser.read_be::<u8>().map_err(|_| invalid())? != b'(' {
            return Err(invalid());
        }

        let mut params = Vec::new();
        loop {
            if parser.peek_byte().map_err(|_| invalid())? == b')' {
                parser.advance_by(1).map_err(|_| invalid())?;
                break;
            }
            params.push(FieldType::read(&mut parser).map_err(|_| invalid())?);
        }

        let ret = if parser.peek_byte().map_err(|_| invalid())? == b'V' {
            parser.advance_by(1).map_err(|_| invalid())?;
            ReturnType::Void
        } else {
            ReturnType::Value(FieldType::read(&mut parser).map_err(|_| invalid())?)
        };

        if parser.has_more_data() {
            return Err(invalid());
        }

        Ok(MethodDescriptor { params, ret })
    }

    /// Slots occupied by the parameters, plus one for `this` on instance methods.
    #[must_use]
    pub fn argument_slots(&self, is_static: bool) -> u32 {
        let params: u32 = self.params.iter().map(|p| u32::from(p.slot_size())).sum();
        if is_static {
            params
        } else {
            params + 1
        }
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for param in &self.params {
            param.fmt(f)?;
        }
        f.write_str(")")?;
        self.ret.fmt(f)
    }
}
