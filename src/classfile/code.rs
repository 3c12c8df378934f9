//! The `Code` attribute of a method, in its serialized shape.
//!
//! [`CodeAttribute`] holds raw bytecode and raw offsets; the label-based editing model lives in
//! [`crate::rewriter::MethodBody`], which is built from (and lowered back into) this struct.

use crate::{
    classfile::{read_attributes, write_attributes, Attribute},
    file::{io::put_be, parser::Parser},
    Result,
};

/// One entry of a method's exception table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionEntry {
    /// Start of the protected range (inclusive)
    pub start_pc: u16,
    /// End of the protected range (exclusive)
    pub end_pc: u16,
    /// Start of the handler
    pub handler_pc: u16,
    /// Caught class, or 0 for any (`finally`)
    pub catch_type: u16,
}

/// A decoded `Code` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAttribute {
    /// Maximum operand stack depth
    pub max_stack: u16,
    /// Number of local variable slots, including arguments
    pub max_locals: u16,
    /// The bytecode
    pub code: Vec<u8>,
    /// Exception handlers, in priority order
    pub exception_table: Vec<ExceptionEntry>,
    /// Nested attributes (`LineNumberTable`, `StackMapTable`, ...)
    pub attributes: Vec<Attribute>,
}

impl CodeAttribute {
    /// Parse the payload of a `Code` attribute.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for truncated data and [`crate::Error::Malformed`]
    /// for trailing bytes or an empty code array.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut parser = Parser::new(data);
        let max_stack = parser.read_be::<u16>()?;
        let max_locals = parser.read_be::<u16>()?;
        let code_length = parser.read_be::<u32>()? as usize;
        if code_length == 0 {
            return Err(malformed_error!("Code attribute with empty code array"));
        }
        let code = parser.read_bytes(code_length)?.to_vec();

        let entries = parser.read_be::<u16>()?;
        let mut exception_table = Vec::with_capacity(entries as usize);
        for _ in 0..entries {
            exception_table.push(ExceptionEntry {
                start_pc: parser.read_be::<u16>()?,
                end_pc: parser.read_be::<u16>()?,
                handler_pc: parser.read_be::<u16>()?,
                catch_type: parser.read_be::<u16>()?,
            });
        }

        let attributes = read_attributes(&mut parser)?;
        if parser.has_more_data() {
            return Err(malformed_error!(
                "{} trailing bytes after Code attribute",
                parser.remaining()
            ));
        }

        Ok(CodeAttribute {
            max_stack,
            max_locals,
            code,
            exception_table,
            attributes,
        })
    }

    /// Serialize the attribute payload (without name index and length).
    ///
    /// # Errors
    /// Returns [`crate::Error::RewriteFailed`] if a table outgrew its length field.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.code.len() + 32);
        put_be(&mut out, self.max_stack);
        put_be(&mut out, self.max_locals);
        put_be(
            &mut out,
            u32::try_from(self.code.len()).map_err(|_| rewrite_error!("Code array too large"))?,
        );
        out.extend_from_slice(&self.code);

        put_be(
            &mut out,
            u16::try_from(self.exception_table.len())
                .map_err(|_| rewrite_error!("Too many exception table entries"))?,
        );
        for entry in &self.exception_table {
            put_be(&mut out, entry.start_pc);
            put_be(&mut out, entry.end_pc);
            put_be(&mut out, entry.handler_pc);
            put_be(&mut out, entry.catch_type);
        }

        write_attributes(&mut out, &self.attributes)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_serialize() {
        let attr = CodeAttribute {
            max_stack: 2,
            max_locals: 1,
            code: vec![0x2A, 0xB0],
            exception_table: vec![ExceptionEntry {
                start_pc: 0,
                end_pc: 1,
                handler_pc: 1,
                catch_type: 0,
            }],
            attributes: vec![Attribute {
                name_index: 9,
                data: vec![0, 1, 0, 0, 0, 3],
            }],
        };

        let bytes = attr.to_bytes().unwrap();
        assert_eq!(CodeAttribute::parse(&bytes).unwrap(), attr);
    }

    #[test]
    fn reject_truncated_and_trailing() {
        let attr = CodeAttribute {
            max_stack: 0,
            max_locals: 0,
            code: vec![0xB1],
            exception_table: Vec::new(),
            attributes: Vec::new(),
        };
        let mut bytes = attr.to_bytes().unwrap();
        assert!(CodeAttribute::parse(&bytes[..bytes.len() - 1]).is_err());
        bytes.push(0);
        assert!(CodeAttribute::parse(&bytes).is_err());
    }
}
