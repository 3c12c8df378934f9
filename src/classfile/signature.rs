//! Generic signatures (the `Signature` attribute of a class).
//!
//! Type erasure removes generic arguments from descriptors, but the compiler keeps the
//! declared generic superclass in the class's `Signature` attribute, e.g. for
//! `final class Buffer extends StructBuffer<STBTTPackRange, Buffer>`:
//!
//! ```text
//! Lorg/lwjgl/system/StructBuffer<Lorg/lwjgl/stb/STBTTPackRange;Lorg/lwjgl/stb/STBTTPackRange$Buffer;>;
//! ```
//!
//! Parsing this back is what lets the type resolver recover an erased type parameter. Only
//! class signatures are modelled; method and field signatures are never needed.

use crate::{file::parser::Parser, Error, Result};

/// A reference or base type inside a generic signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSignature {
    /// A primitive, by descriptor character
    Base(u8),
    /// A (possibly parameterized) class type
    Class(ClassTypeSignature),
    /// A type variable such as `T`
    TypeVariable(String),
    /// An array of the component signature
    Array(Box<TypeSignature>),
}

/// A class type with its type arguments.
///
/// For nested types (`Outer<A>.Inner<B>`) the name is the binary name `Outer$Inner` and the
/// arguments are those of the innermost type, matching what reflection reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassTypeSignature {
    /// Internal name of the raw type
    pub name: String,
    /// Type arguments of the innermost type
    pub arguments: Vec<TypeArgument>,
}

impl ClassTypeSignature {
    /// A raw (non-generic) class type.
    #[must_use]
    pub fn raw(name: impl Into<String>) -> Self {
        ClassTypeSignature {
            name: name.into(),
            arguments: Vec::new(),
        }
    }
}

/// One type argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeArgument {
    /// `*`
    Wildcard,
    /// `+T` (`? extends T`)
    Extends(TypeSignature),
    /// `-T` (`? super T`)
    Super(TypeSignature),
    /// An exact type
    Exact(TypeSignature),
}

impl TypeArgument {
    /// Internal name of the argument if it is a concrete, non-parameterized class.
    #[must_use]
    pub fn concrete_class(&self) -> Option<&str> {
        match self {
            TypeArgument::Exact(TypeSignature::Class(class)) if class.arguments.is_empty() => {
                Some(&class.name)
            }
            _ => None,
        }
    }
}

/// The parsed `Signature` attribute of a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSignature {
    /// Names of the declared type parameters
    pub type_parameters: Vec<String>,
    /// The generic superclass
    pub superclass: ClassTypeSignature,
    /// The generic superinterfaces
    pub interfaces: Vec<ClassTypeSignature>,
}

impl ClassSignature {
    /// Parse a class signature.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDescriptor`] if the text is not a valid class signature.
    pub fn parse(signature: &str) -> Result<Self> {
        let mut parser = Parser::new(signature.as_bytes());
        Self::read(&mut parser).map_err(|_| Error::InvalidDescriptor(signature.to_string()))
    }

    fn read(parser: &mut Parser) -> Result<Self> {
        let mut type_parameters = Vec::new();
        if parser.peek_byte()? == b'<' {
            parser.advance_by(1)?;
            while parser.peek_byte()? != b'>' {
                type_parameters.push(parser.read_identifier(b":")?.to_string());
                // Class bound, possibly empty
                parser.advance_by(1)?;
                if !matches!(parser.peek_byte()?, b':' | b'>') && !starts_identifier_end(parser)
                {
                    read_reference(parser)?;
                }
                // Interface bounds
                while parser.peek_byte()? == b':' {
                    parser.advance_by(1)?;
                    read_reference(parser)?;
                }
            }
            parser.advance_by(1)?;
        }

        let superclass = read_class(parser)?;
        let mut interfaces = Vec::new();
        while parser.has_more_data() {
            interfaces.push(read_class(parser)?);
        }

        Ok(ClassSignature {
            type_parameters,
            superclass,
            interfaces,
        })
    }
}

// A class bound is followed either by another parameter name or by the closing `>`; a
// reference type always starts with `L`, `T` or `[`.
fn starts_identifier_end(parser: &Parser) -> bool {
    parser
        .peek_byte()
        .map(|b| !matches!(b, b'L' | b'T' | b'['))
        .unwrap_or(true)
}

fn read_class(parser: &mut Parser) -> Result<ClassTypeSignature> {
    if parser.read_be::<u8>()? != b'L' {
        return Err(malformed_error!("Expected class type signature"));
    }

    let mut name = parser.read_identifier(b"<.;")?.to_string();
    let mut arguments = read_arguments(parser)?;

    while parser.peek_byte()? == b'.' {
        parser.advance_by(1)?;
        name.push('$');
        name.push_str(parser.read_identifier(b"<.;")?);
        arguments = read_arguments(parser)?;
    }

    if parser.read_be::<u8>()? != b';' {
        return Err(malformed_error!("Unterminated class type signature"));
    }

    Ok(ClassTypeSignature { name, arguments })
}

fn read_arguments(parser: &mut Parser) -> Result<Vec<TypeArgument>> {
    let mut arguments = Vec::new();
    if parser.peek_byte()? != b'<' {
        return Ok(arguments);
    }

    parser.advance_by(1)?;
    while parser.peek_byte()? != b'>' {
        let argument = match parser.peek_byte()? {
            b'*' => {
                parser.advance_by(1)?;
                TypeArgument::Wildcard
            }
            b'+' => {
                parser.advance_by(1)?;
                TypeArgument::Extends(read_reference(parser)?)
            }
            b'-' => {
                parser.advance_by(1)?;
                TypeArgument::Super(read_reference(parser)?)
            }
            _ => TypeArgument::Exact(read_reference(parser)?),
        };
        arguments.push(argument);
    }
    parser.advance_by(1)?;

    Ok(arguments)
}

fn read_reference(parser: &mut Parser) -> Result<TypeSignature> {
    match parser.peek_byte()? {
        b'L' => Ok(TypeSignature::Class(read_class(parser)?)),
        b'T' => {
            parser.advance_by(1)?;
            let name = parser.read_identifier(b";")?.to_string();
            parser.advance_by(1)?;
            Ok(TypeSignature::TypeVariable(name))
        }
        b'[' => {
            parser.advance_by(1)?;
            let component = match parser.peek_byte()? {
                base @ (b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z') => {
                    parser.advance_by(1)?;
                    TypeSignature::Base(base)
                }
                _ => read_reference(parser)?,
            };
            Ok(TypeSignature::Array(Box::new(component)))
        }
        other => Err(malformed_error!(
            "Unexpected '{}' in reference type signature",
            other as char
        )),
    }
}
