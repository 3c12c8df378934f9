//! The class-file constant pool.
//!
//! The pool is kept as an indexable vector that mirrors the on-disk numbering: slot `0` and the
//! slot following every `Long`/`Double` entry hold [`Constant::Unusable`]. Entries are never
//! removed or reordered, so every index held by untouched code stays valid across a rewrite.
//!
//! The `intern_*` family looks for an existing, structurally equal entry before appending a new
//! one. Applying the same edit twice therefore produces the same pool.

use crate::{
    classfile::mutf8,
    file::{io::put_be, parser::Parser},
    Result,
};

const TAG_UTF8: u8 = 1;
const TAG_INTEGER: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_LONG: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_CLASS: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_FIELDREF: u8 = 9;
const TAG_METHODREF: u8 = 10;
const TAG_INTERFACE_METHODREF: u8 = 11;
const TAG_NAME_AND_TYPE: u8 = 12;
const TAG_METHOD_HANDLE: u8 = 15;
const TAG_METHOD_TYPE: u8 = 16;
const TAG_DYNAMIC: u8 = 17;
const TAG_INVOKE_DYNAMIC: u8 = 18;
const TAG_MODULE: u8 = 19;
const TAG_PACKAGE: u8 = 20;

/// A single constant pool entry.
///
/// Floating point constants keep their raw bit pattern so that equality (and therefore
/// interning) is exact, including for NaN payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    /// Placeholder for index 0 and for the second slot of 8-byte constants
    Unusable,
    /// Text of a modified UTF-8 entry
    Utf8(String),
    /// 32-bit integer
    Integer(i32),
    /// 32-bit float, raw bits
    Float(u32),
    /// 64-bit integer
    Long(i64),
    /// 64-bit float, raw bits
    Double(u64),
    /// Class reference, index of its internal name
    Class(u16),
    /// String literal, index of its text
    String(u16),
    /// Field reference
    FieldRef {
        /// Index of the owning `Class` entry
        class: u16,
        /// Index of the `NameAndType` entry
        name_and_type: u16,
    },
    /// Class method reference
    MethodRef {
        /// Index of the owning `Class` entry
        class: u16,
        /// Index of the `NameAndType` entry
        name_and_type: u16,
    },
    /// Interface method reference
    InterfaceMethodRef {
        /// Index of the owning `Class` entry
        class: u16,
        /// Index of the `NameAndType` entry
        name_and_type: u16,
    },
    /// Name and descriptor pair
    NameAndType {
        /// Index of the name
        name: u16,
        /// Index of the descriptor
        descriptor: u16,
    },
    /// Method handle
    MethodHandle {
        /// Reference kind (1..=9)
        kind: u8,
        /// Index of the referenced member
        reference: u16,
    },
    /// Method type, index of its descriptor
    MethodType(u16),
    /// Dynamically computed constant
    Dynamic {
        /// Bootstrap method attribute index
        bootstrap: u16,
        /// Index of the `NameAndType` entry
        name_and_type: u16,
    },
    /// Dynamically computed call site
    InvokeDynamic {
        /// Bootstrap method attribute index
        bootstrap: u16,
        /// Index of the `NameAndType` entry
        name_and_type: u16,
    },
    /// Module name
    Module(u16),
    /// Package name
    Package(u16),
}

impl Constant {
    fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }
}

/// A resolved field or method reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberRef<'a> {
    /// Internal name of the declaring class
    pub owner: &'a str,
    /// Member name
    pub name: &'a str,
    /// Member descriptor
    pub descriptor: &'a str,
    /// Whether the reference is an `InterfaceMethodref`
    pub interface: bool,
}

/// The constant pool of one class file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantPool {
    /// Create an empty pool (containing only the unusable slot 0).
    #[must_use]
    pub fn new() -> Self {
        ConstantPool {
            entries: vec![Constant::Unusable],
        }
    }

    /// Parse the pool starting at the `constant_pool_count` field.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] on truncated data and [`crate::Error::Malformed`]
    /// on unknown tags.
    pub fn parse(parser: &mut Parser) -> Result<Self> {
        let count = parser.read_be::<u16>()?;
        if count == 0 {
            return Err(malformed_error!("Constant pool count of zero"));
        }

        let mut entries = Vec::with_capacity(count as usize);
        entries.push(Constant::Unusable);

        while entries.len() < count as usize {
            let offset = parser.pos();
            let tag = parser.read_be::<u8>()?;
            let constant = match tag {
                TAG_UTF8 => {
                    let length = parser.read_be::<u16>()?;
                    Constant::Utf8(mutf8::decode(parser.read_bytes(length as usize)?)?)
                }
                TAG_INTEGER => Constant::Integer(parser.read_be::<i32>()?),
                TAG_FLOAT => Constant::Float(parser.read_be::<u32>()?),
                TAG_LONG => Constant::Long(parser.read_be::<i64>()?),
                TAG_DOUBLE => Constant::Double(parser.read_be::<u64>()?),
                TAG_CLASS => Constant::Class(parser.read_be::<u16>()?),
                TAG_STRING => Constant::String(parser.read_be::<u16>()?),
                TAG_FIELDREF => Constant::FieldRef {
                    class: parser.read_be::<u16>()?,
                    name_and_type: parser.read_be::<u16>()?,
                },
                TAG_METHODREF => Constant::MethodRef {
                    class: parser.read_be::<u16>()?,
                    name_and_type: parser.read_be::<u16>()?,
                },
                TAG_INTERFACE_METHODREF => Constant::InterfaceMethodRef {
                    class: parser.read_be::<u16>()?,
                    name_and_type: parser.read_be::<u16>()?,
                },
                TAG_NAME_AND_TYPE => Constant::NameAndType {
                    name: parser.read_be::<u16>()?,
                    descriptor: parser.read_be::<u16>()?,
                },
                TAG_METHOD_HANDLE => Constant::MethodHandle {
                    kind: parser.read_be::<u8>()?,
                    reference: parser.read_be::<u16>()?,
                },
                TAG_METHOD_TYPE => Constant::MethodType(parser.read_be::<u16>()?),
                TAG_DYNAMIC => Constant::Dynamic {
                    bootstrap: parser.read_be::<u16>()?,
                    name_and_type: parser.read_be::<u16>()?,
                },
                TAG_INVOKE_DYNAMIC => Constant::InvokeDynamic {
                    bootstrap: parser.read_be::<u16>()?,
                    name_and_type: parser.read_be::<u16>()?,
                },
                TAG_MODULE => Constant::Module(parser.read_be::<u16>()?),
                TAG_PACKAGE => Constant::Package(parser.read_be::<u16>()?),
                _ => {
                    return Err(malformed_error!(
                        "Unknown constant pool tag {} at offset {}",
                        tag,
                        offset
                    ))
                }
            };

            let wide = constant.is_wide();
            entries.push(constant);
            if wide {
                if entries.len() >= count as usize {
                    return Err(malformed_error!(
                        "8-byte constant occupies the last constant pool slot"
                    ));
                }
                entries.push(Constant::Unusable);
            }
        }

        Ok(ConstantPool { entries })
    }

    /// Serialize the pool, including the `constant_pool_count` field.
    ///
    /// # Errors
    /// Returns [`crate::Error::RewriteFailed`] if a UTF-8 entry exceeds the 65535 byte limit.
    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        put_be(out, self.count()?);

        for constant in &self.entries {
            match constant {
                Constant::Unusable => {}
                Constant::Utf8(text) => {
                    let bytes = mutf8::encode(text);
                    let length = u16::try_from(bytes.len())
                        .map_err(|_| rewrite_error!("UTF-8 constant of {} bytes", bytes.len()))?;
                    out.push(TAG_UTF8);
                    put_be(out, length);
                    out.extend_from_slice(&bytes);
                }
                Constant::Integer(value) => {
                    out.push(TAG_INTEGER);
                    put_be(out, *value);
                }
                Constant::Float(bits) => {
                    out.push(TAG_FLOAT);
                    put_be(out, *bits);
                }
                Constant::Long(value) => {
                    out.push(TAG_LONG);
                    put_be(out, *value);
                }
                Constant::Double(bits) => {
                    out.push(TAG_DOUBLE);
                    put_be(out, *bits);
                }
                Constant::Class(name) => {
                    out.push(TAG_CLASS);
                    put_be(out, *name);
                }
                Constant::String(text) => {
                    out.push(TAG_STRING);
                    put_be(out, *text);
                }
                Constant::FieldRef {
                    class,
                    name_and_type,
                } => {
                    out.push(TAG_FIELDREF);
                    put_be(out, *class);
                    put_be(out, *name_and_type);
                }
                Constant::MethodRef {
                    class,
                    name_and_type,
                } => {
                    out.push(TAG_METHODREF);
                    put_be(out, *class);
                    put_be(out, *name_and_type);
                }
                Constant::InterfaceMethodRef {
                    class,
                    name_and_type,
                } => {
                    out.push(TAG_INTERFACE_METHODREF);
                    put_be(out, *class);
                    put_be(out, *name_and_type);
                }
                Constant::NameAndType { name, descriptor } => {
                    out.push(TAG_NAME_AND_TYPE);
                    put_be(out, *name);
                    put_be(out, *descriptor);
                }
                Constant::MethodHandle { kind, reference } => {
                    out.push(TAG_METHOD_HANDLE);
                    out.push(*kind);
                    put_be(out, *reference);
                }
                Constant::MethodType(descriptor) => {
                    out.push(TAG_METHOD_TYPE);
                    put_be(out, *descriptor);
                }
                Constant::Dynamic {
                    bootstrap,
                    name_and_type,
                } => {
                    out.push(TAG_DYNAMIC);
                    put_be(out, *bootstrap);
                    put_be(out, *name_and_type);
                }
                Constant::InvokeDynamic {
                    bootstrap,
                    name_and_type,
                } => {
                    out.push(TAG_INVOKE_DYNAMIC);
                    put_be(out, *bootstrap);
                    put_be(out, *name_and_type);
                }
                Constant::Module(name) => {
                    out.push(TAG_MODULE);
                    put_be(out, *name);
                }
                Constant::Package(name) => {
                    out.push(TAG_PACKAGE);
                    put_be(out, *name);
                }
            }
        }

        Ok(())
    }

    /// The `constant_pool_count` value (number of slots including slot 0).
    ///
    /// # Errors
    /// Returns [`crate::Error::RewriteFailed`] if the pool outgrew the format's limit.
    pub fn count(&self) -> Result<u16> {
        u16::try_from(self.entries.len())
            .map_err(|_| rewrite_error!("Constant pool exceeds 65535 slots"))
    }

    /// Number of slots, including slot 0 and the shadow slots of 8-byte constants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool holds nothing but the unusable slot 0.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    /// Borrow the entry at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for index 0, shadow slots and out-of-range indexes.
    pub fn get(&self, index: u16) -> Result<&Constant> {
        match self.entries.get(index as usize) {
            Some(Constant::Unusable) | None => Err(malformed_error!(
                "Invalid constant pool index {} (pool has {} slots)",
                index,
                self.entries.len()
            )),
            Some(constant) => Ok(constant),
        }
    }

    /// Text of the `Utf8` entry at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the entry is not a `Utf8` constant.
    pub fn get_utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Utf8(text) => Ok(text),
            other => Err(malformed_error!(
                "Constant {} is {:?}, expected Utf8",
                index,
                other
            )),
        }
    }

    /// Internal name of the `Class` entry at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the entry is not a `Class` constant.
    pub fn get_class_name(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Class(name) => self.get_utf8(*name),
            other => Err(malformed_error!(
                "Constant {} is {:?}, expected Class",
                index,
                other
            )),
        }
    }

    /// Resolve a `Fieldref`, `Methodref` or `InterfaceMethodref` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the entry or the entries it points to have the
    /// wrong kind.
    pub fn get_member_ref(&self, index: u16) -> Result<MemberRef<'_>> {
        let (class, name_and_type, interface) = match self.get(index)? {
            Constant::FieldRef {
                class,
                name_and_type,
            }
            | Constant::MethodRef {
                class,
                name_and_type,
            } => (*class, *name_and_type, false),
            Constant::InterfaceMethodRef {
                class,
                name_and_type,
            } => (*class, *name_and_type, true),
            other => {
                return Err(malformed_error!(
                    "Constant {} is {:?}, expected a member reference",
                    index,
                    other
                ))
            }
        };

        let Constant::NameAndType { name, descriptor } = self.get(name_and_type)? else {
            return Err(malformed_error!(
                "Constant {} is not a NameAndType",
                name_and_type
            ));
        };

        Ok(MemberRef {
            owner: self.get_class_name(class)?,
            name: self.get_utf8(*name)?,
            descriptor: self.get_utf8(*descriptor)?,
            interface,
        })
    }

    fn find(&self, constant: &Constant) -> Option<u16> {
        self.entries
            .iter()
            .position(|existing| existing == constant)
            .and_then(|index| u16::try_from(index).ok())
    }

    fn intern(&mut self, constant: Constant) -> Result<u16> {
        if let Some(index) = self.find(&constant) {
            return Ok(index);
        }

        let index = u16::try_from(self.entries.len())
            .map_err(|_| rewrite_error!("Constant pool exceeds 65535 slots"))?;
        let wide = constant.is_wide();
        self.entries.push(constant);
        if wide {
            self.entries.push(Constant::Unusable);
        }
        self.count()?;

        Ok(index)
    }

    /// Find or add a `Utf8` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::RewriteFailed`] if the pool is full.
    pub fn intern_utf8(&mut self, text: &str) -> Result<u16> {
        self.intern(Constant::Utf8(text.to_string()))
    }

    /// Find or add a `Class` entry for an internal name (or array descriptor).
    ///
    /// # Errors
    /// Returns [`crate::Error::RewriteFailed`] if the pool is full.
    pub fn intern_class(&mut self, name: &str) -> Result<u16> {
        let name = self.intern_utf8(name)?;
        self.intern(Constant::Class(name))
    }

    /// Find or add a `String` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::RewriteFailed`] if the pool is full.
    pub fn intern_string(&mut self, text: &str) -> Result<u16> {
        let text = self.intern_utf8(text)?;
        self.intern(Constant::String(text))
    }

    /// Find or add an `Integer` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::RewriteFailed`] if the pool is full.
    pub fn intern_integer(&mut self, value: i32) -> Result<u16> {
        self.intern(Constant::Integer(value))
    }

    /// Find or add a `Float` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::RewriteFailed`] if the pool is full.
    pub fn intern_float(&mut self, value: f32) -> Result<u16> {
        self.intern(Constant::Float(value.to_bits()))
    }

    /// Find or add a `Long` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::RewriteFailed`] if the pool is full.
    pub fn intern_long(&mut self, value: i64) -> Result<u16> {
        self.intern(Constant::Long(value))
    }

    /// Find or add a `Double` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::RewriteFailed`] if the pool is full.
    pub fn intern_double(&mut self, value: f64) -> Result<u16> {
        self.intern(Constant::Double(value.to_bits()))
    }

    fn intern_name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
        let name = self.intern_utf8(name)?;
        let descriptor = self.intern_utf8(descriptor)?;
        self.intern(Constant::NameAndType { name, descriptor })
    }

    /// Find or add a `Methodref` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::RewriteFailed`] if the pool is full.
    pub fn intern_method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class = self.intern_class(owner)?;
        let name_and_type = self.intern_name_and_type(name, descriptor)?;
        self.intern(Constant::MethodRef {
            class,
            name_and_type,
        })
    }

    /// Find or add a `Fieldref` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::RewriteFailed`] if the pool is full.
    pub fn intern_field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class = self.intern_class(owner)?;
        let name_and_type = self.intern_name_and_type(name, descriptor)?;
        self.intern(Constant::FieldRef {
            class,
            name_and_type,
        })
    }
}
