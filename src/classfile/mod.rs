//! Narrow JVM class-file codec.
//!
//! This module is the only place that knows the class-file binary format. It parses a module
//! into a [`ClassFile`], exposes exactly what the rewriter and the type resolver need (constant
//! pool editing, method `Code` attributes, the generic `Signature` attribute), and serializes the
//! result again. Attributes the crate does not interpret are carried through as opaque bytes,
//! so a parse/serialize cycle of an untouched class reproduces its input exactly.
//!
//! # Key Components
//!
//! - [`ClassFile`] - Parsed class with fields, methods and attributes
//! - [`constpool::ConstantPool`] - Indexable, append-only constant pool
//! - [`descriptor`] - Field and method descriptors
//! - [`signature`] - Generic class signatures
//! - [`decoder`] / [`encoder`] - Bytecode to label-based instructions and back
//! - [`code::CodeAttribute`] / [`stackmap`] - Method code and its verification frames
//!
//! # Examples
//!
//! ```rust,no_run
//! use classweave::classfile::ClassFile;
//!
//! let bytes = std::fs::read("Example.class")?;
//! let class = ClassFile::parse(&bytes)?;
//! println!("{} extends {:?}", class.name()?, class.super_name()?);
//! assert_eq!(class.to_bytes()?, bytes);
//! # Ok::<(), classweave::Error>(())
//! ```

use bitflags::bitflags;

use crate::{
    classfile::{
        code::CodeAttribute, constpool::ConstantPool, descriptor::MethodDescriptor,
        signature::ClassSignature,
    },
    file::{io::put_be, parser::Parser},
    Error, Result,
};

pub mod code;
pub mod constpool;
pub mod decoder;
pub mod descriptor;
pub mod encoder;
pub mod instruction;
pub mod mutf8;
pub mod opcodes;
pub mod signature;
pub mod stackmap;

/// Class-file magic number.
pub const MAGIC: u32 = 0xCAFE_BABE;

/// Highest class-file major version this codec accepts (Java 25).
pub const MAX_MAJOR_VERSION: u16 = 69;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Access and property flags of classes, fields and methods.
    ///
    /// Several bits are shared between contexts (`SYNCHRONIZED` on a method is `SUPER` on a
    /// class); only the method and class meanings used by this crate are named.
    pub struct AccessFlags: u16 {
        /// Declared public
        const PUBLIC = 0x0001;
        /// Declared private
        const PRIVATE = 0x0002;
        /// Declared protected
        const PROTECTED = 0x0004;
        /// Declared static
        const STATIC = 0x0008;
        /// Declared final
        const FINAL = 0x0010;
        /// Method is synchronized; on classes, `ACC_SUPER`
        const SYNCHRONIZED = 0x0020;
        /// Bridge method generated by the compiler
        const BRIDGE = 0x0040;
        /// Variable arity method
        const VARARGS = 0x0080;
        /// Implemented natively
        const NATIVE = 0x0100;
        /// Class is an interface
        const INTERFACE = 0x0200;
        /// No implementation provided
        const ABSTRACT = 0x0400;
        /// Strict floating point
        const STRICT = 0x0800;
        /// Not present in source
        const SYNTHETIC = 0x1000;
        /// Class is an annotation interface
        const ANNOTATION = 0x2000;
        /// Enum class or constant
        const ENUM = 0x4000;
    }
}

/// An attribute kept as its name index and raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Constant pool index of the attribute name
    pub name_index: u16,
    /// Raw payload
    pub data: Vec<u8>,
}

pub(crate) fn read_attributes(parser: &mut Parser) -> Result<Vec<Attribute>> {
    let count = parser.read_be::<u16>()?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name_index = parser.read_be::<u16>()?;
        let length = parser.read_be::<u32>()? as usize;
        let data = parser.read_bytes(length)?.to_vec();
        attributes.push(Attribute { name_index, data });
    }
    Ok(attributes)
}

pub(crate) fn write_attributes(out: &mut Vec<u8>, attributes: &[Attribute]) -> Result<()> {
    put_be(
        out,
        u16::try_from(attributes.len()).map_err(|_| rewrite_error!("Too many attributes"))?,
    );
    for attribute in attributes {
        put_be(out, attribute.name_index);
        put_be(
            out,
            u32::try_from(attribute.data.len())
                .map_err(|_| rewrite_error!("Attribute payload too large"))?,
        );
        out.extend_from_slice(&attribute.data);
    }
    Ok(())
}

/// A field or method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    /// Access flags
    pub access_flags: AccessFlags,
    /// Constant pool index of the name
    pub name_index: u16,
    /// Constant pool index of the descriptor
    pub descriptor_index: u16,
    /// Member attributes (`Code`, `Signature`, ...)
    pub attributes: Vec<Attribute>,
}

impl MemberInfo {
    fn read(parser: &mut Parser) -> Result<Self> {
        Ok(MemberInfo {
            access_flags: AccessFlags::from_bits_retain(parser.read_be::<u16>()?),
            name_index: parser.read_be::<u16>()?,
            descriptor_index: parser.read_be::<u16>()?,
            attributes: read_attributes(parser)?,
        })
    }

    fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        put_be(out, self.access_flags.bits());
        put_be(out, self.name_index);
        put_be(out, self.descriptor_index);
        write_attributes(out, &self.attributes)
    }

    /// Whether the member is static.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.access_flags.contains(AccessFlags::STATIC)
    }
}

/// A parsed class file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassFile {
    /// Minor version
    pub minor_version: u16,
    /// Major version
    pub major_version: u16,
    /// The constant pool
    pub constant_pool: ConstantPool,
    /// Class access flags
    pub access_flags: AccessFlags,
    /// Constant pool index of this class
    pub this_class: u16,
    /// Constant pool index of the superclass, 0 for `java/lang/Object`
    pub super_class: u16,
    /// Constant pool indexes of the implemented interfaces
    pub interfaces: Vec<u16>,
    /// Declared fields
    pub fields: Vec<MemberInfo>,
    /// Declared methods
    pub methods: Vec<MemberInfo>,
    /// Class attributes
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    /// Create an empty public class extending `super_name`, targeting Java 8.
    ///
    /// # Errors
    /// Returns [`Error::RewriteFailed`] if the constant pool overflows (never for sane names).
    pub fn new(name: &str, super_name: Option<&str>) -> Result<Self> {
        let mut constant_pool = ConstantPool::new();
        let this_class = constant_pool.intern_class(name)?;
        let super_class = match super_name {
            Some(super_name) => constant_pool.intern_class(super_name)?,
            None => 0,
        };

        Ok(ClassFile {
            minor_version: 0,
            major_version: 52,
            constant_pool,
            access_flags: AccessFlags::PUBLIC | AccessFlags::SYNCHRONIZED,
            this_class,
            super_class,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        })
    }

    /// Parse a complete class file.
    ///
    /// # Errors
    /// - [`Error::Empty`] for empty input
    /// - [`Error::NotSupported`] if the magic number is wrong or the version is too new
    /// - [`Error::OutOfBounds`] for truncated input
    /// - [`Error::Malformed`] for structural errors or trailing bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::Empty);
        }

        let mut parser = Parser::new(data);
        if parser.read_be::<u32>()? != MAGIC {
            return Err(Error::NotSupported);
        }

        let minor_version = parser.read_be::<u16>()?;
        let major_version = parser.read_be::<u16>()?;
        if major_version > MAX_MAJOR_VERSION {
            return Err(Error::NotSupported);
        }

        let constant_pool = ConstantPool::parse(&mut parser)?;
        let access_flags = AccessFlags::from_bits_retain(parser.read_be::<u16>()?);
        let this_class = parser.read_be::<u16>()?;
        let super_class = parser.read_be::<u16>()?;

        let interface_count = parser.read_be::<u16>()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(parser.read_be::<u16>()?);
        }

        let field_count = parser.read_be::<u16>()?;
        let mut fields = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            fields.push(MemberInfo::read(&mut parser)?);
        }

        let method_count = parser.read_be::<u16>()?;
        let mut methods = Vec::with_capacity(method_count as usize);
        for _ in 0..method_count {
            methods.push(MemberInfo::read(&mut parser)?);
        }

        let attributes = read_attributes(&mut parser)?;
        if parser.has_more_data() {
            return Err(malformed_error!(
                "{} trailing bytes after class file",
                parser.remaining()
            ));
        }

        let class = ClassFile {
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        };
        class.name()?;

        Ok(class)
    }

    /// Serialize the class file.
    ///
    /// # Errors
    /// Returns [`Error::RewriteFailed`] if a table outgrew its length field.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        put_be(&mut out, MAGIC);
        put_be(&mut out, self.minor_version);
        put_be(&mut out, self.major_version);
        self.constant_pool.write(&mut out)?;
        put_be(&mut out, self.access_flags.bits());
        put_be(&mut out, self.this_class);
        put_be(&mut out, self.super_class);

        put_be(
            &mut out,
            u16::try_from(self.interfaces.len())
                .map_err(|_| rewrite_error!("Too many interfaces"))?,
        );
        for interface in &self.interfaces {
            put_be(&mut out, *interface);
        }

        put_be(
            &mut out,
            u16::try_from(self.fields.len()).map_err(|_| rewrite_error!("Too many fields"))?,
        );
        for field in &self.fields {
            field.write(&mut out)?;
        }

        put_be(
            &mut out,
            u16::try_from(self.methods.len()).map_err(|_| rewrite_error!("Too many methods"))?,
        );
        for method in &self.methods {
            method.write(&mut out)?;
        }

        write_attributes(&mut out, &self.attributes)?;
        Ok(out)
    }

    /// Internal name of this class.
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] if `this_class` does not point at a class constant.
    pub fn name(&self) -> Result<&str> {
        self.constant_pool.get_class_name(self.this_class)
    }

    /// Internal name of the superclass, `None` for `java/lang/Object` and module descriptors.
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] if `super_class` does not point at a class constant.
    pub fn super_name(&self) -> Result<Option<&str>> {
        if self.super_class == 0 {
            return Ok(None);
        }
        self.constant_pool.get_class_name(self.super_class).map(Some)
    }

    /// Name of an attribute.
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] if the name index is not a UTF-8 constant.
    pub fn attribute_name(&self, attribute: &Attribute) -> Result<&str> {
        self.constant_pool.get_utf8(attribute.name_index)
    }

    /// Position of the first attribute in `attributes` called `name`.
    #[must_use]
    pub fn find_attribute(&self, attributes: &[Attribute], name: &str) -> Option<usize> {
        attributes
            .iter()
            .position(|attribute| self.attribute_name(attribute).is_ok_and(|n| n == name))
    }

    /// The class's generic signature, if it has one.
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] or [`Error::InvalidDescriptor`] if the attribute is damaged.
    pub fn signature(&self) -> Result<Option<ClassSignature>> {
        let Some(position) = self.find_attribute(&self.attributes, "Signature") else {
            return Ok(None);
        };
        let data = &self.attributes[position].data;
        let mut parser = Parser::new(data);
        let index = parser.read_be::<u16>()?;
        ClassSignature::parse(self.constant_pool.get_utf8(index)?).map(Some)
    }

    /// Set (or replace) the class's generic signature.
    ///
    /// # Errors
    /// Returns [`Error::RewriteFailed`] if the constant pool is full.
    pub fn set_signature(&mut self, signature: &str) -> Result<()> {
        let value = self.constant_pool.intern_utf8(signature)?;
        let attribute = Attribute {
            name_index: self.constant_pool.intern_utf8("Signature")?,
            data: value.to_be_bytes().to_vec(),
        };
        match self.find_attribute(&self.attributes, "Signature") {
            Some(position) => self.attributes[position] = attribute,
            None => self.attributes.push(attribute),
        }
        Ok(())
    }

    /// Name and descriptor of a method.
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] if the indexes are not UTF-8 constants.
    pub fn method_name_and_descriptor(&self, method: &MemberInfo) -> Result<(&str, &str)> {
        Ok((
            self.constant_pool.get_utf8(method.name_index)?,
            self.constant_pool.get_utf8(method.descriptor_index)?,
        ))
    }

    /// Indexes of all methods called `name`, optionally restricted to one descriptor.
    #[must_use]
    pub fn find_methods(&self, name: &str, descriptor: Option<&str>) -> Vec<usize> {
        self.methods
            .iter()
            .enumerate()
            .filter(|(_, method)| {
                self.method_name_and_descriptor(method)
                    .is_ok_and(|(n, d)| n == name && descriptor.map_or(true, |want| want == d))
            })
            .map(|(index, _)| index)
            .collect()
    }

    /// Decoded `Code` attribute of method `index`, `None` for abstract and native methods.
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] if the attribute is damaged.
    pub fn method_code(&self, index: usize) -> Result<Option<CodeAttribute>> {
        let method = self
            .methods
            .get(index)
            .ok_or_else(|| malformed_error!("No method at index {}", index))?;
        match self.find_attribute(&method.attributes, "Code") {
            Some(position) => CodeAttribute::parse(&method.attributes[position].data).map(Some),
            None => Ok(None),
        }
    }

    /// Store `code` as the `Code` attribute of method `index`, adding it if missing.
    ///
    /// # Errors
    /// Returns [`Error::RewriteFailed`] if serialization fails or the pool is full.
    pub fn set_method_code(&mut self, index: usize, code: &CodeAttribute) -> Result<()> {
        let data = code.to_bytes()?;
        let name_index = self.constant_pool.intern_utf8("Code")?;
        let position = {
            let method = self
                .methods
                .get(index)
                .ok_or_else(|| rewrite_error!("No method at index {}", index))?;
            self.find_attribute(&method.attributes, "Code")
        };

        let method = &mut self.methods[index];
        match position {
            Some(position) => method.attributes[position].data = data,
            None => method.attributes.push(Attribute { name_index, data }),
        }
        Ok(())
    }

    /// Remove every attribute called `name` from method `index`.
    pub fn remove_method_attribute(&mut self, index: usize, name: &str) {
        let pool = &self.constant_pool;
        if let Some(method) = self.methods.get_mut(index) {
            method
                .attributes
                .retain(|attribute| !pool.get_utf8(attribute.name_index).is_ok_and(|n| n == name));
        }
    }

    /// Append a method, with a body if `code` is given.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDescriptor`] for an invalid descriptor and
    /// [`Error::RewriteFailed`] if the pool is full.
    pub fn add_method(
        &mut self,
        access_flags: AccessFlags,
        name: &str,
        descriptor: &str,
        code: Option<&CodeAttribute>,
    ) -> Result<usize> {
        MethodDescriptor::parse(descriptor)?;
        let method = MemberInfo {
            access_flags,
            name_index: self.constant_pool.intern_utf8(name)?,
            descriptor_index: self.constant_pool.intern_utf8(descriptor)?,
            attributes: Vec::new(),
        };
        self.methods.push(method);
        let index = self.methods.len() - 1;
        if let Some(code) = code {
            self.set_method_code(index, code)?;
        }
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ClassFile {
        let mut class = ClassFile::new("demo/Sample", Some("java/lang/Object")).unwrap();
        let code = CodeAttribute {
            max_stack: 1,
            max_locals: 1,
            code: vec![opcodes::ICONST_1, opcodes::IRETURN],
            exception_table: Vec::new(),
            attributes: Vec::new(),
        };
        class
            .add_method(AccessFlags::PUBLIC | AccessFlags::STATIC, "one", "()I", Some(&code))
            .unwrap();
        class
            .add_method(
                AccessFlags::PUBLIC | AccessFlags::NATIVE,
                "peer",
                "(J)V",
                None,
            )
            .unwrap();
        class
    }

    #[test]
    fn build_serialize_parse() {
        let class = sample();
        let bytes = class.to_bytes().unwrap();
        let parsed = ClassFile::parse(&bytes).unwrap();
        assert_eq!(parsed, class);
        assert_eq!(parsed.name().unwrap(), "demo/Sample");
        assert_eq!(parsed.super_name().unwrap(), Some("java/lang/Object"));
        assert_eq!(parsed.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn method_lookup_and_code() {
        let class = sample();
        assert_eq!(class.find_methods("one", None), vec![0]);
        assert_eq!(class.find_methods("one", Some("()J")), Vec::<usize>::new());
        assert_eq!(class.find_methods("peer", Some("(J)V")), vec![1]);
        assert_eq!(class.method_code(0).unwrap().unwrap().code, [0x04, 0xAC]);
        assert!(class.method_code(1).unwrap().is_none());
    }

    #[test]
    fn signature_attribute() {
        let mut class = sample();
        assert!(class.signature().unwrap().is_none());
        class
            .set_signature("Ljava/util/ArrayList<Ljava/lang/String;>;")
            .unwrap();
        class.set_signature("Ljava/util/ArrayList<Ljava/lang/Integer;>;").unwrap();
        assert_eq!(class.attributes.len(), 1);
        let signature = class.signature().unwrap().unwrap();
        assert_eq!(
            signature.superclass.arguments[0].concrete_class(),
            Some("java/lang/Integer")
        );
    }

    #[test]
    fn remove_attribute() {
        let mut class = sample();
        class.remove_method_attribute(0, "Code");
        assert!(class.method_code(0).unwrap().is_none());
    }

    #[test]
    fn reject_non_class_input() {
        assert!(matches!(ClassFile::parse(&[]), Err(Error::Empty)));
        assert!(matches!(
            ClassFile::parse(b"PK\x03\x04...."),
            Err(Error::NotSupported)
        ));
        assert!(matches!(
            ClassFile::parse(&[0xCA, 0xFE, 0xBA, 0xBE, 0, 0]),
            Err(Error::OutOfBounds { .. })
        ));

        let mut bytes = sample().to_bytes().unwrap();
        bytes.push(0);
        assert!(matches!(
            ClassFile::parse(&bytes),
            Err(Error::Malformed { .. })
        ));
    }
}
