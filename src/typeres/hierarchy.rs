//! Sources of generic ancestry.
//!
//! The resolver only needs one question answered per class: "what is your superclass, with
//! its type arguments?". [`ClassHierarchy`] answers it from parsed class files, for
//! hierarchies the engine only sees at load time; [`StaticBindings`] answers it from a table
//! written down ahead of time.

use std::collections::HashMap;

use log::debug;

use crate::{
    classfile::{
        signature::{ClassTypeSignature, TypeArgument, TypeSignature},
        ClassFile,
    },
    Result,
};

/// Superclass lookup with generic arguments.
pub trait TypeHierarchy: Send + Sync {
    /// The generic superclass of `class`, or `None` if the class is unknown or a root.
    ///
    /// A superclass declared without type arguments is reported as a raw
    /// [`ClassTypeSignature`].
    fn generic_superclass(&self, class: &str) -> Option<ClassTypeSignature>;
}

/// Ancestry collected from class files.
#[derive(Debug, Default, Clone)]
pub struct ClassHierarchy {
    supers: HashMap<String, ClassTypeSignature>,
}

impl ClassHierarchy {
    /// An empty hierarchy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the superclass of `class`.
    ///
    /// The generic signature wins over the raw superclass. A damaged signature is logged and
    /// the raw superclass is used instead.
    ///
    /// # Errors
    /// Returns an error if the class name or superclass cannot be read.
    pub fn add(&mut self, class: &ClassFile) -> Result<()> {
        let name = class.name()?.to_string();
        let Some(raw) = class.super_name()? else {
            return Ok(());
        };

        let superclass = match class.signature() {
            Ok(Some(signature)) => signature.superclass,
            Ok(None) => ClassTypeSignature::raw(raw),
            Err(error) => {
                debug!("Ignoring generic signature of {name}: {error}");
                ClassTypeSignature::raw(raw)
            }
        };
        self.supers.insert(name, superclass);
        Ok(())
    }

    /// Build a hierarchy from serialized class files, skipping those that fail to parse.
    pub fn from_modules<'a, I>(modules: I) -> Self
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut hierarchy = ClassHierarchy::new();
        for data in modules {
            let added = ClassFile::parse(data).and_then(|class| hierarchy.add(&class));
            if let Err(error) = added {
                debug!("Skipping module in hierarchy: {error}");
            }
        }
        hierarchy
    }

    /// Number of classes with a known superclass.
    #[must_use]
    pub fn len(&self) -> usize {
        self.supers.len()
    }

    /// Whether no class is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.supers.is_empty()
    }
}

impl TypeHierarchy for ClassHierarchy {
    fn generic_superclass(&self, class: &str) -> Option<ClassTypeSignature> {
        self.supers.get(class).cloned()
    }
}

/// A hand-written ancestry table.
///
/// ```rust
/// use classweave::typeres::{StaticBindings, TypeHierarchy};
///
/// let bindings = StaticBindings::new().bind(
///     "org/lwjgl/stb/STBTTPackRange$Buffer",
///     "org/lwjgl/system/StructBuffer",
///     "org/lwjgl/stb/STBTTPackRange",
/// );
/// let superclass = bindings
///     .generic_superclass("org/lwjgl/stb/STBTTPackRange$Buffer")
///     .unwrap();
/// assert_eq!(superclass.name, "org/lwjgl/system/StructBuffer");
/// ```
#[derive(Debug, Default, Clone)]
pub struct StaticBindings {
    supers: HashMap<String, ClassTypeSignature>,
}

impl StaticBindings {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `subtype extends base<argument, ...>`.
    #[must_use]
    pub fn bind(mut self, subtype: &str, base: &str, argument: &str) -> Self {
        let superclass = ClassTypeSignature {
            name: base.to_string(),
            arguments: vec![TypeArgument::Exact(TypeSignature::Class(
                ClassTypeSignature::raw(argument),
            ))],
        };
        self.supers.insert(subtype.to_string(), superclass);
        self
    }

    /// Declare `subtype extends superclass` without type arguments.
    #[must_use]
    pub fn extend(mut self, subtype: &str, superclass: &str) -> Self {
        self.supers
            .insert(subtype.to_string(), ClassTypeSignature::raw(superclass));
        self
    }
}

impl TypeHierarchy for StaticBindings {
    fn generic_superclass(&self, class: &str) -> Option<ClassTypeSignature> {
        self.supers.get(class).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::ClassBuilder;

    #[test]
    fn signature_wins_over_raw_super() {
        let buffer = ClassBuilder::struct_buffer_subclass(
            "org/lwjgl/stb/STBTTPackRange$Buffer",
            "org/lwjgl/stb/STBTTPackRange",
        );
        let plain = ClassFile::new("demo/Plain", Some("java/lang/Object")).unwrap();
        let data = [buffer.to_bytes().unwrap(), plain.to_bytes().unwrap()];

        let hierarchy = ClassHierarchy::from_modules(data.iter().map(Vec::as_slice));
        assert_eq!(hierarchy.len(), 2);

        let superclass = hierarchy
            .generic_superclass("org/lwjgl/stb/STBTTPackRange$Buffer")
            .unwrap();
        assert_eq!(superclass.name, "org/lwjgl/system/StructBuffer");
        assert_eq!(
            superclass.arguments[0].concrete_class(),
            Some("org/lwjgl/stb/STBTTPackRange")
        );
        assert_eq!(
            hierarchy.generic_superclass("demo/Plain"),
            Some(ClassTypeSignature::raw("java/lang/Object"))
        );
    }

    #[test]
    fn unparsable_modules_are_skipped() {
        let hierarchy = ClassHierarchy::from_modules([&b"nope"[..]]);
        assert!(hierarchy.is_empty());
    }
}
