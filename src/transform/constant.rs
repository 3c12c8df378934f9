//! Constant-return body replacement.

use log::info;

use crate::{
    classfile::ClassFile,
    matcher::TargetMatcher,
    pipeline::Entry,
    rewriter::{replace_methods, ConstantValue, ModuleRewriter},
    transform::{Transform, TransformOutcome},
    Result,
};

/// Replace every method `class.method[descriptor]` by `return value`.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodPatch {
    /// Internal name of the declaring class
    pub class: String,
    /// Method name
    pub method: String,
    /// Restrict to one overload; `None` patches all of them
    pub descriptor: Option<String>,
    /// The value the new body returns
    pub value: ConstantValue,
}

impl MethodPatch {
    /// Patch all overloads of `class.method`.
    pub fn new(class: impl Into<String>, method: impl Into<String>, value: ConstantValue) -> Self {
        MethodPatch {
            class: class.into(),
            method: method.into(),
            descriptor: None,
            value,
        }
    }

    /// Patch only the overload with `descriptor`.
    #[must_use]
    pub fn with_descriptor(mut self, descriptor: impl Into<String>) -> Self {
        self.descriptor = Some(descriptor.into());
        self
    }
}

/// Transformer installing constant-return bodies.
pub struct ConstantReturnPatch {
    name: String,
    matcher: TargetMatcher,
    patches: Vec<MethodPatch>,
}

impl ConstantReturnPatch {
    /// A transformer applying `patches` to entries selected by `matcher`.
    pub fn new(name: impl Into<String>, matcher: TargetMatcher, patches: Vec<MethodPatch>) -> Self {
        ConstantReturnPatch {
            name: name.into(),
            matcher,
            patches,
        }
    }

    /// The configured patches.
    #[must_use]
    pub fn patches(&self) -> &[MethodPatch] {
        &self.patches
    }

    fn apply(&self, class: &mut ClassFile) -> Result<()> {
        let class_name = class.name()?.to_string();
        for patch in self.patches.iter().filter(|patch| patch.class == class_name) {
            let count = replace_methods(
                class,
                &patch.method,
                patch.descriptor.as_deref(),
                &patch.value,
            )?;
            if count > 0 {
                info!(
                    "Patching {}.{} to return {}",
                    class_name, patch.method, patch.value
                );
            }
        }
        Ok(())
    }
}

impl Transform for ConstantReturnPatch {
    fn name(&self) -> &str {
        &self.name
    }

    fn matcher(&self) -> &TargetMatcher {
        &self.matcher
    }

    fn transform(&self, entry: &Entry) -> TransformOutcome {
        ModuleRewriter::rewrite(&entry.name, &entry.data, |class| self.apply(class)).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classfile::opcodes,
        matcher::{ArtifactPredicate, EntryPredicate},
        test::ClassBuilder,
    };

    fn patch() -> ConstantReturnPatch {
        ConstantReturnPatch::new(
            "session",
            TargetMatcher::new(
                ArtifactPredicate::Any,
                EntryPredicate::classes([ClassBuilder::SESSION_SERVICE]),
            ),
            vec![
                MethodPatch::new(ClassBuilder::SESSION_SERVICE, "joinServer", ConstantValue::Void),
                MethodPatch::new("other/Class", "getKeyPair", ConstantValue::Null),
            ],
        )
    }

    #[test]
    fn patches_only_the_named_class() {
        let data = ClassBuilder::session_service().to_bytes().unwrap();
        let entry = Entry::new(format!("{}.class", ClassBuilder::SESSION_SERVICE), data);

        let TransformOutcome::Rewritten(bytes) = patch().transform(&entry) else {
            panic!("expected a rewrite");
        };
        let class = ClassFile::parse(&bytes).unwrap();
        let join = class.find_methods("joinServer", None)[0];
        assert_eq!(class.method_code(join).unwrap().unwrap().code, [opcodes::RETURN]);

        let key_pair = class.find_methods("getKeyPair", None)[0];
        assert!(class.method_code(key_pair).unwrap().is_none());
    }

    #[test]
    fn descriptor_restricts_overloads() {
        let data = ClassBuilder::session_service().to_bytes().unwrap();
        let entry = Entry::new("Service.class", data);
        let transformer = ConstantReturnPatch::new(
            "session",
            TargetMatcher::any(),
            vec![MethodPatch::new(ClassBuilder::SESSION_SERVICE, "joinServer", ConstantValue::Void)
                .with_descriptor("()V")],
        );
        assert!(matches!(transformer.transform(&entry), TransformOutcome::Unchanged));
    }

    #[test]
    fn garbage_fails_without_panicking() {
        let entry = Entry::new("Broken.class", b"not a class".to_vec());
        assert!(matches!(patch().transform(&entry), TransformOutcome::Failed(_)));
    }
}
