//! Structural module rewriting.
//!
//! The rewriter edits parsed class files through two primitives:
//!
//! - [`replace_body`] discards a method's code with every auxiliary table and installs a
//!   minimal `return` or constant-return body.
//! - [`redirect::inject_redirects`] replaces calls to target signatures with a call into the
//!   process-wide dispatcher.
//!
//! [`ModuleRewriter::rewrite`] wraps an edit with the containment contract: a module that fails
//! to parse, edit or serialize is reported as [`RewriteOutcome::Failed`] and its original bytes
//! stay in place; a module the edit leaves identical is [`RewriteOutcome::Unchanged`].

use log::{info, warn};

use crate::{
    classfile::{
        code::CodeAttribute, descriptor::MethodDescriptor, encoder::InstructionEncoder,
        instruction::{Instruction, Node}, AccessFlags, ClassFile,
    },
    Error, Result,
};

pub mod body;
pub mod constant;
pub mod redirect;

pub use body::MethodBody;
pub use constant::ConstantValue;
pub use redirect::{inject_redirects, DispatchTarget, DISPATCH_DESCRIPTOR};

/// Result of rewriting one module.
#[derive(Debug)]
pub enum RewriteOutcome {
    /// The module changed; these are its new bytes
    Rewritten(Vec<u8>),
    /// The edit produced the input again
    Unchanged,
    /// Parsing, editing or serializing failed; the module is left as it was
    Failed(Error),
}

/// Applies edits to serialized modules with per-module failure containment.
pub struct ModuleRewriter;

impl ModuleRewriter {
    /// Parse `data`, run `edit` on it and serialize the result.
    ///
    /// Failures are logged and returned as [`RewriteOutcome::Failed`]; they never panic and
    /// never affect other modules.
    pub fn rewrite<F>(name: &str, data: &[u8], edit: F) -> RewriteOutcome
    where
        F: FnOnce(&mut ClassFile) -> Result<()>,
    {
        match Self::try_rewrite(data, edit) {
            Ok(Some(bytes)) => {
                info!("Patched {name} ({} -> {} bytes)", data.len(), bytes.len());
                RewriteOutcome::Rewritten(bytes)
            }
            Ok(None) => RewriteOutcome::Unchanged,
            Err(error) => {
                warn!("Leaving {name} unpatched: {error}");
                RewriteOutcome::Failed(error)
            }
        }
    }

    fn try_rewrite<F>(data: &[u8], edit: F) -> Result<Option<Vec<u8>>>
    where
        F: FnOnce(&mut ClassFile) -> Result<()>,
    {
        let mut class = ClassFile::parse(data)?;
        edit(&mut class)?;
        let bytes = class.to_bytes()?;
        if bytes == data {
            return Ok(None);
        }
        Ok(Some(bytes))
    }
}

/// Replace the body of method `index` with `value; <typed return>`.
///
/// Exception ranges, line numbers, local variables, stack map and `MethodParameters` are
/// discarded. `max_stack` becomes the size of the pushed value, `max_locals` the size of the
/// arguments. A native method loses `ACC_NATIVE` and receives the body.
///
/// # Errors
/// Returns [`Error::RewriteFailed`] if the method is abstract or the value does not fit the
/// declared return type, and [`Error::InvalidDescriptor`] for a damaged descriptor.
pub fn replace_body(class: &mut ClassFile, index: usize, value: &ConstantValue) -> Result<()> {
    let method = class
        .methods
        .get(index)
        .ok_or_else(|| rewrite_error!("No method at index {}", index))?;
    let (name, descriptor) = class.method_name_and_descriptor(method)?;
    if method.access_flags.contains(AccessFlags::ABSTRACT) {
        return Err(rewrite_error!("Cannot install a body in abstract method {}", name));
    }

    let parsed = MethodDescriptor::parse(descriptor)?;
    if !value.fits(&parsed.ret) {
        return Err(rewrite_error!(
            "Constant {} does not fit return type {} of {}{}",
            value,
            parsed.ret,
            name,
            descriptor
        ));
    }
    let max_locals = u16::try_from(parsed.argument_slots(method.is_static()))
        .map_err(|_| rewrite_error!("Too many argument slots in {}", descriptor))?;

    let mut nodes: Vec<Node> = value
        .push_instructions(&mut class.constant_pool)?
        .into_iter()
        .map(Node::Insn)
        .collect();
    nodes.push(Node::Insn(Instruction::simple(constant::return_opcode(
        &parsed.ret,
    ))));
    let (code, _) = InstructionEncoder::encode(&nodes)?;

    let code = CodeAttribute {
        max_stack: value.slot_size(),
        max_locals,
        code,
        exception_table: Vec::new(),
        attributes: Vec::new(),
    };
    class.set_method_code(index, &code)?;
    class.remove_method_attribute(index, "MethodParameters");
    class.methods[index].access_flags.remove(AccessFlags::NATIVE);

    Ok(())
}

/// Replace the bodies of all methods called `name` (and matching `descriptor`, if given).
///
/// Returns how many methods were replaced.
///
/// # Errors
/// See [`replace_body`].
pub fn replace_methods(
    class: &mut ClassFile,
    name: &str,
    descriptor: Option<&str>,
    value: &ConstantValue,
) -> Result<usize> {
    let indexes = class.find_methods(name, descriptor);
    for index in &indexes {
        replace_body(class, *index, value)?;
    }
    Ok(indexes.len())
}
