//! Call-site redirection injection.
//!
//! Every `invokevirtual`, `invokeinterface` or `invokestatic` whose signature key is a target is
//! replaced by a call to a static dispatcher with the descriptor [`DISPATCH_DESCRIPTOR`]:
//!
//! ```text
//! <xstore scratch+k> ...                 spill the arguments, last first
//! aconst_null                            (static calls only; otherwise the receiver stays)
//! ldc "L<owner>;<name><descriptor>"      the signature key
//! ldc <ReturnType> | getstatic X.TYPE    the declared return type
//!   (ldc "a.b.C"; Class.forName before 49.0)
//! <n>; anewarray java/lang/Object        the packed arguments
//!   dup; <i>; <xload scratch+k>; [box]; aastore
//! invokestatic <dispatcher>
//! pop | checkcast T | checkcast W; invokevirtual W.xValue()
//! ```
//!
//! Scratch locals start at the method's previous `max_locals`, so they are invisible to every
//! stack map frame and local variable entry of the original code.

use std::collections::BTreeSet;

use crate::{
    classfile::{
        constpool::ConstantPool,
        descriptor::{FieldType, MethodDescriptor, ReturnType},
        instruction::{Instruction, Node},
        opcodes, ClassFile,
    },
    rewriter::{
        body::MethodBody,
        constant::{load_opcode, push_int, store_opcode},
    },
    runtime::SignatureKey,
    Result,
};

/// Descriptor of the dispatch routine: `(receiver, key, returnType, args) -> value`.
pub const DISPATCH_DESCRIPTOR: &str =
    "(Ljava/lang/Object;Ljava/lang/String;Ljava/lang/Class;[Ljava/lang/Object;)Ljava/lang/Object;";

/// Extra operand stack the injected sequence needs above the spilled call site.
pub const STACK_HEADROOM: u16 = 8;

/// First class file major version whose `ldc` accepts a class constant.
pub const CLASS_LITERAL_VERSION: u16 = 49;

/// The static method rewritten call sites invoke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchTarget {
    /// Internal name of the class declaring the dispatcher
    pub owner: String,
    /// Method name
    pub name: String,
}

impl DispatchTarget {
    /// A dispatcher at `owner.name`.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        DispatchTarget {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

fn push_return_class(
    ret: &ReturnType,
    major_version: u16,
    pool: &mut ConstantPool,
    sequence: &mut Vec<Instruction>,
) -> Result<()> {
    let owner = match ret {
        ReturnType::Void => "java/lang/Void",
        ReturnType::Value(field) => match field.wrapper() {
            Some((wrapper, _)) => wrapper,
            None => {
                let name = field
                    .class_constant_name()
                    .ok_or_else(|| rewrite_error!("No class constant for {}", field))?;
                if major_version >= CLASS_LITERAL_VERSION {
                    sequence.push(Instruction::constant(opcodes::LDC, pool.intern_class(&name)?));
                } else {
                    // Class.forName takes binary names, arrays in descriptor form
                    sequence.push(Instruction::constant(
                        opcodes::LDC,
                        pool.intern_string(&name.replace('/', "."))?,
                    ));
                    sequence.push(Instruction::constant(
                        opcodes::INVOKESTATIC,
                        pool.intern_method_ref(
                            "java/lang/Class",
                            "forName",
                            "(Ljava/lang/String;)Ljava/lang/Class;",
                        )?,
                    ));
                }
                return Ok(());
            }
        },
    };
    sequence.push(Instruction::constant(
        opcodes::GETSTATIC,
        pool.intern_field_ref(owner, "TYPE", "Ljava/lang/Class;")?,
    ));
    Ok(())
}

/// The instruction sequence replacing one redirected call.
///
/// `scratch` is the first free local slot and `major_version` the version of the class being
/// rewritten. Returns the sequence and the number of scratch slots it uses.
///
/// # Errors
/// Returns [`crate::Error::RewriteFailed`] if the constant pool is full.
pub fn redirect_sequence(
    key: &SignatureKey,
    descriptor: &MethodDescriptor,
    is_static: bool,
    scratch: u16,
    major_version: u16,
    dispatcher: &DispatchTarget,
    pool: &mut ConstantPool,
) -> Result<(Vec<Instruction>, u16)> {
    let mut slots = Vec::with_capacity(descriptor.params.len());
    let mut next = scratch;
    for param in &descriptor.params {
        slots.push(next);
        next = next
            .checked_add(param.slot_size())
            .ok_or_else(|| rewrite_error!("Scratch locals exceed the local variable limit"))?;
    }

    let mut sequence = Vec::new();
    for (param, slot) in descriptor.params.iter().zip(&slots).rev() {
        sequence.push(Instruction::local(store_opcode(param), *slot));
    }
    if is_static {
        sequence.push(Instruction::simple(opcodes::ACONST_NULL));
    }

    sequence.push(Instruction::constant(
        opcodes::LDC,
        pool.intern_string(key.as_str())?,
    ));
    push_return_class(&descriptor.ret, major_version, pool, &mut sequence)?;

    let count = i32::try_from(descriptor.params.len())
        .map_err(|_| rewrite_error!("Too many parameters"))?;
    sequence.push(push_int(count, pool)?);
    sequence.push(Instruction::constant(
        opcodes::ANEWARRAY,
        pool.intern_class("java/lang/Object")?,
    ));
    for (position, (param, slot)) in descriptor.params.iter().zip(&slots).enumerate() {
        sequence.push(Instruction::simple(opcodes::DUP));
        sequence.push(push_int(position as i32, pool)?);
        sequence.push(Instruction::local(load_opcode(param), *slot));
        if let Some((wrapper, _)) = param.wrapper() {
            let boxing = format!("({param})L{wrapper};");
            sequence.push(Instruction::constant(
                opcodes::INVOKESTATIC,
                pool.intern_method_ref(wrapper, "valueOf", &boxing)?,
            ));
        }
        sequence.push(Instruction::simple(opcodes::AASTORE));
    }

    sequence.push(Instruction::constant(
        opcodes::INVOKESTATIC,
        pool.intern_method_ref(&dispatcher.owner, &dispatcher.name, DISPATCH_DESCRIPTOR)?,
    ));

    match &descriptor.ret {
        ReturnType::Void => sequence.push(Instruction::simple(opcodes::POP)),
        ReturnType::Value(field) => adapt_result(field, pool, &mut sequence)?,
    }

    Ok((sequence, next - scratch))
}

fn adapt_result(
    field: &FieldType,
    pool: &mut ConstantPool,
    sequence: &mut Vec<Instruction>,
) -> Result<()> {
    match field.wrapper() {
        Some((wrapper, unbox)) => {
            sequence.push(Instruction::constant(
                opcodes::CHECKCAST,
                pool.intern_class(wrapper)?,
            ));
            sequence.push(Instruction::constant(
                opcodes::INVOKEVIRTUAL,
                pool.intern_method_ref(wrapper, unbox, &format!("(){field}"))?,
            ));
        }
        None => {
            let name = field
                .class_constant_name()
                .ok_or_else(|| rewrite_error!("No class constant for {}", field))?;
            sequence.push(Instruction::constant(
                opcodes::CHECKCAST,
                pool.intern_class(&name)?,
            ));
        }
    }
    Ok(())
}

/// Redirect every matching call site in every method of `class`.
///
/// Returns the number of call sites replaced. Methods without matches are left byte-for-byte
/// untouched.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if a method body cannot be decoded and
/// [`crate::Error::RewriteFailed`] if a redirected body cannot be encoded again.
pub fn inject_redirects(
    class: &mut ClassFile,
    targets: &BTreeSet<SignatureKey>,
    dispatcher: &DispatchTarget,
) -> Result<usize> {
    let mut total = 0;
    for index in 0..class.methods.len() {
        let Some(code) = class.method_code(index)? else {
            continue;
        };

        let mut body = MethodBody::decode(&class.constant_pool, &code)?;
        let scratch = body.max_locals;
        let mut scratch_used = 0_u16;
        let mut replaced = 0;
        let mut nodes = Vec::with_capacity(body.nodes.len());

        for node in std::mem::take(&mut body.nodes) {
            let Node::Insn(instruction) = &node else {
                nodes.push(node);
                continue;
            };
            let Some(method_index) = instruction.invoked_method() else {
                nodes.push(node);
                continue;
            };
            if instruction.opcode == opcodes::INVOKESPECIAL {
                nodes.push(node);
                continue;
            }

            let member = class.constant_pool.get_member_ref(method_index)?;
            let key = SignatureKey::new(member.owner, member.name, member.descriptor);
            if !targets.contains(&key) {
                nodes.push(node);
                continue;
            }

            let descriptor = MethodDescriptor::parse(member.descriptor)?;
            let is_static = instruction.opcode == opcodes::INVOKESTATIC;
            let (sequence, used) = redirect_sequence(
                &key,
                &descriptor,
                is_static,
                scratch,
                class.major_version,
                dispatcher,
                &mut class.constant_pool,
            )?;
            scratch_used = scratch_used.max(used);
            nodes.extend(sequence.into_iter().map(Node::Insn));
            replaced += 1;
        }

        if replaced == 0 {
            continue;
        }

        body.nodes = nodes;
        body.max_stack = body.max_stack.saturating_add(STACK_HEADROOM);
        body.max_locals = scratch
            .checked_add(scratch_used)
            .ok_or_else(|| rewrite_error!("Scratch locals exceed the local variable limit"))?;

        let code = body.encode(&mut class.constant_pool)?;
        class.set_method_code(index, &code)?;
        total += replaced;
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classfile::{code::CodeAttribute, constpool::Constant, instruction::Operand, AccessFlags},
        test::{ClassBuilder, GET_NUMBER_OF_FONTS_KEY},
    };

    const DISPATCHER: (&str, &str) = ("demo/Dispatch", "dispatch");

    fn dispatcher() -> DispatchTarget {
        DispatchTarget::new(DISPATCHER.0, DISPATCHER.1)
    }

    fn targets() -> BTreeSet<SignatureKey> {
        BTreeSet::from([SignatureKey::from(GET_NUMBER_OF_FONTS_KEY)])
    }

    #[test]
    fn sequence_for_static_int_call() {
        let mut pool = ConstantPool::new();
        let descriptor = MethodDescriptor::parse("(Ljava/nio/ByteBuffer;)I").unwrap();
        let key = SignatureKey::from(GET_NUMBER_OF_FONTS_KEY);
        let (sequence, used) =
            redirect_sequence(&key, &descriptor, true, 2, 52, &dispatcher(), &mut pool).unwrap();

        assert_eq!(used, 1);
        let opcodes: Vec<u8> = sequence.iter().map(|insn| insn.opcode).collect();
        assert_eq!(
            opcodes,
            [
                opcodes::ASTORE,
                opcodes::ACONST_NULL,
                opcodes::LDC,
                opcodes::GETSTATIC,
                opcodes::ICONST_1,
                opcodes::ANEWARRAY,
                opcodes::DUP,
                opcodes::ICONST_0,
                opcodes::ALOAD,
                opcodes::AASTORE,
                opcodes::INVOKESTATIC,
                opcodes::CHECKCAST,
                opcodes::INVOKEVIRTUAL,
            ]
        );
        assert_eq!(sequence[0].operand, Operand::Local(2));

        let Operand::Constant(unbox) = sequence[12].operand else {
            panic!("expected constant operand");
        };
        let member = pool.get_member_ref(unbox).unwrap();
        assert_eq!(
            (member.owner, member.name, member.descriptor),
            ("java/lang/Integer", "intValue", "()I")
        );
    }

    #[test]
    fn sequence_boxes_wide_primitives_for_instance_calls() {
        let mut pool = ConstantPool::new();
        let descriptor = MethodDescriptor::parse("(JLjava/lang/String;D)V").unwrap();
        let key = SignatureKey::new("a/B", "run", "(JLjava/lang/String;D)V");
        let (sequence, used) =
            redirect_sequence(&key, &descriptor, false, 3, 52, &dispatcher(), &mut pool).unwrap();

        assert_eq!(used, 5);
        // Spilled last argument first, into its own slot
        assert_eq!(sequence[0], Instruction::local(opcodes::DSTORE, 6));
        assert_eq!(sequence[1], Instruction::local(opcodes::ASTORE, 5));
        assert_eq!(sequence[2], Instruction::local(opcodes::LSTORE, 3));
        // The receiver stays on the stack: no aconst_null
        assert_eq!(sequence[3].opcode, opcodes::LDC);
        assert_eq!(sequence.last().unwrap().opcode, opcodes::POP);

        let boxes = sequence
            .iter()
            .filter(|insn| insn.opcode == opcodes::INVOKESTATIC)
            .count();
        // Long.valueOf, Double.valueOf and the dispatcher
        assert_eq!(boxes, 3);
    }

    #[test]
    fn inject_rewrites_matching_sites_only() {
        let mut class = ClassBuilder::render_fixture();
        let index = class.find_methods("render", None)[0];
        let other = class.find_methods("fontCount", None)[0];
        let before = class.method_code(other).unwrap().unwrap();
        let original = class.method_code(index).unwrap().unwrap();

        let count = inject_redirects(&mut class, &targets(), &dispatcher()).unwrap();
        assert_eq!(count, 1);

        let rewritten: CodeAttribute = class.method_code(index).unwrap().unwrap();
        assert_eq!(rewritten.max_stack, original.max_stack + STACK_HEADROOM);
        assert_eq!(rewritten.max_locals, original.max_locals + 1);
        assert!(rewritten.code.len() > original.code.len());
        // Handler entry moved with its instruction
        assert!(rewritten.exception_table[0].handler_pc > original.exception_table[0].handler_pc);
        assert_eq!(class.method_code(other).unwrap().unwrap(), before);

        let reparsed = ClassFile::parse(&class.to_bytes().unwrap()).unwrap();
        let body = MethodBody::decode(&reparsed.constant_pool, &rewritten).unwrap();
        let dispatches = body
            .instructions()
            .filter_map(Instruction::invoked_method)
            .filter_map(|idx| reparsed.constant_pool.get_member_ref(idx).ok())
            .filter(|member| member.owner == DISPATCHER.0)
            .count();
        assert_eq!(dispatches, 1);
    }

    #[test]
    fn inject_is_idempotent() {
        let mut class = ClassBuilder::render_fixture();
        inject_redirects(&mut class, &targets(), &dispatcher()).unwrap();
        let once = class.to_bytes().unwrap();
        assert_eq!(
            inject_redirects(&mut class, &targets(), &dispatcher()).unwrap(),
            0
        );
        assert_eq!(class.to_bytes().unwrap(), once);
    }

    fn legacy_caller(major_version: u16) -> (ClassFile, BTreeSet<SignatureKey>) {
        let mut class = ClassFile::new("demo/Old", Some("java/lang/Object")).unwrap();
        class.major_version = major_version;
        let invoke = class
            .constant_pool
            .intern_method_ref("demo/Lib", "name", "()Ljava/lang/String;")
            .unwrap();
        let [hi, lo] = invoke.to_be_bytes();
        let code = CodeAttribute {
            max_stack: 1,
            max_locals: 0,
            code: vec![opcodes::INVOKESTATIC, hi, lo, opcodes::ARETURN],
            exception_table: Vec::new(),
            attributes: Vec::new(),
        };
        class
            .add_method(
                AccessFlags::PUBLIC | AccessFlags::STATIC,
                "label",
                "()Ljava/lang/String;",
                Some(&code),
            )
            .unwrap();
        let key = SignatureKey::new("demo/Lib", "name", "()Ljava/lang/String;");
        (class, BTreeSet::from([key]))
    }

    fn loaded_class_constants(class: &ClassFile) -> usize {
        let code = class.method_code(0).unwrap().unwrap();
        let body = MethodBody::decode(&class.constant_pool, &code).unwrap();
        body.instructions()
            .filter(|insn| matches!(insn.opcode, opcodes::LDC | opcodes::LDC_W))
            .filter_map(|insn| match insn.operand {
                Operand::Constant(index) => class.constant_pool.get(index).ok(),
                _ => None,
            })
            .filter(|constant| matches!(constant, Constant::Class(_)))
            .count()
    }

    #[test]
    fn pre_49_classes_resolve_return_type_by_name() {
        let (mut class, targets) = legacy_caller(48);
        assert_eq!(inject_redirects(&mut class, &targets, &dispatcher()).unwrap(), 1);

        let reparsed = ClassFile::parse(&class.to_bytes().unwrap()).unwrap();
        assert_eq!(reparsed.major_version, 48);
        assert_eq!(loaded_class_constants(&reparsed), 0);

        let code = reparsed.method_code(0).unwrap().unwrap();
        let body = MethodBody::decode(&reparsed.constant_pool, &code).unwrap();
        let invoked: Vec<_> = body
            .instructions()
            .filter_map(Instruction::invoked_method)
            .filter_map(|idx| reparsed.constant_pool.get_member_ref(idx).ok())
            .map(|member| (member.owner, member.name))
            .collect();
        assert_eq!(
            invoked,
            [("java/lang/Class", "forName"), (DISPATCHER.0, DISPATCHER.1)]
        );
    }

    #[test]
    fn class_literals_from_version_49() {
        let (mut class, targets) = legacy_caller(CLASS_LITERAL_VERSION);
        inject_redirects(&mut class, &targets, &dispatcher()).unwrap();
        assert_eq!(loaded_class_constants(&class), 1);
    }
}
