//! Label-based instruction model.
//!
//! Decoded code is a flat list of [`Node`]s: instructions interleaved with [`Label`]s that
//! mark the positions other structures refer to (branch targets, exception ranges, line
//! numbers, local variable ranges, stack map frames). Branches point at labels rather than byte
//! offsets, so instructions can be inserted or replaced freely and every offset is re-derived
//! when the list is encoded again.

use std::collections::BTreeMap;

use crate::classfile::opcodes;

/// A position marker inside an instruction list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label(pub u32);

/// Decoded instruction operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// No operand
    None,
    /// `bipush` value
    Byte(i8),
    /// `sipush` value
    Short(i16),
    /// `newarray` element type code
    ArrayType(u8),
    /// Local variable index (loads, stores, `ret`)
    Local(u16),
    /// `iinc`
    Iinc {
        /// Local variable index
        index: u16,
        /// Signed increment
        delta: i16,
    },
    /// Constant pool index (`ldc` family, field and method instructions, type instructions)
    Constant(u16),
    /// `invokeinterface`
    Interface {
        /// Constant pool index of the interface method reference
        index: u16,
        /// Argument slot count, including the receiver
        count: u8,
    },
    /// `invokedynamic` call site index
    Dynamic(u16),
    /// `multianewarray`
    MultiArray {
        /// Constant pool index of the array class
        index: u16,
        /// Number of dimensions to create
        dimensions: u8,
    },
    /// Branch target
    Branch(Label),
    /// `tableswitch`
    TableSwitch {
        /// Default target
        default: Label,
        /// Lowest key
        low: i32,
        /// Targets for `low..=low + targets.len() - 1`
        targets: Vec<Label>,
    },
    /// `lookupswitch`
    LookupSwitch {
        /// Default target
        default: Label,
        /// `(key, target)` pairs in ascending key order
        pairs: Vec<(i32, Label)>,
    },
}

/// One instruction: its opcode and operand.
///
/// The `wide` prefix and the `ldc`/`ldc_w` distinction are encoding details: they are dropped
/// when decoding and chosen again by the encoder from the operand values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Opcode byte
    pub opcode: u8,
    /// Operand
    pub operand: Operand,
}

impl Instruction {
    /// An instruction without operand.
    #[must_use]
    pub fn simple(opcode: u8) -> Self {
        Instruction {
            opcode,
            operand: Operand::None,
        }
    }

    /// An instruction with a constant pool operand.
    #[must_use]
    pub fn constant(opcode: u8, index: u16) -> Self {
        Instruction {
            opcode,
            operand: Operand::Constant(index),
        }
    }

    /// A load or store of local `index`.
    #[must_use]
    pub fn local(opcode: u8, index: u16) -> Self {
        Instruction {
            opcode,
            operand: Operand::Local(index),
        }
    }

    /// The constant pool index of a method invocation, for `invokevirtual`,
    /// `invokespecial`, `invokestatic` and `invokeinterface`.
    #[must_use]
    pub fn invoked_method(&self) -> Option<u16> {
        match (self.opcode, &self.operand) {
            (
                opcodes::INVOKEVIRTUAL | opcodes::INVOKESPECIAL | opcodes::INVOKESTATIC,
                Operand::Constant(index),
            )
            | (opcodes::INVOKEINTERFACE, Operand::Interface { index, .. }) => Some(*index),
            _ => None,
        }
    }

    /// All labels this instruction can transfer control to.
    #[must_use]
    pub fn targets(&self) -> Vec<Label> {
        match &self.operand {
            Operand::Branch(label) => vec![*label],
            Operand::TableSwitch {
                default, targets, ..
            } => std::iter::once(*default)
                .chain(targets.iter().copied())
                .collect(),
            Operand::LookupSwitch { default, pairs } => std::iter::once(*default)
                .chain(pairs.iter().map(|(_, label)| *label))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// An element of an instruction list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Position marker
    Label(Label),
    /// Instruction
    Insn(Instruction),
}

/// Allocates labels and remembers the label assigned to each original bytecode offset.
#[derive(Debug, Default)]
pub struct LabelMap {
    by_offset: BTreeMap<u32, Label>,
    next: u32,
}

impl LabelMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The label for original offset `offset`, allocating it on first use.
    pub fn at(&mut self, offset: u32) -> Label {
        if let Some(label) = self.by_offset.get(&offset) {
            return *label;
        }
        let label = self.fresh();
        self.by_offset.insert(offset, label);
        label
    }

    /// The label already assigned to `offset`, if any.
    #[must_use]
    pub fn get(&self, offset: u32) -> Option<Label> {
        self.by_offset.get(&offset).copied()
    }

    /// A label not bound to any original offset.
    pub fn fresh(&mut self) -> Label {
        let label = Label(self.next);
        self.next += 1;
        label
    }

    /// Original offsets that have labels, in ascending order.
    pub fn offsets(&self) -> impl Iterator<Item = (u32, Label)> + '_ {
        self.by_offset.iter().map(|(offset, label)| (*offset, *label))
    }
}
