//! Bytecode encoder with label resolution.
//!
//! [`InstructionEncoder`] turns a node list back into a `code` array. Branches are emitted with
//! a placeholder offset and a [`LabelFixup`]; once every label position is known,
//! [`InstructionEncoder::finalize`] patches the real offsets in. The encoder also picks the
//! compact or extended form of instructions whose operands outgrew the short encoding (`ldc`
//! versus `ldc_w`, the `wide` prefix for locals above 255).
//!
//! A 2-byte branch whose offset no longer fits is widened and the whole list laid out again,
//! until every offset fits: `goto`/`jsr` become `goto_w`/`jsr_w`, and a conditional branch
//! becomes its inverse jumping over a `goto_w` to the original target.

use std::collections::{HashMap, HashSet};

use crate::{
    classfile::{
        instruction::{Instruction, Label, Node, Operand},
        opcodes::{self, operand_layout, OperandLayout},
    },
    file::io::{put_be, write_be_at},
    Result,
};

/// Largest valid `code` array length.
pub const MAX_CODE_LENGTH: usize = 65535;

/// A branch offset waiting for its label to be placed.
#[derive(Debug, Clone)]
pub struct LabelFixup {
    /// The target label
    pub label: Label,
    /// Position in the bytecode where the offset is written
    pub fixup_position: usize,
    /// Size of the offset field (2 or 4 bytes)
    pub offset_size: u8,
    /// Position of the branching opcode; JVM offsets are relative to it
    pub instruction_position: usize,
}

/// Which overflowing branches [`InstructionEncoder::encode_with`] may widen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchWidening {
    /// Only `goto` and `jsr`, which have wide forms of their own
    Unconditional,
    /// Conditional branches as well. The inverted form adds a branch target right after the
    /// `goto_w`, which has no stack map frame.
    All,
}

impl BranchWidening {
    fn covers(self, opcode: u8) -> bool {
        matches!(opcode, opcodes::GOTO | opcodes::JSR)
            || (self == BranchWidening::All && inverted_condition(opcode).is_some())
    }
}

fn inverted_condition(opcode: u8) -> Option<u8> {
    match opcode {
        // Conditions come in complementary pairs starting at ifeq/ifne
        opcodes::IFEQ..=opcodes::IF_ACMPNE if (opcode - opcodes::IFEQ) % 2 == 0 => Some(opcode + 1),
        opcodes::IFEQ..=opcodes::IF_ACMPNE => Some(opcode - 1),
        opcodes::IFNULL => Some(opcodes::IFNONNULL),
        opcodes::IFNONNULL => Some(opcodes::IFNULL),
        _ => None,
    }
}

/// Encodes instructions into JVM bytecode.
#[derive(Debug, Default)]
pub struct InstructionEncoder {
    bytecode: Vec<u8>,
    labels: HashMap<Label, u32>,
    fixups: Vec<LabelFixup>,
}

impl InstructionEncoder {
    /// Create an empty encoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode a complete node list, widening any overflowing branch.
    ///
    /// # Errors
    /// See [`InstructionEncoder::encode_with`].
    pub fn encode(nodes: &[Node]) -> Result<(Vec<u8>, HashMap<Label, u32>)> {
        Self::encode_with(nodes, BranchWidening::All)
    }

    /// Encode a complete node list, widening overflowing branches as `widening` allows.
    ///
    /// # Errors
    /// Returns [`crate::Error::RewriteFailed`] if a branch overflows and may not be widened,
    /// and otherwise see [`InstructionEncoder::emit`] and [`InstructionEncoder::finalize`].
    pub fn encode_with(
        nodes: &[Node],
        widening: BranchWidening,
    ) -> Result<(Vec<u8>, HashMap<Label, u32>)> {
        let mut widened = HashSet::new();
        loop {
            let mut encoder = InstructionEncoder::new();
            // Node index of every fixup
            let mut owners = Vec::new();
            for (index, node) in nodes.iter().enumerate() {
                match node {
                    Node::Label(label) => encoder.define_label(*label)?,
                    Node::Insn(instruction) if widened.contains(&index) => {
                        encoder.emit_widened(instruction)?;
                    }
                    Node::Insn(instruction) => encoder.emit(instruction)?,
                }
                owners.resize(encoder.fixups.len(), index);
            }

            let overflowing = encoder.short_overflows();
            if overflowing.is_empty() {
                return encoder.finalize();
            }
            for fixup in overflowing {
                let index = owners[fixup];
                if let Node::Insn(instruction) = &nodes[index] {
                    if !widening.covers(instruction.opcode) {
                        return Err(rewrite_error!(
                            "Branch {:#04x} out of range and cannot be widened",
                            instruction.opcode
                        ));
                    }
                }
                widened.insert(index);
            }
        }
    }

    /// Bind `label` to the current position.
    ///
    /// # Errors
    /// Returns [`crate::Error::RewriteFailed`] if the label was already placed.
    pub fn define_label(&mut self, label: Label) -> Result<()> {
        let position = self.current_position();
        if self.labels.insert(label, position).is_some() {
            return Err(rewrite_error!("Label {:?} placed twice", label));
        }
        Ok(())
    }

    /// Current length of the emitted bytecode.
    #[must_use]
    pub fn current_position(&self) -> u32 {
        self.bytecode.len() as u32
    }

    fn fixup(&mut self, label: Label, offset_size: u8, instruction_position: usize) {
        self.fixups.push(LabelFixup {
            label,
            fixup_position: self.bytecode.len(),
            offset_size,
            instruction_position,
        });
        self.bytecode
            .extend(std::iter::repeat(0).take(offset_size as usize));
    }

    fn pad_to_alignment(&mut self) {
        while self.bytecode.len() % 4 != 0 {
            self.bytecode.push(0);
        }
    }

    /// Append one instruction.
    ///
    /// # Errors
    /// Returns [`crate::Error::RewriteFailed`] if the operand does not fit the opcode.
    pub fn emit(&mut self, instruction: &Instruction) -> Result<()> {
        let position = self.bytecode.len();
        let opcode = instruction.opcode;
        let layout = operand_layout(opcode)
            .ok_or_else(|| rewrite_error!("Cannot encode undefined opcode {:#04x}", opcode))?;

        match (layout, &instruction.operand) {
            (OperandLayout::None, Operand::None) => self.bytecode.push(opcode),
            (OperandLayout::Byte, Operand::Byte(value)) => {
                self.bytecode.push(opcode);
                put_be(&mut self.bytecode, *value);
            }
            (OperandLayout::Short, Operand::Short(value)) => {
                self.bytecode.push(opcode);
                put_be(&mut self.bytecode, *value);
            }
            (OperandLayout::ArrayType, Operand::ArrayType(kind)) => {
                self.bytecode.push(opcode);
                self.bytecode.push(*kind);
            }
            (OperandLayout::Local, Operand::Local(index)) => {
                if let Ok(short) = u8::try_from(*index) {
                    self.bytecode.push(opcode);
                    self.bytecode.push(short);
                } else {
                    self.bytecode.push(opcodes::WIDE);
                    self.bytecode.push(opcode);
                    put_be(&mut self.bytecode, *index);
                }
            }
            (OperandLayout::Iinc, Operand::Iinc { index, delta }) => {
                match (u8::try_from(*index), i8::try_from(*delta)) {
                    (Ok(index), Ok(delta)) => {
                        self.bytecode.push(opcode);
                        self.bytecode.push(index);
                        put_be(&mut self.bytecode, delta);
                    }
                    _ => {
                        self.bytecode.push(opcodes::WIDE);
                        self.bytecode.push(opcode);
                        put_be(&mut self.bytecode, *index);
                        put_be(&mut self.bytecode, *delta);
                    }
                }
            }
            (OperandLayout::ConstantByte, Operand::Constant(index)) => {
                if let Ok(short) = u8::try_from(*index) {
                    self.bytecode.push(opcodes::LDC);
                    self.bytecode.push(short);
                } else {
                    self.bytecode.push(opcodes::LDC_W);
                    put_be(&mut self.bytecode, *index);
                }
            }
            (OperandLayout::Constant, Operand::Constant(index)) => {
                self.bytecode.push(opcode);
                put_be(&mut self.bytecode, *index);
            }
            (OperandLayout::Interface, Operand::Interface { index, count }) => {
                self.bytecode.push(opcode);
                put_be(&mut self.bytecode, *index);
                self.bytecode.push(*count);
                self.bytecode.push(0);
            }
            (OperandLayout::Dynamic, Operand::Dynamic(index)) => {
                self.bytecode.push(opcode);
                put_be(&mut self.bytecode, *index);
                self.bytecode.extend_from_slice(&[0, 0]);
            }
            (OperandLayout::MultiArray, Operand::MultiArray { index, dimensions }) => {
                self.bytecode.push(opcode);
                put_be(&mut self.bytecode, *index);
                self.bytecode.push(*dimensions);
            }
            (OperandLayout::Branch, Operand::Branch(label)) => {
                self.bytecode.push(opcode);
                self.fixup(*label, 2, position);
            }
            (OperandLayout::BranchWide, Operand::Branch(label)) => {
                self.bytecode.push(opcode);
                self.fixup(*label, 4, position);
            }
            (
                OperandLayout::TableSwitch,
                Operand::TableSwitch {
                    default,
                    low,
                    targets,
                },
            ) => {
                if targets.is_empty() {
                    return Err(rewrite_error!("tableswitch without targets"));
                }
                let high = i32::try_from(targets.len() - 1)
                    .ok()
                    .and_then(|span| low.checked_add(span))
                    .ok_or_else(|| rewrite_error!("tableswitch range overflows"))?;
                self.bytecode.push(opcode);
                self.pad_to_alignment();
                self.fixup(*default, 4, position);
                put_be(&mut self.bytecode, *low);
                put_be(&mut self.bytecode, high);
                for target in targets {
                    self.fixup(*target, 4, position);
                }
            }
            (OperandLayout::LookupSwitch, Operand::LookupSwitch { default, pairs }) => {
                let count = i32::try_from(pairs.len())
                    .map_err(|_| rewrite_error!("lookupswitch with too many pairs"))?;
                self.bytecode.push(opcode);
                self.pad_to_alignment();
                self.fixup(*default, 4, position);
                put_be(&mut self.bytecode, count);
                for (key, target) in pairs {
                    put_be(&mut self.bytecode, *key);
                    self.fixup(*target, 4, position);
                }
            }
            (_, operand) => {
                return Err(rewrite_error!(
                    "Operand {:?} does not fit opcode {:#04x}",
                    operand,
                    opcode
                ))
            }
        }

        Ok(())
    }

    /// Append the wide form of a branch instruction.
    ///
    /// # Errors
    /// Returns [`crate::Error::RewriteFailed`] if the branch has no wide form.
    pub fn emit_widened(&mut self, instruction: &Instruction) -> Result<()> {
        let Operand::Branch(label) = &instruction.operand else {
            return self.emit(instruction);
        };
        let position = self.bytecode.len();
        match instruction.opcode {
            opcodes::GOTO => {
                self.bytecode.push(opcodes::GOTO_W);
                self.fixup(*label, 4, position);
            }
            opcodes::JSR => {
                self.bytecode.push(opcodes::JSR_W);
                self.fixup(*label, 4, position);
            }
            opcode => {
                let inverted = inverted_condition(opcode)
                    .ok_or_else(|| rewrite_error!("Opcode {:#04x} has no wide form", opcode))?;
                // Skip the 3-byte branch and the 5-byte goto_w
                self.bytecode.push(inverted);
                put_be(&mut self.bytecode, 8_i16);
                let goto = self.bytecode.len();
                self.bytecode.push(opcodes::GOTO_W);
                self.fixup(*label, 4, goto);
            }
        }
        Ok(())
    }

    /// Indices of the 2-byte fixups whose placed target is out of range.
    fn short_overflows(&self) -> Vec<usize> {
        self.fixups
            .iter()
            .enumerate()
            .filter(|(_, fixup)| fixup.offset_size == 2)
            .filter_map(|(index, fixup)| {
                let target = self.labels.get(&fixup.label)?;
                let offset = i64::from(*target) - fixup.instruction_position as i64;
                i16::try_from(offset).is_err().then_some(index)
            })
            .collect()
    }

    /// Resolve all branch offsets.
    ///
    /// Returns the bytecode and the final position of every placed label.
    ///
    /// # Errors
    /// Returns [`crate::Error::RewriteFailed`] if a branch targets a label that was never
    /// placed, an offset does not fit its field, or the code exceeds the format's length limit.
    pub fn finalize(mut self) -> Result<(Vec<u8>, HashMap<Label, u32>)> {
        if self.bytecode.len() > MAX_CODE_LENGTH {
            return Err(rewrite_error!(
                "Method code of {} bytes exceeds the limit",
                self.bytecode.len()
            ));
        }

        let fixups = std::mem::take(&mut self.fixups);
        for fixup in &fixups {
            let target = self
                .labels
                .get(&fixup.label)
                .ok_or_else(|| rewrite_error!("Branch to unplaced label {:?}", fixup.label))?;

            let offset = i64::from(*target) - fixup.instruction_position as i64;
            let mut at = fixup.fixup_position;
            match fixup.offset_size {
                2 => {
                    let offset = i16::try_from(offset).map_err(|_| {
                        rewrite_error!("Branch offset {} out of range for 2-byte instruction", offset)
                    })?;
                    write_be_at(&mut self.bytecode, &mut at, offset)?;
                }
                _ => {
                    let offset = i32::try_from(offset).map_err(|_| {
                        rewrite_error!("Branch offset {} out of range", offset)
                    })?;
                    write_be_at(&mut self.bytecode, &mut at, offset)?;
                }
            }
        }

        Ok((self.bytecode, self.labels))
    }
}
