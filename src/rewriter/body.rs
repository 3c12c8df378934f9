//! Editable method body.
//!
//! A [`MethodBody`] is the label-based form of a `Code` attribute. All offset-based tables are
//! rewritten to refer to labels when the body is decoded, and turned back into offsets by
//! [`MethodBody::encode`] once the instruction list has its final layout. Entries whose labels
//! no longer exist, or whose ranges became empty, are dropped there; this is what keeps the
//! auxiliary tables consistent with the instruction list after an edit.
//!
//! Code attributes other than the line number, local variable and stack map tables carry
//! offsets this crate cannot remap (type annotations, vendor attributes); they are dropped when
//! a body is re-encoded.

use std::collections::{BTreeSet, HashMap};

use log::debug;

use crate::{
    classfile::{
        code::{CodeAttribute, ExceptionEntry},
        constpool::ConstantPool,
        decoder,
        encoder::{BranchWidening, InstructionEncoder},
        instruction::{Instruction, Label, LabelMap, Node},
        stackmap::{self, StackMapFrame},
        Attribute,
    },
    file::{io::put_be, parser::Parser},
    Result,
};

const LINE_NUMBER_TABLE: &str = "LineNumberTable";
const LOCAL_VARIABLE_TABLE: &str = "LocalVariableTable";
const LOCAL_VARIABLE_TYPE_TABLE: &str = "LocalVariableTypeTable";
const STACK_MAP_TABLE: &str = "StackMapTable";

/// A protected range and its handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryCatchBlock {
    /// First protected instruction
    pub start: Label,
    /// End of the range (exclusive)
    pub end: Label,
    /// Handler entry
    pub handler: Label,
    /// Caught class, 0 for any
    pub catch_type: u16,
}

/// A source line starting at a label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineNumber {
    /// First instruction of the line
    pub start: Label,
    /// Source line
    pub line: u16,
}

/// A local variable's live range, from either local variable table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariable {
    /// Start of the live range
    pub start: Label,
    /// End of the live range (exclusive)
    pub end: Label,
    /// Name index
    pub name_index: u16,
    /// Descriptor (or generic signature) index
    pub descriptor_index: u16,
    /// Slot
    pub index: u16,
}

/// A decoded, editable method body.
#[derive(Debug)]
pub struct MethodBody {
    /// Maximum operand stack depth
    pub max_stack: u16,
    /// Local variable slots
    pub max_locals: u16,
    /// Instructions and labels
    pub nodes: Vec<Node>,
    /// Exception handlers in priority order
    pub try_catch_blocks: Vec<TryCatchBlock>,
    /// Line numbers
    pub line_numbers: Vec<LineNumber>,
    /// `LocalVariableTable` entries
    pub local_variables: Vec<LocalVariable>,
    /// `LocalVariableTypeTable` entries
    pub local_variable_types: Vec<LocalVariable>,
    /// Stack map frames, `None` when the method has no `StackMapTable`
    pub frames: Option<Vec<StackMapFrame>>,
    labels: LabelMap,
}

fn read_line_numbers(data: &[u8], labels: &mut LabelMap) -> Result<Vec<LineNumber>> {
    let mut parser = Parser::new(data);
    let count = parser.read_be::<u16>()?;
    let mut lines = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let start = labels.at(u32::from(parser.read_be::<u16>()?));
        lines.push(LineNumber {
            start,
            line: parser.read_be::<u16>()?,
        });
    }
    Ok(lines)
}

fn read_local_variables(data: &[u8], labels: &mut LabelMap) -> Result<Vec<LocalVariable>> {
    let mut parser = Parser::new(data);
    let count = parser.read_be::<u16>()?;
    let mut locals = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let start_pc = u32::from(parser.read_be::<u16>()?);
        let length = u32::from(parser.read_be::<u16>()?);
        locals.push(LocalVariable {
            start: labels.at(start_pc),
            end: labels.at(start_pc + length),
            name_index: parser.read_be::<u16>()?,
            descriptor_index: parser.read_be::<u16>()?,
            index: parser.read_be::<u16>()?,
        });
    }
    Ok(locals)
}

fn write_local_variables(
    locals: &[LocalVariable],
    positions: &HashMap<Label, u32>,
) -> Option<Vec<u8>> {
    let mut entries = Vec::new();
    for local in locals {
        let (Some(start), Some(end)) = (positions.get(&local.start), positions.get(&local.end))
        else {
            continue;
        };
        if end < start {
            continue;
        }
        entries.push((*start as u16, (end - start) as u16, local));
    }
    if entries.is_empty() {
        return None;
    }

    let mut out = Vec::new();
    put_be(&mut out, entries.len() as u16);
    for (start, length, local) in entries {
        put_be(&mut out, start);
        put_be(&mut out, length);
        put_be(&mut out, local.name_index);
        put_be(&mut out, local.descriptor_index);
        put_be(&mut out, local.index);
    }
    Some(out)
}

impl MethodBody {
    /// Build the editable form of `code`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the bytecode or one of the tables is damaged, or
    /// any table points into the middle of an instruction.
    pub fn decode(pool: &ConstantPool, code: &CodeAttribute) -> Result<Self> {
        let mut labels = LabelMap::new();
        let instructions = decoder::decode(&code.code, &mut labels)?;
        let code_length = code.code.len() as u32;

        let try_catch_blocks = code
            .exception_table
            .iter()
            .map(|entry| TryCatchBlock {
                start: labels.at(u32::from(entry.start_pc)),
                end: labels.at(u32::from(entry.end_pc)),
                handler: labels.at(u32::from(entry.handler_pc)),
                catch_type: entry.catch_type,
            })
            .collect();

        let mut line_numbers = Vec::new();
        let mut local_variables = Vec::new();
        let mut local_variable_types = Vec::new();
        let mut frames = None;
        for attribute in &code.attributes {
            match pool.get_utf8(attribute.name_index)? {
                LINE_NUMBER_TABLE => {
                    line_numbers.extend(read_line_numbers(&attribute.data, &mut labels)?);
                }
                LOCAL_VARIABLE_TABLE => {
                    local_variables.extend(read_local_variables(&attribute.data, &mut labels)?);
                }
                LOCAL_VARIABLE_TYPE_TABLE => {
                    local_variable_types
                        .extend(read_local_variables(&attribute.data, &mut labels)?);
                }
                STACK_MAP_TABLE => {
                    frames = Some(stackmap::parse(&attribute.data, code_length, &mut labels)?);
                }
                other => debug!("Dropping code attribute {other} on re-encode"),
            }
        }

        let boundaries: BTreeSet<u32> = instructions.iter().map(|(offset, _)| *offset).collect();
        for (offset, _) in labels.offsets() {
            if offset != code_length && !boundaries.contains(&offset) {
                return Err(malformed_error!(
                    "Offset {} is not an instruction boundary",
                    offset
                ));
            }
        }

        let mut nodes = Vec::with_capacity(instructions.len() * 2);
        for (offset, instruction) in instructions {
            if let Some(label) = labels.get(offset) {
                nodes.push(Node::Label(label));
            }
            nodes.push(Node::Insn(instruction));
        }
        if let Some(label) = labels.get(code_length) {
            nodes.push(Node::Label(label));
        }

        Ok(MethodBody {
            max_stack: code.max_stack,
            max_locals: code.max_locals,
            nodes,
            try_catch_blocks,
            line_numbers,
            local_variables,
            local_variable_types,
            frames,
            labels,
        })
    }

    /// A label not yet used anywhere in this body.
    pub fn new_label(&mut self) -> Label {
        self.labels.fresh()
    }

    /// Iterate over the instructions, skipping labels.
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.nodes.iter().filter_map(|node| match node {
            Node::Insn(instruction) => Some(instruction),
            Node::Label(_) => None,
        })
    }

    /// Lower the body into a `Code` attribute, interning table names into `pool`.
    ///
    /// # Errors
    /// Returns [`crate::Error::RewriteFailed`] if the instructions cannot be encoded or a
    /// stack map frame lost its instruction.
    pub fn encode(&self, pool: &mut ConstantPool) -> Result<CodeAttribute> {
        // Inverting a conditional branch would need a frame of its own
        let widening = if self.frames.is_some() {
            BranchWidening::Unconditional
        } else {
            BranchWidening::All
        };
        let (code, positions) = InstructionEncoder::encode_with(&self.nodes, widening)?;
        let position = |label: &Label| positions.get(label).map(|p| *p as u16);

        let mut exception_table = Vec::with_capacity(self.try_catch_blocks.len());
        for block in &self.try_catch_blocks {
            let (Some(start_pc), Some(end_pc), Some(handler_pc)) = (
                position(&block.start),
                position(&block.end),
                position(&block.handler),
            ) else {
                debug!("Dropping exception range with removed instructions");
                continue;
            };
            if start_pc >= end_pc {
                debug!("Dropping empty exception range at {start_pc}");
                continue;
            }
            exception_table.push(ExceptionEntry {
                start_pc,
                end_pc,
                handler_pc,
                catch_type: block.catch_type,
            });
        }

        let code_length = code.len() as u16;
        let mut attributes = Vec::new();

        let lines: Vec<(u16, u16)> = self
            .line_numbers
            .iter()
            .filter_map(|line| position(&line.start).map(|pc| (pc, line.line)))
            .filter(|(pc, _)| *pc < code_length)
            .collect();
        if !lines.is_empty() {
            let mut data = Vec::with_capacity(2 + lines.len() * 4);
            put_be(&mut data, lines.len() as u16);
            for (pc, line) in lines {
                put_be(&mut data, pc);
                put_be(&mut data, line);
            }
            attributes.push(Attribute {
                name_index: pool.intern_utf8(LINE_NUMBER_TABLE)?,
                data,
            });
        }

        if let Some(data) = write_local_variables(&self.local_variables, &positions) {
            attributes.push(Attribute {
                name_index: pool.intern_utf8(LOCAL_VARIABLE_TABLE)?,
                data,
            });
        }
        if let Some(data) = write_local_variables(&self.local_variable_types, &positions) {
            attributes.push(Attribute {
                name_index: pool.intern_utf8(LOCAL_VARIABLE_TYPE_TABLE)?,
                data,
            });
        }

        if let Some(frames) = &self.frames {
            if frames.iter().any(|frame| !positions.contains_key(&frame.label)) {
                return Err(rewrite_error!("Stack map frame lost its instruction"));
            }
            attributes.push(Attribute {
                name_index: pool.intern_utf8(STACK_MAP_TABLE)?,
                data: stackmap::write(frames, &positions)?,
            });
        }

        Ok(CodeAttribute {
            max_stack: self.max_stack,
            max_locals: self.max_locals,
            code,
            exception_table,
            attributes,
        })
    }
}
