//! `StackMapTable` frames, bound to labels.
//!
//! Frames are delta-encoded against each other in the class file. Once decoded, each frame is
//! attached to the [`Label`] of the instruction it describes, so inserting code before a frame
//! keeps the frame with its instruction. [`write`] recomputes the deltas from the final label
//! positions and picks the shortest encoding for each frame.

use std::collections::HashMap;

use crate::{
    classfile::instruction::{Label, LabelMap},
    file::{io::put_be, parser::Parser},
    Result,
};

/// The type of one local variable or stack slot in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationType {
    /// Unusable slot
    Top,
    /// `int` and narrower
    Integer,
    /// `float`
    Float,
    /// `double` (occupies two slots, listed once)
    Double,
    /// `long` (occupies two slots, listed once)
    Long,
    /// `null`
    Null,
    /// `this` in a constructor before `super()` has run
    UninitializedThis,
    /// Instance of the class at this constant pool index
    Object(u16),
    /// Result of the `new` instruction at this label, not yet initialized
    Uninitialized(Label),
}

/// The shape of a frame relative to the previous one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    /// Same locals, empty stack
    Same,
    /// Same locals, one stack item
    SameLocals1(VerificationType),
    /// The last 1 to 3 locals are removed, empty stack
    Chop(u8),
    /// 1 to 3 locals are added, empty stack
    Append(Vec<VerificationType>),
    /// Complete description
    Full {
        /// All locals
        locals: Vec<VerificationType>,
        /// All stack items
        stack: Vec<VerificationType>,
    },
}

/// A frame attached to an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackMapFrame {
    /// The instruction the frame describes
    pub label: Label,
    /// Frame contents
    pub kind: FrameKind,
}

fn read_type(parser: &mut Parser, labels: &mut LabelMap) -> Result<VerificationType> {
    Ok(match parser.read_be::<u8>()? {
        0 => VerificationType::Top,
        1 => VerificationType::Integer,
        2 => VerificationType::Float,
        3 => VerificationType::Double,
        4 => VerificationType::Long,
        5 => VerificationType::Null,
        6 => VerificationType::UninitializedThis,
        7 => VerificationType::Object(parser.read_be::<u16>()?),
        8 => VerificationType::Uninitialized(labels.at(u32::from(parser.read_be::<u16>()?))),
        other => return Err(malformed_error!("Unknown verification type tag {}", other)),
    })
}

fn read_types(
    parser: &mut Parser,
    labels: &mut LabelMap,
    count: usize,
) -> Result<Vec<VerificationType>> {
    let mut types = Vec::with_capacity(count);
    for _ in 0..count {
        types.push(read_type(parser, labels)?);
    }
    Ok(types)
}

/// Decode a `StackMapTable` attribute payload.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for reserved frame tags, unknown verification types and
/// frames pointing past the end of the code.
pub fn parse(data: &[u8], code_length: u32, labels: &mut LabelMap) -> Result<Vec<StackMapFrame>> {
    let mut parser = Parser::new(data);
    let count = parser.read_be::<u16>()?;
    let mut frames = Vec::with_capacity(count as usize);
    let mut previous: Option<u32> = None;

    for _ in 0..count {
        let tag = parser.read_be::<u8>()?;
        let (delta, kind) = match tag {
            0..=63 => (u16::from(tag), FrameKind::Same),
            64..=127 => (
                u16::from(tag - 64),
                FrameKind::SameLocals1(read_type(&mut parser, labels)?),
            ),
            247 => {
                let delta = parser.read_be::<u16>()?;
                (delta, FrameKind::SameLocals1(read_type(&mut parser, labels)?))
            }
            248..=250 => (parser.read_be::<u16>()?, FrameKind::Chop(251 - tag)),
            251 => (parser.read_be::<u16>()?, FrameKind::Same),
            252..=254 => {
                let delta = parser.read_be::<u16>()?;
                let locals = read_types(&mut parser, labels, usize::from(tag - 251))?;
                (delta, FrameKind::Append(locals))
            }
            255 => {
                let delta = parser.read_be::<u16>()?;
                let local_count = parser.read_be::<u16>()?;
                let locals = read_types(&mut parser, labels, usize::from(local_count))?;
                let stack_count = parser.read_be::<u16>()?;
                let stack = read_types(&mut parser, labels, usize::from(stack_count))?;
                (delta, FrameKind::Full { locals, stack })
            }
            reserved => {
                return Err(malformed_error!("Reserved stack map frame tag {}", reserved))
            }
        };

        let offset = match previous {
            None => u32::from(delta),
            Some(previous) => previous + u32::from(delta) + 1,
        };
        if offset >= code_length {
            return Err(malformed_error!(
                "Stack map frame at {} beyond code length {}",
                offset,
                code_length
            ));
        }
        previous = Some(offset);

        frames.push(StackMapFrame {
            label: labels.at(offset),
            kind,
        });
    }

    if parser.has_more_data() {
        return Err(malformed_error!("Trailing bytes after StackMapTable"));
    }

    Ok(frames)
}

fn write_type(
    out: &mut Vec<u8>,
    ty: &VerificationType,
    positions: &HashMap<Label, u32>,
) -> Result<()> {
    match ty {
        VerificationType::Top => out.push(0),
        VerificationType::Integer => out.push(1),
        VerificationType::Float => out.push(2),
        VerificationType::Double => out.push(3),
        VerificationType::Long => out.push(4),
        VerificationType::Null => out.push(5),
        VerificationType::UninitializedThis => out.push(6),
        VerificationType::Object(index) => {
            out.push(7);
            put_be(out, *index);
        }
        VerificationType::Uninitialized(label) => {
            out.push(8);
            put_be(out, position_u16(positions, *label)?);
        }
    }
    Ok(())
}

fn write_types(
    out: &mut Vec<u8>,
    types: &[VerificationType],
    positions: &HashMap<Label, u32>,
) -> Result<()> {
    for ty in types {
        write_type(out, ty, positions)?;
    }
    Ok(())
}

fn position_u16(positions: &HashMap<Label, u32>, label: Label) -> Result<u16> {
    let position = positions
        .get(&label)
        .ok_or_else(|| rewrite_error!("Stack map refers to unplaced label {:?}", label))?;
    u16::try_from(*position).map_err(|_| rewrite_error!("Stack map offset {} too large", position))
}

/// Encode frames into a `StackMapTable` payload using final label positions.
///
/// # Errors
/// Returns [`crate::Error::RewriteFailed`] if a label was never placed, or two frames end up at
/// the same or a decreasing offset.
pub fn write(frames: &[StackMapFrame], positions: &HashMap<Label, u32>) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    put_be(
        &mut out,
        u16::try_from(frames.len()).map_err(|_| rewrite_error!("Too many stack map frames"))?,
    );

    let mut previous: Option<u16> = None;
    for frame in frames {
        let offset = position_u16(positions, frame.label)?;
        let delta = match previous {
            None => offset,
            Some(previous) if offset > previous => offset - previous - 1,
            Some(previous) => {
                return Err(rewrite_error!(
                    "Stack map frames out of order ({} after {})",
                    offset,
                    previous
                ))
            }
        };
        previous = Some(offset);

        match &frame.kind {
            FrameKind::Same if delta <= 63 => out.push(delta as u8),
            FrameKind::Same => {
                out.push(251);
                put_be(&mut out, delta);
            }
            FrameKind::SameLocals1(ty) => {
                if delta <= 63 {
                    out.push(64 + delta as u8);
                } else {
                    out.push(247);
                    put_be(&mut out, delta);
                }
                write_type(&mut out, ty, positions)?;
            }
            FrameKind::Chop(count @ 1..=3) => {
                out.push(251 - count);
                put_be(&mut out, delta);
            }
            FrameKind::Append(locals) if (1..=3).contains(&locals.len()) => {
                out.push(251 + locals.len() as u8);
                put_be(&mut out, delta);
                write_types(&mut out, locals, positions)?;
            }
            FrameKind::Full { locals, stack } => {
                out.push(255);
                put_be(&mut out, delta);
                put_be(&mut out, locals.len() as u16);
                write_types(&mut out, locals, positions)?;
                put_be(&mut out, stack.len() as u16);
                write_types(&mut out, stack, positions)?;
            }
            other => return Err(rewrite_error!("Unencodable stack map frame {:?}", other)),
        }
    }

    Ok(out)
}
