//! `StackMapTable` frames, positioned by instruction index.
//!
//! The compact frame encodings depend on the byte distance between frames, so
//! the kind stored here is the logical one and the encoder picks the short or
//! extended form from the recomputed delta.

use crate::classfile::bytecode::OffsetMap;
use crate::classfile::bytes::{ByteReader, ByteWriter};
use crate::classfile::errors::{ClassFileResult, MalformedInputError};
use crate::classfile::insn::InsnIndex;
use crate::classfile::pool::{ConstantPool, PoolBuilder};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationType {
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,
    UninitializedThis,
    Object(String),
    /// Result of the `new` instruction at this index, not yet initialized.
    Uninitialized(InsnIndex),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    Same,
    SameLocals1StackItem(VerificationType),
    /// Drops 1 to 3 trailing locals.
    Chop(u8),
    /// Adds 1 to 3 locals.
    Append(Vec<VerificationType>),
    Full {
        locals: Vec<VerificationType>,
        stack: Vec<VerificationType>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackMapFrame {
    pub target: InsnIndex,
    pub kind: FrameKind,
}

const SAME_MAX: u8 = 63;
const SAME_LOCALS_1_BASE: u8 = 64;
const SAME_LOCALS_1_MAX: u8 = 127;
const SAME_LOCALS_1_EXTENDED: u8 = 247;
const CHOP_MIN: u8 = 248;
const SAME_EXTENDED: u8 = 251;
const APPEND_MAX: u8 = 254;
const FULL: u8 = 255;

fn read_type(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
    offsets: &OffsetMap,
) -> ClassFileResult<VerificationType> {
    let tag = reader.u8()?;
    Ok(match tag {
        0 => VerificationType::Top,
        1 => VerificationType::Integer,
        2 => VerificationType::Float,
        3 => VerificationType::Double,
        4 => VerificationType::Long,
        5 => VerificationType::Null,
        6 => VerificationType::UninitializedThis,
        7 => VerificationType::Object(pool.class_name(reader.u16()?)?),
        8 => VerificationType::Uninitialized(offsets.insn_at(reader.u16()? as usize)?),
        tag => return Err(MalformedInputError::UnknownVerificationType { tag }),
    })
}

fn read_types(
    reader: &mut ByteReader<'_>,
    count: usize,
    pool: &ConstantPool,
    offsets: &OffsetMap,
) -> ClassFileResult<Vec<VerificationType>> {
    (0..count)
        .map(|_| read_type(reader, pool, offsets))
        .collect()
}

/// Decodes the body of a `StackMapTable` attribute.
pub(crate) fn read_stack_map(
    info: &[u8],
    pool: &ConstantPool,
    offsets: &OffsetMap,
) -> ClassFileResult<Vec<StackMapFrame>> {
    let mut reader = ByteReader::new(info);
    let count = reader.u16()?;
    let mut frames = Vec::with_capacity(count as usize);
    let mut previous: Option<usize> = None;

    for _ in 0..count {
        let frame_type = reader.u8()?;
        let (delta, kind) = match frame_type {
            0..=SAME_MAX => (frame_type as usize, FrameKind::Same),
            SAME_LOCALS_1_BASE..=SAME_LOCALS_1_MAX => (
                (frame_type - SAME_LOCALS_1_BASE) as usize,
                FrameKind::SameLocals1StackItem(read_type(&mut reader, pool, offsets)?),
            ),
            SAME_LOCALS_1_EXTENDED => {
                let delta = reader.u16()? as usize;
                let item = read_type(&mut reader, pool, offsets)?;
                (delta, FrameKind::SameLocals1StackItem(item))
            }
            CHOP_MIN..=250 => (
                reader.u16()? as usize,
                FrameKind::Chop(SAME_EXTENDED - frame_type),
            ),
            SAME_EXTENDED => (reader.u16()? as usize, FrameKind::Same),
            252..=APPEND_MAX => {
                let delta = reader.u16()? as usize;
                let count = (frame_type - SAME_EXTENDED) as usize;
                (
                    delta,
                    FrameKind::Append(read_types(&mut reader, count, pool, offsets)?),
                )
            }
            FULL => {
                let delta = reader.u16()? as usize;
                let local_count = reader.u16()? as usize;
                let locals = read_types(&mut reader, local_count, pool, offsets)?;
                let stack_count = reader.u16()? as usize;
                let stack = read_types(&mut reader, stack_count, pool, offsets)?;
                (delta, FrameKind::Full { locals, stack })
            }
            frame_type => return Err(MalformedInputError::UnknownFrameType { frame_type }),
        };

        let offset = match previous {
            None => delta,
            Some(prev) => prev + delta + 1,
        };
        previous = Some(offset);
        frames.push(StackMapFrame {
            target: offsets.insn_at(offset)?,
            kind,
        });
    }

    reader.finish("StackMapTable")?;
    Ok(frames)
}

fn write_type(
    out: &mut ByteWriter,
    ty: &VerificationType,
    pool: &mut PoolBuilder,
    offsets: &OffsetMap,
) -> ClassFileResult<()> {
    match ty {
        VerificationType::Top => out.u8(0),
        VerificationType::Integer => out.u8(1),
        VerificationType::Float => out.u8(2),
        VerificationType::Double => out.u8(3),
        VerificationType::Long => out.u8(4),
        VerificationType::Null => out.u8(5),
        VerificationType::UninitializedThis => out.u8(6),
        VerificationType::Object(class) => {
            out.u8(7);
            out.u16(pool.class(class)?);
        }
        VerificationType::Uninitialized(index) => {
            out.u8(8);
            out.u16(offsets.insn_offset(*index)? as u16);
        }
    }
    Ok(())
}

fn write_types(
    out: &mut ByteWriter,
    types: &[VerificationType],
    pool: &mut PoolBuilder,
    offsets: &OffsetMap,
) -> ClassFileResult<()> {
    for ty in types {
        write_type(out, ty, pool, offsets)?;
    }
    Ok(())
}

fn small_list(what: &'static str, len: usize) -> ClassFileResult<u8> {
    match len {
        1..=3 => Ok(len as u8),
        count => Err(MalformedInputError::BadAttribute {
            attribute: "StackMapTable",
            reason: format!("{what} frame with {count} locals"),
        }),
    }
}

/// Encodes frames into the body of a `StackMapTable` attribute.
pub(crate) fn write_stack_map(
    frames: &[StackMapFrame],
    pool: &mut PoolBuilder,
    offsets: &OffsetMap,
) -> ClassFileResult<ByteWriter> {
    let mut out = ByteWriter::new();
    out.count("stack map frame", frames.len())?;
    let mut previous: Option<usize> = None;

    for frame in frames {
        let offset = offsets.insn_offset(frame.target)?;
        let delta = match previous {
            None => offset,
            Some(prev) if offset > prev => offset - prev - 1,
            Some(prev) => {
                return Err(MalformedInputError::BadAttribute {
                    attribute: "StackMapTable",
                    reason: format!("frame at offset {offset} does not follow offset {prev}"),
                })
            }
        };
        previous = Some(offset);
        // Offsets are bounded by the code length, which fits in u16.
        let wide_delta = delta as u16;

        match &frame.kind {
            FrameKind::Same if delta <= SAME_MAX as usize => out.u8(delta as u8),
            FrameKind::Same => {
                out.u8(SAME_EXTENDED);
                out.u16(wide_delta);
            }
            FrameKind::SameLocals1StackItem(item) => {
                if delta <= (SAME_LOCALS_1_MAX - SAME_LOCALS_1_BASE) as usize {
                    out.u8(SAME_LOCALS_1_BASE + delta as u8);
                } else {
                    out.u8(SAME_LOCALS_1_EXTENDED);
                    out.u16(wide_delta);
                }
                write_type(&mut out, item, pool, offsets)?;
            }
            FrameKind::Chop(count) => {
                let count = small_list("chop", *count as usize)?;
                out.u8(SAME_EXTENDED - count);
                out.u16(wide_delta);
            }
            FrameKind::Append(locals) => {
                let count = small_list("append", locals.len())?;
                out.u8(SAME_EXTENDED + count);
                out.u16(wide_delta);
                write_types(&mut out, locals, pool, offsets)?;
            }
            FrameKind::Full { locals, stack } => {
                out.u8(FULL);
                out.u16(wide_delta);
                out.count("frame local", locals.len())?;
                write_types(&mut out, locals, pool, offsets)?;
                out.count("frame stack item", stack.len())?;
                write_types(&mut out, stack, pool, offsets)?;
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offsets(starts: &[usize], len: usize) -> OffsetMap {
        OffsetMap::new(starts.to_vec(), len)
    }

    #[test]
    fn deltas_follow_the_plus_one_rule() {
        let map = offsets(&[0, 2, 5, 70, 71], 72);
        let frames = vec![
            StackMapFrame {
                target: 1,
                kind: FrameKind::Same,
            },
            StackMapFrame {
                target: 2,
                kind: FrameKind::SameLocals1StackItem(VerificationType::Integer),
            },
            StackMapFrame {
                target: 3,
                kind: FrameKind::Same,
            },
            StackMapFrame {
                target: 4,
                kind: FrameKind::Chop(2),
            },
        ];
        let pool = ConstantPool::new();
        let mut builder = PoolBuilder::new(&pool);
        let bytes = write_stack_map(&frames, &mut builder, &map)
            .unwrap()
            .into_inner();

        // 2 -> same(2); 5 -> same_locals_1(64 + 2) int; 70 -> delta 64 needs
        // same_frame_extended; 71 -> chop 2 with delta 0.
        assert_eq!(bytes, vec![0, 4, 2, 66, 1, 251, 0, 64, 249, 0, 0]);
        assert_eq!(read_stack_map(&bytes, &pool, &map).unwrap(), frames);
    }

    #[test]
    fn uninitialized_refers_to_instruction_index() {
        let map = offsets(&[0, 3, 4], 7);
        let frames = vec![StackMapFrame {
            target: 2,
            kind: FrameKind::Full {
                locals: vec![VerificationType::UninitializedThis],
                stack: vec![
                    VerificationType::Uninitialized(0),
                    VerificationType::Uninitialized(0),
                ],
            },
        }];
        let pool = ConstantPool::new();
        let mut builder = PoolBuilder::new(&pool);
        let bytes = write_stack_map(&frames, &mut builder, &map)
            .unwrap()
            .into_inner();
        assert_eq!(read_stack_map(&bytes, &pool, &map).unwrap(), frames);
    }

    #[test]
    fn frame_inside_an_instruction_is_rejected() {
        let map = offsets(&[0, 3], 4);
        let pool = ConstantPool::new();
        assert_eq!(
            read_stack_map(&[0, 1, 1], &pool, &map),
            Err(MalformedInputError::InvalidCodeOffset { offset: 1 })
        );
    }

    #[test]
    fn frames_out_of_order_fail_to_encode() {
        let map = offsets(&[0, 1, 2], 3);
        let frames = vec![
            StackMapFrame {
                target: 2,
                kind: FrameKind::Same,
            },
            StackMapFrame {
                target: 1,
                kind: FrameKind::Same,
            },
        ];
        let pool = ConstantPool::new();
        let mut builder = PoolBuilder::new(&pool);
        assert!(matches!(
            write_stack_map(&frames, &mut builder, &map),
            Err(MalformedInputError::BadAttribute { .. })
        ));
    }

    #[test]
    fn unknown_frame_type_is_rejected() {
        let map = offsets(&[0], 1);
        let pool = ConstantPool::new();
        assert_eq!(
            read_stack_map(&[0, 1, 128], &pool, &map),
            Err(MalformedInputError::UnknownFrameType { frame_type: 128 })
        );
    }
}
