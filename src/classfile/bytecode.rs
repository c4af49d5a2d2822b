//! Code array decoding and layout.
//!
//! Decoding reads opcodes with their exact operand widths and turns branch
//! offsets into instruction indices. Encoding interns operands, lays the
//! instructions out again (switch padding, `ldc` widening, `wide`), and
//! returns the new offset of every instruction so the tables that hang off
//! the code can be re-encoded.

use crate::classfile::bytes::{ByteReader, ByteWriter};
use crate::classfile::errors::{ClassFileResult, MalformedInputError};
use crate::classfile::insn::{InsnIndex, Instruction, Loadable, MemberRef, Opcode, OperandShape};
use crate::classfile::pool::{Constant, ConstantPool, PoolBuilder, PoolIndex};

/// Largest code array the format allows.
pub const MAX_CODE_LEN: usize = 65535;

const WIDE: u8 = 0xc4;

/// Byte offset of every instruction of one method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OffsetMap {
    starts: Vec<usize>,
    code_len: usize,
}

impl OffsetMap {
    pub(crate) fn new(starts: Vec<usize>, code_len: usize) -> Self {
        Self { starts, code_len }
    }

    pub(crate) fn len(&self) -> usize {
        self.starts.len()
    }

    pub(crate) fn code_len(&self) -> usize {
        self.code_len
    }

    /// The instruction starting exactly at `offset`.
    pub(crate) fn insn_at(&self, offset: usize) -> ClassFileResult<InsnIndex> {
        self.starts
            .binary_search(&offset)
            .map_err(|_| MalformedInputError::InvalidCodeOffset { offset })
    }

    /// Like [`OffsetMap::insn_at`], but also accepts the end of the code.
    pub(crate) fn position_at(&self, offset: usize) -> ClassFileResult<InsnIndex> {
        if offset == self.code_len {
            Ok(self.len())
        } else {
            self.insn_at(offset)
        }
    }

    pub(crate) fn insn_offset(&self, index: InsnIndex) -> ClassFileResult<usize> {
        self.starts
            .get(index)
            .copied()
            .ok_or(MalformedInputError::InsnIndexOutOfRange {
                index,
                len: self.len(),
            })
    }

    pub(crate) fn position_offset(&self, index: InsnIndex) -> ClassFileResult<usize> {
        if index == self.len() {
            Ok(self.code_len)
        } else {
            self.insn_offset(index)
        }
    }
}

fn switch_padding(offset: usize) -> usize {
    (4 - (offset + 1) % 4) % 4
}

fn absolute(from: usize, relative: i64) -> ClassFileResult<usize> {
    usize::try_from(from as i64 + relative)
        .map_err(|_| MalformedInputError::InvalidCodeOffset { offset: from })
}

fn unknown(opcode: u8, offset: usize) -> MalformedInputError {
    MalformedInputError::UnknownOpcode { opcode, offset }
}

fn read_loadable(
    pool: &ConstantPool,
    index: PoolIndex,
    opcode: Opcode,
) -> ClassFileResult<Loadable> {
    let wide = opcode == Opcode::Ldc2W;
    let (expected, constant) = if wide {
        ("Long or Double", pool.expect(index, "Long or Double", Constant::is_wide)?)
    } else {
        (
            "single-slot loadable constant",
            pool.expect(index, "single-slot loadable constant", |c| {
                c.is_loadable() && !c.is_wide()
            })?,
        )
    };
    Ok(match constant {
        Constant::Integer(value) => Loadable::Int(*value),
        Constant::Float(bits) => Loadable::Float(*bits),
        Constant::Long(value) => Loadable::Long(*value),
        Constant::Double(bits) => Loadable::Double(*bits),
        Constant::String(utf8) => match pool.canonical_text(*utf8)? {
            Some(text) => Loadable::String(text),
            None => Loadable::Pooled(index),
        },
        Constant::Class(name) => Loadable::Class(pool.utf8(*name)?),
        Constant::MethodType(descriptor) => Loadable::MethodType(pool.utf8(*descriptor)?),
        Constant::MethodHandle { .. } | Constant::Dynamic { .. } => Loadable::Pooled(index),
        other => {
            return Err(MalformedInputError::PoolTypeMismatch {
                index,
                expected,
                found: other.kind(),
            })
        }
    })
}

/// Resolves a member reference, returning whether it names an interface
/// method.
fn read_member(
    pool: &ConstantPool,
    index: PoolIndex,
    shape: OperandShape,
) -> ClassFileResult<(MemberRef, bool)> {
    let (expected, accepts): (&'static str, fn(&Constant) -> bool) = match shape {
        OperandShape::Field => ("Fieldref", |c| matches!(c, Constant::FieldRef { .. })),
        OperandShape::InvokeInterface => ("InterfaceMethodref", |c| {
            matches!(c, Constant::InterfaceMethodRef { .. })
        }),
        _ => ("Methodref or InterfaceMethodref", |c| {
            matches!(
                c,
                Constant::MethodRef { .. } | Constant::InterfaceMethodRef { .. }
            )
        }),
    };
    let (class, name_and_type, interface) = match pool.expect(index, expected, accepts)? {
        Constant::FieldRef {
            class,
            name_and_type,
        }
        | Constant::MethodRef {
            class,
            name_and_type,
        } => (*class, *name_and_type, false),
        Constant::InterfaceMethodRef {
            class,
            name_and_type,
        } => (*class, *name_and_type, true),
        _ => unreachable!("kind checked by expect"),
    };
    let owner = pool.class_name(class)?;
    let (name, descriptor) = pool.name_and_type(name_and_type)?;
    Ok((
        MemberRef {
            owner,
            name,
            descriptor,
        },
        interface,
    ))
}

fn read_one(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
) -> ClassFileResult<Instruction> {
    let at = reader.offset();
    let byte = reader.u8()?;

    if byte == WIDE {
        let inner = reader.u8()?;
        let opcode = Opcode::from_u8(inner).ok_or_else(|| unknown(inner, at + 1))?;
        return match opcode.shape() {
            OperandShape::Local => Ok(Instruction::Local {
                opcode,
                index: reader.u16()?,
            }),
            OperandShape::Iinc => Ok(Instruction::Iinc {
                index: reader.u16()?,
                delta: reader.i16()?,
            }),
            _ => Err(MalformedInputError::InvalidOperandShape {
                mnemonic: opcode.mnemonic(),
                shape: "wide",
            }),
        };
    }

    let opcode = Opcode::from_u8(byte).ok_or_else(|| unknown(byte, at))?;
    let insn = match opcode.shape() {
        OperandShape::None => Instruction::Simple(opcode),
        OperandShape::Push => Instruction::Push {
            opcode,
            value: if opcode == Opcode::Bipush {
                reader.i8()? as i16
            } else {
                reader.i16()?
            },
        },
        OperandShape::Local => Instruction::Local {
            opcode,
            index: reader.u8()? as u16,
        },
        OperandShape::Iinc => Instruction::Iinc {
            index: reader.u8()? as u16,
            delta: reader.i8()? as i16,
        },
        OperandShape::Constant => {
            let index = if opcode == Opcode::Ldc {
                reader.u8()? as u16
            } else {
                reader.u16()?
            };
            Instruction::Constant {
                opcode,
                value: read_loadable(pool, index, opcode)?,
            }
        }
        OperandShape::Field => Instruction::Field {
            opcode,
            field: read_member(pool, reader.u16()?, OperandShape::Field)?.0,
        },
        OperandShape::Method => {
            let (method, interface) = read_member(pool, reader.u16()?, OperandShape::Method)?;
            Instruction::Method {
                opcode,
                method,
                interface,
            }
        }
        OperandShape::InvokeInterface => {
            let (method, _) = read_member(pool, reader.u16()?, OperandShape::InvokeInterface)?;
            let count = reader.u8()?;
            reader.skip(1)?;
            Instruction::InvokeInterface { method, count }
        }
        OperandShape::InvokeDynamic => {
            let index = reader.u16()?;
            pool.expect(index, "InvokeDynamic", |c| {
                matches!(c, Constant::InvokeDynamic { .. })
            })?;
            reader.skip(2)?;
            Instruction::InvokeDynamic { index }
        }
        OperandShape::Type => Instruction::Type {
            opcode,
            class: pool.class_name(reader.u16()?)?,
        },
        OperandShape::NewArray => Instruction::NewArray {
            atype: reader.u8()?,
        },
        OperandShape::MultiANewArray => Instruction::MultiANewArray {
            class: pool.class_name(reader.u16()?)?,
            dimensions: reader.u8()?,
        },
        OperandShape::Jump => {
            let relative = match opcode {
                Opcode::GotoW | Opcode::JsrW => reader.i32()? as i64,
                _ => reader.i16()? as i64,
            };
            Instruction::Jump {
                opcode,
                target: absolute(at, relative)?,
            }
        }
        OperandShape::TableSwitch => {
            reader.skip(switch_padding(at))?;
            let default = absolute(at, reader.i32()? as i64)?;
            let low = reader.i32()?;
            let high = reader.i32()?;
            if high < low {
                return Err(MalformedInputError::BadAttribute {
                    attribute: "Code",
                    reason: format!("tableswitch at {at} has high {high} below low {low}"),
                });
            }
            let count = (high as i64 - low as i64 + 1) as usize;
            if count > reader.remaining() / 4 {
                return Err(MalformedInputError::Truncated {
                    offset: reader.offset(),
                    needed: count * 4 - reader.remaining(),
                });
            }
            let targets = (0..count)
                .map(|_| absolute(at, reader.i32()? as i64))
                .collect::<ClassFileResult<_>>()?;
            Instruction::TableSwitch {
                default,
                low,
                targets,
            }
        }
        OperandShape::LookupSwitch => {
            reader.skip(switch_padding(at))?;
            let default = absolute(at, reader.i32()? as i64)?;
            let count = reader.i32()?;
            let count = usize::try_from(count).map_err(|_| MalformedInputError::BadAttribute {
                attribute: "Code",
                reason: format!("lookupswitch at {at} has {count} pairs"),
            })?;
            if count > reader.remaining() / 8 {
                return Err(MalformedInputError::Truncated {
                    offset: reader.offset(),
                    needed: count * 8 - reader.remaining(),
                });
            }
            let pairs = (0..count)
                .map(|_| {
                    let key = reader.i32()?;
                    Ok((key, absolute(at, reader.i32()? as i64)?))
                })
                .collect::<ClassFileResult<_>>()?;
            Instruction::LookupSwitch { default, pairs }
        }
    };
    Ok(insn)
}

/// Decodes a code array into instructions plus the offset of each one.
pub(crate) fn decode_code(
    code: &[u8],
    pool: &ConstantPool,
) -> ClassFileResult<(Vec<Instruction>, OffsetMap)> {
    if code.len() > MAX_CODE_LEN {
        return Err(MalformedInputError::CodeTooLarge { len: code.len() });
    }
    let mut reader = ByteReader::new(code);
    let mut starts = Vec::new();
    let mut raw = Vec::new();
    while reader.remaining() > 0 {
        starts.push(reader.offset());
        raw.push(read_one(&mut reader, pool)?);
    }
    let offsets = OffsetMap::new(starts, code.len());

    // Jumps were read with absolute byte offsets in place of indices.
    let instructions = raw
        .into_iter()
        .map(|insn| insn.try_map_targets(|offset| offsets.insn_at(offset)))
        .collect::<ClassFileResult<Vec<_>>>()?;
    Ok((instructions, offsets))
}

fn intern_loadable(
    pool: &mut PoolBuilder,
    value: &Loadable,
    opcode: Opcode,
) -> ClassFileResult<PoolIndex> {
    let index = match value {
        Loadable::Int(value) => pool.intern(Constant::Integer(*value))?,
        Loadable::Float(bits) => pool.intern(Constant::Float(*bits))?,
        Loadable::Long(value) => pool.intern(Constant::Long(*value))?,
        Loadable::Double(bits) => pool.intern(Constant::Double(*bits))?,
        Loadable::String(text) => pool.string(text)?,
        Loadable::Class(name) => pool.class(name)?,
        Loadable::MethodType(descriptor) => pool.method_type(descriptor)?,
        Loadable::Pooled(index) => *index,
    };
    if opcode == Opcode::Ldc2W {
        pool.check(index, "Long or Double", Constant::is_wide)
    } else {
        pool.check(index, "single-slot loadable constant", |c| {
            c.is_loadable() && !c.is_wide()
        })
    }
}

fn intern_member(
    pool: &mut PoolBuilder,
    member: &MemberRef,
    shape: OperandShape,
    interface: bool,
) -> ClassFileResult<PoolIndex> {
    let class = pool.class(&member.owner)?;
    let name_and_type = pool.name_and_type(&member.name, &member.descriptor)?;
    let constant = match shape {
        OperandShape::Field => Constant::FieldRef {
            class,
            name_and_type,
        },
        _ if interface => Constant::InterfaceMethodRef {
            class,
            name_and_type,
        },
        _ => Constant::MethodRef {
            class,
            name_and_type,
        },
    };
    pool.intern(constant)
}

/// Checks the variant against its opcode and interns any pool operand.
fn resolve(insn: &Instruction, pool: &mut PoolBuilder) -> ClassFileResult<Option<PoolIndex>> {
    let opcode = insn.opcode();
    if opcode.shape() != insn.shape() {
        return Err(MalformedInputError::InvalidOperandShape {
            mnemonic: opcode.mnemonic(),
            shape: insn.shape().name(),
        });
    }
    let index = match insn {
        Instruction::Push {
            opcode: Opcode::Bipush,
            value,
        } if i8::try_from(*value).is_err() => {
            return Err(MalformedInputError::InvalidOperandShape {
                mnemonic: "bipush",
                shape: "value outside -128..=127",
            })
        }
        Instruction::Constant { opcode, value } => intern_loadable(pool, value, *opcode)?,
        Instruction::Field { field, .. } => {
            intern_member(pool, field, OperandShape::Field, false)?
        }
        Instruction::Method {
            method, interface, ..
        } => intern_member(pool, method, OperandShape::Method, *interface)?,
        Instruction::InvokeInterface { method, .. } => {
            intern_member(pool, method, OperandShape::InvokeInterface, true)?
        }
        Instruction::InvokeDynamic { index } => pool.check(*index, "InvokeDynamic", |c| {
            matches!(c, Constant::InvokeDynamic { .. })
        })?,
        Instruction::Type { class, .. } | Instruction::MultiANewArray { class, .. } => {
            pool.class(class)?
        }
        Instruction::TableSwitch { targets, .. } if targets.is_empty() => {
            return Err(MalformedInputError::InvalidOperandShape {
                mnemonic: "tableswitch",
                shape: "empty table",
            })
        }
        _ => return Ok(None),
    };
    Ok(Some(index))
}

fn narrow_local(index: u16) -> bool {
    index <= u8::MAX as u16
}

fn encoded_len(insn: &Instruction, resolved: Option<PoolIndex>, offset: usize) -> usize {
    match insn {
        Instruction::Simple(_) => 1,
        Instruction::Push { opcode, .. } => {
            if *opcode == Opcode::Bipush {
                2
            } else {
                3
            }
        }
        Instruction::Local { index, .. } => {
            if narrow_local(*index) {
                2
            } else {
                4
            }
        }
        Instruction::Iinc { index, delta } => {
            if narrow_local(*index) && i8::try_from(*delta).is_ok() {
                3
            } else {
                6
            }
        }
        Instruction::Constant { opcode, .. } => match (opcode, resolved) {
            (Opcode::Ldc, Some(index)) if index <= u8::MAX as u16 => 2,
            _ => 3,
        },
        Instruction::Field { .. } | Instruction::Method { .. } | Instruction::Type { .. } => 3,
        Instruction::InvokeInterface { .. } | Instruction::InvokeDynamic { .. } => 5,
        Instruction::NewArray { .. } => 2,
        Instruction::MultiANewArray { .. } => 4,
        Instruction::Jump { opcode, .. } => match opcode {
            Opcode::GotoW | Opcode::JsrW => 5,
            _ => 3,
        },
        Instruction::TableSwitch { targets, .. } => {
            1 + switch_padding(offset) + 12 + 4 * targets.len()
        }
        Instruction::LookupSwitch { pairs, .. } => {
            1 + switch_padding(offset) + 8 + 8 * pairs.len()
        }
    }
}

fn relative_i32(from: usize, target: InsnIndex, offsets: &OffsetMap) -> ClassFileResult<i32> {
    let to = offsets.insn_offset(target)?;
    // Both offsets are bounded by MAX_CODE_LEN.
    Ok(to as i32 - from as i32)
}

fn write_one(
    out: &mut ByteWriter,
    insn: &Instruction,
    resolved: Option<PoolIndex>,
    at: usize,
    offsets: &OffsetMap,
) -> ClassFileResult<()> {
    let opcode = insn.opcode();
    let pool_index = || {
        resolved.ok_or(MalformedInputError::InvalidOperandShape {
            mnemonic: opcode.mnemonic(),
            shape: "unresolved pool operand",
        })
    };

    match insn {
        Instruction::Simple(_) => out.u8(opcode as u8),
        Instruction::Push { value, .. } => {
            out.u8(opcode as u8);
            if opcode == Opcode::Bipush {
                out.u8(*value as i8 as u8);
            } else {
                out.i16(*value);
            }
        }
        Instruction::Local { index, .. } => {
            if narrow_local(*index) {
                out.u8(opcode as u8);
                out.u8(*index as u8);
            } else {
                out.u8(WIDE);
                out.u8(opcode as u8);
                out.u16(*index);
            }
        }
        Instruction::Iinc { index, delta } => {
            if narrow_local(*index) && i8::try_from(*delta).is_ok() {
                out.u8(opcode as u8);
                out.u8(*index as u8);
                out.u8(*delta as i8 as u8);
            } else {
                out.u8(WIDE);
                out.u8(opcode as u8);
                out.u16(*index);
                out.i16(*delta);
            }
        }
        Instruction::Constant { .. } => {
            let index = pool_index()?;
            match opcode {
                Opcode::Ldc if index <= u8::MAX as u16 => {
                    out.u8(Opcode::Ldc as u8);
                    out.u8(index as u8);
                }
                Opcode::Ldc => {
                    out.u8(Opcode::LdcW as u8);
                    out.u16(index);
                }
                _ => {
                    out.u8(opcode as u8);
                    out.u16(index);
                }
            }
        }
        Instruction::Field { .. } | Instruction::Method { .. } | Instruction::Type { .. } => {
            out.u8(opcode as u8);
            out.u16(pool_index()?);
        }
        Instruction::InvokeInterface { count, .. } => {
            out.u8(opcode as u8);
            out.u16(pool_index()?);
            out.u8(*count);
            out.u8(0);
        }
        Instruction::InvokeDynamic { .. } => {
            out.u8(opcode as u8);
            out.u16(pool_index()?);
            out.u16(0);
        }
        Instruction::NewArray { atype } => {
            out.u8(opcode as u8);
            out.u8(*atype);
        }
        Instruction::MultiANewArray { dimensions, .. } => {
            out.u8(opcode as u8);
            out.u16(pool_index()?);
            out.u8(*dimensions);
        }
        Instruction::Jump { target, .. } => {
            let relative = relative_i32(at, *target, offsets)?;
            out.u8(opcode as u8);
            match opcode {
                Opcode::GotoW | Opcode::JsrW => out.i32(relative),
                _ => {
                    let short = i16::try_from(relative).map_err(|_| {
                        MalformedInputError::BranchOutOfRange {
                            from: at,
                            to: (at as i64 + relative as i64) as usize,
                        }
                    })?;
                    out.i16(short);
                }
            }
        }
        Instruction::TableSwitch {
            default,
            low,
            targets,
        } => {
            out.u8(opcode as u8);
            out.bytes(&[0; 3][..switch_padding(at)]);
            out.i32(relative_i32(at, *default, offsets)?);
            let high = i32::try_from(targets.len() - 1)
                .ok()
                .and_then(|span| low.checked_add(span))
                .ok_or(MalformedInputError::TooMany {
                    what: "tableswitch target",
                    count: targets.len(),
                })?;
            out.i32(*low);
            out.i32(high);
            for target in targets {
                out.i32(relative_i32(at, *target, offsets)?);
            }
        }
        Instruction::LookupSwitch { default, pairs } => {
            out.u8(opcode as u8);
            out.bytes(&[0; 3][..switch_padding(at)]);
            out.i32(relative_i32(at, *default, offsets)?);
            out.i32(pairs.len() as i32);
            for (key, target) in pairs {
                out.i32(*key);
                out.i32(relative_i32(at, *target, offsets)?);
            }
        }
    }
    Ok(())
}

/// Lays out and encodes instructions, interning their operands.
pub(crate) fn encode_code(
    instructions: &[Instruction],
    pool: &mut PoolBuilder,
) -> ClassFileResult<(Vec<u8>, OffsetMap)> {
    let resolved = instructions
        .iter()
        .map(|insn| resolve(insn, pool))
        .collect::<ClassFileResult<Vec<_>>>()?;

    let mut starts = Vec::with_capacity(instructions.len());
    let mut offset = 0;
    for (insn, index) in instructions.iter().zip(&resolved) {
        starts.push(offset);
        offset += encoded_len(insn, *index, offset);
        if offset > MAX_CODE_LEN {
            return Err(MalformedInputError::CodeTooLarge { len: offset });
        }
    }
    let offsets = OffsetMap::new(starts, offset);

    let mut out = ByteWriter::with_capacity(offset);
    for (position, (insn, index)) in instructions.iter().zip(&resolved).enumerate() {
        write_one(&mut out, insn, *index, offsets.insn_offset(position)?, &offsets)?;
    }
    debug_assert_eq!(out.len(), offsets.code_len());
    Ok((out.into_inner(), offsets))
}
