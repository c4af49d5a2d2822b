//! The constant pool ("symbol pool") and the interner used while encoding.
//!
//! Decoding keeps every entry at its original index. Encoding starts from a
//! copy of that pool and only ever appends, so raw attributes that carry pool
//! indices (signatures, annotations, bootstrap methods) stay valid.

use crate::classfile::bytes::{ByteReader, ByteWriter};
use crate::classfile::errors::{ClassFileResult, MalformedInputError};
use std::collections::HashMap;

pub type PoolIndex = u16;

const TAG_UTF8: u8 = 1;
const TAG_INTEGER: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_LONG: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_CLASS: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_FIELD_REF: u8 = 9;
const TAG_METHOD_REF: u8 = 10;
const TAG_INTERFACE_METHOD_REF: u8 = 11;
const TAG_NAME_AND_TYPE: u8 = 12;
const TAG_METHOD_HANDLE: u8 = 15;
const TAG_METHOD_TYPE: u8 = 16;
const TAG_DYNAMIC: u8 = 17;
const TAG_INVOKE_DYNAMIC: u8 = 18;
const TAG_MODULE: u8 = 19;
const TAG_PACKAGE: u8 = 20;

/// One constant pool entry.
///
/// Text is kept as the stored modified UTF-8 bytes and floating point values
/// as raw bits, so a decoded pool writes back byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    Utf8(Vec<u8>),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class(PoolIndex),
    String(PoolIndex),
    FieldRef {
        class: PoolIndex,
        name_and_type: PoolIndex,
    },
    MethodRef {
        class: PoolIndex,
        name_and_type: PoolIndex,
    },
    InterfaceMethodRef {
        class: PoolIndex,
        name_and_type: PoolIndex,
    },
    NameAndType {
        name: PoolIndex,
        descriptor: PoolIndex,
    },
    MethodHandle {
        kind: u8,
        reference: PoolIndex,
    },
    MethodType(PoolIndex),
    Dynamic {
        bootstrap: u16,
        name_and_type: PoolIndex,
    },
    InvokeDynamic {
        bootstrap: u16,
        name_and_type: PoolIndex,
    },
    Module(PoolIndex),
    Package(PoolIndex),
}

impl Constant {
    pub fn kind(&self) -> &'static str {
        match self {
            Constant::Utf8(_) => "Utf8",
            Constant::Integer(_) => "Integer",
            Constant::Float(_) => "Float",
            Constant::Long(_) => "Long",
            Constant::Double(_) => "Double",
            Constant::Class(_) => "Class",
            Constant::String(_) => "String",
            Constant::FieldRef { .. } => "Fieldref",
            Constant::MethodRef { .. } => "Methodref",
            Constant::InterfaceMethodRef { .. } => "InterfaceMethodref",
            Constant::NameAndType { .. } => "NameAndType",
            Constant::MethodHandle { .. } => "MethodHandle",
            Constant::MethodType(_) => "MethodType",
            Constant::Dynamic { .. } => "Dynamic",
            Constant::InvokeDynamic { .. } => "InvokeDynamic",
            Constant::Module(_) => "Module",
            Constant::Package(_) => "Package",
        }
    }

    /// Long and Double occupy two pool slots.
    pub fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }

    /// Entries an `ldc` family instruction may push.
    pub fn is_loadable(&self) -> bool {
        matches!(
            self,
            Constant::Integer(_)
                | Constant::Float(_)
                | Constant::Long(_)
                | Constant::Double(_)
                | Constant::Class(_)
                | Constant::String(_)
                | Constant::MethodHandle { .. }
                | Constant::MethodType(_)
                | Constant::Dynamic { .. }
        )
    }

    /// Entries a `ConstantValue` attribute may name.
    pub fn is_field_constant(&self) -> bool {
        matches!(
            self,
            Constant::Integer(_)
                | Constant::Float(_)
                | Constant::Long(_)
                | Constant::Double(_)
                | Constant::String(_)
        )
    }

    /// Entries only ever reference entries of a lower level.
    fn level(&self) -> u8 {
        match self {
            Constant::Utf8(_)
            | Constant::Integer(_)
            | Constant::Float(_)
            | Constant::Long(_)
            | Constant::Double(_) => 0,
            Constant::Class(_)
            | Constant::String(_)
            | Constant::MethodType(_)
            | Constant::Module(_)
            | Constant::Package(_)
            | Constant::NameAndType { .. } => 1,
            Constant::FieldRef { .. }
            | Constant::MethodRef { .. }
            | Constant::InterfaceMethodRef { .. }
            | Constant::Dynamic { .. }
            | Constant::InvokeDynamic { .. } => 2,
            Constant::MethodHandle { .. } => 3,
        }
    }

    /// Rewrites every nested pool index. Bootstrap method indices are not pool
    /// indices and are left alone.
    fn map_refs(&self, f: impl Fn(PoolIndex) -> PoolIndex) -> Constant {
        match self {
            Constant::Class(name) => Constant::Class(f(*name)),
            Constant::String(utf8) => Constant::String(f(*utf8)),
            Constant::MethodType(utf8) => Constant::MethodType(f(*utf8)),
            Constant::Module(name) => Constant::Module(f(*name)),
            Constant::Package(name) => Constant::Package(f(*name)),
            Constant::NameAndType { name, descriptor } => Constant::NameAndType {
                name: f(*name),
                descriptor: f(*descriptor),
            },
            Constant::FieldRef {
                class,
                name_and_type,
            } => Constant::FieldRef {
                class: f(*class),
                name_and_type: f(*name_and_type),
            },
            Constant::MethodRef {
                class,
                name_and_type,
            } => Constant::MethodRef {
                class: f(*class),
                name_and_type: f(*name_and_type),
            },
            Constant::InterfaceMethodRef {
                class,
                name_and_type,
            } => Constant::InterfaceMethodRef {
                class: f(*class),
                name_and_type: f(*name_and_type),
            },
            Constant::MethodHandle { kind, reference } => Constant::MethodHandle {
                kind: *kind,
                reference: f(*reference),
            },
            Constant::Dynamic {
                bootstrap,
                name_and_type,
            } => Constant::Dynamic {
                bootstrap: *bootstrap,
                name_and_type: f(*name_and_type),
            },
            Constant::InvokeDynamic {
                bootstrap,
                name_and_type,
            } => Constant::InvokeDynamic {
                bootstrap: *bootstrap,
                name_and_type: f(*name_and_type),
            },
            leaf => leaf.clone(),
        }
    }

    fn read(reader: &mut ByteReader<'_>, index: PoolIndex) -> ClassFileResult<Self> {
        let tag = reader.u8()?;
        let constant = match tag {
            TAG_UTF8 => {
                let len = reader.u16()? as usize;
                let bytes = reader.bytes(len)?;
                // Modified UTF-8 never stores a raw NUL.
                if bytes.contains(&0) {
                    return Err(MalformedInputError::InvalidUtf8 { index });
                }
                Constant::Utf8(bytes.to_vec())
            }
            TAG_INTEGER => Constant::Integer(reader.i32()?),
            TAG_FLOAT => Constant::Float(reader.u32()?),
            TAG_LONG => Constant::Long(reader.u64()? as i64),
            TAG_DOUBLE => Constant::Double(reader.u64()?),
            TAG_CLASS => Constant::Class(reader.u16()?),
            TAG_STRING => Constant::String(reader.u16()?),
            TAG_FIELD_REF => Constant::FieldRef {
                class: reader.u16()?,
                name_and_type: reader.u16()?,
            },
            TAG_METHOD_REF => Constant::MethodRef {
                class: reader.u16()?,
                name_and_type: reader.u16()?,
            },
            TAG_INTERFACE_METHOD_REF => Constant::InterfaceMethodRef {
                class: reader.u16()?,
                name_and_type: reader.u16()?,
            },
            TAG_NAME_AND_TYPE => Constant::NameAndType {
                name: reader.u16()?,
                descriptor: reader.u16()?,
            },
            TAG_METHOD_HANDLE => Constant::MethodHandle {
                kind: reader.u8()?,
                reference: reader.u16()?,
            },
            TAG_METHOD_TYPE => Constant::MethodType(reader.u16()?),
            TAG_DYNAMIC => Constant::Dynamic {
                bootstrap: reader.u16()?,
                name_and_type: reader.u16()?,
            },
            TAG_INVOKE_DYNAMIC => Constant::InvokeDynamic {
                bootstrap: reader.u16()?,
                name_and_type: reader.u16()?,
            },
            TAG_MODULE => Constant::Module(reader.u16()?),
            TAG_PACKAGE => Constant::Package(reader.u16()?),
            tag => return Err(MalformedInputError::UnknownConstantTag { tag, index }),
        };
        Ok(constant)
    }

    fn write(&self, out: &mut ByteWriter) -> ClassFileResult<()> {
        match self {
            Constant::Utf8(bytes) => {
                out.u8(TAG_UTF8);
                out.count("Utf8 byte", bytes.len())?;
                out.bytes(bytes);
            }
            Constant::Integer(value) => {
                out.u8(TAG_INTEGER);
                out.i32(*value);
            }
            Constant::Float(bits) => {
                out.u8(TAG_FLOAT);
                out.u32(*bits);
            }
            Constant::Long(value) => {
                out.u8(TAG_LONG);
                out.u64(*value as u64);
            }
            Constant::Double(bits) => {
                out.u8(TAG_DOUBLE);
                out.u64(*bits);
            }
            Constant::Class(name) => {
                out.u8(TAG_CLASS);
                out.u16(*name);
            }
            Constant::String(utf8) => {
                out.u8(TAG_STRING);
                out.u16(*utf8);
            }
            Constant::FieldRef {
                class,
                name_and_type,
            } => {
                out.u8(TAG_FIELD_REF);
                out.u16(*class);
                out.u16(*name_and_type);
            }
            Constant::MethodRef {
                class,
                name_and_type,
            } => {
                out.u8(TAG_METHOD_REF);
                out.u16(*class);
                out.u16(*name_and_type);
            }
            Constant::InterfaceMethodRef {
                class,
                name_and_type,
            } => {
                out.u8(TAG_INTERFACE_METHOD_REF);
                out.u16(*class);
                out.u16(*name_and_type);
            }
            Constant::NameAndType { name, descriptor } => {
                out.u8(TAG_NAME_AND_TYPE);
                out.u16(*name);
                out.u16(*descriptor);
            }
            Constant::MethodHandle { kind, reference } => {
                out.u8(TAG_METHOD_HANDLE);
                out.u8(*kind);
                out.u16(*reference);
            }
            Constant::MethodType(descriptor) => {
                out.u8(TAG_METHOD_TYPE);
                out.u16(*descriptor);
            }
            Constant::Dynamic {
                bootstrap,
                name_and_type,
            } => {
                out.u8(TAG_DYNAMIC);
                out.u16(*bootstrap);
                out.u16(*name_and_type);
            }
            Constant::InvokeDynamic {
                bootstrap,
                name_and_type,
            } => {
                out.u8(TAG_INVOKE_DYNAMIC);
                out.u16(*bootstrap);
                out.u16(*name_and_type);
            }
            Constant::Module(name) => {
                out.u8(TAG_MODULE);
                out.u16(*name);
            }
            Constant::Package(name) => {
                out.u8(TAG_PACKAGE);
                out.u16(*name);
            }
        }
        Ok(())
    }
}

/// Index-preserving constant pool. Slot 0 and the slot after every Long or
/// Double are unusable and hold `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantPool {
    slots: Vec<Option<Constant>>,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantPool {
    pub fn new() -> Self {
        Self { slots: vec![None] }
    }

    /// Number of slots including the reserved slot 0, i.e. the
    /// `constant_pool_count` written to the class file.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PoolIndex, &Constant)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|c| (index as PoolIndex, c)))
    }

    /// Appends an entry, returning its index.
    pub fn push(&mut self, constant: Constant) -> ClassFileResult<PoolIndex> {
        let width = if constant.is_wide() { 2 } else { 1 };
        if self.slots.len() + width > u16::MAX as usize {
            return Err(MalformedInputError::PoolOverflow);
        }
        let index = self.slots.len() as PoolIndex;
        self.slots.push(Some(constant));
        if width == 2 {
            self.slots.push(None);
        }
        Ok(index)
    }

    pub fn get(&self, index: PoolIndex) -> ClassFileResult<&Constant> {
        match self.slots.get(index as usize) {
            Some(Some(constant)) => Ok(constant),
            _ => Err(MalformedInputError::PoolIndexOutOfRange {
                index,
                len: self.slots.len(),
            }),
        }
    }

    /// Fetches an entry and checks its kind in one step.
    pub fn expect(
        &self,
        index: PoolIndex,
        expected: &'static str,
        accepts: impl Fn(&Constant) -> bool,
    ) -> ClassFileResult<&Constant> {
        let constant = self.get(index)?;
        if accepts(constant) {
            Ok(constant)
        } else {
            Err(MalformedInputError::PoolTypeMismatch {
                index,
                expected,
                found: constant.kind(),
            })
        }
    }

    pub fn utf8_bytes(&self, index: PoolIndex) -> ClassFileResult<&[u8]> {
        match self.expect(index, "Utf8", |c| matches!(c, Constant::Utf8(_)))? {
            Constant::Utf8(bytes) => Ok(bytes),
            _ => unreachable!("kind checked by expect"),
        }
    }

    /// Decodes a Utf8 entry into a Rust string.
    pub fn utf8(&self, index: PoolIndex) -> ClassFileResult<String> {
        let bytes = self.utf8_bytes(index)?;
        if bytes.contains(&0) {
            return Err(MalformedInputError::InvalidUtf8 { index });
        }
        cesu8::from_java_cesu8(bytes)
            .map(|text| text.into_owned())
            .map_err(|_| MalformedInputError::InvalidUtf8 { index })
    }

    /// Like [`ConstantPool::utf8`], but yields `None` when the stored bytes do
    /// not decode, or would not be reproduced exactly by re-encoding the text.
    pub fn canonical_text(&self, index: PoolIndex) -> ClassFileResult<Option<String>> {
        let bytes = self.utf8_bytes(index)?;
        Ok(cesu8::from_java_cesu8(bytes)
            .ok()
            .filter(|text| cesu8::to_java_cesu8(text).as_ref() == bytes)
            .map(|text| text.into_owned()))
    }

    pub fn class_name(&self, index: PoolIndex) -> ClassFileResult<String> {
        match self.expect(index, "Class", |c| matches!(c, Constant::Class(_)))? {
            Constant::Class(name) => self.utf8(*name),
            _ => unreachable!("kind checked by expect"),
        }
    }

    pub fn optional_class_name(&self, index: PoolIndex) -> ClassFileResult<Option<String>> {
        if index == 0 {
            return Ok(None);
        }
        self.class_name(index).map(Some)
    }

    pub fn name_and_type(&self, index: PoolIndex) -> ClassFileResult<(String, String)> {
        match self.expect(index, "NameAndType", |c| {
            matches!(c, Constant::NameAndType { .. })
        })? {
            Constant::NameAndType { name, descriptor } => {
                Ok((self.utf8(*name)?, self.utf8(*descriptor)?))
            }
            _ => unreachable!("kind checked by expect"),
        }
    }

    pub(crate) fn read(reader: &mut ByteReader<'_>) -> ClassFileResult<Self> {
        let count = reader.u16()?;
        let mut slots = Vec::with_capacity(count as usize);
        slots.push(None);
        while slots.len() < count as usize {
            let index = slots.len() as PoolIndex;
            let constant = Constant::read(reader, index)?;
            let wide = constant.is_wide();
            slots.push(Some(constant));
            if wide {
                if slots.len() >= count as usize {
                    return Err(MalformedInputError::PoolIndexOutOfRange {
                        index: index + 1,
                        len: count as usize,
                    });
                }
                slots.push(None);
            }
        }
        Ok(Self { slots })
    }

    pub(crate) fn write(&self, out: &mut ByteWriter) -> ClassFileResult<()> {
        out.count("constant pool slot", self.slots.len())?;
        for constant in self.slots.iter().flatten() {
            constant.write(out)?;
        }
        Ok(())
    }
}

/// Append-only interner over a copy of a decoded pool.
///
/// Lookups reuse the first existing entry with equivalent content, so an
/// unedited model interns nothing new. Entries are keyed with their nested
/// indices resolved to the first equivalent entry, which lets a `Class`
/// pointing at a duplicate Utf8 still match `class(name)`.
#[derive(Debug)]
pub(crate) struct PoolBuilder {
    pool: ConstantPool,
    lookup: HashMap<Constant, PoolIndex>,
    /// Slot index to the first equivalent entry's index.
    canonical: Vec<PoolIndex>,
}

impl PoolBuilder {
    pub(crate) fn new(base: &ConstantPool) -> Self {
        let mut builder = Self {
            pool: base.clone(),
            lookup: HashMap::with_capacity(base.slot_count()),
            canonical: (0..base.slot_count()).map(|slot| slot as PoolIndex).collect(),
        };
        for level in 0..=3 {
            for (index, constant) in base.iter().filter(|(_, c)| c.level() == level) {
                let key = builder.key(constant);
                let first = *builder.lookup.entry(key).or_insert(index);
                builder.canonical[index as usize] = first;
            }
        }
        builder
    }

    fn key(&self, constant: &Constant) -> Constant {
        constant.map_refs(|nested| {
            self.canonical
                .get(nested as usize)
                .copied()
                .unwrap_or(nested)
        })
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &ConstantPool {
        &self.pool
    }

    pub(crate) fn into_pool(self) -> ConstantPool {
        self.pool
    }

    pub(crate) fn intern(&mut self, constant: Constant) -> ClassFileResult<PoolIndex> {
        let key = self.key(&constant);
        if let Some(index) = self.lookup.get(&key) {
            return Ok(*index);
        }
        let index = self.pool.push(constant)?;
        self.lookup.insert(key, index);
        self.canonical.resize(self.pool.slot_count(), index);
        Ok(index)
    }

    pub(crate) fn utf8(&mut self, text: &str) -> ClassFileResult<PoolIndex> {
        let bytes = cesu8::to_java_cesu8(text).into_owned();
        self.intern(Constant::Utf8(bytes))
    }

    pub(crate) fn class(&mut self, name: &str) -> ClassFileResult<PoolIndex> {
        let name = self.utf8(name)?;
        self.intern(Constant::Class(name))
    }

    pub(crate) fn string(&mut self, text: &str) -> ClassFileResult<PoolIndex> {
        let utf8 = self.utf8(text)?;
        self.intern(Constant::String(utf8))
    }

    pub(crate) fn method_type(&mut self, descriptor: &str) -> ClassFileResult<PoolIndex> {
        let utf8 = self.utf8(descriptor)?;
        self.intern(Constant::MethodType(utf8))
    }

    pub(crate) fn name_and_type(
        &mut self,
        name: &str,
        descriptor: &str,
    ) -> ClassFileResult<PoolIndex> {
        let name = self.utf8(name)?;
        let descriptor = self.utf8(descriptor)?;
        self.intern(Constant::NameAndType { name, descriptor })
    }

    /// Checks that a raw index carried by the model still names a live entry.
    pub(crate) fn check(
        &self,
        index: PoolIndex,
        expected: &'static str,
        accepts: impl Fn(&Constant) -> bool,
    ) -> ClassFileResult<PoolIndex> {
        self.pool.expect(index, expected, accepts).map(|_| index)
    }
}
