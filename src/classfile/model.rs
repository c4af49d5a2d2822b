//! Structural tree model of one class file.

use crate::classfile::frames::StackMapFrame;
use crate::classfile::insn::{InsnIndex, Instruction};
use crate::classfile::pool::{ConstantPool, PoolIndex};
use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClassAccess: u16 {
        const PUBLIC = 0x0001;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const MODULE = 0x8000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FieldAccess: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const VOLATILE = 0x0040;
        const TRANSIENT = 0x0080;
        const SYNTHETIC = 0x1000;
        const ENUM = 0x4000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MethodAccess: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const BRIDGE = 0x0040;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
    }
}

/// An attribute the codec carries through without interpreting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttribute {
    pub name: String,
    pub info: Vec<u8>,
}

/// Value of a field's `ConstantValue` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstantValue {
    Int(i32),
    Long(i64),
    Float(u32),
    Double(u64),
    String(String),
    /// A String entry whose text does not decode to a Rust string.
    Pooled(PoolIndex),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassModel {
    pub minor_version: u16,
    pub major_version: u16,
    pub pool: ConstantPool,
    pub access: ClassAccess,
    /// Internal form, e.g. `com/sun/glass/ui/Application`.
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldModel>,
    pub methods: Vec<MethodModel>,
    pub attributes: Vec<RawAttribute>,
}

impl ClassModel {
    pub fn field(&self, name: &str) -> Option<&FieldModel> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut FieldModel> {
        self.fields.iter_mut().find(|field| field.name == name)
    }

    /// All overloads sharing `name`.
    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodModel> {
        self.methods.iter().filter(move |method| method.name == name)
    }

    pub fn methods_named_mut<'a>(
        &'a mut self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a mut MethodModel> {
        self.methods
            .iter_mut()
            .filter(move |method| method.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldModel {
    pub access: FieldAccess,
    pub name: String,
    pub descriptor: String,
    pub constant_value: Option<ConstantValue>,
    pub attributes: Vec<RawAttribute>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodModel {
    pub access: MethodAccess,
    pub name: String,
    pub descriptor: String,
    pub code: Option<Code>,
    pub attributes: Vec<RawAttribute>,
}

impl MethodModel {
    /// Empty for abstract and native methods.
    pub fn instructions(&self) -> &[Instruction] {
        self.code
            .as_ref()
            .map(|code| code.instructions.as_slice())
            .unwrap_or(&[])
    }
}

/// Body of a method. Every position is an instruction index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub instructions: Vec<Instruction>,
    pub exception_table: Vec<ExceptionHandler>,
    pub line_numbers: Vec<LineNumber>,
    pub local_variables: Vec<LocalVariable>,
    pub local_variable_types: Vec<LocalVariable>,
    pub frames: Vec<StackMapFrame>,
    pub attributes: Vec<RawAttribute>,
}

impl Code {
    /// Drops everything that refers to instruction positions, keeping only the
    /// stack and local limits.
    pub fn replace_body(&mut self, instructions: Vec<Instruction>) {
        self.instructions = instructions;
        self.exception_table.clear();
        self.line_numbers.clear();
        self.local_variables.clear();
        self.local_variable_types.clear();
        self.frames.clear();
        self.attributes.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    pub start: InsnIndex,
    /// Exclusive.
    pub end: InsnIndex,
    pub handler: InsnIndex,
    /// `None` catches everything (`finally`).
    pub catch_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumber {
    pub start: InsnIndex,
    pub line: u16,
}

/// Entry of a `LocalVariableTable` or `LocalVariableTypeTable`. Name and
/// descriptor (or signature) stay as pool indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalVariable {
    pub start: InsnIndex,
    /// Exclusive.
    pub end: InsnIndex,
    pub name: PoolIndex,
    pub descriptor: PoolIndex,
    pub index: u16,
}
