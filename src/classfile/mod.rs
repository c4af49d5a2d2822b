//! Class file codec.
//!
//! [`decode`] turns bytes into a [`ClassModel`]; [`encode`] turns a model back
//! into bytes. For any valid input `b`, `decode(&encode(&decode(b)?)?)?` equals
//! `decode(b)?`.

mod bytecode;
mod bytes;
pub mod errors;
pub mod frames;
pub mod insn;
pub mod listing;
pub mod model;
pub mod pool;
mod reader;
mod writer;

pub use bytecode::MAX_CODE_LEN;
pub use errors::{ClassFileResult, MalformedInputError};
pub use frames::{FrameKind, StackMapFrame, VerificationType};
pub use insn::{InsnIndex, Instruction, Loadable, MemberRef, Opcode, OperandShape};
pub use listing::render;
pub use model::{
    ClassAccess, ClassModel, Code, ConstantValue, ExceptionHandler, FieldAccess, FieldModel,
    LineNumber, LocalVariable, MethodAccess, MethodModel, RawAttribute,
};
pub use pool::{Constant, ConstantPool, PoolIndex};
pub use reader::decode;
pub use writer::encode;

pub const MAGIC: u32 = 0xcafe_babe;

/// JDK 1.1 through JDK 25.
pub const SUPPORTED_MAJOR_VERSIONS: std::ops::RangeInclusive<u16> = 45..=69;
