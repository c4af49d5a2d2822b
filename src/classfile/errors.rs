use thiserror::Error;

/// Every way a class file can fail to decode or encode.
///
/// The load hook never lets one of these escape into the host; it falls back
/// to the original bytes instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedInputError {
    #[error("bad magic 0x{found:08x}, expected 0xcafebabe")]
    BadMagic { found: u32 },

    #[error("unsupported class file version {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },

    #[error("unexpected end of input at byte {offset}: needed {needed} more")]
    Truncated { offset: usize, needed: usize },

    #[error("{count} trailing bytes after {context}")]
    TrailingBytes { context: &'static str, count: usize },

    #[error("unknown constant pool tag {tag} at index {index}")]
    UnknownConstantTag { tag: u8, index: u16 },

    #[error("constant pool index {index} out of range (pool has {len} slots)")]
    PoolIndexOutOfRange { index: u16, len: usize },

    #[error("constant pool entry {index} is {found}, expected {expected}")]
    PoolTypeMismatch {
        index: u16,
        expected: &'static str,
        found: &'static str,
    },

    #[error("invalid modified UTF-8 in constant pool entry {index}")]
    InvalidUtf8 { index: u16 },

    #[error("constant pool overflow: more than 65535 slots")]
    PoolOverflow,

    #[error("unknown opcode 0x{opcode:02x} at code offset {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },

    #[error("opcode {mnemonic} cannot be encoded as {shape}")]
    InvalidOperandShape {
        mnemonic: &'static str,
        shape: &'static str,
    },

    #[error("code offset {offset} is not an instruction boundary")]
    InvalidCodeOffset { offset: usize },

    #[error("instruction index {index} out of range (method has {len} instructions)")]
    InsnIndexOutOfRange { index: usize, len: usize },

    #[error("branch from offset {from} to {to} does not fit in 16 bits")]
    BranchOutOfRange { from: usize, to: usize },

    #[error("code length {len} exceeds 65535 bytes")]
    CodeTooLarge { len: usize },

    #[error("unknown stack map frame type {frame_type}")]
    UnknownFrameType { frame_type: u8 },

    #[error("unknown verification type tag {tag}")]
    UnknownVerificationType { tag: u8 },

    #[error("malformed {attribute} attribute: {reason}")]
    BadAttribute {
        attribute: &'static str,
        reason: String,
    },

    #[error("{what} count {count} does not fit in the class file format")]
    TooMany { what: &'static str, count: usize },
}

pub type ClassFileResult<T> = Result<T, MalformedInputError>;
