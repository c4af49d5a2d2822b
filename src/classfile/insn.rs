//! Typed instruction model.
//!
//! Every instruction is one variant per operand shape, carrying its
//! [`Opcode`]. Pool references are symbolic; byte offsets never appear here,
//! branch targets are instruction indices into the owning method.

use std::fmt;

/// Position of an instruction within its method. The value
/// `instructions.len()` denotes the end of the code.
pub type InsnIndex = usize;

/// How an opcode's operands are laid out in the code array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandShape {
    None,
    Push,
    Local,
    Iinc,
    Constant,
    Field,
    Method,
    InvokeInterface,
    InvokeDynamic,
    Type,
    NewArray,
    MultiANewArray,
    Jump,
    TableSwitch,
    LookupSwitch,
}

impl OperandShape {
    pub fn name(self) -> &'static str {
        match self {
            OperandShape::None => "no operand",
            OperandShape::Push => "push",
            OperandShape::Local => "local variable",
            OperandShape::Iinc => "iinc",
            OperandShape::Constant => "constant load",
            OperandShape::Field => "field access",
            OperandShape::Method => "method invocation",
            OperandShape::InvokeInterface => "interface invocation",
            OperandShape::InvokeDynamic => "dynamic invocation",
            OperandShape::Type => "type",
            OperandShape::NewArray => "primitive array",
            OperandShape::MultiANewArray => "multi-dimensional array",
            OperandShape::Jump => "jump",
            OperandShape::TableSwitch => "table switch",
            OperandShape::LookupSwitch => "lookup switch",
        }
    }
}

macro_rules! opcodes {
    ($($name:ident = $value:literal => $mnemonic:literal : $shape:ident,)*) => {
        /// The JVM instruction set. `wide` is not listed: it is a prefix the
        /// codec folds into [`Instruction::Local`] and [`Instruction::Iinc`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $($name = $value,)*
        }

        impl Opcode {
            pub fn from_u8(value: u8) -> Option<Self> {
                match value {
                    $($value => Some(Opcode::$name),)*
                    _ => None,
                }
            }

            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Opcode::$name => $mnemonic,)*
                }
            }

            pub fn shape(self) -> OperandShape {
                match self {
                    $(Opcode::$name => OperandShape::$shape,)*
                }
            }
        }
    };
}

opcodes! {
    Nop = 0x00 => "nop": None,
    AconstNull = 0x01 => "aconst_null": None,
    IconstM1 = 0x02 => "iconst_m1": None,
    Iconst0 = 0x03 => "iconst_0": None,
    Iconst1 = 0x04 => "iconst_1": None,
    Iconst2 = 0x05 => "iconst_2": None,
    Iconst3 = 0x06 => "iconst_3": None,
    Iconst4 = 0x07 => "iconst_4": None,
    Iconst5 = 0x08 => "iconst_5": None,
    Lconst0 = 0x09 => "lconst_0": None,
    Lconst1 = 0x0a => "lconst_1": None,
    Fconst0 = 0x0b => "fconst_0": None,
    Fconst1 = 0x0c => "fconst_1": None,
    Fconst2 = 0x0d => "fconst_2": None,
    Dconst0 = 0x0e => "dconst_0": None,
    Dconst1 = 0x0f => "dconst_1": None,
    Bipush = 0x10 => "bipush": Push,
    Sipush = 0x11 => "sipush": Push,
    Ldc = 0x12 => "ldc": Constant,
    LdcW = 0x13 => "ldc_w": Constant,
    Ldc2W = 0x14 => "ldc2_w": Constant,
    Iload = 0x15 => "iload": Local,
    Lload = 0x16 => "lload": Local,
    Fload = 0x17 => "fload": Local,
    Dload = 0x18 => "dload": Local,
    Aload = 0x19 => "aload": Local,
    Iload0 = 0x1a => "iload_0": None,
    Iload1 = 0x1b => "iload_1": None,
    Iload2 = 0x1c => "iload_2": None,
    Iload3 = 0x1d => "iload_3": None,
    Lload0 = 0x1e => "lload_0": None,
    Lload1 = 0x1f => "lload_1": None,
    Lload2 = 0x20 => "lload_2": None,
    Lload3 = 0x21 => "lload_3": None,
    Fload0 = 0x22 => "fload_0": None,
    Fload1 = 0x23 => "fload_1": None,
    Fload2 = 0x24 => "fload_2": None,
    Fload3 = 0x25 => "fload_3": None,
    Dload0 = 0x26 => "dload_0": None,
    Dload1 = 0x27 => "dload_1": None,
    Dload2 = 0x28 => "dload_2": None,
    Dload3 = 0x29 => "dload_3": None,
    Aload0 = 0x2a => "aload_0": None,
    Aload1 = 0x2b => "aload_1": None,
    Aload2 = 0x2c => "aload_2": None,
    Aload3 = 0x2d => "aload_3": None,
    Iaload = 0x2e => "iaload": None,
    Laload = 0x2f => "laload": None,
    Faload = 0x30 => "faload": None,
    Daload = 0x31 => "daload": None,
    Aaload = 0x32 => "aaload": None,
    Baload = 0x33 => "baload": None,
    Caload = 0x34 => "caload": None,
    Saload = 0x35 => "saload": None,
    Istore = 0x36 => "istore": Local,
    Lstore = 0x37 => "lstore": Local,
    Fstore = 0x38 => "fstore": Local,
    Dstore = 0x39 => "dstore": Local,
    Astore = 0x3a => "astore": Local,
    Istore0 = 0x3b => "istore_0": None,
    Istore1 = 0x3c => "istore_1": None,
    Istore2 = 0x3d => "istore_2": None,
    Istore3 = 0x3e => "istore_3": None,
    Lstore0 = 0x3f => "lstore_0": None,
    Lstore1 = 0x40 => "lstore_1": None,
    Lstore2 = 0x41 => "lstore_2": None,
    Lstore3 = 0x42 => "lstore_3": None,
    Fstore0 = 0x43 => "fstore_0": None,
    Fstore1 = 0x44 => "fstore_1": None,
    Fstore2 = 0x45 => "fstore_2": None,
    Fstore3 = 0x46 => "fstore_3": None,
    Dstore0 = 0x47 => "dstore_0": None,
    Dstore1 = 0x48 => "dstore_1": None,
    Dstore2 = 0x49 => "dstore_2": None,
    Dstore3 = 0x4a => "dstore_3": None,
    Astore0 = 0x4b => "astore_0": None,
    Astore1 = 0x4c => "astore_1": None,
    Astore2 = 0x4d => "astore_2": None,
    Astore3 = 0x4e => "astore_3": None,
    Iastore = 0x4f => "iastore": None,
    Lastore = 0x50 => "lastore": None,
    Fastore = 0x51 => "fastore": None,
    Dastore = 0x52 => "dastore": None,
    Aastore = 0x53 => "aastore": None,
    Bastore = 0x54 => "bastore": None,
    Castore = 0x55 => "castore": None,
    Sastore = 0x56 => "sastore": None,
    Pop = 0x57 => "pop": None,
    Pop2 = 0x58 => "pop2": None,
    Dup = 0x59 => "dup": None,
    DupX1 = 0x5a => "dup_x1": None,
    DupX2 = 0x5b => "dup_x2": None,
    Dup2 = 0x5c => "dup2": None,
    Dup2X1 = 0x5d => "dup2_x1": None,
    Dup2X2 = 0x5e => "dup2_x2": None,
    Swap = 0x5f => "swap": None,
    Iadd = 0x60 => "iadd": None,
    Ladd = 0x61 => "ladd": None,
    Fadd = 0x62 => "fadd": None,
    Dadd = 0x63 => "dadd": None,
    Isub = 0x64 => "isub": None,
    Lsub = 0x65 => "lsub": None,
    Fsub = 0x66 => "fsub": None,
    Dsub = 0x67 => "dsub": None,
    Imul = 0x68 => "imul": None,
    Lmul = 0x69 => "lmul": None,
    Fmul = 0x6a => "fmul": None,
    Dmul = 0x6b => "dmul": None,
    Idiv = 0x6c => "idiv": None,
    Ldiv = 0x6d => "ldiv": None,
    Fdiv = 0x6e => "fdiv": None,
    Ddiv = 0x6f => "ddiv": None,
    Irem = 0x70 => "irem": None,
    Lrem = 0x71 => "lrem": None,
    Frem = 0x72 => "frem": None,
    Drem = 0x73 => "drem": None,
    Ineg = 0x74 => "ineg": None,
    Lneg = 0x75 => "lneg": None,
    Fneg = 0x76 => "fneg": None,
    Dneg = 0x77 => "dneg": None,
    Ishl = 0x78 => "ishl": None,
    Lshl = 0x79 => "lshl": None,
    Ishr = 0x7a => "ishr": None,
    Lshr = 0x7b => "lshr": None,
    Iushr = 0x7c => "iushr": None,
    Lushr = 0x7d => "lushr": None,
    Iand = 0x7e => "iand": None,
    Land = 0x7f => "land": None,
    Ior = 0x80 => "ior": None,
    Lor = 0x81 => "lor": None,
    Ixor = 0x82 => "ixor": None,
    Lxor = 0x83 => "lxor": None,
    Iinc = 0x84 => "iinc": Iinc,
    I2l = 0x85 => "i2l": None,
    I2f = 0x86 => "i2f": None,
    I2d = 0x87 => "i2d": None,
    L2i = 0x88 => "l2i": None,
    L2f = 0x89 => "l2f": None,
    L2d = 0x8a => "l2d": None,
    F2i = 0x8b => "f2i": None,
    F2l = 0x8c => "f2l": None,
    F2d = 0x8d => "f2d": None,
    D2i = 0x8e => "d2i": None,
    D2l = 0x8f => "d2l": None,
    D2f = 0x90 => "d2f": None,
    I2b = 0x91 => "i2b": None,
    I2c = 0x92 => "i2c": None,
    I2s = 0x93 => "i2s": None,
    Lcmp = 0x94 => "lcmp": None,
    Fcmpl = 0x95 => "fcmpl": None,
    Fcmpg = 0x96 => "fcmpg": None,
    Dcmpl = 0x97 => "dcmpl": None,
    Dcmpg = 0x98 => "dcmpg": None,
    Ifeq = 0x99 => "ifeq": Jump,
    Ifne = 0x9a => "ifne": Jump,
    Iflt = 0x9b => "iflt": Jump,
    Ifge = 0x9c => "ifge": Jump,
    Ifgt = 0x9d => "ifgt": Jump,
    Ifle = 0x9e => "ifle": Jump,
    IfIcmpeq = 0x9f => "if_icmpeq": Jump,
    IfIcmpne = 0xa0 => "if_icmpne": Jump,
    IfIcmplt = 0xa1 => "if_icmplt": Jump,
    IfIcmpge = 0xa2 => "if_icmpge": Jump,
    IfIcmpgt = 0xa3 => "if_icmpgt": Jump,
    IfIcmple = 0xa4 => "if_icmple": Jump,
    IfAcmpeq = 0xa5 => "if_acmpeq": Jump,
    IfAcmpne = 0xa6 => "if_acmpne": Jump,
    Goto = 0xa7 => "goto": Jump,
    Jsr = 0xa8 => "jsr": Jump,
    Ret = 0xa9 => "ret": Local,
    Tableswitch = 0xaa => "tableswitch": TableSwitch,
    Lookupswitch = 0xab => "lookupswitch": LookupSwitch,
    Ireturn = 0xac => "ireturn": None,
    Lreturn = 0xad => "lreturn": None,
    Freturn = 0xae => "freturn": None,
    Dreturn = 0xaf => "dreturn": None,
    Areturn = 0xb0 => "areturn": None,
    Return = 0xb1 => "return": None,
    Getstatic = 0xb2 => "getstatic": Field,
    Putstatic = 0xb3 => "putstatic": Field,
    Getfield = 0xb4 => "getfield": Field,
    Putfield = 0xb5 => "putfield": Field,
    Invokevirtual = 0xb6 => "invokevirtual": Method,
    Invokespecial = 0xb7 => "invokespecial": Method,
    Invokestatic = 0xb8 => "invokestatic": Method,
    Invokeinterface = 0xb9 => "invokeinterface": InvokeInterface,
    Invokedynamic = 0xba => "invokedynamic": InvokeDynamic,
    New = 0xbb => "new": Type,
    Newarray = 0xbc => "newarray": NewArray,
    Anewarray = 0xbd => "anewarray": Type,
    Arraylength = 0xbe => "arraylength": None,
    Athrow = 0xbf => "athrow": None,
    Checkcast = 0xc0 => "checkcast": Type,
    Instanceof = 0xc1 => "instanceof": Type,
    Monitorenter = 0xc2 => "monitorenter": None,
    Monitorexit = 0xc3 => "monitorexit": None,
    Multianewarray = 0xc5 => "multianewarray": MultiANewArray,
    Ifnull = 0xc6 => "ifnull": Jump,
    Ifnonnull = 0xc7 => "ifnonnull": Jump,
    GotoW = 0xc8 => "goto_w": Jump,
    JsrW = 0xc9 => "jsr_w": Jump,
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Symbolic reference to a field or method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberRef {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl MemberRef {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}:{}", self.owner, self.name, self.descriptor)
    }
}

/// Operand of the `ldc` family.
///
/// Floating point values are stored as raw bits so that NaN payloads and
/// negative zero survive a round trip. Method handles, dynamic constants and
/// strings that do not decode cleanly stay as raw pool indices.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Loadable {
    Int(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    String(String),
    Class(String),
    MethodType(String),
    Pooled(u16),
}

impl Loadable {
    /// Long and Double need `ldc2_w`.
    pub fn is_wide(&self) -> bool {
        matches!(self, Loadable::Long(_) | Loadable::Double(_))
    }
}

impl fmt::Display for Loadable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Loadable::Int(value) => write!(f, "{value}"),
            Loadable::Float(bits) => write!(f, "{}f", f32::from_bits(*bits)),
            Loadable::Long(value) => write!(f, "{value}L"),
            Loadable::Double(bits) => write!(f, "{}d", f64::from_bits(*bits)),
            Loadable::String(text) => write!(f, "{text:?}"),
            Loadable::Class(name) => write!(f, "class {name}"),
            Loadable::MethodType(descriptor) => write!(f, "methodtype {descriptor}"),
            Loadable::Pooled(index) => write!(f, "#{index}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Instruction {
    Simple(Opcode),
    Push {
        opcode: Opcode,
        value: i16,
    },
    Local {
        opcode: Opcode,
        index: u16,
    },
    Iinc {
        index: u16,
        delta: i16,
    },
    Constant {
        opcode: Opcode,
        value: Loadable,
    },
    Field {
        opcode: Opcode,
        field: MemberRef,
    },
    Method {
        opcode: Opcode,
        method: MemberRef,
        interface: bool,
    },
    InvokeInterface {
        method: MemberRef,
        count: u8,
    },
    InvokeDynamic {
        index: u16,
    },
    Type {
        opcode: Opcode,
        class: String,
    },
    NewArray {
        atype: u8,
    },
    MultiANewArray {
        class: String,
        dimensions: u8,
    },
    Jump {
        opcode: Opcode,
        target: InsnIndex,
    },
    TableSwitch {
        default: InsnIndex,
        low: i32,
        targets: Vec<InsnIndex>,
    },
    LookupSwitch {
        default: InsnIndex,
        pairs: Vec<(i32, InsnIndex)>,
    },
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Simple(opcode)
            | Instruction::Push { opcode, .. }
            | Instruction::Local { opcode, .. }
            | Instruction::Constant { opcode, .. }
            | Instruction::Field { opcode, .. }
            | Instruction::Method { opcode, .. }
            | Instruction::Type { opcode, .. }
            | Instruction::Jump { opcode, .. } => *opcode,
            Instruction::Iinc { .. } => Opcode::Iinc,
            Instruction::InvokeInterface { .. } => Opcode::Invokeinterface,
            Instruction::InvokeDynamic { .. } => Opcode::Invokedynamic,
            Instruction::NewArray { .. } => Opcode::Newarray,
            Instruction::MultiANewArray { .. } => Opcode::Multianewarray,
            Instruction::TableSwitch { .. } => Opcode::Tableswitch,
            Instruction::LookupSwitch { .. } => Opcode::Lookupswitch,
        }
    }

    /// The operand shape this variant encodes.
    pub fn shape(&self) -> OperandShape {
        match self {
            Instruction::Simple(_) => OperandShape::None,
            Instruction::Push { .. } => OperandShape::Push,
            Instruction::Local { .. } => OperandShape::Local,
            Instruction::Iinc { .. } => OperandShape::Iinc,
            Instruction::Constant { .. } => OperandShape::Constant,
            Instruction::Field { .. } => OperandShape::Field,
            Instruction::Method { .. } => OperandShape::Method,
            Instruction::InvokeInterface { .. } => OperandShape::InvokeInterface,
            Instruction::InvokeDynamic { .. } => OperandShape::InvokeDynamic,
            Instruction::Type { .. } => OperandShape::Type,
            Instruction::NewArray { .. } => OperandShape::NewArray,
            Instruction::MultiANewArray { .. } => OperandShape::MultiANewArray,
            Instruction::Jump { .. } => OperandShape::Jump,
            Instruction::TableSwitch { .. } => OperandShape::TableSwitch,
            Instruction::LookupSwitch { .. } => OperandShape::LookupSwitch,
        }
    }

    /// `ldc`, `ldc_w` or `ldc2_w`.
    pub fn is_constant_load(&self) -> bool {
        matches!(
            self,
            Instruction::Constant {
                opcode: Opcode::Ldc | Opcode::LdcW | Opcode::Ldc2W,
                ..
            }
        )
    }

    pub fn get_static(field: MemberRef) -> Self {
        Instruction::Field {
            opcode: Opcode::Getstatic,
            field,
        }
    }

    /// Branch and switch targets, in encoding order.
    pub fn targets(&self) -> Vec<InsnIndex> {
        match self {
            Instruction::Jump { target, .. } => vec![*target],
            Instruction::TableSwitch {
                default, targets, ..
            } => std::iter::once(*default).chain(targets.iter().copied()).collect(),
            Instruction::LookupSwitch { default, pairs } => std::iter::once(*default)
                .chain(pairs.iter().map(|(_, target)| *target))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Rewrites every branch target through `remap`, leaving everything else
    /// as-is.
    pub fn try_map_targets<E>(
        self,
        mut remap: impl FnMut(InsnIndex) -> Result<InsnIndex, E>,
    ) -> Result<Self, E> {
        Ok(match self {
            Instruction::Jump { opcode, target } => Instruction::Jump {
                opcode,
                target: remap(target)?,
            },
            Instruction::TableSwitch {
                default,
                low,
                targets,
            } => Instruction::TableSwitch {
                default: remap(default)?,
                low,
                targets: targets
                    .into_iter()
                    .map(&mut remap)
                    .collect::<Result<_, _>>()?,
            },
            Instruction::LookupSwitch { default, pairs } => Instruction::LookupSwitch {
                default: remap(default)?,
                pairs: pairs
                    .into_iter()
                    .map(|(key, target)| remap(target).map(|target| (key, target)))
                    .collect::<Result<_, _>>()?,
            },
            other => other,
        })
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opcode = self.opcode();
        match self {
            Instruction::Simple(_) => write!(f, "{opcode}"),
            Instruction::Push { value, .. } => write!(f, "{opcode} {value}"),
            Instruction::Local { index, .. } => write!(f, "{opcode} {index}"),
            Instruction::Iinc { index, delta } => write!(f, "{opcode} {index} {delta}"),
            Instruction::Constant { value, .. } => write!(f, "{opcode} {value}"),
            Instruction::Field { field, .. } => write!(f, "{opcode} {field}"),
            Instruction::Method {
                method, interface, ..
            } => {
                let suffix = if *interface { " (interface)" } else { "" };
                write!(f, "{opcode} {method}{suffix}")
            }
            Instruction::InvokeInterface { method, count } => {
                write!(f, "{opcode} {method} {count}")
            }
            Instruction::InvokeDynamic { index } => write!(f, "{opcode} #{index}"),
            Instruction::Type { class, .. } => write!(f, "{opcode} {class}"),
            Instruction::NewArray { atype } => write!(f, "{opcode} {atype}"),
            Instruction::MultiANewArray { class, dimensions } => {
                write!(f, "{opcode} {class} {dimensions}")
            }
            Instruction::Jump { target, .. } => write!(f, "{opcode} @{target}"),
            Instruction::TableSwitch {
                default,
                low,
                targets,
            } => {
                write!(f, "{opcode} {low}..")?;
                for target in targets {
                    write!(f, " @{target}")?;
                }
                write!(f, " default @{default}")
            }
            Instruction::LookupSwitch { default, pairs } => {
                write!(f, "{opcode}")?;
                for (key, target) in pairs {
                    write!(f, " {key}:@{target}")?;
                }
                write!(f, " default @{default}")
            }
        }
    }
}
