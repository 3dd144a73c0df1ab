//! Native (host-implemented) functions callable from script code.
//!
//! Each native is identified by a [`NativeId`] baked into the bytecode at
//! compile time (see `Opcode::Native`); the VM's call machinery dispatches on
//! that id directly rather than through a name lookup at run time.

use crate::types::Type;

/// Identifies one native function. Cast to/from `u8` when stored as a
/// bytecode constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NativeId {
    Clock,
    Print,
    Input,
    Open,
    ReadLine,
    ReadAll,
    ReadBytes,
    Append,
    Eof,
    Rewind,
    Clear,
    Close,
    IsDigit,
    IsAlpha,
    RandomUniform,
    Exp,
    StringOf,
    IntOf,
    FloatOf,
    ByteOf,
}

impl NativeId {
    /// Recovers a `NativeId` from the `u8` baked into a bytecode constant by
    /// the compiler's `Opcode::Native` emission. Order matches the enum's
    /// declaration, so this and the `as i32` cast the compiler performs stay
    /// in lockstep as long as both are edited together.
    #[must_use]
    pub const fn from_u8(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => Self::Clock,
            1 => Self::Print,
            2 => Self::Input,
            3 => Self::Open,
            4 => Self::ReadLine,
            5 => Self::ReadAll,
            6 => Self::ReadBytes,
            7 => Self::Append,
            8 => Self::Eof,
            9 => Self::Rewind,
            10 => Self::Clear,
            11 => Self::Close,
            12 => Self::IsDigit,
            13 => Self::IsAlpha,
            14 => Self::RandomUniform,
            15 => Self::Exp,
            16 => Self::StringOf,
            17 => Self::IntOf,
            18 => Self::FloatOf,
            19 => Self::ByteOf,
            _ => return None,
        })
    }
}

/// A native's name and compile-time type signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeDescriptor {
    pub id: NativeId,
    pub name: &'static str,
}

impl NativeDescriptor {
    #[must_use]
    pub fn fn_type(&self) -> Type {
        match self.id {
            NativeId::Clock => Type::Fun {
                params: Vec::new(),
                returns: Box::new(Type::Float),
            },
            NativeId::Print => Type::Fun {
                params: vec![
                    Type::String
                        .with_option(Type::Int)
                        .with_option(Type::Byte)
                        .with_option(Type::Float)
                        .with_option(Type::Bool)
                        .with_option(Type::Nil),
                ],
                returns: Box::new(Type::Nil),
            },
            NativeId::Input => Type::Fun {
                params: Vec::new(),
                returns: Box::new(Type::String),
            },
            NativeId::Open => Type::Fun {
                params: vec![Type::String],
                returns: Box::new(Type::File),
            },
            NativeId::ReadLine => Type::Fun {
                params: vec![Type::File],
                returns: Box::new(Type::String),
            },
            NativeId::ReadAll => Type::Fun {
                params: vec![Type::File],
                returns: Box::new(Type::String.with_option(Type::Nil)),
            },
            NativeId::ReadBytes => Type::Fun {
                params: vec![Type::File],
                returns: Box::new(Type::List(Box::new(Type::Byte))),
            },
            NativeId::Append => Type::Fun {
                params: vec![Type::File, Type::String],
                returns: Box::new(Type::Nil),
            },
            NativeId::Eof => Type::Fun {
                params: vec![Type::File],
                returns: Box::new(Type::Bool),
            },
            NativeId::Rewind | NativeId::Clear | NativeId::Close => Type::Fun {
                params: vec![Type::File],
                returns: Box::new(Type::Nil),
            },
            NativeId::IsDigit | NativeId::IsAlpha => Type::Fun {
                params: vec![Type::String],
                returns: Box::new(Type::Bool),
            },
            NativeId::RandomUniform => Type::Fun {
                params: vec![Type::Float, Type::Float],
                returns: Box::new(Type::Float),
            },
            NativeId::Exp => Type::Fun {
                // Grounded in the original native's option chain
                // (`f->opt = i; i->opt = b;`): `exp` accepts a float, int, or
                // byte base and always returns a float.
                params: vec![Type::Float.with_option(Type::Int).with_option(Type::Byte)],
                returns: Box::new(Type::Float),
            },
            NativeId::StringOf => Type::Fun {
                // `original_source/native.h`'s `string()`: converts any
                // primitive to its printable decimal form. Every worked
                // scenario in `SPEC_FULL.md` §8 relies on it.
                params: vec![
                    Type::Int
                        .with_option(Type::Float)
                        .with_option(Type::Bool)
                        .with_option(Type::Byte)
                        .with_option(Type::Nil)
                        .with_option(Type::String),
                ],
                returns: Box::new(Type::String),
            },
            NativeId::IntOf => Type::Fun {
                params: vec![Type::Int.with_option(Type::Float).with_option(Type::Byte)],
                returns: Box::new(Type::Int),
            },
            NativeId::FloatOf => Type::Fun {
                params: vec![Type::Int.with_option(Type::Float).with_option(Type::Byte)],
                returns: Box::new(Type::Float),
            },
            NativeId::ByteOf => Type::Fun {
                params: vec![Type::Int.with_option(Type::Float).with_option(Type::Byte)],
                returns: Box::new(Type::Byte),
            },
        }
    }
}

const NATIVES: &[NativeDescriptor] = &[
    NativeDescriptor {
        id: NativeId::Clock,
        name: "clock",
    },
    NativeDescriptor {
        id: NativeId::Print,
        name: "print",
    },
    NativeDescriptor {
        id: NativeId::Input,
        name: "input",
    },
    NativeDescriptor {
        id: NativeId::Open,
        name: "open",
    },
    NativeDescriptor {
        id: NativeId::ReadLine,
        name: "read_line",
    },
    NativeDescriptor {
        id: NativeId::ReadAll,
        name: "read_all",
    },
    NativeDescriptor {
        id: NativeId::ReadBytes,
        name: "read_bytes",
    },
    NativeDescriptor {
        id: NativeId::Append,
        name: "append",
    },
    NativeDescriptor {
        id: NativeId::Eof,
        name: "eof",
    },
    NativeDescriptor {
        id: NativeId::Rewind,
        name: "rewind",
    },
    NativeDescriptor {
        id: NativeId::Clear,
        name: "clear",
    },
    NativeDescriptor {
        id: NativeId::Close,
        name: "close",
    },
    NativeDescriptor {
        id: NativeId::IsDigit,
        name: "is_digit",
    },
    NativeDescriptor {
        id: NativeId::IsAlpha,
        name: "is_alpha",
    },
    NativeDescriptor {
        id: NativeId::RandomUniform,
        name: "random_uniform",
    },
    NativeDescriptor {
        id: NativeId::Exp,
        name: "exp",
    },
    NativeDescriptor {
        id: NativeId::StringOf,
        name: "string",
    },
    NativeDescriptor {
        id: NativeId::IntOf,
        name: "int",
    },
    NativeDescriptor {
        id: NativeId::FloatOf,
        name: "float",
    },
    NativeDescriptor {
        id: NativeId::ByteOf,
        name: "byte",
    },
];

/// Looks up a native function by its script-visible name.
#[must_use]
pub fn lookup(name: &str) -> Option<NativeDescriptor> {
    NATIVES.iter().copied().find(|n| n.name == name)
}

/// Looks up a native function by the id baked into the bytecode.
#[must_use]
pub fn by_id(id: NativeId) -> NativeDescriptor {
    NATIVES.iter().copied().find(|n| n.id == id).expect("every NativeId has a descriptor")
}
