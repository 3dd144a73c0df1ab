/// A single bytecode instruction.
///
/// Operand widths are fixed per opcode: `slot8`/`arity8`-style operands are
/// one byte, `const16`/`off16`/`name_idx16`-style operands are two bytes,
/// little-endian. See `SPEC_FULL.md` §4.4/§6 for the full operand table.
///
/// There is no separate global-variable opcode pair: top-level declarations
/// are simply locals of the implicit script function, the same way nested
/// function locals are — a closure capturing a top-level variable captures
/// it as an ordinary upvalue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Constant = 0,
    True,
    False,
    Nil,
    Add,
    Subtract,
    Multiply,
    Divide,
    Mod,
    Negate,
    Not,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    GetLocal,
    SetLocal,
    GetUpvalue,
    SetUpvalue,
    CloseUpvalue,
    GetProp,
    SetProp,
    AddProp,
    GetSize,
    SetSize,
    GetKeys,
    GetValues,
    GetElement,
    SetElement,
    InList,
    Jump,
    JumpIfFalse,
    JumpIfTrue,
    JumpBack,
    Call,
    Return,
    Fun,
    Class,
    Enum,
    Instance,
    List,
    Map,
    Native,
    Pop,
}

impl Opcode {
    /// Number of fixed operand bytes following this opcode's byte in the
    /// stream. `Fun` additionally carries a variable-length upvalue
    /// descriptor table handled separately by the compiler/VM.
    #[must_use]
    pub const fn operand_len(self) -> usize {
        match self {
            Self::Constant
            | Self::GetProp
            | Self::SetProp
            | Self::AddProp
            | Self::Class
            | Self::Enum
            | Self::Native
            | Self::List
            | Self::Map => 2,
            Self::GetLocal | Self::SetLocal | Self::GetUpvalue | Self::SetUpvalue | Self::Call => 1,
            Self::Jump | Self::JumpIfFalse | Self::JumpIfTrue | Self::JumpBack => 2,
            Self::Fun => 2,
            _ => 0,
        }
    }

    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => Self::Constant,
            1 => Self::True,
            2 => Self::False,
            3 => Self::Nil,
            4 => Self::Add,
            5 => Self::Subtract,
            6 => Self::Multiply,
            7 => Self::Divide,
            8 => Self::Mod,
            9 => Self::Negate,
            10 => Self::Not,
            11 => Self::Less,
            12 => Self::LessEqual,
            13 => Self::Greater,
            14 => Self::GreaterEqual,
            15 => Self::Equal,
            16 => Self::NotEqual,
            17 => Self::GetLocal,
            18 => Self::SetLocal,
            19 => Self::GetUpvalue,
            20 => Self::SetUpvalue,
            21 => Self::CloseUpvalue,
            22 => Self::GetProp,
            23 => Self::SetProp,
            24 => Self::AddProp,
            25 => Self::GetSize,
            26 => Self::SetSize,
            27 => Self::GetKeys,
            28 => Self::GetValues,
            29 => Self::GetElement,
            30 => Self::SetElement,
            31 => Self::InList,
            32 => Self::Jump,
            33 => Self::JumpIfFalse,
            34 => Self::JumpIfTrue,
            35 => Self::JumpBack,
            36 => Self::Call,
            37 => Self::Return,
            38 => Self::Fun,
            39 => Self::Class,
            40 => Self::Enum,
            41 => Self::Instance,
            42 => Self::List,
            43 => Self::Map,
            44 => Self::Native,
            45 => Self::Pop,
            _ => return None,
        })
    }
}
