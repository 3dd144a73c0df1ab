use std::fmt;

use crate::{bytecode::Code, heap::HeapId, types::Type};

/// Precomputed 32-bit FNV-1a hash, used both to bucket interned strings and
/// to probe [`crate::table::Table`].
#[must_use]
pub fn fnv1a(bytes: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    let mut hash = OFFSET_BASIS;
    for &byte in bytes {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// A heap-allocated, interned byte string.
///
/// Two `ObjString`s with equal bytes are always the same heap object after
/// interning; comparisons elsewhere in the VM rely on this and compare
/// `HeapId`s rather than bytes.
#[derive(Debug, Clone)]
pub struct ObjString {
    pub bytes: Box<str>,
    pub hash: u32,
}

impl ObjString {
    #[must_use]
    pub fn new(s: impl Into<Box<str>>) -> Self {
        let bytes = s.into();
        let hash = fnv1a(bytes.as_bytes());
        Self { bytes, hash }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.bytes
    }
}

/// A descriptor for one upvalue a closure captures, recorded at compile time.
///
/// `is_local` selects whether `index` refers to a local slot in the
/// *immediately* enclosing frame (`true`) or to an upvalue already captured
/// by the enclosing function (`false`, a chained capture).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpvalueDesc {
    pub index: u8,
    pub is_local: bool,
}

/// A compiled function: its name, arity, chunk, and upvalue descriptors.
///
/// Distinct from the runtime closure, which pairs an `ObjFunction` with the
/// actual captured [`ObjUpvalue`] handles (see [`ObjClosure`]).
#[derive(Debug, Clone)]
pub struct ObjFunction {
    pub name: Option<HeapId>,
    pub arity: u8,
    pub code: Code,
    pub upvalues: Vec<UpvalueDesc>,
    pub fn_type: Type,
}

/// A closure: an `ObjFunction` bound to the upvalue handles captured at the
/// point the `FUN` opcode ran.
#[derive(Debug, Clone)]
pub struct ObjClosure {
    pub function: HeapId,
    pub upvalues: Vec<HeapId>,
}

/// Runtime state of a captured variable.
///
/// `Open` points at a slot still live on the VM stack; `end_scope` or frame
/// return closes it by copying the value in, after which the upvalue is
/// self-contained and outlives the stack slot it used to alias.
#[derive(Debug, Clone)]
pub enum ObjUpvalue {
    Open { stack_index: usize },
    Closed(crate::value::Value),
}

/// A struct template: a name and default property values, built up one
/// `ADD_PROP` at a time (own properties first, inherited ones appended
/// during class compilation per the inheritance rule in §4.4).
///
/// Substruct compatibility is checked entirely at compile time against
/// `Type::Struct`'s `super_name`; the runtime template carries no link to
/// its ancestor, since each subclass's own template already holds the full
/// merged property set.
#[derive(Debug, Clone)]
pub struct ObjStruct {
    pub name: HeapId,
    pub props: crate::table::Table<crate::value::Value>,
}

/// An instance of a struct template; property lookups that miss the
/// instance's own table fall through to the defining struct's table.
#[derive(Debug, Clone)]
pub struct ObjInstance {
    pub struct_id: HeapId,
    pub props: crate::table::Table<crate::value::Value>,
}

/// An enum template: a name and ordinal values for each variant.
#[derive(Debug, Clone)]
pub struct ObjEnum {
    pub name: HeapId,
    pub variants: crate::table::Table<i32>,
}

/// A native (host-implemented) function.
#[derive(Debug, Clone, Copy)]
pub struct ObjNative {
    pub id: crate::natives::NativeId,
}

/// A growable, homogeneously-typed list.
///
/// Element types are checked entirely at compile time; the runtime
/// representation only needs the fill value growth uses (`List.size = N`
/// past the current length pads with `default`, per `SPEC_FULL.md` §4.4).
#[derive(Debug, Clone)]
pub struct ObjList {
    pub elements: Vec<crate::value::Value>,
    pub default: crate::value::Value,
}

/// A string-keyed map. Value types are checked entirely at compile time.
#[derive(Debug, Clone)]
pub struct ObjMap {
    pub table: crate::table::Table<crate::value::Value>,
    pub default: crate::value::Value,
}

/// A file opened in append-read mode, per §6's native surface.
///
/// Modeled the way the original append-read native behaves: the whole file
/// is held open, a cursor tracks the current read position in bytes, and
/// writes always append at the end regardless of where the cursor sits.
pub struct ObjFile {
    pub path: String,
    pub handle: std::fs::File,
    pub read_pos: u64,
    pub len: u64,
}

impl fmt::Debug for ObjFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjFile")
            .field("path", &self.path)
            .field("read_pos", &self.read_pos)
            .field("len", &self.len)
            .finish()
    }
}

impl Clone for ObjFile {
    fn clone(&self) -> Self {
        let handle = self.handle.try_clone().expect("duplicate an open file handle");
        Self {
            path: self.path.clone(),
            handle,
            read_pos: self.read_pos,
            len: self.len,
        }
    }
}

/// Tagged union of every heap object kind the VM can allocate.
///
/// Mirrors [`crate::value::Value`]'s design philosophy: one sum type instead
/// of inheritance-via-casts, matched exhaustively everywhere a reference is
/// traced or printed.
#[derive(Debug, Clone)]
pub enum Obj {
    String(ObjString),
    Function(ObjFunction),
    Closure(ObjClosure),
    Struct(ObjStruct),
    Instance(ObjInstance),
    Enum(ObjEnum),
    Upvalue(ObjUpvalue),
    Native(ObjNative),
    List(ObjList),
    Map(ObjMap),
    File(ObjFile),
}

impl Obj {
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Function(_) => "function",
            Self::Closure(_) => "closure",
            Self::Struct(_) => "struct",
            Self::Instance(_) => "instance",
            Self::Enum(_) => "enum",
            Self::Upvalue(_) => "upvalue",
            Self::Native(_) => "native",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::File(_) => "file",
        }
    }
}
