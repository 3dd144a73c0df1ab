//! The compile-time type model: a tagged variant plus a singly-linked
//! "option chain" used to describe native functions whose parameters accept
//! any of a fixed set of primitive types (e.g. `exp(Float|Int|Byte)`).
//!
//! Type nodes are owned by the compiler frame that created them (an ordinary
//! `Box`-based tree — see Design Notes in `SPEC_FULL.md` §9) rather than
//! freed by hand as in the C original.

use std::fmt;

/// A compile-time type.
///
/// `opt` chains alternatives: a type with `opt = Some(t)` means "this or
/// anything reachable by following `t`'s own chain".
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Int,
    Float,
    Bool,
    Byte,
    String,
    Nil,
    File,
    /// A `:=` declaration whose type is not yet known; set to the
    /// initializer's type once that initializer is compiled.
    Infer,
    /// A custom type in the process of being declared.
    Decl(Box<Type>),
    Array(Vec<Type>),
    Fun {
        params: Vec<Type>,
        returns: Box<Type>,
    },
    Struct {
        name: String,
        super_name: Option<String>,
        props: Vec<(String, Type)>,
    },
    Enum {
        name: String,
        variants: Vec<(String, i32)>,
    },
    /// An unresolved reference to a name, resolved against enclosing scopes
    /// before being compared against anything else.
    Identifier(String),
    List(Box<Type>),
    Map(Box<Type>),
}

impl Type {
    /// Chains `alt` onto this type's option chain.
    ///
    /// The chain is modeled as a flat `Array` of alternatives rather than a
    /// second linked `opt` field, which keeps `Type` a plain tree while
    /// preserving the "this-or-that" semantics used for native parameters.
    #[must_use]
    pub fn with_option(self, alt: Type) -> Type {
        match self {
            Type::Decl(inner) => Type::Decl(Box::new(inner.with_option(alt))),
            Type::Array(mut alts) => {
                alts.push(alt);
                Type::Array(alts)
            }
            single => Type::Array(vec![single, alt]),
        }
    }

    /// The struct or enum name this type is known by, for diagnostics.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{self}")
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Float => write!(f, "float"),
            Type::Bool => write!(f, "bool"),
            Type::Byte => write!(f, "byte"),
            Type::String => write!(f, "string"),
            Type::Nil => write!(f, "nil"),
            Type::File => write!(f, "File"),
            Type::Infer => write!(f, "_"),
            Type::Decl(inner) => write!(f, "{inner}"),
            Type::Array(alts) => {
                let parts: Vec<String> = alts.iter().map(ToString::to_string).collect();
                write!(f, "{}", parts.join("|"))
            }
            Type::Fun { params, returns } => {
                let parts: Vec<String> = params.iter().map(ToString::to_string).collect();
                write!(f, "({}) -> {returns}", parts.join(", "))
            }
            Type::Struct { name, .. } => write!(f, "{name}"),
            Type::Enum { name, .. } => write!(f, "{name}"),
            Type::Identifier(name) => write!(f, "{name}"),
            Type::List(elem) => write!(f, "List<{elem}>"),
            Type::Map(value) => write!(f, "Map<{value}>"),
        }
    }
}

/// Walks the option chain (if any) of `ty`, yielding `ty` itself first.
fn alternatives(ty: &Type) -> Vec<&Type> {
    match ty {
        Type::Array(alts) => alts.iter().collect(),
        single => vec![single],
    }
}

/// Structural/nominal type equality, aware of option chains.
///
/// `Nil` is compatible with anything (it is the bottom type for optional
/// positions); otherwise each side's option-chain alternatives are scanned
/// for a mutually compatible pair.
#[must_use]
pub fn same_type(a: &Type, b: &Type) -> bool {
    if matches!(a, Type::Nil) || matches!(b, Type::Nil) {
        return true;
    }
    for alt_a in alternatives(a) {
        for alt_b in alternatives(b) {
            if same_type_single(alt_a, alt_b) {
                return true;
            }
        }
    }
    false
}

fn same_type_single(a: &Type, b: &Type) -> bool {
    match (a, b) {
        (Type::Int, Type::Int)
        | (Type::Float, Type::Float)
        | (Type::Bool, Type::Bool)
        | (Type::Byte, Type::Byte)
        | (Type::String, Type::String)
        | (Type::Nil, Type::Nil)
        | (Type::File, Type::File)
        | (Type::Infer, Type::Infer) => true,
        (Type::Decl(x), y) | (y, Type::Decl(x)) => same_type_single(x, y),
        (Type::List(x), Type::List(y)) | (Type::Map(x), Type::Map(y)) => same_type_single(x, y),
        (
            Type::Fun {
                params: p1,
                returns: r1,
            },
            Type::Fun {
                params: p2,
                returns: r2,
            },
        ) => {
            p1.len() == p2.len() && p1.iter().zip(p2).all(|(x, y)| same_type_single(x, y)) && same_type_single(r1, r2)
        }
        (Type::Struct { name: n1, .. }, Type::Struct { name: n2, .. })
        | (Type::Enum { name: n1, .. }, Type::Enum { name: n2, .. })
        | (Type::Identifier(n1), Type::Identifier(n2)) => n1 == n2,
        _ => false,
    }
}

/// Whether `sub` descends from `maybe_super` by walking the declared
/// superclass chain and comparing names.
#[must_use]
pub fn is_substruct(sub: &Type, maybe_super_name: &str) -> bool {
    let mut current = sub;
    loop {
        match current {
            Type::Struct { name, super_name, .. } => {
                return name == maybe_super_name || super_name.as_deref() == Some(maybe_super_name);
            }
            Type::Decl(inner) => current = inner,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_is_compatible_with_anything() {
        assert!(same_type(&Type::Nil, &Type::Int));
        assert!(same_type(&Type::String, &Type::Nil));
    }

    #[test]
    fn same_type_is_symmetric() {
        let pairs = [
            (Type::Int, Type::Int),
            (Type::Int, Type::Float),
            (Type::List(Box::new(Type::Int)), Type::List(Box::new(Type::Int))),
            (Type::List(Box::new(Type::Int)), Type::Map(Box::new(Type::Int))),
            (Type::Identifier("A".into()), Type::Identifier("B".into())),
        ];
        for (a, b) in pairs {
            assert_eq!(same_type(&a, &b), same_type(&b, &a), "{a} vs {b} not symmetric");
        }
    }

    #[test]
    fn option_chain_matches_any_alternative() {
        let option = Type::Float.with_option(Type::Int).with_option(Type::Byte);
        assert!(same_type(&option, &Type::Byte));
        assert!(same_type(&option, &Type::Int));
        assert!(!same_type(&option, &Type::String));
    }
}
