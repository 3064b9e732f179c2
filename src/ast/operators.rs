use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary operators of the host expression tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    /// Addition, or concatenation when the result is a string
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,

    // Logical (short-circuit)
    AndAlso,
    OrElse,

    // Bitwise
    And,
    Or,
    ExclusiveOr,
    LeftShift,
    RightShift,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,

    /// Null-coalescing (`??`)
    Coalesce,

    /// Array element access (`a[i]`)
    ArrayIndex,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Unary operators of the host expression tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Negate,
    UnaryPlus,
    Not,
    OnesComplement,
    /// Type conversion; transparent to translation
    Convert,
    /// Quoted lambda; transparent to translation
    Quote,
    TypeAs,
    ArrayLength,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
