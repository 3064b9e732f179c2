use crate::sql::SqlQuery;

/// Function names emitted by the translator.
pub mod names {
    pub const AVG: &str = "AVG";
    pub const COUNT: &str = "COUNT";
    pub const MAX: &str = "MAX";
    pub const MIN: &str = "MIN";
    pub const SUM: &str = "SUM";

    pub const ARRAY_CONCAT: &str = "ARRAY_CONCAT";
    pub const ARRAY_CONTAINS: &str = "ARRAY_CONTAINS";
    pub const ARRAY_LENGTH: &str = "ARRAY_LENGTH";

    pub const IS_DEFINED: &str = "IS_DEFINED";
    pub const IS_NULL: &str = "IS_NULL";
    pub const IS_PRIMITIVE: &str = "IS_PRIMITIVE";

    /// Aggregates, which may not be nested under a further projection
    pub const AGGREGATES: [&str; 5] = [AVG, COUNT, MAX, MIN, SUM];
}

/// Number literal, keeping integers apart from doubles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SqlNumber {
    Integer(i64),
    Double(f64),
}

/// Typed literal of the target dialect.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlLiteral {
    Null,
    Undefined,
    Boolean(bool),
    Number(SqlNumber),
    String(String),
}

/// Binary operators of the target dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlBinaryOp {
    Add,
    And,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    Coalesce,
    Divide,
    Equal,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Modulo,
    Multiply,
    NotEqual,
    Or,
    StringConcat,
    Subtract,
}

impl SqlBinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            SqlBinaryOp::Add => "+",
            SqlBinaryOp::And => "AND",
            SqlBinaryOp::BitwiseAnd => "&",
            SqlBinaryOp::BitwiseOr => "|",
            SqlBinaryOp::BitwiseXor => "^",
            SqlBinaryOp::Coalesce => "??",
            SqlBinaryOp::Divide => "/",
            SqlBinaryOp::Equal => "=",
            SqlBinaryOp::GreaterThan => ">",
            SqlBinaryOp::GreaterThanOrEqual => ">=",
            SqlBinaryOp::LessThan => "<",
            SqlBinaryOp::LessThanOrEqual => "<=",
            SqlBinaryOp::Modulo => "%",
            SqlBinaryOp::Multiply => "*",
            SqlBinaryOp::NotEqual => "!=",
            SqlBinaryOp::Or => "OR",
            SqlBinaryOp::StringConcat => "||",
            SqlBinaryOp::Subtract => "-",
        }
    }
}

/// Unary operators of the target dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlUnaryOp {
    BitwiseNot,
    Not,
    Minus,
    Plus,
}

impl SqlUnaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            SqlUnaryOp::BitwiseNot => "~",
            SqlUnaryOp::Not => "NOT",
            SqlUnaryOp::Minus => "-",
            SqlUnaryOp::Plus => "+",
        }
    }
}

/// One `"name": value` entry of an object constructor.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlObjectProperty {
    pub name: String,
    pub value: SqlScalar,
}

/// Scalar expression of the target dialect.
///
/// The set of variants is closed: every pass over it (printing, substitution)
/// matches exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlScalar {
    Literal(SqlLiteral),

    /// Bare identifier (`root`, `v0`)
    PropertyRef(String),

    /// `member[index]`
    MemberIndexer {
        member: Box<SqlScalar>,
        index: Box<SqlScalar>,
    },

    Binary {
        op: SqlBinaryOp,
        left: Box<SqlScalar>,
        right: Box<SqlScalar>,
    },

    Unary {
        op: SqlUnaryOp,
        operand: Box<SqlScalar>,
    },

    /// Builtin or user-defined (`udf.name(...)`) function call
    FunctionCall {
        name: String,
        args: Vec<SqlScalar>,
        udf: bool,
    },

    ArrayCreate(Vec<SqlScalar>),

    ObjectCreate(Vec<SqlObjectProperty>),

    Conditional {
        condition: Box<SqlScalar>,
        consequent: Box<SqlScalar>,
        alternative: Box<SqlScalar>,
    },

    /// `needle [NOT] IN (haystack...)`
    In {
        needle: Box<SqlScalar>,
        haystack: Vec<SqlScalar>,
        not: bool,
    },

    /// Query parameter reference, name includes the leading `@`
    Parameter(String),

    /// `EXISTS(query)`
    Exists(Box<SqlQuery>),

    /// `ARRAY(query)`
    Array(Box<SqlQuery>),

    /// `(query)`, a nested query producing a single value
    Subquery(Box<SqlQuery>),
}

impl SqlScalar {
    pub fn property(name: &str) -> Self {
        SqlScalar::PropertyRef(name.to_string())
    }

    pub fn null() -> Self {
        SqlScalar::Literal(SqlLiteral::Null)
    }

    pub fn boolean(b: bool) -> Self {
        SqlScalar::Literal(SqlLiteral::Boolean(b))
    }

    pub fn integer(n: i64) -> Self {
        SqlScalar::Literal(SqlLiteral::Number(SqlNumber::Integer(n)))
    }

    pub fn double(n: f64) -> Self {
        SqlScalar::Literal(SqlLiteral::Number(SqlNumber::Double(n)))
    }

    pub fn string(s: &str) -> Self {
        SqlScalar::Literal(SqlLiteral::String(s.to_string()))
    }

    /// `member["name"]`
    pub fn index(member: SqlScalar, name: &str) -> Self {
        SqlScalar::MemberIndexer {
            member: Box::new(member),
            index: Box::new(SqlScalar::string(name)),
        }
    }

    pub fn binary(op: SqlBinaryOp, left: SqlScalar, right: SqlScalar) -> Self {
        SqlScalar::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: SqlUnaryOp, operand: SqlScalar) -> Self {
        SqlScalar::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn function(name: &str, args: Vec<SqlScalar>) -> Self {
        SqlScalar::FunctionCall {
            name: name.to_string(),
            args,
            udf: false,
        }
    }

    pub fn udf(name: &str, args: Vec<SqlScalar>) -> Self {
        SqlScalar::FunctionCall {
            name: name.to_string(),
            args,
            udf: true,
        }
    }

    /// Logical conjunction, `(left AND right)`
    pub fn and(left: SqlScalar, right: SqlScalar) -> Self {
        SqlScalar::binary(SqlBinaryOp::And, left, right)
    }

    pub fn is_non_null_literal(&self) -> bool {
        matches!(self, SqlScalar::Literal(lit) if *lit != SqlLiteral::Null)
    }

    pub fn is_member_indexer(&self) -> bool {
        matches!(self, SqlScalar::MemberIndexer { .. })
    }

    /// Whether this is an aggregate call at the top level
    pub fn is_aggregate(&self) -> bool {
        match self {
            SqlScalar::FunctionCall { name, udf: false, .. } => names::AGGREGATES.contains(&name.as_str()),
            SqlScalar::Binary { left, right, .. } => left.is_aggregate() || right.is_aggregate(),
            _ => false,
        }
    }
}
