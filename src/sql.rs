//! # Target Query AST
//!
//! A small AST mirroring the SQL-like dialect of the document database:
//!
//! ```text
//! SELECT [DISTINCT] [TOP n] VALUE expr | *
//! FROM root | x IN root["array"] | (query) AS r [JOIN x IN root["array"]]...
//! [WHERE expr]
//! [GROUP BY expr]
//! [ORDER BY expr ASC|DESC, ...]
//! [OFFSET n LIMIT m]
//! ```
//!
//! - **[scalar]** - Scalar expressions and operators
//! - **[clauses]** - SELECT/FROM/ORDER BY building blocks and [`SqlQuery`]
//! - **[printer]** - Text rendering
//! - **[spec]** - [`SqlQuerySpec`], query text plus parameter bindings
pub mod clauses;
pub mod printer;
pub mod scalar;
pub mod spec;

pub use clauses::{
    CountSpec, SelectSpec, SqlCollection, SqlOrderByItem, SqlQuery, SqlSelectClause,
};
pub use scalar::{
    SqlBinaryOp, SqlLiteral, SqlNumber, SqlObjectProperty, SqlScalar, SqlUnaryOp, names,
};
pub use spec::{SqlParameter, SqlQuerySpec};
