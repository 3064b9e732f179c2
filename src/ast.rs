//! # Host Expression Tree
//!
//! This module defines the input of the compiler: a strongly-typed, strictly
//! nested expression tree as produced by a fluent query-builder surface.
//!
//! ## Architecture Overview
//!
//! - **[types]** - Static type tags attached to every node
//! - **[operators]** - Binary and unary operator kinds
//! - **[expressions]** - The [`Expr`] sum type, members, methods and lambdas
//! - **[queryable]** - [`Queryable`], a fluent builder for query expressions
//!
//! ## Core Concepts
//!
//! ### Query Composition
//!
//! A query is a chain of calls into the query algebra, innermost first:
//!
//! ```text
//! rows.Where(r => r.price > 100).Select(r => r.title).Take(5)
//! ```
//!
//! becomes
//!
//! ```text
//! Take(Select(Where(<root>, r => r.price > 100), r => r.title), 5)
//! ```
//!
//! The root is a [`Expr::Constant`] whose static type is
//! [`TypeTag::DocumentQuery`]. Lambdas are passed quoted.
//!
//! ### Node Kinds
//!
//! Dispatch in the translator is an exhaustive `match` over [`Expr`]; a node
//! kind with no translation rule is reported by its [`ExprKind`] tag.
//!
//! ### Methods
//!
//! Calls carry a [`MethodRef`] naming the declaring type and method. The
//! declaring type decides whether a call is query composition, a builtin
//! function, a user-defined function, or an opaque host function.
pub mod expressions;
pub mod operators;
pub mod queryable;
pub mod types;

pub use expressions::{
    DeclaringType, Expr, ExprKind, Lambda, Member, MemberBinding, MethodRef, ParameterDecl,
};
pub use operators::{BinaryOp, UnaryOp};
pub use queryable::Queryable;
pub use types::TypeTag;
