//! # docql
//!
//! Compiles LINQ-style query expression trees into the SQL dialect of a
//! document database.
//!
//! The pipeline:
//!
//! 1. [`folding`] replaces every parameter-independent subtree with its value,
//!    evaluated through an injected [`HostEvaluator`]
//! 2. [`linq::translate_query`] walks the operator chain into query stages,
//!    translating lambda bodies with [`scalar`]
//! 3. [`query`] flattens the stage chain into one query
//! 4. [`sql::printer`] renders the query text
//!
//! Member names on the wire come from a [`naming`] policy plus a per-field
//! metadata [`Schema`](naming::Schema).

pub mod ast;
mod builtins;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod folding;
pub mod linq;
pub mod naming;
pub mod query;
pub mod scalar;
pub mod sql;
mod translator;
pub mod value;

pub use ast::{Expr, Queryable, TypeTag};
pub use config::{QueryParameter, TranslationOptions, TranslationRequest};
pub use error::{HostError, Result, TranslationError};
pub use evaluator::Interpreter;
pub use folding::{HostEvaluator, fold};
pub use linq::{ScalarOperationKind, TranslatedQuery, translate_query};
pub use naming::{NamingPolicy, Schema};
pub use sql::{SqlParameter, SqlQuerySpec};
pub use value::Value;
