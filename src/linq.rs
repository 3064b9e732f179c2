//! Top-level entry point.
//!
//! [`translate_query`] takes the expression built by a query surface and
//! dispatches on its outermost node:
//!
//! - a bare query root translates to no query at all (read everything)
//! - a raw-query escape call yields the query text it carries
//! - any other call is folded, translated, flattened and rendered
//!
//! # Examples
//!
//! ```
//! use docql::ast::{BinaryOp, Expr, Lambda, Queryable, TypeTag};
//! use docql::evaluator::Interpreter;
//! use docql::linq::{ScalarOperationKind, translate_query};
//! use docql::TranslationOptions;
//!
//! let row = TypeTag::model("Row");
//! let r = Expr::parameter("r", row.clone());
//! let query = Queryable::root(row.clone())
//!     .where_(Lambda::unary(
//!         "r",
//!         row,
//!         Expr::compare(
//!             BinaryOp::GreaterThan,
//!             Expr::member(r, "price", TypeTag::Int32),
//!             Expr::int(100),
//!         ),
//!     ))
//!     .into_expr();
//!
//! let translated = translate_query(query, &TranslationOptions::new(), &Interpreter::new()).unwrap();
//! assert_eq!(
//!     translated.spec.unwrap().query_text,
//!     r#"SELECT VALUE root FROM root WHERE (root["price"] > 100)"#
//! );
//! assert_eq!(translated.scalar_operation, ScalarOperationKind::None);
//! ```

use serde::Serialize;
use tracing::debug;

use crate::{
    ast::{DeclaringType, Expr},
    config::TranslationOptions,
    context::TranslationContext,
    error::{Result, TranslationError},
    folding::{HostEvaluator, fold},
    sql::{
        SqlQuery, SqlQuerySpec,
        printer::{to_sql, to_sql_pretty},
    },
    translator::translate_collection,
    value::Value,
};

/// Reduction the caller applies to the returned rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ScalarOperationKind {
    /// The query text expresses the full result
    #[default]
    None,
    /// Take the first row, or the default value when there is none
    FirstOrDefault,
}

/// Result of translating one query expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslatedQuery {
    /// Query text and parameters; `None` reads the whole container
    pub spec: Option<SqlQuerySpec>,
    pub scalar_operation: ScalarOperationKind,
}

/// Translates a query expression into query text.
pub fn translate_query(
    expr: Expr,
    options: &TranslationOptions,
    evaluator: &dyn HostEvaluator,
) -> Result<TranslatedQuery> {
    match expr {
        Expr::Constant { ref ty, .. } if ty.is_document_query() => {
            debug!("query root without operators, no query text");
            Ok(TranslatedQuery {
                spec: None,
                scalar_operation: ScalarOperationKind::None,
            })
        }
        Expr::Call {
            ref method,
            ref args,
            ..
        } if method.declaring == DeclaringType::QueryEscape => {
            let spec = escape_query(&method.name, args, evaluator)?;
            debug!(query = %spec.query_text, "raw query escape");
            Ok(TranslatedQuery {
                spec: Some(spec),
                scalar_operation: ScalarOperationKind::None,
            })
        }
        Expr::Call { .. } => {
            let mut ctx = TranslationContext::new(options, evaluator);
            let query = compile(expr, &mut ctx)?;
            let query_text = if options.pretty {
                to_sql_pretty(&query)
            } else {
                to_sql(&query)
            };
            debug!(query = %query_text, "translated query");

            let scalar_operation = ctx.client_operation();
            Ok(TranslatedQuery {
                spec: Some(SqlQuerySpec {
                    query_text,
                    parameters: ctx.into_parameters(),
                }),
                scalar_operation,
            })
        }
        other => Err(TranslationError::unsupported(format!(
            "Invalid expression: {} cannot start a query",
            other.kind()
        ))),
    }
}

/// Folds and translates a query expression into its single-stage AST.
pub fn translate_to_sql_query(
    expr: Expr,
    options: &TranslationOptions,
    evaluator: &dyn HostEvaluator,
) -> Result<SqlQuery> {
    let mut ctx = TranslationContext::new(options, evaluator);
    compile(expr, &mut ctx)
}

fn compile(expr: Expr, ctx: &mut TranslationContext<'_>) -> Result<SqlQuery> {
    let folded = fold(expr, ctx.evaluator())?;
    ctx.declare_names(&folded);
    translate_collection(&folded, ctx)?.into_sql_query()
}

/// Resolves the raw query text of an escape call.
fn escape_query(method: &str, args: &[Expr], evaluator: &dyn HostEvaluator) -> Result<SqlQuerySpec> {
    let [source, raw] = args else {
        return Err(TranslationError::argument_count(
            method,
            1,
            args.len().saturating_sub(1),
        ));
    };
    if !source.ty().is_document_query() {
        return Err(TranslationError::unsupported(format!(
            "Method '{}' must be called on a query root",
            method
        )));
    }

    let value = match raw {
        Expr::Constant { value, .. } => value.clone(),
        other => match other.as_lambda() {
            Some(lambda) if lambda.params.is_empty() => evaluator.evaluate(&lambda.body)?,
            _ => evaluator.evaluate(other)?,
        },
    };

    match value {
        Value::String(text) => Ok(SqlQuerySpec::new(text)),
        Value::QuerySpec(spec) => Ok(spec),
        Value::Null => Err(TranslationError::MalformedConstantEscape(
            "query text evaluated to null".to_string(),
        )),
        other => Err(TranslationError::MalformedConstantEscape(format!(
            "expected a string or a query spec, found {}",
            other.type_name()
        ))),
    }
}
