//! Query operator translation.
//!
//! Walks a chain of query operators from the root outwards, threading a
//! [`QueryStage`] through each one. Before an operator is applied the stage
//! decides whether the operator needs a stage of its own; if so the current
//! stage is packaged behind a fresh alias.
//!
//! The same walk translates queries nested inside lambda bodies
//! (`r.tags.Any(t => ...)`); those read from an array path instead of the
//! container and end up as `EXISTS(...)`, `ARRAY(...)` or `(...)` scalars.

use tracing::debug;

use crate::{
    ast::{Expr, Lambda, MethodRef, UnaryOp},
    context::{Collection, TranslationContext},
    error::{Result, TranslationError},
    linq::ScalarOperationKind,
    query::{AFTER_SKIP, AFTER_TAKE, QueryStage},
    scalar,
    sql::{CountSpec, SqlBinaryOp, SqlOrderByItem, SqlScalar, SqlSelectClause, names},
};

/// Operators still allowed once a Take() is part of the chain
const ALLOWED_AFTER_TAKE: [&str; 3] = ["Select", "Take", "FirstOrDefault"];

/// Operators still allowed once a Skip() is part of the chain
const ALLOWED_AFTER_SKIP: [&str; 4] = ["Select", "Take", "Skip", "FirstOrDefault"];

/// Operators that turn a call inside a lambda body into a nested query
const NESTED_QUERY_METHODS: [&str; 16] = [
    "Any",
    "Average",
    "Count",
    "Distinct",
    "Max",
    "Min",
    "OrderBy",
    "OrderByDescending",
    "Select",
    "SelectMany",
    "Skip",
    "Sum",
    "Take",
    "ThenBy",
    "ThenByDescending",
    "Where",
];

/// Translates a query expression into its (unflattened) stage chain.
pub(crate) fn translate_collection(expr: &Expr, ctx: &mut TranslationContext<'_>) -> Result<QueryStage> {
    match expr {
        Expr::Constant { ty, .. } if ty.is_document_query() && !ctx.in_subquery() => {
            Ok(QueryStage::root())
        }
        Expr::Call { method, args, .. } if method.is_linq() => {
            ctx.push_method(&method.name);
            let result = visit_method(&method.name, args, ctx);
            ctx.pop_method();
            result
        }
        // A nested query reads the array its chain starts from.
        path if ctx.in_subquery() => {
            let path = scalar::translate(path, ctx)?;
            let binding = ctx.fresh_name("v");
            Ok(QueryStage::over_array(binding, path))
        }
        Expr::Call { method, .. } => Err(TranslationError::method_not_supported(&method.to_string())),
        other => Err(TranslationError::unsupported(format!(
            "Expression type {} is not supported as a query source",
            other.kind()
        ))),
    }
}

fn visit_method(method: &str, args: &[Expr], ctx: &mut TranslationContext<'_>) -> Result<QueryStage> {
    let Some((source, rest)) = args.split_first() else {
        return Err(TranslationError::argument_count(method, 1, 0));
    };

    let input = translate_collection(source, ctx)?;
    if input.has_group_by() {
        return Err(TranslationError::unsupported(
            "GroupBy cannot be followed by other methods",
        ));
    }
    check_after_limits(&input, method)?;

    let mut stage = if input.should_be_on_new_stage(method, args.len()) {
        let alias = ctx.fresh_name("r");
        input.package(alias)
    } else {
        input
    };

    ctx.push_collection(Collection::Outer(stage.input_param().to_string()));
    let result = apply_method(method, rest, &mut stage, ctx);
    ctx.pop_collection();
    result?;

    debug!(method, depth = stage.depth(), "translated query operator");
    Ok(stage)
}

fn check_after_limits(input: &QueryStage, method: &str) -> Result<()> {
    if input.has_top() && !ALLOWED_AFTER_TAKE.contains(&method) {
        return Err(TranslationError::unsupported(AFTER_TAKE));
    }
    if input.has_offset() && !ALLOWED_AFTER_SKIP.contains(&method) {
        return Err(TranslationError::unsupported(AFTER_SKIP));
    }
    Ok(())
}

fn expect_args(method: &str, rest: &[Expr], expected: usize) -> Result<()> {
    if rest.len() != expected {
        return Err(TranslationError::argument_count(method, expected, rest.len()));
    }
    Ok(())
}

fn expect_lambda<'e>(method: &str, arg: &'e Expr) -> Result<&'e Lambda> {
    let lambda = arg.as_lambda().ok_or_else(|| {
        TranslationError::unsupported(format!(
            "Method '{}' expects a lambda, found {}",
            method,
            arg.kind()
        ))
    })?;
    if lambda.params.len() != 1 {
        return Err(TranslationError::unsupported(format!(
            "Method '{}' expects a lambda with one parameter",
            method
        )));
    }
    Ok(lambda)
}

/// Translates a lambda body with its parameter bound against `stage`.
fn translate_lambda(
    lambda: &Lambda,
    stage: &mut QueryStage,
    ctx: &mut TranslationContext<'_>,
) -> Result<SqlScalar> {
    let param = &lambda.params[0].name;
    ctx.bind_parameter(param, stage);
    let result = scalar::translate(&lambda.body, ctx);
    ctx.unbind_parameter();
    result
}

fn apply_method(
    method: &str,
    rest: &[Expr],
    stage: &mut QueryStage,
    ctx: &mut TranslationContext<'_>,
) -> Result<()> {
    match method {
        "Where" => {
            expect_args(method, rest, 1)?;
            let filter = translate_lambda(expect_lambda(method, &rest[0])?, stage, ctx)?;
            stage.add_where(filter);
        }
        "Select" => {
            expect_args(method, rest, 1)?;
            let value = translate_lambda(expect_lambda(method, &rest[0])?, stage, ctx)?;
            stage.add_select(SqlSelectClause::value(value))?;
        }
        "SelectMany" => {
            expect_args(method, rest, 1)?;
            visit_select_many(expect_lambda(method, &rest[0])?, stage, ctx)?;
        }
        "OrderBy" | "OrderByDescending" | "ThenBy" | "ThenByDescending" => {
            expect_args(method, rest, 1)?;
            let item = SqlOrderByItem {
                expr: translate_lambda(expect_lambda(method, &rest[0])?, stage, ctx)?,
                descending: method.ends_with("Descending"),
            };
            if method.starts_with("Then") {
                stage.then_by(item)?;
            } else {
                stage.add_order_by(item);
            }
        }
        "Take" => {
            expect_args(method, rest, 1)?;
            let count = count_spec(method, &rest[0], ctx)?;
            stage.add_top(count)?;
        }
        "Skip" => {
            expect_args(method, rest, 1)?;
            let count = count_spec(method, &rest[0], ctx)?;
            stage.add_offset(count)?;
        }
        "Distinct" => {
            expect_args(method, rest, 0)?;
            stage.set_distinct();
        }
        "Count" | "Any" => {
            if rest.len() > 1 {
                return Err(TranslationError::argument_count(method, 1, rest.len()));
            }
            require_outermost(method, ctx)?;
            if let Some(predicate) = rest.first() {
                let filter = translate_lambda(expect_lambda(method, predicate)?, stage, ctx)?;
                stage.add_where(filter);
            }
            // EXISTS around the nested query does the test.
            if method == "Any" && ctx.in_subquery() {
                return Ok(());
            }
            let count = SqlScalar::function(names::COUNT, vec![SqlScalar::integer(1)]);
            let value = if method == "Any" {
                SqlScalar::binary(SqlBinaryOp::GreaterThan, count, SqlScalar::integer(0))
            } else {
                count
            };
            stage.add_select(SqlSelectClause::value(value))?;
            ctx.set_client_operation(ScalarOperationKind::FirstOrDefault)?;
        }
        "Sum" | "Min" | "Max" | "Average" => {
            if rest.len() > 1 {
                return Err(TranslationError::argument_count(method, 1, rest.len()));
            }
            require_outermost(method, ctx)?;
            let operand = match rest.first() {
                Some(selector) => translate_lambda(expect_lambda(method, selector)?, stage, ctx)?,
                None => stage.row_expr(),
            };
            let func = match method {
                "Sum" => names::SUM,
                "Min" => names::MIN,
                "Max" => names::MAX,
                _ => names::AVG,
            };
            stage.add_select(SqlSelectClause::value(SqlScalar::function(func, vec![operand])))?;
            ctx.set_client_operation(ScalarOperationKind::FirstOrDefault)?;
        }
        "FirstOrDefault" => {
            if !rest.is_empty() {
                return Err(TranslationError::argument_count(method, 0, rest.len()));
            }
            require_outermost(method, ctx)?;
            stage.add_top(CountSpec::Literal(1))?;
            ctx.set_client_operation(ScalarOperationKind::FirstOrDefault)?;
        }
        "GroupBy" => visit_group_by(rest, stage, ctx)?,
        other => return Err(TranslationError::method_not_supported(other)),
    }
    Ok(())
}

/// Scalar-returning operators end the query; nothing may compose on top.
fn require_outermost(method: &str, ctx: &TranslationContext<'_>) -> Result<()> {
    if !ctx.is_outermost_method() {
        return Err(TranslationError::unsupported(format!(
            "Method '{}' is only supported as the last operation of a query",
            method
        )));
    }
    Ok(())
}

/// Row count for Take/Skip: a non-negative literal or a bound query parameter.
fn count_spec(method: &str, arg: &Expr, ctx: &mut TranslationContext<'_>) -> Result<CountSpec> {
    let arg = strip_convert(arg);
    let Some(value) = arg.as_constant() else {
        return Err(TranslationError::unsupported(format!(
            "The count argument of '{}' must be a constant",
            method
        )));
    };
    if let Some(name) = ctx.bind_constant(value)? {
        return Ok(CountSpec::Parameter(name));
    }
    match value.as_int() {
        Some(n) if n >= 0 => Ok(CountSpec::Literal(n)),
        Some(n) => Err(TranslationError::unsupported(format!(
            "The count argument of '{}' must not be negative, found {}",
            method, n
        ))),
        None => Err(TranslationError::unsupported(format!(
            "The count argument of '{}' must be an integer, found {}",
            method,
            value.type_name()
        ))),
    }
}

fn strip_convert(expr: &Expr) -> &Expr {
    match expr {
        Expr::Unary {
            op: UnaryOp::Convert,
            operand,
            ..
        } => strip_convert(operand),
        other => other,
    }
}

/// `SelectMany(r => path)` or `SelectMany(r => path.Where(..).Select(..))`.
///
/// The outer parameter ranges over the stage's rows; the body is an inner
/// collection whose elements are bound with a JOIN.
fn visit_select_many(
    lambda: &Lambda,
    stage: &mut QueryStage,
    ctx: &mut TranslationContext<'_>,
) -> Result<()> {
    ctx.bind_parameter(&lambda.params[0].name, stage);
    let result = visit_inner_collection(&lambda.body, stage, ctx);
    ctx.unbind_parameter();
    result
}

fn visit_inner_collection(
    expr: &Expr,
    stage: &mut QueryStage,
    ctx: &mut TranslationContext<'_>,
) -> Result<()> {
    let (method, source, lambda) = match expr {
        Expr::Call { method, args, .. }
            if method.is_linq() && matches!(method.name.as_str(), "Where" | "Select") =>
        {
            let [source, selector] = args.as_slice() else {
                return Err(TranslationError::argument_count(
                    &method.name,
                    1,
                    args.len().saturating_sub(1),
                ));
            };
            (method.name.as_str(), source, expect_lambda(&method.name, selector)?)
        }
        Expr::Call { method, .. } if method.is_linq() => {
            return Err(TranslationError::method_not_supported(&method.name));
        }
        path => {
            let path = scalar::translate(path, ctx)?;
            let binding = ctx.fresh_name("v");
            stage.add_join(binding, path);
            return Ok(());
        }
    };

    let body = match source {
        Expr::Call { method, .. } if method.is_linq() => {
            visit_inner_collection(source, stage, ctx)?;
            translate_lambda(lambda, stage, ctx)?
        }
        path => {
            let path = scalar::translate(path, ctx)?;
            ctx.push_collection(Collection::Inner(path));
            let body = translate_lambda(lambda, stage, ctx);
            ctx.pop_collection();
            body?
        }
    };

    match method {
        "Where" => stage.add_where(body),
        _ => stage.replace_select_value(body),
    }
    Ok(())
}

/// `GroupBy(r => key, (key, group) => result)`
///
/// The key parameter of the result selector stands for the key expression;
/// aggregates over the group parameter aggregate the grouped rows.
fn visit_group_by(rest: &[Expr], stage: &mut QueryStage, ctx: &mut TranslationContext<'_>) -> Result<()> {
    expect_args("GroupBy", rest, 2)?;
    let key_selector = expect_lambda("GroupBy", &rest[0])?;
    let Some(result_selector) = rest[1].as_lambda().filter(|l| l.params.len() == 2) else {
        return Err(TranslationError::unsupported(
            "Method 'GroupBy' expects a result selector taking a key and a group",
        ));
    };

    let row = stage.row_expr();
    let key = translate_lambda(key_selector, stage, ctx)?;
    if matches!(key, SqlScalar::ObjectCreate(_)) {
        return Err(TranslationError::unsupported(
            "GroupBy over a composite key is not supported",
        ));
    }

    ctx.bind_parameter_to(&result_selector.params[0].name, key.clone());
    let enclosing = ctx.enter_group(&result_selector.params[1].name, row);
    let value = scalar::translate(&result_selector.body, ctx);
    ctx.exit_group(enclosing);
    ctx.unbind_parameter();

    stage.add_group_by(key)?;
    stage.add_select(SqlSelectClause::value(value?))?;
    debug!("translated GroupBy");
    Ok(())
}

/// `g.Count()`, `g.Sum(x => x.price)` and friends over a GroupBy group.
pub(crate) fn translate_group_aggregate(
    method: &str,
    args: &[Expr],
    row: SqlScalar,
    ctx: &mut TranslationContext<'_>,
) -> Result<SqlScalar> {
    let func = match method {
        "Count" => names::COUNT,
        "Sum" => names::SUM,
        "Min" => names::MIN,
        "Max" => names::MAX,
        "Average" => names::AVG,
        other => return Err(TranslationError::method_not_supported(other)),
    };

    match (func, args.get(1..).unwrap_or_default()) {
        (names::COUNT, []) => Ok(SqlScalar::function(names::COUNT, vec![SqlScalar::integer(1)])),
        (names::COUNT, rest) => Err(TranslationError::argument_count(method, 0, rest.len())),
        (_, []) => Ok(SqlScalar::function(func, vec![row])),
        (_, [selector]) => {
            let lambda = expect_lambda(method, selector)?;
            ctx.bind_parameter_to(&lambda.params[0].name, row);
            let value = scalar::translate(&lambda.body, ctx);
            ctx.unbind_parameter();
            Ok(SqlScalar::function(func, vec![value?]))
        }
        (_, rest) => Err(TranslationError::argument_count(method, 1, rest.len())),
    }
}

/// Whether a call inside a lambda body is a query over a nested array.
///
/// Only the extension form, with the sequence as first argument, qualifies.
/// `Count()` straight on an array stays a builtin (`ARRAY_LENGTH`).
pub(crate) fn is_nested_query(target: Option<&Expr>, method: &MethodRef, args: &[Expr]) -> bool {
    if target.is_some()
        || !method.is_linq()
        || !NESTED_QUERY_METHODS.contains(&method.name.as_str())
    {
        return false;
    }
    let over_chain = matches!(args.first(), Some(Expr::Call { method, .. }) if method.is_linq());
    !(method.name == "Count" && args.len() == 1 && !over_chain)
}

/// Translates a query inside a lambda body into a scalar.
pub(crate) fn translate_nested_query(
    expr: &Expr,
    method: &str,
    ctx: &mut TranslationContext<'_>,
) -> Result<SqlScalar> {
    let enclosing = ctx.enter_subquery();
    let stage = translate_collection(expr, ctx);
    ctx.exit_subquery(enclosing);
    let query = Box::new(stage?.into_sql_query()?);
    debug!(method, "translated nested query");

    Ok(match method {
        "Any" => SqlScalar::Exists(query),
        "Count" | "Sum" => SqlScalar::Subquery(query),
        // MIN, MAX and AVG of no rows are undefined; read them through an array.
        "Min" | "Max" | "Average" => SqlScalar::MemberIndexer {
            member: Box::new(SqlScalar::Array(query)),
            index: Box::new(SqlScalar::integer(0)),
        },
        _ => SqlScalar::Array(query),
    })
}
