//! Scalar expression translation.
//!
//! Converts one host sub-expression (the body of a lambda, an argument of a
//! builtin call) into a [`SqlScalar`]. Dispatch is an exhaustive match over
//! [`Expr`]; lambda parameters resolve through the context's substitutions.

use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use tracing::trace;

use crate::{
    ast::{BinaryOp, DeclaringType, Expr, Member, MemberBinding, MethodRef, TypeTag, UnaryOp},
    builtins,
    context::TranslationContext,
    error::{Result, TranslationError},
    naming::to_wire_json,
    sql::{
        SqlBinaryOp, SqlLiteral, SqlNumber, SqlObjectProperty, SqlScalar, SqlUnaryOp, names,
    },
    translator,
    value::Value,
};

/// Translates a scalar host expression.
pub fn translate(expr: &Expr, ctx: &mut TranslationContext<'_>) -> Result<SqlScalar> {
    match expr {
        Expr::Constant { value, ty } => visit_constant(value, ty, ctx),
        Expr::Parameter { name, .. } => ctx.lookup_parameter(name).cloned().ok_or_else(|| {
            TranslationError::unsupported(format!("Parameter '{}' is not bound", name))
        }),
        Expr::Member {
            object,
            member,
            ty: _,
        } => visit_member(object.as_deref(), member, ctx),
        Expr::Binary {
            op,
            left,
            right,
            ty,
        } => visit_binary(*op, left, right, ty, ctx),
        Expr::Unary { op, operand, .. } => visit_unary(*op, operand, ctx),
        Expr::Conditional {
            test,
            if_true,
            if_false,
            ..
        } => Ok(SqlScalar::Conditional {
            condition: Box::new(translate(test, ctx)?),
            consequent: Box::new(translate(if_true, ctx)?),
            alternative: Box::new(translate(if_false, ctx)?),
        }),
        Expr::Call {
            target,
            method,
            args,
            ..
        } => {
            if method.declaring == DeclaringType::UserFunction {
                return visit_user_function(args, ctx);
            }
            if let Some(row) = group_source(method, args, ctx) {
                return translator::translate_group_aggregate(&method.name, args, row, ctx);
            }
            if translator::is_nested_query(target.as_deref(), method, args) {
                return translator::translate_nested_query(expr, &method.name, ctx);
            }
            builtins::translate_call(target.as_deref(), method, args, ctx)
        }
        Expr::New { args, members, ty } => Ok(visit_new(expr, args, members.as_deref(), ty, ctx)?
            .unwrap_or_else(|| SqlScalar::ObjectCreate(Vec::new()))),
        Expr::MemberInit { bindings, .. } => visit_member_init(bindings, ctx),
        Expr::NewArray { elements, .. } => Ok(SqlScalar::ArrayCreate(translate_all(elements, ctx)?)),
        Expr::ListInit { .. } | Expr::Lambda(_) | Expr::Invoke { .. } => Err(
            TranslationError::unsupported(format!("Expression type {} is not supported", expr.kind())),
        ),
    }
}

/// Row expression of the GroupBy group an operator call aggregates, if any
fn group_source(method: &MethodRef, args: &[Expr], ctx: &TranslationContext<'_>) -> Option<SqlScalar> {
    if !method.is_linq() {
        return None;
    }
    match args.first() {
        Some(Expr::Parameter { name, .. }) => ctx.group_row(name).cloned(),
        _ => None,
    }
}

pub(crate) fn translate_all(exprs: &[Expr], ctx: &mut TranslationContext<'_>) -> Result<Vec<SqlScalar>> {
    exprs.iter().map(|e| translate(e, ctx)).collect()
}

fn visit_constant(value: &Value, ty: &TypeTag, ctx: &mut TranslationContext<'_>) -> Result<SqlScalar> {
    if ty.is_document_query() {
        return Err(TranslationError::unsupported(
            "A query cannot be used as a scalar value",
        ));
    }
    if let Some(name) = ctx.bind_constant(value)? {
        return Ok(SqlScalar::Parameter(name));
    }

    match value {
        Value::Object(_) => {
            let json = to_wire_json(value, ty, &ctx.resolver())?;
            json_to_sql(&json)
        }
        Value::Array(items) => {
            let element = ty.element_type().cloned().unwrap_or(TypeTag::Object);
            Ok(SqlScalar::ArrayCreate(
                items
                    .iter()
                    .map(|item| visit_constant(item, &element, ctx))
                    .collect::<Result<_>>()?,
            ))
        }
        Value::QuerySpec(_) => Err(TranslationError::unsupported(
            "A query spec cannot be used as a scalar value",
        )),
        other => value_to_sql(other),
    }
}

/// Double literal; the query language has no spelling for infinities or NaN.
fn double(n: f64) -> Result<SqlScalar> {
    if !n.is_finite() {
        return Err(TranslationError::unsupported(format!(
            "Non-finite number {} is not supported",
            n
        )));
    }
    Ok(SqlScalar::double(n))
}

/// Literal for a primitive host value.
pub(crate) fn value_to_sql(value: &Value) -> Result<SqlScalar> {
    Ok(match value {
        Value::Null => SqlScalar::null(),
        Value::Boolean(b) => SqlScalar::boolean(*b),
        Value::Integer(n) => SqlScalar::integer(*n),
        Value::UInteger(n) => match i64::try_from(*n) {
            Ok(i) => SqlScalar::integer(i),
            Err(_) => double(*n as f64)?,
        },
        Value::Float(f) => double(*f)?,
        Value::Decimal(d) => match d.to_i64() {
            Some(i) if d.fract().is_zero() => SqlScalar::integer(i),
            _ => double(d.to_f64().unwrap_or(f64::NAN))?,
        },
        Value::Char(c) => SqlScalar::Literal(SqlLiteral::String(c.to_string())),
        Value::String(s) => SqlScalar::string(s),
        Value::Guid(g) => SqlScalar::Literal(SqlLiteral::String(g.to_string())),
        Value::Geometry(json) => json_to_sql(json)?,
        Value::Array(items) => {
            SqlScalar::ArrayCreate(items.iter().map(value_to_sql).collect::<Result<_>>()?)
        }
        Value::Object(_) | Value::QuerySpec(_) => json_to_sql(&value.to_json())?,
    })
}

/// Rebuilds a JSON structure as nested literal, array and object nodes.
pub(crate) fn json_to_sql(json: &serde_json::Value) -> Result<SqlScalar> {
    Ok(match json {
        serde_json::Value::Null => SqlScalar::null(),
        serde_json::Value::Bool(b) => SqlScalar::boolean(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => SqlScalar::integer(i),
            None => double(n.as_f64().unwrap_or(f64::NAN))?,
        },
        serde_json::Value::String(s) => SqlScalar::string(s),
        serde_json::Value::Array(items) => {
            SqlScalar::ArrayCreate(items.iter().map(json_to_sql).collect::<Result<_>>()?)
        }
        serde_json::Value::Object(fields) => SqlScalar::ObjectCreate(
            fields
                .iter()
                .map(|(name, value)| {
                    Ok(SqlObjectProperty {
                        name: name.clone(),
                        value: json_to_sql(value)?,
                    })
                })
                .collect::<Result<_>>()?,
        ),
    })
}

fn literal_to_json(literal: &SqlLiteral) -> serde_json::Value {
    match literal {
        SqlLiteral::Null | SqlLiteral::Undefined => serde_json::Value::Null,
        SqlLiteral::Boolean(b) => serde_json::Value::Bool(*b),
        SqlLiteral::Number(SqlNumber::Integer(n)) => serde_json::Value::from(*n),
        SqlLiteral::Number(SqlNumber::Double(n)) => serde_json::Value::from(*n),
        SqlLiteral::String(s) => serde_json::Value::String(s.clone()),
    }
}

fn visit_member(
    object: Option<&Expr>,
    member: &Member,
    ctx: &mut TranslationContext<'_>,
) -> Result<SqlScalar> {
    let Some(object) = object else {
        return Err(TranslationError::unsupported(format!(
            "Static member '{}.{}' is not supported",
            member.owner, member.name
        )));
    };

    let object_ty = object.ty();
    if object_ty.is_nullable() {
        match member.name.as_str() {
            "Value" => return translate(object, ctx),
            "HasValue" => {
                return Ok(SqlScalar::function(
                    names::IS_DEFINED,
                    vec![translate(object, ctx)?],
                ));
            }
            _ => {}
        }
    }
    match (object_ty.underlying(), member.name.as_str()) {
        (TypeTag::String, "Length") => {
            return Ok(SqlScalar::function("LENGTH", vec![translate(object, ctx)?]));
        }
        (TypeTag::Array(_), "Length" | "Count") => {
            return Ok(SqlScalar::function(
                names::ARRAY_LENGTH,
                vec![translate(object, ctx)?],
            ));
        }
        _ => {}
    }

    let target = translate(object, ctx)?;
    let wire_name = ctx.resolver().wire_name(member);
    Ok(SqlScalar::index(target, &wire_name))
}

/// `a.CompareTo(b)` or `string.Compare(a, b)`
fn as_string_compare(expr: &Expr) -> Option<(&Expr, &Expr)> {
    match expr {
        Expr::Call {
            target: Some(target),
            method,
            args,
            ..
        } if method.declaring == DeclaringType::String
            && method.name == "CompareTo"
            && args.len() == 1 =>
        {
            Some((target, &args[0]))
        }
        Expr::Call {
            target: None,
            method,
            args,
            ..
        } if method.declaring == DeclaringType::String
            && method.name == "Compare"
            && args.len() == 2 =>
        {
            Some((&args[0], &args[1]))
        }
        _ => None,
    }
}

fn is_zero(expr: &Expr) -> bool {
    expr.as_constant().and_then(Value::as_int) == Some(0)
}

fn mirror(op: BinaryOp) -> BinaryOp {
    match op {
        BinaryOp::LessThan => BinaryOp::GreaterThan,
        BinaryOp::LessThanOrEqual => BinaryOp::GreaterThanOrEqual,
        BinaryOp::GreaterThan => BinaryOp::LessThan,
        BinaryOp::GreaterThanOrEqual => BinaryOp::LessThanOrEqual,
        other => other,
    }
}

fn visit_binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    ty: &TypeTag,
    ctx: &mut TranslationContext<'_>,
) -> Result<SqlScalar> {
    // x.CompareTo(y) op 0  =>  x op y
    let compare = match (as_string_compare(left), as_string_compare(right)) {
        (Some(operands), _) if is_zero(right) => Some((operands, op)),
        (_, Some(operands)) if is_zero(left) => Some((operands, mirror(op))),
        _ => None,
    };
    if let Some(((a, b), op)) = compare {
        if !matches!(
            op,
            BinaryOp::Equal
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterThanOrEqual
                | BinaryOp::LessThan
                | BinaryOp::LessThanOrEqual
        ) {
            return Err(TranslationError::unsupported(format!(
                "Operator {} is not supported for string comparison",
                op
            )));
        }
        trace!(op = %op, "rewriting string comparison");
        return visit_binary(op, a, b, &TypeTag::Boolean, ctx);
    }

    let mut left_sql = translate(left, ctx)?;
    let mut right_sql = translate(right, ctx)?;

    if left_sql.is_member_indexer() && right_sql.is_non_null_literal() {
        right_sql = apply_converter(left, right_sql, ctx)?;
    } else if right_sql.is_member_indexer() && left_sql.is_non_null_literal() {
        left_sql = apply_converter(right, left_sql, ctx)?;
    }

    let sql_op = match op {
        BinaryOp::ArrayIndex => {
            return Ok(SqlScalar::MemberIndexer {
                member: Box::new(left_sql),
                index: Box::new(right_sql),
            });
        }
        BinaryOp::Add if ty.is_string() || left.ty().is_string() || right.ty().is_string() => {
            SqlBinaryOp::StringConcat
        }
        BinaryOp::Add => SqlBinaryOp::Add,
        BinaryOp::Subtract => SqlBinaryOp::Subtract,
        BinaryOp::Multiply => SqlBinaryOp::Multiply,
        BinaryOp::Divide => SqlBinaryOp::Divide,
        BinaryOp::Modulo => SqlBinaryOp::Modulo,
        BinaryOp::AndAlso => SqlBinaryOp::And,
        BinaryOp::OrElse => SqlBinaryOp::Or,
        BinaryOp::And => SqlBinaryOp::BitwiseAnd,
        BinaryOp::Or => SqlBinaryOp::BitwiseOr,
        BinaryOp::ExclusiveOr => SqlBinaryOp::BitwiseXor,
        BinaryOp::Equal => SqlBinaryOp::Equal,
        BinaryOp::NotEqual => SqlBinaryOp::NotEqual,
        BinaryOp::LessThan => SqlBinaryOp::LessThan,
        BinaryOp::LessThanOrEqual => SqlBinaryOp::LessThanOrEqual,
        BinaryOp::GreaterThan => SqlBinaryOp::GreaterThan,
        BinaryOp::GreaterThanOrEqual => SqlBinaryOp::GreaterThanOrEqual,
        BinaryOp::Coalesce => SqlBinaryOp::Coalesce,
        BinaryOp::Power | BinaryOp::LeftShift | BinaryOp::RightShift => {
            return Err(TranslationError::unsupported(format!(
                "Binary operator {} is not supported",
                op
            )));
        }
    };
    Ok(SqlScalar::binary(sql_op, left_sql, right_sql))
}

/// Member behind conversions and nullable unwrapping, if `expr` is an access.
fn accessed_member(expr: &Expr) -> Option<&Member> {
    match expr {
        Expr::Member { object, member, .. } => match object.as_deref() {
            Some(object) if object.ty().is_nullable() && member.name == "Value" => {
                accessed_member(object)
            }
            _ => Some(member),
        },
        Expr::Unary {
            op: UnaryOp::Convert | UnaryOp::TypeAs,
            operand,
            ..
        } => accessed_member(operand),
        _ => None,
    }
}

/// Rewrites a literal compared against a member with a custom wire encoding.
fn apply_converter(
    member_expr: &Expr,
    literal: SqlScalar,
    ctx: &TranslationContext<'_>,
) -> Result<SqlScalar> {
    let resolver = ctx.resolver();
    let Some(converter) = accessed_member(member_expr).and_then(|m| resolver.converter(m)) else {
        return Ok(literal);
    };
    let SqlScalar::Literal(lit) = &literal else {
        return Ok(literal);
    };
    let converted = converter.convert(&literal_to_json(lit))?;
    json_to_sql(&converted)
}

fn visit_unary(op: UnaryOp, operand: &Expr, ctx: &mut TranslationContext<'_>) -> Result<SqlScalar> {
    let inner = translate(operand, ctx)?;
    Ok(match op {
        UnaryOp::Convert | UnaryOp::Quote | UnaryOp::TypeAs => inner,
        UnaryOp::Not => match inner {
            SqlScalar::In {
                needle,
                haystack,
                not,
            } => SqlScalar::In {
                needle,
                haystack,
                not: !not,
            },
            other => SqlScalar::unary(SqlUnaryOp::Not, other),
        },
        UnaryOp::Negate => SqlScalar::unary(SqlUnaryOp::Minus, inner),
        UnaryOp::UnaryPlus => SqlScalar::unary(SqlUnaryOp::Plus, inner),
        UnaryOp::OnesComplement => SqlScalar::unary(SqlUnaryOp::BitwiseNot, inner),
        UnaryOp::ArrayLength => SqlScalar::function(names::ARRAY_LENGTH, vec![inner]),
    })
}

/// `None` for a parameterless constructor; the initializer around it emits the object.
fn visit_new(
    expr: &Expr,
    args: &[Expr],
    members: Option<&[Member]>,
    ty: &TypeTag,
    ctx: &mut TranslationContext<'_>,
) -> Result<Option<SqlScalar>> {
    if *ty.underlying() == TypeTag::Geometry {
        let value = ctx.evaluator().evaluate(expr)?;
        return value_to_sql(&value).map(Some);
    }

    match members {
        Some(members) if members.len() != args.len() => Err(TranslationError::argument_count(
            &ty.to_string(),
            members.len(),
            args.len(),
        )),
        Some(members) => {
            let resolver = ctx.resolver();
            let properties = members
                .iter()
                .zip(args)
                .map(|(member, arg)| {
                    Ok(SqlObjectProperty {
                        name: resolver.wire_name(member),
                        value: translate(arg, ctx)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Some(SqlScalar::ObjectCreate(properties)))
        }
        None if args.is_empty() => Ok(None),
        None => Err(TranslationError::unsupported(format!(
            "Constructor call on type {} is not supported",
            ty
        ))),
    }
}

fn visit_member_init(
    bindings: &[MemberBinding],
    ctx: &mut TranslationContext<'_>,
) -> Result<SqlScalar> {
    let resolver = ctx.resolver();
    let properties = bindings
        .iter()
        .map(|binding| match binding {
            MemberBinding::Assignment { member, value } => Ok(SqlObjectProperty {
                name: resolver.wire_name(member),
                value: translate(value, ctx)?,
            }),
            MemberBinding::MemberMember { member, .. } | MemberBinding::List { member, .. } => {
                Err(TranslationError::unsupported(format!(
                    "Binding of member '{}' is not supported",
                    member.name
                )))
            }
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(SqlScalar::ObjectCreate(properties))
}

static UDF_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

fn is_udf_name(name: &str) -> bool {
    UDF_NAME.is_match(name)
}

fn visit_user_function(args: &[Expr], ctx: &mut TranslationContext<'_>) -> Result<SqlScalar> {
    let name = match args.first().and_then(Expr::as_constant) {
        Some(Value::String(name)) if !name.is_empty() => name.clone(),
        _ => {
            return Err(TranslationError::unsupported(
                "User-defined function name must be a non-empty constant string",
            ));
        }
    };
    if !is_udf_name(&name) {
        return Err(TranslationError::unsupported(format!(
            "Invalid user-defined function name '{}'",
            name
        )));
    }

    let udf_args = match &args[1..] {
        [Expr::NewArray { elements, .. }] => translate_all(elements, ctx)?,
        [Expr::Constant {
            value: Value::Array(items),
            ..
        }] => items
            .iter()
            .map(|item| visit_constant(item, &TypeTag::Object, ctx))
            .collect::<Result<_>>()?,
        rest => translate_all(rest, ctx)?,
    };
    Ok(SqlScalar::udf(&name, udf_args))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_udf_names() {
        assert!(is_udf_name("tax"));
        assert!(is_udf_name("_calc2"));
        assert!(!is_udf_name("2fast"));
        assert!(!is_udf_name("a-b"));
        assert!(!is_udf_name(""));
    }

    #[test]
    fn test_large_unsigned_becomes_double() {
        assert_eq!(
            value_to_sql(&Value::UInteger(u64::MAX)).unwrap(),
            SqlScalar::double(u64::MAX as f64)
        );
        assert_eq!(value_to_sql(&Value::UInteger(7)).unwrap(), SqlScalar::integer(7));
    }

    #[test]
    fn test_whole_decimal_becomes_integer() {
        let whole = Value::Decimal(rust_decimal::Decimal::new(500, 2));
        let fraction = Value::Decimal(rust_decimal::Decimal::new(525, 2));
        assert_eq!(value_to_sql(&whole).unwrap(), SqlScalar::integer(5));
        assert_eq!(value_to_sql(&fraction).unwrap(), SqlScalar::double(5.25));
    }

    #[test]
    fn test_non_finite_floats_rejected() {
        for value in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            let err = value_to_sql(&Value::Float(value)).unwrap_err();
            assert!(matches!(err, TranslationError::UnsupportedExpressionShape(_)), "{:?}", err);
        }
        let nested = Value::Array(vec![Value::Float(1.5), Value::Float(f64::INFINITY)]);
        assert!(value_to_sql(&nested).is_err());
        assert_eq!(value_to_sql(&Value::Float(1.5)).unwrap(), SqlScalar::double(1.5));
    }
}
