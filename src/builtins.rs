//! Builtin function table.
//!
//! Maps calls into the host's string, math, array and type-check libraries to
//! the dialect's builtin functions. A call that matches no entry is reported as
//! an unsupported method.

use crate::{
    ast::{DeclaringType, Expr, MethodRef},
    context::TranslationContext,
    error::{Result, TranslationError},
    scalar::{translate, translate_all},
    sql::{SqlBinaryOp, SqlScalar, names},
    value::Value,
};

/// Translates a call that is not a query operator.
pub(crate) fn translate_call(
    target: Option<&Expr>,
    method: &MethodRef,
    args: &[Expr],
    ctx: &mut TranslationContext<'_>,
) -> Result<SqlScalar> {
    let name = method.name.as_str();
    let translated = match &method.declaring {
        DeclaringType::String => string_method(name, target, args, ctx)?,
        DeclaringType::Math => math_method(name, args, ctx)?,
        DeclaringType::Enumerable | DeclaringType::List => array_method(name, target, args, ctx)?,
        DeclaringType::TypeCheck => type_check(name, args, ctx)?,
        DeclaringType::Object => object_method(name, target, args, ctx)?,
        DeclaringType::Queryable
        | DeclaringType::UserFunction
        | DeclaringType::QueryEscape
        | DeclaringType::Host(_) => None,
    };
    translated.ok_or_else(|| TranslationError::method_not_supported(&method.to_string()))
}

/// Whether a trailing comparison argument asks for a case-insensitive match.
///
/// Accepts a boolean flag, a comparison name (`"OrdinalIgnoreCase"`) or a
/// comparison ordinal, where the ignore-case variants are the odd ones.
fn ignore_case(arg: &Expr) -> Option<bool> {
    match arg.as_constant()? {
        Value::Boolean(b) => Some(*b),
        Value::String(s) => Some(s.ends_with("IgnoreCase")),
        Value::Integer(n) => Some(n % 2 == 1),
        _ => None,
    }
}

fn string_method(
    name: &str,
    target: Option<&Expr>,
    args: &[Expr],
    ctx: &mut TranslationContext<'_>,
) -> Result<Option<SqlScalar>> {
    let Some(target) = target else {
        return static_string_method(name, args, ctx);
    };
    let subject = translate(target, ctx)?;

    let call = |func: &str, mut rest: Vec<SqlScalar>| {
        let mut all = vec![subject.clone()];
        all.append(&mut rest);
        SqlScalar::function(func, all)
    };

    Ok(Some(match (name, args) {
        ("Contains" | "StartsWith" | "EndsWith" | "IndexOf", [needle]) => {
            let func = match name {
                "Contains" => "CONTAINS",
                "StartsWith" => "STARTSWITH",
                "EndsWith" => "ENDSWITH",
                _ => "INDEX_OF",
            };
            call(func, vec![translate(needle, ctx)?])
        }
        ("Contains" | "StartsWith" | "EndsWith", [needle, comparison]) => {
            let Some(ignore) = ignore_case(comparison) else {
                return Ok(None);
            };
            let func = match name {
                "Contains" => "CONTAINS",
                "StartsWith" => "STARTSWITH",
                _ => "ENDSWITH",
            };
            let mut rest = vec![translate(needle, ctx)?];
            if ignore {
                rest.push(SqlScalar::boolean(true));
            }
            call(func, rest)
        }
        ("IndexOf", [needle, start]) => {
            call("INDEX_OF", vec![translate(needle, ctx)?, translate(start, ctx)?])
        }
        ("ToLower" | "ToLowerInvariant", []) => call("LOWER", Vec::new()),
        ("ToUpper" | "ToUpperInvariant", []) => call("UPPER", Vec::new()),
        ("Trim", []) => call("TRIM", Vec::new()),
        ("TrimStart", []) => call("LTRIM", Vec::new()),
        ("TrimEnd", []) => call("RTRIM", Vec::new()),
        ("Replace", [from, to]) => call("REPLACE", vec![translate(from, ctx)?, translate(to, ctx)?]),
        ("Substring", [start]) => {
            let length = SqlScalar::function("LENGTH", vec![subject.clone()]);
            call("SUBSTRING", vec![translate(start, ctx)?, length])
        }
        ("Substring", [start, length]) => {
            call("SUBSTRING", vec![translate(start, ctx)?, translate(length, ctx)?])
        }
        ("get_Chars", [index]) => {
            call("SUBSTRING", vec![translate(index, ctx)?, SqlScalar::integer(1)])
        }
        ("Equals", [other]) => SqlScalar::binary(SqlBinaryOp::Equal, subject, translate(other, ctx)?),
        ("Equals", [other, comparison]) => {
            let other = translate(other, ctx)?;
            match ignore_case(comparison) {
                Some(true) => call("STRINGEQUALS", vec![other, SqlScalar::boolean(true)]),
                Some(false) => SqlScalar::binary(SqlBinaryOp::Equal, subject, other),
                None => return Ok(None),
            }
        }
        ("Reverse", []) => call("REVERSE", Vec::new()),
        ("ToString", []) => call("ToString", Vec::new()),
        _ => return Ok(None),
    }))
}

fn static_string_method(
    name: &str,
    args: &[Expr],
    ctx: &mut TranslationContext<'_>,
) -> Result<Option<SqlScalar>> {
    Ok(Some(match (name, args) {
        ("Concat", [Expr::NewArray { elements, .. }]) => {
            SqlScalar::function("CONCAT", translate_all(elements, ctx)?)
        }
        ("Concat", parts) if parts.len() >= 2 => SqlScalar::function("CONCAT", translate_all(parts, ctx)?),
        ("Reverse", [subject]) => SqlScalar::function("REVERSE", vec![translate(subject, ctx)?]),
        ("IsNullOrEmpty", [subject]) => {
            let subject = translate(subject, ctx)?;
            SqlScalar::binary(
                SqlBinaryOp::Or,
                SqlScalar::binary(SqlBinaryOp::Equal, subject.clone(), SqlScalar::null()),
                SqlScalar::binary(SqlBinaryOp::Equal, subject, SqlScalar::string("")),
            )
        }
        ("Equals", [a, b]) => {
            SqlScalar::binary(SqlBinaryOp::Equal, translate(a, ctx)?, translate(b, ctx)?)
        }
        ("Equals", [a, b, comparison]) => {
            let (a, b) = (translate(a, ctx)?, translate(b, ctx)?);
            match ignore_case(comparison) {
                Some(true) => SqlScalar::function("STRINGEQUALS", vec![a, b, SqlScalar::boolean(true)]),
                Some(false) => SqlScalar::binary(SqlBinaryOp::Equal, a, b),
                None => return Ok(None),
            }
        }
        _ => return Ok(None),
    }))
}

fn math_method(name: &str, args: &[Expr], ctx: &mut TranslationContext<'_>) -> Result<Option<SqlScalar>> {
    let func = match (name, args.len()) {
        ("Abs", 1) => "ABS",
        ("Acos", 1) => "ACOS",
        ("Asin", 1) => "ASIN",
        ("Atan", 1) => "ATAN",
        ("Atan2", 2) => "ATN2",
        ("Ceiling", 1) => "CEILING",
        ("Cos", 1) => "COS",
        ("Exp", 1) => "EXP",
        ("Floor", 1) => "FLOOR",
        ("Log", 1 | 2) => "LOG",
        ("Log10", 1) => "LOG10",
        ("Pow", 2) => "POWER",
        ("Round", 1) => "ROUND",
        ("Sign", 1) => "SIGN",
        ("Sin", 1) => "SIN",
        ("Sqrt", 1) => "SQRT",
        ("Tan", 1) => "TAN",
        ("Truncate", 1) => "TRUNC",
        _ => return Ok(None),
    };
    Ok(Some(SqlScalar::function(func, translate_all(args, ctx)?)))
}

fn array_method(
    name: &str,
    target: Option<&Expr>,
    args: &[Expr],
    ctx: &mut TranslationContext<'_>,
) -> Result<Option<SqlScalar>> {
    // Extension methods receive the sequence as their first argument.
    let (source, rest) = match (target, args) {
        (Some(source), rest) => (source, rest),
        (None, [source, rest @ ..]) => (source, rest),
        (None, []) => return Ok(None),
    };

    Ok(Some(match (name, rest) {
        ("Contains", [item]) => contains(source, item, ctx)?,
        ("Concat", [other]) => SqlScalar::function(
            names::ARRAY_CONCAT,
            vec![translate(source, ctx)?, translate(other, ctx)?],
        ),
        ("Count", []) => SqlScalar::function(names::ARRAY_LENGTH, vec![translate(source, ctx)?]),
        _ => return Ok(None),
    }))
}

/// `IN` over an inline list, `ARRAY_CONTAINS` over a document array.
fn contains(source: &Expr, item: &Expr, ctx: &mut TranslationContext<'_>) -> Result<SqlScalar> {
    let haystack = match source {
        Expr::Constant {
            value: Value::Array(_),
            ..
        }
        | Expr::NewArray { .. } => match translate(source, ctx)? {
            SqlScalar::ArrayCreate(items) => Some(items),
            _ => None,
        },
        _ => None,
    };

    match haystack {
        Some(items) if items.is_empty() => Ok(SqlScalar::boolean(false)),
        Some(items) => Ok(SqlScalar::In {
            needle: Box::new(translate(item, ctx)?),
            haystack: items,
            not: false,
        }),
        None => Ok(SqlScalar::function(
            names::ARRAY_CONTAINS,
            vec![translate(source, ctx)?, translate(item, ctx)?],
        )),
    }
}

fn type_check(name: &str, args: &[Expr], ctx: &mut TranslationContext<'_>) -> Result<Option<SqlScalar>> {
    let func = match name {
        "IsDefined" => names::IS_DEFINED,
        "IsNull" => names::IS_NULL,
        "IsPrimitive" => names::IS_PRIMITIVE,
        _ => return Ok(None),
    };
    match args {
        [subject] => Ok(Some(SqlScalar::function(func, vec![translate(subject, ctx)?]))),
        _ => Err(TranslationError::argument_count(name, 1, args.len())),
    }
}

fn object_method(
    name: &str,
    target: Option<&Expr>,
    args: &[Expr],
    ctx: &mut TranslationContext<'_>,
) -> Result<Option<SqlScalar>> {
    let Some(target) = target else {
        return Ok(None);
    };
    Ok(Some(match (name, args) {
        ("ToString", []) => SqlScalar::function("ToString", vec![translate(target, ctx)?]),
        ("Equals", [other]) => {
            SqlScalar::binary(SqlBinaryOp::Equal, translate(target, ctx)?, translate(other, ctx)?)
        }
        _ => return Ok(None),
    }))
}
