use std::{cmp::Ordering, collections::HashMap, fmt, sync::Arc};

use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};

use crate::{
    ast::{BinaryOp, DeclaringType, Expr, MemberBinding, TypeTag, UnaryOp},
    error::HostError,
    folding::HostEvaluator,
    value::Value,
};

/// A host function callable from folded sub-expressions.
pub type HostFunction = Arc<dyn Fn(&[Value]) -> Result<Value, HostError> + Send + Sync>;

/// Default [`HostEvaluator`]: interprets closed sub-expressions.
///
/// Captured variables are modelled as constants (usually a [`Value::Object`]
/// standing for a closure) with member access on top. Static members and host
/// functions are looked up by qualified name and must be registered up front.
///
/// # Examples
///
/// ```
/// use docql::ast::{Expr, MethodRef, TypeTag};
/// use docql::evaluator::Interpreter;
/// use docql::folding::HostEvaluator;
/// use docql::Value;
///
/// let interpreter = Interpreter::new()
///     .with_function("Prices.Threshold", |_args| Ok(Value::Integer(100)));
///
/// let call = Expr::static_call(MethodRef::host("Prices", "Threshold"), vec![], TypeTag::Int32);
/// assert_eq!(interpreter.evaluate(&call).unwrap(), Value::Integer(100));
/// ```
#[derive(Default, Clone)]
pub struct Interpreter {
    /// Host functions by `Type.Method`; constructors use `Type.new`
    functions: HashMap<String, HostFunction>,
    /// Static member values by `Type.Member`
    statics: HashMap<String, Value>,
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut functions: Vec<_> = self.functions.keys().collect();
        functions.sort();
        f.debug_struct("Interpreter")
            .field("functions", &functions)
            .field("statics", &self.statics)
            .finish()
    }
}

impl HostEvaluator for Interpreter {
    fn evaluate(&self, expr: &Expr) -> Result<Value, HostError> {
        self.eval(expr)
    }
}

/// Numeric view of a value used for arithmetic and comparison.
#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Dec(Decimal),
    Float(f64),
}

impl Number {
    fn of(value: &Value) -> Option<Number> {
        match value {
            Value::Integer(n) => Some(Number::Int(*n)),
            Value::UInteger(n) => Some(match i64::try_from(*n) {
                Ok(i) => Number::Int(i),
                Err(_) => Number::Float(*n as f64),
            }),
            Value::Decimal(d) => Some(Number::Dec(*d)),
            Value::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    fn to_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Dec(d) => d.to_f64().unwrap_or(f64::NAN),
            Number::Float(f) => f,
        }
    }

    fn to_decimal(self) -> Option<Decimal> {
        match self {
            Number::Int(n) => Decimal::from_i64(n),
            Number::Dec(d) => Some(d),
            Number::Float(f) => Decimal::from_f64(f),
        }
    }

    fn into_value(self) -> Value {
        match self {
            Number::Int(n) => Value::Integer(n),
            Number::Dec(d) => Value::Decimal(d),
            Number::Float(f) => Value::Float(f),
        }
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a host function under its qualified name (`Type.Method`).
    pub fn with_function<F>(mut self, qualified: &str, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        self.functions.insert(qualified.to_string(), Arc::new(f));
        self
    }

    /// Registers the value of a static member (`Type.Member`).
    pub fn with_static(mut self, qualified: &str, value: Value) -> Self {
        self.statics.insert(qualified.to_string(), value);
        self
    }

    fn eval(&self, expr: &Expr) -> Result<Value, HostError> {
        match expr {
            Expr::Constant { value, .. } => Ok(value.clone()),
            Expr::Parameter { name, .. } => Err(HostError::UnboundParameter(name.clone())),
            Expr::Member {
                object: Some(object),
                member,
                ..
            } => {
                let target = self.eval(object)?;
                self.apply_member(&target, object.ty(), &member.name)
            }
            Expr::Member {
                object: None,
                member,
                ..
            } => {
                let qualified = format!("{}.{}", member.owner, member.name);
                self.statics
                    .get(&qualified)
                    .cloned()
                    .ok_or(HostError::UnknownMember(qualified))
            }
            Expr::Binary {
                op, left, right, ..
            } => match op {
                BinaryOp::Coalesce => {
                    let left_val = self.eval(left)?;
                    if left_val.is_null() {
                        self.eval(right)
                    } else {
                        Ok(left_val)
                    }
                }
                BinaryOp::AndAlso | BinaryOp::OrElse => {
                    let left_val = self.expect_bool(&self.eval(left)?)?;
                    match (op, left_val) {
                        (BinaryOp::AndAlso, false) => Ok(Value::Boolean(false)),
                        (BinaryOp::OrElse, true) => Ok(Value::Boolean(true)),
                        _ => {
                            let right_val = self.eval(right)?;
                            Ok(Value::Boolean(self.expect_bool(&right_val)?))
                        }
                    }
                }
                _ => {
                    let left_val = self.eval(left)?;
                    let right_val = self.eval(right)?;
                    self.apply_binary(*op, &left_val, &right_val)
                }
            },
            Expr::Unary { op, operand, ty } => {
                let value = self.eval(operand)?;
                self.apply_unary(*op, value, ty)
            }
            Expr::Conditional {
                test,
                if_true,
                if_false,
                ..
            } => {
                if self.expect_bool(&self.eval(test)?)? {
                    self.eval(if_true)
                } else {
                    self.eval(if_false)
                }
            }
            Expr::Call {
                target,
                method,
                args,
                ..
            } => {
                let target = target.as_ref().map(|t| self.eval(t)).transpose()?;
                let args = args
                    .iter()
                    .map(|a| self.eval(a))
                    .collect::<Result<Vec<_>, _>>()?;
                self.apply_call(&method.declaring, &method.name, target, &args)
            }
            Expr::New { args, members, ty } => {
                let args = args
                    .iter()
                    .map(|a| self.eval(a))
                    .collect::<Result<Vec<_>, _>>()?;
                match members {
                    Some(members) => Ok(Value::Object(
                        members
                            .iter()
                            .map(|m| m.name.clone())
                            .zip(args)
                            .collect(),
                    )),
                    None => {
                        let constructor = format!("{}.new", ty);
                        match self.functions.get(&constructor) {
                            Some(f) => f(&args),
                            None if args.is_empty() => Ok(Value::Object(Default::default())),
                            None => Err(HostError::UnknownFunction(constructor)),
                        }
                    }
                }
            }
            Expr::MemberInit { new, bindings, .. } => {
                let mut fields = match self.eval(new)? {
                    Value::Object(fields) => fields,
                    other => {
                        return Err(HostError::TypeError(format!(
                            "Cannot initialize members of {}",
                            other.type_name()
                        )));
                    }
                };
                for binding in bindings {
                    match binding {
                        MemberBinding::Assignment { member, value } => {
                            fields.insert(member.name.clone(), self.eval(value)?);
                        }
                        MemberBinding::MemberMember { member, .. }
                        | MemberBinding::List { member, .. } => {
                            return Err(HostError::TypeError(format!(
                                "Nested initialization of member {} is not supported",
                                member.name
                            )));
                        }
                    }
                }
                Ok(Value::Object(fields))
            }
            Expr::ListInit { initializers, .. } => Ok(Value::Array(
                initializers
                    .iter()
                    .map(|e| self.eval(e))
                    .collect::<Result<_, _>>()?,
            )),
            Expr::NewArray { elements, .. } => Ok(Value::Array(
                elements
                    .iter()
                    .map(|e| self.eval(e))
                    .collect::<Result<_, _>>()?,
            )),
            Expr::Lambda(_) => Err(HostError::TypeError(
                "A lambda is not a value".to_string(),
            )),
            Expr::Invoke { .. } => Err(HostError::TypeError(
                "Delegate invocation is not supported".to_string(),
            )),
        }
    }

    fn expect_bool(&self, value: &Value) -> Result<bool, HostError> {
        value.as_bool().ok_or_else(|| {
            HostError::TypeError(format!("Expected boolean, found {}", value.type_name()))
        })
    }

    fn apply_member(&self, target: &Value, ty: &TypeTag, name: &str) -> Result<Value, HostError> {
        match (target, name) {
            (value, "Value") if ty.is_nullable() => {
                if value.is_null() {
                    Err(HostError::TypeError(
                        "Nullable object must have a value".to_string(),
                    ))
                } else {
                    Ok(value.clone())
                }
            }
            (value, "HasValue") if ty.is_nullable() => Ok(Value::Boolean(!value.is_null())),
            (Value::Object(fields), _) => fields
                .get(name)
                .cloned()
                .ok_or_else(|| HostError::UnknownMember(name.to_string())),
            (Value::Array(items), "Length" | "Count") => Ok(Value::Integer(items.len() as i64)),
            (Value::String(s), "Length") => Ok(Value::Integer(s.chars().count() as i64)),
            (Value::Null, _) => Err(HostError::TypeError(format!(
                "Cannot read member {} of null",
                name
            ))),
            (other, _) => Err(HostError::UnknownMember(format!(
                "{} on {}",
                name,
                other.type_name()
            ))),
        }
    }

    fn apply_unary(&self, op: UnaryOp, value: Value, ty: &TypeTag) -> Result<Value, HostError> {
        match op {
            UnaryOp::Negate => match Number::of(&value) {
                Some(Number::Int(n)) => n
                    .checked_neg()
                    .map(Value::Integer)
                    .ok_or_else(|| HostError::TypeError("Arithmetic overflow".to_string())),
                Some(Number::Dec(d)) => Ok(Value::Decimal(-d)),
                Some(Number::Float(f)) => Ok(Value::Float(-f)),
                None => Err(HostError::TypeError(format!(
                    "Cannot negate {}",
                    value.type_name()
                ))),
            },
            UnaryOp::UnaryPlus | UnaryOp::TypeAs => Ok(value),
            UnaryOp::Not => match value {
                Value::Boolean(b) => Ok(Value::Boolean(!b)),
                Value::Integer(n) => Ok(Value::Integer(!n)),
                other => Err(HostError::TypeError(format!(
                    "Cannot apply not to {}",
                    other.type_name()
                ))),
            },
            UnaryOp::OnesComplement => match value {
                Value::Integer(n) => Ok(Value::Integer(!n)),
                other => Err(HostError::TypeError(format!(
                    "Cannot complement {}",
                    other.type_name()
                ))),
            },
            UnaryOp::Convert => Ok(self.convert(value, ty)),
            UnaryOp::ArrayLength => match value {
                Value::Array(items) => Ok(Value::Integer(items.len() as i64)),
                other => Err(HostError::TypeError(format!(
                    "Cannot take the length of {}",
                    other.type_name()
                ))),
            },
            UnaryOp::Quote => Err(HostError::TypeError(
                "A quoted lambda is not a value".to_string(),
            )),
        }
    }

    fn convert(&self, value: Value, ty: &TypeTag) -> Value {
        let Some(number) = Number::of(&value) else {
            return value;
        };
        match ty.underlying() {
            TypeTag::Int32 | TypeTag::Int64 | TypeTag::Enum(_) => match number {
                Number::Int(n) => Value::Integer(n),
                Number::Dec(d) => d.trunc().to_i64().map(Value::Integer).unwrap_or(value),
                Number::Float(f) => Value::Integer(f.trunc() as i64),
            },
            TypeTag::Double => Value::Float(number.to_f64()),
            TypeTag::Decimal => number.to_decimal().map(Value::Decimal).unwrap_or(value),
            _ => value,
        }
    }

    fn apply_binary(&self, op: BinaryOp, left: &Value, right: &Value) -> Result<Value, HostError> {
        match op {
            BinaryOp::Equal => Ok(Value::Boolean(self.values_equal(left, right))),
            BinaryOp::NotEqual => Ok(Value::Boolean(!self.values_equal(left, right))),
            BinaryOp::LessThan
            | BinaryOp::LessThanOrEqual
            | BinaryOp::GreaterThan
            | BinaryOp::GreaterThanOrEqual => {
                let ordering = self.compare_values(left, right)?;
                Ok(Value::Boolean(match op {
                    BinaryOp::LessThan => ordering == Ordering::Less,
                    BinaryOp::LessThanOrEqual => ordering != Ordering::Greater,
                    BinaryOp::GreaterThan => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                }))
            }
            BinaryOp::Add => match (left, right) {
                (Value::String(a), b) => Ok(Value::String(format!("{}{}", a, display(b)))),
                (a, Value::String(b)) => Ok(Value::String(format!("{}{}", display(a), b))),
                _ => self.arithmetic(op, left, right),
            },
            BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => {
                self.arithmetic(op, left, right)
            }
            BinaryOp::Power => match (Number::of(left), Number::of(right)) {
                (Some(a), Some(b)) => Ok(Value::Float(a.to_f64().powf(b.to_f64()))),
                _ => Err(self.operand_error(op, left, right)),
            },
            BinaryOp::And | BinaryOp::Or | BinaryOp::ExclusiveOr => match (left, right) {
                (Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(match op {
                    BinaryOp::And => *a && *b,
                    BinaryOp::Or => *a || *b,
                    _ => a ^ b,
                })),
                (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(match op {
                    BinaryOp::And => a & b,
                    BinaryOp::Or => a | b,
                    _ => a ^ b,
                })),
                _ => Err(self.operand_error(op, left, right)),
            },
            BinaryOp::LeftShift | BinaryOp::RightShift => match (left, right) {
                (Value::Integer(a), Value::Integer(b)) => {
                    let shift = u32::try_from(*b).map_err(|_| self.operand_error(op, left, right))?;
                    Ok(Value::Integer(if op == BinaryOp::LeftShift {
                        a.wrapping_shl(shift)
                    } else {
                        a.wrapping_shr(shift)
                    }))
                }
                _ => Err(self.operand_error(op, left, right)),
            },
            BinaryOp::ArrayIndex => match (left, right.as_int()) {
                (Value::Array(items), Some(i)) => usize::try_from(i)
                    .ok()
                    .and_then(|i| items.get(i))
                    .cloned()
                    .ok_or_else(|| HostError::TypeError(format!("Index {} is out of range", i))),
                _ => Err(self.operand_error(op, left, right)),
            },
            BinaryOp::AndAlso | BinaryOp::OrElse | BinaryOp::Coalesce => Err(HostError::TypeError(
                format!("{} needs its operands unevaluated", op),
            )),
        }
    }

    fn operand_error(&self, op: BinaryOp, left: &Value, right: &Value) -> HostError {
        HostError::TypeError(format!(
            "Cannot apply {} to {} and {}",
            op,
            left.type_name(),
            right.type_name()
        ))
    }

    fn arithmetic(&self, op: BinaryOp, left: &Value, right: &Value) -> Result<Value, HostError> {
        let (Some(a), Some(b)) = (Number::of(left), Number::of(right)) else {
            return Err(self.operand_error(op, left, right));
        };
        let overflow = || HostError::TypeError("Arithmetic overflow".to_string());

        let result = match (a, b) {
            (Number::Float(_), _) | (_, Number::Float(_)) => {
                let (x, y) = (a.to_f64(), b.to_f64());
                Number::Float(match op {
                    BinaryOp::Add => x + y,
                    BinaryOp::Subtract => x - y,
                    BinaryOp::Multiply => x * y,
                    BinaryOp::Divide => x / y,
                    _ => x % y,
                })
            }
            (Number::Int(x), Number::Int(y)) => {
                if matches!(op, BinaryOp::Divide | BinaryOp::Modulo) && y == 0 {
                    return Err(HostError::DivisionByZero);
                }
                Number::Int(
                    match op {
                        BinaryOp::Add => x.checked_add(y),
                        BinaryOp::Subtract => x.checked_sub(y),
                        BinaryOp::Multiply => x.checked_mul(y),
                        BinaryOp::Divide => x.checked_div(y),
                        _ => x.checked_rem(y),
                    }
                    .ok_or_else(overflow)?,
                )
            }
            _ => {
                let (Some(x), Some(y)) = (a.to_decimal(), b.to_decimal()) else {
                    return Err(self.operand_error(op, left, right));
                };
                if matches!(op, BinaryOp::Divide | BinaryOp::Modulo) && y.is_zero() {
                    return Err(HostError::DivisionByZero);
                }
                Number::Dec(
                    match op {
                        BinaryOp::Add => x.checked_add(y),
                        BinaryOp::Subtract => x.checked_sub(y),
                        BinaryOp::Multiply => x.checked_mul(y),
                        BinaryOp::Divide => x.checked_div(y),
                        _ => x.checked_rem(y),
                    }
                    .ok_or_else(overflow)?,
                )
            }
        };
        Ok(result.into_value())
    }

    fn values_equal(&self, left: &Value, right: &Value) -> bool {
        match (Number::of(left), Number::of(right)) {
            (Some(a), Some(b)) => self.compare_numbers(a, b) == Some(Ordering::Equal),
            _ => left == right,
        }
    }

    fn compare_numbers(&self, a: Number, b: Number) -> Option<Ordering> {
        match (a, b) {
            (Number::Int(x), Number::Int(y)) => Some(x.cmp(&y)),
            (Number::Float(_), _) | (_, Number::Float(_)) => a.to_f64().partial_cmp(&b.to_f64()),
            _ => Some(a.to_decimal()?.cmp(&b.to_decimal()?)),
        }
    }

    fn compare_values(&self, left: &Value, right: &Value) -> Result<Ordering, HostError> {
        let ordering = match (left, right) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Char(a), Value::Char(b)) => Some(a.cmp(b)),
            _ => match (Number::of(left), Number::of(right)) {
                (Some(a), Some(b)) => self.compare_numbers(a, b),
                _ => None,
            },
        };
        ordering.ok_or_else(|| {
            HostError::TypeError(format!(
                "Cannot compare {} and {}",
                left.type_name(),
                right.type_name()
            ))
        })
    }

    fn apply_call(
        &self,
        declaring: &DeclaringType,
        method: &str,
        target: Option<Value>,
        args: &[Value],
    ) -> Result<Value, HostError> {
        match declaring {
            DeclaringType::Host(qualified) => {
                let name = format!("{}.{}", qualified, method);
                let mut all_args = Vec::with_capacity(args.len() + 1);
                all_args.extend(target);
                all_args.extend_from_slice(args);
                match self.functions.get(&name) {
                    Some(f) => f(&all_args),
                    None => Err(HostError::UnknownFunction(name)),
                }
            }
            DeclaringType::String => self.string_method(method, target, args),
            DeclaringType::Math => self.math_method(method, args),
            DeclaringType::Object => match (method, target) {
                ("ToString", Some(value)) => Ok(Value::String(display(&value))),
                ("Equals", Some(value)) if args.len() == 1 => {
                    Ok(Value::Boolean(self.values_equal(&value, &args[0])))
                }
                _ => Err(HostError::UnknownFunction(method.to_string())),
            },
            DeclaringType::Enumerable | DeclaringType::List => {
                let (items, rest) = match (target, args) {
                    (Some(Value::Array(items)), rest) => (items, rest),
                    (None, [Value::Array(items), rest @ ..]) => (items.clone(), rest),
                    _ => return Err(HostError::UnknownFunction(method.to_string())),
                };
                match (method, rest) {
                    ("Contains", [needle]) => Ok(Value::Boolean(
                        items.iter().any(|item| self.values_equal(item, needle)),
                    )),
                    ("Count", []) => Ok(Value::Integer(items.len() as i64)),
                    _ => Err(HostError::UnknownFunction(method.to_string())),
                }
            }
            DeclaringType::Queryable
            | DeclaringType::TypeCheck
            | DeclaringType::UserFunction
            | DeclaringType::QueryEscape => Err(HostError::UnknownFunction(format!(
                "{} cannot be evaluated on the client",
                method
            ))),
        }
    }

    fn string_method(
        &self,
        method: &str,
        target: Option<Value>,
        args: &[Value],
    ) -> Result<Value, HostError> {
        let text = |v: &Value| -> Result<String, HostError> {
            match v {
                Value::String(s) => Ok(s.clone()),
                Value::Char(c) => Ok(c.to_string()),
                other => Err(HostError::TypeError(format!(
                    "Expected string, found {}",
                    other.type_name()
                ))),
            }
        };

        if method == "Concat" && target.is_none() {
            return Ok(Value::String(args.iter().map(display).collect()));
        }

        let Some(subject) = target else {
            return Err(HostError::UnknownFunction(format!("string.{}", method)));
        };
        let s = text(&subject)?;
        match (method, args) {
            ("ToUpper", []) => Ok(Value::String(s.to_uppercase())),
            ("ToLower", []) => Ok(Value::String(s.to_lowercase())),
            ("Trim", []) => Ok(Value::String(s.trim().to_string())),
            ("TrimStart", []) => Ok(Value::String(s.trim_start().to_string())),
            ("TrimEnd", []) => Ok(Value::String(s.trim_end().to_string())),
            ("Contains", [needle]) => Ok(Value::Boolean(s.contains(text(needle)?.as_str()))),
            ("StartsWith", [prefix]) => Ok(Value::Boolean(s.starts_with(text(prefix)?.as_str()))),
            ("EndsWith", [suffix]) => Ok(Value::Boolean(s.ends_with(text(suffix)?.as_str()))),
            ("Replace", [from, to]) => Ok(Value::String(
                s.replace(text(from)?.as_str(), text(to)?.as_str()),
            )),
            ("CompareTo", [other]) => Ok(Value::Integer(match s.cmp(&text(other)?) {
                Ordering::Less => -1,
                Ordering::Equal => 0,
                Ordering::Greater => 1,
            })),
            _ => Err(HostError::UnknownFunction(format!("string.{}", method))),
        }
    }

    fn math_method(&self, method: &str, args: &[Value]) -> Result<Value, HostError> {
        let nums: Vec<f64> = args
            .iter()
            .map(|a| {
                a.as_float().ok_or_else(|| {
                    HostError::TypeError(format!("Expected number, found {}", a.type_name()))
                })
            })
            .collect::<Result<_, _>>()?;

        let result = match (method, nums.as_slice()) {
            ("Abs", [x]) => x.abs(),
            ("Ceiling", [x]) => x.ceil(),
            ("Floor", [x]) => x.floor(),
            ("Round", [x]) => x.round(),
            ("Truncate", [x]) => x.trunc(),
            ("Sqrt", [x]) => x.sqrt(),
            ("Exp", [x]) => x.exp(),
            ("Log", [x]) => x.ln(),
            ("Log10", [x]) => x.log10(),
            ("Pow", [x, y]) => x.powf(*y),
            ("Max", [x, y]) => x.max(*y),
            ("Min", [x, y]) => x.min(*y),
            _ => return Err(HostError::UnknownFunction(format!("Math.{}", method))),
        };

        // Integral inputs keep an integral result where the operation allows it.
        let integral = args.iter().all(|a| matches!(a, Value::Integer(_)));
        if integral && result.fract() == 0.0 && method != "Sqrt" && method != "Pow" {
            return Ok(Value::Integer(result as i64));
        }
        Ok(Value::Float(result))
    }
}

/// String form used for concatenation and `ToString`
fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Char(c) => c.to_string(),
        Value::Null => String::new(),
        Value::Boolean(b) => (if *b { "True" } else { "False" }).to_string(),
        Value::Integer(n) => n.to_string(),
        Value::UInteger(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Decimal(d) => d.to_string(),
        Value::Guid(g) => g.to_string(),
        other => other.to_json().to_string(),
    }
}
