use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ast::{BinaryOp, TypeTag, UnaryOp};
use crate::value::Value;

static LAMBDA_TYPE: TypeTag = TypeTag::Lambda;

/// A field or property of a host type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    /// Type that declares the member
    pub owner: TypeTag,
    /// Host-side member name, before any naming policy
    pub name: String,
}

impl Member {
    pub fn new(owner: TypeTag, name: &str) -> Self {
        Member {
            owner,
            name: name.to_string(),
        }
    }
}

/// Where a called method is declared.
///
/// Translation rules are keyed on this tag rather than on reflection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclaringType {
    /// Query-composition algebra over a document query (`Where`, `Select`, ...)
    Queryable,
    /// The same algebra over in-memory sequences and nested arrays
    Enumerable,
    /// Instance methods of lists (`list.Contains(x)`)
    List,
    String,
    Math,
    /// Type-check helpers (`IsDefined`, `IsNull`, `IsPrimitive`)
    TypeCheck,
    /// User-defined function invocation marker
    UserFunction,
    /// Raw query-text escape hatch
    QueryEscape,
    /// Methods every object has (`Equals`, `ToString`)
    Object,
    /// Any other host function, identified by a qualified name
    Host(String),
}

impl DeclaringType {
    /// Calls the translator must see rather than have folded away.
    pub fn is_query_surface(&self) -> bool {
        matches!(
            self,
            DeclaringType::Queryable
                | DeclaringType::UserFunction
                | DeclaringType::QueryEscape
                | DeclaringType::TypeCheck
        )
    }
}

/// A reference to a called method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodRef {
    pub declaring: DeclaringType,
    pub name: String,
}

impl MethodRef {
    pub fn new(declaring: DeclaringType, name: &str) -> Self {
        MethodRef {
            declaring,
            name: name.to_string(),
        }
    }

    pub fn queryable(name: &str) -> Self {
        Self::new(DeclaringType::Queryable, name)
    }

    pub fn enumerable(name: &str) -> Self {
        Self::new(DeclaringType::Enumerable, name)
    }

    pub fn string(name: &str) -> Self {
        Self::new(DeclaringType::String, name)
    }

    pub fn math(name: &str) -> Self {
        Self::new(DeclaringType::Math, name)
    }

    pub fn host(qualified: &str, name: &str) -> Self {
        Self::new(DeclaringType::Host(qualified.to_string()), name)
    }

    pub fn is_linq(&self) -> bool {
        matches!(
            self.declaring,
            DeclaringType::Queryable | DeclaringType::Enumerable
        )
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.declaring {
            DeclaringType::Host(qualified) => write!(f, "{}.{}", qualified, self.name),
            _ => write!(f, "{}", self.name),
        }
    }
}

/// A lambda parameter declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDecl {
    pub name: String,
    pub ty: TypeTag,
}

/// A lambda: parameters plus a body expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lambda {
    pub params: Vec<ParameterDecl>,
    pub body: Box<Expr>,
}

impl Lambda {
    pub fn new(params: Vec<ParameterDecl>, body: Expr) -> Self {
        Lambda {
            params,
            body: Box::new(body),
        }
    }

    /// Single-parameter lambda, the shape every query operator takes
    pub fn unary(name: &str, ty: TypeTag, body: Expr) -> Self {
        Lambda::new(
            vec![ParameterDecl {
                name: name.to_string(),
                ty,
            }],
            body,
        )
    }
}

/// One binding of an object initializer (`new T { A = x }`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "binding", rename_all = "snake_case")]
pub enum MemberBinding {
    /// `A = x`
    Assignment { member: Member, value: Expr },
    /// `A = { B = x }`, nested initialization of an existing member
    MemberMember {
        member: Member,
        bindings: Vec<MemberBinding>,
    },
    /// `A = { x, y }`, collection initialization of an existing member
    List {
        member: Member,
        initializers: Vec<Expr>,
    },
}

/// Node-kind tag of an [`Expr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprKind {
    Constant,
    Parameter,
    MemberAccess,
    Binary(BinaryOp),
    Unary(UnaryOp),
    Conditional,
    Call,
    New,
    MemberInit,
    ListInit,
    NewArray,
    Lambda,
    Invoke,
}

impl fmt::Display for ExprKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprKind::Binary(op) => write!(f, "{}", op),
            ExprKind::Unary(op) => write!(f, "{}", op),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Host expression tree.
///
/// Produced by a fluent query-builder surface (see
/// [`Queryable`](crate::ast::Queryable)) and consumed read-only by the
/// translator. The tree is strictly nested: no node is shared or revisited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    /// Literal or captured value
    ///
    /// # Example
    /// ```text
    /// 100
    /// ```
    Constant { value: Value, ty: TypeTag },

    /// Reference to a lambda parameter
    Parameter { name: String, ty: TypeTag },

    /// Field or property access; `object` is `None` for static members
    ///
    /// # Example
    /// ```text
    /// r.price
    /// ```
    Member {
        object: Option<Box<Expr>>,
        member: Member,
        ty: TypeTag,
    },

    /// Binary operation (arithmetic, comparison, logical, indexing)
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        ty: TypeTag,
    },

    /// Unary operation, including conversions and quotes
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        ty: TypeTag,
    },

    /// `test ? if_true : if_false`
    Conditional {
        test: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
        ty: TypeTag,
    },

    /// Method call; `target` is `None` for static and extension methods
    ///
    /// # Examples
    /// ```text
    /// rows.Where(r => r.price > 100)
    /// r.title.CompareTo("Z")
    /// ```
    Call {
        target: Option<Box<Expr>>,
        method: MethodRef,
        args: Vec<Expr>,
        ty: TypeTag,
    },

    /// Constructor call; `members` lists the member each argument initializes
    /// (anonymous and record types)
    New {
        args: Vec<Expr>,
        members: Option<Vec<Member>>,
        ty: TypeTag,
    },

    /// Object initializer over a constructor call
    MemberInit {
        new: Box<Expr>,
        bindings: Vec<MemberBinding>,
        ty: TypeTag,
    },

    /// Collection initializer over a constructor call
    ListInit {
        new: Box<Expr>,
        initializers: Vec<Expr>,
        ty: TypeTag,
    },

    /// Array literal
    NewArray { elements: Vec<Expr>, ty: TypeTag },

    Lambda(Lambda),

    /// Invocation of a delegate-valued expression
    Invoke {
        target: Box<Expr>,
        args: Vec<Expr>,
        ty: TypeTag,
    },
}

impl Expr {
    pub fn kind(&self) -> ExprKind {
        match self {
            Expr::Constant { .. } => ExprKind::Constant,
            Expr::Parameter { .. } => ExprKind::Parameter,
            Expr::Member { .. } => ExprKind::MemberAccess,
            Expr::Binary { op, .. } => ExprKind::Binary(*op),
            Expr::Unary { op, .. } => ExprKind::Unary(*op),
            Expr::Conditional { .. } => ExprKind::Conditional,
            Expr::Call { .. } => ExprKind::Call,
            Expr::New { .. } => ExprKind::New,
            Expr::MemberInit { .. } => ExprKind::MemberInit,
            Expr::ListInit { .. } => ExprKind::ListInit,
            Expr::NewArray { .. } => ExprKind::NewArray,
            Expr::Lambda(_) => ExprKind::Lambda,
            Expr::Invoke { .. } => ExprKind::Invoke,
        }
    }

    /// Static type of the node
    pub fn ty(&self) -> &TypeTag {
        match self {
            Expr::Constant { ty, .. }
            | Expr::Parameter { ty, .. }
            | Expr::Member { ty, .. }
            | Expr::Binary { ty, .. }
            | Expr::Unary { ty, .. }
            | Expr::Conditional { ty, .. }
            | Expr::Call { ty, .. }
            | Expr::New { ty, .. }
            | Expr::MemberInit { ty, .. }
            | Expr::ListInit { ty, .. }
            | Expr::NewArray { ty, .. }
            | Expr::Invoke { ty, .. } => ty,
            Expr::Lambda(_) => &LAMBDA_TYPE,
        }
    }

    /// Direct sub-expressions, in evaluation order
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Constant { .. } | Expr::Parameter { .. } => Vec::new(),
            Expr::Member { object, .. } => object.iter().map(|o| o.as_ref()).collect(),
            Expr::Binary { left, right, .. } => vec![left, right],
            Expr::Unary { operand, .. } => vec![operand],
            Expr::Conditional {
                test,
                if_true,
                if_false,
                ..
            } => vec![test, if_true, if_false],
            Expr::Call { target, args, .. } => {
                target.iter().map(|t| t.as_ref()).chain(args.iter()).collect()
            }
            Expr::New { args, .. } => args.iter().collect(),
            Expr::MemberInit { new, bindings, .. } => {
                let mut children: Vec<&Expr> = vec![new];
                collect_binding_children(bindings, &mut children);
                children
            }
            Expr::ListInit {
                new, initializers, ..
            } => std::iter::once(new.as_ref()).chain(initializers.iter()).collect(),
            Expr::NewArray { elements, .. } => elements.iter().collect(),
            Expr::Lambda(lambda) => vec![&lambda.body],
            Expr::Invoke { target, args, .. } => {
                std::iter::once(target.as_ref()).chain(args.iter()).collect()
            }
        }
    }

    /// Rebuilds the node with every direct sub-expression passed through `f`.
    pub fn map_children<E>(self, f: &mut impl FnMut(Expr) -> Result<Expr, E>) -> Result<Expr, E> {
        Ok(match self {
            leaf @ (Expr::Constant { .. } | Expr::Parameter { .. }) => leaf,
            Expr::Member { object, member, ty } => Expr::Member {
                object: match object {
                    Some(o) => Some(boxed(o, &mut *f)?),
                    None => None,
                },
                member,
                ty,
            },
            Expr::Binary {
                op,
                left,
                right,
                ty,
            } => Expr::Binary {
                op,
                left: boxed(left, &mut *f)?,
                right: boxed(right, &mut *f)?,
                ty,
            },
            Expr::Unary { op, operand, ty } => Expr::Unary {
                op,
                operand: boxed(operand, &mut *f)?,
                ty,
            },
            Expr::Conditional {
                test,
                if_true,
                if_false,
                ty,
            } => Expr::Conditional {
                test: boxed(test, &mut *f)?,
                if_true: boxed(if_true, &mut *f)?,
                if_false: boxed(if_false, &mut *f)?,
                ty,
            },
            Expr::Call {
                target,
                method,
                args,
                ty,
            } => Expr::Call {
                target: match target {
                    Some(t) => Some(boxed(t, &mut *f)?),
                    None => None,
                },
                method,
                args: args.into_iter().map(&mut *f).collect::<Result<_, _>>()?,
                ty,
            },
            Expr::New { args, members, ty } => Expr::New {
                args: args.into_iter().map(&mut *f).collect::<Result<_, _>>()?,
                members,
                ty,
            },
            Expr::MemberInit { new, bindings, ty } => Expr::MemberInit {
                new: boxed(new, &mut *f)?,
                bindings: map_bindings(bindings, &mut *f)?,
                ty,
            },
            Expr::ListInit {
                new,
                initializers,
                ty,
            } => Expr::ListInit {
                new: boxed(new, &mut *f)?,
                initializers: initializers
                    .into_iter()
                    .map(&mut *f)
                    .collect::<Result<_, _>>()?,
                ty,
            },
            Expr::NewArray { elements, ty } => Expr::NewArray {
                elements: elements.into_iter().map(&mut *f).collect::<Result<_, _>>()?,
                ty,
            },
            Expr::Lambda(Lambda { params, body }) => Expr::Lambda(Lambda {
                params,
                body: boxed(body, &mut *f)?,
            }),
            Expr::Invoke { target, args, ty } => Expr::Invoke {
                target: boxed(target, &mut *f)?,
                args: args.into_iter().map(&mut *f).collect::<Result<_, _>>()?,
                ty,
            },
        })
    }

    // Constructors used by query-builder surfaces and tests

    pub fn constant(value: impl Into<Value>, ty: TypeTag) -> Expr {
        Expr::Constant {
            value: value.into(),
            ty,
        }
    }

    pub fn null(ty: TypeTag) -> Expr {
        Expr::Constant {
            value: Value::Null,
            ty,
        }
    }

    pub fn int(n: i64) -> Expr {
        Expr::constant(n, TypeTag::Int32)
    }

    pub fn string(s: &str) -> Expr {
        Expr::constant(s, TypeTag::String)
    }

    pub fn boolean(b: bool) -> Expr {
        Expr::constant(b, TypeTag::Boolean)
    }

    pub fn parameter(name: &str, ty: TypeTag) -> Expr {
        Expr::Parameter {
            name: name.to_string(),
            ty,
        }
    }

    /// Instance member access, `object.name`
    pub fn member(object: Expr, name: &str, ty: TypeTag) -> Expr {
        let owner = object.ty().clone();
        Expr::Member {
            object: Some(Box::new(object)),
            member: Member::new(owner, name),
            ty,
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr, ty: TypeTag) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            ty,
        }
    }

    /// Comparison producing a boolean
    pub fn compare(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::binary(op, left, right, TypeTag::Boolean)
    }

    pub fn unary(op: UnaryOp, operand: Expr, ty: TypeTag) -> Expr {
        Expr::Unary {
            op,
            operand: Box::new(operand),
            ty,
        }
    }

    pub fn not(operand: Expr) -> Expr {
        Expr::unary(UnaryOp::Not, operand, TypeTag::Boolean)
    }

    pub fn convert(operand: Expr, ty: TypeTag) -> Expr {
        Expr::unary(UnaryOp::Convert, operand, ty)
    }

    pub fn conditional(test: Expr, if_true: Expr, if_false: Expr) -> Expr {
        let ty = if_true.ty().clone();
        Expr::Conditional {
            test: Box::new(test),
            if_true: Box::new(if_true),
            if_false: Box::new(if_false),
            ty,
        }
    }

    /// Instance method call, `target.method(args)`
    pub fn method_call(target: Expr, method: MethodRef, args: Vec<Expr>, ty: TypeTag) -> Expr {
        Expr::Call {
            target: Some(Box::new(target)),
            method,
            args,
            ty,
        }
    }

    /// Static or extension method call, `method(args)`
    pub fn static_call(method: MethodRef, args: Vec<Expr>, ty: TypeTag) -> Expr {
        Expr::Call {
            target: None,
            method,
            args,
            ty,
        }
    }

    pub fn lambda(lambda: Lambda) -> Expr {
        Expr::Lambda(lambda)
    }

    /// Quoted lambda, the form query operators receive their lambdas in
    pub fn quote(lambda: Lambda) -> Expr {
        Expr::unary(UnaryOp::Quote, Expr::Lambda(lambda), TypeTag::Lambda)
    }

    pub fn new_array(elements: Vec<Expr>, element_ty: TypeTag) -> Expr {
        Expr::NewArray {
            elements,
            ty: TypeTag::array(element_ty),
        }
    }

    /// Anonymous-type construction, `new { a = x, b = y }`
    pub fn new_anonymous(fields: Vec<(&str, Expr)>) -> Expr {
        let (members, args) = fields
            .into_iter()
            .map(|(name, value)| (Member::new(TypeTag::Anonymous, name), value))
            .unzip();
        Expr::New {
            args,
            members: Some(members),
            ty: TypeTag::Anonymous,
        }
    }

    /// Strips quotes and returns the lambda, if this expression is one
    pub fn as_lambda(&self) -> Option<&Lambda> {
        match self {
            Expr::Lambda(lambda) => Some(lambda),
            Expr::Unary {
                op: UnaryOp::Quote,
                operand,
                ..
            } => operand.as_lambda(),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<&Value> {
        match self {
            Expr::Constant { value, .. } => Some(value),
            _ => None,
        }
    }
}

fn boxed<E>(
    expr: Box<Expr>,
    f: &mut impl FnMut(Expr) -> Result<Expr, E>,
) -> Result<Box<Expr>, E> {
    f(*expr).map(Box::new)
}

fn collect_binding_children<'a>(bindings: &'a [MemberBinding], out: &mut Vec<&'a Expr>) {
    for binding in bindings {
        match binding {
            MemberBinding::Assignment { value, .. } => out.push(value),
            MemberBinding::MemberMember { bindings, .. } => collect_binding_children(bindings, out),
            MemberBinding::List { initializers, .. } => out.extend(initializers.iter()),
        }
    }
}

fn map_bindings<E>(
    bindings: Vec<MemberBinding>,
    f: &mut impl FnMut(Expr) -> Result<Expr, E>,
) -> Result<Vec<MemberBinding>, E> {
    bindings
        .into_iter()
        .map(|binding| {
            Ok(match binding {
                MemberBinding::Assignment { member, value } => MemberBinding::Assignment {
                    member,
                    value: f(value)?,
                },
                MemberBinding::MemberMember { member, bindings } => MemberBinding::MemberMember {
                    member,
                    bindings: map_bindings(bindings, &mut *f)?,
                },
                MemberBinding::List {
                    member,
                    initializers,
                } => MemberBinding::List {
                    member,
                    initializers: initializers
                        .into_iter()
                        .map(&mut *f)
                        .collect::<Result<_, _>>()?,
                },
            })
        })
        .collect()
}
