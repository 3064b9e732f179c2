use crate::ast::{DeclaringType, Expr, Lambda, MethodRef, TypeTag};

/// Fluent query-builder surface producing expression trees.
///
/// Each operator wraps the expression built so far as the first argument of a
/// `Queryable` method call, with lambdas passed quoted, exactly as a host
/// compiler would.
///
/// # Examples
///
/// ```
/// use docql::ast::{BinaryOp, Expr, Lambda, Queryable, TypeTag};
///
/// let row = TypeTag::model("Row");
/// let r = Expr::parameter("r", row.clone());
/// let price = Expr::member(r, "price", TypeTag::Int32);
///
/// let query = Queryable::root(row.clone())
///     .where_(Lambda::unary(
///         "r",
///         row,
///         Expr::compare(BinaryOp::GreaterThan, price, Expr::int(100)),
///     ))
///     .into_expr();
/// # let _ = query;
/// ```
#[derive(Debug, Clone)]
pub struct Queryable {
    expr: Expr,
    element: TypeTag,
}

impl Queryable {
    /// Query over every document of the given type
    pub fn root(element: TypeTag) -> Self {
        Queryable {
            expr: Expr::null(TypeTag::query(element.clone())),
            element,
        }
    }

    /// Continues composing on top of an existing query expression
    pub fn from_expr(expr: Expr) -> Self {
        let element = expr.ty().element_type().cloned().unwrap_or(TypeTag::Object);
        Queryable { expr, element }
    }

    /// Raw query text in place of composed operators.
    ///
    /// `raw` is a string constant, a query-spec constant, or any expression
    /// the host evaluator reduces to one of those.
    pub fn from_sql(self, raw: Expr) -> Self {
        let element = self.element.clone();
        let ty = TypeTag::query(element.clone());
        Queryable {
            expr: Expr::static_call(
                MethodRef::new(DeclaringType::QueryEscape, "FromSql"),
                vec![self.expr, raw],
                ty,
            ),
            element,
        }
    }

    pub fn element_type(&self) -> &TypeTag {
        &self.element
    }

    pub fn into_expr(self) -> Expr {
        self.expr
    }

    fn compose(self, method: &str, mut extra: Vec<Expr>, element: TypeTag) -> Self {
        let mut args = vec![self.expr];
        args.append(&mut extra);
        Queryable {
            expr: Expr::static_call(
                MethodRef::queryable(method),
                args,
                TypeTag::query(element.clone()),
            ),
            element,
        }
    }

    fn scalar(self, method: &str, extra: Vec<Expr>, ty: TypeTag) -> Expr {
        let mut args = vec![self.expr];
        args.extend(extra);
        Expr::static_call(MethodRef::queryable(method), args, ty)
    }

    pub fn where_(self, predicate: Lambda) -> Self {
        let element = self.element.clone();
        self.compose("Where", vec![Expr::quote(predicate)], element)
    }

    pub fn select(self, selector: Lambda) -> Self {
        let element = selector.body.ty().clone();
        self.compose("Select", vec![Expr::quote(selector)], element)
    }

    pub fn select_many(self, selector: Lambda) -> Self {
        let element = selector
            .body
            .ty()
            .element_type()
            .cloned()
            .unwrap_or(TypeTag::Object);
        self.compose("SelectMany", vec![Expr::quote(selector)], element)
    }

    /// `GroupBy(key, (key, group) => result)`; yields one result per key.
    pub fn group_by(self, key: Lambda, result: Lambda) -> Self {
        let element = result.body.ty().clone();
        self.compose(
            "GroupBy",
            vec![Expr::quote(key), Expr::quote(result)],
            element,
        )
    }

    pub fn order_by(self, key: Lambda) -> Self {
        let element = self.element.clone();
        self.compose("OrderBy", vec![Expr::quote(key)], element)
    }

    pub fn order_by_descending(self, key: Lambda) -> Self {
        let element = self.element.clone();
        self.compose("OrderByDescending", vec![Expr::quote(key)], element)
    }

    pub fn then_by(self, key: Lambda) -> Self {
        let element = self.element.clone();
        self.compose("ThenBy", vec![Expr::quote(key)], element)
    }

    pub fn then_by_descending(self, key: Lambda) -> Self {
        let element = self.element.clone();
        self.compose("ThenByDescending", vec![Expr::quote(key)], element)
    }

    pub fn take(self, count: i64) -> Self {
        self.take_expr(Expr::int(count))
    }

    /// `Take` with an arbitrary count expression (captured variable, parameter)
    pub fn take_expr(self, count: Expr) -> Self {
        let element = self.element.clone();
        self.compose("Take", vec![count], element)
    }

    pub fn skip(self, count: i64) -> Self {
        self.skip_expr(Expr::int(count))
    }

    pub fn skip_expr(self, count: Expr) -> Self {
        let element = self.element.clone();
        self.compose("Skip", vec![count], element)
    }

    pub fn distinct(self) -> Self {
        let element = self.element.clone();
        self.compose("Distinct", Vec::new(), element)
    }

    pub fn count(self) -> Expr {
        self.scalar("Count", Vec::new(), TypeTag::Int32)
    }

    pub fn count_where(self, predicate: Lambda) -> Expr {
        self.scalar("Count", vec![Expr::quote(predicate)], TypeTag::Int32)
    }

    pub fn sum(self, selector: Lambda) -> Expr {
        let ty = selector.body.ty().clone();
        self.scalar("Sum", vec![Expr::quote(selector)], ty)
    }

    pub fn min(self, selector: Lambda) -> Expr {
        let ty = selector.body.ty().clone();
        self.scalar("Min", vec![Expr::quote(selector)], ty)
    }

    pub fn max(self, selector: Lambda) -> Expr {
        let ty = selector.body.ty().clone();
        self.scalar("Max", vec![Expr::quote(selector)], ty)
    }

    pub fn average(self, selector: Lambda) -> Expr {
        self.scalar("Average", vec![Expr::quote(selector)], TypeTag::Double)
    }

    /// Aggregate without selector, over the elements themselves
    pub fn aggregate(self, method: &str) -> Expr {
        let ty = self.element.clone();
        self.scalar(method, Vec::new(), ty)
    }

    pub fn any(self) -> Expr {
        self.scalar("Any", Vec::new(), TypeTag::Boolean)
    }

    pub fn any_where(self, predicate: Lambda) -> Expr {
        self.scalar("Any", vec![Expr::quote(predicate)], TypeTag::Boolean)
    }

    pub fn first_or_default(self) -> Expr {
        let ty = self.element.clone();
        self.scalar("FirstOrDefault", Vec::new(), ty)
    }
}
