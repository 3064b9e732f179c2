//! Constant folding.
//!
//! Folding replaces every maximal sub-expression that does not depend on a
//! lambda parameter with a single [`Expr::Constant`] holding its value. It runs
//! in two passes:
//!
//! 1. **nominate**: a post-order walk marks every node whose whole subtree can
//!    be evaluated on its own;
//! 2. **evaluate**: a top-down walk replaces the first nominated node on each
//!    path with its value and does not descend further.
//!
//! Evaluation itself is delegated to a [`HostEvaluator`], so the folding pass
//! never executes host code directly. Evaluation failures propagate.

use tracing::trace;

use crate::{
    ast::{Expr, TypeTag, UnaryOp},
    error::HostError,
    value::Value,
};

/// Evaluates a closed sub-expression to a host value.
///
/// Implemented by the embedding layer. The expression handed over never
/// references a lambda parameter.
pub trait HostEvaluator {
    fn evaluate(&self, expr: &Expr) -> Result<Value, HostError>;
}

/// Folds every parameter-independent subtree of `expr` into a constant.
///
/// # Examples
///
/// ```
/// use docql::ast::{BinaryOp, Expr, TypeTag};
/// use docql::evaluator::Interpreter;
/// use docql::folding::fold;
///
/// let sum = Expr::binary(BinaryOp::Add, Expr::int(40), Expr::int(2), TypeTag::Int32);
/// let folded = fold(sum, &Interpreter::new()).unwrap();
/// assert_eq!(folded, Expr::int(42));
/// ```
pub fn fold(expr: Expr, evaluator: &dyn HostEvaluator) -> Result<Expr, HostError> {
    let nomination = nominate(&expr);
    trace!(candidates = nomination.count(), "nominated foldable subtrees");
    evaluate(expr, &nomination, evaluator)
}

/// Candidate marks, shaped like the expression tree they were computed for.
///
/// Children appear in [`Expr::children`] order, which is also the order
/// [`Expr::map_children`] visits them in.
#[derive(Debug)]
struct Nomination {
    candidate: bool,
    children: Vec<Nomination>,
}

impl Nomination {
    fn count(&self) -> usize {
        usize::from(self.candidate) + self.children.iter().map(Nomination::count).sum::<usize>()
    }
}

/// Post-order pass.
fn nominate(expr: &Expr) -> Nomination {
    let children: Vec<Nomination> = expr.children().into_iter().map(nominate).collect();

    // A node qualifies only if no strict descendant failed.
    let subtree_foldable = children.iter().all(|child| child.candidate);
    Nomination {
        candidate: subtree_foldable && can_evaluate_locally(expr),
        children,
    }
}

fn can_evaluate_locally(expr: &Expr) -> bool {
    match expr {
        Expr::Parameter { .. } | Expr::Lambda(_) => false,
        Expr::Unary {
            op: UnaryOp::Quote, ..
        } => false,
        Expr::Call { method, .. } if method.declaring.is_query_surface() => false,
        // Object initializers keep their bindings live for the translator.
        Expr::MemberInit { .. } => false,
        Expr::Constant { .. } => true,
        other => !is_query_reference(other.ty()),
    }
}

/// Query roots and composed queries are opaque references, never values.
fn is_query_reference(ty: &TypeTag) -> bool {
    ty.is_document_query()
}

/// Top-down pass replacing nominated subtrees.
fn evaluate(
    expr: Expr,
    nomination: &Nomination,
    evaluator: &dyn HostEvaluator,
) -> Result<Expr, HostError> {
    if let Expr::Constant { .. } = expr {
        return Ok(expr);
    }

    if nomination.candidate {
        let value = evaluator.evaluate(&expr)?;
        trace!(kind = %expr.kind(), "folded subtree");
        return Ok(Expr::Constant {
            value,
            ty: expr.ty().clone(),
        });
    }

    let mut children = nomination.children.iter();
    expr.map_children(&mut |child| match children.next() {
        Some(nomination) => evaluate(child, nomination, evaluator),
        None => Ok(child),
    })
}
