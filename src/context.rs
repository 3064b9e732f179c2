//! Per-translation mutable state.
//!
//! A [`TranslationContext`] is created for one top-level translation call and
//! dropped afterwards. It tracks:
//!
//! - names in scope, so fresh identifiers never collide with user parameters
//! - lambda parameter substitutions (each bound variable maps to the row
//!   expression of the collection it ranges over)
//! - the stack of LINQ methods being translated
//! - the stack of collections lambdas are bound against
//! - the client-side operation the caller has to apply, set at most once
//! - query parameters referenced so far
//! - whether a nested query (inside a lambda body) is being translated
//! - the group parameter of a GroupBy result selector

use std::{collections::HashSet, sync::LazyLock};

use regex::Regex;
use tracing::trace;

use crate::{
    ast::Expr,
    config::TranslationOptions,
    error::{Result, TranslationError},
    folding::HostEvaluator,
    linq::ScalarOperationKind,
    naming::NamingResolver,
    query::{QueryStage, ROOT_NAME},
    sql::{SqlParameter, SqlScalar},
    value::Value,
};

static PARAMETER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

/// What a lambda parameter ranges over.
#[derive(Debug, Clone, PartialEq)]
pub enum Collection {
    /// Rows of the query stage with the given input binding
    Outer(String),
    /// Elements of a nested array; binding a parameter adds a JOIN over `path`
    Inner(SqlScalar),
}

pub struct TranslationContext<'a> {
    options: &'a TranslationOptions,
    evaluator: &'a dyn HostEvaluator,
    in_scope: HashSet<String>,
    substitutions: Vec<(String, SqlScalar)>,
    methods: Vec<String>,
    collections: Vec<Collection>,
    client_operation: Option<ScalarOperationKind>,
    parameters: Vec<SqlParameter>,
    subquery_depth: usize,
    group: Option<GroupScope>,
}

/// Group parameter of a GroupBy result selector and the rows it ranges over.
#[derive(Debug, Clone)]
pub struct GroupScope {
    param: String,
    row: SqlScalar,
}

impl<'a> TranslationContext<'a> {
    pub fn new(options: &'a TranslationOptions, evaluator: &'a dyn HostEvaluator) -> Self {
        let mut in_scope = HashSet::new();
        in_scope.insert(ROOT_NAME.to_string());
        TranslationContext {
            options,
            evaluator,
            in_scope,
            substitutions: Vec::new(),
            methods: Vec::new(),
            collections: Vec::new(),
            client_operation: None,
            parameters: Vec::new(),
            subquery_depth: 0,
            group: None,
        }
    }

    pub fn resolver(&self) -> NamingResolver<'a> {
        self.options.resolver()
    }

    pub fn evaluator(&self) -> &'a dyn HostEvaluator {
        self.evaluator
    }

    /// Marks every parameter name of `expr` as taken.
    pub fn declare_names(&mut self, expr: &Expr) {
        match expr {
            Expr::Parameter { name, .. } => {
                self.in_scope.insert(name.clone());
            }
            Expr::Lambda(lambda) => {
                self.in_scope
                    .extend(lambda.params.iter().map(|p| p.name.clone()));
            }
            _ => {}
        }
        for child in expr.children() {
            self.declare_names(child);
        }
    }

    /// Returns `base` followed by the smallest numeric suffix not yet in scope.
    pub fn fresh_name(&mut self, base: &str) -> String {
        let name = (0..)
            .map(|n| format!("{}{}", base, n))
            .find(|candidate| !self.in_scope.contains(candidate))
            .unwrap_or_else(|| base.to_string());
        self.in_scope.insert(name.clone());
        name
    }

    /// Binds a lambda parameter against the current collection.
    ///
    /// Over an outer collection the parameter stands for the stage's row
    /// expression. Over an inner collection a new `name IN path` binding is
    /// added to `stage` and the parameter stands for that binding.
    pub fn bind_parameter(&mut self, name: &str, stage: &mut QueryStage) -> SqlScalar {
        let target = match self.current_collection().cloned() {
            Some(Collection::Inner(path)) => {
                let binding = self.fresh_name(name);
                stage.add_join(binding.clone(), path);
                SqlScalar::PropertyRef(binding)
            }
            Some(Collection::Outer(_)) | None => stage.row_expr(),
        };
        trace!(parameter = name, "bound lambda parameter");
        self.substitutions.push((name.to_string(), target.clone()));
        target
    }

    /// Binds a parameter to an explicit expression.
    pub fn bind_parameter_to(&mut self, name: &str, target: SqlScalar) {
        trace!(parameter = name, "bound parameter to expression");
        self.substitutions.push((name.to_string(), target));
    }

    pub fn unbind_parameter(&mut self) {
        self.substitutions.pop();
    }

    /// Innermost substitution for a parameter name
    pub fn lookup_parameter(&self, name: &str) -> Option<&SqlScalar> {
        self.substitutions
            .iter()
            .rev()
            .find(|(bound, _)| bound == name)
            .map(|(_, target)| target)
    }

    pub fn push_method(&mut self, method: &str) {
        self.methods.push(method.to_string());
    }

    pub fn pop_method(&mut self) {
        self.methods.pop();
    }

    /// Whether the method being translated is the outermost call of the query
    pub fn is_outermost_method(&self) -> bool {
        self.methods.len() == 1
    }

    pub fn push_collection(&mut self, collection: Collection) {
        self.collections.push(collection);
    }

    pub fn pop_collection(&mut self) {
        self.collections.pop();
    }

    pub fn current_collection(&self) -> Option<&Collection> {
        self.collections.last()
    }

    /// Starts a nested query. Returns the enclosing method stack, which
    /// [`exit_subquery`](Self::exit_subquery) restores.
    pub fn enter_subquery(&mut self) -> Vec<String> {
        self.subquery_depth += 1;
        std::mem::take(&mut self.methods)
    }

    pub fn exit_subquery(&mut self, methods: Vec<String>) {
        self.subquery_depth = self.subquery_depth.saturating_sub(1);
        self.methods = methods;
    }

    pub fn in_subquery(&self) -> bool {
        self.subquery_depth > 0
    }

    /// Makes `param` the group of a GroupBy result selector; returns the
    /// enclosing scope for [`exit_group`](Self::exit_group).
    pub fn enter_group(&mut self, param: &str, row: SqlScalar) -> Option<GroupScope> {
        self.group.replace(GroupScope {
            param: param.to_string(),
            row,
        })
    }

    pub fn exit_group(&mut self, enclosing: Option<GroupScope>) {
        self.group = enclosing;
    }

    /// Row expression the group parameter `name` ranges over, if it is one
    pub fn group_row(&self, name: &str) -> Option<&SqlScalar> {
        self.group
            .as_ref()
            .filter(|scope| scope.param == name)
            .map(|scope| &scope.row)
    }

    /// Records the client-side operation; a second, different one is an error.
    ///
    /// Nested queries reduce inside the query text and record nothing.
    pub fn set_client_operation(&mut self, operation: ScalarOperationKind) -> Result<()> {
        if self.in_subquery() {
            return Ok(());
        }
        match self.client_operation {
            Some(existing) if existing != operation => Err(TranslationError::structural(
                "Client operation is already set",
            )),
            _ => {
                self.client_operation = Some(operation);
                Ok(())
            }
        }
    }

    pub fn client_operation(&self) -> ScalarOperationKind {
        self.client_operation.unwrap_or(ScalarOperationKind::None)
    }

    /// Query parameter reference for a constant bound in the options, if any.
    pub fn bind_constant(&mut self, value: &Value) -> Result<Option<String>> {
        let Some(bound) = self.options.parameters.iter().find(|p| &p.value == value) else {
            return Ok(None);
        };

        let name = if bound.name.starts_with('@') {
            bound.name.clone()
        } else {
            format!("@{}", bound.name)
        };
        if !PARAMETER_NAME.is_match(&name) {
            return Err(TranslationError::unsupported(format!(
                "Invalid query parameter name '{}'",
                bound.name
            )));
        }

        if !self.parameters.iter().any(|p| p.name == name) {
            self.parameters.push(SqlParameter {
                name: name.clone(),
                value: value.to_json(),
            });
        }
        Ok(Some(name))
    }

    /// Parameters referenced by the query, in first-use order
    pub fn into_parameters(self) -> Vec<SqlParameter> {
        self.parameters
    }
}
