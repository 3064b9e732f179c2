//! Query stages and flattening.
//!
//! A [`QueryStage`] holds at most one of each clause. When an operator would
//! overwrite a clause that is already set, the translator *packages* the
//! current stage: it becomes the input of a fresh stage whose rows are bound
//! to a single alias. [`QueryStage::flatten`] later folds the chain back into
//! one stage by substituting the alias with the input's row expression.

use tracing::{debug, trace};

use crate::{
    error::{Result, TranslationError},
    sql::{
        CountSpec, SelectSpec, SqlCollection, SqlObjectProperty, SqlOrderByItem, SqlQuery,
        SqlScalar, SqlSelectClause,
    },
};

/// Name the queried container is bound to in the FROM clause
pub const ROOT_NAME: &str = "root";

pub(crate) const AFTER_TAKE: &str = "LINQ operations after a Take() is not supported";
pub(crate) const AFTER_SKIP: &str = "LINQ operations after a Skip() is not supported";

/// Where the rows of a stage without an input come from.
#[derive(Debug, Clone, PartialEq)]
enum StageSource {
    /// The queried container
    Container,
    /// Elements of an array, `name IN path`
    Array(SqlScalar),
    /// Rows of a query that could not be flattened, `(query) AS name`
    Subquery(Box<SqlQuery>),
}

/// One stage of a query under construction.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryStage {
    /// Identifier each input row is bound to
    input_param: String,
    source: StageSource,
    /// Array-iteration bindings, `name IN path`
    joins: Vec<(String, SqlScalar)>,
    select: Option<SqlSelectClause>,
    filter: Option<SqlScalar>,
    group_by: Vec<SqlScalar>,
    order_by: Vec<SqlOrderByItem>,
    top: Option<CountSpec>,
    offset: Option<CountSpec>,
    limit: Option<CountSpec>,
    /// Previous stage, not yet flattened
    input: Option<Box<QueryStage>>,
}

impl QueryStage {
    /// Stage reading the container itself
    pub fn root() -> Self {
        QueryStage::with_source(ROOT_NAME, StageSource::Container)
    }

    /// Stage reading the elements of a nested array, for queries inside lambdas
    pub fn over_array(name: String, path: SqlScalar) -> Self {
        QueryStage::with_source(&name, StageSource::Array(path))
    }

    fn with_source(name: &str, source: StageSource) -> Self {
        QueryStage {
            input_param: name.to_string(),
            source,
            joins: Vec::new(),
            select: None,
            filter: None,
            group_by: Vec::new(),
            order_by: Vec::new(),
            top: None,
            offset: None,
            limit: None,
            input: None,
        }
    }

    pub fn input_param(&self) -> &str {
        &self.input_param
    }

    /// Number of stages in the chain, this one included
    pub fn depth(&self) -> usize {
        1 + self.input.as_ref().map_or(0, |input| input.depth())
    }

    /// Wraps this stage as the input of a new, empty stage bound to `alias`.
    pub fn package(self, alias: String) -> QueryStage {
        debug!(alias = %alias, depth = self.depth(), "packaging query stage");
        let mut stage = QueryStage::with_source(&alias, StageSource::Container);
        stage.input = Some(Box::new(self));
        stage
    }

    /// Whether `method` has to start a new stage on top of this one.
    pub fn should_be_on_new_stage(&self, method: &str, arg_count: usize) -> bool {
        let has_select = self.select.is_some();
        let has_plain_select = self.select.as_ref().is_some_and(|s| !s.distinct);

        match method {
            "Select" | "SelectMany" => has_select,
            "Min" | "Max" | "Sum" | "Average" | "Any" => has_select || self.offset.is_some(),
            "Count" => {
                (arg_count == 2 && has_plain_select) || has_select || self.offset.is_some()
            }
            "Where" | "OrderBy" | "OrderByDescending" | "Distinct" => has_plain_select,
            "GroupBy" => {
                has_select
                    || self.top.is_some()
                    || self.offset.is_some()
                    || self.limit.is_some()
                    || !self.order_by.is_empty()
            }
            _ => false,
        }
    }

    /// Whether any stage in the chain limits its row count
    pub fn has_top(&self) -> bool {
        self.top.is_some()
            || self.limit.is_some()
            || self.input.as_ref().is_some_and(|input| input.has_top())
    }

    /// Whether any stage in the chain skips rows
    pub fn has_offset(&self) -> bool {
        self.offset.is_some() || self.input.as_ref().is_some_and(|input| input.has_offset())
    }

    pub fn has_group_by(&self) -> bool {
        !self.group_by.is_empty()
    }

    /// Expression denoting one row as seen by the next operator on this stage
    pub fn row_expr(&self) -> SqlScalar {
        match self.select.as_ref().and_then(SqlSelectClause::value_expr) {
            Some(value) => value.clone(),
            None => SqlScalar::property(self.last_binding()),
        }
    }

    fn last_binding(&self) -> &str {
        self.joins
            .last()
            .map_or(self.input_param.as_str(), |(name, _)| name.as_str())
    }

    pub fn add_join(&mut self, name: String, path: SqlScalar) {
        trace!(binding = %name, "adding array iteration binding");
        self.joins.push((name, path));
    }

    pub fn add_select(&mut self, select: SqlSelectClause) -> Result<()> {
        if self.select.is_some() {
            return Err(TranslationError::structural(
                "A SELECT clause is already set on this query stage",
            ));
        }
        self.select = Some(select);
        Ok(())
    }

    /// Replaces the projected value, keeping DISTINCT.
    pub fn replace_select_value(&mut self, value: SqlScalar) {
        match &mut self.select {
            Some(select) => select.spec = SelectSpec::Value(value),
            None => self.select = Some(SqlSelectClause::value(value)),
        }
    }

    pub fn set_distinct(&mut self) {
        let row = self.row_expr();
        self.select
            .get_or_insert_with(|| SqlSelectClause::value(row))
            .distinct = true;
    }

    /// Adds a filter, AND-combined after an existing one.
    pub fn add_where(&mut self, filter: SqlScalar) {
        self.filter = Some(match self.filter.take() {
            Some(existing) => SqlScalar::and(existing, filter),
            None => filter,
        });
    }

    pub fn add_group_by(&mut self, key: SqlScalar) -> Result<()> {
        if self.has_group_by() {
            return Err(TranslationError::structural(
                "A GROUP BY clause is already set on this query stage",
            ));
        }
        self.group_by.push(key);
        Ok(())
    }

    /// Starts a new ordering, replacing any previous one on this stage.
    pub fn add_order_by(&mut self, item: SqlOrderByItem) {
        self.order_by = vec![item];
    }

    /// Appends a secondary ordering key.
    pub fn then_by(&mut self, item: SqlOrderByItem) -> Result<()> {
        if self.order_by.is_empty() {
            return Err(TranslationError::structural(
                "ThenBy requires a preceding OrderBy",
            ));
        }
        self.order_by.push(item);
        Ok(())
    }

    /// Limits the row count. Once an OFFSET exists the count becomes a LIMIT.
    pub fn add_top(&mut self, count: CountSpec) -> Result<()> {
        if self.has_offset() {
            return self.add_limit(count);
        }
        self.top = merge_min(self.top.take(), Some(count))?;
        Ok(())
    }

    pub fn add_limit(&mut self, count: CountSpec) -> Result<()> {
        self.limit = merge_min(self.limit.take(), Some(count))?;
        Ok(())
    }

    pub fn add_offset(&mut self, count: CountSpec) -> Result<()> {
        self.offset = merge_sum(self.offset.take(), Some(count))?;
        Ok(())
    }

    /// Collapses the stage chain into a single stage.
    ///
    /// An input that cannot be merged into this stage (a DISTINCT input under
    /// a projection, aggregate or array iteration, or any input under GROUP BY)
    /// stays behind as a subquery in the FROM clause.
    pub fn flatten(mut self) -> Result<QueryStage> {
        let Some(input) = self.input.take() else {
            return Ok(self);
        };
        let input = input.flatten()?;
        trace!(alias = %self.input_param, "flattening stage onto its input");

        if input.select.as_ref().is_some_and(SqlSelectClause::has_aggregate) {
            return Err(TranslationError::unsupported(
                "An aggregate query cannot be composed further",
            ));
        }
        if (input.has_top() || input.offset.is_some())
            && (self.filter.is_some() || !self.order_by.is_empty())
        {
            let message = if input.has_top() { AFTER_TAKE } else { AFTER_SKIP };
            return Err(TranslationError::unsupported(message));
        }
        if input.has_top() && self.offset.is_some() {
            return Err(TranslationError::unsupported(AFTER_TAKE));
        }

        if self.needs_subquery(&input) {
            debug!(alias = %self.input_param, "keeping input stage as a subquery");
            self.source = StageSource::Subquery(Box::new(input.into_query()));
            return Ok(self);
        }
        self.merge(input)
    }

    fn needs_subquery(&self, input: &QueryStage) -> bool {
        if self.has_group_by() {
            return true;
        }
        if !input.select.as_ref().is_some_and(|select| select.distinct) {
            return false;
        }
        let identity = SqlScalar::property(&self.input_param);
        !self.joins.is_empty()
            || self.select.as_ref().is_some_and(|outer| {
                outer.has_aggregate() || outer.value_expr() != Some(&identity)
            })
    }

    /// Substitutes this stage's alias with the input's row expression.
    fn merge(self, input: QueryStage) -> Result<QueryStage> {
        let QueryStage {
            input_param: alias,
            joins,
            select,
            filter,
            order_by,
            top,
            offset,
            limit,
            ..
        } = self;

        let replacement = input.row_expr();
        let subst = |expr: SqlScalar| substitute(expr, &alias, &replacement);

        // Array iteration without a projection yields the last binding.
        let select = match (select, joins.last()) {
            (None, Some((binding, _))) => Some(SqlSelectClause::value(SqlScalar::property(binding))),
            (select, _) => select,
        };
        let outer_select = select.map(|clause| SqlSelectClause {
            spec: match clause.spec {
                SelectSpec::Value(value) => SelectSpec::Value(subst(value)),
                SelectSpec::Star => SelectSpec::Star,
            },
            ..clause
        });

        let select = match (input.select, outer_select) {
            (input_select, None) => input_select,
            (None, Some(outer)) => Some(outer),
            (Some(inner), Some(outer)) => Some(SqlSelectClause {
                distinct: outer.distinct || inner.distinct,
                ..outer
            }),
        };

        let filter = match (input.filter, filter.map(subst)) {
            (Some(inner), Some(outer)) => Some(SqlScalar::and(inner, outer)),
            (inner, outer) => inner.or(outer),
        };

        let order_by = match (input.order_by.is_empty(), order_by.is_empty()) {
            (false, false) => {
                return Err(TranslationError::structural(
                    "Multiple ORDER BY clauses are not supported",
                ));
            }
            (true, _) => order_by
                .into_iter()
                .map(|item| SqlOrderByItem {
                    expr: subst(item.expr),
                    descending: item.descending,
                })
                .collect(),
            (false, true) => input.order_by,
        };

        let mut all_joins = input.joins;
        all_joins.extend(joins.into_iter().map(|(name, path)| (name, subst(path))));

        Ok(QueryStage {
            input_param: input.input_param,
            source: input.source,
            joins: all_joins,
            select,
            filter,
            group_by: input.group_by,
            order_by,
            top: merge_min(input.top, top)?,
            offset: merge_sum(input.offset, offset)?,
            limit: merge_min(input.limit, limit)?,
            input: None,
        })
    }

    /// Flattens the chain and produces the final single-stage query.
    ///
    /// A stage without a projection selects its current row.
    pub fn into_sql_query(self) -> Result<SqlQuery> {
        Ok(self.flatten()?.into_query())
    }

    /// Query for an already flattened stage.
    fn into_query(self) -> SqlQuery {
        let row = self.row_expr();
        let mut select = self.select.unwrap_or_else(|| SqlSelectClause::value(row));
        select.top = self.top;

        let name = self.input_param;
        let mut from = vec![match self.source {
            StageSource::Container => SqlCollection::Root { name },
            StageSource::Array(path) => SqlCollection::ArrayIterator { name, path },
            StageSource::Subquery(query) => SqlCollection::Subquery { name, query },
        }];
        from.extend(
            self.joins
                .into_iter()
                .map(|(name, path)| SqlCollection::ArrayIterator { name, path }),
        );

        SqlQuery {
            select,
            from,
            filter: self.filter,
            group_by: self.group_by,
            order_by: self.order_by,
            offset: self.offset,
            limit: self.limit,
        }
    }
}

fn merge_min(left: Option<CountSpec>, right: Option<CountSpec>) -> Result<Option<CountSpec>> {
    match (left, right) {
        (Some(CountSpec::Literal(a)), Some(CountSpec::Literal(b))) => {
            Ok(Some(CountSpec::Literal(a.min(b))))
        }
        (Some(_), Some(_)) => Err(TranslationError::unsupported(
            "Cannot combine row limits when one of them is a query parameter",
        )),
        (left, right) => Ok(left.or(right)),
    }
}

fn merge_sum(left: Option<CountSpec>, right: Option<CountSpec>) -> Result<Option<CountSpec>> {
    match (left, right) {
        (Some(CountSpec::Literal(a)), Some(CountSpec::Literal(b))) => {
            Ok(Some(CountSpec::Literal(a.saturating_add(b))))
        }
        (Some(_), Some(_)) => Err(TranslationError::unsupported(
            "Cannot combine offsets when one of them is a query parameter",
        )),
        (left, right) => Ok(left.or(right)),
    }
}

/// Replaces every reference to `name` with `replacement`.
pub fn substitute(expr: SqlScalar, name: &str, replacement: &SqlScalar) -> SqlScalar {
    let rec = |e: Box<SqlScalar>| Box::new(substitute(*e, name, replacement));
    let all = |items: Vec<SqlScalar>| -> Vec<SqlScalar> {
        items
            .into_iter()
            .map(|item| substitute(item, name, replacement))
            .collect()
    };

    match expr {
        SqlScalar::PropertyRef(ref id) if id == name => replacement.clone(),
        leaf @ (SqlScalar::PropertyRef(_) | SqlScalar::Literal(_) | SqlScalar::Parameter(_)) => {
            leaf
        }
        SqlScalar::MemberIndexer { member, index } => SqlScalar::MemberIndexer {
            member: rec(member),
            index: rec(index),
        },
        SqlScalar::Binary { op, left, right } => SqlScalar::Binary {
            op,
            left: rec(left),
            right: rec(right),
        },
        SqlScalar::Unary { op, operand } => SqlScalar::Unary {
            op,
            operand: rec(operand),
        },
        SqlScalar::FunctionCall { name: func, args, udf } => SqlScalar::FunctionCall {
            name: func,
            args: all(args),
            udf,
        },
        SqlScalar::ArrayCreate(items) => SqlScalar::ArrayCreate(all(items)),
        SqlScalar::ObjectCreate(properties) => SqlScalar::ObjectCreate(
            properties
                .into_iter()
                .map(|p| SqlObjectProperty {
                    name: p.name,
                    value: substitute(p.value, name, replacement),
                })
                .collect(),
        ),
        SqlScalar::Conditional {
            condition,
            consequent,
            alternative,
        } => SqlScalar::Conditional {
            condition: rec(condition),
            consequent: rec(consequent),
            alternative: rec(alternative),
        },
        SqlScalar::In {
            needle,
            haystack,
            not,
        } => SqlScalar::In {
            needle: rec(needle),
            haystack: all(haystack),
            not,
        },
        SqlScalar::Exists(query) => SqlScalar::Exists(Box::new(substitute_query(*query, name, replacement))),
        SqlScalar::Array(query) => SqlScalar::Array(Box::new(substitute_query(*query, name, replacement))),
        SqlScalar::Subquery(query) => {
            SqlScalar::Subquery(Box::new(substitute_query(*query, name, replacement)))
        }
    }
}

/// [`substitute`] over every expression of a nested query.
fn substitute_query(query: SqlQuery, name: &str, replacement: &SqlScalar) -> SqlQuery {
    let subst = |expr: SqlScalar| substitute(expr, name, replacement);

    let from = query
        .from
        .into_iter()
        .map(|collection| match collection {
            SqlCollection::ArrayIterator { name: binding, path } => SqlCollection::ArrayIterator {
                name: binding,
                path: subst(path),
            },
            SqlCollection::Subquery { name: binding, query } => SqlCollection::Subquery {
                name: binding,
                query: Box::new(substitute_query(*query, name, replacement)),
            },
            root @ SqlCollection::Root { .. } => root,
        })
        .collect();

    SqlQuery {
        select: SqlSelectClause {
            spec: match query.select.spec {
                SelectSpec::Value(value) => SelectSpec::Value(subst(value)),
                SelectSpec::Star => SelectSpec::Star,
            },
            ..query.select
        },
        from,
        filter: query.filter.map(subst),
        group_by: query.group_by.into_iter().map(subst).collect(),
        order_by: query
            .order_by
            .into_iter()
            .map(|item| SqlOrderByItem {
                expr: subst(item.expr),
                descending: item.descending,
            })
            .collect(),
        offset: query.offset,
        limit: query.limit,
    }
}
