use crate::sql::SqlScalar;

/// Count of a TOP, OFFSET or LIMIT spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountSpec {
    Literal(i64),
    /// Query parameter, name includes the leading `@`
    Parameter(String),
}

/// What a SELECT produces.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectSpec {
    /// `*`
    Star,
    /// `VALUE expr`
    Value(SqlScalar),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlSelectClause {
    pub spec: SelectSpec,
    pub distinct: bool,
    pub top: Option<CountSpec>,
}

impl SqlSelectClause {
    pub fn value(expr: SqlScalar) -> Self {
        SqlSelectClause {
            spec: SelectSpec::Value(expr),
            distinct: false,
            top: None,
        }
    }

    pub fn value_expr(&self) -> Option<&SqlScalar> {
        match &self.spec {
            SelectSpec::Value(expr) => Some(expr),
            SelectSpec::Star => None,
        }
    }

    pub fn has_aggregate(&self) -> bool {
        self.value_expr().is_some_and(SqlScalar::is_aggregate)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlOrderByItem {
    pub expr: SqlScalar,
    pub descending: bool,
}

/// One entry of a FROM clause.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlCollection {
    /// The queried container itself, `root`
    Root { name: String },
    /// Array iteration, `name IN path`
    ArrayIterator { name: String, path: SqlScalar },
    /// Rows of a nested query, `(query) AS name`
    Subquery { name: String, query: Box<SqlQuery> },
}

/// A complete single-stage query.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub select: SqlSelectClause,
    /// Bindings joined with `JOIN` after the first
    pub from: Vec<SqlCollection>,
    pub filter: Option<SqlScalar>,
    pub group_by: Vec<SqlScalar>,
    pub order_by: Vec<SqlOrderByItem>,
    pub offset: Option<CountSpec>,
    pub limit: Option<CountSpec>,
}
