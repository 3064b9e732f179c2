//! Text rendering for the target query AST.
//!
//! Compact output puts every clause on one line separated by spaces; pretty
//! output puts each clause on its own line. Scalar expressions render the same
//! way in both modes and are fully parenthesized, so the text never depends on
//! operator precedence.
//!
//! # Examples
//!
//! ```
//! use docql::sql::{SqlBinaryOp, SqlScalar, printer::scalar_to_sql};
//!
//! let filter = SqlScalar::binary(
//!     SqlBinaryOp::GreaterThan,
//!     SqlScalar::index(SqlScalar::property("root"), "price"),
//!     SqlScalar::integer(100),
//! );
//! assert_eq!(scalar_to_sql(&filter), r#"(root["price"] > 100)"#);
//! ```

use crate::sql::{
    CountSpec, SelectSpec, SqlCollection, SqlLiteral, SqlNumber, SqlQuery, SqlScalar,
    SqlSelectClause,
};

/// LIMIT rendered when a query has an OFFSET but no explicit limit
pub const UNBOUNDED_LIMIT: i64 = i32::MAX as i64;

pub struct SqlPrinter {
    pretty: bool,
}

impl SqlPrinter {
    pub fn new(pretty: bool) -> Self {
        SqlPrinter { pretty }
    }

    pub fn print(&self, query: &SqlQuery) -> String {
        let mut clauses = vec![self.print_select(&query.select), self.print_from(&query.from)];

        if let Some(filter) = &query.filter {
            clauses.push(format!("WHERE {}", self.print_scalar(filter)));
        }

        if !query.group_by.is_empty() {
            clauses.push(format!("GROUP BY {}", self.print_list(&query.group_by)));
        }

        if !query.order_by.is_empty() {
            let items: Vec<String> = query
                .order_by
                .iter()
                .map(|item| {
                    format!(
                        "{} {}",
                        self.print_scalar(&item.expr),
                        if item.descending { "DESC" } else { "ASC" }
                    )
                })
                .collect();
            clauses.push(format!("ORDER BY {}", items.join(", ")));
        }

        match (&query.offset, &query.limit) {
            (None, None) => {}
            (offset, limit) => {
                let offset = offset.clone().unwrap_or(CountSpec::Literal(0));
                let limit = limit.clone().unwrap_or(CountSpec::Literal(UNBOUNDED_LIMIT));
                clauses.push(format!(
                    "OFFSET {} LIMIT {}",
                    self.print_count(&offset),
                    self.print_count(&limit)
                ));
            }
        }

        clauses.join(if self.pretty { "\n" } else { " " })
    }

    fn print_select(&self, select: &SqlSelectClause) -> String {
        let mut result = "SELECT ".to_string();
        if select.distinct {
            result.push_str("DISTINCT ");
        }
        if let Some(top) = &select.top {
            result.push_str(&format!("TOP {} ", self.print_count(top)));
        }
        match &select.spec {
            SelectSpec::Star => result.push('*'),
            SelectSpec::Value(expr) => {
                result.push_str("VALUE ");
                result.push_str(&self.print_scalar(expr));
            }
        }
        result
    }

    fn print_from(&self, from: &[SqlCollection]) -> String {
        let bindings: Vec<String> = from
            .iter()
            .map(|binding| match binding {
                SqlCollection::Root { name } => name.clone(),
                SqlCollection::ArrayIterator { name, path } => {
                    format!("{} IN {}", name, self.print_scalar(path))
                }
                SqlCollection::Subquery { name, query } => {
                    format!("({}) AS {}", self.print_nested(query), name)
                }
            })
            .collect();
        format!("FROM {}", bindings.join(" JOIN "))
    }

    fn print_count(&self, count: &CountSpec) -> String {
        match count {
            CountSpec::Literal(n) => n.to_string(),
            CountSpec::Parameter(name) => name.clone(),
        }
    }

    pub fn print_scalar(&self, expr: &SqlScalar) -> String {
        match expr {
            SqlScalar::Literal(lit) => self.print_literal(lit),
            SqlScalar::PropertyRef(name) => name.clone(),
            SqlScalar::MemberIndexer { member, index } => {
                format!("{}[{}]", self.print_scalar(member), self.print_scalar(index))
            }
            SqlScalar::Binary { op, left, right } => format!(
                "({} {} {})",
                self.print_scalar(left),
                op.as_str(),
                self.print_scalar(right)
            ),
            SqlScalar::Unary { op, operand } => {
                format!("({} {})", op.as_str(), self.print_scalar(operand))
            }
            SqlScalar::FunctionCall { name, args, udf } => format!(
                "{}{}({})",
                if *udf { "udf." } else { "" },
                name,
                self.print_list(args)
            ),
            SqlScalar::ArrayCreate(items) => format!("[{}]", self.print_list(items)),
            SqlScalar::ObjectCreate(properties) => {
                let items: Vec<String> = properties
                    .iter()
                    .map(|p| {
                        format!(
                            "\"{}\": {}",
                            self.escape_string(&p.name),
                            self.print_scalar(&p.value)
                        )
                    })
                    .collect();
                format!("{{{}}}", items.join(", "))
            }
            SqlScalar::Conditional {
                condition,
                consequent,
                alternative,
            } => format!(
                "({} ? {} : {})",
                self.print_scalar(condition),
                self.print_scalar(consequent),
                self.print_scalar(alternative)
            ),
            SqlScalar::In {
                needle,
                haystack,
                not,
            } => format!(
                "({} {}IN ({}))",
                self.print_scalar(needle),
                if *not { "NOT " } else { "" },
                self.print_list(haystack)
            ),
            SqlScalar::Parameter(name) => name.clone(),
            SqlScalar::Exists(query) => format!("EXISTS({})", self.print_nested(query)),
            SqlScalar::Array(query) => format!("ARRAY({})", self.print_nested(query)),
            SqlScalar::Subquery(query) => format!("({})", self.print_nested(query)),
        }
    }

    /// Nested queries always render on one line.
    fn print_nested(&self, query: &SqlQuery) -> String {
        SqlPrinter::new(false).print(query)
    }

    fn print_list(&self, items: &[SqlScalar]) -> String {
        items
            .iter()
            .map(|item| self.print_scalar(item))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn print_literal(&self, lit: &SqlLiteral) -> String {
        match lit {
            SqlLiteral::Null => "null".to_string(),
            SqlLiteral::Undefined => "undefined".to_string(),
            SqlLiteral::Boolean(b) => b.to_string(),
            SqlLiteral::Number(SqlNumber::Integer(n)) => n.to_string(),
            SqlLiteral::Number(SqlNumber::Double(n)) => n.to_string(),
            SqlLiteral::String(s) => format!("\"{}\"", self.escape_string(s)),
        }
    }

    fn escape_string(&self, s: &str) -> String {
        s.chars()
            .flat_map(|c| match c {
                '"' => vec!['\\', '"'],
                '\\' => vec!['\\', '\\'],
                '\n' => vec!['\\', 'n'],
                '\r' => vec!['\\', 'r'],
                '\t' => vec!['\\', 't'],
                c if c.is_control() => format!("\\u{:04x}", c as u32).chars().collect(),
                c => vec![c],
            })
            .collect()
    }
}

/// Renders a query on a single line.
///
/// # Examples
///
/// ```
/// use docql::sql::{SqlCollection, SqlQuery, SqlScalar, SqlSelectClause, printer::to_sql};
///
/// let query = SqlQuery {
///     select: SqlSelectClause::value(SqlScalar::function("COUNT", vec![SqlScalar::integer(1)])),
///     from: vec![SqlCollection::Root { name: "root".to_string() }],
///     filter: None,
///     group_by: Vec::new(),
///     order_by: Vec::new(),
///     offset: None,
///     limit: None,
/// };
/// assert_eq!(to_sql(&query), "SELECT VALUE COUNT(1) FROM root");
/// ```
pub fn to_sql(query: &SqlQuery) -> String {
    SqlPrinter::new(false).print(query)
}

/// Renders a query with one clause per line.
pub fn to_sql_pretty(query: &SqlQuery) -> String {
    SqlPrinter::new(true).print(query)
}

/// Renders a single scalar expression.
pub fn scalar_to_sql(expr: &SqlScalar) -> String {
    SqlPrinter::new(false).print_scalar(expr)
}
