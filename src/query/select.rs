use sea_query::{Expr, ExprTrait, JoinType, Order, PostgresQueryBuilder, SelectStatement, Value};

use crate::error::TideError;
use crate::query::statement::{
    column_ref, custom_expr, table_ref, CompareOp, Deferred, Ident, Predicate, Statement,
    StatementKind,
};

/// Fluent SELECT builder over a sea-query [`SelectStatement`].
///
/// ```
/// use tideline::query::SelectBuilder;
///
/// let stmt = SelectBuilder::from("orders")
///     .where_eq("customer_id", 7i64)
///     .order_by_desc("total")
///     .limit(10)
///     .build()
///     .unwrap();
/// assert_eq!(stmt.params().len(), 2);
/// ```
#[derive(Debug)]
pub struct SelectBuilder {
    query: SelectStatement,
    projected: bool,
    deferred: Deferred,
}

impl SelectBuilder {
    pub fn from(table: &str) -> Self {
        let mut query = SelectStatement::default();
        query.from(table_ref(table));
        Self {
            query,
            projected: false,
            deferred: Deferred::default(),
        }
    }

    /// FROM `table` AS `alias`
    pub fn from_as(table: &str, alias: &str) -> Self {
        let mut query = SelectStatement::default();
        query.from_as(table_ref(table), Ident::new(alias));
        Self {
            query,
            projected: false,
            deferred: Deferred::default(),
        }
    }

    /// Project `column`. Without any projection the statement selects `*`.
    pub fn column(mut self, column: &str) -> Self {
        self.query.column(column_ref(column));
        self.projected = true;
        self
    }

    pub fn columns<'c>(mut self, columns: impl IntoIterator<Item = &'c str>) -> Self {
        for column in columns {
            self = self.column(column);
        }
        self
    }

    /// INNER JOIN `table` AS `alias` ON `left` = `right`
    pub fn inner_join(self, table: &str, alias: &str, left: &str, right: &str) -> Self {
        self.join(JoinType::InnerJoin, table, alias, left, right)
    }

    /// LEFT JOIN `table` AS `alias` ON `left` = `right`
    pub fn left_join(self, table: &str, alias: &str, left: &str, right: &str) -> Self {
        self.join(JoinType::LeftJoin, table, alias, left, right)
    }

    fn join(mut self, kind: JoinType, table: &str, alias: &str, left: &str, right: &str) -> Self {
        self.query.join_as(
            kind,
            table_ref(table),
            Ident::new(alias),
            Expr::col(column_ref(left)).equals(column_ref(right)),
        );
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        match predicate.into_expr() {
            Ok(expr) => {
                self.query.and_where(expr);
            }
            Err(err) => self.deferred.record(err),
        }
        self
    }

    /// `column = value`, or `column IS NULL` when `value` is null
    pub fn where_eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Predicate::eq(column, value))
    }

    pub fn where_null(self, column: &str) -> Self {
        self.filter(Predicate::IsNull(column.to_string()))
    }

    pub fn where_not_null(self, column: &str) -> Self {
        self.filter(Predicate::IsNotNull(column.to_string()))
    }

    pub fn where_cmp(self, column: &str, op: CompareOp, value: impl Into<Value>) -> Self {
        self.filter(Predicate::compare(column, op, value))
    }

    /// Custom condition with `?` markers, e.g. `"total > ? AND total < ?"`
    pub fn where_custom<I, V>(self, sql: &str, params: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.filter(Predicate::custom(sql, params))
    }

    pub fn group_by(mut self, column: &str) -> Self {
        self.query.group_by_col(column_ref(column));
        self
    }

    /// HAVING fragment with `?` markers
    pub fn having<I, V>(mut self, sql: &str, params: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let params = params.into_iter().map(Into::into).collect();
        match custom_expr(sql, params) {
            Ok(expr) => {
                self.query.and_having(expr);
            }
            Err(err) => self.deferred.record(err),
        }
        self
    }

    pub fn order_by(mut self, column: &str) -> Self {
        self.query.order_by(column_ref(column), Order::Asc);
        self
    }

    pub fn order_by_desc(mut self, column: &str) -> Self {
        self.query.order_by(column_ref(column), Order::Desc);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.query.limit(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.query.offset(offset);
        self
    }

    /// Render to PostgreSQL.
    ///
    /// # Errors
    ///
    /// `Validation` when a custom fragment's markers do not match its
    /// parameters, or a parameter cannot be bound.
    pub fn build(mut self) -> Result<Statement, TideError> {
        self.deferred.check()?;
        if !self.projected {
            self.query.column(sea_query::Asterisk);
        }
        let (sql, values) = self.query.build(PostgresQueryBuilder);
        Statement::rendered(StatementKind::Select, sql, values.0)
    }
}
