use sea_query::{Expr, PostgresQueryBuilder, UpdateStatement, Value};

use crate::error::TideError;
use crate::query::statement::{
    column_ref, table_ref, CompareOp, Deferred, Ident, Predicate, Statement, StatementKind,
};

/// Fluent UPDATE builder
#[derive(Debug)]
pub struct UpdateBuilder {
    table: String,
    assignments: Vec<(String, Value)>,
    predicates: Vec<Predicate>,
    returning: Vec<String>,
}

impl UpdateBuilder {
    pub fn table(table: &str) -> Self {
        Self {
            table: table.to_string(),
            assignments: Vec::new(),
            predicates: Vec::new(),
            returning: Vec::new(),
        }
    }

    pub fn set(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.assignments.push((column.to_string(), value.into()));
        self
    }

    pub fn set_all<I, C>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, Value)>,
        C: Into<String>,
    {
        self.assignments
            .extend(pairs.into_iter().map(|(column, value)| (column.into(), value)));
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn where_eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Predicate::eq(column, value))
    }

    pub fn where_cmp(self, column: &str, op: CompareOp, value: impl Into<Value>) -> Self {
        self.filter(Predicate::compare(column, op, value))
    }

    pub fn where_custom<I, V>(self, sql: &str, params: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.filter(Predicate::custom(sql, params))
    }

    pub fn returning(mut self, column: &str) -> Self {
        self.returning.push(column.to_string());
        self
    }

    /// # Errors
    ///
    /// `Validation` when there is nothing to set or a custom predicate is
    /// malformed.
    pub fn build(self) -> Result<Statement, TideError> {
        if self.assignments.is_empty() {
            return Err(TideError::validation(format!(
                "UPDATE of `{}` has no columns to set",
                self.table
            )));
        }

        let mut query = UpdateStatement::default();
        query.table(table_ref(&self.table));
        for (column, value) in self.assignments {
            query.value(Ident::new(&column), Expr::val(value));
        }

        let mut deferred = Deferred::default();
        for predicate in self.predicates {
            match predicate.into_expr() {
                Ok(expr) => {
                    query.and_where(expr);
                }
                Err(err) => deferred.record(err),
            }
        }
        deferred.check()?;

        for column in &self.returning {
            query.returning_col(column_ref(column));
        }

        let (sql, values) = query.build(PostgresQueryBuilder);
        Statement::rendered(StatementKind::Update, sql, values.0)
    }
}
