use sea_query::{Expr, InsertStatement, PostgresQueryBuilder, Value};

use crate::error::TideError;
use crate::query::statement::{column_ref, table_ref, Ident, Statement, StatementKind};

/// Fluent INSERT builder for a single row
#[derive(Debug)]
pub struct InsertBuilder {
    table: String,
    columns: Vec<String>,
    values: Vec<Value>,
    returning: Vec<String>,
}

impl InsertBuilder {
    pub fn into_table(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: Vec::new(),
            values: Vec::new(),
            returning: Vec::new(),
        }
    }

    pub fn value(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.columns.push(column.to_string());
        self.values.push(value.into());
        self
    }

    pub fn values<I, C>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, Value)>,
        C: Into<String>,
    {
        for (column, value) in pairs {
            self.columns.push(column.into());
            self.values.push(value);
        }
        self
    }

    pub fn returning(mut self, column: &str) -> Self {
        self.returning.push(column.to_string());
        self
    }

    /// # Errors
    ///
    /// `Validation` when no column was given.
    pub fn build(self) -> Result<Statement, TideError> {
        if self.columns.is_empty() {
            return Err(TideError::validation(format!(
                "INSERT into `{}` has no columns",
                self.table
            )));
        }

        let mut query = InsertStatement::default();
        query
            .into_table(table_ref(&self.table))
            .columns(self.columns.iter().map(|c| Ident::new(c)));
        query
            .values(self.values.into_iter().map(Expr::val))
            .map_err(|e| TideError::validation(format!("INSERT into `{}`: {e:?}", self.table)))?;
        for column in &self.returning {
            query.returning_col(column_ref(column));
        }

        let (sql, values) = query.build(PostgresQueryBuilder);
        Statement::rendered(StatementKind::Insert, sql, values.0)
    }
}
