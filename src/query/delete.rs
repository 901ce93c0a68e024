use sea_query::{DeleteStatement, PostgresQueryBuilder, Value};

use crate::error::TideError;
use crate::query::statement::{
    column_ref, table_ref, CompareOp, Deferred, Predicate, Statement, StatementKind,
};

/// Fluent DELETE builder
#[derive(Debug)]
pub struct DeleteBuilder {
    query: DeleteStatement,
    deferred: Deferred,
}

impl DeleteBuilder {
    pub fn from(table: &str) -> Self {
        let mut query = DeleteStatement::default();
        query.from_table(table_ref(table));
        Self {
            query,
            deferred: Deferred::default(),
        }
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
        self.query.returning_col(column_ref(column));
        self
    }

    pub fn build(self) -> Result<Statement, TideError> {
        self.deferred.check()?;
        let (sql, values) = self.query.build(PostgresQueryBuilder);
        Statement::rendered(StatementKind::Delete, sql, values.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_by_id() {
        let stmt = DeleteBuilder::from("order_lines").where_eq("id", 9i64).build().unwrap();
        assert_eq!(stmt.sql(), r#"DELETE FROM "order_lines" WHERE "id" = $1"#);
        assert_eq!(stmt.params(), &[Value::BigInt(Some(9))]);
    }

    #[test]
    fn test_delete_with_returning_and_null_predicate() {
        let stmt = DeleteBuilder::from("orders")
            .where_eq("customer_id", Value::BigInt(None))
            .returning("id")
            .build()
            .unwrap();
        assert_eq!(
            stmt.sql(),
            r#"DELETE FROM "orders" WHERE "customer_id" IS NULL RETURNING "id""#
        );
        assert!(stmt.params().is_empty());
    }

    #[test]
    fn test_delete_bad_fragment() {
        let err = DeleteBuilder::from("orders")
            .where_custom("id IN (?, ?)", [1i64])
            .build()
            .unwrap_err();
        assert!(err.is_validation());
    }
}
