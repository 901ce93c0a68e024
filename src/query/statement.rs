//! Rendered statements and the identifier/predicate plumbing shared by the
//! builders.

use std::fmt;

use sea_query::{
    Asterisk, BinOper, ColumnRef, Expr, ExprTrait, Iden, IntoColumnRef, IntoTableRef, TableRef,
    Value,
};

use crate::error::TideError;
use crate::value::coerce_for_bind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    /// Caller-supplied SQL
    Raw,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatementKind::Select => "SELECT",
            StatementKind::Insert => "INSERT",
            StatementKind::Update => "UPDATE",
            StatementKind::Delete => "DELETE",
            StatementKind::Raw => "RAW",
        };
        f.write_str(name)
    }
}

/// SQL text with `$n` placeholders and the parameters bound to them, in
/// placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    kind: StatementKind,
    sql: String,
    params: Vec<Value>,
}

impl Statement {
    /// Wrap caller-supplied SQL. Parameters are coerced for binding but the
    /// text is passed through untouched.
    pub fn raw(sql: impl Into<String>, params: Vec<Value>) -> Result<Self, TideError> {
        Self::rendered(StatementKind::Raw, sql.into(), params)
    }

    pub(crate) fn rendered(
        kind: StatementKind,
        sql: String,
        params: Vec<Value>,
    ) -> Result<Self, TideError> {
        let params = params
            .into_iter()
            .map(coerce_for_bind)
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!("{} statement: {} ({} params)", kind, sql, params.len());
        Ok(Self { kind, sql, params })
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.params)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Identifier known only at runtime (table, column or alias label)
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Ident(String);

impl Ident {
    pub(crate) fn new(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl Iden for Ident {
    fn unquoted(&self) -> &str {
        &self.0
    }
}

/// `schema.table` or `table`
pub(crate) fn table_ref(name: &str) -> TableRef {
    match name.split_once('.') {
        Some((schema, table)) => (Ident::new(schema), Ident::new(table)).into_table_ref(),
        None => Ident::new(name).into_table_ref(),
    }
}

/// `column`, `alias.column`, `*` or `alias.*`
pub(crate) fn column_ref(name: &str) -> ColumnRef {
    match name.split_once('.') {
        Some((table, "*")) => (Ident::new(table), Asterisk).into_column_ref(),
        Some((table, column)) => (Ident::new(table), Ident::new(column)).into_column_ref(),
        None if name == "*" => Asterisk.into_column_ref(),
        None => Ident::new(name).into_column_ref(),
    }
}

/// Comparison operators for column predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
}

impl From<CompareOp> for BinOper {
    fn from(op: CompareOp) -> Self {
        match op {
            CompareOp::Eq => BinOper::Equal,
            CompareOp::Ne => BinOper::NotEqual,
            CompareOp::Lt => BinOper::SmallerThan,
            CompareOp::Le => BinOper::SmallerThanOrEqual,
            CompareOp::Gt => BinOper::GreaterThan,
            CompareOp::Ge => BinOper::GreaterThanOrEqual,
            CompareOp::Like => BinOper::Like,
        }
    }
}

/// One WHERE/HAVING term
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        column: String,
        op: CompareOp,
        value: Value,
    },
    IsNull(String),
    IsNotNull(String),
    /// SQL fragment with `?` markers, one per parameter
    Custom { sql: String, params: Vec<Value> },
}

impl Predicate {
    /// Equality that turns into `IS NULL` for a null value.
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        if crate::value::is_null(&value) {
            Predicate::IsNull(column.into())
        } else {
            Predicate::Compare {
                column: column.into(),
                op: CompareOp::Eq,
                value,
            }
        }
    }

    pub fn compare(column: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn custom<I, V>(sql: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Predicate::Custom {
            sql: sql.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    pub(crate) fn into_expr(self) -> Result<Expr, TideError> {
        match self {
            Predicate::Compare { column, op, value } => {
                Ok(Expr::col(column_ref(&column)).binary(op, value))
            }
            Predicate::IsNull(column) => Ok(Expr::col(column_ref(&column)).is_null()),
            Predicate::IsNotNull(column) => Ok(Expr::col(column_ref(&column)).is_not_null()),
            Predicate::Custom { sql, params } => custom_expr(&sql, params),
        }
    }
}

/// Turn a `?`-marked fragment into a sea-query custom expression.
///
/// Markers are rewritten to fragment-local `$k`; the query builder renumbers
/// them into the statement's placeholder sequence.
pub(crate) fn custom_expr(fragment: &str, params: Vec<Value>) -> Result<Expr, TideError> {
    let (sql, markers) = number_markers(fragment);
    if markers != params.len() {
        return Err(TideError::validation(format!(
            "fragment `{fragment}` has {markers} placeholders but {} parameters",
            params.len()
        )));
    }
    Ok(Expr::cust_with_values(sql, params))
}

/// Replace every `?` outside single-quoted literals with `$1`, `$2`, ...
fn number_markers(fragment: &str) -> (String, usize) {
    let mut out = String::with_capacity(fragment.len() + 8);
    let mut in_literal = false;
    let mut count = 0;
    for ch in fragment.chars() {
        match ch {
            '\'' => {
                in_literal = !in_literal;
                out.push(ch);
            }
            '?' if !in_literal => {
                count += 1;
                out.push('$');
                out.push_str(&count.to_string());
            }
            _ => out.push(ch),
        }
    }
    (out, count)
}

/// Collects builder errors so the fluent chain stays infallible until `build`.
#[derive(Debug, Default)]
pub(crate) struct Deferred(Option<TideError>);

impl Deferred {
    pub(crate) fn record(&mut self, err: TideError) {
        if self.0.is_none() {
            self.0 = Some(err);
        }
    }

    pub(crate) fn check(self) -> Result<(), TideError> {
        match self.0 {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
