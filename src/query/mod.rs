//! Statement construction.
//!
//! Builders wrap sea-query statements and render them with the PostgreSQL
//! query builder, so every statement comes out with `$n` placeholders and an
//! ordered parameter list.

pub mod delete;
pub mod insert;
pub mod select;
pub mod statement;
pub mod update;

pub use delete::DeleteBuilder;
pub use insert::InsertBuilder;
pub use select::SelectBuilder;
pub use statement::{CompareOp, Predicate, Statement, StatementKind};
pub use update::UpdateBuilder;
