//! relsql core - storage-independent SQL expression trees and dialect compiler.
//!
//! This crate describes queries and mutations as typed trees against static
//! record metadata and compiles them into SQL text plus ordered parameters,
//! without any database or cache dependency.
//!
//! # Main Components
//!
//! - **Record metadata**: `RecordDescriptor` / `Record`, the shape of a persisted type
//! - **AST**: expressions (`Expr`) and clauses (`SelectClause`, `UpdateClause`, ...)
//! - **Dialects**: `Dialect` implementations for ANSI, SQLite, PostgreSQL and MySQL
//! - **Compiler**: one traversal producing a `CompiledStatement`
//!
//! # Example
//!
//! ```rust
//! use relsql_core::{compile_select, Expr, FieldDescriptor, RecordDescriptor, RecordSource,
//!     SelectClause, SqliteDialect, Value};
//!
//! static USERS: RecordDescriptor = RecordDescriptor {
//!     name: "User",
//!     source: RecordSource::Table("users"),
//!     fields: &[
//!         FieldDescriptor::generated("id", "id"),
//!         FieldDescriptor::persisted("name", "name"),
//!     ],
//!     primary_key: &["id"],
//! };
//!
//! let select = SelectClause::new(&USERS)
//!     .filter(Expr::col(&USERS, "name").eq(Expr::bound("Alice")))
//!     .unwrap();
//! let stmt = compile_select(&select, &SqliteDialect).unwrap();
//! assert_eq!(
//!     stmt.sql,
//!     "SELECT t0.\"id\" AS \"id\", t0.\"name\" AS \"name\" FROM \"users\" t0 WHERE t0.\"name\" = ?"
//! );
//! assert_eq!(stmt.params(), vec![Value::from("Alice")]);
//! ```

pub mod ast;
pub mod clause;
pub mod compiler;
pub mod dialect;
pub mod error;
pub mod record;
pub mod statement;
pub mod value;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use ast::{BinaryOperator, ColumnRef, DatePart, Expr, InList, LogicalOperator};
pub use clause::{
    Assignment, CreateIndexClause, DeleteClause, DropIndexClause, FieldDefinition, FieldOverride,
    GroupByClause, InsertClause, JoinClause, JoinKind, LimitClause, OrderByClause, OrderItem,
    SelectClause, SelectPart, Selection, Statement, UpdateClause, WhereClause,
};
pub use compiler::{compile, compile_select, validate_identifier, Compiler};
pub use dialect::{
    Dialect, DialectKind, GenericDialect, MySqlDialect, PostgresDialect, SqliteDialect,
};
pub use error::{SqlError, SqlResult};
pub use record::{FieldDescriptor, FieldKind, Record, RecordDescriptor, RecordSource};
pub use statement::{Binding, CompiledStatement, Token};
pub use value::Value;
