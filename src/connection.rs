//! Database connection interface.

use relsql_core::{CompiledStatement, Dialect, Value};

use crate::error::PersistResult;

/// One result row, columns in select-list order
pub type Row = Vec<Value>;

/// A synchronous database handle bound to one SQL dialect.
///
/// Errors are reported as [`PersistError::ConstraintViolation`] or
/// [`PersistError::Driver`], carrying the SQL text.
///
/// [`PersistError::ConstraintViolation`]: crate::error::PersistError::ConstraintViolation
/// [`PersistError::Driver`]: crate::error::PersistError::Driver
pub trait Connection {
    fn dialect(&self) -> &dyn Dialect;

    fn query(&mut self, statement: &CompiledStatement) -> PersistResult<Vec<Row>>;

    /// Run a write; returns the number of affected rows
    fn execute(&mut self, statement: &CompiledStatement) -> PersistResult<u64>;

    /// Key the database assigned to the most recent INSERT, if any
    fn last_generated_key(&mut self) -> PersistResult<Option<Value>>;
}

impl<C: Connection + ?Sized> Connection for &mut C {
    fn dialect(&self) -> &dyn Dialect {
        (**self).dialect()
    }

    fn query(&mut self, statement: &CompiledStatement) -> PersistResult<Vec<Row>> {
        (**self).query(statement)
    }

    fn execute(&mut self, statement: &CompiledStatement) -> PersistResult<u64> {
        (**self).execute(statement)
    }

    fn last_generated_key(&mut self) -> PersistResult<Option<Value>> {
        (**self).last_generated_key()
    }
}
