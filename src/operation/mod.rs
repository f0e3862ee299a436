//! Reads and writes executed against a connection and an optional cache.
//!
//! Reads implement [`Query`], writes implement [`Modifier`]. Each operation
//! records statistics about the work it did, readable after it ran.

use relsql_core::{Record, RecordDescriptor, SelectClause, Selection, Value};
use serde::Serialize;

use crate::cache::{CacheBackend, CacheCategory, CacheValue};
use crate::connection::{Connection, Row};
use crate::error::{PersistError, PersistResult};
use crate::key::key_values;

pub mod fetch;
pub mod lookup;
pub mod modify;

pub use fetch::{Count, Explicitly, WithCache, WithKeys};
pub use lookup::Lookup;
pub use modify::{CreateIndex, DeleteWhere, DropIndex, InsertRecord, UpdateRecord, UpdateWhere};

/// What a read cost
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReadStats {
    /// Records served from the cache
    pub cached_records: u64,
    /// Records loaded from the database
    pub uncached_records: u64,
    /// Passes answered without a database round trip
    pub cached_queries: u64,
    /// SELECT statements sent to the database
    pub uncached_queries: u64,
}

/// What a write cost
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteStats {
    pub statements: u64,
    pub rows_affected: u64,
    /// Cache entries evicted
    pub invalidations: u64,
}

pub trait Query {
    type Output;

    fn execute(
        &mut self,
        conn: &mut dyn Connection,
        cache: Option<&dyn CacheBackend>,
    ) -> PersistResult<Self::Output>;

    fn stats(&self) -> ReadStats;
}

pub trait Modifier {
    /// Returns the number of affected rows
    fn execute(
        &mut self,
        conn: &mut dyn Connection,
        cache: Option<&dyn CacheBackend>,
    ) -> PersistResult<u64>;

    fn stats(&self) -> WriteStats;
}

/// Reject key-then-fetch reads the record metadata cannot support
pub(crate) fn require_key_fetch(select: &SelectClause) -> PersistResult<()> {
    let record = select.record;
    let reason = if record.is_computed() {
        "is computed"
    } else if !record.has_primary_key() {
        "has no primary key"
    } else if select.uses_overrides() {
        "is queried with field overrides"
    } else {
        return Ok(());
    };
    Err(PersistError::configuration(format!(
        "key-then-fetch is unavailable: {} {}",
        record.name, reason
    )))
}

/// The select must return full `R` rows
pub(crate) fn require_record_select<R: Record>(select: &SelectClause) -> PersistResult<()> {
    if select.record != R::descriptor() {
        return Err(PersistError::configuration(format!(
            "select on {} cannot produce {} records",
            select.record.name,
            R::descriptor().name
        )));
    }
    if select.selection != Selection::Fields {
        return Err(PersistError::configuration(format!(
            "select on {} does not return full records",
            select.record.name
        )));
    }
    Ok(())
}

pub(crate) fn to_records<R: Record>(fields: &[&'static str], rows: Vec<Row>) -> PersistResult<Vec<R>> {
    rows.into_iter()
        .map(|row| R::from_values(fields, row).map_err(PersistError::from))
        .collect()
}

/// Key tuples read from the database, in the typed form records report
pub(crate) fn normalize_key<R: Record>(values: Row) -> PersistResult<Vec<Value>> {
    let descriptor = R::descriptor();
    let mut probe = R::default();
    for (field, value) in descriptor.primary_key.iter().zip(values) {
        probe.set(field, value)?;
    }
    key_values(&probe)
}

/// A cached record under `key`, if present and readable
pub(crate) fn cached_record<R: Record>(cache: &dyn CacheBackend, key: &[Value]) -> Option<R> {
    let descriptor = R::descriptor();
    match cache.lookup(descriptor.name, key)? {
        CacheValue::Row(values) => match R::from_values(&descriptor.field_names(), values) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("[CACHE] Dropping unreadable {} entry: {}", descriptor.name, e);
                cache.remove(descriptor.name, key);
                None
            }
        },
        CacheValue::Keys(_) => None,
    }
}

/// Store a copy of `record` under its own primary key
pub(crate) fn store_record<R: Record>(
    cache: &dyn CacheBackend,
    key: Vec<Value>,
    record: &R,
) -> PersistResult<()> {
    let descriptor: &RecordDescriptor = R::descriptor();
    cache.store(
        CacheCategory::Record,
        descriptor.name,
        key,
        CacheValue::Row(record.to_values()?),
    );
    Ok(())
}

/// Stored records need a table and a primary key
pub(crate) fn is_cacheable(descriptor: &RecordDescriptor) -> bool {
    !descriptor.is_computed() && descriptor.has_primary_key()
}
