//! Collection reads.
//!
//! [`Explicitly`] runs a select as written. [`WithCache`] and [`WithKeys`]
//! split it in two phases: a key-only query, then a fetch of the keys the
//! cache could not answer. [`WithKeys`] also caches the key list itself.

use relsql_core::{compile_select, CompiledStatement, Record, SelectClause, Value};
use std::collections::{HashMap, HashSet};

use super::{
    cached_record, normalize_key, require_key_fetch, require_record_select, store_record,
    to_records, Query, ReadStats,
};
use crate::cache::{CacheBackend, CacheCategory, CacheKey, CacheValue};
use crate::connection::Connection;
use crate::error::{PersistError, PersistResult};
use crate::key::key_values;
use crate::keyset::KeySet;

/// Runs the full SELECT; the cache is not consulted
pub struct Explicitly<R: Record> {
    select: SelectClause,
    stats: ReadStats,
    _record: std::marker::PhantomData<fn() -> R>,
}

impl<R: Record> Explicitly<R> {
    pub fn new(select: SelectClause) -> Self {
        Self {
            select,
            stats: ReadStats::default(),
            _record: std::marker::PhantomData,
        }
    }
}

impl<R: Record> Query for Explicitly<R> {
    type Output = Vec<R>;

    fn execute(
        &mut self,
        conn: &mut dyn Connection,
        _cache: Option<&dyn CacheBackend>,
    ) -> PersistResult<Vec<R>> {
        require_record_select::<R>(&self.select)?;
        let statement = compile_select(&self.select, conn.dialect())?;
        let rows = conn.query(&statement)?;
        self.stats.uncached_queries += 1;
        self.stats.uncached_records += rows.len() as u64;
        to_records(&self.select.output_fields(), rows)
    }

    fn stats(&self) -> ReadStats {
        self.stats
    }
}

/// Key-then-fetch, reusing cached records
pub struct WithCache<R: Record> {
    select: SelectClause,
    max_batch_size: usize,
    stats: ReadStats,
    _record: std::marker::PhantomData<fn() -> R>,
}

impl<R: Record> WithCache<R> {
    pub fn new(select: SelectClause, max_batch_size: usize) -> Self {
        Self {
            select,
            max_batch_size: max_batch_size.max(1),
            stats: ReadStats::default(),
            _record: std::marker::PhantomData,
        }
    }
}

impl<R: Record> Query for WithCache<R> {
    type Output = Vec<R>;

    fn execute(
        &mut self,
        conn: &mut dyn Connection,
        cache: Option<&dyn CacheBackend>,
    ) -> PersistResult<Vec<R>> {
        require_record_select::<R>(&self.select)?;
        require_key_fetch(&self.select)?;

        let statement = compile_select(&self.select.keys_only(), conn.dialect())?;
        let keys = query_keys::<R>(conn, &statement, &mut self.stats)?;
        fetch_by_keys(conn, cache, &keys, self.max_batch_size, &mut self.stats)
    }

    fn stats(&self) -> ReadStats {
        self.stats
    }
}

/// Key-then-fetch with the key list cached as well
pub struct WithKeys<R: Record> {
    select: SelectClause,
    category: CacheCategory,
    max_batch_size: usize,
    stats: ReadStats,
    _record: std::marker::PhantomData<fn() -> R>,
}

impl<R: Record> WithKeys<R> {
    /// `category` decides the key list's lifetime: short or long TTL keys
    pub fn new(select: SelectClause, category: CacheCategory, max_batch_size: usize) -> Self {
        Self {
            select,
            category,
            max_batch_size: max_batch_size.max(1),
            stats: ReadStats::default(),
            _record: std::marker::PhantomData,
        }
    }
}

impl<R: Record> Query for WithKeys<R> {
    type Output = Vec<R>;

    fn execute(
        &mut self,
        conn: &mut dyn Connection,
        cache: Option<&dyn CacheBackend>,
    ) -> PersistResult<Vec<R>> {
        require_record_select::<R>(&self.select)?;
        require_key_fetch(&self.select)?;

        let statement = compile_select(&self.select.keys_only(), conn.dialect())?;
        let list_key = CacheKey::key_list(R::descriptor(), &statement);

        let cached = cache.and_then(|c| list_key.lookup(c));
        let keys = match cached {
            Some(CacheValue::Keys(keys)) => {
                tracing::debug!("[CACHE] Key list hit for {}", R::descriptor().name);
                self.stats.cached_queries += 1;
                keys
            }
            _ => {
                let keys = query_keys::<R>(conn, &statement, &mut self.stats)?;
                if let Some(cache) = cache {
                    cache.store(
                        self.category,
                        &list_key.bin,
                        list_key.key.clone(),
                        CacheValue::Keys(keys.clone()),
                    );
                }
                keys
            }
        };

        fetch_by_keys(conn, cache, &keys, self.max_batch_size, &mut self.stats)
    }

    fn stats(&self) -> ReadStats {
        self.stats
    }
}

/// `SELECT COUNT(*)` over a select's filter and joins
pub struct Count<R: Record> {
    select: SelectClause,
    stats: ReadStats,
    _record: std::marker::PhantomData<fn() -> R>,
}

impl<R: Record> Count<R> {
    pub fn new(select: SelectClause) -> Self {
        Self {
            select,
            stats: ReadStats::default(),
            _record: std::marker::PhantomData,
        }
    }
}

impl<R: Record> Query for Count<R> {
    type Output = u64;

    fn execute(
        &mut self,
        conn: &mut dyn Connection,
        _cache: Option<&dyn CacheBackend>,
    ) -> PersistResult<u64> {
        require_record_select::<R>(&self.select)?;
        let statement = compile_select(&self.select.count(), conn.dialect())?;
        let rows = conn.query(&statement)?;
        self.stats.uncached_queries += 1;

        let count = rows
            .first()
            .and_then(|row| row.first())
            .and_then(Value::as_i64)
            .ok_or_else(|| PersistError::Driver {
                message: "COUNT(*) returned no integer".to_string(),
                sql: statement.sql.clone(),
            })?;
        Ok(count.max(0) as u64)
    }

    fn stats(&self) -> ReadStats {
        self.stats
    }
}

/// Phase one: primary keys of the matching rows, in result order
fn query_keys<R: Record>(
    conn: &mut dyn Connection,
    statement: &CompiledStatement,
    stats: &mut ReadStats,
) -> PersistResult<Vec<Vec<Value>>> {
    let rows = conn.query(statement)?;
    stats.uncached_queries += 1;
    rows.into_iter().map(normalize_key::<R>).collect()
}

/// Phase two: resolve keys through the cache, fetch the misses in batches,
/// and return the records in key order. Keys that match no row are dropped.
fn fetch_by_keys<R: Record>(
    conn: &mut dyn Connection,
    cache: Option<&dyn CacheBackend>,
    keys: &[Vec<Value>],
    max_batch_size: usize,
    stats: &mut ReadStats,
) -> PersistResult<Vec<R>> {
    let descriptor = R::descriptor();
    let fields = descriptor.field_names();

    let mut found: HashMap<Vec<Value>, R> = HashMap::with_capacity(keys.len());
    let mut misses = Vec::new();
    let mut seen = HashSet::with_capacity(keys.len());
    for key in keys {
        if !seen.insert(key) {
            continue;
        }
        match cache.and_then(|c| cached_record::<R>(c, key)) {
            Some(record) => {
                stats.cached_records += 1;
                found.insert(key.clone(), record);
            }
            None => misses.push(key.clone()),
        }
    }

    if misses.is_empty() {
        stats.cached_queries += 1;
    } else {
        let missing = KeySet::<R>::from_values(misses)?;
        for batch in missing.chunks(max_batch_size) {
            let statement = compile_select(&batch.select()?, conn.dialect())?;
            let rows = conn.query(&statement)?;
            stats.uncached_queries += 1;
            if rows.len() != batch.len() {
                tracing::warn!(
                    "[FETCH] {} batch asked for {} rows, got {}",
                    descriptor.name,
                    batch.len(),
                    rows.len()
                );
            }

            for record in to_records::<R>(&fields, rows)? {
                let key = key_values(&record)?;
                if let Some(cache) = cache {
                    store_record(cache, key.clone(), &record)?;
                }
                stats.uncached_records += 1;
                found.insert(key, record);
            }
        }
    }

    Ok(keys.iter().filter_map(|key| found.get(key).cloned()).collect())
}
