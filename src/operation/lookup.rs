//! Single-record reads.

use relsql_core::{compile_select, Expr, Record, SelectClause};

use super::{cached_record, is_cacheable, store_record, to_records, Query, ReadStats};
use crate::cache::CacheBackend;
use crate::connection::Connection;
use crate::error::PersistResult;
use crate::key::{is_absent, key_values, Key};

enum Target<R: Record> {
    Key(Key<R>),
    Condition(Expr),
}

/// Fetch at most one record, by primary key or by an arbitrary condition.
///
/// Key lookups consult the cache first. Whatever is loaded from the database
/// is stored under the primary key of the loaded row.
pub struct Lookup<R: Record> {
    target: Target<R>,
    use_cache: bool,
    stats: ReadStats,
}

impl<R: Record> Lookup<R> {
    pub fn by_key(key: Key<R>) -> Self {
        Self {
            target: Target::Key(key),
            use_cache: true,
            stats: ReadStats::default(),
        }
    }

    pub fn by_condition(condition: Expr) -> Self {
        Self {
            target: Target::Condition(condition),
            use_cache: true,
            stats: ReadStats::default(),
        }
    }

    /// Neither read nor populate the cache
    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    fn select(&self) -> PersistResult<SelectClause> {
        match &self.target {
            Target::Key(key) => key.select(),
            Target::Condition(condition) => Ok(SelectClause::new(R::descriptor())
                .filter(condition.clone())?
                .limit(1, None)?),
        }
    }
}

impl<R: Record> Query for Lookup<R> {
    type Output = Option<R>;

    fn execute(
        &mut self,
        conn: &mut dyn Connection,
        cache: Option<&dyn CacheBackend>,
    ) -> PersistResult<Option<R>> {
        let descriptor = R::descriptor();
        let cache = cache.filter(|_| self.use_cache && is_cacheable(descriptor));

        if let (Some(cache), Target::Key(key)) = (cache, &self.target) {
            // Absent keys never address a cache entry
            if !key.is_absent() {
                if let Some(record) = cached_record::<R>(cache, key.values()) {
                    tracing::debug!("[CACHE] Hit {:?}", key);
                    self.stats.cached_records += 1;
                    self.stats.cached_queries += 1;
                    return Ok(Some(record));
                }
            }
        }

        let statement = compile_select(&self.select()?, conn.dialect())?;
        let rows = conn.query(&statement)?;
        self.stats.uncached_queries += 1;

        let record = to_records::<R>(&descriptor.field_names(), rows)?
            .into_iter()
            .next();
        if let Some(record) = &record {
            self.stats.uncached_records += 1;
            if let Some(cache) = cache {
                let key = key_values(record)?;
                if !is_absent(&key) {
                    store_record(cache, key, record)?;
                }
            }
        }
        Ok(record)
    }

    fn stats(&self) -> ReadStats {
        self.stats
    }
}
