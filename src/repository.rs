//! Repository façade
//!
//! The single entry point application code talks to. It owns one connection,
//! shares a cache backend, picks the execution shape of every read and keeps
//! the cache consistent around every write.

use relsql_core::{
    Assignment, CreateIndexClause, DropIndexClause, Expr, Record, RecordDescriptor, SelectClause,
};
use std::sync::Arc;

use crate::cache::{CacheBackend, MemoryCache};
use crate::config::RepositoryConfig;
use crate::connection::Connection;
use crate::error::PersistResult;
use crate::invalidation::{InvalidatingWhere, Invalidation};
use crate::key::Key;
use crate::operation::{
    Count, CreateIndex, DeleteWhere, DropIndex, Explicitly, InsertRecord, Lookup, Modifier,
    Query, ReadStats, UpdateRecord, UpdateWhere, WithCache, WithKeys, WriteStats,
};
use crate::strategy::{CacheStrategy, Execution};

pub struct Repository<C: Connection> {
    conn: C,
    cache: Option<Arc<dyn CacheBackend>>,
    config: RepositoryConfig,
    caching_enabled: bool,
    last_read: ReadStats,
    last_write: WriteStats,
}

impl<C: Connection> Repository<C> {
    /// Repository with an in-process [`MemoryCache`] when the config enables caching
    pub fn new(conn: C, config: RepositoryConfig) -> Self {
        let cache: Option<Arc<dyn CacheBackend>> = if config.cache.enabled {
            Some(Arc::new(MemoryCache::with_config(&config.cache)))
        } else {
            None
        };
        Self::build(conn, cache, config)
    }

    /// Repository sharing an existing cache backend
    pub fn with_cache(conn: C, config: RepositoryConfig, cache: Arc<dyn CacheBackend>) -> Self {
        Self::build(conn, Some(cache), config)
    }

    pub fn without_cache(conn: C, config: RepositoryConfig) -> Self {
        Self::build(conn, None, config)
    }

    fn build(conn: C, cache: Option<Arc<dyn CacheBackend>>, config: RepositoryConfig) -> Self {
        let configured = config.dialect.dialect().name();
        if configured != conn.dialect().name() {
            tracing::warn!(
                "[REPOSITORY] Configured dialect {} differs from connection dialect {}; using {}",
                configured,
                conn.dialect().name(),
                conn.dialect().name()
            );
        }
        let caching_enabled = config.cache.enabled && cache.is_some();
        Self {
            conn,
            cache,
            config,
            caching_enabled,
            last_read: ReadStats::default(),
            last_write: WriteStats::default(),
        }
    }

    fn read<Q: Query>(&mut self, mut query: Q) -> PersistResult<Q::Output> {
        let enabled = self.caching_enabled;
        let cache = self.cache.as_deref().filter(|_| enabled);
        let result = query.execute(&mut self.conn, cache);
        self.last_read = query.stats();
        result
    }

    /// Writes invalidate even while reads bypass the cache
    fn write<M: Modifier>(&mut self, mut modifier: M) -> PersistResult<u64> {
        let cache = self.cache.as_deref();
        let result = modifier.execute(&mut self.conn, cache);
        self.last_write = modifier.stats();
        result
    }

    /// Fetch one record by primary key; `Bypass` skips the cache
    pub fn get<R: Record>(&mut self, key: &Key<R>, strategy: CacheStrategy) -> PersistResult<Option<R>> {
        let lookup = Lookup::by_key(key.clone());
        let lookup = match strategy {
            CacheStrategy::Bypass => lookup.without_cache(),
            _ => lookup,
        };
        self.read(lookup)
    }

    /// First record matching `condition`
    pub fn find_one<R: Record>(&mut self, condition: Expr) -> PersistResult<Option<R>> {
        self.read(Lookup::<R>::by_condition(condition))
    }

    pub fn find<R: Record>(&mut self, select: &SelectClause, strategy: CacheStrategy) -> PersistResult<Vec<R>> {
        let execution = strategy.resolve(select, self.caching_enabled)?;
        let batch_size = self.config.batch_size(self.conn.dialect());
        match execution {
            Execution::Direct => self.read(Explicitly::<R>::new(select.clone())),
            Execution::KeyThenFetch => self.read(WithCache::<R>::new(select.clone(), batch_size)),
            Execution::KeyCache(category) => {
                self.read(WithKeys::<R>::new(select.clone(), category, batch_size))
            }
        }
    }

    pub fn count<R: Record>(&mut self, select: &SelectClause) -> PersistResult<u64> {
        self.read(Count::<R>::new(select.clone()))
    }

    /// INSERT; a database-generated key is written back into `record`
    pub fn insert<R: Record>(&mut self, record: &mut R) -> PersistResult<u64> {
        self.write(InsertRecord::new(record))
    }

    pub fn update<R: Record>(&mut self, record: &R) -> PersistResult<u64> {
        self.write(UpdateRecord::new(record))
    }

    /// UPDATE the rows `target` identifies, then evict them
    pub fn update_where<T: InvalidatingWhere>(
        &mut self,
        assignments: Vec<Assignment>,
        target: &T,
    ) -> PersistResult<u64> {
        self.write(UpdateWhere::new(assignments, target)?)
    }

    /// UPDATE rows matching `condition`, guarded by a separate directive
    pub fn update_matching(
        &mut self,
        record: &'static RecordDescriptor,
        assignments: Vec<Assignment>,
        condition: Expr,
        invalidation: &dyn Invalidation,
    ) -> PersistResult<u64> {
        self.write(UpdateWhere::matching(record, assignments, condition, invalidation))
    }

    pub fn delete<R: Record>(&mut self, key: &Key<R>) -> PersistResult<u64> {
        self.write(DeleteWhere::new(key)?)
    }

    pub fn delete_where<T: InvalidatingWhere>(&mut self, target: &T) -> PersistResult<u64> {
        self.write(DeleteWhere::new(target)?)
    }

    pub fn create_index(&mut self, clause: CreateIndexClause) -> PersistResult<u64> {
        self.write(CreateIndex::new(clause))
    }

    pub fn drop_index(&mut self, clause: DropIndexClause) -> PersistResult<u64> {
        self.write(DropIndex::new(clause))
    }

    /// Turn cached reads on or off for this repository
    pub fn set_caching_enabled(&mut self, enabled: bool) {
        self.caching_enabled = enabled && self.cache.is_some();
        tracing::debug!("[REPOSITORY] Caching enabled: {}", self.caching_enabled);
    }

    pub fn caching_enabled(&self) -> bool {
        self.caching_enabled
    }

    pub fn last_read_stats(&self) -> ReadStats {
        self.last_read
    }

    pub fn last_write_stats(&self) -> WriteStats {
        self.last_write
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn connection(&mut self) -> &mut C {
        &mut self.conn
    }

    pub fn cache(&self) -> Option<&Arc<dyn CacheBackend>> {
        self.cache.as_ref()
    }

    /// Shut the cache backend down and hand back the connection
    pub fn shutdown(self) -> C {
        if let Some(cache) = &self.cache {
            cache.shutdown();
        }
        tracing::info!("[REPOSITORY] Shut down");
        self.conn
    }
}
