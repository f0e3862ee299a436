//! Writes and their cache invalidation.
//!
//! Every modifier runs its SQL first and touches the cache only once the
//! statement succeeded. A failed write leaves the cache as it was.

use relsql_core::{
    compile, Assignment, CreateIndexClause, DeleteClause, DropIndexClause, Expr, InsertClause,
    Record, RecordDescriptor, Statement, UpdateClause, WhereClause,
};

use super::{is_cacheable, store_record, Modifier, WriteStats};
use crate::cache::CacheBackend;
use crate::connection::Connection;
use crate::error::{PersistError, PersistResult};
use crate::invalidation::{evict_key_lists, InvalidatingWhere, Invalidation};
use crate::key::Key;

fn run(
    conn: &mut dyn Connection,
    statement: &Statement,
    stats: &mut WriteStats,
) -> PersistResult<u64> {
    let compiled = compile(statement, conn.dialect())?;
    let affected = conn.execute(&compiled)?;
    stats.statements += 1;
    stats.rows_affected += affected;
    Ok(affected)
}

/// INSERT one record.
///
/// A database-generated key is read back and set on the record before the
/// record is cached, so the cache never holds it under a placeholder key.
pub struct InsertRecord<'a, R: Record> {
    record: &'a mut R,
    stats: WriteStats,
}

impl<'a, R: Record> InsertRecord<'a, R> {
    pub fn new(record: &'a mut R) -> Self {
        Self {
            record,
            stats: WriteStats::default(),
        }
    }

    fn assign_generated_key(&mut self, conn: &mut dyn Connection) -> PersistResult<()> {
        let descriptor = R::descriptor();
        let [field] = descriptor.primary_key else {
            return Ok(());
        };
        if !descriptor.require_field(field)?.is_generated() || !self.record.get(field)?.is_unset() {
            return Ok(());
        }
        if let Some(value) = conn.last_generated_key()? {
            tracing::debug!("[INSERT] {} assigned key {}", descriptor.name, value);
            self.record.set(field, value)?;
        }
        Ok(())
    }
}

impl<R: Record> Modifier for InsertRecord<'_, R> {
    fn execute(
        &mut self,
        conn: &mut dyn Connection,
        cache: Option<&dyn CacheBackend>,
    ) -> PersistResult<u64> {
        let descriptor = R::descriptor();
        let insert = InsertClause::from_record(&*self.record)?;
        let affected = run(conn, &Statement::Insert(insert), &mut self.stats)?;
        self.assign_generated_key(conn)?;

        if let Some(cache) = cache.filter(|_| is_cacheable(descriptor)) {
            self.stats.invalidations += evict_key_lists(descriptor, cache);
            if let Some(key) = Key::of(&*self.record)? {
                store_record(cache, key.into_values(), &*self.record)?;
            }
        }
        Ok(affected)
    }

    fn stats(&self) -> WriteStats {
        self.stats
    }
}

/// UPDATE one record by its primary key
pub struct UpdateRecord<'a, R: Record> {
    record: &'a R,
    stats: WriteStats,
}

impl<'a, R: Record> UpdateRecord<'a, R> {
    pub fn new(record: &'a R) -> Self {
        Self {
            record,
            stats: WriteStats::default(),
        }
    }
}

impl<R: Record> Modifier for UpdateRecord<'_, R> {
    fn execute(
        &mut self,
        conn: &mut dyn Connection,
        cache: Option<&dyn CacheBackend>,
    ) -> PersistResult<u64> {
        let key = Key::of(self.record)?.ok_or_else(|| {
            PersistError::configuration(format!(
                "cannot update {} without a primary key value",
                R::descriptor().name
            ))
        })?;
        let update = UpdateClause::from_record(self.record)?;
        let affected = run(conn, &Statement::Update(update), &mut self.stats)?;

        if let Some(cache) = cache {
            self.stats.invalidations += key.invalidate(cache);
        }
        Ok(affected)
    }

    fn stats(&self) -> WriteStats {
        self.stats
    }
}

/// UPDATE every row matching a condition, then apply an invalidation directive
pub struct UpdateWhere<'a> {
    record: &'static RecordDescriptor,
    assignments: Vec<Assignment>,
    condition: Expr,
    invalidation: &'a dyn Invalidation,
    stats: WriteStats,
}

impl<'a> UpdateWhere<'a> {
    /// The target is both the WHERE condition and the invalidation directive
    pub fn new<T: InvalidatingWhere>(assignments: Vec<Assignment>, target: &'a T) -> PersistResult<Self> {
        Ok(Self::matching(target.record(), assignments, target.condition()?, target))
    }

    /// Separate condition and directive, e.g. a filter guarded by [`AllRecords`]
    ///
    /// [`AllRecords`]: crate::invalidation::AllRecords
    pub fn matching(
        record: &'static RecordDescriptor,
        assignments: Vec<Assignment>,
        condition: Expr,
        invalidation: &'a dyn Invalidation,
    ) -> Self {
        Self {
            record,
            assignments,
            condition,
            invalidation,
            stats: WriteStats::default(),
        }
    }
}

impl Modifier for UpdateWhere<'_> {
    fn execute(
        &mut self,
        conn: &mut dyn Connection,
        cache: Option<&dyn CacheBackend>,
    ) -> PersistResult<u64> {
        self.invalidation.validate_target(self.record)?;
        let update = UpdateClause::new(
            self.record,
            self.assignments.clone(),
            Some(WhereClause::new(self.condition.clone())),
        );
        let affected = run(conn, &Statement::Update(update), &mut self.stats)?;

        if let Some(cache) = cache {
            self.stats.invalidations += self.invalidation.invalidate(cache);
        }
        Ok(affected)
    }

    fn stats(&self) -> WriteStats {
        self.stats
    }
}

/// DELETE every row matching a condition, then apply an invalidation directive
pub struct DeleteWhere<'a> {
    record: &'static RecordDescriptor,
    condition: Expr,
    invalidation: &'a dyn Invalidation,
    stats: WriteStats,
}

impl<'a> DeleteWhere<'a> {
    pub fn new<T: InvalidatingWhere>(target: &'a T) -> PersistResult<Self> {
        Ok(Self::matching(target.record(), target.condition()?, target))
    }

    pub fn matching(
        record: &'static RecordDescriptor,
        condition: Expr,
        invalidation: &'a dyn Invalidation,
    ) -> Self {
        Self {
            record,
            condition,
            invalidation,
            stats: WriteStats::default(),
        }
    }
}

impl Modifier for DeleteWhere<'_> {
    fn execute(
        &mut self,
        conn: &mut dyn Connection,
        cache: Option<&dyn CacheBackend>,
    ) -> PersistResult<u64> {
        self.invalidation.validate_target(self.record)?;
        let delete = DeleteClause {
            record: self.record,
            where_clause: Some(WhereClause::new(self.condition.clone())),
        };
        let affected = run(conn, &Statement::Delete(delete), &mut self.stats)?;

        if let Some(cache) = cache {
            self.stats.invalidations += self.invalidation.invalidate(cache);
        }
        Ok(affected)
    }

    fn stats(&self) -> WriteStats {
        self.stats
    }
}

pub struct CreateIndex {
    clause: CreateIndexClause,
    stats: WriteStats,
}

impl CreateIndex {
    pub fn new(clause: CreateIndexClause) -> Self {
        Self {
            clause,
            stats: WriteStats::default(),
        }
    }
}

impl Modifier for CreateIndex {
    fn execute(
        &mut self,
        conn: &mut dyn Connection,
        _cache: Option<&dyn CacheBackend>,
    ) -> PersistResult<u64> {
        let affected = run(conn, &Statement::CreateIndex(self.clause.clone()), &mut self.stats)?;
        tracing::info!(
            "[INDEX] Created index {} on {} ({})",
            self.clause.name,
            self.clause.record.name,
            self.clause.fields.join(", ")
        );
        Ok(affected)
    }

    fn stats(&self) -> WriteStats {
        self.stats
    }
}

pub struct DropIndex {
    clause: DropIndexClause,
    stats: WriteStats,
}

impl DropIndex {
    pub fn new(clause: DropIndexClause) -> Self {
        Self {
            clause,
            stats: WriteStats::default(),
        }
    }
}

impl Modifier for DropIndex {
    fn execute(
        &mut self,
        conn: &mut dyn Connection,
        _cache: Option<&dyn CacheBackend>,
    ) -> PersistResult<u64> {
        let affected = run(conn, &Statement::DropIndex(self.clause.clone()), &mut self.stats)?;
        tracing::info!(
            "[INDEX] Dropped index {} on {}",
            self.clause.name,
            self.clause.record.name
        );
        Ok(affected)
    }

    fn stats(&self) -> WriteStats {
        self.stats
    }
}
