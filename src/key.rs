//! Primary-key tuples.

use relsql_core::{Expr, Record, RecordDescriptor, SelectClause, Value};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use crate::cache::{CacheBackend, CacheKey};
use crate::error::{PersistError, PersistResult};
use crate::invalidation::{evict_key_lists, InvalidatingWhere, Invalidation};

/// A key is absent when any component is null, or when every component is
/// unset (null or numeric zero). `(0, 5)` is present; `(0)` is not.
pub fn is_absent(values: &[Value]) -> bool {
    values.iter().any(Value::is_null) || values.iter().all(Value::is_unset)
}

/// Primary-key values of `record`, in key order
pub fn key_values<R: Record>(record: &R) -> PersistResult<Vec<Value>> {
    let descriptor = R::descriptor();
    require_primary_key(descriptor)?;
    descriptor
        .primary_key
        .iter()
        .map(|field| record.get(field).map_err(PersistError::from))
        .collect()
}

pub(crate) fn require_primary_key(descriptor: &RecordDescriptor) -> PersistResult<()> {
    if descriptor.has_primary_key() {
        Ok(())
    } else {
        Err(PersistError::configuration(format!(
            "{} has no primary key",
            descriptor.name
        )))
    }
}

/// Exact-match condition on the primary-key columns
pub(crate) fn key_condition(descriptor: &'static RecordDescriptor, values: &[Value]) -> Expr {
    Expr::all(
        descriptor
            .primary_key
            .iter()
            .zip(values)
            .map(|(field, value)| Expr::col(descriptor, *field).eq(Expr::Bound(value.clone())))
            .collect(),
    )
}

/// Bound primary-key values of one `R` row
pub struct Key<R: Record> {
    values: Vec<Value>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> Key<R> {
    pub fn new(values: Vec<Value>) -> PersistResult<Self> {
        let descriptor = R::descriptor();
        require_primary_key(descriptor)?;
        if values.len() != descriptor.primary_key.len() {
            return Err(PersistError::configuration(format!(
                "{} key has {} columns, got {} values",
                descriptor.name,
                descriptor.primary_key.len(),
                values.len()
            )));
        }
        Ok(Self {
            values,
            _record: PhantomData,
        })
    }

    /// Key of an instance; `None` while the key is absent (e.g. not yet generated).
    pub fn of(record: &R) -> PersistResult<Option<Self>> {
        let values = key_values(record)?;
        if is_absent(&values) {
            return Ok(None);
        }
        Self::new(values).map(Some)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn is_absent(&self) -> bool {
        is_absent(&self.values)
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::record(R::descriptor(), self.values.clone())
    }

    /// SELECT of the one row this key identifies
    pub fn select(&self) -> PersistResult<SelectClause> {
        Ok(SelectClause::new(R::descriptor()).filter(key_condition(R::descriptor(), &self.values))?)
    }
}

impl<R: Record> Clone for Key<R> {
    fn clone(&self) -> Self {
        Self {
            values: self.values.clone(),
            _record: PhantomData,
        }
    }
}

impl<R: Record> PartialEq for Key<R> {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl<R: Record> Eq for Key<R> {}

impl<R: Record> Hash for Key<R> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        R::descriptor().name.hash(state);
        self.values.hash(state);
    }
}

impl<R: Record> fmt::Debug for Key<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key<{}>{:?}", R::descriptor().name, self.values)
    }
}

impl<R: Record> Invalidation for Key<R> {
    fn record(&self) -> &'static RecordDescriptor {
        R::descriptor()
    }

    fn invalidate(&self, cache: &dyn CacheBackend) -> u64 {
        cache.remove(R::descriptor().name, &self.values);
        tracing::debug!("[CACHE] Evicted {:?}", self);
        1 + evict_key_lists(R::descriptor(), cache)
    }
}

impl<R: Record> InvalidatingWhere for Key<R> {
    fn condition(&self) -> PersistResult<Expr> {
        Ok(key_condition(R::descriptor(), &self.values))
    }
}
