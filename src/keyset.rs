//! Sets of primary keys, usable as a WHERE condition and as a batch
//! invalidation directive.
//!
//! The representation is chosen once at construction:
//!
//! - no keys: a condition that matches nothing
//! - single-column key: `col IN (...)`, members kept in input order
//! - composite key: an OR of per-key ANDs, members kept in a hash set

use relsql_core::{Expr, Record, RecordDescriptor, SelectClause, Value};
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;

use crate::cache::CacheBackend;
use crate::error::{PersistError, PersistResult};
use crate::invalidation::{evict_key_lists, InvalidatingWhere, Invalidation};
use crate::key::{key_condition, require_primary_key, Key};

enum Members {
    Empty,
    Single(Vec<Value>),
    Multi(HashSet<Vec<Value>>),
}

pub struct KeySet<R: Record> {
    members: Members,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> KeySet<R> {
    /// Duplicate keys collapse into one member.
    pub fn new<I>(keys: I) -> Self
    where
        I: IntoIterator<Item = Key<R>>,
    {
        let composite = R::descriptor().primary_key.len() > 1;
        let members = if composite {
            let set: HashSet<Vec<Value>> = keys.into_iter().map(Key::into_values).collect();
            if set.is_empty() {
                Members::Empty
            } else {
                Members::Multi(set)
            }
        } else {
            let mut seen = HashSet::new();
            let values: Vec<Value> = keys
                .into_iter()
                .filter_map(|key| key.into_values().into_iter().next())
                .filter(|value| seen.insert(value.clone()))
                .collect();
            if values.is_empty() {
                Members::Empty
            } else {
                Members::Single(values)
            }
        };
        Self {
            members,
            _record: PhantomData,
        }
    }

    /// Build from raw key tuples, as returned by a key-only query
    pub fn from_values(tuples: Vec<Vec<Value>>) -> PersistResult<Self> {
        require_primary_key(R::descriptor())?;
        let keys = tuples
            .into_iter()
            .map(Key::new)
            .collect::<PersistResult<Vec<Key<R>>>>()?;
        Ok(Self::new(keys))
    }

    pub fn empty() -> Self {
        Self {
            members: Members::Empty,
            _record: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        match &self.members {
            Members::Empty => 0,
            Members::Single(values) => values.len(),
            Members::Multi(set) => set.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One key per member; input order for single-column keys, unspecified otherwise
    pub fn iter(&self) -> impl Iterator<Item = Key<R>> + '_ {
        let tuples: Box<dyn Iterator<Item = Vec<Value>> + '_> = match &self.members {
            Members::Empty => Box::new(std::iter::empty()),
            Members::Single(values) => Box::new(values.iter().map(|v| vec![v.clone()])),
            Members::Multi(set) => Box::new(set.iter().cloned()),
        };
        tuples.filter_map(|values| Key::new(values).ok())
    }

    pub fn contains(&self, key: &Key<R>) -> bool {
        match &self.members {
            Members::Empty => false,
            Members::Single(values) => key.values().first().is_some_and(|v| values.contains(v)),
            Members::Multi(set) => set.contains(key.values()),
        }
    }

    /// Split into sets of at most `max` members each
    pub fn chunks(&self, max: usize) -> Vec<KeySet<R>> {
        let keys: Vec<Key<R>> = self.iter().collect();
        keys.chunks(max.max(1))
            .map(|chunk| KeySet::new(chunk.iter().cloned()))
            .collect()
    }

    /// WHERE condition matching exactly the member keys
    pub fn as_condition(&self) -> Expr {
        let descriptor = R::descriptor();
        match &self.members {
            Members::Empty => Expr::any(Vec::new()),
            Members::Single(values) => {
                Expr::col(descriptor, descriptor.primary_key[0]).in_values(values.clone())
            }
            Members::Multi(set) => {
                Expr::any(set.iter().map(|values| key_condition(descriptor, values)).collect())
            }
        }
    }

    /// SELECT of every member row
    pub fn select(&self) -> PersistResult<SelectClause> {
        Ok(SelectClause::new(R::descriptor()).filter(self.as_condition())?)
    }
}

impl<R: Record> Default for KeySet<R> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<R: Record> FromIterator<Key<R>> for KeySet<R> {
    fn from_iter<I: IntoIterator<Item = Key<R>>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl<R: Record> fmt::Debug for KeySet<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeySet<{}>({} keys)", R::descriptor().name, self.len())
    }
}

impl<R: Record> Invalidation for KeySet<R> {
    fn record(&self) -> &'static RecordDescriptor {
        R::descriptor()
    }

    fn invalidate(&self, cache: &dyn CacheBackend) -> u64 {
        let name = R::descriptor().name;
        let mut evicted = 0;
        for key in self.iter() {
            cache.remove(name, key.values());
            evicted += 1;
        }
        tracing::debug!("[CACHE] Evicted {:?}", self);
        evicted + evict_key_lists(R::descriptor(), cache)
    }
}

impl<R: Record> InvalidatingWhere for KeySet<R> {
    fn condition(&self) -> PersistResult<Expr> {
        if !R::descriptor().has_primary_key() {
            return Err(PersistError::configuration(format!(
                "{} has no primary key",
                R::descriptor().name
            )));
        }
        Ok(self.as_condition())
    }
}
