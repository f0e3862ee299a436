//! Cache invalidation directives.
//!
//! A modifier carries one directive describing which cached rows its SQL may
//! change. The directive is validated before the statement runs and applied
//! only after the statement succeeded.

use relsql_core::{Expr, RecordDescriptor};

use crate::cache::{key_list_bin, CacheBackend};
use crate::error::{PersistError, PersistResult};

pub trait Invalidation {
    /// Record type whose cached rows this directive evicts
    fn record(&self) -> &'static RecordDescriptor;

    /// Check the directive fits a statement against `target`
    fn validate_target(&self, target: &'static RecordDescriptor) -> PersistResult<()> {
        if self.record() != target {
            return Err(PersistError::configuration(format!(
                "invalidation for {} cannot guard a write to {}",
                self.record().name,
                target.name
            )));
        }
        Ok(())
    }

    /// Evict affected entries; returns the number of removals
    fn invalidate(&self, cache: &dyn CacheBackend) -> u64;
}

/// A directive that also describes the affected rows as a SQL condition
pub trait InvalidatingWhere: Invalidation {
    fn condition(&self) -> PersistResult<Expr>;
}

/// Drop every cached key list of `record`
pub(crate) fn evict_key_lists(record: &RecordDescriptor, cache: &dyn CacheBackend) -> u64 {
    let bin = key_list_bin(record);
    let keys = cache.enumerate(&bin);
    for key in &keys {
        cache.remove(&bin, key);
    }
    if !keys.is_empty() {
        tracing::debug!("[CACHE] Evicted {} key lists of {}", keys.len(), record.name);
    }
    keys.len() as u64
}

/// Evicts every cached row and key list of one record type.
///
/// Used by bulk writes whose affected keys are not known up front.
#[derive(Debug, Clone, Copy)]
pub struct AllRecords(pub &'static RecordDescriptor);

impl Invalidation for AllRecords {
    fn record(&self) -> &'static RecordDescriptor {
        self.0
    }

    fn invalidate(&self, cache: &dyn CacheBackend) -> u64 {
        let rows = cache.enumerate(self.0.name);
        for key in &rows {
            cache.remove(self.0.name, key);
        }
        tracing::debug!("[CACHE] Evicted all {} cached {} rows", rows.len(), self.0.name);
        rows.len() as u64 + evict_key_lists(self.0, cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheCategory, CacheValue, MemoryCache};
    use relsql_core::{FieldDescriptor, RecordSource, Value};

    static TAGS: RecordDescriptor = RecordDescriptor {
        name: "Tag",
        source: RecordSource::Table("tags"),
        fields: &[FieldDescriptor::generated("id", "id")],
        primary_key: &["id"],
    };

    static NOTES: RecordDescriptor = RecordDescriptor {
        name: "Note",
        source: RecordSource::Table("notes"),
        fields: &[FieldDescriptor::generated("id", "id")],
        primary_key: &["id"],
    };

    fn seed(cache: &MemoryCache) {
        for id in 1..=3 {
            cache.store(
                CacheCategory::Record,
                "Tag",
                vec![Value::Integer(id)],
                CacheValue::Row(vec![Value::Integer(id)]),
            );
        }
        cache.store(
            CacheCategory::ShortTtlKeys,
            "Tag#keys",
            vec![Value::from("abc")],
            CacheValue::Keys(vec![vec![Value::Integer(1)]]),
        );
        cache.store(
            CacheCategory::Record,
            "Note",
            vec![Value::Integer(1)],
            CacheValue::Row(vec![Value::Integer(1)]),
        );
    }

    #[test]
    fn test_evict_key_lists_only() {
        let cache = MemoryCache::new(10);
        seed(&cache);

        assert_eq!(evict_key_lists(&TAGS, &cache), 1);
        assert!(cache.enumerate("Tag#keys").is_empty());
        assert_eq!(cache.enumerate("Tag").len(), 3);
        assert_eq!(evict_key_lists(&TAGS, &cache), 0);
    }

    #[test]
    fn test_all_records() {
        let cache = MemoryCache::new(10);
        seed(&cache);

        assert_eq!(AllRecords(&TAGS).invalidate(&cache), 4);
        assert!(cache.enumerate("Tag").is_empty());
        assert_eq!(cache.enumerate("Note").len(), 1);
    }

    #[test]
    fn test_validate_target_mismatch() {
        assert!(AllRecords(&TAGS).validate_target(&TAGS).is_ok());
        let err = AllRecords(&TAGS).validate_target(&NOTES).unwrap_err();
        assert!(err.is_configuration());
    }
}
