//! Cache addressing and the backend interface.
//!
//! Record rows live in a bin named after their record type and are keyed by
//! primary-key values. Key lists produced by key-cache reads live in the
//! `"<record>#keys"` bin, keyed by a hash of the key query and its parameters.

use relsql_core::{CompiledStatement, RecordDescriptor, Value};
use std::hash::{Hash, Hasher};

pub mod memory;

pub use memory::{MemoryCache, MemoryCacheStats};

/// Partition of the cache key space; backends may give each its own expiry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheCategory {
    Record,
    ShortTtlKeys,
    LongTtlKeys,
    WholeResult,
}

/// A cached entry
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    /// Every field of one record, in descriptor order
    Row(Vec<Value>),
    /// Primary-key tuples of a query result, in result order
    Keys(Vec<Vec<Value>>),
}

/// Address of one cached entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub bin: String,
    pub key: Vec<Value>,
}

impl CacheKey {
    pub fn record(record: &RecordDescriptor, key: Vec<Value>) -> Self {
        Self {
            bin: record.name.to_string(),
            key,
        }
    }

    /// Key-list entry of a key query
    pub fn key_list(record: &RecordDescriptor, statement: &CompiledStatement) -> Self {
        Self {
            bin: key_list_bin(record),
            key: vec![Value::Text(hash_statement(statement))],
        }
    }

    pub fn lookup(&self, cache: &dyn CacheBackend) -> Option<CacheValue> {
        cache.lookup(&self.bin, &self.key)
    }

    pub fn remove(&self, cache: &dyn CacheBackend) {
        cache.remove(&self.bin, &self.key)
    }
}

pub fn key_list_bin(record: &RecordDescriptor) -> String {
    format!("{}#keys", record.name)
}

/// Stable hash of SQL text plus parameters
pub fn hash_statement(statement: &CompiledStatement) -> String {
    let mut hasher = seahash::SeaHasher::new();
    statement.sql.hash(&mut hasher);
    statement.params().hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Externally supplied, thread-safe cache
pub trait CacheBackend: Send + Sync {
    fn lookup(&self, bin: &str, key: &[Value]) -> Option<CacheValue>;

    fn store(&self, category: CacheCategory, bin: &str, key: Vec<Value>, value: CacheValue);

    fn remove(&self, bin: &str, key: &[Value]);

    /// Keys currently stored in `bin`
    fn enumerate(&self, bin: &str) -> Vec<Vec<Value>>;

    fn shutdown(&self);
}
