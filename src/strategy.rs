//! Caching strategies for collection reads.

use relsql_core::SelectClause;
use serde::{Deserialize, Serialize};

use crate::cache::CacheCategory;
use crate::error::{PersistError, PersistResult};
use crate::operation::require_key_fetch;

/// Strategy requested by the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStrategy {
    /// Run the query as written
    Bypass,
    /// Cache when the record type allows it, bypass otherwise
    #[default]
    BestEffort,
    /// Key-then-fetch with the key list cached briefly
    KeyCacheShortTtl,
    /// Key-then-fetch with the key list cached for longer
    KeyCacheLongTtl,
    /// Key-then-fetch reusing cached records; the key list is not cached
    KeyThenFetch,
    /// Reserved for caching whole results; currently runs directly
    WholeResult,
}

/// How a read actually runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    Direct,
    KeyThenFetch,
    KeyCache(CacheCategory),
}

impl CacheStrategy {
    fn is_key_fetch(self) -> bool {
        matches!(
            self,
            CacheStrategy::KeyCacheShortTtl
                | CacheStrategy::KeyCacheLongTtl
                | CacheStrategy::KeyThenFetch
        )
    }

    /// Pick the execution for `select`.
    ///
    /// Explicitly requesting a key-then-fetch variant for a select that cannot
    /// support it is an error, reported before any SQL runs.
    pub fn resolve(self, select: &SelectClause, caching_enabled: bool) -> PersistResult<Execution> {
        let requested = self;
        let strategy = match require_key_fetch(select) {
            Ok(()) => self,
            Err(e) if self.is_key_fetch() => return Err(e),
            Err(_) if self == CacheStrategy::BestEffort => CacheStrategy::Bypass,
            Err(_) => self,
        };
        let strategy = if caching_enabled {
            strategy
        } else {
            CacheStrategy::Bypass
        };

        let execution = match strategy {
            CacheStrategy::Bypass | CacheStrategy::WholeResult => Execution::Direct,
            CacheStrategy::BestEffort | CacheStrategy::KeyCacheShortTtl => {
                Execution::KeyCache(CacheCategory::ShortTtlKeys)
            }
            CacheStrategy::KeyCacheLongTtl => Execution::KeyCache(CacheCategory::LongTtlKeys),
            CacheStrategy::KeyThenFetch => Execution::KeyThenFetch,
        };
        tracing::debug!(
            "[STRATEGY] {:?} on {} resolved to {:?}",
            requested,
            select.record.name,
            execution
        );
        Ok(execution)
    }
}

impl std::str::FromStr for CacheStrategy {
    type Err = PersistError;

    fn from_str(s: &str) -> PersistResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bypass" => Ok(CacheStrategy::Bypass),
            "best_effort" => Ok(CacheStrategy::BestEffort),
            "key_cache_short_ttl" => Ok(CacheStrategy::KeyCacheShortTtl),
            "key_cache_long_ttl" => Ok(CacheStrategy::KeyCacheLongTtl),
            "key_then_fetch" => Ok(CacheStrategy::KeyThenFetch),
            "whole_result" => Ok(CacheStrategy::WholeResult),
            other => Err(PersistError::configuration(format!(
                "unknown cache strategy '{}'",
                other
            ))),
        }
    }
}
