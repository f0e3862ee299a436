//! relcache - cache-consistent relational persistence.
//!
//! Typed queries are compiled per SQL dialect by [`relsql_core`] and executed
//! through a [`Repository`], which serves records from a pluggable cache and
//! evicts cached rows after every successful write.
//!
//! # Example
//!
//! ```rust,ignore
//! let conn = SqliteConnection::open("app.db")?;
//! let mut repo = Repository::new(conn, RepositoryConfig::default());
//!
//! let adults = SelectClause::new(User::descriptor())
//!     .filter(Expr::col(User::descriptor(), "age").ge(Expr::bound(18)))?;
//! let users: Vec<User> = repo.find(&adults, CacheStrategy::BestEffort)?;
//! ```

pub mod cache;
pub mod config;
pub mod connection;
pub mod error;
pub mod invalidation;
pub mod key;
pub mod keyset;
pub mod operation;
pub mod repository;
pub mod sqlite;
pub mod strategy;

pub use relsql_core;

pub use cache::{CacheBackend, CacheCategory, CacheKey, CacheValue, MemoryCache};
pub use config::{CacheConfig, RepositoryConfig};
pub use connection::{Connection, Row};
pub use error::{PersistError, PersistResult};
pub use invalidation::{AllRecords, InvalidatingWhere, Invalidation};
pub use key::Key;
pub use keyset::KeySet;
pub use operation::{Modifier, Query, ReadStats, WriteStats};
pub use repository::Repository;
pub use sqlite::SqliteConnection;
pub use strategy::{CacheStrategy, Execution};
