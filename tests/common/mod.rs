//! Common test utilities for repository tests
//!
//! Provides shared helpers for:
//! - Record fixtures (generated key, composite key, computed record)
//! - In-memory and on-disk SQLite databases with the fixture schema
//! - A connection wrapper counting the statements it runs
#![allow(dead_code)]

use relcache::relsql_core::{
    CompiledStatement, Dialect, FieldDescriptor, Record, RecordDescriptor, RecordSource, SqlError,
    SqlResult, Value,
};
use relcache::{
    CacheBackend, Connection, PersistResult, Repository, RepositoryConfig, Row, SqliteConnection,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

pub static USERS: RecordDescriptor = RecordDescriptor {
    name: "User",
    source: RecordSource::Table("users"),
    fields: &[
        FieldDescriptor::generated("id", "id"),
        FieldDescriptor::persisted("name", "name"),
        FieldDescriptor::persisted("age", "age"),
        FieldDescriptor::persisted("email", "email"),
    ],
    primary_key: &["id"],
};

pub static MEMBERS: RecordDescriptor = RecordDescriptor {
    name: "Member",
    source: RecordSource::Table("members"),
    fields: &[
        FieldDescriptor::persisted("group_id", "group_id"),
        FieldDescriptor::persisted("kind", "kind"),
        FieldDescriptor::persisted("role", "role_name"),
    ],
    primary_key: &["group_id", "kind"],
};

pub static ORDERS: RecordDescriptor = RecordDescriptor {
    name: "Order",
    source: RecordSource::Table("orders"),
    fields: &[
        FieldDescriptor::generated("id", "id"),
        FieldDescriptor::persisted("user_id", "user_id"),
        FieldDescriptor::persisted("total", "total"),
    ],
    primary_key: &["id"],
};

/// Per-user order totals; no table, every field supplied by the query
pub static USER_STATS: RecordDescriptor = RecordDescriptor {
    name: "UserStats",
    source: RecordSource::Computed,
    fields: &[
        FieldDescriptor::computed("user_id", None, true),
        FieldDescriptor::computed("order_count", None, true),
    ],
    primary_key: &[],
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub age: i64,
    pub email: Option<String>,
}

impl User {
    pub fn new(name: &str, age: i64) -> Self {
        Self {
            name: name.to_string(),
            age,
            ..Self::default()
        }
    }
}

impl Record for User {
    fn descriptor() -> &'static RecordDescriptor {
        &USERS
    }

    fn get(&self, field: &str) -> SqlResult<Value> {
        match field {
            "id" => Ok(self.id.into()),
            "name" => Ok(self.name.clone().into()),
            "age" => Ok(self.age.into()),
            "email" => Ok(self.email.clone().into()),
            other => Err(SqlError::unknown_field("User", other)),
        }
    }

    fn set(&mut self, field: &str, value: Value) -> SqlResult<()> {
        match field {
            "id" => self.id = value.try_into()?,
            "name" => self.name = value.try_into()?,
            "age" => self.age = value.try_into()?,
            "email" => self.email = value.optional()?,
            other => return Err(SqlError::unknown_field("User", other)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Member {
    pub group_id: i64,
    pub kind: i64,
    pub role: String,
}

impl Record for Member {
    fn descriptor() -> &'static RecordDescriptor {
        &MEMBERS
    }

    fn get(&self, field: &str) -> SqlResult<Value> {
        match field {
            "group_id" => Ok(self.group_id.into()),
            "kind" => Ok(self.kind.into()),
            "role" => Ok(self.role.clone().into()),
            other => Err(SqlError::unknown_field("Member", other)),
        }
    }

    fn set(&mut self, field: &str, value: Value) -> SqlResult<()> {
        match field {
            "group_id" => self.group_id = value.try_into()?,
            "kind" => self.kind = value.try_into()?,
            "role" => self.role = value.try_into()?,
            other => return Err(SqlError::unknown_field("Member", other)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserStats {
    pub user_id: i64,
    pub order_count: i64,
}

impl Record for UserStats {
    fn descriptor() -> &'static RecordDescriptor {
        &USER_STATS
    }

    fn get(&self, field: &str) -> SqlResult<Value> {
        match field {
            "user_id" => Ok(self.user_id.into()),
            "order_count" => Ok(self.order_count.into()),
            other => Err(SqlError::unknown_field("UserStats", other)),
        }
    }

    fn set(&mut self, field: &str, value: Value) -> SqlResult<()> {
        match field {
            "user_id" => self.user_id = value.try_into()?,
            "order_count" => self.order_count = value.try_into()?,
            other => return Err(SqlError::unknown_field("UserStats", other)),
        }
        Ok(())
    }
}

pub const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        age INTEGER NOT NULL,
        email TEXT
    );
    CREATE TABLE IF NOT EXISTS members (
        group_id INTEGER NOT NULL,
        kind INTEGER NOT NULL,
        role_name TEXT NOT NULL,
        PRIMARY KEY (group_id, kind)
    );
    CREATE TABLE IF NOT EXISTS orders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        total INTEGER NOT NULL
    );
";

/// Wraps a connection and records every statement it runs
pub struct CountingConnection<C: Connection> {
    inner: C,
    pub queries: Vec<String>,
    pub executes: Vec<String>,
}

impl<C: Connection> CountingConnection<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            queries: Vec::new(),
            executes: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.queries.clear();
        self.executes.clear();
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn statement_count(&self) -> usize {
        self.queries.len() + self.executes.len()
    }
}

impl<C: Connection> Connection for CountingConnection<C> {
    fn dialect(&self) -> &dyn Dialect {
        self.inner.dialect()
    }

    fn query(&mut self, statement: &CompiledStatement) -> PersistResult<Vec<Row>> {
        self.queries.push(statement.sql.clone());
        self.inner.query(statement)
    }

    fn execute(&mut self, statement: &CompiledStatement) -> PersistResult<u64> {
        self.executes.push(statement.sql.clone());
        self.inner.execute(statement)
    }

    fn last_generated_key(&mut self) -> PersistResult<Option<Value>> {
        self.inner.last_generated_key()
    }
}

pub type TestRepository = Repository<CountingConnection<SqliteConnection>>;

pub fn create_test_connection() -> SqliteConnection {
    let conn = SqliteConnection::open_in_memory().expect("Failed to open in-memory database");
    conn.execute_batch(SCHEMA).expect("Failed to create schema");
    conn
}

pub fn create_test_repository() -> TestRepository {
    create_repository_with(RepositoryConfig::default())
}

pub fn create_repository_with(config: RepositoryConfig) -> TestRepository {
    Repository::new(CountingConnection::new(create_test_connection()), config)
}

/// On-disk database that lives as long as the returned directory
pub fn create_file_repository() -> (TestRepository, TempDir) {
    let tmp_dir = TempDir::new().expect("Failed to create temp dir");
    let conn = SqliteConnection::open(tmp_dir.path().join("test.db"))
        .expect("Failed to open database file");
    conn.execute_batch(SCHEMA).expect("Failed to create schema");
    let repo = Repository::new(CountingConnection::new(conn), RepositoryConfig::default());
    (repo, tmp_dir)
}

/// Repository on the database file at `path`, sharing `cache` with other repositories
pub fn create_shared_repository(path: &Path, cache: Arc<dyn CacheBackend>) -> TestRepository {
    let conn = SqliteConnection::open(path).expect("Failed to open database file");
    conn.execute_batch(SCHEMA).expect("Failed to create schema");
    Repository::with_cache(CountingConnection::new(conn), RepositoryConfig::default(), cache)
}

/// Repository over `count` users inserted with plain SQL, so nothing is cached yet
pub fn create_seeded_repository(count: i64, config: RepositoryConfig) -> TestRepository {
    let conn = create_test_connection();
    let values: Vec<String> = (1..=count)
        .map(|n| format!("('user-{}', {})", n, n))
        .collect();
    if !values.is_empty() {
        conn.execute_batch(&format!(
            "INSERT INTO users (name, age) VALUES {};",
            values.join(", ")
        ))
        .expect("Failed to seed users");
    }
    Repository::new(CountingConnection::new(conn), config)
}

/// Insert `count` users named `user-<n>` with age `n`
pub fn seed_users(repo: &mut TestRepository, count: i64) -> Vec<User> {
    let mut users = Vec::new();
    for n in 1..=count {
        let mut user = User::new(&format!("user-{}", n), n);
        repo.insert(&mut user).expect("Failed to insert user");
        users.push(user);
    }
    repo.connection().reset();
    users
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
