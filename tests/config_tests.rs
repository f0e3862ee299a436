// ==================== Configuration Tests ====================

mod common;

use relcache::config::{CONFIG_FILE_NAME, ENV_MAX_BATCH_SIZE};
use relcache::relsql_core::{Dialect, DialectKind, SelectClause};
use relcache::{CacheStrategy, Connection, Repository, RepositoryConfig};
use std::fs;
use tempfile::TempDir;

use common::{create_seeded_repository, User, USERS};

#[test]
fn test_load_from_directory_with_env_override() {
    let tmp_dir = TempDir::new().unwrap();
    fs::write(
        tmp_dir.path().join(CONFIG_FILE_NAME),
        r#"
dialect = "postgres"
max_batch_size = 100

[cache]
max_entries_per_bin = 50
short_ttl_secs = 5
"#,
    )
    .unwrap();
    fs::write(
        tmp_dir.path().join(".env"),
        format!("{}=25\n", ENV_MAX_BATCH_SIZE),
    )
    .unwrap();

    let config = RepositoryConfig::load(tmp_dir.path()).unwrap();
    assert_eq!(config.dialect, DialectKind::Postgres);
    assert_eq!(config.max_batch_size, Some(25));
    assert!(config.cache.enabled);
    assert_eq!(config.cache.max_entries_per_bin, 50);
    assert_eq!(config.cache.short_ttl_secs, 5);
    assert_eq!(config.cache.long_ttl_secs, 600);
}

#[test]
fn test_missing_config_file() {
    let tmp_dir = TempDir::new().unwrap();
    let err = RepositoryConfig::load(tmp_dir.path()).unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn test_invalid_config_file() {
    let tmp_dir = TempDir::new().unwrap();
    fs::write(tmp_dir.path().join(CONFIG_FILE_NAME), "dialect = \"oracle\"\n").unwrap();
    assert!(RepositoryConfig::load(tmp_dir.path()).unwrap_err().is_configuration());

    fs::write(tmp_dir.path().join(CONFIG_FILE_NAME), "max_batch_size = 0\n").unwrap();
    assert!(RepositoryConfig::load(tmp_dir.path()).unwrap_err().is_configuration());
}

#[test]
fn test_connection_dialect_wins() {
    let config = RepositoryConfig {
        dialect: DialectKind::MySql,
        max_batch_size: Some(3),
        ..RepositoryConfig::default()
    };
    let mut repo = create_seeded_repository(10, config);
    assert_eq!(repo.connection().dialect().name(), "sqlite");

    // rendered and run as SQLite despite the configured dialect
    let users: Vec<User> = repo
        .find(&SelectClause::new(&USERS), CacheStrategy::KeyThenFetch)
        .unwrap();
    assert_eq!(users.len(), 10);
    // key query plus ceil(10 / 3) fetches
    assert_eq!(repo.connection().queries.len(), 1 + 4);
}

#[test]
fn test_cache_disabled_in_config() {
    let config = RepositoryConfig::from_toml_str("[cache]\nenabled = false\n").unwrap();
    let repo = Repository::new(common::create_test_connection(), config);
    assert!(repo.cache().is_none());
}
