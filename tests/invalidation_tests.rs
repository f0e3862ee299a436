// ==================== Cache Invalidation Tests ====================

mod common;

use common::{
    create_seeded_repository, create_shared_repository, create_test_repository, seed_users, User,
    USERS,
};
use relcache::relsql_core::{Assignment, Expr, SelectClause, Value};
use relcache::{
    AllRecords, CacheBackend, CacheConfig, CacheStrategy, Key, KeySet, MemoryCache,
    RepositoryConfig,
};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn user_key(id: i64) -> Key<User> {
    Key::new(vec![Value::Integer(id)]).unwrap()
}

fn warm(repo: &mut common::TestRepository) -> Vec<User> {
    repo.find(&SelectClause::new(&USERS), CacheStrategy::BestEffort)
        .unwrap()
}

#[test]
fn test_failed_insert_keeps_cache() {
    let mut repo = create_test_repository();
    seed_users(&mut repo, 3);
    warm(&mut repo);
    let cache = repo.cache().unwrap().clone();
    assert_eq!(cache.enumerate("User#keys").len(), 1);

    let mut duplicate = User::new("user-1", 50);
    let err = repo.insert(&mut duplicate).unwrap_err();
    assert!(err.is_constraint_violation());
    assert_eq!(duplicate.id, 0);

    // nothing evicted, nothing stored
    assert_eq!(cache.enumerate("User#keys").len(), 1);
    assert_eq!(cache.enumerate("User").len(), 3);
    assert_eq!(repo.last_write_stats().invalidations, 0);
}

#[test]
fn test_failed_update_keeps_cache() {
    let mut repo = create_test_repository();
    let mut users = seed_users(&mut repo, 2);
    let cache = repo.cache().unwrap().clone();

    users[1].name = "user-1".to_string();
    assert!(repo.update(&users[1]).unwrap_err().is_constraint_violation());
    assert!(cache.lookup("User", &[Value::Integer(users[1].id)]).is_some());

    let cached = repo.get(&user_key(users[1].id), CacheStrategy::BestEffort).unwrap();
    assert_eq!(cached.unwrap().name, "user-2");
}

#[test]
fn test_update_where_keyset_evicts_members_only() {
    let mut repo = create_test_repository();
    seed_users(&mut repo, 5);
    warm(&mut repo);
    let cache = repo.cache().unwrap().clone();

    let targets: KeySet<User> = [user_key(2), user_key(4)].into_iter().collect();
    let affected = repo
        .update_where(vec![Assignment::new("age", Expr::bound(0))], &targets)
        .unwrap();
    assert_eq!(affected, 2);
    assert_eq!(repo.last_write_stats().invalidations, 3);

    let mut remaining: Vec<i64> = cache
        .enumerate("User")
        .into_iter()
        .filter_map(|k| k[0].as_i64())
        .collect();
    remaining.sort_unstable();
    assert_eq!(remaining, vec![1, 3, 5]);
    assert!(cache.enumerate("User#keys").is_empty());

    let users = warm(&mut repo);
    let ages: Vec<i64> = users.iter().map(|u| u.age).collect();
    assert_eq!(ages, vec![1, 0, 3, 0, 5]);
}

#[test]
fn test_update_matching_with_all_records() {
    let mut repo = create_test_repository();
    seed_users(&mut repo, 4);
    warm(&mut repo);

    let affected = repo
        .update_matching(
            &USERS,
            vec![Assignment::new("email", Expr::bound("old@example.com"))],
            Expr::col(&USERS, "age").ge(Expr::bound(3)),
            &AllRecords(&USERS),
        )
        .unwrap();
    assert_eq!(affected, 2);
    assert!(repo.cache().unwrap().enumerate("User").is_empty());

    let users = warm(&mut repo);
    let emails: Vec<Option<&str>> = users.iter().map(|u| u.email.as_deref()).collect();
    assert_eq!(
        emails,
        vec![None, None, Some("old@example.com"), Some("old@example.com")]
    );
}

#[test]
fn test_delete_where_keyset() {
    let mut repo = create_seeded_repository(10, RepositoryConfig::default());
    warm(&mut repo);

    let doomed: KeySet<User> = (1..=3).map(user_key).collect();
    assert_eq!(repo.delete_where(&doomed).unwrap(), 3);

    for key in doomed.iter() {
        assert_eq!(repo.get(&key, CacheStrategy::BestEffort).unwrap(), None);
    }
    assert_eq!(warm(&mut repo).len(), 7);
}

#[test]
fn test_empty_keyset_deletes_nothing() {
    let mut repo = create_seeded_repository(3, RepositoryConfig::default());
    let nothing: KeySet<User> = KeySet::empty();
    assert_eq!(repo.delete_where(&nothing).unwrap(), 0);
    assert_eq!(repo.count::<User>(&SelectClause::new(&USERS)).unwrap(), 3);
}

#[test]
fn test_write_without_valid_target_runs_no_sql() {
    let mut repo = create_test_repository();
    seed_users(&mut repo, 1);

    let err = repo
        .update_matching(
            &USERS,
            vec![Assignment::new("age", Expr::bound(1))],
            Expr::col(&USERS, "id").eq(Expr::bound(1)),
            &AllRecords(&common::MEMBERS),
        )
        .unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(repo.connection().statement_count(), 0);
}

// ==================== Shared Cache ====================

fn shared_cache() -> Arc<MemoryCache> {
    Arc::new(MemoryCache::with_config(&CacheConfig::default()))
}

#[test]
fn test_writes_through_one_repository_evict_for_another() {
    let tmp_dir = TempDir::new().unwrap();
    let path = tmp_dir.path().join("shared.db");
    let cache = shared_cache();
    let mut reader = create_shared_repository(&path, cache.clone());
    let mut writer = create_shared_repository(&path, cache.clone());

    let mut users = seed_users(&mut writer, 5);
    let all = SelectClause::new(&USERS);

    // rows the writer inserted are already visible to the reader's cache
    assert!(reader.get(&user_key(2), CacheStrategy::BestEffort).unwrap().is_some());
    assert_eq!(reader.connection().statement_count(), 0);
    let warmed: Vec<User> = reader.find(&all, CacheStrategy::KeyThenFetch).unwrap();
    assert_eq!(warmed, users);
    assert_eq!(reader.last_read_stats().cached_records, 5);

    users[1].age = 77;
    writer.update(&users[1]).unwrap();
    let updated = reader.get(&user_key(2), CacheStrategy::BestEffort).unwrap();
    assert_eq!(updated.unwrap().age, 77);

    writer.delete(&user_key(3)).unwrap();
    assert_eq!(reader.get(&user_key(3), CacheStrategy::BestEffort).unwrap(), None);
    let remaining: Vec<User> = reader.find(&all, CacheStrategy::KeyThenFetch).unwrap();
    assert_eq!(
        remaining.iter().map(|u| u.id).collect::<Vec<_>>(),
        vec![1, 2, 4, 5]
    );
    assert_eq!(remaining[1].age, 77);
}

#[test]
fn test_shared_cache_across_threads() {
    let tmp_dir = TempDir::new().unwrap();
    let path = tmp_dir.path().join("threads.db");
    let cache = shared_cache();
    let mut writer = create_shared_repository(&path, cache.clone());
    let mut users = seed_users(&mut writer, 10);

    let (mut writer, mut readers) = thread::scope(|scope| {
        let readers: Vec<_> = (0..3)
            .map(|_| {
                let path = &path;
                let cache = cache.clone();
                scope.spawn(move || {
                    let mut repo = create_shared_repository(path, cache);
                    for round in 0..50 {
                        let id = round % 10 + 1;
                        let user = repo
                            .get(&user_key(id), CacheStrategy::BestEffort)
                            .unwrap()
                            .unwrap();
                        assert_eq!(user.name, format!("user-{}", id));
                    }
                    repo
                })
            })
            .collect();

        let writer = scope.spawn(move || {
            for round in 0..20 {
                let user = &mut users[round % 10];
                user.age += 100;
                writer.update(&*user).unwrap();
            }
            writer
        });

        (
            writer.join().unwrap(),
            readers
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect::<Vec<_>>(),
        )
    });

    // a write after every reader cached its rows is seen by all of them
    let mut last = writer
        .get(&user_key(10), CacheStrategy::Bypass)
        .unwrap()
        .unwrap();
    last.age = 5000;
    writer.update(&last).unwrap();
    for reader in &mut readers {
        let user = reader.get(&user_key(10), CacheStrategy::BestEffort).unwrap();
        assert_eq!(user.unwrap().age, 5000);
    }
}
