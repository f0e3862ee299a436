// ==================== Strategy Resolution Tests ====================

mod common;

use common::{create_test_repository, seed_users, User, UserStats, ORDERS, USERS, USER_STATS};
use relcache::relsql_core::{
    Expr, FieldDefinition, FieldOverride, GroupByClause, OrderByClause, SelectClause, SelectPart,
};
use relcache::CacheStrategy;

fn stats_select() -> SelectClause {
    SelectClause::from_parts(
        &USER_STATS,
        vec![
            FieldDefinition {
                field: "user_id",
                expr: Expr::col(&ORDERS, "user_id"),
            }
            .into(),
            FieldDefinition {
                field: "order_count",
                expr: Expr::count_all(),
            }
            .into(),
            SelectPart::GroupBy(GroupByClause {
                expressions: vec![Expr::col(&ORDERS, "user_id")],
            }),
            OrderByClause::asc(Expr::col(&ORDERS, "user_id")).into(),
        ],
    )
    .unwrap()
}

fn seed_orders(repo: &mut common::TestRepository) {
    repo.connection()
        .inner()
        .execute_batch(
            "INSERT INTO orders (user_id, total) VALUES (1, 10), (1, 20), (2, 5), (3, 7), (3, 8), (3, 9);",
        )
        .unwrap();
}

#[test]
fn test_key_fetch_on_computed_record_fails_before_sql() {
    let mut repo = create_test_repository();
    for strategy in [
        CacheStrategy::KeyCacheShortTtl,
        CacheStrategy::KeyCacheLongTtl,
        CacheStrategy::KeyThenFetch,
    ] {
        let err = repo.find::<UserStats>(&stats_select(), strategy).unwrap_err();
        assert!(err.is_configuration(), "{}", err);
    }
    assert_eq!(repo.connection().statement_count(), 0);
}

#[test]
fn test_best_effort_on_computed_record_runs_directly() {
    let mut repo = create_test_repository();
    seed_orders(&mut repo);

    let stats: Vec<UserStats> = repo.find(&stats_select(), CacheStrategy::BestEffort).unwrap();
    assert_eq!(
        stats,
        vec![
            UserStats { user_id: 1, order_count: 2 },
            UserStats { user_id: 2, order_count: 1 },
            UserStats { user_id: 3, order_count: 3 },
        ]
    );
    assert_eq!(repo.connection().queries.len(), 1);
    assert_eq!(repo.last_read_stats().uncached_records, 3);
}

#[test]
fn test_override_select_downgrades_best_effort() {
    let mut repo = create_test_repository();
    seed_users(&mut repo, 3);

    let select = SelectClause::new(&USERS)
        .with(FieldOverride {
            field: "age",
            expr: Expr::literal(42),
        })
        .unwrap();
    let users: Vec<User> = repo.find(&select, CacheStrategy::BestEffort).unwrap();
    assert!(users.iter().all(|u| u.age == 42));
    assert_eq!(repo.connection().queries.len(), 1);

    let err = repo
        .find::<User>(&select, CacheStrategy::KeyThenFetch)
        .unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn test_select_for_other_record_is_rejected() {
    let mut repo = create_test_repository();
    let err = repo
        .find::<User>(&SelectClause::new(&ORDERS), CacheStrategy::Bypass)
        .unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(repo.connection().statement_count(), 0);
}
