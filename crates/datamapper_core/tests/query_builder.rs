mod common;

use common::{seeded_users_db, users_schema, RecordingStore};
use datamapper_core::{
    ModelError, Repository, RepositoryConfig, SearchParams, SearchTypes, Sort, SqliteStore, Value,
};

const WITH_PET_COUNT_SQL: &str = "SELECT `users`.`userId` AS `id`, `users`.`name`, \
    COUNT(`pets`.`petId`) AS `petCount` FROM `users` \
    LEFT JOIN `pets` ON `pets`.`userId` = `users`.`userId`";

fn users_repo<'s>(store: &'s SqliteStore<'s>) -> Repository<'s> {
    Repository::try_new(users_schema(), RepositoryConfig::new("main", "users"))
        .unwrap()
        .with_store(store)
        .with_sort(Sort::asc("name"))
}

fn names(repo: &mut Repository<'_>, params: &SearchParams, types: &SearchTypes) -> Vec<String> {
    let mut set = repo.get_set_with_params(params, types).unwrap();
    set.column("name")
        .unwrap()
        .iter()
        .map(Value::to_text)
        .collect()
}

#[test]
fn in_list_with_null_also_matches_null_rows() {
    let conn = seeded_users_db();
    conn.execute_batch("INSERT INTO users (name, age) VALUES (NULL, 50);")
        .unwrap();
    let store = SqliteStore::new(&conn);
    let mut repo = users_repo(&store);

    let params = SearchParams::new().with_list("name", vec!["Zoe".into(), Value::Null]);
    let mut set = repo.get_set_with_params(&params, &SearchTypes::new()).unwrap();
    assert_eq!(set.len(), 2);
    assert_eq!(
        set.column("age").unwrap(),
        vec![Value::Integer(50), Value::Integer(31)]
    );

    let params = SearchParams::new().with_list(
        "name",
        vec!["Zoe".into(), "Marcus".into(), Value::Null],
    );
    let filter = repo
        .build_where_and_having(&params, &SearchTypes::new())
        .unwrap();
    assert_eq!(
        filter.where_sql,
        "(`users`.`name` IN ('Zoe','Marcus') OR `users`.`name` IS NULL)"
    );
    assert_eq!(
        names(&mut repo, &params, &SearchTypes::new()),
        vec!["", "Marcus", "Zoe"]
    );
}

#[test]
fn like_and_comparison_operators_filter_rows() {
    let conn = seeded_users_db();
    let store = SqliteStore::new(&conn);
    let mut repo = users_repo(&store);

    let params = SearchParams::new().with("name", "o");
    let types = SearchTypes::new().with("name", "contains");
    assert_eq!(names(&mut repo, &params, &types), vec!["Donald", "Zoe"]);

    let types = SearchTypes::new().with("name", "ends");
    let params = SearchParams::new().with("name", "e");
    assert_eq!(names(&mut repo, &params, &types), vec!["Zoe"]);

    let params = SearchParams::new().with("age", 31).with("id", 1);
    let types = SearchTypes::new()
        .with("age", "greater or equals")
        .with("id", "greater");
    assert_eq!(names(&mut repo, &params, &types), vec!["Zoe"]);
}

#[test]
fn unknown_search_type_fails_before_any_query() {
    let conn = seeded_users_db();
    let store = RecordingStore::new(&conn);
    let mut repo = Repository::try_new(users_schema(), RepositoryConfig::new("main", "users"))
        .unwrap()
        .with_store(&store);

    let params = SearchParams::new().with("name", "Zoe");
    let types = SearchTypes::new().with("name", "sounds like");
    let err = repo.get_set_with_params(&params, &types).unwrap_err();
    assert!(matches!(err, ModelError::Config(message) if message.contains("sounds like")));
    assert!(store.statements().is_empty());
}

#[test]
fn aggregate_filters_use_having_over_a_custom_select() {
    let conn = seeded_users_db();
    let store = SqliteStore::new(&conn);
    let mut repo = users_repo(&store);

    let params = SearchParams::new().with("petCount", 0).with("age", 18);
    let types = SearchTypes::new()
        .with("petCount", "greater")
        .with("age", "greater");
    let filter = repo.build_where_and_having(&params, &types).unwrap();
    assert_eq!(
        filter.clauses(),
        "WHERE `users`.`age` > :age GROUP BY `users`.`userId` HAVING `petCount` > :petCount"
    );

    let rows = repo
        .get_data_with_params(&params, &types, Some(WITH_PET_COUNT_SQL))
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name"), Some(&Value::from("Marcus")));
    assert_eq!(rows[0].get("petCount"), Some(&Value::Integer(2)));

    let mut set = repo.set_with_rows(rows);
    assert_eq!(set.get(0).unwrap().get_i64("petCount").unwrap(), Some(2));
}

#[test]
fn get_one_with_params_returns_first_match_or_none() {
    let conn = seeded_users_db();
    let store = SqliteStore::new(&conn);
    let mut repo = users_repo(&store);

    let found = repo
        .get_one_with_params(
            &SearchParams::new().with("handsome", "y"),
            &SearchTypes::new(),
        )
        .unwrap()
        .unwrap();
    assert_eq!(found.get_str("name").unwrap(), Some("Marcus"));
    assert_eq!(found.get_bool("handsome").unwrap(), Some(true));

    let missing = repo
        .get_one_with_params(&SearchParams::new().with("name", "Nobody"), &SearchTypes::new())
        .unwrap();
    assert!(missing.is_none());
}

#[test]
fn boolean_filters_compare_against_stored_flags() {
    let conn = seeded_users_db();
    let store = SqliteStore::new(&conn);
    let mut repo = users_repo(&store);
    let types = SearchTypes::new();

    let filter = repo
        .build_where_and_having(&SearchParams::new().with("handsome", true), &types)
        .unwrap();
    assert_eq!(filter.where_sql, "`users`.`handsome` = :handsome");
    assert_eq!(
        filter.params,
        vec![(":handsome".to_string(), Value::from("y"))]
    );

    let params = SearchParams::new().with("handsome", true);
    assert_eq!(names(&mut repo, &params, &types), vec!["Marcus"]);

    let params = SearchParams::new().with_list("handsome", [false, true]);
    assert_eq!(
        names(&mut repo, &params, &types),
        vec!["Donald", "Marcus", "Zoe"]
    );

    let params = SearchParams::new().with("handsome", false);
    assert_eq!(names(&mut repo, &params, &types), vec!["Donald", "Zoe"]);
}
