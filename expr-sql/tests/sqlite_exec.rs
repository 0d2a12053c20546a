//! Generated WHERE clauses executed against an in-memory `SQLite` database.
//!
//! The other tests pin SQL text; these check that the text and the
//! parameter list actually agree when a real engine binds them.

use expr_sql::{CachedExpression, Config, Expr, Query, QueryResult, SqlContext, Value, predicate};
use rusqlite::{Connection, params_from_iter, types::Value as SqlValue};

const MODELS: &str = r#"
dialect = "sqlite"

[models.Document]
id = { table = "doc", column = "id" }
name = { table = "doc", column = "name" }
published = { table = "doc", column = "published" }
level = { table = "doc", column = "level" }
path = { table = "doc", column = "path" }
parent_id = { table = "doc", column = "parentId" }
"#;

fn setup() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        r"
        CREATE TABLE doc (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            published INTEGER NOT NULL,
            level INTEGER NOT NULL,
            path TEXT NOT NULL,
            parentId INTEGER
        );
        INSERT INTO doc VALUES (1, 'Home', 1, 1, '-1,1', NULL);
        INSERT INTO doc VALUES (2, 'News', 1, 2, '-1,1,2', 1);
        INSERT INTO doc VALUES (3, 'About', 0, 2, '-1,1,3', 1);
        INSERT INTO doc VALUES (4, 'Archive', 1, 3, '-1,1,2,4', 2);
        INSERT INTO doc VALUES (5, 'home-old', 0, 1, '-1,5', NULL);
        ",
    )
    .unwrap();
    conn
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(x) => SqlValue::Real(*x),
        Value::String(s) => SqlValue::Text(s.clone()),
        other => panic!("not a scalar parameter: {other:?}"),
    }
}

fn ids(conn: &Connection, result: &QueryResult) -> Vec<i64> {
    let sql = format!("SELECT id FROM doc {} ORDER BY id", result.sql);
    let mut stmt = conn.prepare(&sql).unwrap();
    stmt.query_map(params_from_iter(result.params.iter().map(to_sql)), |row| {
        row.get::<_, i64>(0)
    })
    .unwrap()
    .collect::<Result<Vec<_>, _>>()
    .unwrap()
}

/// Run `f` against a fresh Document query and return the matching ids.
fn select<F>(f: F) -> Vec<i64>
where
    F: for<'a> FnOnce(expr_sql::ModelQuery<'a>) -> expr_sql::ModelQuery<'a>,
{
    let config = Config::from_toml_str(MODELS).unwrap();
    let ctx = config.context().unwrap();
    let fields = config.field_map().unwrap();
    let result = f(Query::for_model(&ctx, "Document", &fields)).build();
    ids(&setup(), &result)
}

#[test]
fn test_flag_and_range() {
    let found = select(|q| q.filter(&predicate!(|x| x.published && x.level > 1)).unwrap());
    assert_eq!(found, vec![2, 4]);
}

#[test]
fn test_negation() {
    let found = select(|q| q.filter(&predicate!(|x| !x.published)).unwrap());
    assert_eq!(found, vec![3, 5]);
}

#[test]
fn test_null_test() {
    let found = select(|q| q.filter(&predicate!(|x| x.parent_id == None)).unwrap());
    assert_eq!(found, vec![1, 5]);
}

#[test]
fn test_string_searches_ignore_case() {
    let found = select(|q| q.filter(&predicate!(|x| x.name.starts_with("HO"))).unwrap());
    assert_eq!(found, vec![1, 5]);

    let found = select(|q| q.filter(&predicate!(|x| x.name.invariant_equals("ABOUT"))).unwrap());
    assert_eq!(found, vec![3]);

    let found = select(|q| q.filter(&predicate!(|x| x.path.ends_with(",2"))).unwrap());
    assert_eq!(found, vec![2]);
}

#[test]
fn test_captured_membership_drops_unused_binding() {
    let wanted = vec![2, 3, 4];
    let found = select(|q| {
        q.filter(&predicate!(|x| wanted.contains(&x.id) && !x.published))
            .unwrap()
    });
    assert_eq!(found, vec![3]);
}

#[test]
fn test_filter_in_lowercases_strings() {
    let found = select(|q| q.filter_in(&predicate!(|x| x.name), ["HOME", "news"]).unwrap());
    assert_eq!(found, vec![1, 2]);

    let found = select(|q| {
        q.filter_not_in(&predicate!(|x| x.level), [1, 2])
            .unwrap()
    });
    assert_eq!(found, vec![4]);
}

#[test]
fn test_empty_filter_in_matches_nothing() {
    let found = select(|q| q.filter_in(&predicate!(|x| x.id), Vec::<i64>::new()).unwrap());
    assert!(found.is_empty());

    let none: Vec<i64> = Vec::new();
    let found = select(|q| q.filter(&predicate!(|x| none.contains(&x.id))).unwrap());
    assert!(found.is_empty());
}

#[test]
fn test_empty_filter_not_in_matches_everything() {
    let found = select(|q| {
        q.filter_not_in(&predicate!(|x| x.id), Vec::<i64>::new())
            .unwrap()
    });
    assert_eq!(found, vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_negated_empty_contains_matches_everything() {
    let none: Vec<i64> = Vec::new();
    let found = select(|q| q.filter(&predicate!(|x| !none.contains(&x.id))).unwrap());
    assert_eq!(found, vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_filter_any_and_any_in() {
    let found = select(|q| {
        q.filter_any(&[
            predicate!(|x| x.level == 3),
            predicate!(|x| x.name.ends_with("old")),
        ])
        .unwrap()
    });
    assert_eq!(found, vec![4, 5]);

    let found = select(|q| {
        q.filter_any_in(&[predicate!(|x| x.id), predicate!(|x| x.parent_id)], [1, 2])
            .unwrap()
    });
    assert_eq!(found, vec![1, 2, 3, 4]);
}

#[test]
fn test_null_filters() {
    let found = select(|q| q.filter_not_null(&predicate!(|x| x.parent_id)).unwrap());
    assert_eq!(found, vec![2, 3, 4]);

    let found = select(|q| {
        q.filter_null(&predicate!(|x| x.parent_id))
            .unwrap()
            .filter(&predicate!(|x| x.published))
            .unwrap()
    });
    assert_eq!(found, vec![1]);
}

#[test]
fn test_cached_clause_replays_with_new_values() {
    let config = Config::from_toml_str(MODELS).unwrap();
    let ctx: SqlContext = config.context().unwrap();
    let fields = config.field_map().unwrap();
    let conn = setup();
    let mut cell = CachedExpression::new();

    let mut seen = Vec::new();
    for level in [1, 2, 3] {
        cell.wrap(predicate!(|x| x.level == level));
        let result = Query::for_model(&ctx, "Document", &fields)
            .filter_cached(&mut cell)
            .unwrap()
            .build();
        seen.push(ids(&conn, &result));
    }
    assert_eq!(seen, vec![vec![1, 5], vec![2, 3], vec![4]]);
}

#[test]
fn test_empty_query_selects_everything() {
    let found = select(|q| q.filter_cached(&mut CachedExpression::new()).unwrap());
    assert_eq!(found, vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_hand_built_tree() {
    let x = Expr::param("x");
    let tree = Expr::lambda(
        ["x"],
        x.clone()
            .field("level")
            .ge(Expr::constant(2))
            .and(x.field("path").invoke("contains", [Expr::constant(",2")])),
    );
    let found = select(|q| q.filter(&tree).unwrap());
    assert_eq!(found, vec![2, 4]);
}
