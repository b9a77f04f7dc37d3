use query_engine::{Aggregate, Database, QueryError, QueryView, SqlType, Value};
use test_case::test_case;

// R(a INTEGER, b TEXT) with rows (1,"x"), (2,"y"), (3,"x").
fn setup() -> (Database, QueryView) {
    let db = Database::open_in_memory().unwrap();
    let view = db
        .create_table(
            "R",
            &["a", "b"],
            &[
                vec![Value::from(1), Value::from("x")],
                vec![Value::from(2), Value::from("y")],
                vec![Value::from(3), Value::from("x")],
            ],
        )
        .unwrap();
    (db, view)
}

fn sorted(mut rows: Vec<Vec<Value>>) -> Vec<Vec<Value>> {
    rows.sort_by_key(|row| format!("{:?}", row));
    rows
}

#[test]
fn test_where_scenario() {
    let (_db, v) = setup();
    let v2 = v.filter(v.column("a").unwrap().gt(1).unwrap()).unwrap();

    let sql = v2.formulate();
    assert!(sql.starts_with("SELECT a,b FROM R WHERE (a > 1) "));
    assert_eq!(sql.trim_end(), "SELECT a,b FROM R WHERE (a > 1)");

    assert_eq!(
        v2.collect().unwrap(),
        vec![
            vec![Value::from(2), Value::from("y")],
            vec![Value::from(3), Value::from("x")],
        ]
    );
}

#[test]
fn test_group_count_scenario() {
    let (_db, v) = setup();
    let grouped = v
        .group(v.column("b").unwrap(), None, Some(Aggregate::Count))
        .unwrap();

    assert_eq!(grouped.column_names(), vec!["b", "a"]);
    assert_eq!(grouped.formulate().trim_end(), "SELECT b,COUNT(a) AS a FROM R  GROUP BY b");
    assert_eq!(
        sorted(grouped.collect().unwrap()),
        vec![
            vec![Value::from("x"), Value::from(2)],
            vec![Value::from("y"), Value::from(1)],
        ]
    );
    assert_eq!(grouped.len().unwrap(), 2);
}

#[test]
fn test_sort_descending_scenario() {
    let (_db, v) = setup();
    let sql = v.sort("a", true).unwrap().formulate();
    assert!(sql.trim_end().ends_with("ORDER BY a DESC"));
    assert_eq!(
        v.sort("a", true).unwrap().column_values("a").unwrap(),
        vec![Value::from(3), Value::from(2), Value::from(1)]
    );
}

#[test]
fn test_group_with_having() {
    let (_db, v) = setup();
    let count_a = v.column("a").unwrap().apply(Aggregate::Count);
    let grouped = v
        .group("b", Some(count_a.gt(1).unwrap()), Some(Aggregate::Count))
        .unwrap();
    assert_eq!(
        grouped.formulate().trim_end(),
        "SELECT b,COUNT(a) AS a FROM R  GROUP BY b HAVING (COUNT(a) > 1)"
    );
    assert_eq!(
        grouped.collect().unwrap(),
        vec![vec![Value::from("x"), Value::from(2)]]
    );
}

#[test]
fn test_group_without_aggregate_keeps_projection() {
    let (_db, v) = setup();
    let grouped = v.select(&["b"]).unwrap().group("b", None, None).unwrap();
    assert_eq!(grouped.column_names(), vec!["b"]);
    assert_eq!(grouped.len().unwrap(), 2);
}

#[test_case(|v: &QueryView| v.clone() ; "base view")]
#[test_case(|v: &QueryView| v.filter(v.column("b").unwrap().eq("x").unwrap()).unwrap() ; "filtered view")]
#[test_case(|v: &QueryView| v.group("b", None, Some(Aggregate::Sum)).unwrap() ; "grouped view")]
#[test_case(|v: &QueryView| v.group("a", None, None).unwrap().limit(2).unwrap() ; "grouped limited view")]
#[test_case(|v: &QueryView| v.sort("a", true).unwrap().limit(1).unwrap() ; "limited view")]
#[test_case(|v: &QueryView| {
    let total = v.column("a").unwrap().apply(Aggregate::Sum);
    v.select(&["a"]).unwrap().with_column("total", total).unwrap()
} ; "aggregate without group")]
#[test_case(|v: &QueryView| v.limit(u64::MAX).unwrap() ; "unbounded limit")]
fn test_len_matches_executed_rows(build: fn(&QueryView) -> QueryView) {
    let (_db, v) = setup();
    let view = build(&v);
    assert_eq!(view.len().unwrap(), view.collect().unwrap().len() as u64);
}

#[test]
fn test_combinators_reject_foreign_expressions() {
    let (db, v) = setup();
    let s = db
        .create_table("S", &["a"], &[vec![Value::from(1)]])
        .unwrap();
    let foreign = s.column("a").unwrap();

    assert!(matches!(
        v.filter(foreign.gt(0).unwrap()),
        Err(QueryError::WrongView { .. })
    ));
    assert!(matches!(v.sort(foreign, false), Err(QueryError::WrongView { .. })));
    assert!(matches!(
        v.group(foreign, None, None),
        Err(QueryError::WrongView { .. })
    ));
    assert!(matches!(
        v.group("b", Some(foreign.gt(0).unwrap()), None),
        Err(QueryError::WrongView { .. })
    ));
    assert!(matches!(
        v.with_column("c", foreign.clone()),
        Err(QueryError::WrongView { .. })
    ));
    assert!(matches!(
        v.column("a").unwrap().add(foreign),
        Err(QueryError::CrossViewCombination { .. })
    ));
}

#[test]
fn test_text_concatenation_executes() {
    let (_db, v) = setup();
    let shout = v.column("b").unwrap().add("!").unwrap();
    let view = v.with_column("shout", shout).unwrap().select(&["shout"]).unwrap();
    assert_eq!(
        view.column_values("shout").unwrap(),
        vec![Value::from("x!"), Value::from("y!"), Value::from("x!")]
    );
}

#[test]
fn test_save_as_keeps_derived_column_name_and_type() {
    let (_db, v) = setup();
    let shout = v.column("b").unwrap().add("!").unwrap();
    let derived = v.with_column("shout", shout).unwrap();
    assert_eq!(derived.to_frame().unwrap().columns(), derived.column_names().as_slice());

    let saved = derived.save_as("shouts").unwrap();
    assert_eq!(saved.column_names(), vec!["a", "b", "shout"]);
    let column = saved.column("shout").unwrap();
    assert_eq!(column.sql_type(), SqlType::Text);

    let matching = saved.filter(column.eq("x!").unwrap()).unwrap();
    assert_eq!(matching.len().unwrap(), 2);
}

#[test]
fn test_text_literals_are_escaped() {
    let (_db, v) = setup();
    let hostile = v
        .filter(v.column("b").unwrap().eq("x' OR '1'='1").unwrap())
        .unwrap();
    assert_eq!(hostile.len().unwrap(), 0);
}

#[test]
fn test_sample_returns_everything_when_small() {
    let (_db, v) = setup();
    let frame = v.sample(10).unwrap();
    assert_eq!(frame.len(), 3);
    assert_eq!(frame.columns(), v.column_names().as_slice());
}

#[test]
fn test_sample_is_bounded() {
    let db = Database::open_in_memory().unwrap();
    let rows: Vec<_> = (0..1000).map(|i| vec![Value::from(i)]).collect();
    let numbers = db.create_table("numbers", &["n"], &rows).unwrap();

    let frame = numbers.sample(10).unwrap();
    assert!(frame.len() <= 10);
    assert_eq!(frame.columns(), &["n".to_string()]);
}

#[test]
fn test_sample_rejects_zero() {
    let (_db, v) = setup();
    assert!(matches!(v.sample(0), Err(QueryError::InvalidArgument(_))));
}

#[test]
fn test_store_errors_surface_on_materialization() {
    let (db, v) = setup();
    db.drop_table(&v).unwrap();
    assert!(matches!(v.collect(), Err(QueryError::Store(_))));
}
