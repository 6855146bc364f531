use canvass_db::{create_pool, run_migrations, DbSettings, ResponseStore};
use canvass_types::{AnswerSink, QuestionId};

#[test]
fn db_initialization_works() {
    let pool = create_pool(":memory:", DbSettings::default()).expect("failed to create pool");
    let conn = pool.get().expect("failed to get connection");
    let applied = run_migrations(&conn).expect("failed to run migrations");
    assert_eq!(applied, 1);

    // Verify table set (excluding sqlite internals)
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
        .expect("failed to prepare table query");
    let tables: Vec<String> = stmt
        .query_map([], |row| row.get(0))
        .expect("failed to execute table query")
        .map(|r| r.expect("failed to read table name"))
        .collect();

    assert_eq!(tables, vec!["_canvass_migrations", "responses"]);
}

#[tokio::test]
async fn response_store_records_and_lists() {
    // File-backed database: each pooled connection of an in-memory SQLite
    // database sees its own empty schema, so async store tests need a file.
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("canvass.db");
    let pool = create_pool(db_path.to_str().unwrap(), DbSettings::default()).unwrap();
    {
        let conn = pool.get().unwrap();
        run_migrations(&conn).unwrap();
    }

    let store = ResponseStore::new(pool);
    let q1 = QuestionId::new("Q1");

    assert!(store.record_answer("CA100", &q1, "paris").await.unwrap());

    // Second write for the same pair is a no-op, matching the at-most-one
    // answer invariant.
    assert!(!store.record_answer("CA100", &q1, "rome").await.unwrap());

    let answers = store.answers_for_call("CA100").await.unwrap();
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].answer, "paris");
    assert!(!answers[0].created_at.is_empty());
}

#[tokio::test]
async fn answer_sink_is_best_effort_compatible() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("canvass.db");
    let pool = create_pool(db_path.to_str().unwrap(), DbSettings::default()).unwrap();
    {
        let conn = pool.get().unwrap();
        run_migrations(&conn).unwrap();
    }

    let store = ResponseStore::new(pool);
    let q2 = QuestionId::new("Q2");

    // Through the trait the duplicate is also a clean Ok, not an error.
    store.record("CA200", &q2, "june").await.unwrap();
    store.record("CA200", &q2, "july").await.unwrap();

    let answers = store.answers_for_call("CA200").await.unwrap();
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].answer, "june");
}
