mod common;

use common::setup;
use studyplan_progress::db::config::DbConfig;
use studyplan_progress::db::migrate::run_migrations;
use studyplan_progress::db::Database;
use studyplan_progress::types::CourseStatus;

#[tokio::test]
async fn test_schema_has_core_tables() {
    let db = setup().await;

    let tables: Vec<String> = sqlx::query_scalar(
        r#"SELECT "name" FROM sqlite_master WHERE "type" = 'table' ORDER BY "name""#,
    )
    .fetch_all(db.db.pool())
    .await
    .expect("list tables");

    for table in [
        "_migrations",
        "course_statuses",
        "courses",
        "requirements",
        "student_courses",
        "students",
        "study_plans",
        "user_plans",
    ] {
        assert!(tables.iter().any(|t| t == table), "missing table {table}");
    }
}

#[tokio::test]
async fn test_migrations_are_applied_once() {
    let db = setup().await;

    let applied = run_migrations(db.db.pool()).await.expect("rerun");
    assert_eq!(applied, 0);

    let recorded: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM "_migrations""#)
        .fetch_one(db.db.pool())
        .await
        .expect("count");
    assert_eq!(recorded, 1);
}

#[tokio::test]
async fn test_reopening_database_keeps_data() {
    let dir = tempfile::TempDir::new().expect("temp dir");
    let path = dir.path().join("nested").join("progress.db");

    let first = Database::connect(DbConfig::for_path(path.clone()))
        .await
        .expect("first open");
    sqlx::query(r#"INSERT INTO "students" ("email") VALUES ('keep@example.edu')"#)
        .execute(first.pool())
        .await
        .expect("insert");
    first.close().await;

    let second = Database::connect(DbConfig::for_path(path))
        .await
        .expect("second open");
    let count: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM "students""#)
        .fetch_one(second.pool())
        .await
        .expect("count");
    assert_eq!(count, 1);
    second.close().await;
}

#[tokio::test]
async fn test_status_lookup_matches_codes() {
    let db = setup().await;

    let rows: Vec<(i64, String)> =
        sqlx::query_as(r#"SELECT "id", "name" FROM "course_statuses" ORDER BY "id""#)
            .fetch_all(db.db.pool())
            .await
            .expect("statuses");
    assert_eq!(rows.len(), 4);

    for (code, name) in rows {
        let status = CourseStatus::from_code(code).expect("known code");
        assert_eq!(status.as_str(), name);
    }
}
