use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::types::{Course, CourseId, PlanId};

const COURSE_COLUMNS: &str = r#""id", "studyPlanId", "code", "name", "credits""#;

pub async fn create_study_plan(
    conn: &mut SqliteConnection,
    name: &str,
    career: &str,
) -> Result<PlanId, sqlx::Error> {
    let id: i64 = sqlx::query_scalar(
        r#"INSERT INTO "study_plans" ("name", "career") VALUES (?, ?) RETURNING "id""#,
    )
    .bind(name)
    .bind(career)
    .fetch_one(&mut *conn)
    .await?;
    Ok(PlanId(id))
}

pub async fn plan_exists(
    conn: &mut SqliteConnection,
    plan_id: PlanId,
) -> Result<bool, sqlx::Error> {
    let found: Option<i64> =
        sqlx::query_scalar(r#"SELECT "id" FROM "study_plans" WHERE "id" = ? LIMIT 1"#)
            .bind(plan_id)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(found.is_some())
}

pub async fn get_plan_courses(
    conn: &mut SqliteConnection,
    plan_id: PlanId,
) -> Result<Vec<Course>, sqlx::Error> {
    let sql = format!(
        r#"SELECT {COURSE_COLUMNS} FROM "courses" WHERE "studyPlanId" = ? ORDER BY "id""#
    );
    let rows = sqlx::query(&sql).bind(plan_id).fetch_all(&mut *conn).await?;
    rows.iter().map(map_course).collect()
}

pub async fn find_course(
    conn: &mut SqliteConnection,
    course_id: CourseId,
) -> Result<Option<Course>, sqlx::Error> {
    let sql = format!(r#"SELECT {COURSE_COLUMNS} FROM "courses" WHERE "id" = ? LIMIT 1"#);
    let row = sqlx::query(&sql)
        .bind(course_id)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(map_course).transpose()
}

/// Codes are stored trimmed and compared case-sensitively.
pub async fn find_course_by_code(
    conn: &mut SqliteConnection,
    code: &str,
) -> Result<Option<Course>, sqlx::Error> {
    let sql = format!(r#"SELECT {COURSE_COLUMNS} FROM "courses" WHERE "code" = ? LIMIT 1"#);
    let row = sqlx::query(&sql)
        .bind(code.trim())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(map_course).transpose()
}

pub async fn insert_course(
    conn: &mut SqliteConnection,
    plan_id: PlanId,
    code: &str,
    name: &str,
    credits: i64,
) -> Result<Course, sqlx::Error> {
    let sql = format!(
        r#"
        INSERT INTO "courses" ("studyPlanId", "code", "name", "credits")
        VALUES (?, ?, ?, ?)
        RETURNING {COURSE_COLUMNS}
        "#
    );
    let row = sqlx::query(&sql)
        .bind(plan_id)
        .bind(code.trim())
        .bind(name)
        .bind(credits)
        .fetch_one(&mut *conn)
        .await?;
    map_course(&row)
}

/// Removes the course; its requirements and progress rows go with it.
pub async fn delete_course(
    conn: &mut SqliteConnection,
    course_id: CourseId,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(r#"DELETE FROM "courses" WHERE "id" = ?"#)
        .bind(course_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn map_course(row: &SqliteRow) -> Result<Course, sqlx::Error> {
    Ok(Course {
        id: CourseId(row.try_get("id")?),
        study_plan_id: PlanId(row.try_get("studyPlanId")?),
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        credits: row.try_get("credits")?,
    })
}
