use sqlx::SqliteConnection;

use crate::types::{PlanId, StudentId};

pub async fn create_student(
    conn: &mut SqliteConnection,
    email: &str,
) -> Result<StudentId, sqlx::Error> {
    let id: i64 =
        sqlx::query_scalar(r#"INSERT INTO "students" ("email") VALUES (?) RETURNING "id""#)
            .bind(email.trim())
            .fetch_one(&mut *conn)
            .await?;
    Ok(StudentId(id))
}

pub async fn student_exists(
    conn: &mut SqliteConnection,
    student_id: StudentId,
) -> Result<bool, sqlx::Error> {
    let found: Option<i64> =
        sqlx::query_scalar(r#"SELECT "id" FROM "students" WHERE "id" = ? LIMIT 1"#)
            .bind(student_id)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(found.is_some())
}

/// Links a student to a plan. Returns `false` if the link already existed.
pub async fn enroll_student(
    conn: &mut SqliteConnection,
    student_id: StudentId,
    plan_id: PlanId,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"INSERT OR IGNORE INTO "user_plans" ("studentId", "studyPlanId") VALUES (?, ?)"#,
    )
    .bind(student_id)
    .bind(plan_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn get_plan_students(
    conn: &mut SqliteConnection,
    plan_id: PlanId,
) -> Result<Vec<StudentId>, sqlx::Error> {
    sqlx::query_scalar(
        r#"SELECT "studentId" FROM "user_plans" WHERE "studyPlanId" = ? ORDER BY "studentId""#,
    )
    .bind(plan_id)
    .fetch_all(&mut *conn)
    .await
}

pub async fn get_student_plans(
    conn: &mut SqliteConnection,
    student_id: StudentId,
) -> Result<Vec<PlanId>, sqlx::Error> {
    sqlx::query_scalar(
        r#"SELECT "studyPlanId" FROM "user_plans" WHERE "studentId" = ? ORDER BY "studyPlanId""#,
    )
    .bind(student_id)
    .fetch_all(&mut *conn)
    .await
}

/// Students that own at least one progress row.
pub async fn list_students_with_progress(
    conn: &mut SqliteConnection,
) -> Result<Vec<StudentId>, sqlx::Error> {
    sqlx::query_scalar(
        r#"SELECT DISTINCT "studentId" FROM "student_courses" ORDER BY "studentId""#,
    )
    .fetch_all(&mut *conn)
    .await
}
