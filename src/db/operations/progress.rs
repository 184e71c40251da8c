use chrono::{SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use super::decode_error;
use crate::types::{CourseId, CourseStatus, StudentCourseStatus, StudentCourseView, StudentId};

pub async fn get_progress(
    conn: &mut SqliteConnection,
    student_id: StudentId,
) -> Result<Vec<StudentCourseStatus>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT "studentId", "courseId", "statusId", "attemptCount"
        FROM "student_courses"
        WHERE "studentId" = ?
        ORDER BY "courseId"
        "#,
    )
    .bind(student_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(map_progress).collect()
}

pub async fn get_progress_for_course(
    conn: &mut SqliteConnection,
    student_id: StudentId,
    course_id: CourseId,
) -> Result<Option<StudentCourseStatus>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT "studentId", "courseId", "statusId", "attemptCount"
        FROM "student_courses"
        WHERE "studentId" = ? AND "courseId" = ?
        LIMIT 1
        "#,
    )
    .bind(student_id)
    .bind(course_id)
    .fetch_optional(&mut *conn)
    .await?;
    row.as_ref().map(map_progress).transpose()
}

/// Plain insert; a second row for the same (student, course) is a unique violation.
pub async fn insert_progress(
    conn: &mut SqliteConnection,
    record: &StudentCourseStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO "student_courses"
            ("studentId", "courseId", "statusId", "attemptCount", "updatedAt")
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.student_id)
    .bind(record.course_id)
    .bind(record.status.code())
    .bind(i64::from(record.attempt_count))
    .bind(now_iso())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn upsert_progress(
    conn: &mut SqliteConnection,
    record: &StudentCourseStatus,
) -> Result<StudentCourseStatus, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO "student_courses"
            ("studentId", "courseId", "statusId", "attemptCount", "updatedAt")
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT ("studentId", "courseId") DO UPDATE SET
            "statusId" = excluded."statusId",
            "attemptCount" = excluded."attemptCount",
            "updatedAt" = excluded."updatedAt"
        RETURNING "studentId", "courseId", "statusId", "attemptCount"
        "#,
    )
    .bind(record.student_id)
    .bind(record.course_id)
    .bind(record.status.code())
    .bind(i64::from(record.attempt_count))
    .bind(now_iso())
    .fetch_one(&mut *conn)
    .await?;
    map_progress(&row)
}

pub async fn list_student_course_views(
    conn: &mut SqliteConnection,
    student_id: StudentId,
) -> Result<Vec<StudentCourseView>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT sc."studentId", sc."courseId", sc."statusId", sc."attemptCount", sc."updatedAt",
               c."code" AS "courseCode", s."name" AS "statusName"
        FROM "student_courses" sc
        JOIN "courses" c ON c."id" = sc."courseId"
        JOIN "course_statuses" s ON s."id" = sc."statusId"
        WHERE sc."studentId" = ?
        ORDER BY c."code"
        "#,
    )
    .bind(student_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| {
            let record = map_progress(row)?;
            Ok(StudentCourseView {
                student_id: record.student_id,
                course_id: record.course_id,
                course_code: row.try_get("courseCode")?,
                status: record.status,
                status_name: row.try_get("statusName")?,
                attempt_count: record.attempt_count,
                updated_at: row.try_get("updatedAt")?,
            })
        })
        .collect()
}

fn map_progress(row: &SqliteRow) -> Result<StudentCourseStatus, sqlx::Error> {
    let code: i64 = row.try_get("statusId")?;
    let status = CourseStatus::from_code(code)
        .ok_or_else(|| decode_error(format!("unknown status code {code}")))?;
    let attempts: i64 = row.try_get("attemptCount")?;
    let attempt_count = u32::try_from(attempts)
        .map_err(|_| decode_error(format!("attempt count out of range: {attempts}")))?;

    Ok(StudentCourseStatus {
        student_id: StudentId(row.try_get("studentId")?),
        course_id: CourseId(row.try_get("courseId")?),
        status,
        attempt_count,
    })
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
