use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use super::decode_error;
use crate::types::{CourseId, PlanId, Requirement, RequirementKind, StudentId};

/// Outgoing edges: what `course_id` requires.
pub async fn get_requirements_of(
    conn: &mut SqliteConnection,
    course_id: CourseId,
) -> Result<Vec<Requirement>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT "courseId", "requiredCourseId", "kind"
        FROM "requirements"
        WHERE "courseId" = ?
        ORDER BY "requiredCourseId", "kind"
        "#,
    )
    .bind(course_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(map_requirement).collect()
}

/// Reverse edges: every course that requires `course_id`.
pub async fn get_requirements_requiring(
    conn: &mut SqliteConnection,
    course_id: CourseId,
) -> Result<Vec<Requirement>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT "courseId", "requiredCourseId", "kind"
        FROM "requirements"
        WHERE "requiredCourseId" = ?
        ORDER BY "courseId", "kind"
        "#,
    )
    .bind(course_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(map_requirement).collect()
}

/// Outgoing edges of every course in the plan.
pub async fn get_plan_requirements(
    conn: &mut SqliteConnection,
    plan_id: PlanId,
) -> Result<Vec<Requirement>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT r."courseId", r."requiredCourseId", r."kind"
        FROM "requirements" r
        JOIN "courses" c ON c."id" = r."courseId"
        WHERE c."studyPlanId" = ?
        ORDER BY r."courseId", r."requiredCourseId"
        "#,
    )
    .bind(plan_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(map_requirement).collect()
}

/// Outgoing edges of every course the student has a progress row for.
pub async fn get_student_requirements(
    conn: &mut SqliteConnection,
    student_id: StudentId,
) -> Result<Vec<Requirement>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT r."courseId", r."requiredCourseId", r."kind"
        FROM "requirements" r
        JOIN "student_courses" sc ON sc."courseId" = r."courseId"
        WHERE sc."studentId" = ?
        ORDER BY r."courseId", r."requiredCourseId"
        "#,
    )
    .bind(student_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(map_requirement).collect()
}

pub async fn get_all_prerequisites(
    conn: &mut SqliteConnection,
) -> Result<Vec<Requirement>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT "courseId", "requiredCourseId", "kind"
        FROM "requirements"
        WHERE "kind" = 'PREREQUISITE'
        ORDER BY "courseId", "requiredCourseId"
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(map_requirement).collect()
}

/// Inserts an edge; an identical existing edge is left as is.
pub async fn insert_requirement(
    conn: &mut SqliteConnection,
    requirement: &Requirement,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO "requirements" ("courseId", "requiredCourseId", "kind")
        VALUES (?, ?, ?)
        "#,
    )
    .bind(requirement.course_id)
    .bind(requirement.required_course_id)
    .bind(requirement.kind.as_str())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

fn map_requirement(row: &SqliteRow) -> Result<Requirement, sqlx::Error> {
    let kind: String = row.try_get("kind")?;
    let kind = RequirementKind::parse(&kind)
        .ok_or_else(|| decode_error(format!("unknown requirement kind {kind:?}")))?;
    Ok(Requirement {
        course_id: CourseId(row.try_get("courseId")?),
        required_course_id: CourseId(row.try_get("requiredCourseId")?),
        kind,
    })
}
