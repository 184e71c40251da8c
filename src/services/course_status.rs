use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::db::operations as ops;
use crate::engine::{self, ProgressSnapshot, RequirementGraph};
use crate::services::student_locks::StudentLocks;
use crate::types::{
    Course, CourseId, CourseStatus, PlanId, Requirement, RequirementKind, StatusTransition,
    StudentCourseStatus, StudentCourseView, StudentId,
};

#[derive(Debug, thiserror::Error)]
pub enum CourseStatusError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("persistence failure: {0}")]
    Persistence(#[source] sqlx::Error),
}

impl From<sqlx::Error> for CourseStatusError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return Self::Conflict(db_err.message().to_string());
            }
        }
        Self::Persistence(err)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassOutcome {
    pub record: StudentCourseStatus,
    pub unlocked: Vec<StatusTransition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollOutcome {
    pub newly_enrolled: bool,
    pub seeded: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub students: usize,
    pub seeded: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCourse {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub credits: i64,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub corequisites: Vec<String>,
}

/// Runs the status engine against the progress store.
///
/// Each mutating call holds the student's lock and runs in one transaction,
/// so a failure leaves nothing half-applied and a retry is always safe.
///
/// Write transactions are admitted one at a time. SQLite allows a single
/// writer, and a deferred transaction that reads before writing fails with
/// `SQLITE_BUSY` instead of waiting when another connection commits in
/// between.
pub struct CourseStatusService {
    pool: SqlitePool,
    locks: StudentLocks,
    writer: Mutex<()>,
}

type WriteTx<'a> = (MutexGuard<'a, ()>, Transaction<'static, Sqlite>);

impl CourseStatusService {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            locks: StudentLocks::new(),
            writer: Mutex::new(()),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Binding order matters: `let (_writer, mut tx)` drops the transaction
    /// before releasing the writer slot.
    async fn begin_write(&self) -> Result<WriteTx<'_>, CourseStatusError> {
        let writer = self.writer.lock().await;
        let tx = self.pool.begin().await?;
        Ok((writer, tx))
    }

    /// Creates missing rows for every course of the plan. Existing rows are
    /// never touched. Returns how many rows were created.
    pub async fn seed(
        &self,
        student_id: StudentId,
        plan_id: PlanId,
    ) -> Result<usize, CourseStatusError> {
        let _guard = self.locks.lock(student_id).await;
        let (_writer, mut tx) = self.begin_write().await?;
        let created = seed_student(&mut tx, student_id, plan_id).await?;
        tx.commit().await?;

        if created > 0 {
            info!(student_id = %student_id, plan_id = %plan_id, created, "Seeded course statuses");
        }
        Ok(created)
    }

    pub async fn requirements_met(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<bool, CourseStatusError> {
        let mut conn = self.pool.acquire().await?;
        ensure_student(&mut conn, student_id).await?;
        ensure_course(&mut conn, course_id).await?;

        let edges = ops::get_requirements_of(&mut conn, course_id).await?;
        let rows = ops::get_progress(&mut conn, student_id).await?;
        let graph = RequirementGraph::from_edges(edges);
        let progress = ProgressSnapshot::from_rows(student_id, rows);
        Ok(engine::requirements_met(&graph, &progress, course_id))
    }

    /// Moves locked dependents of `passed_course_id` to available once all
    /// their prerequisites are passed. The passed course itself must already
    /// be `PASSED`; see [`Self::record_pass`] for the combined command.
    pub async fn on_course_passed(
        &self,
        student_id: StudentId,
        passed_course_id: CourseId,
    ) -> Result<Vec<StatusTransition>, CourseStatusError> {
        let _guard = self.locks.lock(student_id).await;
        let (_writer, mut tx) = self.begin_write().await?;
        let unlocked = unlock_dependents(&mut tx, student_id, passed_course_id).await?;
        tx.commit().await?;
        Ok(unlocked)
    }

    pub async fn recompute_all(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<StatusTransition>, CourseStatusError> {
        let _guard = self.locks.lock(student_id).await;
        let (_writer, mut tx) = self.begin_write().await?;

        ensure_student(&mut tx, student_id).await?;
        let rows = ops::get_progress(&mut tx, student_id).await?;
        let mut progress = ProgressSnapshot::from_rows(student_id, rows);
        if progress.is_empty() {
            debug!(student_id = %student_id, "No course rows to recompute");
            return Ok(Vec::new());
        }

        let edges = ops::get_student_requirements(&mut tx, student_id).await?;
        let graph = RequirementGraph::from_edges(edges);

        let transitions = engine::recompute(&graph, &progress);
        persist_transitions(&mut tx, &mut progress, &transitions).await?;
        tx.commit().await?;

        info!(
            student_id = %student_id,
            rows = progress.len(),
            changed = transitions.len(),
            "Recomputed course statuses"
        );
        Ok(transitions)
    }

    /// Writes the caller's status verbatim, creating the row if needed. A
    /// missing `attempt_count` keeps the stored one (0 for new rows).
    pub async fn set_status(
        &self,
        student_id: StudentId,
        course_id: CourseId,
        status: CourseStatus,
        attempt_count: Option<u32>,
    ) -> Result<StudentCourseStatus, CourseStatusError> {
        let _guard = self.locks.lock(student_id).await;
        let (_writer, mut tx) = self.begin_write().await?;
        let record = write_status(&mut tx, student_id, course_id, status, attempt_count).await?;
        tx.commit().await?;
        Ok(record)
    }

    /// Marks the course passed and unlocks its dependents in one transaction.
    pub async fn record_pass(
        &self,
        student_id: StudentId,
        course_id: CourseId,
        attempt_count: Option<u32>,
    ) -> Result<PassOutcome, CourseStatusError> {
        let _guard = self.locks.lock(student_id).await;
        let (_writer, mut tx) = self.begin_write().await?;
        let record =
            write_status(&mut tx, student_id, course_id, CourseStatus::Passed, attempt_count)
                .await?;
        let unlocked = unlock_dependents(&mut tx, student_id, course_id).await?;
        tx.commit().await?;

        info!(
            student_id = %student_id,
            course_id = %course_id,
            unlocked = unlocked.len(),
            "Recorded course pass"
        );
        Ok(PassOutcome { record, unlocked })
    }

    /// Links the student to the plan (idempotent) and seeds its courses.
    pub async fn enroll_student(
        &self,
        student_id: StudentId,
        plan_id: PlanId,
    ) -> Result<EnrollOutcome, CourseStatusError> {
        let _guard = self.locks.lock(student_id).await;
        let (_writer, mut tx) = self.begin_write().await?;
        ensure_student(&mut tx, student_id).await?;
        ensure_plan(&mut tx, plan_id).await?;
        let newly_enrolled = ops::enroll_student(&mut tx, student_id, plan_id).await?;
        let seeded = seed_student(&mut tx, student_id, plan_id).await?;
        tx.commit().await?;

        info!(
            student_id = %student_id,
            plan_id = %plan_id,
            newly_enrolled,
            seeded,
            "Student enrolled in plan"
        );
        Ok(EnrollOutcome { newly_enrolled, seeded })
    }

    /// Re-seeds every student enrolled in the plan. Stops at the first failure;
    /// students already seeded keep their rows.
    pub async fn sync_plan_for_all_students(
        &self,
        plan_id: PlanId,
    ) -> Result<SyncOutcome, CourseStatusError> {
        let students = self.plan_students(plan_id).await?;

        let mut outcome = SyncOutcome::default();
        for student_id in students {
            outcome.seeded += self.seed(student_id, plan_id).await?;
            outcome.students += 1;
        }

        info!(
            plan_id = %plan_id,
            students = outcome.students,
            seeded = outcome.seeded,
            "Plan courses synced for enrolled students"
        );
        Ok(outcome)
    }

    /// Stores a course with its requirement codes resolved inside the plan,
    /// then re-seeds the plan's students.
    pub async fn add_course_to_plan(
        &self,
        plan_id: PlanId,
        new_course: NewCourse,
    ) -> Result<Course, CourseStatusError> {
        let code = new_course.code.trim();
        if code.is_empty() {
            return Err(CourseStatusError::Validation(
                "course code must not be empty".to_string(),
            ));
        }

        let (writer, mut tx) = self.begin_write().await?;
        ensure_plan(&mut tx, plan_id).await?;

        if ops::find_course_by_code(&mut tx, code).await?.is_some() {
            return Err(CourseStatusError::Conflict(format!(
                "course code already exists: {code}"
            )));
        }

        let course =
            ops::insert_course(&mut tx, plan_id, code, &new_course.name, new_course.credits)
                .await?;

        let linked = new_course
            .prerequisites
            .iter()
            .map(|code| (code, RequirementKind::Prerequisite))
            .chain(
                new_course
                    .corequisites
                    .iter()
                    .map(|code| (code, RequirementKind::Corequisite)),
            );

        for (required_code, kind) in linked {
            let required = resolve_plan_course(&mut tx, plan_id, required_code).await?;
            let requirement = Requirement {
                course_id: course.id,
                required_course_id: required.id,
                kind,
            };
            ops::insert_requirement(&mut tx, &requirement).await?;
        }

        tx.commit().await?;
        drop(writer);
        info!(
            plan_id = %plan_id,
            course_id = %course.id,
            code = %course.code,
            "Course added to plan"
        );

        self.sync_plan_for_all_students(plan_id).await?;
        Ok(course)
    }

    /// Deletes a course (with its requirements and progress rows), re-seeds
    /// the owning plan and recomputes its students. Dependents that lost
    /// their last unpassed prerequisite become available.
    pub async fn remove_course_from_plan(
        &self,
        course_id: CourseId,
    ) -> Result<PlanId, CourseStatusError> {
        let (writer, mut tx) = self.begin_write().await?;
        let course = ops::find_course(&mut tx, course_id)
            .await?
            .ok_or_else(|| CourseStatusError::NotFound(format!("course {course_id}")))?;
        ops::delete_course(&mut tx, course_id).await?;
        tx.commit().await?;
        drop(writer);

        let plan_id = course.study_plan_id;
        info!(plan_id = %plan_id, course_id = %course_id, "Course removed from plan");

        self.sync_plan_for_all_students(plan_id).await?;

        let mut changed = 0;
        for student_id in self.plan_students(plan_id).await? {
            changed += self.recompute_all(student_id).await?.len();
        }
        if changed > 0 {
            info!(plan_id = %plan_id, changed, "Statuses reconciled after course removal");
        }
        Ok(plan_id)
    }

    pub async fn get_student_course(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Option<StudentCourseStatus>, CourseStatusError> {
        let mut conn = self.pool.acquire().await?;
        Ok(ops::get_progress_for_course(&mut conn, student_id, course_id).await?)
    }

    pub async fn list_student_courses(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<StudentCourseView>, CourseStatusError> {
        let mut conn = self.pool.acquire().await?;
        ensure_student(&mut conn, student_id).await?;
        Ok(ops::list_student_course_views(&mut conn, student_id).await?)
    }

    pub async fn student_plans(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<PlanId>, CourseStatusError> {
        let mut conn = self.pool.acquire().await?;
        ensure_student(&mut conn, student_id).await?;
        Ok(ops::get_student_plans(&mut conn, student_id).await?)
    }

    async fn plan_students(&self, plan_id: PlanId) -> Result<Vec<StudentId>, CourseStatusError> {
        let mut conn = self.pool.acquire().await?;
        ensure_plan(&mut conn, plan_id).await?;
        Ok(ops::get_plan_students(&mut conn, plan_id).await?)
    }
}

async fn seed_student(
    conn: &mut SqliteConnection,
    student_id: StudentId,
    plan_id: PlanId,
) -> Result<usize, CourseStatusError> {
    ensure_student(conn, student_id).await?;
    ensure_plan(conn, plan_id).await?;

    let courses = ops::get_plan_courses(conn, plan_id).await?;
    if courses.is_empty() {
        debug!(plan_id = %plan_id, "Plan has no courses, nothing to seed");
        return Ok(0);
    }

    let rows = ops::get_progress(conn, student_id).await?;
    let progress = ProgressSnapshot::from_rows(student_id, rows);
    let graph = RequirementGraph::from_edges(ops::get_plan_requirements(conn, plan_id).await?);

    let rows = engine::seed_rows(&graph, &courses, &progress);
    for row in &rows {
        ops::insert_progress(conn, row).await?;
        debug!(
            student_id = %student_id,
            course_id = %row.course_id,
            status = %row.status,
            "Seeded course status"
        );
    }
    Ok(rows.len())
}

async fn unlock_dependents(
    conn: &mut SqliteConnection,
    student_id: StudentId,
    passed_course_id: CourseId,
) -> Result<Vec<StatusTransition>, CourseStatusError> {
    ensure_student(conn, student_id).await?;
    ensure_course(conn, passed_course_id).await?;

    let reverse = ops::get_requirements_requiring(conn, passed_course_id).await?;
    let mut graph = RequirementGraph::from_edges(reverse);
    let dependents = graph.prerequisite_dependents_of(passed_course_id);
    if dependents.is_empty() {
        return Ok(Vec::new());
    }

    for dependent in &dependents {
        for edge in ops::get_requirements_of(conn, *dependent).await? {
            graph.insert(edge);
        }
    }

    let rows = ops::get_progress(conn, student_id).await?;
    let mut progress = ProgressSnapshot::from_rows(student_id, rows);
    let transitions = engine::unlocks_after_pass(&graph, &progress, passed_course_id);
    persist_transitions(conn, &mut progress, &transitions).await?;
    Ok(transitions)
}

async fn write_status(
    conn: &mut SqliteConnection,
    student_id: StudentId,
    course_id: CourseId,
    status: CourseStatus,
    attempt_count: Option<u32>,
) -> Result<StudentCourseStatus, CourseStatusError> {
    ensure_student(conn, student_id).await?;
    ensure_course(conn, course_id).await?;

    let existing = ops::get_progress_for_course(conn, student_id, course_id).await?;
    let attempt_count = attempt_count
        .or(existing.as_ref().map(|row| row.attempt_count))
        .unwrap_or(0);

    let record = ops::upsert_progress(
        conn,
        &StudentCourseStatus {
            student_id,
            course_id,
            status,
            attempt_count,
        },
    )
    .await?;

    debug!(
        student_id = %student_id,
        course_id = %course_id,
        from = ?existing.map(|row| row.status),
        to = %status,
        "Course status set"
    );
    Ok(record)
}

async fn persist_transitions(
    conn: &mut SqliteConnection,
    progress: &mut ProgressSnapshot,
    transitions: &[StatusTransition],
) -> Result<(), CourseStatusError> {
    for row in progress.apply(transitions) {
        ops::upsert_progress(conn, &row).await?;
        debug!(
            student_id = %row.student_id,
            course_id = %row.course_id,
            status = %row.status,
            "Course status transitioned"
        );
    }
    Ok(())
}

async fn resolve_plan_course(
    conn: &mut SqliteConnection,
    plan_id: PlanId,
    code: &str,
) -> Result<Course, CourseStatusError> {
    let course = ops::find_course_by_code(conn, code)
        .await?
        .ok_or_else(|| CourseStatusError::NotFound(format!("course code {}", code.trim())))?;
    if course.study_plan_id != plan_id {
        return Err(CourseStatusError::Conflict(format!(
            "course {} belongs to plan {}, not plan {plan_id}",
            course.code, course.study_plan_id
        )));
    }
    Ok(course)
}

async fn ensure_student(
    conn: &mut SqliteConnection,
    student_id: StudentId,
) -> Result<(), CourseStatusError> {
    if ops::student_exists(conn, student_id).await? {
        Ok(())
    } else {
        Err(CourseStatusError::NotFound(format!("student {student_id}")))
    }
}

async fn ensure_plan(
    conn: &mut SqliteConnection,
    plan_id: PlanId,
) -> Result<(), CourseStatusError> {
    if ops::plan_exists(conn, plan_id).await? {
        Ok(())
    } else {
        Err(CourseStatusError::NotFound(format!("study plan {plan_id}")))
    }
}

async fn ensure_course(
    conn: &mut SqliteConnection,
    course_id: CourseId,
) -> Result<(), CourseStatusError> {
    if ops::find_course(conn, course_id).await?.is_some() {
        Ok(())
    } else {
        Err(CourseStatusError::NotFound(format!("course {course_id}")))
    }
}
