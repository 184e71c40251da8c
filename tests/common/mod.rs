#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use tempfile::TempDir;

use studyplan_progress::db::config::DbConfig;
use studyplan_progress::db::operations as ops;
use studyplan_progress::db::Database;
use studyplan_progress::services::course_status::CourseStatusService;
use studyplan_progress::types::{CourseId, CourseStatus, PlanId, Requirement, StudentId};

pub struct TestDb {
    _dir: TempDir,
    pub db: Database,
    pub service: Arc<CourseStatusService>,
}

pub async fn setup() -> TestDb {
    let dir = TempDir::new().expect("failed to create temp dir");
    let db = Database::connect(DbConfig::for_path(dir.path().join("progress.db")))
        .await
        .expect("failed to open test database");
    let service = Arc::new(CourseStatusService::new(db.pool().clone()));
    TestDb {
        _dir: dir,
        db,
        service,
    }
}

impl TestDb {
    pub async fn student(&self, email: &str) -> StudentId {
        let mut conn = self.db.pool().acquire().await.expect("acquire");
        ops::create_student(&mut conn, email).await.expect("create student")
    }

    pub async fn plan(&self, name: &str) -> PlanId {
        let mut conn = self.db.pool().acquire().await.expect("acquire");
        ops::create_study_plan(&mut conn, name, "Engineering")
            .await
            .expect("create plan")
    }

    /// Inserts a course and its edges directly, without re-seeding anyone.
    pub async fn course(
        &self,
        plan_id: PlanId,
        code: &str,
        prerequisites: &[CourseId],
        corequisites: &[CourseId],
    ) -> CourseId {
        let mut conn = self.db.pool().acquire().await.expect("acquire");
        let course = ops::insert_course(&mut conn, plan_id, code, code, 4)
            .await
            .expect("insert course");
        for required in prerequisites {
            ops::insert_requirement(&mut conn, &Requirement::prerequisite(course.id, *required))
                .await
                .expect("insert prerequisite");
        }
        for required in corequisites {
            ops::insert_requirement(&mut conn, &Requirement::corequisite(course.id, *required))
                .await
                .expect("insert corequisite");
        }
        course.id
    }

    pub async fn add_prerequisite(&self, course_id: CourseId, required: CourseId) {
        let mut conn = self.db.pool().acquire().await.expect("acquire");
        ops::insert_requirement(&mut conn, &Requirement::prerequisite(course_id, required))
            .await
            .expect("insert prerequisite");
    }

    pub async fn enroll(&self, student_id: StudentId, plan_id: PlanId) {
        let mut conn = self.db.pool().acquire().await.expect("acquire");
        ops::enroll_student(&mut conn, student_id, plan_id)
            .await
            .expect("enroll");
    }

    pub async fn status(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Option<CourseStatus> {
        self.service
            .get_student_course(student_id, course_id)
            .await
            .expect("lookup")
            .map(|row| row.status)
    }

    /// Course code -> status for every row of the student.
    pub async fn met(&self, student_id: StudentId, course_id: CourseId) -> bool {
        self.service
            .requirements_met(student_id, course_id)
            .await
            .expect("requirements check")
    }

    pub async fn plans(&self, student_id: StudentId) -> Vec<PlanId> {
        self.service
            .student_plans(student_id)
            .await
            .expect("student plans")
    }

    pub async fn statuses(&self, student_id: StudentId) -> BTreeMap<String, CourseStatus> {
        self.service
            .list_student_courses(student_id)
            .await
            .expect("list")
            .into_iter()
            .map(|view| (view.course_code, view.status))
            .collect()
    }
}

pub fn expected(pairs: &[(&str, CourseStatus)]) -> BTreeMap<String, CourseStatus> {
    pairs
        .iter()
        .map(|(code, status)| (code.to_string(), *status))
        .collect()
}

/// The MATH1 -> MATH2 -> MATH3 prerequisite chain.
pub struct MathPlan {
    pub plan: PlanId,
    pub math1: CourseId,
    pub math2: CourseId,
    pub math3: CourseId,
}

pub async fn math_plan(db: &TestDb) -> MathPlan {
    let plan = db.plan("Mathematics").await;
    let math1 = db.course(plan, "MATH1", &[], &[]).await;
    let math2 = db.course(plan, "MATH2", &[math1], &[]).await;
    let math3 = db.course(plan, "MATH3", &[math2], &[]).await;
    MathPlan {
        plan,
        math1,
        math2,
        math3,
    }
}
