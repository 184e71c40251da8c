mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use common::{math_plan, setup, TestDb};
use studyplan_progress::config::WorkerConfig;
use studyplan_progress::core::{EventBus, EventDispatcher, EventEnvelope, ProgressEvent};
use studyplan_progress::types::{CourseId, CourseStatus, StudentId};
use studyplan_progress::workers::{run_recompute_sweep, SweepStats, WorkerManager};

use CourseStatus::{Available, Locked, Passed};

async fn wait_for_status(
    db: &TestDb,
    student_id: StudentId,
    course_id: CourseId,
    want: CourseStatus,
) -> bool {
    for _ in 0..100 {
        if db.status(student_id, course_id).await == Some(want) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn test_spawned_dispatcher_applies_events() {
    let db = setup().await;
    let math = math_plan(&db).await;
    let student = db.student("ada@example.edu").await;

    let bus = EventBus::new();
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let handle = EventDispatcher::new(Arc::clone(&db.service)).spawn(&bus, shutdown_tx.subscribe());

    bus.publish(ProgressEvent::student_enrolled(student, math.plan));
    assert!(wait_for_status(&db, student, math.math2, Locked).await);

    bus.publish(ProgressEvent::course_passed(student, math.math1, Some(1)));
    assert!(wait_for_status(&db, student, math.math2, Available).await);
    assert_eq!(db.status(student, math.math1).await, Some(Passed));
    assert_eq!(db.status(student, math.math3).await, Some(Locked));

    shutdown_tx.send(()).expect("dispatcher listening");
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("dispatcher stops on shutdown")
        .expect("dispatcher task");
}

#[tokio::test]
async fn test_failed_event_does_not_stop_dispatcher() {
    let db = setup().await;
    let math = math_plan(&db).await;
    let student = db.student("bo@example.edu").await;

    let bus = EventBus::new();
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let handle = EventDispatcher::new(Arc::clone(&db.service)).spawn(&bus, shutdown_tx.subscribe());

    bus.publish(ProgressEvent::course_passed(StudentId(9_999), math.math1, None));
    bus.publish(ProgressEvent::plan_courses_changed(math.plan));
    bus.publish(ProgressEvent::student_enrolled(student, math.plan));

    assert!(wait_for_status(&db, student, math.math1, Available).await);
    assert!(!handle.is_finished());

    drop(bus);
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("dispatcher stops when the bus closes")
        .expect("dispatcher task");
}

#[tokio::test]
async fn test_handle_routes_recalculate_and_plan_change() {
    let db = setup().await;
    let math = math_plan(&db).await;
    let student = db.student("cy@example.edu").await;
    db.enroll(student, math.plan).await;
    let dispatcher = EventDispatcher::new(Arc::clone(&db.service));

    dispatcher
        .handle(&EventEnvelope::new(ProgressEvent::plan_courses_changed(math.plan)))
        .await
        .expect("plan change");
    assert_eq!(db.status(student, math.math2).await, Some(Locked));

    db.service
        .set_status(student, math.math1, Passed, None)
        .await
        .expect("pass without unlock");
    dispatcher
        .handle(&EventEnvelope::new(ProgressEvent::recalculate_requested(student)))
        .await
        .expect("recalculate");
    assert_eq!(db.status(student, math.math2).await, Some(Available));

    let err = dispatcher
        .handle(&EventEnvelope::new(ProgressEvent::recalculate_requested(StudentId(9_999))))
        .await;
    assert!(err.is_err());
}

#[tokio::test]
async fn test_recompute_sweep_reconciles_every_student() {
    let db = setup().await;
    let math = math_plan(&db).await;
    let drifted = db.student("dot@example.edu").await;
    let settled = db.student("eve@example.edu").await;
    let idle = db.student("fin@example.edu").await;
    db.service.seed(drifted, math.plan).await.expect("seed");
    db.service.seed(settled, math.plan).await.expect("seed");

    db.service
        .set_status(drifted, math.math1, Passed, None)
        .await
        .expect("pass without unlock");

    let stats = run_recompute_sweep(Arc::clone(&db.service))
        .await
        .expect("sweep");
    assert_eq!(
        stats,
        SweepStats {
            students: 2,
            transitions: 1,
            failures: 0,
        }
    );
    assert_eq!(db.status(drifted, math.math2).await, Some(Available));
    assert!(db.statuses(idle).await.is_empty());

    let again = run_recompute_sweep(Arc::clone(&db.service))
        .await
        .expect("second sweep");
    assert_eq!(again.transitions, 0);
}

#[tokio::test]
async fn test_recompute_sweep_tolerates_prerequisite_cycle() {
    let db = setup().await;
    let plan = db.plan("Loop").await;
    let a = db.course(plan, "A", &[], &[]).await;
    let b = db.course(plan, "B", &[a], &[]).await;
    db.add_prerequisite(a, b).await;
    let student = db.student("gil@example.edu").await;
    db.service.seed(student, plan).await.expect("seed");

    let stats = run_recompute_sweep(Arc::clone(&db.service))
        .await
        .expect("sweep");
    assert_eq!(stats.students, 1);
    assert_eq!(stats.transitions, 0);
    assert_eq!(stats.failures, 0);
    assert_eq!(db.status(student, a).await, Some(Locked));
    assert_eq!(db.status(student, b).await, Some(Locked));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_worker_manager_only_runs_on_leader() {
    let db = setup().await;

    let follower = WorkerManager::new(Arc::clone(&db.service), WorkerConfig::default())
        .await
        .expect("scheduler");
    follower.start().await.expect("start follower");
    assert!(!follower.is_running());

    let leader = WorkerManager::new(
        Arc::clone(&db.service),
        WorkerConfig {
            leader: true,
            ..WorkerConfig::default()
        },
    )
    .await
    .expect("scheduler");
    leader.start().await.expect("start leader");
    assert!(leader.is_running());

    leader.stop().await;
    assert!(!leader.is_running());
}
