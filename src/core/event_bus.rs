use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::types::{CourseId, PlanId, StudentId};

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ProgressEvent {
    /// A course was added to or removed from the plan.
    #[serde(rename = "PLAN_COURSES_CHANGED")]
    PlanCoursesChanged(PlanCoursesChangedPayload),

    #[serde(rename = "STUDENT_ENROLLED")]
    StudentEnrolled(StudentEnrolledPayload),

    #[serde(rename = "COURSE_PASSED")]
    CoursePassed(CoursePassedPayload),

    #[serde(rename = "RECALCULATE_REQUESTED")]
    RecalculateRequested(RecalculateRequestedPayload),
}

impl ProgressEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ProgressEvent::PlanCoursesChanged(_) => "PLAN_COURSES_CHANGED",
            ProgressEvent::StudentEnrolled(_) => "STUDENT_ENROLLED",
            ProgressEvent::CoursePassed(_) => "COURSE_PASSED",
            ProgressEvent::RecalculateRequested(_) => "RECALCULATE_REQUESTED",
        }
    }

    /// Plan-wide events carry no student.
    pub fn student_id(&self) -> Option<StudentId> {
        match self {
            ProgressEvent::PlanCoursesChanged(_) => None,
            ProgressEvent::StudentEnrolled(p) => Some(p.student_id),
            ProgressEvent::CoursePassed(p) => Some(p.student_id),
            ProgressEvent::RecalculateRequested(p) => Some(p.student_id),
        }
    }

    pub fn plan_courses_changed(plan_id: PlanId) -> Self {
        ProgressEvent::PlanCoursesChanged(PlanCoursesChangedPayload {
            plan_id,
            timestamp: Utc::now(),
        })
    }

    pub fn student_enrolled(student_id: StudentId, plan_id: PlanId) -> Self {
        ProgressEvent::StudentEnrolled(StudentEnrolledPayload {
            student_id,
            plan_id,
            timestamp: Utc::now(),
        })
    }

    pub fn course_passed(
        student_id: StudentId,
        course_id: CourseId,
        attempt_count: Option<u32>,
    ) -> Self {
        ProgressEvent::CoursePassed(CoursePassedPayload {
            student_id,
            course_id,
            attempt_count,
            timestamp: Utc::now(),
        })
    }

    pub fn recalculate_requested(student_id: StudentId) -> Self {
        ProgressEvent::RecalculateRequested(RecalculateRequestedPayload {
            student_id,
            timestamp: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanCoursesChangedPayload {
    pub plan_id: PlanId,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentEnrolledPayload {
    pub student_id: StudentId,
    pub plan_id: PlanId,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoursePassedPayload {
    pub student_id: StudentId,
    pub course_id: CourseId,
    #[serde(default)]
    pub attempt_count: Option<u32>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecalculateRequestedPayload {
    pub student_id: StudentId,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub id: String,
    pub event: ProgressEvent,
    pub created_at: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn new(event: ProgressEvent) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event,
            created_at: Utc::now(),
        }
    }
}

/// In-process fan-out of progress events to every subscriber.
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Returns the envelope id.
    pub fn publish(&self, event: ProgressEvent) -> String {
        let envelope = EventEnvelope::new(event);
        let event_type = envelope.event.event_type();
        let student_id = envelope.event.student_id();
        let id = envelope.id.clone();

        match self.sender.send(envelope) {
            Ok(receivers) => debug!(
                event_type,
                student_id = ?student_id,
                sent_to = receivers,
                "Event published"
            ),
            Err(_) => debug!(event_type, "No subscribers for event"),
        }

        id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
