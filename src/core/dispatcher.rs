use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::event_bus::{EventBus, EventEnvelope, ProgressEvent};
use crate::services::course_status::{CourseStatusError, CourseStatusService};

/// Routes bus events to the matching engine operation.
pub struct EventDispatcher {
    service: Arc<CourseStatusService>,
}

impl EventDispatcher {
    pub fn new(service: Arc<CourseStatusService>) -> Self {
        Self { service }
    }

    /// Subscribes before returning, so events published after this call are
    /// never missed. The task ends on shutdown or when the bus is dropped.
    pub fn spawn(self, bus: &EventBus, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            info!("Event dispatcher started");
            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    received = rx.recv() => match received {
                        Ok(envelope) => {
                            if let Err(err) = self.handle(&envelope).await {
                                error!(
                                    event_id = %envelope.id,
                                    event_type = envelope.event.event_type(),
                                    error = %err,
                                    "Failed to apply progress event"
                                );
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Event dispatcher lagged; run a recompute to reconcile");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
            info!("Event dispatcher stopped");
        })
    }

    pub async fn handle(&self, envelope: &EventEnvelope) -> Result<(), CourseStatusError> {
        debug!(
            event_id = %envelope.id,
            event_type = envelope.event.event_type(),
            "Dispatching event"
        );

        match &envelope.event {
            ProgressEvent::PlanCoursesChanged(p) => {
                self.service.sync_plan_for_all_students(p.plan_id).await?;
            }
            ProgressEvent::StudentEnrolled(p) => {
                self.service.enroll_student(p.student_id, p.plan_id).await?;
            }
            ProgressEvent::CoursePassed(p) => {
                self.service
                    .record_pass(p.student_id, p.course_id, p.attempt_count)
                    .await?;
            }
            ProgressEvent::RecalculateRequested(p) => {
                self.service.recompute_all(p.student_id).await?;
            }
        }
        Ok(())
    }
}
