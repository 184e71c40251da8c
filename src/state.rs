use std::sync::Arc;

use crate::core::EventBus;
use crate::db::Database;
use crate::services::course_status::CourseStatusService;

/// Shared handles for the surrounding service layer.
#[derive(Clone)]
pub struct AppState {
    db: Database,
    course_status: Arc<CourseStatusService>,
    event_bus: Arc<EventBus>,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        let course_status = Arc::new(CourseStatusService::new(db.pool().clone()));
        Self {
            db,
            course_status,
            event_bus: Arc::new(EventBus::new()),
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn course_status(&self) -> Arc<CourseStatusService> {
        Arc::clone(&self.course_status)
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }
}
