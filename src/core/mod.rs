mod dispatcher;
mod event_bus;

pub use dispatcher::EventDispatcher;
pub use event_bus::{
    CoursePassedPayload, EventBus, EventEnvelope, PlanCoursesChangedPayload, ProgressEvent,
    RecalculateRequestedPayload, StudentEnrolledPayload,
};
