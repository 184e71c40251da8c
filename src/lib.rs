pub mod config;
pub mod core;
pub mod db;
pub mod engine;
pub mod logging;
pub mod services;
pub mod state;
pub mod types;
pub mod workers;

pub use services::course_status::{CourseStatusError, CourseStatusService};
pub use types::{CourseId, CourseStatus, PlanId, StudentId};
