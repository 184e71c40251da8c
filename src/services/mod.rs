pub mod course_status;
pub mod student_locks;
