use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            Serialize,
            Deserialize,
            sqlx::Type,
        )]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

id_type!(StudentId);
id_type!(CourseId);
id_type!(PlanId);

/// Progression status of one course for one student.
///
/// Only `Locked <-> Available` is ever changed automatically; `InProgress`
/// and `Passed` are asserted by the student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CourseStatus {
    Locked,
    Available,
    InProgress,
    Passed,
}

impl CourseStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Locked => "LOCKED",
            Self::Available => "AVAILABLE",
            Self::InProgress => "IN_PROGRESS",
            Self::Passed => "PASSED",
        }
    }

    /// Integer code stored in `student_courses.statusId`.
    pub const fn code(self) -> i64 {
        match self {
            Self::Available => 1,
            Self::InProgress => 2,
            Self::Locked => 3,
            Self::Passed => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Available),
            2 => Some(Self::InProgress),
            3 => Some(Self::Locked),
            4 => Some(Self::Passed),
            _ => None,
        }
    }

    /// Statuses the engine may rewrite on its own.
    pub const fn is_automatic(self) -> bool {
        matches!(self, Self::Locked | Self::Available)
    }
}

impl fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequirementKind {
    Prerequisite,
    Corequisite,
}

impl RequirementKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Prerequisite => "PREREQUISITE",
            Self::Corequisite => "COREQUISITE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PREREQUISITE" => Some(Self::Prerequisite),
            "COREQUISITE" => Some(Self::Corequisite),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: CourseId,
    pub study_plan_id: PlanId,
    pub code: String,
    pub name: String,
    pub credits: i64,
}

/// Directed edge: `course_id` requires `required_course_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    pub course_id: CourseId,
    pub required_course_id: CourseId,
    pub kind: RequirementKind,
}

impl Requirement {
    pub fn prerequisite(course_id: CourseId, required_course_id: CourseId) -> Self {
        Self {
            course_id,
            required_course_id,
            kind: RequirementKind::Prerequisite,
        }
    }

    pub fn corequisite(course_id: CourseId, required_course_id: CourseId) -> Self {
        Self {
            course_id,
            required_course_id,
            kind: RequirementKind::Corequisite,
        }
    }

    pub fn is_prerequisite(&self) -> bool {
        self.kind == RequirementKind::Prerequisite
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentCourseStatus {
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub status: CourseStatus,
    pub attempt_count: u32,
}

/// A listing row joined with the course code and the stored status name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentCourseView {
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub course_code: String,
    pub status: CourseStatus,
    pub status_name: String,
    pub attempt_count: u32,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusTransition {
    pub course_id: CourseId,
    pub from: CourseStatus,
    pub to: CourseStatus,
}
