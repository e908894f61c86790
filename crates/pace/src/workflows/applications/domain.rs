use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Login identity of a person using the platform.
    UserId
);
entity_id!(
    /// Employee record; distinct from the employee's login [`UserId`].
    StaffId
);
entity_id!(UniversityId);
entity_id!(CourseId);
entity_id!(PartnerId);
entity_id!(StudentId);
entity_id!(StatusTypeId);
entity_id!(ApplicationId);
entity_id!(StatusLogId);
entity_id!(AssignmentLogId);

/// The user on whose behalf an operation runs. `None` marks system writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user: Option<UserId>,
}

impl Actor {
    pub const fn system() -> Self {
        Self { user: None }
    }

    pub const fn user(id: UserId) -> Self {
        Self { user: Some(id) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct University {
    pub id: UniversityId,
    pub name: String,
    pub country: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub name: String,
    pub university_id: UniversityId,
    pub is_active: bool,
}

/// Recruitment agency referring students.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partner {
    pub id: PartnerId,
    pub company_name: String,
    pub user_id: Option<UserId>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub partner_id: Option<PartnerId>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    ApplicationManager,
    InterviewOfficer,
    RegionalMarketingHead,
    Administrator,
}

impl StaffRole {
    pub const fn label(self) -> &'static str {
        match self {
            StaffRole::ApplicationManager => "application_manager",
            StaffRole::InterviewOfficer => "interview_officer",
            StaffRole::RegionalMarketingHead => "regional_marketing_head",
            StaffRole::Administrator => "administrator",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        [
            StaffRole::ApplicationManager,
            StaffRole::InterviewOfficer,
            StaffRole::RegionalMarketingHead,
            StaffRole::Administrator,
        ]
        .into_iter()
        .find(|role| role.label() == normalized)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: StaffId,
    pub user_id: UserId,
    pub name: String,
    pub role: StaffRole,
    pub assigned_universities: BTreeSet<UniversityId>,
    pub is_on_leave: bool,
    pub is_active: bool,
}

impl StaffMember {
    /// Whether this employee may receive new applications for `university`.
    pub fn can_manage(&self, university: UniversityId) -> bool {
        self.role == StaffRole::ApplicationManager
            && self.is_active
            && !self.is_on_leave
            && self.assigned_universities.contains(&university)
    }
}

/// Admin-configurable stage of the application pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusType {
    pub id: StatusTypeId,
    pub name: String,
    pub priority: i32,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub student_id: StudentId,
    pub course_id: Option<CourseId>,
    pub current_status: Option<StatusTypeId>,
    pub intake: Option<String>,
    pub year: Option<i32>,
    pub application_manager: Option<UserId>,
    pub is_active: bool,
    pub created_by: Option<UserId>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

/// Fields of an application before storage assigns its identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationDraft {
    pub student_id: StudentId,
    pub course_id: Option<CourseId>,
    pub current_status: Option<StatusTypeId>,
    pub intake: Option<String>,
    pub year: Option<i32>,
    pub created_by: Option<UserId>,
    pub created: DateTime<Utc>,
}

/// Caller-supplied request to open a new application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewApplication {
    pub student_id: StudentId,
    #[serde(default)]
    pub course_id: Option<CourseId>,
    #[serde(default)]
    pub status_id: Option<StatusTypeId>,
    #[serde(default)]
    pub intake: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
}

/// One row of the append-only status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationStatusLog {
    pub id: StatusLogId,
    pub application_id: ApplicationId,
    pub status: Option<StatusTypeId>,
    pub created_by: Option<UserId>,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLogEntry {
    pub application_id: ApplicationId,
    pub status: Option<StatusTypeId>,
    pub created_by: Option<UserId>,
    pub created: DateTime<Utc>,
}

/// One row of the append-only assignment history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationAssignmentLog {
    pub id: AssignmentLogId,
    pub application_id: ApplicationId,
    pub assigned_to: StaffId,
    pub assigned_by: Option<UserId>,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentLogEntry {
    pub application_id: ApplicationId,
    pub assigned_to: StaffId,
    pub assigned_by: Option<UserId>,
    pub created: DateTime<Utc>,
}
