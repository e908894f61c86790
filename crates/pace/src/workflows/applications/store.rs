use chrono::{DateTime, Utc};

use super::domain::{
    Application, ApplicationAssignmentLog, ApplicationDraft, ApplicationId,
    ApplicationStatusLog, AssignmentLogEntry, Course, CourseId, Partner, PartnerId, StaffId,
    StaffMember, StatusLogEntry, StatusType, StatusTypeId, Student, StudentId, University,
    UniversityId,
};

/// Storage abstraction; every read and write happens inside a unit of work.
///
/// `atomically` must either apply all writes made through the transaction or
/// none of them. An `Err` returned by `work` rolls the unit back.
pub trait ApplicationStore: Send + Sync {
    fn atomically<T, E, F>(&self, work: F) -> Result<T, E>
    where
        E: From<RepositoryError>,
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, E>;
}

/// Operations available inside a unit of work.
///
/// The two log tables only expose append and read; rows are never changed.
pub trait StoreTransaction {
    fn application(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError>;
    fn applications(&self) -> Result<Vec<Application>, RepositoryError>;
    fn insert_application(&mut self, draft: ApplicationDraft)
        -> Result<Application, RepositoryError>;
    fn update_application(&mut self, application: Application) -> Result<(), RepositoryError>;

    /// Status history of one application, newest first.
    fn status_logs(
        &self,
        application: ApplicationId,
    ) -> Result<Vec<ApplicationStatusLog>, RepositoryError>;
    fn append_status_log(
        &mut self,
        entry: StatusLogEntry,
    ) -> Result<ApplicationStatusLog, RepositoryError>;

    /// Assignment history of one application, newest first.
    fn assignment_logs(
        &self,
        application: ApplicationId,
    ) -> Result<Vec<ApplicationAssignmentLog>, RepositoryError>;
    /// Assignment rows created in `[from, to)`, newest first.
    fn assignment_logs_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ApplicationAssignmentLog>, RepositoryError>;
    /// All assignment rows, newest first.
    fn all_assignment_logs(&self) -> Result<Vec<ApplicationAssignmentLog>, RepositoryError>;
    fn append_assignment_log(
        &mut self,
        entry: AssignmentLogEntry,
    ) -> Result<ApplicationAssignmentLog, RepositoryError>;

    fn university(&self, id: UniversityId) -> Result<Option<University>, RepositoryError>;
    fn put_university(&mut self, university: University) -> Result<(), RepositoryError>;
    fn course(&self, id: CourseId) -> Result<Option<Course>, RepositoryError>;
    fn put_course(&mut self, course: Course) -> Result<(), RepositoryError>;
    fn student(&self, id: StudentId) -> Result<Option<Student>, RepositoryError>;
    fn students(&self) -> Result<Vec<Student>, RepositoryError>;
    fn put_student(&mut self, student: Student) -> Result<(), RepositoryError>;
    fn partner(&self, id: PartnerId) -> Result<Option<Partner>, RepositoryError>;
    fn partners(&self) -> Result<Vec<Partner>, RepositoryError>;
    fn put_partner(&mut self, partner: Partner) -> Result<(), RepositoryError>;

    fn staff_member(&self, id: StaffId) -> Result<Option<StaffMember>, RepositoryError>;
    /// Every employee ordered by id.
    fn staff(&self) -> Result<Vec<StaffMember>, RepositoryError>;
    fn put_staff_member(&mut self, member: StaffMember) -> Result<(), RepositoryError>;

    fn status_type(&self, id: StatusTypeId) -> Result<Option<StatusType>, RepositoryError>;
    /// Catalog ordered by priority, then id.
    fn status_types(&self) -> Result<Vec<StatusType>, RepositoryError>;
    /// Fails with [`RepositoryError::Conflict`] when the name is taken, ignoring case.
    fn insert_status_type(
        &mut self,
        name: &str,
        priority: i32,
    ) -> Result<StatusType, RepositoryError>;
    fn update_status_type(&mut self, status: StatusType) -> Result<(), RepositoryError>;
    /// Restricted status list for a country, if one was registered.
    fn country_statuses(&self, country: &str)
        -> Result<Option<Vec<StatusTypeId>>, RepositoryError>;
    fn set_country_statuses(
        &mut self,
        country: &str,
        statuses: Vec<StatusTypeId>,
    ) -> Result<(), RepositoryError>;

    /// University an application belongs to through its course.
    fn application_university(
        &self,
        application: &Application,
    ) -> Result<Option<University>, RepositoryError> {
        let Some(course_id) = application.course_id else {
            return Ok(None);
        };
        match self.course(course_id)? {
            Some(course) => self.university(course.university_id),
            None => Ok(None),
        }
    }
}

/// Error enumeration for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
