use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use super::assignment::AssignmentSelector;
use super::clock::{Clock, SystemClock};
use super::domain::{
    Actor, Application, ApplicationAssignmentLog, ApplicationDraft, ApplicationId,
    ApplicationStatusLog, AssignmentLogEntry, CourseId, NewApplication, PartnerId, StaffId,
    StaffMember, StatusLogEntry, StatusType, StatusTypeId, Student, StudentId, University,
    UniversityId, UserId,
};
use super::notifications::{Notification, Notifier};
use super::status::{
    self, ApplicationMilestones, StatusError, StatusHistoryEntry, StatusResolutionError,
};
use super::store::{ApplicationStore, RepositoryError};
use crate::workflows::dashboard::{DashboardCounts, DashboardHub};

/// Service composing storage, the assignment selector, notifications, and
/// the dashboard feed.
pub struct ApplicationService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    dashboard: DashboardHub,
    clock: Arc<dyn Clock>,
}

/// Result of a status update request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusUpdate {
    pub application: Application,
    pub previous_status: Option<StatusTypeId>,
    /// Row appended for this update; `None` when the status did not change.
    pub log: Option<ApplicationStatusLog>,
}

impl StatusUpdate {
    pub fn changed(&self) -> bool {
        self.log.is_some()
    }
}

struct Assigned {
    manager: StaffMember,
    university: University,
}

struct StatusChange {
    update: StatusUpdate,
    partner_user: Option<UserId>,
    student_name: String,
}

enum StatusOutcome {
    Unchanged(Application),
    Changed(StatusChange),
}

impl<S, N> ApplicationService<S, N>
where
    S: ApplicationStore + 'static,
    N: Notifier + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>, dashboard: DashboardHub) -> Self {
        Self::with_clock(store, notifier, dashboard, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<S>,
        notifier: Arc<N>,
        dashboard: DashboardHub,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            notifier,
            dashboard,
            clock,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn dashboard(&self) -> &DashboardHub {
        &self.dashboard
    }

    /// Create or update a student record and refresh the dashboard.
    pub fn save_student(&self, student: Student) -> Result<Student, ApplicationServiceError> {
        if student.name.trim().is_empty() {
            return Err(ApplicationServiceError::InvalidStudentName);
        }
        let created = self.store.atomically::<_, ApplicationServiceError, _>(|tx| {
            if let Some(partner_id) = student.partner_id {
                tx.partner(partner_id)?
                    .ok_or(ApplicationServiceError::UnknownPartner(partner_id))?;
            }
            let created = tx.student(student.id)?.is_none();
            tx.put_student(student.clone())?;
            Ok(created)
        })?;

        info!(
            student_id = %student.id,
            partner_id = ?student.partner_id,
            created,
            "student saved"
        );
        self.publish_dashboard();
        Ok(student)
    }

    /// Open a new application, log its initial status, and hand it to the
    /// next application manager for its university.
    ///
    /// Assignment is best effort: when nobody is eligible the application is
    /// still created, just without a manager.
    pub fn create(
        &self,
        request: NewApplication,
        actor: Actor,
    ) -> Result<Application, ApplicationServiceError> {
        let now = self.clock.now();
        let application = self.store.atomically::<_, ApplicationServiceError, _>(|tx| {
            tx.student(request.student_id)?
                .ok_or(ApplicationServiceError::UnknownStudent(request.student_id))?;

            let university = match request.course_id {
                Some(course_id) => {
                    let course = tx
                        .course(course_id)?
                        .ok_or(ApplicationServiceError::UnknownCourse(course_id))?;
                    tx.university(course.university_id)?
                }
                None => None,
            };
            if let Some(status_id) = request.status_id {
                status::resolve_status(tx, status_id, university.as_ref())?;
            }

            let application = tx.insert_application(ApplicationDraft {
                student_id: request.student_id,
                course_id: request.course_id,
                current_status: request.status_id,
                intake: request.intake.clone(),
                year: request.year,
                created_by: actor.user,
                created: now,
            })?;
            tx.append_status_log(StatusLogEntry {
                application_id: application.id,
                status: application.current_status,
                created_by: actor.user,
                created: now,
            })?;
            Ok(application)
        })?;

        info!(
            application_id = %application.id,
            student_id = %application.student_id,
            "application created"
        );

        let application = match self.assign_next(&application, actor) {
            Some((_, assigned)) => assigned,
            None => application,
        };
        self.publish_dashboard();
        Ok(application)
    }

    /// Round-robin assignment of `application` to an application manager.
    ///
    /// Never fails: missing course data, an empty roster, or storage errors
    /// are logged and reported as `None`, with nothing written.
    pub fn assign_application_manager(
        &self,
        application: &Application,
        actor: Actor,
    ) -> Option<StaffMember> {
        self.assign_next(application, actor)
            .map(|(manager, _)| manager)
    }

    fn assign_next(
        &self,
        application: &Application,
        actor: Actor,
    ) -> Option<(StaffMember, Application)> {
        if application.course_id.is_none() {
            error!(
                application_id = %application.id,
                "application course or university is missing"
            );
            return None;
        }

        let now = self.clock.now();
        let outcome = self.store.atomically::<_, ApplicationServiceError, _>(|tx| {
            let Some(university) = tx.application_university(application)? else {
                return Err(ApplicationServiceError::MissingUniversity(application.id));
            };
            let Some(manager) =
                AssignmentSelector::next_application_manager(tx, university.id, now.date_naive())?
            else {
                return Ok(None);
            };

            let mut current = tx
                .application(application.id)?
                .ok_or(RepositoryError::NotFound)?;
            current.application_manager = Some(manager.user_id);
            current.modified = now;
            tx.update_application(current.clone())?;
            tx.append_assignment_log(AssignmentLogEntry {
                application_id: application.id,
                assigned_to: manager.id,
                assigned_by: actor.user,
                created: now,
            })?;

            Ok(Some((Assigned { manager, university }, current)))
        });

        match outcome {
            Ok(Some((Assigned { manager, university }, current))) => {
                info!(
                    application_id = %application.id,
                    staff_id = %manager.id,
                    university = %university.name,
                    "application manager assigned"
                );
                self.send(Notification::manager_assigned(
                    manager.user_id,
                    actor.user,
                    &university.name,
                    application.id,
                ));
                Some((manager, current))
            }
            Ok(None) => {
                warn!(
                    application_id = %application.id,
                    "no application managers available for university"
                );
                None
            }
            Err(ApplicationServiceError::MissingUniversity(id)) => {
                error!(
                    application_id = %id,
                    "data referenced by the application does not exist"
                );
                None
            }
            Err(err) => {
                error!(
                    application_id = %application.id,
                    error = %err,
                    "unexpected error during application manager assignment"
                );
                None
            }
        }
    }

    /// Manually hand an application to `staff_id`, recording who did it.
    pub fn reassign(
        &self,
        application_id: ApplicationId,
        staff_id: StaffId,
        actor: Actor,
    ) -> Result<Application, ApplicationServiceError> {
        let now = self.clock.now();
        let (application, manager, university) =
            self.store.atomically::<_, ApplicationServiceError, _>(|tx| {
            let mut application = tx
                .application(application_id)?
                .ok_or(RepositoryError::NotFound)?;
            let manager = tx
                .staff_member(staff_id)?
                .ok_or(ApplicationServiceError::UnknownStaff(staff_id))?;
            if !manager.is_active {
                return Err(ApplicationServiceError::InactiveStaff(staff_id));
            }
            let university = tx.application_university(&application)?;

            application.application_manager = Some(manager.user_id);
            application.modified = now;
            tx.update_application(application.clone())?;
            tx.append_assignment_log(AssignmentLogEntry {
                application_id,
                assigned_to: manager.id,
                assigned_by: actor.user,
                created: now,
            })?;
            Ok((application, manager, university))
        })?;

        info!(
            application_id = %application_id,
            staff_id = %staff_id,
            assigned_by = ?actor.user,
            "application reassigned"
        );
        match university {
            Some(university) => self.send(Notification::manager_assigned(
                manager.user_id,
                actor.user,
                &university.name,
                application_id,
            )),
            None => info!(
                application_id = %application_id,
                "no university on application, manager not notified"
            ),
        }
        self.publish_dashboard();
        Ok(application)
    }

    /// Move an application to `status_id`. The application write and the
    /// status log row commit together; re-applying the current status is a
    /// no-op.
    pub fn update_status(
        &self,
        application_id: ApplicationId,
        status_id: StatusTypeId,
        actor: Actor,
    ) -> Result<StatusUpdate, ApplicationServiceError> {
        let now = self.clock.now();
        let outcome = self.store.atomically::<_, ApplicationServiceError, _>(|tx| {
            let mut application = tx
                .application(application_id)?
                .ok_or(RepositoryError::NotFound)?;
            let previous_status = application.current_status;
            if previous_status == Some(status_id) {
                return Ok(StatusOutcome::Unchanged(application));
            }

            let university = tx.application_university(&application)?;
            let status = status::resolve_status(tx, status_id, university.as_ref())?;

            application.current_status = Some(status.id);
            application.modified = now;
            tx.update_application(application.clone())?;
            let log = tx.append_status_log(StatusLogEntry {
                application_id,
                status: Some(status.id),
                created_by: actor.user,
                created: now,
            })?;

            let student = tx.student(application.student_id)?;
            let partner_user = match student.as_ref().and_then(|student| student.partner_id) {
                Some(partner_id) => tx.partner(partner_id)?.and_then(|partner| partner.user_id),
                None => None,
            };

            Ok(StatusOutcome::Changed(StatusChange {
                update: StatusUpdate {
                    application,
                    previous_status,
                    log: Some(log),
                },
                partner_user,
                student_name: student.map(|student| student.name).unwrap_or_default(),
            }))
        })?;

        let change = match outcome {
            StatusOutcome::Changed(change) => change,
            StatusOutcome::Unchanged(application) => {
                return Ok(StatusUpdate {
                    previous_status: application.current_status,
                    application,
                    log: None,
                });
            }
        };

        info!(
            application_id = %application_id,
            status_id = %status_id,
            previous_status = ?change.update.previous_status,
            "application status changed"
        );
        if let Some(recipient) = change.partner_user {
            self.send(Notification::status_changed(
                recipient,
                actor.user,
                &change.student_name,
                application_id,
            ));
        }
        self.publish_dashboard();
        Ok(change.update)
    }

    /// Toggle whether the application counts as active.
    pub fn set_active(
        &self,
        application_id: ApplicationId,
        is_active: bool,
    ) -> Result<Application, ApplicationServiceError> {
        let now = self.clock.now();
        let application = self.store.atomically::<_, ApplicationServiceError, _>(|tx| {
            let mut application = tx
                .application(application_id)?
                .ok_or(RepositoryError::NotFound)?;
            application.is_active = is_active;
            application.modified = now;
            tx.update_application(application.clone())?;
            Ok(application)
        })?;
        self.publish_dashboard();
        Ok(application)
    }

    pub fn get(&self, application_id: ApplicationId) -> Result<Application, ApplicationServiceError> {
        let application = self.store.atomically(|tx| {
            tx.application(application_id)?
                .ok_or(RepositoryError::NotFound)
        })?;
        Ok(application)
    }

    pub fn status_history(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<StatusHistoryEntry>, ApplicationServiceError> {
        self.store.atomically(|tx| {
            tx.application(application_id)?
                .ok_or(RepositoryError::NotFound)?;
            Ok(status::status_history(tx, application_id)?)
        })
    }

    pub fn assignment_history(
        &self,
        application_id: ApplicationId,
    ) -> Result<Vec<ApplicationAssignmentLog>, ApplicationServiceError> {
        self.store.atomically(|tx| {
            tx.application(application_id)?
                .ok_or(RepositoryError::NotFound)?;
            Ok(tx.assignment_logs(application_id)?)
        })
    }

    pub fn milestones(
        &self,
        application_id: ApplicationId,
    ) -> Result<ApplicationMilestones, ApplicationServiceError> {
        self.store.atomically(|tx| {
            tx.application(application_id)?
                .ok_or(RepositoryError::NotFound)?;
            Ok(status::milestones(tx, application_id)?)
        })
    }

    /// When the application most recently entered the status named `name`.
    pub fn status_date(
        &self,
        application_id: ApplicationId,
        name: &str,
    ) -> Result<Option<DateTime<Utc>>, ApplicationServiceError> {
        self.store.atomically(|tx| {
            Ok(status::latest_log_with_status(tx, application_id, name)?.map(|log| log.created))
        })
    }

    /// Who would receive the next application for `university` right now.
    pub fn preview_next_manager(
        &self,
        university: UniversityId,
    ) -> Result<Option<StaffMember>, ApplicationServiceError> {
        let today = self.clock.now().date_naive();
        self.store.atomically(|tx| {
            tx.university(university)?
                .ok_or(ApplicationServiceError::UnknownUniversity(university))?;
            Ok(AssignmentSelector::next_application_manager(
                tx, university, today,
            )?)
        })
    }

    pub fn last_assigned_manager(
        &self,
        university: UniversityId,
    ) -> Result<Option<StaffMember>, ApplicationServiceError> {
        self.store.atomically(|tx| {
            tx.university(university)?
                .ok_or(ApplicationServiceError::UnknownUniversity(university))?;
            Ok(AssignmentSelector::last_assigned_manager(tx, university)?)
        })
    }

    /// Active catalog entries, limited to a country's list when one is given.
    pub fn status_types(
        &self,
        country: Option<&str>,
    ) -> Result<Vec<StatusType>, ApplicationServiceError> {
        self.store.atomically(|tx| match country {
            Some(country) => Ok(status::statuses_for_country(tx, country)?),
            None => Ok(tx
                .status_types()?
                .into_iter()
                .filter(|status| status.is_active)
                .collect()),
        })
    }

    pub fn create_status_type(
        &self,
        name: &str,
        priority: i32,
    ) -> Result<StatusType, ApplicationServiceError> {
        if name.trim().is_empty() {
            return Err(ApplicationServiceError::InvalidStatusName);
        }
        let status = self
            .store
            .atomically(|tx| tx.insert_status_type(name, priority))?;
        info!(status_id = %status.id, name = %status.name, "status type created");
        Ok(status)
    }

    /// Retire a status. Applications already in it keep it and their history.
    pub fn deactivate_status_type(
        &self,
        status_id: StatusTypeId,
    ) -> Result<StatusType, ApplicationServiceError> {
        self.store.atomically(|tx| {
            let mut status = tx
                .status_type(status_id)?
                .ok_or(StatusError::Unknown(status_id))?;
            status.is_active = false;
            tx.update_status_type(status.clone())?;
            Ok(status)
        })
    }

    pub fn set_country_statuses(
        &self,
        country: &str,
        statuses: Vec<StatusTypeId>,
    ) -> Result<(), ApplicationServiceError> {
        self.store
            .atomically(|tx| tx.set_country_statuses(country, statuses))?;
        Ok(())
    }

    pub fn dashboard_counts(&self) -> Result<DashboardCounts, ApplicationServiceError> {
        let today = self.clock.now().date_naive();
        Ok(self
            .store
            .atomically(|tx| DashboardCounts::collect(tx, today))?)
    }

    fn publish_dashboard(&self) {
        match self.dashboard_counts() {
            Ok(counts) => self.dashboard.publish(counts),
            Err(err) => warn!(error = %err, "dashboard counts unavailable"),
        }
    }

    fn send(&self, notification: Notification) {
        let recipient = notification.recipient;
        if let Err(err) = self.notifier.notify(notification) {
            warn!(recipient = %recipient, error = %err, "notification not delivered");
        }
    }
}

/// Error raised by the application service.
#[derive(Debug, thiserror::Error)]
pub enum ApplicationServiceError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Status(#[from] StatusError),
    #[error("student {0} does not exist")]
    UnknownStudent(StudentId),
    #[error("partner {0} does not exist")]
    UnknownPartner(PartnerId),
    #[error("course {0} does not exist")]
    UnknownCourse(CourseId),
    #[error("university {0} does not exist")]
    UnknownUniversity(UniversityId),
    #[error("staff member {0} does not exist")]
    UnknownStaff(StaffId),
    #[error("staff member {0} is inactive")]
    InactiveStaff(StaffId),
    #[error("application {0} has no course or university")]
    MissingUniversity(ApplicationId),
    #[error("status name must not be empty")]
    InvalidStatusName,
    #[error("student name must not be empty")]
    InvalidStudentName,
}

impl From<StatusResolutionError> for ApplicationServiceError {
    fn from(value: StatusResolutionError) -> Self {
        match value {
            StatusResolutionError::Status(err) => Self::Status(err),
            StatusResolutionError::Repository(err) => Self::Repository(err),
        }
    }
}
