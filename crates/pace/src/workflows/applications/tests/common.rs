use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::applications::domain::{
    Application, ApplicationAssignmentLog, ApplicationDraft, ApplicationId,
    ApplicationStatusLog, AssignmentLogEntry, Course, CourseId, Partner, PartnerId, StaffId,
    StaffMember, StaffRole, StatusLogEntry, StatusType, StatusTypeId, Student, StudentId,
    University, UniversityId, UserId,
};
use crate::workflows::applications::notifications::{
    Notification, NotificationError, Notifier,
};
use crate::workflows::applications::store::{
    ApplicationStore, RepositoryError, StoreTransaction,
};
use crate::workflows::applications::{
    application_router, ApplicationService, FixedClock, InMemoryStore,
};
use crate::workflows::dashboard::DashboardHub;

pub(super) const LEEDS: UniversityId = UniversityId(1);
pub(super) const MONASH: UniversityId = UniversityId(2);
pub(super) const SORBONNE: UniversityId = UniversityId(3);

pub(super) const LEEDS_MSC: CourseId = CourseId(10);
pub(super) const MONASH_MBA: CourseId = CourseId(20);
pub(super) const ORPHAN_COURSE: CourseId = CourseId(30);
pub(super) const SORBONNE_LAW: CourseId = CourseId(40);

pub(super) const REFERRED_STUDENT: StudentId = StudentId(1);
pub(super) const DIRECT_STUDENT: StudentId = StudentId(2);
pub(super) const PARTNER_USER: UserId = UserId(500);
pub(super) const COUNSELLOR: UserId = UserId(900);

pub(super) const SUBMITTED: StatusTypeId = StatusTypeId(1);
pub(super) const CONDITIONAL_OFFER: StatusTypeId = StatusTypeId(2);
pub(super) const VISA_GRANT: StatusTypeId = StatusTypeId(3);
pub(super) const COE_APPLIED: StatusTypeId = StatusTypeId(4);

pub(super) type TestService = ApplicationService<InMemoryStore, MemoryNotifier>;

pub(super) fn monday_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 9, 30, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn staff(
    id: u64,
    role: StaffRole,
    universities: &[UniversityId],
    is_on_leave: bool,
) -> StaffMember {
    StaffMember {
        id: StaffId(id),
        user_id: UserId(100 + id),
        name: format!("Staff {id}"),
        role,
        assigned_universities: universities.iter().copied().collect::<BTreeSet<_>>(),
        is_on_leave,
        is_active: true,
    }
}

/// Leeds has two available managers (1, 2), one on leave (3), and an
/// interview officer (5). Monash has manager 4. Sorbonne has nobody.
pub(super) fn seed(store: &InMemoryStore) {
    store
        .atomically(|tx| seed_directory(tx))
        .expect("seed directory");
}

fn seed_directory(tx: &mut dyn StoreTransaction) -> Result<(), RepositoryError> {
    for (id, name, country) in [
        (LEEDS, "University of Leeds", "UK"),
        (MONASH, "Monash University", "Australia"),
        (SORBONNE, "Sorbonne University", "France"),
    ] {
        tx.put_university(University {
            id,
            name: name.to_string(),
            country: country.to_string(),
            is_active: true,
        })?;
    }

    for (id, name, university_id) in [
        (LEEDS_MSC, "MSc Data Science", LEEDS),
        (MONASH_MBA, "MBA", MONASH),
        (ORPHAN_COURSE, "Archived Course", UniversityId(99)),
        (SORBONNE_LAW, "LLM", SORBONNE),
    ] {
        tx.put_course(Course {
            id,
            name: name.to_string(),
            university_id,
            is_active: true,
        })?;
    }

    tx.put_partner(Partner {
        id: PartnerId(1),
        company_name: "Global Pathways".to_string(),
        user_id: Some(PARTNER_USER),
        is_active: true,
    })?;
    tx.put_student(Student {
        id: REFERRED_STUDENT,
        name: "Ravi Kumar".to_string(),
        partner_id: Some(PartnerId(1)),
        is_active: true,
    })?;
    tx.put_student(Student {
        id: DIRECT_STUDENT,
        name: "Mei Lin".to_string(),
        partner_id: None,
        is_active: true,
    })?;

    tx.put_staff_member(staff(1, StaffRole::ApplicationManager, &[LEEDS], false))?;
    tx.put_staff_member(staff(2, StaffRole::ApplicationManager, &[LEEDS], false))?;
    tx.put_staff_member(staff(3, StaffRole::ApplicationManager, &[LEEDS], true))?;
    tx.put_staff_member(staff(4, StaffRole::ApplicationManager, &[MONASH], false))?;
    tx.put_staff_member(staff(5, StaffRole::InterviewOfficer, &[LEEDS], false))?;

    for (name, priority) in [
        ("Application Submitted", 1),
        ("Conditional Offer Received", 2),
        ("VISA Grant", 3),
        ("COE Applied", 4),
    ] {
        tx.insert_status_type(name, priority)?;
    }
    tx.set_country_statuses("UK", vec![SUBMITTED, CONDITIONAL_OFFER, VISA_GRANT])?;

    Ok(())
}

pub(super) fn build_service() -> (
    TestService,
    Arc<InMemoryStore>,
    Arc<MemoryNotifier>,
    Arc<FixedClock>,
) {
    let store = Arc::new(InMemoryStore::new());
    seed(&store);
    let notifier = Arc::new(MemoryNotifier::default());
    let clock = Arc::new(FixedClock::new(monday_morning()));
    let service = ApplicationService::with_clock(
        store.clone(),
        notifier.clone(),
        DashboardHub::new(8),
        clock.clone(),
    );
    (service, store, notifier, clock)
}

#[derive(Default, Clone)]
pub(super) struct MemoryNotifier {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl MemoryNotifier {
    pub(super) fn events(&self) -> Vec<Notification> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(super) struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify(&self, _notification: Notification) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("smtp relay offline".to_string()))
    }
}

pub(super) struct UnavailableStore;

impl ApplicationStore for UnavailableStore {
    fn atomically<T, E, F>(&self, _work: F) -> Result<T, E>
    where
        E: From<RepositoryError>,
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, E>,
    {
        Err(RepositoryError::Unavailable("database offline".to_string()).into())
    }
}

/// Delegates to an [`InMemoryStore`] but refuses every status log append,
/// so units of work that write a log row must roll back.
pub(super) struct StatusLogRejectingStore {
    pub(super) inner: Arc<InMemoryStore>,
}

impl ApplicationStore for StatusLogRejectingStore {
    fn atomically<T, E, F>(&self, work: F) -> Result<T, E>
    where
        E: From<RepositoryError>,
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, E>,
    {
        self.inner.atomically(|tx| work(&mut RejectStatusLogs { inner: tx }))
    }
}

struct RejectStatusLogs<'a> {
    inner: &'a mut dyn StoreTransaction,
}

impl StoreTransaction for RejectStatusLogs<'_> {
    fn application(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError> {
        self.inner.application(id)
    }

    fn applications(&self) -> Result<Vec<Application>, RepositoryError> {
        self.inner.applications()
    }

    fn insert_application(
        &mut self,
        draft: ApplicationDraft,
    ) -> Result<Application, RepositoryError> {
        self.inner.insert_application(draft)
    }

    fn update_application(&mut self, application: Application) -> Result<(), RepositoryError> {
        self.inner.update_application(application)
    }

    fn status_logs(
        &self,
        application: ApplicationId,
    ) -> Result<Vec<ApplicationStatusLog>, RepositoryError> {
        self.inner.status_logs(application)
    }

    fn append_status_log(
        &mut self,
        _entry: StatusLogEntry,
    ) -> Result<ApplicationStatusLog, RepositoryError> {
        Err(RepositoryError::Unavailable(
            "status log table locked".to_string(),
        ))
    }

    fn assignment_logs(
        &self,
        application: ApplicationId,
    ) -> Result<Vec<ApplicationAssignmentLog>, RepositoryError> {
        self.inner.assignment_logs(application)
    }

    fn assignment_logs_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ApplicationAssignmentLog>, RepositoryError> {
        self.inner.assignment_logs_between(from, to)
    }

    fn all_assignment_logs(&self) -> Result<Vec<ApplicationAssignmentLog>, RepositoryError> {
        self.inner.all_assignment_logs()
    }

    fn append_assignment_log(
        &mut self,
        entry: AssignmentLogEntry,
    ) -> Result<ApplicationAssignmentLog, RepositoryError> {
        self.inner.append_assignment_log(entry)
    }

    fn university(&self, id: UniversityId) -> Result<Option<University>, RepositoryError> {
        self.inner.university(id)
    }

    fn put_university(&mut self, university: University) -> Result<(), RepositoryError> {
        self.inner.put_university(university)
    }

    fn course(&self, id: CourseId) -> Result<Option<Course>, RepositoryError> {
        self.inner.course(id)
    }

    fn put_course(&mut self, course: Course) -> Result<(), RepositoryError> {
        self.inner.put_course(course)
    }

    fn student(&self, id: StudentId) -> Result<Option<Student>, RepositoryError> {
        self.inner.student(id)
    }

    fn students(&self) -> Result<Vec<Student>, RepositoryError> {
        self.inner.students()
    }

    fn put_student(&mut self, student: Student) -> Result<(), RepositoryError> {
        self.inner.put_student(student)
    }

    fn partner(&self, id: PartnerId) -> Result<Option<Partner>, RepositoryError> {
        self.inner.partner(id)
    }

    fn partners(&self) -> Result<Vec<Partner>, RepositoryError> {
        self.inner.partners()
    }

    fn put_partner(&mut self, partner: Partner) -> Result<(), RepositoryError> {
        self.inner.put_partner(partner)
    }

    fn staff_member(&self, id: StaffId) -> Result<Option<StaffMember>, RepositoryError> {
        self.inner.staff_member(id)
    }

    fn staff(&self) -> Result<Vec<StaffMember>, RepositoryError> {
        self.inner.staff()
    }

    fn put_staff_member(&mut self, member: StaffMember) -> Result<(), RepositoryError> {
        self.inner.put_staff_member(member)
    }

    fn status_type(&self, id: StatusTypeId) -> Result<Option<StatusType>, RepositoryError> {
        self.inner.status_type(id)
    }

    fn status_types(&self) -> Result<Vec<StatusType>, RepositoryError> {
        self.inner.status_types()
    }

    fn insert_status_type(
        &mut self,
        name: &str,
        priority: i32,
    ) -> Result<StatusType, RepositoryError> {
        self.inner.insert_status_type(name, priority)
    }

    fn update_status_type(&mut self, status: StatusType) -> Result<(), RepositoryError> {
        self.inner.update_status_type(status)
    }

    fn country_statuses(
        &self,
        country: &str,
    ) -> Result<Option<Vec<StatusTypeId>>, RepositoryError> {
        self.inner.country_statuses(country)
    }

    fn set_country_statuses(
        &mut self,
        country: &str,
        statuses: Vec<StatusTypeId>,
    ) -> Result<(), RepositoryError> {
        self.inner.set_country_statuses(country, statuses)
    }
}

pub(super) fn status_log_count(store: &InMemoryStore, application: ApplicationId) -> usize {
    store
        .atomically(|tx| tx.status_logs(application))
        .expect("status logs readable")
        .len()
}

pub(super) fn application_router_with_service(service: TestService) -> axum::Router {
    application_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
