use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

use super::domain::{
    Application, ApplicationAssignmentLog, ApplicationDraft, ApplicationId,
    ApplicationStatusLog, AssignmentLogEntry, AssignmentLogId, Course, CourseId, Partner,
    PartnerId, StaffId, StaffMember, StatusLogEntry, StatusLogId, StatusType, StatusTypeId,
    Student, StudentId, University, UniversityId,
};
use super::store::{ApplicationStore, RepositoryError, StoreTransaction};

/// Process-local store backing the service binary, demos, and tests.
///
/// Units of work are serialized on one mutex. Reads go straight to the live
/// tables; the first write copies them, and the copy replaces the live tables
/// only when the work succeeds. The live tables are never mutated in place,
/// so a unit of work that panics leaves them intact and the lock is reused.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ApplicationStore for InMemoryStore {
    fn atomically<T, E, F>(&self, work: F) -> Result<T, E>
    where
        E: From<RepositoryError>,
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, E>,
    {
        let mut live = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        let mut unit = UnitOfWork {
            live: &*live,
            scratch: None,
        };
        let value = work(&mut unit)?;
        if let Some(scratch) = unit.scratch {
            *live = scratch;
        }
        Ok(value)
    }
}

/// Copy-on-first-write view over the live tables.
struct UnitOfWork<'a> {
    live: &'a Tables,
    scratch: Option<Tables>,
}

impl UnitOfWork<'_> {
    fn read(&self) -> &Tables {
        self.scratch.as_ref().unwrap_or(self.live)
    }

    fn write(&mut self) -> &mut Tables {
        let live = self.live;
        self.scratch.get_or_insert_with(|| live.clone())
    }
}

impl StoreTransaction for UnitOfWork<'_> {
    fn application(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError> {
        self.read().application(id)
    }

    fn applications(&self) -> Result<Vec<Application>, RepositoryError> {
        self.read().applications()
    }

    fn insert_application(
        &mut self,
        draft: ApplicationDraft,
    ) -> Result<Application, RepositoryError> {
        self.write().insert_application(draft)
    }

    fn update_application(&mut self, application: Application) -> Result<(), RepositoryError> {
        self.write().update_application(application)
    }

    fn status_logs(
        &self,
        application: ApplicationId,
    ) -> Result<Vec<ApplicationStatusLog>, RepositoryError> {
        self.read().status_logs(application)
    }

    fn append_status_log(
        &mut self,
        entry: StatusLogEntry,
    ) -> Result<ApplicationStatusLog, RepositoryError> {
        self.write().append_status_log(entry)
    }

    fn assignment_logs(
        &self,
        application: ApplicationId,
    ) -> Result<Vec<ApplicationAssignmentLog>, RepositoryError> {
        self.read().assignment_logs(application)
    }

    fn assignment_logs_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ApplicationAssignmentLog>, RepositoryError> {
        self.read().assignment_logs_between(from, to)
    }

    fn all_assignment_logs(&self) -> Result<Vec<ApplicationAssignmentLog>, RepositoryError> {
        self.read().all_assignment_logs()
    }

    fn append_assignment_log(
        &mut self,
        entry: AssignmentLogEntry,
    ) -> Result<ApplicationAssignmentLog, RepositoryError> {
        self.write().append_assignment_log(entry)
    }

    fn university(&self, id: UniversityId) -> Result<Option<University>, RepositoryError> {
        self.read().university(id)
    }

    fn put_university(&mut self, university: University) -> Result<(), RepositoryError> {
        self.write().put_university(university)
    }

    fn course(&self, id: CourseId) -> Result<Option<Course>, RepositoryError> {
        self.read().course(id)
    }

    fn put_course(&mut self, course: Course) -> Result<(), RepositoryError> {
        self.write().put_course(course)
    }

    fn student(&self, id: StudentId) -> Result<Option<Student>, RepositoryError> {
        self.read().student(id)
    }

    fn students(&self) -> Result<Vec<Student>, RepositoryError> {
        self.read().students()
    }

    fn put_student(&mut self, student: Student) -> Result<(), RepositoryError> {
        self.write().put_student(student)
    }

    fn partner(&self, id: PartnerId) -> Result<Option<Partner>, RepositoryError> {
        self.read().partner(id)
    }

    fn partners(&self) -> Result<Vec<Partner>, RepositoryError> {
        self.read().partners()
    }

    fn put_partner(&mut self, partner: Partner) -> Result<(), RepositoryError> {
        self.write().put_partner(partner)
    }

    fn staff_member(&self, id: StaffId) -> Result<Option<StaffMember>, RepositoryError> {
        self.read().staff_member(id)
    }

    fn staff(&self) -> Result<Vec<StaffMember>, RepositoryError> {
        self.read().staff()
    }

    fn put_staff_member(&mut self, member: StaffMember) -> Result<(), RepositoryError> {
        self.write().put_staff_member(member)
    }

    fn status_type(&self, id: StatusTypeId) -> Result<Option<StatusType>, RepositoryError> {
        self.read().status_type(id)
    }

    fn status_types(&self) -> Result<Vec<StatusType>, RepositoryError> {
        self.read().status_types()
    }

    fn insert_status_type(
        &mut self,
        name: &str,
        priority: i32,
    ) -> Result<StatusType, RepositoryError> {
        self.write().insert_status_type(name, priority)
    }

    fn update_status_type(&mut self, status: StatusType) -> Result<(), RepositoryError> {
        self.write().update_status_type(status)
    }

    fn country_statuses(
        &self,
        country: &str,
    ) -> Result<Option<Vec<StatusTypeId>>, RepositoryError> {
        self.read().country_statuses(country)
    }

    fn set_country_statuses(
        &mut self,
        country: &str,
        statuses: Vec<StatusTypeId>,
    ) -> Result<(), RepositoryError> {
        self.write().set_country_statuses(country, statuses)
    }
}

#[derive(Debug, Clone, Default)]
struct Tables {
    applications: BTreeMap<ApplicationId, Application>,
    status_logs: Vec<ApplicationStatusLog>,
    assignment_logs: Vec<ApplicationAssignmentLog>,
    universities: HashMap<UniversityId, University>,
    courses: HashMap<CourseId, Course>,
    students: BTreeMap<StudentId, Student>,
    partners: BTreeMap<PartnerId, Partner>,
    staff: BTreeMap<StaffId, StaffMember>,
    status_types: BTreeMap<StatusTypeId, StatusType>,
    country_statuses: HashMap<String, Vec<StatusTypeId>>,
    sequences: Sequences,
}

#[derive(Debug, Clone, Default)]
struct Sequences {
    application: u64,
    status_log: u64,
    assignment_log: u64,
    status_type: u64,
}

fn next(counter: &mut u64) -> u64 {
    *counter += 1;
    *counter
}

fn country_key(country: &str) -> String {
    country.trim().to_ascii_lowercase()
}

impl StoreTransaction for Tables {
    fn application(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError> {
        Ok(self.applications.get(&id).cloned())
    }

    fn applications(&self) -> Result<Vec<Application>, RepositoryError> {
        Ok(self.applications.values().cloned().collect())
    }

    fn insert_application(
        &mut self,
        draft: ApplicationDraft,
    ) -> Result<Application, RepositoryError> {
        let id = ApplicationId(next(&mut self.sequences.application));
        let application = Application {
            id,
            student_id: draft.student_id,
            course_id: draft.course_id,
            current_status: draft.current_status,
            intake: draft.intake,
            year: draft.year,
            application_manager: None,
            is_active: true,
            created_by: draft.created_by,
            created: draft.created,
            modified: draft.created,
        };
        self.applications.insert(id, application.clone());
        Ok(application)
    }

    fn update_application(&mut self, application: Application) -> Result<(), RepositoryError> {
        match self.applications.get_mut(&application.id) {
            Some(slot) => {
                *slot = application;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn status_logs(
        &self,
        application: ApplicationId,
    ) -> Result<Vec<ApplicationStatusLog>, RepositoryError> {
        let mut logs: Vec<_> = self
            .status_logs
            .iter()
            .filter(|log| log.application_id == application)
            .cloned()
            .collect();
        logs.sort_by(|a, b| (b.created, b.id).cmp(&(a.created, a.id)));
        Ok(logs)
    }

    fn append_status_log(
        &mut self,
        entry: StatusLogEntry,
    ) -> Result<ApplicationStatusLog, RepositoryError> {
        if !self.applications.contains_key(&entry.application_id) {
            return Err(RepositoryError::NotFound);
        }
        let log = ApplicationStatusLog {
            id: StatusLogId(next(&mut self.sequences.status_log)),
            application_id: entry.application_id,
            status: entry.status,
            created_by: entry.created_by,
            created: entry.created,
        };
        self.status_logs.push(log.clone());
        Ok(log)
    }

    fn assignment_logs(
        &self,
        application: ApplicationId,
    ) -> Result<Vec<ApplicationAssignmentLog>, RepositoryError> {
        Ok(newest_first(
            self.assignment_logs
                .iter()
                .filter(|log| log.application_id == application),
        ))
    }

    fn assignment_logs_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ApplicationAssignmentLog>, RepositoryError> {
        Ok(newest_first(
            self.assignment_logs
                .iter()
                .filter(|log| log.created >= from && log.created < to),
        ))
    }

    fn all_assignment_logs(&self) -> Result<Vec<ApplicationAssignmentLog>, RepositoryError> {
        Ok(newest_first(self.assignment_logs.iter()))
    }

    fn append_assignment_log(
        &mut self,
        entry: AssignmentLogEntry,
    ) -> Result<ApplicationAssignmentLog, RepositoryError> {
        if !self.applications.contains_key(&entry.application_id) {
            return Err(RepositoryError::NotFound);
        }
        let log = ApplicationAssignmentLog {
            id: AssignmentLogId(next(&mut self.sequences.assignment_log)),
            application_id: entry.application_id,
            assigned_to: entry.assigned_to,
            assigned_by: entry.assigned_by,
            created: entry.created,
        };
        self.assignment_logs.push(log.clone());
        Ok(log)
    }

    fn university(&self, id: UniversityId) -> Result<Option<University>, RepositoryError> {
        Ok(self.universities.get(&id).cloned())
    }

    fn put_university(&mut self, university: University) -> Result<(), RepositoryError> {
        self.universities.insert(university.id, university);
        Ok(())
    }

    fn course(&self, id: CourseId) -> Result<Option<Course>, RepositoryError> {
        Ok(self.courses.get(&id).cloned())
    }

    fn put_course(&mut self, course: Course) -> Result<(), RepositoryError> {
        self.courses.insert(course.id, course);
        Ok(())
    }

    fn student(&self, id: StudentId) -> Result<Option<Student>, RepositoryError> {
        Ok(self.students.get(&id).cloned())
    }

    fn students(&self) -> Result<Vec<Student>, RepositoryError> {
        Ok(self.students.values().cloned().collect())
    }

    fn put_student(&mut self, student: Student) -> Result<(), RepositoryError> {
        self.students.insert(student.id, student);
        Ok(())
    }

    fn partner(&self, id: PartnerId) -> Result<Option<Partner>, RepositoryError> {
        Ok(self.partners.get(&id).cloned())
    }

    fn partners(&self) -> Result<Vec<Partner>, RepositoryError> {
        Ok(self.partners.values().cloned().collect())
    }

    fn put_partner(&mut self, partner: Partner) -> Result<(), RepositoryError> {
        self.partners.insert(partner.id, partner);
        Ok(())
    }

    fn staff_member(&self, id: StaffId) -> Result<Option<StaffMember>, RepositoryError> {
        Ok(self.staff.get(&id).cloned())
    }

    fn staff(&self) -> Result<Vec<StaffMember>, RepositoryError> {
        Ok(self.staff.values().cloned().collect())
    }

    fn put_staff_member(&mut self, member: StaffMember) -> Result<(), RepositoryError> {
        self.staff.insert(member.id, member);
        Ok(())
    }

    fn status_type(&self, id: StatusTypeId) -> Result<Option<StatusType>, RepositoryError> {
        Ok(self.status_types.get(&id).cloned())
    }

    fn status_types(&self) -> Result<Vec<StatusType>, RepositoryError> {
        let mut statuses: Vec<_> = self.status_types.values().cloned().collect();
        statuses.sort_by_key(|status| (status.priority, status.id));
        Ok(statuses)
    }

    fn insert_status_type(
        &mut self,
        name: &str,
        priority: i32,
    ) -> Result<StatusType, RepositoryError> {
        let name = name.trim();
        if self
            .status_types
            .values()
            .any(|existing| existing.name.eq_ignore_ascii_case(name))
        {
            return Err(RepositoryError::Conflict);
        }
        let status = StatusType {
            id: StatusTypeId(next(&mut self.sequences.status_type)),
            name: name.to_string(),
            priority,
            is_active: true,
        };
        self.status_types.insert(status.id, status.clone());
        Ok(status)
    }

    fn update_status_type(&mut self, status: StatusType) -> Result<(), RepositoryError> {
        match self.status_types.get_mut(&status.id) {
            Some(slot) => {
                *slot = status;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn country_statuses(
        &self,
        country: &str,
    ) -> Result<Option<Vec<StatusTypeId>>, RepositoryError> {
        Ok(self.country_statuses.get(&country_key(country)).cloned())
    }

    fn set_country_statuses(
        &mut self,
        country: &str,
        statuses: Vec<StatusTypeId>,
    ) -> Result<(), RepositoryError> {
        if statuses
            .iter()
            .any(|id| !self.status_types.contains_key(id))
        {
            return Err(RepositoryError::NotFound);
        }
        self.country_statuses.insert(country_key(country), statuses);
        Ok(())
    }
}

fn newest_first<'a>(
    logs: impl Iterator<Item = &'a ApplicationAssignmentLog>,
) -> Vec<ApplicationAssignmentLog> {
    let mut logs: Vec<_> = logs.cloned().collect();
    logs.sort_by(|a, b| (b.created, b.id).cmp(&(a.created, a.id)));
    logs
}
