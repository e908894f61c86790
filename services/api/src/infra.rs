use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use pace::workflows::applications::{
    ApplicationStore, Course, CourseId, InMemoryStore, Notification, NotificationError, Notifier,
    Partner, PartnerId, RepositoryError, StaffId, StaffMember, StaffRole, StatusTypeId, Student,
    StudentId, University, UniversityId, UserId, WellKnownStatus,
};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Keeps delivered notifications in memory and mirrors them to the log.
#[derive(Default, Clone)]
pub(crate) struct InMemoryNotifier {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl Notifier for InMemoryNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        info!(
            recipient = %notification.recipient,
            application_id = %notification.application_id,
            verb = %notification.verb,
            "notification delivered"
        );
        let mut guard = self
            .events
            .lock()
            .map_err(|_| NotificationError::Transport("notification feed poisoned".to_string()))?;
        guard.push(notification);
        Ok(())
    }
}

impl InMemoryNotifier {
    pub(crate) fn events(&self) -> Vec<Notification> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Demo universities, courses, partners, students, and the full status
/// catalog. Staff are added only when `with_staff` is set, so a loaded
/// roster is left alone.
pub(crate) fn seed_demo_directory(
    store: &InMemoryStore,
    with_staff: bool,
) -> Result<(), RepositoryError> {
    store.atomically(|tx| {
        for (id, name, country) in [
            (1, "University of Leeds", "UK"),
            (2, "Monash University", "Australia"),
            (3, "University of Toronto", "Canada"),
        ] {
            tx.put_university(University {
                id: UniversityId(id),
                name: name.to_string(),
                country: country.to_string(),
                is_active: true,
            })?;
        }

        for (id, name, university) in [
            (11, "MSc Data Science", 1),
            (12, "MA International Business", 1),
            (21, "Master of Business Administration", 2),
            (31, "MEng Computer Engineering", 3),
        ] {
            tx.put_course(Course {
                id: CourseId(id),
                name: name.to_string(),
                university_id: UniversityId(university),
                is_active: true,
            })?;
        }

        tx.put_partner(Partner {
            id: PartnerId(1),
            company_name: "Global Pathways Consultancy".to_string(),
            user_id: Some(UserId(500)),
            is_active: true,
        })?;
        for (id, name, partner) in [
            (1, "Ravi Kumar", Some(PartnerId(1))),
            (2, "Mei Lin", None),
            (3, "Amaka Obi", Some(PartnerId(1))),
        ] {
            tx.put_student(Student {
                id: StudentId(id),
                name: name.to_string(),
                partner_id: partner,
                is_active: true,
            })?;
        }

        if with_staff {
            for (id, name, universities, on_leave) in [
                (1, "Asha Patel", vec![1, 2], false),
                (2, "Daniel Okafor", vec![1], false),
                (3, "Sofia Rossi", vec![1, 3], true),
                (4, "Kenji Watanabe", vec![2, 3], false),
            ] {
                tx.put_staff_member(StaffMember {
                    id: StaffId(id),
                    user_id: UserId(100 + id),
                    name: name.to_string(),
                    role: StaffRole::ApplicationManager,
                    assigned_universities: universities.into_iter().map(UniversityId).collect(),
                    is_on_leave: on_leave,
                    is_active: true,
                })?;
            }
        }

        let existing = tx.status_types()?;
        for (priority, status) in WellKnownStatus::all().into_iter().enumerate() {
            let taken = existing
                .iter()
                .any(|known| known.name.eq_ignore_ascii_case(status.label()));
            if !taken {
                tx.insert_status_type(status.label(), priority as i32 + 1)?;
            }
        }

        // UK applications skip the COE stages
        let uk: Vec<StatusTypeId> = tx
            .status_types()?
            .into_iter()
            .filter(|status| !status.name.starts_with("COE"))
            .map(|status| status.id)
            .collect();
        tx.set_country_statuses("UK", uk)
    })?;

    info!(with_staff, "demo directory seeded");
    Ok(())
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pace::workflows::applications::ApplicationId;

    #[test]
    fn seeding_twice_keeps_one_catalog() {
        let store = InMemoryStore::new();
        seed_demo_directory(&store, true).expect("first seed");
        seed_demo_directory(&store, false).expect("second seed");

        let statuses = store
            .atomically(|tx| tx.status_types())
            .expect("catalog readable");
        assert_eq!(statuses.len(), WellKnownStatus::all().len());
        let uk = store
            .atomically(|tx| tx.country_statuses("uk"))
            .expect("country list readable")
            .expect("uk list registered");
        assert_eq!(uk.len(), WellKnownStatus::all().len() - 2);
    }

    #[test]
    fn notifier_keeps_delivered_events() {
        let notifier = InMemoryNotifier::default();
        notifier
            .notify(Notification::manager_assigned(
                UserId(101),
                None,
                "Monash University",
                ApplicationId(1),
            ))
            .expect("delivered");
        assert_eq!(notifier.events().len(), 1);
    }

    #[test]
    fn parse_date_rejects_other_formats() {
        assert!(parse_date("2025-06-02").is_ok());
        assert!(parse_date("02/06/2025").is_err());
    }
}
