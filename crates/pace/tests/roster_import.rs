use std::sync::Arc;

use pace::workflows::applications::{
    Actor, ApplicationService, ApplicationStore, Course, CourseId, InMemoryStore, NewApplication,
    Notification, NotificationError, Notifier, StaffId, StaffRole, Student, StudentId, University,
    UniversityId, UserId,
};
use pace::workflows::dashboard::DashboardHub;
use pace::workflows::roster::{RosterImportError, RosterImporter};

struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn notify(&self, _notification: Notification) -> Result<(), NotificationError> {
        Ok(())
    }
}

#[test]
fn importer_reads_full_roster_export() {
    let data = include_bytes!("../staff_roster.csv");

    let members = RosterImporter::from_reader(&data[..]).expect("roster imports");

    assert_eq!(members.len(), 7);
    let asha = &members[0];
    assert_eq!(asha.role, StaffRole::ApplicationManager);
    assert!(asha.assigned_universities.contains(&UniversityId(1)));
    assert!(asha.assigned_universities.contains(&UniversityId(2)));

    let kenji = members
        .iter()
        .find(|member| member.id == StaffId(4))
        .expect("blank flags row present");
    assert!(!kenji.is_on_leave, "blank leave flag defaults to working");
    assert!(kenji.is_active, "blank active flag defaults to active");

    let omar = members
        .iter()
        .find(|member| member.id == StaffId(6))
        .expect("marketing head present");
    assert!(omar.assigned_universities.is_empty());
    assert_eq!(omar.role, StaffRole::RegionalMarketingHead);
}

#[test]
fn malformed_rows_name_their_line() {
    let csv = "staff_id,user_id,name,role,universities,on_leave,active\n\
1,101,Asha Patel,Application Manager,1,no,yes\n\
2,102,Daniel Okafor,Chief Vibes Officer,1,no,yes\n";

    match RosterImporter::from_reader(csv.as_bytes()) {
        Err(RosterImportError::InvalidRow { line, reason }) => {
            assert_eq!(line, 3);
            assert!(reason.contains("Chief Vibes Officer"));
        }
        other => panic!("expected invalid row, got {other:?}"),
    }
}

#[test]
fn line_numbers_count_blank_lines_in_the_export() {
    let csv = "staff_id,user_id,name,role,universities,on_leave,active\n\
1,101,Asha Patel,Application Manager,1,no,yes\n\
\n\
2,102,Daniel Okafor,Chief Vibes Officer,1,no,yes\n";

    match RosterImporter::from_reader(csv.as_bytes()) {
        Err(RosterImportError::InvalidRow { line, reason }) => {
            assert_eq!(line, 4);
            assert!(reason.contains("Chief Vibes Officer"));
        }
        other => panic!("expected invalid row, got {other:?}"),
    }
}

#[test]
fn duplicate_staff_ids_are_rejected() {
    let csv = "staff_id,user_id,name,role,universities,on_leave,active\n\
1,101,Asha Patel,Application Manager,1,no,yes\n\
1,102,Daniel Okafor,Application Manager,1,no,yes\n";

    assert!(matches!(
        RosterImporter::from_reader(csv.as_bytes()),
        Err(RosterImportError::InvalidRow { line: 3, .. })
    ));
}

#[test]
fn non_numeric_ids_surface_csv_errors() {
    let csv = "staff_id,user_id,name,role,universities,on_leave,active\n\
abc,101,Asha Patel,Application Manager,1,no,yes\n";

    assert!(matches!(
        RosterImporter::from_reader(csv.as_bytes()),
        Err(RosterImportError::Csv(_))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    assert!(matches!(
        RosterImporter::from_path("does/not/exist.csv"),
        Err(RosterImportError::Io(_))
    ));
}

#[test]
fn loaded_roster_drives_assignment() {
    let store = Arc::new(InMemoryStore::new());
    let members = RosterImporter::from_reader(&include_bytes!("../staff_roster.csv")[..])
        .expect("roster imports");
    let loaded = RosterImporter::load_into(store.as_ref(), members).expect("roster stored");
    assert_eq!(loaded, 7);

    store
        .atomically(|tx| {
            tx.put_university(University {
                id: UniversityId(2),
                name: "Monash University".to_string(),
                country: "Australia".to_string(),
                is_active: true,
            })?;
            tx.put_course(Course {
                id: CourseId(20),
                name: "MBA".to_string(),
                university_id: UniversityId(2),
                is_active: true,
            })?;
            tx.put_student(Student {
                id: StudentId(1),
                name: "Mei Lin".to_string(),
                partner_id: None,
                is_active: true,
            })
        })
        .expect("directory seeded");

    let service = ApplicationService::new(store, Arc::new(SilentNotifier), DashboardHub::new(4));
    let managers: Vec<_> = (0..3)
        .map(|_| {
            service
                .create(
                    NewApplication {
                        student_id: StudentId(1),
                        course_id: Some(CourseId(20)),
                        status_id: None,
                        intake: None,
                        year: None,
                    },
                    Actor::system(),
                )
                .expect("application created")
                .application_manager
        })
        .collect();

    // staff 7 is inactive, so Monash rotates between staff 1 and 4
    assert_eq!(
        managers,
        vec![Some(UserId(101)), Some(UserId(104)), Some(UserId(101))]
    );
}
