use crate::infra::{seed_demo_directory, InMemoryNotifier};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use clap::Args;
use pace::error::AppError;
use pace::workflows::applications::{
    Actor, ApplicationService, CourseId, FixedClock, InMemoryStore, NewApplication, StaffRole,
    StatusTypeId, StudentId, UniversityId, UserId, WellKnownStatus,
};
use pace::workflows::dashboard::DashboardHub;
use pace::workflows::roster::RosterImporter;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Simulated business day (YYYY-MM-DD). Defaults to today (UTC).
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) date: Option<NaiveDate>,
    /// Number of applications to open for the University of Leeds.
    #[arg(long, default_value_t = 4)]
    pub(crate) applications: usize,
    /// Optional staff roster CSV replacing the demo managers.
    #[arg(long)]
    pub(crate) roster: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct RosterCheckArgs {
    /// Roster CSV export to validate
    pub(crate) path: PathBuf,
}

pub(crate) fn run_roster_check(args: RosterCheckArgs) -> Result<(), AppError> {
    let members = RosterImporter::from_path(&args.path)?;
    println!(
        "Roster {} parsed: {} staff members",
        args.path.display(),
        members.len()
    );

    let mut by_university: BTreeMap<UniversityId, Vec<String>> = BTreeMap::new();
    for member in &members {
        if member.role != StaffRole::ApplicationManager {
            continue;
        }
        for university in &member.assigned_universities {
            let mut label = member.name.clone();
            if member.is_on_leave {
                label.push_str(" (on leave)");
            }
            if !member.is_active {
                label.push_str(" (inactive)");
            }
            by_university.entry(*university).or_default().push(label);
        }
    }

    if by_university.is_empty() {
        println!("No application managers assigned to any university");
        return Ok(());
    }
    println!("Application managers by university:");
    for (university, managers) in by_university {
        println!("- university {}: {}", university, managers.join(", "));
    }
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        date,
        applications,
        roster,
    } = args;

    let day = date.unwrap_or_else(|| Utc::now().date_naive());
    let start = day
        .and_hms_opt(9, 0, 0)
        .map(|morning| morning.and_utc())
        .unwrap_or_else(Utc::now);
    let clock = Arc::new(FixedClock::new(start));

    let store = Arc::new(InMemoryStore::new());
    let roster_loaded = match roster {
        Some(path) => {
            let members = RosterImporter::from_path(&path)?;
            let loaded = RosterImporter::load_into(store.as_ref(), members)?;
            println!("Loaded {} staff members from {}", loaded, path.display());
            true
        }
        None => false,
    };
    seed_demo_directory(&store, !roster_loaded).map_err(|err| AppError::Workflow(err.into()))?;

    let notifier = Arc::new(InMemoryNotifier::default());
    let service = ApplicationService::with_clock(
        store,
        notifier.clone(),
        DashboardHub::default(),
        clock.clone(),
    );
    let submitted = status_id(&service, WellKnownStatus::ApplicationSubmitted)?;

    println!("Application workflow demo for {}", day);
    println!("\nRound-robin assignment at the University of Leeds");
    let counsellor = Actor::user(UserId(900));
    let mut created = Vec::new();
    for index in 0..applications {
        let student = StudentId((index % 3) as u64 + 1);
        let application = service.create(
            NewApplication {
                student_id: student,
                course_id: Some(CourseId(11 + (index % 2) as u64)),
                status_id: submitted,
                intake: Some("September".to_string()),
                year: Some(day.year()),
            },
            counsellor,
        )?;
        match application.application_manager {
            Some(manager) => println!(
                "- application {} (student {}) -> manager user {}",
                application.id, student, manager
            ),
            None => println!(
                "- application {} (student {}) -> no manager available",
                application.id, student
            ),
        }
        created.push(application);
    }

    if let Some(first) = created.first() {
        println!("\nStatus history for application {}", first.id);
        for (offset_days, status) in [
            (3, WellKnownStatus::ConditionalOfferReceived),
            (10, WellKnownStatus::FeePaid),
            (10, WellKnownStatus::FeePaid),
            (21, WellKnownStatus::CasReceived),
        ] {
            clock.set(start + Duration::days(offset_days));
            let Some(status_id) = status_id(&service, status)? else {
                continue;
            };
            let update = service.update_status(first.id, status_id, counsellor)?;
            let on = clock_date(start, offset_days);
            if update.changed() {
                println!("- {} -> {}", on, status.label());
            } else {
                println!("- {} -> {} (unchanged, not logged)", on, status.label());
            }
        }

        for entry in service.status_history(first.id)? {
            println!(
                "  {} | {} (previously {})",
                entry.created.format("%Y-%m-%d"),
                entry.status.as_deref().unwrap_or("no status"),
                entry.previous_status.as_deref().unwrap_or("none"),
            );
        }

        let milestones = service.milestones(first.id)?;
        match serde_json::to_string_pretty(&milestones) {
            Ok(json) => println!("  Milestones:\n{}", json),
            Err(err) => println!("  Milestones unavailable: {}", err),
        }
    }

    let events = notifier.events();
    println!("\nNotifications ({})", events.len());
    for event in events {
        println!("- user {}: {}", event.recipient, event.verb);
    }

    let counts = service.dashboard_counts()?;
    println!(
        "\nDashboard: {} students | {} applications | {} partners | {} assigned today",
        counts.student_count,
        counts.application_count,
        counts.partner_count,
        counts.assigned_today
    );

    Ok(())
}

fn status_id(
    service: &ApplicationService<InMemoryStore, InMemoryNotifier>,
    status: WellKnownStatus,
) -> Result<Option<StatusTypeId>, AppError> {
    Ok(service
        .status_types(None)?
        .into_iter()
        .find(|known| known.name.eq_ignore_ascii_case(status.label()))
        .map(|known| known.id))
}

fn clock_date(start: DateTime<Utc>, offset_days: i64) -> NaiveDate {
    (start + Duration::days(offset_days)).date_naive()
}
