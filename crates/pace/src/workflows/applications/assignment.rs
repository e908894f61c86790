use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use super::domain::{StaffId, StaffMember, UniversityId};
use super::store::{RepositoryError, StoreTransaction};

/// Round-robin choice of the next application manager for a university.
///
/// Read-only: callers persist the chosen assignment themselves, inside the
/// same unit of work when they want selection and write to be atomic.
pub struct AssignmentSelector;

impl AssignmentSelector {
    /// `[start, end)` of a UTC calendar day.
    pub fn day_bounds(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = day.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
        (start, start + Duration::days(1))
    }

    /// Application managers assigned to `university` who are active and not
    /// on leave, ordered by staff id.
    pub fn eligible_managers(
        tx: &dyn StoreTransaction,
        university: UniversityId,
    ) -> Result<Vec<StaffMember>, RepositoryError> {
        Ok(tx
            .staff()?
            .into_iter()
            .filter(|member| member.can_manage(university))
            .collect())
    }

    /// Assignment rows logged on `day` (UTC) per eligible manager for
    /// applications at `university`. Managers without rows map to zero.
    pub fn assignment_counts(
        tx: &dyn StoreTransaction,
        university: UniversityId,
        day: NaiveDate,
    ) -> Result<BTreeMap<StaffId, usize>, RepositoryError> {
        let mut counts: BTreeMap<StaffId, usize> = Self::eligible_managers(tx, university)?
            .into_iter()
            .map(|member| (member.id, 0))
            .collect();

        let (from, to) = Self::day_bounds(day);
        for log in tx.assignment_logs_between(from, to)? {
            let Some(count) = counts.get_mut(&log.assigned_to) else {
                continue;
            };
            let Some(application) = tx.application(log.application_id)? else {
                continue;
            };
            let at_university = tx
                .application_university(&application)?
                .is_some_and(|found| found.id == university);
            if at_university {
                *count += 1;
            }
        }

        Ok(counts)
    }

    /// Eligible manager with the fewest assignments on `day` at `university`.
    /// Ties go to the lowest staff id. `None` when nobody is eligible.
    pub fn next_application_manager(
        tx: &dyn StoreTransaction,
        university: UniversityId,
        day: NaiveDate,
    ) -> Result<Option<StaffMember>, RepositoryError> {
        let counts = Self::assignment_counts(tx, university, day)?;
        let chosen = counts
            .into_iter()
            .min_by_key(|(staff_id, count)| (*count, *staff_id))
            .map(|(staff_id, _)| staff_id);

        match chosen {
            Some(staff_id) => tx.staff_member(staff_id),
            None => Ok(None),
        }
    }

    /// Staff member on the most recent assignment row for `university`.
    pub fn last_assigned_manager(
        tx: &dyn StoreTransaction,
        university: UniversityId,
    ) -> Result<Option<StaffMember>, RepositoryError> {
        for log in tx.all_assignment_logs()? {
            let Some(application) = tx.application(log.application_id)? else {
                continue;
            };
            let at_university = tx
                .application_university(&application)?
                .is_some_and(|found| found.id == university);
            if at_university {
                return tx.staff_member(log.assigned_to);
            }
        }
        Ok(None)
    }
}
