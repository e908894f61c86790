//! Live counters pushed to management dashboards after application saves.

mod ws;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::workflows::applications::store::{RepositoryError, StoreTransaction};
use crate::workflows::applications::AssignmentSelector;

pub use ws::dashboard_router;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardCounts {
    pub student_count: usize,
    pub application_count: usize,
    pub partner_count: usize,
    pub assigned_today: usize,
}

impl DashboardCounts {
    /// Counts active students, applications, and partners, plus assignment
    /// rows logged on `today`.
    pub fn collect(tx: &dyn StoreTransaction, today: NaiveDate) -> Result<Self, RepositoryError> {
        let student_count = tx
            .students()?
            .iter()
            .filter(|student| student.is_active)
            .count();
        let application_count = tx
            .applications()?
            .iter()
            .filter(|application| application.is_active)
            .count();
        let partner_count = tx
            .partners()?
            .iter()
            .filter(|partner| partner.is_active)
            .count();
        let (from, to) = AssignmentSelector::day_bounds(today);
        let assigned_today = tx.assignment_logs_between(from, to)?.len();

        Ok(Self {
            student_count,
            application_count,
            partner_count,
            assigned_today,
        })
    }
}

/// Fan-out of dashboard updates to every connected client.
///
/// Delivery is best effort: with no subscribers an update is dropped, and a
/// subscriber that falls more than `capacity` updates behind skips ahead.
#[derive(Clone)]
pub struct DashboardHub {
    tx: broadcast::Sender<DashboardCounts>,
}

impl DashboardHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, counts: DashboardCounts) {
        match self.tx.send(counts) {
            Ok(receivers) => debug!(receivers, "dashboard update published"),
            Err(_) => debug!("dashboard update dropped, no subscribers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardCounts> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for DashboardHub {
    fn default() -> Self {
        Self::new(64)
    }
}
