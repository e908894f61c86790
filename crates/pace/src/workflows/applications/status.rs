//! Status taxonomy lookups and status-history queries.
//!
//! Statuses are rows in an admin-maintained catalog, so any status may follow
//! any other. [`WellKnownStatus`] names the catalog entries the workflow and
//! reports refer to by name.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{
    ApplicationId, ApplicationStatusLog, StatusLogId, StatusType, StatusTypeId, University, UserId,
};
use super::store::{RepositoryError, StoreTransaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WellKnownStatus {
    PendingFromIg,
    AssessmentSent,
    AssessmentRejected,
    ApplicationSubmitted,
    PendingFromPartner,
    RejectedByIg,
    ConditionalOfferReceived,
    UnconditionalOfferReceived,
    CasReceived,
    PrescreeningApproved,
    PrescreeningPending,
    PrescreeningRejected,
    FeePaid,
    CoeApplied,
    CoeReceived,
    VisaLodged,
    VisaGrant,
    VisaRefused,
    RevisedOfferPending,
    CasApplied,
}

impl WellKnownStatus {
    pub const fn all() -> [Self; 20] {
        [
            Self::PendingFromIg,
            Self::AssessmentSent,
            Self::AssessmentRejected,
            Self::ApplicationSubmitted,
            Self::PendingFromPartner,
            Self::RejectedByIg,
            Self::ConditionalOfferReceived,
            Self::UnconditionalOfferReceived,
            Self::CasReceived,
            Self::PrescreeningApproved,
            Self::PrescreeningPending,
            Self::PrescreeningRejected,
            Self::FeePaid,
            Self::CoeApplied,
            Self::CoeReceived,
            Self::VisaLodged,
            Self::VisaGrant,
            Self::VisaRefused,
            Self::RevisedOfferPending,
            Self::CasApplied,
        ]
    }

    /// Catalog name, matched case-insensitively.
    pub const fn label(self) -> &'static str {
        match self {
            Self::PendingFromIg => "Pending From IG",
            Self::AssessmentSent => "Assessment Sent",
            Self::AssessmentRejected => "Assessment Rejected",
            Self::ApplicationSubmitted => "Application Submitted",
            Self::PendingFromPartner => "Pending From Partner",
            Self::RejectedByIg => "Rejected By IG",
            Self::ConditionalOfferReceived => "Conditional Offer Received",
            Self::UnconditionalOfferReceived => "UnConditional Offer Received",
            Self::CasReceived => "CAS Received",
            Self::PrescreeningApproved => "Prescreening Approved",
            Self::PrescreeningPending => "Prescreening Pending",
            Self::PrescreeningRejected => "Prescreening Rejected",
            Self::FeePaid => "Fee Paid",
            Self::CoeApplied => "COE Applied",
            Self::CoeReceived => "COE Received",
            Self::VisaLodged => "VISA Lodged",
            Self::VisaGrant => "VISA Grant",
            Self::VisaRefused => "VISA Refused",
            Self::RevisedOfferPending => "Revised Offer Pending",
            Self::CasApplied => "CAS Applied",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::all()
            .into_iter()
            .find(|status| status.label().eq_ignore_ascii_case(name))
    }

    /// Milestones surfaced on application reports, in pipeline order.
    pub const fn milestones() -> [Self; 15] {
        [
            Self::PrescreeningPending,
            Self::PrescreeningApproved,
            Self::PrescreeningRejected,
            Self::PendingFromPartner,
            Self::PendingFromIg,
            Self::ApplicationSubmitted,
            Self::RejectedByIg,
            Self::ConditionalOfferReceived,
            Self::UnconditionalOfferReceived,
            Self::FeePaid,
            Self::CasApplied,
            Self::CasReceived,
            Self::VisaLodged,
            Self::VisaGrant,
            Self::VisaRefused,
        ]
    }
}

/// Reasons a status cannot be applied to an application.
#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("status type {0} does not exist")]
    Unknown(StatusTypeId),
    #[error("status '{0}' is inactive")]
    Inactive(String),
    #[error("status '{status}' is not offered for {country}")]
    NotOfferedInCountry { status: String, country: String },
}

/// Error raised while resolving a status inside a unit of work.
#[derive(Debug, thiserror::Error)]
pub enum StatusResolutionError {
    #[error(transparent)]
    Status(#[from] StatusError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Looks up `id` and checks it may be used for an application at `university`.
///
/// A country with a registered status list only accepts statuses on that
/// list; countries without one accept every active status.
pub fn resolve_status(
    tx: &dyn StoreTransaction,
    id: StatusTypeId,
    university: Option<&University>,
) -> Result<StatusType, StatusResolutionError> {
    let status = tx.status_type(id)?.ok_or(StatusError::Unknown(id))?;
    if !status.is_active {
        return Err(StatusError::Inactive(status.name).into());
    }

    if let Some(university) = university {
        if let Some(allowed) = tx.country_statuses(&university.country)? {
            if !allowed.contains(&id) {
                return Err(StatusError::NotOfferedInCountry {
                    status: status.name,
                    country: university.country.clone(),
                }
                .into());
            }
        }
    }

    Ok(status)
}

/// Active statuses usable for a country, ordered by priority.
pub fn statuses_for_country(
    tx: &dyn StoreTransaction,
    country: &str,
) -> Result<Vec<StatusType>, RepositoryError> {
    let allowed = tx.country_statuses(country)?;
    Ok(tx
        .status_types()?
        .into_iter()
        .filter(|status| status.is_active)
        .filter(|status| {
            allowed
                .as_ref()
                .map_or(true, |allowed| allowed.contains(&status.id))
        })
        .collect())
}

/// Status recorded by the log row immediately older than `log`.
pub fn previous_status(
    history_newest_first: &[ApplicationStatusLog],
    log: StatusLogId,
) -> Option<StatusTypeId> {
    let position = history_newest_first
        .iter()
        .position(|entry| entry.id == log)?;
    history_newest_first
        .get(position + 1)
        .and_then(|entry| entry.status)
}

/// Most recent log row whose status carries `name`, ignoring case.
pub fn latest_log_with_status(
    tx: &dyn StoreTransaction,
    application: ApplicationId,
    name: &str,
) -> Result<Option<ApplicationStatusLog>, RepositoryError> {
    let name = name.trim();
    for log in tx.status_logs(application)? {
        let Some(status_id) = log.status else {
            continue;
        };
        if let Some(status) = tx.status_type(status_id)? {
            if status.name.eq_ignore_ascii_case(name) {
                return Ok(Some(log));
            }
        }
    }
    Ok(None)
}

/// Status-history row enriched with catalog names for API responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusHistoryEntry {
    pub log_id: StatusLogId,
    pub status_id: Option<StatusTypeId>,
    pub status: Option<String>,
    pub previous_status: Option<String>,
    pub created_by: Option<UserId>,
    pub created: DateTime<Utc>,
}

pub fn status_history(
    tx: &dyn StoreTransaction,
    application: ApplicationId,
) -> Result<Vec<StatusHistoryEntry>, RepositoryError> {
    let logs = tx.status_logs(application)?;
    let name_of = |id: Option<StatusTypeId>| -> Result<Option<String>, RepositoryError> {
        match id {
            Some(id) => Ok(tx.status_type(id)?.map(|status| status.name)),
            None => Ok(None),
        }
    };

    logs.iter()
        .map(|log| {
            Ok(StatusHistoryEntry {
                log_id: log.id,
                status_id: log.status,
                status: name_of(log.status)?,
                previous_status: name_of(previous_status(&logs, log.id))?,
                created_by: log.created_by,
                created: log.created,
            })
        })
        .collect()
}

/// Dates at which an application reached each well-known milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationMilestones {
    pub application_id: ApplicationId,
    pub reached: BTreeMap<&'static str, DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_by: Option<UserId>,
}

pub fn milestones(
    tx: &dyn StoreTransaction,
    application: ApplicationId,
) -> Result<ApplicationMilestones, RepositoryError> {
    let mut reached = BTreeMap::new();
    let mut submitted_by = None;

    for milestone in WellKnownStatus::milestones() {
        if let Some(log) = latest_log_with_status(tx, application, milestone.label())? {
            if milestone == WellKnownStatus::ApplicationSubmitted {
                submitted_by = log.created_by;
            }
            reached.insert(milestone.label(), log.created);
        }
    }

    Ok(ApplicationMilestones {
        application_id: application,
        reached,
        submitted_by,
    })
}
