//! Application lifecycle: status transitions with an append-only history and
//! round-robin assignment of application managers.
//!
//! Storage is reached through [`ApplicationStore`] units of work, so an
//! application write and the log row describing it always commit together.

pub mod assignment;
pub mod clock;
pub mod domain;
pub mod memory;
pub mod notifications;
pub mod router;
pub mod service;
pub mod status;
pub mod store;

#[cfg(test)]
mod tests;

pub use assignment::AssignmentSelector;
pub use clock::{Clock, FixedClock, SystemClock};
pub use domain::{
    Actor, Application, ApplicationAssignmentLog, ApplicationId, ApplicationStatusLog, Course,
    CourseId, NewApplication, Partner, PartnerId, StaffId, StaffMember, StaffRole, StatusType,
    StatusTypeId, Student, StudentId, University, UniversityId, UserId,
};
pub use memory::InMemoryStore;
pub use notifications::{Notification, NotificationError, Notifier};
pub use router::{application_router, ACTOR_HEADER};
pub use service::{ApplicationService, ApplicationServiceError, StatusUpdate};
pub use status::{ApplicationMilestones, StatusError, StatusHistoryEntry, WellKnownStatus};
pub use store::{ApplicationStore, RepositoryError, StoreTransaction};
