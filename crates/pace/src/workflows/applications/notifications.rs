use serde::{Deserialize, Serialize};

use super::domain::{ApplicationId, UserId};

/// In-app notification addressed to a single user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: UserId,
    pub actor: Option<UserId>,
    pub verb: String,
    pub application_id: ApplicationId,
}

impl Notification {
    pub fn manager_assigned(
        recipient: UserId,
        actor: Option<UserId>,
        university_name: &str,
        application_id: ApplicationId,
    ) -> Self {
        Self {
            recipient,
            actor,
            verb: format!("New application assignment of {university_name}"),
            application_id,
        }
    }

    pub fn status_changed(
        recipient: UserId,
        actor: Option<UserId>,
        student_name: &str,
        application_id: ApplicationId,
    ) -> Self {
        Self {
            recipient,
            actor,
            verb: format!("New update on the status of application for student: {student_name}!"),
            application_id,
        }
    }
}

/// Outbound notification hook (in-app feed, e-mail bridge, ...).
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
