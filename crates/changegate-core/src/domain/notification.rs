//! In-app notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Assignment,
    Approval,
    Deployment,
    Alert,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Assignment => "assignment",
            Self::Approval => "approval",
            Self::Deployment => "deployment",
            Self::Alert => "alert",
        };
        f.write_str(s)
    }
}

/// A message shown in one user's inbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppNotification {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    pub kind: NotificationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl AppNotification {
    /// Create an unread notification.
    pub fn unread(
        user_id: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
        kind: NotificationKind,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("notif-{}", Uuid::new_v4().simple()),
            user_id: user_id.into(),
            title: title.into(),
            message: message.into(),
            timestamp: now,
            read: false,
            kind,
            link: None,
        }
    }
}
