//! Notification fan-out: resolve recipients, record in-app notifications,
//! and queue branded emails.

use chrono::{DateTime, Utc};

use crate::domain::{AppNotification, NotificationKind, User, UserRole};
use crate::notify::template::EmailContext;
use crate::notify::{EmailTemplate, OutboundEmail};
use crate::obs;

/// Who a notification is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationTarget {
    /// Every user holding the role.
    Role(UserRole),
    /// The single user with this id.
    User(String),
}

impl NotificationTarget {
    pub fn user(id: impl Into<String>) -> Self {
        Self::User(id.into())
    }

    fn matches(&self, user: &User) -> bool {
        match self {
            Self::Role(role) => user.has_role(*role),
            Self::User(id) => user.id == *id,
        }
    }
}

/// Users addressed by `target`, in directory order.
///
/// Disabled users are included; account status gates login, not mail.
pub fn resolve_targets<'a>(users: &'a [User], target: &NotificationTarget) -> Vec<&'a User> {
    users.iter().filter(|u| target.matches(u)).collect()
}

/// One lifecycle message about one change request.
#[derive(Debug, Clone, Copy)]
pub struct Notice<'a> {
    pub cr_id: &'a str,
    pub cr_title: &'a str,
    pub title: &'a str,
    pub message: &'a str,
    pub kind: NotificationKind,
}

/// Collects the side effects of a single mutation.
///
/// In-app notifications are committed with the mutation; emails wait in the
/// outbox until state has been persisted.
#[derive(Debug, Default)]
pub struct FanOut {
    pub notifications: Vec<AppNotification>,
    pub outbox: Vec<OutboundEmail>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    /// Address `notice` to every user matching `target`. Returns the number
    /// of recipients.
    pub fn notify(
        &mut self,
        users: &[User],
        target: &NotificationTarget,
        notice: &Notice<'_>,
        template: &EmailTemplate,
        now: DateTime<Utc>,
    ) -> usize {
        let recipients = resolve_targets(users, target);
        for user in &recipients {
            let mut notification =
                AppNotification::unread(&user.id, notice.title, notice.message, notice.kind, now);
            notification.link = Some(notice.cr_id.to_string());
            obs::emit_notification_recorded(&user.id, notice.kind, notice.title);
            self.notifications.push(notification);

            if user.email.trim().is_empty() {
                continue;
            }
            let html_body = template.render(&EmailContext {
                recipient_name: &user.name,
                cr_id: notice.cr_id,
                cr_title: notice.cr_title,
                title: notice.title,
                message: notice.message,
            });
            self.outbox.push(OutboundEmail {
                to: user.email.clone(),
                subject: template.subject(notice.title, notice.cr_id),
                html_body,
            });
        }
        recipients.len()
    }

    /// Move recorded notifications to the head of `inbox`, newest first.
    pub fn drain_into(&mut self, inbox: &mut Vec<AppNotification>) {
        for notification in self.notifications.drain(..) {
            inbox.insert(0, notification);
        }
    }
}
