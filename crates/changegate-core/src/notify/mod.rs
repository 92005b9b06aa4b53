//! Outbound email notification.
//!
//! The lifecycle engine never talks to a mail system directly. During a
//! mutation it queues [`OutboundEmail`]s; once state is committed the queue
//! is handed to [`dispatch_all`], which sends through a
//! [`NotificationDispatcher`] and only logs the outcome.

pub mod fakes;
pub mod relay;
pub mod template;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::obs;

pub use relay::{HttpRelayDispatcher, LogDispatcher};
pub use template::EmailTemplate;

/// Errors produced by a notification dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("relay rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("dispatcher unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        DispatchError::Transport(err.to_string())
    }
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = std::result::Result<T, DispatchError>;

/// Sends one rendered email.
///
/// Failure is never fatal to the caller; the engine logs and moves on.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> DispatchResult<()>;
}

/// An email queued during a lifecycle mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// Per-batch delivery tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
}

/// Send every queued email concurrently, logging each outcome.
///
/// Never returns an error: delivery is best-effort.
pub async fn dispatch_all(
    dispatcher: &dyn NotificationDispatcher,
    outbox: Vec<OutboundEmail>,
) -> DispatchReport {
    let sends = outbox.iter().map(|mail| async move {
        let outcome = dispatcher
            .send(&mail.to, &mail.subject, &mail.html_body)
            .await;
        match &outcome {
            Ok(()) => obs::emit_email_dispatched(&mail.to, &mail.subject),
            Err(err) => obs::emit_email_failed(&mail.to, err),
        }
        outcome.is_ok()
    });

    let results = join_all(sends).await;
    let sent = results.iter().filter(|ok| **ok).count();
    DispatchReport {
        sent,
        failed: results.len() - sent,
    }
}
