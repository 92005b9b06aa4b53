//! In-memory dispatchers for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{DispatchError, DispatchResult, NotificationDispatcher, OutboundEmail};

/// Records every message it is asked to send.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<OutboundEmail>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything sent so far, in send order.
    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Messages addressed to `to`.
    pub fn sent_to(&self, to: &str) -> Vec<OutboundEmail> {
        self.sent().into_iter().filter(|m| m.to == to).collect()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> DispatchResult<()> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| DispatchError::Unavailable("recorder lock poisoned".into()))?;
        sent.push(OutboundEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            html_body: html_body.to_string(),
        });
        Ok(())
    }
}

/// Fails every send, counting attempts.
#[derive(Debug, Default)]
pub struct FailingDispatcher {
    attempts: AtomicUsize,
}

impl FailingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationDispatcher for FailingDispatcher {
    async fn send(&self, to: &str, _subject: &str, _html_body: &str) -> DispatchResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(DispatchError::Unavailable(format!("smtp relay down for {to}")))
    }
}
