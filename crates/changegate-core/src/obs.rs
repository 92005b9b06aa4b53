//! Structured observability hooks for change request lifecycle events.
//!
//! This module provides:
//! - CR-scoped tracing spans via the `CrSpan` RAII guard
//! - Emission functions for status changes, notifications and email delivery
//!
//! Events are emitted at `info!` level; failures at `warn!`.

use tracing::{info, warn};

use crate::domain::{CrStatus, NotificationKind};

/// RAII guard that enters a CR-scoped span for the duration of a mutation.
///
/// ```ignore
/// let _span = CrSpan::enter("CR-2025-8842", "record_risk_assessment");
/// ```
pub struct CrSpan {
    _span: tracing::span::EnteredSpan,
}

impl CrSpan {
    pub fn enter(cr_id: &str, operation: &'static str) -> Self {
        let span = tracing::info_span!("changegate.cr", cr_id = %cr_id, op = operation);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: a change request was created.
pub fn emit_cr_created(cr_id: &str, created_by: &str, features: usize) {
    info!(
        event = "cr.created",
        cr_id = %cr_id,
        created_by = %created_by,
        features = features,
    );
}

/// Emit event: a change request moved between statuses.
pub fn emit_status_changed(cr_id: &str, from: CrStatus, to: CrStatus) {
    info!(
        event = "cr.status_changed",
        cr_id = %cr_id,
        from = %from,
        to = %to,
    );
}

/// Emit event: a change request was deleted.
pub fn emit_cr_deleted(cr_id: &str) {
    info!(event = "cr.deleted", cr_id = %cr_id);
}

/// Emit event: an in-app notification was recorded for a user.
pub fn emit_notification_recorded(user_id: &str, kind: NotificationKind, title: &str) {
    info!(
        event = "notification.recorded",
        user_id = %user_id,
        kind = %kind,
        title = %title,
    );
}

/// Emit event: an email was accepted by the dispatcher.
pub fn emit_email_dispatched(to: &str, subject: &str) {
    info!(event = "email.dispatched", to = %to, subject = %subject);
}

/// Emit event: an email could not be delivered (warning level).
pub fn emit_email_failed(to: &str, error: &dyn std::fmt::Display) {
    warn!(event = "email.failed", to = %to, error = %error);
}

/// Emit event: a stored snapshot was unreadable and reset to defaults (warning level).
pub fn emit_snapshot_reset(key: &str, error: &dyn std::fmt::Display) {
    warn!(event = "snapshot.reset", key = %key, error = %error);
}
