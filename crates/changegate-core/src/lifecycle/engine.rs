//! The lifecycle engine: sole owner of users, change requests, notifications
//! and the session, and sole authority over change request status.
//!
//! Every mutating operation runs in two phases. A synchronous stage works on
//! a copy of the affected record, validates the status transition, and
//! collects notifications in a [`FanOut`]; nothing is touched if it fails.
//! The commit phase then swaps the copy in, writes the changed snapshots
//! and finally dispatches queued emails.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tracing::debug;

use changegate_state::{read_snapshot, write_snapshot, BlobStore, SnapshotKey, StorageError};

use super::fanout::{FanOut, Notice, NotificationTarget};
use crate::domain::{
    default_users, validate_transition, Actor, AppNotification, AuditEntry, ChangeGateError,
    ChangeRequest, ChangeRequestDraft, CrStatus, DeploymentReport, FeaturePatch, ItApproval,
    NotificationKind, Result, RiskAssessment, User, UserRole,
};
use crate::notify::{dispatch_all, DispatchReport, EmailTemplate, NotificationDispatcher};
use crate::obs::{self, CrSpan};

pub const AUDIT_CR_INITIATION: &str = "CR Initiation";
pub const AUDIT_CR_UPDATED: &str = "CR Updated";
pub const AUDIT_RISK_CERTIFIED: &str = "Risk Certified";
pub const AUDIT_EXECUTIVE_APPROVAL: &str = "Executive Approval";
pub const AUDIT_PRODUCTION_EXECUTION: &str = "Production Execution";

/// State machine over the change request portfolio.
pub struct LifecycleEngine {
    store: Arc<dyn BlobStore>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    template: EmailTemplate,
    users: Vec<User>,
    change_requests: Vec<ChangeRequest>,
    notifications: Vec<AppNotification>,
    session: Option<User>,
    last_dispatch: DispatchReport,
}

impl LifecycleEngine {
    /// Load every collection from `store`.
    ///
    /// Missing snapshots start from defaults. A snapshot that fails to decode
    /// is logged, removed from the store, and replaced by its default.
    pub async fn load(
        store: Arc<dyn BlobStore>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        template: EmailTemplate,
    ) -> Result<Self> {
        let store_ref = store.as_ref();
        let users: Vec<User> = load_or_reset(store_ref, SnapshotKey::Users, default_users).await?;
        let change_requests: Vec<ChangeRequest> =
            load_or_reset(store_ref, SnapshotKey::ChangeRequests, Vec::new).await?;
        let notifications: Vec<AppNotification> =
            load_or_reset(store_ref, SnapshotKey::Notifications, Vec::new).await?;
        let session: Option<User> =
            load_or_reset(store_ref, SnapshotKey::Session, || None).await?;

        debug!(
            users = users.len(),
            change_requests = change_requests.len(),
            notifications = notifications.len(),
            "lifecycle state loaded"
        );

        Ok(Self {
            store,
            dispatcher,
            template,
            users,
            change_requests,
            notifications,
            session,
            last_dispatch: DispatchReport::default(),
        })
    }

    // ── Accessors ───────────────────────────────────────────────────────

    /// All change requests, newest first.
    pub fn change_requests(&self) -> &[ChangeRequest] {
        &self.change_requests
    }

    pub fn change_request(&self, id: &str) -> Option<&ChangeRequest> {
        self.change_requests.iter().find(|cr| cr.id == id)
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    /// Every notification, newest first.
    pub fn notifications(&self) -> &[AppNotification] {
        &self.notifications
    }

    pub fn template(&self) -> &EmailTemplate {
        &self.template
    }

    /// Delivery tally of the most recent mutation's emails.
    pub fn last_dispatch(&self) -> DispatchReport {
        self.last_dispatch
    }

    // ── Change requests ─────────────────────────────────────────────────

    /// Record a new change request at the head of the portfolio and assign
    /// each feature's tester.
    pub async fn create(
        &mut self,
        draft: ChangeRequestDraft,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<ChangeRequest> {
        let (cr, fan) = self.stage_create(draft, actor, now)?;
        obs::emit_cr_created(&cr.id, &actor.name, cr.features.len());
        self.change_requests.insert(0, cr.clone());
        self.commit(&[SnapshotKey::ChangeRequests], fan).await?;
        Ok(cr)
    }

    fn stage_create(
        &self,
        draft: ChangeRequestDraft,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<(ChangeRequest, FanOut)> {
        let mut cr = ChangeRequest::from_draft(draft, actor, now);
        let _span = CrSpan::enter(&cr.id, "create");
        if self.change_request(&cr.id).is_some() {
            return Err(ChangeGateError::DuplicateChangeRequest(cr.id));
        }
        cr.push_audit(AuditEntry::new(
            AUDIT_CR_INITIATION,
            &actor.name,
            "Official governance request recorded.",
            now,
        ));

        let mut fan = FanOut::new();
        for feature in &cr.features {
            let title = format!("UAT Assignment: {}", feature.name);
            let message = format!(
                "New Assignment: {}. Please conduct UAT and certify outcomes.",
                feature.name
            );
            fan.notify(
                &self.users,
                &NotificationTarget::user(&feature.assigned_tester_id),
                &Notice {
                    cr_id: &cr.id,
                    cr_title: &cr.title,
                    title: &title,
                    message: &message,
                    kind: NotificationKind::Assignment,
                },
                &self.template,
                now,
            );
        }
        Ok((cr, fan))
    }

    /// Replace the editable fields of an existing change request.
    ///
    /// Status, audit history and recorded decisions are preserved.
    pub async fn update(
        &mut self,
        id: &str,
        draft: ChangeRequestDraft,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<ChangeRequest> {
        let (idx, mut cr) = self.checkout(id)?;
        cr.apply_draft(draft);
        cr.push_audit(AuditEntry::new(
            AUDIT_CR_UPDATED,
            &actor.name,
            "Initiator refined parameters.",
            now,
        ));
        self.change_requests[idx] = cr.clone();
        self.commit(&[SnapshotKey::ChangeRequests], FanOut::new()).await?;
        Ok(cr)
    }

    /// Remove a change request and return it.
    pub async fn delete(&mut self, id: &str) -> Result<ChangeRequest> {
        let idx = self.position(id)?;
        let removed = self.change_requests.remove(idx);
        obs::emit_cr_deleted(&removed.id);
        self.commit(&[SnapshotKey::ChangeRequests], FanOut::new()).await?;
        Ok(removed)
    }

    /// Merge a tester's result into one feature.
    ///
    /// When this makes every feature Tested and testing has not yet been
    /// completed, the request advances to Testing Completed and the Risk
    /// Team is notified. Later results never notify again.
    pub async fn record_feature_result(
        &mut self,
        cr_id: &str,
        feature_id: &str,
        patch: FeaturePatch,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<ChangeRequest> {
        let (idx, cr, fan) = self.stage_feature_result(cr_id, feature_id, patch, actor, now)?;
        self.change_requests[idx] = cr.clone();
        self.commit(&[SnapshotKey::ChangeRequests], fan).await?;
        Ok(cr)
    }

    fn stage_feature_result(
        &self,
        cr_id: &str,
        feature_id: &str,
        patch: FeaturePatch,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<(usize, ChangeRequest, FanOut)> {
        let _span = CrSpan::enter(cr_id, "record_feature_result");
        let (idx, mut cr) = self.checkout(cr_id)?;
        let feature = cr
            .feature_mut(feature_id)
            .ok_or_else(|| ChangeGateError::FeatureNotFound {
                cr_id: cr_id.to_string(),
                feature_id: feature_id.to_string(),
            })?;
        feature.apply(patch);
        debug!(
            feature_id = %feature_id,
            tester = %actor.id,
            tested = feature.is_tested(),
            "feature result merged"
        );

        let mut fan = FanOut::new();
        if cr.all_features_tested() && cr.status.is_before_testing_completed() {
            self.advance(&mut cr, CrStatus::TestingCompleted)?;
            fan.notify(
                &self.users,
                &NotificationTarget::Role(UserRole::RiskTeam),
                &Notice {
                    cr_id: &cr.id,
                    cr_title: &cr.title,
                    title: "Testing Completed: Ready for Risk Review",
                    message: "All features have been tested and certified. \
                              Risk Team evaluation is now required.",
                    kind: NotificationKind::Approval,
                },
                &self.template,
                now,
            );
        }
        Ok((idx, cr, fan))
    }

    /// Attach the Risk Team's assessment and hand over to the Head of IT.
    ///
    /// Any decision, including Reject, moves the request to Risk Reviewed.
    pub async fn record_risk_assessment(
        &mut self,
        cr_id: &str,
        assessment: RiskAssessment,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<ChangeRequest> {
        let (idx, cr, fan) = self.stage_risk_assessment(cr_id, assessment, actor, now)?;
        self.change_requests[idx] = cr.clone();
        self.commit(&[SnapshotKey::ChangeRequests], fan).await?;
        Ok(cr)
    }

    fn stage_risk_assessment(
        &self,
        cr_id: &str,
        assessment: RiskAssessment,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<(usize, ChangeRequest, FanOut)> {
        let _span = CrSpan::enter(cr_id, "record_risk_assessment");
        let (idx, mut cr) = self.checkout(cr_id)?;
        self.advance(&mut cr, CrStatus::RiskReviewed)?;

        let decision = assessment.decision;
        cr.risk_assessment = Some(assessment);
        cr.push_audit(AuditEntry::new(
            AUDIT_RISK_CERTIFIED,
            &actor.name,
            format!("Outcome: {decision}"),
            now,
        ));

        let message = format!(
            "Risk Team has {} the change. Final executive authorization required.",
            decision.past_tense()
        );
        let mut fan = FanOut::new();
        fan.notify(
            &self.users,
            &NotificationTarget::Role(UserRole::HeadOfIt),
            &Notice {
                cr_id: &cr.id,
                cr_title: &cr.title,
                title: "Risk Certified: Ready for IT Approval",
                message: &message,
                kind: NotificationKind::Approval,
            },
            &self.template,
            now,
        );
        Ok((idx, cr, fan))
    }

    /// Attach the Head of IT's decision.
    ///
    /// Approval naming an engineer authorizes deployment and notifies that
    /// engineer. A rejection, or an approval without an engineer, returns
    /// the request to Initiated.
    pub async fn record_it_approval(
        &mut self,
        cr_id: &str,
        approval: ItApproval,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<ChangeRequest> {
        let (idx, cr, fan) = self.stage_it_approval(cr_id, approval, actor, now)?;
        self.change_requests[idx] = cr.clone();
        self.commit(&[SnapshotKey::ChangeRequests], fan).await?;
        Ok(cr)
    }

    fn stage_it_approval(
        &self,
        cr_id: &str,
        approval: ItApproval,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<(usize, ChangeRequest, FanOut)> {
        let _span = CrSpan::enter(cr_id, "record_it_approval");
        let (idx, mut cr) = self.checkout(cr_id)?;

        let engineer = approval.authorized_engineer().map(str::to_string);
        if let Some(engineer_id) = &engineer {
            if self.user(engineer_id).is_none() {
                return Err(ChangeGateError::UserNotFound(engineer_id.clone()));
            }
        }
        let (next, details) = match (&engineer, approval.approved) {
            (Some(_), _) => (CrStatus::ApprovedForDeployment, "Authorized for Production"),
            (None, false) => (CrStatus::Initiated, "Rejected"),
            (None, true) => (
                CrStatus::Initiated,
                "Returned - No Deployment Engineer Assigned",
            ),
        };
        self.advance(&mut cr, next)?;
        cr.it_approval = Some(approval);
        cr.push_audit(AuditEntry::new(
            AUDIT_EXECUTIVE_APPROVAL,
            &actor.name,
            details,
            now,
        ));

        let mut fan = FanOut::new();
        if let Some(engineer_id) = engineer {
            fan.notify(
                &self.users,
                &NotificationTarget::User(engineer_id),
                &Notice {
                    cr_id: &cr.id,
                    cr_title: &cr.title,
                    title: "Action Required: Production Release",
                    message: "Head of IT has authorized deployment. \
                              Proceed with production migration.",
                    kind: NotificationKind::Deployment,
                },
                &self.template,
                now,
            );
        }
        Ok((idx, cr, fan))
    }

    /// Record the outcome of a production deployment and tell the creator.
    pub async fn record_deployment(
        &mut self,
        cr_id: &str,
        report: DeploymentReport,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<ChangeRequest> {
        let (idx, cr, fan) = self.stage_deployment(cr_id, report, actor, now)?;
        self.change_requests[idx] = cr.clone();
        self.commit(&[SnapshotKey::ChangeRequests], fan).await?;
        Ok(cr)
    }

    fn stage_deployment(
        &self,
        cr_id: &str,
        report: DeploymentReport,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<(usize, ChangeRequest, FanOut)> {
        let _span = CrSpan::enter(cr_id, "record_deployment");
        let (idx, mut cr) = self.checkout(cr_id)?;

        let (next, details, title, kind) = if report.success {
            (
                CrStatus::Deployed,
                "Migration Successful",
                "Production Successful",
                NotificationKind::Deployment,
            )
        } else {
            (
                CrStatus::DeploymentFailed,
                "Migration Failed - Incident Logged",
                "Production Failed",
                NotificationKind::Alert,
            )
        };
        self.advance(&mut cr, next)?;
        cr.deployed_by = Some(actor.name.clone());
        cr.deployed_at = Some(now);
        if let Some(logs) = report.logs {
            cr.deployment_logs = Some(logs);
        }
        cr.push_audit(AuditEntry::new(
            AUDIT_PRODUCTION_EXECUTION,
            &actor.name,
            details,
            now,
        ));

        let mut fan = FanOut::new();
        if let Some(creator_id) = cr.creator_id.clone() {
            let message = format!(
                "Deployment execution for {} is complete. \
                 You can now download the Audit Certificate.",
                cr.id
            );
            fan.notify(
                &self.users,
                &NotificationTarget::User(creator_id),
                &Notice {
                    cr_id: &cr.id,
                    cr_title: &cr.title,
                    title,
                    message: &message,
                    kind,
                },
                &self.template,
                now,
            );
        }
        Ok((idx, cr, fan))
    }

    // ── Users ───────────────────────────────────────────────────────────

    pub async fn add_user(&mut self, user: User) -> Result<()> {
        if self.user(&user.id).is_some() {
            return Err(ChangeGateError::DuplicateUser(user.id));
        }
        self.users.push(user);
        self.commit(&[SnapshotKey::Users], FanOut::new()).await
    }

    /// Replace a user record. If it is the logged-in user, the session is
    /// refreshed too.
    pub async fn update_user(&mut self, user: User) -> Result<()> {
        let slot = self
            .users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or_else(|| ChangeGateError::UserNotFound(user.id.clone()))?;
        *slot = user.clone();

        if self.session.as_ref().is_some_and(|s| s.id == user.id) {
            self.session = Some(user);
            self.commit(&[SnapshotKey::Users, SnapshotKey::Session], FanOut::new())
                .await
        } else {
            self.commit(&[SnapshotKey::Users], FanOut::new()).await
        }
    }

    /// Remove a user and return it. Deleting the logged-in user ends the session.
    pub async fn delete_user(&mut self, id: &str) -> Result<User> {
        let idx = self
            .users
            .iter()
            .position(|u| u.id == id)
            .ok_or_else(|| ChangeGateError::UserNotFound(id.to_string()))?;
        let removed = self.users.remove(idx);

        if self.session.as_ref().is_some_and(|s| s.id == id) {
            self.session = None;
            self.commit(&[SnapshotKey::Users, SnapshotKey::Session], FanOut::new())
                .await?;
        } else {
            self.commit(&[SnapshotKey::Users], FanOut::new()).await?;
        }
        Ok(removed)
    }

    // ── Session ─────────────────────────────────────────────────────────

    pub fn current_user(&self) -> Option<&User> {
        self.session.as_ref()
    }

    /// Make `user_id` the current user. Disabled accounts are refused.
    pub async fn login(&mut self, user_id: &str) -> Result<User> {
        let user = self
            .user(user_id)
            .cloned()
            .ok_or_else(|| ChangeGateError::UserNotFound(user_id.to_string()))?;
        if !user.is_active() {
            return Err(ChangeGateError::UserDisabled(user.id));
        }
        self.session = Some(user.clone());
        self.commit(&[SnapshotKey::Session], FanOut::new()).await?;
        Ok(user)
    }

    /// Add a user and log them in.
    pub async fn register(&mut self, user: User) -> Result<User> {
        let id = user.id.clone();
        self.add_user(user).await?;
        self.login(&id).await
    }

    pub async fn logout(&mut self) -> Result<()> {
        self.session = None;
        self.commit(&[SnapshotKey::Session], FanOut::new()).await
    }

    // ── Inbox ───────────────────────────────────────────────────────────

    /// Notifications addressed to `user_id`, newest first.
    pub fn notifications_for(&self, user_id: &str) -> Vec<&AppNotification> {
        self.notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .collect()
    }

    pub fn unread_count(&self, user_id: &str) -> usize {
        self.notifications
            .iter()
            .filter(|n| n.user_id == user_id && !n.read)
            .count()
    }

    pub async fn mark_notification_read(&mut self, id: &str) -> Result<()> {
        let notification = self
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| ChangeGateError::NotificationNotFound(id.to_string()))?;
        if notification.read {
            return Ok(());
        }
        notification.read = true;
        self.commit(&[SnapshotKey::Notifications], FanOut::new()).await
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn position(&self, id: &str) -> Result<usize> {
        self.change_requests
            .iter()
            .position(|cr| cr.id == id)
            .ok_or_else(|| ChangeGateError::ChangeRequestNotFound(id.to_string()))
    }

    /// Index and working copy of a change request.
    fn checkout(&self, id: &str) -> Result<(usize, ChangeRequest)> {
        let idx = self.position(id)?;
        Ok((idx, self.change_requests[idx].clone()))
    }

    fn advance(&self, cr: &mut ChangeRequest, to: CrStatus) -> Result<()> {
        validate_transition(&cr.id, cr.status, to)?;
        obs::emit_status_changed(&cr.id, cr.status, to);
        cr.status = to;
        Ok(())
    }

    /// Publish staged notifications, persist the touched collections, then
    /// send queued emails.
    async fn commit(&mut self, keys: &[SnapshotKey], mut fan: FanOut) -> Result<()> {
        let mut keys = keys.to_vec();
        if !fan.notifications.is_empty() {
            fan.drain_into(&mut self.notifications);
            keys.push(SnapshotKey::Notifications);
        }
        for key in keys {
            self.persist(key).await?;
        }

        let outbox = std::mem::take(&mut fan.outbox);
        self.last_dispatch = if outbox.is_empty() {
            DispatchReport::default()
        } else {
            dispatch_all(self.dispatcher.as_ref(), outbox).await
        };
        Ok(())
    }

    async fn persist(&self, key: SnapshotKey) -> Result<()> {
        let store = self.store.as_ref();
        match key {
            SnapshotKey::Users => write_snapshot(store, key, &self.users).await?,
            SnapshotKey::ChangeRequests => {
                write_snapshot(store, key, &self.change_requests).await?
            }
            SnapshotKey::Notifications => {
                write_snapshot(store, key, &self.notifications).await?
            }
            SnapshotKey::Session => write_snapshot(store, key, &self.session).await?,
        };
        Ok(())
    }
}

async fn load_or_reset<T: DeserializeOwned>(
    store: &dyn BlobStore,
    key: SnapshotKey,
    default: impl FnOnce() -> T,
) -> Result<T> {
    match read_snapshot(store, key).await {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Ok(default()),
        Err(err @ StorageError::Corrupt { .. }) => {
            obs::emit_snapshot_reset(key.as_str(), &err);
            store.remove(key).await?;
            Ok(default())
        }
        Err(err) => Err(err.into()),
    }
}
