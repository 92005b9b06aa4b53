//! Domain model for changegate.
//!
//! Change requests and everything they own, users and roles, in-app
//! notifications, and the status transition table.

pub mod change_request;
pub mod error;
pub mod notification;
pub mod status;
pub mod user;

pub use change_request::{
    generate_cr_id, AuditEntry, ChangeFeature, ChangeRequest, ChangeRequestDraft,
    DeploymentReport, FeatureDraft, FeaturePatch, FeatureStatus, ItApproval, RiskAssessment,
    RiskDecision, RiskLevel, TestResult,
};
pub use error::{ChangeGateError, Result};
pub use notification::{AppNotification, NotificationKind};
pub use status::{validate_transition, CrStatus};
pub use user::{default_users, Actor, User, UserRole, UserStatus};
