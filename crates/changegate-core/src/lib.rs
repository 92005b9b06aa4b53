//! changegate core library
//!
//! The change request lifecycle engine, notification fan-out and delivery,
//! portfolio queries, and the ambient configuration and tracing setup
//! shared by changegate binaries.

pub mod config;
pub mod domain;
pub mod lifecycle;
pub mod notify;
pub mod obs;
pub mod queries;
pub mod reports;
pub mod telemetry;

pub use config::GateConfig;

pub use domain::{
    default_users, generate_cr_id, validate_transition, Actor, AppNotification, AuditEntry,
    ChangeFeature, ChangeGateError, ChangeRequest, ChangeRequestDraft, CrStatus,
    DeploymentReport, FeatureDraft, FeaturePatch, FeatureStatus, ItApproval, NotificationKind,
    Result, RiskAssessment, RiskDecision, RiskLevel, TestResult, User, UserRole, UserStatus,
};

pub use lifecycle::{LifecycleEngine, NotificationTarget};

pub use notify::{
    dispatch_all, DispatchError, DispatchReport, EmailTemplate, HttpRelayDispatcher,
    LogDispatcher, NotificationDispatcher, OutboundEmail,
};

pub use queries::{
    deployment_queue, it_approval_queue, risk_queue, tester_queue, CrFilter, PendingFeature,
};
pub use reports::PortfolioReport;

pub use changegate_state::{BlobStore, FsBlobStore, SnapshotKey, StorageError, SurrealBlobStore};
