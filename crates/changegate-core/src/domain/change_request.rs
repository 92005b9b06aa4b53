//! The change request and the sub-entities it owns.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::CrStatus;
use super::user::Actor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestResult {
    Pass,
    Fail,
    Conditional,
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureStatus {
    #[default]
    Pending,
    Tested,
}

/// An individually testable element of a change request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeFeature {
    pub id: String,
    pub name: String,
    pub description: String,
    pub module: String,
    pub risk_level: RiskLevel,
    pub assigned_tester_id: String,
    pub status: FeatureStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_result: Option<TestResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_observations: Option<String>,
    /// Reference to uploaded evidence (URL or data URI).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_screenshot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_timestamp: Option<DateTime<Utc>>,
}

impl ChangeFeature {
    pub fn is_tested(&self) -> bool {
        self.status == FeatureStatus::Tested
    }

    /// Merge a partial test update into this feature.
    pub fn apply(&mut self, patch: FeaturePatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(result) = patch.test_result {
            self.test_result = Some(result);
        }
        if let Some(obs) = patch.test_observations {
            self.test_observations = Some(obs);
        }
        if let Some(shot) = patch.test_screenshot {
            self.test_screenshot = Some(shot);
        }
        if let Some(ts) = patch.test_timestamp {
            self.test_timestamp = Some(ts);
        }
    }
}

/// Partial update of a feature's test fields. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturePatch {
    #[serde(default)]
    pub status: Option<FeatureStatus>,
    #[serde(default)]
    pub test_result: Option<TestResult>,
    #[serde(default)]
    pub test_observations: Option<String>,
    #[serde(default)]
    pub test_screenshot: Option<String>,
    #[serde(default)]
    pub test_timestamp: Option<DateTime<Utc>>,
}

impl FeaturePatch {
    /// A tester's certification: marks the feature Tested with a result.
    pub fn certified(
        result: TestResult,
        observations: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            status: Some(FeatureStatus::Tested),
            test_result: Some(result),
            test_observations: Some(observations.into()),
            test_screenshot: None,
            test_timestamp: Some(now),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskDecision {
    Accept,
    Mitigate,
    Reject,
    Pending,
}

impl RiskDecision {
    pub fn label(self) -> &'static str {
        match self {
            Self::Accept => "Accept",
            Self::Mitigate => "Mitigate",
            Self::Reject => "Reject",
            Self::Pending => "Pending",
        }
    }

    /// Verb phrase used in notification text ("Risk Team has accepted ...").
    pub fn past_tense(self) -> &'static str {
        match self {
            Self::Accept => "accepted",
            Self::Mitigate => "mitigated",
            Self::Reject => "rejected",
            Self::Pending => "deferred",
        }
    }
}

impl std::fmt::Display for RiskDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// The Risk Team's determination for one pass through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub decision: RiskDecision,
    pub operational_risk: String,
    pub compliance_risk: String,
    pub reputational_risk: String,
    pub comments: String,
    pub assessed_by: String,
    pub timestamp: DateTime<Utc>,
}

/// Executive authorization naming the deploying engineer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItApproval {
    pub approved: bool,
    pub comments: String,
    pub approved_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_engineer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planned_deployment_date: Option<NaiveDateTime>,
    pub timestamp: DateTime<Utc>,
}

impl ItApproval {
    /// Engineer to hand over to, if the approval actually authorizes deployment.
    pub fn authorized_engineer(&self) -> Option<&str> {
        if self.approved {
            self.deployment_engineer_id
                .as_deref()
                .filter(|id| !id.trim().is_empty())
        } else {
            None
        }
    }
}

/// Append-only record of a lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub action: String,
    pub user: String,
    pub timestamp: DateTime<Utc>,
    pub details: String,
}

impl AuditEntry {
    pub fn new(
        action: impl Into<String>,
        user: impl Into<String>,
        details: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("audit-{}", Uuid::new_v4().simple()),
            action: action.into(),
            user: user.into(),
            timestamp: now,
            details: details.into(),
        }
    }

    /// `"{action}: {details}"`, the form shown in audit trails.
    pub fn summary(&self) -> String {
        format!("{}: {}", self.action, self.details)
    }
}

/// The unit of work tracked through the approval and deployment pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub id: String,
    pub title: String,
    pub vendor_name: String,
    pub version_number: String,
    pub environment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_note_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_note_content: Option<String>,
    pub planned_start_date: NaiveDate,
    pub planned_end_date: NaiveDate,
    pub status: CrStatus,
    pub features: Vec<ChangeFeature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_assessment: Option<RiskAssessment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub it_approval: Option<ItApproval>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_logs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_at: Option<DateTime<Utc>>,
    /// Newest first.
    #[serde(default)]
    pub audit_logs: Vec<AuditEntry>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_id: Option<String>,
}

impl ChangeRequest {
    /// Build a freshly initiated request from a draft.
    pub fn from_draft(draft: ChangeRequestDraft, creator: &Actor, now: DateTime<Utc>) -> Self {
        let id = draft
            .id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| generate_cr_id(now));
        let features = draft
            .features
            .into_iter()
            .map(FeatureDraft::into_feature)
            .collect();
        Self {
            id,
            title: draft.title,
            vendor_name: draft.vendor_name,
            version_number: draft.version_number,
            environment: draft.environment,
            release_note_url: draft.release_note_url,
            release_note_content: draft.release_note_content,
            planned_start_date: draft.planned_start_date,
            planned_end_date: draft.planned_end_date,
            status: CrStatus::Initiated,
            features,
            risk_assessment: None,
            it_approval: None,
            deployment_logs: None,
            deployed_by: None,
            deployed_at: None,
            audit_logs: Vec::new(),
            created_at: now,
            created_by: creator.name.clone(),
            creator_id: Some(creator.id.clone()),
        }
    }

    /// Replace the editable fields with those of `draft`.
    ///
    /// Status, audit trail, assessments and creator are untouched. Features
    /// whose id matches an existing feature keep their test state.
    pub fn apply_draft(&mut self, draft: ChangeRequestDraft) {
        self.title = draft.title;
        self.vendor_name = draft.vendor_name;
        self.version_number = draft.version_number;
        self.environment = draft.environment;
        self.release_note_url = draft.release_note_url;
        self.release_note_content = draft.release_note_content;
        self.planned_start_date = draft.planned_start_date;
        self.planned_end_date = draft.planned_end_date;

        let mut previous = std::mem::take(&mut self.features);
        self.features = draft
            .features
            .into_iter()
            .map(|fd| {
                let existing = fd
                    .id
                    .as_deref()
                    .and_then(|id| previous.iter().position(|f| f.id == id))
                    .map(|idx| previous.remove(idx));
                match existing {
                    Some(mut kept) => {
                        kept.name = fd.name;
                        kept.description = fd.description;
                        kept.module = fd.module;
                        kept.risk_level = fd.risk_level;
                        kept.assigned_tester_id = fd.assigned_tester_id;
                        kept
                    }
                    None => fd.into_feature(),
                }
            })
            .collect();
    }

    pub fn feature(&self, feature_id: &str) -> Option<&ChangeFeature> {
        self.features.iter().find(|f| f.id == feature_id)
    }

    pub fn feature_mut(&mut self, feature_id: &str) -> Option<&mut ChangeFeature> {
        self.features.iter_mut().find(|f| f.id == feature_id)
    }

    /// True when there is at least one feature and every feature is Tested.
    pub fn all_features_tested(&self) -> bool {
        !self.features.is_empty() && self.features.iter().all(ChangeFeature::is_tested)
    }

    /// Prepend an audit entry (the log is newest first).
    pub fn push_audit(&mut self, entry: AuditEntry) {
        self.audit_logs.insert(0, entry);
    }

    pub fn latest_audit(&self) -> Option<&AuditEntry> {
        self.audit_logs.first()
    }
}

/// Generate an id of the form `CR-<year>-<8 hex>`.
pub fn generate_cr_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("CR-{}-{}", now.year(), suffix[..8].to_ascii_uppercase())
}

/// Caller-supplied content of a new or edited change request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRequestDraft {
    /// Explicit id; generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    pub vendor_name: String,
    pub version_number: String,
    pub environment: String,
    #[serde(default)]
    pub release_note_url: Option<String>,
    #[serde(default)]
    pub release_note_content: Option<String>,
    pub planned_start_date: NaiveDate,
    pub planned_end_date: NaiveDate,
    #[serde(default)]
    pub features: Vec<FeatureDraft>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub module: String,
    pub risk_level: RiskLevel,
    pub assigned_tester_id: String,
}

impl FeatureDraft {
    fn into_feature(self) -> ChangeFeature {
        ChangeFeature {
            id: self
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| format!("f-{}", &Uuid::new_v4().simple().to_string()[..8])),
            name: self.name,
            description: self.description,
            module: self.module,
            risk_level: self.risk_level,
            assigned_tester_id: self.assigned_tester_id,
            status: FeatureStatus::Pending,
            test_result: None,
            test_observations: None,
            test_screenshot: None,
            test_timestamp: None,
        }
    }
}

/// Outcome reported by the deployment engineer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentReport {
    pub success: bool,
    #[serde(default)]
    pub logs: Option<String>,
}

impl DeploymentReport {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            logs: None,
        }
    }

    pub fn failed() -> Self {
        Self {
            success: false,
            logs: None,
        }
    }

    pub fn with_logs(mut self, logs: impl Into<String>) -> Self {
        self.logs = Some(logs.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(features: Vec<FeatureDraft>) -> ChangeRequestDraft {
        ChangeRequestDraft {
            id: Some("CR-2025-0001".into()),
            title: "Core banking patch".into(),
            vendor_name: "Fintech Solutions".into(),
            version_number: "v4.2.1".into(),
            environment: "PRODUCTION".into(),
            release_note_url: None,
            release_note_content: None,
            planned_start_date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            planned_end_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            features,
        }
    }

    fn feature_draft(id: Option<&str>, name: &str) -> FeatureDraft {
        FeatureDraft {
            id: id.map(str::to_string),
            name: name.into(),
            description: String::new(),
            module: "Identity".into(),
            risk_level: RiskLevel::High,
            assigned_tester_id: "u-glory".into(),
        }
    }

    #[test]
    fn from_draft_starts_initiated_with_creator() {
        let creator = Actor::new("u-simon", "Simon");
        let cr = ChangeRequest::from_draft(
            draft(vec![feature_draft(Some("f-1"), "OAuth2")]),
            &creator,
            Utc::now(),
        );
        assert_eq!(cr.status, CrStatus::Initiated);
        assert_eq!(cr.creator_id.as_deref(), Some("u-simon"));
        assert_eq!(cr.created_by, "Simon");
        assert_eq!(cr.features[0].status, FeatureStatus::Pending);
        assert!(cr.audit_logs.is_empty());
    }

    #[test]
    fn missing_ids_are_generated() {
        let mut d = draft(vec![feature_draft(None, "OAuth2")]);
        d.id = None;
        let now = Utc::now();
        let cr = ChangeRequest::from_draft(d, &Actor::new("u", "U"), now);
        assert!(cr.id.starts_with(&format!("CR-{}-", now.year())));
        assert!(cr.features[0].id.starts_with("f-"));
    }

    #[test]
    fn no_features_is_never_all_tested() {
        let cr = ChangeRequest::from_draft(draft(vec![]), &Actor::new("u", "U"), Utc::now());
        assert!(!cr.all_features_tested());
    }

    #[test]
    fn apply_draft_keeps_test_state_of_matching_features() {
        let now = Utc::now();
        let mut cr = ChangeRequest::from_draft(
            draft(vec![
                feature_draft(Some("f-1"), "OAuth2"),
                feature_draft(Some("f-2"), "Encryption"),
            ]),
            &Actor::new("u", "U"),
            now,
        );
        cr.features[0].apply(FeaturePatch::certified(TestResult::Pass, "ok", now));

        cr.apply_draft(draft(vec![
            feature_draft(Some("f-1"), "OAuth2 (renamed)"),
            feature_draft(None, "New feature"),
        ]));

        assert_eq!(cr.features.len(), 2);
        assert_eq!(cr.features[0].name, "OAuth2 (renamed)");
        assert!(cr.features[0].is_tested());
        assert!(!cr.features[1].is_tested());
    }

    #[test]
    fn patch_leaves_unset_fields_alone() {
        let mut f = feature_draft(Some("f-1"), "OAuth2").into_feature();
        f.apply(FeaturePatch {
            test_observations: Some("partial notes".into()),
            ..FeaturePatch::default()
        });
        assert_eq!(f.status, FeatureStatus::Pending);
        assert_eq!(f.test_observations.as_deref(), Some("partial notes"));
        assert!(f.test_result.is_none());
    }

    #[test]
    fn audit_log_is_newest_first() {
        let now = Utc::now();
        let mut cr = ChangeRequest::from_draft(draft(vec![]), &Actor::new("u", "U"), now);
        cr.push_audit(AuditEntry::new("First", "U", "one", now));
        cr.push_audit(AuditEntry::new("Second", "U", "two", now));
        assert_eq!(cr.latest_audit().unwrap().action, "Second");
        assert_eq!(cr.audit_logs[1].summary(), "First: one");
    }

    #[test]
    fn approval_without_engineer_authorizes_nobody() {
        let approval = ItApproval {
            approved: true,
            comments: String::new(),
            approved_by: "Francis".into(),
            deployment_engineer_id: Some("  ".into()),
            planned_deployment_date: None,
            timestamp: Utc::now(),
        };
        assert_eq!(approval.authorized_engineer(), None);
    }
}
