//! Change-request status values and the transition table between them.

use serde::{Deserialize, Serialize};

use super::error::{ChangeGateError, Result};

/// Position of a change request in the approval pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrStatus {
    Initiated,
    TestingAssigned,
    TestingCompleted,
    RiskReviewed,
    AwaitingItApproval,
    ApprovedForDeployment,
    Deployed,
    DeploymentFailed,
    Closed,
}

impl CrStatus {
    /// Every status value, in pipeline order.
    pub const ALL: [CrStatus; 9] = [
        CrStatus::Initiated,
        CrStatus::TestingAssigned,
        CrStatus::TestingCompleted,
        CrStatus::RiskReviewed,
        CrStatus::AwaitingItApproval,
        CrStatus::ApprovedForDeployment,
        CrStatus::Deployed,
        CrStatus::DeploymentFailed,
        CrStatus::Closed,
    ];

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Initiated => "Initiated",
            Self::TestingAssigned => "Testing Assigned",
            Self::TestingCompleted => "Testing Completed",
            Self::RiskReviewed => "Risk Reviewed",
            Self::AwaitingItApproval => "Awaiting IT Approval",
            Self::ApprovedForDeployment => "Approved for Deployment",
            Self::Deployed => "Deployed",
            Self::DeploymentFailed => "Deployment Failed",
            Self::Closed => "Closed",
        }
    }

    /// Statuses reachable from `self` through a lifecycle handler.
    pub fn allowed_transitions(self) -> &'static [CrStatus] {
        use CrStatus::*;
        match self {
            Initiated => &[TestingAssigned, TestingCompleted],
            TestingAssigned => &[TestingCompleted],
            TestingCompleted => &[RiskReviewed],
            RiskReviewed => &[AwaitingItApproval, ApprovedForDeployment, Initiated],
            AwaitingItApproval => &[ApprovedForDeployment, Initiated],
            ApprovedForDeployment => &[Deployed, DeploymentFailed],
            Deployed => &[Closed],
            DeploymentFailed => &[Closed],
            Closed => &[],
        }
    }

    pub fn can_transition_to(self, to: CrStatus) -> bool {
        self.allowed_transitions().contains(&to)
    }

    /// Whether testing has not finished yet in the current pass.
    pub fn is_before_testing_completed(self) -> bool {
        matches!(self, Self::Initiated | Self::TestingAssigned)
    }

    pub fn is_awaiting_it_approval(self) -> bool {
        matches!(self, Self::RiskReviewed | Self::AwaitingItApproval)
    }
}

impl std::fmt::Display for CrStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for CrStatus {
    type Err = ChangeGateError;

    /// Accepts the label ("Risk Reviewed") or the wire name ("risk_reviewed").
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase().replace(['_', '-'], " ");
        CrStatus::ALL
            .into_iter()
            .find(|st| st.label().to_ascii_lowercase() == wanted)
            .ok_or_else(|| ChangeGateError::InvalidInput(format!("unknown status: {s}")))
    }
}

/// Reject any status change outside the transition table.
pub fn validate_transition(cr_id: &str, from: CrStatus, to: CrStatus) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(ChangeGateError::InvalidTransition {
            cr_id: cr_id.to_string(),
            from,
            to,
        })
    }
}
