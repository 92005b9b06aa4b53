//! Read-only views over the change request portfolio: dashboard filtering
//! and the per-role work queues.

use serde::{Deserialize, Serialize};

use crate::domain::{ChangeFeature, ChangeRequest, CrStatus};

/// Dashboard filter. Every set criterion must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrFilter {
    #[serde(default)]
    pub status: Option<CrStatus>,
    #[serde(default)]
    pub creator_id: Option<String>,
    /// Case-insensitive substring of id, title or vendor.
    #[serde(default)]
    pub text: Option<String>,
}

impl CrFilter {
    pub fn with_status(mut self, status: CrStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_creator(mut self, creator_id: impl Into<String>) -> Self {
        self.creator_id = Some(creator_id.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn matches(&self, cr: &ChangeRequest) -> bool {
        if self.status.is_some_and(|s| s != cr.status) {
            return false;
        }
        if let Some(creator) = &self.creator_id {
            if cr.creator_id.as_deref() != Some(creator.as_str()) {
                return false;
            }
        }
        if let Some(text) = &self.text {
            let needle = text.trim().to_lowercase();
            if !needle.is_empty()
                && ![&cr.id, &cr.title, &cr.vendor_name]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
            {
                return false;
            }
        }
        true
    }

    /// Matching requests in portfolio order.
    pub fn apply<'a>(&self, crs: &'a [ChangeRequest]) -> Vec<&'a ChangeRequest> {
        crs.iter().filter(|cr| self.matches(cr)).collect()
    }
}

/// A feature awaiting a tester's certification.
#[derive(Debug, Clone, Copy)]
pub struct PendingFeature<'a> {
    pub change_request: &'a ChangeRequest,
    pub feature: &'a ChangeFeature,
}

/// Untested features assigned to `tester_id` on requests still in testing.
pub fn tester_queue<'a>(crs: &'a [ChangeRequest], tester_id: &str) -> Vec<PendingFeature<'a>> {
    crs.iter()
        .filter(|cr| cr.status.is_before_testing_completed())
        .flat_map(|cr| {
            cr.features
                .iter()
                .filter(move |f| f.assigned_tester_id == tester_id && !f.is_tested())
                .map(move |feature| PendingFeature {
                    change_request: cr,
                    feature,
                })
        })
        .collect()
}

/// Requests waiting for the Risk Team.
pub fn risk_queue(crs: &[ChangeRequest]) -> Vec<&ChangeRequest> {
    crs.iter()
        .filter(|cr| cr.status == CrStatus::TestingCompleted)
        .collect()
}

/// Requests waiting for the Head of IT.
pub fn it_approval_queue(crs: &[ChangeRequest]) -> Vec<&ChangeRequest> {
    crs.iter()
        .filter(|cr| cr.status.is_awaiting_it_approval())
        .collect()
}

/// Requests `engineer_id` is authorized to deploy.
pub fn deployment_queue<'a>(
    crs: &'a [ChangeRequest],
    engineer_id: &str,
) -> Vec<&'a ChangeRequest> {
    crs.iter()
        .filter(|cr| cr.status == CrStatus::ApprovedForDeployment)
        .filter(|cr| {
            cr.it_approval
                .as_ref()
                .and_then(|a| a.authorized_engineer())
                == Some(engineer_id)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Actor, ChangeRequestDraft, FeatureDraft, FeaturePatch, ItApproval, RiskLevel, TestResult,
    };
    use chrono::{NaiveDate, Utc};

    fn cr(id: &str, title: &str, creator: &str, testers: &[&str]) -> ChangeRequest {
        let draft = ChangeRequestDraft {
            id: Some(id.into()),
            title: title.into(),
            vendor_name: "Fintech Solutions".into(),
            version_number: "1".into(),
            environment: "PRODUCTION".into(),
            release_note_url: None,
            release_note_content: None,
            planned_start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            planned_end_date: NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            features: testers
                .iter()
                .enumerate()
                .map(|(i, t)| FeatureDraft {
                    id: Some(format!("f-{i}")),
                    name: format!("Feature {i}"),
                    description: String::new(),
                    module: String::new(),
                    risk_level: RiskLevel::Medium,
                    assigned_tester_id: t.to_string(),
                })
                .collect(),
        };
        ChangeRequest::from_draft(draft, &Actor::new(creator, creator), Utc::now())
    }

    #[test]
    fn filter_combines_criteria() {
        let mut a = cr("CR-1", "Core banking patch", "u-1", &[]);
        a.status = CrStatus::Deployed;
        let b = cr("CR-2", "Portal refresh", "u-2", &[]);
        let crs = vec![a, b];

        let hits = CrFilter::default().with_text("BANKING").apply(&crs);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "CR-1");

        let hits = CrFilter::default()
            .with_text("fintech")
            .with_creator("u-2")
            .apply(&crs);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "CR-2");

        assert!(CrFilter::default()
            .with_status(CrStatus::Deployed)
            .with_creator("u-2")
            .apply(&crs)
            .is_empty());
    }

    #[test]
    fn tester_queue_skips_tested_features() {
        let mut c = cr("CR-1", "t", "u-1", &["u-t", "u-t", "u-x"]);
        c.features[0].apply(FeaturePatch::certified(TestResult::Pass, "", Utc::now()));
        let crs = vec![c];
        let queue = tester_queue(&crs, "u-t");
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].feature.id, "f-1");
    }

    #[test]
    fn role_queues_follow_status() {
        let mut testing_done = cr("CR-1", "a", "u", &[]);
        testing_done.status = CrStatus::TestingCompleted;
        let mut reviewed = cr("CR-2", "b", "u", &[]);
        reviewed.status = CrStatus::RiskReviewed;
        let mut approved = cr("CR-3", "c", "u", &[]);
        approved.status = CrStatus::ApprovedForDeployment;
        approved.it_approval = Some(ItApproval {
            approved: true,
            comments: String::new(),
            approved_by: "Francis".into(),
            deployment_engineer_id: Some("u-musa".into()),
            planned_deployment_date: None,
            timestamp: Utc::now(),
        });
        let crs = vec![testing_done, reviewed, approved];

        assert_eq!(risk_queue(&crs)[0].id, "CR-1");
        assert_eq!(it_approval_queue(&crs)[0].id, "CR-2");
        assert_eq!(deployment_queue(&crs, "u-musa")[0].id, "CR-3");
        assert!(deployment_queue(&crs, "u-other").is_empty());
    }
}
