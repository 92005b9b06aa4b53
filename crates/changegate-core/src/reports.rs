//! Portfolio-level summary for management reporting.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{ChangeRequest, CrStatus, TestResult};

/// Aggregate counts over a set of change requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioReport {
    pub total: usize,
    pub by_status: BTreeMap<CrStatus, usize>,
    pub features_total: usize,
    pub features_tested: usize,
    pub passed: usize,
    pub failed: usize,
    pub conditional: usize,
    pub deployed: usize,
    pub deployment_failed: usize,
    /// Deployed / (Deployed + Deployment Failed); `None` before any attempt.
    pub deployment_success_rate: Option<f32>,
}

impl PortfolioReport {
    pub fn build(crs: &[ChangeRequest]) -> Self {
        let mut report = PortfolioReport {
            total: crs.len(),
            ..Self::default()
        };
        for cr in crs {
            *report.by_status.entry(cr.status).or_insert(0) += 1;
            for feature in &cr.features {
                report.features_total += 1;
                if feature.is_tested() {
                    report.features_tested += 1;
                }
                match feature.test_result {
                    Some(TestResult::Pass) => report.passed += 1,
                    Some(TestResult::Fail) => report.failed += 1,
                    Some(TestResult::Conditional) => report.conditional += 1,
                    Some(TestResult::Pending) | None => {}
                }
            }
        }
        report.deployed = report.count(CrStatus::Deployed);
        report.deployment_failed = report.count(CrStatus::DeploymentFailed);
        let attempts = report.deployed + report.deployment_failed;
        if attempts > 0 {
            report.deployment_success_rate = Some(report.deployed as f32 / attempts as f32);
        }
        report
    }

    pub fn count(&self, status: CrStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    /// Render as a markdown summary.
    pub fn render_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# Change Portfolio\n\n");
        out.push_str(&format!("- change requests: {}\n", self.total));
        for status in CrStatus::ALL {
            let n = self.count(status);
            if n > 0 {
                out.push_str(&format!("  - {}: {}\n", status, n));
            }
        }
        out.push_str(&format!(
            "- features tested: {}/{}\n- pass: {}\n- fail: {}\n- conditional: {}\n",
            self.features_tested, self.features_total, self.passed, self.failed, self.conditional
        ));
        match self.deployment_success_rate {
            Some(rate) => out.push_str(&format!(
                "- deployment success: {:.0}% ({} of {})\n",
                rate * 100.0,
                self.deployed,
                self.deployed + self.deployment_failed
            )),
            None => out.push_str("- deployment success: n/a\n"),
        }
        out
    }
}
