//! End-to-end walks through the change request pipeline.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use changegate_core::notify::fakes::{FailingDispatcher, RecordingDispatcher};
use changegate_core::{
    Actor, ChangeGateError, ChangeRequestDraft, CrStatus, DeploymentReport, EmailTemplate,
    FeatureDraft, FeaturePatch, ItApproval, LifecycleEngine, NotificationDispatcher,
    NotificationKind, RiskAssessment, RiskDecision, RiskLevel, TestResult, User, UserRole,
};
use changegate_state::fakes::MemoryBlobStore;

// ── Fixtures ───────────────────────────────────────────────────────────

fn staff() -> Vec<User> {
    vec![
        User::new("u-simon", "Simon Okafor", "simon@bank.test", vec![UserRole::DbTeam]),
        User::new("u-glory", "Glory Eze", "glory@bank.test", vec![UserRole::Tester]),
        User::new("u-ade", "Ade Bello", "ade@bank.test", vec![UserRole::Tester]),
        User::new("u-risk1", "Ngozi Risk", "ngozi@bank.test", vec![UserRole::RiskTeam]),
        User::new("u-risk2", "Tunde Risk", "tunde@bank.test", vec![UserRole::RiskTeam]),
        User::new("u-francis", "Francis Obi", "francis@bank.test", vec![UserRole::HeadOfIt]),
        User::new(
            "u-musa",
            "Musa Umaru",
            "musa@bank.test",
            vec![UserRole::DeploymentEngineer],
        ),
    ]
}

async fn engine_with(dispatcher: Arc<dyn NotificationDispatcher>) -> LifecycleEngine {
    let mut engine = LifecycleEngine::load(
        Arc::new(MemoryBlobStore::new()),
        dispatcher,
        EmailTemplate::default(),
    )
    .await
    .unwrap();
    for user in staff() {
        engine.add_user(user).await.unwrap();
    }
    engine
}

fn creator() -> Actor {
    Actor::new("u-simon", "Simon Okafor")
}

fn draft() -> ChangeRequestDraft {
    ChangeRequestDraft {
        id: Some("CR-2025-8842".into()),
        title: "Core Banking Security Patch".into(),
        vendor_name: "Fintech Solutions Ltd".into(),
        version_number: "v4.2.1".into(),
        environment: "PRODUCTION".into(),
        release_note_url: None,
        release_note_content: Some("Security fixes".into()),
        planned_start_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        planned_end_date: NaiveDate::from_ymd_opt(2025, 6, 3).unwrap(),
        features: vec![
            FeatureDraft {
                id: Some("f-oauth".into()),
                name: "OAuth2 Integration".into(),
                description: "Token exchange".into(),
                module: "Identity".into(),
                risk_level: RiskLevel::High,
                assigned_tester_id: "u-glory".into(),
            },
            FeatureDraft {
                id: Some("f-aes".into()),
                name: "AES-256 Encryption".into(),
                description: "At-rest encryption".into(),
                module: "Storage".into(),
                risk_level: RiskLevel::Medium,
                assigned_tester_id: "u-ade".into(),
            },
        ],
    }
}

fn pass() -> FeaturePatch {
    FeaturePatch::certified(TestResult::Pass, "Verified in UAT", Utc::now())
}

fn assessment(decision: RiskDecision) -> RiskAssessment {
    RiskAssessment {
        decision,
        operational_risk: "Low".into(),
        compliance_risk: "Low".into(),
        reputational_risk: "Low".into(),
        comments: "Reviewed".into(),
        assessed_by: "Ngozi Risk".into(),
        timestamp: Utc::now(),
    }
}

fn approval(approved: bool, engineer: Option<&str>) -> ItApproval {
    ItApproval {
        approved,
        comments: String::new(),
        approved_by: "Francis Obi".into(),
        deployment_engineer_id: engineer.map(str::to_string),
        planned_deployment_date: None,
        timestamp: Utc::now(),
    }
}

/// Drive a fresh request to Risk Reviewed.
async fn to_risk_reviewed(engine: &mut LifecycleEngine) {
    let now = Utc::now();
    let tester = Actor::new("u-glory", "Glory Eze");
    engine.create(draft(), &creator(), now).await.unwrap();
    engine
        .record_feature_result("CR-2025-8842", "f-oauth", pass(), &tester, now)
        .await
        .unwrap();
    engine
        .record_feature_result("CR-2025-8842", "f-aes", pass(), &tester, now)
        .await
        .unwrap();
    engine
        .record_risk_assessment(
            "CR-2025-8842",
            assessment(RiskDecision::Accept),
            &Actor::new("u-risk1", "Ngozi Risk"),
            now,
        )
        .await
        .unwrap();
}

fn count_titled(engine: &LifecycleEngine, user_id: &str, title: &str) -> usize {
    engine
        .notifications_for(user_id)
        .iter()
        .filter(|n| n.title == title)
        .count()
}

// ── Testing gate ───────────────────────────────────────────────────────

#[tokio::test]
async fn testing_completes_only_when_every_feature_is_tested() {
    let recorder = Arc::new(RecordingDispatcher::new());
    let mut engine = engine_with(recorder.clone()).await;
    let now = Utc::now();
    let tester = Actor::new("u-glory", "Glory Eze");
    engine.create(draft(), &creator(), now).await.unwrap();

    let cr = engine
        .record_feature_result("CR-2025-8842", "f-oauth", pass(), &tester, now)
        .await
        .unwrap();
    assert_eq!(cr.status, CrStatus::Initiated);
    assert_eq!(
        count_titled(&engine, "u-risk1", "Testing Completed: Ready for Risk Review"),
        0
    );

    let cr = engine
        .record_feature_result("CR-2025-8842", "f-aes", pass(), &tester, now)
        .await
        .unwrap();
    assert_eq!(cr.status, CrStatus::TestingCompleted);
    for risk in ["u-risk1", "u-risk2"] {
        assert_eq!(
            count_titled(&engine, risk, "Testing Completed: Ready for Risk Review"),
            1
        );
    }
    for other in ["u-simon", "u-glory", "u-ade", "u-francis", "u-musa"] {
        assert_eq!(
            count_titled(&engine, other, "Testing Completed: Ready for Risk Review"),
            0,
            "{other} is not on the Risk Team"
        );
    }
    let mut risk_mail: Vec<String> = recorder
        .sent()
        .into_iter()
        .filter(|m| m.subject.starts_with("Testing Completed: Ready for Risk Review"))
        .map(|m| m.to)
        .collect();
    risk_mail.sort();
    assert_eq!(risk_mail, vec!["ngozi@bank.test", "tunde@bank.test"]);
}

#[tokio::test]
async fn re_recording_after_completion_does_not_renotify() {
    let recorder = Arc::new(RecordingDispatcher::new());
    let mut engine = engine_with(recorder.clone()).await;
    let now = Utc::now();
    let tester = Actor::new("u-glory", "Glory Eze");
    engine.create(draft(), &creator(), now).await.unwrap();
    for feature in ["f-oauth", "f-aes", "f-aes", "f-oauth"] {
        engine
            .record_feature_result("CR-2025-8842", feature, pass(), &tester, now)
            .await
            .unwrap();
    }

    assert_eq!(
        count_titled(&engine, "u-risk1", "Testing Completed: Ready for Risk Review"),
        1
    );
    assert_eq!(recorder.sent_to("ngozi@bank.test").len(), 1);
    assert_eq!(
        engine.change_request("CR-2025-8842").unwrap().status,
        CrStatus::TestingCompleted
    );
}

#[tokio::test]
async fn create_assigns_each_tester_once() {
    let recorder = Arc::new(RecordingDispatcher::new());
    let mut engine = engine_with(recorder.clone()).await;
    engine.create(draft(), &creator(), Utc::now()).await.unwrap();

    let glory = engine.notifications_for("u-glory");
    assert_eq!(glory.len(), 1);
    assert_eq!(glory[0].kind, NotificationKind::Assignment);
    assert_eq!(glory[0].link.as_deref(), Some("CR-2025-8842"));

    let mail = recorder.sent_to("glory@bank.test");
    assert_eq!(mail.len(), 1);
    assert_eq!(
        mail[0].subject,
        "UAT Assignment: OAuth2 Integration [CR-2025-8842]"
    );
    assert!(mail[0].html_body.contains("Dear Glory Eze,"));
}

// ── Risk and approval ──────────────────────────────────────────────────

#[tokio::test]
async fn reject_decision_still_advances_to_risk_reviewed() {
    let mut engine = engine_with(Arc::new(RecordingDispatcher::new())).await;
    let now = Utc::now();
    let tester = Actor::new("u-glory", "Glory Eze");
    engine.create(draft(), &creator(), now).await.unwrap();
    for feature in ["f-oauth", "f-aes"] {
        engine
            .record_feature_result("CR-2025-8842", feature, pass(), &tester, now)
            .await
            .unwrap();
    }

    let cr = engine
        .record_risk_assessment(
            "CR-2025-8842",
            assessment(RiskDecision::Reject),
            &Actor::new("u-risk1", "Ngozi Risk"),
            now,
        )
        .await
        .unwrap();
    assert_eq!(cr.status, CrStatus::RiskReviewed);
    assert_eq!(cr.latest_audit().unwrap().summary(), "Risk Certified: Outcome: Reject");

    let inbox = engine.notifications_for("u-francis");
    assert_eq!(inbox.len(), 1);
    assert_eq!(
        inbox[0].message,
        "Risk Team has rejected the change. Final executive authorization required."
    );
}

#[tokio::test]
async fn approval_with_engineer_notifies_that_engineer_once() {
    let recorder = Arc::new(RecordingDispatcher::new());
    let mut engine = engine_with(recorder.clone()).await;
    to_risk_reviewed(&mut engine).await;

    let cr = engine
        .record_it_approval(
            "CR-2025-8842",
            approval(true, Some("u-musa")),
            &Actor::new("u-francis", "Francis Obi"),
            Utc::now(),
        )
        .await
        .unwrap();

    assert_eq!(cr.status, CrStatus::ApprovedForDeployment);
    assert_eq!(
        cr.latest_audit().unwrap().summary(),
        "Executive Approval: Authorized for Production"
    );
    let deploy: Vec<_> = engine
        .notifications_for("u-musa")
        .into_iter()
        .filter(|n| n.kind == NotificationKind::Deployment)
        .collect();
    assert_eq!(deploy.len(), 1);
    assert_eq!(deploy[0].title, "Action Required: Production Release");
    assert_eq!(recorder.sent_to("musa@bank.test").len(), 1);
}

#[tokio::test]
async fn rejection_returns_to_initiated_without_deployment_notice() {
    let mut engine = engine_with(Arc::new(RecordingDispatcher::new())).await;
    to_risk_reviewed(&mut engine).await;

    let cr = engine
        .record_it_approval(
            "CR-2025-8842",
            approval(false, Some("u-musa")),
            &Actor::new("u-francis", "Francis Obi"),
            Utc::now(),
        )
        .await
        .unwrap();

    assert_eq!(cr.status, CrStatus::Initiated);
    assert_eq!(
        cr.latest_audit().unwrap().summary(),
        "Executive Approval: Rejected"
    );
    assert!(engine.notifications_for("u-musa").is_empty());
}

#[tokio::test]
async fn rejected_request_re_enters_review_after_retest() {
    let recorder = Arc::new(RecordingDispatcher::new());
    let mut engine = engine_with(recorder.clone()).await;
    to_risk_reviewed(&mut engine).await;
    let head_of_it = Actor::new("u-francis", "Francis Obi");

    let cr = engine
        .record_it_approval("CR-2025-8842", approval(false, None), &head_of_it, Utc::now())
        .await
        .unwrap();
    assert_eq!(cr.status, CrStatus::Initiated);

    let cr = engine
        .record_feature_result(
            "CR-2025-8842",
            "f-aes",
            pass(),
            &Actor::new("u-ade", "Ade Bello"),
            Utc::now(),
        )
        .await
        .unwrap();
    assert_eq!(cr.status, CrStatus::TestingCompleted);
    assert_eq!(
        count_titled(&engine, "u-risk1", "Testing Completed: Ready for Risk Review"),
        2
    );
    assert_eq!(recorder.sent_to("ngozi@bank.test").len(), 2);

    let mut second = assessment(RiskDecision::Mitigate);
    second.comments = "Rollback plan attached".into();
    let cr = engine
        .record_risk_assessment(
            "CR-2025-8842",
            second,
            &Actor::new("u-risk2", "Tunde Risk"),
            Utc::now(),
        )
        .await
        .unwrap();
    assert_eq!(cr.status, CrStatus::RiskReviewed);
    let stored = cr.risk_assessment.as_ref().unwrap();
    assert_eq!(stored.decision, RiskDecision::Mitigate);
    assert_eq!(stored.comments, "Rollback plan attached");

    let cr = engine
        .record_it_approval(
            "CR-2025-8842",
            approval(true, Some("u-musa")),
            &head_of_it,
            Utc::now(),
        )
        .await
        .unwrap();
    assert_eq!(cr.status, CrStatus::ApprovedForDeployment);
}

#[tokio::test]
async fn approval_without_engineer_is_returned() {
    let mut engine = engine_with(Arc::new(RecordingDispatcher::new())).await;
    to_risk_reviewed(&mut engine).await;

    let cr = engine
        .record_it_approval(
            "CR-2025-8842",
            approval(true, None),
            &Actor::new("u-francis", "Francis Obi"),
            Utc::now(),
        )
        .await
        .unwrap();

    assert_eq!(cr.status, CrStatus::Initiated);
    assert_eq!(
        cr.latest_audit().unwrap().details,
        "Returned - No Deployment Engineer Assigned"
    );
}

#[tokio::test]
async fn approval_naming_unknown_engineer_is_refused() {
    let mut engine = engine_with(Arc::new(RecordingDispatcher::new())).await;
    to_risk_reviewed(&mut engine).await;

    let err = engine
        .record_it_approval(
            "CR-2025-8842",
            approval(true, Some("u-ghost")),
            &Actor::new("u-francis", "Francis Obi"),
            Utc::now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ChangeGateError::UserNotFound(id) if id == "u-ghost"));
    assert_eq!(
        engine.change_request("CR-2025-8842").unwrap().status,
        CrStatus::RiskReviewed
    );
}

// ── Deployment ─────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_deployment_alerts_creator() {
    let mut engine = engine_with(Arc::new(RecordingDispatcher::new())).await;
    to_risk_reviewed(&mut engine).await;
    engine
        .record_it_approval(
            "CR-2025-8842",
            approval(true, Some("u-musa")),
            &Actor::new("u-francis", "Francis Obi"),
            Utc::now(),
        )
        .await
        .unwrap();

    let now = Utc::now();
    let cr = engine
        .record_deployment(
            "CR-2025-8842",
            DeploymentReport::failed().with_logs("rollback at step 3"),
            &Actor::new("u-musa", "Musa Umaru"),
            now,
        )
        .await
        .unwrap();

    assert_eq!(cr.status, CrStatus::DeploymentFailed);
    assert_eq!(cr.deployed_by.as_deref(), Some("Musa Umaru"));
    assert_eq!(cr.deployed_at, Some(now));
    assert_eq!(cr.deployment_logs.as_deref(), Some("rollback at step 3"));
    assert_eq!(
        cr.latest_audit().unwrap().summary(),
        "Production Execution: Migration Failed - Incident Logged"
    );

    let alerts: Vec<_> = engine
        .notifications_for("u-simon")
        .into_iter()
        .filter(|n| n.kind == NotificationKind::Alert)
        .collect();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].title, "Production Failed");
}

#[tokio::test]
async fn deployment_requires_approval() {
    let mut engine = engine_with(Arc::new(RecordingDispatcher::new())).await;
    to_risk_reviewed(&mut engine).await;

    let err = engine
        .record_deployment(
            "CR-2025-8842",
            DeploymentReport::succeeded(),
            &Actor::new("u-musa", "Musa Umaru"),
            Utc::now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ChangeGateError::InvalidTransition {
            from: CrStatus::RiskReviewed,
            to: CrStatus::Deployed,
            ..
        }
    ));
}

#[tokio::test]
async fn full_happy_path_audit_trail() {
    let mut engine = engine_with(Arc::new(RecordingDispatcher::new())).await;
    to_risk_reviewed(&mut engine).await;
    engine
        .record_it_approval(
            "CR-2025-8842",
            approval(true, Some("u-musa")),
            &Actor::new("u-francis", "Francis Obi"),
            Utc::now(),
        )
        .await
        .unwrap();
    let cr = engine
        .record_deployment(
            "CR-2025-8842",
            DeploymentReport::succeeded(),
            &Actor::new("u-musa", "Musa Umaru"),
            Utc::now(),
        )
        .await
        .unwrap();

    assert_eq!(cr.status, CrStatus::Deployed);
    let actions: Vec<&str> = cr.audit_logs.iter().map(|a| a.action.as_str()).collect();
    assert_eq!(
        actions,
        vec![
            "Production Execution",
            "Executive Approval",
            "Risk Certified",
            "CR Initiation"
        ]
    );
    assert_eq!(
        count_titled(&engine, "u-simon", "Production Successful"),
        1
    );
}

// ── Delivery failures ──────────────────────────────────────────────────

#[tokio::test]
async fn email_failure_does_not_block_transition() {
    let failing = Arc::new(FailingDispatcher::new());
    let mut engine = engine_with(failing.clone()).await;
    to_risk_reviewed(&mut engine).await;

    assert_eq!(
        engine.change_request("CR-2025-8842").unwrap().status,
        CrStatus::RiskReviewed
    );
    // in-app notifications are still recorded
    assert_eq!(engine.notifications_for("u-francis").len(), 1);
    assert!(failing.attempts() > 0);
    assert_eq!(engine.last_dispatch().sent, 0);
    assert_eq!(engine.last_dispatch().failed, 1);
}
