//! changegate - change request governance from the command line
//!
//! ## Commands
//!
//! - `cr`: create, edit, list and inspect change requests
//! - `feature`, `risk`, `approval`, `deploy`: record each pipeline stage
//! - `user`, `login`, `register`, `logout`, `whoami`: directory and session
//! - `inbox`, `queue`, `report`: what needs attention

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, Level};

use changegate_core::{
    deployment_queue, it_approval_queue, risk_queue, tester_queue, Actor, BlobStore,
    ChangeRequest, ChangeRequestDraft, CrFilter, CrStatus, DeploymentReport, FeaturePatch,
    FsBlobStore, GateConfig, HttpRelayDispatcher, ItApproval, LifecycleEngine, LogDispatcher,
    NotificationDispatcher, PortfolioReport, RiskAssessment, RiskDecision, SurrealBlobStore,
    TestResult, User, UserRole, UserStatus,
};

#[derive(Parser)]
#[command(name = "changegate")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Change request lifecycle and approval tracking", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Snapshot directory (overrides CHANGEGATE_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Change request records
    Cr {
        #[command(subcommand)]
        action: CrAction,
    },

    /// Record a tester's result for one feature
    Feature {
        #[command(subcommand)]
        action: FeatureAction,
    },

    /// Risk Team assessment
    Risk {
        #[command(subcommand)]
        action: RiskAction,
    },

    /// Head of IT approval
    Approval {
        #[command(subcommand)]
        action: ApprovalAction,
    },

    /// Record the outcome of a production deployment
    Deploy {
        /// Change request id
        cr_id: String,

        /// Mark the deployment as failed
        #[arg(long)]
        failed: bool,

        /// Deployment log text
        #[arg(long)]
        logs: Option<String>,
    },

    /// User directory
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Notifications for the current user
    Inbox {
        #[command(subcommand)]
        action: InboxAction,
    },

    /// Log in as an existing user
    Login {
        user_id: String,
    },

    /// Create a user and log in as them
    Register {
        #[command(flatten)]
        user: UserArgs,
    },

    /// End the current session
    Logout,

    /// Show the current user
    Whoami,

    /// Work waiting on the current user, by role
    Queue,

    /// Portfolio summary
    Report {
        /// Print the report as JSON instead of markdown
        #[arg(long)]
        as_json: bool,
    },
}

#[derive(Subcommand)]
enum CrAction {
    /// List change requests, newest first
    List {
        #[arg(long)]
        status: Option<CrStatus>,

        /// Only requests created by this user id
        #[arg(long)]
        creator: Option<String>,

        /// Case-insensitive match on id, title or vendor
        #[arg(long)]
        search: Option<String>,
    },

    /// Print one change request as JSON
    Show { cr_id: String },

    /// Create a change request from a JSON draft
    Create {
        /// Path to the draft file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Replace the editable fields of a change request
    Update {
        cr_id: String,

        /// Path to the draft file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Delete a change request
    Delete { cr_id: String },
}

#[derive(Subcommand)]
enum FeatureAction {
    /// Certify a feature's test outcome
    Record {
        cr_id: String,
        feature_id: String,

        #[arg(long, value_enum)]
        result: ResultArg,

        #[arg(long, default_value = "")]
        observations: String,

        /// Evidence URL or data URI
        #[arg(long)]
        screenshot: Option<String>,
    },
}

#[derive(Subcommand)]
enum RiskAction {
    /// Record the Risk Team's determination
    Assess {
        cr_id: String,

        #[arg(long, value_enum)]
        decision: DecisionArg,

        #[arg(long, default_value = "")]
        operational: String,

        #[arg(long, default_value = "")]
        compliance: String,

        #[arg(long, default_value = "")]
        reputational: String,

        #[arg(long, default_value = "")]
        comments: String,
    },
}

#[derive(Subcommand)]
enum ApprovalAction {
    /// Approve or reject a risk-reviewed change request
    Record {
        cr_id: String,

        /// Reject instead of approving
        #[arg(long)]
        reject: bool,

        /// Deployment engineer user id
        #[arg(long)]
        engineer: Option<String>,

        #[arg(long, default_value = "")]
        comments: String,

        /// Planned deployment time, e.g. 2025-06-01T22:00:00
        #[arg(long)]
        planned: Option<NaiveDateTime>,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// List users
    List,

    /// Add a user
    Add {
        #[command(flatten)]
        user: UserArgs,
    },

    /// Change fields of an existing user
    Update {
        user_id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        unit: Option<String>,

        /// Replace the role set (repeatable)
        #[arg(long = "role")]
        roles: Vec<UserRole>,

        #[arg(long, conflicts_with = "enable")]
        disable: bool,

        #[arg(long)]
        enable: bool,
    },

    /// Remove a user
    Delete { user_id: String },
}

#[derive(Subcommand)]
enum InboxAction {
    /// List notifications
    List {
        /// Only unread notifications
        #[arg(long)]
        unread: bool,
    },

    /// Mark a notification as read
    Read { notification_id: String },
}

#[derive(clap::Args)]
struct UserArgs {
    #[arg(long)]
    id: String,

    #[arg(long)]
    name: String,

    #[arg(long)]
    email: String,

    /// Role held by the user (repeatable)
    #[arg(long = "role", required = true)]
    roles: Vec<UserRole>,

    #[arg(long)]
    unit: Option<String>,

    #[arg(long, default_value = "")]
    phone: String,
}

impl UserArgs {
    fn into_user(self) -> User {
        let mut user = User::new(self.id, self.name, self.email, self.roles);
        user.unit = self.unit;
        user.phone = self.phone;
        user
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ResultArg {
    Pass,
    Fail,
    Conditional,
}

impl From<ResultArg> for TestResult {
    fn from(arg: ResultArg) -> Self {
        match arg {
            ResultArg::Pass => TestResult::Pass,
            ResultArg::Fail => TestResult::Fail,
            ResultArg::Conditional => TestResult::Conditional,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum DecisionArg {
    Accept,
    Mitigate,
    Reject,
}

impl From<DecisionArg> for RiskDecision {
    fn from(arg: DecisionArg) -> Self {
        match arg {
            DecisionArg::Accept => RiskDecision::Accept,
            DecisionArg::Mitigate => RiskDecision::Mitigate,
            DecisionArg::Reject => RiskDecision::Reject,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    changegate_core::telemetry::init_tracing(cli.json, level);

    let mut config = GateConfig::from_env();
    if let Some(dir) = cli.data_dir {
        config = config.with_data_dir(dir);
    }
    let mut engine = open_engine(&config).await?;

    match cli.command {
        Commands::Cr { action } => match action {
            CrAction::List {
                status,
                creator,
                search,
            } => cmd_cr_list(&engine, status, creator, search),
            CrAction::Show { cr_id } => cmd_cr_show(&engine, &cr_id),
            CrAction::Create { file } => cmd_cr_create(&mut engine, &file).await,
            CrAction::Update { cr_id, file } => cmd_cr_update(&mut engine, &cr_id, &file).await,
            CrAction::Delete { cr_id } => cmd_cr_delete(&mut engine, &cr_id).await,
        },
        Commands::Feature { action } => match action {
            FeatureAction::Record {
                cr_id,
                feature_id,
                result,
                observations,
                screenshot,
            } => {
                cmd_feature_record(
                    &mut engine,
                    &cr_id,
                    &feature_id,
                    result.into(),
                    observations,
                    screenshot,
                )
                .await
            }
        },
        Commands::Risk { action } => match action {
            RiskAction::Assess {
                cr_id,
                decision,
                operational,
                compliance,
                reputational,
                comments,
            } => {
                let actor = require_actor(&engine)?;
                let assessment = RiskAssessment {
                    decision: decision.into(),
                    operational_risk: operational,
                    compliance_risk: compliance,
                    reputational_risk: reputational,
                    comments,
                    assessed_by: actor.name.clone(),
                    timestamp: Utc::now(),
                };
                cmd_risk_assess(&mut engine, &cr_id, assessment, &actor).await
            }
        },
        Commands::Approval { action } => match action {
            ApprovalAction::Record {
                cr_id,
                reject,
                engineer,
                comments,
                planned,
            } => {
                let actor = require_actor(&engine)?;
                let approval = ItApproval {
                    approved: !reject,
                    comments,
                    approved_by: actor.name.clone(),
                    deployment_engineer_id: engineer,
                    planned_deployment_date: planned,
                    timestamp: Utc::now(),
                };
                cmd_approval_record(&mut engine, &cr_id, approval, &actor).await
            }
        },
        Commands::Deploy {
            cr_id,
            failed,
            logs,
        } => {
            let mut report = if failed {
                DeploymentReport::failed()
            } else {
                DeploymentReport::succeeded()
            };
            if let Some(logs) = logs {
                report = report.with_logs(logs);
            }
            cmd_deploy(&mut engine, &cr_id, report).await
        }
        Commands::User { action } => match action {
            UserAction::List => cmd_user_list(&engine),
            UserAction::Add { user } => cmd_user_add(&mut engine, user.into_user()).await,
            UserAction::Update {
                user_id,
                name,
                email,
                phone,
                unit,
                roles,
                disable,
                enable,
            } => {
                let mut user = engine
                    .user(&user_id)
                    .cloned()
                    .with_context(|| format!("user not found: {user_id}"))?;
                if let Some(name) = name {
                    user.name = name;
                }
                if let Some(email) = email {
                    user.email = email;
                }
                if let Some(phone) = phone {
                    user.phone = phone;
                }
                if unit.is_some() {
                    user.unit = unit;
                }
                if !roles.is_empty() {
                    user.roles = roles;
                }
                if disable {
                    user.status = UserStatus::Disabled;
                } else if enable {
                    user.status = UserStatus::Active;
                }
                engine.update_user(user).await?;
                println!("Updated {user_id}");
                Ok(())
            }
            UserAction::Delete { user_id } => {
                let removed = engine.delete_user(&user_id).await?;
                println!("Deleted {} ({})", removed.id, removed.name);
                Ok(())
            }
        },
        Commands::Inbox { action } => match action {
            InboxAction::List { unread } => cmd_inbox_list(&engine, unread),
            InboxAction::Read { notification_id } => {
                engine.mark_notification_read(&notification_id).await?;
                println!("Marked {notification_id} as read");
                Ok(())
            }
        },
        Commands::Login { user_id } => {
            let user = engine.login(&user_id).await?;
            println!("Logged in as {} ({})", user.name, format_roles(&user.roles));
            Ok(())
        }
        Commands::Register { user } => {
            let user = engine.register(user.into_user()).await?;
            println!("Registered and logged in as {}", user.name);
            Ok(())
        }
        Commands::Logout => {
            engine.logout().await?;
            println!("Logged out");
            Ok(())
        }
        Commands::Whoami => cmd_whoami(&engine),
        Commands::Queue => cmd_queue(&engine),
        Commands::Report { as_json } => cmd_report(&engine, as_json),
    }
}

/// Build the engine from configuration: SurrealDB when `SURREALDB_URL` is
/// set, otherwise one JSON file per collection under the data directory.
async fn open_engine(config: &GateConfig) -> Result<LifecycleEngine> {
    let store: Arc<dyn BlobStore> = match SurrealBlobStore::from_env().await {
        Some(store) => Arc::new(store.context("Failed to connect to SurrealDB")?),
        None => Arc::new(
            FsBlobStore::new(&config.data_dir)
                .with_context(|| format!("open data dir {:?}", config.data_dir))?,
        ),
    };

    let dispatcher: Arc<dyn NotificationDispatcher> = match &config.mail_relay_url {
        Some(url) => Arc::new(
            HttpRelayDispatcher::new(url).context("Failed to build mail relay client")?,
        ),
        None => Arc::new(LogDispatcher),
    };

    LifecycleEngine::load(store, dispatcher, config.email_template())
        .await
        .context("Failed to load changegate state")
}

fn require_actor(engine: &LifecycleEngine) -> Result<Actor> {
    match engine.current_user() {
        Some(user) => Ok(user.actor()),
        None => bail!("not logged in; run `changegate login <user-id>` first"),
    }
}

fn read_draft(path: &Path) -> Result<ChangeRequestDraft> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("read draft {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("parse draft {:?}", path))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn format_roles(roles: &[UserRole]) -> String {
    roles
        .iter()
        .map(|r| r.label())
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_cr_line(cr: &ChangeRequest) {
    let tested = cr.features.iter().filter(|f| f.is_tested()).count();
    println!(
        "{:<18} {:<24} {:>2}/{:<2} {} ({})",
        cr.id,
        cr.status.label(),
        tested,
        cr.features.len(),
        cr.title,
        cr.vendor_name
    );
}

fn print_outcome(engine: &LifecycleEngine, cr: &ChangeRequest) {
    println!("{} -> {}", cr.id, cr.status.label());
    if let Some(entry) = cr.latest_audit() {
        println!("  {}", entry.summary());
    }
    let report = engine.last_dispatch();
    if report.sent + report.failed > 0 {
        println!("  emails: {} sent, {} failed", report.sent, report.failed);
    }
}

fn cmd_cr_list(
    engine: &LifecycleEngine,
    status: Option<CrStatus>,
    creator: Option<String>,
    search: Option<String>,
) -> Result<()> {
    let filter = CrFilter {
        status,
        creator_id: creator,
        text: search,
    };
    let hits = filter.apply(engine.change_requests());
    if hits.is_empty() {
        println!("No change requests found.");
    }
    for cr in hits {
        print_cr_line(cr);
    }
    Ok(())
}

fn cmd_cr_show(engine: &LifecycleEngine, cr_id: &str) -> Result<()> {
    let cr = engine
        .change_request(cr_id)
        .with_context(|| format!("change request not found: {cr_id}"))?;
    print_json(cr)
}

async fn cmd_cr_create(engine: &mut LifecycleEngine, file: &Path) -> Result<()> {
    let actor = require_actor(engine)?;
    let draft = read_draft(file)?;
    let cr = engine.create(draft, &actor, Utc::now()).await?;
    info!(cr_id = %cr.id, "change request created");
    print_outcome(engine, &cr);
    Ok(())
}

async fn cmd_cr_update(engine: &mut LifecycleEngine, cr_id: &str, file: &Path) -> Result<()> {
    let actor = require_actor(engine)?;
    let draft = read_draft(file)?;
    let cr = engine.update(cr_id, draft, &actor, Utc::now()).await?;
    print_outcome(engine, &cr);
    Ok(())
}

async fn cmd_cr_delete(engine: &mut LifecycleEngine, cr_id: &str) -> Result<()> {
    require_actor(engine)?;
    let removed = engine.delete(cr_id).await?;
    println!("Deleted {} ({})", removed.id, removed.title);
    Ok(())
}

async fn cmd_feature_record(
    engine: &mut LifecycleEngine,
    cr_id: &str,
    feature_id: &str,
    result: TestResult,
    observations: String,
    screenshot: Option<String>,
) -> Result<()> {
    let actor = require_actor(engine)?;
    let now = Utc::now();
    let mut patch = FeaturePatch::certified(result, observations, now);
    patch.test_screenshot = screenshot;
    let cr = engine
        .record_feature_result(cr_id, feature_id, patch, &actor, now)
        .await?;
    print_outcome(engine, &cr);
    Ok(())
}

async fn cmd_risk_assess(
    engine: &mut LifecycleEngine,
    cr_id: &str,
    assessment: RiskAssessment,
    actor: &Actor,
) -> Result<()> {
    let cr = engine
        .record_risk_assessment(cr_id, assessment, actor, Utc::now())
        .await?;
    print_outcome(engine, &cr);
    Ok(())
}

async fn cmd_approval_record(
    engine: &mut LifecycleEngine,
    cr_id: &str,
    approval: ItApproval,
    actor: &Actor,
) -> Result<()> {
    let cr = engine
        .record_it_approval(cr_id, approval, actor, Utc::now())
        .await?;
    print_outcome(engine, &cr);
    Ok(())
}

async fn cmd_deploy(
    engine: &mut LifecycleEngine,
    cr_id: &str,
    report: DeploymentReport,
) -> Result<()> {
    let actor = require_actor(engine)?;
    let cr = engine
        .record_deployment(cr_id, report, &actor, Utc::now())
        .await?;
    print_outcome(engine, &cr);
    Ok(())
}

fn cmd_user_list(engine: &LifecycleEngine) -> Result<()> {
    for user in engine.users() {
        let status = if user.is_active() { "" } else { " [disabled]" };
        println!(
            "{:<14} {:<24} {:<28} {}{}",
            user.id,
            user.name,
            user.email,
            format_roles(&user.roles),
            status
        );
    }
    Ok(())
}

async fn cmd_user_add(engine: &mut LifecycleEngine, user: User) -> Result<()> {
    let id = user.id.clone();
    engine.add_user(user).await?;
    println!("Added {id}");
    Ok(())
}

fn cmd_inbox_list(engine: &LifecycleEngine, unread_only: bool) -> Result<()> {
    let actor = require_actor(engine)?;
    let notifications = engine.notifications_for(&actor.id);
    println!(
        "{} notification(s), {} unread",
        notifications.len(),
        engine.unread_count(&actor.id)
    );
    for n in notifications.into_iter().filter(|n| !unread_only || !n.read) {
        let marker = if n.read { " " } else { "*" };
        println!(
            "{} {} [{}] {} - {}",
            marker,
            n.id,
            n.kind,
            n.title,
            n.timestamp.format("%Y-%m-%d %H:%M")
        );
        println!("    {}", n.message);
    }
    Ok(())
}

fn cmd_whoami(engine: &LifecycleEngine) -> Result<()> {
    match engine.current_user() {
        Some(user) => println!("{} ({}) - {}", user.name, user.id, format_roles(&user.roles)),
        None => println!("Not logged in"),
    }
    Ok(())
}

fn cmd_queue(engine: &LifecycleEngine) -> Result<()> {
    let user = engine
        .current_user()
        .context("not logged in; run `changegate login <user-id>` first")?;
    let crs = engine.change_requests();
    let mut shown = false;

    if user.has_role(UserRole::Tester) {
        let pending = tester_queue(crs, &user.id);
        if !pending.is_empty() {
            shown = true;
            println!("Features to test:");
            for p in pending {
                println!(
                    "  {} / {}  {} ({:?} risk)",
                    p.change_request.id, p.feature.id, p.feature.name, p.feature.risk_level
                );
            }
        }
    }
    if user.has_role(UserRole::RiskTeam) {
        let waiting = risk_queue(crs);
        if !waiting.is_empty() {
            shown = true;
            println!("Awaiting risk review:");
            waiting.into_iter().for_each(print_cr_line);
        }
    }
    if user.has_role(UserRole::HeadOfIt) {
        let waiting = it_approval_queue(crs);
        if !waiting.is_empty() {
            shown = true;
            println!("Awaiting IT approval:");
            waiting.into_iter().for_each(print_cr_line);
        }
    }
    if user.has_role(UserRole::DeploymentEngineer) {
        let waiting = deployment_queue(crs, &user.id);
        if !waiting.is_empty() {
            shown = true;
            println!("Ready to deploy:");
            waiting.into_iter().for_each(print_cr_line);
        }
    }
    if !shown {
        println!("Nothing waiting on {}.", user.name);
    }
    Ok(())
}

fn cmd_report(engine: &LifecycleEngine, as_json: bool) -> Result<()> {
    let report = PortfolioReport::build(engine.change_requests());
    if as_json {
        print_json(&report)
    } else {
        print!("{}", report.render_markdown());
        Ok(())
    }
}
