//! Users, roles, and the acting identity passed to lifecycle operations.

use serde::{Deserialize, Serialize};

use super::error::{ChangeGateError, Result};

/// Capability tag. A user may hold several; there is no hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    DbTeam,
    Tester,
    RiskTeam,
    HeadOfIt,
    DeploymentEngineer,
    Admin,
}

impl UserRole {
    pub const ALL: [UserRole; 6] = [
        UserRole::DbTeam,
        UserRole::Tester,
        UserRole::RiskTeam,
        UserRole::HeadOfIt,
        UserRole::DeploymentEngineer,
        UserRole::Admin,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::DbTeam => "DB Team",
            Self::Tester => "Unit Tester",
            Self::RiskTeam => "Risk Team",
            Self::HeadOfIt => "Head of IT",
            Self::DeploymentEngineer => "Deployment Engineer",
            Self::Admin => "System Admin",
        }
    }

    fn wire_name(self) -> &'static str {
        match self {
            Self::DbTeam => "db_team",
            Self::Tester => "tester",
            Self::RiskTeam => "risk_team",
            Self::HeadOfIt => "head_of_it",
            Self::DeploymentEngineer => "deployment_engineer",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for UserRole {
    type Err = ChangeGateError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase().replace(['_', '-'], " ");
        UserRole::ALL
            .into_iter()
            .find(|r| {
                r.label().to_ascii_lowercase() == wanted
                    || r.wire_name().replace('_', " ") == wanted
            })
            .ok_or_else(|| ChangeGateError::InvalidInput(format!("unknown role: {s}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    #[default]
    Active,
    Disabled,
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub roles: Vec<UserRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub email: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub status: UserStatus,
    /// Base64-encoded signature image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl User {
    /// Create an active user with no optional fields set.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        roles: Vec<UserRole>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            roles,
            unit: None,
            email: email.into(),
            phone: String::new(),
            password: None,
            status: UserStatus::Active,
            signature: None,
        }
    }

    pub fn has_role(&self, role: UserRole) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// The identity recorded in audit entries for this user.
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

/// Who performed a lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Users seeded into an empty or unreadable user store.
pub fn default_users() -> Vec<User> {
    let mut admin = User::new(
        "u-admin",
        "System Admin",
        "admin@changegate.local",
        vec![UserRole::Admin],
    );
    admin.unit = Some("ICT".to_string());
    vec![admin]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_from_label_and_wire_name() {
        assert_eq!("Head of IT".parse::<UserRole>().unwrap(), UserRole::HeadOfIt);
        assert_eq!("risk_team".parse::<UserRole>().unwrap(), UserRole::RiskTeam);
        assert_eq!(
            "deployment-engineer".parse::<UserRole>().unwrap(),
            UserRole::DeploymentEngineer
        );
        assert!("janitor".parse::<UserRole>().is_err());
    }

    #[test]
    fn multi_role_membership() {
        let u = User::new(
            "u-1",
            "Ada",
            "ada@example.com",
            vec![UserRole::Tester, UserRole::RiskTeam],
        );
        assert!(u.has_role(UserRole::Tester));
        assert!(u.has_role(UserRole::RiskTeam));
        assert!(!u.has_role(UserRole::HeadOfIt));
    }

    #[test]
    fn missing_status_defaults_to_active() {
        let json = r#"{"id":"u-2","name":"Bo","roles":["tester"],"email":"bo@x","phone":""}"#;
        let u: User = serde_json::from_str(json).unwrap();
        assert!(u.is_active());
    }

    #[test]
    fn seed_contains_one_admin() {
        let users = default_users();
        assert_eq!(users.len(), 1);
        assert!(users[0].has_role(UserRole::Admin));
    }
}
