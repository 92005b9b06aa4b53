//! Runtime configuration.
//!
//! Everything has a usable default so a bare checkout runs locally with
//! snapshots under `.changegate/` and emails logged instead of sent.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::notify::EmailTemplate;

pub const ENV_DATA_DIR: &str = "CHANGEGATE_DATA_DIR";
pub const ENV_MAIL_RELAY_URL: &str = "CHANGEGATE_MAIL_RELAY_URL";
pub const ENV_PORTAL_URL: &str = "CHANGEGATE_PORTAL_URL";
pub const ENV_ORG_NAME: &str = "CHANGEGATE_ORG_NAME";
pub const ENV_SENDER_NAME: &str = "CHANGEGATE_SENDER_NAME";

/// changegate configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Directory holding the filesystem snapshot store
    pub data_dir: PathBuf,
    /// Base URL of the HTTP mail relay; `None` logs emails instead
    pub mail_relay_url: Option<String>,
    /// Link placed in every notification email
    pub portal_url: String,
    /// Organisation name shown in email headers
    pub org_name: String,
    /// Signature line shown in email footers
    pub sender_name: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        let template = EmailTemplate::default();
        GateConfig {
            data_dir: PathBuf::from(".changegate"),
            mail_relay_url: None,
            portal_url: template.portal_url,
            org_name: template.org_name,
            sender_name: "Change Management Office".to_string(),
        }
    }
}

impl GateConfig {
    /// Create a config from `CHANGEGATE_*` environment variables, falling
    /// back to defaults for anything unset or blank.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`GateConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        GateConfig {
            data_dir: get(ENV_DATA_DIR)
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            mail_relay_url: get(ENV_MAIL_RELAY_URL),
            portal_url: get(ENV_PORTAL_URL).unwrap_or(defaults.portal_url),
            org_name: get(ENV_ORG_NAME).unwrap_or(defaults.org_name),
            sender_name: get(ENV_SENDER_NAME).unwrap_or(defaults.sender_name),
        }
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Email branding derived from this config.
    pub fn email_template(&self) -> EmailTemplate {
        EmailTemplate {
            org_name: self.org_name.clone(),
            portal_url: self.portal_url.clone(),
            footer: format!("{}. Internal Audit Evidence.", self.sender_name),
        }
    }
}
