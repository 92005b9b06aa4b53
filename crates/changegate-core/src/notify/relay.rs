//! Mail-relay dispatchers.
//!
//! The relay is a small HTTP service that accepts
//! `POST {"to", "subject", "body"}` and forwards it over SMTP, answering
//! `{"success": bool, "id"?: string, "error"?: string}`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{DispatchError, DispatchResult, NotificationDispatcher};

/// Relay endpoint path appended to the configured base URL.
pub const RELAY_DISPATCH_PATH: &str = "/api/v1/notifications/dispatch";

#[derive(Debug, Serialize)]
struct RelayRequest<'a> {
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct RelayResponse {
    success: bool,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Sends email through an HTTP mail relay.
pub struct HttpRelayDispatcher {
    endpoint: String,
    http_client: reqwest::Client,
}

impl HttpRelayDispatcher {
    /// Create a dispatcher for the relay at `base_url`.
    pub fn new(base_url: &str) -> DispatchResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("changegate/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            endpoint: relay_endpoint(base_url),
            http_client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn relay_endpoint(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with(RELAY_DISPATCH_PATH) {
        base.to_string()
    } else {
        format!("{base}{RELAY_DISPATCH_PATH}")
    }
}

#[async_trait]
impl NotificationDispatcher for HttpRelayDispatcher {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> DispatchResult<()> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&RelayRequest {
                to,
                subject,
                body: html_body,
            })
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(DispatchError::Rejected {
                status: status.as_u16(),
                body: text,
            });
        }

        match serde_json::from_str::<RelayResponse>(&text) {
            Ok(RelayResponse { success: true, id, .. }) => {
                debug!(to = %to, message_id = ?id, "relay accepted message");
                Ok(())
            }
            Ok(RelayResponse { error, .. }) => Err(DispatchError::Rejected {
                status: status.as_u16(),
                body: error.unwrap_or_else(|| "relay reported failure".to_string()),
            }),
            // A 2xx without a JSON body is treated as accepted.
            Err(_) => Ok(()),
        }
    }
}

/// Logs messages instead of sending them. Used when no relay is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> DispatchResult<()> {
        info!(
            event = "email.logged",
            to = %to,
            subject = %subject,
            bytes = html_body.len(),
            "no mail relay configured; email not sent"
        );
        Ok(())
    }
}
