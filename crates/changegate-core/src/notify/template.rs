//! Branded HTML email rendering.
//!
//! Pure functions over strings; no I/O.

use serde::{Deserialize, Serialize};

/// Branding and link settings for notification emails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub org_name: String,
    pub portal_url: String,
    pub footer: String,
}

impl Default for EmailTemplate {
    fn default() -> Self {
        Self {
            org_name: "Change Management".to_string(),
            portal_url: "http://localhost:3000/".to_string(),
            footer: "Internal Audit Evidence.".to_string(),
        }
    }
}

/// Fields interpolated into one email.
#[derive(Debug, Clone, Copy)]
pub struct EmailContext<'a> {
    pub recipient_name: &'a str,
    pub cr_id: &'a str,
    pub cr_title: &'a str,
    pub title: &'a str,
    pub message: &'a str,
}

impl EmailTemplate {
    /// `"{title} [{cr_id}]"`
    pub fn subject(&self, title: &str, cr_id: &str) -> String {
        format!("{title} [{cr_id}]")
    }

    pub fn render(&self, ctx: &EmailContext<'_>) -> String {
        let org = escape_html(&self.org_name);
        let portal = escape_html(&self.portal_url);
        let footer = escape_html(&self.footer);
        let title = escape_html(ctx.title);
        let recipient = escape_html(ctx.recipient_name);
        let cr_id = escape_html(ctx.cr_id);
        let cr_title = escape_html(ctx.cr_title);
        let message = escape_html(ctx.message);

        format!(
            r#"<div style="font-family: sans-serif; color: #333; max-width: 600px; border: 1px solid #eee; border-radius: 20px; overflow: hidden;">
  <div style="background: #7a1d00; padding: 30px; text-align: center; color: white;">
    <h1 style="margin: 0; font-size: 20px; letter-spacing: 2px;">{org}</h1>
    <p style="margin: 5px 0 0; font-size: 10px; opacity: 0.6; text-transform: uppercase;">Governance Alert Hub</p>
  </div>
  <div style="padding: 40px;">
    <h2 style="font-size: 18px; color: #000;">{title}</h2>
    <p style="line-height: 1.6; font-size: 14px;">Dear {recipient},</p>
    <p style="line-height: 1.6; font-size: 14px;">This is an automated notification from the {org} change management system regarding Change Request: <strong>{cr_id} - {cr_title}</strong>.</p>
    <div style="background: #fdf2f0; padding: 20px; border-radius: 12px; border-left: 4px solid #f53900; margin: 25px 0;">
      <p style="margin: 0; font-size: 13px; font-weight: bold;">{message}</p>
    </div>
    <p style="font-size: 14px; margin-top: 30px;"><a href="{portal}" style="display: inline-block; padding: 12px 24px; background-color: #f53900; color: white; text-decoration: none; border-radius: 6px; font-weight: bold;">Log in to Portal to Act</a></p>
  </div>
  <div style="background: #f9f9f9; padding: 20px; text-align: center; font-size: 10px; color: #bbb;">{footer}</div>
</div>"#
        )
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
