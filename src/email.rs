use serde_json::json;
use tracing::info;

use crate::config::Config;
use crate::error::{AppError, AppResult};

const RESEND_URL: &str = "https://api.resend.com/emails";

/// Outbound mail through the Resend HTTP API. Whether a failed send is fatal
/// is the caller's call: registration shrugs it off, production OTP delivery
/// does not.
#[derive(Clone)]
pub struct Mailer {
    client: reqwest::Client,
    api_key: Option<String>,
    from: String,
    frontend_url: String,
}

impl Mailer {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.resend_api_key.clone(),
            from: config.resend_from.clone(),
            frontend_url: config.frontend_url.clone(),
        }
    }

    pub async fn send_otp(&self, to: &str, otp: &str) -> AppResult<()> {
        let html = format!(
            r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h1 style="color: #1BEA7B;">Citadel</h1>
  <h2>Your Login Code</h2>
  <p>Use this code to log in to your Citadel account:</p>
  <div style="font-size: 36px; font-weight: bold; color: #1BEA7B; letter-spacing: 8px;">{otp}</div>
  <p style="color: #666;">This code will expire in 10 minutes. If you didn't request this code, you can safely ignore this email.</p>
</div>"#
        );
        self.send(to, "Your Citadel Login Code", &html).await
    }

    pub async fn send_verification(&self, to: &str, token: &str) -> AppResult<()> {
        let url = format!("{}/verify-email?token={token}", self.frontend_url);
        let html = format!(
            r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h1 style="color: #1BEA7B;">Citadel</h1>
  <h2>Verify Your Email Address</h2>
  <p>Thanks for signing up for Citadel! Please verify your email address:</p>
  <p><a href="{url}" style="background: #1BEA7B; color: white; padding: 14px 28px; text-decoration: none; border-radius: 8px;">Verify Email</a></p>
  <p style="color: #666;">Or copy this link into your browser: {url}</p>
  <p style="color: #666;">This link will expire in 24 hours. If you didn't create an account, you can safely ignore this email.</p>
</div>"#
        );
        self.send(to, "Verify your Citadel account", &html).await
    }

    async fn send(&self, to: &str, subject: &str, html: &str) -> AppResult<()> {
        let Some(key) = &self.api_key else {
            return Err(AppError::Internal(anyhow::anyhow!(
                "RESEND_API_KEY is not configured"
            )));
        };

        let response = self
            .client
            .post(RESEND_URL)
            .bearer_auth(key)
            .json(&json!({
                "from": self.from,
                "to": to,
                "subject": subject,
                "html": html,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(anyhow::anyhow!(
                "mail delivery failed: {status} {body}"
            )));
        }

        info!(to, subject, "email sent");
        Ok(())
    }
}
