//! SendGrid email delivery with optional Twilio SMS fan-out.

use async_trait::async_trait;
use anyhow::Context;
use serde_json::json;
use tracing::{debug, info};

use crate::config::AlertConfig;

use super::{AlertMessage, Notifier};

const SENDGRID_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";

/// Ships alert messages via SendGrid, and via Twilio when configured.
pub struct SendGridNotifier {
    http: reqwest::Client,
    config: AlertConfig,
}

impl SendGridNotifier {
    pub fn new(config: AlertConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    async fn send_email(&self, message: &AlertMessage) -> anyhow::Result<()> {
        let payload = json!({
            "personalizations": [{ "to": [{ "email": self.config.email_to }] }],
            "from": { "email": self.config.email_from },
            "subject": message.subject,
            "content": [{ "type": "text/html", "value": message.html_body }],
        });

        self.http
            .post(SENDGRID_SEND_URL)
            .bearer_auth(&self.config.sendgrid_api_key)
            .json(&payload)
            .send()
            .await
            .context("sendgrid request failed")?
            .error_for_status()
            .context("sendgrid rejected the message")?;

        info!(subject = %message.subject, "alert email sent");
        Ok(())
    }

    async fn send_sms(&self, message: &AlertMessage) -> anyhow::Result<()> {
        let Some(twilio) = &self.config.twilio else {
            debug!("twilio not configured, skipping SMS");
            return Ok(());
        };

        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            twilio.account_sid
        );
        self.http
            .post(url)
            .basic_auth(&twilio.account_sid, Some(&twilio.auth_token))
            .form(&[
                ("Body", message.sms_text.as_str()),
                ("From", twilio.from_number.as_str()),
                ("To", twilio.to_number.as_str()),
            ])
            .send()
            .await
            .context("twilio request failed")?
            .error_for_status()
            .context("twilio rejected the message")?;

        info!("alert SMS sent");
        Ok(())
    }
}

#[async_trait]
impl Notifier for SendGridNotifier {
    async fn send(&self, message: &AlertMessage) -> anyhow::Result<()> {
        self.send_email(message).await?;
        self.send_sms(message).await?;
        Ok(())
    }
}
