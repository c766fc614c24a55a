//! Alerting - email (SendGrid) and SMS (Twilio) notifications.
//!
//! One digest per run: every campaign the decision engine flagged becomes a
//! row in a single HTML email, with a short SMS companion when Twilio is
//! configured. A separate urgent alert fires when the run itself fails.

mod sendgrid;

pub use sendgrid::SendGridNotifier;

use async_trait::async_trait;
use chrono::Local;

use crate::ads::CampaignSnapshot;
use crate::optimizer::{BudgetDecision, DecisionReason};

/// Severity of a single flagged issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLevel {
    HighAcos,
    LowAcos,
}

impl IssueLevel {
    fn label(&self) -> &'static str {
        match self {
            IssueLevel::HighAcos => "HIGH ACOS",
            IssueLevel::LowAcos => "LOW ACOS",
        }
    }

    fn color(&self) -> &'static str {
        match self {
            IssueLevel::HighAcos => "red",
            IssueLevel::LowAcos => "orange",
        }
    }
}

/// One flagged campaign in the digest.
#[derive(Debug, Clone)]
pub struct Issue {
    pub level: IssueLevel,
    pub detail: String,
}

/// A fully rendered notification, ready for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertMessage {
    pub subject: String,
    pub html_body: String,
    pub sms_text: String,
}

/// Delivery seam. The pipeline builds messages; implementations ship them.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &AlertMessage) -> anyhow::Result<()>;
}

/// Collect flagged decisions into issues for the digest.
pub fn collect_issues(pairs: &[(&CampaignSnapshot, &BudgetDecision)]) -> Vec<Issue> {
    pairs
        .iter()
        .filter(|(_, decision)| decision.alert_triggered)
        .map(|(snapshot, decision)| {
            let acos_str = snapshot
                .acos
                .map(|a| format!("{:.1}%", a * 100.0))
                .unwrap_or_else(|| "N/A".to_string());
            let level = match decision.reason {
                DecisionReason::AcosAboveRange => IssueLevel::HighAcos,
                _ => IssueLevel::LowAcos,
            };
            let detail = match level {
                IssueLevel::HighAcos => format!(
                    "{}: ACOS is {acos_str} - above range; budget {:.2} -> {:.2}",
                    snapshot.campaign_name, decision.old_budget, decision.new_budget
                ),
                IssueLevel::LowAcos => format!(
                    "{}: ACOS is {acos_str} - far below range (ads may not be spending)",
                    snapshot.campaign_name
                ),
            };
            Issue { level, detail }
        })
        .collect()
}

/// Render the per-run digest. Returns `None` when nothing was flagged.
pub fn build_digest(issues: &[Issue]) -> Option<AlertMessage> {
    if issues.is_empty() {
        return None;
    }

    let now = Local::now();
    let subject = format!(
        "Amazon Ads Alert - {} issue(s) - {}",
        issues.len(),
        now.format("%b %d")
    );

    let rows: String = issues
        .iter()
        .map(|i| {
            format!(
                "<tr><td style='padding:8px;color:{}'><b>{}</b></td>\
                 <td style='padding:8px'>{}</td></tr>",
                i.level.color(),
                i.level.label(),
                i.detail
            )
        })
        .collect();

    let html_body = format!(
        "<html><body style='font-family:Arial,sans-serif'>\
         <h2>Amazon Ads Daily Report - {}</h2>\
         <p>{} issue(s) detected today:</p>\
         <table border='1' cellpadding='0' cellspacing='0' \
          style='border-collapse:collapse;width:100%'>\
         <thead><tr style='background:#1F3864;color:white'>\
         <th style='padding:8px'>Level</th><th style='padding:8px'>Detail</th>\
         </tr></thead><tbody>{rows}</tbody></table>\
         </body></html>",
        now.format("%B %d, %Y"),
        issues.len()
    );

    let sms_text = format!(
        "Amazon Ads: {} ACOS alert(s). Check email for details.",
        issues.len()
    );

    Some(AlertMessage {
        subject,
        html_body,
        sms_text,
    })
}

/// Urgent notification for a failed run.
pub fn build_error_alert(error: &str) -> AlertMessage {
    let now = Local::now();
    AlertMessage {
        subject: format!("Amazon Ads Automation ERROR - {}", now.format("%b %d %H:%M")),
        html_body: format!(
            "<h2 style='color:red'>Automation Error</h2>\
             <p>The budget automation encountered an error and did not complete.</p>\
             <pre style='background:#f5f5f5;padding:12px'>{error}</pre>"
        ),
        sms_text: "Amazon Ads automation FAILED. Check email.".to_string(),
    }
}
