//! Google Sheets sink - the human-readable dashboard.
//!
//! Two tabs: every campaign lands in the daily-performance tab, changed
//! budgets additionally land in the budget-changes tab. Headers are written
//! into empty tabs on first append.

use async_trait::async_trait;
use anyhow::Context;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::ReportingConfig;

use super::{google_access_token, RunRecord, RunSink};

const DAILY_HEADERS: [&str; 10] = [
    "Date",
    "Campaign",
    "Status",
    "Daily Budget ($)",
    "Spend ($)",
    "Sales ($)",
    "Units",
    "ACOS",
    "Clicks",
    "Impressions",
];

const BUDGET_HEADERS: [&str; 6] = [
    "Date",
    "Campaign",
    "Old Budget ($)",
    "New Budget ($)",
    "Change ($)",
    "Reason",
];

pub struct SheetsSink {
    http: reqwest::Client,
    config: ReportingConfig,
}

impl SheetsSink {
    pub fn new(config: ReportingConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn values_url(&self, suffix: &str) -> String {
        format!(
            "https://sheets.googleapis.com/v4/spreadsheets/{}/values/{suffix}",
            self.config.sheet_id
        )
    }

    async fn tab_is_empty(&self, token: &str, tab: &str) -> anyhow::Result<bool> {
        let response: Value = self
            .http
            .get(self.values_url(&format!("{tab}!A1:A1")))
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.get("values").is_none())
    }

    async fn append_rows(&self, token: &str, tab: &str, rows: Vec<Vec<Value>>) -> anyhow::Result<()> {
        self.http
            .post(format!(
                "{}:append?valueInputOption=USER_ENTERED",
                self.values_url(&format!("{tab}!A:Z"))
            ))
            .bearer_auth(token)
            .json(&json!({ "values": rows }))
            .send()
            .await?
            .error_for_status()
            .with_context(|| format!("append to sheet tab {tab:?} failed"))?;
        Ok(())
    }

    async fn ensure_headers(
        &self,
        token: &str,
        tab: &str,
        headers: &[&str],
    ) -> anyhow::Result<()> {
        if !self.tab_is_empty(token, tab).await? {
            return Ok(());
        }
        debug!(tab, "writing header row into empty tab");
        self.http
            .put(format!(
                "{}?valueInputOption=USER_ENTERED",
                self.values_url(&format!("{tab}!A1"))
            ))
            .bearer_auth(token)
            .json(&json!({ "values": [headers] }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    fn daily_row(record: &RunRecord) -> Vec<Value> {
        vec![
            json!(record.timestamp.format("%Y-%m-%d").to_string()),
            json!(record.campaign_name),
            json!(format!("{:?}", record.status).to_uppercase()),
            json!(record.old_budget),
            json!(record.spend),
            json!(record.sales),
            json!(record.units),
            json!(record.acos_display()),
            json!(record.clicks),
            json!(record.impressions),
        ]
    }

    fn budget_row(record: &RunRecord) -> Vec<Value> {
        vec![
            json!(record.timestamp.format("%Y-%m-%d").to_string()),
            json!(record.campaign_name),
            json!(record.old_budget),
            json!(record.new_budget),
            json!(record.delta),
            json!(record.reason),
        ]
    }
}

#[async_trait]
impl RunSink for SheetsSink {
    fn name(&self) -> &str {
        "sheets"
    }

    async fn append(&self, records: &[RunRecord]) -> anyhow::Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let token = google_access_token(&self.http).await?;

        let daily_rows: Vec<Vec<Value>> = records.iter().map(Self::daily_row).collect();
        self.ensure_headers(&token, &self.config.sheet_tab_daily, &DAILY_HEADERS)
            .await?;
        self.append_rows(&token, &self.config.sheet_tab_daily, daily_rows)
            .await?;

        let budget_rows: Vec<Vec<Value>> = records
            .iter()
            .filter(|r| r.changed)
            .map(Self::budget_row)
            .collect();
        if !budget_rows.is_empty() {
            self.ensure_headers(&token, &self.config.sheet_tab_budget, &BUDGET_HEADERS)
                .await?;
            self.append_rows(&token, &self.config.sheet_tab_budget, budget_rows)
                .await?;
        }

        Ok(())
    }
}
