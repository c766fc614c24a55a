//! BigQuery sink - queryable history for trend analysis.

use async_trait::async_trait;
use anyhow::{bail, Context};
use serde_json::{json, Value};

use crate::config::ReportingConfig;

use super::{google_access_token, RunRecord, RunSink};

pub struct BigQuerySink {
    http: reqwest::Client,
    config: ReportingConfig,
}

impl BigQuerySink {
    pub fn new(config: ReportingConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn insert_all_url(&self) -> String {
        format!(
            "https://bigquery.googleapis.com/bigquery/v2/projects/{}/datasets/{}/tables/{}/insertAll",
            self.config.bq_project, self.config.bq_dataset, self.config.bq_table
        )
    }

    fn row_json(record: &RunRecord) -> Value {
        json!({
            "run_id": record.run_id,
            "date": record.timestamp.format("%Y-%m-%d").to_string(),
            "inserted_at": record.timestamp.to_rfc3339(),
            "campaign_id": record.campaign_id,
            "campaign_name": record.campaign_name,
            "status": format!("{:?}", record.status).to_uppercase(),
            "old_budget": record.old_budget,
            "new_budget": record.new_budget,
            "delta": record.delta,
            "acos": record.acos,
            "spend": record.spend,
            "sales": record.sales,
            "units": record.units,
            "clicks": record.clicks,
            "impressions": record.impressions,
            "changed": record.changed,
            "reason": record.reason,
        })
    }
}

#[async_trait]
impl RunSink for BigQuerySink {
    fn name(&self) -> &str {
        "bigquery"
    }

    async fn append(&self, records: &[RunRecord]) -> anyhow::Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let token = google_access_token(&self.http).await?;

        let rows: Vec<Value> = records
            .iter()
            .map(|r| json!({ "json": Self::row_json(r) }))
            .collect();

        let response: Value = self
            .http
            .post(self.insert_all_url())
            .bearer_auth(&token)
            .json(&json!({ "rows": rows }))
            .send()
            .await?
            .error_for_status()
            .context("bigquery insertAll failed")?
            .json()
            .await?;

        // insertAll reports per-row failures in the body, not the status.
        if let Some(errors) = response.get("insertErrors") {
            bail!("bigquery insert errors: {errors}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ads::{CampaignSnapshot, CampaignStatus};
    use crate::optimizer::{BudgetDecision, DecisionReason};
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn row_json_carries_all_metrics() {
        let snapshot = CampaignSnapshot {
            campaign_id: "C2".to_string(),
            campaign_name: "Winter SP".to_string(),
            status: CampaignStatus::Enabled,
            current_budget: 20.0,
            spend: 4.0,
            sales: 20.0,
            units: 2,
            clicks: 15,
            impressions: 400,
            acos: Some(0.2),
        };
        let decision = BudgetDecision {
            campaign_id: "C2".to_string(),
            old_budget: 20.0,
            new_budget: 20.0,
            changed: false,
            alert_triggered: false,
            reason: DecisionReason::WithinRange,
        };
        let record = RunRecord::from_decision(Uuid::nil(), Utc::now(), &snapshot, &decision);
        let row = BigQuerySink::row_json(&record);
        assert_eq!(row["campaign_name"], "Winter SP");
        assert_eq!(row["status"], "ENABLED");
        assert_eq!(row["acos"], 0.2);
        assert_eq!(row["changed"], false);
    }
}
