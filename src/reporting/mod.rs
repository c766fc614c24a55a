//! Run logging - one row per campaign per run, appended to two sinks.
//!
//! The sinks are independent and order-insensitive: a Sheets failure must
//! not keep rows out of BigQuery, so the pipeline logs sink errors and
//! carries on.

mod bigquery;
mod sheets;

pub use bigquery::BigQuerySink;
pub use sheets::SheetsSink;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ads::{CampaignSnapshot, CampaignStatus};
use crate::optimizer::BudgetDecision;

/// One campaign's row for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub campaign_id: String,
    pub campaign_name: String,
    pub status: CampaignStatus,
    pub old_budget: f64,
    pub new_budget: f64,
    pub delta: f64,
    pub acos: Option<f64>,
    pub spend: f64,
    pub sales: f64,
    pub units: u64,
    pub clicks: u64,
    pub impressions: u64,
    pub changed: bool,
    pub reason: String,
}

impl RunRecord {
    pub fn from_decision(
        run_id: Uuid,
        timestamp: DateTime<Utc>,
        snapshot: &CampaignSnapshot,
        decision: &BudgetDecision,
    ) -> Self {
        Self {
            run_id,
            timestamp,
            campaign_id: snapshot.campaign_id.clone(),
            campaign_name: snapshot.campaign_name.clone(),
            status: snapshot.status,
            old_budget: decision.old_budget,
            new_budget: decision.new_budget,
            delta: decision.new_budget - decision.old_budget,
            acos: snapshot.acos,
            spend: snapshot.spend,
            sales: snapshot.sales,
            units: snapshot.units,
            clicks: snapshot.clicks,
            impressions: snapshot.impressions,
            changed: decision.changed,
            reason: decision.reason.to_string(),
        }
    }

    /// ACOS rendered for the human-readable sink.
    pub fn acos_display(&self) -> String {
        match self.acos {
            Some(a) => format!("{:.1}%", a * 100.0),
            None => "N/A".to_string(),
        }
    }
}

/// Append-only logging seam.
#[async_trait]
pub trait RunSink: Send + Sync {
    /// Human-readable name for log lines.
    fn name(&self) -> &str;

    /// Append all records for one run.
    async fn append(&self, records: &[RunRecord]) -> anyhow::Result<()>;
}

/// Bearer token for the Google APIs: `GOOGLE_ACCESS_TOKEN` when set,
/// otherwise the GCE metadata server (the deployed environment).
pub(crate) async fn google_access_token(http: &reqwest::Client) -> anyhow::Result<String> {
    if let Ok(token) = std::env::var("GOOGLE_ACCESS_TOKEN") {
        if !token.is_empty() {
            return Ok(token);
        }
    }

    #[derive(Deserialize)]
    struct MetadataToken {
        access_token: String,
    }

    let token: MetadataToken = http
        .get("http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token")
        .header("Metadata-Flavor", "Google")
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(token.access_token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::DecisionReason;

    fn record(acos: Option<f64>) -> RunRecord {
        let snapshot = CampaignSnapshot {
            campaign_id: "C9".to_string(),
            campaign_name: "Fall SP".to_string(),
            status: CampaignStatus::Enabled,
            current_budget: 70.0,
            spend: 140.0,
            sales: 700.0,
            units: 20,
            clicks: 300,
            impressions: 7000,
            acos,
        };
        let decision = BudgetDecision {
            campaign_id: "C9".to_string(),
            old_budget: 70.0,
            new_budget: 63.0,
            changed: true,
            alert_triggered: true,
            reason: DecisionReason::AcosAboveRange,
        };
        RunRecord::from_decision(Uuid::nil(), Utc::now(), &snapshot, &decision)
    }

    #[test]
    fn record_carries_delta_and_reason() {
        let r = record(Some(0.2));
        assert_eq!(r.delta, -7.0);
        assert_eq!(r.reason, "ACOS above range");
        assert_eq!(r.acos_display(), "20.0%");
    }

    #[test]
    fn undefined_acos_displays_na() {
        assert_eq!(record(None).acos_display(), "N/A");
    }
}
