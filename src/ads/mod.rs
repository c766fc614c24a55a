//! Amazon Ads API integration.
//!
//! This module owns the fetcher/applier boundary: vendor report rows are
//! deserialized into explicit typed structs here, and only the validated
//! [`CampaignSnapshot`] shape ever reaches the decision engine.

mod client;

pub use client::AmazonAdsClient;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the ads platform boundary. The run aborts on any of these;
/// retries are the scheduler's job, not ours.
#[derive(Debug, Error)]
pub enum AdsError {
    #[error("token exchange failed: {0}")]
    Auth(String),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("report generation failed: {0}")]
    ReportFailed(String),

    #[error("report not ready after {attempts} polls")]
    ReportTimeout { attempts: u32 },

    #[error("failed to decode report payload: {0}")]
    Decode(String),

    #[error("budget update rejected for campaign {campaign_id}: {reason}")]
    UpdateRejected { campaign_id: String, reason: String },
}

/// Campaign state on the platform. Only `Enabled` campaigns get budget
/// decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    Enabled,
    Paused,
    Archived,
}

/// Point-in-time read of one campaign's trailing-window performance.
///
/// `acos` is `spend / sales`, `None` when there were no attributed sales
/// (an undefined ratio, not a zero one).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignSnapshot {
    pub campaign_id: String,
    pub campaign_name: String,
    pub status: CampaignStatus,
    pub current_budget: f64,
    pub spend: f64,
    pub sales: f64,
    pub units: u64,
    pub clicks: u64,
    pub impressions: u64,
    pub acos: Option<f64>,
}

impl CampaignSnapshot {
    /// ACOS from raw spend and sales. Undefined when sales are zero.
    pub fn compute_acos(spend: f64, sales: f64) -> Option<f64> {
        if sales > 0.0 {
            Some(spend / sales)
        } else {
            None
        }
    }
}

/// Inclusive date range for a performance report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Trailing window of `days` ending at `end`.
    pub fn trailing(end: NaiveDate, days: i64) -> Self {
        Self {
            start: end - chrono::Duration::days(days),
            end,
        }
    }
}

/// The ads platform as the pipeline sees it: one read, one write.
#[async_trait]
pub trait AdsApi: Send + Sync {
    /// Pull performance snapshots for every campaign in the profile.
    async fn fetch_snapshots(&self, range: DateRange) -> Result<Vec<CampaignSnapshot>, AdsError>;

    /// Set a campaign's daily budget.
    async fn apply_budget(&self, campaign_id: &str, new_budget: f64) -> Result<(), AdsError>;
}
