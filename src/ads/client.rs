//! Reqwest client for the Amazon Advertising API.
//!
//! Handles the OAuth2 refresh-token exchange, Sponsored Products report
//! generation (request, poll, download, gunzip) and campaign budget updates.
//! API docs: https://advertising.amazon.com/API/docs

use std::io::Read;
use std::time::Duration;

use async_trait::async_trait;
use flate2::read::GzDecoder;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::AmazonCredentials;

use super::{AdsApi, AdsError, CampaignSnapshot, CampaignStatus, DateRange};

const TOKEN_URL: &str = "https://api.amazon.com/auth/o2/token";

const REPORT_METRICS: &str = "campaignName,campaignId,campaignStatus,campaignBudget,\
impressions,clicks,cost,attributedSales30d,attributedUnitsOrdered30d";

/// Maximum report-status polls before giving up. Reports are usually ready
/// within 30-60 seconds.
const MAX_POLL_ATTEMPTS: u32 = 20;
const POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ReportRequested {
    #[serde(rename = "reportId")]
    report_id: String,
}

#[derive(Debug, Deserialize)]
struct ReportStatus {
    status: String,
    location: Option<String>,
    #[serde(rename = "statusDetails")]
    status_details: Option<String>,
}

/// One row of the Sponsored Products campaign report.
#[derive(Debug, Deserialize)]
struct ReportRow {
    #[serde(rename = "campaignId")]
    campaign_id: serde_json::Value,
    #[serde(rename = "campaignName")]
    campaign_name: String,
    #[serde(rename = "campaignStatus")]
    status: CampaignStatus,
    #[serde(rename = "campaignBudget", default)]
    budget: f64,
    #[serde(default)]
    cost: f64,
    #[serde(rename = "attributedSales30d", default)]
    sales: f64,
    #[serde(rename = "attributedUnitsOrdered30d", default)]
    units: u64,
    #[serde(default)]
    clicks: u64,
    #[serde(default)]
    impressions: u64,
}

impl ReportRow {
    fn into_snapshot(self) -> CampaignSnapshot {
        // Campaign ids arrive as numbers in report rows but strings in the
        // management API; normalize to string here.
        let campaign_id = match self.campaign_id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        CampaignSnapshot {
            acos: CampaignSnapshot::compute_acos(self.cost, self.sales),
            campaign_id,
            campaign_name: self.campaign_name,
            status: self.status,
            current_budget: self.budget,
            spend: self.cost,
            sales: self.sales,
            units: self.units,
            clicks: self.clicks,
            impressions: self.impressions,
        }
    }
}

/// Authenticated Amazon Ads client for one profile.
pub struct AmazonAdsClient {
    http: reqwest::Client,
    credentials: AmazonCredentials,
    access_token: String,
}

impl AmazonAdsClient {
    /// Exchange the refresh token for an access token and build a client.
    pub async fn connect(credentials: AmazonCredentials) -> Result<Self, AdsError> {
        let http = reqwest::Client::new();
        let response = http
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", credentials.refresh_token.as_str()),
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AdsError::Auth(format!("{status}: {body}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AdsError::Auth(e.to_string()))?;
        debug!("Amazon Ads token refreshed");

        Ok(Self {
            http,
            credentials,
            access_token: token.access_token,
        })
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.access_token)
            .header(
                "Amazon-Advertising-API-ClientId",
                &self.credentials.client_id,
            )
            .header(
                "Amazon-Advertising-API-Scope",
                &self.credentials.profile_id,
            )
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.credentials.region.api_base(), path)
    }

    async fn request_report(&self, range: DateRange) -> Result<String, AdsError> {
        let response = self
            .request(reqwest::Method::POST, self.api_url("/v2/sp/campaigns/report"))
            .json(&json!({
                "reportDate": range.end.format("%Y%m%d").to_string(),
                "startDate": range.start.format("%Y%m%d").to_string(),
                "endDate": range.end.format("%Y%m%d").to_string(),
                "metrics": REPORT_METRICS,
            }))
            .send()
            .await?
            .error_for_status()?;

        let requested: ReportRequested = response.json().await?;
        debug!(report_id = %requested.report_id, "campaign report requested");
        Ok(requested.report_id)
    }

    async fn poll_and_download(&self, report_id: &str) -> Result<Vec<ReportRow>, AdsError> {
        for attempt in 1..=MAX_POLL_ATTEMPTS {
            let status: ReportStatus = self
                .request(
                    reqwest::Method::GET,
                    self.api_url(&format!("/v2/reports/{report_id}")),
                )
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            match status.status.as_str() {
                "SUCCESS" => {
                    let location = status.location.ok_or_else(|| {
                        AdsError::ReportFailed("SUCCESS status without a location".to_string())
                    })?;
                    return self.download_report(&location).await;
                }
                "FAILURE" => {
                    return Err(AdsError::ReportFailed(
                        status.status_details.unwrap_or_else(|| "no details".to_string()),
                    ));
                }
                other => {
                    debug!(attempt, status = other, "report not ready");
                }
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }

        Err(AdsError::ReportTimeout {
            attempts: MAX_POLL_ATTEMPTS,
        })
    }

    async fn download_report(&self, location: &str) -> Result<Vec<ReportRow>, AdsError> {
        let compressed = self
            .request(reqwest::Method::GET, location.to_string())
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        let mut decoder = GzDecoder::new(compressed.as_ref());
        let mut body = String::new();
        decoder
            .read_to_string(&mut body)
            .map_err(|e| AdsError::Decode(format!("gunzip failed: {e}")))?;

        serde_json::from_str(&body).map_err(|e| AdsError::Decode(e.to_string()))
    }
}

#[async_trait]
impl AdsApi for AmazonAdsClient {
    async fn fetch_snapshots(&self, range: DateRange) -> Result<Vec<CampaignSnapshot>, AdsError> {
        let report_id = self.request_report(range).await?;
        let rows = self.poll_and_download(&report_id).await?;
        let snapshots: Vec<CampaignSnapshot> =
            rows.into_iter().map(ReportRow::into_snapshot).collect();
        info!(campaigns = snapshots.len(), "campaign report downloaded");
        Ok(snapshots)
    }

    async fn apply_budget(&self, campaign_id: &str, new_budget: f64) -> Result<(), AdsError> {
        let response = self
            .request(reqwest::Method::PUT, self.api_url("/v2/sp/campaigns"))
            .json(&json!([{
                "campaignId": campaign_id,
                "dailyBudget": new_budget,
            }]))
            .send()
            .await?;

        // Amazon answers 207 Multi-Status for batch updates.
        let status = response.status();
        if status == reqwest::StatusCode::MULTI_STATUS || status.is_success() {
            info!(campaign_id, new_budget, "daily budget updated");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            warn!(campaign_id, %status, "budget update rejected");
            Err(AdsError::UpdateRejected {
                campaign_id: campaign_id.to_string(),
                reason: format!("{status}: {body}"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_row_deserializes_and_converts() {
        let raw = json!({
            "campaignId": 123456,
            "campaignName": "Summer SP",
            "campaignStatus": "ENABLED",
            "campaignBudget": 65.0,
            "cost": 200.0,
            "attributedSales30d": 1000.0,
            "attributedUnitsOrdered30d": 25,
            "clicks": 410,
            "impressions": 9000
        });
        let row: ReportRow = serde_json::from_value(raw).unwrap();
        let snapshot = row.into_snapshot();
        assert_eq!(snapshot.campaign_id, "123456");
        assert_eq!(snapshot.status, CampaignStatus::Enabled);
        assert_eq!(snapshot.acos, Some(0.2));
        assert_eq!(snapshot.units, 25);
    }

    #[test]
    fn missing_metrics_default_to_zero() {
        let raw = json!({
            "campaignId": "789",
            "campaignName": "New campaign",
            "campaignStatus": "PAUSED"
        });
        let row: ReportRow = serde_json::from_value(raw).unwrap();
        let snapshot = row.into_snapshot();
        assert_eq!(snapshot.current_budget, 0.0);
        assert_eq!(snapshot.sales, 0.0);
        assert_eq!(snapshot.acos, None);
    }

    #[test]
    fn gzipped_report_round_trips() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let body = json!([{
            "campaignId": 1,
            "campaignName": "A",
            "campaignStatus": "ENABLED",
            "campaignBudget": 10.0,
            "cost": 1.0,
            "attributedSales30d": 10.0
        }])
        .to_string();

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(body.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut decoder = GzDecoder::new(compressed.as_slice());
        let mut decoded = String::new();
        decoder.read_to_string(&mut decoded).unwrap();
        let rows: Vec<ReportRow> = serde_json::from_str(&decoded).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].budget, 10.0);
    }
}
