//! One run of the automation: fetch, decide, then fan out to the applier,
//! notifier and logger.
//!
//! The fan-out steps are independent side effects with no shared mutable
//! state. Anything that fails before the apply step aborts the run with no
//! budget written; sink failures after that point are logged and do not
//! abort each other.

use chrono::{DateTime, Datelike, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::ads::{AdsApi, CampaignStatus, DateRange};
use crate::alerts::{self, Notifier};
use crate::config::Settings;
use crate::optimizer::{decide, BudgetDecision};
use crate::reporting::{RunRecord, RunSink};

/// Trailing performance window requested from the ads platform.
const REPORT_WINDOW_DAYS: i64 = 30;

/// What one invocation did, for the closing log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub campaigns: usize,
    pub decided: usize,
    pub applied: usize,
    pub alerts_sent: usize,
    pub rows_logged: usize,
}

/// Execute one full run at the given instant.
///
/// `now` is injected so the month lookup and log timestamps are testable;
/// the binary passes `Utc::now()`.
pub async fn run_once(
    settings: &Settings,
    ads: &dyn AdsApi,
    notifier: &dyn Notifier,
    sinks: &[Box<dyn RunSink>],
    now: DateTime<Utc>,
) -> anyhow::Result<RunSummary> {
    let run_id = Uuid::new_v4();
    let month = now.month();
    info!(%run_id, month, "starting budget automation run");

    let range = DateRange::trailing(now.date_naive(), REPORT_WINDOW_DAYS);
    let snapshots = ads.fetch_snapshots(range).await?;
    info!(campaigns = snapshots.len(), "campaign snapshots fetched");

    // Decide for every enabled campaign before touching anything remote, so
    // a validation failure aborts with no budget written.
    let mut decided: Vec<(usize, BudgetDecision)> = Vec::new();
    for (index, snapshot) in snapshots.iter().enumerate() {
        if snapshot.status != CampaignStatus::Enabled {
            continue;
        }
        let decision = decide(snapshot, month, &settings.seasonal, &settings.policy)?;
        decided.push((index, decision));
    }

    let mut applied = 0;
    for (_, decision) in &decided {
        if !decision.changed {
            continue;
        }
        ads.apply_budget(&decision.campaign_id, decision.new_budget)
            .await?;
        applied += 1;
    }

    let pairs: Vec<_> = decided
        .iter()
        .map(|(index, decision)| (&snapshots[*index], decision))
        .collect();

    let issues = alerts::collect_issues(&pairs);
    let mut alerts_sent = 0;
    if let Some(digest) = alerts::build_digest(&issues) {
        notifier.send(&digest).await?;
        alerts_sent = issues.len();
    }

    let records: Vec<RunRecord> = pairs
        .iter()
        .map(|(snapshot, decision)| RunRecord::from_decision(run_id, now, snapshot, decision))
        .collect();

    let mut rows_logged = 0;
    for sink in sinks {
        match sink.append(&records).await {
            Ok(()) => rows_logged += records.len(),
            Err(error) => warn!(sink = sink.name(), %error, "run sink append failed"),
        }
    }

    let summary = RunSummary {
        run_id,
        campaigns: snapshots.len(),
        decided: decided.len(),
        applied,
        alerts_sent,
        rows_logged,
    };
    info!(
        campaigns = summary.campaigns,
        applied = summary.applied,
        alerts = summary.alerts_sent,
        rows = summary.rows_logged,
        "run complete"
    );
    Ok(summary)
}
