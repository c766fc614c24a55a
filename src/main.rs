//! adspilot binary - one scheduled run of the budget automation.
//!
//! Invoked by a scheduler (cron, Cloud Scheduler); exits non-zero when the
//! run aborts so the scheduler's own alerting can see it.

use chrono::Utc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use adspilot::ads::AmazonAdsClient;
use adspilot::alerts::{self, Notifier, SendGridNotifier};
use adspilot::config::Settings;
use adspilot::pipeline;
use adspilot::reporting::{BigQuerySink, RunSink, SheetsSink};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(error) => {
            error!(%error, "configuration invalid, aborting");
            std::process::exit(1);
        }
    };

    let notifier = SendGridNotifier::new(settings.alerts.clone());

    let result = run(&settings, &notifier).await;
    match result {
        Ok(()) => info!("budget automation finished"),
        Err(error) => {
            error!(%error, "budget automation failed");
            // Best effort: the alert channel may be the thing that is down.
            let alert = alerts::build_error_alert(&format!("{error:#}"));
            if let Err(alert_error) = notifier.send(&alert).await {
                error!(%alert_error, "error alert delivery failed");
            }
            std::process::exit(1);
        }
    }
}

async fn run(settings: &Settings, notifier: &SendGridNotifier) -> anyhow::Result<()> {
    let ads = AmazonAdsClient::connect(settings.amazon.clone()).await?;
    let sinks: Vec<Box<dyn RunSink>> = vec![
        Box::new(SheetsSink::new(settings.reporting.clone())),
        Box::new(BigQuerySink::new(settings.reporting.clone())),
    ];

    pipeline::run_once(settings, &ads, notifier, &sinks, Utc::now()).await?;
    Ok(())
}
