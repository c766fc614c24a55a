//! adspilot - scheduled Amazon Ads budget automation.
//!
//! One invocation performs a single linear run:
//! 1. Pull campaign performance (spend, sales, ACOS) from the Amazon Ads API
//! 2. Decide a new daily budget per campaign against seasonal targets
//! 3. Push changed budgets back to the platform
//! 4. Send email/SMS alerts when ACOS is out of range
//! 5. Append one row per campaign to Google Sheets and BigQuery

pub mod ads;
pub mod alerts;
pub mod config;
pub mod optimizer;
pub mod pipeline;
pub mod reporting;
