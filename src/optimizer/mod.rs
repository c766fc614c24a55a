//! Budget Decision Engine.
//!
//! # Key Concepts
//! - Seasonal target: desired daily budget plus an acceptable ACOS band per month
//! - Decision: pure function of a campaign snapshot, the month and the policy
//! - Smoothing: budgets trend toward the seasonal target instead of jumping
//!
//! The engine never talks to the network; the pipeline feeds it snapshots
//! from the ads boundary and hands its decisions to the applier, notifier
//! and logger.

mod decision;

pub use decision::{decide, BudgetDecision, DecisionError, DecisionReason};
