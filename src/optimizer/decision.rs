//! The budget decision itself: a pure function over one campaign snapshot.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ads::CampaignSnapshot;
use crate::config::{BudgetPolicy, SeasonalTable};

/// Per-call input violations. Configuration problems (a missing month entry)
/// are caught at load time and never reach this point.
#[derive(Debug, Error, PartialEq)]
pub enum DecisionError {
    #[error("month {0} outside 1-12")]
    MonthOutOfRange(u32),

    #[error("{field} must be non-negative, got {value}")]
    NegativeMetric { field: &'static str, value: f64 },
}

/// Why the engine moved (or held) a budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    AcosAboveRange,
    AcosBelowRange,
    WithinRange,
    NoSalesData,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionReason::AcosAboveRange => "ACOS above range",
            DecisionReason::AcosBelowRange => "ACOS below range - increasing spend",
            DecisionReason::WithinRange => "within range - trending to seasonal target",
            DecisionReason::NoSalesData => "no sales data - holding budget",
        }
    }
}

impl std::fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one decision. Consumed immediately by the applier, notifier
/// and logger; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetDecision {
    pub campaign_id: String,
    pub old_budget: f64,
    pub new_budget: f64,
    pub changed: bool,
    pub alert_triggered: bool,
    pub reason: DecisionReason,
}

/// Decide a campaign's new daily budget for the given calendar month.
///
/// Pure and deterministic: no clock, no network, no shared state. The
/// result is always within `[min_budget_floor, max_budget_ceiling]` and
/// rounded to the platform's minimum increment.
///
/// - ACOS above the month's band: pull the budget back by
///   `adjustment_step`, floored at the minimum; always an alert.
/// - ACOS below the band: push toward the seasonal target (never past it,
///   never past the ceiling); an alert only when ACOS is extreme, below
///   `acos_min * extreme_low_factor`.
/// - ACOS in band: move one `smoothing_step` toward the seasonal target.
/// - No sales: ACOS is undefined, hold the budget.
pub fn decide(
    snapshot: &CampaignSnapshot,
    month: u32,
    targets: &SeasonalTable,
    policy: &BudgetPolicy,
) -> Result<BudgetDecision, DecisionError> {
    if !(1..=12).contains(&month) {
        return Err(DecisionError::MonthOutOfRange(month));
    }
    for (field, value) in [
        ("spend", snapshot.spend),
        ("sales", snapshot.sales),
        ("current_budget", snapshot.current_budget),
    ] {
        if !(value.is_finite() && value >= 0.0) {
            return Err(DecisionError::NegativeMetric { field, value });
        }
    }

    let target = targets.for_month(month);
    let current = snapshot.current_budget;

    let (candidate, alert_triggered, reason) = match snapshot.acos {
        None => (current, false, DecisionReason::NoSalesData),
        Some(acos) if acos > target.acos_max => {
            let lowered = (current * (1.0 - policy.adjustment_step)).max(policy.min_budget_floor);
            (lowered, true, DecisionReason::AcosAboveRange)
        }
        Some(acos) if acos < target.acos_min => {
            // Cheap traffic: spend more, but never overshoot the seasonal
            // target in a single run.
            let raised = if current < target.target_budget {
                (current * (1.0 + policy.adjustment_step)).min(target.target_budget)
            } else {
                current
            };
            let extreme = acos < target.acos_min * policy.extreme_low_factor;
            (raised, extreme, DecisionReason::AcosBelowRange)
        }
        Some(_) => {
            let gap = target.target_budget - current;
            let step = gap.clamp(-policy.smoothing_step, policy.smoothing_step);
            (current + step, false, DecisionReason::WithinRange)
        }
    };

    let mut new_budget = round_to_increment(
        candidate.clamp(policy.min_budget_floor, policy.max_budget_ceiling),
        policy.min_increment,
    );

    // Rounding noise below half an increment is not a change.
    let changed = (new_budget - current).abs() >= policy.min_increment / 2.0;
    if !changed {
        new_budget = current;
    }

    Ok(BudgetDecision {
        campaign_id: snapshot.campaign_id.clone(),
        old_budget: current,
        new_budget,
        changed,
        alert_triggered,
        reason,
    })
}

fn round_to_increment(value: f64, increment: f64) -> f64 {
    (value / increment).round() * increment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ads::CampaignStatus;
    use crate::config::{MonthTarget, SeasonalTable};
    use std::collections::BTreeMap;

    fn snapshot(current_budget: f64, acos: Option<f64>) -> CampaignSnapshot {
        let sales = 1000.0;
        CampaignSnapshot {
            campaign_id: "C001".to_string(),
            campaign_name: "Test Campaign".to_string(),
            status: CampaignStatus::Enabled,
            current_budget,
            spend: acos.map(|a| a * sales).unwrap_or(12.0),
            sales: if acos.is_some() { sales } else { 0.0 },
            units: 25,
            clicks: 400,
            impressions: 9000,
            acos,
        }
    }

    fn table() -> SeasonalTable {
        SeasonalTable::builtin_default()
    }

    fn custom_table(target_budget: f64, acos_min: f64, acos_max: f64) -> SeasonalTable {
        let entries: BTreeMap<u32, MonthTarget> = (1..=12)
            .map(|m| {
                (
                    m,
                    MonthTarget {
                        target_budget,
                        acos_min,
                        acos_max,
                    },
                )
            })
            .collect();
        SeasonalTable::from_entries(&entries).unwrap()
    }

    fn policy() -> BudgetPolicy {
        BudgetPolicy::default()
    }

    #[test]
    fn new_budget_stays_in_band_for_every_month() {
        let policy = policy();
        let table = table();
        for month in 1..=12 {
            for acos in [0.02, 0.10, 0.18, 0.30, 0.90] {
                for current in [0.5, 1.0, 45.0, 499.0, 500.0] {
                    let d = decide(&snapshot(current, Some(acos)), month, &table, &policy)
                        .unwrap();
                    assert!(
                        d.new_budget >= policy.min_budget_floor - 1e-9
                            && d.new_budget <= policy.max_budget_ceiling + 1e-9,
                        "month {month} acos {acos} current {current} gave {}",
                        d.new_budget
                    );
                }
            }
        }
    }

    #[test]
    fn high_acos_alerts_and_never_raises() {
        let d = decide(&snapshot(90.0, Some(0.30)), 7, &table(), &policy()).unwrap();
        assert!(d.alert_triggered);
        assert!(d.new_budget <= d.old_budget);
    }

    #[test]
    fn low_acos_below_target_raises() {
        // July target is 110; a cheap-traffic campaign at 90 should climb.
        let d = decide(&snapshot(90.0, Some(0.10)), 7, &table(), &policy()).unwrap();
        assert!(d.new_budget > 90.0);
        assert_eq!(d.reason, DecisionReason::AcosBelowRange);
    }

    #[test]
    fn low_acos_increase_is_capped_at_target() {
        let table = custom_table(95.0, 0.15, 0.25);
        let d = decide(&snapshot(90.0, Some(0.10)), 7, &table, &policy()).unwrap();
        assert_eq!(d.new_budget, 95.0);
    }

    #[test]
    fn low_acos_at_target_holds() {
        let d = decide(&snapshot(110.0, Some(0.10)), 7, &table(), &policy()).unwrap();
        assert!(!d.changed);
        assert_eq!(d.new_budget, 110.0);
    }

    #[test]
    fn extreme_low_acos_also_alerts() {
        // Band min is 15%; below 7.5% (factor 0.5) the increase still alerts.
        let d = decide(&snapshot(90.0, Some(0.05)), 7, &table(), &policy()).unwrap();
        assert!(d.alert_triggered);
        let mild = decide(&snapshot(90.0, Some(0.12)), 7, &table(), &policy()).unwrap();
        assert!(!mild.alert_triggered);
    }

    #[test]
    fn in_band_at_target_is_a_fixed_point() {
        let d = decide(&snapshot(18.0, Some(0.18)), 2, &table(), &policy()).unwrap();
        assert!(!d.changed);
        assert!(!d.alert_triggered);
        assert_eq!(d.new_budget, 18.0);
        assert_eq!(d.reason, DecisionReason::WithinRange);
    }

    #[test]
    fn in_band_trends_toward_target_one_step() {
        // July target 110, smoothing step 5: 90 -> 95, not 110.
        let d = decide(&snapshot(90.0, Some(0.20)), 7, &table(), &policy()).unwrap();
        assert_eq!(d.new_budget, 95.0);
        assert!(d.changed);
        // And back down when above target.
        let d = decide(&snapshot(30.0, Some(0.20)), 2, &table(), &policy()).unwrap();
        assert_eq!(d.new_budget, 25.0);
    }

    #[test]
    fn july_peak_with_runaway_acos_pulls_back() {
        // month=7 (target 110, band 15-25%), current 90, ACOS 30%.
        let d = decide(&snapshot(90.0, Some(0.30)), 7, &table(), &policy()).unwrap();
        assert!(d.alert_triggered);
        assert!(d.new_budget < 90.0);
        assert_eq!(d.new_budget, 81.0);
        assert_eq!(d.reason, DecisionReason::AcosAboveRange);
    }

    #[test]
    fn no_sales_holds_budget_without_alert() {
        let d = decide(&snapshot(40.0, None), 5, &table(), &policy()).unwrap();
        assert!(!d.changed);
        assert!(!d.alert_triggered);
        assert_eq!(d.reason, DecisionReason::NoSalesData);
    }

    #[test]
    fn decrease_respects_floor() {
        let mut policy = policy();
        policy.min_budget_floor = 10.0;
        let d = decide(&snapshot(10.5, Some(0.40)), 7, &table(), &policy).unwrap();
        assert!(d.new_budget >= 10.0);
        assert!(d.new_budget <= 10.5);
    }

    #[test]
    fn result_is_rounded_to_min_increment() {
        let mut policy = policy();
        policy.min_increment = 0.5;
        // 90 * 0.9 = 81.0, already a multiple; try an odd current instead.
        let d = decide(&snapshot(87.3, Some(0.40)), 7, &table(), &policy).unwrap();
        let multiple = d.new_budget / 0.5;
        assert!((multiple - multiple.round()).abs() < 1e-9);
    }

    #[test]
    fn identical_inputs_identical_outputs() {
        let snap = snapshot(73.25, Some(0.21));
        let a = decide(&snap, 9, &table(), &policy()).unwrap();
        let b = decide(&snap, 9, &table(), &policy()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn month_out_of_range_is_an_error() {
        let err = decide(&snapshot(50.0, Some(0.2)), 0, &table(), &policy()).unwrap_err();
        assert_eq!(err, DecisionError::MonthOutOfRange(0));
        let err = decide(&snapshot(50.0, Some(0.2)), 13, &table(), &policy()).unwrap_err();
        assert_eq!(err, DecisionError::MonthOutOfRange(13));
    }

    #[test]
    fn negative_metrics_are_an_error() {
        let mut snap = snapshot(50.0, Some(0.2));
        snap.spend = -1.0;
        let err = decide(&snap, 6, &table(), &policy()).unwrap_err();
        assert!(matches!(err, DecisionError::NegativeMetric { field: "spend", .. }));
    }
}
