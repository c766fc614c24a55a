//! Configuration surface.
//!
//! Everything is loaded once at process start and immutable for the rest of
//! the run: vendor credentials from environment variables, the seasonal
//! budget table from an optional YAML file (a built-in default ships in
//! code), and the global budget policy tunables.
//!
//! Validation happens here, not per call: a malformed table or a missing
//! month entry is fatal at startup, so the decision engine can treat the
//! table as total over months 1-12.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating configuration. All fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingEnv(String),

    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("seasonal table has no entry for month {0}")]
    MissingMonth(u32),

    #[error("seasonal table month {month}: {reason}")]
    InvalidMonthTarget { month: u32, reason: String },

    #[error("failed to read seasonal table {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse seasonal table {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Amazon Ads API region. Selects the advertising API endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdsRegion {
    Na,
    Eu,
    Fe,
}

impl AdsRegion {
    pub fn api_base(&self) -> &'static str {
        match self {
            AdsRegion::Na => "https://advertising-api.amazon.com",
            AdsRegion::Eu => "https://advertising-api-eu.amazon.com",
            AdsRegion::Fe => "https://advertising-api-fe.amazon.com",
        }
    }

    fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.to_ascii_uppercase().as_str() {
            "NA" => Ok(AdsRegion::Na),
            "EU" => Ok(AdsRegion::Eu),
            "FE" => Ok(AdsRegion::Fe),
            other => Err(ConfigError::InvalidValue {
                name: "AMAZON_REGION".to_string(),
                reason: format!("expected NA, EU or FE, got {other:?}"),
            }),
        }
    }
}

/// Desired daily budget and acceptable ACOS band for one calendar month.
///
/// ACOS bounds are fractions, not percentages: 0.25 means 25%.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthTarget {
    pub target_budget: f64,
    pub acos_min: f64,
    pub acos_max: f64,
}

/// Seasonal budget targets for all twelve months.
///
/// Constructed only through [`SeasonalTable::from_entries`], which validates
/// totality, so `for_month` on a valid month never fails.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonalTable {
    months: [MonthTarget; 12],
}

impl SeasonalTable {
    /// Build a table from per-month entries, requiring exactly months 1-12.
    pub fn from_entries(entries: &BTreeMap<u32, MonthTarget>) -> Result<Self, ConfigError> {
        let mut months = [MonthTarget {
            target_budget: 0.0,
            acos_min: 0.0,
            acos_max: 0.0,
        }; 12];

        for month in 1..=12u32 {
            let target = entries
                .get(&month)
                .copied()
                .ok_or(ConfigError::MissingMonth(month))?;
            validate_month_target(month, &target)?;
            months[(month - 1) as usize] = target;
        }

        for month in entries.keys() {
            if !(1..=12).contains(month) {
                return Err(ConfigError::InvalidMonthTarget {
                    month: *month,
                    reason: "month outside 1-12".to_string(),
                });
            }
        }

        Ok(Self { months })
    }

    /// Target for a month in [1, 12]. Panics only on an out-of-range month,
    /// which callers must validate first (the decision engine does).
    pub fn for_month(&self, month: u32) -> &MonthTarget {
        &self.months[(month - 1) as usize]
    }

    /// Default table: the seller's seasonal dollar targets with a 15-25%
    /// ACOS band across the year. Overridable via `SEASONAL_TARGETS_FILE`.
    pub fn builtin_default() -> Self {
        let dollars = [
            35.0, // Jan - recovering
            18.0, // Feb - slow
            65.0, // Mar - ramp up
            68.0, // Apr
            68.0, // May
            87.0, // Jun - peak approaching
            110.0, // Jul - peak
            88.0, // Aug
            70.0, // Sep
            45.0, // Oct - slowing
            20.0, // Nov
            19.0, // Dec - slowest
        ];
        let months = dollars.map(|target_budget| MonthTarget {
            target_budget,
            acos_min: 0.15,
            acos_max: 0.25,
        });
        Self { months }
    }

    /// Load a table from a YAML file of `month: {target_budget, acos_min,
    /// acos_max}` entries.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let entries: BTreeMap<u32, MonthTarget> =
            serde_yaml::from_str(&text).map_err(|source| ConfigError::Yaml {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_entries(&entries)
    }
}

fn validate_month_target(month: u32, target: &MonthTarget) -> Result<(), ConfigError> {
    if !(target.target_budget.is_finite() && target.target_budget > 0.0) {
        return Err(ConfigError::InvalidMonthTarget {
            month,
            reason: format!("target_budget must be positive, got {}", target.target_budget),
        });
    }
    if !(target.acos_min.is_finite() && target.acos_min >= 0.0) {
        return Err(ConfigError::InvalidMonthTarget {
            month,
            reason: format!("acos_min must be non-negative, got {}", target.acos_min),
        });
    }
    if !(target.acos_max.is_finite() && target.acos_max > target.acos_min) {
        return Err(ConfigError::InvalidMonthTarget {
            month,
            reason: format!(
                "acos_max ({}) must exceed acos_min ({})",
                target.acos_max, target.acos_min
            ),
        });
    }
    Ok(())
}

/// Global budget tunables.
///
/// The step sizes are deliberately configuration, not constants: the right
/// smoothing pace depends on the account's scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetPolicy {
    /// Hard lower bound for any computed budget (Amazon's own floor is $1/day).
    pub min_budget_floor: f64,
    /// Hard upper bound for any computed budget.
    pub max_budget_ceiling: f64,
    /// Smallest budget increment the platform accepts; results are rounded
    /// to a multiple of this.
    pub min_increment: f64,
    /// Currency units moved toward the seasonal target per run when ACOS is
    /// within its band.
    pub smoothing_step: f64,
    /// Fractional budget change applied when ACOS leaves its band
    /// (0.10 = 10% per run).
    pub adjustment_step: f64,
    /// Secondary alert threshold: ACOS below `acos_min * extreme_low_factor`
    /// flags an alert even on the increase path (ads may not be spending).
    pub extreme_low_factor: f64,
}

impl Default for BudgetPolicy {
    fn default() -> Self {
        Self {
            min_budget_floor: 1.0,
            max_budget_ceiling: 500.0,
            min_increment: 0.01,
            smoothing_step: 5.0,
            adjustment_step: 0.10,
            extreme_low_factor: 0.5,
        }
    }
}

impl BudgetPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("min_budget_floor", self.min_budget_floor),
            ("min_increment", self.min_increment),
            ("smoothing_step", self.smoothing_step),
            ("adjustment_step", self.adjustment_step),
            ("extreme_low_factor", self.extreme_low_factor),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidValue {
                    name: name.to_string(),
                    reason: format!("must be positive, got {value}"),
                });
            }
        }
        if self.adjustment_step >= 1.0 {
            return Err(ConfigError::InvalidValue {
                name: "adjustment_step".to_string(),
                reason: format!("must be below 1.0, got {}", self.adjustment_step),
            });
        }
        if !(self.max_budget_ceiling.is_finite()
            && self.max_budget_ceiling >= self.min_budget_floor)
        {
            return Err(ConfigError::InvalidValue {
                name: "max_budget_ceiling".to_string(),
                reason: format!(
                    "must be at least min_budget_floor ({}), got {}",
                    self.min_budget_floor, self.max_budget_ceiling
                ),
            });
        }
        Ok(())
    }
}

/// Amazon Ads API credentials.
#[derive(Debug, Clone)]
pub struct AmazonCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub profile_id: String,
    pub region: AdsRegion,
}

/// Alert delivery configuration. SMS is optional; leave the Twilio fields
/// unset to skip it.
#[derive(Debug, Clone)]
pub struct AlertConfig {
    pub sendgrid_api_key: String,
    pub email_to: String,
    pub email_from: String,
    pub twilio: Option<TwilioConfig>,
}

#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub to_number: String,
}

/// Reporting sink configuration.
#[derive(Debug, Clone)]
pub struct ReportingConfig {
    pub sheet_id: String,
    pub sheet_tab_daily: String,
    pub sheet_tab_budget: String,
    pub bq_project: String,
    pub bq_dataset: String,
    pub bq_table: String,
}

/// Full process configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub amazon: AmazonCredentials,
    pub alerts: AlertConfig,
    pub reporting: ReportingConfig,
    pub policy: BudgetPolicy,
    pub seasonal: SeasonalTable,
}

impl Settings {
    /// Load settings from the environment. Fatal on any missing credential
    /// or malformed table.
    pub fn from_env() -> Result<Self, ConfigError> {
        let amazon = AmazonCredentials {
            client_id: require_env("AMAZON_CLIENT_ID")?,
            client_secret: require_env("AMAZON_CLIENT_SECRET")?,
            refresh_token: require_env("AMAZON_REFRESH_TOKEN")?,
            profile_id: require_env("AMAZON_PROFILE_ID")?,
            region: AdsRegion::parse(&env_or("AMAZON_REGION", "NA"))?,
        };

        let twilio = match std::env::var("TWILIO_SID") {
            Ok(sid) if !sid.is_empty() => Some(TwilioConfig {
                account_sid: sid,
                auth_token: require_env("TWILIO_AUTH_TOKEN")?,
                from_number: require_env("TWILIO_FROM")?,
                to_number: require_env("ALERT_SMS_TO")?,
            }),
            _ => None,
        };

        let alerts = AlertConfig {
            sendgrid_api_key: require_env("SENDGRID_API_KEY")?,
            email_to: require_env("ALERT_EMAIL_TO")?,
            email_from: require_env("ALERT_EMAIL_FROM")?,
            twilio,
        };

        let reporting = ReportingConfig {
            sheet_id: require_env("GOOGLE_SHEET_ID")?,
            sheet_tab_daily: env_or("SHEET_TAB_DAILY", "Daily Performance"),
            sheet_tab_budget: env_or("SHEET_TAB_BUDGET", "Budget Changes"),
            bq_project: require_env("GCP_PROJECT_ID")?,
            bq_dataset: env_or("BQ_DATASET", "amazon_ads"),
            bq_table: env_or("BQ_TABLE", "daily_performance"),
        };

        let policy = BudgetPolicy {
            min_budget_floor: env_f64("MIN_BUDGET_FLOOR", 1.0)?,
            max_budget_ceiling: env_f64("MAX_BUDGET_CEILING", 500.0)?,
            min_increment: env_f64("MIN_INCREMENT", 0.01)?,
            smoothing_step: env_f64("SMOOTHING_STEP", 5.0)?,
            adjustment_step: env_f64("ADJUSTMENT_STEP", 0.10)?,
            extreme_low_factor: env_f64("EXTREME_LOW_FACTOR", 0.5)?,
        };
        policy.validate()?;

        let seasonal = match std::env::var("SEASONAL_TARGETS_FILE") {
            Ok(path) if !path.is_empty() => SeasonalTable::from_yaml_file(Path::new(&path))?,
            _ => SeasonalTable::builtin_default(),
        };

        Ok(Self {
            amazon,
            alerts,
            reporting,
            policy,
            seasonal,
        })
    }
}

fn require_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnv(name.to_string()))
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_f64(name: &str, default: f64) -> Result<f64, ConfigError> {
    match std::env::var(name) {
        Ok(raw) if !raw.is_empty() => raw.parse().map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            reason: format!("expected a number, got {raw:?}"),
        }),
        _ => Ok(default),
    }
}
