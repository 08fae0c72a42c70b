use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Margins strictly above this percentage are considered healthy.
pub const HEALTHY_MARGIN_THRESHOLD: f64 = 20.0;

/// Report id returned when the analysis was computed but not stored.
pub const UNSAVED_REPORT_ID: i64 = -1;

/// One typed transaction taken from the combined upload.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRow {
    /// Title-cased `Type` cell, e.g. "Income", "Expense", "Transfer".
    pub kind: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Critical,
}

impl HealthStatus {
    pub fn from_margin(margin: f64) -> Self {
        if margin > HEALTHY_MARGIN_THRESHOLD {
            HealthStatus::Healthy
        } else {
            HealthStatus::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "Healthy",
            HealthStatus::Critical => "Critical",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary figures derived from one upload. All values are plain floats.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub revenue: f64,
    pub expenses: f64,
    pub net_profit: f64,
    pub margin: f64,
    pub health_status: HealthStatus,
}

/// A persisted analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub file_count: i64,
    pub revenue: f64,
    pub expenses: f64,
    pub net_profit: f64,
    pub margin: f64,
    pub health_status: String,
    pub ai_analysis: String,
}

/// Insert payload for the `reports` table.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub file_count: i64,
    pub revenue: f64,
    pub expenses: f64,
    pub net_profit: f64,
    pub margin: f64,
    pub health_status: HealthStatus,
    pub ai_analysis: String,
}

impl NewReport {
    pub fn from_metrics(file_count: usize, metrics: &Metrics, ai_analysis: &str) -> Self {
        NewReport {
            file_count: file_count as i64,
            revenue: metrics.revenue,
            expenses: metrics.expenses,
            net_profit: metrics.net_profit,
            margin: metrics.margin,
            health_status: metrics.health_status,
            ai_analysis: ai_analysis.to_string(),
        }
    }
}

/// Result of persisting a report. A failed save is not an error for the
/// caller; it decides how to degrade.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved(i64),
    Failed(String),
}

impl SaveOutcome {
    pub fn report_id(&self) -> i64 {
        match self {
            SaveOutcome::Saved(id) => *id,
            SaveOutcome::Failed(_) => UNSAVED_REPORT_ID,
        }
    }
}
