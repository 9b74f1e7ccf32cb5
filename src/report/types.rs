//! Report data model. Reports are derived artifacts: created fresh on every
//! generation call and never updated in place. Summary and details are
//! serialized as independent JSON blobs when persisted, so the field set and
//! null-vs-absent semantics here are load-bearing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Detail status for results parsed from the structured format
pub const STATUS_PASSED: &str = "PASSED";
pub const STATUS_FAILED: &str = "FAILED";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,
    pub suite_id: String,
    pub name: String,
    pub summary: ReportSummary,
    pub details: Vec<ReportDetail>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_tests: u32,
    pub passed_tests: u32,
    pub failed_tests: u32,
    pub skipped_tests: u32,
    /// Percentage with two decimals; 0 when there are no tests
    pub pass_rate: f64,
    #[serde(rename = "averageResponseTime")]
    pub average_response_time_ms: i64,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
}

impl ReportSummary {
    /// Fill rate and average from the counters, guarding the zero case
    pub fn finish(&mut self, total_time_ms: i64) {
        self.pass_rate = if self.total_tests > 0 {
            round2(f64::from(self.passed_tests) / f64::from(self.total_tests) * 100.0)
        } else {
            0.0
        };
        self.average_response_time_ms = if self.total_tests > 0 {
            total_time_ms / i64::from(self.total_tests)
        } else {
            0
        };
    }
}

/// Round a percentage to two decimals
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One row of a report. For legacy-format input the status text is carried
/// through verbatim; the structured path normalizes to PASSED/FAILED.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_case_id: Option<String>,
    pub test_case_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_type: Option<String>,
    pub status: String,
    #[serde(rename = "responseTime")]
    pub response_time_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl ReportDetail {
    pub fn new(name: impl Into<String>, status: impl Into<String>, response_time_ms: i64) -> Self {
        Self {
            test_case_id: None,
            test_case_name: name.into(),
            test_type: None,
            status: status.into(),
            response_time_ms,
            message: None,
            error_message: None,
            error_details: None,
            metadata: None,
            timestamp: None,
        }
    }
}

/// Per-day trend bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTrend {
    /// Host-local calendar day, `YYYY-MM-DD`
    pub date: String,
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendReport {
    pub suite_id: String,
    pub days: u32,
    pub daily: Vec<DailyTrend>,
    /// Overall success rate across the window, percent with two decimals
    pub success_rate: f64,
    #[serde(rename = "averageExecutionTime")]
    pub average_execution_time_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub min_duration_ms: i64,
    pub max_duration_ms: i64,
    pub avg_duration_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    pub suite_id: String,
    pub days: u32,
    pub run_count: u32,
    /// Omitted entirely (not zeroed) when no run in the window carries both
    /// timestamps
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<PerformanceMetrics>,
}
