use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Test type owned by a suite (API / UI / business flow)
///
/// A case has no type of its own: executor dispatch is decided entirely by
/// the category of the suite the case belongs to, so moving a case between
/// suites changes how it runs without any edit to the case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SuiteCategory {
    Api,
    Ui,
    Business,
}

impl SuiteCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuiteCategory::Api => "API",
            SuiteCategory::Ui => "UI",
            SuiteCategory::Business => "BUSINESS",
        }
    }
}

impl std::fmt::Display for SuiteCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A test suite: named group of cases sharing one category
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSuite {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: SuiteCategory,
    /// Ordered case ids belonging to this suite
    #[serde(default)]
    pub case_ids: Vec<String>,
}

/// A single test case. `config` is opaque JSON text interpreted by the
/// executor selected for the owning suite.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub id: String,
    pub suite_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// JSON-encoded request template, assertions, extractors, timeout, retries
    pub config: String,
}

/// Target environment descriptor for a run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestEnvironment {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub ui_base_url: Option<String>,
    #[serde(default)]
    pub auth_config: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Persisted global variable, unique by (name, environment id)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalVariable {
    pub id: String,
    pub name: String,
    pub value: serde_json::Value,
    pub environment_id: String,
    #[serde(default)]
    pub encrypted: bool,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle status of one suite run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// One recorded execution of a suite. The aggregator reads `raw_output` and
/// `status` but never mutates a stored record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub id: String,
    pub suite_id: String,
    #[serde(default)]
    pub suite_name: Option<String>,
    #[serde(default)]
    pub environment_id: Option<String>,
    pub status: RunStatus,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Raw per-run output: structured `{"results":[...]}` JSON for runs
    /// written by this engine, free text for legacy writers
    #[serde(default)]
    pub raw_output: Option<String>,
}

impl RunRecord {
    /// Wall-clock duration in milliseconds, when both timestamps are set
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}
