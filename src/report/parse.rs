//! Raw run output parsing: structured first, legacy free-text second.
//!
//! The two formats come from different historical writers and share no
//! version marker, so detection is try-then-fallback. Valid JSON of the
//! wrong shape falls through to the legacy scan exactly like malformed JSON
//! does. When both parses yield nothing the report is well-formed but
//! all-zero; aggregation never raises on bad input.

use super::types::{Report, ReportDetail, ReportSummary, STATUS_FAILED, STATUS_PASSED};
use crate::model::RunRecord;
use chrono::Utc;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::OnceLock;

/// Structured raw output: `{"results":[...]}` with one object per case
#[derive(Debug, Deserialize)]
struct RawResults {
    results: Vec<RawCaseResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCaseResult {
    #[serde(default)]
    test_case_id: Option<String>,
    #[serde(default)]
    test_case_name: Option<String>,
    #[serde(default)]
    test_type: Option<String>,
    #[serde(default)]
    success: bool,
    #[serde(default, rename = "executionTime")]
    execution_time: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    error_details: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    metadata: Option<Value>,
}

// Legacy writers logged one line per case:
//   测试用例 '<name>': 通过|失败 (耗时: <n> ms)
// ("test case '<name>': passed|failed (elapsed: <n> ms)")
fn legacy_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"测试用例 '(.+?)': (通过|失败) \(耗时: (\d+) ms\)").unwrap())
}

/// Parsed-out counters and rows, before the summary is finalized
#[derive(Debug, Default)]
pub struct ParsedOutput {
    pub summary: ReportSummary,
    pub details: Vec<ReportDetail>,
    total_time_ms: i64,
}

impl ParsedOutput {
    fn push(&mut self, passed: bool, time_ms: i64, detail: ReportDetail) {
        self.summary.total_tests += 1;
        if passed {
            self.summary.passed_tests += 1;
        } else {
            self.summary.failed_tests += 1;
        }
        self.total_time_ms += time_ms;
        self.details.push(detail);
    }

    fn finish(mut self) -> Self {
        let total = self.total_time_ms;
        self.summary.finish(total);
        self
    }
}

/// Parse raw run output in either format. Empty input and doubly-unparseable
/// input both come back as an all-zero result.
pub fn parse_raw_output(raw: &str) -> ParsedOutput {
    if raw.trim().is_empty() {
        return ParsedOutput::default().finish();
    }
    match parse_structured(raw) {
        Some(parsed) => parsed.finish(),
        None => parse_legacy(raw).finish(),
    }
}

fn parse_structured(raw: &str) -> Option<ParsedOutput> {
    let results: RawResults = serde_json::from_str(raw).ok()?;
    let mut parsed = ParsedOutput::default();
    for case in results.results {
        let status = if case.success { STATUS_PASSED } else { STATUS_FAILED };
        let mut detail = ReportDetail::new(
            case.test_case_name.unwrap_or_else(|| "unnamed".to_string()),
            status,
            case.execution_time,
        );
        detail.test_case_id = case.test_case_id;
        detail.test_type = case.test_type;
        detail.message = case.message;
        detail.error_message = case.error_message;
        detail.error_details = case.error_details;
        detail.timestamp = case.timestamp;
        detail.metadata = case.metadata;
        parsed.push(case.success, case.execution_time, detail);
    }
    Some(parsed)
}

fn parse_legacy(raw: &str) -> ParsedOutput {
    let mut parsed = ParsedOutput::default();
    for caps in legacy_pattern().captures_iter(raw) {
        let name = &caps[1];
        let status = &caps[2];
        // The pattern only admits digits; overly long numbers count as zero
        let time_ms: i64 = caps[3].parse().unwrap_or(0);
        let passed = status == "通过";
        // Legacy status text is carried through verbatim
        parsed.push(passed, time_ms, ReportDetail::new(name, status, time_ms));
    }
    if parsed.summary.total_tests == 0 {
        log::warn!("raw output matched neither the structured nor the legacy format");
    }
    parsed
}

/// Build a single-run report from a run record's raw output
pub fn generate_report(run: &RunRecord) -> Report {
    let parsed = parse_raw_output(run.raw_output.as_deref().unwrap_or(""));

    let mut summary = parsed.summary;
    summary.start_time = run.start_time.map(|t| t.to_rfc3339()).unwrap_or_default();
    summary.end_time = run.end_time.map(|t| t.to_rfc3339()).unwrap_or_default();

    Report {
        id: uuid::Uuid::new_v4().to_string(),
        execution_id: Some(run.id.clone()),
        suite_id: run.suite_id.clone(),
        name: format!("Execution report - {}", run.id),
        summary,
        details: parsed.details,
        created_at: Utc::now(),
    }
}
