//! Multi-run aggregation: comprehensive, trend and performance rollups.
//!
//! Accounting here is status-based: a run whose raw output is malformed
//! still counts toward totals (its status is what it is), it just never
//! contributes case-level numbers. Aggregation reads run state snapshot-style
//! and never mutates the records.

use super::parse;
use super::types::{
    round2, DailyTrend, PerformanceMetrics, PerformanceReport, Report, ReportDetail,
    ReportSummary, TrendReport, STATUS_FAILED, STATUS_PASSED,
};
use crate::model::{RunRecord, RunStatus};
use crate::store::RunStore;
use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use std::sync::Arc;

/// Report-generation facade over the run store
pub struct ResultAggregator {
    runs: Arc<dyn RunStore>,
}

impl ResultAggregator {
    pub fn new(runs: Arc<dyn RunStore>) -> Self {
        Self { runs }
    }

    /// Single-run report for a stored run record
    pub fn generate_report(&self, run_id: &str) -> anyhow::Result<Report> {
        let run = self
            .runs
            .get(run_id)
            .ok_or_else(|| anyhow::anyhow!("run record not found: {}", run_id))?;
        Ok(parse::generate_report(&run))
    }

    /// Summary across every run of a suite inside an optional time window
    /// (inclusive lower bound, exclusive upper bound)
    pub fn generate_comprehensive_report(
        &self,
        suite_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Report {
        let runs: Vec<RunRecord> = self
            .runs
            .list_by_suite(suite_id)
            .into_iter()
            .filter(|run| in_window(run, start, end))
            .collect();
        comprehensive_from_runs(suite_id, &runs)
    }

    /// Per-day pass/fail buckets over the trailing `days` window
    pub fn generate_trend_report(&self, suite_id: &str, days: u32) -> TrendReport {
        trend_report_at(
            suite_id,
            days,
            &self.runs.list_by_suite(suite_id),
            Local::now().date_naive(),
        )
    }

    /// Min/max/avg wall-clock duration over the trailing `days` window
    pub fn generate_performance_report(&self, suite_id: &str, days: u32) -> PerformanceReport {
        performance_report_at(
            suite_id,
            days,
            &self.runs.list_by_suite(suite_id),
            Local::now().date_naive(),
        )
    }
}

/// Window check: inclusive lower bound, exclusive upper ("isBefore"
/// semantics, so a run exactly at `end` is excluded). A run without a start
/// timestamp is excluded as soon as either bound is set.
fn in_window(run: &RunRecord, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> bool {
    match run.start_time {
        Some(started) => {
            start.map_or(true, |s| started >= s) && end.map_or(true, |e| started < e)
        }
        None => start.is_none() && end.is_none(),
    }
}

fn run_status_label(status: RunStatus) -> String {
    match status {
        RunStatus::Completed => STATUS_PASSED.to_string(),
        RunStatus::Failed => STATUS_FAILED.to_string(),
        other => serde_json::to_value(other)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default(),
    }
}

fn comprehensive_from_runs(suite_id: &str, runs: &[RunRecord]) -> Report {
    let mut summary = ReportSummary {
        total_tests: runs.len() as u32,
        ..Default::default()
    };
    let mut total_duration_ms: i64 = 0;
    let mut details = Vec::with_capacity(runs.len());

    for run in runs {
        // Runs in other statuses count toward totals only
        match run.status {
            RunStatus::Completed => summary.passed_tests += 1,
            RunStatus::Failed => summary.failed_tests += 1,
            _ => {}
        }
        if let Some(duration) = run.duration_ms() {
            total_duration_ms += duration;
        }

        let mut detail = ReportDetail::new(
            run.suite_name
                .clone()
                .unwrap_or_else(|| format!("Execution {}", run.id)),
            run_status_label(run.status),
            run.duration_ms().unwrap_or(0),
        );
        detail.test_case_id = Some(run.id.clone());
        detail.timestamp = run.start_time.map(|t| t.to_rfc3339());
        details.push(detail);
    }

    summary.pass_rate = if summary.total_tests > 0 {
        round2(f64::from(summary.passed_tests) / f64::from(summary.total_tests) * 100.0)
    } else {
        0.0
    };
    // Average duration divides by the run count, not by the subset that
    // carries both timestamps
    summary.average_response_time_ms = if summary.total_tests > 0 {
        total_duration_ms / i64::from(summary.total_tests)
    } else {
        0
    };
    summary.start_time = runs
        .iter()
        .filter_map(|r| r.start_time)
        .min()
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();
    summary.end_time = runs
        .iter()
        .filter_map(|r| r.end_time)
        .max()
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();

    Report {
        id: uuid::Uuid::new_v4().to_string(),
        execution_id: None,
        suite_id: suite_id.to_string(),
        name: format!("Comprehensive report - {}", suite_id),
        summary,
        details,
        created_at: Utc::now(),
    }
}

/// Host-local calendar day a run started on
fn local_date(time: &DateTime<Utc>) -> NaiveDate {
    time.with_timezone(&Local).date_naive()
}

fn window_runs<'a>(runs: &'a [RunRecord], days: u32, today: NaiveDate) -> Vec<&'a RunRecord> {
    // A zero-day window admits nothing; the filter below would otherwise
    // behave like a one-day window with no bucket to put the run in
    if days == 0 {
        return Vec::new();
    }
    let first_day = today - Duration::days(i64::from(days.saturating_sub(1)));
    runs.iter()
        .filter(|run| {
            run.start_time
                .map(|t| {
                    let date = local_date(&t);
                    date >= first_day && date <= today
                })
                .unwrap_or(false)
        })
        .collect()
}

pub(super) fn trend_report_at(
    suite_id: &str,
    days: u32,
    runs: &[RunRecord],
    today: NaiveDate,
) -> TrendReport {
    let in_window = window_runs(runs, days, today);
    let first_day = today - Duration::days(i64::from(days.saturating_sub(1)));

    // Zero-filled buckets for every day of the window, oldest first
    let mut daily: Vec<DailyTrend> = (0..days)
        .map(|offset| DailyTrend {
            date: (first_day + Duration::days(i64::from(offset)))
                .format("%Y-%m-%d")
                .to_string(),
            total: 0,
            passed: 0,
            failed: 0,
        })
        .collect();

    for run in &in_window {
        let Some(started) = run.start_time else { continue };
        let date = local_date(&started);
        let index = (date - first_day).num_days() as usize;
        let bucket = &mut daily[index];
        bucket.total += 1;
        match run.status {
            RunStatus::Completed => bucket.passed += 1,
            RunStatus::Failed => bucket.failed += 1,
            _ => {}
        }
    }

    let total = in_window.len() as u32;
    let passed: u32 = daily.iter().map(|d| d.passed).sum();
    let durations: Vec<i64> = in_window.iter().filter_map(|r| r.duration_ms()).collect();

    TrendReport {
        suite_id: suite_id.to_string(),
        days,
        daily,
        success_rate: if total > 0 {
            round2(f64::from(passed) / f64::from(total) * 100.0)
        } else {
            0.0
        },
        average_execution_time_ms: if durations.is_empty() {
            0
        } else {
            durations.iter().sum::<i64>() / durations.len() as i64
        },
    }
}

pub(super) fn performance_report_at(
    suite_id: &str,
    days: u32,
    runs: &[RunRecord],
    today: NaiveDate,
) -> PerformanceReport {
    let in_window = window_runs(runs, days, today);
    let durations: Vec<i64> = in_window.iter().filter_map(|r| r.duration_ms()).collect();

    let metrics = match (durations.iter().min(), durations.iter().max()) {
        (Some(&min), Some(&max)) => Some(PerformanceMetrics {
            min_duration_ms: min,
            max_duration_ms: max,
            avg_duration_ms: durations.iter().sum::<i64>() / durations.len() as i64,
        }),
        _ => None,
    };

    PerformanceReport {
        suite_id: suite_id.to_string(),
        days,
        run_count: in_window.len() as u32,
        metrics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemRunStore;

    fn run(
        id: &str,
        status: RunStatus,
        start: Option<DateTime<Utc>>,
        duration_ms: Option<i64>,
    ) -> RunRecord {
        RunRecord {
            id: id.into(),
            suite_id: "suite-1".into(),
            suite_name: None,
            environment_id: None,
            status,
            start_time: start,
            end_time: match (start, duration_ms) {
                (Some(s), Some(d)) => Some(s + Duration::milliseconds(d)),
                _ => None,
            },
            raw_output: None,
        }
    }

    fn aggregator(runs: Vec<RunRecord>) -> ResultAggregator {
        let store = Arc::new(MemRunStore::new());
        for r in runs {
            store.save(r);
        }
        ResultAggregator::new(store)
    }

    #[test]
    fn window_upper_bound_is_exclusive() {
        let base = Utc::now();
        let agg = aggregator(vec![
            run("r1", RunStatus::Completed, Some(base), Some(100)),
            run(
                "r2",
                RunStatus::Completed,
                Some(base + Duration::seconds(60)),
                Some(100),
            ),
        ]);

        // r2 starts exactly at the upper bound and must be excluded
        let report = agg.generate_comprehensive_report(
            "suite-1",
            Some(base),
            Some(base + Duration::seconds(60)),
        );
        assert_eq!(report.summary.total_tests, 1);
        assert_eq!(report.details[0].test_case_id.as_deref(), Some("r1"));

        // Inclusive lower bound
        let report = agg.generate_comprehensive_report("suite-1", Some(base), None);
        assert_eq!(report.summary.total_tests, 2);
    }

    #[test]
    fn non_terminal_statuses_count_toward_totals_only() {
        let base = Utc::now();
        let agg = aggregator(vec![
            run("r1", RunStatus::Completed, Some(base), Some(100)),
            run("r2", RunStatus::Failed, Some(base), Some(300)),
            run("r3", RunStatus::Running, Some(base), None),
        ]);
        let report = agg.generate_comprehensive_report("suite-1", None, None);
        assert_eq!(report.summary.total_tests, 3);
        assert_eq!(report.summary.passed_tests, 1);
        assert_eq!(report.summary.failed_tests, 1);
        assert_eq!(report.summary.pass_rate, 33.33);
        // 400 ms of wall clock over 3 runs
        assert_eq!(report.summary.average_response_time_ms, 133);
        assert_eq!(report.details.len(), 3);
    }

    #[test]
    fn comprehensive_report_of_no_runs_is_all_zero() {
        let agg = aggregator(vec![]);
        let report = agg.generate_comprehensive_report("suite-1", None, None);
        assert_eq!(report.summary.total_tests, 0);
        assert_eq!(report.summary.pass_rate, 0.0);
        assert!(report.details.is_empty());
    }

    #[test]
    fn trend_buckets_by_local_calendar_day() {
        let today = Local::now().date_naive();
        let now = Utc::now();
        let runs = vec![
            run("r1", RunStatus::Completed, Some(now), Some(100)),
            run("r2", RunStatus::Failed, Some(now), Some(200)),
            run("r3", RunStatus::Completed, Some(now - Duration::days(2)), Some(300)),
            // Outside the window
            run("r4", RunStatus::Completed, Some(now - Duration::days(30)), Some(500)),
        ];

        let trend = trend_report_at("suite-1", 7, &runs, today);
        assert_eq!(trend.daily.len(), 7);
        let window_total: u32 = trend.daily.iter().map(|d| d.total).sum();
        assert_eq!(window_total, 3);

        let today_bucket = trend.daily.last().unwrap();
        assert_eq!(today_bucket.date, today.format("%Y-%m-%d").to_string());
        assert_eq!(today_bucket.total, 2);
        assert_eq!(today_bucket.passed, 1);
        assert_eq!(today_bucket.failed, 1);

        assert_eq!(trend.success_rate, 66.67);
        assert_eq!(trend.average_execution_time_ms, 200);
    }

    #[test]
    fn zero_day_window_admits_no_runs() {
        let today = Local::now().date_naive();
        let runs = vec![run("r1", RunStatus::Completed, Some(Utc::now()), Some(100))];

        let trend = trend_report_at("suite-1", 0, &runs, today);
        assert!(trend.daily.is_empty());
        assert_eq!(trend.success_rate, 0.0);
        assert_eq!(trend.average_execution_time_ms, 0);

        let perf = performance_report_at("suite-1", 0, &runs, today);
        assert_eq!(perf.run_count, 0);
        assert!(perf.metrics.is_none());
    }

    #[test]
    fn trend_of_empty_window_is_zeroed() {
        let trend = trend_report_at("suite-1", 3, &[], Local::now().date_naive());
        assert_eq!(trend.daily.len(), 3);
        assert_eq!(trend.success_rate, 0.0);
        assert_eq!(trend.average_execution_time_ms, 0);
    }

    #[test]
    fn performance_metrics_span_windowed_durations() {
        let today = Local::now().date_naive();
        let now = Utc::now();
        let runs = vec![
            run("r1", RunStatus::Completed, Some(now), Some(120)),
            run("r2", RunStatus::Failed, Some(now), Some(480)),
            // Started but never finished: no duration
            run("r3", RunStatus::Running, Some(now), None),
        ];
        let perf = performance_report_at("suite-1", 7, &runs, today);
        assert_eq!(perf.run_count, 3);
        let metrics = perf.metrics.unwrap();
        assert_eq!(metrics.min_duration_ms, 120);
        assert_eq!(metrics.max_duration_ms, 480);
        assert_eq!(metrics.avg_duration_ms, 300);
    }

    #[test]
    fn performance_metrics_absent_without_timed_runs() {
        let today = Local::now().date_naive();
        let now = Utc::now();
        let runs = vec![run("r1", RunStatus::Running, Some(now), None)];
        let perf = performance_report_at("suite-1", 7, &runs, today);
        assert_eq!(perf.run_count, 1);
        assert!(perf.metrics.is_none());
    }
}
