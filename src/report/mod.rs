pub mod aggregate;
pub mod export;
pub mod parse;
pub mod types;

pub use aggregate::ResultAggregator;
pub use parse::{generate_report, parse_raw_output};
pub use types::{
    DailyTrend, PerformanceMetrics, PerformanceReport, Report, ReportDetail, ReportSummary,
    TrendReport,
};
