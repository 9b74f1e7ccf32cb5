//! Report export: JSON as-is, CSV with a fixed six-column layout.

use super::types::Report;
use anyhow::Result;

const CSV_HEADER: [&str; 6] = [
    "Test Case ID",
    "Test Case Name",
    "Status",
    "Response Time (ms)",
    "Message",
    "Timestamp",
];

/// Serialize the report as pretty JSON
pub fn to_json(report: &Report) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Serialize the report details as CSV: fixed header, one row per detail.
/// Every field is quoted and embedded quotes are doubled per standard CSV
/// quoting, so messages survive round-tripping.
pub fn to_csv(report: &Report) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADER)?;
    for detail in &report.details {
        writer.write_record([
            detail.test_case_id.as_deref().unwrap_or(""),
            &detail.test_case_name,
            &detail.status,
            &detail.response_time_ms.to_string(),
            detail.message.as_deref().unwrap_or(""),
            detail.timestamp.as_deref().unwrap_or(""),
        ])?;
    }

    let bytes = writer.into_inner()?;
    Ok(String::from_utf8(bytes)?)
}
