//! Single entry point from raw upstream records to a `ReportModel`.
//!
//! Nothing here returns an error: malformed rows are skipped, a missing
//! anchor yields empty sections, and an unexpected input shape or a panic in
//! aggregation collapses to `ReportModel::empty()` with a logged diagnostic.

use crate::loader::{normalize_date_records, normalize_department_records, RawInput};
use crate::reports::{aggregate_cross_tab_with_stats, aggregate_monthly, latest_month};
use crate::types::{Diagnostics, ReportModel};
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use tracing::{info, warn};

pub fn build_report(raw_date_records: &[Value], raw_department_records: &[Value]) -> ReportModel {
    build_report_with_diagnostics(raw_date_records, raw_department_records).0
}

pub fn build_report_with_diagnostics(
    raw_date_records: &[Value],
    raw_department_records: &[Value],
) -> (ReportModel, Diagnostics) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        aggregate(raw_date_records, raw_department_records)
    }));
    match outcome {
        Ok(built) => built,
        Err(_) => {
            warn!("report aggregation failed; showing empty report");
            let diagnostics = Diagnostics {
                date_rows_total: raw_date_records.len(),
                department_rows_total: raw_department_records.len(),
                missing_anchor: true,
                failed: true,
                ..Default::default()
            };
            (ReportModel::empty(), diagnostics)
        }
    }
}

/// Build straight from the upstream collaborator's mapping.
pub fn build_report_from_value(input: Value) -> (ReportModel, Diagnostics) {
    match RawInput::from_value(input) {
        Ok(raw) => build_report_with_diagnostics(&raw.date_stats, &raw.department_stats),
        Err(e) => {
            warn!(error = %e, "unexpected input shape; showing empty report");
            let diagnostics = Diagnostics {
                missing_anchor: true,
                failed: true,
                ..Default::default()
            };
            (ReportModel::empty(), diagnostics)
        }
    }
}

fn aggregate(raw_date_records: &[Value], raw_department_records: &[Value]) -> (ReportModel, Diagnostics) {
    let (date_records, date_report) = normalize_date_records(raw_date_records);
    let (department_records, department_report) = normalize_department_records(raw_department_records);

    let latest = latest_month(&date_records);
    let monthly_series = aggregate_monthly(&date_records);
    let (cross_tab, tab_stats) = aggregate_cross_tab_with_stats(&department_records, latest.as_deref());

    let diagnostics = Diagnostics {
        date_rows_total: date_report.total_rows,
        date_rows_skipped: date_report.skipped_rows,
        department_rows_total: department_report.total_rows,
        department_rows_skipped: department_report.skipped_rows + tab_stats.incomplete,
        rows_outside_period: tab_stats.outside_period,
        rows_field_swapped: tab_stats.field_swapped,
        missing_anchor: latest.is_none(),
        failed: false,
    };
    info!(
        latest = latest.as_deref().unwrap_or("-"),
        months = monthly_series.len(),
        departments = cross_tab.departments.len(),
        skipped = diagnostics.date_rows_skipped + diagnostics.department_rows_skipped,
        "report built"
    );

    let model = ReportModel {
        latest_month: latest,
        monthly_series,
        cross_tab,
    };
    (model, diagnostics)
}
