use crate::palette::status_color;
use crate::types::{CrossTab, DateRecord, DepartmentRecord, MonthPoint, MonthlySeries};
use crate::util::{canonical_month, closure_rate, is_date_shaped, month_sort_key};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Trailing window of the monthly series.
pub const SERIES_WINDOW: usize = 12;
/// Departments kept in the cross-tab.
pub const TOP_DEPARTMENTS: usize = 10;

/// Most recent month by chronological order, `None` for no records.
pub fn latest_month(records: &[DateRecord]) -> Option<String> {
    records
        .iter()
        .map(|r| r.month.as_str())
        .max_by(|a, b| month_sort_key(a).cmp(&month_sort_key(b)))
        .map(str::to_string)
}

pub fn aggregate_monthly(records: &[DateRecord]) -> MonthlySeries {
    let mut merged: HashMap<&str, (u64, u64)> = HashMap::new();
    for r in records {
        let e = merged.entry(r.month.as_str()).or_insert((0, 0));
        e.0 = e.0.saturating_add(r.requests);
        e.1 = e.1.saturating_add(r.closed);
    }

    let mut rows: Vec<(&str, u64, u64)> = merged
        .into_iter()
        .map(|(month, (requests, closed))| (month, requests, closed))
        .collect();
    // Month labels are unique after the merge, so this order is total.
    rows.sort_by(|a, b| month_sort_key(b.0).cmp(&month_sort_key(a.0)));
    rows.truncate(SERIES_WINDOW);
    rows.reverse();

    MonthlySeries {
        points: rows
            .into_iter()
            .map(|(month, requests, closed)| MonthPoint {
                month: month.to_string(),
                requests,
                closed,
                closure_rate: closure_rate(requests, closed),
            })
            .collect(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrossTabStats {
    pub outside_period: usize,
    pub field_swapped: usize,
    pub incomplete: usize,
}

/// Whether a record date falls in the anchor month.
///
/// Plain prefix match first; otherwise both sides are compared as
/// canonical `YYYY-MM` so `2024/01/05` still lands in `2024-01`.
fn in_period(record_date: &str, latest: &str) -> bool {
    record_date.starts_with(latest) || canonical_month(record_date) == latest
}

pub fn aggregate_cross_tab(records: &[DepartmentRecord], latest: Option<&str>) -> CrossTab {
    aggregate_cross_tab_with_stats(records, latest).0
}

pub fn aggregate_cross_tab_with_stats(
    records: &[DepartmentRecord],
    latest: Option<&str>,
) -> (CrossTab, CrossTabStats) {
    let mut stats = CrossTabStats::default();
    let Some(latest) = latest else {
        info!("no latest month; department breakdown is empty");
        return (CrossTab::default(), stats);
    };

    struct Acc<'a> {
        department: &'a str,
        by_status: HashMap<&'a str, u64>,
        total: u64,
    }

    let mut accs: Vec<Acc> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut statuses: Vec<&str> = Vec::new();
    let mut seen_statuses: HashSet<&str> = HashSet::new();

    for r in records {
        if !in_period(&r.record_date, latest) {
            stats.outside_period += 1;
            continue;
        }
        let (department, status) = (r.department.trim(), r.status.trim());
        if department.is_empty() || status.is_empty() {
            stats.incomplete += 1;
            continue;
        }
        if is_date_shaped(department) || is_date_shaped(status) {
            debug!(department, status, "dropping date-shaped department/status");
            stats.field_swapped += 1;
            continue;
        }

        if seen_statuses.insert(status) {
            statuses.push(status);
        }
        let slot = *index.entry(department).or_insert_with(|| {
            accs.push(Acc {
                department,
                by_status: HashMap::new(),
                total: 0,
            });
            accs.len() - 1
        });
        let acc = &mut accs[slot];
        let cell = acc.by_status.entry(status).or_insert(0);
        *cell = cell.saturating_add(r.count);
        acc.total = acc.total.saturating_add(r.count);
    }

    // Stable: equal totals keep first-encounter order.
    accs.sort_by(|a, b| b.total.cmp(&a.total));
    accs.truncate(TOP_DEPARTMENTS);

    let counts = accs
        .iter()
        .map(|acc| {
            statuses
                .iter()
                .map(|s| acc.by_status.get(s).copied().unwrap_or(0))
                .collect()
        })
        .collect();

    if stats.field_swapped > 0 {
        info!(rows = stats.field_swapped, "dropped rows with swapped department/status columns");
    }

    let tab = CrossTab {
        departments: accs.iter().map(|a| a.department.to_string()).collect(),
        colors: statuses.iter().map(|s| status_color(s)).collect(),
        statuses: statuses.into_iter().map(str::to_string).collect(),
        counts,
    };
    (tab, stats)
}
