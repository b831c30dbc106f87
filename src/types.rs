use serde::Serialize;
use serde_json::{Map, Value};
use tabled::Tabled;

/// Counts come straight from input, so sums clamp at `u64::MAX`.
pub fn saturating_sum(values: impl Iterator<Item = u64>) -> u64 {
    values.fold(0u64, u64::saturating_add)
}

/// One upstream record as handed over by the parsing collaborator: opaque
/// string keys bound to loosely-typed JSON values.
pub type RawRecord = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateRecord {
    pub month: String,
    pub requests: u64,
    pub closed: u64,
}

impl DateRecord {
    pub fn closure_rate(&self) -> f64 {
        crate::util::closure_rate(self.requests, self.closed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepartmentRecord {
    pub department: String,
    pub status: String,
    pub record_date: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthPoint {
    pub month: String,
    pub requests: u64,
    pub closed: u64,
    pub closure_rate: f64,
}

/// The trailing window of months, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MonthlySeries {
    pub points: Vec<MonthPoint>,
}

impl MonthlySeries {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn total_requests(&self) -> u64 {
        saturating_sum(self.points.iter().map(|p| p.requests))
    }

    pub fn total_closed(&self) -> u64 {
        saturating_sum(self.points.iter().map(|p| p.closed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// Opacity in percent, 0..=100.
    pub alpha_pct: u8,
}

impl StatusColor {
    pub const fn new(r: u8, g: u8, b: u8, alpha_pct: u8) -> Self {
        Self { r, g, b, alpha_pct }
    }

    pub fn to_css(&self) -> String {
        format!(
            "rgba({}, {}, {}, {})",
            self.r,
            self.g,
            self.b,
            f64::from(self.alpha_pct) / 100.0
        )
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn opacity(&self) -> f64 {
        f64::from(self.alpha_pct) / 100.0
    }
}

/// Department × status counts for the latest period.
///
/// `counts[d][s]` is the summed count for `departments[d]` and `statuses[s]`;
/// `colors` runs parallel to `statuses`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrossTab {
    pub departments: Vec<String>,
    pub statuses: Vec<String>,
    pub colors: Vec<StatusColor>,
    pub counts: Vec<Vec<u64>>,
}

impl CrossTab {
    pub fn is_empty(&self) -> bool {
        self.departments.is_empty()
    }

    pub fn cell(&self, department: &str, status: &str) -> u64 {
        let d = self.departments.iter().position(|x| x == department);
        let s = self.statuses.iter().position(|x| x == status);
        match (d, s) {
            (Some(d), Some(s)) => self.counts[d][s],
            _ => 0,
        }
    }

    pub fn department_totals(&self) -> Vec<u64> {
        self.counts
            .iter()
            .map(|row| saturating_sum(row.iter().copied()))
            .collect()
    }

    /// Per-status totals over the ranked departments, parallel to `statuses`.
    pub fn status_totals(&self) -> Vec<u64> {
        (0..self.statuses.len())
            .map(|s| saturating_sum(self.counts.iter().map(|row| row[s])))
            .collect()
    }

    pub fn color_of(&self, status: &str) -> Option<StatusColor> {
        self.statuses
            .iter()
            .position(|x| x == status)
            .map(|s| self.colors[s])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportModel {
    pub latest_month: Option<String>,
    pub monthly_series: MonthlySeries,
    pub cross_tab: CrossTab,
}

impl ReportModel {
    /// The all-empty sentinel shown as a neutral placeholder.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.latest_month.is_none() && self.monthly_series.is_empty() && self.cross_tab.is_empty()
    }
}

/// Counts of everything absorbed on the way from raw rows to a `ReportModel`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub date_rows_total: usize,
    pub date_rows_skipped: usize,
    pub department_rows_total: usize,
    pub department_rows_skipped: usize,
    pub rows_outside_period: usize,
    pub rows_field_swapped: usize,
    pub missing_anchor: bool,
    pub failed: bool,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct MonthlyRow {
    #[serde(rename = "date")]
    #[tabled(rename = "date")]
    pub date: String,
    #[serde(rename = "closed")]
    #[tabled(rename = "closed")]
    pub closed: u64,
    #[serde(rename = "totalRequests")]
    #[tabled(rename = "totalRequests")]
    pub total_requests: u64,
    #[serde(rename = "closureRatePercent")]
    #[tabled(rename = "closureRatePercent")]
    pub closure_rate_percent: f64,
}

impl From<&MonthPoint> for MonthlyRow {
    fn from(p: &MonthPoint) -> Self {
        Self {
            date: p.month.clone(),
            closed: p.closed,
            total_requests: p.requests,
            closure_rate_percent: crate::util::round2(p.closure_rate),
        }
    }
}
