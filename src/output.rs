use crate::error::ExportError;
use crate::types::{CrossTab, MonthlyRow, ReportModel};
use chrono::NaiveDateTime;
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, Worksheet, XlsxError};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tabled::{builder::Builder, settings::Style, Table, Tabled};

pub const MONTHLY_SHEET: &str = "monthly";
pub const DEPARTMENT_SHEET: &str = "department";
const MONTHLY_HEADERS: [&str; 4] = ["date", "closed", "totalRequests", "closureRatePercent"];
/// Columns per worksheet in the xlsx format.
const COLUMN_LIMIT: u16 = 16_384;

/// `<label>_<YYYYMMDD_HHmm>.<ext>`
pub fn export_filename(label: &str, at: NaiveDateTime, ext: &str) -> String {
    format!("{}_{}.{}", label, at.format("%Y%m%d_%H%M"), ext)
}

pub fn monthly_rows(model: &ReportModel) -> Vec<MonthlyRow> {
    model.monthly_series.points.iter().map(MonthlyRow::from).collect()
}

fn header_format() -> Format {
    Format::new()
        .set_bold()
        .set_align(FormatAlign::Center)
        .set_border_bottom(FormatBorder::Thin)
}

/// Two-sheet workbook: the monthly series and the department × status table.
pub fn compose_workbook(model: &ReportModel) -> Result<Vec<u8>, ExportError> {
    let mut wb = Workbook::new();
    write_monthly(wb.add_worksheet(), model)?;
    write_departments(wb.add_worksheet(), &model.cross_tab)?;
    Ok(wb.save_to_buffer()?)
}

fn write_monthly(ws: &mut Worksheet, model: &ReportModel) -> Result<(), XlsxError> {
    ws.set_name(MONTHLY_SHEET)?;
    let hdr = header_format();
    let pct = Format::new().set_num_format("0.00");

    for (col, h) in (0u16..).zip(MONTHLY_HEADERS) {
        ws.write_string_with_format(0, col, h, &hdr)?;
    }
    for (i, row) in monthly_rows(model).iter().enumerate() {
        let r = (i + 1) as u32;
        ws.write_string(r, 0, &row.date)?;
        ws.write_number(r, 1, row.closed as f64)?;
        ws.write_number(r, 2, row.total_requests as f64)?;
        ws.write_number_with_format(r, 3, row.closure_rate_percent, &pct)?;
    }

    ws.set_freeze_panes(1, 0)?;
    ws.set_column_width(0, 12)?;
    for col in 1u16..=3 {
        ws.set_column_width(col, 20)?;
    }
    Ok(())
}

/// Worksheet column for the `index`-th status; column 0 holds the department.
fn status_column(index: usize) -> Result<u16, XlsxError> {
    index
        .checked_add(1)
        .and_then(|c| u16::try_from(c).ok())
        .filter(|c| *c < COLUMN_LIMIT)
        .ok_or(XlsxError::RowColumnLimitError)
}

fn write_departments(ws: &mut Worksheet, tab: &CrossTab) -> Result<(), XlsxError> {
    ws.set_name(DEPARTMENT_SHEET)?;
    let hdr = header_format();

    ws.write_string_with_format(0, 0, "department", &hdr)?;
    for (s, status) in tab.statuses.iter().enumerate() {
        ws.write_string_with_format(0, status_column(s)?, status, &hdr)?;
    }
    for (d, department) in tab.departments.iter().enumerate() {
        let r = (d + 1) as u32;
        ws.write_string(r, 0, department)?;
        for (s, count) in tab.counts[d].iter().enumerate() {
            ws.write_number(r, status_column(s)?, *count as f64)?;
        }
    }

    ws.set_freeze_panes(1, 1)?;
    ws.set_column_width(0, 24)?;
    Ok(())
}

/// Write `bytes` to `dir/filename` through a temp file that is renamed into
/// place only once fully written.
pub fn write_atomic(dir: &Path, filename: &str, bytes: &[u8]) -> Result<PathBuf, ExportError> {
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    let path = dir.join(filename);
    tmp.persist(&path)?;
    Ok(path)
}

pub fn write_json<T: Serialize>(dir: &Path, filename: &str, value: &T) -> Result<PathBuf, ExportError> {
    let s = serde_json::to_string_pretty(value).map_err(|e| ExportError::Io(e.into()))?;
    write_atomic(dir, filename, s.as_bytes())
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize) -> String
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        return "(no rows)".to_string();
    }
    Table::new(slice).with(Style::markdown()).to_string()
}

pub fn preview_cross_tab(tab: &CrossTab, max_rows: usize) -> String {
    if tab.is_empty() {
        return "(no rows)".to_string();
    }
    let mut builder = Builder::default();
    builder.push_record(std::iter::once("department".to_string()).chain(tab.statuses.iter().cloned()));
    for (d, department) in tab.departments.iter().enumerate().take(max_rows) {
        builder.push_record(
            std::iter::once(department.clone()).chain(tab.counts[d].iter().map(|c| c.to_string())),
        );
    }
    builder.build().with(Style::markdown()).to_string()
}
