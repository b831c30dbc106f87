//! Aggregation and export engine for request/closure dashboards.
//!
//! Raw date and department records from the upstream spreadsheet parser are
//! normalized (`loader`), bucketed into a trailing monthly series and a
//! latest-month department × status cross-tab (`reports`), assembled by
//! `facade`, and exported as a two-sheet workbook or a one-page snapshot PDF
//! (`output`, `snapshot`, `export`).

pub mod config;
pub mod error;
pub mod export;
pub mod facade;
pub mod loader;
pub mod output;
pub mod palette;
pub mod reports;
pub mod snapshot;
pub mod types;
pub mod util;

pub use config::ReportConfig;
pub use error::{ExportError, ReportError};
pub use export::{CancelToken, ExportGate, ExportState, Exporter};
pub use facade::{build_report, build_report_from_value, build_report_with_diagnostics};
pub use snapshot::{DashboardSurface, RenderSurface, SvgSurface};
pub use types::{CrossTab, DateRecord, DepartmentRecord, Diagnostics, MonthlySeries, ReportModel};
