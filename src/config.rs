use std::path::PathBuf;

pub const DEFAULT_LABEL: &str = "request_report";

/// Settings for one reporting run, resolved by the binary from its
/// command line and environment.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub input: PathBuf,
    pub out_dir: PathBuf,
    pub label: String,
    pub preview_rows: usize,
    pub show_progress: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("stats.json"),
            out_dir: PathBuf::from("."),
            label: DEFAULT_LABEL.to_string(),
            preview_rows: 5,
            show_progress: true,
        }
    }
}

impl ReportConfig {
    /// Keep the label usable as a filename stem.
    pub fn sanitized_label(label: &str) -> String {
        let cleaned: String = label
            .trim()
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        if cleaned.is_empty() {
            DEFAULT_LABEL.to_string()
        } else {
            cleaned
        }
    }
}
