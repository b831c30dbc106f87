// Entry point and high-level CLI flow.
//
// - Loads the upstream parser's JSON output and prints normalization
//   diagnostics.
// - Previews the monthly and department tables.
// - Runs the requested exports (workbook, snapshot PDF, JSON model).
use anyhow::{Context, Result};
use clap::Parser;
use request_report::output::{self, monthly_rows};
use request_report::util::format_int;
use request_report::{
    build_report_from_value, loader, CancelToken, DashboardSurface, Diagnostics, Exporter,
    ReportConfig, ReportModel,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "request_report", version, about = "Monthly request/closure dashboard exports")]
struct Cli {
    /// JSON file holding `date_stats` and `department_stats`.
    #[arg(long, short, env = "REPORT_INPUT")]
    input: PathBuf,

    #[arg(long, env = "REPORT_OUT_DIR", default_value = ".")]
    out_dir: PathBuf,

    /// Filename stem for exported files.
    #[arg(long, env = "REPORT_LABEL", default_value = request_report::config::DEFAULT_LABEL)]
    label: String,

    /// Write the two-sheet workbook.
    #[arg(long)]
    workbook: bool,

    /// Write the one-page snapshot PDF.
    #[arg(long)]
    snapshot: bool,

    /// Also dump the aggregated model as JSON.
    #[arg(long)]
    json: bool,

    #[arg(long, default_value_t = 5)]
    preview_rows: usize,

    /// Suppress the progress spinner.
    #[arg(long)]
    quiet: bool,
}

impl From<Cli> for ReportConfig {
    fn from(cli: Cli) -> Self {
        Self {
            input: cli.input,
            out_dir: cli.out_dir,
            label: ReportConfig::sanitized_label(&cli.label),
            preview_rows: cli.preview_rows,
            show_progress: !cli.quiet,
        }
    }
}

fn print_diagnostics(d: &Diagnostics) {
    println!(
        "Processing dataset... ({} date rows, {} department rows)",
        format_int(d.date_rows_total),
        format_int(d.department_rows_total)
    );
    println!(
        "Note: {} date rows and {} department rows skipped as incomplete.",
        format_int(d.date_rows_skipped),
        format_int(d.department_rows_skipped)
    );
    if d.rows_field_swapped > 0 {
        println!(
            "Info: Dropped {} rows with date-shaped department/status values.",
            format_int(d.rows_field_swapped)
        );
    }
    if d.failed {
        println!("Warning: input could not be aggregated; showing an empty report.");
    }
    println!();
}

fn print_previews(model: &ReportModel, max_rows: usize) {
    println!("Monthly Request Processing");
    println!("(Last {} months)\n", model.monthly_series.len());
    println!("{}\n", output::preview_table_rows(&monthly_rows(model), max_rows));

    match &model.latest_month {
        Some(month) => println!("Department Breakdown ({month})\n"),
        None => println!("Department Breakdown (no data)\n"),
    }
    println!("{}\n", output::preview_cross_tab(&model.cross_tab, max_rows));
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let (want_workbook, want_snapshot, want_json) = (cli.workbook, cli.snapshot, cli.json);
    let config = ReportConfig::from(cli);
    info!(input = %config.input.display(), "loading report input");

    let raw = loader::load_input(&config.input)
        .with_context(|| format!("Failed to load file: {}", config.input.display()))?;
    let (model, diagnostics) = build_report_from_value(raw);

    print_diagnostics(&diagnostics);
    print_previews(&model, config.preview_rows);

    let exporter = Exporter::new(&config);
    if want_workbook {
        match exporter.export_workbook(&model) {
            Ok(path) => println!("(Workbook exported to {})", path.display()),
            Err(e) => eprintln!("{}", e.user_message()),
        }
    }
    if want_snapshot {
        let cancel = CancelToken::new();
        let ctrl_c = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };
        let surface = Arc::new(DashboardSurface::from_model(&model));
        match exporter.export_snapshot(surface, &cancel).await {
            Ok(path) => println!("(Snapshot exported to {})", path.display()),
            Err(e) => eprintln!("{}", e.user_message()),
        }
        ctrl_c.abort();
    }
    if want_json {
        let filename = output::export_filename(&config.label, chrono::Local::now().naive_local(), "json");
        match output::write_json(exporter.out_dir(), &filename, &model) {
            Ok(path) => println!("(Model exported to {})", path.display()),
            Err(e) => eprintln!("{}", e.user_message()),
        }
    }
    Ok(())
}
