//! Export flow: single-flight gate, progress handle and cancellation around
//! the workbook and snapshot composers.
//!
//! State machine: `Idle → Rendering → {Composed → Saved, Failed} → Idle`.
//! Entry into `Rendering` is a compare-and-swap from `Idle`; a request that
//! loses the swap is rejected with `ExportError::Busy`, never queued.

use crate::config::ReportConfig;
use crate::error::ExportError;
use crate::output::{compose_workbook, export_filename, write_atomic};
use crate::snapshot::{compose_snapshot, RenderSurface};
use crate::types::ReportModel;
use chrono::{Local, NaiveDateTime};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExportState {
    Idle = 0,
    Rendering = 1,
    Composed = 2,
    Saved = 3,
    Failed = 4,
}

impl ExportState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => ExportState::Rendering,
            2 => ExportState::Composed,
            3 => ExportState::Saved,
            4 => ExportState::Failed,
            _ => ExportState::Idle,
        }
    }
}

#[derive(Debug)]
pub struct ExportGate {
    state: AtomicU8,
    last_outcome: AtomicU8,
}

impl Default for ExportGate {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(ExportState::Idle as u8),
            last_outcome: AtomicU8::new(ExportState::Idle as u8),
        }
    }
}

impl ExportGate {
    pub fn state(&self) -> ExportState {
        ExportState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// `Saved` or `Failed` for the most recent finished export, `Idle` before any.
    pub fn last_outcome(&self) -> ExportState {
        ExportState::from_u8(self.last_outcome.load(Ordering::Acquire))
    }

    pub fn try_begin(&self) -> Result<ExportTicket<'_>, ExportError> {
        self.state
            .compare_exchange(
                ExportState::Idle as u8,
                ExportState::Rendering as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|_| ExportError::Busy)?;
        debug!("export state: idle -> rendering");
        Ok(ExportTicket {
            gate: self,
            saved: false,
        })
    }

    fn set(&self, state: ExportState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Held for the whole of one export; dropping it returns the gate to `Idle`.
#[derive(Debug)]
pub struct ExportTicket<'a> {
    gate: &'a ExportGate,
    saved: bool,
}

impl ExportTicket<'_> {
    pub fn composed(&self) {
        self.gate.set(ExportState::Composed);
        debug!("export state: rendering -> composed");
    }

    pub fn saved(mut self) {
        self.gate.set(ExportState::Saved);
        self.saved = true;
        debug!("export state: composed -> saved");
    }
}

impl Drop for ExportTicket<'_> {
    fn drop(&mut self) {
        let outcome = if self.saved {
            ExportState::Saved
        } else {
            self.gate.set(ExportState::Failed);
            debug!("export state: -> failed");
            ExportState::Failed
        };
        self.gate.last_outcome.store(outcome as u8, Ordering::Release);
        self.gate.set(ExportState::Idle);
    }
}

/// Spinner shown for the duration of an export, cleared on drop.
pub struct ProgressHandle {
    bar: ProgressBar,
    active: Arc<AtomicUsize>,
}

impl ProgressHandle {
    pub fn acquire(message: &str, active: Arc<AtomicUsize>, visible: bool) -> Self {
        let bar = if visible {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg}") {
                pb.set_style(style);
            }
            pb.enable_steady_tick(Duration::from_millis(80));
            pb
        } else {
            ProgressBar::hidden()
        };
        bar.set_message(message.to_string());
        active.fetch_add(1, Ordering::AcqRel);
        Self { bar, active }
    }
}

impl Drop for ProgressHandle {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cloneable cancellation signal for an in-flight snapshot export.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Wall clock read when an export request arrives.
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

pub struct Exporter {
    out_dir: PathBuf,
    label: String,
    show_progress: bool,
    gate: ExportGate,
    active_progress: Arc<AtomicUsize>,
    clock: Clock,
}

impl Exporter {
    pub fn new(config: &ReportConfig) -> Self {
        Self {
            out_dir: config.out_dir.clone(),
            label: config.label.clone(),
            show_progress: config.show_progress,
            gate: ExportGate::default(),
            active_progress: Arc::new(AtomicUsize::new(0)),
            clock: Arc::new(|| Local::now().naive_local()),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn gate(&self) -> &ExportGate {
        &self.gate
    }

    /// Progress handles currently alive; `0` whenever no export is running.
    pub fn active_progress(&self) -> usize {
        self.active_progress.load(Ordering::Acquire)
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Stamped with the time of the request, not the time of the write.
    fn filename(&self, ext: &str) -> String {
        export_filename(&self.label, (self.clock)(), ext)
    }

    pub fn export_workbook(&self, model: &ReportModel) -> Result<PathBuf, ExportError> {
        let ticket = self.gate.try_begin()?;
        let filename = self.filename("xlsx");
        let result = compose_workbook(model).and_then(|bytes| {
            ticket.composed();
            write_atomic(&self.out_dir, &filename, &bytes)
        });
        finish("workbook", ticket, result)
    }

    pub async fn export_snapshot(
        &self,
        surface: Arc<dyn RenderSurface>,
        cancel: &CancelToken,
    ) -> Result<PathBuf, ExportError> {
        let ticket = self.gate.try_begin()?;
        let filename = self.filename("pdf");
        let _progress = ProgressHandle::acquire(
            "Rendering snapshot...",
            Arc::clone(&self.active_progress),
            self.show_progress,
        );
        let result = self.render_and_save(surface, cancel, &ticket, &filename).await;
        finish("snapshot", ticket, result)
    }

    async fn render_and_save(
        &self,
        surface: Arc<dyn RenderSurface>,
        cancel: &CancelToken,
        ticket: &ExportTicket<'_>,
        filename: &str,
    ) -> Result<PathBuf, ExportError> {
        if cancel.is_cancelled() {
            return Err(ExportError::Cancelled);
        }
        let worker = tokio::task::spawn_blocking(move || compose_snapshot(surface.as_ref()));
        let abort = worker.abort_handle();

        let document = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                // A blocking job cannot be interrupted; its result is discarded.
                abort.abort();
                return Err(ExportError::Cancelled);
            }
            joined = worker => joined.map_err(|e| ExportError::Worker(e.to_string()))??,
        };
        ticket.composed();

        if cancel.is_cancelled() {
            return Err(ExportError::Cancelled);
        }
        write_atomic(&self.out_dir, filename, &document)
    }
}

fn finish(
    kind: &str,
    ticket: ExportTicket<'_>,
    result: Result<PathBuf, ExportError>,
) -> Result<PathBuf, ExportError> {
    match &result {
        Ok(path) => {
            ticket.saved();
            info!(kind, path = %path.display(), "export saved");
        }
        Err(e) => {
            drop(ticket);
            warn!(kind, error = %e, "export failed");
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_is_single_flight() {
        let gate = ExportGate::default();
        let ticket = gate.try_begin().unwrap();
        assert_eq!(gate.state(), ExportState::Rendering);
        assert!(matches!(gate.try_begin(), Err(ExportError::Busy)));
        ticket.composed();
        assert_eq!(gate.state(), ExportState::Composed);
        ticket.saved();
        assert_eq!(gate.state(), ExportState::Idle);
        assert_eq!(gate.last_outcome(), ExportState::Saved);
        assert!(gate.try_begin().is_ok());
    }

    #[test]
    fn dropped_ticket_records_failure() {
        let gate = ExportGate::default();
        drop(gate.try_begin().unwrap());
        assert_eq!(gate.state(), ExportState::Idle);
        assert_eq!(gate.last_outcome(), ExportState::Failed);
    }

    #[test]
    fn progress_handle_releases_on_drop() {
        let active = Arc::new(AtomicUsize::new(0));
        {
            let _a = ProgressHandle::acquire("a", Arc::clone(&active), false);
            let _b = ProgressHandle::acquire("b", Arc::clone(&active), false);
            assert_eq!(active.load(Ordering::Acquire), 2);
        }
        assert_eq!(active.load(Ordering::Acquire), 0);
    }

    #[tokio::test]
    async fn cancel_wakes_waiters() {
        let token = CancelToken::new();
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.cancelled().await })
        };
        tokio::task::yield_now().await;
        token.cancel();
        waiter.await.unwrap();
        assert!(token.is_cancelled());
        // Already-cancelled tokens resolve immediately.
        token.cancelled().await;
    }
}
