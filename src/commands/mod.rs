//! Command implementations

pub mod erase;
pub mod identify;
pub mod list;
pub mod read;
pub mod verify;
pub mod write;

use indicatif::{ProgressBar, ProgressStyle};
use qoobflash_core::{Error, OpKind, Programmer, ProgressSink, Result};
use qoobflash_usb::HidTransport;

/// Find, open, and identify the selected Qoob Pro.
pub fn open_programmer(index: usize, retries: u32) -> Result<Programmer<HidTransport>> {
    let transport = qoobflash_usb::open_nth(index)?;
    log::debug!("opened HID node {}", transport.path());
    let mut prog = Programmer::new(transport)?;
    prog.set_retry_budget(retries);
    Ok(prog)
}

pub fn io_error(e: std::io::Error) -> Error {
    Error::Io(e.to_string())
}

/// Progress reporter using indicatif progress bars, one bar per operation
/// phase (erase, write, verify).
pub struct IndicatifProgress {
    bar: Option<ProgressBar>,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        Self { bar: None }
    }
}

impl Default for IndicatifProgress {
    fn default() -> Self {
        Self::new()
    }
}

fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} {prefix:>6} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

impl ProgressSink for IndicatifProgress {
    fn begin(&mut self, op: OpKind, total_bytes: u64) {
        let bar = ProgressBar::new(total_bytes);
        bar.set_style(progress_style());
        bar.set_prefix(op.to_string());
        self.bar = Some(bar);
    }

    fn progress(&mut self, bytes_done: u64, _bytes_total: u64) {
        if let Some(bar) = &self.bar {
            bar.set_position(bytes_done);
        }
    }

    fn finish(&mut self, _op: OpKind) {
        if let Some(bar) = self.bar.take() {
            bar.finish();
        }
    }
}
