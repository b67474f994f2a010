//! Flash programming state machine.
//!
//! The programmer sequences multi-step operations (erase, write, read,
//! verify) on top of the protocol codec, enforcing page/sector alignment and
//! the retry policy. It owns the only handle to the device for the session;
//! callers wanting concurrency must serialize around the programmer, not
//! inside it.
//!
//! Failure policy: transport-level errors (timeout, bad checksum) are retried
//! at single-command granularity; logical errors (blank-check failure,
//! read-back mismatch) at single-page/sector granularity. Exhausting the
//! budget aborts the whole operation with the exact stage and address, so a
//! caller can resume from there instead of restarting.

use std::ops::Range;
use std::time::Duration;

use crate::device::{self, DeviceInfo};
use crate::error::{Error, Result, Stage};
use crate::image::FlashImage;
use crate::progress::{CancelToken, OpKind, ProgressSink};
use crate::protocol::{Exchange, Operation, ProtocolTable, QOOB_PRO_V1};
use crate::transport::{Transport, DEFAULT_TIMEOUT};

/// Default attempts per command/page/sector before giving up.
pub const DEFAULT_RETRY_BUDGET: u32 = 3;

/// How often a failing command, page, or sector is attempted.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts (not re-tries); always at least 1
    pub budget: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            budget: DEFAULT_RETRY_BUDGET,
        }
    }
}

/// Drives one Qoob Pro for the duration of a session.
pub struct Programmer<T: Transport> {
    transport: T,
    table: &'static ProtocolTable,
    info: DeviceInfo,
    retry: RetryPolicy,
    timeout: Duration,
    cancel: CancelToken,
    bus_held: bool,
}

impl<T: Transport> Programmer<T> {
    /// Identify the device on `transport` and wrap it in a programmer.
    ///
    /// The identification handshake runs before anything else; no flash
    /// operation is possible without the geometry it reports.
    pub fn new(transport: T) -> Result<Self> {
        Self::with_table(transport, &QOOB_PRO_V1)
    }

    /// Like [`Programmer::new`] with an explicit compatibility table.
    pub fn with_table(mut transport: T, table: &'static ProtocolTable) -> Result<Self> {
        let retry = RetryPolicy::default();
        let payload = command(
            &mut transport,
            table,
            &Operation::Ident,
            DEFAULT_TIMEOUT,
            retry.budget,
            Stage::Identify,
            0,
        )?;
        let info = device::parse_ident_payload(&payload, table)?;

        log::info!(
            "identified Qoob Pro: protocol v{}, {} KiB flash, {} sectors of {} KiB, {} byte pages",
            info.protocol_version,
            info.geometry.total_size / 1024,
            info.geometry.sector_count(),
            info.geometry.sector_size / 1024,
            info.geometry.page_size,
        );

        Ok(Self {
            transport,
            table,
            info,
            retry,
            timeout: DEFAULT_TIMEOUT,
            cancel: CancelToken::new(),
            bus_held: false,
        })
    }

    /// Device info from the identification handshake, cached for the session.
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Protocol table the session speaks.
    pub fn table(&self) -> &'static ProtocolTable {
        self.table
    }

    /// Attempts per command/page/sector. Clamped to at least 1.
    pub fn set_retry_budget(&mut self, budget: u32) {
        self.retry.budget = budget.max(1);
    }

    /// Per-exchange response timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// A token that cancels in-flight operations at the next page/sector
    /// boundary. Clone it into whatever watches for interruption.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Erase a range of sectors in ascending address order.
    ///
    /// Every sector is blank-checked after its erase; a sector that still
    /// holds data after the retry budget is fatal, since programming on top
    /// of a half-erased sector would corrupt the result.
    pub fn erase(&mut self, sectors: Range<u32>, sink: &mut dyn ProgressSink) -> Result<()> {
        let geom = self.info.geometry;
        if sectors.start >= sectors.end || sectors.end > geom.sector_count() {
            // widen before multiplying: a bogus range can exceed u32
            let span = sectors.end.saturating_sub(sectors.start) as u64;
            return Err(Error::OutOfBounds {
                address: sectors.start.saturating_mul(geom.sector_size),
                len: (span * geom.sector_size as u64).min(usize::MAX as u64) as usize,
            });
        }

        let total = (sectors.len() as u64) * geom.sector_size as u64;
        sink.begin(OpKind::Erase, total);

        let range = sectors.clone();
        self.with_bus(|p| {
            let mut done = 0u64;
            for sector in range {
                p.check_cancel()?;
                p.erase_sector(sector)?;
                done += geom.sector_size as u64;
                sink.progress(done, total);
            }
            Ok(())
        })?;

        sink.finish(OpKind::Erase);
        Ok(())
    }

    /// Program an image, page by page.
    ///
    /// The image is split into page-aligned chunks (the final partial page is
    /// zero-padded). Each page is written and immediately read back and
    /// compared before the next page is attempted; a page is never skipped.
    /// The target range must have been erased beforehand.
    pub fn write(&mut self, image: &FlashImage, sink: &mut dyn ProgressSink) -> Result<()> {
        if image.is_empty() {
            return Err(Error::EmptyImage);
        }
        let geom = self.info.geometry;
        geom.check_page_aligned(image.base())?;
        geom.check_bounds(image.base(), image.len())?;

        let total = image.len() as u64;
        sink.begin(OpKind::Write, total);

        self.with_bus(|p| {
            let mut done = 0u64;
            for (addr, page) in image.pages(geom.page_size) {
                p.check_cancel()?;
                p.program_page(addr, &page)?;
                done = (done + geom.page_size as u64).min(total);
                sink.progress(done, total);
            }
            Ok(())
        })?;

        sink.finish(OpKind::Write);
        Ok(())
    }

    /// Read `len` bytes starting at the page-aligned address `addr`.
    ///
    /// One read command per page, reassembled in address order. No
    /// verification happens here; that is the caller's call.
    pub fn read(&mut self, addr: u32, len: u32, sink: &mut dyn ProgressSink) -> Result<FlashImage> {
        let geom = self.info.geometry;
        geom.check_page_aligned(addr)?;
        geom.check_bounds(addr, len as usize)?;

        sink.begin(OpKind::Read, len as u64);

        let data = self.with_bus(|p| {
            let mut data = Vec::with_capacity(len as usize);
            let mut offset = 0u32;
            while offset < len {
                p.check_cancel()?;
                let chunk = geom.page_size.min(len - offset);
                let page_addr = addr + offset;
                let page = p.command(
                    &Operation::Read {
                        addr: page_addr,
                        len: chunk as u16,
                    },
                    Stage::Read,
                    page_addr,
                )?;
                data.extend_from_slice(&page);
                offset += chunk;
                sink.progress(offset as u64, len as u64);
            }
            Ok(data)
        })?;

        sink.finish(OpKind::Read);
        Ok(FlashImage::new(addr, data))
    }

    /// Compare flash contents against `image` without writing anything.
    pub fn verify(&mut self, image: &FlashImage, sink: &mut dyn ProgressSink) -> Result<()> {
        let geom = self.info.geometry;
        geom.check_page_aligned(image.base())?;
        geom.check_bounds(image.base(), image.len())?;

        let total = image.len() as u64;
        sink.begin(OpKind::Verify, total);

        self.with_bus(|p| {
            let base = image.base();
            let expected = image.data();
            let mut offset = 0usize;
            while offset < expected.len() {
                p.check_cancel()?;
                let chunk = (geom.page_size as usize).min(expected.len() - offset);
                let page_addr = base + offset as u32;
                let actual = p.command(
                    &Operation::Read {
                        addr: page_addr,
                        len: chunk as u16,
                    },
                    Stage::Verify,
                    page_addr,
                )?;
                if let Some((i, exp, act)) = first_diff(&expected[offset..offset + chunk], &actual)
                {
                    return Err(Error::VerifyMismatch {
                        address: page_addr + i as u32,
                        expected: exp,
                        actual: act,
                    });
                }
                offset += chunk;
                sink.progress(offset as u64, total);
            }
            Ok(())
        })?;

        sink.finish(OpKind::Verify);
        Ok(())
    }

    // -------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------

    /// Hold the flash bus for the duration of `f`.
    ///
    /// The GameCube side cannot touch flash while the host holds the bus, and
    /// flash commands fail without it. The release runs on the error path
    /// too; the operation's own error wins over a release failure.
    fn with_bus<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        match self.command(&Operation::Bus { acquire: true }, Stage::BusAcquire, 0) {
            Ok(_) => self.bus_held = true,
            // Busy bit set: the console side holds the bus
            Err(Error::Device { status }) if status & 0x02 != 0 => return Err(Error::Busy),
            Err(e) => return Err(e),
        }

        let result = f(self);
        let release = self.command(&Operation::Bus { acquire: false }, Stage::BusRelease, 0);
        if release.is_ok() {
            self.bus_held = false;
        }

        match (result, release) {
            (Ok(value), Ok(_)) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), _) => Err(e),
        }
    }

    /// Erase one sector and confirm it reads back blank, retrying the
    /// erase+blank-check pair up to the budget.
    fn erase_sector(&mut self, sector: u32) -> Result<()> {
        let geom = self.info.geometry;
        let addr = sector * geom.sector_size;

        let mut attempt = 0;
        loop {
            attempt += 1;
            self.command(
                &Operation::Erase {
                    sector: sector as u8,
                },
                Stage::Erase,
                addr,
            )?;

            match self.blank_check(sector)? {
                None => return Ok(()),
                Some((bad_addr, found)) => {
                    log::warn!(
                        "sector {} blank-check failed at 0x{:06X} (found 0x{:02X}), attempt {}/{}",
                        sector,
                        bad_addr,
                        found,
                        attempt,
                        self.retry.budget
                    );
                    if attempt >= self.retry.budget {
                        return Err(Error::BlankCheckFailed { sector });
                    }
                }
            }
        }
    }

    /// Scan a sector for the first non-erased byte. `None` means blank.
    fn blank_check(&mut self, sector: u32) -> Result<Option<(u32, u8)>> {
        let geom = self.info.geometry;
        let start = sector * geom.sector_size;

        for page in 0..geom.pages_per_sector() {
            let addr = start + page * geom.page_size;
            let data = self.command(
                &Operation::Read {
                    addr,
                    len: geom.page_size as u16,
                },
                Stage::BlankCheck,
                addr,
            )?;
            if let Some(i) = data.iter().position(|&b| b != self.table.erase_value) {
                return Ok(Some((addr + i as u32, data[i])));
            }
        }
        Ok(None)
    }

    /// Write one page and read it straight back, retrying the pair on
    /// mismatch. Undetected corruption is the failure mode this tool exists
    /// to prevent: a malformed bootloader hard-bricks the console.
    fn program_page(&mut self, addr: u32, page: &[u8]) -> Result<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.command(&Operation::Write { addr, data: page }, Stage::Write, addr)?;

            let readback = self.command(
                &Operation::Read {
                    addr,
                    len: page.len() as u16,
                },
                Stage::ReadBack,
                addr,
            )?;

            let Some((i, expected, actual)) = first_diff(page, &readback) else {
                return Ok(());
            };

            log::warn!(
                "page at 0x{:06X} read back wrong at +{} (wrote 0x{:02X}, read 0x{:02X}), attempt {}/{}",
                addr,
                i,
                expected,
                actual,
                attempt,
                self.retry.budget
            );
            if attempt >= self.retry.budget {
                return Err(Error::VerifyMismatch {
                    address: addr + i as u32,
                    expected,
                    actual,
                });
            }
        }
    }

    fn command(&mut self, op: &Operation<'_>, stage: Stage, address: u32) -> Result<Vec<u8>> {
        command(
            &mut self.transport,
            self.table,
            op,
            self.timeout,
            self.retry.budget,
            stage,
            address,
        )
    }

    fn check_cancel(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl<T: Transport> Drop for Programmer<T> {
    /// Backstop for the rare path where the in-operation release failed:
    /// leaving the bus held would lock the console out of its own flash
    /// until a power cycle.
    fn drop(&mut self) {
        if self.bus_held {
            let _ = self.command(&Operation::Bus { acquire: false }, Stage::BusRelease, 0);
        }
    }
}

/// Run one command with transport-level retries.
///
/// Transient failures (timeout, bad response checksum) are retried up to
/// `budget` total attempts, then surfaced as `RetryBudgetExceeded` with the
/// stage and address of the command that gave up. Everything else propagates
/// immediately.
fn command<T: Transport + ?Sized>(
    transport: &mut T,
    table: &ProtocolTable,
    op: &Operation<'_>,
    timeout: Duration,
    budget: u32,
    stage: Stage,
    address: u32,
) -> Result<Vec<u8>> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let mut exchange = Exchange::new(transport, table);
        match exchange.run(op, timeout) {
            Ok(payload) => return Ok(payload),
            Err(e) if e.is_transient() => {
                log::warn!(
                    "{} at 0x{:06X}: {} (attempt {}/{})",
                    stage,
                    address,
                    e,
                    attempt,
                    budget
                );
                if attempt >= budget {
                    return Err(Error::RetryBudgetExceeded { stage, address });
                }
            }
            Err(e) => return Err(e),
        }
    }
}

fn first_diff(expected: &[u8], actual: &[u8]) -> Option<(usize, u8, u8)> {
    expected
        .iter()
        .zip(actual.iter())
        .enumerate()
        .find_map(|(i, (e, a))| (e != a).then_some((i, *e, *a)))
}
