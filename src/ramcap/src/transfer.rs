//! Per-range page transfer
//!
//! Walks one range a page at a time, snapshotting pages when a transform
//! is active, and keeps the output length of the range deterministic in
//! the framed formats by zero-filling whatever could not be written.

use crate::format::Framer;
use crate::pipeline::OutputPipeline;
use crate::source::{MemoryRange, RangeSource};
use serde::Serialize;
use std::io::Write;
use std::time::{Duration, Instant};

/// Page size used when the host cannot report one
pub const PAGE_SIZE: usize = 4096;

/// Page size of the running kernel
pub fn host_page_size() -> usize {
    // SAFETY: sysconf has no preconditions
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    usize::try_from(size)
        .ok()
        .filter(|&size| size > 0)
        .unwrap_or(PAGE_SIZE)
}

/// How a range ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RangeOutcome {
    /// Every page was read and written
    Complete,
    /// Some pages could not be read and were zero-filled
    Compensated,
    /// A page overran the time budget; the rest of the range was skipped
    TimedOut { at: u64 },
    /// A downstream write failed; the rest of the range was skipped
    Failed { at: u64, error: String },
}

/// Per-range accounting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeReport {
    pub range: MemoryRange,
    pub outcome: RangeOutcome,
    /// Bytes of real memory written
    pub data_bytes: u64,
    /// Zero bytes written in place of memory
    pub padded_bytes: u64,
    pub failed_pages: u64,
}

impl RangeReport {
    fn new(range: MemoryRange) -> Self {
        Self {
            range,
            outcome: RangeOutcome::Complete,
            data_bytes: 0,
            padded_bytes: 0,
            failed_pages: 0,
        }
    }
}

/// Page loop with its scratch buffer and time budget
pub struct PageTransfer {
    page_size: usize,
    timeout: Option<Duration>,
    scratch: Vec<u8>,
}

impl PageTransfer {
    pub fn new(page_size: usize, timeout: Option<Duration>) -> Self {
        Self {
            page_size,
            timeout: timeout.filter(|t| !t.is_zero()),
            scratch: vec![0u8; page_size],
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Transfer every page of `range`
    ///
    /// Never fails the run: write failures and timeouts end the range early
    /// and are recorded in the report.
    pub fn transfer<S, W>(
        &mut self,
        source: &S,
        range: &MemoryRange,
        framer: &mut Framer,
        pipeline: &mut OutputPipeline<W>,
    ) -> RangeReport
    where
        S: RangeSource + ?Sized,
        W: Write,
    {
        tracing::debug!("Writing range {}", range);

        let mut report = RangeReport::new(*range);
        let snapshot = pipeline.transforms_active();
        let mut address = range.start;

        loop {
            let started = Instant::now();
            let chunk_len = (self.page_size as u64).min((range.end - address).saturating_add(1));
            let page_last = address + chunk_len - 1;
            let rest = range.end - page_last;
            let chunk_len = chunk_len as usize;

            if chunk_len < self.page_size {
                // Partial pages cannot be mapped
                tracing::debug!(
                    "Padding partial page: addr {:#x} size: {}",
                    address,
                    chunk_len
                );
                if let Err(err) = framer.pad(pipeline, chunk_len as u64) {
                    tracing::warn!("Error padding partial page at {:#x}: {}", address, err);
                    report.outcome = RangeOutcome::Failed {
                        at: address,
                        error: err.to_string(),
                    };
                    break;
                }
                report.padded_bytes += chunk_len as u64;
            } else {
                match source.page(address, chunk_len) {
                    Err(err) => {
                        tracing::warn!("{}. Null padding.", err);
                        report.failed_pages += 1;
                        if let Err(err) = framer.pad(pipeline, chunk_len as u64) {
                            tracing::warn!("Error padding page at {:#x}: {}", address, err);
                            report.outcome = RangeOutcome::Failed {
                                at: address,
                                error: err.to_string(),
                            };
                            break;
                        }
                        report.padded_bytes += chunk_len as u64;
                        report.outcome = RangeOutcome::Compensated;
                    }
                    Ok(view) => {
                        let bytes: &[u8] = if snapshot {
                            let scratch = &mut self.scratch[..chunk_len];
                            scratch.copy_from_slice(&view);
                            scratch
                        } else {
                            &view
                        };

                        if let Err(err) = pipeline.write(bytes) {
                            let accepted = err.accepted() as u64;
                            report.data_bytes += accepted;
                            report.failed_pages += 1;

                            let missing = chunk_len as u64 - accepted + rest;
                            tracing::warn!(
                                "Error writing page {:#x}: {}. Skipping {} bytes of range.",
                                address,
                                err,
                                missing
                            );
                            if framer.compensates() {
                                match framer.pad(pipeline, missing) {
                                    Ok(()) => report.padded_bytes += missing,
                                    Err(pad_err) => {
                                        tracing::warn!("Error writing compensation: {}", pad_err);
                                    }
                                }
                            }
                            report.outcome = RangeOutcome::Failed {
                                at: address,
                                error: err.to_string(),
                            };
                            break;
                        }
                        report.data_bytes += chunk_len as u64;
                    }
                }
            }

            if let Some(budget) = self.timeout {
                if rest > 0 && started.elapsed() > budget {
                    tracing::warn!(
                        "Reading is too slow at {:#x}. Skipping {} bytes of range {}.",
                        address,
                        rest,
                        range
                    );
                    if framer.compensates() {
                        match framer.pad(pipeline, rest) {
                            Ok(()) => report.padded_bytes += rest,
                            Err(err) => tracing::warn!("Error writing compensation: {}", err),
                        }
                    }
                    report.outcome = RangeOutcome::TimedOut { at: address };
                    break;
                }
            }

            if rest == 0 {
                break;
            }
            address = page_last + 1;
        }

        report
    }
}
