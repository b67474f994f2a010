//! Progress reporting and cooperative cancellation.
//!
//! The programmer pushes byte-granularity progress into an abstract sink; the
//! presentation layer (CLI, GUI, nothing) decides what to do with it. The
//! push is one-way and must never block: a slow consumer stalling the
//! protocol risks a device-side timeout mid-operation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Which multi-step operation progress refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum OpKind {
    Erase,
    Write,
    Read,
    Verify,
}

impl core::fmt::Display for OpKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            OpKind::Erase => "erase",
            OpKind::Write => "write",
            OpKind::Read => "read",
            OpKind::Verify => "verify",
        };
        write!(f, "{}", name)
    }
}

/// Sink for byte-granularity progress, called after each page/sector step.
///
/// Implementations must return promptly; do any heavy lifting elsewhere.
pub trait ProgressSink {
    /// A multi-step operation is starting.
    fn begin(&mut self, op: OpKind, total_bytes: u64) {
        let _ = (op, total_bytes);
    }

    /// Bytes confirmed done so far.
    fn progress(&mut self, bytes_done: u64, bytes_total: u64) {
        let _ = (bytes_done, bytes_total);
    }

    /// The operation finished successfully.
    fn finish(&mut self, op: OpKind) {
        let _ = op;
    }
}

/// A sink that discards everything.
pub struct NoProgress;

impl ProgressSink for NoProgress {}

/// Cooperative cancellation flag, checked only at page/sector boundaries so a
/// mid-transfer page is never interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A fresh, uncancelled token. Clones share the flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Takes effect at the next boundary check.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
