//! Shared progress counters and the engine state machine.
//!
//! The [`Monitor`] is the only state shared between the worker and the
//! reporter: plain atomics, monotonically non-decreasing within a run, no
//! locks. The reporter tolerates staleness; the worker checks for
//! cancellation at every checkpoint and never transitions out of a
//! terminal state.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

use crate::error::{Error, Result};

/// INIT → RUNNING → {SUCCESS | CANCELLED | FAILED}.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Init,
    Running,
    Success,
    Cancelled,
    Failed,
}

impl Status {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Init => 0,
            Self::Running => 1,
            Self::Success => 2,
            Self::Cancelled => 3,
            Self::Failed => 4,
        }
    }

    const fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Init,
            1 => Self::Running,
            2 => Self::Success,
            3 => Self::Cancelled,
            _ => Self::Failed,
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Init | Self::Running)
    }
}

#[derive(Default)]
pub struct Monitor {
    state: AtomicU8,
    cancel: AtomicBool,
    bytes_done: AtomicU64,
    bytes_total: AtomicU64,
    entries_done: AtomicU64,
    entries_total: AtomicU64,
}

impl Monitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> Status {
        Status::from_u8(self.state.load(Ordering::Acquire))
    }

    /// INIT → RUNNING.
    pub fn begin(&self) {
        let _ = self.state.compare_exchange(
            Status::Init.as_u8(),
            Status::Running.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Enters a terminal state; a no-op once one has been reached.
    pub fn finish(&self, status: Status) {
        debug_assert!(status.is_terminal());
        let mut current = self.state.load(Ordering::Acquire);
        while !Status::from_u8(current).is_terminal() {
            match self.state.compare_exchange(current, status.as_u8(), Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }

    /// Requests cooperative cancellation; the worker honors it at its next
    /// checkpoint.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    /// Called by the worker before each unit of work.
    pub fn checkpoint(&self) -> Result<()> {
        if self.cancel.load(Ordering::Acquire) {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    pub fn set_totals(&self, bytes: u64, entries: u64) {
        self.bytes_total.store(bytes, Ordering::Release);
        self.entries_total.store(entries, Ordering::Release);
    }

    pub fn add_bytes(&self, n: u64) {
        self.bytes_done.fetch_add(n, Ordering::AcqRel);
    }

    pub fn add_entry(&self) {
        self.entries_done.fetch_add(1, Ordering::AcqRel);
    }

    pub fn bytes(&self) -> (u64, u64) {
        (self.bytes_done.load(Ordering::Acquire), self.bytes_total.load(Ordering::Acquire))
    }

    pub fn entries(&self) -> (u64, u64) {
        (self.entries_done.load(Ordering::Acquire), self.entries_total.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_machine_path() {
        let monitor = Monitor::new();
        assert_eq!(monitor.status(), Status::Init);
        monitor.begin();
        assert_eq!(monitor.status(), Status::Running);
        monitor.finish(Status::Success);
        assert_eq!(monitor.status(), Status::Success);
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        let monitor = Monitor::new();
        monitor.begin();
        monitor.finish(Status::Cancelled);
        monitor.finish(Status::Failed);
        assert_eq!(monitor.status(), Status::Cancelled);
        monitor.begin();
        assert_eq!(monitor.status(), Status::Cancelled);
    }

    #[test]
    fn test_early_failure_from_init() {
        let monitor = Monitor::new();
        monitor.finish(Status::Failed);
        assert_eq!(monitor.status(), Status::Failed);
    }

    #[test]
    fn test_checkpoint_honors_cancel() {
        let monitor = Monitor::new();
        monitor.begin();
        assert!(monitor.checkpoint().is_ok());
        monitor.cancel();
        assert!(matches!(monitor.checkpoint(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_counters_accumulate() {
        let monitor = Monitor::new();
        monitor.set_totals(100, 3);
        monitor.add_bytes(40);
        monitor.add_bytes(25);
        monitor.add_entry();
        assert_eq!(monitor.bytes(), (65, 100));
        assert_eq!(monitor.entries(), (1, 3));
    }
}
