//! Single-flight scan state.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;

/// Lifecycle of the one scan a controller may run at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ScanState {
    Idle = 0,
    Running = 1,
    /// A stop was requested; the engine winds down at its next checkpoint.
    StopRequested = 2,
    /// The engine has claimed the terminal event and is finishing up.
    Completing = 3,
}

impl ScanState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::StopRequested,
            3 => Self::Completing,
            _ => Self::Idle,
        }
    }
}

/// Atomic gate guarding the scan lifecycle.
///
/// Every transition out of `Running` is a compare-and-set, so exactly one of
/// "stop requested" and "engine settled" wins and publishes the terminal event.
#[derive(Debug)]
pub struct ScanGate {
    state: AtomicU8,
}

impl Default for ScanGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanGate {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ScanState::Idle as u8),
        }
    }

    pub fn state(&self) -> ScanState {
        ScanState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Any state other than `Idle`.
    pub fn is_running(&self) -> bool {
        self.state() != ScanState::Idle
    }

    pub fn stop_requested(&self) -> bool {
        self.state() == ScanState::StopRequested
    }

    /// Idle → Running.
    pub fn try_begin(&self) -> bool {
        self.transition(ScanState::Idle, ScanState::Running)
    }

    /// Running → StopRequested.
    pub fn request_stop(&self) -> bool {
        self.transition(ScanState::Running, ScanState::StopRequested)
    }

    /// Running → Completing.
    pub fn try_settle(&self) -> bool {
        self.transition(ScanState::Running, ScanState::Completing)
    }

    /// Any state → Idle.
    pub fn release(&self) {
        self.state.store(ScanState::Idle as u8, Ordering::Release);
    }

    fn transition(&self, from: ScanState, to: ScanState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
