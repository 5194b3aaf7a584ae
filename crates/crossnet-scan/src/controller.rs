//! Single-scan-at-a-time control surface.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crossnet_core::{Probe, ScanEvent, ScanRequest};

use crate::broadcast::{EventBroadcaster, Observer};
use crate::config::ScanConfig;
use crate::engine::{ScanEngine, ScanOutcome};
use crate::error::{Result, ScanError};
use crate::resolver::HostnameResolver;
use crate::state::{ScanGate, ScanState};

pub const STOP_MESSAGE: &str = "Scan stopped by user";

/// Diagnostic view of the controller.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScanStatus {
    pub state: ScanState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy)]
struct ActiveScan {
    scan_id: Uuid,
    started_at: DateTime<Utc>,
}

type ActiveSlot = Arc<Mutex<Option<ActiveScan>>>;

fn lock_active(slot: &ActiveSlot) -> MutexGuard<'_, Option<ActiveScan>> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

/// Returns the gate to `Idle` when the scan task ends, including by panic.
struct ScanGuard {
    gate: Arc<ScanGate>,
    active: ActiveSlot,
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        lock_active(&self.active).take();
        self.gate.release();
    }
}

/// Starts and stops scans, one at a time.
pub struct ScanController {
    engine: Arc<ScanEngine>,
    gate: Arc<ScanGate>,
    active: ActiveSlot,
}

impl ScanController {
    pub fn new(
        probe: Arc<dyn Probe>,
        resolver: Arc<HostnameResolver>,
        config: &ScanConfig,
    ) -> Self {
        let broadcaster = EventBroadcaster::new(config.observer_capacity);
        let engine = ScanEngine::new(probe, resolver, broadcaster, config.stop_behavior);
        Self {
            engine: Arc::new(engine),
            gate: Arc::new(ScanGate::new()),
            active: Arc::new(Mutex::new(None)),
        }
    }

    pub fn broadcaster(&self) -> &EventBroadcaster {
        self.engine.broadcaster()
    }

    pub fn resolver(&self) -> &Arc<HostnameResolver> {
        self.engine.resolver()
    }

    pub fn subscribe(&self) -> Observer {
        self.broadcaster().subscribe()
    }

    /// Start a scan in the background.
    ///
    /// Fails with `Conflict` if a scan is already in progress and with
    /// `Core(InvalidRequest)` if the request is malformed; neither changes state.
    /// An invalid network is reported as an `Error` event by the scan itself.
    pub fn start_scan(&self, request: ScanRequest) -> Result<JoinHandle<ScanOutcome>> {
        request.validate()?;

        if !self.gate.try_begin() {
            tracing::warn!(network = %request.network, "Scan rejected, another scan is running");
            return Err(ScanError::Conflict);
        }

        let scan_id = Uuid::new_v4();
        *lock_active(&self.active) = Some(ActiveScan {
            scan_id,
            started_at: Utc::now(),
        });

        let guard = ScanGuard {
            gate: self.gate.clone(),
            active: self.active.clone(),
        };
        let engine = self.engine.clone();
        let gate = self.gate.clone();

        Ok(tokio::spawn(async move {
            let _guard = guard;
            engine.run(scan_id, request, gate).await
        }))
    }

    /// Ask the running scan to stop.
    ///
    /// Publishes the terminal `Error` event before returning. Returns false
    /// when there was no running scan to stop.
    pub fn stop_scan(&self) -> bool {
        if !self.gate.request_stop() {
            tracing::debug!(state = ?self.gate.state(), "Stop ignored, no running scan");
            return false;
        }

        let scan_id = lock_active(&self.active).map(|a| a.scan_id);
        tracing::info!(scan_id = ?scan_id, "Scan stop requested");
        self.broadcaster().publish(&ScanEvent::error(STOP_MESSAGE));
        true
    }

    pub fn is_running(&self) -> bool {
        self.gate.is_running()
    }

    pub fn status(&self) -> ScanStatus {
        let active = *lock_active(&self.active);
        ScanStatus {
            state: self.gate.state(),
            scan_id: active.map(|a| a.scan_id),
            started_at: active.map(|a| a.started_at),
        }
    }
}
