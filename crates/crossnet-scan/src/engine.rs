//! Scan execution.
//!
//! A scan expands the requested block, then runs the ping sweep and/or the
//! ARP sweep through a [`BoundedRunner`]. Every finished probe advances the
//! progress counter and live hosts are published as `Result` events. The
//! engine checks the [`ScanGate`] before handling each result and before each
//! phase; once a stop is requested it drains the runner and returns without
//! publishing anything further.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::Instrument;
use uuid::Uuid;

use crossnet_core::{
    LinkEntry, LinkSource, PingResult, Probe, ProbeResult, ScanEvent, ScanRequest,
};

use crate::broadcast::EventBroadcaster;
use crate::config::StopBehavior;
use crate::range;
use crate::resolver::HostnameResolver;
use crate::runner::BoundedRunner;
use crate::state::ScanGate;

pub const COMPLETE_MESSAGE: &str = "Scan completed";

/// How a scan ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    /// Ran to the end; every reported result in publish order.
    Completed { results: Vec<ProbeResult> },
    /// Stopped on request.
    Stopped,
    /// Could not start, e.g. the network was not a valid block.
    Failed { message: String },
}

/// Percentage over every probe the scan will run.
struct Progress {
    processed: usize,
    total: usize,
}

impl Progress {
    fn new(total: usize) -> Self {
        Self {
            processed: 0,
            total: total.max(1),
        }
    }

    fn advance(&mut self) -> u8 {
        self.processed = (self.processed + 1).min(self.total);
        (self.processed * 100 / self.total) as u8
    }
}

enum Phase {
    Finished,
    Stopped,
}

/// State of one scan while it runs.
struct ScanRun {
    request: ScanRequest,
    gate: Arc<ScanGate>,
    runner: BoundedRunner,
    progress: Progress,
    results: Vec<ProbeResult>,
}

/// Drives scans against a [`Probe`] and publishes their events.
pub struct ScanEngine {
    probe: Arc<dyn Probe>,
    resolver: Arc<HostnameResolver>,
    broadcaster: EventBroadcaster,
    stop_behavior: StopBehavior,
}

impl ScanEngine {
    pub fn new(
        probe: Arc<dyn Probe>,
        resolver: Arc<HostnameResolver>,
        broadcaster: EventBroadcaster,
        stop_behavior: StopBehavior,
    ) -> Self {
        Self {
            probe,
            resolver,
            broadcaster,
            stop_behavior,
        }
    }

    pub fn broadcaster(&self) -> &EventBroadcaster {
        &self.broadcaster
    }

    pub fn resolver(&self) -> &Arc<HostnameResolver> {
        &self.resolver
    }

    /// Run one scan to its end.
    ///
    /// The caller must have moved `gate` to `Running`. The engine publishes
    /// the terminal event only if it wins the `Running → Completing`
    /// transition; otherwise a stop request already published it.
    pub async fn run(
        &self,
        scan_id: Uuid,
        request: ScanRequest,
        gate: Arc<ScanGate>,
    ) -> ScanOutcome {
        let span = tracing::info_span!("scan", scan_id = %scan_id, network = %request.network);
        self.execute(request, gate).instrument(span).await
    }

    async fn execute(&self, request: ScanRequest, gate: Arc<ScanGate>) -> ScanOutcome {
        let started = Instant::now();
        tracing::info!(
            scan_type = %request.scan_type,
            concurrency = request.concurrency,
            timeout_ms = request.timeout.as_millis() as u64,
            "Scan started"
        );
        self.emit(ScanEvent::progress(
            0,
            format!("Starting {} scan...", request.scan_type),
        ));

        let addresses = match range::expand(&request.network) {
            Ok(addresses) => addresses,
            Err(e) => return self.fail(&gate, format!("Scan failed: {e}")),
        };
        let runner = match BoundedRunner::new(request.concurrency) {
            Ok(runner) => self.apply_stop_behavior(runner, &gate),
            Err(e) => return self.fail(&gate, format!("Scan failed: {e}")),
        };

        let mut run = ScanRun {
            progress: Progress::new(addresses.len() * request.scan_type.sweep_count()),
            request,
            gate,
            runner,
            results: Vec::new(),
        };

        if run.request.scan_type.includes_ping() {
            if let Phase::Stopped = self.ping_sweep(&mut run, &addresses).await {
                return stopped(started);
            }
        }

        if run.request.scan_type.includes_arp() {
            if run.gate.stop_requested() {
                return stopped(started);
            }
            if let Phase::Stopped = self.arp_sweep(&mut run, &addresses).await {
                return stopped(started);
            }
        }

        if !run.gate.try_settle() {
            return stopped(started);
        }

        tracing::info!(
            results = run.results.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Scan complete"
        );
        self.emit(ScanEvent::complete(COMPLETE_MESSAGE));

        ScanOutcome::Completed {
            results: run.results,
        }
    }

    fn apply_stop_behavior(&self, runner: BoundedRunner, gate: &Arc<ScanGate>) -> BoundedRunner {
        match self.stop_behavior {
            StopBehavior::SkipPending => {
                let gate = gate.clone();
                runner.skip_pending_when(move || gate.stop_requested())
            }
            StopBehavior::Drain => runner,
        }
    }

    async fn ping_sweep(&self, run: &mut ScanRun, addresses: &[Ipv4Addr]) -> Phase {
        let probe = self.probe.clone();
        let resolver = self.resolver.clone();
        let timeout = run.request.timeout;

        let mut stream = run.runner.spawn(addresses.to_vec(), move |address| {
            let probe = probe.clone();
            let resolver = resolver.clone();
            async move { ping_host(probe.as_ref(), &resolver, address, timeout).await }
        });

        let total = addresses.len();
        let mut processed = 0;
        let mut alive = 0;

        while let Some(result) = stream.recv().await {
            if run.gate.stop_requested() {
                let dispatched = stream.drain().await;
                tracing::info!(processed, dispatched, total, "Ping sweep stopped");
                return Phase::Stopped;
            }

            processed += 1;
            if result.alive {
                alive += 1;
            }
            if result.alive || run.request.report_down {
                tracing::debug!(
                    ip = %result.address,
                    alive = result.alive,
                    rtt_ms = result.rtt.as_secs_f64() * 1000.0,
                    hostname = result.hostname.as_deref().unwrap_or(""),
                    "Ping result"
                );
                self.report(run, ProbeResult::Ping(result));
            }

            let percent = run.progress.advance();
            self.emit(ScanEvent::progress(
                percent,
                format!("Ping scan progress: {processed}/{total}"),
            ));
        }

        stream.finish().await;
        tracing::info!(alive, total, "Ping sweep finished");
        Phase::Finished
    }

    async fn arp_sweep(&self, run: &mut ScanRun, addresses: &[Ipv4Addr]) -> Phase {
        let cached = self.cached_neighbors(run).await;
        for entry in cached {
            if run.gate.stop_requested() {
                return Phase::Stopped;
            }
            self.report(run, ProbeResult::Link(entry));
        }

        if run.gate.stop_requested() {
            return Phase::Stopped;
        }

        let probe = self.probe.clone();
        let resolver = self.resolver.clone();
        let timeout = run.request.timeout;

        let mut stream = run.runner.spawn(addresses.to_vec(), move |address| {
            let probe = probe.clone();
            let resolver = resolver.clone();
            async move { link_host(probe.as_ref(), &resolver, address, timeout).await }
        });

        let total = addresses.len();
        let mut processed = 0;
        let mut found = 0;

        while let Some(entry) = stream.recv().await {
            if run.gate.stop_requested() {
                let dispatched = stream.drain().await;
                tracing::info!(processed, dispatched, total, "ARP sweep stopped");
                return Phase::Stopped;
            }

            processed += 1;
            if let Some(entry) = entry {
                found += 1;
                tracing::debug!(
                    ip = %entry.address,
                    mac = %entry.link_address,
                    "Link address found"
                );
                self.report(run, ProbeResult::Link(entry));
            }

            let percent = run.progress.advance();
            self.emit(ScanEvent::progress(
                percent,
                format!("ARP scan progress: {processed}/{total}"),
            ));
        }

        stream.finish().await;
        tracing::info!(found, total, "ARP sweep finished");
        Phase::Finished
    }

    /// Neighbor-table entries inside the scanned block, named and sorted.
    ///
    /// Unlike a raw dump of the neighbor table, entries outside the block or
    /// without a link address are left out.
    async fn cached_neighbors(&self, run: &ScanRun) -> Vec<LinkEntry> {
        let network = &run.request.network;
        let entries: Vec<LinkEntry> = self
            .probe
            .list_neighbor_table()
            .await
            .into_iter()
            .filter(|entry| entry.has_link_address() && range::contains(network, entry.address))
            .collect();
        tracing::debug!(entries = entries.len(), "Neighbor table read");

        let resolver = self.resolver.clone();
        let mut named = run
            .runner
            .run(entries, move |mut entry: LinkEntry| {
                let resolver = resolver.clone();
                async move {
                    entry.hostname = non_empty(resolver.resolve(entry.address).await);
                    entry
                }
            })
            .await;
        named.sort_by_key(|entry| entry.address);
        named
    }

    fn report(&self, run: &mut ScanRun, result: ProbeResult) {
        self.emit(ScanEvent::Result(result.clone()));
        run.results.push(result);
    }

    fn emit(&self, event: ScanEvent) {
        self.broadcaster.publish(&event);
    }

    fn fail(&self, gate: &ScanGate, message: String) -> ScanOutcome {
        tracing::warn!(error = %message, "Scan aborted");
        if gate.try_settle() {
            self.emit(ScanEvent::error(message.clone()));
        }
        ScanOutcome::Failed { message }
    }
}

fn stopped(started: Instant) -> ScanOutcome {
    tracing::info!(duration_ms = started.elapsed().as_millis() as u64, "Scan stopped");
    ScanOutcome::Stopped
}

async fn ping_host(
    probe: &dyn Probe,
    resolver: &HostnameResolver,
    address: Ipv4Addr,
    timeout: Duration,
) -> PingResult {
    let liveness = probe.probe_liveness(address, timeout).await;
    let mut result = PingResult::from_liveness(address, liveness);
    if result.alive {
        result.hostname = non_empty(resolver.resolve(address).await);
    }
    result
}

async fn link_host(
    probe: &dyn Probe,
    resolver: &HostnameResolver,
    address: Ipv4Addr,
    timeout: Duration,
) -> Option<LinkEntry> {
    if !probe.probe_liveness(address, timeout).await.alive {
        return None;
    }

    let link_address = probe.lookup_link_address(address).await;
    if link_address.is_empty() {
        return None;
    }

    let mut entry = LinkEntry::new(address, link_address, LinkSource::ActiveScan);
    entry.hostname = non_empty(resolver.resolve(address).await);
    Some(entry)
}

fn non_empty(name: String) -> Option<String> {
    (!name.is_empty()).then_some(name)
}
