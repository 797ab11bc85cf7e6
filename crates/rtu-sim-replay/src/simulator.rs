//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Per-device replay workers and lifecycle management."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use rtu_sim_common::config::{DeviceConfig, SimulatorConfig};
use rtu_sim_common::time::{duration_to_millis, wall_clock_now};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::cursor::ReplayCursor;
use crate::emission::{Direction, Emission, EmissionSink};
use crate::faults::ResponseDropper;
use crate::script::DeviceScript;
use crate::stats::{DeviceReport, ExitReason};
use crate::timing::ResponseDelay;

const DROP_SEED_SALT: u64 = 0x5EED_FA17;

/// Replays scripted request/response traffic for every configured device.
pub struct DeviceReplaySimulator {
    config: Arc<SimulatorConfig>,
    sink: Arc<dyn EmissionSink>,
}

impl DeviceReplaySimulator {
    pub fn new(config: SimulatorConfig, sink: Arc<dyn EmissionSink>) -> Self {
        Self {
            config: Arc::new(config),
            sink,
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Spawn one worker per device and return a handle for lifecycle control.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> SimulatorHandle {
        let (shutdown_tx, _) = broadcast::channel(1);
        let started = Instant::now();
        let mut workers = Vec::with_capacity(self.config.devices.len());

        for (index, (name, device)) in self.config.devices.iter().enumerate() {
            let seed = self.config.timing.seed.wrapping_add(index as u64);
            let worker = DeviceWorker {
                name: name.clone(),
                device: device.clone(),
                log_interval: self.config.timing.log_interval,
                max_cycles: self.config.max_cycles,
                delay: ResponseDelay::from_timing(&self.config.timing, seed),
                dropper: ResponseDropper::new(device.tx_drop_probability, seed ^ DROP_SEED_SALT),
                sink: self.sink.clone(),
                started,
            };
            let shutdown_rx = shutdown_tx.subscribe();
            let handle = tokio::spawn(worker.run(shutdown_rx));
            workers.push(DeviceTask {
                device: name.clone(),
                handle,
            });
        }

        info!(
            devices = workers.len(),
            log_interval_ms = duration_to_millis(self.config.timing.log_interval),
            delay_mode = %self.config.timing.delay_mode,
            "simulator started"
        );

        SimulatorHandle {
            shutdown: shutdown_tx,
            workers,
        }
    }
}

/// Cloneable cancellation signal for a running simulator.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    sender: broadcast::Sender<()>,
}

impl ShutdownTrigger {
    pub fn cancel(&self) {
        // No receivers means every worker already exited.
        let _ = self.sender.send(());
    }
}

#[derive(Debug)]
struct DeviceTask {
    device: String,
    handle: JoinHandle<DeviceReport>,
}

/// Handle returned by [`DeviceReplaySimulator::start`].
///
/// Dropping the handle and every [`ShutdownTrigger`] closes the shutdown
/// channel, which also stops the workers.
#[derive(Debug)]
pub struct SimulatorHandle {
    shutdown: broadcast::Sender<()>,
    workers: Vec<DeviceTask>,
}

impl SimulatorHandle {
    pub fn device_count(&self) -> usize {
        self.workers.len()
    }

    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.workers.iter().map(|task| task.device.as_str())
    }

    pub fn is_finished(&self) -> bool {
        self.workers.iter().all(|task| task.handle.is_finished())
    }

    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        ShutdownTrigger {
            sender: self.shutdown.clone(),
        }
    }

    /// Signal every worker to stop and collect their reports.
    pub async fn shutdown(self) -> Vec<DeviceReport> {
        self.shutdown_trigger().cancel();
        let reports = self.join().await;
        info!(devices = reports.len(), "simulator shutdown complete");
        reports
    }

    /// Wait for every worker to finish on its own, in configuration order.
    pub async fn join(self) -> Vec<DeviceReport> {
        let SimulatorHandle { shutdown, workers } = self;
        let mut reports = Vec::with_capacity(workers.len());
        for task in workers {
            match task.handle.await {
                Ok(report) => reports.push(report),
                Err(err) => {
                    error!(device = %task.device, error = %err, "device worker join error");
                }
            }
        }
        drop(shutdown);
        reports
    }
}

struct DeviceWorker {
    name: String,
    device: DeviceConfig,
    log_interval: Duration,
    max_cycles: Option<u64>,
    delay: ResponseDelay,
    dropper: ResponseDropper,
    sink: Arc<dyn EmissionSink>,
    started: Instant,
}

impl DeviceWorker {
    async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> DeviceReport {
        let report = DeviceReport::new(self.name.clone());
        let script = match DeviceScript::load(&self.name, &self.device.path) {
            Ok(script) => script,
            Err(err) => {
                warn!(device = %self.name, error = %err, "device script unavailable; worker exiting");
                return report.finish(ExitReason::NoScript);
            }
        };
        info!(
            device = %self.name,
            path = %script.path().display(),
            lines = script.len(),
            "device replay started"
        );
        self.replay(&script, report, &mut shutdown).await
    }

    async fn replay(
        &mut self,
        script: &DeviceScript,
        mut report: DeviceReport,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> DeviceReport {
        let mut cursor = ReplayCursor::new();

        while !self.limit_reached(&cursor) {
            let Some((request, response)) = script.pair(&cursor) else {
                return report.finish(ExitReason::NoScript);
            };
            let cycle = cursor.cycle();

            let requested_at = Instant::now();
            if let Err(err) = self.emit(Direction::Rx, request, cycle) {
                warn!(device = %self.name, error = %err, "emission failed; worker exiting");
                return report.finish(ExitReason::SinkFailed);
            }
            report.record_request();

            let delay = self.delay.next();
            if pause(delay, shutdown).await {
                return report.finish(ExitReason::Cancelled);
            }

            if self.dropper.should_drop() {
                debug!(device = %self.name, cycle, "response withheld");
                report.record_drop();
            } else {
                if let Err(err) = self.emit(Direction::Tx, response, cycle) {
                    warn!(device = %self.name, error = %err, "emission failed; worker exiting");
                    return report.finish(ExitReason::SinkFailed);
                }
                report.record_response(requested_at.elapsed());
            }

            cursor.advance();
            report.record_cycle();
            if self.limit_reached(&cursor) {
                break;
            }
            if pause(self.log_interval, shutdown).await {
                return report.finish(ExitReason::Cancelled);
            }
        }

        info!(device = %self.name, cycles = cursor.cycle(), "device cycle limit reached");
        report.finish(ExitReason::CycleLimit)
    }

    fn limit_reached(&self, cursor: &ReplayCursor) -> bool {
        self.max_cycles.is_some_and(|limit| cursor.cycle() >= limit)
    }

    fn emit(&self, direction: Direction, payload: &str, cycle: u64) -> crate::Result<()> {
        let emission = Emission {
            direction,
            device: self.name.clone(),
            payload: payload.to_owned(),
            timestamp: wall_clock_now(),
            cycle,
            elapsed: self.started.elapsed(),
        };
        self.sink.emit(&emission)
    }
}

/// Sleep for `duration` unless shutdown arrives first. Returns `true` when cancelled.
async fn pause(duration: Duration, shutdown: &mut broadcast::Receiver<()>) -> bool {
    tokio::select! {
        _ = shutdown.recv() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}
