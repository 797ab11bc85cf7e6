//! ---
//! ems_section: "11-simulation"
//! ems_subsection: "tests"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Integration tests for the device replay simulator."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use rtu_sim_common::config::{DelayMode, DeviceConfig, SimulatorConfig, TimingConfig};
use rtu_sim_replay::{
    DeviceReplaySimulator, DeviceReport, Direction, Emission, EmissionSink, ExitReason,
    MemorySink, ReplayError,
};
use tempfile::{tempdir, TempDir};

fn write_script(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write script");
    path
}

fn config_for(devices: Vec<(&str, DeviceConfig)>, max_cycles: Option<u64>) -> SimulatorConfig {
    let mut map = IndexMap::new();
    for (name, device) in devices {
        map.insert(name.to_owned(), device);
    }
    SimulatorConfig {
        max_cycles,
        devices: map,
        ..SimulatorConfig::default()
    }
}

fn abc_device(dir: &TempDir) -> DeviceConfig {
    DeviceConfig::new(write_script(dir.path(), "abc.txt", "A\nB\nC\n"))
}

fn report_for<'a>(reports: &'a [DeviceReport], device: &str) -> &'a DeviceReport {
    reports
        .iter()
        .find(|report| report.device == device)
        .expect("report for device")
}

/// Rejects every emission for one device and records the rest.
struct BrokenPipeFor {
    device: &'static str,
    inner: MemorySink,
}

impl EmissionSink for BrokenPipeFor {
    fn emit(&self, emission: &Emission) -> rtu_sim_replay::Result<()> {
        if emission.device == self.device {
            return Err(ReplayError::Sink(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "stdout closed",
            )));
        }
        self.inner.emit(emission)
    }
}

fn pairs(expected: &[(Direction, &str)]) -> Vec<(Direction, String)> {
    expected
        .iter()
        .map(|(direction, payload)| (*direction, (*payload).to_owned()))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn three_line_script_wraps_across_cycles() {
    let dir = tempdir().unwrap();
    let config = config_for(vec![("INVERTER", abc_device(&dir))], Some(3));
    let sink = Arc::new(MemorySink::new());

    let handle = DeviceReplaySimulator::new(config, sink.clone()).start();
    let reports = handle.join().await;

    assert_eq!(
        sink.payloads("INVERTER"),
        pairs(&[
            (Direction::Rx, "A"),
            (Direction::Tx, "B"),
            (Direction::Rx, "C"),
            (Direction::Tx, "A"),
            (Direction::Rx, "B"),
            (Direction::Tx, "C"),
        ])
    );
    let report = report_for(&reports, "INVERTER");
    assert_eq!(report.exit, ExitReason::CycleLimit);
    assert_eq!(report.requests, 3);
    assert_eq!(report.responses, 3);
    assert_eq!(report.cycles(), 3);
    assert_eq!(report.success_rate(), 100.0);

    let cycles: Vec<u64> = sink.emissions().iter().map(|e| e.cycle).collect();
    assert_eq!(cycles, vec![0, 0, 1, 1, 2, 2]);
}

#[tokio::test(start_paused = true)]
async fn cycle_k_emits_lines_two_k_and_two_k_plus_one() {
    let dir = tempdir().unwrap();
    let lines: Vec<String> = (0..5).map(|i| format!("L{}", i)).collect();
    let path = write_script(dir.path(), "five.txt", &lines.join("\n"));
    let config = config_for(vec![("BMS", DeviceConfig::new(path))], Some(12));
    let sink = Arc::new(MemorySink::new());

    DeviceReplaySimulator::new(config, sink.clone())
        .start()
        .join()
        .await;

    let emitted = sink.payloads("BMS");
    assert_eq!(emitted.len(), 24);
    for (k, pair) in emitted.chunks(2).enumerate() {
        assert_eq!(pair[0], (Direction::Rx, lines[(2 * k) % 5].clone()));
        assert_eq!(pair[1], (Direction::Tx, lines[(2 * k + 1) % 5].clone()));
    }
}

#[tokio::test(start_paused = true)]
async fn response_follows_request_by_midpoint_delay() {
    let dir = tempdir().unwrap();
    let config = config_for(vec![("SENSOR", abc_device(&dir))], Some(4));
    let midpoint = config.timing.response_delay_midpoint();
    let interval = config.timing.log_interval;
    let sink = Arc::new(MemorySink::new());

    let reports = DeviceReplaySimulator::new(config, sink.clone())
        .start()
        .join()
        .await;

    let emissions = sink.for_device("SENSOR");
    assert_eq!(emissions.len(), 8);
    for pair in emissions.chunks(2) {
        assert_eq!(pair[0].direction, Direction::Rx);
        assert_eq!(pair[1].direction, Direction::Tx);
        let gap = pair[1].elapsed - pair[0].elapsed;
        assert!(gap >= midpoint, "gap {:?} shorter than {:?}", gap, midpoint);
        assert!(gap < midpoint + Duration::from_millis(2));
    }
    for window in emissions.windows(3).step_by(2) {
        let between = window[2].elapsed - window[1].elapsed;
        assert!(between >= interval);
    }
    let last = report_for(&reports, "SENSOR").last_interval.unwrap();
    assert!(last >= midpoint);
}

#[tokio::test(start_paused = true)]
async fn missing_script_emits_nothing_and_does_not_block_others() {
    let dir = tempdir().unwrap();
    let empty = write_script(dir.path(), "empty.txt", "\n\n   \n");
    let config = config_for(
        vec![
            ("GHOST", DeviceConfig::new(dir.path().join("missing.txt"))),
            ("EMPTY", DeviceConfig::new(empty)),
            ("BMS", abc_device(&dir)),
        ],
        Some(2),
    );
    let sink = Arc::new(MemorySink::new());

    let reports = DeviceReplaySimulator::new(config, sink.clone())
        .start()
        .join()
        .await;

    assert_eq!(reports.len(), 3);
    for device in ["GHOST", "EMPTY"] {
        let report = report_for(&reports, device);
        assert_eq!(report.exit, ExitReason::NoScript);
        assert_eq!(report.requests, 0);
        assert!(sink.for_device(device).is_empty());
    }
    assert_eq!(report_for(&reports, "BMS").requests, 2);
    assert_eq!(sink.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn blank_lines_never_become_payloads() {
    let dir = tempdir().unwrap();
    let path = write_script(dir.path(), "gaps.txt", "\n  A  \n\n\t\nB\r\n\n");
    let config = config_for(vec![("INVERTER", DeviceConfig::new(path))], Some(3));
    let sink = Arc::new(MemorySink::new());

    DeviceReplaySimulator::new(config, sink.clone())
        .start()
        .join()
        .await;

    let payloads: Vec<String> = sink
        .emissions()
        .into_iter()
        .map(|emission| emission.payload)
        .collect();
    assert_eq!(payloads, vec!["A", "B", "A", "B", "A", "B"]);
}

#[tokio::test(start_paused = true)]
async fn single_line_script_answers_with_itself() {
    let dir = tempdir().unwrap();
    let path = write_script(dir.path(), "one.txt", "ONLY\n");
    let config = config_for(vec![("SENSOR", DeviceConfig::new(path))], Some(2));
    let sink = Arc::new(MemorySink::new());

    DeviceReplaySimulator::new(config, sink.clone())
        .start()
        .join()
        .await;

    assert_eq!(
        sink.payloads("SENSOR"),
        pairs(&[
            (Direction::Rx, "ONLY"),
            (Direction::Tx, "ONLY"),
            (Direction::Rx, "ONLY"),
            (Direction::Tx, "ONLY"),
        ])
    );
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_unbounded_workers_mid_sleep() {
    let dir = tempdir().unwrap();
    let config = config_for(
        vec![("INVERTER", abc_device(&dir)), ("BMS", abc_device(&dir))],
        None,
    );
    let sink = Arc::new(MemorySink::new());

    let handle = DeviceReplaySimulator::new(config, sink.clone()).start();
    assert_eq!(handle.device_count(), 2);
    assert_eq!(handle.devices().collect::<Vec<_>>(), vec!["INVERTER", "BMS"]);

    // Cycles start at 0s, 3.35s and 6.7s; the fourth would start at 10.05s.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(!handle.is_finished());
    let reports = handle.shutdown().await;

    assert_eq!(reports.len(), 2);
    for report in &reports {
        assert_eq!(report.exit, ExitReason::Cancelled);
        assert_eq!(report.requests, 3);
        assert_eq!(report.responses, 3);
    }
    assert_eq!(sink.len(), 12);
}

#[tokio::test(start_paused = true)]
async fn shutdown_trigger_cancels_join() {
    let dir = tempdir().unwrap();
    let config = config_for(vec![("SENSOR", abc_device(&dir))], None);
    let sink = Arc::new(MemorySink::new());

    let handle = DeviceReplaySimulator::new(config, sink.clone()).start();
    let trigger = handle.shutdown_trigger();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });
    let reports = handle.join().await;

    let report = report_for(&reports, "SENSOR");
    assert_eq!(report.exit, ExitReason::Cancelled);
    assert_eq!(report.requests, 1);
    assert_eq!(report.responses, 0);
    assert_eq!(report.cycles(), 0);
    assert_eq!(sink.payloads("SENSOR"), pairs(&[(Direction::Rx, "A")]));
}

#[tokio::test(start_paused = true)]
async fn dropped_responses_still_advance_the_cursor() {
    let dir = tempdir().unwrap();
    let mut device = abc_device(&dir);
    device.tx_drop_probability = 1.0;
    let config = config_for(vec![("INVERTER", device)], Some(3));
    let sink = Arc::new(MemorySink::new());

    let reports = DeviceReplaySimulator::new(config, sink.clone())
        .start()
        .join()
        .await;

    assert_eq!(
        sink.payloads("INVERTER"),
        pairs(&[
            (Direction::Rx, "A"),
            (Direction::Rx, "C"),
            (Direction::Rx, "B"),
        ])
    );
    let report = report_for(&reports, "INVERTER");
    assert_eq!(report.dropped, 3);
    assert_eq!(report.responses, 0);
    assert_eq!(report.success_rate(), 0.0);
    assert!(report.last_interval.is_none());
}

#[tokio::test(start_paused = true)]
async fn uniform_delay_stays_inside_configured_range() {
    let dir = tempdir().unwrap();
    let mut config = config_for(vec![("BMS", abc_device(&dir))], Some(20));
    config.timing = TimingConfig {
        log_interval: Duration::from_millis(500),
        response_delay_min: Duration::from_millis(100),
        response_delay_max: Duration::from_millis(200),
        delay_mode: DelayMode::Uniform,
        ..TimingConfig::default()
    };
    let sink = Arc::new(MemorySink::new());

    DeviceReplaySimulator::new(config, sink.clone())
        .start()
        .join()
        .await;

    let emissions = sink.for_device("BMS");
    assert_eq!(emissions.len(), 40);
    for pair in emissions.chunks(2) {
        let gap = pair[1].elapsed - pair[0].elapsed;
        assert!(gap >= Duration::from_millis(100));
        assert!(gap <= Duration::from_millis(202));
    }
}

#[tokio::test(start_paused = true)]
async fn three_devices_stream_independently() {
    let dir = tempdir().unwrap();
    let inverter = write_script(dir.path(), "inv.txt", "I0\nI1\nI2\nI3\n");
    let bms = write_script(dir.path(), "bms.txt", "B0\nB1\nB2\n");
    let sensor = write_script(dir.path(), "sen.txt", "S0\nS1\n");
    let config = config_for(
        vec![
            ("INVERTER", DeviceConfig::new(inverter)),
            ("BMS", DeviceConfig::new(bms)),
            ("SENSOR", DeviceConfig::new(sensor)),
        ],
        Some(2),
    );
    let sink = Arc::new(MemorySink::new());

    let reports = DeviceReplaySimulator::new(config, sink.clone())
        .start()
        .join()
        .await;

    let order: Vec<&str> = reports.iter().map(|r| r.device.as_str()).collect();
    assert_eq!(order, vec!["INVERTER", "BMS", "SENSOR"]);
    assert_eq!(
        sink.payloads("INVERTER"),
        pairs(&[
            (Direction::Rx, "I0"),
            (Direction::Tx, "I1"),
            (Direction::Rx, "I2"),
            (Direction::Tx, "I3"),
        ])
    );
    assert_eq!(
        sink.payloads("BMS"),
        pairs(&[
            (Direction::Rx, "B0"),
            (Direction::Tx, "B1"),
            (Direction::Rx, "B2"),
            (Direction::Tx, "B0"),
        ])
    );
    assert_eq!(
        sink.payloads("SENSOR"),
        pairs(&[
            (Direction::Rx, "S0"),
            (Direction::Tx, "S1"),
            (Direction::Rx, "S0"),
            (Direction::Tx, "S1"),
        ])
    );
}

#[tokio::test(start_paused = true)]
async fn zero_cycle_limit_emits_nothing() {
    let dir = tempdir().unwrap();
    let config = config_for(vec![("BMS", abc_device(&dir))], Some(0));
    let sink = Arc::new(MemorySink::new());

    let reports = DeviceReplaySimulator::new(config, sink.clone())
        .start()
        .join()
        .await;

    assert!(sink.is_empty());
    assert_eq!(report_for(&reports, "BMS").exit, ExitReason::CycleLimit);
}

#[tokio::test(start_paused = true)]
async fn sink_failure_only_stops_the_affected_device() {
    let dir = tempdir().unwrap();
    let config = config_for(
        vec![("BAD", abc_device(&dir)), ("SENSOR", abc_device(&dir))],
        Some(2),
    );
    let sink = Arc::new(BrokenPipeFor {
        device: "BAD",
        inner: MemorySink::new(),
    });

    let reports = DeviceReplaySimulator::new(config, sink.clone())
        .start()
        .join()
        .await;

    let bad = report_for(&reports, "BAD");
    assert_eq!(bad.exit, ExitReason::SinkFailed);
    assert_eq!(bad.requests, 0);
    assert!(sink.inner.for_device("BAD").is_empty());

    let sensor = report_for(&reports, "SENSOR");
    assert_eq!(sensor.exit, ExitReason::CycleLimit);
    assert_eq!(sensor.requests, 2);
    assert_eq!(sensor.responses, 2);
    assert_eq!(
        sink.inner.payloads("SENSOR"),
        pairs(&[
            (Direction::Rx, "A"),
            (Direction::Tx, "B"),
            (Direction::Rx, "C"),
            (Direction::Tx, "A"),
        ])
    );
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_stops_workers() {
    let dir = tempdir().unwrap();
    let config = config_for(
        vec![("INVERTER", abc_device(&dir)), ("BMS", abc_device(&dir))],
        None,
    );
    let sink = Arc::new(MemorySink::new());

    let handle = DeviceReplaySimulator::new(config, sink.clone()).start();
    // First cycle: RX at 0s, TX at 0.35s, then the interval sleep.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(sink.len(), 4);
    assert_eq!(Arc::strong_count(&sink), 3);

    drop(handle);
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(sink.len(), 4);
    assert_eq!(Arc::strong_count(&sink), 1);
}
