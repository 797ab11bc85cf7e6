//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "binary"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Binary entrypoint for the RTU data response simulator."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{ArgAction, Parser, ValueEnum};
use rtu_sim_common::config::SimulatorConfig;
use rtu_sim_common::logging::{init_tracing, LogFormat};
use rtu_sim_common::time::duration_to_millis;
use rtu_sim_replay::{DeviceReplaySimulator, DeviceReport, StdoutSink};
use tokio::signal;
use tracing::{info, warn};

const SERVICE_NAME: &str = "rtu-simd";

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    version = concat!("RTU simulator ", env!("CARGO_PKG_VERSION")),
    about = "Replays RTU request/response traffic for simulated field devices",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "N", help = "Stop each device after N cycles")]
    max_cycles: Option<u64>,

    #[arg(long, value_enum, help = "Override diagnostic log format")]
    log_format: Option<CliLogFormat>,

    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print extended version information and exit"
    )]
    version: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliLogFormat {
    Pretty,
    Json,
}

impl From<CliLogFormat> for LogFormat {
    fn from(value: CliLogFormat) -> Self {
        match value {
            CliLogFormat::Pretty => LogFormat::Pretty,
            CliLogFormat::Json => LogFormat::StructuredJson,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.version {
        println!(
            "{} {} ({})",
            SERVICE_NAME,
            env!("CARGO_PKG_VERSION"),
            env!("CARGO_PKG_REPOSITORY")
        );
        return Ok(());
    }

    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/rtu-sim.toml"));

    let loaded = SimulatorConfig::load_with_source(&candidates)?;
    let mut config = loaded.config;
    if let Some(max_cycles) = cli.max_cycles {
        config.max_cycles = Some(max_cycles);
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format.into();
    }
    init_tracing(SERVICE_NAME, &config.logging)?;

    match &loaded.source {
        Some(path) => info!(config_path = %path.display(), "configuration loaded"),
        None => info!("no configuration file found; using built-in device map"),
    }

    run_simulator(config).await;
    Ok(())
}

async fn run_simulator(config: SimulatorConfig) {
    let sink = Arc::new(StdoutSink::new(config.output.source_tag.clone()));
    let handle = DeviceReplaySimulator::new(config, sink).start();

    let trigger = handle.shutdown_trigger();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("ctrl-c received; shutting down");
                trigger.cancel();
            }
            Err(err) => warn!(error = %err, "unable to listen for ctrl-c"),
        }
    });

    info!(
        devices = handle.device_count(),
        "simulator running; waiting for termination signal"
    );
    let reports = handle.join().await;
    render_reports(&reports);
}

fn render_reports(reports: &[DeviceReport]) {
    for report in reports {
        info!(
            device = %report.device,
            requests = report.requests,
            responses = report.responses,
            dropped = report.dropped,
            cycles = report.cycles(),
            success_rate = report.success_rate(),
            last_interval_ms = report.last_interval.map(duration_to_millis),
            exit = %report.exit,
            "device summary"
        );
    }

    let totals = SummaryTotals::from_reports(reports);
    info!(
        devices = reports.len(),
        requests = totals.requests,
        responses = totals.responses,
        dropped = totals.dropped,
        success_rate = totals.success_rate(),
        "simulator summary"
    );
}

/// Counters summed across every device report.
#[derive(Debug, Default, PartialEq)]
struct SummaryTotals {
    requests: u64,
    responses: u64,
    dropped: u64,
}

impl SummaryTotals {
    fn from_reports(reports: &[DeviceReport]) -> Self {
        reports.iter().fold(Self::default(), |mut totals, report| {
            totals.requests += report.requests;
            totals.responses += report.responses;
            totals.dropped += report.dropped;
            totals
        })
    }

    fn success_rate(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        self.responses as f64 / self.requests as f64 * 100.0
    }
}
