// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![deny(unsafe_code, clippy::all, clippy::pedantic)]

mod args;

use crate::args::{CmdArgs, Parser};
use config::{ConfigError, RunConfig};
use engine::{Array, SimError, SimSummary};
use stats::{
    CommOccupancy, CommunicationInfo, RunReport, StatsError, WireRange, append_output_info,
    output_info_name, write_json_report,
};
use std::path::Path;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use workload::{WorkloadError, flatten_tasks, load_task_file};

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Workload(#[from] WorkloadError),
    #[error(transparent)]
    Sim(#[from] SimError),
    #[error(transparent)]
    Stats(#[from] StatsError),
}

fn init_logging(quiet: bool) {
    let default_filter = if quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();
}

fn main() {
    let cmd_args = CmdArgs::parse();
    init_logging(cmd_args.quiet);
    if let Err(failure) = run(&cmd_args) {
        error!("{failure}");
        let mut source = std::error::Error::source(&failure);
        while let Some(cause) = source {
            error!("  caused by: {cause}");
            source = cause.source();
        }
        std::process::exit(1);
    }
}

fn run(cmd_args: &CmdArgs) -> Result<(), AppError> {
    let run_config = RunConfig::from_yaml_file(&cmd_args.config)?;
    let mut tasks = Vec::new();
    for task_path in &run_config.task_config_path_list {
        tasks.push(load_task_file(task_path)?);
    }
    let behaviors = flatten_tasks(tasks);

    if cmd_args.baseline {
        let mut baseline_config = run_config.clone();
        baseline_config.transparent_flag = true;
        let mut baseline = Array::build(&baseline_config, &behaviors)?;
        let summary = baseline.run()?;
        info!(
            "Transparent baseline: {:.3} ms over {} events",
            summary.latency / 1e6,
            summary.event_count
        );
    }

    let started = Instant::now();
    let mut array = Array::build(&run_config, &behaviors)?;
    let summary = array.run()?;
    let wall_seconds = started.elapsed().as_secs_f64();
    let latency_ms = summary.latency / 1e6;
    info!(
        "Simulated latency: {latency_ms:.3} ms over {} events ({wall_seconds:.3}s wall clock)",
        summary.event_count
    );

    let info_name = output_info_name(
        &cmd_args.label,
        &run_config.mapping_strategy.to_string(),
        &run_config.schedule_strategy.to_string(),
        &run_config.path_generator.short_name(),
    );
    append_output_info(Path::new(&info_name), wall_seconds, latency_ms)?;

    if let Some(report_path) = &cmd_args.report_json {
        let report = build_report(cmd_args, &run_config, wall_seconds, summary, &array);
        write_json_report(report_path, &report)?;
        info!("Wrote report to {}", report_path.display());
    }
    Ok(())
}

fn build_report(
    cmd_args: &CmdArgs,
    run_config: &RunConfig,
    wall_seconds: f64,
    summary: SimSummary,
    array: &Array,
) -> RunReport {
    let communication_info_list = array
        .communications()
        .iter()
        .map(|communication| CommunicationInfo {
            id: communication.id().to_string(),
            source: communication.src_pos(),
            target: communication.dst_pos(),
            amount_bits: communication.amount_bits(),
            intervals: communication.intervals().to_vec(),
            path: communication.last_path().to_vec(),
        })
        .collect();
    let wire_range_list = array
        .net()
        .wires()
        .map(|wire| WireRange {
            a: wire.key().a,
            b: wire.key().b,
            occupancy: wire
                .occupancy()
                .into_iter()
                .map(|(id, intervals)| CommOccupancy { id, intervals })
                .collect(),
            running_rate: wire.running_rate(summary.latency),
        })
        .collect();
    RunReport {
        label: cmd_args.label.clone(),
        mapping: run_config.mapping_strategy.to_string(),
        schedule: run_config.schedule_strategy.to_string(),
        path_generator: run_config.path_generator.short_name(),
        image_num: run_config.image_num,
        transparent: run_config.transparent_flag,
        wall_seconds,
        latency_ns: summary.latency,
        latency_ms: summary.latency / 1e6,
        communication_info_list,
        wire_range_list,
    }
}
