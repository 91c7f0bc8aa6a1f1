// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

pub use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "nocsim")]
#[command(version = "0.1.0")]
#[command(about = "Behavior-driven NoC accelerator simulator", long_about = None)]
pub struct CmdArgs {
    /// YAML run configuration
    pub config: PathBuf,

    /// Label used in artifact file names
    #[arg(long, default_value = "run")]
    pub label: String,

    /// Also run the transparent (contention-free) baseline first
    #[arg(long, default_value_t = false)]
    pub baseline: bool,

    /// Write the JSON post-mortem report here
    #[arg(long)]
    pub report_json: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(long, short, default_value_t = false)]
    pub quiet: bool,
}
