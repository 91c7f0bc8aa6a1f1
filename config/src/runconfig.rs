// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The top-level run configuration and its validation.

use crate::errors::{ConfigError, ConfigResult};
use crate::strategy::{MappingKind, NocTopology, PathGenerator, ScheduleKind};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

fn default_image_num() -> usize {
    1
}

/// One simulation run, as loaded from a YAML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Number of pipelined inferences.
    #[serde(default = "default_image_num")]
    pub image_num: usize,
    pub noc_topology: NocTopology,
    pub tile_array_row: usize,
    pub tile_array_col: usize,
    /// Per-tile input buffer capacity, bits.
    pub input_buffer_size: u64,
    /// Per-tile output buffer capacity, bits.
    pub output_buffer_size: u64,
    /// Link bandwidth, bits per nanosecond.
    pub band_width: f64,
    pub mapping_strategy: MappingKind,
    pub schedule_strategy: ScheduleKind,
    #[serde(default)]
    pub transparent_flag: bool,
    pub path_generator: PathGenerator,
    pub task_config_path_list: Vec<PathBuf>,
}

impl RunConfig {
    pub fn from_yaml_file(path: &Path) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: RunConfig =
            serde_yaml_ng::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        info!(
            "Loaded run config from {}: {}x{} {}, {} task file(s)",
            path.display(),
            config.tile_array_row,
            config.tile_array_col,
            config.noc_topology,
            config.task_config_path_list.len()
        );
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.tile_array_row == 0 || self.tile_array_col == 0 {
            return Err(ConfigError::BadGridShape {
                rows: self.tile_array_row,
                cols: self.tile_array_col,
            });
        }
        if self.image_num == 0 {
            return Err(ConfigError::NonPositive("image_num"));
        }
        if self.input_buffer_size == 0 {
            return Err(ConfigError::NonPositive("input_buffer_size"));
        }
        if self.output_buffer_size == 0 {
            return Err(ConfigError::NonPositive("output_buffer_size"));
        }
        if !(self.band_width > 0.0) {
            return Err(ConfigError::NonPositive("band_width"));
        }
        if self.task_config_path_list.is_empty() {
            return Err(ConfigError::NoTasks);
        }
        if self.schedule_strategy.dynamic_path() {
            let occupancy_aware = match &self.path_generator {
                PathGenerator::Geometric(strategy) => strategy.occupancy_aware(),
                PathGenerator::Flow(_) => false,
            };
            if !occupancy_aware {
                return Err(ConfigError::PathGeneratorMismatch {
                    schedule: self.schedule_strategy.to_string(),
                    generator: self.path_generator.short_name(),
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn grid_shape(&self) -> (usize, usize) {
        (self.tile_array_row, self.tile_array_col)
    }
}
