// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Artifact writers.

use crate::report::RunReport;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("Failed to write artifact '{path}'")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize the run report")]
    Serialize(#[from] serde_json::Error),
}

/// Name of the per-run latency file:
/// `output_info_<label>_<mapping>_<schedule>_<path>.txt`.
#[must_use]
pub fn output_info_name(label: &str, mapping: &str, schedule: &str, path_generator: &str) -> String {
    format!("output_info_{label}_{mapping}_{schedule}_{path_generator}.txt")
}

/// Append one run outcome: wall-clock seconds and simulated milliseconds,
/// two floats per line.
pub fn append_output_info(
    path: &Path,
    wall_seconds: f64,
    latency_ms: f64,
) -> Result<(), StatsError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| StatsError::Io {
            path: path.display().to_string(),
            source,
        })?;
    writeln!(file, "{wall_seconds:.6} {latency_ms:.6}").map_err(|source| StatsError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Write the JSON post-mortem report.
pub fn write_json_report(path: &Path, report: &RunReport) -> Result<(), StatsError> {
    let rendered = serde_json::to_string_pretty(report)?;
    std::fs::write(path, rendered).map_err(|source| StatsError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn output_info_name_encodes_the_run() {
        assert_eq!(
            output_info_name("lenet", "naive", "naive", "cvxopt"),
            "output_info_lenet_naive_naive_cvxopt.txt"
        );
    }

    #[test]
    fn output_info_lines_accumulate() {
        let dir = std::env::temp_dir().join("nocsim-stats-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(output_info_name("t", "naive", "naive", "naive"));
        let _ = std::fs::remove_file(&path);
        append_output_info(&path, 0.25, 1.5).unwrap();
        append_output_info(&path, 0.5, 3.0).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "0.250000 1.500000\n0.500000 3.000000\n");
        std::fs::remove_file(&path).unwrap();
    }
}
