// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Per-tile behavior traces and their consistency checks.

use crate::BOUNDARY_TILE_ID;
use crate::chunk::DataChunk;
use crate::errors::WorkloadError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// One step of a tile trace: the chunks it needs, the chunks it produces,
/// the chunks it retires from its input buffer, and how long it computes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub wait: Vec<DataChunk>,
    pub output: Vec<DataChunk>,
    pub drop: Vec<DataChunk>,
    pub latency: f64,
}

/// The full trace of one tile within a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileBehavior {
    pub tile_id: i32,
    pub layer_id: i32,
    /// Index of the owning task; assigned when tasks are flattened.
    #[serde(default)]
    pub task_id: usize,
    pub target_tile_id: Vec<i32>,
    pub source_tile_id: Vec<i32>,
    pub dependence: Vec<Dependency>,
}

impl TileBehavior {
    /// A tile fed from outside the array rather than by other tiles.
    #[must_use]
    pub fn is_pipeline_start(&self) -> bool {
        self.source_tile_id == [BOUNDARY_TILE_ID]
    }

    /// A tile whose outputs leave the array.
    #[must_use]
    pub fn is_pipeline_end(&self) -> bool {
        self.target_tile_id == [BOUNDARY_TILE_ID]
    }

    /// Bits produced by one full pass of the trace (one image).
    #[must_use]
    pub fn total_output_bits(&self) -> u64 {
        self.dependence
            .iter()
            .flat_map(|dependency| dependency.output.iter())
            .map(DataChunk::size_bits)
            .sum()
    }
}

/// All tile behaviors of one task, in trace order.
pub type TaskBehavior = Vec<TileBehavior>;

/// Load and validate one task trace from a YAML file.
pub fn load_task_file(path: &Path) -> Result<TaskBehavior, WorkloadError> {
    let raw = std::fs::read_to_string(path).map_err(|source| WorkloadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let task: TaskBehavior =
        serde_yaml_ng::from_str(&raw).map_err(|source| WorkloadError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    validate_task(&task)?;
    info!("Loaded task trace {} ({} tiles)", path.display(), task.len());
    Ok(task)
}

/// Merge the per-task behavior lists into one flat tile list, stamping each
/// behavior with its task index.
#[must_use]
pub fn flatten_tasks(tasks: Vec<TaskBehavior>) -> Vec<TileBehavior> {
    let mut flattened = Vec::new();
    for (task_id, task) in tasks.into_iter().enumerate() {
        for mut behavior in task {
            behavior.task_id = task_id;
            flattened.push(behavior);
        }
    }
    flattened
}

/// Check one task trace for structural consistency. All checks are fatal:
/// a trace that fails any of them is a trace-compilation bug.
pub fn validate_task(task: &TaskBehavior) -> Result<(), WorkloadError> {
    let mut known_ids: HashSet<i32> = HashSet::new();
    for behavior in task {
        if !known_ids.insert(behavior.tile_id) {
            return Err(WorkloadError::DuplicateTileId {
                tile_id: behavior.tile_id,
            });
        }
    }
    for behavior in task {
        validate_endpoints(behavior, &known_ids)?;
        validate_dependencies(behavior)?;
    }
    Ok(())
}

fn validate_endpoints(
    behavior: &TileBehavior,
    known_ids: &HashSet<i32>,
) -> Result<(), WorkloadError> {
    let tile_id = behavior.tile_id;
    for (list, name) in [
        (&behavior.target_tile_id, "target_tile_id"),
        (&behavior.source_tile_id, "source_tile_id"),
    ] {
        if list.is_empty() {
            return Err(WorkloadError::EmptyEndpointList {
                tile_id,
                list: name,
            });
        }
        if list.contains(&BOUNDARY_TILE_ID) && list.len() > 1 {
            return Err(WorkloadError::MixedSentinel { tile_id });
        }
    }
    if !behavior.is_pipeline_end() {
        for &target in &behavior.target_tile_id {
            if !known_ids.contains(&target) {
                return Err(WorkloadError::NoSuchTarget { tile_id, target });
            }
        }
    }
    if !behavior.is_pipeline_start() {
        for &source in &behavior.source_tile_id {
            if !known_ids.contains(&source) {
                return Err(WorkloadError::NoSuchSource {
                    tile_id,
                    source_id: source,
                });
            }
        }
    }
    Ok(())
}

fn validate_dependencies(behavior: &TileBehavior) -> Result<(), WorkloadError> {
    let tile_id = behavior.tile_id;
    if behavior.dependence.is_empty() {
        return Err(WorkloadError::EmptyDependence { tile_id });
    }
    for (index, dependency) in behavior.dependence.iter().enumerate() {
        if !(dependency.latency > 0.0) || !dependency.latency.is_finite() {
            return Err(WorkloadError::NonPositiveLatency {
                tile_id,
                index,
                latency: dependency.latency,
            });
        }
        for dropped in &dependency.drop {
            if !dependency.wait.contains(dropped) {
                return Err(WorkloadError::DropNotInWait { tile_id, index });
            }
        }
        for chunk in dependency
            .wait
            .iter()
            .chain(&dependency.output)
            .chain(&dependency.drop)
        {
            if chunk.end < chunk.start {
                return Err(WorkloadError::BadChunk {
                    tile_id,
                    index,
                    reason: "chunk end precedes its start",
                });
            }
        }
        for chunk in &dependency.output {
            if chunk.size_bits() == 0 {
                return Err(WorkloadError::BadChunk {
                    tile_id,
                    index,
                    reason: "output chunk has zero size",
                });
            }
            if chunk.tile_id != tile_id {
                return Err(WorkloadError::BadChunk {
                    tile_id,
                    index,
                    reason: "output chunk is not stamped with the producing tile id",
                });
            }
        }
        if !behavior.is_pipeline_start() {
            for chunk in &dependency.wait {
                if !behavior.source_tile_id.contains(&chunk.tile_id) {
                    return Err(WorkloadError::BadChunk {
                        tile_id,
                        index,
                        reason: "wait chunk producer is not a configured source",
                    });
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chunk(tile_id: i32, in_id: i32) -> DataChunk {
        DataChunk {
            x: 0,
            y: 0,
            start: 0,
            end: 3,
            bit_width: 9,
            total: 3,
            image_id: 0,
            layer_id: 0,
            in_id,
            tile_id,
        }
    }

    fn two_tile_task() -> TaskBehavior {
        let produced = chunk(0, 0);
        vec![
            TileBehavior {
                tile_id: 0,
                layer_id: 0,
                task_id: 0,
                target_tile_id: vec![1],
                source_tile_id: vec![-1],
                dependence: vec![Dependency {
                    wait: vec![chunk(-1, 0)],
                    output: vec![produced],
                    drop: vec![chunk(-1, 0)],
                    latency: 4.0,
                }],
            },
            TileBehavior {
                tile_id: 1,
                layer_id: 1,
                task_id: 0,
                target_tile_id: vec![-1],
                source_tile_id: vec![0],
                dependence: vec![Dependency {
                    wait: vec![produced],
                    output: vec![chunk(1, 0)],
                    drop: vec![produced],
                    latency: 2.0,
                }],
            },
        ]
    }

    #[test]
    fn accepts_well_formed_task() {
        validate_task(&two_tile_task()).unwrap();
    }

    #[test]
    fn rejects_non_positive_latency() {
        let mut task = two_tile_task();
        task[0].dependence[0].latency = 0.0;
        assert!(matches!(
            validate_task(&task),
            Err(WorkloadError::NonPositiveLatency { tile_id: 0, .. })
        ));
    }

    #[test]
    fn rejects_drop_outside_wait() {
        let mut task = two_tile_task();
        task[1].dependence[0].drop = vec![chunk(0, 7)];
        assert!(matches!(
            validate_task(&task),
            Err(WorkloadError::DropNotInWait { tile_id: 1, .. })
        ));
    }

    #[test]
    fn rejects_dangling_target() {
        let mut task = two_tile_task();
        task[0].target_tile_id = vec![9];
        assert!(matches!(
            validate_task(&task),
            Err(WorkloadError::NoSuchTarget {
                tile_id: 0,
                target: 9
            })
        ));
    }

    #[test]
    fn rejects_mixed_sentinel() {
        let mut task = two_tile_task();
        task[0].source_tile_id = vec![-1, 0];
        assert!(matches!(
            validate_task(&task),
            Err(WorkloadError::MixedSentinel { tile_id: 0 })
        ));
    }

    #[test]
    fn flatten_assigns_task_ids() {
        let flattened = flatten_tasks(vec![two_tile_task(), two_tile_task()]);
        assert_eq!(flattened.len(), 4);
        assert_eq!(flattened[0].task_id, 0);
        assert_eq!(flattened[3].task_id, 1);
    }

    #[test]
    fn output_bits_sum_over_trace() {
        let task = two_tile_task();
        assert_eq!(task[0].total_output_bits(), 27);
    }
}
