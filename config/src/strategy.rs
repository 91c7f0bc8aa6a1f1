// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Typed strategy names. Every name the simulator recognizes is a variant
//! here; anything else is a [`ConfigError`] at parse time.

use crate::errors::ConfigError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Grid topology of the tile array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NocTopology {
    Mesh,
    Torus,
}

impl FromStr for NocTopology {
    type Err = ConfigError;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "mesh" => Ok(NocTopology::Mesh),
            "torus" => Ok(NocTopology::Torus),
            other => Err(ConfigError::UnknownTopology(other.to_string())),
        }
    }
}

impl fmt::Display for NocTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NocTopology::Mesh => write!(f, "mesh"),
            NocTopology::Torus => write!(f, "torus"),
        }
    }
}

/// Closed-form tile placement strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingKind {
    Naive,
    Snake,
    Impact,
}

impl FromStr for MappingKind {
    type Err = ConfigError;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "naive" => Ok(MappingKind::Naive),
            "snake" => Ok(MappingKind::Snake),
            "impact" => Ok(MappingKind::Impact),
            other => Err(ConfigError::UnknownMapping(other.to_string())),
        }
    }
}

impl fmt::Display for MappingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingKind::Naive => write!(f, "naive"),
            MappingKind::Snake => write!(f, "snake"),
            MappingKind::Impact => write!(f, "impact"),
        }
    }
}

/// Scheduling policy: the cross product of priority order (static by index
/// or dynamic by transfer progress) and path selection (fixed X-Y path or a
/// per-tick rerouted path).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScheduleKind {
    #[serde(rename = "naive")]
    Naive,
    #[serde(rename = "naive_dynamic_priority")]
    DynamicPriority,
    #[serde(rename = "naive_dynamic_path")]
    DynamicPath,
    #[serde(rename = "naive_dynamic_all")]
    DynamicAll,
}

impl ScheduleKind {
    #[must_use]
    pub fn dynamic_priority(self) -> bool {
        matches!(self, ScheduleKind::DynamicPriority | ScheduleKind::DynamicAll)
    }

    #[must_use]
    pub fn dynamic_path(self) -> bool {
        matches!(self, ScheduleKind::DynamicPath | ScheduleKind::DynamicAll)
    }
}

impl FromStr for ScheduleKind {
    type Err = ConfigError;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "naive" => Ok(ScheduleKind::Naive),
            "naive_dynamic_priority" => Ok(ScheduleKind::DynamicPriority),
            "naive_dynamic_path" => Ok(ScheduleKind::DynamicPath),
            "naive_dynamic_all" => Ok(ScheduleKind::DynamicAll),
            other => Err(ConfigError::UnknownSchedule(other.to_string())),
        }
    }
}

impl fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleKind::Naive => write!(f, "naive"),
            ScheduleKind::DynamicPriority => write!(f, "naive_dynamic_priority"),
            ScheduleKind::DynamicPath => write!(f, "naive_dynamic_path"),
            ScheduleKind::DynamicAll => write!(f, "naive_dynamic_all"),
        }
    }
}

/// Geometric path finders over the wire network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathStrategy {
    Naive,
    WestFirst,
    NorthLast,
    NegativeFirst,
    Adaptive,
    Greedy,
    Dijkstra,
    Astar,
}

impl PathStrategy {
    /// True for the finders that consult the residual adjacency and may
    /// legitimately return no path while wires are held.
    #[must_use]
    pub fn occupancy_aware(self) -> bool {
        matches!(
            self,
            PathStrategy::Greedy | PathStrategy::Dijkstra | PathStrategy::Astar
        )
    }
}

impl FromStr for PathStrategy {
    type Err = ConfigError;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "naive" => Ok(PathStrategy::Naive),
            "west_first" => Ok(PathStrategy::WestFirst),
            "north_last" => Ok(PathStrategy::NorthLast),
            "negative_first" => Ok(PathStrategy::NegativeFirst),
            "adaptive" => Ok(PathStrategy::Adaptive),
            "greedy" => Ok(PathStrategy::Greedy),
            "dijkstra" => Ok(PathStrategy::Dijkstra),
            "astar" => Ok(PathStrategy::Astar),
            other => Err(ConfigError::UnknownPathGenerator(other.to_string())),
        }
    }
}

impl fmt::Display for PathStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PathStrategy::Naive => "naive",
            PathStrategy::WestFirst => "west_first",
            PathStrategy::NorthLast => "north_last",
            PathStrategy::NegativeFirst => "negative_first",
            PathStrategy::Adaptive => "adaptive",
            PathStrategy::Greedy => "greedy",
            PathStrategy::Dijkstra => "dijkstra",
            PathStrategy::Astar => "astar",
        };
        write!(f, "{name}")
    }
}

/// Registered flow solvers for the `cvxopt@…` path generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowSolver {
    Clarabel,
}

impl FromStr for FlowSolver {
    type Err = ConfigError;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.eq_ignore_ascii_case("clarabel") {
            Ok(FlowSolver::Clarabel)
        } else {
            Err(ConfigError::UnknownFlowSolver(input.to_string()))
        }
    }
}

/// Shape of the wire-balancing term in the flow objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectiveTarget {
    /// Minimize the l2 norm of per-wire traffic.
    Norm,
    /// Minimize the maximum per-wire traffic.
    Max,
}

/// Declared domain of the flow variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableDomain {
    Float,
    Integer,
}

/// Parsed trailing parameters of a `cvxopt@alpha,beta,SOLVER,norm|max,float|integer`
/// path generator.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowSolverConfig {
    pub alpha: f64,
    pub beta: f64,
    pub solver: FlowSolver,
    pub target: ObjectiveTarget,
    pub domain: VariableDomain,
}

impl FromStr for FlowSolverConfig {
    type Err = ConfigError;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = input.split(',').collect();
        if fields.len() != 5 {
            return Err(ConfigError::BadSolverConfig(
                input.to_string(),
                "expected 'alpha,beta,SOLVER,norm|max,float|integer'",
            ));
        }
        let alpha: f64 = fields[0]
            .parse()
            .map_err(|_| ConfigError::BadSolverConfig(input.to_string(), "bad alpha"))?;
        let beta: f64 = fields[1]
            .parse()
            .map_err(|_| ConfigError::BadSolverConfig(input.to_string(), "bad beta"))?;
        let solver = fields[2].parse()?;
        let target = match fields[3] {
            "norm" => ObjectiveTarget::Norm,
            "max" => ObjectiveTarget::Max,
            _ => {
                return Err(ConfigError::BadSolverConfig(
                    input.to_string(),
                    "objective target must be norm or max",
                ));
            }
        };
        let domain = match fields[4] {
            "float" => VariableDomain::Float,
            "integer" => VariableDomain::Integer,
            _ => {
                return Err(ConfigError::BadSolverConfig(
                    input.to_string(),
                    "variable domain must be float or integer",
                ));
            }
        };
        Ok(FlowSolverConfig {
            alpha,
            beta,
            solver,
            target,
            domain,
        })
    }
}

/// The `path_generator` config key: either one of the geometric finders or a
/// pre-planned flow schedule (`cvxopt@…`).
#[derive(Debug, Clone, PartialEq)]
pub enum PathGenerator {
    Geometric(PathStrategy),
    Flow(FlowSolverConfig),
}

impl PathGenerator {
    /// Short name used in artifact file names.
    #[must_use]
    pub fn short_name(&self) -> String {
        match self {
            PathGenerator::Geometric(strategy) => strategy.to_string(),
            PathGenerator::Flow(_) => "cvxopt".to_string(),
        }
    }
}

impl FromStr for PathGenerator {
    type Err = ConfigError;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if let Some(solver_config) = input.strip_prefix("cvxopt@") {
            return Ok(PathGenerator::Flow(solver_config.parse()?));
        }
        if input == "cvxopt" {
            return Err(ConfigError::BadSolverConfig(
                input.to_string(),
                "cvxopt needs trailing parameters: cvxopt@alpha,beta,SOLVER,norm|max,float|integer",
            ));
        }
        Ok(PathGenerator::Geometric(input.parse()?))
    }
}

impl<'de> Deserialize<'de> for PathGenerator {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
