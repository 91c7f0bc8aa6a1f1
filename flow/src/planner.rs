// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Formulation and solve of the min-cost multi-commodity flow.
//!
//! Variables are per-(directed edge, commodity) bit flows `X`. The
//! conservation constraint `A·X = B` routes each commodity's demand from its
//! source to its sink; `X >= 0`. The objective is
//! `alpha * total_flow + beta * phi(per_wire_flow)` where `phi` is either
//! the l2 norm (`norm` target, a second-order cone epigraph) or the maximum
//! (`max` target, a linear epigraph). Per-wire flow sums the two directed
//! edges riding each physical wire over all commodities.

use crate::errors::FlowError;
use crate::plan::{FlowPlans, PlannedFlow};
use ahash::AHashMap;
use clarabel::algebra::CscMatrix;
use clarabel::solver::SupportedConeT::{NonnegativeConeT, SecondOrderConeT, ZeroConeT};
use clarabel::solver::{
    DefaultSettings, DefaultSolver, IPSolver, SolverStatus, SupportedConeT,
};
use config::{FlowSolver, FlowSolverConfig, ObjectiveTarget, VariableDomain};
use routing::{NodePos, WireNet};
use tracing::{info, warn};

/// One directed source-to-sink demand, i.e. one communication.
#[derive(Debug, Clone, PartialEq)]
pub struct CommodityDemand {
    pub src: NodePos,
    pub dst: NodePos,
    /// Total bits the communication will move over the whole run.
    pub amount_bits: f64,
}

/// The flow problem over a wire network, ready to solve.
#[derive(Debug)]
pub struct FlowPlanner {
    config: FlowSolverConfig,
    nodes: Vec<NodePos>,
    node_index: AHashMap<NodePos, usize>,
    /// Directed edges as (tail, head) node indices.
    edges: Vec<(usize, usize)>,
    /// Edge ids leaving each node.
    out_edges: Vec<Vec<usize>>,
    /// The two directed edges riding each physical wire.
    wire_edges: Vec<[usize; 2]>,
    demands: Vec<CommodityDemand>,
}

impl FlowPlanner {
    pub fn new(
        net: &WireNet,
        demands: Vec<CommodityDemand>,
        config: FlowSolverConfig,
    ) -> Result<Self, FlowError> {
        let adjacency = net.residual_adjacency();
        if adjacency.is_empty() {
            return Err(FlowError::EmptyNetwork);
        }
        let nodes: Vec<NodePos> = adjacency.iter().map(|(node, _)| *node).collect();
        let node_index: AHashMap<NodePos, usize> = nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (*node, index))
            .collect();
        let mut edges = Vec::new();
        let mut out_edges = vec![Vec::new(); nodes.len()];
        let mut edge_index: AHashMap<(usize, usize), usize> = AHashMap::new();
        for (node, neighbors) in &adjacency {
            let tail = node_index[node];
            for neighbor in neighbors {
                let head = node_index[neighbor];
                let edge = edges.len();
                edges.push((tail, head));
                out_edges[tail].push(edge);
                edge_index.insert((tail, head), edge);
            }
        }
        let mut wire_edges = Vec::new();
        for wire in net.wires() {
            let key = wire.key();
            let a = *node_index
                .get(&key.a)
                .ok_or(FlowError::UnknownNode(key.a))?;
            let b = *node_index
                .get(&key.b)
                .ok_or(FlowError::UnknownNode(key.b))?;
            let forward = edge_index
                .get(&(a, b))
                .copied()
                .ok_or_else(|| FlowError::WireNotTwoEdges(key.to_string()))?;
            let backward = edge_index
                .get(&(b, a))
                .copied()
                .ok_or_else(|| FlowError::WireNotTwoEdges(key.to_string()))?;
            wire_edges.push([forward, backward]);
        }
        for demand in &demands {
            if !node_index.contains_key(&demand.src) {
                return Err(FlowError::UnknownNode(demand.src));
            }
            if !node_index.contains_key(&demand.dst) {
                return Err(FlowError::UnknownNode(demand.dst));
            }
        }
        info!(
            "Flow problem: {} nodes, {} directed edges, {} wires, {} commodities",
            nodes.len(),
            edges.len(),
            wire_edges.len(),
            demands.len()
        );
        Ok(Self {
            config,
            nodes,
            node_index,
            edges,
            out_edges,
            wire_edges,
            demands,
        })
    }

    /// The slack used throughout plan extraction, scaled to the demands.
    #[must_use]
    pub fn epsilon(&self) -> f64 {
        0.01 * self
            .demands
            .iter()
            .map(|demand| demand.amount_bits)
            .fold(0.0, f64::max)
    }

    /// Solve the flow problem; returns the per-commodity edge flows.
    pub fn solve(&self) -> Result<Vec<Vec<f64>>, FlowError> {
        if self.demands.is_empty() {
            return Ok(Vec::new());
        }
        if self.config.domain == VariableDomain::Integer {
            warn!("integer flow variables requested; solving the continuous relaxation");
        }
        match self.config.solver {
            FlowSolver::Clarabel => self.solve_clarabel(),
        }
    }

    #[allow(clippy::too_many_lines)]
    fn solve_clarabel(&self) -> Result<Vec<Vec<f64>>, FlowError> {
        let e_count = self.edges.len();
        let k_count = self.demands.len();
        let m_count = self.nodes.len();
        let w_count = self.wire_edges.len();
        let x_vars = k_count * e_count;
        let n_vars = x_vars + w_count + 1;
        let x_var = |k: usize, e: usize| k * e_count + e;
        let w_var = |i: usize| x_vars + i;
        let t_var = x_vars + w_count;

        let zero_rows = k_count * m_count + w_count;
        let nonneg_rows = match self.config.target {
            ObjectiveTarget::Max => x_vars + w_count,
            ObjectiveTarget::Norm => x_vars,
        };
        let soc_rows = match self.config.target {
            ObjectiveTarget::Max => 0,
            ObjectiveTarget::Norm => w_count + 1,
        };
        let total_rows = zero_rows + nonneg_rows + soc_rows;

        let mut triplets: Vec<(usize, usize, f64)> = Vec::new();
        let mut rhs = vec![0.0; total_rows];

        // conservation: A · X[:,k] = B[:,k]
        for (k, demand) in self.demands.iter().enumerate() {
            for (e, &(tail, head)) in self.edges.iter().enumerate() {
                triplets.push((k * m_count + tail, x_var(k, e), 1.0));
                triplets.push((k * m_count + head, x_var(k, e), -1.0));
            }
            rhs[k * m_count + self.node_index[&demand.src]] = demand.amount_bits;
            rhs[k * m_count + self.node_index[&demand.dst]] = -demand.amount_bits;
        }
        // coupling: w_i = sum of flow on the wire's two directed edges
        let coupling_base = k_count * m_count;
        for (i, pair) in self.wire_edges.iter().enumerate() {
            triplets.push((coupling_base + i, w_var(i), 1.0));
            for &edge in pair {
                for k in 0..k_count {
                    triplets.push((coupling_base + i, x_var(k, edge), -1.0));
                }
            }
        }
        // X >= 0
        for j in 0..x_vars {
            triplets.push((zero_rows + j, j, -1.0));
        }
        let target_base = zero_rows + x_vars;
        match self.config.target {
            ObjectiveTarget::Max => {
                // t >= w_i
                for i in 0..w_count {
                    triplets.push((target_base + i, w_var(i), 1.0));
                    triplets.push((target_base + i, t_var, -1.0));
                }
            }
            ObjectiveTarget::Norm => {
                // (t, w) in the second-order cone: t >= ||w||
                triplets.push((target_base, t_var, -1.0));
                for i in 0..w_count {
                    triplets.push((target_base + 1 + i, w_var(i), -1.0));
                }
            }
        }

        let mut objective = vec![0.0; n_vars];
        for coefficient in objective.iter_mut().take(x_vars) {
            *coefficient = self.config.alpha;
        }
        objective[t_var] = self.config.beta;

        let quadratic = CscMatrix::zeros((n_vars, n_vars));
        let constraints = csc_from_triplets(total_rows, n_vars, triplets);
        let cones: Vec<SupportedConeT<f64>> = match self.config.target {
            ObjectiveTarget::Max => vec![ZeroConeT(zero_rows), NonnegativeConeT(nonneg_rows)],
            ObjectiveTarget::Norm => vec![
                ZeroConeT(zero_rows),
                NonnegativeConeT(nonneg_rows),
                SecondOrderConeT(w_count + 1),
            ],
        };
        let settings = DefaultSettings {
            verbose: false,
            ..DefaultSettings::default()
        };
        let mut solver = DefaultSolver::new(
            &quadratic,
            &objective,
            &constraints,
            &rhs,
            &cones,
            settings,
        );
        solver.solve();
        match solver.solution.status {
            SolverStatus::Solved | SolverStatus::AlmostSolved => {}
            status => return Err(FlowError::Infeasible(format!("{status:?}"))),
        }
        let solution = &solver.solution.x;
        Ok((0..k_count)
            .map(|k| solution[k * e_count..(k + 1) * e_count].to_vec())
            .collect())
    }

    /// Decompose the solved flows into simple paths, greedily extracting the
    /// largest-outgoing-edge route until the source's outflow drops below
    /// epsilon.
    pub fn plan(&self, flows: &[Vec<f64>]) -> Result<Vec<Vec<PlannedFlow>>, FlowError> {
        let epsilon = self.epsilon();
        let mut all_plans = Vec::with_capacity(flows.len());
        for (k, (flow, demand)) in flows.iter().zip(&self.demands).enumerate() {
            if flow.iter().any(|&value| value < -epsilon) {
                return Err(FlowError::NegativeFlow { commodity: k });
            }
            self.check_conservation(k, flow, demand, epsilon)?;
            let mut residual = flow.clone();
            let src = self.node_index[&demand.src];
            let dst = self.node_index[&demand.dst];
            let mut plans = Vec::new();
            let mut extracted = 0.0;
            loop {
                let max_outflow = self.out_edges[src]
                    .iter()
                    .map(|&edge| residual[edge])
                    .fold(0.0, f64::max);
                if max_outflow < epsilon {
                    break;
                }
                let (path_nodes, path_edges, throughput) =
                    self.extract_path(k, &residual, src, dst)?;
                for &edge in &path_edges {
                    residual[edge] -= throughput;
                }
                extracted += throughput;
                plans.push(PlannedFlow {
                    path: path_nodes,
                    remaining_bits: throughput,
                });
            }
            if residual.iter().any(|&value| value.abs() >= 4.0 * epsilon) {
                return Err(FlowError::ResidualNotDrained { commodity: k });
            }
            if (demand.amount_bits - extracted).abs() >= 4.0 * epsilon {
                return Err(FlowError::DemandMismatch { commodity: k });
            }
            all_plans.push(plans);
        }
        Ok(all_plans)
    }

    fn check_conservation(
        &self,
        k: usize,
        flow: &[f64],
        demand: &CommodityDemand,
        epsilon: f64,
    ) -> Result<(), FlowError> {
        let mut net_flow = vec![0.0; self.nodes.len()];
        for (edge, &(tail, head)) in self.edges.iter().enumerate() {
            net_flow[tail] += flow[edge];
            net_flow[head] -= flow[edge];
        }
        net_flow[self.node_index[&demand.src]] -= demand.amount_bits;
        net_flow[self.node_index[&demand.dst]] += demand.amount_bits;
        if net_flow.iter().any(|&value| value.abs() >= epsilon) {
            return Err(FlowError::Unbalanced { commodity: k });
        }
        Ok(())
    }

    /// Walk from source to sink following the largest-residual outgoing
    /// edge. Returns the node path, the edges taken, and the bottleneck
    /// throughput.
    fn extract_path(
        &self,
        k: usize,
        residual: &[f64],
        src: usize,
        dst: usize,
    ) -> Result<(Vec<NodePos>, Vec<usize>, f64), FlowError> {
        let mut node_path = vec![src];
        let mut edge_path = Vec::new();
        let mut cursor = src;
        while cursor != dst {
            let best = self.out_edges[cursor]
                .iter()
                .copied()
                .max_by(|&left, &right| residual[left].total_cmp(&residual[right]))
                .ok_or(FlowError::ExtractionStalled { commodity: k })?;
            if residual[best] <= 0.0 {
                return Err(FlowError::ExtractionStalled { commodity: k });
            }
            let (_, head) = self.edges[best];
            if node_path.contains(&head) {
                return Err(FlowError::LoopInPath { commodity: k });
            }
            edge_path.push(best);
            node_path.push(head);
            cursor = head;
            if node_path.len() > self.nodes.len() {
                return Err(FlowError::LoopInPath { commodity: k });
            }
        }
        let throughput = edge_path
            .iter()
            .map(|&edge| residual[edge])
            .fold(f64::INFINITY, f64::min);
        if !(throughput > 0.0) {
            return Err(FlowError::ExtractionStalled { commodity: k });
        }
        let positions = node_path.into_iter().map(|index| self.nodes[index]).collect();
        Ok((positions, edge_path, throughput))
    }

    /// Solve and decompose in one step, producing the consumable plan
    /// queues.
    pub fn build_plans(&self) -> Result<FlowPlans, FlowError> {
        let flows = self.solve()?;
        let per_commodity = self.plan(&flows)?;
        let mut plans = FlowPlans::new(self.epsilon());
        for (demand, flows) in self.demands.iter().zip(per_commodity) {
            plans.insert(demand.src, demand.dst, flows);
        }
        Ok(plans)
    }
}

fn csc_from_triplets(
    rows: usize,
    cols: usize,
    mut triplets: Vec<(usize, usize, f64)>,
) -> CscMatrix<f64> {
    triplets.sort_by_key(|&(row, col, _)| (col, row));
    let mut colptr = vec![0_usize; cols + 1];
    let mut rowval = Vec::with_capacity(triplets.len());
    let mut nzval = Vec::with_capacity(triplets.len());
    for &(row, col, value) in &triplets {
        colptr[col + 1] += 1;
        rowval.push(row);
        nzval.push(value);
    }
    for col in 0..cols {
        colptr[col + 1] += colptr[col];
    }
    CscMatrix::new(rows, cols, colptr, rowval, nzval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::NocTopology;

    fn pos(row: u16, col: u16) -> NodePos {
        NodePos::new(row, col)
    }

    fn solver_config(target: ObjectiveTarget) -> FlowSolverConfig {
        FlowSolverConfig {
            alpha: 1.0,
            beta: 1.0,
            solver: FlowSolver::Clarabel,
            target,
            domain: VariableDomain::Float,
        }
    }

    fn mesh_2x2() -> WireNet {
        WireNet::new(2, 2, 1.0, NocTopology::Mesh).unwrap()
    }

    #[test]
    fn graph_construction_matches_topology() {
        let net = mesh_2x2();
        let planner = FlowPlanner::new(&net, Vec::new(), solver_config(ObjectiveTarget::Max))
            .unwrap();
        assert_eq!(planner.nodes.len(), 4);
        // every undirected wire contributes two directed edges
        assert_eq!(planner.edges.len(), 8);
        assert_eq!(planner.wire_edges.len(), 4);
        for pair in &planner.wire_edges {
            let (tail_a, head_a) = planner.edges[pair[0]];
            let (tail_b, head_b) = planner.edges[pair[1]];
            assert_eq!((tail_a, head_a), (head_b, tail_b));
        }
    }

    #[test]
    fn rejects_demands_outside_the_grid() {
        let net = mesh_2x2();
        let demands = vec![CommodityDemand {
            src: pos(0, 0),
            dst: pos(9, 9),
            amount_bits: 10.0,
        }];
        assert!(matches!(
            FlowPlanner::new(&net, demands, solver_config(ObjectiveTarget::Max)),
            Err(FlowError::UnknownNode(_))
        ));
    }

    #[test]
    fn max_target_balances_across_both_routes() {
        let net = mesh_2x2();
        let demands = vec![CommodityDemand {
            src: pos(0, 0),
            dst: pos(1, 1),
            amount_bits: 54.0,
        }];
        let planner = FlowPlanner::new(&net, demands, solver_config(ObjectiveTarget::Max)).unwrap();
        let flows = planner.solve().unwrap();
        let plans = planner.plan(&flows).unwrap();
        let epsilon = planner.epsilon();
        let total: f64 = plans[0].iter().map(|flow| flow.remaining_bits).sum();
        assert!((total - 54.0).abs() < 4.0 * epsilon, "total = {total}");
        for flow in &plans[0] {
            assert_eq!(flow.path.first(), Some(&pos(0, 0)));
            assert_eq!(flow.path.last(), Some(&pos(1, 1)));
            assert_eq!(flow.path.len(), 3, "minimum-hop route expected");
        }
        // balancing the max splits the demand over both two-hop routes
        assert_eq!(plans[0].len(), 2);
    }

    #[test]
    fn norm_target_solves_and_conserves_demand() {
        let net = mesh_2x2();
        let demands = vec![
            CommodityDemand {
                src: pos(0, 0),
                dst: pos(1, 1),
                amount_bits: 27.0,
            },
            CommodityDemand {
                src: pos(0, 1),
                dst: pos(1, 0),
                amount_bits: 27.0,
            },
        ];
        let planner =
            FlowPlanner::new(&net, demands, solver_config(ObjectiveTarget::Norm)).unwrap();
        let plans = planner.build_plans().unwrap();
        for (src, dst) in [(pos(0, 0), pos(1, 1)), (pos(0, 1), pos(1, 0))] {
            assert!(plans.remaining_flows(src, dst) >= 1);
            let head = plans.next_path(src, dst).unwrap();
            assert_eq!(head.first(), Some(&src));
            assert_eq!(head.last(), Some(&dst));
        }
    }
}
