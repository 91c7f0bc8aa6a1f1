// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Per-communication flow plans, consumed in order as transfers fire.

use crate::errors::FlowError;
use ahash::AHashMap;
use routing::NodePos;
use std::collections::VecDeque;

/// One planned path and the quantity of bits still to be routed over it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedFlow {
    pub path: Vec<NodePos>,
    pub remaining_bits: f64,
}

/// The per-(source, destination) queues of planned flows. Queues are
/// ordered by descending planned throughput; the head entry is popped once
/// its remaining quantity is exhausted.
#[derive(Debug, Default)]
pub struct FlowPlans {
    epsilon: f64,
    plans: AHashMap<(NodePos, NodePos), VecDeque<PlannedFlow>>,
}

impl FlowPlans {
    #[must_use]
    pub fn new(epsilon: f64) -> Self {
        Self {
            epsilon,
            plans: AHashMap::new(),
        }
    }

    pub fn insert(&mut self, src: NodePos, dst: NodePos, mut flows: Vec<PlannedFlow>) {
        flows.sort_by(|left, right| right.remaining_bits.total_cmp(&left.remaining_bits));
        self.plans.insert((src, dst), flows.into());
    }

    /// The path the next transfer between `src` and `dst` must take, if any
    /// planned flow remains.
    #[must_use]
    pub fn next_path(&self, src: NodePos, dst: NodePos) -> Option<&[NodePos]> {
        self.plans
            .get(&(src, dst))
            .and_then(VecDeque::front)
            .map(|flow| flow.path.as_slice())
    }

    /// Subtract one fired transfer from the head flow of the pair's queue.
    pub fn consume(&mut self, src: NodePos, dst: NodePos, bits: f64) -> Result<(), FlowError> {
        let queue = self
            .plans
            .get_mut(&(src, dst))
            .ok_or(FlowError::NoPlanForPair { src, dst })?;
        let head = queue
            .front_mut()
            .ok_or(FlowError::NoPlanForPair { src, dst })?;
        head.remaining_bits -= bits;
        if head.remaining_bits <= self.epsilon {
            queue.pop_front();
        }
        Ok(())
    }

    #[must_use]
    pub fn remaining_flows(&self, src: NodePos, dst: NodePos) -> usize {
        self.plans.get(&(src, dst)).map_or(0, VecDeque::len)
    }
}
