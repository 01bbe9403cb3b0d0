//! Pipeline and FSM partitions consumed by the architecture aggregation.
use crate::NodeId;

/// One pipeline, its stages in order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelinePartition {
    pub name: String,
    pub stages: Vec<Vec<NodeId>>,
}

/// One FSM, its states in order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FsmPartition {
    pub name: String,
    pub states: Vec<Vec<NodeId>>,
}

/// Result of the structural detection of pipelines and FSMs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArchPartition {
    pub pipelines: Vec<PipelinePartition>,
    pub fsms: Vec<FsmPartition>,
}

impl ArchPartition {
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty() && self.fsms.is_empty()
    }

    /// Every node claimed by any element, with duplicates.
    pub fn claimed_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.pipelines
            .iter()
            .flat_map(|p| p.stages.iter())
            .chain(self.fsms.iter().flat_map(|f| f.states.iter()))
            .flatten()
            .copied()
    }
}
