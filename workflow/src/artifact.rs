use serde::Serialize;

use crate::{NodeId, SlotIdx};

/// Opaque handle to one output of one node in the execution graph.
/// Never owns data; equality is identity of `(node, slot)`.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ArtifactRef {
    node: NodeId,
    slot: SlotIdx,
}

impl ArtifactRef {
    pub(crate) fn new(node: NodeId, slot: SlotIdx) -> Self {
        Self { node, slot }
    }

    /// Node that produces this artifact.
    #[inline]
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Position of this artifact in its producer's output slots.
    #[inline]
    pub fn slot(&self) -> SlotIdx {
        self.slot
    }
}

impl std::fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node {}, slot {}", self.node, self.slot)
    }
}
