use serde::Serialize;

use crate::ArtifactRef;

/// Context a persisted artifact is labelled with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SinkTarget {
    pub subject: String,
    /// Empty for subject-level outputs.
    pub session: String,
    pub strategy: String,
    pub resource: String,
}

/// External persistence contract. Construction only wires the connection;
/// writing happens when the graph is executed.
pub trait PersistenceSink {
    fn connect(&mut self, target: SinkTarget, artifact: ArtifactRef) -> anyhow::Result<()>;
}
