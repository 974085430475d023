mod id;
pub use id::{NodeId, SlotIdx};

mod artifact;
pub use artifact::ArtifactRef;

mod step;
pub use step::{Literal, NodeInput, StepBackend, StepConfigurationError, StepKind, StepRequest};

mod graph;
pub use graph::{Graph, GraphDescription, Node, NodeDescription};

mod pool;
pub use pool::ResourcePool;

mod strategy;
pub use strategy::Strategy;

mod strategy_set;
pub use strategy_set::{Family, StrategySet};

mod registrar;
pub use registrar::{Input, Registered, Registrar, StepCall};

mod sink;
pub use sink::{PersistenceSink, SinkTarget};

pub mod error;

// used to separate step kinds in a strategy label e.g. "afni_skullstrip+anat_mni_flirt_register"
pub const STEP_DELIM: char = '+';

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Resource \"{0}\" not found in strategy's pool")]
    ResourceNotFound(String),
    #[error("Resource \"{0}\" already exists in strategy's pool")]
    ResourceCollision(String),
    #[error("Strategy has no leaf to use as step input")]
    MissingLeaf,
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Aggregation step produced {actual} outputs for {expected} inputs")]
    AggregationLengthMismatch { expected: usize, actual: usize },
    #[error("Strategy family \"{0}\" is empty")]
    EmptyFamily(String),
    #[error("Node named \"{0}\" already exists in graph")]
    DuplicateNode(String),
    #[error("Artifact {0} doesn't belong to this graph")]
    DanglingArtifact(ArtifactRef),
    #[error("Shared step \"{0}\" can't read input \"{1}\" from a strategy")]
    SharedResourceInput(String, String),
    #[error("Shared step \"{0}\" can't write to a strategy's pool")]
    SharedResourceOutput(String),
    #[error("Node \"{0}\" declares {1} output slots, more than a slot index can hold")]
    TooManyOutputs(String, usize),
    #[error(transparent)]
    StepConfiguration(#[from] StepConfigurationError),
}
