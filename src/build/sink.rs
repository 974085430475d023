use serde::Serialize;

use util::HashSet;
use workflow::{ArtifactRef, PersistenceSink, SinkTarget};

use crate::config::PipelineConfig;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Two outputs would be written to the same destination \"{0}\"")]
    DuplicateDestination(String),
}

/// One artifact wired to its place in the output directory.
#[derive(Debug, Clone, Serialize)]
pub struct Connection {
    pub destination: Vec<String>,
    #[serde(flatten)]
    pub target: SinkTarget,
    pub artifact: ArtifactRef,
}

/// Records where every persisted artifact will be written when the graph runs.
#[derive(Debug)]
pub struct DataSink {
    base_directory: String,
    pipeline_name: String,
    connections: Vec<Connection>,
    destinations: HashSet<Vec<String>>,
}

impl DataSink {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            base_directory: config.output_directory.clone(),
            pipeline_name: config.pipeline_name.clone(),
            connections: Vec::with_capacity(64),
            destinations: HashSet::default(),
        }
    }

    /// output_directory/pipeline_NAME_LABEL/subject[/session]/resource
    pub fn destination(&self, target: &SinkTarget) -> Vec<String> {
        let mut dest = Vec::with_capacity(5);
        dest.push(self.base_directory.clone());
        dest.push(format!("pipeline_{}_{}", self.pipeline_name, target.strategy));
        dest.push(target.subject.clone());
        if !target.session.is_empty() {
            dest.push(target.session.clone());
        }
        dest.push(target.resource.clone());
        dest
    }

    pub fn into_connections(self) -> Vec<Connection> {
        self.connections
    }
}

impl PersistenceSink for DataSink {
    fn connect(&mut self, target: SinkTarget, artifact: ArtifactRef) -> anyhow::Result<()> {
        let destination = self.destination(&target);
        if !self.destinations.insert(destination.clone()) {
            return Err(Error::DuplicateDestination(destination.join("/")).into());
        }
        log::trace!("sink {} <- {artifact}", destination.join("/"));
        self.connections.push(Connection {
            destination,
            target,
            artifact,
        });
        Ok(())
    }
}
